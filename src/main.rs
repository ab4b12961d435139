use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reporter::api::{self, AppState};
use reporter::config::{self, Config};
use reporter::jobs;
use reporter::models::TimeWindow;
use reporter::query::QueryBuilder;
use reporter::report::{ReportKind, Reporter};
use reporter::store::{Database, SqlFetcher};

mod cli;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    use opentelemetry::KeyValue;
    use opentelemetry_sdk::{trace as sdktrace, Resource};

    // OTLP export only when a collector is configured
    let telemetry_layer = if std::env::var("OTEL_EXPORTER_OTLP_ENDPOINT").is_ok() {
        let tracer = opentelemetry_otlp::new_pipeline()
            .tracing()
            .with_exporter(opentelemetry_otlp::new_exporter().tonic())
            .with_trace_config(sdktrace::config().with_resource(Resource::new(vec![
                KeyValue::new("service.name", "noc-report"),
            ])))
            .install_batch(opentelemetry_sdk::runtime::Tokio)
            .context("failed to install OpenTelemetry tracer")?;
        Some(tracing_opentelemetry::layer().with_tracer(tracer))
    } else {
        None
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "reporter=info,tower_http=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .with(telemetry_layer)
        .init();

    let args = cli::Cli::parse();

    let result = match args.command {
        Some(cli::Commands::List) => list_reports(),
        Some(cli::Commands::Report {
            name,
            start,
            end,
            hours,
        }) => {
            let cfg = config::load()?;
            run_report(cfg, &name, start, end, hours).await
        }
        Some(cli::Commands::Serve { port }) => {
            let cfg = config::load()?;
            run_server(cfg, port).await
        }
        None => {
            let cfg = config::load()?;
            run_server(cfg, None).await
        }
    };

    if let Err(ref e) = result {
        eprintln!("Error: {:?}", e);
    }
    opentelemetry::global::shutdown_tracer_provider();
    result
}

/// One database handle per configured source, plus the reporter that reads
/// through them.
fn build_reporter(cfg: &Config) -> (Vec<Arc<Database>>, Arc<Reporter>) {
    let mut databases = Vec::with_capacity(cfg.sources.len());
    let mut reporter = Reporter::new(cfg.cache_ttl);
    for source in &cfg.sources {
        let db = Arc::new(Database::new(
            source.url.clone(),
            source.dialect,
            cfg.pool_settings(),
        ));
        let fetcher = Arc::new(SqlFetcher::new(db.clone(), cfg.query_timeout));
        let builder = QueryBuilder::new(source.dialect, cfg.domain.clone());
        reporter = reporter.with_source(source.domain, fetcher, builder);
        databases.push(db);
    }
    (databases, Arc::new(reporter))
}

async fn close_all(databases: &[Arc<Database>]) {
    for db in databases {
        db.close().await;
    }
}

async fn run_server(cfg: Config, port: Option<u16>) -> anyhow::Result<()> {
    tracing::info!(config = ?cfg, "starting reporter");
    let (databases, reporter) = build_reporter(&cfg);

    let state = Arc::new(AppState {
        reporter: reporter.clone(),
        default_hours: cfg.default_hours,
        databases: databases.clone(),
    });
    let app = api::app(state);

    let refresh = cfg.refresh_interval.map(|period| {
        tracing::info!(
            period_secs = period.as_secs(),
            hours = cfg.default_hours,
            "refresh job started"
        );
        jobs::refresh::spawn(reporter.clone(), period, cfg.default_hours)
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], port.unwrap_or(cfg.port)));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))?;
    tracing::info!("reporter listening on {}", addr);
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Some(job) = refresh {
        job.abort();
    }
    close_all(&databases).await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received");
}

async fn run_report(
    cfg: Config,
    name: &str,
    start: Option<String>,
    end: Option<String>,
    hours: Option<i64>,
) -> anyhow::Result<()> {
    let kind: ReportKind = name.parse().map_err(anyhow::Error::msg)?;
    let window = TimeWindow::from_params(start.as_deref(), end.as_deref(), hours, cfg.default_hours)
        .map_err(anyhow::Error::msg)?;

    let (databases, reporter) = build_reporter(&cfg);
    if !reporter.serves(kind) {
        anyhow::bail!(
            "no database configured for {} reports; set {}_DATABASE_URL",
            kind.domain().name(),
            kind.domain().name().to_uppercase()
        );
    }
    let report = reporter.report(kind, &window).await;
    close_all(&databases).await;

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode report")?
    );
    if report.is_error() {
        anyhow::bail!(
            "{} finished with status {:?}",
            kind,
            report.status
        );
    }
    Ok(())
}

fn list_reports() -> anyhow::Result<()> {
    for kind in ReportKind::ALL {
        println!("{:<28} {:<13} {}", kind.name(), kind.domain().name(), kind.description());
    }
    Ok(())
}
