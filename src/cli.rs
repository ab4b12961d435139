use clap::{Parser, Subcommand};

/// noc-report: periodic aggregation reports over GLPI tickets and payments
#[derive(Parser)]
#[command(name = "noc-report", version, about)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP server and the refresh job
    Serve {
        /// Port to bind (defaults to REPORTER_PORT)
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Compute one report and print it as JSON
    Report {
        /// Report name, see `list`
        name: String,
        /// Window start (YYYY-MM-DD or YYYY-MM-DD HH:MM:SS)
        #[arg(long, requires = "end")]
        start: Option<String>,
        /// Window end; a bare date covers the whole day
        #[arg(long, requires = "start")]
        end: Option<String>,
        /// Hours back from now
        #[arg(long, conflicts_with_all = ["start", "end"], allow_negative_numbers = true)]
        hours: Option<i64>,
    },

    /// List available reports
    List,
}
