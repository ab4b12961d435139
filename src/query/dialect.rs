use serde::Serialize;

/// SQL engine the reporting database speaks.
///
/// Every rendered column is cast into one of a few portable shapes
/// (text, 64-bit integer, date-as-text) so a single row decoder serves
/// both engines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    MySql,
    Postgres,
}

impl Dialect {
    /// Detect the engine from a connection URL scheme.
    pub fn from_url(url: &str) -> Option<Self> {
        match url.split_once("://")?.0 {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    pub fn from_engine(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "mysql" | "mariadb" => Some(Dialect::MySql),
            "postgres" | "postgresql" | "pg" => Some(Dialect::Postgres),
            _ => None,
        }
    }

    pub fn scheme(self) -> &'static str {
        match self {
            Dialect::MySql => "mysql",
            Dialect::Postgres => "postgres",
        }
    }

    pub fn default_port(self) -> u16 {
        match self {
            Dialect::MySql => 3306,
            Dialect::Postgres => 5432,
        }
    }

    /// Placeholder for the `n`-th bind value (1-based).
    pub fn placeholder(self, n: usize) -> String {
        match self {
            Dialect::MySql => "?".to_string(),
            Dialect::Postgres => format!("${}", n),
        }
    }

    /// Bind value interpreted as a timestamp (bounds are bound as text).
    pub fn timestamp(self, placeholder: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS DATETIME)", placeholder),
            Dialect::Postgres => format!("CAST({} AS TIMESTAMP)", placeholder),
        }
    }

    pub fn as_text(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS CHAR)", expr),
            Dialect::Postgres => format!("CAST({} AS TEXT)", expr),
        }
    }

    pub fn as_bigint(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("CAST({} AS SIGNED)", expr),
            Dialect::Postgres => format!("CAST({} AS BIGINT)", expr),
        }
    }

    /// Calendar day of a timestamp column as `YYYY-MM-DD` text.
    pub fn date_text(self, expr: &str) -> String {
        match self {
            Dialect::MySql => format!("DATE_FORMAT({}, '%Y-%m-%d')", expr),
            Dialect::Postgres => format!("to_char({}, 'YYYY-MM-DD')", expr),
        }
    }
}
