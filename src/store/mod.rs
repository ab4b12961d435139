pub mod database;
pub mod fetcher;

pub use database::{Database, PoolSettings};
pub use fetcher::{Fetcher, SqlFetcher};
