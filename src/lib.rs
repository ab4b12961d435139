//! Periodic aggregation reporter: library crate.
//!
//! Query → Fetch → Aggregate → Cache over GLPI tickets and payment
//! transactions, plus the HTTP surface and refresh job the binary runs.

pub mod aggregate;
pub mod api;
pub mod cache;
pub mod config;
pub mod errors;
pub mod jobs;
pub mod metrics;
pub mod models;
pub mod query;
pub mod report;
pub mod store;
