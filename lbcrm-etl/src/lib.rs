//! lbcrm-etl library - customer recency pipeline
//!
//! Reads the store's sales and customer spreadsheets, joins sales to
//! customers by normalized phone number, computes each customer's last
//! purchase and recency band, and publishes the result to the hosted store
//! (or a local SQLite mirror) plus CSV/JSON files in the data directory.

pub mod config;
pub mod error;
pub mod export;
pub mod ingest;
pub mod messages;
pub mod pipeline;
pub mod recency;
pub mod reconcile;
pub mod segment;
pub mod store;

pub use error::{EtlError, EtlResult};
