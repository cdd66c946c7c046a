//! # Lui Bambini CRM Common Library
//!
//! Shared code for the recency pipeline crates including:
//! - Database row models and recency categories
//! - Declarative table schemas (hosted store and local SQLite mirror)
//! - Local database initialization and migrations
//! - Configuration loading
//! - Time helpers

pub mod config;
pub mod db;
pub mod error;
pub mod time;

pub use error::{Error, Result};
