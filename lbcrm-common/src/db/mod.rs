//! Database models, schemas and local mirror setup

pub mod init;
pub mod migrations;
pub mod models;
pub mod schema_sync;
pub mod table_schemas;

pub use init::*;
pub use models::*;
pub use schema_sync::{Dialect, TableSchema};
pub use table_schemas::{migration_statements, Table};
