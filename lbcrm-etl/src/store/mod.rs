//! Record stores
//!
//! [`RecordStore`] abstracts the three persisted tables. Two backends exist:
//! the hosted PostgREST store and a local SQLite mirror. Schema migration is
//! an explicit startup step; data is replaced wholesale by
//! [`publish_snapshot`].

mod postgrest;
mod publish;
mod sqlite;

pub use postgrest::PostgrestStore;
pub use publish::{
    publish_snapshot, PendingSale, PublishError, PublishReport, PublishStage, Snapshot,
};
pub use sqlite::SqliteStore;

use crate::error::EtlResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lbcrm_common::db::{CustomerRow, RecencyCategory, RecencyRow, SaleRow, Table};
use std::collections::HashMap;

/// Default rows per insert request
pub const DEFAULT_BATCH_SIZE: usize = 100;

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend name for logs
    fn backend_name(&self) -> &'static str;

    /// Create missing tables; idempotent
    async fn migrate(&self) -> EtlResult<()>;

    /// Delete every row of a table
    async fn clear(&self, table: Table) -> EtlResult<()>;

    async fn insert_customers(&self, rows: &[CustomerRow]) -> EtlResult<()>;

    /// Stored customer ids keyed by tax id
    async fn customer_ids(&self) -> EtlResult<HashMap<String, i64>>;

    async fn insert_sales(&self, rows: &[SaleRow]) -> EtlResult<()>;

    async fn insert_recency(&self, rows: &[RecencyRow]) -> EtlResult<()>;

    /// Recency rows, optionally of one category, by elapsed days ascending
    /// with undefined values last
    async fn fetch_recency(&self, category: Option<RecencyCategory>) -> EtlResult<Vec<RecencyRow>>;

    /// Overwrite the age columns of one recency row
    async fn update_recency_age(
        &self,
        id: i64,
        elapsed_days: Option<i64>,
        category: RecencyCategory,
        updated_at: DateTime<Utc>,
    ) -> EtlResult<()>;

    /// Sales of one customer, newest first
    async fn fetch_sales_for_customer(&self, customer_id: i64) -> EtlResult<Vec<SaleRow>>;
}
