//! Top-level operations
//!
//! Each function here is one unit of work the CLI can run. `process` builds
//! everything from the input spreadsheets; the others read the stored
//! last-purchase table. `report` runs the read-side operations one after
//! another and keeps going when one of them fails.

use crate::config::Settings;
use crate::error::EtlResult;
use crate::export::{
    inactive_file_name, messages_file_name, segment_file_name, write_csv, write_json,
    IntegratedSaleRow, INTEGRATED_SALES_FILE, INTEGRATED_SALE_COLUMNS, RECENCY_COLUMNS,
    RECENCY_FILE, SEGMENT_COUNTS_FILE, STATISTICS_FILE, STORED_RECENCY_COLUMNS,
};
use crate::ingest::{load_customers, load_sales};
use crate::messages::{generate_messages, sample, OutreachMessage};
use crate::recency::{compute_recency, inactive_customers, refresh_row, RecencyStatistics};
use crate::reconcile::{reconcile, PhoneDirectory};
use crate::segment::{Segment, Segmentation};
use crate::store::{publish_snapshot, PublishError, PublishReport, RecordStore, Snapshot};
use lbcrm_common::db::{RecencyCategory, RecencyRow, SaleRow};
use lbcrm_common::time;
use std::collections::BTreeMap;
use std::future::Future;
use tracing::{error, info, warn};

/// Outcome of `process`
#[derive(Debug)]
pub struct ProcessSummary {
    pub sales: usize,
    pub customers: usize,
    pub matched_sales: usize,
    pub phone_collisions: usize,
    pub recency_rows: usize,
    pub publish: Result<PublishReport, PublishError>,
}

/// Load, reconcile, compute last purchases, publish and export
///
/// Input read failures abort. A failed publish is logged and the local
/// files are still written; the failure is kept in the summary.
pub async fn process(store: &dyn RecordStore, settings: &Settings) -> EtlResult<ProcessSummary> {
    let sales = load_sales(&settings.sales_path)?;
    let customers = load_customers(&settings.customers_path)?;

    let directory = PhoneDirectory::build(&customers);
    let sales_count = sales.len();
    let reconciled = reconcile(sales, &directory);
    let matched_sales = reconciled.iter().filter(|s| s.customer.is_some()).count();

    let recency = compute_recency(&reconciled, time::now());

    let snapshot = Snapshot::build(&customers, &reconciled, &recency);
    let publish = publish_snapshot(store, &snapshot, settings.batch_size).await;
    if let Err(e) = &publish {
        error!(
            "{} ({} customers, {} sales, {} last purchases written)",
            e, e.written.customers, e.written.sales, e.written.recency
        );
    }

    std::fs::create_dir_all(&settings.data_dir)?;
    let integrated: Vec<IntegratedSaleRow> =
        reconciled.iter().map(IntegratedSaleRow::from).collect();
    write_csv(
        &settings.output_path(INTEGRATED_SALES_FILE),
        INTEGRATED_SALE_COLUMNS,
        &integrated,
    )?;
    write_csv(&settings.output_path(RECENCY_FILE), RECENCY_COLUMNS, &recency)?;

    info!(
        "Processed {} sales ({} matched) and {} customers",
        sales_count,
        matched_sales,
        customers.len()
    );

    Ok(ProcessSummary {
        sales: sales_count,
        customers: customers.len(),
        matched_sales,
        phone_collisions: directory.collisions(),
        recency_rows: recency.len(),
        publish,
    })
}

/// Recompute elapsed days and category of every stored row
pub async fn refresh(store: &dyn RecordStore) -> EtlResult<Vec<RecencyRow>> {
    let now = time::now();
    let stamped_at = time::now_utc();
    let rows = store.fetch_recency(None).await?;
    let mut refreshed = Vec::with_capacity(rows.len());

    for row in &rows {
        let Some(id) = row.id else {
            warn!("Stored last purchase for {} has no id, skipping", row.tax_id);
            continue;
        };
        let updated = refresh_row(row, now);
        store
            .update_recency_age(id, updated.elapsed_days, updated.category, stamped_at)
            .await?;
        refreshed.push(updated);
    }

    info!("Refreshed {} last purchase rows", refreshed.len());
    Ok(refreshed)
}

/// Summary statistics, written to `estatisticas_tempo.json`
pub async fn statistics(
    store: &dyn RecordStore,
    settings: &Settings,
) -> EtlResult<RecencyStatistics> {
    let rows = store.fetch_recency(None).await?;
    let stats = RecencyStatistics::from_rows(&rows);

    std::fs::create_dir_all(&settings.data_dir)?;
    write_json(&settings.output_path(STATISTICS_FILE), &stats)?;

    info!(
        "Statistics over {} customers: mean {:?}, median {:?} days",
        stats.total_customers, stats.mean_days, stats.median_days
    );
    Ok(stats)
}

/// Customers idle for more than `threshold_days`, written to
/// `clientes_inativos_{N}_dias.csv`
pub async fn inactive(
    store: &dyn RecordStore,
    settings: &Settings,
    threshold_days: i64,
) -> EtlResult<Vec<RecencyRow>> {
    let rows = store.fetch_recency(None).await?;
    let inactive = inactive_customers(&rows, threshold_days);

    std::fs::create_dir_all(&settings.data_dir)?;
    write_csv(
        &settings.output_path(&inactive_file_name(threshold_days)),
        STORED_RECENCY_COLUMNS,
        &inactive,
    )?;

    info!(
        "{} customers without purchases for more than {} days",
        inactive.len(),
        threshold_days
    );
    Ok(inactive)
}

/// Partition stored rows into segments; one CSV per segment plus counts
pub async fn segments(store: &dyn RecordStore, settings: &Settings) -> EtlResult<Segmentation> {
    let rows = store.fetch_recency(None).await?;
    let segmentation = Segmentation::partition(&rows);

    std::fs::create_dir_all(&settings.data_dir)?;
    for (segment, members) in segmentation.iter() {
        write_csv(
            &settings.output_path(&segment_file_name(segment.key())),
            STORED_RECENCY_COLUMNS,
            members,
        )?;
    }
    let counts = segmentation.counts();
    write_json(&settings.output_path(SEGMENT_COUNTS_FILE), &counts)?;

    for (segment, count) in &counts {
        info!("Segment {}: {} customers", segment, count);
    }
    Ok(segmentation)
}

/// Generate messages for every segment and store a sample of each
pub async fn messages(
    store: &dyn RecordStore,
    settings: &Settings,
) -> EtlResult<BTreeMap<Segment, Vec<OutreachMessage>>> {
    let rows = store.fetch_recency(None).await?;
    let segmentation = Segmentation::partition(&rows);
    let messages = generate_messages(&segmentation);

    std::fs::create_dir_all(&settings.data_dir)?;
    for (segment, list) in &messages {
        let kept = sample(list, settings.sample_size);
        write_json(&settings.output_path(&messages_file_name(segment.key())), kept)?;
        info!(
            "Segment {}: {} messages generated, {} saved",
            segment,
            list.len(),
            kept.len()
        );
    }
    Ok(messages)
}

/// Stored rows, optionally of one category
pub async fn list(
    store: &dyn RecordStore,
    category: Option<RecencyCategory>,
) -> EtlResult<Vec<RecencyRow>> {
    store.fetch_recency(category).await
}

/// Stored sales of one customer, newest first
pub async fn history(store: &dyn RecordStore, customer_id: i64) -> EtlResult<Vec<SaleRow>> {
    store.fetch_sales_for_customer(customer_id).await
}

/// What each step of `report` produced; `None` marks a failed step
#[derive(Debug, Default)]
pub struct ReportSummary {
    pub refreshed: Option<usize>,
    pub statistics: Option<RecencyStatistics>,
    pub inactive: Option<usize>,
    pub segments: Option<BTreeMap<Segment, usize>>,
    pub messages: Option<usize>,
}

impl ReportSummary {
    pub fn failures(&self) -> usize {
        [
            self.refreshed.is_none(),
            self.statistics.is_none(),
            self.inactive.is_none(),
            self.segments.is_none(),
            self.messages.is_none(),
        ]
        .iter()
        .filter(|failed| **failed)
        .count()
    }
}

/// Refresh, then statistics, inactive list, segments and messages
pub async fn report(store: &dyn RecordStore, settings: &Settings) -> ReportSummary {
    let refreshed = isolated("refresh", refresh(store)).await.map(|rows| rows.len());
    let statistics = isolated("statistics", statistics(store, settings)).await;
    let inactive = isolated("inactive", inactive(store, settings, settings.inactivity_days))
        .await
        .map(|rows| rows.len());
    let segments = isolated("segments", segments(store, settings))
        .await
        .map(|s| s.counts());
    let messages = isolated("messages", messages(store, settings))
        .await
        .map(|m| m.values().map(Vec::len).sum());

    ReportSummary {
        refreshed,
        statistics,
        inactive,
        segments,
        messages,
    }
}

/// Run one operation, logging its failure instead of propagating it
async fn isolated<T, F>(name: &str, operation: F) -> Option<T>
where
    F: Future<Output = EtlResult<T>>,
{
    match operation.await {
        Ok(value) => Some(value),
        Err(e) => {
            error!("Operation '{}' failed: {}", name, e);
            None
        }
    }
}
