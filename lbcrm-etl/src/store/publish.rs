//! Snapshot publish: replace the stored tables with a fresh computation
//!
//! Clearing and inserting are separate requests with no transaction around
//! them. When a step fails the error names the stage that was running and
//! what had been written up to that point, so a half-populated store is
//! visible to the caller.

use crate::error::EtlError;
use crate::ingest::CustomerRecord;
use crate::reconcile::ReconciledSale;
use crate::store::RecordStore;
use lbcrm_common::db::{CustomerRow, RecencyRow, SaleRow, Table};
use std::collections::HashSet;
use std::fmt;
use thiserror::Error;
use tracing::{debug, info, warn};

/// A sale waiting for its customer's stored id
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSale {
    pub tax_id: String,
    pub row: SaleRow,
}

/// Everything one run publishes
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub customers: Vec<CustomerRow>,
    pub sales: Vec<PendingSale>,
    pub recency: Vec<RecencyRow>,
}

impl Snapshot {
    /// Select the publishable rows
    ///
    /// Customers need a tax id (first row wins on duplicates); sales need a
    /// date and a resolved customer.
    pub fn build(
        customers: &[CustomerRecord],
        sales: &[ReconciledSale],
        recency: &[RecencyRow],
    ) -> Self {
        let mut seen = HashSet::new();
        let mut customer_rows = Vec::new();

        for customer in customers {
            let Some(tax_id) = customer.tax_id.as_deref().filter(|t| !t.is_empty()) else {
                debug!(name = ?customer.full_name, "Customer without tax id not published");
                continue;
            };
            if !seen.insert(tax_id.to_string()) {
                warn!("Duplicate customer tax id {}, keeping the first row", tax_id);
                continue;
            }
            customer_rows.push(customer_row(tax_id, customer));
        }

        let sale_rows: Vec<PendingSale> = sales
            .iter()
            .filter_map(|sale| {
                let date = sale.sale.date?;
                let tax_id = sale.tax_id()?;
                Some(PendingSale {
                    tax_id: tax_id.to_string(),
                    row: SaleRow {
                        id: None,
                        date,
                        operation: sale.sale.operation.clone(),
                        item_count: sale.sale.item_count.unwrap_or(0),
                        total: sale.sale.total.unwrap_or(0.0),
                        customer_id: None,
                        customer_label: sale.sale.customer_label.clone(),
                        salesperson: sale.sale.salesperson.clone(),
                        phone: sale.sale.phone.clone(),
                        cost: sale.sale.cost.unwrap_or(0.0),
                        profit: sale.sale.profit.unwrap_or(0.0),
                    },
                })
            })
            .collect();

        Self {
            customers: customer_rows,
            sales: sale_rows,
            recency: recency.to_vec(),
        }
    }
}

fn customer_row(tax_id: &str, customer: &CustomerRecord) -> CustomerRow {
    let [phone_1, phone_2, phone_3] = customer.phones.clone();
    CustomerRow {
        id: None,
        external_id: customer.external_id.clone(),
        full_name: customer.full_name.clone().unwrap_or_default(),
        tax_id: tax_id.to_string(),
        phone_1,
        phone_2,
        phone_3,
        registration_date: customer.registration_date,
        store_credit: customer.store_credit.unwrap_or(0.0),
    }
}

/// Step of a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishStage {
    Clearing,
    InsertingCustomers,
    ResolvingIds,
    InsertingSales,
    InsertingRecency,
}

impl fmt::Display for PublishStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            PublishStage::Clearing => "clearing tables",
            PublishStage::InsertingCustomers => "inserting customers",
            PublishStage::ResolvingIds => "resolving customer ids",
            PublishStage::InsertingSales => "inserting sales",
            PublishStage::InsertingRecency => "inserting last purchases",
        };
        f.write_str(text)
    }
}

/// Rows written by a publish
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PublishReport {
    pub customers: usize,
    pub sales: usize,
    pub recency: usize,
    pub batches: usize,
    /// Rows dropped because their customer had no stored id
    pub skipped_sales: usize,
    pub skipped_recency: usize,
}

/// Publish failure with the stage reached and partial counts
#[derive(Debug, Error)]
#[error("Snapshot publish failed while {stage}: {source}")]
pub struct PublishError {
    pub stage: PublishStage,
    pub written: PublishReport,
    #[source]
    pub source: EtlError,
}

impl PublishError {
    fn at(stage: PublishStage, written: &PublishReport) -> impl FnOnce(EtlError) -> Self + '_ {
        move |source| Self {
            stage,
            written: written.clone(),
            source,
        }
    }
}

/// Clear the three tables and insert the snapshot in batches
pub async fn publish_snapshot(
    store: &dyn RecordStore,
    snapshot: &Snapshot,
    batch_size: usize,
) -> Result<PublishReport, PublishError> {
    let batch_size = batch_size.max(1);
    let mut report = PublishReport::default();

    info!(
        backend = store.backend_name(),
        customers = snapshot.customers.len(),
        sales = snapshot.sales.len(),
        recency = snapshot.recency.len(),
        "Publishing snapshot"
    );

    for table in Table::CLEAR_ORDER {
        store
            .clear(table)
            .await
            .map_err(PublishError::at(PublishStage::Clearing, &report))?;
        debug!("Cleared {}", table.name());
    }

    for (i, batch) in snapshot.customers.chunks(batch_size).enumerate() {
        store
            .insert_customers(batch)
            .await
            .map_err(PublishError::at(PublishStage::InsertingCustomers, &report))?;
        report.customers += batch.len();
        report.batches += 1;
        info!("Inserted {} customers (batch {})", batch.len(), i + 1);
    }

    let ids = store
        .customer_ids()
        .await
        .map_err(PublishError::at(PublishStage::ResolvingIds, &report))?;

    let mut sales = Vec::with_capacity(snapshot.sales.len());
    for pending in &snapshot.sales {
        match ids.get(&pending.tax_id) {
            Some(&id) => sales.push(SaleRow {
                customer_id: Some(id),
                ..pending.row.clone()
            }),
            None => report.skipped_sales += 1,
        }
    }

    for (i, batch) in sales.chunks(batch_size).enumerate() {
        store
            .insert_sales(batch)
            .await
            .map_err(PublishError::at(PublishStage::InsertingSales, &report))?;
        report.sales += batch.len();
        report.batches += 1;
        info!("Inserted {} sales (batch {})", batch.len(), i + 1);
    }

    let mut recency = Vec::with_capacity(snapshot.recency.len());
    for row in &snapshot.recency {
        match ids.get(&row.tax_id) {
            Some(&id) => recency.push(RecencyRow {
                id: None,
                customer_id: Some(id),
                ..row.clone()
            }),
            None => report.skipped_recency += 1,
        }
    }

    for (i, batch) in recency.chunks(batch_size).enumerate() {
        store
            .insert_recency(batch)
            .await
            .map_err(PublishError::at(PublishStage::InsertingRecency, &report))?;
        report.recency += batch.len();
        report.batches += 1;
        info!("Inserted {} last purchase rows (batch {})", batch.len(), i + 1);
    }

    if report.skipped_sales > 0 || report.skipped_recency > 0 {
        warn!(
            "Rows without a stored customer skipped: {} sales, {} last purchases",
            report.skipped_sales, report.skipped_recency
        );
    }

    info!(
        "Snapshot published: {} customers, {} sales, {} last purchases in {} batches",
        report.customers, report.sales, report.recency, report.batches
    );
    Ok(report)
}
