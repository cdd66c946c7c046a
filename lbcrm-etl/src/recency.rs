//! Last purchase per customer and recency statistics

use crate::reconcile::ReconciledSale;
use chrono::NaiveDateTime;
use lbcrm_common::db::{RecencyCategory, RecencyRow};
use lbcrm_common::time::elapsed_days;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use tracing::info;

/// Latest sale per resolved customer, ordered by tax id
///
/// Sales without a resolved tax id are skipped. Among a customer's sales the
/// latest date wins; ties keep the earlier input row and undated sales are
/// only picked when no sale has a date.
pub fn compute_recency(sales: &[ReconciledSale], now: NaiveDateTime) -> Vec<RecencyRow> {
    let mut latest: BTreeMap<&str, &ReconciledSale> = BTreeMap::new();

    for sale in sales {
        let Some(tax_id) = sale.tax_id() else {
            continue;
        };
        latest
            .entry(tax_id)
            .and_modify(|current| {
                if is_later(sale.sale.date, current.sale.date) {
                    *current = sale;
                }
            })
            .or_insert(sale);
    }

    let rows: Vec<RecencyRow> = latest
        .into_iter()
        .map(|(tax_id, sale)| recency_row(tax_id, sale, now))
        .collect();

    info!("Computed last purchase for {} customers", rows.len());
    rows
}

/// Strictly later; any date beats a missing one
fn is_later(candidate: Option<NaiveDateTime>, current: Option<NaiveDateTime>) -> bool {
    match (candidate, current) {
        (Some(c), Some(cur)) => c > cur,
        (Some(_), None) => true,
        (None, _) => false,
    }
}

fn recency_row(tax_id: &str, sale: &ReconciledSale, now: NaiveDateTime) -> RecencyRow {
    let customer_name = sale
        .customer
        .as_ref()
        .and_then(|c| c.full_name.clone())
        .or_else(|| sale.sale.customer_label.clone())
        .unwrap_or_default();
    let elapsed = sale.sale.date.map(|date| elapsed_days(now, date));

    RecencyRow {
        id: None,
        customer_id: None,
        customer_name,
        tax_id: tax_id.to_string(),
        last_purchase: sale.sale.date,
        elapsed_days: elapsed,
        category: RecencyCategory::from_elapsed(elapsed),
        last_total: sale.sale.total.unwrap_or(0.0),
    }
}

/// Recompute elapsed days and category against `now`
pub fn refresh_row(row: &RecencyRow, now: NaiveDateTime) -> RecencyRow {
    let elapsed = row.last_purchase.map(|date| elapsed_days(now, date));
    RecencyRow {
        elapsed_days: elapsed,
        category: RecencyCategory::from_elapsed(elapsed),
        ..row.clone()
    }
}

/// Customers idle for strictly more than `threshold_days`, longest idle first
pub fn inactive_customers(rows: &[RecencyRow], threshold_days: i64) -> Vec<RecencyRow> {
    let mut inactive: Vec<RecencyRow> = rows
        .iter()
        .filter(|r| r.elapsed_days.is_some_and(|d| d > threshold_days))
        .cloned()
        .collect();
    inactive.sort_by_key(|r| Reverse(r.elapsed_days));
    inactive
}

/// Summary of stored recency rows
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecencyStatistics {
    #[serde(rename = "total_clientes")]
    pub total_customers: usize,
    #[serde(rename = "media_dias_desde_ultima_compra")]
    pub mean_days: Option<f64>,
    #[serde(rename = "mediana_dias_desde_ultima_compra")]
    pub median_days: Option<f64>,
    #[serde(rename = "max_dias_desde_ultima_compra")]
    pub max_days: Option<i64>,
    #[serde(rename = "min_dias_desde_ultima_compra")]
    pub min_days: Option<i64>,
    #[serde(rename = "distribuicao_por_categoria")]
    pub by_category: BTreeMap<RecencyCategory, usize>,
}

impl RecencyStatistics {
    /// Undefined elapsed days are left out of the day figures but still
    /// counted in the total and the distribution.
    pub fn from_rows(rows: &[RecencyRow]) -> Self {
        let mut days: Vec<i64> = rows.iter().filter_map(|r| r.elapsed_days).collect();
        days.sort_unstable();

        let mut by_category = BTreeMap::new();
        for row in rows {
            *by_category.entry(row.category).or_insert(0) += 1;
        }

        let mean_days = (!days.is_empty())
            .then(|| days.iter().sum::<i64>() as f64 / days.len() as f64);

        Self {
            total_customers: rows.len(),
            mean_days,
            median_days: median(&days),
            max_days: days.last().copied(),
            min_days: days.first().copied(),
            by_category,
        }
    }
}

fn median(sorted: &[i64]) -> Option<f64> {
    let n = sorted.len();
    match n {
        0 => None,
        _ if n % 2 == 1 => Some(sorted[n / 2] as f64),
        _ => Some((sorted[n / 2 - 1] + sorted[n / 2]) as f64 / 2.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::{NormalizedPhone, SaleRecord};
    use crate::reconcile::CustomerIdentity;
    use chrono::{NaiveDate, TimeDelta};

    fn at(y: i32, m: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(10, 0, 0)
            .unwrap()
    }

    fn sale(tax_id: Option<&str>, date: Option<NaiveDateTime>, total: f64) -> ReconciledSale {
        ReconciledSale {
            sale: SaleRecord {
                date,
                operation: None,
                item_count: None,
                total: Some(total),
                customer_label: Some("balcão".to_string()),
                salesperson: None,
                phone: None,
                normalized_phone: NormalizedPhone::Missing,
                cost: None,
                profit: None,
            },
            customer: tax_id.map(|t| CustomerIdentity {
                external_id: None,
                full_name: Some(format!("Cliente {}", t)),
                tax_id: Some(t.to_string()),
                registration_date: None,
                store_credit: 0.0,
            }),
        }
    }

    fn row(elapsed: Option<i64>) -> RecencyRow {
        RecencyRow {
            id: None,
            customer_id: None,
            customer_name: String::new(),
            tax_id: format!("{:?}", elapsed),
            last_purchase: None,
            elapsed_days: elapsed,
            category: RecencyCategory::from_elapsed(elapsed),
            last_total: 0.0,
        }
    }

    #[test]
    fn test_latest_of_three_sales_selected() {
        let now = at(2024, 6, 1) + TimeDelta::hours(5);
        let d1 = at(2024, 1, 10);
        let d2 = at(2024, 3, 5);
        let d3 = at(2024, 4, 20);
        let sales = vec![
            sale(Some("111"), Some(d2), 20.0),
            sale(Some("111"), Some(d3), 30.0),
            sale(Some("111"), Some(d1), 10.0),
        ];

        let rows = compute_recency(&sales, now);

        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].last_purchase, Some(d3));
        assert_eq!(rows[0].elapsed_days, Some((now - d3).num_days()));
        assert_eq!(rows[0].elapsed_days, Some(42));
        assert_eq!(rows[0].category, RecencyCategory::Days31To60);
        assert_eq!(rows[0].last_total, 30.0);
        assert_eq!(rows[0].customer_name, "Cliente 111");
    }

    #[test]
    fn test_unresolved_sales_excluded_and_sorted_by_tax_id() {
        let now = at(2024, 6, 1);
        let sales = vec![
            sale(Some("222"), Some(at(2024, 5, 1)), 1.0),
            sale(None, Some(at(2024, 5, 30)), 1.0),
            sale(Some("111"), Some(at(2024, 5, 2)), 1.0),
        ];

        let rows = compute_recency(&sales, now);

        let ids: Vec<&str> = rows.iter().map(|r| r.tax_id.as_str()).collect();
        assert_eq!(ids, vec!["111", "222"]);
    }

    #[test]
    fn test_undated_sales_rank_last() {
        let now = at(2024, 6, 1);
        let sales = vec![
            sale(Some("111"), None, 5.0),
            sale(Some("111"), Some(at(2024, 5, 1)), 7.0),
        ];

        let rows = compute_recency(&sales, now);

        assert_eq!(rows[0].last_total, 7.0);
        assert_eq!(rows[0].elapsed_days, Some(31));
    }

    #[test]
    fn test_only_undated_sales_is_no_purchases() {
        let rows = compute_recency(&[sale(Some("111"), None, 5.0)], at(2024, 6, 1));

        assert_eq!(rows[0].elapsed_days, None);
        assert_eq!(rows[0].category, RecencyCategory::NoPurchases);
    }

    #[test]
    fn test_tie_keeps_first_row() {
        let date = at(2024, 5, 1);
        let sales = vec![
            sale(Some("111"), Some(date), 1.0),
            sale(Some("111"), Some(date), 2.0),
        ];

        let rows = compute_recency(&sales, at(2024, 6, 1));

        assert_eq!(rows[0].last_total, 1.0);
    }

    #[test]
    fn test_refresh_recomputes_age() {
        let mut stored = compute_recency(&[sale(Some("111"), Some(at(2024, 5, 1)), 1.0)], at(2024, 5, 2));
        stored[0].id = Some(9);
        assert_eq!(stored[0].category, RecencyCategory::Last30Days);

        let refreshed = refresh_row(&stored[0], at(2024, 8, 1));

        assert_eq!(refreshed.id, Some(9));
        assert_eq!(refreshed.elapsed_days, Some(92));
        assert_eq!(refreshed.category, RecencyCategory::Days91To180);
    }

    #[test]
    fn test_inactive_customers_sorted_descending() {
        let rows = vec![row(Some(95)), row(None), row(Some(90)), row(Some(400)), row(Some(10))];

        let inactive = inactive_customers(&rows, 90);

        let days: Vec<Option<i64>> = inactive.iter().map(|r| r.elapsed_days).collect();
        assert_eq!(days, vec![Some(400), Some(95)]);
    }

    #[test]
    fn test_statistics() {
        let rows = vec![row(Some(10)), row(Some(40)), row(Some(100)), row(None)];

        let stats = RecencyStatistics::from_rows(&rows);

        assert_eq!(stats.total_customers, 4);
        assert_eq!(stats.mean_days, Some(50.0));
        assert_eq!(stats.median_days, Some(40.0));
        assert_eq!(stats.max_days, Some(100));
        assert_eq!(stats.min_days, Some(10));
        assert_eq!(stats.by_category[&RecencyCategory::NoPurchases], 1);
        assert_eq!(stats.by_category[&RecencyCategory::Last30Days], 1);

        let json = serde_json::to_value(&stats).unwrap();
        assert_eq!(json["total_clientes"], 4);
        assert_eq!(json["distribuicao_por_categoria"]["31-60 dias"], 1);
    }

    #[test]
    fn test_statistics_even_median_and_empty() {
        let stats = RecencyStatistics::from_rows(&[row(Some(10)), row(Some(20))]);
        assert_eq!(stats.median_days, Some(15.0));

        let empty = RecencyStatistics::from_rows(&[]);
        assert_eq!(empty.total_customers, 0);
        assert_eq!(empty.mean_days, None);
        assert_eq!(empty.max_days, None);
    }
}
