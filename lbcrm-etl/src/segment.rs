//! Five-band customer segmentation for outreach
//!
//! Bands are coarser than the display categories: 0-30, 31-90, 91-180,
//! 181-365 and over 365 days. Lower bounds are strict, upper bounds
//! inclusive. Rows with undefined elapsed days belong to no band.

use lbcrm_common::db::RecencyRow;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use tracing::debug;

/// Outreach segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Segment {
    #[serde(rename = "ativos_recentes")]
    RecentlyActive,
    #[serde(rename = "ativos")]
    Active,
    #[serde(rename = "em_risco")]
    AtRisk,
    #[serde(rename = "inativos")]
    Inactive,
    #[serde(rename = "perdidos")]
    Lost,
}

impl Segment {
    /// Band order
    pub const ALL: [Segment; 5] = [
        Segment::RecentlyActive,
        Segment::Active,
        Segment::AtRisk,
        Segment::Inactive,
        Segment::Lost,
    ];

    /// Band for an elapsed-day count; future-dated purchases count as recent
    pub fn for_elapsed(elapsed_days: Option<i64>) -> Option<Segment> {
        let days = elapsed_days?;
        Some(match days {
            d if d <= 30 => Segment::RecentlyActive,
            d if d <= 90 => Segment::Active,
            d if d <= 180 => Segment::AtRisk,
            d if d <= 365 => Segment::Inactive,
            _ => Segment::Lost,
        })
    }

    /// Key used in output file names and JSON
    pub fn key(&self) -> &'static str {
        match self {
            Segment::RecentlyActive => "ativos_recentes",
            Segment::Active => "ativos",
            Segment::AtRisk => "em_risco",
            Segment::Inactive => "inativos",
            Segment::Lost => "perdidos",
        }
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.key())
    }
}

/// Recency rows partitioned into the five bands
#[derive(Debug, Clone, PartialEq)]
pub struct Segmentation {
    members: BTreeMap<Segment, Vec<RecencyRow>>,
    unassigned: usize,
}

impl Segmentation {
    /// Partition rows, keeping input order inside each band
    pub fn partition(rows: &[RecencyRow]) -> Self {
        let mut members: BTreeMap<Segment, Vec<RecencyRow>> =
            Segment::ALL.iter().map(|s| (*s, Vec::new())).collect();
        let mut unassigned = 0;

        for row in rows {
            match Segment::for_elapsed(row.elapsed_days) {
                Some(segment) => members.entry(segment).or_default().push(row.clone()),
                None => unassigned += 1,
            }
        }

        if unassigned > 0 {
            debug!("{} customers without elapsed days left out of segments", unassigned);
        }

        Self { members, unassigned }
    }

    pub fn members(&self, segment: Segment) -> &[RecencyRow] {
        self.members.get(&segment).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Member count per band, all five bands present
    pub fn counts(&self) -> BTreeMap<Segment, usize> {
        self.members.iter().map(|(s, rows)| (*s, rows.len())).collect()
    }

    /// Rows that fell into no band
    pub fn unassigned(&self) -> usize {
        self.unassigned
    }

    /// Bands in order with their members
    pub fn iter(&self) -> impl Iterator<Item = (Segment, &[RecencyRow])> {
        self.members.iter().map(|(s, rows)| (*s, rows.as_slice()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lbcrm_common::db::RecencyCategory;

    fn row(elapsed: Option<i64>) -> RecencyRow {
        RecencyRow {
            id: None,
            customer_id: None,
            customer_name: String::new(),
            tax_id: String::new(),
            last_purchase: None,
            elapsed_days: elapsed,
            category: RecencyCategory::from_elapsed(elapsed),
            last_total: 0.0,
        }
    }

    #[test]
    fn test_reference_values() {
        let expected = [
            (10, Segment::RecentlyActive),
            (45, Segment::Active),
            (95, Segment::AtRisk),
            (200, Segment::Inactive),
            (400, Segment::Lost),
        ];
        for (days, segment) in expected {
            assert_eq!(Segment::for_elapsed(Some(days)), Some(segment));
        }
    }

    #[test]
    fn test_band_boundaries() {
        assert_eq!(Segment::for_elapsed(Some(30)), Some(Segment::RecentlyActive));
        assert_eq!(Segment::for_elapsed(Some(31)), Some(Segment::Active));
        assert_eq!(Segment::for_elapsed(Some(90)), Some(Segment::Active));
        assert_eq!(Segment::for_elapsed(Some(91)), Some(Segment::AtRisk));
        assert_eq!(Segment::for_elapsed(Some(180)), Some(Segment::AtRisk));
        assert_eq!(Segment::for_elapsed(Some(181)), Some(Segment::Inactive));
        assert_eq!(Segment::for_elapsed(Some(365)), Some(Segment::Inactive));
        assert_eq!(Segment::for_elapsed(Some(366)), Some(Segment::Lost));
        assert_eq!(Segment::for_elapsed(Some(-3)), Some(Segment::RecentlyActive));
    }

    #[test]
    fn test_undefined_excluded_from_all_bands() {
        let rows: Vec<RecencyRow> = [Some(10), Some(45), Some(95), Some(200), Some(400), None]
            .into_iter()
            .map(row)
            .collect();

        let segmentation = Segmentation::partition(&rows);

        assert_eq!(segmentation.unassigned(), 1);
        let counts = segmentation.counts();
        assert_eq!(counts.len(), 5);
        assert!(counts.values().all(|&c| c == 1));
        assert_eq!(counts.values().sum::<usize>(), 5);
    }

    #[test]
    fn test_counts_serialize_in_band_order() {
        let segmentation = Segmentation::partition(&[row(Some(400))]);

        let json = serde_json::to_string(&segmentation.counts()).unwrap();

        assert_eq!(
            json,
            r#"{"ativos_recentes":0,"ativos":0,"em_risco":0,"inativos":0,"perdidos":1}"#
        );
    }
}
