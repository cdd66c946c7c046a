//! Tabular input reading
//!
//! Spreadsheets (`.xlsx`, `.xls`, `.ods`) are read with calamine, `.csv`
//! files with the csv crate. Both produce a [`RawTable`]: a header row plus
//! loosely typed cells. Only the first worksheet is read.

use crate::error::{EtlError, EtlResult};
use calamine::{open_workbook_auto, Data, Reader};
use std::path::Path;
use tracing::{debug, warn};

/// One input cell
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Number(f64),
    Text(String),
    Bool(bool),
}

impl CellValue {
    pub fn is_empty(&self) -> bool {
        match self {
            CellValue::Empty => true,
            CellValue::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Cell rendered as text; `None` for empty cells
    ///
    /// Integral numbers render without a fractional part, so a phone or tax
    /// id stored as a number reads back as its digits.
    pub fn as_text(&self) -> Option<String> {
        match self {
            CellValue::Empty => None,
            CellValue::Text(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            CellValue::Number(n) => Some(render_number(*n)),
            CellValue::Bool(b) => Some(b.to_string()),
        }
    }

    /// Numeric value; text holding a number (dot or comma decimal) also counts
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) if n.is_finite() => Some(*n),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<f64>()
                    .ok()
                    .or_else(|| trimmed.replace(',', ".").parse::<f64>().ok())
                    .filter(|n| n.is_finite())
            }
            _ => None,
        }
    }

    /// Integer value, truncating any fractional part
    pub fn as_i64(&self) -> Option<i64> {
        self.as_f64().map(|n| n.trunc() as i64)
    }
}

/// Render a number the way a spreadsheet user typed it
pub fn render_number(n: f64) -> String {
    if n.is_finite() && n.fract() == 0.0 && n.abs() < 1e15 {
        format!("{:.0}", n)
    } else {
        n.to_string()
    }
}

impl From<&Data> for CellValue {
    fn from(data: &Data) -> Self {
        match data {
            Data::Int(i) => CellValue::Number(*i as f64),
            Data::Float(f) => CellValue::Number(*f),
            Data::String(s) => CellValue::Text(s.clone()),
            Data::Bool(b) => CellValue::Bool(*b),
            Data::DateTime(dt) => CellValue::Number(dt.as_f64()),
            Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::Text(s.clone()),
            Data::Error(_) | Data::Empty => CellValue::Empty,
        }
    }
}

/// Header row plus data rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    columns: Vec<String>,
    rows: Vec<Vec<CellValue>>,
}

impl RawTable {
    /// Build from a header and rows; fully empty rows are dropped
    pub fn new(columns: Vec<String>, rows: Vec<Vec<CellValue>>) -> Self {
        let columns = columns
            .into_iter()
            .map(|c| c.trim_start_matches('\u{feff}').trim().to_string())
            .collect();
        let rows = rows
            .into_iter()
            .filter(|row| !row.iter().all(CellValue::is_empty))
            .collect();
        Self { columns, rows }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Keep only the expected columns that are present, in expected order
    ///
    /// Missing expected columns are logged and read as empty cells afterwards.
    pub fn select(&self, expected: &[&str]) -> RawTable {
        let mut columns = Vec::new();
        let mut indices = Vec::new();

        for name in expected {
            match self.columns.iter().position(|c| c == name) {
                Some(index) => {
                    columns.push(name.to_string());
                    indices.push(index);
                }
                None => warn!("Input column '{}' not found, ignoring", name),
            }
        }

        let rows = self
            .rows
            .iter()
            .map(|row| {
                indices
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(CellValue::Empty))
                    .collect()
            })
            .collect();

        RawTable { columns, rows }
    }

    /// Iterate rows with by-name access
    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        self.rows.iter().map(move |cells| RowView {
            columns: &self.columns,
            cells,
        })
    }
}

/// Borrowed row with lookup by column name
#[derive(Debug, Clone, Copy)]
pub struct RowView<'a> {
    columns: &'a [String],
    cells: &'a [CellValue],
}

impl<'a> RowView<'a> {
    /// Cell under `column`; `Empty` when the column or cell is absent
    pub fn get(&self, column: &str) -> &'a CellValue {
        const EMPTY: &CellValue = &CellValue::Empty;
        self.columns
            .iter()
            .position(|c| c == column)
            .and_then(|i| self.cells.get(i))
            .unwrap_or(EMPTY)
    }
}

/// Read the first sheet of a spreadsheet, or a CSV file, into a table
pub fn read_table(path: &Path) -> EtlResult<RawTable> {
    let extension = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    let table = match extension.as_deref() {
        Some("csv") => read_csv(path)?,
        _ => read_workbook(path)?,
    };

    debug!(
        "Read {} rows, columns {:?} from {}",
        table.len(),
        table.columns(),
        path.display()
    );
    Ok(table)
}

fn read_workbook(path: &Path) -> EtlResult<RawTable> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| EtlError::Spreadsheet(format!("{}: {}", path.display(), e)))?;

    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| EtlError::Spreadsheet(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| EtlError::Spreadsheet(format!("{}: {}", path.display(), e)))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .map(|cell| CellValue::from(cell).as_text().unwrap_or_default())
            .collect(),
        None => return Ok(RawTable::default()),
    };

    let data = rows
        .map(|cells| cells.iter().map(CellValue::from).collect())
        .collect();

    Ok(RawTable::new(header, data))
}

fn read_csv(path: &Path) -> EtlResult<RawTable> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_path(path)?;

    let header = reader.headers()?.iter().map(str::to_string).collect();

    let mut data = Vec::new();
    for record in reader.records() {
        let record = record?;
        data.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::Text(field.to_string())
                    }
                })
                .collect(),
        );
    }

    Ok(RawTable::new(header, data))
}
