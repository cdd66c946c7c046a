//! Sales and customer spreadsheet loading

use crate::error::EtlResult;
use crate::ingest::excel_date::parse_date_cell;
use crate::ingest::phone::{normalize_phone_cell, NormalizedPhone};
use crate::ingest::sheet::{read_table, RawTable, RowView};
use chrono::NaiveDateTime;
use std::path::Path;
use tracing::info;

/// Columns read from the sales spreadsheet
pub const SALES_COLUMNS: [&str; 9] = [
    "data",
    "movimentacao",
    "qtde_produtos",
    "total",
    "cliente",
    "vendedor",
    "telefone",
    "custo_da_venda",
    "lucro_da_venda",
];

/// Columns read from the customer spreadsheet
pub const CUSTOMER_COLUMNS: [&str; 8] = [
    "third_id",
    "nome",
    "cpf",
    "telefone_1",
    "telefone_2",
    "telefone_3",
    "data_cadastro",
    "credito_loja",
];

const PHONE_COLUMNS: [&str; 3] = ["telefone_1", "telefone_2", "telefone_3"];

/// One sales spreadsheet row
#[derive(Debug, Clone, PartialEq)]
pub struct SaleRecord {
    pub date: Option<NaiveDateTime>,
    pub operation: Option<String>,
    pub item_count: Option<i64>,
    pub total: Option<f64>,
    /// Free-text customer label typed at the register
    pub customer_label: Option<String>,
    pub salesperson: Option<String>,
    /// Phone as typed
    pub phone: Option<String>,
    pub normalized_phone: NormalizedPhone,
    pub cost: Option<f64>,
    pub profit: Option<f64>,
}

/// One customer spreadsheet row
#[derive(Debug, Clone, PartialEq)]
pub struct CustomerRecord {
    pub external_id: Option<String>,
    pub full_name: Option<String>,
    pub tax_id: Option<String>,
    /// Phones as typed
    pub phones: [Option<String>; 3],
    pub normalized_phones: [NormalizedPhone; 3],
    pub registration_date: Option<NaiveDateTime>,
    pub store_credit: Option<f64>,
}

impl SaleRecord {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            date: parse_date_cell(row.get("data")),
            operation: row.get("movimentacao").as_text(),
            item_count: row.get("qtde_produtos").as_i64(),
            total: row.get("total").as_f64(),
            customer_label: row.get("cliente").as_text(),
            salesperson: row.get("vendedor").as_text(),
            phone: row.get("telefone").as_text(),
            normalized_phone: normalize_phone_cell(row.get("telefone")),
            cost: row.get("custo_da_venda").as_f64(),
            profit: row.get("lucro_da_venda").as_f64(),
        }
    }
}

impl CustomerRecord {
    fn from_row(row: RowView<'_>) -> Self {
        Self {
            external_id: row.get("third_id").as_text(),
            full_name: row.get("nome").as_text(),
            tax_id: row.get("cpf").as_text(),
            phones: PHONE_COLUMNS.map(|c| row.get(c).as_text()),
            normalized_phones: PHONE_COLUMNS.map(|c| normalize_phone_cell(row.get(c))),
            registration_date: parse_date_cell(row.get("data_cadastro")),
            store_credit: row.get("credito_loja").as_f64(),
        }
    }
}

/// Parse sales rows from an already-read table
pub fn sales_from_table(table: &RawTable) -> Vec<SaleRecord> {
    table
        .select(&SALES_COLUMNS)
        .rows()
        .map(SaleRecord::from_row)
        .collect()
}

/// Parse customer rows from an already-read table
pub fn customers_from_table(table: &RawTable) -> Vec<CustomerRecord> {
    table
        .select(&CUSTOMER_COLUMNS)
        .rows()
        .map(CustomerRecord::from_row)
        .collect()
}

/// Load the sales spreadsheet
pub fn load_sales(path: &Path) -> EtlResult<Vec<SaleRecord>> {
    info!("Loading sales from {}", path.display());
    let sales = sales_from_table(&read_table(path)?);
    info!("Loaded {} sales records", sales.len());
    Ok(sales)
}

/// Load the customer spreadsheet
pub fn load_customers(path: &Path) -> EtlResult<Vec<CustomerRecord>> {
    info!("Loading customers from {}", path.display());
    let customers = customers_from_table(&read_table(path)?);
    info!("Loaded {} customer records", customers.len());
    Ok(customers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::sheet::CellValue;
    use chrono::NaiveDate;

    fn text(s: &str) -> CellValue {
        CellValue::Text(s.to_string())
    }

    #[test]
    fn test_sales_from_partial_table() {
        let table = RawTable::new(
            vec!["data".into(), "total".into(), "telefone".into(), "loja".into()],
            vec![vec![
                CellValue::Number(45306.5),
                CellValue::Number(199.9),
                text("(11) 98765-4321"),
                text("Centro"),
            ]],
        );

        let sales = sales_from_table(&table);

        assert_eq!(sales.len(), 1);
        let sale = &sales[0];
        assert_eq!(
            sale.date,
            NaiveDate::from_ymd_opt(2024, 1, 15).unwrap().and_hms_opt(12, 0, 0)
        );
        assert_eq!(sale.total, Some(199.9));
        assert_eq!(sale.phone.as_deref(), Some("(11) 98765-4321"));
        assert_eq!(
            sale.normalized_phone,
            NormalizedPhone::Digits("11987654321".to_string())
        );
        assert!(sale.salesperson.is_none());
    }

    #[test]
    fn test_customers_from_table() {
        let table = RawTable::new(
            CUSTOMER_COLUMNS.iter().map(|c| c.to_string()).collect(),
            vec![vec![
                CellValue::Number(17.0),
                text("Maria Silva"),
                CellValue::Number(12345678901.0),
                text("11 98765-4321"),
                CellValue::Empty,
                text("123"),
                text("2023-05-02"),
                text("abc"),
            ]],
        );

        let customers = customers_from_table(&table);

        let customer = &customers[0];
        assert_eq!(customer.external_id.as_deref(), Some("17"));
        assert_eq!(customer.tax_id.as_deref(), Some("12345678901"));
        assert_eq!(
            customer.normalized_phones,
            [
                NormalizedPhone::Digits("11987654321".to_string()),
                NormalizedPhone::Missing,
                NormalizedPhone::Invalid,
            ]
        );
        assert_eq!(
            customer.registration_date,
            NaiveDate::from_ymd_opt(2023, 5, 2).unwrap().and_hms_opt(0, 0, 0)
        );
        assert_eq!(customer.store_credit, None);
    }
}
