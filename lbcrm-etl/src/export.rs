//! Local CSV and JSON snapshots
//!
//! CSV files start with a UTF-8 byte order mark so spreadsheet tools pick
//! the right encoding for accented names.

use crate::error::EtlResult;
use crate::reconcile::ReconciledSale;
use chrono::NaiveDateTime;
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use tracing::info;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Integrated sales file name
pub const INTEGRATED_SALES_FILE: &str = "dados_integrados.csv";
/// Computed last purchase file name
pub const RECENCY_FILE: &str = "ultima_compra.csv";
/// Statistics file name
pub const STATISTICS_FILE: &str = "estatisticas_tempo.json";
/// Segment counts file name
pub const SEGMENT_COUNTS_FILE: &str = "segmentos_clientes.json";

/// Columns of a computed last purchase row
pub const RECENCY_COLUMNS: &[&str] = &[
    "cliente_id",
    "cliente_nome",
    "cliente_cpf",
    "data_ultima_compra",
    "dias_desde_ultima_compra",
    "categoria_tempo",
    "total_ultima_compra",
];

/// Columns of a stored last purchase row, which carries its id
pub const STORED_RECENCY_COLUMNS: &[&str] = &[
    "id",
    "cliente_id",
    "cliente_nome",
    "cliente_cpf",
    "data_ultima_compra",
    "dias_desde_ultima_compra",
    "categoria_tempo",
    "total_ultima_compra",
];

/// Columns of `dados_integrados.csv`
pub const INTEGRATED_SALE_COLUMNS: &[&str] = &[
    "data",
    "movimentacao",
    "qtde_produtos",
    "total",
    "cliente",
    "vendedor",
    "telefone",
    "custo_da_venda",
    "lucro_da_venda",
    "telefone_limpo",
    "cliente_id",
    "cliente_nome_completo",
    "cliente_cpf",
    "cliente_data_cadastro",
    "cliente_credito_loja",
];

pub fn inactive_file_name(days: i64) -> String {
    format!("clientes_inativos_{}_dias.csv", days)
}

pub fn segment_file_name(segment_key: &str) -> String {
    format!("segmento_{}.csv", segment_key)
}

pub fn messages_file_name(segment_key: &str) -> String {
    format!("mensagens_{}.json", segment_key)
}

/// One row of `dados_integrados.csv`: the sale plus its matched customer
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct IntegratedSaleRow {
    pub data: Option<NaiveDateTime>,
    pub movimentacao: Option<String>,
    pub qtde_produtos: Option<i64>,
    pub total: Option<f64>,
    pub cliente: Option<String>,
    pub vendedor: Option<String>,
    pub telefone: Option<String>,
    pub custo_da_venda: Option<f64>,
    pub lucro_da_venda: Option<f64>,
    pub telefone_limpo: Option<String>,
    pub cliente_id: Option<String>,
    pub cliente_nome_completo: Option<String>,
    pub cliente_cpf: Option<String>,
    pub cliente_data_cadastro: Option<NaiveDateTime>,
    pub cliente_credito_loja: Option<f64>,
}

impl From<&ReconciledSale> for IntegratedSaleRow {
    fn from(reconciled: &ReconciledSale) -> Self {
        let sale = &reconciled.sale;
        let customer = reconciled.customer.as_ref();
        Self {
            data: sale.date,
            movimentacao: sale.operation.clone(),
            qtde_produtos: sale.item_count,
            total: sale.total,
            cliente: sale.customer_label.clone(),
            vendedor: sale.salesperson.clone(),
            telefone: sale.phone.clone(),
            custo_da_venda: sale.cost,
            lucro_da_venda: sale.profit,
            telefone_limpo: sale.normalized_phone.digits().map(str::to_string),
            cliente_id: customer.and_then(|c| c.external_id.clone()),
            cliente_nome_completo: customer.and_then(|c| c.full_name.clone()),
            cliente_cpf: customer.and_then(|c| c.tax_id.clone()),
            cliente_data_cadastro: customer.and_then(|c| c.registration_date),
            cliente_credito_loja: customer.map(|c| c.store_credit),
        }
    }
}

/// Write rows as a BOM-prefixed CSV file with a header row
///
/// The header comes from the first serialized row; `columns` is written
/// instead when there are no rows.
pub fn write_csv<T: Serialize>(path: &Path, columns: &[&str], rows: &[T]) -> EtlResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    file.write_all(UTF8_BOM)?;

    let mut writer = csv::Writer::from_writer(file);
    if rows.is_empty() {
        writer.write_record(columns)?;
    }
    for row in rows {
        writer.serialize(row)?;
    }
    writer.flush()?;

    info!("Wrote {} rows to {}", rows.len(), path.display());
    Ok(())
}

/// Write a value as pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> EtlResult<()> {
    let mut file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(&mut file, value)?;
    file.write_all(b"\n")?;
    file.flush()?;

    info!("Wrote {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::phone::normalize_phone;
    use crate::ingest::SaleRecord;
    use lbcrm_common::db::{RecencyCategory, RecencyRow};

    #[test]
    fn test_csv_has_bom_and_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(RECENCY_FILE);
        let rows = vec![RecencyRow {
            id: None,
            customer_id: None,
            customer_name: "João Pereira".to_string(),
            tax_id: "123".to_string(),
            last_purchase: None,
            elapsed_days: Some(3),
            category: RecencyCategory::Last30Days,
            last_total: 10.0,
        }];

        write_csv(&path, RECENCY_COLUMNS, &rows).unwrap();

        let bytes = std::fs::read(&path).unwrap();
        assert!(bytes.starts_with(UTF8_BOM));
        let text = String::from_utf8(bytes[UTF8_BOM.len()..].to_vec()).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next().unwrap(),
            "cliente_id,cliente_nome,cliente_cpf,data_ultima_compra,dias_desde_ultima_compra,categoria_tempo,total_ultima_compra"
        );
        assert_eq!(lines.next().unwrap(), ",João Pereira,123,,3,Últimos 30 dias,10.0");
    }

    #[test]
    fn test_empty_csv_keeps_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(segment_file_name("ativos"));

        write_csv::<RecencyRow>(&path, STORED_RECENCY_COLUMNS, &[]).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(
            text,
            "\u{feff}id,cliente_id,cliente_nome,cliente_cpf,data_ultima_compra,dias_desde_ultima_compra,categoria_tempo,total_ultima_compra\n"
        );
    }

    #[test]
    fn test_column_lists_match_serialized_headers() {
        let row = RecencyRow {
            id: Some(1),
            customer_id: Some(2),
            customer_name: "Ana".to_string(),
            tax_id: "9".to_string(),
            last_purchase: None,
            elapsed_days: None,
            category: RecencyCategory::NoPurchases,
            last_total: 0.0,
        };
        let stored = serde_json::to_value(&row).unwrap();
        let mut stored_keys: Vec<&str> =
            stored.as_object().unwrap().keys().map(String::as_str).collect();
        stored_keys.sort_unstable();
        let mut expected: Vec<&str> = STORED_RECENCY_COLUMNS.to_vec();
        expected.sort_unstable();
        assert_eq!(stored_keys, expected);

        let computed = serde_json::to_value(RecencyRow { id: None, ..row }).unwrap();
        assert_eq!(computed.as_object().unwrap().len(), RECENCY_COLUMNS.len());

        let reconciled = ReconciledSale {
            sale: SaleRecord {
                date: None,
                operation: None,
                item_count: None,
                total: None,
                customer_label: None,
                salesperson: None,
                phone: None,
                normalized_phone: normalize_phone(""),
                cost: None,
                profit: None,
            },
            customer: None,
        };
        let integrated = serde_json::to_value(IntegratedSaleRow::from(&reconciled)).unwrap();
        let mut integrated_keys: Vec<&str> =
            integrated.as_object().unwrap().keys().map(String::as_str).collect();
        integrated_keys.sort_unstable();
        let mut expected: Vec<&str> = INTEGRATED_SALE_COLUMNS.to_vec();
        expected.sort_unstable();
        assert_eq!(integrated_keys, expected);
    }

    #[test]
    fn test_integrated_row_for_unmatched_sale() {
        let reconciled = ReconciledSale {
            sale: SaleRecord {
                date: None,
                operation: Some("Venda".to_string()),
                item_count: Some(1),
                total: Some(5.0),
                customer_label: Some("balcão".to_string()),
                salesperson: None,
                phone: Some("(11) 98765-4321".to_string()),
                normalized_phone: normalize_phone("(11) 98765-4321"),
                cost: None,
                profit: None,
            },
            customer: None,
        };

        let row = IntegratedSaleRow::from(&reconciled);

        assert_eq!(row.telefone_limpo.as_deref(), Some("11987654321"));
        assert_eq!(row.cliente_cpf, None);
        assert_eq!(row.cliente_credito_loja, None);
    }

    #[test]
    fn test_json_pretty() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(SEGMENT_COUNTS_FILE);

        write_json(&path, &serde_json::json!({"perdidos": 2})).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert_eq!(text, "{\n  \"perdidos\": 2\n}\n");
    }

    #[test]
    fn test_file_names() {
        assert_eq!(inactive_file_name(90), "clientes_inativos_90_dias.csv");
        assert_eq!(segment_file_name("em_risco"), "segmento_em_risco.csv");
        assert_eq!(messages_file_name("ativos"), "mensagens_ativos.json");
    }
}
