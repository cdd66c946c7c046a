//! Database row models
//!
//! Field names follow the Rust side; serde renames map them onto the column
//! names shared by the hosted store, the SQLite mirror and the CSV exports.

use crate::Error;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Customer row (`clientes`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CustomerRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "third_id")]
    pub external_id: Option<String>,
    #[serde(rename = "nome")]
    pub full_name: String,
    #[serde(rename = "cpf")]
    pub tax_id: String,
    #[serde(rename = "telefone_1")]
    pub phone_1: Option<String>,
    #[serde(rename = "telefone_2")]
    pub phone_2: Option<String>,
    #[serde(rename = "telefone_3")]
    pub phone_3: Option<String>,
    #[serde(rename = "data_cadastro")]
    pub registration_date: Option<NaiveDateTime>,
    #[serde(rename = "credito_loja", default)]
    pub store_credit: f64,
}

/// Sale row (`vendas`)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaleRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "data")]
    pub date: NaiveDateTime,
    #[serde(rename = "movimentacao")]
    pub operation: Option<String>,
    #[serde(rename = "qtde_produtos", default)]
    pub item_count: i64,
    #[serde(default)]
    pub total: f64,
    #[serde(rename = "cliente_id")]
    pub customer_id: Option<i64>,
    /// Free-text customer label typed at the register
    #[serde(rename = "cliente_nome")]
    pub customer_label: Option<String>,
    #[serde(rename = "vendedor")]
    pub salesperson: Option<String>,
    #[serde(rename = "telefone")]
    pub phone: Option<String>,
    #[serde(rename = "custo_da_venda", default)]
    pub cost: f64,
    #[serde(rename = "lucro_da_venda", default)]
    pub profit: f64,
}

/// Last-purchase row (`ultima_compra`), one per customer with a resolved sale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecencyRow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(rename = "cliente_id")]
    pub customer_id: Option<i64>,
    #[serde(rename = "cliente_nome")]
    pub customer_name: String,
    #[serde(rename = "cliente_cpf")]
    pub tax_id: String,
    #[serde(rename = "data_ultima_compra")]
    pub last_purchase: Option<NaiveDateTime>,
    #[serde(rename = "dias_desde_ultima_compra")]
    pub elapsed_days: Option<i64>,
    #[serde(rename = "categoria_tempo")]
    pub category: RecencyCategory,
    #[serde(rename = "total_ultima_compra", default)]
    pub last_total: f64,
}

/// Display bucket for days since the last purchase
///
/// Six bounded buckets plus `NoPurchases` for records without a usable date.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum RecencyCategory {
    #[serde(rename = "Últimos 30 dias")]
    Last30Days,
    #[serde(rename = "31-60 dias")]
    Days31To60,
    #[serde(rename = "61-90 dias")]
    Days61To90,
    #[serde(rename = "91-180 dias")]
    Days91To180,
    #[serde(rename = "181-365 dias")]
    Days181To365,
    #[serde(rename = "Mais de 365 dias")]
    Over365Days,
    #[serde(rename = "Sem compras")]
    NoPurchases,
}

impl RecencyCategory {
    pub const ALL: [RecencyCategory; 7] = [
        RecencyCategory::Last30Days,
        RecencyCategory::Days31To60,
        RecencyCategory::Days61To90,
        RecencyCategory::Days91To180,
        RecencyCategory::Days181To365,
        RecencyCategory::Over365Days,
        RecencyCategory::NoPurchases,
    ];

    /// Classify elapsed days; first matching upper bound wins
    pub fn from_elapsed(elapsed_days: Option<i64>) -> Self {
        match elapsed_days {
            None => RecencyCategory::NoPurchases,
            Some(d) if d <= 30 => RecencyCategory::Last30Days,
            Some(d) if d <= 60 => RecencyCategory::Days31To60,
            Some(d) if d <= 90 => RecencyCategory::Days61To90,
            Some(d) if d <= 180 => RecencyCategory::Days91To180,
            Some(d) if d <= 365 => RecencyCategory::Days181To365,
            Some(_) => RecencyCategory::Over365Days,
        }
    }

    /// Label stored in `categoria_tempo`
    pub fn label(&self) -> &'static str {
        match self {
            RecencyCategory::Last30Days => "Últimos 30 dias",
            RecencyCategory::Days31To60 => "31-60 dias",
            RecencyCategory::Days61To90 => "61-90 dias",
            RecencyCategory::Days91To180 => "91-180 dias",
            RecencyCategory::Days181To365 => "181-365 dias",
            RecencyCategory::Over365Days => "Mais de 365 dias",
            RecencyCategory::NoPurchases => "Sem compras",
        }
    }
}

impl fmt::Display for RecencyCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RecencyCategory {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|c| c.label() == trimmed)
            .ok_or_else(|| Error::InvalidInput(format!("Unknown recency category: {:?}", s)))
    }
}
