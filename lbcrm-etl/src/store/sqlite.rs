//! Local SQLite mirror of the hosted tables
//!
//! Used for offline runs and tests. Shares the table definitions with the
//! hosted store through `lbcrm_common::db`.

use crate::error::{EtlError, EtlResult};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lbcrm_common::db::{
    init_database, prepare_schema, CustomerRow, RecencyCategory, RecencyRow, SaleRow, Table,
};
use sqlx::sqlite::{SqlitePoolOptions, SqliteRow};
use sqlx::{QueryBuilder, Row, Sqlite, SqlitePool};
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

const RECENCY_SELECT: &str = r#"
    SELECT id, cliente_id, cliente_nome, cliente_cpf, data_ultima_compra,
           dias_desde_ultima_compra, categoria_tempo,
           CAST(COALESCE(total_ultima_compra, 0) AS REAL) AS total_ultima_compra
    FROM ultima_compra
"#;

const RECENCY_ORDER: &str =
    " ORDER BY dias_desde_ultima_compra IS NULL, dias_desde_ultima_compra ASC, id ASC";

/// SQLite-backed record store
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (or create) the mirror file; the schema is prepared on open
    pub async fn open(path: &Path) -> EtlResult<Self> {
        let pool = init_database(path).await?;
        Ok(Self::new(pool))
    }

    /// Private in-memory database on a single connection
    pub async fn in_memory() -> EtlResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;
        sqlx::query("PRAGMA foreign_keys = ON").execute(&pool).await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }
}

fn recency_from_row(row: &SqliteRow) -> EtlResult<RecencyRow> {
    let category: Option<String> = row.try_get("categoria_tempo")?;
    let elapsed_days: Option<i64> = row.try_get("dias_desde_ultima_compra")?;
    let category = match category {
        Some(label) => label.parse::<RecencyCategory>()?,
        None => RecencyCategory::from_elapsed(elapsed_days),
    };

    Ok(RecencyRow {
        id: row.try_get("id")?,
        customer_id: row.try_get("cliente_id")?,
        customer_name: row.try_get("cliente_nome")?,
        tax_id: row.try_get::<Option<String>, _>("cliente_cpf")?.unwrap_or_default(),
        last_purchase: row.try_get("data_ultima_compra")?,
        elapsed_days,
        category,
        last_total: row.try_get("total_ultima_compra")?,
    })
}

fn sale_from_row(row: &SqliteRow) -> EtlResult<SaleRow> {
    Ok(SaleRow {
        id: row.try_get("id")?,
        date: row.try_get("data")?,
        operation: row.try_get("movimentacao")?,
        item_count: row.try_get::<Option<i64>, _>("qtde_produtos")?.unwrap_or(0),
        total: row.try_get("total")?,
        customer_id: row.try_get("cliente_id")?,
        customer_label: row.try_get("cliente_nome")?,
        salesperson: row.try_get("vendedor")?,
        phone: row.try_get("telefone")?,
        cost: row.try_get("custo_da_venda")?,
        profit: row.try_get("lucro_da_venda")?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    async fn migrate(&self) -> EtlResult<()> {
        prepare_schema(&self.pool).await?;
        info!("Local mirror schema ready");
        Ok(())
    }

    async fn clear(&self, table: Table) -> EtlResult<()> {
        sqlx::query(&format!("DELETE FROM {}", table.name()))
            .execute(&self.pool)
            .await?;
        Ok(())
    }

    async fn insert_customers(&self, rows: &[CustomerRow]) -> EtlResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO clientes (third_id, nome, cpf, telefone_1, telefone_2, telefone_3, data_cadastro, credito_loja) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.external_id.as_deref())
                .push_bind(row.full_name.as_str())
                .push_bind(row.tax_id.as_str())
                .push_bind(row.phone_1.as_deref())
                .push_bind(row.phone_2.as_deref())
                .push_bind(row.phone_3.as_deref())
                .push_bind(row.registration_date)
                .push_bind(row.store_credit);
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn customer_ids(&self) -> EtlResult<HashMap<String, i64>> {
        let rows = sqlx::query("SELECT id, cpf FROM clientes WHERE cpf IS NOT NULL")
            .fetch_all(&self.pool)
            .await?;

        rows.iter()
            .map(|row| -> EtlResult<(String, i64)> { Ok((row.try_get("cpf")?, row.try_get("id")?)) })
            .collect()
    }

    async fn insert_sales(&self, rows: &[SaleRow]) -> EtlResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO vendas (data, movimentacao, qtde_produtos, total, cliente_id, cliente_nome, vendedor, telefone, custo_da_venda, lucro_da_venda) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.date)
                .push_bind(row.operation.as_deref())
                .push_bind(row.item_count)
                .push_bind(row.total)
                .push_bind(row.customer_id)
                .push_bind(row.customer_label.as_deref())
                .push_bind(row.salesperson.as_deref())
                .push_bind(row.phone.as_deref())
                .push_bind(row.cost)
                .push_bind(row.profit);
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn insert_recency(&self, rows: &[RecencyRow]) -> EtlResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO ultima_compra (cliente_id, cliente_nome, cliente_cpf, data_ultima_compra, dias_desde_ultima_compra, categoria_tempo, total_ultima_compra) ",
        );
        builder.push_values(rows, |mut b, row| {
            b.push_bind(row.customer_id)
                .push_bind(row.customer_name.as_str())
                .push_bind(row.tax_id.as_str())
                .push_bind(row.last_purchase)
                .push_bind(row.elapsed_days)
                .push_bind(row.category.label())
                .push_bind(row.last_total);
        });
        builder.build().execute(&self.pool).await?;
        Ok(())
    }

    async fn fetch_recency(&self, category: Option<RecencyCategory>) -> EtlResult<Vec<RecencyRow>> {
        let rows = match category {
            Some(category) => {
                sqlx::query(&format!(
                    "{} WHERE categoria_tempo = ?{}",
                    RECENCY_SELECT, RECENCY_ORDER
                ))
                .bind(category.label())
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query(&format!("{}{}", RECENCY_SELECT, RECENCY_ORDER))
                    .fetch_all(&self.pool)
                    .await?
            }
        };

        rows.iter().map(recency_from_row).collect()
    }

    async fn update_recency_age(
        &self,
        id: i64,
        elapsed_days: Option<i64>,
        category: RecencyCategory,
        updated_at: DateTime<Utc>,
    ) -> EtlResult<()> {
        let result = sqlx::query(
            "UPDATE ultima_compra SET dias_desde_ultima_compra = ?, categoria_tempo = ?, updated_at = ? WHERE id = ?",
        )
        .bind(elapsed_days)
        .bind(category.label())
        .bind(updated_at)
        .bind(id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(EtlError::Common(lbcrm_common::Error::NotFound(format!(
                "ultima_compra row {}",
                id
            ))));
        }
        Ok(())
    }

    async fn fetch_sales_for_customer(&self, customer_id: i64) -> EtlResult<Vec<SaleRow>> {
        let rows = sqlx::query(
            r#"
            SELECT id, data, movimentacao, qtde_produtos, cliente_id, cliente_nome, vendedor, telefone,
                   CAST(COALESCE(total, 0) AS REAL) AS total,
                   CAST(COALESCE(custo_da_venda, 0) AS REAL) AS custo_da_venda,
                   CAST(COALESCE(lucro_da_venda, 0) AS REAL) AS lucro_da_venda
            FROM vendas
            WHERE cliente_id = ?
            ORDER BY data DESC, id ASC
            "#,
        )
        .bind(customer_id)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(sale_from_row).collect()
    }
}
