//! The three tables shared by the hosted store and the local mirror

use crate::db::schema_sync::{sync_table, ColumnDefinition, Dialect, TableSchema};
use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// The persisted tables, in dependency order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Customers,
    Sales,
    Recency,
}

impl Table {
    /// Creation order (referenced tables first)
    pub const CREATION_ORDER: [Table; 3] = [Table::Customers, Table::Sales, Table::Recency];

    /// Clearing order (referencing tables first)
    pub const CLEAR_ORDER: [Table; 3] = [Table::Recency, Table::Sales, Table::Customers];

    pub fn name(&self) -> &'static str {
        match self {
            Table::Customers => CustomersTableSchema::table_name(),
            Table::Sales => SalesTableSchema::table_name(),
            Table::Recency => RecencyTableSchema::table_name(),
        }
    }

    /// `CREATE TABLE IF NOT EXISTS` statement for the dialect
    pub fn create_sql(&self, dialect: Dialect) -> String {
        match self {
            Table::Customers => CustomersTableSchema::create_table_sql(dialect),
            Table::Sales => SalesTableSchema::create_table_sql(dialect),
            Table::Recency => RecencyTableSchema::create_table_sql(dialect),
        }
    }
}

fn audit_columns() -> [ColumnDefinition; 2] {
    [
        ColumnDefinition::new("created_at", "TIMESTAMPTZ").default_now(),
        ColumnDefinition::new("updated_at", "TIMESTAMPTZ").default_now(),
    ]
}

/// Customers table schema (`clientes`)
pub struct CustomersTableSchema;

impl TableSchema for CustomersTableSchema {
    fn table_name() -> &'static str {
        "clientes"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = vec![
            ColumnDefinition::new("id", "INTEGER").primary_key().auto_increment(),
            ColumnDefinition::new("third_id", "TEXT"),
            ColumnDefinition::new("nome", "TEXT").not_null(),
            ColumnDefinition::new("cpf", "TEXT").unique(),
            ColumnDefinition::new("telefone_1", "TEXT"),
            ColumnDefinition::new("telefone_2", "TEXT"),
            ColumnDefinition::new("telefone_3", "TEXT"),
            ColumnDefinition::new("data_cadastro", "TIMESTAMP"),
            ColumnDefinition::new("credito_loja", "NUMERIC").default("0"),
        ];
        columns.extend(audit_columns());
        columns
    }
}

/// Sales table schema (`vendas`)
pub struct SalesTableSchema;

impl TableSchema for SalesTableSchema {
    fn table_name() -> &'static str {
        "vendas"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = vec![
            ColumnDefinition::new("id", "INTEGER").primary_key().auto_increment(),
            ColumnDefinition::new("data", "TIMESTAMP").not_null(),
            ColumnDefinition::new("movimentacao", "TEXT"),
            ColumnDefinition::new("qtde_produtos", "INTEGER"),
            ColumnDefinition::new("total", "NUMERIC"),
            ColumnDefinition::new("cliente_id", "INTEGER").references("clientes(id)"),
            ColumnDefinition::new("cliente_nome", "TEXT"),
            ColumnDefinition::new("vendedor", "TEXT"),
            ColumnDefinition::new("telefone", "TEXT"),
            ColumnDefinition::new("custo_da_venda", "NUMERIC"),
            ColumnDefinition::new("lucro_da_venda", "NUMERIC"),
        ];
        columns.extend(audit_columns());
        columns
    }
}

/// Last-purchase table schema (`ultima_compra`)
pub struct RecencyTableSchema;

impl TableSchema for RecencyTableSchema {
    fn table_name() -> &'static str {
        "ultima_compra"
    }

    fn expected_columns() -> Vec<ColumnDefinition> {
        let mut columns = vec![
            ColumnDefinition::new("id", "INTEGER").primary_key().auto_increment(),
            ColumnDefinition::new("cliente_id", "INTEGER").references("clientes(id)"),
            ColumnDefinition::new("cliente_nome", "TEXT").not_null(),
            ColumnDefinition::new("cliente_cpf", "TEXT").unique(),
            ColumnDefinition::new("data_ultima_compra", "TIMESTAMP"),
            ColumnDefinition::new("dias_desde_ultima_compra", "INTEGER"),
            ColumnDefinition::new("categoria_tempo", "TEXT"),
            ColumnDefinition::new("total_ultima_compra", "NUMERIC"),
        ];
        columns.extend(audit_columns());
        columns
    }
}

/// DDL for every table in creation order
pub fn migration_statements(dialect: Dialect) -> Vec<String> {
    Table::CREATION_ORDER
        .iter()
        .map(|t| t.create_sql(dialect))
        .collect()
}

/// Create missing tables in the SQLite mirror
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    for sql in migration_statements(Dialect::Sqlite) {
        sqlx::query(&sql).execute(pool).await?;
    }
    Ok(())
}

/// Add columns missing from an older mirror file
pub async fn sync_all_table_schemas(pool: &SqlitePool) -> Result<()> {
    let added = sync_table::<CustomersTableSchema>(pool).await?
        + sync_table::<SalesTableSchema>(pool).await?
        + sync_table::<RecencyTableSchema>(pool).await?;

    if added > 0 {
        info!("Schema sync added {} columns", added);
    }
    Ok(())
}
