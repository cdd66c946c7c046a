//! Declarative table schemas
//!
//! Tables are declared once as [`ColumnDefinition`] lists and rendered as
//! `CREATE TABLE IF NOT EXISTS` for the hosted Postgres store or the local
//! SQLite mirror. On the mirror, [`sync_table`] adds columns that an older
//! file lacks; anything beyond additions needs a versioned migration.

use crate::Result;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info, warn};

/// SQL dialect a schema is rendered for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// Hosted store (Postgres behind PostgREST)
    Postgres,
    /// Local mirror
    Sqlite,
}

/// Column definition with SQL constraints
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDefinition {
    /// Column name
    pub name: String,
    /// Portable SQL type ("TEXT", "INTEGER", "NUMERIC", "TIMESTAMP", "TIMESTAMPTZ")
    pub sql_type: String,
    /// NOT NULL constraint
    pub not_null: bool,
    /// PRIMARY KEY constraint
    pub primary_key: bool,
    /// Auto-increment key (SERIAL / AUTOINCREMENT)
    pub auto_increment: bool,
    /// UNIQUE constraint
    pub unique: bool,
    /// Literal DEFAULT value
    pub default_value: Option<String>,
    /// DEFAULT to the current timestamp
    pub default_now: bool,
    /// Foreign key target, e.g. `clientes(id)`
    pub references: Option<String>,
}

impl ColumnDefinition {
    /// Create new column definition
    pub fn new(name: impl Into<String>, sql_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type: sql_type.into(),
            not_null: false,
            primary_key: false,
            auto_increment: false,
            unique: false,
            default_value: None,
            default_now: false,
            references: None,
        }
    }

    /// Mark column as PRIMARY KEY
    pub fn primary_key(mut self) -> Self {
        self.primary_key = true;
        self
    }

    /// Mark primary key as auto-increment
    pub fn auto_increment(mut self) -> Self {
        self.auto_increment = true;
        self
    }

    /// Mark column as NOT NULL
    pub fn not_null(mut self) -> Self {
        self.not_null = true;
        self
    }

    /// Mark column as UNIQUE
    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Set DEFAULT value
    pub fn default(mut self, value: impl Into<String>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// DEFAULT to the current timestamp
    pub fn default_now(mut self) -> Self {
        self.default_now = true;
        self
    }

    /// Add a foreign key reference
    pub fn references(mut self, target: impl Into<String>) -> Self {
        self.references = Some(target.into());
        self
    }

    /// Column type for the dialect
    pub fn type_for(&self, dialect: Dialect) -> String {
        let upper = self.sql_type.to_uppercase();
        match (dialect, upper.as_str()) {
            (Dialect::Postgres, "TIMESTAMPTZ") => "TIMESTAMP WITH TIME ZONE".to_string(),
            (Dialect::Sqlite, "TIMESTAMPTZ") => "TIMESTAMP".to_string(),
            _ => upper,
        }
    }

    /// DEFAULT expression for the dialect, if any
    pub fn default_for(&self, dialect: Dialect) -> Option<String> {
        if self.default_now {
            return Some(match dialect {
                Dialect::Postgres => "NOW()".to_string(),
                Dialect::Sqlite => "CURRENT_TIMESTAMP".to_string(),
            });
        }
        self.default_value.clone()
    }

    /// Full column clause for CREATE TABLE
    pub fn render(&self, dialect: Dialect) -> String {
        if self.primary_key && self.auto_increment {
            return match dialect {
                Dialect::Postgres => format!("{} SERIAL PRIMARY KEY", self.name),
                Dialect::Sqlite => format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", self.name),
            };
        }

        let mut sql = format!("{} {}", self.name, self.type_for(dialect));
        if self.primary_key {
            sql.push_str(" PRIMARY KEY");
        }
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.unique {
            sql.push_str(" UNIQUE");
        }
        if let Some(default) = self.default_for(dialect) {
            sql.push_str(&format!(" DEFAULT {}", default));
        }
        if let Some(target) = &self.references {
            sql.push_str(&format!(" REFERENCES {}", target));
        }
        sql
    }
}

/// Declared layout of one table
pub trait TableSchema {
    fn table_name() -> &'static str;

    /// Columns in creation order
    fn expected_columns() -> Vec<ColumnDefinition>;

    /// `CREATE TABLE IF NOT EXISTS` statement for the dialect
    fn create_table_sql(dialect: Dialect) -> String {
        let columns: Vec<String> = Self::expected_columns()
            .iter()
            .map(|c| format!("    {}", c.render(dialect)))
            .collect();
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n{}\n)",
            Self::table_name(),
            columns.join(",\n")
        )
    }
}

/// Column present in a mirror table
#[derive(Debug, Clone, PartialEq)]
pub struct ExistingColumn {
    pub name: String,
    pub declared_type: String,
}

/// Columns of a mirror table in position order; empty when the table is absent
pub async fn existing_columns(pool: &SqlitePool, table: &str) -> Result<Vec<ExistingColumn>> {
    let rows = sqlx::query(&format!("PRAGMA table_info({})", table))
        .fetch_all(pool)
        .await?;

    let mut columns = Vec::with_capacity(rows.len());
    for row in rows {
        columns.push(ExistingColumn {
            name: row.try_get("name")?,
            declared_type: row.try_get("type")?,
        });
    }
    Ok(columns)
}

/// SQLite storage affinity of a declared type
fn affinity(declared_type: &str) -> &'static str {
    let t = declared_type.to_uppercase();
    if t.contains("INT") {
        "INTEGER"
    } else if t.contains("CHAR") || t.contains("CLOB") || t.contains("TEXT") {
        "TEXT"
    } else if t.contains("REAL") || t.contains("FLOA") || t.contains("DOUB") {
        "REAL"
    } else {
        "NUMERIC"
    }
}

/// Declared columns the table does not have yet
pub fn missing_columns<'a>(
    expected: &'a [ColumnDefinition],
    existing: &[ExistingColumn],
) -> Vec<&'a ColumnDefinition> {
    expected
        .iter()
        .filter(|column| !existing.iter().any(|e| e.name == column.name))
        .collect()
}

/// `ALTER TABLE .. ADD COLUMN` for a column SQLite can add in place
///
/// Key, UNIQUE and NOT NULL constraints and `CURRENT_TIMESTAMP` defaults are
/// not allowed there and are left off.
pub fn add_column_sql(table: &str, column: &ColumnDefinition) -> String {
    let mut sql = format!(
        "ALTER TABLE {} ADD COLUMN {} {}",
        table,
        column.name,
        column.type_for(Dialect::Sqlite)
    );
    if let Some(default) = &column.default_value {
        sql.push_str(&format!(" DEFAULT {}", default));
    }
    if let Some(target) = &column.references {
        sql.push_str(&format!(" REFERENCES {}", target));
    }
    sql
}

/// Add declared columns missing from an existing mirror table
///
/// Returns the number of columns added. Affinity differences on existing
/// columns are only logged.
pub async fn sync_table<T: TableSchema>(pool: &SqlitePool) -> Result<usize> {
    let table = T::table_name();
    let existing = existing_columns(pool, table).await?;
    if existing.is_empty() {
        warn!("Table '{}' not found, nothing to sync", table);
        return Ok(0);
    }

    let expected = T::expected_columns();
    for column in &expected {
        let Some(found) = existing.iter().find(|e| e.name == column.name) else {
            continue;
        };
        let wanted = column.type_for(Dialect::Sqlite);
        if affinity(&wanted) != affinity(&found.declared_type) {
            warn!(
                "Column {}.{} declared '{}', expected '{}'; needs a migration",
                table, column.name, found.declared_type, wanted
            );
        }
    }

    let missing = missing_columns(&expected, &existing);
    for column in &missing {
        if column.primary_key || column.unique || column.not_null || column.default_now {
            debug!(
                "Adding {}.{} without constraints SQLite cannot add in place",
                table, column.name
            );
        }
        info!("Adding column {}.{}", table, column.name);
        sqlx::query(&add_column_sql(table, column))
            .execute(pool)
            .await?;
    }

    if missing.is_empty() {
        debug!("Schema up to date for '{}'", table);
    }
    Ok(missing.len())
}
