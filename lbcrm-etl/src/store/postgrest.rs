//! Hosted store client (Supabase PostgREST)
//!
//! Tables live under `{url}/rest/v1/{table}`; DDL goes through the
//! `exec_sql` RPC. Every request carries the service key both as `apikey`
//! and as a bearer token.

use crate::error::{EtlError, EtlResult};
use crate::store::RecordStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lbcrm_common::config::StoreCredentials;
use lbcrm_common::db::{
    migration_statements, CustomerRow, Dialect, RecencyCategory, RecencyRow, SaleRow, Table,
};
use reqwest::{Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info};

const USER_AGENT: &str = concat!("lbcrm-etl/", env!("CARGO_PKG_VERSION"));
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Rows per read request
pub const PAGE_SIZE: usize = 1000;

/// PostgREST-backed record store
pub struct PostgrestStore {
    http_client: reqwest::Client,
    base_url: String,
    api_key: String,
}

#[derive(Debug, Deserialize)]
struct CustomerKey {
    id: i64,
    cpf: Option<String>,
}

#[derive(Debug, Serialize)]
struct RecencyAgeUpdate {
    dias_desde_ultima_compra: Option<i64>,
    categoria_tempo: RecencyCategory,
    updated_at: DateTime<Utc>,
}

impl PostgrestStore {
    pub fn new(credentials: &StoreCredentials) -> EtlResult<Self> {
        let http_client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            http_client,
            base_url: credentials.url.clone(),
            api_key: credentials.key.clone(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/rest/v1/{}", self.base_url, table.name())
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        self.http_client
            .request(method, url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    /// Map non-success statuses to [`EtlError::Remote`]
    async fn check(response: Response) -> EtlResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(EtlError::Remote {
            status: status.as_u16(),
            body,
        })
    }

    async fn insert<T: Serialize + Sync>(&self, table: Table, rows: &[T]) -> EtlResult<()> {
        if rows.is_empty() {
            return Ok(());
        }

        let response = self
            .request(Method::POST, &self.table_url(table))
            .header("Prefer", "return=minimal")
            .json(rows)
            .send()
            .await?;
        Self::check(response).await?;

        debug!(table = table.name(), rows = rows.len(), "Inserted rows");
        Ok(())
    }

    /// GET every matching row, one page at a time
    async fn fetch_all<T: DeserializeOwned>(
        &self,
        table: Table,
        query: &[(&str, String)],
    ) -> EtlResult<Vec<T>> {
        let url = self.table_url(table);
        let mut rows = Vec::new();
        let mut offset = 0;

        loop {
            let response = self
                .request(Method::GET, &url)
                .query(query)
                .query(&[("limit", PAGE_SIZE), ("offset", offset)])
                .send()
                .await?;
            let page: Vec<T> = Self::check(response).await?.json().await?;
            let fetched = page.len();
            rows.extend(page);

            if fetched < PAGE_SIZE {
                break;
            }
            offset += fetched;
        }

        debug!(table = table.name(), rows = rows.len(), "Fetched rows");
        Ok(rows)
    }
}

#[async_trait]
impl RecordStore for PostgrestStore {
    fn backend_name(&self) -> &'static str {
        "postgrest"
    }

    async fn migrate(&self) -> EtlResult<()> {
        let url = format!("{}/rest/v1/rpc/exec_sql", self.base_url);

        for sql in migration_statements(Dialect::Postgres) {
            let response = self
                .request(Method::POST, &url)
                .json(&json!({ "sql": sql }))
                .send()
                .await?;
            Self::check(response).await?;
        }

        info!("Hosted store schema ready");
        Ok(())
    }

    async fn clear(&self, table: Table) -> EtlResult<()> {
        let response = self
            .request(Method::DELETE, &self.table_url(table))
            .query(&[("id", "neq.0")])
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn insert_customers(&self, rows: &[CustomerRow]) -> EtlResult<()> {
        self.insert(Table::Customers, rows).await
    }

    async fn customer_ids(&self) -> EtlResult<HashMap<String, i64>> {
        let keys: Vec<CustomerKey> = self
            .fetch_all(
                Table::Customers,
                &[("select", "id,cpf".to_string()), ("order", "id.asc".to_string())],
            )
            .await?;

        Ok(keys
            .into_iter()
            .filter_map(|k| k.cpf.map(|cpf| (cpf, k.id)))
            .collect())
    }

    async fn insert_sales(&self, rows: &[SaleRow]) -> EtlResult<()> {
        self.insert(Table::Sales, rows).await
    }

    async fn insert_recency(&self, rows: &[RecencyRow]) -> EtlResult<()> {
        self.insert(Table::Recency, rows).await
    }

    async fn fetch_recency(&self, category: Option<RecencyCategory>) -> EtlResult<Vec<RecencyRow>> {
        let mut query = vec![
            ("select", "*".to_string()),
            (
                "order",
                "dias_desde_ultima_compra.asc.nullslast,id.asc".to_string(),
            ),
        ];
        if let Some(category) = category {
            query.push(("categoria_tempo", format!("eq.{}", category.label())));
        }

        self.fetch_all(Table::Recency, &query).await
    }

    async fn update_recency_age(
        &self,
        id: i64,
        elapsed_days: Option<i64>,
        category: RecencyCategory,
        updated_at: DateTime<Utc>,
    ) -> EtlResult<()> {
        let update = RecencyAgeUpdate {
            dias_desde_ultima_compra: elapsed_days,
            categoria_tempo: category,
            updated_at,
        };

        let response = self
            .request(Method::PATCH, &self.table_url(Table::Recency))
            .query(&[("id", format!("eq.{}", id))])
            .json(&update)
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }

    async fn fetch_sales_for_customer(&self, customer_id: i64) -> EtlResult<Vec<SaleRow>> {
        self.fetch_all(
            Table::Sales,
            &[
                ("select", "*".to_string()),
                ("cliente_id", format!("eq.{}", customer_id)),
                ("order", "data.desc,id.asc".to_string()),
            ],
        )
        .await
    }
}
