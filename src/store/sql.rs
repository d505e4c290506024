use super::{Store, StoreSettings, check_status, is_internal_name};
use crate::Result;
use crate::errors::Error;
use crate::logging::*;
use crate::query::{Dialect, QuerySpec, SHOW_TABLES};
use crate::result_set::{RawResultSet, Row, SQL_TIME_COLUMN};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;

const USER_SCHEMA: &str = "iox";
const DATABASE_KEY: &str = "iox::database";

#[derive(Debug, Serialize)]
struct SqlRequest<'a> {
    db: &'a str,
    q: &'a str,
    format: &'static str,
}

/// InfluxDB 3 over its HTTP SQL endpoint.
pub struct SqlStore {
    client: Client,
    base_url: String,
}

impl SqlStore {
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        Ok(Self {
            client: settings.http_client()?,
            base_url: settings.base_url(),
        })
    }

    async fn fetch_rows(&self, database: &str, text: &str) -> Result<Vec<Row>> {
        let url = format!("{}/api/v3/query_sql", self.base_url);
        let request = SqlRequest {
            db: database,
            q: text,
            format: "json",
        };
        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to send request to {}: {}", url, e)))?;
        let response = check_status(response).await?;
        Ok(response.json().await?)
    }
}

#[async_trait]
impl Store for SqlStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sql
    }

    async fn query(&self, query: &QuerySpec) -> Result<RawResultSet> {
        let log = DEFAULT.new(o!(
            "function" => "SqlStore::query",
            "database" => query.database.clone(),
        ));
        debug!(log, "sending"; "q" => &query.text);
        let rows = self.fetch_rows(&query.database, &query.text).await?;
        info!(log, "received"; "rows" => rows.len());
        Ok(RawResultSet::from_rows(SQL_TIME_COLUMN, rows))
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/v3/configure/database?format=json", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to send request to {}: {}", url, e)))?;
        let rows: Vec<Row> = check_status(response).await?.json().await?;
        Ok(rows
            .iter()
            .filter_map(|row| row.get(DATABASE_KEY).and_then(Value::as_str))
            .filter(|name| !is_internal_name(name))
            .map(str::to_string)
            .collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let rows = self.fetch_rows(database, SHOW_TABLES).await?;
        Ok(rows
            .iter()
            .filter(|row| row.get("table_schema").and_then(Value::as_str) == Some(USER_SCHEMA))
            .filter_map(|row| row.get("table_name").and_then(Value::as_str))
            .filter(|name| !is_internal_name(name))
            .map(str::to_string)
            .collect())
    }
}
