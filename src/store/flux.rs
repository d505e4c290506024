use super::{Store, StoreSettings, check_status, is_internal_name};
use crate::Result;
use crate::errors::Error;
use crate::logging::*;
use crate::query::{Dialect, QuerySpec, measurements_query};
use crate::result_set::{FLUX_TIME_COLUMN, RawResultSet, Row, cell_from_text};
use async_trait::async_trait;
use reqwest::Client;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Serialize)]
struct FluxDialect {
    header: bool,
    annotations: Vec<String>,
    delimiter: &'static str,
}

#[derive(Debug, Serialize)]
struct FluxRequest<'a> {
    query: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    dialect: FluxDialect,
}

#[derive(Debug, Deserialize)]
struct BucketList {
    #[serde(default)]
    buckets: Vec<Bucket>,
}

#[derive(Debug, Deserialize)]
struct Bucket {
    name: String,
    #[serde(rename = "type", default)]
    kind: String,
}

/// InfluxDB 2 over its Flux query endpoint.
pub struct FluxStore {
    client: Client,
    base_url: String,
    org: String,
}

impl FluxStore {
    pub fn new(settings: &StoreSettings) -> Result<Self> {
        Ok(Self {
            client: settings.http_client()?,
            base_url: settings.base_url(),
            org: settings.org.clone(),
        })
    }

    async fn fetch_csv(&self, text: &str) -> Result<String> {
        let url = format!("{}/api/v2/query", self.base_url);
        let request = FluxRequest {
            query: text,
            kind: "flux",
            dialect: FluxDialect {
                header: true,
                annotations: Vec::new(),
                delimiter: ",",
            },
        };
        let response = self
            .client
            .post(&url)
            .query(&[("org", self.org.as_str())])
            .header(ACCEPT, "application/csv")
            .json(&request)
            .send()
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to send request to {}: {}", url, e)))?;
        Ok(check_status(response).await?.text().await?)
    }
}

#[async_trait]
impl Store for FluxStore {
    fn dialect(&self) -> Dialect {
        Dialect::Flux
    }

    async fn query(&self, query: &QuerySpec) -> Result<RawResultSet> {
        let log = DEFAULT.new(o!(
            "function" => "FluxStore::query",
            "bucket" => query.database.clone(),
        ));
        debug!(log, "sending"; "q" => &query.text);
        let body = self.fetch_csv(&query.text).await?;
        let result = parse_csv(&body, FLUX_TIME_COLUMN)?;
        info!(log, "received"; "rows" => result.len());
        Ok(result)
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/v2/buckets", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("org", self.org.as_str()), ("limit", "100")])
            .send()
            .await
            .map_err(|e| Error::QueryFailure(format!("Failed to send request to {}: {}", url, e)))?;
        let list: BucketList = check_status(response).await?.json().await?;
        Ok(list
            .buckets
            .into_iter()
            .filter(|b| b.kind != "system" && !is_internal_name(&b.name))
            .map(|b| b.name)
            .collect())
    }

    async fn list_tables(&self, database: &str) -> Result<Vec<String>> {
        let body = self.fetch_csv(&measurements_query(database)).await?;
        let result = parse_csv_text(&body, FLUX_TIME_COLUMN)?;
        Ok(result
            .rows()
            .iter()
            .filter_map(|row| row.get("_value").and_then(Value::as_str))
            .filter(|name| !is_internal_name(name))
            .map(str::to_string)
            .collect())
    }
}

/// Reads a header-only (no annotations) Flux CSV body. Each table block
/// restarts with its own header row; the unnamed first column is skipped.
/// An `error,reference` block anywhere in the body fails the whole read.
pub(crate) fn parse_csv(body: &str, time_column: &str) -> Result<RawResultSet> {
    parse_blocks(body, time_column, cell_from_text)
}

/// Like [`parse_csv`] but keeps every cell as text, for name listings.
pub(crate) fn parse_csv_text(body: &str, time_column: &str) -> Result<RawResultSet> {
    parse_blocks(body, time_column, |cell| Value::String(cell.to_string()))
}

fn parse_blocks(
    body: &str,
    time_column: &str,
    cell: impl Fn(&str) -> Value,
) -> Result<RawResultSet> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(body.as_bytes());

    let mut result = RawResultSet::new(time_column);
    let mut header: Option<Vec<String>> = None;
    // column of the message once an error block has started
    let mut error_column: Option<usize> = None;

    for record in reader.records() {
        let record = record?;
        if record.iter().all(str::is_empty) {
            continue;
        }
        if let Some(column) = error_column {
            let message = record.get(column).unwrap_or_default();
            return Err(Error::QueryFailure(format!("flux: {}", message)));
        }
        if let Some(column) = error_header_column(&record) {
            error_column = Some(column);
            continue;
        }
        if record.get(1) == Some("result") && record.get(2) == Some("table") {
            header = Some(record.iter().map(str::to_string).collect());
            continue;
        }
        let Some(names) = header.as_ref() else {
            return Err(Error::MalformedResult(
                "flux CSV row before any header".to_string(),
            ));
        };
        let row: Row = names
            .iter()
            .zip(record.iter())
            .filter(|(name, _)| !name.is_empty())
            .map(|(name, text)| (name.clone(), cell(text)))
            .collect();
        result.push(row);
    }
    if error_column.is_some() {
        return Err(Error::QueryFailure(
            "flux: error block without a message".to_string(),
        ));
    }
    Ok(result)
}

/// Position of `error` in an error block header: 1 behind the usual empty
/// leading column, 0 when the server omits it.
fn error_header_column(record: &csv::StringRecord) -> Option<usize> {
    (0..=1).find(|&i| {
        record.get(i) == Some("error")
            && record.get(i + 1) == Some("reference")
            && record.iter().take(i).all(str::is_empty)
    })
}
