mod flux;
mod sql;

pub use flux::FluxStore;
pub use sql::SqlStore;

use crate::Result;
use crate::config;
use crate::errors::Error;
use crate::query::{Dialect, QuerySpec};
use crate::result_set::RawResultSet;
use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, Response};
use std::sync::Arc;
use std::time::Duration;

/// A time-series store reachable over HTTP.
#[async_trait]
pub trait Store: Send + Sync {
    fn dialect(&self) -> Dialect;

    async fn query(&self, query: &QuerySpec) -> Result<RawResultSet>;

    /// User databases (buckets), internal ones excluded.
    async fn list_databases(&self) -> Result<Vec<String>>;

    /// User tables (measurements) of `database`, system schemas excluded.
    async fn list_tables(&self, database: &str) -> Result<Vec<String>>;
}

#[derive(Debug, Clone)]
pub struct StoreSettings {
    pub url: String,
    pub dialect: Dialect,
    pub org: String,
    pub auth_scheme: String,
    pub token: String,
    pub timeout: Duration,
}

impl StoreSettings {
    /// Reads the credential first so a missing one fails before anything
    /// else is looked at.
    pub fn from_config() -> Result<Self> {
        let token = config::credential()?;
        Ok(Self {
            url: config::get("STORE_URL")?,
            dialect: Dialect::from_config()?,
            org: config::get("STORE_ORG")?,
            auth_scheme: config::get("STORE_AUTH_SCHEME")?,
            token,
            timeout: config::get_duration("STORE_TIMEOUT")?,
        })
    }

    fn base_url(&self) -> String {
        self.url.trim_end_matches('/').to_string()
    }

    /// Idle connections are not kept: every query opens and releases its own.
    fn http_client(&self) -> Result<Client> {
        let mut auth = HeaderValue::from_str(&format!("{} {}", self.auth_scheme, self.token))
            .map_err(|e| Error::Config(format!("invalid credential header: {}", e)))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(concat!("sensorview/", env!("CARGO_PKG_VERSION"))),
        );

        Client::builder()
            .default_headers(headers)
            .timeout(self.timeout)
            .pool_max_idle_per_host(0)
            .build()
            .map_err(|e| Error::Config(format!("cannot build HTTP client: {}", e)))
    }
}

pub fn connect(settings: &StoreSettings) -> Result<Arc<dyn Store>> {
    let store: Arc<dyn Store> = match settings.dialect {
        Dialect::Sql => Arc::new(SqlStore::new(settings)?),
        Dialect::Flux => Arc::new(FluxStore::new(settings)?),
    };
    Ok(store)
}

async fn check_status(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    Err(Error::QueryFailure(format!(
        "HTTP {}: {}",
        status,
        error_text.trim()
    )))
}

fn is_internal_name(name: &str) -> bool {
    name.starts_with('_')
}
