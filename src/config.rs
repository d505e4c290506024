use crate::Result;
use crate::errors::Error;
use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

// TOML configuration structure
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub catalog: CatalogConfig,
    #[serde(default)]
    pub fields: Vec<FieldConfig>,
    #[serde(default)]
    pub chart: ChartConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize)]
pub struct StoreConfig {
    #[serde(default = "default_store_url")]
    pub url: String,
    #[serde(default = "default_store_dialect")]
    pub dialect: String,
    #[serde(default = "default_store_org")]
    pub org: String,
    #[serde(default = "default_store_auth_scheme")]
    pub auth_scheme: String,
    #[serde(default = "default_store_token_env")]
    pub token_env: String,
    #[serde(default = "default_store_timeout")]
    pub timeout: String,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_naive_stop_policy")]
    pub naive_stop_policy: String,
    #[serde(default = "default_duration_min_minutes")]
    pub duration_min_minutes: i64,
    #[serde(default = "default_duration_max_minutes")]
    pub duration_max_minutes: i64,
    #[serde(default = "default_duration_default_minutes")]
    pub duration_default_minutes: i64,
    #[serde(default = "default_duration_step_minutes")]
    pub duration_step_minutes: i64,
}

#[derive(Debug, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_ttl")]
    pub ttl: String,
    #[serde(default = "default_cache_max_entries")]
    pub max_entries: usize,
}

#[derive(Debug, Deserialize)]
pub struct CatalogConfig {
    #[serde(default = "default_catalog_mode")]
    pub mode: String,
    #[serde(default)]
    pub sources: Vec<CatalogSourceConfig>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct CatalogSourceConfig {
    pub name: String,
    #[serde(default)]
    pub tables: Vec<String>,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct FieldConfig {
    pub name: String,
    pub display: String,
    #[serde(default = "default_field_scale")]
    pub scale: f64,
    #[serde(default = "default_field_decimals")]
    pub decimals: u32,
}

#[derive(Debug, Deserialize)]
pub struct ChartConfig {
    #[serde(default = "default_chart_size")]
    pub size: String,
}

#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_rust_log_format")]
    pub rust_log_format: String,
}

// Default values
fn default_store_url() -> String {
    "http://localhost:8181".to_string()
}
fn default_store_dialect() -> String {
    "sql".to_string()
}
fn default_store_org() -> String {
    "home".to_string()
}
fn default_store_auth_scheme() -> String {
    "Bearer".to_string()
}
fn default_store_token_env() -> String {
    "INFLUXDB3_AUTH_TOKEN".to_string()
}
fn default_store_timeout() -> String {
    "30s".to_string()
}
fn default_naive_stop_policy() -> String {
    "utc".to_string()
}
fn default_duration_min_minutes() -> i64 {
    10
}
fn default_duration_max_minutes() -> i64 {
    24 * 60
}
fn default_duration_default_minutes() -> i64 {
    6 * 60
}
fn default_duration_step_minutes() -> i64 {
    10
}
fn default_cache_ttl() -> String {
    "5m".to_string()
}
fn default_cache_max_entries() -> usize {
    64
}
fn default_catalog_mode() -> String {
    "static".to_string()
}
fn default_field_scale() -> f64 {
    1.0
}
fn default_field_decimals() -> u32 {
    1
}
fn default_chart_size() -> String {
    "1200x800".to_string()
}
fn default_rust_log_format() -> String {
    "term".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            url: default_store_url(),
            dialect: default_store_dialect(),
            org: default_store_org(),
            auth_scheme: default_store_auth_scheme(),
            token_env: default_store_token_env(),
            timeout: default_store_timeout(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            naive_stop_policy: default_naive_stop_policy(),
            duration_min_minutes: default_duration_min_minutes(),
            duration_max_minutes: default_duration_max_minutes(),
            duration_default_minutes: default_duration_default_minutes(),
            duration_step_minutes: default_duration_step_minutes(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl: default_cache_ttl(),
            max_entries: default_cache_max_entries(),
        }
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            mode: default_catalog_mode(),
            sources: Vec::new(),
        }
    }
}

impl Default for ChartConfig {
    fn default() -> Self {
        Self {
            size: default_chart_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            rust_log_format: default_rust_log_format(),
        }
    }
}

static CONFIG: Lazy<Config> = Lazy::new(|| {
    load_config(&config_dir()).unwrap_or_else(|e| {
        eprintln!(
            "Warning: Failed to load config files: {}. Using defaults.",
            e
        );
        Config::default()
    })
});

static CONFIG_STORE: Lazy<Arc<Mutex<HashMap<String, String>>>> =
    Lazy::new(|| Arc::new(Mutex::new(HashMap::new())));

/// Priority: runtime overrides, then environment, then TOML (which carries
/// the built-in defaults).
pub fn get(name: &str) -> Result<String> {
    if let Some(value) = get_from_store(name) {
        if value.is_empty() {
            return Err(Error::Config(format!("{} is empty", name)));
        }
        return Ok(value);
    }

    if let Ok(val) = std::env::var(name)
        && !val.is_empty()
    {
        return Ok(val);
    }

    let toml_value = match name {
        "STORE_URL" => Some(CONFIG.store.url.clone()),
        "STORE_DIALECT" => Some(CONFIG.store.dialect.clone()),
        "STORE_ORG" => Some(CONFIG.store.org.clone()),
        "STORE_AUTH_SCHEME" => Some(CONFIG.store.auth_scheme.clone()),
        "STORE_TOKEN_ENV" => Some(CONFIG.store.token_env.clone()),
        "STORE_TIMEOUT" => Some(CONFIG.store.timeout.clone()),
        "NAIVE_STOP_POLICY" => Some(CONFIG.session.naive_stop_policy.clone()),
        "DURATION_MIN_MINUTES" => Some(CONFIG.session.duration_min_minutes.to_string()),
        "DURATION_MAX_MINUTES" => Some(CONFIG.session.duration_max_minutes.to_string()),
        "DURATION_DEFAULT_MINUTES" => Some(CONFIG.session.duration_default_minutes.to_string()),
        "DURATION_STEP_MINUTES" => Some(CONFIG.session.duration_step_minutes.to_string()),
        "CACHE_TTL" => Some(CONFIG.cache.ttl.clone()),
        "CACHE_MAX_ENTRIES" => Some(CONFIG.cache.max_entries.to_string()),
        "CATALOG_MODE" => Some(CONFIG.catalog.mode.clone()),
        "CHART_SIZE" => Some(CONFIG.chart.size.clone()),
        "RUST_LOG_FORMAT" => Some(CONFIG.logging.rust_log_format.clone()),
        _ => None,
    };

    if let Some(value) = toml_value
        && !value.is_empty()
    {
        return Ok(value);
    }

    Err(Error::Config(format!(
        "Configuration key not found: {}",
        name
    )))
}

pub fn get_parsed<T>(name: &str) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(name)?;
    raw.trim()
        .parse()
        .map_err(|e| Error::Config(format!("{}: invalid value {:?}: {}", name, raw, e)))
}

/// Reads a humantime duration such as `30s` or `5m`.
pub fn get_duration(name: &str) -> Result<Duration> {
    let raw = get(name)?;
    humantime::parse_duration(raw.trim())
        .map_err(|e| Error::Config(format!("{}: invalid duration {:?}: {}", name, raw, e)))
}

/// The store credential, looked up through the variable named by
/// `STORE_TOKEN_ENV`. Missing or empty is fatal.
pub fn credential() -> Result<String> {
    let env_name = get("STORE_TOKEN_ENV")?;
    get(&env_name).map_err(|_| Error::missing_env_var(&env_name))
}

pub fn catalog_sources() -> &'static [CatalogSourceConfig] {
    &CONFIG.catalog.sources
}

pub fn field_overrides() -> &'static [FieldConfig] {
    &CONFIG.fields
}

/// Overrides a value for the rest of the process.
#[doc(hidden)]
pub fn set(name: &str, value: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.insert(name.to_string(), value.to_string());
    }
}

#[doc(hidden)]
pub fn remove(name: &str) {
    if let Ok(mut store) = CONFIG_STORE.lock() {
        store.remove(name);
    }
}

/// Sets a value in the override store and restores the previous one on drop.
#[doc(hidden)]
pub struct ConfigGuard {
    key: String,
    previous: Option<String>,
}

impl ConfigGuard {
    pub fn new(key: &str, value: &str) -> Self {
        let previous = get_from_store(key);
        set(key, value);
        Self {
            key: key.to_string(),
            previous,
        }
    }
}

impl Drop for ConfigGuard {
    fn drop(&mut self) {
        match &self.previous {
            Some(prev) => set(&self.key, prev),
            None => remove(&self.key),
        }
    }
}

fn get_from_store(name: &str) -> Option<String> {
    if let Ok(store) = CONFIG_STORE.lock() {
        store.get(name).cloned()
    } else {
        None
    }
}

fn config_dir() -> PathBuf {
    std::env::var("SENSORVIEW_CONFIG_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config"))
}

/// Loads `config.toml` and then `config.local.toml` from `dir`; keys in the
/// local file replace those in the base file, table by table.
fn load_config(dir: &Path) -> Result<Config> {
    let mut merged = toml::Table::new();

    for name in ["config.toml", "config.local.toml"] {
        let path = dir.join(name);
        if !path.exists() {
            continue;
        }
        let content = fs::read_to_string(&path)?;
        let table: toml::Table = content
            .parse()
            .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;
        merge_tables(&mut merged, table);
    }

    let config: Config = toml::Value::Table(merged)
        .try_into()
        .map_err(|e: toml::de::Error| Error::Config(e.to_string()))?;
    check_fields(&config.fields)?;
    Ok(config)
}

/// Beyond this many places an `f64` has no digits left to round.
pub const MAX_FIELD_DECIMALS: u32 = 15;

fn check_fields(fields: &[FieldConfig]) -> Result<()> {
    match fields.iter().find(|f| f.decimals > MAX_FIELD_DECIMALS) {
        Some(field) => Err(Error::Config(format!(
            "fields.{}: decimals {} exceeds {}",
            field.name, field.decimals, MAX_FIELD_DECIMALS
        ))),
        None => Ok(()),
    }
}

fn merge_tables(base: &mut toml::Table, local: toml::Table) {
    for (key, value) in local {
        match (base.get_mut(&key), value) {
            (Some(toml::Value::Table(base_table)), toml::Value::Table(local_table)) => {
                merge_tables(base_table, local_table);
            }
            (_, value) => {
                base.insert(key, value);
            }
        }
    }
}

#[cfg(test)]
mod tests;
