use crate::Result;
use crate::config::{self, CatalogSourceConfig};
use crate::errors::Error;
use crate::logging::*;
use crate::store::Store;
use async_trait::async_trait;
use std::fmt::{self, Display};
use std::str::FromStr;
use std::sync::Arc;

const DEFAULT_SOURCES: [(&str, &[&str]); 5] = [
    ("temperature", &["ambient_data"]),
    ("noise", &["noise_level"]),
    ("aqi", &["air_quality_data"]),
    ("pm", &["air_quality_data_0", "air_quality_data_1"]),
    ("light", &["light_data"]),
];

/// Selectable sources and their tables. Lists are ready to show as options
/// and never contain internal or system entries.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn list_sources(&self) -> Result<Vec<String>>;

    async fn list_tables(&self, source: &str) -> Result<Vec<String>>;

    /// The table to use when the caller named none: only defined when the
    /// source has exactly one.
    async fn implicit_table(&self, source: &str) -> Result<Option<String>> {
        let mut tables = self.list_tables(source).await?;
        Ok(if tables.len() == 1 { tables.pop() } else { None })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CatalogMode {
    #[default]
    Static,
    Introspect,
}

impl CatalogMode {
    pub fn from_config() -> Result<Self> {
        config::get_parsed("CATALOG_MODE")
    }
}

impl FromStr for CatalogMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "static" => Ok(CatalogMode::Static),
            "introspect" => Ok(CatalogMode::Introspect),
            other => Err(Error::Config(format!(
                "unknown catalog mode {:?} (expected static or introspect)",
                other
            ))),
        }
    }
}

impl Display for CatalogMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CatalogMode::Static => write!(f, "static"),
            CatalogMode::Introspect => write!(f, "introspect"),
        }
    }
}

/// Fixed enumeration, from `[[catalog.sources]]` or the built-in layout.
#[derive(Debug, Clone, PartialEq)]
pub struct StaticCatalog {
    sources: Vec<CatalogSourceConfig>,
}

impl Default for StaticCatalog {
    fn default() -> Self {
        let sources = DEFAULT_SOURCES
            .iter()
            .map(|(name, tables)| CatalogSourceConfig {
                name: name.to_string(),
                tables: tables.iter().map(|t| t.to_string()).collect(),
            })
            .collect();
        Self { sources }
    }
}

impl StaticCatalog {
    pub fn new(sources: Vec<CatalogSourceConfig>) -> Self {
        Self { sources }
    }

    pub fn from_config() -> Self {
        match config::catalog_sources() {
            [] => Self::default(),
            sources => Self::new(sources.to_vec()),
        }
    }
}

#[async_trait]
impl Catalog for StaticCatalog {
    async fn list_sources(&self) -> Result<Vec<String>> {
        Ok(self.sources.iter().map(|s| s.name.clone()).collect())
    }

    async fn list_tables(&self, source: &str) -> Result<Vec<String>> {
        self.sources
            .iter()
            .find(|s| s.name == source)
            .map(|s| s.tables.clone())
            .ok_or_else(|| Error::QueryFailure(format!("unknown source: {}", source)))
    }
}

/// Asks the store itself; the store filters internal entries.
pub struct StoreCatalog {
    store: Arc<dyn Store>,
}

impl StoreCatalog {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Catalog for StoreCatalog {
    async fn list_sources(&self) -> Result<Vec<String>> {
        let log = DEFAULT.new(o!("function" => "StoreCatalog::list_sources"));
        let mut sources = self.store.list_databases().await?;
        sources.sort();
        debug!(log, "listed"; "count" => sources.len());
        Ok(sources)
    }

    async fn list_tables(&self, source: &str) -> Result<Vec<String>> {
        let log = DEFAULT.new(o!(
            "function" => "StoreCatalog::list_tables",
            "source" => source.to_owned(),
        ));
        let mut tables = self.store.list_tables(source).await?;
        tables.sort();
        debug!(log, "listed"; "count" => tables.len());
        Ok(tables)
    }
}

pub fn from_config(store: Arc<dyn Store>) -> Result<Box<dyn Catalog>> {
    let catalog: Box<dyn Catalog> = match CatalogMode::from_config()? {
        CatalogMode::Static => Box::new(StaticCatalog::from_config()),
        CatalogMode::Introspect => Box::new(StoreCatalog::new(store)),
    };
    Ok(catalog)
}
