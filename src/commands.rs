pub mod browse;
pub mod chart;
pub mod fields;
pub mod sources;
pub mod tables;

use crate::catalog::{self, Catalog};
use crate::session::{DurationRange, parse_stop_date, parse_stop_time, stop_from_parts};
use crate::store::{self, Store, StoreSettings};
use crate::viewer::Viewer;
use crate::window::{NaivePolicy, StopInstant};
use anyhow::{Context as _, Result, bail};
use clap::Args;
use std::sync::Arc;

/// Window selection shared by the commands that query rows.
#[derive(Debug, Clone, Default, Args)]
pub struct WindowArgs {
    /// Window length in minutes (default from DURATION_DEFAULT_MINUTES)
    #[arg(long)]
    pub minutes: Option<i64>,

    /// Stop date, YYYY-MM-DD (default: today)
    #[arg(long)]
    pub stop_date: Option<String>,

    /// Stop time, HH:MM[:SS] (default: now)
    #[arg(long)]
    pub stop_time: Option<String>,
}

impl WindowArgs {
    pub fn resolve(
        &self,
        range: &DurationRange,
        policy: NaivePolicy,
    ) -> crate::Result<(i64, Option<StopInstant>)> {
        let minutes = range.check(self.minutes.unwrap_or(range.default))?;
        let date = self.stop_date.as_deref().map(parse_stop_date).transpose()?;
        let time = self.stop_time.as_deref().map(parse_stop_time).transpose()?;
        Ok((minutes, stop_from_parts(date, time, policy.naive_now())))
    }
}

/// Everything a command needs, built once from configuration.
pub struct Context {
    pub catalog: Box<dyn Catalog>,
    pub viewer: Viewer,
    pub range: DurationRange,
}

impl Context {
    pub fn new(catalog: Box<dyn Catalog>, viewer: Viewer, range: DurationRange) -> Self {
        Self {
            catalog,
            viewer,
            range,
        }
    }

    /// Fails on a missing credential before any store is contacted.
    pub fn from_config() -> Result<Self> {
        let settings = StoreSettings::from_config().context("Failed to read store settings")?;
        let store: Arc<dyn Store> = store::connect(&settings)?;
        Ok(Self::new(
            catalog::from_config(Arc::clone(&store))?,
            Viewer::from_config(store)?,
            DurationRange::from_config()?,
        ))
    }

    /// The named table, or the only table of `source` when none is named.
    pub async fn resolve_table(&self, source: &str, table: Option<&str>) -> Result<String> {
        if let Some(table) = table {
            return Ok(table.to_string());
        }
        if let Some(table) = self.catalog.implicit_table(source).await? {
            return Ok(table);
        }
        let tables = self.catalog.list_tables(source).await?;
        bail!(
            "source {} has {} tables ({}); pick one with --table",
            source,
            tables.len(),
            tables.join(", ")
        )
    }
}
