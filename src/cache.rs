use crate::Result;
use crate::config;
use crate::result_set::RawResultSet;
use chrono::{DateTime, Utc};
use moka::sync::Cache;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub source: String,
    pub table: String,
    pub duration_minutes: i64,
    pub stop: DateTime<Utc>,
}

impl CacheKey {
    pub fn new(source: &str, table: &str, duration_minutes: i64, stop: DateTime<Utc>) -> Self {
        Self {
            source: source.to_string(),
            table: table.to_string(),
            duration_minutes,
            stop,
        }
    }
}

/// Raw results of earlier queries. Owned by whoever drives the queries.
///
/// Entries live for `ttl` after insertion; past `max_entries` the cache
/// evicts by its own admission policy.
#[derive(Debug)]
pub struct QueryCache {
    entries: Option<Cache<CacheKey, Arc<RawResultSet>>>,
}

impl QueryCache {
    /// Zero capacity or zero TTL disables caching.
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        if max_entries == 0 || ttl.is_zero() {
            return Self { entries: None };
        }
        let entries = Cache::builder()
            .max_capacity(max_entries as u64)
            .time_to_live(ttl)
            .build();
        Self {
            entries: Some(entries),
        }
    }

    pub fn from_config() -> Result<Self> {
        Ok(Self::new(
            config::get_duration("CACHE_TTL")?,
            config::get_parsed("CACHE_MAX_ENTRIES")?,
        ))
    }

    pub fn is_disabled(&self) -> bool {
        self.entries.is_none()
    }

    pub fn get(&self, key: &CacheKey) -> Option<Arc<RawResultSet>> {
        self.entries.as_ref()?.get(key)
    }

    pub fn insert(&self, key: CacheKey, result: Arc<RawResultSet>) {
        if let Some(entries) = &self.entries {
            entries.insert(key, result);
        }
    }

    /// Live entries once pending evictions have been applied.
    pub fn len(&self) -> usize {
        match &self.entries {
            Some(entries) => {
                entries.run_pending_tasks();
                entries.entry_count() as usize
            }
            None => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn clear(&self) {
        if let Some(entries) = &self.entries {
            entries.invalidate_all();
        }
    }
}
