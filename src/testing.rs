//! Store doubles shared by unit tests.

use crate::Result;
use crate::cache::QueryCache;
use crate::normalize::FieldRules;
use crate::query::{Dialect, QuerySpec};
use crate::result_set::{RawResultSet, SQL_TIME_COLUMN};
use crate::store::Store;
use crate::viewer::Viewer;
use crate::window::NaivePolicy;
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Answers every query with the same rows and records what it was asked.
pub struct RecordingStore {
    rows: Value,
    pub queries: Mutex<Vec<QuerySpec>>,
}

impl RecordingStore {
    pub fn new(rows: Value) -> Arc<Self> {
        Arc::new(Self {
            rows,
            queries: Mutex::new(Vec::new()),
        })
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl Store for RecordingStore {
    fn dialect(&self) -> Dialect {
        Dialect::Sql
    }

    async fn query(&self, query: &QuerySpec) -> Result<RawResultSet> {
        self.queries.lock().unwrap().push(query.clone());
        let rows = serde_json::from_value(self.rows.clone())?;
        Ok(RawResultSet::from_rows(SQL_TIME_COLUMN, rows))
    }

    async fn list_databases(&self) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    async fn list_tables(&self, _database: &str) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

/// Three readings between 06:00 and 12:00 UTC on 2024-01-01.
pub fn ambient_rows() -> Value {
    json!([
        {"time": "2024-01-01T06:00:00", "temperature": 18.24, "gas": 123456.7},
        {"time": "2024-01-01T09:00:00", "temperature": 19.66, "gas": 98812.0},
        {"time": "2024-01-01T12:00:00", "temperature": 18.97, "gas": 100049.9},
    ])
}

pub fn test_viewer(store: Arc<RecordingStore>) -> Viewer {
    Viewer::new(
        store,
        QueryCache::new(Duration::from_secs(300), 8),
        FieldRules::builtin(),
        NaivePolicy::AssumeUtc,
    )
}
