use crate::Result;
use crate::cache::{CacheKey, QueryCache};
use crate::logging::*;
use crate::normalize::{FieldRules, PresentedSeries, normalize, valid_columns};
use crate::query::build_query;
use crate::result_set::RawResultSet;
use crate::store::Store;
use crate::window::{NaivePolicy, StopInstant, TimeWindow, build_window};
use serde::Serialize;
use std::sync::Arc;

/// What one interaction asks for.
#[derive(Debug, Clone, PartialEq)]
pub struct ViewRequest {
    pub source: String,
    pub table: String,
    pub field: String,
    pub duration_minutes: i64,
    pub stop: Option<StopInstant>,
}

/// A rendered-ready answer together with the window it covers.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct View {
    pub source: String,
    pub table: String,
    pub field: String,
    pub window: TimeWindow,
    #[serde(flatten)]
    pub series: PresentedSeries,
}

/// Runs window, query, store and normalizer for each interaction.
pub struct Viewer {
    store: Arc<dyn Store>,
    cache: QueryCache,
    rules: FieldRules,
    policy: NaivePolicy,
}

impl Viewer {
    pub fn new(
        store: Arc<dyn Store>,
        cache: QueryCache,
        rules: FieldRules,
        policy: NaivePolicy,
    ) -> Self {
        Self {
            store,
            cache,
            rules,
            policy,
        }
    }

    pub fn from_config(store: Arc<dyn Store>) -> Result<Self> {
        Ok(Self::new(
            store,
            QueryCache::from_config()?,
            FieldRules::from_config(),
            NaivePolicy::from_config()?,
        ))
    }

    pub fn policy(&self) -> NaivePolicy {
        self.policy
    }

    pub fn rules(&self) -> &FieldRules {
        &self.rules
    }

    /// Raw rows of `table` for the window, from the cache when the same
    /// request was answered before.
    pub async fn fetch(
        &mut self,
        source: &str,
        table: &str,
        duration_minutes: i64,
        stop: Option<StopInstant>,
    ) -> Result<(TimeWindow, Arc<RawResultSet>)> {
        let window = build_window(stop, duration_minutes, self.policy)?;
        let log = DEFAULT.new(o!(
            "function" => "Viewer::fetch",
            "source" => source.to_owned(),
            "table" => table.to_owned(),
            "start" => window.start_str(),
            "stop" => window.stop_str(),
        ));

        let key = CacheKey::new(source, table, duration_minutes, window.stop);
        if let Some(hit) = self.cache.get(&key) {
            debug!(log, "cache hit"; "rows" => hit.len());
            return Ok((window, hit));
        }

        let query = build_query(source, table, &window, self.store.dialect());
        let raw = match self.store.query(&query).await {
            Ok(raw) => Arc::new(raw),
            Err(e) => {
                warn!(log, "query failed"; "error" => %e);
                return Err(e);
            }
        };
        info!(log, "fetched"; "rows" => raw.len(), "columns" => raw.columns().len());
        self.cache.insert(key, Arc::clone(&raw));
        Ok((window, raw))
    }

    /// Columns of the window's rows that can be offered as fields.
    pub async fn fields(
        &mut self,
        source: &str,
        table: &str,
        duration_minutes: i64,
        stop: Option<StopInstant>,
    ) -> Result<Vec<String>> {
        let (_, raw) = self.fetch(source, table, duration_minutes, stop).await?;
        Ok(valid_columns(&raw))
    }

    pub async fn view(&mut self, request: &ViewRequest) -> Result<View> {
        let (window, raw) = self
            .fetch(
                &request.source,
                &request.table,
                request.duration_minutes,
                request.stop,
            )
            .await?;
        let series = normalize(&raw, &request.field, &self.rules)?;
        Ok(View {
            source: request.source.clone(),
            table: request.table.clone(),
            field: request.field.clone(),
            window,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::Error;
    use crate::testing::{RecordingStore, ambient_rows, test_viewer as viewer};

    fn ambient_store() -> Arc<RecordingStore> {
        RecordingStore::new(ambient_rows())
    }

    fn request(field: &str) -> ViewRequest {
        ViewRequest {
            source: "temperature".to_string(),
            table: "ambient_data".to_string(),
            field: field.to_string(),
            duration_minutes: 360,
            stop: Some("2024-01-01T12:00:00Z".parse().unwrap()),
        }
    }

    #[tokio::test]
    async fn test_view_temperature() {
        let store = ambient_store();
        let mut viewer = viewer(store.clone());

        let view = viewer.view(&request("temperature")).await.unwrap();
        assert_eq!(view.window.start_str(), "2024-01-01T06:00:00Z");
        assert_eq!(view.series.value_label, "Temperature (Celsius)");
        assert_eq!(view.series.points.len(), 3);

        let queries = store.queries.lock().unwrap();
        assert_eq!(queries[0].database, "temperature");
        assert!(queries[0].text.contains("FROM \"ambient_data\""));
    }

    #[tokio::test]
    async fn test_second_field_is_served_from_cache() {
        let store = ambient_store();
        let mut viewer = viewer(store.clone());

        viewer.view(&request("temperature")).await.unwrap();
        let gas = viewer.view(&request("gas")).await.unwrap();
        assert_eq!(gas.series.points[0].value, 123.5);
        assert_eq!(store.query_count(), 1);

        let mut longer = request("gas");
        longer.duration_minutes = 720;
        viewer.view(&longer).await.unwrap();
        assert_eq!(store.query_count(), 2);
    }

    #[tokio::test]
    async fn test_fields_lists_valid_columns() {
        let mut viewer = viewer(ambient_store());
        let req = request("temperature");
        let fields = viewer
            .fields(&req.source, &req.table, req.duration_minutes, req.stop)
            .await
            .unwrap();
        assert_eq!(fields, vec!["temperature", "gas"]);
    }

    #[tokio::test]
    async fn test_absent_field_is_no_data() {
        let mut viewer = viewer(ambient_store());
        let err = viewer.view(&request("visible_light_lux")).await.unwrap_err();
        assert!(err.is_no_data());
    }

    #[tokio::test]
    async fn test_invalid_duration_does_not_query() {
        let store = ambient_store();
        let mut viewer = viewer(store.clone());
        let mut req = request("temperature");
        req.duration_minutes = 0;
        assert!(matches!(
            viewer.view(&req).await,
            Err(Error::InvalidDuration(_))
        ));
        assert_eq!(store.query_count(), 0);
    }

    #[tokio::test]
    async fn test_view_serializes_flat() {
        let mut viewer = viewer(ambient_store());
        let view = viewer.view(&request("temperature")).await.unwrap();
        let value = serde_json::to_value(&view).unwrap();
        assert_eq!(value["value_label"], "Temperature (Celsius)");
        assert_eq!(value["time_label"], "Date-Time");
        assert_eq!(value["window"]["stop"], "2024-01-01T12:00:00Z");
        assert_eq!(value["points"][0]["value"], 18.2);
    }
}
