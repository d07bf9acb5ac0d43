//! In-memory system-of-record lookup, optionally loaded from JSON.
//!
//! The JSON document maps property ids to field objects:
//!
//! ```json
//! { "4500": { "land_value": 150000, "owner": "Benton County" } }
//! ```
//!
//! Values are kept as strings; numbers keep their JSON spelling so the diff
//! can compute exact deltas.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use parcelsync_core::{bounded, normalize_key, SyncError, SyncResult, SystemOfRecord};
use serde_json::Value;

#[derive(Debug, Clone, Default)]
pub struct StaticSystemOfRecord {
    properties: BTreeMap<String, BTreeMap<String, String>>,
}

impl StaticSystemOfRecord {
    pub fn new(properties: BTreeMap<String, BTreeMap<String, String>>) -> Self {
        let properties = properties
            .into_iter()
            .map(|(id, fields)| {
                let fields = fields
                    .into_iter()
                    .map(|(k, v)| (normalize_key(&k), v))
                    .collect();
                (id.trim().to_string(), fields)
            })
            .collect();
        Self { properties }
    }

    pub fn with_property<I, K, V>(mut self, property_id: &str, fields: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        let fields = fields
            .into_iter()
            .map(|(k, v)| (normalize_key(k.as_ref()), v.into()))
            .collect();
        self.properties.insert(property_id.trim().to_string(), fields);
        self
    }

    pub fn from_json_str(json: &str) -> SyncResult<Self> {
        let document: Value = serde_json::from_str(json)
            .map_err(|e| SyncError::InvalidInput(format!("System of record is not JSON: {}", e)))?;
        let Value::Object(properties) = document else {
            return Err(SyncError::InvalidInput(
                "System of record must be a JSON object keyed by property id".to_string(),
            ));
        };

        let mut parsed = BTreeMap::new();
        for (property_id, fields) in properties {
            let Value::Object(fields) = fields else {
                return Err(SyncError::InvalidInput(format!(
                    "System of record entry '{}' must be an object of fields",
                    property_id
                )));
            };
            let fields = fields
                .into_iter()
                .filter_map(|(field, value)| value_to_string(value).map(|v| (field, v)))
                .collect();
            parsed.insert(property_id, fields);
        }
        Ok(Self::new(parsed))
    }

    pub async fn load(path: &Path, io_timeout: Duration) -> SyncResult<Self> {
        let json = bounded(io_timeout, "system of record read", tokio::fs::read_to_string(path))
            .await?;
        let loaded = Self::from_json_str(&json)?;
        tracing::info!(
            path = %path.display(),
            properties = loaded.properties.len(),
            "Loaded system of record"
        );
        Ok(loaded)
    }
}

fn value_to_string(value: Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        other => Some(other.to_string()),
    }
}

#[async_trait]
impl SystemOfRecord for StaticSystemOfRecord {
    async fn current_values(&self, property_id: &str) -> Result<BTreeMap<String, String>, SyncError> {
        Ok(self
            .properties
            .get(property_id.trim())
            .cloned()
            .unwrap_or_default())
    }
}
