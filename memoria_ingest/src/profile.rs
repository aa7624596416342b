//! `ProfileBuilder` (component I, §4.I, §4.I.1): applies `ProfilePatch`
//! values emitted by the `Extractor` to the `Profile` doc-store row for the
//! patch's `(user_id, group_id)`, last-writer-wins scoped by
//! `attribute_path` with a confidence/recency override rule.

use std::sync::Arc;

use chrono::{Duration, Utc};
use memoria_config::ProfileConfig;
use memoria_core::port::{DocFilter, DocStorePort, PortError};
use memoria_entities::profile;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use crate::extractor::ProfilePatch;

/// One entry of the bounded provenance log stored per-attribute (§3.1).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvenanceEntry {
    pub memory_id: Uuid,
    pub attribute_path: String,
    pub value: serde_json::Value,
    pub confidence: f64,
    pub applied_at: chrono::DateTime<Utc>,
    pub superseded: bool,
}

pub struct ProfileBuilder {
    store: Arc<dyn DocStorePort<profile::Model>>,
    config: ProfileConfig,
    provenance_cap: usize,
}

impl ProfileBuilder {
    #[must_use]
    pub const fn new(
        store: Arc<dyn DocStorePort<profile::Model>>,
        config: ProfileConfig,
        provenance_cap: usize,
    ) -> Self {
        Self {
            store,
            config,
            provenance_cap,
        }
    }

    /// Applies every patch in order (§4.I.1 "synchronously as part of...
    /// `extract`'s return value").
    pub async fn apply_patches(&self, patches: Vec<ProfilePatch>) -> Result<(), PortError> {
        for patch in patches {
            self.apply_one(patch).await?;
        }
        Ok(())
    }

    async fn apply_one(&self, patch: ProfilePatch) -> Result<(), PortError> {
        let existing = self
            .store
            .query(&DocFilter {
                user_id: Some(patch.user_id.clone()),
                group_id: patch.group_id.clone(),
                ..Default::default()
            })
            .await?
            .into_iter()
            .next();

        match existing {
            Some(mut row) => {
                if !self.should_apply(&row, &patch) {
                    return Ok(());
                }
                self.merge_into(&mut row, &patch);
                row.version += 1;
                row.last_updated = Utc::now();
                self.store.patch(
                    row.id,
                    serde_json::json!({
                        "attributes": row.attributes,
                        "provenance": row.provenance,
                        "version": row.version,
                        "last_updated": row.last_updated,
                    }),
                )
                .await
            }
            None => {
                let mut row = profile::Model {
                    id: Uuid::now_v7(),
                    user_id: patch.user_id.clone(),
                    group_id: patch.group_id.clone(),
                    attributes: serde_json::json!({}),
                    provenance: serde_json::json!({}),
                    version: 1,
                    last_updated: Utc::now(),
                    deleted: false,
                    created_at: Utc::now(),
                };
                self.merge_into(&mut row, &patch);
                self.store.put(&row).await
            }
        }
    }

    /// Last-writer-wins, except a lower-confidence patch within the
    /// recency window is skipped (§4.I).
    fn should_apply(&self, row: &profile::Model, patch: &ProfilePatch) -> bool {
        let Some(existing_entries) = row.provenance.get(&patch.attribute_path).and_then(|v| v.as_array()) else {
            return true;
        };
        let Some(last) = existing_entries.last() else {
            return true;
        };
        let stored_confidence = last.get("confidence").and_then(serde_json::Value::as_f64).unwrap_or(0.0);
        let stored_timestamp = last
            .get("applied_at")
            .and_then(serde_json::Value::as_str)
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc));

        if patch.confidence < stored_confidence {
            if let Some(ts) = stored_timestamp {
                let within_window = Utc::now() - ts < Duration::days(self.config.recency_window_days);
                if within_window {
                    info!(
                        attribute_path = %patch.attribute_path,
                        "skipping lower-confidence patch inside recency window"
                    );
                    return false;
                }
            }
        }
        true
    }

    fn merge_into(&self, row: &mut profile::Model, patch: &ProfilePatch) {
        if let serde_json::Value::Object(map) = &mut row.attributes {
            map.insert(patch.attribute_path.clone(), patch.value.clone());
        } else {
            let mut map = serde_json::Map::new();
            map.insert(patch.attribute_path.clone(), patch.value.clone());
            row.attributes = serde_json::Value::Object(map);
        }

        let entry = serde_json::json!({
            "memory_id": patch.provenance_memory_id,
            "attribute_path": patch.attribute_path,
            "value": patch.value,
            "confidence": patch.confidence,
            "applied_at": patch.timestamp.to_rfc3339(),
            "superseded": false,
        });

        if !row.provenance.is_object() {
            row.provenance = serde_json::json!({});
        }
        let Some(provenance) = row.provenance.as_object_mut() else {
            return;
        };
        let log = provenance
            .entry(patch.attribute_path.clone())
            .or_insert_with(|| serde_json::json!([]));
        if let Some(arr) = log.as_array_mut() {
            for prior in arr.iter_mut() {
                if let Some(obj) = prior.as_object_mut() {
                    obj.insert("superseded".to_string(), serde_json::Value::Bool(true));
                }
            }
            arr.push(entry);
            if arr.len() > self.provenance_cap {
                if let Some(idx) = arr.iter().position(|e| {
                    e.get("superseded").and_then(serde_json::Value::as_bool).unwrap_or(false)
                }) {
                    arr.remove(idx);
                } else {
                    arr.remove(0);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct InMemoryProfileStore {
        rows: Mutex<Vec<profile::Model>>,
    }

    #[async_trait::async_trait]
    impl DocStorePort<profile::Model> for InMemoryProfileStore {
        async fn put(&self, record: &profile::Model) -> Result<(), PortError> {
            self.rows.lock().unwrap_or_else(|e| e.into_inner()).push(record.clone());
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<profile::Model>, PortError> {
            Ok(self.rows.lock().unwrap_or_else(|e| e.into_inner()).iter().find(|r| r.id == id).cloned())
        }

        async fn query(&self, filter: &DocFilter) -> Result<Vec<profile::Model>, PortError> {
            Ok(self
                .rows
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .iter()
                .filter(|r| filter.user_id.as_deref().is_none_or(|u| r.user_id == u))
                .cloned()
                .collect())
        }

        async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
            let mut rows = self.rows.lock().unwrap_or_else(|e| e.into_inner());
            let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
                return Err(PortError::NotFound(id.to_string()));
            };
            if let Some(attrs) = fields.get("attributes") {
                row.attributes = attrs.clone();
            }
            if let Some(prov) = fields.get("provenance") {
                row.provenance = prov.clone();
            }
            if let Some(v) = fields.get("version").and_then(serde_json::Value::as_i64) {
                row.version = v as i32;
            }
            Ok(())
        }

        async fn soft_delete(&self, _filter: &DocFilter) -> Result<u64, PortError> {
            Ok(0)
        }
    }

    fn patch(confidence: f64) -> ProfilePatch {
        ProfilePatch {
            user_id: "u1".to_string(),
            group_id: None,
            attribute_path: "location".to_string(),
            value: serde_json::json!("Seattle"),
            provenance_memory_id: Uuid::now_v7(),
            confidence,
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn creates_profile_on_first_patch() {
        let store = Arc::new(InMemoryProfileStore::default());
        let builder = ProfileBuilder::new(store.clone(), ProfileConfig::default(), 50);
        builder.apply_patches(vec![patch(0.9)]).await.unwrap();

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].attributes["location"], serde_json::json!("Seattle"));
    }

    #[tokio::test]
    async fn lower_confidence_patch_within_recency_window_is_skipped() {
        let store = Arc::new(InMemoryProfileStore::default());
        let builder = ProfileBuilder::new(store.clone(), ProfileConfig::default(), 50);
        builder.apply_patches(vec![patch(0.9)]).await.unwrap();

        let mut weaker = patch(0.1);
        weaker.value = serde_json::json!("Portland");
        builder.apply_patches(vec![weaker]).await.unwrap();

        let rows = store.rows.lock().unwrap();
        assert_eq!(rows[0].attributes["location"], serde_json::json!("Seattle"));
    }
}
