//! Metadata endpoints contract (§6 "Metadata endpoints"): GET/POST(upsert)/PATCH
//! over `ConversationMeta` rows (§3).

use chrono::Utc;
use memoria_entities::conversation_meta;
use memoria_memory::{IMMUTABLE_CONVERSATION_META_FIELDS, PATCHABLE_CONVERSATION_META_FIELDS};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MetadataGetRequest {
    /// Absent = the default (groupless) configuration row (§3 "Lifecycle").
    pub group_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct UpsertRequest {
    pub group_id: Option<String>,
    /// `assistant` | `group_chat`, immutable once the row exists (§3).
    pub scene: String,
    pub scene_desc: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    #[serde(default = "default_timezone")]
    pub default_timezone: String,
    #[serde(default = "default_user_details")]
    pub user_details: serde_json::Value,
    #[serde(default = "default_tags")]
    pub tags: serde_json::Value,
}

fn default_timezone() -> String {
    "UTC".to_string()
}
fn default_user_details() -> serde_json::Value {
    serde_json::json!({})
}
fn default_tags() -> serde_json::Value {
    serde_json::json!([])
}

impl UpsertRequest {
    /// Builds a fresh row for `ConversationMetaStore::upsert` (§3 "created
    /// via upsert on `group_id`"); the store itself leaves
    /// `version`/`scene`/`group_id`/`conversation_created_at` untouched on
    /// a repeat upsert, so these values only take effect on first creation.
    pub fn into_model(self) -> Result<conversation_meta::Model, ApiError> {
        if self.scene != "assistant" && self.scene != "group_chat" {
            return Err(ApiError::invalid_parameter(format!(
                "scene must be 'assistant' or 'group_chat', got {:?}",
                self.scene
            )));
        }
        Ok(conversation_meta::Model {
            id: Uuid::now_v7(),
            group_id: self.group_id,
            scene: self.scene,
            scene_desc: self.scene_desc,
            name: self.name,
            description: self.description,
            default_timezone: self.default_timezone,
            user_details: self.user_details,
            tags: self.tags,
            version: 1,
            conversation_created_at: Utc::now(),
        })
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PatchRequest {
    pub group_id: Option<String>,
    /// Must be a subset of `PATCHABLE_CONVERSATION_META_FIELDS` (§6, §8
    /// property 7, S5).
    pub fields: serde_json::Value,
}

impl PatchRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        let serde_json::Value::Object(map) = &self.fields else {
            return Err(ApiError::invalid_parameter("fields must be a JSON object"));
        };
        for key in map.keys() {
            if IMMUTABLE_CONVERSATION_META_FIELDS.contains(&key.as_str()) {
                return Err(ApiError::invalid_parameter(format!(
                    "field {key:?} is immutable post-creation"
                )));
            }
            if !PATCHABLE_CONVERSATION_META_FIELDS.contains(&key.as_str()) {
                return Err(ApiError::invalid_parameter(format!(
                    "field {key:?} is not a recognized patchable field"
                )));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub status: &'static str,
    pub conversation_meta: conversation_meta::Model,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_invalid_scene() {
        let req = UpsertRequest {
            group_id: Some("g1".to_string()),
            scene: "bogus".to_string(),
            scene_desc: None,
            name: None,
            description: None,
            default_timezone: default_timezone(),
            user_details: default_user_details(),
            tags: default_tags(),
        };
        assert!(req.into_model().is_err());
    }

    #[test]
    fn patch_rejects_immutable_field() {
        let req = PatchRequest {
            group_id: Some("g1".to_string()),
            fields: serde_json::json!({"scene": "assistant"}),
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn patch_accepts_patchable_fields() {
        let req = PatchRequest {
            group_id: Some("g1".to_string()),
            fields: serde_json::json!({"name": "new name"}),
        };
        assert!(req.validate().is_ok());
    }

    #[test]
    fn patch_rejects_unknown_field() {
        let req = PatchRequest {
            group_id: Some("g1".to_string()),
            fields: serde_json::json!({"made_up_field": 1}),
        };
        assert!(req.validate().is_err());
    }
}
