//! Ingestion-facing data shapes (§3): `Message`, `ConversationMeta`, `Scene`
//! and the `Episode` the boundary detector closes a buffer into.

use chrono::{DateTime, Utc};
use memoria_core::Role;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// `assistant` vs `group_chat` (§3 ConversationMeta, §4.B "conversation_key").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scene {
    Assistant,
    GroupChat,
}

/// Immutable input record (§3 "Message").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub message_id: String,
    pub create_time: DateTime<Utc>,
    pub sender: String,
    pub sender_name: Option<String>,
    pub role: Role,
    pub content: String,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
    #[serde(default)]
    pub refer_list: Vec<String>,
}

/// Per-group configuration (§3 "ConversationMeta").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationMeta {
    pub group_id: Option<String>,
    pub scene: Scene,
    pub scene_desc: Option<String>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub default_timezone: String,
    pub user_details: serde_json::Value,
    pub tags: serde_json::Value,
}

impl Default for ConversationMeta {
    fn default() -> Self {
        Self {
            group_id: None,
            scene: Scene::Assistant,
            scene_desc: None,
            name: None,
            description: None,
            default_timezone: "UTC".to_string(),
            user_details: serde_json::json!({}),
            tags: serde_json::json!([]),
        }
    }
}

impl From<memoria_entities::conversation_meta::Model> for ConversationMeta {
    fn from(row: memoria_entities::conversation_meta::Model) -> Self {
        Self {
            group_id: row.group_id,
            scene: if row.scene == "group_chat" {
                Scene::GroupChat
            } else {
                Scene::Assistant
            },
            scene_desc: row.scene_desc,
            name: row.name,
            description: row.description,
            default_timezone: row.default_timezone,
            user_details: row.user_details,
            tags: row.tags,
        }
    }
}

/// A closed, ordered sequence of messages treated as one unit of extraction
/// (§3 "Episode"). Not persisted as a first-class row; referenced by derived
/// memories via `episode_id`.
#[derive(Debug, Clone)]
pub struct Episode {
    pub episode_id: Uuid,
    pub group_id: Option<String>,
    pub conversation_key: String,
    pub messages: Vec<Message>,
    pub end_time: DateTime<Utc>,
}

impl Episode {
    /// Builds an episode from a partition's accumulated messages, sorting by
    /// `create_time` ascending with `message_id` as the tie-break (§4.B
    /// "Ordering", §8 property 2).
    #[must_use]
    pub fn close(group_id: Option<String>, conversation_key: String, mut messages: Vec<Message>) -> Self {
        messages.sort_by(|a, b| a.create_time.cmp(&b.create_time).then_with(|| a.message_id.cmp(&b.message_id)));
        let end_time = messages.last().map_or_else(Utc::now, |m| m.create_time);
        Self {
            episode_id: Uuid::now_v7(),
            group_id,
            conversation_key,
            messages,
            end_time,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn conversation_meta_from_row_maps_scene() {
        let row = memoria_entities::conversation_meta::Model {
            id: Uuid::now_v7(),
            group_id: Some("g1".to_string()),
            scene: "group_chat".to_string(),
            scene_desc: None,
            name: None,
            description: None,
            default_timezone: "UTC".to_string(),
            user_details: serde_json::json!({}),
            tags: serde_json::json!([]),
            version: 1,
            conversation_created_at: Utc::now(),
        };
        let meta: ConversationMeta = row.into();
        assert_eq!(meta.scene, Scene::GroupChat);
        assert_eq!(meta.group_id.as_deref(), Some("g1"));
    }
}
