//! `EpisodicMemory` (§3): one row per closed episode.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "episodic_memory")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub episode_id: Uuid,
    pub user_id: String,
    pub group_id: Option<String>,
    pub timestamp: DateTimeUtc,
    #[sea_orm(column_type = "Text")]
    pub summary: String,
    #[sea_orm(column_type = "Text")]
    pub content: String,
    /// JSON array of source `message_id`s.
    pub source_message_ids: Json,
    pub importance: f64,
    /// `complete` | `partial` | `failed` (§3.1).
    pub extraction_status: String,
    pub content_hash: String,
    pub reinforcement_count: i32,
    /// True while the text/vector leg of the write is still queued for
    /// reconciliation (§4.E). Visible for fetch, invisible for search.
    pub index_pending: bool,
    pub deleted: bool,
    pub version: i32,
    pub created_at: DateTimeUtc,
    pub updated_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
