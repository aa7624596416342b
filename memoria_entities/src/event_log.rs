//! `EventLog` / `AtomicFact` (§3): a structured `(subject, predicate, object, time)` triple.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "event_log")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub episode_id: Uuid,
    /// The `user_id` the fact is about.
    pub subject: String,
    pub predicate: String,
    pub object: String,
    pub time: DateTimeUtc,
    pub group_id: Option<String>,
    /// JSON array of source `message_id`s.
    pub source_message_ids: Json,
    /// Dedup key: exact `(subject, predicate, object)` equality (§4.E.1),
    /// unlike the freeform-text hash used by episodic/semantic memory.
    pub content_hash: String,
    pub reinforcement_count: i32,
    pub index_pending: bool,
    pub deleted: bool,
    pub version: i32,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
