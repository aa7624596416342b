//! `ConversationMeta` (§3): per-group configuration, upserted on `group_id`.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "conversation_meta")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    /// `None` acts as the default (groupless) configuration record.
    #[sea_orm(unique)]
    pub group_id: Option<String>,
    /// `assistant` | `group_chat`, immutable post-creation.
    pub scene: String,
    pub scene_desc: Option<String>,
    pub name: Option<String>,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub default_timezone: String,
    /// JSON map `user_id -> {full_name, role, custom_role, extra}`.
    pub user_details: Json,
    /// JSON array of tags.
    pub tags: Json,
    /// Compare-and-set guard for PATCH (§4.J, §5 "ConversationMeta writes").
    pub version: i32,
    pub conversation_created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
