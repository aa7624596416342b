//! `Profile` (§3): per-`(user_id, group_id)` aggregated attributes with provenance.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "profile")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub user_id: String,
    pub group_id: Option<String>,
    /// JSON map `attribute_path -> value` (§4.I).
    pub attributes: Json,
    /// JSON array of provenance log entries, capped per `attribute_path`
    /// (§3.1): `{memory_id, attribute_path, value, confidence, applied_at, superseded}`.
    pub provenance: Json,
    pub version: i32,
    pub last_updated: DateTimeUtc,
    pub deleted: bool,
    pub created_at: DateTimeUtc,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
