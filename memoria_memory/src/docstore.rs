//! Sea-orm-backed `DocStorePort<T>` implementations (§4.A, §4.E): one
//! repository per memory-variant table, mirroring the donor's
//! `DatabaseCardRepository` pattern of a thin struct wrapping a
//! `DatabaseConnection` and implementing a port trait against one entity.
//!
//! `patch` is a generic JSON merge-patch: the stored row is serialized to
//! `serde_json::Value`, the caller's object is merged shallowly on top, and
//! the result is deserialized back into the row type before `update`. This
//! keeps one implementation per entity instead of per-field setters, at the
//! cost of a round trip through `serde_json` — acceptable since `patch` is
//! reserved for low-frequency profile/metadata updates (§4.E contract).

use async_trait::async_trait;
use chrono::Utc;
use memoria_core::port::{DocFilter, DocStorePort, PortError};
use memoria_entities::{conversation_meta, episodic_memory, event_log, foresight, profile, semantic_memory};
use sea_orm::{ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, IntoActiveModel, QueryFilter, Set};
use uuid::Uuid;

fn transient(collaborator: &'static str, err: sea_orm::DbErr) -> PortError {
    PortError::Transient {
        collaborator,
        source: err.into(),
    }
}

fn not_found(id: Uuid) -> PortError {
    PortError::NotFound(id.to_string())
}

fn merge_patch<M>(existing: M, fields: serde_json::Value) -> Result<M, PortError>
where
    M: serde::Serialize + for<'de> serde::Deserialize<'de>,
{
    let mut value = serde_json::to_value(existing)
        .map_err(|e| PortError::Rejected(format!("serializing row for patch: {e}")))?;
    if let (Some(target), serde_json::Value::Object(incoming)) = (value.as_object_mut(), fields) {
        target.extend(incoming);
    }
    serde_json::from_value(value).map_err(|e| PortError::Rejected(format!("invalid patch: {e}")))
}

pub struct EpisodicMemoryStore {
    db: DatabaseConnection,
}

impl EpisodicMemoryStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocStorePort<episodic_memory::Model> for EpisodicMemoryStore {
    async fn put(&self, record: &episodic_memory::Model) -> Result<(), PortError> {
        record
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:episodic_memory", e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<episodic_memory::Model>, PortError> {
        episodic_memory::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:episodic_memory", e))
    }

    async fn query(&self, filter: &DocFilter) -> Result<Vec<episodic_memory::Model>, PortError> {
        use episodic_memory::Column;
        let mut cond = Condition::all();
        if let Some(id) = filter.memory_id {
            cond = cond.add(Column::Id.eq(id));
        }
        if let Some(user_id) = &filter.user_id {
            cond = cond.add(Column::UserId.eq(user_id.clone()));
        }
        if let Some(group_id) = &filter.group_id {
            cond = cond.add(Column::GroupId.eq(group_id.clone()));
        }
        if !filter.include_deleted {
            cond = cond.add(Column::Deleted.eq(false));
        }
        if let Some(after) = filter.created_after {
            cond = cond.add(Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            cond = cond.add(Column::CreatedAt.lte(before));
        }
        episodic_memory::Entity::find()
            .filter(cond)
            .all(&self.db)
            .await
            .map_err(|e| transient("docstore:episodic_memory", e))
    }

    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        let existing = self.get(id).await?.ok_or_else(|| not_found(id))?;
        let merged = merge_patch(existing, fields)?;
        merged
            .into_active_model()
            .update(&self.db)
            .await
            .map_err(|e| transient("docstore:episodic_memory", e))?;
        Ok(())
    }

    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let rows = self.query(filter).await?;
        let count = rows.len() as u64;
        for row in rows {
            let mut am = row.into_active_model();
            am.deleted = Set(true);
            am.update(&self.db)
                .await
                .map_err(|e| transient("docstore:episodic_memory", e))?;
        }
        Ok(count)
    }
}

pub struct EventLogStore {
    db: DatabaseConnection,
}

impl EventLogStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocStorePort<event_log::Model> for EventLogStore {
    async fn put(&self, record: &event_log::Model) -> Result<(), PortError> {
        record
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:event_log", e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<event_log::Model>, PortError> {
        event_log::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:event_log", e))
    }

    async fn query(&self, filter: &DocFilter) -> Result<Vec<event_log::Model>, PortError> {
        use event_log::Column;
        let mut cond = Condition::all();
        if let Some(id) = filter.memory_id {
            cond = cond.add(Column::Id.eq(id));
        }
        if let Some(user_id) = &filter.user_id {
            cond = cond.add(Column::Subject.eq(user_id.clone()));
        }
        if let Some(group_id) = &filter.group_id {
            cond = cond.add(Column::GroupId.eq(group_id.clone()));
        }
        if !filter.include_deleted {
            cond = cond.add(Column::Deleted.eq(false));
        }
        if let Some(after) = filter.created_after {
            cond = cond.add(Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            cond = cond.add(Column::CreatedAt.lte(before));
        }
        event_log::Entity::find()
            .filter(cond)
            .all(&self.db)
            .await
            .map_err(|e| transient("docstore:event_log", e))
    }

    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        let existing = self.get(id).await?.ok_or_else(|| not_found(id))?;
        let merged = merge_patch(existing, fields)?;
        merged
            .into_active_model()
            .update(&self.db)
            .await
            .map_err(|e| transient("docstore:event_log", e))?;
        Ok(())
    }

    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let rows = self.query(filter).await?;
        let count = rows.len() as u64;
        for row in rows {
            let mut am = row.into_active_model();
            am.deleted = Set(true);
            am.update(&self.db)
                .await
                .map_err(|e| transient("docstore:event_log", e))?;
        }
        Ok(count)
    }
}

pub struct SemanticMemoryStore {
    db: DatabaseConnection,
}

impl SemanticMemoryStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocStorePort<semantic_memory::Model> for SemanticMemoryStore {
    async fn put(&self, record: &semantic_memory::Model) -> Result<(), PortError> {
        record
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:semantic_memory", e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<semantic_memory::Model>, PortError> {
        semantic_memory::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:semantic_memory", e))
    }

    async fn query(&self, filter: &DocFilter) -> Result<Vec<semantic_memory::Model>, PortError> {
        use semantic_memory::Column;
        let mut cond = Condition::all();
        if let Some(id) = filter.memory_id {
            cond = cond.add(Column::Id.eq(id));
        }
        if let Some(group_id) = &filter.group_id {
            cond = cond.add(Column::GroupId.eq(group_id.clone()));
        }
        if !filter.include_deleted {
            cond = cond.add(Column::Deleted.eq(false));
        }
        if let Some(after) = filter.created_after {
            cond = cond.add(Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            cond = cond.add(Column::CreatedAt.lte(before));
        }
        semantic_memory::Entity::find()
            .filter(cond)
            .all(&self.db)
            .await
            .map_err(|e| transient("docstore:semantic_memory", e))
    }

    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        let existing = self.get(id).await?.ok_or_else(|| not_found(id))?;
        let merged = merge_patch(existing, fields)?;
        merged
            .into_active_model()
            .update(&self.db)
            .await
            .map_err(|e| transient("docstore:semantic_memory", e))?;
        Ok(())
    }

    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let rows = self.query(filter).await?;
        let count = rows.len() as u64;
        for row in rows {
            let mut am = row.into_active_model();
            am.deleted = Set(true);
            am.update(&self.db)
                .await
                .map_err(|e| transient("docstore:semantic_memory", e))?;
        }
        Ok(count)
    }
}

pub struct ProfileStore {
    db: DatabaseConnection,
}

impl ProfileStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocStorePort<profile::Model> for ProfileStore {
    async fn put(&self, record: &profile::Model) -> Result<(), PortError> {
        record
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:profile", e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<profile::Model>, PortError> {
        profile::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:profile", e))
    }

    async fn query(&self, filter: &DocFilter) -> Result<Vec<profile::Model>, PortError> {
        use profile::Column;
        let mut cond = Condition::all();
        if let Some(id) = filter.memory_id {
            cond = cond.add(Column::Id.eq(id));
        }
        if let Some(user_id) = &filter.user_id {
            cond = cond.add(Column::UserId.eq(user_id.clone()));
        }
        if let Some(group_id) = &filter.group_id {
            cond = cond.add(Column::GroupId.eq(group_id.clone()));
        }
        if !filter.include_deleted {
            cond = cond.add(Column::Deleted.eq(false));
        }
        profile::Entity::find()
            .filter(cond)
            .all(&self.db)
            .await
            .map_err(|e| transient("docstore:profile", e))
    }

    /// The one store whose `patch` sees real traffic (§4.E "for profile
    /// updates only"): `fields` carries the merged `attributes`/`provenance`
    /// already computed by `ProfileBuilder` (§4.I).
    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        let existing = self.get(id).await?.ok_or_else(|| not_found(id))?;
        let merged = merge_patch(existing, fields)?;
        merged
            .into_active_model()
            .update(&self.db)
            .await
            .map_err(|e| transient("docstore:profile", e))?;
        Ok(())
    }

    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let rows = self.query(filter).await?;
        let count = rows.len() as u64;
        for row in rows {
            let mut am = row.into_active_model();
            am.deleted = Set(true);
            am.update(&self.db)
                .await
                .map_err(|e| transient("docstore:profile", e))?;
        }
        Ok(count)
    }
}

pub struct ForesightStore {
    db: DatabaseConnection,
}

impl ForesightStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }
}

#[async_trait]
impl DocStorePort<foresight::Model> for ForesightStore {
    async fn put(&self, record: &foresight::Model) -> Result<(), PortError> {
        record
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:foresight", e))?;
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<foresight::Model>, PortError> {
        foresight::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:foresight", e))
    }

    async fn query(&self, filter: &DocFilter) -> Result<Vec<foresight::Model>, PortError> {
        use foresight::Column;
        let mut cond = Condition::all();
        if let Some(id) = filter.memory_id {
            cond = cond.add(Column::Id.eq(id));
        }
        if let Some(user_id) = &filter.user_id {
            cond = cond.add(Column::UserId.eq(user_id.clone()));
        }
        if let Some(group_id) = &filter.group_id {
            cond = cond.add(Column::GroupId.eq(group_id.clone()));
        }
        if !filter.include_deleted {
            cond = cond.add(Column::Deleted.eq(false));
        }
        if let Some(after) = filter.created_after {
            cond = cond.add(Column::CreatedAt.gte(after));
        }
        if let Some(before) = filter.created_before {
            cond = cond.add(Column::CreatedAt.lte(before));
        }
        foresight::Entity::find()
            .filter(cond)
            .all(&self.db)
            .await
            .map_err(|e| transient("docstore:foresight", e))
    }

    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        let existing = self.get(id).await?.ok_or_else(|| not_found(id))?;
        let merged = merge_patch(existing, fields)?;
        merged
            .into_active_model()
            .update(&self.db)
            .await
            .map_err(|e| transient("docstore:foresight", e))?;
        Ok(())
    }

    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let rows = self.query(filter).await?;
        let count = rows.len() as u64;
        for row in rows {
            let mut am = row.into_active_model();
            am.deleted = Set(true);
            am.update(&self.db)
                .await
                .map_err(|e| transient("docstore:foresight", e))?;
        }
        Ok(count)
    }
}

/// Fields a metadata PATCH is allowed to merge (§6 "PATCH merges only
/// {name, description, scene_desc, tags, user_details, default_timezone}").
pub const PATCHABLE_CONVERSATION_META_FIELDS: &[&str] =
    &["name", "description", "scene_desc", "tags", "user_details", "default_timezone"];

/// Fields a metadata PATCH must reject (§6, §8 property 7, S5).
pub const IMMUTABLE_CONVERSATION_META_FIELDS: &[&str] =
    &["version", "scene", "group_id", "conversation_created_at"];

/// `ConversationMeta` (§3): keyed by the nullable, unique `group_id` rather
/// than the `Uuid` primary key the generic `DocStorePort<T>` filter shape
/// assumes, so it ships its own narrow interface instead of implementing
/// `DocStorePort<conversation_meta::Model>`.
pub struct ConversationMetaStore {
    db: DatabaseConnection,
}

impl ConversationMetaStore {
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// `group_id = None` looks up the default (groupless) configuration row
    /// (§3 "absent record acts as default").
    pub async fn get_by_group(&self, group_id: Option<&str>) -> Result<Option<conversation_meta::Model>, PortError> {
        let mut cond = Condition::all();
        cond = match group_id {
            Some(g) => cond.add(conversation_meta::Column::GroupId.eq(g)),
            None => cond.add(conversation_meta::Column::GroupId.is_null()),
        };
        conversation_meta::Entity::find()
            .filter(cond)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:conversation_meta", e))
    }

    async fn get_by_id(&self, id: Uuid) -> Result<Option<conversation_meta::Model>, PortError> {
        conversation_meta::Entity::find_by_id(id)
            .one(&self.db)
            .await
            .map_err(|e| transient("docstore:conversation_meta", e))
    }

    /// Creates the row on first sight of `group_id`; a repeat upsert
    /// replaces only the mutable descriptive fields, leaving
    /// `version`/`scene`/`group_id`/`conversation_created_at` untouched —
    /// the same "immutable post-creation" invariant PATCH enforces (§3
    /// "Lifecycle"). `incoming` is expected fully populated by the caller
    /// (`memoria_api`), including a fresh `id`/`version`/
    /// `conversation_created_at` for the create path.
    pub async fn upsert(&self, incoming: conversation_meta::Model) -> Result<conversation_meta::Model, PortError> {
        if let Some(mut existing) = self.get_by_group(incoming.group_id.as_deref()).await? {
            existing.scene_desc = incoming.scene_desc;
            existing.name = incoming.name;
            existing.description = incoming.description;
            existing.default_timezone = incoming.default_timezone;
            existing.user_details = incoming.user_details;
            existing.tags = incoming.tags;
            let id = existing.id;
            existing
                .into_active_model()
                .update(&self.db)
                .await
                .map_err(|e| transient("docstore:conversation_meta", e))?;
            return self.get_by_id(id).await?.ok_or_else(|| not_found(id));
        }

        incoming
            .clone()
            .into_active_model()
            .insert(&self.db)
            .await
            .map_err(|e| transient("docstore:conversation_meta", e))?;
        Ok(incoming)
    }

    /// Merges `fields` onto the stored row and bumps `version` (§4.J, §5
    /// "PATCH reads then compare-and-set on version"). Callers are
    /// responsible for rejecting immutable keys before reaching this layer
    /// (§8 property 7) — this only ever sees the already-validated
    /// patchable subset.
    pub async fn patch_fields(
        &self,
        group_id: Option<&str>,
        fields: serde_json::Value,
    ) -> Result<conversation_meta::Model, PortError> {
        let existing = self
            .get_by_group(group_id)
            .await?
            .ok_or_else(|| PortError::NotFound("conversation_meta".to_string()))?;
        let expected_version = existing.version;
        let id = existing.id;
        let merged = merge_patch(existing, fields)?;

        let mut am = merged.into_active_model();
        am.version = Set(expected_version + 1);
        am.update(&self.db)
            .await
            .map_err(|e| transient("docstore:conversation_meta", e))?;

        self.get_by_id(id).await?.ok_or_else(|| not_found(id))
    }
}

#[cfg(test)]
mod conversation_meta_tests {
    use super::PATCHABLE_CONVERSATION_META_FIELDS;

    #[test]
    fn patchable_fields_exclude_immutables() {
        for immutable in super::IMMUTABLE_CONVERSATION_META_FIELDS {
            assert!(!PATCHABLE_CONVERSATION_META_FIELDS.contains(immutable));
        }
    }
}
