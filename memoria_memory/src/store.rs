//! `MemoryStore` (component E, §4.E): writes a record to doc, text and
//! vector stores in that order, deduplicates by content hash (§4.E.1), and
//! drives the reconciliation queue for partial writes (§4.E.2).

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use memoria_core::content_hash;
use memoria_core::port::{
    DocFilter, DocStorePort, EmbedderPort, PortError, TextDoc, TextIndexPort, VectorFilterFields,
    VectorIndexPort,
};
use memoria_entities::{episodic_memory, event_log, foresight, profile, semantic_memory};
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tracing::{info, warn};
use uuid::Uuid;

use crate::retriever::DataSource;

/// `sort_by` for `MemoryStore::fetch` (§6 "Fetch endpoint").
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortBy {
    #[default]
    CreatedAt,
    Version,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

fn version_in_range(version: i32, range: Option<(i32, i32)>) -> bool {
    range.map_or(true, |(lo, hi)| version >= lo && version <= hi)
}

/// Sorts already-serialized rows by the `created_at`/`version` field every
/// memory variant carries, in place. Rows are `serde_json::Value` rather
/// than a shared trait object since the five variants share no common Rust
/// type (§8 "Dynamic typing → tagged variants").
fn sort_rows(rows: &mut [serde_json::Value], sort_by: SortBy, sort_order: SortOrder) {
    let field = match sort_by {
        SortBy::CreatedAt => "created_at",
        SortBy::Version => "version",
    };
    rows.sort_by(|a, b| {
        let (av, bv) = (&a[field], &b[field]);
        let ordering = av
            .as_str()
            .zip(bv.as_str())
            .map_or_else(|| av.as_i64().cmp(&bv.as_i64()), |(a, b)| a.cmp(b));
        match sort_order {
            SortOrder::Asc => ordering,
            SortOrder::Desc => ordering.reverse(),
        }
    });
}

/// Number of shards in the keyed lock array (§5.1). Fixed regardless of how
/// many distinct `memory_id`s have ever been written.
const LOCK_SHARDS: usize = 64;

fn shard_for(id: Uuid) -> usize {
    #[allow(clippy::cast_possible_truncation)]
    let shard = (id.as_u128() % LOCK_SHARDS as u128) as usize;
    shard
}

/// One missing leg of a partially-failed write, queued for background
/// reconciliation (§4.E.2). Carries everything needed to retry the write
/// without re-reading the doc store.
pub struct ReconciliationTask {
    pub memory_id: Uuid,
    pub memory_type: &'static str,
    pub text_doc: Option<TextDoc>,
    pub vector: Option<(Vec<f32>, VectorFilterFields)>,
}

/// Clears `index_pending` on the doc row once reconciliation succeeds.
/// Type-erases over the five `DocStorePort<T>` implementations so the
/// reconciliation worker doesn't need to be generic over `T`.
#[async_trait]
trait IndexPendingClearer: Send + Sync {
    async fn clear(&self, id: Uuid) -> Result<(), PortError>;
}

macro_rules! clearer_for {
    ($name:ident, $model:path, $store_field:literal) => {
        struct $name(Arc<dyn DocStorePort<$model>>);

        #[async_trait]
        impl IndexPendingClearer for $name {
            async fn clear(&self, id: Uuid) -> Result<(), PortError> {
                self.0
                    .patch(id, serde_json::json!({ "index_pending": false }))
                    .await
                    .map_err(|e| {
                        warn!(memory_id = %id, store = $store_field, "failed clearing index_pending: {e}");
                        e
                    })
            }
        }
    };
}

clearer_for!(EpisodicClearer, episodic_memory::Model, "episodic_memory");
clearer_for!(EventLogClearer, event_log::Model, "event_log");
clearer_for!(SemanticClearer, semantic_memory::Model, "semantic_memory");
clearer_for!(ForesightClearer, foresight::Model, "foresight");

pub struct MemoryStore {
    episodic: Arc<dyn DocStorePort<episodic_memory::Model>>,
    event_log: Arc<dyn DocStorePort<event_log::Model>>,
    semantic: Arc<dyn DocStorePort<semantic_memory::Model>>,
    profile: Arc<dyn DocStorePort<profile::Model>>,
    foresight: Arc<dyn DocStorePort<foresight::Model>>,
    text_index: Arc<dyn TextIndexPort>,
    vector_index: Arc<dyn VectorIndexPort>,
    embedder: Arc<dyn EmbedderPort>,
    locks: Vec<Mutex<()>>,
    reconcile_tx: mpsc::Sender<ReconciliationTask>,
}

impl MemoryStore {
    /// Builds the store and spawns the reconciliation worker (§4.E.2,
    /// §9 "initialized at startup, drained at shutdown").
    #[must_use]
    pub fn new(
        episodic: Arc<dyn DocStorePort<episodic_memory::Model>>,
        event_log: Arc<dyn DocStorePort<event_log::Model>>,
        semantic: Arc<dyn DocStorePort<semantic_memory::Model>>,
        profile: Arc<dyn DocStorePort<profile::Model>>,
        foresight: Arc<dyn DocStorePort<foresight::Model>>,
        text_index: Arc<dyn TextIndexPort>,
        vector_index: Arc<dyn VectorIndexPort>,
        embedder: Arc<dyn EmbedderPort>,
    ) -> Self {
        let (reconcile_tx, reconcile_rx) = mpsc::channel(256);

        let mut clearers: HashMap<&'static str, Arc<dyn IndexPendingClearer>> = HashMap::new();
        clearers.insert("episodic_memory", Arc::new(EpisodicClearer(episodic.clone())));
        clearers.insert("event_log", Arc::new(EventLogClearer(event_log.clone())));
        clearers.insert("semantic_memory", Arc::new(SemanticClearer(semantic.clone())));
        clearers.insert("foresight", Arc::new(ForesightClearer(foresight.clone())));

        tokio::spawn(run_reconciliation_worker(
            reconcile_rx,
            text_index.clone(),
            vector_index.clone(),
            clearers,
        ));

        let mut locks = Vec::with_capacity(LOCK_SHARDS);
        locks.resize_with(LOCK_SHARDS, || Mutex::new(()));

        Self {
            episodic,
            event_log,
            semantic,
            profile,
            foresight,
            text_index,
            vector_index,
            embedder,
            locks,
            reconcile_tx,
        }
    }

    /// Writes an `EpisodicMemory`: content-hash dedup/reinforcement
    /// (§4.E.1), then doc → text → vector (§4.E).
    #[tracing::instrument(skip(self, record))]
    pub async fn put_episodic(&self, mut record: episodic_memory::Model) -> Result<Uuid, PortError> {
        let hash = content_hash("episodic_memory", &record.summary);
        record.content_hash = hash.clone();

        if let Some(existing) = self.find_duplicate_episodic(&hash, &record).await? {
            return self.reinforce_episodic(existing).await;
        }

        let _guard = self.locks[shard_for(record.id)].lock().await;
        let id = record.id;
        self.episodic.put(&record).await?;

        let text_doc = TextDoc {
            id,
            memory_type: "episodic_memory".to_string(),
            text: format!("{}\n{}", record.summary, record.content),
            user_id: Some(record.user_id.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };
        let fields = VectorFilterFields {
            memory_type: "episodic_memory".to_string(),
            user_id: Some(record.user_id.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };

        self.write_indexes(id, "episodic_memory", &text_doc, &record.summary, &fields)
            .await;
        Ok(id)
    }

    async fn find_duplicate_episodic(
        &self,
        hash: &str,
        record: &episodic_memory::Model,
    ) -> Result<Option<episodic_memory::Model>, PortError> {
        let existing = self
            .episodic
            .query(&DocFilter {
                user_id: Some(record.user_id.clone()),
                group_id: record.group_id.clone(),
                ..Default::default()
            })
            .await?;
        Ok(existing.into_iter().find(|r| r.content_hash == hash))
    }

    async fn reinforce_episodic(&self, mut existing: episodic_memory::Model) -> Result<Uuid, PortError> {
        existing.reinforcement_count += 1;
        existing.updated_at = Utc::now();
        let id = existing.id;
        self.episodic.patch(
            id,
            serde_json::json!({
                "reinforcement_count": existing.reinforcement_count,
                "updated_at": existing.updated_at,
            }),
        )
        .await?;
        info!(memory_id = %id, "reinforced existing episodic memory instead of duplicating");
        Ok(id)
    }

    /// Writes a `SemanticMemory` row with the same dedup/reinforcement rule
    /// as episodic memory (§4.E.1: both are freeform-text variants).
    #[tracing::instrument(skip(self, record))]
    pub async fn put_semantic(&self, mut record: semantic_memory::Model) -> Result<Uuid, PortError> {
        let hash = content_hash("semantic_memory", &record.statement);
        record.content_hash = hash.clone();

        let existing = self
            .semantic
            .query(&DocFilter {
                group_id: record.group_id.clone(),
                ..Default::default()
            })
            .await?;
        if let Some(mut dup) = existing.into_iter().find(|r| r.content_hash == hash) {
            dup.reinforcement_count += 1;
            let id = dup.id;
            self.semantic
                .patch(id, serde_json::json!({ "reinforcement_count": dup.reinforcement_count }))
                .await?;
            return Ok(id);
        }

        let _guard = self.locks[shard_for(record.id)].lock().await;
        let id = record.id;
        self.semantic.put(&record).await?;

        let text_doc = TextDoc {
            id,
            memory_type: "semantic_memory".to_string(),
            text: record.statement.clone(),
            user_id: Some(record.subject.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };
        let fields = VectorFilterFields {
            memory_type: "semantic_memory".to_string(),
            user_id: Some(record.subject.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };
        self.write_indexes(id, "semantic_memory", &text_doc, &record.statement, &fields)
            .await;
        Ok(id)
    }

    /// Writes an `EventLog` fact, deduplicated on exact
    /// `(subject, predicate, object)` equality rather than a text hash
    /// (§4.E.1 — structured triples have no single "canonical content
    /// field" to hash against reinforcement-wise).
    #[tracing::instrument(skip(self, record))]
    pub async fn put_event_log(&self, mut record: event_log::Model) -> Result<Uuid, PortError> {
        record.content_hash = content_hash(
            "event_log",
            &format!("{}|{}|{}", record.subject, record.predicate, record.object),
        );

        let existing = self
            .event_log
            .query(&DocFilter {
                user_id: Some(record.subject.clone()),
                group_id: record.group_id.clone(),
                ..Default::default()
            })
            .await?;
        if let Some(dup) = existing.into_iter().find(|r| {
            r.subject == record.subject && r.predicate == record.predicate && r.object == record.object
        }) {
            let new_count = dup.reinforcement_count + 1;
            self.event_log
                .patch(dup.id, serde_json::json!({ "reinforcement_count": new_count }))
                .await?;
            return Ok(dup.id);
        }

        let _guard = self.locks[shard_for(record.id)].lock().await;
        let id = record.id;
        self.event_log.put(&record).await?;

        let fact_text = format!("{} {} {}", record.subject, record.predicate, record.object);
        let text_doc = TextDoc {
            id,
            memory_type: "event_log".to_string(),
            text: fact_text.clone(),
            user_id: Some(record.subject.clone()),
            group_id: record.group_id.clone(),
            created_at: record.time,
        };

        // §4.F step 3: event_log has no vector modality (L2 space unsupported).
        if let Err(e) = self.text_index.upsert(&text_doc).await {
            warn!(memory_id = %id, "event_log text index write failed, queuing reconciliation: {e}");
            let _ = self
                .reconcile_tx
                .send(ReconciliationTask {
                    memory_id: id,
                    memory_type: "event_log",
                    text_doc: Some(text_doc),
                    vector: None,
                })
                .await;
            self.event_log
                .patch(id, serde_json::json!({ "index_pending": true }))
                .await?;
        }
        Ok(id)
    }

    #[tracing::instrument(skip(self, record))]
    pub async fn put_foresight(&self, record: foresight::Model) -> Result<Uuid, PortError> {
        let _guard = self.locks[shard_for(record.id)].lock().await;
        let id = record.id;
        self.foresight.put(&record).await?;

        let text_doc = TextDoc {
            id,
            memory_type: "foresight".to_string(),
            text: record.content.clone(),
            user_id: Some(record.user_id.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };
        let fields = VectorFilterFields {
            memory_type: "foresight".to_string(),
            user_id: Some(record.user_id.clone()),
            group_id: record.group_id.clone(),
            created_at: record.created_at,
        };
        self.write_indexes(id, "foresight", &text_doc, &record.content, &fields)
            .await;
        Ok(id)
    }

    /// Upserts a `Profile` row directly — profiles are maintained by
    /// `ProfileBuilder` (§4.I) which already computes the merged
    /// `attributes`/`provenance`; `MemoryStore` just persists it.
    pub async fn put_profile(&self, record: &profile::Model) -> Result<(), PortError> {
        self.profile.put(record).await
    }

    pub async fn get_profile(&self, id: Uuid) -> Result<Option<profile::Model>, PortError> {
        self.profile.get(id).await
    }

    pub async fn query_profiles(&self, filter: &DocFilter) -> Result<Vec<profile::Model>, PortError> {
        self.profile.query(filter).await
    }

    pub async fn patch_profile(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError> {
        self.profile.patch(id, fields).await
    }

    /// Resolves the canonical text a `HybridRetriever`/`AgenticRetriever`
    /// hit should be reranked against, read straight from the doc store
    /// rather than the text index (the canonical copy lives here; the text
    /// index only holds a tokenization of it). `Profile` has no rerankable
    /// text — `data_source=profile` bypasses search entirely (§4.F).
    pub async fn hit_text(&self, data_source: DataSource, id: Uuid) -> Option<String> {
        match data_source {
            DataSource::Episode => self
                .episodic
                .get(id)
                .await
                .ok()
                .flatten()
                .map(|m| format!("{}\n{}", m.summary, m.content)),
            DataSource::EventLog => self
                .event_log
                .get(id)
                .await
                .ok()
                .flatten()
                .map(|m| format!("{} {} {}", m.subject, m.predicate, m.object)),
            DataSource::SemanticMemory => self.semantic.get(id).await.ok().flatten().map(|m| m.statement),
            DataSource::Foresight => self.foresight.get(id).await.ok().flatten().map(|m| m.content),
            DataSource::Profile => None,
        }
    }

    /// §4.F step 1 "collection-specific validity": `semantic_memory`
    /// additionally requires `valid_from <= current_time <
    /// coalesce(valid_to, +∞)` (S4). Not expressible as a `DocFilter`
    /// column, so `SemanticMemory` retrieval hits pass through this
    /// post-filter before being returned to the caller.
    pub async fn filter_semantic_validity(
        &self,
        hits: Vec<crate::retriever::Hit>,
        current_time: chrono::DateTime<Utc>,
    ) -> Result<Vec<crate::retriever::Hit>, PortError> {
        let mut kept = Vec::with_capacity(hits.len());
        for hit in hits {
            if let Some(record) = self.semantic.get(hit.id).await? {
                let after_start = record.valid_from <= current_time;
                let before_end = record.valid_to.map_or(true, |vt| vt > current_time);
                if after_start && before_end {
                    kept.push(hit);
                }
            }
        }
        Ok(kept)
    }

    /// `fetch` (§6 "Fetch endpoint"): reads one memory type from its doc
    /// store, applies the optional `version_range`, sorts, paginates, and
    /// serializes each row to JSON so the caller doesn't need to match on
    /// `data_source` to print a result. Soft-deleted rows are always
    /// excluded (§8 property 6) regardless of `filter.include_deleted`.
    pub async fn fetch(
        &self,
        data_source: DataSource,
        filter: &DocFilter,
        version_range: Option<(i32, i32)>,
        sort_by: SortBy,
        sort_order: SortOrder,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<serde_json::Value>, PortError> {
        let mut filter = filter.clone();
        filter.include_deleted = false;

        let mut rows: Vec<serde_json::Value> = match data_source {
            DataSource::Episode => self
                .episodic
                .query(&filter)
                .await?
                .into_iter()
                .filter(|r| version_in_range(r.version, version_range))
                .map(|r| serde_json::json!(r))
                .collect(),
            DataSource::EventLog => self
                .event_log
                .query(&filter)
                .await?
                .into_iter()
                .filter(|r| version_in_range(r.version, version_range))
                .map(|r| serde_json::json!(r))
                .collect(),
            DataSource::SemanticMemory => self
                .semantic
                .query(&filter)
                .await?
                .into_iter()
                .filter(|r| version_in_range(r.version, version_range))
                .map(|r| serde_json::json!(r))
                .collect(),
            DataSource::Foresight => self
                .foresight
                .query(&filter)
                .await?
                .into_iter()
                .filter(|r| version_in_range(r.version, version_range))
                .map(|r| serde_json::json!(r))
                .collect(),
            DataSource::Profile => self
                .profile
                .query(&filter)
                .await?
                .into_iter()
                .filter(|r| version_in_range(r.version, version_range))
                .map(|r| serde_json::json!(r))
                .collect(),
        };

        sort_rows(&mut rows, sort_by, sort_order);
        Ok(rows.into_iter().skip(offset).take(limit).collect())
    }

    /// Combined soft-delete (§4.J, §8 property 6): tombstones the doc row
    /// across all five variants matching `filter` and removes their text
    /// and vector index entries so a soft-deleted record disappears from
    /// search immediately rather than waiting on reconciliation.
    pub async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError> {
        let mut total = 0u64;

        let episodic_ids: Vec<Uuid> = self.episodic.query(filter).await?.iter().map(|r| r.id).collect();
        total += self.episodic.soft_delete(filter).await?;
        let event_log_ids: Vec<Uuid> = self.event_log.query(filter).await?.iter().map(|r| r.id).collect();
        total += self.event_log.soft_delete(filter).await?;
        let semantic_ids: Vec<Uuid> = self.semantic.query(filter).await?.iter().map(|r| r.id).collect();
        total += self.semantic.soft_delete(filter).await?;
        let foresight_ids: Vec<Uuid> = self.foresight.query(filter).await?.iter().map(|r| r.id).collect();
        total += self.foresight.soft_delete(filter).await?;
        // profile bypasses text/vector search entirely (§4.F); no index to tombstone.
        total += self.profile.soft_delete(filter).await?;

        for id in episodic_ids.into_iter().chain(semantic_ids).chain(foresight_ids) {
            let _ = self.text_index.delete(id).await;
            let _ = self.vector_index.delete(id).await;
        }
        for id in event_log_ids {
            // §4.F step 3: event_log has no vector modality.
            let _ = self.text_index.delete(id).await;
        }

        Ok(total)
    }

    async fn write_indexes(
        &self,
        id: Uuid,
        memory_type: &'static str,
        text_doc: &TextDoc,
        embeddable_text: &str,
        fields: &VectorFilterFields,
    ) {
        let text_result = self.text_index.upsert(text_doc).await;
        let embedding = self.embedder.embed(embeddable_text).await;

        let (text_ok, vector_ok, vector_payload) = match embedding {
            Ok(vector) => {
                let vector_result = self.vector_index.upsert(id, &vector, fields).await;
                (text_result.is_ok(), vector_result.is_ok(), Some(vector))
            }
            Err(e) => {
                warn!(memory_id = %id, "embedding failed, vector leg pending: {e}");
                (text_result.is_ok(), false, None)
            }
        };

        if text_ok && vector_ok {
            return;
        }

        let task = ReconciliationTask {
            memory_id: id,
            memory_type,
            text_doc: (!text_ok).then(|| text_doc.clone()),
            vector: (!vector_ok)
                .then(|| vector_payload.map(|v| (v, fields.clone())))
                .flatten(),
        };
        let _ = self.reconcile_tx.send(task).await;
        self.mark_index_pending(memory_type, id).await;
    }

    async fn mark_index_pending(&self, memory_type: &str, id: Uuid) {
        let result = match memory_type {
            "episodic_memory" => {
                self.episodic
                    .patch(id, serde_json::json!({ "index_pending": true }))
                    .await
            }
            "semantic_memory" => {
                self.semantic
                    .patch(id, serde_json::json!({ "index_pending": true }))
                    .await
            }
            "event_log" => {
                self.event_log
                    .patch(id, serde_json::json!({ "index_pending": true }))
                    .await
            }
            "foresight" => {
                self.foresight
                    .patch(id, serde_json::json!({ "index_pending": true }))
                    .await
            }
            _ => Ok(()),
        };
        if let Err(e) = result {
            warn!(memory_id = %id, "failed to mark index_pending: {e}");
        }
    }
}

/// Drains the reconciliation queue at a throttled rate (§4.E.2), retrying
/// each missing leg with jittered backoff and clearing `index_pending` on
/// success. Exhausted retries leave the record `index_pending`; it stays
/// fetchable throughout (§4.E).
async fn run_reconciliation_worker(
    mut rx: mpsc::Receiver<ReconciliationTask>,
    text_index: Arc<dyn TextIndexPort>,
    vector_index: Arc<dyn VectorIndexPort>,
    clearers: HashMap<&'static str, Arc<dyn IndexPendingClearer>>,
) {
    let mut ticker = tokio::time::interval(std::time::Duration::from_secs(1));
    loop {
        ticker.tick().await;
        let Some(task) = rx.recv().await else {
            return;
        };

        let backoff = memoria_core::retry::BackoffConfig::default();
        let mut all_ok = true;

        if let Some(doc) = &task.text_doc {
            let result = memoria_core::retry::retry_with_backoff(backoff, || text_index.upsert(doc)).await;
            if let Err(e) = result {
                warn!(memory_id = %task.memory_id, "text reconciliation exhausted retries: {e}");
                all_ok = false;
            }
        }
        if let Some((vector, fields)) = &task.vector {
            let result = memoria_core::retry::retry_with_backoff(backoff, || {
                vector_index.upsert(task.memory_id, vector, fields)
            })
            .await;
            if let Err(e) = result {
                warn!(memory_id = %task.memory_id, "vector reconciliation exhausted retries: {e}");
                all_ok = false;
            }
        }

        if all_ok {
            if let Some(clearer) = clearers.get(task.memory_type) {
                let _ = clearer.clear(task.memory_id).await;
            }
        }
    }
}
