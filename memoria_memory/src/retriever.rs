//! `HybridRetriever` (component F, §4.F): RRF over BM25 + vector with
//! filters, scope, time window, and an optional adaptive cutoff (§4.F.2).

use std::sync::Arc;

use memoria_config::RetrievalConfig;
use memoria_core::adaptive::find_adaptive_cutoff;
use memoria_core::port::{EmbedderPort, PortError, TextIndexPort, VectorIndexPort};
use memoria_core::rrf::rrf_fuse;
use memoria_core::MemoryScope;
use serde::{Deserialize, Serialize};
use tracing::instrument;
use uuid::Uuid;

use crate::scope::ScopeRequest;

/// Which memory collection a retrieval targets (§4.F "data_source").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    Episode,
    EventLog,
    SemanticMemory,
    Profile,
    Foresight,
}

impl DataSource {
    #[must_use]
    pub const fn table_name(self) -> &'static str {
        match self {
            Self::Episode => "episodic_memory",
            Self::EventLog => "event_log",
            Self::SemanticMemory => "semantic_memory",
            Self::Profile => "profile",
            Self::Foresight => "foresight",
        }
    }

    /// §4.F step 3: event_log has no vector modality (L2 space unsupported);
    /// profile bypasses search entirely.
    #[must_use]
    pub const fn supports_vector(self) -> bool {
        !matches!(self, Self::EventLog | Self::Profile)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalMode {
    Rrf,
    Embedding,
    Bm25,
}

#[derive(Debug, Clone)]
pub struct RetrievalRequest {
    pub query: String,
    pub scope_request: ScopeRequest,
    pub data_source: DataSource,
    pub mode: RetrievalMode,
    pub top_k: usize,
    /// Per-call cosine floor (§4.F "radius ∈ [-1, 1]"); `None` falls back to
    /// `RetrievalConfig::radius` (the §6 search body's `radius?` is optional).
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hit {
    pub id: Uuid,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrievalMetadata {
    pub bm25_count: usize,
    pub vector_count: usize,
    pub vector_modality_skipped: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalResponse {
    pub hits: Vec<Hit>,
    pub metadata: RetrievalMetadata,
}

pub struct HybridRetriever {
    text_index: Arc<dyn TextIndexPort>,
    vector_index: Arc<dyn VectorIndexPort>,
    embedder: Arc<dyn EmbedderPort>,
    config: RetrievalConfig,
}

impl HybridRetriever {
    #[must_use]
    pub const fn new(
        text_index: Arc<dyn TextIndexPort>,
        vector_index: Arc<dyn VectorIndexPort>,
        embedder: Arc<dyn EmbedderPort>,
        config: RetrievalConfig,
    ) -> Self {
        Self {
            text_index,
            vector_index,
            embedder,
            config,
        }
    }

    /// The configured `rrf_k`, exposed so `memoria_agentic` can fuse its
    /// round-1 list against round-2 lists with the same constant (§4.H.2).
    #[must_use]
    pub const fn rrf_k(&self) -> f64 {
        self.config.rrf_k
    }

    /// §4.F algorithm steps 1-5. `data_source=profile` is rejected here —
    /// callers fetch profiles directly through `MemoryStore`, bypassing
    /// text/vector search entirely as the contract specifies.
    #[instrument(skip(self, request), fields(data_source = ?request.data_source, mode = ?request.mode))]
    pub async fn retrieve(&self, request: &RetrievalRequest) -> Result<RetrievalResponse, PortError> {
        if request.data_source == DataSource::Profile {
            return Err(PortError::Rejected(
                "profile retrieval bypasses HybridRetriever; use MemoryStore directly".to_string(),
            ));
        }

        let resolved = request.scope_request.resolve();
        if resolved.user_id.is_none() && resolved.group_id.is_none() {
            if let Some(MemoryScope::All) = request.scope_request.scope {
                return Err(PortError::Rejected(
                    "scope=all requires at least one of user_id/group_id".to_string(),
                ));
            }
        }

        let expanded_k = memoria_config::schema::default_expanded_k(request.top_k);
        let table = request.data_source.table_name();

        let mut lists: Vec<Vec<Uuid>> = Vec::new();
        let mut metadata = RetrievalMetadata::default();
        let mut bm25_scores: std::collections::HashMap<Uuid, f64> = std::collections::HashMap::new();
        let mut vector_scores: std::collections::HashMap<Uuid, f64> = std::collections::HashMap::new();
        let mut created_at: std::collections::HashMap<Uuid, chrono::DateTime<chrono::Utc>> =
            std::collections::HashMap::new();

        if matches!(request.mode, RetrievalMode::Bm25 | RetrievalMode::Rrf) {
            let query = resolved.to_text_query(table, &request.query, expanded_k);
            let hits = self.text_index.query(&query).await?;
            metadata.bm25_count = hits.len();
            for hit in &hits {
                bm25_scores.insert(hit.id, hit.score);
                created_at.insert(hit.id, hit.created_at);
            }
            lists.push(hits.into_iter().map(|h| h.id).collect());
        }

        if matches!(request.mode, RetrievalMode::Embedding | RetrievalMode::Rrf) {
            if request.data_source.supports_vector() {
                let embedding = self.embedder.embed(&request.query).await?;
                let filter = resolved.to_vector_filter(table);
                let hits = self.vector_index.query(&embedding, &filter, expanded_k).await?;
                let radius = request.radius.unwrap_or(self.config.radius);
                let filtered: Vec<Uuid> = hits
                    .into_iter()
                    .filter(|h| h.score >= radius)
                    .map(|h| {
                        vector_scores.insert(h.id, h.score);
                        created_at.entry(h.id).or_insert(h.created_at);
                        h.id
                    })
                    .collect();
                metadata.vector_count = filtered.len();
                lists.push(filtered);
            } else {
                metadata.vector_modality_skipped = true;
            }
        }

        if lists.iter().all(Vec::is_empty) {
            return Ok(RetrievalResponse {
                hits: Vec::new(),
                metadata,
            });
        }

        let fused = match request.mode {
            RetrievalMode::Bm25 | RetrievalMode::Embedding if lists.len() == 1 => {
                let scores = if request.mode == RetrievalMode::Bm25 {
                    &bm25_scores
                } else {
                    &vector_scores
                };
                lists
                    .remove(0)
                    .into_iter()
                    .map(|id| {
                        let score = scores.get(&id).copied().unwrap_or(0.0);
                        (id, score)
                    })
                    .collect::<Vec<_>>()
            }
            _ => rrf_fuse(&lists, self.config.rrf_k),
        };

        let mut hits: Vec<Hit> = fused.into_iter().map(|(id, score)| Hit { id, score }).collect();
        // §4.F step 4: ties broken by descending BM25 score, then descending created_at.
        hits.sort_by(|a, b| {
            b.score.total_cmp(&a.score).then_with(|| {
                let bm25_a = bm25_scores.get(&a.id).copied().unwrap_or(f64::MIN);
                let bm25_b = bm25_scores.get(&b.id).copied().unwrap_or(f64::MIN);
                bm25_b.total_cmp(&bm25_a).then_with(|| {
                    let ts_a = created_at.get(&a.id);
                    let ts_b = created_at.get(&b.id);
                    ts_b.cmp(&ts_a)
                })
            })
        });

        let cutoff = if self.config.adaptive.enabled {
            let scores: Vec<f64> = hits.iter().map(|h| h.score).collect();
            find_adaptive_cutoff(&scores, &self.config.adaptive).min(request.top_k)
        } else {
            request.top_k
        };
        hits.truncate(cutoff.min(request.top_k));

        Ok(RetrievalResponse { hits, metadata })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::textindex::BM25TextIndex;
    use crate::vectorindex::BruteForceVectorIndex;
    use memoria_core::port::{PortError as PErr, TextDoc};
    use chrono::Utc;

    struct FixedEmbedder;

    #[async_trait::async_trait]
    impl EmbedderPort for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, PErr> {
            Ok(vec![1.0, 0.0, 0.0])
        }
    }

    #[tokio::test]
    async fn bm25_only_mode_skips_vector_leg() {
        let text_index = Arc::new(BM25TextIndex::new());
        let vector_index = Arc::new(BruteForceVectorIndex::new());
        let embedder = Arc::new(FixedEmbedder);

        text_index
            .upsert(&TextDoc {
                id: Uuid::now_v7(),
                memory_type: "episodic_memory".to_string(),
                text: "coffee with friends".to_string(),
                user_id: Some("u1".to_string()),
                group_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let retriever = HybridRetriever::new(text_index, vector_index, embedder, RetrievalConfig::default());
        let response = retriever
            .retrieve(&RetrievalRequest {
                query: "coffee".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::Episode,
                mode: RetrievalMode::Bm25,
                top_k: 5,
                radius: None,
            })
            .await
            .unwrap();

        assert_eq!(response.hits.len(), 1);
        assert!(!response.metadata.vector_modality_skipped);
    }

    #[tokio::test]
    async fn event_log_vector_mode_is_reported_skipped() {
        let text_index = Arc::new(BM25TextIndex::new());
        let vector_index = Arc::new(BruteForceVectorIndex::new());
        let embedder = Arc::new(FixedEmbedder);

        text_index
            .upsert(&TextDoc {
                id: Uuid::now_v7(),
                memory_type: "event_log".to_string(),
                text: "user likes tea".to_string(),
                user_id: Some("u1".to_string()),
                group_id: None,
                created_at: Utc::now(),
            })
            .await
            .unwrap();

        let retriever = HybridRetriever::new(text_index, vector_index, embedder, RetrievalConfig::default());
        let response = retriever
            .retrieve(&RetrievalRequest {
                query: "tea".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::EventLog,
                mode: RetrievalMode::Rrf,
                top_k: 5,
                radius: None,
            })
            .await
            .unwrap();

        assert!(response.metadata.vector_modality_skipped);
        assert_eq!(response.hits.len(), 1);
    }

    #[tokio::test]
    async fn embedding_only_mode_preserves_cosine_ranking() {
        let text_index = Arc::new(BM25TextIndex::new());
        let vector_index = Arc::new(BruteForceVectorIndex::new());
        let embedder = Arc::new(FixedEmbedder);

        let close = Uuid::now_v7();
        let far = Uuid::now_v7();
        vector_index
            .upsert(
                close,
                &[0.9, 0.1, 0.0],
                &memoria_core::port::VectorFilterFields {
                    memory_type: "episodic_memory".to_string(),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        vector_index
            .upsert(
                far,
                &[0.1, 0.9, 0.0],
                &memoria_core::port::VectorFilterFields {
                    memory_type: "episodic_memory".to_string(),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    created_at: Utc::now(),
                },
            )
            .await
            .unwrap();

        let retriever = HybridRetriever::new(text_index, vector_index, embedder, RetrievalConfig::default());
        let response = retriever
            .retrieve(&RetrievalRequest {
                query: "anything".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::Episode,
                mode: RetrievalMode::Embedding,
                top_k: 5,
                radius: None,
            })
            .await
            .unwrap();

        assert_eq!(response.hits.len(), 2);
        assert_eq!(response.hits[0].id, close);
        assert!(response.hits[0].score > response.hits[1].score);
    }
}
