//! `AgenticRetriever` (component H, §4.H): a bounded, at-most-two-round
//! retrieval loop layered on top of `HybridRetriever` and `RerankStage`.
//! Round 1 runs hybrid retrieval + rerank and hands the result to an LLM
//! judge; if the judge decides the results are insufficient, round 2 fans
//! out the judge's refined queries in parallel, fuses all lists (round 1
//! plus every round-2 leg) with the same RRF constant `HybridRetriever`
//! uses, and reranks the merged set once more. Two rounds, no more —
//! mirrors the donor's bounded-retry-then-give-up posture rather than an
//! open-ended agent loop.

use std::sync::Arc;

use memoria_config::AgenticConfig;
use memoria_core::port::{LlmPort, PortError};
use memoria_core::rrf::rrf_fuse;
use memoria_core::ChatMessage;
use memoria_memory::{DataSource, Hit, HybridRetriever, RerankItem, RerankStage, RetrievalMode, RetrievalRequest, ScopeRequest};
use memoria_memory::MemoryStore;
use tracing::{instrument, warn};
use uuid::Uuid;

use crate::judge::{parse_judge_response, JudgeDecision};

/// Context a rerank pass over round-1/round-2 hits is truncated to before
/// it is even sent to the LLM judge (prompt size control, §4.H.1).
const JUDGE_CONTEXT_CHARS: usize = 300;

#[derive(Debug, Clone)]
pub struct AgenticRequest {
    pub query: String,
    pub scope_request: ScopeRequest,
    pub data_source: DataSource,
    pub top_k: usize,
    pub llm_model: String,
    /// Per-call cosine floor forwarded to every `HybridRetriever` leg in both
    /// rounds (§4.F "radius"); `None` falls back to `RetrievalConfig::radius`.
    pub radius: Option<f64>,
}

#[derive(Debug, Clone, Default)]
pub struct AgenticMetadata {
    pub rounds: u32,
    pub is_multi_round: bool,
    pub judge_failed: bool,
    pub refined_queries: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AgenticResponse {
    pub hits: Vec<Hit>,
    pub metadata: AgenticMetadata,
}

pub struct AgenticRetriever {
    hybrid: Arc<HybridRetriever>,
    rerank: Arc<RerankStage>,
    store: Arc<MemoryStore>,
    llm: Arc<dyn LlmPort>,
    config: AgenticConfig,
}

impl AgenticRetriever {
    #[must_use]
    pub const fn new(
        hybrid: Arc<HybridRetriever>,
        rerank: Arc<RerankStage>,
        store: Arc<MemoryStore>,
        llm: Arc<dyn LlmPort>,
        config: AgenticConfig,
    ) -> Self {
        Self {
            hybrid,
            rerank,
            store,
            llm,
            config,
        }
    }

    /// §4.H steps 1-4, bounded at exactly two rounds.
    #[instrument(skip(self, request), fields(data_source = ?request.data_source))]
    pub async fn agentic_retrieve(&self, request: &AgenticRequest) -> Result<AgenticResponse, PortError> {
        let round1_cap = request.top_k.min(self.config.round1_cap);
        let round1_response = self
            .hybrid
            .retrieve(&RetrievalRequest {
                query: request.query.clone(),
                scope_request: request.scope_request.clone(),
                data_source: request.data_source,
                mode: RetrievalMode::Rrf,
                top_k: round1_cap,
                radius: request.radius,
            })
            .await?;

        let round1_ids: Vec<Uuid> = round1_response.hits.iter().map(|h| h.id).collect();
        let round1_items = self.resolve_and_rerank(&request.query, request.data_source, round1_response.hits).await;

        if round1_items.is_empty() {
            let decision = JudgeDecision::empty_round1(&request.query);
            return self.run_round2(request, decision, round1_ids, false).await;
        }

        match self.judge(&request.query, &request.llm_model, &round1_items).await {
            None => Ok(finalize(round1_items, request.top_k, 1, false, true, Vec::new())),
            Some(decision) if decision.is_sufficient => {
                Ok(finalize(round1_items, request.top_k, 1, false, false, Vec::new()))
            }
            Some(decision) => self.run_round2(request, decision, round1_ids, false).await,
        }
    }

    async fn judge(&self, query: &str, model: &str, round1_items: &[RerankItem]) -> Option<JudgeDecision> {
        let context = round1_items
            .iter()
            .enumerate()
            .map(|(idx, item)| format!("{}. {}", idx + 1, truncate(&item.text, JUDGE_CONTEXT_CHARS)))
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Query: {query}\n\nRetrieved memories:\n{context}\n\nAre these memories sufficient to answer the query? \
             Respond with <decision>SUFFICIENT</decision> or <decision>INSUFFICIENT</decision>. If insufficient, \
             also include a <refined_queries> block with up to {} alternative search queries, one per line.",
            self.config.refined_query_cap
        );

        let messages = vec![ChatMessage::user(prompt)];
        match self.llm.chat(&messages, model).await {
            Ok(response) => Some(parse_judge_response(&response.content, query, self.config.refined_query_cap)),
            Err(e) => {
                warn!("agentic judge call failed, terminating at round 1: {e}");
                None
            }
        }
    }

    /// §4.H step 3: fan the judge's refined queries out in parallel, fuse
    /// every list (round 1 included) via RRF, rerank the merged top-N, and
    /// truncate to `top_k`. `judge_failed` is threaded through even though
    /// this path is only reached when the judge succeeded but found round 1
    /// insufficient (or round 1 was empty) — it is always `false` here, but
    /// kept as a parameter so a future caller short-circuiting straight to
    /// round 2 has somewhere to put it.
    async fn run_round2(
        &self,
        request: &AgenticRequest,
        decision: JudgeDecision,
        round1_ids: Vec<Uuid>,
        judge_failed: bool,
    ) -> Result<AgenticResponse, PortError> {
        let refined_queries: Vec<String> = decision
            .refined_queries
            .into_iter()
            .take(self.config.refined_query_cap)
            .collect();

        let round1_cap = request.top_k.min(self.config.round1_cap);
        let mut handles = Vec::with_capacity(refined_queries.len());
        for query in &refined_queries {
            let hybrid = self.hybrid.clone();
            let leg_request = RetrievalRequest {
                query: query.clone(),
                scope_request: request.scope_request.clone(),
                data_source: request.data_source,
                mode: RetrievalMode::Rrf,
                top_k: round1_cap,
                radius: request.radius,
            };
            handles.push(tokio::spawn(async move { hybrid.retrieve(&leg_request).await }));
        }

        let mut lists: Vec<Vec<Uuid>> = vec![round1_ids];
        for handle in handles {
            match handle.await {
                Ok(Ok(response)) => lists.push(response.hits.into_iter().map(|h| h.id).collect()),
                Ok(Err(e)) => warn!("round-2 retrieval leg failed: {e}"),
                Err(e) => warn!("round-2 retrieval task panicked: {e}"),
            }
        }

        let fused = rrf_fuse(&lists, self.hybrid.rrf_k());
        let mut items = Vec::with_capacity(fused.len().min(self.config.merge_rerank_cap));
        for (id, score) in fused.into_iter().take(self.config.merge_rerank_cap) {
            let text = self.store.hit_text(request.data_source, id).await.unwrap_or_default();
            items.push(RerankItem { id, score, text });
        }

        let reranked = self.rerank.rerank(&request.query, items).await;
        Ok(finalize(reranked, request.top_k, 2, true, judge_failed, refined_queries))
    }

    async fn resolve_and_rerank(&self, query: &str, data_source: DataSource, hits: Vec<Hit>) -> Vec<RerankItem> {
        if hits.is_empty() {
            return Vec::new();
        }

        let mut items = Vec::with_capacity(hits.len());
        for hit in hits {
            let text = self.store.hit_text(data_source, hit.id).await.unwrap_or_default();
            items.push(RerankItem {
                id: hit.id,
                score: hit.score,
                text,
            });
        }

        self.rerank.rerank(query, items).await
    }
}

fn finalize(
    items: Vec<RerankItem>,
    top_k: usize,
    rounds: u32,
    is_multi_round: bool,
    judge_failed: bool,
    refined_queries: Vec<String>,
) -> AgenticResponse {
    let mut hits: Vec<Hit> = items.into_iter().map(|i| Hit { id: i.id, score: i.score }).collect();
    hits.truncate(top_k);

    AgenticResponse {
        hits,
        metadata: AgenticMetadata {
            rounds,
            is_multi_round,
            judge_failed,
            refined_queries,
        },
    }
}

fn truncate(text: &str, max_chars: usize) -> &str {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use memoria_config::{RerankConfig, RetrievalConfig};
    use memoria_core::port::{DocFilter, DocStorePort, EmbedderPort, RerankerPort, TextDoc, TextIndexPort, VectorIndexPort};
    use memoria_core::LlmResponse;
    use memoria_entities::{episodic_memory, event_log, foresight, profile, semantic_memory};
    use memoria_memory::{BM25TextIndex, BruteForceVectorIndex};

    struct FixedEmbedder;

    #[async_trait]
    impl EmbedderPort for FixedEmbedder {
        async fn embed(&self, _text: &str) -> Result<Vec<f32>, PortError> {
            Ok(vec![1.0, 0.0])
        }
    }

    struct IdentityReranker;

    #[async_trait]
    impl RerankerPort for IdentityReranker {
        async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, PortError> {
            #[allow(clippy::cast_precision_loss)]
            Ok((0..documents.len()).rev().map(|i| i as f32).collect())
        }
    }

    struct ScriptedLlm {
        response: String,
    }

    #[async_trait]
    impl LlmPort for ScriptedLlm {
        async fn chat(&self, _messages: &[ChatMessage], _model: &str) -> Result<LlmResponse, PortError> {
            Ok(LlmResponse {
                content: self.response.clone(),
                usage: None,
            })
        }
    }

    struct FailingLlm;

    #[async_trait]
    impl LlmPort for FailingLlm {
        async fn chat(&self, _messages: &[ChatMessage], _model: &str) -> Result<LlmResponse, PortError> {
            Err(PortError::Rejected("judge endpoint down".to_string()))
        }
    }

    /// Bare in-memory `DocStorePort<T>` for any entity model with a `pub id:
    /// Uuid` field, just enough to let `MemoryStore::hit_text` resolve rows
    /// seeded with `put` — mirrors the donor test suites' habit of a
    /// minimal fake collaborator rather than a mocking framework.
    struct InMemoryDocStore<T> {
        rows: tokio::sync::Mutex<Vec<T>>,
        id_of: fn(&T) -> Uuid,
    }

    impl<T> InMemoryDocStore<T> {
        fn new(id_of: fn(&T) -> Uuid) -> Self {
            Self {
                rows: tokio::sync::Mutex::new(Vec::new()),
                id_of,
            }
        }
    }

    #[async_trait]
    impl<T: Clone + Send + Sync> DocStorePort<T> for InMemoryDocStore<T> {
        async fn put(&self, record: &T) -> Result<(), PortError> {
            self.rows.lock().await.push(record.clone());
            Ok(())
        }

        async fn get(&self, id: Uuid) -> Result<Option<T>, PortError> {
            let rows = self.rows.lock().await;
            Ok(rows.iter().find(|r| (self.id_of)(r) == id).cloned())
        }

        async fn query(&self, _filter: &DocFilter) -> Result<Vec<T>, PortError> {
            Ok(self.rows.lock().await.clone())
        }

        async fn patch(&self, _id: Uuid, _fields: serde_json::Value) -> Result<(), PortError> {
            Ok(())
        }

        async fn soft_delete(&self, _filter: &DocFilter) -> Result<u64, PortError> {
            Ok(0)
        }
    }

    fn empty_store() -> Arc<MemoryStore> {
        Arc::new(MemoryStore::new(
            Arc::new(InMemoryDocStore::new(|m: &episodic_memory::Model| m.id)),
            Arc::new(InMemoryDocStore::new(|m: &event_log::Model| m.id)),
            Arc::new(InMemoryDocStore::new(|m: &semantic_memory::Model| m.id)),
            Arc::new(InMemoryDocStore::new(|m: &profile::Model| m.id)),
            Arc::new(InMemoryDocStore::new(|m: &foresight::Model| m.id)),
            Arc::new(BM25TextIndex::new()),
            Arc::new(BruteForceVectorIndex::new()),
            Arc::new(FixedEmbedder),
        ))
    }

    fn hybrid_fixture() -> Arc<HybridRetriever> {
        Arc::new(HybridRetriever::new(
            Arc::new(BM25TextIndex::new()),
            Arc::new(BruteForceVectorIndex::new()),
            Arc::new(FixedEmbedder),
            RetrievalConfig::default(),
        ))
    }

    fn rerank_fixture() -> Arc<RerankStage> {
        Arc::new(RerankStage::new(Arc::new(IdentityReranker), RerankConfig::default()))
    }

    #[tokio::test]
    async fn empty_round1_short_circuits_without_llm_call() {
        let hybrid = hybrid_fixture();
        let rerank = rerank_fixture();
        let store = empty_store();
        let agentic = AgenticRetriever::new(hybrid, rerank, store, Arc::new(FailingLlm), AgenticConfig::default());

        let response = agentic
            .agentic_retrieve(&AgenticRequest {
                query: "anything".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(memoria_core::MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::Episode,
                top_k: 5,
                llm_model: "test-model".to_string(),
                radius: None,
            })
            .await
            .unwrap();

        assert!(response.hits.is_empty());
        assert_eq!(response.metadata.rounds, 2);
        assert!(response.metadata.is_multi_round);
        assert!(!response.metadata.judge_failed);
    }

    #[tokio::test]
    async fn judge_failure_terminates_at_round_one() {
        let text_index = Arc::new(BM25TextIndex::new());
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
        let hybrid = Arc::new(HybridRetriever::new(
            text_index,
            Arc::new(BruteForceVectorIndex::new()),
            Arc::new(FixedEmbedder),
            RetrievalConfig::default(),
        ));
        let rerank = rerank_fixture();
        let store = empty_store();
        let agentic = AgenticRetriever::new(hybrid, rerank, store, Arc::new(FailingLlm), AgenticConfig::default());

        let response = agentic
            .agentic_retrieve(&AgenticRequest {
                query: "coffee".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(memoria_core::MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::Episode,
                top_k: 5,
                llm_model: "test-model".to_string(),
                radius: None,
            })
            .await
            .unwrap();

        assert_eq!(response.metadata.rounds, 1);
        assert!(!response.metadata.is_multi_round);
        assert!(response.metadata.judge_failed);
    }

    #[tokio::test]
    async fn sufficient_verdict_terminates_at_round_one() {
        let text_index = Arc::new(BM25TextIndex::new());
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
        let hybrid = Arc::new(HybridRetriever::new(
            text_index,
            Arc::new(BruteForceVectorIndex::new()),
            Arc::new(FixedEmbedder),
            RetrievalConfig::default(),
        ));
        let rerank = rerank_fixture();
        let store = empty_store();
        let llm = Arc::new(ScriptedLlm {
            response: "<decision>SUFFICIENT</decision>".to_string(),
        });
        let agentic = AgenticRetriever::new(hybrid, rerank, store, llm, AgenticConfig::default());

        let response = agentic
            .agentic_retrieve(&AgenticRequest {
                query: "coffee".to_string(),
                scope_request: ScopeRequest {
                    scope: Some(memoria_core::MemoryScope::Personal),
                    user_id: Some("u1".to_string()),
                    group_id: None,
                    time_range_days: None,
                    current_time: None,
                },
                data_source: DataSource::Episode,
                top_k: 5,
                llm_model: "test-model".to_string(),
                radius: None,
            })
            .await
            .unwrap();

        assert_eq!(response.hits.len(), 1);
        assert_eq!(response.metadata.rounds, 1);
        assert!(!response.metadata.is_multi_round);
    }
}
