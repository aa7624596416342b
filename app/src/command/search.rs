use memoria_agentic::AgenticRequest;
use memoria_api::{RetrieveMethod, SearchHit, SearchMetadata, SearchRequest, SearchResponse};
use memoria_memory::{DataSource, RerankItem, RetrievalRequest};

use super::{CommandStrategy, Runtime};

pub struct SearchInput {
    pub query: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub method: String,
    pub memory_type: String,
    pub top_k: usize,
}

/// Strategy for the search endpoint (§6 "Search endpoint"): dispatches to
/// `HybridRetriever` for `keyword`/`vector`/`hybrid`/`rrf`, or to
/// `AgenticRetriever` for `agentic` (§4.H composes §4.F, not the reverse).
#[derive(Debug, Clone, Copy)]
pub struct SearchStrategy;

impl CommandStrategy for SearchStrategy {
    type Input = SearchInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let retrieve_method = parse_method(&input.method)?;
        let request = SearchRequest {
            query: input.query,
            user_id: input.user_id,
            group_id: input.group_id,
            retrieve_method,
            memory_types: vec![input.memory_type],
            top_k: input.top_k,
            start_time: None,
            end_time: None,
            radius: None,
            current_time: None,
        };
        let resolved = request.resolve().map_err(|e| anyhow::anyhow!(e.message))?;

        let rt = Runtime::connect().await?;
        let mut hits = Vec::new();
        let mut metadata = SearchMetadata::default();

        for data_source in resolved.data_sources {
            if retrieve_method == RetrieveMethod::Agentic {
                let response = rt
                    .agentic
                    .agentic_retrieve(&AgenticRequest {
                        query: request.query.clone(),
                        scope_request: resolved.scope_request.clone(),
                        data_source,
                        top_k: resolved.top_k,
                        llm_model: rt.config.providers.llm.model.clone(),
                        radius: resolved.radius,
                    })
                    .await?;
                metadata.rounds = metadata.rounds.max(response.metadata.rounds);
                metadata.is_multi_round |= response.metadata.is_multi_round;
                metadata.judge_failed |= response.metadata.judge_failed;

                let kept = finalize_hits(&rt, data_source, response.hits, resolved.current_time).await?;
                hits.extend(kept.into_iter().map(|h| SearchHit {
                    memory_type: data_source.table_name().to_string(),
                    id: h.id,
                    score: h.score,
                }));
            } else {
                let mode = retrieve_method
                    .as_retrieval_mode()
                    .expect("non-agentic methods always map to a RetrievalMode");
                let response = rt
                    .hybrid
                    .retrieve(&RetrievalRequest {
                        query: request.query.clone(),
                        scope_request: resolved.scope_request.clone(),
                        data_source,
                        mode,
                        top_k: resolved.top_k,
                        radius: resolved.radius,
                    })
                    .await?;
                if response.metadata.vector_modality_skipped {
                    metadata.vector_modality_skipped.push(data_source.table_name().to_string());
                }

                let mut response_hits = response.hits;
                if retrieve_method == RetrieveMethod::Hybrid {
                    // §4.G: rerank is applied automatically for retrieval_mode ∈ {hybrid, agentic}.
                    let mut items = Vec::with_capacity(response_hits.len());
                    for hit in response_hits {
                        let text = rt.memory_store.hit_text(data_source, hit.id).await.unwrap_or_default();
                        items.push(RerankItem {
                            id: hit.id,
                            score: hit.score,
                            text,
                        });
                    }
                    let reranked = rt.rerank.rerank(&request.query, items).await;
                    response_hits = reranked
                        .into_iter()
                        .map(|i| memoria_memory::Hit { id: i.id, score: i.score })
                        .collect();
                }

                let kept = finalize_hits(&rt, data_source, response_hits, resolved.current_time).await?;
                hits.extend(kept.into_iter().map(|h| SearchHit {
                    memory_type: data_source.table_name().to_string(),
                    id: h.id,
                    score: h.score,
                }));
            }
        }

        let response = SearchResponse {
            status: "ok",
            hits,
            metadata,
        };
        println!("{}", serde_json::to_string_pretty(&response)?);
        Ok(())
    }
}

/// Applies the `SemanticMemory` validity window post-filter (§4.F step 1,
/// S4) — the only collection-specific filter that doesn't fit `DocFilter`.
async fn finalize_hits(
    rt: &Runtime,
    data_source: DataSource,
    hits: Vec<memoria_memory::Hit>,
    current_time: chrono::DateTime<chrono::Utc>,
) -> anyhow::Result<Vec<memoria_memory::Hit>> {
    if data_source == DataSource::SemanticMemory {
        Ok(rt.memory_store.filter_semantic_validity(hits, current_time).await?)
    } else {
        Ok(hits)
    }
}

fn parse_method(raw: &str) -> anyhow::Result<RetrieveMethod> {
    match raw {
        "keyword" => Ok(RetrieveMethod::Keyword),
        "vector" => Ok(RetrieveMethod::Vector),
        "hybrid" => Ok(RetrieveMethod::Hybrid),
        "rrf" => Ok(RetrieveMethod::Rrf),
        "agentic" => Ok(RetrieveMethod::Agentic),
        other => anyhow::bail!("unknown retrieve method {other:?}; expected one of keyword, vector, hybrid, rrf, agentic"),
    }
}
