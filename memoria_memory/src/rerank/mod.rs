//! Reranker stage (component G, §4.G, §4.G.1): batch-concurrent reranking
//! with per-batch backoff and per-batch fallback to pre-rerank order.

use std::sync::Arc;

use memoria_config::RerankConfig;
use memoria_core::port::RerankerPort;
use memoria_core::retry::{retry_with_backoff, BackoffConfig};
use tokio::sync::Semaphore;
use tracing::warn;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct RerankItem {
    pub id: Uuid,
    pub score: f64,
    pub text: String,
}

pub struct RerankStage {
    reranker: Arc<dyn RerankerPort>,
    config: RerankConfig,
}

impl RerankStage {
    #[must_use]
    pub const fn new(reranker: Arc<dyn RerankerPort>, config: RerankConfig) -> Self {
        Self { reranker, config }
    }

    /// Chunks `items` into `rerank_batch_size` batches and dispatches them
    /// with at most `rerank_concurrency` in flight via a semaphore
    /// (§4.G.1, mirroring the donor's bounded-queue backpressure idiom). A
    /// batch whose retries are exhausted degrades to that batch's
    /// pre-rerank relative order; other batches are unaffected.
    pub async fn rerank(&self, query: &str, items: Vec<RerankItem>) -> Vec<RerankItem> {
        if items.is_empty() {
            return items;
        }

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency.max(1)));
        let backoff = BackoffConfig {
            max_attempts: self.config.max_attempts,
            ..BackoffConfig::default()
        };

        let batches: Vec<Vec<RerankItem>> = items
            .chunks(self.config.batch_size.max(1))
            .map(<[RerankItem]>::to_vec)
            .collect();

        let mut handles = Vec::with_capacity(batches.len());
        for batch in batches {
            let semaphore = semaphore.clone();
            let reranker = self.reranker.clone();
            let query = query.to_string();
            handles.push(tokio::spawn(async move {
                let _permit = semaphore.acquire().await;
                rerank_batch(reranker.as_ref(), &query, batch, backoff).await
            }));
        }

        let mut reranked = Vec::new();
        for handle in handles {
            match handle.await {
                Ok(batch) => reranked.extend(batch),
                Err(e) => warn!("rerank batch task panicked: {e}"),
            }
        }

        reranked.sort_by(|a: &RerankItem, b: &RerankItem| b.score.total_cmp(&a.score));
        reranked
    }
}

async fn rerank_batch(
    reranker: &dyn RerankerPort,
    query: &str,
    batch: Vec<RerankItem>,
    backoff: BackoffConfig,
) -> Vec<RerankItem> {
    let documents: Vec<String> = batch.iter().map(|i| i.text.clone()).collect();

    let result = retry_with_backoff(backoff, || reranker.rerank(query, &documents)).await;

    match result {
        Ok(scores) if scores.len() == batch.len() => batch
            .into_iter()
            .zip(scores)
            .map(|(item, score)| RerankItem {
                score: f64::from(score),
                ..item
            })
            .collect(),
        Ok(_) => {
            warn!("reranker returned a mismatched score count, falling back to pre-rerank order");
            batch
        }
        Err(e) => {
            warn!("rerank batch exhausted retries, falling back to pre-rerank order: {e}");
            batch
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use memoria_core::port::PortError;

    struct ReverseReranker;

    #[async_trait::async_trait]
    impl RerankerPort for ReverseReranker {
        async fn rerank(&self, _query: &str, documents: &[String]) -> Result<Vec<f32>, PortError> {
            let n = documents.len();
            #[allow(clippy::cast_precision_loss)]
            Ok((0..n).rev().map(|i| i as f32).collect())
        }
    }

    struct FailingReranker;

    #[async_trait::async_trait]
    impl RerankerPort for FailingReranker {
        async fn rerank(&self, _query: &str, _documents: &[String]) -> Result<Vec<f32>, PortError> {
            Err(PortError::Rejected("boom".to_string()))
        }
    }

    fn item(id_seed: u8, score: f64) -> RerankItem {
        RerankItem {
            id: Uuid::from_u128(u128::from(id_seed)),
            score,
            text: format!("doc-{id_seed}"),
        }
    }

    #[tokio::test]
    async fn reorders_by_reranker_scores() {
        let stage = RerankStage::new(
            Arc::new(ReverseReranker),
            RerankConfig {
                batch_size: 16,
                concurrency: 2,
                max_attempts: 1,
            },
        );
        let items = vec![item(1, 0.1), item(2, 0.2), item(3, 0.3)];
        let reranked = stage.rerank("q", items).await;
        assert_eq!(reranked[0].id, Uuid::from_u128(1));
    }

    #[tokio::test]
    async fn failing_batch_falls_back_to_pre_rerank_order() {
        let stage = RerankStage::new(
            Arc::new(FailingReranker),
            RerankConfig {
                batch_size: 16,
                concurrency: 2,
                max_attempts: 1,
            },
        );
        let items = vec![item(1, 0.9), item(2, 0.5)];
        let reranked = stage.rerank("q", items).await;
        assert_eq!(reranked[0].id, Uuid::from_u128(1));
    }
}
