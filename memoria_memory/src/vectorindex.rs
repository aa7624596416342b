//! In-process brute-force cosine `VectorIndexPort` default implementation
//! (§4.A), reusing `scoring::cosine_similarity` the way the donor's search
//! path does. Event-log vectors use L2 space per §3 and are rejected by
//! `HybridRetriever` before reaching this index (§4.F step 3).

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use memoria_core::port::{PortError, ScoredId, VectorFilter, VectorFilterFields, VectorIndexPort};
use uuid::Uuid;

use crate::scoring::cosine_similarity;

struct Entry {
    embedding: Vec<f32>,
    fields: VectorFilterFields,
}

#[derive(Default)]
pub struct BruteForceVectorIndex {
    entries: RwLock<HashMap<Uuid, Entry>>,
}

impl BruteForceVectorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_filter(fields: &VectorFilterFields, filter: &VectorFilter) -> bool {
        if fields.memory_type != filter.memory_type {
            return false;
        }
        if let Some(user_id) = &filter.user_id {
            if fields.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(group_id) = &filter.group_id {
            if fields.group_id.as_deref() != Some(group_id.as_str()) {
                return false;
            }
        }
        if let Some(after) = filter.created_after {
            if fields.created_at < after {
                return false;
            }
        }
        if let Some(before) = filter.created_before {
            if fields.created_at > before {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl VectorIndexPort for BruteForceVectorIndex {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: &[f32],
        filter_fields: &VectorFilterFields,
    ) -> Result<(), PortError> {
        #[allow(clippy::unwrap_used)]
        let mut entries = self.entries.write().unwrap();
        entries.insert(
            id,
            Entry {
                embedding: embedding.to_vec(),
                fields: filter_fields.clone(),
            },
        );
        Ok(())
    }

    async fn query(
        &self,
        embedding: &[f32],
        filter: &VectorFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredId>, PortError> {
        #[allow(clippy::unwrap_used)]
        let entries = self.entries.read().unwrap();
        let mut scored: Vec<ScoredId> = entries
            .iter()
            .filter(|(_, entry)| Self::matches_filter(&entry.fields, filter))
            .map(|(id, entry)| ScoredId {
                id: *id,
                score: cosine_similarity(embedding, &entry.embedding),
                created_at: entry.fields.created_at,
            })
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(top_k.max(1));
        Ok(scored)
    }

    async fn delete(&self, id: Uuid) -> Result<(), PortError> {
        #[allow(clippy::unwrap_used)]
        self.entries.write().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn fields(memory_type: &str) -> VectorFilterFields {
        VectorFilterFields {
            memory_type: memory_type.to_string(),
            user_id: Some("u1".to_string()),
            group_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn nearest_neighbor_ranks_first() {
        let index = BruteForceVectorIndex::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        index.upsert(a, &[1.0, 0.0, 0.0], &fields("episodic_memory")).await.unwrap();
        index.upsert(b, &[0.0, 1.0, 0.0], &fields("episodic_memory")).await.unwrap();

        let hits = index
            .query(
                &[0.9, 0.1, 0.0],
                &VectorFilter {
                    memory_type: "episodic_memory".to_string(),
                    ..Default::default()
                },
                5,
            )
            .await
            .unwrap();

        assert_eq!(hits[0].id, a);
    }
}
