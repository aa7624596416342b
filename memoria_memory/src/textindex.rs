//! In-process BM25 `TextIndexPort` default implementation (§4.A), the
//! in-crate analogue of the donor's `DatabaseCardRepository`
//! default-implementation-of-a-trait pattern: a runnable text index that
//! needs no external search engine, kept behind the same port production
//! deployments swap in an Elasticsearch/equivalent client against.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use memoria_core::port::{PortError, ScoredId, TextDoc, TextIndexPort, TextQuery};
use uuid::Uuid;

const K1: f64 = 1.2;
const B: f64 = 0.75;

fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

struct Posting {
    doc: TextDoc,
    term_freqs: HashMap<String, usize>,
    doc_len: usize,
}

/// In-memory inverted index scored with Okapi BM25, partitioned by
/// `memory_type` (§3 "text index has one logical index per memory type").
#[derive(Default)]
pub struct BM25TextIndex {
    postings: RwLock<HashMap<Uuid, Posting>>,
}

impl BM25TextIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn matches_filters(doc: &TextDoc, q: &TextQuery) -> bool {
        if doc.memory_type != q.memory_type {
            return false;
        }
        if let Some(user_id) = &q.user_id {
            if doc.user_id.as_deref() != Some(user_id.as_str()) {
                return false;
            }
        }
        if let Some(group_id) = &q.group_id {
            if doc.group_id.as_deref() != Some(group_id.as_str()) {
                return false;
            }
        }
        if let Some(after) = q.created_after {
            if doc.created_at < after {
                return false;
            }
        }
        if let Some(before) = q.created_before {
            if doc.created_at > before {
                return false;
            }
        }
        true
    }
}

#[async_trait]
impl TextIndexPort for BM25TextIndex {
    async fn upsert(&self, doc: &TextDoc) -> Result<(), PortError> {
        let tokens = tokenize(&doc.text);
        let doc_len = tokens.len();
        let mut term_freqs = HashMap::new();
        for token in tokens {
            *term_freqs.entry(token).or_insert(0_usize) += 1;
        }

        #[allow(clippy::unwrap_used)]
        let mut postings = self.postings.write().unwrap();
        postings.insert(
            doc.id,
            Posting {
                doc: doc.clone(),
                term_freqs,
                doc_len,
            },
        );
        Ok(())
    }

    async fn query(&self, q: &TextQuery) -> Result<Vec<ScoredId>, PortError> {
        let query_terms = tokenize(&q.query);
        if query_terms.is_empty() {
            return Ok(Vec::new());
        }

        #[allow(clippy::unwrap_used)]
        let postings = self.postings.read().unwrap();
        let candidates: Vec<&Posting> = postings
            .values()
            .filter(|p| Self::matches_filters(&p.doc, q))
            .collect();

        if candidates.is_empty() {
            return Ok(Vec::new());
        }

        #[allow(clippy::cast_precision_loss)]
        let avg_doc_len: f64 = candidates.iter().map(|p| p.doc_len as f64).sum::<f64>()
            / candidates.len() as f64;
        let n = candidates.len();

        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for term in &query_terms {
            let df = candidates
                .iter()
                .filter(|p| p.term_freqs.contains_key(term))
                .count();
            doc_freq.insert(term.as_str(), df);
        }

        let mut scored: Vec<ScoredId> = candidates
            .iter()
            .map(|p| {
                let score = query_terms
                    .iter()
                    .map(|term| {
                        let Some(&tf) = p.term_freqs.get(term) else {
                            return 0.0;
                        };
                        #[allow(clippy::cast_precision_loss)]
                        let tf = tf as f64;
                        let df = *doc_freq.get(term.as_str()).unwrap_or(&0);
                        #[allow(clippy::cast_precision_loss)]
                        let idf = (((n as f64 - df as f64 + 0.5) / (df as f64 + 0.5)) + 1.0).ln();
                        #[allow(clippy::cast_precision_loss)]
                        let norm = 1.0 - B + B * (p.doc_len as f64 / avg_doc_len.max(1.0));
                        idf * (tf * (K1 + 1.0)) / (tf + K1 * norm)
                    })
                    .sum();
                ScoredId {
                    id: p.doc.id,
                    score,
                    created_at: p.doc.created_at,
                }
            })
            .filter(|s| s.score > 0.0)
            .collect();

        scored.sort_by(|a, b| b.score.total_cmp(&a.score));
        scored.truncate(q.limit.max(1));
        Ok(scored)
    }

    async fn delete(&self, id: Uuid) -> Result<(), PortError> {
        #[allow(clippy::unwrap_used)]
        self.postings.write().unwrap().remove(&id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn doc(id: Uuid, text: &str) -> TextDoc {
        TextDoc {
            id,
            memory_type: "episodic_memory".to_string(),
            text: text.to_string(),
            user_id: Some("u1".to_string()),
            group_id: None,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn ranks_matching_document_above_unrelated() {
        let index = BM25TextIndex::new();
        let a = Uuid::now_v7();
        let b = Uuid::now_v7();
        index.upsert(&doc(a, "the user loves hiking in the mountains")).await.unwrap();
        index.upsert(&doc(b, "unrelated completely different content here")).await.unwrap();

        let hits = index
            .query(&TextQuery {
                memory_type: "episodic_memory".to_string(),
                query: "hiking mountains".to_string(),
                user_id: Some("u1".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(hits[0].id, a);
    }

    #[tokio::test]
    async fn filters_by_user_id() {
        let index = BM25TextIndex::new();
        let a = Uuid::now_v7();
        let mut d = doc(a, "shared topic keyword");
        d.user_id = Some("other".to_string());
        index.upsert(&d).await.unwrap();

        let hits = index
            .query(&TextQuery {
                memory_type: "episodic_memory".to_string(),
                query: "shared topic".to_string(),
                user_id: Some("u1".to_string()),
                limit: 10,
                ..Default::default()
            })
            .await
            .unwrap();

        assert!(hits.is_empty());
    }
}
