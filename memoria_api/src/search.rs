//! Search endpoint contract (§6 "Search endpoint"). `retrieve_method` maps
//! onto `memoria_memory::RetrievalMode` for the non-agentic methods and a
//! separate `Agentic` branch a caller dispatches to
//! `memoria_agentic::AgenticRetriever` instead of `HybridRetriever`.

use chrono::{DateTime, Utc};
use memoria_memory::{DataSource, RetrievalMode, ScopeRequest};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const MAX_TOP_K: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrieveMethod {
    Keyword,
    Vector,
    Hybrid,
    Rrf,
    Agentic,
}

impl RetrieveMethod {
    /// `Agentic` has no `RetrievalMode` counterpart — callers match on it
    /// before reaching `HybridRetriever` (§4.H composes F, not the reverse).
    #[must_use]
    pub const fn as_retrieval_mode(self) -> Option<RetrievalMode> {
        match self {
            Self::Keyword => Some(RetrievalMode::Bm25),
            Self::Vector => Some(RetrievalMode::Embedding),
            Self::Hybrid | Self::Rrf => Some(RetrievalMode::Rrf),
            Self::Agentic => None,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct SearchRequest {
    pub query: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub retrieve_method: RetrieveMethod,
    pub memory_types: Vec<String>,
    #[serde(default = "default_top_k")]
    pub top_k: usize,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub radius: Option<f64>,
    pub current_time: Option<DateTime<Utc>>,
}

const fn default_top_k() -> usize {
    10
}

fn parse_data_source(memory_type: &str) -> Result<DataSource, ApiError> {
    match memory_type {
        "episodic_memory" => Ok(DataSource::Episode),
        "event_log" => Ok(DataSource::EventLog),
        "semantic_memory" => Ok(DataSource::SemanticMemory),
        "foresight" => Ok(DataSource::Foresight),
        "profile" => Err(ApiError::invalid_parameter(
            "profile is not a valid memory_types value for search (§6)",
        )),
        other => Err(ApiError::invalid_parameter(format!(
            "unknown memory_type {other:?}"
        ))),
    }
}

pub struct ResolvedSearch {
    pub data_sources: Vec<DataSource>,
    pub scope_request: ScopeRequest,
    pub top_k: usize,
    pub current_time: DateTime<Utc>,
    pub radius: Option<f64>,
}

impl SearchRequest {
    pub fn resolve(&self) -> Result<ResolvedSearch, ApiError> {
        if self.top_k == 0 || self.top_k > MAX_TOP_K {
            return Err(ApiError::invalid_parameter(format!(
                "top_k must be in 1..={MAX_TOP_K}"
            )));
        }
        if self.memory_types.is_empty() {
            return Err(ApiError::invalid_parameter(
                "memory_types must not be empty",
            ));
        }
        let data_sources = self
            .memory_types
            .iter()
            .map(|t| parse_data_source(t))
            .collect::<Result<Vec<_>, _>>()?;

        let current_time = self.current_time.unwrap_or_else(Utc::now);
        let time_range_days = self
            .start_time
            .map(|start| (current_time - start).num_days().max(0));

        Ok(ResolvedSearch {
            data_sources,
            scope_request: ScopeRequest {
                scope: None,
                user_id: self.user_id.clone(),
                group_id: self.group_id.clone(),
                time_range_days,
                current_time: Some(current_time),
            },
            top_k: self.top_k,
            current_time,
            radius: self.radius,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchHit {
    pub memory_type: String,
    pub id: uuid::Uuid,
    pub score: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchMetadata {
    pub vector_modality_skipped: Vec<String>,
    pub partial: bool,
    pub is_multi_round: bool,
    pub rounds: u32,
    pub judge_failed: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    pub status: &'static str,
    pub hits: Vec<SearchHit>,
    pub metadata: SearchMetadata,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> SearchRequest {
        SearchRequest {
            query: "q".to_string(),
            user_id: Some("u1".to_string()),
            group_id: None,
            retrieve_method: RetrieveMethod::Rrf,
            memory_types: vec!["episodic_memory".to_string()],
            top_k: 10,
            start_time: None,
            end_time: None,
            radius: None,
            current_time: None,
        }
    }

    #[test]
    fn rejects_profile_memory_type() {
        let mut req = base();
        req.memory_types = vec!["profile".to_string()];
        assert!(req.resolve().is_err());
    }

    #[test]
    fn rejects_top_k_over_max() {
        let mut req = base();
        req.top_k = 101;
        assert!(req.resolve().is_err());
    }

    #[test]
    fn agentic_has_no_retrieval_mode() {
        assert!(RetrieveMethod::Agentic.as_retrieval_mode().is_none());
        assert!(RetrieveMethod::Hybrid.as_retrieval_mode().is_some());
    }
}
