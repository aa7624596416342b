//! Fetch endpoint contract (§6 "Fetch endpoint").

use chrono::{DateTime, Utc};
use memoria_core::port::DocFilter;
use memoria_memory::{requires_non_sentinel_filter, DataSource, SortBy, SortOrder};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const MAX_LIMIT: usize = 500;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct FetchRequest {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub memory_type: String,
    #[serde(default = "default_limit")]
    pub limit: usize,
    #[serde(default)]
    pub offset: usize,
    #[serde(default)]
    pub sort_by: SortBy,
    #[serde(default)]
    pub sort_order: SortOrder,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub version_range: Option<(i32, i32)>,
}

const fn default_limit() -> usize {
    100
}

fn parse_data_source(memory_type: &str) -> Result<DataSource, ApiError> {
    match memory_type {
        "episodic_memory" => Ok(DataSource::Episode),
        "event_log" => Ok(DataSource::EventLog),
        "semantic_memory" => Ok(DataSource::SemanticMemory),
        "profile" => Ok(DataSource::Profile),
        "foresight" => Ok(DataSource::Foresight),
        other => Err(ApiError::invalid_parameter(format!(
            "unknown memory_type {other:?}"
        ))),
    }
}

pub struct ResolvedFetch {
    pub data_source: DataSource,
    pub filter: DocFilter,
    pub version_range: Option<(i32, i32)>,
    pub sort_by: SortBy,
    pub sort_order: SortOrder,
    pub limit: usize,
    pub offset: usize,
}

impl FetchRequest {
    /// §6 "At least one of user_id/group_id must not be `__all__`" +
    /// `limit ≤ 500` (§6 "Fetch endpoint").
    pub fn resolve(&self) -> Result<ResolvedFetch, ApiError> {
        if self.limit > MAX_LIMIT {
            return Err(ApiError::invalid_parameter(format!(
                "limit {} exceeds max {MAX_LIMIT}",
                self.limit
            )));
        }
        if !requires_non_sentinel_filter(self.user_id.as_deref(), self.group_id.as_deref()) {
            return Err(ApiError::invalid_parameter(
                "at least one of user_id/group_id must not be __all__",
            ));
        }
        let data_source = parse_data_source(&self.memory_type)?;

        let user_id = self.user_id.as_deref().filter(|v| *v != "__all__").map(str::to_string);
        let group_id = self.group_id.as_deref().filter(|v| *v != "__all__").map(str::to_string);

        Ok(ResolvedFetch {
            data_source,
            filter: DocFilter {
                user_id,
                group_id,
                created_after: self.start_time,
                created_before: self.end_time,
                ..Default::default()
            },
            version_range: self.version_range,
            sort_by: self.sort_by,
            sort_order: self.sort_order,
            limit: self.limit,
            offset: self.offset,
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchResponse {
    pub status: &'static str,
    pub rows: Vec<serde_json::Value>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> FetchRequest {
        FetchRequest {
            user_id: Some("__all__".to_string()),
            group_id: Some("__all__".to_string()),
            memory_type: "episodic_memory".to_string(),
            limit: default_limit(),
            offset: 0,
            sort_by: SortBy::CreatedAt,
            sort_order: SortOrder::Desc,
            start_time: None,
            end_time: None,
            version_range: None,
        }
    }

    #[test]
    fn rejects_all_sentinel() {
        assert!(base().resolve().is_err());
    }

    #[test]
    fn rejects_oversized_limit() {
        let mut req = base();
        req.group_id = Some("g1".to_string());
        req.limit = 1000;
        assert!(req.resolve().is_err());
    }

    #[test]
    fn accepts_one_non_sentinel_field() {
        let mut req = base();
        req.user_id = Some("u1".to_string());
        assert!(req.resolve().is_ok());
    }

    #[test]
    fn rejects_unknown_memory_type() {
        let mut req = base();
        req.user_id = Some("u1".to_string());
        req.memory_type = "bogus".to_string();
        assert!(req.resolve().is_err());
    }
}
