//! Delete endpoint contract (§6 "Delete endpoint"): `{event_id?, user_id?,
//! group_id?}`, AND-combined; all-`__all__` is rejected (§4.J, §8 property 6).

use memoria_core::port::DocFilter;
use memoria_memory::requires_non_sentinel_filter;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct DeleteRequest {
    pub event_id: Option<Uuid>,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
}

impl DeleteRequest {
    /// §6 "all-`__all__` is rejected": a bare `memory_id` filter always
    /// satisfies this even without a non-sentinel user/group, since
    /// `memory_id` is never `"__all__"`-able.
    pub fn resolve(&self) -> Result<DocFilter, ApiError> {
        let has_memory_id = self.event_id.is_some();
        let has_scope_filter =
            requires_non_sentinel_filter(self.user_id.as_deref(), self.group_id.as_deref());
        if !has_memory_id && !has_scope_filter {
            return Err(ApiError::invalid_parameter(
                "at least one of event_id/user_id/group_id must be a non-__all__ filter",
            ));
        }
        let user_id = self.user_id.as_deref().filter(|v| *v != "__all__").map(str::to_string);
        let group_id = self.group_id.as_deref().filter(|v| *v != "__all__").map(str::to_string);
        Ok(DocFilter {
            user_id,
            group_id,
            memory_id: self.event_id,
            ..Default::default()
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteResponse {
    pub status: &'static str,
    pub deleted_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_all_sentinel_with_no_event_id() {
        let req = DeleteRequest {
            event_id: None,
            user_id: Some("__all__".to_string()),
            group_id: Some("__all__".to_string()),
        };
        assert!(req.resolve().is_err());
    }

    #[test]
    fn accepts_bare_event_id() {
        let req = DeleteRequest {
            event_id: Some(Uuid::now_v7()),
            user_id: None,
            group_id: None,
        };
        assert!(req.resolve().is_ok());
    }
}
