//! Scope & filter layer (§4.J): translates `MemoryScope` + a time window
//! into the filter shapes the three collaborator ports accept. Central so
//! `HybridRetriever`, `MemoryStore::fetch` and the delete endpoint resolve
//! `"__all__"` the same way exactly once.

use chrono::{DateTime, Duration, Utc};
use memoria_core::port::{DocFilter, TextQuery, VectorFilter};
use memoria_core::{is_all_sentinel, MemoryScope};

/// Caller-facing scope parameters before sentinel resolution.
#[derive(Debug, Clone, Default)]
pub struct ScopeRequest {
    pub scope: Option<MemoryScope>,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub time_range_days: Option<i64>,
    pub current_time: Option<DateTime<Utc>>,
}

/// Resolved `(user_id, group_id)` after applying scope rules (§4.F "Scope
/// rules", §4.J).
#[derive(Debug, Clone, Default)]
pub struct ResolvedScope {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
}

fn resolve_sentinel(value: Option<&str>) -> Option<String> {
    match value {
        Some(v) if !is_all_sentinel(v) => Some(v.to_string()),
        _ => None,
    }
}

impl ScopeRequest {
    /// Resolve scope + time window into store-native filter fields.
    ///
    /// `scope=personal` ignores `group_id` entirely; `scope=group` ignores
    /// `user_id`; `scope=all` applies both once resolved. A time filter of
    /// `[now - time_range_days, now]` is always applied unless the caller
    /// passes `time_range_days = None` explicitly disabling it (§4.J).
    #[must_use]
    pub fn resolve(&self) -> ResolvedScope {
        let scope = self.scope.unwrap_or(MemoryScope::All);
        let user_id = match scope {
            MemoryScope::Group => None,
            MemoryScope::Personal | MemoryScope::All => resolve_sentinel(self.user_id.as_deref()),
        };
        let group_id = match scope {
            MemoryScope::Personal => None,
            MemoryScope::Group | MemoryScope::All => resolve_sentinel(self.group_id.as_deref()),
        };
        let created_after = self.time_range_days.map(|days| {
            let now = self.current_time.unwrap_or_else(Utc::now);
            now - Duration::days(days)
        });

        ResolvedScope {
            user_id,
            group_id,
            created_after,
        }
    }
}

impl ResolvedScope {
    #[must_use]
    pub fn to_doc_filter(&self) -> DocFilter {
        DocFilter {
            user_id: self.user_id.clone(),
            group_id: self.group_id.clone(),
            created_after: self.created_after,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn to_text_query(&self, memory_type: &str, query: &str, limit: usize) -> TextQuery {
        TextQuery {
            memory_type: memory_type.to_string(),
            query: query.to_string(),
            user_id: self.user_id.clone(),
            group_id: self.group_id.clone(),
            created_after: self.created_after,
            limit,
            ..Default::default()
        }
    }

    #[must_use]
    pub fn to_vector_filter(&self, memory_type: &str) -> VectorFilter {
        VectorFilter {
            memory_type: memory_type.to_string(),
            user_id: self.user_id.clone(),
            group_id: self.group_id.clone(),
            created_after: self.created_after,
            ..Default::default()
        }
    }
}

/// Validates the §4.J/§6 invariant that mutating (delete) calls require at
/// least one non-`"__all__"` filter field.
#[must_use]
pub fn requires_non_sentinel_filter(user_id: Option<&str>, group_id: Option<&str>) -> bool {
    resolve_sentinel(user_id).is_some() || resolve_sentinel(group_id).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn personal_scope_ignores_group_id() {
        let resolved = ScopeRequest {
            scope: Some(MemoryScope::Personal),
            user_id: Some("u1".to_string()),
            group_id: Some("g1".to_string()),
            time_range_days: None,
            current_time: None,
        }
        .resolve();
        assert_eq!(resolved.user_id.as_deref(), Some("u1"));
        assert_eq!(resolved.group_id, None);
    }

    #[test]
    fn group_scope_ignores_user_id() {
        let resolved = ScopeRequest {
            scope: Some(MemoryScope::Group),
            user_id: Some("u1".to_string()),
            group_id: Some("g1".to_string()),
            time_range_days: None,
            current_time: None,
        }
        .resolve();
        assert_eq!(resolved.user_id, None);
        assert_eq!(resolved.group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn all_sentinel_resolves_to_none() {
        let resolved = ScopeRequest {
            scope: Some(MemoryScope::All),
            user_id: Some("__all__".to_string()),
            group_id: Some("g1".to_string()),
            time_range_days: None,
            current_time: None,
        }
        .resolve();
        assert_eq!(resolved.user_id, None);
        assert_eq!(resolved.group_id.as_deref(), Some("g1"));
    }

    #[test]
    fn delete_requires_non_sentinel_field() {
        assert!(!requires_non_sentinel_filter(Some("__all__"), Some("__all__")));
        assert!(requires_non_sentinel_filter(Some("__all__"), Some("g1")));
    }
}
