//! Ingestion endpoint contract (§6 "Ingestion endpoint"): `IngestRequest` is
//! the wire shape of one `Message` (§3); `IngestResponse` is the
//! `{status, message, result}` envelope a hypothetical HTTP handler would
//! serialize.

use chrono::{DateTime, Utc};
use memoria_core::Role;
use memoria_ingest::Message;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IngestRequest {
    pub message_id: String,
    /// ISO 8601. Timezone-qualified strings are parsed as-is; a
    /// timezone-naive string is assumed UTC (§6 "Timestamps" —
    /// `default_timezone` resolution beyond UTC is a `ConversationMeta`
    /// display concern, not a parse concern, since no IANA tz database
    /// dependency is carried by this workspace; see `DESIGN.md`).
    pub create_time: String,
    pub sender: String,
    pub sender_name: Option<String>,
    pub role: Role,
    pub content: String,
    pub group_id: Option<String>,
    pub group_name: Option<String>,
    #[serde(default)]
    pub refer_list: Vec<String>,
}

/// Parses `create_time`, rejecting anything that isn't valid ISO 8601
/// (§6 "Errors: `INVALID_PARAMETER` ... for schema/time parse failures").
pub fn parse_create_time(raw: &str) -> Result<DateTime<Utc>, ApiError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&Utc));
    }
    raw.parse::<chrono::NaiveDateTime>()
        .map(|naive| naive.and_utc())
        .map_err(|e| ApiError::invalid_parameter(format!("invalid create_time {raw:?}: {e}")))
}

impl IngestRequest {
    /// §3 "Message" + §6 "schema/time parse failures" validation.
    pub fn into_message(self) -> Result<Message, ApiError> {
        if self.message_id.trim().is_empty() {
            return Err(ApiError::invalid_parameter("message_id must not be empty"));
        }
        if self.sender.trim().is_empty() {
            return Err(ApiError::invalid_parameter("sender must not be empty"));
        }
        if !matches!(self.role, Role::User | Role::Assistant) {
            return Err(ApiError::invalid_parameter(
                "role must be one of user, assistant",
            ));
        }
        let create_time = parse_create_time(&self.create_time)?;
        Ok(Message {
            message_id: self.message_id,
            create_time,
            sender: self.sender,
            sender_name: self.sender_name,
            role: self.role,
            content: self.content,
            group_id: self.group_id,
            group_name: self.group_name,
            refer_list: self.refer_list,
        })
    }
}

/// `status_info` (§6 "Ingestion endpoint" response shape).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StatusInfo {
    Accumulated,
    Extracted,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResult {
    pub saved_memories: Vec<uuid::Uuid>,
    pub count: usize,
    pub status_info: StatusInfo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestResponse {
    pub status: &'static str,
    pub message: String,
    pub result: IngestResult,
}

impl IngestResponse {
    #[must_use]
    pub fn accumulated() -> Self {
        Self {
            status: "ok",
            message: "message accumulated".to_string(),
            result: IngestResult {
                saved_memories: Vec::new(),
                count: 0,
                status_info: StatusInfo::Accumulated,
            },
        }
    }

    #[must_use]
    pub fn extracted(saved_memories: Vec<uuid::Uuid>) -> Self {
        let count = saved_memories.len();
        Self {
            status: "ok",
            message: format!("episode extracted into {count} memories"),
            result: IngestResult {
                saved_memories,
                count,
                status_info: StatusInfo::Extracted,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_blank_message_id() {
        let req = IngestRequest {
            message_id: String::new(),
            create_time: "2025-02-01T10:00:00Z".to_string(),
            sender: "u1".to_string(),
            sender_name: None,
            role: Role::User,
            content: "hi".to_string(),
            group_id: None,
            group_name: None,
            refer_list: vec![],
        };
        assert!(req.into_message().is_err());
    }

    #[test]
    fn rejects_unparseable_time() {
        let err = parse_create_time("not-a-time").unwrap_err();
        assert_eq!(err.code, crate::error::ApiErrorCode::InvalidParameter);
    }

    #[test]
    fn accepts_offset_and_naive_forms() {
        assert!(parse_create_time("2025-02-01T10:00:00Z").is_ok());
        assert!(parse_create_time("2025-02-01T10:00:00").is_ok());
    }
}
