#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

//! Shared types, collaborator-port contracts and math depended on by every
//! other `memoria_*` crate: chat message shapes, the `MemoryError` taxonomy,
//! retry-with-backoff, and the RRF fusion primitive used by both the hybrid
//! retriever and the agentic retrieval loop.

pub mod adaptive;
pub mod error;
pub mod port;
pub mod retry;
pub mod rrf;
pub mod util;

pub use error::{ErrorKind, MemoryError, MemoryResult};
pub use util::content_hash;

use serde::{Deserialize, Serialize};

/// Role of a message in an LLM chat exchange or an ingested conversation.
///
/// Ingested messages only ever carry `User`/`Assistant` (§3 of the data
/// model); `System` exists so collaborator-port callers (the Extractor, the
/// agentic judge) can build well-formed chat transcripts for `LlmPort::chat`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmResponse {
    pub content: String,
    pub usage: Option<Usage>,
}

#[derive(Debug, Clone, Copy)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

/// Scope selector shared by the hybrid retriever (§4.F) and the scope &
/// filter layer (§4.J).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MemoryScope {
    All,
    Personal,
    Group,
}

/// The sentinel meaning "do not filter by this field" for `user_id`/`group_id` (§4.J).
pub const ALL_SENTINEL: &str = "__all__";

#[must_use]
pub fn is_all_sentinel(value: &str) -> bool {
    value == ALL_SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinel_recognized() {
        assert!(is_all_sentinel("__all__"));
        assert!(!is_all_sentinel("user-1"));
    }
}
