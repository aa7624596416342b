//! Collaborator ports (§4.A, §9 "Collaborator ports").
//!
//! Five `async_trait` interfaces the rest of the workspace depends on and
//! never implements directly: `memoria_providers` ships the HTTP-based
//! `LlmPort`/`EmbedderPort`/`RerankerPort` clients, `memoria_memory` ships
//! in-process `TextIndexPort`/`VectorIndexPort` defaults plus a sea-orm
//! `DocStorePort<T>`. Provider choice is runtime configuration; core logic
//! is generic over the trait, never over a concrete client.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ChatMessage, LlmResponse};

#[derive(Debug, thiserror::Error)]
pub enum PortError {
    #[error("{collaborator} timed out or was unreachable: {source}")]
    Transient {
        collaborator: &'static str,
        #[source]
        source: anyhow::Error,
    },

    #[error("rejected: {0}")]
    Rejected(String),

    #[error("{0} not found")]
    NotFound(String),
}

impl PortError {
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }
}

#[async_trait]
pub trait LlmPort: Send + Sync {
    async fn chat(&self, messages: &[ChatMessage], model: &str) -> Result<LlmResponse, PortError>;
}

#[async_trait]
pub trait EmbedderPort: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, PortError>;
}

#[async_trait]
pub trait RerankerPort: Send + Sync {
    /// Returns one relevance score per input document, in the same order.
    async fn rerank(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, PortError>;
}

/// Filter accepted by `DocStorePort::query`/`soft_delete` (§4.E, §4.J).
///
/// `user_id`/`group_id` of `None` means "not constrained by this field";
/// the literal sentinel string `"__all__"` used at the API boundary (§4.J)
/// is resolved to `None` before reaching this layer — see
/// `memoria_memory::scope`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocFilter {
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub memory_id: Option<Uuid>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub include_deleted: bool,
}

#[async_trait]
pub trait DocStorePort<T>: Send + Sync
where
    T: Send + Sync,
{
    async fn put(&self, record: &T) -> Result<(), PortError>;
    async fn get(&self, id: Uuid) -> Result<Option<T>, PortError>;
    async fn query(&self, filter: &DocFilter) -> Result<Vec<T>, PortError>;
    async fn patch(&self, id: Uuid, fields: serde_json::Value) -> Result<(), PortError>;
    /// Returns the number of rows tombstoned.
    async fn soft_delete(&self, filter: &DocFilter) -> Result<u64, PortError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextDoc {
    pub id: Uuid,
    pub memory_type: String,
    pub text: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TextQuery {
    pub memory_type: String,
    pub query: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
    pub limit: usize,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ScoredId {
    pub id: Uuid,
    pub score: f64,
    /// Carried so fusers can apply the `created_at`-descending tie-break
    /// in §4.F step 4 without a round trip to the doc store.
    pub created_at: DateTime<Utc>,
}

#[async_trait]
pub trait TextIndexPort: Send + Sync {
    async fn upsert(&self, doc: &TextDoc) -> Result<(), PortError>;
    async fn query(&self, q: &TextQuery) -> Result<Vec<ScoredId>, PortError>;
    async fn delete(&self, id: Uuid) -> Result<(), PortError>;
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VectorFilterFields {
    pub memory_type: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VectorFilter {
    pub memory_type: String,
    pub user_id: Option<String>,
    pub group_id: Option<String>,
    pub created_after: Option<DateTime<Utc>>,
    pub created_before: Option<DateTime<Utc>>,
}

impl Default for VectorFilterFields {
    fn default() -> Self {
        Self {
            memory_type: String::new(),
            user_id: None,
            group_id: None,
            created_at: Utc::now(),
        }
    }
}

#[async_trait]
pub trait VectorIndexPort: Send + Sync {
    async fn upsert(
        &self,
        id: Uuid,
        embedding: &[f32],
        filter_fields: &VectorFilterFields,
    ) -> Result<(), PortError>;
    async fn query(
        &self,
        embedding: &[f32],
        filter: &VectorFilter,
        top_k: usize,
    ) -> Result<Vec<ScoredId>, PortError>;
    async fn delete(&self, id: Uuid) -> Result<(), PortError>;
}
