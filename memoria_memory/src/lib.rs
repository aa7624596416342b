#![warn(
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
    clippy::missing_errors_doc,
    clippy::cast_precision_loss,
    clippy::cast_possible_truncation
)]

pub mod docstore;
pub mod rerank;
pub mod retriever;
pub mod schema;
pub mod scope;
pub mod scoring;
pub mod store;
pub mod textindex;
pub mod vectorindex;

pub use docstore::{
    ConversationMetaStore, EpisodicMemoryStore, EventLogStore, ForesightStore, ProfileStore, SemanticMemoryStore,
    IMMUTABLE_CONVERSATION_META_FIELDS, PATCHABLE_CONVERSATION_META_FIELDS,
};
pub use rerank::{RerankItem, RerankStage};
pub use retriever::{DataSource, HybridRetriever, Hit, RetrievalMetadata, RetrievalMode, RetrievalRequest, RetrievalResponse};
pub use schema::{Cardinality, PredicateSchema, SchemaError, SchemaRegistry, ValueType};
pub use scope::{requires_non_sentinel_filter, ResolvedScope, ScopeRequest};
pub use scoring::{compute_salience, cosine_similarity};
pub use store::{MemoryStore, SortBy, SortOrder};
pub use textindex::BM25TextIndex;
pub use vectorindex::BruteForceVectorIndex;
