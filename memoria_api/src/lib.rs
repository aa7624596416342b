#![warn(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious
)]
#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

//! Typed contract layer (§6.1): plain `serde`-derived request/response
//! structs plus `ApiError` that a future HTTP handler would sit directly
//! on top of. No router, no server, no transport framing — the HTTP
//! controller surface itself remains out of scope (§1).

pub mod delete;
pub mod error;
pub mod fetch;
pub mod ingest;
pub mod metadata;
pub mod search;

pub use delete::{DeleteRequest, DeleteResponse};
pub use error::{ApiError, ApiErrorCode, ErrorEnvelope};
pub use fetch::{FetchRequest, FetchResponse, ResolvedFetch};
pub use ingest::{parse_create_time, IngestRequest, IngestResponse, IngestResult, StatusInfo};
pub use metadata::{MetadataGetRequest, MetadataResponse, PatchRequest, UpsertRequest};
pub use search::{ResolvedSearch, RetrieveMethod, SearchHit, SearchMetadata, SearchRequest, SearchResponse};
