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

//! Component H: `AgenticRetriever`, a bounded multi-round retrieval loop
//! layered over `memoria_memory`'s `HybridRetriever` and `RerankStage`.

pub mod judge;
pub mod retriever;

pub use judge::{parse_judge_response, JudgeDecision};
pub use retriever::{AgenticMetadata, AgenticRequest, AgenticResponse, AgenticRetriever};
