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
#![allow(clippy::missing_errors_doc)]

//! HTTP-based collaborator-port clients (§4.A, component A).
//!
//! Vendor wiring itself is out of scope (§1) — this crate ships one
//! provider-agnostic client generic over any OpenAI-compatible
//! chat/embeddings/rerank endpoint, configured entirely at runtime from
//! `memoria_config::ProviderConfig`.

pub mod http;

pub use http::HttpProvider;
