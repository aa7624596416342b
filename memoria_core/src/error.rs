//! Error taxonomy shared by every core crate.
//!
//! Collapses collaborator/store failures into the five kinds the rest of the
//! system reasons about: input, not-found, transient, partial, fatal.

use serde::{Deserialize, Serialize};

/// The five error kinds the API layer and retry policy dispatch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Rejected before any side effect; maps to `INVALID_PARAMETER`.
    Input,
    /// Maps to `RESOURCE_NOT_FOUND`.
    NotFound,
    /// LLM/store timeout or connection failure; eligible for retry.
    Transient,
    /// Extraction or write partially succeeded.
    Partial,
    /// Unexpected failure; maps to `SYSTEM_ERROR`, always logged with a correlation id.
    Fatal,
}

/// The crate-wide error type. Every fallible operation in `memoria_core`,
/// `memoria_memory`, `memoria_ingest` and `memoria_agentic` returns this
/// (or a thin crate-local wrapper around it) rather than a bespoke type per module.
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("transient failure calling {collaborator}: {source}")]
    Transient {
        collaborator: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("partial failure: {0}")]
    Partial(String),

    #[error("system error: {0}")]
    Fatal(#[from] anyhow::Error),
}

impl MemoryError {
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::InvalidParameter(_) => ErrorKind::Input,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::Transient { .. } => ErrorKind::Transient,
            Self::Partial(_) => ErrorKind::Partial,
            Self::Fatal(_) => ErrorKind::Fatal,
        }
    }

    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transient)
    }

    pub fn transient(collaborator: impl Into<String>, source: impl Into<anyhow::Error>) -> Self {
        Self::Transient {
            collaborator: collaborator.into(),
            source: source.into(),
        }
    }
}

impl From<crate::port::PortError> for MemoryError {
    fn from(err: crate::port::PortError) -> Self {
        match err {
            crate::port::PortError::Transient { collaborator, source } => {
                Self::Transient { collaborator: collaborator.to_string(), source }
            }
            crate::port::PortError::Rejected(msg) => Self::InvalidParameter(msg),
            crate::port::PortError::NotFound(msg) => Self::NotFound(msg),
        }
    }
}

pub type MemoryResult<T> = Result<T, MemoryError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_mapping() {
        assert_eq!(
            MemoryError::InvalidParameter("x".into()).kind(),
            ErrorKind::Input
        );
        assert_eq!(MemoryError::NotFound("x".into()).kind(), ErrorKind::NotFound);
        assert_eq!(MemoryError::Partial("x".into()).kind(), ErrorKind::Partial);
    }

    #[test]
    fn only_transient_is_retryable() {
        assert!(
            MemoryError::transient("llm", anyhow::anyhow!("timeout")).is_retryable()
        );
        assert!(!MemoryError::NotFound("x".into()).is_retryable());
    }
}
