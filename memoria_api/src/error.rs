//! `ApiError` (§6.1): the three HTTP-shaped codes named in §6's error
//! envelope, with a `From<MemoryError>` so a handler built on top of this
//! crate is a thin `match`/`?` away from the typed request/response structs.
//! No router, no server, no transport framing lives here — see §1 "the
//! HTTP controller surface ... is out of scope".

use chrono::{DateTime, Utc};
use memoria_core::error::{ErrorKind, MemoryError};
use memoria_core::port::PortError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ApiErrorCode {
    InvalidParameter,
    ResourceNotFound,
    SystemError,
}

#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub code: ApiErrorCode,
    pub message: String,
}

impl ApiError {
    #[must_use]
    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::InvalidParameter,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::ResourceNotFound,
            message: message.into(),
        }
    }

    #[must_use]
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            code: ApiErrorCode::SystemError,
            message: message.into(),
        }
    }

    /// Renders the `{status: "failed", code, message, timestamp, path}`
    /// envelope (§6 "Error envelope").
    #[must_use]
    pub fn envelope(&self, path: &str, timestamp: DateTime<Utc>) -> ErrorEnvelope {
        ErrorEnvelope {
            status: "failed",
            code: self.code,
            message: self.message.clone(),
            timestamp,
            path: path.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorEnvelope {
    pub status: &'static str,
    pub code: ApiErrorCode,
    pub message: String,
    pub timestamp: DateTime<Utc>,
    pub path: String,
}

impl From<MemoryError> for ApiError {
    /// `Partial` has no dedicated HTTP code in §6 — a partial extraction
    /// still returns `status: "ok"` with `extraction_status` carrying the
    /// degradation (§7 "User-visible behavior"), so it never reaches this
    /// conversion; a caller that maps it anyway gets `SystemError`.
    fn from(err: MemoryError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Input => Self::invalid_parameter(message),
            ErrorKind::NotFound => Self::not_found(message),
            ErrorKind::Transient | ErrorKind::Fatal | ErrorKind::Partial => Self::system_error(message),
        }
    }
}

impl From<PortError> for ApiError {
    fn from(err: PortError) -> Self {
        MemoryError::from(err).into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_errors_map_to_invalid_parameter() {
        let err: ApiError = MemoryError::InvalidParameter("bad".to_string()).into();
        assert_eq!(err.code, ApiErrorCode::InvalidParameter);
    }

    #[test]
    fn not_found_maps_through() {
        let err: ApiError = MemoryError::NotFound("x".to_string()).into();
        assert_eq!(err.code, ApiErrorCode::ResourceNotFound);
    }

    #[test]
    fn transient_maps_to_system_error() {
        let err: ApiError = MemoryError::transient("llm", anyhow::anyhow!("timeout")).into();
        assert_eq!(err.code, ApiErrorCode::SystemError);
    }
}
