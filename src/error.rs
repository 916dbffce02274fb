//! Error taxonomy shared by the workspace manager, the assistant seam and
//! the HTTP layer.
//!
//! Each variant maps to exactly one HTTP status and machine-readable code
//! (see [`WorkspaceError::status`] and [`WorkspaceError::code`]). Internal
//! errors carry an [`anyhow::Error`] for logging; its chain is never sent to
//! clients.

use axum::http::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum WorkspaceError {
    #[error("{0}")]
    InvalidInput(String),
    #[error("access denied: {0}")]
    AccessDenied(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("{0}")]
    Unavailable(String),
    #[error("{0}")]
    Config(String),
    #[error("timed out: {0}")]
    Timeout(String),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl WorkspaceError {
    pub fn status(&self) -> StatusCode {
        match self {
            WorkspaceError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            WorkspaceError::AccessDenied(_) => StatusCode::FORBIDDEN,
            WorkspaceError::NotFound(_) => StatusCode::NOT_FOUND,
            WorkspaceError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            WorkspaceError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            WorkspaceError::Timeout(_) => StatusCode::GATEWAY_TIMEOUT,
            WorkspaceError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            WorkspaceError::InvalidInput(_) => "bad_request",
            WorkspaceError::AccessDenied(_) => "access_denied",
            WorkspaceError::NotFound(_) => "not_found",
            WorkspaceError::Unavailable(_) => "unavailable",
            WorkspaceError::Config(_) => "config_error",
            WorkspaceError::Timeout(_) => "timeout",
            WorkspaceError::Internal(_) => "internal",
        }
    }

    /// Message safe to return to a client.
    pub fn public_message(&self) -> String {
        match self {
            WorkspaceError::Internal(_) => "internal error".to_string(),
            other => other.to_string(),
        }
    }

    /// Storage failures while touching the workspace tree surface as
    /// unavailability.
    pub(crate) fn storage(path: &std::path::Path, err: std::io::Error) -> Self {
        WorkspaceError::Unavailable(format!("storage error at {}: {}", path.display(), err))
    }
}

pub type WorkspaceResult<T> = std::result::Result<T, WorkspaceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            WorkspaceError::InvalidInput("x".into()).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            WorkspaceError::AccessDenied("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            WorkspaceError::Unavailable("x".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            WorkspaceError::Timeout("x".into()).status(),
            StatusCode::GATEWAY_TIMEOUT
        );
    }

    #[test]
    fn test_internal_message_is_redacted() {
        let err = WorkspaceError::from(anyhow::anyhow!("secret path /etc/shadow"));
        assert_eq!(err.code(), "internal");
        assert_eq!(err.public_message(), "internal error");
    }
}
