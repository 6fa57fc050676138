use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// Every failure an endpoint can report, with a stable category per kind.
/// Store and provider internals are mapped into `Persistence`/`Dependency`
/// at the operation boundary instead of leaking into responses.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    NotFound(String),

    #[error("User is already verified")]
    AlreadyVerified,

    #[error("Codes do not match")]
    CodeMismatch,

    #[error("Code has expired. Please sign up again.")]
    CodeExpired,

    #[error("{0}")]
    InvalidInput(String),

    #[error("User is not accepting messages")]
    NotAccepting,

    #[error("{0}")]
    Conflict(String),

    #[error("{message}")]
    Dependency {
        message: String,
        status: Option<StatusCode>,
    },

    #[error("An unexpected error occurred")]
    Persistence(#[from] anyhow::Error),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::AlreadyVerified => StatusCode::CONFLICT,
            ApiError::CodeMismatch | ApiError::CodeExpired => StatusCode::BAD_REQUEST,
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::NotAccepting => StatusCode::FORBIDDEN,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Dependency { status, .. } => status.unwrap_or(StatusCode::BAD_GATEWAY),
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Persistence(e) = &self {
            error!(error = %e, "internal error");
        }
        let status = self.status();
        let body = Json(json!({ "success": false, "message": self.to_string() }));
        (status, body).into_response()
    }
}

/// Success envelope for endpoints that only acknowledge an action.
#[derive(Debug, Serialize)]
pub struct Ack {
    pub success: bool,
    pub message: String,
}

impl Ack {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_per_category() {
        assert_eq!(
            ApiError::Unauthenticated("x".into()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(ApiError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(ApiError::AlreadyVerified.status(), StatusCode::CONFLICT);
        assert_eq!(ApiError::CodeMismatch.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::CodeExpired.status(), StatusCode::BAD_REQUEST);
        assert_eq!(ApiError::NotAccepting.status(), StatusCode::FORBIDDEN);
        assert_eq!(ApiError::Conflict("x".into()).status(), StatusCode::CONFLICT);
    }

    #[test]
    fn dependency_uses_upstream_status_when_present() {
        let err = ApiError::Dependency {
            message: "rate limited".into(),
            status: Some(StatusCode::TOO_MANY_REQUESTS),
        };
        assert_eq!(err.status(), StatusCode::TOO_MANY_REQUESTS);

        let err = ApiError::Dependency {
            message: "unreachable".into(),
            status: None,
        };
        assert_eq!(err.status(), StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn ack_serializes_with_success_flag() {
        let json = serde_json::to_string(&Ack::ok("done")).unwrap();
        assert!(json.contains(r#""success":true"#));
        assert!(json.contains("done"));
    }
}
