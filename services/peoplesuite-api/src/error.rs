//! HTTP error taxonomy
//!
//! Every failure a handler can produce is an `ApiError`, mapped to a status
//! code and JSON body exactly once here:
//! `{"error":{"type":"<kind>","message":"<detail>"}}`.

use axum::extract::multipart::MultipartError;
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use store::StoreError;
use thiserror::Error;
use tracing::error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Invalid grant type")]
    InvalidGrant,

    #[error("Invalid client_id or client_secret")]
    InvalidCredentials,

    #[error("{0}")]
    Unauthorized(String),

    #[error("Invalid file format")]
    InvalidFormat,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    /// Malformed request bodies rejected by the extractor (e.g. multipart
    /// stream errors, upload over the size limit)
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidGrant | ApiError::InvalidCredentials | ApiError::InvalidFormat => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Rejected { status, .. } => *status,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable `error.type` value.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::InvalidGrant => "invalid_grant",
            ApiError::InvalidCredentials => "invalid_client",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::InvalidFormat => "invalid_format",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Rejected { .. } => "invalid_request",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl From<peoplesuite_auth::Error> for ApiError {
    fn from(err: peoplesuite_auth::Error) -> Self {
        use peoplesuite_auth::Error as AuthError;
        match err {
            AuthError::InvalidGrant => ApiError::InvalidGrant,
            AuthError::InvalidCredentials => ApiError::InvalidCredentials,
            AuthError::MissingToken | AuthError::InvalidToken => {
                ApiError::Unauthorized(err.to_string())
            }
            AuthError::Store(e) => e.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl From<MultipartError> for ApiError {
    fn from(err: MultipartError) -> Self {
        ApiError::Rejected {
            status: err.status(),
            message: err.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(error = %self, "request failed");
        }

        let body = serde_json::json!({
            "error": {
                "type": self.kind(),
                "message": self.to_string(),
            }
        })
        .to_string();

        let mut response = (
            status,
            [(header::CONTENT_TYPE, "application/json")],
            body,
        )
            .into_response();
        if status == StatusCode::UNAUTHORIZED {
            response.headers_mut().insert(
                header::WWW_AUTHENTICATE,
                header::HeaderValue::from_static("Bearer"),
            );
        }
        response
    }
}
