use axum::extract::multipart::MultipartRejection;
use axum::extract::rejection::QueryRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use cocktails::{MediaError, ServiceError, StoreError};
use serde::{Deserialize, Serialize};
use serde_json::json;

pub type ServerResult<T> = Result<T, ServerError>;

/// Message sent to clients when a dependency fails; details stay in the logs.
const GENERIC_FAILURE: &str = "Internal server error";

/// Server error types
#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error(transparent)]
    Service(#[from] ServiceError),

    #[error("Media error: {0}")]
    Media(#[from] MediaError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Not found")]
    NotFound,
}

/// API error response structure
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl ServerError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::NotFound => StatusCode::NOT_FOUND,
            ServerError::Service(err) => match err {
                ServiceError::EmptyPayload
                | ServiceError::MissingId
                | ServiceError::EmptyQuery
                | ServiceError::NoFields
                | ServiceError::InvalidPayload(_) => StatusCode::BAD_REQUEST,
                ServiceError::NotFound(_) => StatusCode::NOT_FOUND,
                // malformed ids are not distinguished from other failures
                ServiceError::InvalidId(_)
                | ServiceError::Filter(_)
                | ServiceError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Media(err) => match err {
                MediaError::MissingPublicId | MediaError::EmptyImage => StatusCode::BAD_REQUEST,
                MediaError::Transport(_)
                | MediaError::Upstream { .. }
                | MediaError::Decode(_)
                | MediaError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ServerError::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ServerError::BadRequest(_) => "BAD_REQUEST",
            ServerError::NotFound => "NOT_FOUND",
            ServerError::Service(err) => match err {
                ServiceError::EmptyPayload => "EMPTY_PAYLOAD",
                ServiceError::MissingId => "MISSING_ID",
                ServiceError::InvalidId(_) => "INVALID_ID",
                ServiceError::EmptyQuery => "MISSING_SEARCH",
                ServiceError::NoFields => "NO_FIELDS",
                ServiceError::InvalidPayload(_) => "INVALID_PAYLOAD",
                ServiceError::Filter(_) => "FILTER_PARSE_ERROR",
                ServiceError::NotFound(_) => "ITEM_NOT_FOUND",
                ServiceError::Store(StoreError::Closed) => "STORE_UNAVAILABLE",
                ServiceError::Store(_) => "STORE_ERROR",
            },
            ServerError::Media(err) => match err {
                MediaError::MissingPublicId => "MISSING_PUBLIC_ID",
                MediaError::EmptyImage => "EMPTY_IMAGE",
                _ => "MEDIA_ERROR",
            },
            ServerError::Config(_) => "CONFIG_ERROR",
        }
    }

    /// Whether the client sees the real message. Dependency failures are
    /// replaced by a generic one.
    fn exposes_message(&self) -> bool {
        !matches!(
            self,
            ServerError::Service(ServiceError::Store(_))
                | ServerError::Media(
                    MediaError::Transport(_)
                        | MediaError::Upstream { .. }
                        | MediaError::Decode(_)
                        | MediaError::Config(_)
                )
                | ServerError::Config(_)
        )
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let error_code = self.error_code().to_string();

        if status.is_server_error() {
            tracing::error!(code = %error_code, error = %self, "request failed");
        }

        let message = if self.exposes_message() {
            self.to_string()
        } else {
            GENERIC_FAILURE.to_string()
        };

        let body = Json(json!({
            "error": {
                "code": error_code,
                "message": message,
            }
        }));

        (status, body).into_response()
    }
}

impl From<QueryRejection> for ServerError {
    fn from(err: QueryRejection) -> Self {
        ServerError::BadRequest(err.body_text())
    }
}

impl From<MultipartRejection> for ServerError {
    fn from(err: MultipartRejection) -> Self {
        ServerError::BadRequest(err.body_text())
    }
}

impl From<StoreError> for ServerError {
    fn from(err: StoreError) -> Self {
        ServerError::Service(err.into())
    }
}

impl From<serde_json::Error> for ServerError {
    fn from(err: serde_json::Error) -> Self {
        ServerError::BadRequest(format!("JSON parse error: {err}"))
    }
}

impl From<axum::extract::multipart::MultipartError> for ServerError {
    fn from(err: axum::extract::multipart::MultipartError) -> Self {
        ServerError::BadRequest(format!("Multipart error: {err}"))
    }
}
