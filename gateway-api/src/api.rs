use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;

use odoo_rpc::RpcError;

/// Errors surfaced by the gateway's request handling. The kind decides the
/// status code; the route family decides the response envelope (see
/// `handlers`).
#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Failed authentication")]
    AuthenticationFailed,

    /// An empty result set where exactly one entity was expected: a stage,
    /// project or user name that resolved to nothing, or a task list query
    /// with no rows.
    #[error("{0}")]
    NotFound(String),

    /// A task referenced a tag id the tag read did not return. Strict
    /// mapping: the whole request fails rather than silently dropping the
    /// tag.
    #[error("no tag record for tag id {0}")]
    MissingTag(i64),

    #[error("{0}")]
    InvalidInput(String),

    /// The remote write call returned a negative acknowledgement without
    /// raising a fault.
    #[error("Failed to update task")]
    WriteRejected,

    #[error("{0} is not set or invalid")]
    MissingConfiguration(&'static str),

    #[error(transparent)]
    Rpc(#[from] RpcError),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) | ApiError::MissingConfiguration(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::AuthenticationFailed => StatusCode::UNAUTHORIZED,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::MissingTag(_) | ApiError::WriteRejected | ApiError::Rpc(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Short kind discriminator carried in the generic error envelope. The
    /// labels match what clients of the original service already parse.
    pub fn kind(&self) -> &'static str {
        match self {
            ApiError::AuthenticationFailed => "AuthenticationFailed",
            ApiError::NotFound(_) => "NotFound",
            ApiError::MissingTag(_) => "LookupError",
            ApiError::InvalidInput(_) => "InvalidInput",
            ApiError::WriteRejected => "WriteRejected",
            ApiError::MissingConfiguration(_) => "ValueError",
            ApiError::Rpc(RpcError::Fault { .. }) => "XML-RPC Fault",
            ApiError::Rpc(_) => "ProtocolError",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        tracing::error!("request failed: {}", self);
        (
            self.status(),
            Json(json!({"error": self.kind(), "message": self.to_string()})),
        )
            .into_response()
    }
}
