use thiserror::Error;

/// Enumeration of errors surfaced by calls against the remote server.
///
/// `Url`, `Transport` and `Decode` are protocol errors: the endpoint is
/// malformed, unreachable, or answered with something that is not a valid
/// method response. `Fault` is the remote server rejecting the call
/// semantically. Neither kind is ever retried.
#[derive(Error, Debug)]
pub enum RpcError {
    #[error("invalid endpoint url: {0}")]
    Url(#[from] url::ParseError),
    #[error("transport error calling remote endpoint: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed method response: {0}")]
    Decode(String),
    #[error("remote fault {code}: {message}")]
    Fault { code: i32, message: String },
}

impl RpcError {
    pub fn is_fault(&self) -> bool {
        matches!(self, RpcError::Fault { .. })
    }
}
