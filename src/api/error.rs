use thiserror::Error;

/// Everything that can go wrong while talking to the API. The variants carry
/// plain data so the error can live inside a view model and be cloned into
/// rendering code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    /// The request never produced a response (connect, timeout, TLS...).
    #[error("network failure: {0}")]
    Network(String),
    /// `GET /partituras/{id}` answered 404.
    #[error("sheet {0} not found")]
    NotFound(i64),
    /// Any other non-success status.
    #[error("server responded with HTTP {0}")]
    Status(u16),
    /// The body was not the JSON shape we expected.
    #[error("could not decode response: {0}")]
    Decode(String),
}

impl FetchError {
    pub(crate) fn from_transport(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchError::Decode(err.to_string())
        } else {
            FetchError::Network(err.to_string())
        }
    }
}
