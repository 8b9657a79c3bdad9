use bytes::Bytes;
use http::StatusCode;

/// Failures raised while sending a request or reading its response
#[derive(thiserror::Error, Debug)]
pub enum HttpServiceError {
    /// The endpoint answered with a status that is never retried into success
    #[error("Bad Status code: {status_code}")]
    BadStatusCode {
        /// The status returned by the endpoint
        status_code: StatusCode,
        /// The body returned alongside it
        data: Bytes,
    },
    /// The request could not be assembled
    #[error("HTTP Error: {:?}", .0)]
    Http(#[from] http::Error),
    /// The request did not complete within the configured timeout
    #[error("Request timed out: {:?}", .0)]
    TimedOut(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// The response could not be decoded
    #[error("Decode error: {:?}", .0)]
    Decode(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Reading or writing a body failed
    #[error("Body error: {:?}", .0)]
    Body(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// No connection could be made to the endpoint
    #[error("Connect error: {:?}", .0)]
    Connect(Box<dyn std::error::Error + Send + Sync + 'static>),
    /// Anything the other variants do not describe
    #[error("Unexpected HTTP error: {:?}", .0)]
    Unexpected(Box<dyn std::error::Error + Send + Sync + 'static>),
}

impl HttpServiceError {
    /// Whether no connection could be established
    pub fn is_connect(&self) -> bool {
        matches!(self, HttpServiceError::Connect(_))
    }
    /// Whether the request ran out of time
    pub fn is_timeout(&self) -> bool {
        matches!(self, HttpServiceError::TimedOut(_))
    }
    /// Whether a retry could plausibly succeed
    pub fn is_transient(&self) -> bool {
        self.is_connect() || self.is_timeout()
    }
}
