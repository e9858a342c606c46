//! Completion error types.
//!
//! Every failure of the completion call is an upstream error; the kind records
//! which part of the exchange went wrong. Nothing here is retried.

/// Error from completion API calls.
#[derive(Debug, Clone)]
pub struct LlmError {
    /// The kind of error
    pub kind: LlmErrorKind,
    /// HTTP status code, if applicable
    pub status_code: Option<u16>,
    /// Error message
    pub message: String,
}

impl LlmError {
    /// Create an error from a non-success HTTP status.
    pub fn from_status(status_code: u16, message: String) -> Self {
        Self {
            kind: classify_http_status(status_code),
            status_code: Some(status_code),
            message,
        }
    }

    /// Create a network error (connect failure, broken body).
    pub fn network_error(message: String) -> Self {
        Self {
            kind: LlmErrorKind::NetworkError,
            status_code: None,
            message,
        }
    }

    /// Create an error for a call that ran past the client timeout, either
    /// while waiting for the response head or while reading the body.
    pub fn timeout(message: String) -> Self {
        Self {
            kind: LlmErrorKind::Timeout,
            status_code: None,
            message,
        }
    }

    /// Create an error for a success response whose envelope could not be read.
    pub fn invalid_envelope(message: String) -> Self {
        Self {
            kind: LlmErrorKind::InvalidEnvelope,
            status_code: None,
            message,
        }
    }

    pub fn is_timeout(&self) -> bool {
        self.kind == LlmErrorKind::Timeout
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.status_code {
            Some(code) => write!(f, "{} (HTTP {}): {}", self.kind, code, self.message),
            None => write!(f, "{}: {}", self.kind, self.message),
        }
    }
}

impl std::error::Error for LlmError {}

/// Classification of completion errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmErrorKind {
    /// Rate limited (429)
    RateLimited,
    /// Server error (5xx)
    ServerError,
    /// Client error (400, 401, 403, 404)
    ClientError,
    /// Network error (connection failed, broken body)
    NetworkError,
    /// Client timeout elapsed
    Timeout,
    /// 2xx response without a readable `result.alternatives[0].message.text`
    InvalidEnvelope,
}

impl std::fmt::Display for LlmErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmErrorKind::RateLimited => write!(f, "Rate limited"),
            LlmErrorKind::ServerError => write!(f, "Server error"),
            LlmErrorKind::ClientError => write!(f, "Client error"),
            LlmErrorKind::NetworkError => write!(f, "Network error"),
            LlmErrorKind::Timeout => write!(f, "Timeout"),
            LlmErrorKind::InvalidEnvelope => write!(f, "Invalid envelope"),
        }
    }
}

/// Parse HTTP status code into error kind.
pub fn classify_http_status(status: u16) -> LlmErrorKind {
    match status {
        429 => LlmErrorKind::RateLimited,
        400..=499 => LlmErrorKind::ClientError,
        _ => LlmErrorKind::ServerError,
    }
}
