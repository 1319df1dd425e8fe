//! Error taxonomy shared by the fetch, extraction and answer pipelines.
//!
//! Nothing raw (driver errors, `reqwest::Error`, JSON errors) crosses a
//! component boundary; everything is converted into one of these types first.
//! Each error exposes a stable `kind()` string so front-ends can render a
//! specific message without matching on `Display` output.

use thiserror::Error;

/// Classified outcome of a failed fetch attempt.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("page load timed out")]
    PageLoadTimeout,

    #[error("document body did not appear before the readiness timeout")]
    ReadinessTimeout,

    #[error("browser driver unavailable: {0}")]
    DriverUnavailable(String),

    #[error("unexpected fetch error: {0}")]
    Unexpected(String),
}

impl FetchError {
    pub fn kind(&self) -> &'static str {
        match self {
            FetchError::PageLoadTimeout => "page_load_timeout",
            FetchError::ReadinessTimeout => "readiness_timeout",
            FetchError::DriverUnavailable(_) => "driver_unavailable",
            FetchError::Unexpected(_) => "unexpected",
        }
    }
}

/// What went wrong talking to the chat-completion endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemoteErrorKind {
    /// Connection refused, DNS failure, request timeout.
    Transport,
    /// 401 / 403.
    Authentication,
    /// 429 or 5xx.
    Unavailable(u16),
    /// Any other non-success status.
    Rejected(u16),
    /// 2xx with a body we could not read a completion from.
    InvalidResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("remote service error ({kind:?}): {message}")]
pub struct RemoteServiceError {
    pub kind: RemoteErrorKind,
    pub message: String,
}

impl RemoteServiceError {
    pub fn new(kind: RemoteErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Transport hiccups, rate limits and 5xx are worth another attempt.
    /// Auth failures and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.kind,
            RemoteErrorKind::Transport | RemoteErrorKind::Unavailable(_)
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ExtractionError {
    #[error("not enough text to extract from ({chars} chars, need at least {min})")]
    InsufficientContent { chars: usize, min: usize },

    #[error("model returned a malformed extraction: {reason}")]
    MalformedExtraction { reason: String, raw: String },

    #[error(transparent)]
    RemoteServiceError(#[from] RemoteServiceError),
}

impl ExtractionError {
    pub fn kind(&self) -> &'static str {
        match self {
            ExtractionError::InsufficientContent { .. } => "insufficient_content",
            ExtractionError::MalformedExtraction { .. } => "malformed_extraction",
            ExtractionError::RemoteServiceError(_) => "remote_service_error",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AnswerError {
    #[error("question must not be empty")]
    EmptyQuestion,

    #[error("no page text to answer from")]
    NoContent,

    #[error(transparent)]
    RemoteServiceError(#[from] RemoteServiceError),
}

impl AnswerError {
    pub fn kind(&self) -> &'static str {
        match self {
            AnswerError::EmptyQuestion => "empty_question",
            AnswerError::NoContent => "no_content",
            AnswerError::RemoteServiceError(_) => "remote_service_error",
        }
    }
}

/// Fatal startup error. Never recovered from.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("missing required configuration: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("invalid value for {option}: {reason}")]
    Invalid {
        option: &'static str,
        reason: String,
    },
}

/// A `FetchRequest` that violates its invariants.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidRequest {
    #[error("url must be an absolute http(s) url: {0}")]
    Url(String),

    #[error("max_bytes must be greater than zero")]
    ZeroMaxBytes,

    #[error("retries must be at least 1")]
    ZeroRetries,
}

/// Rejected at the presentation boundary before any fetch is attempted.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlRejected {
    #[error("please enter a url")]
    Empty,

    #[error("not a valid url: {0}")]
    Unparseable(String),

    #[error("only http:// and https:// urls are supported (got {0}://)")]
    Scheme(String),

    #[error("local addresses are not allowed: {0}")]
    LocalHost(String),
}

impl UrlRejected {
    pub fn kind(&self) -> &'static str {
        "url_rejected"
    }
}
