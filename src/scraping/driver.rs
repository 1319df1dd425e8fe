//! Browser-rendering capability consumed by the fetcher.
//!
//! A [`BrowserDriver`] hands out fresh, exclusively owned
//! [`BrowserSession`]s. The fetcher opens one session per attempt and always
//! calls [`BrowserSession::close`] before the next attempt starts. Tests
//! substitute a stub that serves canned markup.

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use url::Url;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DriverError {
    /// Navigation did not finish within the page-load timeout.
    #[error("page load timed out after {0:?}")]
    PageLoadTimeout(Duration),

    /// The browser could not be started or stopped responding.
    /// `fatal` means another attempt with a fresh session would not help
    /// (no executable, unreachable driver).
    #[error("browser unavailable: {message}")]
    Unavailable { message: String, fatal: bool },

    #[error("{0}")]
    Other(String),
}

#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Launch a new session. Never reuses a previous one.
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError>;
}

#[async_trait]
pub trait BrowserSession: Send {
    /// Load `url`, bounded by `page_load_timeout`.
    async fn navigate(&mut self, url: &Url, page_load_timeout: Duration)
        -> Result<(), DriverError>;

    /// Wait up to `timeout` for the document's `<body>` element.
    /// `Ok(false)` means the wait expired.
    async fn body_present(&mut self, timeout: Duration) -> Result<bool, DriverError>;

    /// Fully rendered markup of the current document.
    async fn page_source(&mut self) -> Result<String, DriverError>;

    /// Tear the session down. Must be safe to call after any failure.
    async fn close(self: Box<Self>);
}
