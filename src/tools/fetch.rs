use chrono::Utc;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

use crate::core::error::FetchError;
use crate::core::retry::{retry_bounded, RetryPolicy};
use crate::core::types::{FetchFailure, FetchRequest, FetchResult, FetchedPage};
use crate::scraping::sanitize::{sanitize, Sanitized};
use crate::scraping::{BrowserDriver, BrowserSession, DriverError};

/// Renders pages through a [`BrowserDriver`] and hands back normalized text.
///
/// Every attempt gets its own browser session, and that session is closed
/// before the next attempt starts, whether the attempt succeeded or not.
#[derive(Clone)]
pub struct Fetcher {
    driver: Arc<dyn BrowserDriver>,
}

/// Failure of a single attempt, plus whether retrying could help.
#[derive(Debug)]
struct AttemptError {
    error: FetchError,
    fatal: bool,
}

impl fmt::Display for AttemptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.error, f)
    }
}

impl From<DriverError> for AttemptError {
    fn from(e: DriverError) -> Self {
        match e {
            DriverError::PageLoadTimeout(_) => AttemptError {
                error: FetchError::PageLoadTimeout,
                fatal: false,
            },
            DriverError::Unavailable { message, fatal } => AttemptError {
                error: FetchError::DriverUnavailable(message),
                fatal,
            },
            DriverError::Other(message) => AttemptError {
                error: FetchError::Unexpected(message),
                fatal: false,
            },
        }
    }
}

impl Fetcher {
    pub fn new(driver: Arc<dyn BrowserDriver>) -> Self {
        Self { driver }
    }

    /// Up to `request.retries()` back-to-back attempts. Never panics and never
    /// returns a raw driver error: the outcome is always a [`FetchResult`].
    pub async fn fetch(&self, request: &FetchRequest) -> FetchResult {
        let url = request.url().to_string();
        let policy = RetryPolicy::immediate(request.retries());

        let outcome = retry_bounded(
            &policy,
            "fetch",
            |e: &AttemptError| !e.fatal,
            |attempt| self.attempt(request, attempt),
        )
        .await;

        match outcome.result {
            Ok(Sanitized { text, truncated }) => {
                info!(
                    "✅ Fetched {} ({} bytes, attempt {})",
                    url,
                    text.len(),
                    outcome.attempts
                );
                FetchResult::Success(FetchedPage {
                    url,
                    text,
                    truncated,
                    attempts: outcome.attempts,
                    fetched_at: Utc::now(),
                })
            }
            Err(e) => {
                warn!(
                    "❌ Failed to fetch {} after {} attempt(s): {}",
                    url, outcome.attempts, e.error
                );
                FetchResult::Failure(FetchFailure {
                    url,
                    attempts_made: outcome.attempts,
                    last_error: e.error,
                })
            }
        }
    }

    async fn attempt(&self, request: &FetchRequest, attempt: u32) -> Result<Sanitized, AttemptError> {
        info!(
            "Attempt {}/{}: fetching {}",
            attempt,
            request.retries(),
            request.url()
        );
        let mut session = self.driver.open_session().await?;
        let rendered = render(session.as_mut(), request).await;
        session.close().await;

        let html = rendered?;
        Ok(sanitize(&html, request.max_bytes()))
    }
}

async fn render(
    session: &mut dyn BrowserSession,
    request: &FetchRequest,
) -> Result<String, AttemptError> {
    session
        .navigate(request.url(), request.page_load_timeout())
        .await?;

    if !session.body_present(request.readiness_timeout()).await? {
        return Err(AttemptError {
            error: FetchError::ReadinessTimeout,
            fatal: false,
        });
    }

    Ok(session.page_source().await?)
}
