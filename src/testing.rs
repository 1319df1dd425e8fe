//! In-memory stand-ins for the browser and the chat endpoint.
//!
//! Used by the crate's own tests and available to downstream crates that
//! want to exercise the pipeline without Chrome or network access.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

use crate::core::error::RemoteServiceError;
use crate::llm::{ChatCompletion, ChatRequest};
use crate::scraping::{BrowserDriver, BrowserSession, DriverError};

/// What one stub session does when driven through an attempt.
#[derive(Debug, Clone)]
pub enum StubAttempt {
    /// Load fine and serve this markup.
    Serve(String),
    /// `open_session` itself fails.
    LaunchFails(DriverError),
    /// Navigation fails.
    NavigateFails(DriverError),
    /// Navigation succeeds but `<body>` never shows up.
    NeverReady,
    /// The page loads but reading its markup fails.
    ReadFails(DriverError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEvent {
    Opened(u32),
    Closed(u32),
}

#[derive(Default)]
struct DriverLog {
    events: Mutex<Vec<SessionEvent>>,
    live: AtomicU32,
    max_live: AtomicU32,
}

impl DriverLog {
    fn record(&self, event: SessionEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }
}

/// Scripted [`BrowserDriver`]. Each `open_session` consumes the next
/// [`StubAttempt`]; once the script runs out the fallback repeats.
pub struct StubDriver {
    script: Mutex<VecDeque<StubAttempt>>,
    fallback: StubAttempt,
    opened: AtomicU32,
    log: Arc<DriverLog>,
}

impl StubDriver {
    pub fn scripted(script: Vec<StubAttempt>, fallback: StubAttempt) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback,
            opened: AtomicU32::new(0),
            log: Arc::new(DriverLog::default()),
        }
    }

    /// Every session serves `markup`.
    pub fn serving(markup: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), StubAttempt::Serve(markup.into()))
    }

    /// Every attempt fails the same way.
    pub fn always(attempt: StubAttempt) -> Self {
        Self::scripted(Vec::new(), attempt)
    }

    pub fn sessions_opened(&self) -> u32 {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn sessions_closed(&self) -> u32 {
        self.events()
            .iter()
            .filter(|e| matches!(e, SessionEvent::Closed(_)))
            .count() as u32
    }

    /// Highest number of sessions that were open at the same time.
    pub fn max_concurrent_sessions(&self) -> u32 {
        self.log.max_live.load(Ordering::SeqCst)
    }

    pub fn events(&self) -> Vec<SessionEvent> {
        self.log
            .events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    fn next_attempt(&self) -> StubAttempt {
        self.script
            .lock()
            .ok()
            .and_then(|mut script| script.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}

#[async_trait]
impl BrowserDriver for StubDriver {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let attempt = self.next_attempt();
        let id = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        if let StubAttempt::LaunchFails(e) = attempt {
            return Err(e);
        }

        let live = self.log.live.fetch_add(1, Ordering::SeqCst) + 1;
        self.log.max_live.fetch_max(live, Ordering::SeqCst);
        self.log.record(SessionEvent::Opened(id));

        Ok(Box::new(StubSession {
            id,
            attempt,
            log: Arc::clone(&self.log),
        }))
    }
}

struct StubSession {
    id: u32,
    attempt: StubAttempt,
    log: Arc<DriverLog>,
}

#[async_trait]
impl BrowserSession for StubSession {
    async fn navigate(&mut self, _url: &Url, _timeout: Duration) -> Result<(), DriverError> {
        match &self.attempt {
            StubAttempt::NavigateFails(e) => Err(e.clone()),
            _ => Ok(()),
        }
    }

    async fn body_present(&mut self, _timeout: Duration) -> Result<bool, DriverError> {
        Ok(!matches!(self.attempt, StubAttempt::NeverReady))
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        match &self.attempt {
            StubAttempt::Serve(markup) => Ok(markup.clone()),
            StubAttempt::ReadFails(e) => Err(e.clone()),
            _ => Ok("<html><head></head><body></body></html>".to_string()),
        }
    }

    async fn close(self: Box<Self>) {
        self.log.live.fetch_sub(1, Ordering::SeqCst);
        self.log.record(SessionEvent::Closed(self.id));
    }
}

/// Scripted [`ChatCompletion`] that records every request it receives.
pub struct StubChat {
    replies: Mutex<VecDeque<Result<String, RemoteServiceError>>>,
    fallback: Result<String, RemoteServiceError>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl StubChat {
    pub fn scripted(
        replies: Vec<Result<String, RemoteServiceError>>,
        fallback: Result<String, RemoteServiceError>,
    ) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
            fallback,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(reply: impl Into<String>) -> Self {
        Self::scripted(Vec::new(), Ok(reply.into()))
    }

    pub fn failing(error: RemoteServiceError) -> Self {
        Self::scripted(Vec::new(), Err(error))
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl ChatCompletion for StubChat {
    async fn complete(&self, request: &ChatRequest) -> Result<String, RemoteServiceError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        self.replies
            .lock()
            .ok()
            .and_then(|mut replies| replies.pop_front())
            .unwrap_or_else(|| self.fallback.clone())
    }
}
