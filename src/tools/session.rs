use std::sync::Arc;
use thiserror::Error;
use tracing::info;

use crate::core::config::{ExtractSettings, FetchSettings, ScoutConfig};
use crate::core::error::{
    AnswerError, ConfigError, ExtractionError, InvalidRequest, UrlRejected,
};
use crate::core::types::{FetchFailure, FetchRequest, FetchedPage, StructuredExtraction};
use crate::core::url_guard::check_target_url;
use crate::llm::{ChatCompletion, OpenAiChatClient};
use crate::scraping::{BrowserDriver, ChromeDriver};
use crate::tools::extract::Extractor;
use crate::tools::fetch::Fetcher;

/// Why a page could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OpenError {
    #[error(transparent)]
    Rejected(#[from] UrlRejected),

    #[error(transparent)]
    InvalidRequest(#[from] InvalidRequest),

    #[error(transparent)]
    Fetch(#[from] FetchFailure),
}

impl OpenError {
    pub fn kind(&self) -> &'static str {
        match self {
            OpenError::Rejected(e) => e.kind(),
            OpenError::InvalidRequest(_) => "invalid_request",
            OpenError::Fetch(f) => f.last_error.kind(),
        }
    }
}

/// Fetch → extract → Q&A pipeline.
///
/// A `Scout` is cheap to share behind an `Arc`; every call builds its own
/// browser session, so concurrent callers do not interfere.
pub struct Scout {
    fetcher: Fetcher,
    extractor: Extractor,
    fetch: FetchSettings,
}

impl Scout {
    pub fn new(fetcher: Fetcher, extractor: Extractor, fetch: FetchSettings) -> Self {
        Self {
            fetcher,
            extractor,
            fetch,
        }
    }

    /// Wire any driver and chat backend together.
    pub fn with_backends(
        driver: Arc<dyn BrowserDriver>,
        chat: Arc<dyn ChatCompletion>,
        model: impl Into<String>,
        fetch: FetchSettings,
        extract: ExtractSettings,
    ) -> Self {
        Self::new(
            Fetcher::new(driver),
            Extractor::new(chat, model, extract),
            fetch,
        )
    }

    /// Production wiring: headless Chrome plus the configured endpoint.
    pub fn from_config(config: &ScoutConfig) -> Result<Self, ConfigError> {
        let chat = OpenAiChatClient::new(&config.llm).map_err(|e| ConfigError::Invalid {
            option: "request_timeout_secs",
            reason: format!("failed to build HTTP client: {}", e),
        })?;
        let driver = ChromeDriver::new(config.fetch.chrome_executable.clone());

        info!(
            "Scout ready (model={}, endpoint={})",
            config.llm.model,
            chat.endpoint()
        );
        Ok(Self::with_backends(
            Arc::new(driver),
            Arc::new(chat),
            config.llm.model.clone(),
            config.fetch.clone(),
            config.extract.clone(),
        ))
    }

    pub fn fetcher(&self) -> &Fetcher {
        &self.fetcher
    }

    pub fn extractor(&self) -> &Extractor {
        &self.extractor
    }

    pub fn fetch_settings(&self) -> &FetchSettings {
        &self.fetch
    }

    /// Validate user input and build a request with the configured limits.
    pub fn request_for(&self, raw_url: &str) -> Result<FetchRequest, OpenError> {
        let url = check_target_url(raw_url)?;
        Ok(FetchRequest::new(
            url.as_str(),
            self.fetch.max_bytes,
            self.fetch.retries,
            self.fetch.timeout,
        )?)
    }

    /// Fetch and sanitize one page.
    pub async fn fetch(&self, raw_url: &str) -> Result<FetchedPage, OpenError> {
        let request = self.request_for(raw_url)?;
        Ok(self.fetcher.fetch(&request).await.into_result()?)
    }

    /// Fetch a page and keep its text for follow-up extraction and questions.
    pub async fn open(&self, raw_url: &str) -> Result<PageSession<'_>, OpenError> {
        let page = self.fetch(raw_url).await?;
        Ok(PageSession {
            extractor: &self.extractor,
            page,
        })
    }

    pub async fn extract(&self, text: &str) -> Result<StructuredExtraction, ExtractionError> {
        self.extractor.extract(text).await
    }

    pub async fn answer(&self, text: &str, question: &str) -> Result<String, AnswerError> {
        self.extractor.answer(text, question).await
    }
}

/// One fetched page. Questions are always answered from this page's text;
/// a new URL means a new session.
pub struct PageSession<'a> {
    extractor: &'a Extractor,
    page: FetchedPage,
}

impl<'a> PageSession<'a> {
    pub fn page(&self) -> &FetchedPage {
        &self.page
    }

    pub fn text(&self) -> &str {
        &self.page.text
    }

    pub fn url(&self) -> &str {
        &self.page.url
    }

    pub async fn extract(&self) -> Result<StructuredExtraction, ExtractionError> {
        self.extractor.extract(&self.page.text).await
    }

    pub async fn answer(&self, question: &str) -> Result<String, AnswerError> {
        self.extractor.answer(&self.page.text, question).await
    }

    pub fn into_page(self) -> FetchedPage {
        self.page
    }
}
