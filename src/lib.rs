pub mod core;
pub mod llm;
pub mod repl;
pub mod scraping;
pub mod server;
pub mod testing;
pub mod tools;

// --- Primary exports ---
pub use crate::core::error::{
    AnswerError, ConfigError, ExtractionError, FetchError, InvalidRequest, RemoteErrorKind,
    RemoteServiceError, UrlRejected,
};
pub use crate::core::types;
pub use crate::core::types::{FetchFailure, FetchRequest, FetchResult, FetchedPage, StructuredExtraction};
pub use crate::core::{AppState, ScoutConfig};
pub use tools::{Extractor, Fetcher, OpenError, PageSession, Scout};
