use std::sync::Arc;

use crate::tools::session::Scout;

/// Shared handler state for the HTTP API. Holds no per-request data:
/// every request fetches, extracts or answers on its own.
#[derive(Clone)]
pub struct AppState {
    pub scout: Arc<Scout>,
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("model", &self.scout.extractor().model())
            .finish()
    }
}

impl AppState {
    pub fn new(scout: Scout) -> Self {
        Self {
            scout: Arc::new(scout),
        }
    }
}
