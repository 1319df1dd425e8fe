pub mod app_state;
pub mod config;
pub mod error;
pub mod retry;
pub mod types;
pub mod url_guard;

pub use app_state::AppState;
pub use config::ScoutConfig;
