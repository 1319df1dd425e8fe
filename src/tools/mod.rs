pub mod extract;
pub mod fetch;
pub mod session;

pub use extract::Extractor;
pub use fetch::Fetcher;
pub use session::{OpenError, PageSession, Scout};
