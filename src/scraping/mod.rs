pub mod browser_manager;
pub mod driver;
pub mod sanitize;

pub use browser_manager::ChromeDriver;
pub use driver::{BrowserDriver, BrowserSession, DriverError};
