/// Live tests against a real Chromium. Need a browser on PATH (or
/// CHROME_EXECUTABLE) and network access.
///
/// Run with: cargo test --test live_browser_test -- --ignored --nocapture
use page_scout::scraping::ChromeDriver;
use page_scout::{FetchRequest, Fetcher};
use std::sync::Arc;
use std::time::Duration;

fn init_logger() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_test_writer()
        .try_init();
}

#[tokio::test]
#[ignore]
async fn fetches_example_dot_com() {
    init_logger();
    let driver = ChromeDriver::new(std::env::var("CHROME_EXECUTABLE").ok());
    let fetcher = Fetcher::new(Arc::new(driver));
    let request =
        FetchRequest::new("https://example.com/", 1024 * 1024, 2, Duration::from_secs(20)).unwrap();

    let page = fetcher.fetch(&request).await.into_result().unwrap();
    println!("{} bytes after {} attempt(s)", page.byte_len(), page.attempts);
    assert!(page.text.contains("Example Domain"));
    assert!(!page.text.contains("<"));
    assert!(!page.truncated);
}

#[tokio::test]
#[ignore]
async fn tiny_byte_budget_truncates_live_page() {
    init_logger();
    let fetcher = Fetcher::new(Arc::new(ChromeDriver::default()));
    let request =
        FetchRequest::new("https://example.com/", 16, 1, Duration::from_secs(20)).unwrap();

    let page = fetcher.fetch(&request).await.into_result().unwrap();
    assert!(page.truncated);
    assert!(page.text.len() <= 16);
}
