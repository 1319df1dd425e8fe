//! Native browser management using `chromiumoxide`.
//!
//! This module is the single source of truth for:
//! * Finding a usable browser executable (Brave → Chrome → Chromium, cross-platform).
//! * Building a headless launch config.
//! * [`ChromeDriver`], the production [`BrowserDriver`]: one freshly launched
//!   browser per session, each with its own throwaway profile directory,
//!   torn down on `close()` (or on drop as a fallback).

use async_trait::async_trait;
use chromiumoxide::browser::BrowserConfig;
use chromiumoxide::error::CdpError;
use chromiumoxide::handler::viewport::Viewport;
use chromiumoxide::{Browser, Page};
use futures::StreamExt;
use rand::seq::IndexedRandom;
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use url::Url;

use super::driver::{BrowserDriver, BrowserSession, DriverError};

const BODY_POLL_INTERVAL: Duration = Duration::from_millis(250);
const BROWSER_EXIT_GRACE: Duration = Duration::from_secs(5);

// ── User-Agent pool ──────────────────────────────────────────────────────────

const DESKTOP_USER_AGENTS: &[&str] = &[
    // Chrome 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 132 – macOS
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36",
    // Chrome 131 – Linux
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36",
    // Edge 132 – Windows
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36 Edg/132.0.0.0",
];

/// Returns a randomly-chosen Chromium desktop User-Agent string.
pub fn random_user_agent() -> &'static str {
    let mut rng = rand::rng();
    DESKTOP_USER_AGENTS
        .choose(&mut rng)
        .copied()
        .unwrap_or(DESKTOP_USER_AGENTS[0])
}

// ── Browser executable discovery ─────────────────────────────────────────────

/// Find a usable Chromium-family browser executable.
///
/// Resolution order:
/// 1. `override_path` (from config / `CHROME_EXECUTABLE`), if it exists
/// 2. PATH scan – finds package-manager installs on all platforms.
/// 3. OS-specific well-known install paths.
pub fn find_chrome_executable(override_path: Option<&str>) -> Option<String> {
    if let Some(p) = override_path {
        if Path::new(p).exists() {
            return Some(p.to_string());
        }
        warn!("Configured browser executable not found: {}", p);
    }

    if let Ok(path_var) = std::env::var("PATH") {
        let candidates = [
            "brave-browser",
            "brave",
            "google-chrome",
            "google-chrome-stable",
            "chromium",
            "chromium-browser",
            "chrome",
        ];
        for dir in std::env::split_paths(&path_var) {
            for exe in candidates {
                let full = dir.join(exe);
                if full.exists() {
                    return Some(full.to_string_lossy().to_string());
                }
            }
        }
    }

    #[cfg(target_os = "macos")]
    {
        let candidates = [
            "/Applications/Brave Browser.app/Contents/MacOS/Brave Browser",
            "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
            "/Applications/Chromium.app/Contents/MacOS/Chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "linux")]
    {
        let candidates = [
            "/usr/bin/brave-browser",
            "/usr/bin/chromium",
            "/usr/bin/chromium-browser",
            "/usr/bin/google-chrome",
            "/usr/local/bin/chromium",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    #[cfg(target_os = "windows")]
    {
        let candidates = [
            r"C:\Program Files\BraveSoftware\Brave-Browser\Application\brave.exe",
            r"C:\Program Files\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Google\Chrome\Application\chrome.exe",
            r"C:\Program Files (x86)\Microsoft\Edge\Application\msedge.exe",
        ];
        for c in candidates {
            if Path::new(c).exists() {
                return Some(c.to_string());
            }
        }
    }

    None
}

// ── Headless browser config builder ──────────────────────────────────────────

/// Fresh profile directory for one browser launch. Removed when dropped.
///
/// Without one, every launch shares chromiumoxide's default profile and
/// concurrent launches fight over Chromium's `SingletonLock`.
pub fn create_profile_dir() -> std::io::Result<TempDir> {
    tempfile::Builder::new()
        .prefix("page-scout-profile-")
        .tempdir()
}

/// Headless config for a throwaway session.
///
/// `--no-sandbox` / `--disable-dev-shm-usage` keep it working in containers;
/// `--incognito` keeps cookies and cache from leaking between attempts.
pub fn build_headless_config(
    exe: &str,
    profile_dir: &Path,
    width: u32,
    height: u32,
) -> Result<BrowserConfig, String> {
    BrowserConfig::builder()
        .chrome_executable(exe)
        .user_data_dir(profile_dir)
        .viewport(Viewport {
            width,
            height,
            device_scale_factor: Some(1.0),
            emulating_mobile: false,
            is_landscape: true,
            has_touch: false,
        })
        .window_size(width, height)
        .arg("--disable-gpu")
        .arg("--no-sandbox")
        .arg("--disable-dev-shm-usage")
        .arg("--disable-extensions")
        .arg("--no-first-run")
        .arg("--no-default-browser-check")
        .arg("--incognito")
        .arg("--mute-audio")
        .arg("--log-level=3")
        .arg(format!("--user-agent={}", random_user_agent()))
        .build()
}

// ── ChromeDriver ─────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ChromeDriver {
    executable: Option<String>,
}

impl ChromeDriver {
    pub fn new(executable: Option<String>) -> Self {
        Self { executable }
    }
}

#[async_trait]
impl BrowserDriver for ChromeDriver {
    async fn open_session(&self) -> Result<Box<dyn BrowserSession>, DriverError> {
        let exe = find_chrome_executable(self.executable.as_deref()).ok_or_else(|| {
            DriverError::Unavailable {
                message: "No browser found. Install Brave, Chrome, or Chromium, or set CHROME_EXECUTABLE.".to_string(),
                fatal: true,
            }
        })?;

        let profile = create_profile_dir().map_err(|e| DriverError::Unavailable {
            message: format!("failed to create browser profile directory: {}", e),
            fatal: false,
        })?;

        let config = build_headless_config(&exe, profile.path(), 1920, 1080).map_err(|e| {
            DriverError::Unavailable {
                message: format!("failed to build browser config: {}", e),
                fatal: true,
            }
        })?;

        info!(
            "🚀 Launching headless browser ({}, profile {})",
            exe,
            profile.path().display()
        );
        // Launch failures (crash on startup, timeout) may clear up on a fresh attempt.
        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| DriverError::Unavailable {
                    message: format!("failed to launch {}: {}", exe, e),
                    fatal: false,
                })?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler error: {}", e);
                }
            }
        });

        let page = browser.new_page("about:blank").await;
        let mut session = ChromeSession {
            browser: Some(browser),
            page: None,
            handler: Some(handler_task),
            profile: Some(profile),
        };

        match page {
            Ok(page) => {
                session.page = Some(page);
                Ok(Box::new(session))
            }
            Err(e) => {
                let err = classify(e);
                Box::new(session).close().await;
                Err(err)
            }
        }
    }
}

/// One launched browser plus its single tab and private profile.
pub struct ChromeSession {
    browser: Option<Browser>,
    page: Option<Page>,
    handler: Option<JoinHandle<()>>,
    profile: Option<TempDir>,
}

impl ChromeSession {
    fn page(&self) -> Result<&Page, DriverError> {
        self.page
            .as_ref()
            .ok_or_else(|| DriverError::Other("session has no open page".to_string()))
    }
}

#[async_trait]
impl BrowserSession for ChromeSession {
    async fn navigate(
        &mut self,
        url: &Url,
        page_load_timeout: Duration,
    ) -> Result<(), DriverError> {
        let page = self.page()?;
        info!("🌐 Navigating to {}", url);
        match tokio::time::timeout(page_load_timeout, page.goto(url.as_str())).await {
            Err(_) => Err(DriverError::PageLoadTimeout(page_load_timeout)),
            Ok(Err(CdpError::Timeout)) => Err(DriverError::PageLoadTimeout(page_load_timeout)),
            Ok(Err(e)) => Err(classify(e)),
            Ok(Ok(_)) => Ok(()),
        }
    }

    async fn body_present(&mut self, timeout: Duration) -> Result<bool, DriverError> {
        let page = self.page()?;
        let deadline = Instant::now() + timeout;

        loop {
            match page.evaluate("document.body !== null").await {
                Ok(result) => {
                    if result.into_value::<bool>().unwrap_or(false) {
                        return Ok(true);
                    }
                }
                Err(e) if is_connection_loss(&e) => return Err(classify(e)),
                // Evaluation can fail while a navigation is still committing.
                Err(e) => debug!("body probe failed: {}", e),
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(false);
            }
            tokio::time::sleep(BODY_POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn page_source(&mut self) -> Result<String, DriverError> {
        let html = self.page()?.content().await.map_err(classify)?;
        info!("✅ Captured rendered markup: {} chars", html.len());
        Ok(html)
    }

    async fn close(mut self: Box<Self>) {
        if let Some(page) = self.page.take() {
            if let Err(e) = page.close().await {
                debug!("Page close error (non-fatal): {}", e);
            }
        }
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Browser close error (non-fatal): {}", e);
            }
            if tokio::time::timeout(BROWSER_EXIT_GRACE, browser.wait())
                .await
                .is_err()
            {
                warn!("Browser did not exit within {:?}", BROWSER_EXIT_GRACE);
            }
        }
        if let Some(handler) = self.handler.take() {
            handler.abort();
        }
        if let Some(profile) = self.profile.take() {
            let path = profile.path().to_path_buf();
            if let Err(e) = profile.close() {
                warn!("Failed to remove profile {} (non-fatal): {}", path.display(), e);
            }
        }
        debug!("🛑 Browser session closed");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // Only reached when close() was skipped (e.g. a panic mid-attempt).
        // Drop cannot await; hand the shutdown to the runtime if there is one.
        // The CDP handler must keep running until the close command is sent.
        let handler = self.handler.take();
        let profile = self.profile.take();
        let browser = self.browser.take();

        let (Some(mut browser), Ok(runtime)) = (browser, tokio::runtime::Handle::try_current())
        else {
            if let Some(handler) = handler {
                handler.abort();
            }
            return;
        };
        runtime.spawn(async move {
            let _ = browser.close().await;
            let _ = tokio::time::timeout(BROWSER_EXIT_GRACE, browser.wait()).await;
            if let Some(handler) = handler {
                handler.abort();
            }
            drop(profile);
        });
    }
}

fn is_connection_loss(e: &CdpError) -> bool {
    matches!(
        e,
        CdpError::Ws(_) | CdpError::ChannelSendError(_) | CdpError::NoResponse
    )
}

fn classify(e: CdpError) -> DriverError {
    if is_connection_loss(&e) {
        DriverError::Unavailable {
            message: format!("browser connection lost: {}", e),
            fatal: false,
        }
    } else {
        DriverError::Other(e.to_string())
    }
}
