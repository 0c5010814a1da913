// spider_chrome re-exports chromiumoxide API
use super::page::ChromePage;
use crate::error::{GuideError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::{Path, PathBuf};

const CHROME_HELP: &str = "Chrome not found. You can:\n\
     - Install Chrome: https://www.google.com/chrome/\n\
     - Ubuntu/Debian: sudo apt install chromium-browser\n\
     - Fedora: sudo dnf install chromium\n\
     - macOS: brew install --cask google-chrome\n\
     - Or specify path: --chrome-path /path/to/chrome\n\
     - Linux sandbox issue? Try: --no-sandbox";

pub struct ChromeDriver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
}

/// Connection mode for Chrome browser
pub enum ConnectionMode {
    /// Sandboxed mode - launches Chrome using system installation
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Advanced mode - connects to existing Chrome on debug port
    DebugPort(u16),
}

impl ChromeDriver {
    /// Current active page, skipping Chrome's own pages when a real one exists
    async fn get_active_page(&self) -> Result<chromiumoxide::page::Page> {
        let pages = self.browser.pages().await?;

        for page in pages.iter() {
            if let Ok(Some(url)) = page.url().await {
                if !url.starts_with("chrome://") {
                    return Ok(page.clone());
                }
            }
        }

        if let Some(page) = pages.last() {
            return Ok(page.clone());
        }

        self.browser
            .new_page("about:blank")
            .await
            .map_err(|e| GuideError::Other(format!("Failed to create page: {}", e)))
    }

    /// Create new ChromeDriver with specified connection mode
    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                // Unique profile directory per instance so parallel sessions don't collide
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos();
                let temp_dir = std::env::temp_dir().join(format!("guide-chrome-{}", unique_id));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    GuideError::LaunchFailed(format!("Failed to create temp directory: {}", e))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);

                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }

                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                } else {
                    match Self::ensure_chrome_installed().await {
                        Ok(path) => {
                            config = config.chrome_executable(path);
                        }
                        Err(e) => {
                            log::warn!("Auto-download failed ({}), trying system Chrome", e);
                        }
                    }
                }

                let config = config
                    .build()
                    .map_err(|e| GuideError::LaunchFailed(format!("{}.\n\n{}", e, CHROME_HELP)))?;
                let (browser, mut handler) = Browser::launch(config)
                    .await
                    .map_err(|e| GuideError::LaunchFailed(format!("{}.\n\n{}", e, CHROME_HELP)))?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Drive the CDP connection
                    }
                });

                log::info!("Chrome launched (headless: {})", headless);
                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{}", port);
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    GuideError::ConnectionFailed(format!(
                        "Failed to connect to Chrome on port {}. \
                             Make sure Chrome is running with --remote-debugging-port={}: {}",
                        port, port, e
                    ))
                })?;

                tokio::spawn(async move {
                    while (handler.next().await).is_some() {
                        // Drive the CDP connection
                    }
                });

                log::info!("Connected to Chrome on port {}", port);
                (browser, None)
            }
        };

        Ok(Self { browser, temp_dir })
    }

    /// Navigate the active page and wait for its load event
    pub async fn navigate(&self, url: &str) -> Result<()> {
        use chromiumoxide::cdp::browser_protocol::page::{EventLoadEventFired, NavigateParams};

        let normalized_url = if !url.starts_with("http://")
            && !url.starts_with("https://")
            && !url.starts_with("file://")
            && !url.starts_with("about:")
            && !url.starts_with("data:")
        {
            log::debug!("Normalizing URL: {} -> https://{}", url, url);
            format!("https://{}", url)
        } else {
            url.to_string()
        };

        log::info!("Navigating to {}", normalized_url);
        let page = self.get_active_page().await?;

        // Subscribe before navigating so a fast load isn't missed
        let mut loads = page.event_listener::<EventLoadEventFired>().await?;

        let params = NavigateParams::builder()
            .url(&normalized_url)
            .build()
            .map_err(|e| {
                GuideError::NavigationFailed(format!("Invalid URL {}: {}", normalized_url, e))
            })?;

        let response = page.execute(params).await.map_err(|e| {
            if e.to_string().contains("oneshot canceled") {
                GuideError::NavigationFailed(
                    "Browser connection lost. The browser may have been closed or crashed."
                        .to_string(),
                )
            } else {
                GuideError::NavigationFailed(format!(
                    "Failed to navigate to {}: {}",
                    normalized_url, e
                ))
            }
        })?;

        if let Some(error_text) = response.result.error_text {
            return Err(GuideError::NavigationFailed(format!(
                "Navigation error: {}",
                error_text
            )));
        }

        match tokio::time::timeout(tokio::time::Duration::from_secs(30), loads.next()).await {
            Ok(Some(_)) => log::debug!("Load event fired for {}", normalized_url),
            Ok(None) => log::warn!("Load event stream closed for {}", normalized_url),
            Err(_) => {
                return Err(GuideError::NavigationFailed(format!(
                    "Timed out waiting for {} to load",
                    normalized_url
                )));
            }
        }

        Ok(())
    }

    /// Execute arbitrary JavaScript in the page context
    pub async fn execute_script(&self, script: &str) -> Result<serde_json::Value> {
        let page = self.get_active_page().await?;

        let result = page
            .evaluate(script)
            .await
            .map_err(|e| GuideError::Script(format!("Script execution failed: {}", e)))?;

        Ok(result.into_value().unwrap_or(serde_json::Value::Null))
    }

    /// The active page as a [`PageContext`](crate::page::PageContext)
    pub async fn guide_page(&self) -> Result<ChromePage> {
        Ok(ChromePage::new(self.get_active_page().await?))
    }

    /// Check if the browser is still alive and responsive
    pub async fn is_alive(&self) -> bool {
        match self.browser.pages().await {
            Ok(pages) => {
                if let Some(page) = pages.first() {
                    matches!(
                        tokio::time::timeout(tokio::time::Duration::from_secs(2), page.url()).await,
                        Ok(Ok(_))
                    )
                } else {
                    true
                }
            }
            Err(_) => false,
        }
    }

    /// Close the browser connection
    pub async fn close(mut self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| GuideError::Other(e.to_string()))?;
        Ok(())
    }

    /// Ensure Chrome is installed, downloading if necessary
    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| GuideError::Other("Cannot determine cache directory".to_string()))?
            .join("guide-webdriver")
            .join("chrome");

        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| GuideError::Other(format!("Failed to create cache dir: {}", e)))?;

        let marker = cache_dir.join(".downloaded");
        if marker.exists() {
            if let Some(executable) = Self::find_chrome_in_cache(&cache_dir).await {
                return Ok(executable);
            }
        }

        log::info!("Downloading Chrome for Testing (first time only, ~150MB)...");
        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| GuideError::Other(format!("Fetcher config failed: {}", e)))?,
        );

        let info = fetcher
            .fetch()
            .await
            .map_err(|e| GuideError::Other(format!("Chrome download failed: {}", e)))?;

        tokio::fs::write(&marker, "downloaded")
            .await
            .map_err(|e| GuideError::Other(format!("Failed to write marker: {}", e)))?;

        log::info!("Chrome downloaded to {}", info.executable_path.display());
        Ok(info.executable_path)
    }

    async fn find_chrome_in_cache(cache_dir: &Path) -> Option<PathBuf> {
        [
            "chrome",
            "chrome.exe",
            "Google Chrome.app/Contents/MacOS/Google Chrome",
            "chrome-linux/chrome",
            "chrome-mac/Chromium.app/Contents/MacOS/Chromium",
            "chrome-win/chrome.exe",
        ]
        .iter()
        .map(|rel| cache_dir.join(rel))
        .find(|path| path.exists())
    }
}

impl Drop for ChromeDriver {
    fn drop(&mut self) {
        if let Some(temp_dir) = &self.temp_dir {
            if temp_dir.exists() {
                let _ = std::fs::remove_dir_all(temp_dir);
            }
        }
    }
}
