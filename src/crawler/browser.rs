//! Headless browser render engine
//!
//! A `RenderEngine` hands out a `RenderSession` per ingestion. The session owns
//! the browser process: it is opened when a crawl starts and closed when the
//! crawl ends, whatever happened to individual pages in between.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::Page;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, trace, warn};

use crate::crawler::CrawlerConfig;
use crate::crawler::error::FetchError;
use crate::crawler::fetcher::PageFetcher;

const READY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Factory for scoped render sessions
#[async_trait]
pub trait RenderEngine: Send + Sync {
    /// Start the underlying engine and return a session bound to it
    async fn open(&self) -> Result<Box<dyn RenderSession>, FetchError>;
}

/// A live render engine able to fetch fully rendered pages
#[async_trait]
pub trait RenderSession: PageFetcher {
    /// Release the engine; the session must not be used afterwards
    async fn close(self: Box<Self>);
}

/// Render engine backed by a locally installed Chrome/Chromium
#[derive(Debug, Clone)]
pub struct ChromeEngine {
    config: CrawlerConfig,
}

impl ChromeEngine {
    /// Create an engine launching browsers with the given crawler configuration
    pub fn new(config: CrawlerConfig) -> Self {
        Self { config }
    }

    fn browser_config(&self) -> Result<BrowserConfig, FetchError> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.config.page_timeout())
            .window_size(1920, 1080)
            .arg(format!("--user-agent={}", self.config.user_agent))
            .arg("--disable-blink-features=AutomationControlled")
            .arg("--disable-notifications")
            .arg("--no-first-run")
            .arg("--no-default-browser-check")
            .arg("--mute-audio");

        if !self.config.headless {
            builder = builder.with_head();
        }
        if let Some(path) = &self.config.chrome_executable {
            builder = builder.chrome_executable(path);
        }

        builder.build().map_err(FetchError::Browser)
    }
}

#[async_trait]
impl RenderEngine for ChromeEngine {
    #[instrument(skip(self))]
    async fn open(&self) -> Result<Box<dyn RenderSession>, FetchError> {
        let browser_config = self.browser_config()?;
        let (browser, mut handler) = Browser::launch(browser_config)
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to launch browser: {}", e)))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    trace!("Browser handler event error: {}", e);
                }
            }
            debug!("Browser handler task completed");
        });

        info!("Browser launched");
        Ok(Box::new(ChromeSession {
            browser: Some(browser),
            handler_task,
            settle_delay: self.config.settle_delay(),
        }))
    }
}

/// One browser process serving one crawl
pub struct ChromeSession {
    browser: Option<Browser>,
    handler_task: JoinHandle<()>,
    settle_delay: Duration,
}

impl ChromeSession {
    async fn load(&self, page: &Page, url: &str) -> Result<(), FetchError> {
        let navigation = |e: chromiumoxide::error::CdpError| FetchError::Navigation {
            url: url.to_string(),
            message: e.to_string(),
        };

        page.goto(url).await.map_err(navigation)?;
        page.wait_for_navigation().await.map_err(navigation)?;

        // network-idle equivalent: the document and its subresources are done
        loop {
            let state = page
                .evaluate("document.readyState")
                .await
                .ok()
                .and_then(|result| result.into_value::<String>().ok());
            if state.as_deref() == Some("complete") {
                break;
            }
            tokio::time::sleep(READY_POLL_INTERVAL).await;
        }

        Ok(())
    }
}

#[async_trait]
impl PageFetcher for ChromeSession {
    #[instrument(skip(self))]
    async fn fetch(&self, url: &str, timeout: Duration) -> Result<String, FetchError> {
        let browser = self
            .browser
            .as_ref()
            .ok_or_else(|| FetchError::Browser("Session already closed".to_string()))?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| FetchError::Browser(format!("Failed to open page: {}", e)))?;

        let loaded = match tokio::time::timeout(timeout, self.load(&page, url)).await {
            Ok(result) => result,
            Err(_) => Err(FetchError::Timeout {
                url: url.to_string(),
                timeout_ms: timeout.as_millis() as u64,
            }),
        };

        // late client-side rendering gets a moment before the final snapshot
        let html = match loaded {
            Ok(()) => {
                tokio::time::sleep(self.settle_delay).await;
                page.content().await.map_err(|e| FetchError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })
            }
            Err(e) => Err(e),
        };

        if let Err(e) = page.close().await {
            debug!("Failed to close page for {}: {}", url, e);
        }
        html
    }
}

#[async_trait]
impl RenderSession for ChromeSession {
    async fn close(mut self: Box<Self>) {
        if let Some(mut browser) = self.browser.take() {
            if let Err(e) = browser.close().await {
                warn!("Failed to close browser: {}", e);
            }
            if let Err(e) = browser.wait().await {
                warn!("Failed waiting for browser exit: {}", e);
            }
        }
        self.handler_task.abort();
        info!("Browser closed");
    }
}

impl Drop for ChromeSession {
    fn drop(&mut self) {
        // the Browser's own drop kills the child process if close() never ran
        self.handler_task.abort();
    }
}
