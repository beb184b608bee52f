//! Headless page rendering via the Chrome DevTools Protocol.
//!
//! Each render launches its own disposable browser instance, so concurrent
//! chains never share browser state and a wedged page cannot poison later
//! cycles. The browser process is released on every exit path.

use std::time::Duration;

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use futures::StreamExt;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("failed to launch browser: {0}")]
    Launch(String),

    #[error("navigation to {url} failed: {reason}")]
    Navigation { url: String, reason: String },

    #[error("navigation to {0} timed out")]
    Timeout(String),

    #[error("failed to extract page text: {0}")]
    Extract(String),
}

/// The visible text of a rendered quiz page.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// URL the page was rendered from
    pub source_url: String,
    /// Visible text content of the document body
    pub body_text: String,
}

/// Renders a URL to its visible text content.
#[async_trait]
pub trait PageRenderer: Send + Sync {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError>;
}

/// Headless Chromium renderer. One browser instance per call.
pub struct HeadlessRenderer {
    nav_timeout: Duration,
    settle: Duration,
}

impl HeadlessRenderer {
    pub fn new(nav_timeout: Duration, settle: Duration) -> Self {
        Self {
            nav_timeout,
            settle,
        }
    }

    async fn extract_body_text(&self, browser: &Browser, url: &str) -> Result<String, RenderError> {
        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| RenderError::Launch(format!("failed to create page: {}", e)))?;

        tokio::time::timeout(self.nav_timeout, page.goto(url))
            .await
            .map_err(|_| RenderError::Timeout(url.to_string()))?
            .map_err(|e| RenderError::Navigation {
                url: url.to_string(),
                reason: e.to_string(),
            })?;

        // Quiz pages decode embedded content client-side after load.
        tokio::time::sleep(self.settle).await;

        let result = page
            .evaluate("document.body ? document.body.innerText : ''")
            .await
            .map_err(|e| RenderError::Extract(e.to_string()))?;

        Ok(result
            .value()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .to_string())
    }
}

#[async_trait]
impl PageRenderer for HeadlessRenderer {
    async fn render(&self, url: &str) -> Result<RenderedPage, RenderError> {
        let config = BrowserConfig::builder()
            .build()
            .map_err(RenderError::Launch)?;

        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| RenderError::Launch(e.to_string()))?;

        // Drain CDP events so the browser does not stall on a full channel.
        let events = tokio::spawn(async move { while handler.next().await.is_some() {} });

        let outcome = self.extract_body_text(&browser, url).await;

        // Close, then reap. Without the wait every render would leave a
        // zombie Chromium process behind for the life of the server.
        if let Err(e) = browser.close().await {
            tracing::warn!("Failed to close browser: {}", e);
            if let Some(Err(e)) = browser.kill().await {
                tracing::warn!("Failed to kill browser process: {}", e);
            }
        }
        if let Err(e) = browser.wait().await {
            tracing::warn!("Failed to reap browser process: {}", e);
        }
        events.abort();

        let body_text = outcome?;
        tracing::debug!(url = %url, chars = body_text.len(), "Rendered page");

        Ok(RenderedPage {
            source_url: url.to_string(),
            body_text,
        })
    }
}
