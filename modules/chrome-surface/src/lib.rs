pub mod error;

pub use chromiumoxide::Element;
pub use error::{Result, SurfaceError};

use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::{Handler, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Window size the dashboard is rendered at. Its responsive layout switches
/// to a different card component below desktop widths.
const WINDOW_WIDTH: u32 = 1920;
const WINDOW_HEIGHT: u32 = 1080;

const TEXT_CONTENT_FN: &str = "function() { return this.textContent; }";
const CANVAS_PNG_FN: &str = "function() { return this.toDataURL('image/png'); }";

/// A single Chrome tab driven over the DevTools protocol.
///
/// Every method issues one protocol round-trip against the same page, so
/// callers must not interleave operations from several tasks.
pub struct ChromeSurface {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
}

impl ChromeSurface {
    /// Launch a local Chrome/Chromium and open a blank tab.
    pub async fn launch(headless: bool) -> Result<Self> {
        let mut builder = BrowserConfig::builder().window_size(WINDOW_WIDTH, WINDOW_HEIGHT);
        if !headless {
            builder = builder.with_head();
        }
        let config = builder.build().map_err(SurfaceError::Launch)?;

        let (browser, handler) = Browser::launch(config)
            .await
            .map_err(|e| SurfaceError::Launch(e.to_string()))?;

        info!(headless, "Launched local browser");
        Self::attach(browser, handler).await
    }

    /// Connect to an already running browser (e.g. a Browserless endpoint)
    /// by its DevTools websocket URL.
    pub async fn connect(ws_url: &str) -> Result<Self> {
        let (browser, handler) = Browser::connect(ws_url)
            .await
            .map_err(|e| SurfaceError::Launch(e.to_string()))?;

        info!(ws_url, "Connected to remote browser");
        Self::attach(browser, handler).await
    }

    async fn attach(browser: Browser, mut handler: Handler) -> Result<Self> {
        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    warn!(error = %e, "CDP handler error");
                }
            }
        });

        let page = browser.new_page("about:blank").await?;

        Ok(Self {
            browser,
            page,
            handler,
        })
    }

    pub async fn navigate(&self, url: &str) -> Result<()> {
        debug!(url, "Navigating");
        self.page.goto(url).await?;
        Ok(())
    }

    /// Full rendered markup of the current document.
    pub async fn content(&self) -> Result<String> {
        Ok(self.page.content().await?)
    }

    /// All elements matching a CSS selector. No match is an empty list.
    pub async fn query_all(&self, selector: &str) -> Result<Vec<Element>> {
        Ok(self.page.find_elements(selector).await?)
    }

    /// Trimmed `textContent` of an element.
    pub async fn text(&self, element: &Element) -> Result<String> {
        let returns = element.call_js_fn(TEXT_CONTENT_FN, false).await?;
        let text = returns
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .unwrap_or_default()
            .trim()
            .to_string();
        Ok(text)
    }

    /// PNG data URL of a `<canvas>` element's current bitmap.
    pub async fn canvas_data_url(&self, element: &Element) -> Result<String> {
        let returns = element.call_js_fn(CANVAS_PNG_FN, false).await?;
        returns
            .result
            .value
            .as_ref()
            .and_then(|v| v.as_str())
            .map(str::to_string)
            .ok_or_else(|| SurfaceError::EmptyScriptResult("canvas.toDataURL".to_string()))
    }

    pub async fn click(&self, element: &Element) -> Result<()> {
        element.click().await?;
        Ok(())
    }

    pub async fn reload(&self) -> Result<()> {
        debug!("Reloading page");
        self.page.reload().await?;
        Ok(())
    }

    /// Close the browser and stop draining protocol events.
    pub async fn close(mut self) -> Result<()> {
        self.browser.close().await?;
        self.handler.abort();
        info!("Browser closed");
        Ok(())
    }
}
