// RenderSurface: the browser capability the harvest needs.
//
// Implemented for chrome_surface::ChromeSurface (real browser) and for
// testing::MockSurface (scripted pages, no browser).

use async_trait::async_trait;
use chrome_surface::ChromeSurface;

use crate::error::Result;

#[async_trait]
pub trait RenderSurface: Send + Sync {
    type Element: Send + Sync;

    async fn navigate(&self, url: &str) -> Result<()>;

    /// Full rendered markup of the current document.
    async fn content(&self) -> Result<String>;

    /// All elements matching a CSS selector. No match is an empty list.
    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Trimmed text content of an element.
    async fn text(&self, element: &Self::Element) -> Result<String>;

    /// PNG data URL of a canvas element.
    async fn canvas_data_url(&self, element: &Self::Element) -> Result<String>;

    async fn click(&self, element: &Self::Element) -> Result<()>;

    async fn reload(&self) -> Result<()>;
}

#[async_trait]
impl RenderSurface for ChromeSurface {
    type Element = chrome_surface::Element;

    async fn navigate(&self, url: &str) -> Result<()> {
        Ok(ChromeSurface::navigate(self, url).await?)
    }

    async fn content(&self) -> Result<String> {
        Ok(ChromeSurface::content(self).await?)
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<Self::Element>> {
        Ok(ChromeSurface::query_all(self, selector).await?)
    }

    async fn text(&self, element: &Self::Element) -> Result<String> {
        Ok(ChromeSurface::text(self, element).await?)
    }

    async fn canvas_data_url(&self, element: &Self::Element) -> Result<String> {
        Ok(ChromeSurface::canvas_data_url(self, element).await?)
    }

    async fn click(&self, element: &Self::Element) -> Result<()> {
        Ok(ChromeSurface::click(self, element).await?)
    }

    async fn reload(&self) -> Result<()> {
        Ok(ChromeSurface::reload(self).await?)
    }
}
