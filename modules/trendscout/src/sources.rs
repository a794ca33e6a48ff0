//! The two dashboard listings as `PageSource`s over a `RenderSurface`.

use async_trait::async_trait;
use tracing::warn;

use crate::collect::{Batch, PageSource};
use crate::digitizer::ChartDigitizer;
use crate::error::{HarvestError, Result};
use crate::surface::RenderSurface;
use crate::types::{HashtagRecord, MusicGraphRecord};

/// The "View more" button under a listing.
struct LoadMore<'a, S> {
    surface: &'a S,
    selector: &'a str,
}

impl<S: RenderSurface> LoadMore<'_, S> {
    async fn present(&self) -> Result<bool> {
        Ok(!self.surface.query_all(self.selector).await?.is_empty())
    }

    async fn click(&self) -> Result<()> {
        let buttons = self.surface.query_all(self.selector).await?;
        let button = buttons
            .first()
            .ok_or_else(|| HarvestError::AdvanceMissing(self.selector.to_string()))?;
        self.surface.click(button).await
    }
}

/// Flat list of hashtag cards, one record per title element.
pub struct HashtagSource<'a, S> {
    surface: &'a S,
    selector: String,
    load_more: LoadMore<'a, S>,
}

impl<'a, S: RenderSurface> HashtagSource<'a, S> {
    pub fn new(surface: &'a S, selector: String, load_more_selector: &'a str) -> Self {
        Self {
            surface,
            selector,
            load_more: LoadMore {
                surface,
                selector: load_more_selector,
            },
        }
    }
}

#[async_trait]
impl<'a, S: RenderSurface> PageSource for HashtagSource<'a, S> {
    type Record = HashtagRecord;

    async fn elements_present(&self) -> Result<bool> {
        Ok(!self.surface.query_all(&self.selector).await?.is_empty())
    }

    async fn extract_all(&self) -> Result<Batch<HashtagRecord>> {
        let elements = self.surface.query_all(&self.selector).await?;
        let mut records = Vec::with_capacity(elements.len());
        for element in &elements {
            let text = self.surface.text(element).await?;
            records.push(HashtagRecord { text });
        }
        Ok(Batch::Records(records))
    }

    async fn has_advance(&self) -> Result<bool> {
        self.load_more.present().await
    }

    async fn advance(&self) -> Result<()> {
        self.load_more.click().await
    }

    async fn reload(&self) -> Result<()> {
        self.surface.reload().await
    }
}

/// Music cards: three parallel element families (title, author, chart
/// canvas) aligned by position.
pub struct MusicSource<'a, S> {
    surface: &'a S,
    title: String,
    author: String,
    canvas: String,
    digitizer: &'a ChartDigitizer,
    load_more: LoadMore<'a, S>,
}

impl<'a, S: RenderSurface> MusicSource<'a, S> {
    /// `graph_selector` matches the chart wrapper; its `<canvas>` child is
    /// what gets snapshotted.
    pub fn new(
        surface: &'a S,
        title_selector: String,
        author_selector: String,
        graph_selector: &str,
        digitizer: &'a ChartDigitizer,
        load_more_selector: &'a str,
    ) -> Self {
        Self {
            surface,
            title: title_selector,
            author: author_selector,
            canvas: format!("{graph_selector} canvas"),
            digitizer,
            load_more: LoadMore {
                surface,
                selector: load_more_selector,
            },
        }
    }
}

#[async_trait]
impl<'a, S: RenderSurface> PageSource for MusicSource<'a, S> {
    type Record = MusicGraphRecord;

    async fn elements_present(&self) -> Result<bool> {
        for selector in [&self.title, &self.author, &self.canvas] {
            if self.surface.query_all(selector).await?.is_empty() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    async fn extract_all(&self) -> Result<Batch<MusicGraphRecord>> {
        let titles = self.surface.query_all(&self.title).await?;
        let authors = self.surface.query_all(&self.author).await?;
        let canvases = self.surface.query_all(&self.canvas).await?;

        if titles.len() != authors.len() || titles.len() != canvases.len() {
            return Ok(Batch::Mismatch {
                counts: vec![titles.len(), authors.len(), canvases.len()],
            });
        }

        let mut records = Vec::with_capacity(titles.len());
        for ((title_el, author_el), canvas_el) in titles.iter().zip(&authors).zip(&canvases) {
            let title = self.surface.text(title_el).await?;
            let author = self.surface.text(author_el).await?;
            let data_url = self.surface.canvas_data_url(canvas_el).await?;

            match self.digitizer.digitize_data_url(&data_url) {
                Ok(graph_values) => records.push(MusicGraphRecord {
                    title,
                    author,
                    graph_values,
                }),
                Err(e) => {
                    warn!(title = %title, author = %author, error = %e, "Unreadable chart snapshot, skipping track");
                }
            }
        }
        Ok(Batch::Records(records))
    }

    async fn has_advance(&self) -> Result<bool> {
        self.load_more.present().await
    }

    async fn advance(&self) -> Result<()> {
        self.load_more.click().await
    }

    async fn reload(&self) -> Result<()> {
        self.surface.reload().await
    }
}
