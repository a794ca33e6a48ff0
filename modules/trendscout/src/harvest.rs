//! Harvest orchestration: open a listing, discover its current class names,
//! run the collection loop, persist what came back.

use std::fmt;

use tokio::time::sleep;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::collect::{collect, CollectOptions, PageSource, Termination};
use crate::config::HarvestConfig;
use crate::digitizer::ChartDigitizer;
use crate::error::Result;
use crate::selector::{discover_all, resolve, SelectorDiscovery};
use crate::sources::{HashtagSource, MusicSource};
use crate::store::HarvestStore;
use crate::surface::RenderSurface;
use crate::types::{HashtagRecord, MusicGraphRecord};

pub const HASHTAGS_FILE: &str = "trending_hashtags.json";
pub const MUSIC_FILE: &str = "trending_music.json";

/// Record counts from one full run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HarvestReport {
    pub hashtags: usize,
    pub music: usize,
}

impl fmt::Display for HarvestReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} hashtags, {} tracks", self.hashtags, self.music)
    }
}

pub struct Harvester<'a, S, T> {
    surface: &'a S,
    store: &'a T,
    config: HarvestConfig,
    digitizer: ChartDigitizer,
}

impl<'a, S, T> Harvester<'a, S, T>
where
    S: RenderSurface,
    T: HarvestStore,
{
    pub fn new(surface: &'a S, store: &'a T, config: HarvestConfig) -> Self {
        let digitizer = ChartDigitizer::new(config.thresholds);
        Self {
            surface,
            store,
            config,
            digitizer,
        }
    }

    /// Hashtags then music, one after the other on the same surface.
    pub async fn run(&self) -> Result<HarvestReport> {
        let run_id = Uuid::new_v4();
        info!(%run_id, "Harvest run starting");

        let hashtags = self.harvest_hashtags().await?;
        let music = self.harvest_music().await?;

        let report = HarvestReport {
            hashtags: hashtags.len(),
            music: music.len(),
        };
        info!(%run_id, hashtags = report.hashtags, music = report.music, "Harvest run complete");
        Ok(report)
    }

    pub async fn harvest_hashtags(&self) -> Result<Vec<HashtagRecord>> {
        let fragment = self.config.hashtag_fragment.as_str();
        let records = self
            .attempt_listing("hashtags", &self.config.hashtag_url, &[fragment], |found| {
                HashtagSource::new(
                    self.surface,
                    found[0].selector.clone(),
                    &self.config.load_more_selector,
                )
            })
            .await;

        self.persist(HASHTAGS_FILE, &records).await?;
        Ok(records)
    }

    pub async fn harvest_music(&self) -> Result<Vec<MusicGraphRecord>> {
        let fragments = [
            self.config.title_fragment.as_str(),
            self.config.author_fragment.as_str(),
            self.config.graph_fragment.as_str(),
        ];
        let records = self
            .attempt_listing("music", &self.config.music_url, &fragments, |found| {
                MusicSource::new(
                    self.surface,
                    found[0].selector.clone(),
                    found[1].selector.clone(),
                    &found[2].selector,
                    &self.digitizer,
                    &self.config.load_more_selector,
                )
            })
            .await;

        self.persist(MUSIC_FILE, &records).await?;
        Ok(records)
    }

    /// Outer retry loop shared by both listings. Each attempt navigates
    /// afresh, waits for the page to settle, and discovers the selectors. A
    /// miss, a navigation failure, or an empty collection costs one attempt
    /// followed by a reload. A structural mismatch ends the listing at once
    /// with whatever was collected before it. `build` receives one discovery
    /// per fragment, in order.
    async fn attempt_listing<P, F>(
        &self,
        listing: &str,
        url: &str,
        fragments: &[&str],
        build: F,
    ) -> Vec<P::Record>
    where
        P: PageSource,
        F: Fn(&[SelectorDiscovery]) -> P,
    {
        let options: CollectOptions = self.config.collect_options();
        let budget = self.config.retry_budget;

        for attempt in 1..=budget {
            match self.discover_on(url, fragments).await {
                Ok(Some(found)) => {
                    for d in &found {
                        info!(listing, fragment = %d.fragment, selector = %d.selector, "Resolved selector");
                    }
                    let source = build(&found);
                    let collection = collect(&source, &options).await;
                    if collection.termination == Termination::StructuralMismatch {
                        warn!(
                            listing,
                            collected = collection.records.len(),
                            "Element families misaligned, not retrying"
                        );
                        return collection.records;
                    }
                    if !collection.records.is_empty() {
                        return collection.records;
                    }
                    warn!(
                        listing,
                        attempt,
                        budget,
                        termination = ?collection.termination,
                        "Collection came back empty"
                    );
                }
                Ok(None) => {
                    warn!(listing, attempt, budget, "Could not identify dynamic class names");
                }
                Err(e) => {
                    warn!(listing, attempt, budget, error = %e, "Failed to open listing");
                }
            }

            if attempt < budget {
                info!(listing, "Reloading page");
                if let Err(e) = self.surface.reload().await {
                    warn!(listing, error = %e, "Reload failed");
                }
                sleep(self.config.reload_settle()).await;
            }
        }

        warn!(listing, budget, "Giving up on listing");
        Vec::new()
    }

    async fn discover_on(&self, url: &str, fragments: &[&str]) -> Result<Option<Vec<SelectorDiscovery>>> {
        self.surface.navigate(url).await?;
        sleep(self.config.page_settle()).await;
        let markup = self.surface.content().await?;

        let found = discover_all(&markup, fragments);
        if found.is_none() {
            for &fragment in fragments {
                debug!(fragment, tokens = ?resolve(&markup, fragment), "Class tokens on page");
            }
        }
        Ok(found)
    }

    async fn persist<R>(&self, name: &str, records: &[R]) -> Result<()>
    where
        R: serde::Serialize + Sync,
    {
        if records.is_empty() {
            warn!(file = name, "Nothing collected, not writing");
            return Ok(());
        }
        self.store.save(name, records).await?;
        info!(file = name, count = records.len(), "Results saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_display() {
        let report = HarvestReport {
            hashtags: 12,
            music: 3,
        };
        assert_eq!(report.to_string(), "12 hashtags, 3 tracks");
    }
}
