//! Post-harvest enrichment: audio features from the music catalogue, then a
//! video search per track to spot self-distributed releases.

use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use bing_client::BingClient;
use serde::{Deserialize, Serialize};
use spotify_client::SpotifyClient;
use tracing::{debug, info, warn};

use crate::error::{HarvestError, Result};
use crate::harvest::MUSIC_FILE;
use crate::store::HarvestStore;
use crate::types::{AudioFeatures, EnrichedTrack, FinalTrack, MusicGraphRecord};

pub const FEATURES_FILE: &str = "trending_music_with_features.json";
pub const FINAL_FILE: &str = "trending_music_final.json";
pub const PROCESSED_FILE: &str = "processed_songs.json";
pub const DESCRIPTIONS_FILE: &str = "video_descriptions.json";

/// Marker text the distribution service leaves in auto-generated uploads.
pub const DISTROKID_MARKER: &str = "DistroKid";

// ---------------------------------------------------------------------------
// Lookup seams
// ---------------------------------------------------------------------------

#[async_trait]
pub trait AudioFeatureLookup: Send + Sync {
    /// Catalogue ID of the best match for a title/artist pair.
    async fn track_id(&self, title: &str, artist: &str) -> Result<Option<String>>;

    async fn features(&self, track_id: &str) -> Result<AudioFeatures>;
}

#[async_trait]
impl AudioFeatureLookup for SpotifyClient {
    async fn track_id(&self, title: &str, artist: &str) -> Result<Option<String>> {
        Ok(self.find_track_id(title, artist).await?)
    }

    async fn features(&self, track_id: &str) -> Result<AudioFeatures> {
        Ok(self.audio_features(track_id).await?)
    }
}

#[async_trait]
pub trait VideoSearch: Send + Sync {
    /// Trimmed descriptions of the top video results for `query`.
    async fn descriptions(&self, query: &str) -> Result<Vec<String>>;
}

#[async_trait]
impl VideoSearch for BingClient {
    async fn descriptions(&self, query: &str) -> Result<Vec<String>> {
        Ok(self.search_videos(query).await?.descriptions())
    }
}

// ---------------------------------------------------------------------------
// Feature stage
// ---------------------------------------------------------------------------

pub struct FeatureStage<L> {
    lookup: L,
}

impl<L: AudioFeatureLookup> FeatureStage<L> {
    pub fn new(lookup: L) -> Self {
        Self { lookup }
    }

    /// Attach audio features to every harvested track. Tracks the catalogue
    /// cannot match keep `features: None`.
    pub async fn run<T: HarvestStore>(&self, store: &T) -> Result<Vec<EnrichedTrack>> {
        let input = store
            .load::<MusicGraphRecord>(MUSIC_FILE)
            .await?
            .ok_or_else(|| HarvestError::MissingInput(MUSIC_FILE.to_string()))?;

        let mut tracks = Vec::with_capacity(input.data.len());
        for record in input.data {
            let features = self.lookup_one(&record.title, &record.author).await;
            tracks.push(EnrichedTrack {
                features,
                ..EnrichedTrack::from(record)
            });
        }

        let matched = tracks.iter().filter(|t| t.features.is_some()).count();
        info!(tracks = tracks.len(), matched, "Audio features attached");

        store.save(FEATURES_FILE, &tracks).await?;
        Ok(tracks)
    }

    async fn lookup_one(&self, title: &str, author: &str) -> Option<AudioFeatures> {
        let track_id = match self.lookup.track_id(title, author).await {
            Ok(Some(id)) => id,
            Ok(None) => {
                debug!(title, author, "No catalogue match");
                return None;
            }
            Err(e) => {
                warn!(title, author, error = %e, "Track search failed");
                return None;
            }
        };

        match self.lookup.features(&track_id).await {
            Ok(features) => Some(features),
            Err(e) => {
                warn!(title, author, track_id = %track_id, error = %e, "Failed to retrieve audio features");
                None
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Distribution stage
// ---------------------------------------------------------------------------

/// Search query used for one track. Auto-generated "Topic" uploads carry
/// the distributor's boilerplate in their description.
pub fn video_query(title: &str, author: &str) -> String {
    format!("{title} {author} Topic site:youtube.com")
}

pub fn mentions_distrokid(descriptions: &[String]) -> bool {
    descriptions.iter().any(|d| d.contains(DISTROKID_MARKER))
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedDescriptions {
    pub query: String,
    pub descriptions: Vec<String>,
}

/// Search results kept across runs so a track is only searched once.
#[derive(Debug, Clone, Default)]
pub struct SearchCache {
    processed: BTreeMap<String, bool>,
    entries: Vec<CachedDescriptions>,
    index: HashMap<String, usize>,
}

impl SearchCache {
    pub fn new(processed: BTreeMap<String, bool>, entries: Vec<CachedDescriptions>) -> Self {
        let mut index = HashMap::new();
        for (i, entry) in entries.iter().enumerate() {
            // Later entries win, matching how a re-searched query is appended.
            index.insert(entry.query.clone(), i);
        }
        Self {
            processed,
            entries,
            index,
        }
    }

    pub async fn load<T: HarvestStore>(store: &T) -> Result<Self> {
        let processed = match store.load_raw(PROCESSED_FILE).await? {
            Some(value) => serde_json::from_value(value)?,
            None => BTreeMap::new(),
        };
        let entries = match store.load_raw(DESCRIPTIONS_FILE).await? {
            Some(value) => serde_json::from_value(value)?,
            None => Vec::new(),
        };
        Ok(Self::new(processed, entries))
    }

    pub async fn save<T: HarvestStore>(&self, store: &T) -> Result<()> {
        store
            .save_raw(PROCESSED_FILE, &serde_json::to_value(&self.processed)?)
            .await?;
        store
            .save_raw(DESCRIPTIONS_FILE, &serde_json::to_value(&self.entries)?)
            .await
    }

    pub fn is_processed(&self, query: &str) -> bool {
        self.processed.get(query).copied().unwrap_or(false)
    }

    /// Stored descriptions for a processed query. Empty when none were kept.
    pub fn descriptions(&self, query: &str) -> &[String] {
        self.index
            .get(query)
            .map(|&i| self.entries[i].descriptions.as_slice())
            .unwrap_or_default()
    }

    pub fn record(&mut self, query: String, descriptions: Vec<String>) {
        self.index.insert(query.clone(), self.entries.len());
        self.entries.push(CachedDescriptions {
            query: query.clone(),
            descriptions,
        });
        self.processed.insert(query, true);
    }

    pub fn len(&self) -> usize {
        self.processed.values().filter(|&&done| done).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub struct DistroStage<V> {
    search: V,
}

impl<V: VideoSearch> DistroStage<V> {
    pub fn new(search: V) -> Self {
        Self { search }
    }

    /// Flag every enriched track whose top video results mention the
    /// distribution service. Writes the final rows and the updated cache.
    pub async fn run<T: HarvestStore>(&self, store: &T) -> Result<Vec<FinalTrack>> {
        let input = store
            .load::<EnrichedTrack>(FEATURES_FILE)
            .await?
            .ok_or_else(|| HarvestError::MissingInput(FEATURES_FILE.to_string()))?;
        let mut cache = SearchCache::load(store).await?;

        let mut rows = Vec::with_capacity(input.data.len());
        let mut searched = 0usize;
        for track in input.data {
            let query = video_query(&track.title, &track.author);

            let distrokid = if cache.is_processed(&query) {
                debug!(query = %query, "Already processed, using cached descriptions");
                mentions_distrokid(cache.descriptions(&query))
            } else {
                info!(query = %query, "Searching");
                searched += 1;
                match self.search.descriptions(&query).await {
                    Ok(descriptions) => {
                        let flagged = mentions_distrokid(&descriptions);
                        cache.record(query, descriptions);
                        flagged
                    }
                    Err(e) => {
                        // Left unprocessed so the next run searches again.
                        warn!(query = %query, error = %e, "Video search failed");
                        false
                    }
                }
            };

            rows.push(FinalTrack {
                title: track.title,
                author: track.author,
                distrokid,
                features: track.features,
            });
        }

        let flagged = rows.iter().filter(|r| r.distrokid).count();
        info!(tracks = rows.len(), searched, flagged, "Distribution check complete");

        store.save(FINAL_FILE, &rows).await?;
        cache.save(store).await?;
        Ok(rows)
    }
}
