use std::hash::Hash;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::digitizer::GRAPH_POINTS;

pub use spotify_client::AudioFeatures;

/// Field combination that deduplicates records within one harvest run.
pub trait Identity {
    type Key: Eq + Hash;

    fn identity(&self) -> Self::Key;
}

/// A trending hashtag card. Identity is the exact text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashtagRecord {
    pub text: String,
}

impl Identity for HashtagRecord {
    type Key = String;

    fn identity(&self) -> String {
        self.text.clone()
    }
}

/// A trending track with its popularity curve recovered from the card's
/// chart, oldest point first.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MusicGraphRecord {
    pub title: String,
    pub author: String,
    pub graph_values: [f64; GRAPH_POINTS],
}

impl Identity for MusicGraphRecord {
    type Key = (String, String);

    fn identity(&self) -> (String, String) {
        (self.title.clone(), self.author.clone())
    }
}

/// What the store writes for every stage: capture time plus records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub timestamp: DateTime<Utc>,
    pub data: Vec<T>,
}

/// A harvested track after the audio-feature lookup.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedTrack {
    pub title: String,
    pub author: String,
    pub graph_values: [f64; GRAPH_POINTS],
    #[serde(flatten)]
    pub features: Option<AudioFeatures>,
}

impl From<MusicGraphRecord> for EnrichedTrack {
    fn from(record: MusicGraphRecord) -> Self {
        Self {
            title: record.title,
            author: record.author,
            graph_values: record.graph_values,
            features: None,
        }
    }
}

/// Final per-track row: features plus whether the track looks
/// self-distributed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalTrack {
    pub title: String,
    pub author: String,
    pub distrokid: bool,
    #[serde(flatten)]
    pub features: Option<AudioFeatures>,
}
