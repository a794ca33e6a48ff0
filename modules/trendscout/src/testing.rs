// Test mocks for the harvest and enrichment pipeline.
//
// One mock per trait boundary:
// - MockSurface (RenderSurface): scripted page loads with paginated element families
// - MemoryStore (HarvestStore): HashMap-based name→document
// - MockFeatureLookup (AudioFeatureLookup): title/artist→ID, ID→features
// - MockVideoSearch (VideoSearch): query→descriptions
//
// Plus helpers for building chart snapshots and class-attribute markup.

use std::collections::{HashMap, HashSet};
use std::io::Cursor;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::{Rgba, RgbaImage};
use serde_json::Value;

use crate::config::HarvestConfig;
use crate::enrichment::{AudioFeatureLookup, VideoSearch};
use crate::error::{HarvestError, Result};
use crate::store::HarvestStore;
use crate::surface::RenderSurface;
use crate::types::AudioFeatures;

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Pixel colour the dashboard paints its chart line in.
pub const CHART_RED: Rgba<u8> = Rgba([230, 40, 60, 255]);
const CHART_BACKGROUND: Rgba<u8> = Rgba([255, 255, 255, 255]);

// ---------------------------------------------------------------------------
// MockSurface
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum MockElement {
    Text(String),
    /// Canvas whose snapshot is the given data URL.
    Canvas(String),
    Button,
}

pub fn text(s: &str) -> MockElement {
    MockElement::Text(s.to_string())
}

pub fn canvas(data_url: String) -> MockElement {
    MockElement::Canvas(data_url)
}

/// What one navigation or reload renders: markup for selector discovery plus
/// element families that grow with every "load more" click.
#[derive(Debug, Clone, Default)]
pub struct MockPage {
    markup: String,
    /// One map per pagination step, selector → elements added at that step.
    steps: Vec<HashMap<String, Vec<MockElement>>>,
}

impl MockPage {
    pub fn new(markup: impl Into<String>) -> Self {
        Self {
            markup: markup.into(),
            steps: Vec::new(),
        }
    }

    /// A load where nothing has rendered.
    pub fn blank() -> Self {
        Self::default()
    }

    /// Add one pagination step. Elements accumulate: after `k` clicks a
    /// selector matches everything from steps `0..=k`.
    pub fn on_step<S: Into<String>>(
        mut self,
        families: impl IntoIterator<Item = (S, Vec<MockElement>)>,
    ) -> Self {
        self.steps.push(
            families
                .into_iter()
                .map(|(selector, elements)| (selector.into(), elements))
                .collect(),
        );
        self
    }

    fn elements(&self, selector: &str, step: usize) -> Vec<MockElement> {
        self.steps
            .iter()
            .take(step + 1)
            .filter_map(|families| families.get(selector))
            .flatten()
            .cloned()
            .collect()
    }
}

#[derive(Default)]
struct SurfaceState {
    current: Option<String>,
    /// Load index last shown for each URL.
    cursors: HashMap<String, usize>,
    step: usize,
    urls: Vec<String>,
    failed_navigations: u32,
}

/// Scripted browser. Each URL has its own sequence of loads; every
/// `navigate` to it or `reload` while on it shows the next one (the last
/// repeats once the script runs out). Unregistered URLs render nothing.
pub struct MockSurface {
    loads: HashMap<String, Vec<MockPage>>,
    load_more_selector: String,
    fail_navigations: u32,
    state: Mutex<SurfaceState>,
    reloads: AtomicU32,
    clicks: AtomicU32,
}

impl Default for MockSurface {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSurface {
    pub fn new() -> Self {
        Self {
            loads: HashMap::new(),
            load_more_selector: HarvestConfig::default().load_more_selector,
            fail_navigations: 0,
            state: Mutex::new(SurfaceState::default()),
            reloads: AtomicU32::new(0),
            clicks: AtomicU32::new(0),
        }
    }

    pub fn on_load(mut self, url: &str, page: MockPage) -> Self {
        self.loads.entry(url.to_string()).or_default().push(page);
        self
    }

    /// The first `n` navigations fail before touching the script.
    pub fn failing_navigations(mut self, n: u32) -> Self {
        self.fail_navigations = n;
        self
    }

    pub fn navigations(&self) -> Vec<String> {
        self.state.lock().unwrap().urls.clone()
    }

    pub fn reloads(&self) -> u32 {
        self.reloads.load(Ordering::SeqCst)
    }

    pub fn clicks(&self) -> u32 {
        self.clicks.load(Ordering::SeqCst)
    }

    fn show_next(&self, state: &mut SurfaceState, url: &str) {
        let count = self.loads.get(url).map_or(0, Vec::len);
        let next = match state.cursors.get(url) {
            None => 0,
            Some(&i) => (i + 1).min(count.saturating_sub(1)),
        };
        state.cursors.insert(url.to_string(), next);
        state.current = Some(url.to_string());
        state.step = 0;
    }

    fn current_page(&self, state: &SurfaceState) -> Option<&MockPage> {
        let url = state.current.as_ref()?;
        let i = *state.cursors.get(url)?;
        self.loads.get(url)?.get(i)
    }
}

#[async_trait]
impl RenderSurface for MockSurface {
    type Element = MockElement;

    async fn navigate(&self, url: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.urls.push(url.to_string());
        if state.failed_navigations < self.fail_navigations {
            state.failed_navigations += 1;
            return Err(HarvestError::Surface(format!(
                "MockSurface: navigation to {url} failed"
            )));
        }
        self.show_next(&mut state, url);
        Ok(())
    }

    async fn content(&self) -> Result<String> {
        let state = self.state.lock().unwrap();
        Ok(self
            .current_page(&state)
            .map(|page| page.markup.clone())
            .unwrap_or_default())
    }

    async fn query_all(&self, selector: &str) -> Result<Vec<MockElement>> {
        let state = self.state.lock().unwrap();
        let Some(page) = self.current_page(&state) else {
            return Ok(Vec::new());
        };

        if selector == self.load_more_selector {
            let more = state.step + 1 < page.steps.len();
            return Ok(if more { vec![MockElement::Button] } else { Vec::new() });
        }
        Ok(page.elements(selector, state.step))
    }

    async fn text(&self, element: &MockElement) -> Result<String> {
        match element {
            MockElement::Text(s) => Ok(s.trim().to_string()),
            MockElement::Canvas(_) => Ok(String::new()),
            MockElement::Button => Ok("View More".to_string()),
        }
    }

    async fn canvas_data_url(&self, element: &MockElement) -> Result<String> {
        match element {
            MockElement::Canvas(url) => Ok(url.clone()),
            other => Err(HarvestError::Surface(format!(
                "MockSurface: {other:?} is not a canvas"
            ))),
        }
    }

    async fn click(&self, element: &MockElement) -> Result<()> {
        if *element != MockElement::Button {
            return Err(HarvestError::Surface(format!(
                "MockSurface: {element:?} is not clickable"
            )));
        }
        self.clicks.fetch_add(1, Ordering::SeqCst);
        self.state.lock().unwrap().step += 1;
        Ok(())
    }

    async fn reload(&self) -> Result<()> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();
        if let Some(url) = state.current.clone() {
            self.show_next(&mut state, &url);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// MemoryStore
// ---------------------------------------------------------------------------

/// In-memory store. Documents are kept as JSON values, so reads go through
/// the same serde path as the file store.
#[derive(Default)]
pub struct MemoryStore {
    docs: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_doc(self, name: &str, value: Value) -> Self {
        self.docs.lock().unwrap().insert(name.to_string(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.docs.lock().unwrap().get(name).cloned()
    }

    pub fn names(&self) -> HashSet<String> {
        self.docs.lock().unwrap().keys().cloned().collect()
    }
}

#[async_trait]
impl HarvestStore for MemoryStore {
    async fn save_raw(&self, name: &str, value: &Value) -> Result<()> {
        self.docs
            .lock()
            .unwrap()
            .insert(name.to_string(), value.clone());
        Ok(())
    }

    async fn load_raw(&self, name: &str) -> Result<Option<Value>> {
        Ok(self.get(name))
    }
}

// ---------------------------------------------------------------------------
// MockFeatureLookup
// ---------------------------------------------------------------------------

/// Returns `Ok(None)` for unregistered tracks and `Err` for unregistered IDs.
#[derive(Default)]
pub struct MockFeatureLookup {
    tracks: HashMap<(String, String), String>,
    features: HashMap<String, AudioFeatures>,
    failing_searches: HashSet<(String, String)>,
}

impl MockFeatureLookup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_track(mut self, title: &str, artist: &str, id: &str) -> Self {
        self.tracks
            .insert((title.to_string(), artist.to_string()), id.to_string());
        self
    }

    pub fn on_features(mut self, id: &str, features: AudioFeatures) -> Self {
        self.features.insert(id.to_string(), features);
        self
    }

    pub fn failing_search(mut self, title: &str, artist: &str) -> Self {
        self.failing_searches
            .insert((title.to_string(), artist.to_string()));
        self
    }
}

#[async_trait]
impl AudioFeatureLookup for MockFeatureLookup {
    async fn track_id(&self, title: &str, artist: &str) -> Result<Option<String>> {
        let key = (title.to_string(), artist.to_string());
        if self.failing_searches.contains(&key) {
            return Err(HarvestError::Lookup(format!(
                "MockFeatureLookup: search for {title} / {artist} failed"
            )));
        }
        Ok(self.tracks.get(&key).cloned())
    }

    async fn features(&self, track_id: &str) -> Result<AudioFeatures> {
        self.features.get(track_id).cloned().ok_or_else(|| {
            HarvestError::Lookup(format!(
                "MockFeatureLookup: no features registered for {track_id}"
            ))
        })
    }
}

/// Features with every field set to `v`.
pub fn uniform_features(v: f64) -> AudioFeatures {
    AudioFeatures {
        acousticness: v,
        danceability: v,
        energy: v,
        instrumentalness: v,
        liveness: v,
        speechiness: v,
        valence: v,
    }
}

// ---------------------------------------------------------------------------
// MockVideoSearch
// ---------------------------------------------------------------------------

/// Returns `Err` for unregistered queries and records every query issued.
#[derive(Default)]
pub struct MockVideoSearch {
    results: HashMap<String, Vec<String>>,
    queries: Mutex<Vec<String>>,
}

impl MockVideoSearch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_query(mut self, query: &str, descriptions: &[&str]) -> Self {
        self.results.insert(
            query.to_string(),
            descriptions.iter().map(|d| d.to_string()).collect(),
        );
        self
    }

    pub fn queries(&self) -> Vec<String> {
        self.queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl VideoSearch for MockVideoSearch {
    async fn descriptions(&self, query: &str) -> Result<Vec<String>> {
        self.queries.lock().unwrap().push(query.to_string());
        self.results.get(query).cloned().ok_or_else(|| {
            HarvestError::Lookup(format!("MockVideoSearch: no results registered for {query}"))
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Markup with one element per class attribute value.
pub fn class_markup(values: &[&str]) -> String {
    let body: String = values
        .iter()
        .map(|v| format!("<div class=\"{v}\"></div>"))
        .collect();
    format!("<html><body>{body}</body></html>")
}

pub fn png_data_url(image: &RgbaImage) -> String {
    let mut png = Vec::new();
    image
        .write_to(&mut Cursor::new(&mut png), image::ImageFormat::Png)
        .unwrap();
    format!("data:image/png;base64,{}", STANDARD.encode(&png))
}

/// A chart snapshot whose red line sits at row `line_y` in every column.
/// Digitizes to `1 - line_y / height` at all seven points.
pub fn flat_chart(width: u32, height: u32, line_y: u32) -> String {
    let mut img = RgbaImage::from_pixel(width, height, CHART_BACKGROUND);
    for x in 0..width {
        img.put_pixel(x, line_y, CHART_RED);
    }
    png_data_url(&img)
}
