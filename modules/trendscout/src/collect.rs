//! Resilient paginated collection.
//!
//! One run waits for the record elements to render, extracts a batch, merges
//! it into a deduplicated accumulator, clicks "load more", and repeats. Empty
//! waits trigger a reload until the retry budget runs out. Every exit path
//! returns whatever was collected; nothing here fails the caller.

use std::collections::HashSet;
use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::types::Identity;

/// Floor for the poll interval so a zero interval cannot spin without
/// yielding to the clock.
const MIN_POLL_INTERVAL: Duration = Duration::from_millis(1);

#[derive(Debug, Clone)]
pub struct CollectOptions {
    /// Hard cap on records returned.
    pub capacity: usize,
    /// Empty waits tolerated before giving up.
    pub retry_budget: u32,
    /// How long one wait polls for elements.
    pub wait_timeout: Duration,
    pub poll_interval: Duration,
    /// Pause after a reload before polling again.
    pub reload_settle: Duration,
    /// Pause after clicking "load more" before polling again.
    pub advance_settle: Duration,
}

impl Default for CollectOptions {
    fn default() -> Self {
        Self {
            capacity: 500,
            retry_budget: 3,
            wait_timeout: Duration::from_secs(10),
            poll_interval: Duration::from_millis(250),
            reload_settle: Duration::from_secs(5),
            advance_settle: Duration::from_secs(2),
        }
    }
}

/// What one extraction pass produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Batch<R> {
    /// Candidate records in page order, duplicates included.
    Records(Vec<R>),
    /// Paired element families disagree in length; the batch cannot be
    /// aligned and is discarded.
    Mismatch { counts: Vec<usize> },
}

/// A paginated listing on a live page.
#[async_trait]
pub trait PageSource: Send + Sync {
    type Record: Identity + Send;

    /// Are the record elements rendered yet?
    async fn elements_present(&self) -> Result<bool>;

    /// Read every record currently rendered.
    async fn extract_all(&self) -> Result<Batch<Self::Record>>;

    /// Is there a "load more" control to click?
    async fn has_advance(&self) -> Result<bool>;

    /// Click "load more".
    async fn advance(&self) -> Result<()>;

    async fn reload(&self) -> Result<()>;
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Termination {
    CapacityReached,
    PaginationExhausted,
    AdvanceFailed,
    StructuralMismatch,
    ExtractFailed,
    RetriesExhausted,
}

#[derive(Debug, Clone)]
pub struct Collection<R> {
    pub records: Vec<R>,
    pub termination: Termination,
    pub retries: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Offer {
    Accepted,
    Duplicate,
    Full,
}

/// Per-run accumulator. Lives for one `collect` call.
pub struct CollectionState<R: Identity> {
    records: Vec<R>,
    seen: HashSet<R::Key>,
    retry_count: u32,
    capacity: usize,
}

impl<R: Identity> CollectionState<R> {
    pub fn new(capacity: usize) -> Self {
        Self {
            records: Vec::new(),
            seen: HashSet::new(),
            retry_count: 0,
            capacity,
        }
    }

    /// Append a record unless its identity was already seen or the cap is hit.
    pub fn offer(&mut self, record: R) -> Offer {
        if self.is_full() {
            return Offer::Full;
        }
        if !self.seen.insert(record.identity()) {
            return Offer::Duplicate;
        }
        self.records.push(record);
        Offer::Accepted
    }

    pub fn is_full(&self) -> bool {
        self.records.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    fn record_retry(&mut self) -> u32 {
        self.retry_count += 1;
        self.retry_count
    }

    pub fn into_records(self) -> Vec<R> {
        let mut records = self.records;
        records.truncate(self.capacity);
        records
    }
}

/// Poll `probe` every `interval` until it returns true or `timeout` elapses.
/// Runs on tokio's clock, so a paused test runtime skips the waiting.
pub async fn poll_until<F, Fut>(interval: Duration, timeout: Duration, mut probe: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let interval = interval.max(MIN_POLL_INTERVAL);
    let deadline = Instant::now() + timeout;
    loop {
        if probe().await {
            return true;
        }
        let now = Instant::now();
        if now >= deadline {
            return false;
        }
        sleep(interval.min(deadline - now)).await;
    }
}

/// Run the wait/extract/advance loop against `source` until it terminates.
pub async fn collect<S: PageSource>(source: &S, options: &CollectOptions) -> Collection<S::Record> {
    let mut state = CollectionState::new(options.capacity);
    let termination = drive(source, options, &mut state).await;
    let retries = state.retry_count();
    let records = state.into_records();

    match termination {
        Termination::RetriesExhausted if records.is_empty() => {
            warn!(retries, "Retry budget exhausted with nothing collected");
        }
        Termination::RetriesExhausted => {
            warn!(
                retries,
                collected = records.len(),
                "Retry budget exhausted, keeping partial results"
            );
        }
        _ => info!(collected = records.len(), ?termination, "Collection finished"),
    }

    Collection {
        records,
        termination,
        retries,
    }
}

async fn drive<S: PageSource>(
    source: &S,
    options: &CollectOptions,
    state: &mut CollectionState<S::Record>,
) -> Termination {
    loop {
        if state.is_full() {
            return Termination::CapacityReached;
        }

        let found = poll_until(options.poll_interval, options.wait_timeout, move || async move {
            match source.elements_present().await {
                Ok(present) => present,
                Err(e) => {
                    debug!(error = %e, "Element probe failed");
                    false
                }
            }
        })
        .await;

        if !found {
            let attempt = state.record_retry();
            if attempt >= options.retry_budget {
                return Termination::RetriesExhausted;
            }
            warn!(
                attempt,
                budget = options.retry_budget,
                "No elements found, reloading page"
            );
            if let Err(e) = source.reload().await {
                warn!(error = %e, "Reload failed");
            }
            sleep(options.reload_settle).await;
            continue;
        }

        let batch = match source.extract_all().await {
            Ok(Batch::Records(records)) => records,
            Ok(Batch::Mismatch { counts }) => {
                warn!(
                    ?counts,
                    collected = state.len(),
                    "Element families differ in length, stopping"
                );
                return Termination::StructuralMismatch;
            }
            Err(e) => {
                warn!(error = %e, collected = state.len(), "Extraction failed, stopping");
                return Termination::ExtractFailed;
            }
        };

        let offered = batch.len();
        let mut accepted = 0usize;
        for record in batch {
            match state.offer(record) {
                Offer::Accepted => {
                    accepted += 1;
                    if state.is_full() {
                        return Termination::CapacityReached;
                    }
                }
                Offer::Duplicate => {}
                Offer::Full => return Termination::CapacityReached,
            }
        }
        debug!(offered, accepted, total = state.len(), "Batch merged");

        match source.has_advance().await {
            Ok(true) => {}
            Ok(false) => {
                debug!("No load-more control left");
                return Termination::PaginationExhausted;
            }
            Err(e) => {
                warn!(error = %e, "Load-more lookup failed");
                return Termination::AdvanceFailed;
            }
        }
        if let Err(e) = source.advance().await {
            warn!(error = %e, "Load-more click failed");
            return Termination::AdvanceFailed;
        }
        sleep(options.advance_settle).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Mutex;

    use crate::error::HarvestError;
    use crate::types::HashtagRecord;

    enum Step {
        /// Nothing renders until the next reload.
        Blank,
        Batch(Vec<&'static str>),
        Mismatch,
        ExtractError,
    }

    /// Walks through `steps`: reload moves past a blank step, "load more"
    /// moves to the next batch.
    struct ScriptedSource {
        steps: Mutex<VecDeque<Step>>,
        reloads: AtomicU32,
        advances: AtomicU32,
        probes: AtomicU32,
    }

    impl ScriptedSource {
        fn new(steps: Vec<Step>) -> Self {
            Self {
                steps: Mutex::new(steps.into()),
                reloads: AtomicU32::new(0),
                advances: AtomicU32::new(0),
                probes: AtomicU32::new(0),
            }
        }
    }

    fn tags(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|t| t.to_string()).collect()
    }

    fn texts(records: &[HashtagRecord]) -> Vec<String> {
        records.iter().map(|r| r.text.clone()).collect()
    }

    #[async_trait]
    impl PageSource for ScriptedSource {
        type Record = HashtagRecord;

        async fn elements_present(&self) -> Result<bool> {
            self.probes.fetch_add(1, Ordering::SeqCst);
            let steps = self.steps.lock().unwrap();
            Ok(!matches!(steps.front(), None | Some(Step::Blank)))
        }

        async fn extract_all(&self) -> Result<Batch<HashtagRecord>> {
            let steps = self.steps.lock().unwrap();
            match steps.front() {
                Some(Step::Batch(texts)) => Ok(Batch::Records(
                    texts
                        .iter()
                        .map(|t| HashtagRecord {
                            text: t.to_string(),
                        })
                        .collect(),
                )),
                Some(Step::Mismatch) => Ok(Batch::Mismatch {
                    counts: vec![5, 5, 4],
                }),
                _ => Err(HarvestError::Surface("detached".into())),
            }
        }

        async fn has_advance(&self) -> Result<bool> {
            Ok(self.steps.lock().unwrap().len() > 1)
        }

        async fn advance(&self) -> Result<()> {
            self.advances.fetch_add(1, Ordering::SeqCst);
            self.steps.lock().unwrap().pop_front();
            Ok(())
        }

        async fn reload(&self) -> Result<()> {
            self.reloads.fetch_add(1, Ordering::SeqCst);
            let mut steps = self.steps.lock().unwrap();
            if matches!(steps.front(), Some(Step::Blank)) {
                steps.pop_front();
            }
            Ok(())
        }
    }

    #[tokio::test(start_paused = true)]
    async fn capacity_cuts_mid_batch_and_drops_duplicates() {
        let source = ScriptedSource::new(vec![Step::Batch(vec!["A", "A", "B", "C", "D"])]);
        let options = CollectOptions {
            capacity: 3,
            ..CollectOptions::default()
        };

        let out = collect(&source, &options).await;
        assert_eq!(texts(&out.records), tags(&["A", "B", "C"]));
        assert_eq!(out.termination, Termination::CapacityReached);
        assert_eq!(source.advances.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn three_empty_waits_abort_with_nothing() {
        let source = ScriptedSource::new(vec![Step::Blank, Step::Blank, Step::Blank, Step::Blank]);
        let options = CollectOptions::default();

        let start = Instant::now();
        let out = collect(&source, &options).await;

        assert!(out.records.is_empty());
        assert_eq!(out.termination, Termination::RetriesExhausted);
        assert_eq!(out.retries, 3);
        // No reload after the final failed wait.
        assert_eq!(source.reloads.load(Ordering::SeqCst), 2);
        // Three full waits plus two reload settles of virtual time.
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3 * 10 + 2 * 5));
        assert!(elapsed < Duration::from_secs(3 * 10 + 2 * 5 + 1));
    }

    #[tokio::test(start_paused = true)]
    async fn reload_recovers_from_a_blank_render() {
        let source = ScriptedSource::new(vec![Step::Blank, Step::Batch(vec!["#x", "#y"])]);
        let out = collect(&source, &CollectOptions::default()).await;

        assert_eq!(texts(&out.records), tags(&["#x", "#y"]));
        assert_eq!(out.termination, Termination::PaginationExhausted);
        assert_eq!(out.retries, 1);
        assert_eq!(source.reloads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn pages_accumulate_without_repeats() {
        // Each "load more" re-renders earlier cards plus new ones.
        let source = ScriptedSource::new(vec![
            Step::Batch(vec!["a", "b"]),
            Step::Batch(vec!["a", "b", "c", "d"]),
            Step::Batch(vec!["a", "b", "c", "d", "e"]),
        ]);
        let out = collect(&source, &CollectOptions::default()).await;

        assert_eq!(texts(&out.records), tags(&["a", "b", "c", "d", "e"]));
        assert_eq!(out.termination, Termination::PaginationExhausted);
        assert_eq!(source.advances.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatch_stops_without_retry() {
        let source = ScriptedSource::new(vec![Step::Batch(vec!["a"]), Step::Mismatch]);
        let out = collect(&source, &CollectOptions::default()).await;

        assert_eq!(texts(&out.records), tags(&["a"]));
        assert_eq!(out.termination, Termination::StructuralMismatch);
        assert_eq!(source.reloads.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn mismatch_on_first_batch_returns_empty() {
        let source = ScriptedSource::new(vec![Step::Mismatch]);
        let out = collect(&source, &CollectOptions::default()).await;

        assert!(out.records.is_empty());
        assert_eq!(out.termination, Termination::StructuralMismatch);
    }

    #[tokio::test(start_paused = true)]
    async fn extraction_error_keeps_partial_results() {
        let source = ScriptedSource::new(vec![Step::Batch(vec!["a", "b"]), Step::ExtractError]);
        let out = collect(&source, &CollectOptions::default()).await;

        assert_eq!(texts(&out.records), tags(&["a", "b"]));
        assert_eq!(out.termination, Termination::ExtractFailed);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_capacity_returns_immediately() {
        let source = ScriptedSource::new(vec![Step::Batch(vec!["a"])]);
        let options = CollectOptions {
            capacity: 0,
            ..CollectOptions::default()
        };
        let out = collect(&source, &options).await;

        assert!(out.records.is_empty());
        assert_eq!(out.termination, Termination::CapacityReached);
        assert_eq!(source.probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_respects_the_deadline() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let start = Instant::now();
        let found = poll_until(
            Duration::from_secs(1),
            Duration::from_millis(3500),
            move || async move {
                counter.fetch_add(1, Ordering::SeqCst);
                false
            },
        )
        .await;

        assert!(!found);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(3500));
        assert!(elapsed < Duration::from_millis(3600));
        // t = 0, 1, 2, 3, 3.5
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn poll_until_returns_as_soon_as_probe_holds() {
        let calls = AtomicU32::new(0);
        let counter = &calls;
        let found = poll_until(
            Duration::from_millis(100),
            Duration::from_secs(10),
            move || async move { counter.fetch_add(1, Ordering::SeqCst) >= 2 },
        )
        .await;

        assert!(found);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn state_never_exceeds_capacity() {
        let mut state = CollectionState::new(2);
        for text in ["a", "b", "c", "a"] {
            state.offer(HashtagRecord {
                text: text.to_string(),
            });
        }
        assert_eq!(state.len(), 2);
        assert_eq!(
            state.offer(HashtagRecord { text: "z".into() }),
            Offer::Full
        );
        assert_eq!(texts(&state.into_records()), tags(&["a", "b"]));
    }
}
