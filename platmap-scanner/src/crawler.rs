use crate::config::{CrawlConfig, SweepConfig};
use crate::error::ScanError;
use crate::fetcher::{DocumentSource, FetchedDocument};
use crate::identifier::{MIN_INDEX, MapId};
use crate::references::ReferencePolicy;
use crate::result::{CrawlEvent, CrawlReport, EventCallback, VisitOutcome, VisitResult};
use crate::text::{Extraction, TextExtractor};
use std::collections::{BTreeSet, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, warn};

/// Visited set and FIFO frontier for one crawl.
///
/// An identifier is moved to `visited` as soon as it is dequeued, so a map
/// that fails or turns out to be absent is never requeued within the run and
/// a document referencing itself adds nothing.
#[derive(Debug, Default)]
pub struct CrawlState {
    visited: HashSet<MapId>,
    pending: VecDeque<MapId>,
    discovered_edges: usize,
}

impl CrawlState {
    pub fn new(seed: MapId) -> Self {
        let mut state = Self::default();
        state.pending.push_back(seed);
        state
    }

    /// Dequeue the next identifier and mark it visited.
    pub fn next(&mut self) -> Option<MapId> {
        let id = self.pending.pop_front()?;
        self.visited.insert(id.clone());
        Some(id)
    }

    /// Append `id` to the frontier unless it is already visited or pending.
    pub fn enqueue(&mut self, id: MapId) -> bool {
        if self.is_known(&id) {
            return false;
        }
        self.pending.push_back(id);
        true
    }

    /// Mark an identifier visited without queueing it (used by the sweep).
    pub fn mark_visited(&mut self, id: MapId) -> bool {
        self.visited.insert(id)
    }

    pub fn is_known(&self, id: &MapId) -> bool {
        self.visited.contains(id) || self.pending.contains(id)
    }

    pub fn is_visited(&self, id: &MapId) -> bool {
        self.visited.contains(id)
    }

    pub fn record_edges(&mut self, count: usize) {
        self.discovered_edges += count;
    }

    pub fn visited_len(&self) -> usize {
        self.visited.len()
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    pub fn discovered_edges(&self) -> usize {
        self.discovered_edges
    }

    pub fn is_done(&self) -> bool {
        self.pending.is_empty()
    }
}

/// Enforces the fixed pause between network requests.
struct Pacer {
    delay: Duration,
    last_request: Option<Instant>,
}

impl Pacer {
    fn new(delay: Duration) -> Self {
        Self {
            delay,
            last_request: None,
        }
    }

    async fn wait(&mut self) {
        if let Some(last) = self.last_request {
            let ready = last + self.delay;
            let remaining = ready.saturating_duration_since(Instant::now());
            if !remaining.is_zero() {
                debug!("Waiting {:?} before next request", remaining);
                tokio::time::sleep_until(ready).await;
            }
        }
    }

    fn finished(&mut self) {
        self.last_request = Some(Instant::now());
    }
}

/// Breadth-first crawler over the plat-map reference graph.
///
/// One document is processed at a time; the only suspension points are the
/// pacing delay and the retrieval itself. Per-identifier failures are
/// recorded in the report and never stop the crawl.
pub struct Crawler<S> {
    source: S,
    extractor: Arc<TextExtractor>,
    policy: ReferencePolicy,
    delay: Duration,
    sweep: Option<SweepConfig>,
    event_callback: Option<EventCallback>,
}

impl<S: DocumentSource> Crawler<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            extractor: Arc::new(TextExtractor::default()),
            policy: ReferencePolicy::default(),
            delay: CrawlConfig::default().delay(),
            sweep: None,
            event_callback: None,
        }
    }

    pub fn from_config(source: S, config: &CrawlConfig) -> Self {
        Self::new(source)
            .with_delay(config.delay())
            .with_policy(config.references.clone())
            .with_sweep(config.sweep().cloned())
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_policy(mut self, policy: ReferencePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_extractor(mut self, extractor: TextExtractor) -> Self {
        self.extractor = Arc::new(extractor);
        self
    }

    pub fn with_sweep(mut self, sweep: Option<SweepConfig>) -> Self {
        self.sweep = sweep;
        self
    }

    pub fn with_event_callback(mut self, callback: EventCallback) -> Self {
        self.event_callback = Some(callback);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Crawl everything reachable from `seed`, then sweep its group if
    /// configured. Runs until the frontier is empty.
    pub async fn crawl(&self, seed: &MapId) -> CrawlReport {
        info!("Starting crawl for group {} from map {}", seed.group(), seed);
        self.emit(CrawlEvent::Started { seed: seed.clone() });

        let mut state = CrawlState::new(seed.clone());
        let mut pacer = Pacer::new(self.delay);
        let mut results = Vec::new();

        self.drain(&mut state, &mut pacer, &mut results).await;

        if let Some(sweep) = &self.sweep {
            self.sweep_group(seed.group(), sweep, &mut state, &mut pacer, &mut results)
                .await;
        }

        let report = CrawlReport {
            seed: seed.clone(),
            visited: state.visited.iter().cloned().collect::<BTreeSet<_>>(),
            discovered_edges: state.discovered_edges,
            results,
        };

        info!(
            "Group {} crawl complete: {} retrieved, {} absent, {} failed, {} edges",
            seed.group(),
            report.count(VisitOutcome::Done),
            report.count(VisitOutcome::Absent),
            report.count(VisitOutcome::Failed),
            report.discovered_edges
        );
        let failed: Vec<String> = report.failures().iter().map(|r| r.id.render()).collect();
        if !failed.is_empty() {
            warn!("Failed to retrieve from group {}: {:?}", seed.group(), failed);
        }

        self.emit(CrawlEvent::Finished {
            seed: seed.clone(),
            visited: report.visited.len(),
        });
        report
    }

    async fn drain(&self, state: &mut CrawlState, pacer: &mut Pacer, results: &mut Vec<VisitResult>) {
        while let Some(id) = state.next() {
            let result = self.visit(&id, state, pacer).await;
            results.push(result);
        }
    }

    /// Try each index of `group` not yet visited. A document found this way
    /// is scanned like any other and its references are crawled before the
    /// sweep moves on.
    async fn sweep_group(
        &self,
        group: &str,
        sweep: &SweepConfig,
        state: &mut CrawlState,
        pacer: &mut Pacer,
        results: &mut Vec<VisitResult>,
    ) {
        info!(
            "Sweeping group {} indices {}-{} (stop after {} misses)",
            group, MIN_INDEX, sweep.max_index, sweep.max_misses
        );
        self.emit(CrawlEvent::SweepStarted {
            group: group.to_string(),
        });

        let mut misses = 0;
        for index in MIN_INDEX..=sweep.max_index {
            let id = match MapId::new(group, index) {
                Ok(id) => id,
                Err(e) => {
                    warn!("Sweep stopped: {}", e);
                    break;
                }
            };

            let found = if state.is_visited(&id) {
                results
                    .iter()
                    .any(|r| r.id == id && r.outcome == VisitOutcome::Done)
            } else {
                state.mark_visited(id.clone());
                let mut result = self.visit(&id, state, pacer).await;
                result.via_sweep = true;
                let found = result.outcome == VisitOutcome::Done;
                if found {
                    info!("Discovered {} via sweep", id);
                }
                results.push(result);
                found
            };

            if found {
                misses = 0;
                self.drain(state, pacer, results).await;
            } else {
                misses += 1;
                if misses >= sweep.max_misses {
                    info!(
                        "Stopping sweep of group {} after {} consecutive misses",
                        group, misses
                    );
                    break;
                }
            }
        }
    }

    async fn visit(&self, id: &MapId, state: &mut CrawlState, pacer: &mut Pacer) -> VisitResult {
        info!(
            "Processing map: {} ({} visited, {} in queue)",
            id,
            state.visited_len(),
            state.pending_len()
        );
        self.emit(CrawlEvent::Fetching {
            id: id.clone(),
            visited: state.visited_len(),
            pending: state.pending_len(),
        });

        // Only requests that reach the server are paced.
        let fetched = match self.source.load_stored(id).await {
            Some(document) => Ok(document),
            None => {
                pacer.wait().await;
                let fetched = self.source.fetch(id).await;
                pacer.finished();
                fetched
            }
        };

        let result = match fetched {
            Ok(document) => self.scan(document, state).await,
            Err(ScanError::DocumentAbsent(_)) => {
                info!("Map {} does not exist", id);
                VisitResult::absent(id.clone())
            }
            Err(e) => {
                warn!("Failed to fetch {}: {}", id, e);
                VisitResult::failed(id.clone(), e.to_string())
            }
        };

        self.emit(CrawlEvent::Visited(result.clone()));
        result
    }

    /// Extract text, filter references and grow the frontier.
    async fn scan(&self, document: FetchedDocument, state: &mut CrawlState) -> VisitResult {
        let FetchedDocument { id, bytes, origin } = document;
        let mut result = VisitResult::done(id.clone(), origin);

        let extractor = self.extractor.clone();
        let extraction = match tokio::task::spawn_blocking(move || extractor.extract(&bytes)).await {
            Ok(extraction) => extraction,
            Err(e) => {
                warn!("Text extraction for {} did not complete: {}", id, e);
                Extraction::default()
            }
        };

        if extraction.is_empty() {
            warn!("{} for {}; it contributes no references", ScanError::ExtractionEmpty, id);
            return result;
        }
        result.strategy = extraction.strategy.map(str::to_string);

        let candidates = self.policy.extract(&extraction.text);
        debug!("Candidate references in {}: {:?}", id, candidates);

        for candidate in candidates {
            let target = match MapId::expand(candidate, id.group()) {
                Ok(target) => target,
                Err(e) => {
                    debug!("Ignoring candidate {} in {}: {}", candidate, id, e);
                    continue;
                }
            };
            if target == id {
                continue;
            }
            if state.enqueue(target.clone()) {
                info!("Added {} to download queue", target);
                result.enqueued.push(target.clone());
            }
            result.references.push(target);
        }

        state.record_edges(result.references.len());
        info!(
            "Found {} references in {} ({} new); queue size {}",
            result.references.len(),
            id,
            result.enqueued.len(),
            state.pending_len()
        );
        result
    }

    fn emit(&self, event: CrawlEvent) {
        if let Some(ref callback) = self.event_callback {
            callback(&event);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::fetcher::Origin;
    use crate::text::{ContentStreamStrategy, ExtractionStrategy};
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;

    enum Doc {
        Text(&'static str),
        Bytes(Vec<u8>),
        Fail,
    }

    /// In-memory graph; anything not listed is absent.
    #[derive(Default)]
    struct FakeSource {
        docs: HashMap<MapId, Doc>,
        local: HashSet<MapId>,
        calls: Mutex<Vec<MapId>>,
        downloads: Mutex<Vec<MapId>>,
    }

    impl FakeSource {
        fn with(mut self, raw: &str, doc: Doc) -> Self {
            self.docs.insert(id(raw), doc);
            self
        }

        fn local(mut self, raw: &str) -> Self {
            self.local.insert(id(raw));
            self
        }

        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().iter().map(MapId::render).collect()
        }

        fn downloads(&self) -> Vec<String> {
            self.downloads.lock().unwrap().iter().map(MapId::render).collect()
        }

        fn document(&self, map: &MapId, origin: Origin) -> Result<FetchedDocument> {
            let bytes = match self.docs.get(map) {
                Some(Doc::Text(text)) => text.as_bytes().to_vec(),
                Some(Doc::Bytes(bytes)) => bytes.clone(),
                Some(Doc::Fail) => {
                    return Err(ScanError::FetchFailed {
                        id: map.render(),
                        reason: "connection reset".to_string(),
                    });
                }
                None => return Err(ScanError::DocumentAbsent(map.render())),
            };
            Ok(FetchedDocument {
                id: map.clone(),
                bytes,
                origin,
            })
        }
    }

    #[async_trait]
    impl DocumentSource for FakeSource {
        async fn load_stored(&self, map: &MapId) -> Option<FetchedDocument> {
            if !self.local.contains(map) {
                return None;
            }
            self.calls.lock().unwrap().push(map.clone());
            self.document(map, Origin::LocalStore).ok()
        }

        async fn fetch(&self, map: &MapId) -> Result<FetchedDocument> {
            self.calls.lock().unwrap().push(map.clone());
            self.downloads.lock().unwrap().push(map.clone());
            self.document(map, Origin::Network)
        }
    }

    struct Utf8Strategy;

    impl ExtractionStrategy for Utf8Strategy {
        fn name(&self) -> &'static str {
            "utf8"
        }

        fn extract(&self, bytes: &[u8]) -> Result<String> {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
    }

    fn id(raw: &str) -> MapId {
        MapId::parse(raw).unwrap()
    }

    fn ids(raw: &[&str]) -> BTreeSet<MapId> {
        raw.iter().map(|r| id(r)).collect()
    }

    fn crawler(source: FakeSource) -> Crawler<FakeSource> {
        Crawler::new(source)
            .with_delay(Duration::from_millis(500))
            .with_extractor(TextExtractor::new().with_strategy(Utf8Strategy))
    }

    #[test]
    fn test_state_dedupes_pending_and_visited() {
        let mut state = CrawlState::new(id("001-01"));
        assert!(!state.enqueue(id("001-01")));
        assert!(state.enqueue(id("001-02")));
        assert!(!state.enqueue(id("001-02")));

        assert_eq!(state.next(), Some(id("001-01")));
        assert!(!state.enqueue(id("001-01")));
        assert_eq!(state.next(), Some(id("001-02")));
        assert_eq!(state.next(), None);
        assert!(state.is_done());
        assert_eq!(state.visited_len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_noise_is_never_enqueued() {
        let source = FakeSource::default().with("001-01", Doc::Text("LOT 999  24"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-01")).await;

        let seed = report.result_for(&id("001-01")).unwrap();
        assert_eq!(seed.enqueued, vec![id("001-24")]);
        assert_eq!(report.visited, ids(&["001-01", "001-24"]));
        assert_eq!(crawler.source().calls(), vec!["001-01", "001-24"]);
        assert_eq!(report.count(VisitOutcome::Absent), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cycle_terminates() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("see 02"))
            .with("001-02", Doc::Text("see 01"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-01")).await;

        assert_eq!(report.visited, ids(&["001-01", "001-02"]));
        assert_eq!(crawler.source().calls(), vec!["001-01", "001-02"]);
        assert_eq!(report.discovered_edges, 2);
        assert_eq!(report.count(VisitOutcome::Done), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_does_not_stop_crawl() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02 03"))
            .with("001-02", Doc::Text("04 05"))
            .with("001-03", Doc::Fail)
            .with("001-04", Doc::Text("01"))
            .with("001-05", Doc::Text("no references here"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-01")).await;

        assert_eq!(
            crawler.source().calls(),
            vec!["001-01", "001-02", "001-03", "001-04", "001-05"]
        );
        assert_eq!(report.visited.len(), 5);
        assert_eq!(report.count(VisitOutcome::Done), 4);
        let failures = report.failures();
        assert_eq!(failures.len(), 1);
        assert_eq!(failures[0].id, id("001-03"));
        assert!(failures[0].error.as_deref().unwrap().contains("connection reset"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_reference_is_not_retried() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02 03"))
            .with("001-02", Doc::Fail)
            .with("001-03", Doc::Text("02"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-01")).await;

        assert_eq!(crawler.source().calls(), vec!["001-01", "001-02", "001-03"]);
        assert_eq!(report.failures().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_self_reference_is_not_an_edge() {
        let source = FakeSource::default().with("001-07", Doc::Text("07 08 07"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-07")).await;

        let seed = report.result_for(&id("001-07")).unwrap();
        assert_eq!(seed.references, vec![id("001-08")]);
        assert_eq!(report.discovered_edges, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_references_stay_in_group() {
        let source = FakeSource::default().with("003-01", Doc::Text("12"));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("003-01")).await;

        assert_eq!(report.visited, ids(&["003-01", "003-12"]));
    }

    #[tokio::test(start_paused = true)]
    async fn test_empty_text_contributes_no_edges() {
        let source = FakeSource::default().with("001-01", Doc::Text(" "));
        let crawler = crawler(source);

        let report = crawler.crawl(&id("001-01")).await;

        let seed = report.result_for(&id("001-01")).unwrap();
        assert_eq!(seed.outcome, VisitOutcome::Done);
        assert!(seed.text_empty());
        assert_eq!(report.visited.len(), 1);
        assert_eq!(report.text_empty(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_network_requests_are_paced() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02"))
            .with("001-02", Doc::Text("03"))
            .with("001-03", Doc::Text(""));
        let crawler = crawler(source).with_delay(Duration::from_secs(2));

        let start = Instant::now();
        crawler.crawl(&id("001-01")).await;

        assert!(start.elapsed() >= Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_local_documents_are_not_paced() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02"))
            .with("001-02", Doc::Text("03"))
            .with("001-03", Doc::Text(""))
            .local("001-01")
            .local("001-02")
            .local("001-03");
        let crawler = crawler(source).with_delay(Duration::from_secs(2));

        let start = Instant::now();
        let report = crawler.crawl(&id("001-01")).await;

        assert!(start.elapsed() < Duration::from_secs(2));
        assert_eq!(report.cache_hits(), 3);
        assert_eq!(report.network_fetches(), 0);
        assert!(crawler.source().downloads().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_only_downloads_wait_for_the_pacer() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02"))
            .with("001-02", Doc::Text("03"))
            .with("001-03", Doc::Text(""))
            .local("001-02");
        let crawler = crawler(source).with_delay(Duration::from_secs(2));

        let start = Instant::now();
        let report = crawler.crawl(&id("001-01")).await;

        assert!(start.elapsed() >= Duration::from_secs(2));
        assert!(start.elapsed() < Duration::from_secs(4));
        assert_eq!(crawler.source().calls(), vec!["001-01", "001-02", "001-03"]);
        assert_eq!(crawler.source().downloads(), vec!["001-01", "001-03"]);
        assert_eq!(report.cache_hits(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_finds_unreferenced_maps() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("no refs"))
            .with("001-03", Doc::Text("07"))
            .with("001-07", Doc::Text(""))
            .with("001-09", Doc::Text(""));
        let crawler = crawler(source).with_sweep(Some(SweepConfig {
            enabled: true,
            max_index: 20,
            max_misses: 3,
        }));

        let report = crawler.crawl(&id("001-01")).await;

        assert_eq!(
            crawler.source().calls(),
            vec!["001-01", "001-02", "001-03", "001-07", "001-04", "001-05", "001-06"]
        );
        assert!(report.result_for(&id("001-03")).unwrap().via_sweep);
        assert!(!report.result_for(&id("001-07")).unwrap().via_sweep);
        assert!(!report.visited.contains(&id("001-09")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_sweep_counts_previous_finds() {
        let source = FakeSource::default()
            .with("001-01", Doc::Text("02"))
            .with("001-02", Doc::Text(""))
            .with("001-04", Doc::Text(""));
        let crawler = crawler(source).with_sweep(Some(SweepConfig {
            enabled: true,
            max_index: 10,
            max_misses: 2,
        }));

        let report = crawler.crawl(&id("001-01")).await;

        // 01 and 02 were crawled already, 03 misses, 04 is found, 05 and 06 end it.
        assert_eq!(
            crawler.source().calls(),
            vec!["001-01", "001-02", "001-03", "001-04", "001-05", "001-06"]
        );
        assert_eq!(report.count(VisitOutcome::Done), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_are_emitted() {
        let events: Arc<Mutex<Vec<String>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let source = FakeSource::default().with("001-01", Doc::Text("02"));
        let crawler = crawler(source).with_event_callback(Arc::new(move |event: &CrawlEvent| {
            let label = match event {
                CrawlEvent::Started { seed } => format!("start {}", seed),
                CrawlEvent::Fetching { id, .. } => format!("fetch {}", id),
                CrawlEvent::Visited(result) => format!("{:?} {}", result.outcome, result.id),
                CrawlEvent::SweepStarted { group } => format!("sweep {}", group),
                CrawlEvent::Finished { visited, .. } => format!("finished {}", visited),
            };
            sink.lock().unwrap().push(label);
        }));

        crawler.crawl(&id("001-01")).await;

        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "start 001-01",
                "fetch 001-01",
                "Done 001-01",
                "fetch 001-02",
                "Absent 001-02",
                "finished 2",
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_crawl_real_pdf_bytes() {
        let pdf = crate::text::tests::sample_pdf(&["LOT 252", "24", "45"]);
        let source = FakeSource::default().with("001-01", Doc::Bytes(pdf));
        let crawler = Crawler::new(source)
            .with_delay(Duration::from_millis(10))
            .with_extractor(TextExtractor::new().with_strategy(ContentStreamStrategy));

        let report = crawler.crawl(&id("001-01")).await;

        let seed = report.result_for(&id("001-01")).unwrap();
        assert_eq!(seed.strategy.as_deref(), Some("content-stream"));
        assert_eq!(seed.enqueued, vec![id("001-24"), id("001-45")]);
    }
}
