use crate::fetcher::Origin;
use crate::identifier::MapId;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Terminal state of one identifier in a crawl.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VisitOutcome {
    /// Document obtained and scanned for references.
    Done,
    /// The server has no such map.
    Absent,
    /// Transport failure; not retried within the run.
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisitResult {
    pub id: MapId,
    pub outcome: VisitOutcome,
    pub origin: Option<Origin>,
    /// Extraction strategy that produced usable text, if any.
    pub strategy: Option<String>,
    /// Maps referenced by this document (edges of the discovery graph).
    pub references: Vec<MapId>,
    /// The subset of `references` that was new to the frontier.
    pub enqueued: Vec<MapId>,
    pub error: Option<String>,
    /// Found by the index sweep rather than by a printed reference.
    pub via_sweep: bool,
}

impl VisitResult {
    pub fn done(id: MapId, origin: Origin) -> Self {
        Self {
            origin: Some(origin),
            ..Self::blank(id, VisitOutcome::Done)
        }
    }

    pub fn absent(id: MapId) -> Self {
        Self::blank(id, VisitOutcome::Absent)
    }

    pub fn failed(id: MapId, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::blank(id, VisitOutcome::Failed)
        }
    }

    fn blank(id: MapId, outcome: VisitOutcome) -> Self {
        Self {
            id,
            outcome,
            origin: None,
            strategy: None,
            references: Vec::new(),
            enqueued: Vec::new(),
            error: None,
            via_sweep: false,
        }
    }

    /// A document was obtained but no strategy found text in it.
    pub fn text_empty(&self) -> bool {
        self.outcome == VisitOutcome::Done && self.strategy.is_none()
    }
}

/// Everything learned from crawling one seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlReport {
    pub seed: MapId,
    /// Results in processing order.
    pub results: Vec<VisitResult>,
    pub visited: BTreeSet<MapId>,
    pub discovered_edges: usize,
}

impl CrawlReport {
    pub fn count(&self, outcome: VisitOutcome) -> usize {
        self.results.iter().filter(|r| r.outcome == outcome).count()
    }

    /// Maps whose bytes were obtained this run, from the server or the
    /// local store. A download whose save failed still counts.
    pub fn retrieved(&self) -> Vec<&MapId> {
        self.results
            .iter()
            .filter(|r| r.outcome == VisitOutcome::Done)
            .map(|r| &r.id)
            .collect()
    }

    pub fn failures(&self) -> Vec<&VisitResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == VisitOutcome::Failed)
            .collect()
    }

    pub fn network_fetches(&self) -> usize {
        self.from_origin(Origin::Network)
    }

    pub fn cache_hits(&self) -> usize {
        self.from_origin(Origin::LocalStore)
    }

    pub fn text_empty(&self) -> usize {
        self.results.iter().filter(|r| r.text_empty()).count()
    }

    pub fn result_for(&self, id: &MapId) -> Option<&VisitResult> {
        self.results.iter().find(|r| &r.id == id)
    }

    fn from_origin(&self, origin: Origin) -> usize {
        self.results
            .iter()
            .filter(|r| r.origin == Some(origin))
            .count()
    }
}

/// Progress notifications emitted while crawling.
#[derive(Debug, Clone)]
pub enum CrawlEvent {
    Started { seed: MapId },
    Fetching { id: MapId, visited: usize, pending: usize },
    Visited(VisitResult),
    SweepStarted { group: String },
    Finished { seed: MapId, visited: usize },
}

pub type EventCallback = Arc<dyn Fn(&CrawlEvent) + Send + Sync>;
