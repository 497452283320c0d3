use crate::report::RunSummary;
use anyhow::{Context, Result};
use chrono::Utc;
use indicatif::{ProgressBar, ProgressStyle};
use platmap_scanner::{
    CrawlConfig, CrawlEvent, Crawler, EventCallback, HttpFetcher, MapId, TextExtractor,
    VisitOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Known communities of the county and the first map of each group.
pub const COMMUNITY_SEEDS: &[(&str, &str)] = &[
    ("001-01", "Goldfield"),
    ("002-01", "Silver Peak"),
    ("003-01", "Gold Point"),
    ("004-01", "Lida"),
    ("006-01", "Lida"),
    ("007-01", "Dyer"),
];

pub fn community_seeds() -> Vec<MapId> {
    COMMUNITY_SEEDS
        .iter()
        .filter_map(|(raw, _)| MapId::parse(raw).ok())
        .collect()
}

/// Community name for a group number, if it is a known one.
pub fn community_name(group: &str) -> Option<&'static str> {
    COMMUNITY_SEEDS
        .iter()
        .find(|(raw, _)| raw.split('-').next() == Some(group))
        .map(|(_, name)| *name)
}

/// Options for configuring a crawl run
pub struct CrawlOptions {
    pub config: CrawlConfig,
    /// Replaces the default PDF extraction chain.
    pub extractor: Option<TextExtractor>,
    pub show_progress_bars: bool,
}

impl CrawlOptions {
    pub fn new(config: CrawlConfig) -> Self {
        Self {
            config,
            extractor: None,
            show_progress_bars: false,
        }
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

fn describe(event: &CrawlEvent) -> Option<String> {
    match event {
        CrawlEvent::Fetching {
            id,
            visited,
            pending,
        } => Some(format!(
            "Fetching {}... {} visited, {} pending",
            id, visited, pending
        )),
        CrawlEvent::SweepStarted { group } => Some(format!("Sweeping group {}...", group)),
        CrawlEvent::Visited(result) if result.outcome == VisitOutcome::Failed => Some(format!(
            "{} failed: {}",
            result.id,
            result.error.as_deref().unwrap_or("unknown error")
        )),
        _ => None,
    }
}

/// Execute a crawl over every configured seed, one after another.
/// All seeds share one fetcher, so the request delay holds across them.
pub async fn execute_crawl(
    options: CrawlOptions,
    progress_callback: Option<CrawlProgressCallback>,
) -> Result<RunSummary> {
    let CrawlOptions {
        config,
        extractor,
        show_progress_bars,
    } = options;

    config.validate().context("Invalid crawl configuration")?;
    let seeds = config.seeds()?;
    let fetcher = HttpFetcher::from_config(&config).with_context(|| {
        format!(
            "Failed to prepare output directory {}",
            config.output_dir.display()
        )
    })?;

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new_spinner();
        pb.set_style(ProgressStyle::default_spinner().template("{spinner:.cyan} {msg}")?);
        pb.enable_steady_tick(Duration::from_millis(120));
        pb.set_message("Starting crawl...");
        Some(pb)
    } else {
        None
    };

    let pb_events = progress_bar.clone();
    let events: EventCallback = Arc::new(move |event: &CrawlEvent| {
        if let (Some(pb), Some(message)) = (&pb_events, describe(event)) {
            pb.set_message(message);
        }
    });

    let mut crawler = Crawler::from_config(fetcher, &config).with_event_callback(events);
    if let Some(extractor) = extractor {
        crawler = crawler.with_extractor(extractor);
    }

    let started_at = Utc::now();
    let mut reports = Vec::with_capacity(seeds.len());

    for (idx, seed) in seeds.iter().enumerate() {
        if let Some(ref callback) = progress_callback
            && seeds.len() > 1
        {
            callback(format!(
                "Crawling group {}/{}: {}",
                idx + 1,
                seeds.len(),
                seed
            ));
        }

        let report = crawler.crawl(seed).await;
        if !report.failures().is_empty() {
            warn!(
                "{} map(s) from seed {} could not be fetched",
                report.failures().len(),
                seed
            );
        }
        reports.push(report);
    }

    if let Some(pb) = progress_bar {
        pb.finish_and_clear();
    }

    let summary = RunSummary {
        started_at,
        finished_at: Utc::now(),
        output_dir: config.output_dir.clone(),
        reports,
    };
    info!(
        "Crawl finished: {} maps retrieved, {} absent, {} failed",
        summary.totals().retrieved,
        summary.totals().absent,
        summary.totals().failed
    );

    Ok(summary)
}
