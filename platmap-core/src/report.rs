// Run reports and local store inventory

use crate::crawl::community_name;
use chrono::{DateTime, Utc};
use platmap_scanner::error::Result;
use platmap_scanner::{CrawlReport, DocumentStore, MapId, VisitOutcome};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

const DIVIDER: &str =
    "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Text,
    Json,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "text" | "txt" => Some(ReportFormat::Text),
            "json" => Some(ReportFormat::Json),
            _ => None,
        }
    }
}

/// Result of one `crawl` invocation, covering every seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub output_dir: PathBuf,
    pub reports: Vec<CrawlReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Totals {
    /// Distinct maps visited across all seeds.
    pub visited: usize,
    pub retrieved: usize,
    pub absent: usize,
    pub failed: usize,
    pub network_fetches: usize,
    pub cache_hits: usize,
    pub text_empty: usize,
    pub discovered_edges: usize,
}

impl RunSummary {
    pub fn totals(&self) -> Totals {
        let visited: BTreeSet<&MapId> = self.reports.iter().flat_map(|r| &r.visited).collect();
        let totals = Totals {
            visited: visited.len(),
            ..Default::default()
        };
        self.reports.iter().fold(totals, |mut t, r| {
            t.retrieved += r.count(VisitOutcome::Done);
            t.absent += r.count(VisitOutcome::Absent);
            t.failed += r.count(VisitOutcome::Failed);
            t.network_fetches += r.network_fetches();
            t.cache_hits += r.cache_hits();
            t.text_empty += r.text_empty();
            t.discovered_edges += r.discovered_edges;
            t
        })
    }

    pub fn duration_seconds(&self) -> i64 {
        (self.finished_at - self.started_at).num_seconds()
    }
}

fn section(report: &mut String, title: &str) {
    report.push_str(DIVIDER);
    report.push_str(title);
    report.push('\n');
    report.push_str(DIVIDER);
    report.push('\n');
}

fn join_ids<'a>(ids: impl IntoIterator<Item = &'a MapId>) -> String {
    let rendered: Vec<String> = ids.into_iter().map(MapId::render).collect();
    if rendered.is_empty() {
        "-".to_string()
    } else {
        rendered.join(", ")
    }
}

fn group_label(group: &str) -> String {
    match community_name(group) {
        Some(name) => format!("{} ({})", group, name),
        None => group.to_string(),
    }
}

pub fn generate_text_report(summary: &RunSummary) -> String {
    let mut report = String::new();

    report.push_str(DIVIDER);
    report.push_str("                          PLAT MAP CRAWL REPORT\n");
    report.push_str(DIVIDER);
    report.push('\n');

    let totals = summary.totals();
    report.push_str(&format!(
        "Started:      {}\n",
        summary.started_at.format("%Y-%m-%d %H:%M:%S UTC")
    ));
    report.push_str(&format!("Duration:     {} seconds\n", summary.duration_seconds()));
    report.push_str(&format!("Output:       {}\n", summary.output_dir.display()));
    report.push_str(&format!(
        "Seeds:        {}\n\n",
        join_ids(summary.reports.iter().map(|r| &r.seed))
    ));

    section(&mut report, "SUMMARY");
    report.push_str(&format!("Maps visited:      {}\n", totals.visited));
    report.push_str(&format!("Retrieved:         {}\n", totals.retrieved));
    report.push_str(&format!("  downloaded:      {}\n", totals.network_fetches));
    report.push_str(&format!("  already stored:  {}\n", totals.cache_hits));
    report.push_str(&format!("Absent on server:  {}\n", totals.absent));
    report.push_str(&format!("Failed:            {}\n", totals.failed));
    report.push_str(&format!("No readable text:  {}\n", totals.text_empty));
    report.push_str(&format!("References found:  {}\n\n", totals.discovered_edges));

    for crawl in &summary.reports {
        section(
            &mut report,
            &format!("GROUP {} - seed {}", group_label(crawl.seed.group()), crawl.seed),
        );
        report.push_str(&format!("Retrieved: {}\n", join_ids(crawl.retrieved())));

        let absent: Vec<&MapId> = crawl
            .results
            .iter()
            .filter(|r| r.outcome == VisitOutcome::Absent)
            .map(|r| &r.id)
            .collect();
        report.push_str(&format!("Absent:    {}\n", join_ids(absent)));

        let swept: Vec<&MapId> = crawl
            .results
            .iter()
            .filter(|r| r.via_sweep && r.outcome == VisitOutcome::Done)
            .map(|r| &r.id)
            .collect();
        if !swept.is_empty() {
            report.push_str(&format!("Swept:     {}\n", join_ids(swept)));
        }

        let unreadable: Vec<&MapId> = crawl
            .results
            .iter()
            .filter(|r| r.text_empty())
            .map(|r| &r.id)
            .collect();
        if !unreadable.is_empty() {
            report.push_str(&format!("No text:   {}\n", join_ids(unreadable)));
        }

        for failure in crawl.failures() {
            report.push_str(&format!(
                "Failed:    {} ({})\n",
                failure.id,
                failure.error.as_deref().unwrap_or("unknown error")
            ));
        }
        report.push('\n');
    }

    report.push_str(DIVIDER);
    report.push_str("                              End of Report\n");
    report.push_str(DIVIDER);

    report
}

pub fn generate_json_report(summary: &RunSummary) -> std::result::Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "report": {
            "metadata": {
                "generator": "platmap",
                "version": env!("CARGO_PKG_VERSION"),
                "generated_at": Utc::now().to_rfc3339(),
                "format": "json"
            },
            "run": {
                "started_at": summary.started_at.to_rfc3339(),
                "finished_at": summary.finished_at.to_rfc3339(),
                "duration_seconds": summary.duration_seconds(),
                "output_dir": summary.output_dir
            },
            "summary": summary.totals(),
            "crawls": summary.reports
        }
    });

    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

/// Maps already held in the local store, grouped by community.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    pub root: PathBuf,
    pub groups: BTreeMap<String, Vec<MapId>>,
}

impl Inventory {
    pub fn total(&self) -> usize {
        self.groups.values().map(Vec::len).sum()
    }

    /// Indices between 1 and the highest stored index that are not stored.
    pub fn gaps(&self, group: &str) -> Vec<u8> {
        let Some(ids) = self.groups.get(group) else {
            return Vec::new();
        };
        let highest = ids.iter().map(MapId::index).max().unwrap_or(0);
        (1..highest)
            .filter(|i| !ids.iter().any(|id| id.index() == *i))
            .collect()
    }
}

pub fn inventory(store: &DocumentStore) -> Result<Inventory> {
    let mut groups: BTreeMap<String, Vec<MapId>> = BTreeMap::new();
    for id in store.list()? {
        groups.entry(id.group().to_string()).or_default().push(id);
    }
    Ok(Inventory {
        root: store.root().to_path_buf(),
        groups,
    })
}

pub fn generate_inventory_report(inventory: &Inventory) -> String {
    let mut report = String::new();
    section(
        &mut report,
        &format!("LOCAL PLAT MAPS - {}", inventory.root.display()),
    );

    if inventory.groups.is_empty() {
        report.push_str("No plat maps stored yet.\n");
        return report;
    }

    for (group, ids) in &inventory.groups {
        report.push_str(&format!("{}: {} map(s)\n", group_label(group), ids.len()));
        report.push_str(&format!("    {}\n", join_ids(ids)));
        let gaps = inventory.gaps(group);
        if !gaps.is_empty() {
            let rendered: Vec<String> = gaps.iter().map(|i| format!("{:02}", i)).collect();
            report.push_str(&format!("    missing: {}\n", rendered.join(", ")));
        }
    }
    report.push_str(&format!("\nTotal: {} map(s)\n", inventory.total()));

    report
}
