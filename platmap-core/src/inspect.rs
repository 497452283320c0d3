//! Offline reference inspection of a single document, without any network
//! access. Used to check what a crawl would pick up from a given map.

use anyhow::{Context, Result};
use platmap_scanner::references::digit_runs;
use platmap_scanner::{MapId, ReferencePolicy, TextExtractor};
use serde::Serialize;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct Inspection {
    pub group: String,
    pub strategy: Option<&'static str>,
    pub text_chars: usize,
    /// Every word-bounded digit run, before filtering.
    pub digit_runs: Vec<String>,
    /// Runs the reference policy turned down.
    pub rejected: Vec<String>,
    /// Runs accepted as references, expanded into the document's group.
    pub references: Vec<MapId>,
}

/// Group to expand references into: explicit, else taken from a canonical
/// file name such as `002-07.pdf`.
pub fn infer_group(path: &Path, explicit: Option<&str>) -> Result<String> {
    if let Some(group) = explicit {
        let id = MapId::new(group, 1).with_context(|| format!("Invalid group {:?}", group))?;
        return Ok(id.group().to_string());
    }

    path.file_name()
        .and_then(|name| name.to_str())
        .and_then(MapId::from_file_name)
        .map(|id| id.group().to_string())
        .with_context(|| {
            format!(
                "Cannot tell the group of {}; pass it explicitly",
                path.display()
            )
        })
}

pub fn inspect_document(
    bytes: &[u8],
    group: &str,
    policy: &ReferencePolicy,
    extractor: &TextExtractor,
) -> Result<Inspection> {
    let extraction = extractor.extract(bytes);
    let runs: Vec<String> = digit_runs(&extraction.text).map(str::to_string).collect();

    let rejected = runs
        .iter()
        .filter(|run| policy.classify(run).is_none())
        .cloned()
        .collect();

    let mut references = Vec::new();
    for candidate in policy.filter_tokens(runs.iter().map(String::as_str)) {
        references.push(MapId::expand(candidate, group)?);
    }

    Ok(Inspection {
        group: group.to_string(),
        strategy: extraction.strategy,
        text_chars: extraction.text.trim().chars().count(),
        digit_runs: runs,
        rejected,
        references,
    })
}

pub fn inspect_file(
    path: &Path,
    group: &str,
    policy: &ReferencePolicy,
    extractor: &TextExtractor,
) -> Result<Inspection> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    inspect_document(&bytes, group, policy, extractor)
}
