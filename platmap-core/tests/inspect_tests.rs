// Tests for offline reference inspection

use platmap_core::inspect::{infer_group, inspect_document, inspect_file};
use platmap_scanner::error::Result;
use platmap_scanner::{ExtractionStrategy, ReferencePolicy, TextExtractor};
use std::path::Path;
use tempfile::TempDir;

struct Utf8Strategy;

impl ExtractionStrategy for Utf8Strategy {
    fn name(&self) -> &'static str {
        "utf8"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        Ok(String::from_utf8_lossy(bytes).into_owned())
    }
}

fn extractor() -> TextExtractor {
    TextExtractor::new().with_strategy(Utf8Strategy)
}

#[test]
fn test_infer_group_from_file_name() {
    assert_eq!(infer_group(Path::new("maps/002-07.pdf"), None).unwrap(), "002");
}

#[test]
fn test_explicit_group_wins() {
    assert_eq!(
        infer_group(Path::new("maps/002-07.pdf"), Some("006")).unwrap(),
        "006"
    );
}

#[test]
fn test_infer_group_needs_a_hint() {
    assert!(infer_group(Path::new("download.pdf"), None).is_err());
    assert!(infer_group(Path::new("download.pdf"), Some("12")).is_err());
}

#[test]
fn test_inspect_document_splits_accepted_and_rejected() {
    let text = b"BLOCK 07 LOT 252 9 45 100 24 24";
    let inspection =
        inspect_document(text, "001", &ReferencePolicy::default(), &extractor()).unwrap();

    assert_eq!(inspection.strategy, Some("utf8"));
    assert_eq!(
        inspection.digit_runs,
        vec!["07", "252", "9", "45", "100", "24", "24"]
    );
    assert_eq!(inspection.rejected, vec!["252", "9", "100"]);

    let refs: Vec<String> = inspection.references.iter().map(|id| id.render()).collect();
    assert_eq!(refs, vec!["001-07", "001-24", "001-45"]);
}

#[test]
fn test_inspect_document_with_no_text() {
    let inspection = inspect_document(
        b"",
        "001",
        &ReferencePolicy::default(),
        &extractor(),
    )
    .unwrap();

    assert!(inspection.strategy.is_none());
    assert!(inspection.references.is_empty());
}

#[test]
fn test_inspect_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("003-02.pdf");
    std::fs::write(&path, "01 03 12").unwrap();

    let group = infer_group(&path, None).unwrap();
    let policy = ReferencePolicy {
        max: 10,
        ..Default::default()
    };
    let inspection = inspect_file(&path, &group, &policy, &extractor()).unwrap();

    let refs: Vec<String> = inspection.references.iter().map(|id| id.render()).collect();
    assert_eq!(refs, vec!["003-01", "003-03"]);
    assert_eq!(inspection.rejected, vec!["12"]);
}

#[test]
fn test_inspect_missing_file() {
    let result = inspect_file(
        Path::new("/no/such/001-01.pdf"),
        "001",
        &ReferencePolicy::default(),
        &extractor(),
    );
    assert!(result.is_err());
}
