//! Cross-reference detection in extracted map text.
//!
//! Adjacent maps are printed as small circled two-digit numbers. Lot numbers
//! in this county are three or more digits and single digits are never used
//! as references, so the filter below keeps only word-bounded digit runs of
//! the configured width whose value falls inside the configured range.

use crate::error::{Result, ScanError};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::LazyLock;

static DIGIT_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]+\b").expect("digit run pattern is valid"));

/// Which digit runs count as map references.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReferencePolicy {
    /// Exact number of digits a reference is printed with.
    pub digits: usize,
    /// Smallest accepted value (inclusive).
    pub min: u32,
    /// Largest accepted value (inclusive).
    pub max: u32,
}

impl Default for ReferencePolicy {
    fn default() -> Self {
        Self {
            digits: 2,
            min: 1,
            max: 50,
        }
    }
}

/// A digit run found in document text, before classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub value: u64,
    pub digits: usize,
}

impl Candidate {
    /// Returns `None` unless the token is a pure ASCII digit run.
    pub fn from_token(token: &str) -> Option<Self> {
        if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        // Runs too long for u64 are lot/parcel noise; saturate rather than drop
        // so the digit count still decides.
        let value = token.parse::<u64>().unwrap_or(u64::MAX);
        Some(Self {
            value,
            digits: token.len(),
        })
    }
}

impl ReferencePolicy {
    pub fn validate(&self) -> Result<()> {
        if self.digits == 0 {
            return Err(ScanError::Config(
                "reference digit count must be at least 1".to_string(),
            ));
        }
        if self.min > self.max {
            return Err(ScanError::Config(format!(
                "reference range is empty ({} > {})",
                self.min, self.max
            )));
        }
        Ok(())
    }

    pub fn accepts(&self, candidate: &Candidate) -> bool {
        candidate.digits == self.digits
            && (u64::from(self.min)..=u64::from(self.max)).contains(&candidate.value)
    }

    /// Classify a single token, returning the reference index if accepted.
    pub fn classify(&self, token: &str) -> Option<u32> {
        Candidate::from_token(token)
            .filter(|c| self.accepts(c))
            .map(|c| c.value as u32)
    }

    /// Deduplicated references among pre-split tokens.
    pub fn filter_tokens<'a, I>(&self, tokens: I) -> BTreeSet<u32>
    where
        I: IntoIterator<Item = &'a str>,
    {
        tokens.into_iter().filter_map(|t| self.classify(t)).collect()
    }

    /// Deduplicated references found anywhere in `text`.
    pub fn extract(&self, text: &str) -> BTreeSet<u32> {
        self.filter_tokens(digit_runs(text))
    }
}

/// Word-bounded digit runs in `text`, in order of appearance.
pub fn digit_runs(text: &str) -> impl Iterator<Item = &str> {
    DIGIT_RUN.find_iter(text).map(|m| m.as_str())
}

/// Extract references with the default county policy.
pub fn extract_references(text: &str) -> BTreeSet<u32> {
    ReferencePolicy::default().extract(text)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_tokens_keeps_two_digit_in_range() {
        let policy = ReferencePolicy::default();
        let found = policy.filter_tokens(["07", "252", "9", "45", "100"]);
        assert_eq!(found, BTreeSet::from([7, 45]));
    }

    #[test]
    fn test_range_boundaries() {
        let policy = ReferencePolicy::default();
        assert_eq!(policy.classify("00"), None);
        assert_eq!(policy.classify("01"), Some(1));
        assert_eq!(policy.classify("50"), Some(50));
        assert_eq!(policy.classify("51"), None);
        assert_eq!(policy.classify("99"), None);
    }

    #[test]
    fn test_rejects_by_digit_count() {
        let policy = ReferencePolicy::default();
        assert_eq!(policy.classify("5"), None);
        assert_eq!(policy.classify("024"), None);
        assert_eq!(policy.classify("123456789012345678901234567890"), None);
    }

    #[test]
    fn test_rejects_non_digit_tokens() {
        let policy = ReferencePolicy::default();
        assert_eq!(policy.classify(""), None);
        assert_eq!(policy.classify("2a"), None);
        assert_eq!(policy.classify("-2"), None);
        assert_eq!(policy.classify(" 12"), None);
    }

    #[test]
    fn test_extract_from_text_deduplicates() {
        let text = "LOT 252  BLOCK 9\n(24) (24) see map 45, 24\nPAGE 100";
        assert_eq!(extract_references(text), BTreeSet::from([24, 45]));
    }

    #[test]
    fn test_extract_ignores_digits_glued_to_letters() {
        assert!(extract_references("A24 B3 N12E").is_empty());
    }

    #[test]
    fn test_extract_from_full_identifier() {
        // Only the index half of a printed identifier survives the filter.
        assert_eq!(extract_references("see 001-24"), BTreeSet::from([24]));
    }

    #[test]
    fn test_extract_empty_text() {
        assert!(extract_references("").is_empty());
    }

    #[test]
    fn test_custom_policy() {
        let policy = ReferencePolicy {
            digits: 2,
            min: 1,
            max: 99,
        };
        assert_eq!(policy.extract("75 150 5"), BTreeSet::from([75]));
    }

    #[test]
    fn test_validate() {
        assert!(ReferencePolicy::default().validate().is_ok());
        assert!(
            ReferencePolicy {
                digits: 0,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
        assert!(
            ReferencePolicy {
                min: 60,
                max: 50,
                ..Default::default()
            }
            .validate()
            .is_err()
        );
    }

    #[test]
    fn test_digit_runs() {
        let runs: Vec<&str> = digit_runs("12 x 345,6").collect();
        assert_eq!(runs, vec!["12", "345", "6"]);
    }
}
