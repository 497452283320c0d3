//! Best-effort text extraction from plat-map PDFs.
//!
//! Scanned maps carry a sparse and sometimes broken text layer, so extraction
//! runs an ordered list of strategies and keeps the first result that has
//! enough text to be worth filtering. Failing strategies (including panics
//! inside third-party parsers) only move on to the next one.

use crate::error::{Result, ScanError};
use lopdf::Document;
use lopdf::content::Content;
use lopdf::Object;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::process::Command;
use tracing::{debug, warn};

/// Trimmed character count below which a strategy result is treated as empty.
pub const DEFAULT_MIN_TEXT_LEN: usize = 2;

/// One way of turning document bytes into text.
pub trait ExtractionStrategy: Send + Sync {
    /// Short name used in logs and visit results.
    fn name(&self) -> &'static str;

    fn extract(&self, bytes: &[u8]) -> Result<String>;
}

/// Text produced by a [`TextExtractor`] and the strategy that produced it.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Extraction {
    pub text: String,
    pub strategy: Option<&'static str>,
}

impl Extraction {
    /// True when every strategy was exhausted without usable text.
    pub fn is_empty(&self) -> bool {
        self.strategy.is_none()
    }
}

/// Ordered chain of extraction strategies.
pub struct TextExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    min_len: usize,
}

impl TextExtractor {
    /// An extractor with no strategies; add them with [`with_strategy`](Self::with_strategy).
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
            min_len: DEFAULT_MIN_TEXT_LEN,
        }
    }

    pub fn with_strategy<S>(mut self, strategy: S) -> Self
    where
        S: ExtractionStrategy + 'static,
    {
        self.strategies.push(Box::new(strategy));
        self
    }

    pub fn with_min_len(mut self, min_len: usize) -> Self {
        self.min_len = min_len;
        self
    }

    pub fn strategy_names(&self) -> Vec<&'static str> {
        self.strategies.iter().map(|s| s.name()).collect()
    }

    pub fn extract(&self, bytes: &[u8]) -> Extraction {
        for strategy in &self.strategies {
            let name = strategy.name();
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| strategy.extract(bytes)));

            match outcome {
                Ok(Ok(text)) if text.trim().chars().count() >= self.min_len => {
                    debug!("{} produced {} bytes of text", name, text.len());
                    return Extraction {
                        text,
                        strategy: Some(name),
                    };
                }
                Ok(Ok(text)) => {
                    debug!(
                        "{} produced only {} usable chars, trying next strategy",
                        name,
                        text.trim().chars().count()
                    );
                }
                Ok(Err(e)) => debug!("{} failed: {}", name, e),
                Err(_) => warn!("{} panicked while parsing document", name),
            }
        }

        Extraction::default()
    }
}

impl Default for TextExtractor {
    fn default() -> Self {
        let extractor = Self::new();
        #[cfg(feature = "pdf_extract")]
        let extractor = extractor.with_strategy(PdfExtractStrategy);
        extractor
            .with_strategy(LopdfPageStrategy)
            .with_strategy(ContentStreamStrategy)
            .with_strategy(PdftotextStrategy::default())
    }
}

/// Whole-document text layer via the `pdf-extract` crate.
#[cfg(feature = "pdf_extract")]
pub struct PdfExtractStrategy;

#[cfg(feature = "pdf_extract")]
impl ExtractionStrategy for PdfExtractStrategy {
    fn name(&self) -> &'static str {
        "pdf-extract"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        pdf_extract::extract_text_from_mem(bytes).map_err(|e| ScanError::StrategyFailed {
            strategy: self.name(),
            reason: format!("{:?}", e),
        })
    }
}

/// Page-by-page text via `lopdf`; a page that fails to decode is skipped.
pub struct LopdfPageStrategy;

impl ExtractionStrategy for LopdfPageStrategy {
    fn name(&self) -> &'static str {
        "lopdf-pages"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let doc = load_document(self.name(), bytes)?;
        let mut text = String::new();

        for page in doc.get_pages().keys() {
            match doc.extract_text(&[*page]) {
                Ok(page_text) => {
                    text.push_str(&page_text);
                    text.push('\n');
                }
                Err(e) => debug!("lopdf could not extract page {}: {}", page, e),
            }
        }

        Ok(text)
    }
}

/// Walks each page's content stream and collects the string operands of the
/// text-showing operators, one span at a time. Works on documents whose font
/// tables are too damaged for the layout-aware extractors.
pub struct ContentStreamStrategy;

impl ExtractionStrategy for ContentStreamStrategy {
    fn name(&self) -> &'static str {
        "content-stream"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let doc = load_document(self.name(), bytes)?;
        let mut spans: Vec<String> = Vec::new();

        for page_id in doc.get_pages().into_values() {
            let raw = match doc.get_page_content(page_id) {
                Ok(raw) => raw,
                Err(e) => {
                    debug!("no content stream for page {:?}: {}", page_id, e);
                    continue;
                }
            };
            let content = match Content::decode(&raw) {
                Ok(content) => content,
                Err(e) => {
                    debug!("undecodable content stream for page {:?}: {}", page_id, e);
                    continue;
                }
            };

            for op in &content.operations {
                match op.operator.as_str() {
                    "Tj" | "'" => spans.extend(op.operands.iter().filter_map(string_operand)),
                    "\"" => spans.extend(op.operands.last().and_then(string_operand)),
                    "TJ" => {
                        for operand in &op.operands {
                            if let Object::Array(items) = operand {
                                let joined: String =
                                    items.iter().filter_map(string_operand).collect();
                                spans.push(joined);
                            }
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(spans.join(" "))
    }
}

/// Shells out to poppler's `pdftotext -layout`. Fails cleanly when the tool
/// is not installed.
pub struct PdftotextStrategy {
    binary: String,
}

impl PdftotextStrategy {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }
}

impl Default for PdftotextStrategy {
    fn default() -> Self {
        Self::new("pdftotext")
    }
}

impl ExtractionStrategy for PdftotextStrategy {
    fn name(&self) -> &'static str {
        "pdftotext"
    }

    fn extract(&self, bytes: &[u8]) -> Result<String> {
        let mut input = tempfile::Builder::new().suffix(".pdf").tempfile()?;
        input.write_all(bytes)?;
        input.flush()?;

        let output = Command::new(&self.binary)
            .arg("-layout")
            .arg(input.path())
            .arg("-")
            .output();

        match output {
            Ok(output) if output.status.success() => {
                Ok(String::from_utf8_lossy(&output.stdout).into_owned())
            }
            Ok(output) => Err(ScanError::StrategyFailed {
                strategy: self.name(),
                reason: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ScanError::StrategyFailed {
                strategy: self.name(),
                reason: format!("{} is not installed", self.binary),
            }),
            Err(e) => Err(e.into()),
        }
    }
}

fn load_document(strategy: &'static str, bytes: &[u8]) -> Result<Document> {
    Document::load_mem(bytes).map_err(|e| ScanError::StrategyFailed {
        strategy,
        reason: e.to_string(),
    })
}

fn string_operand(object: &Object) -> Option<String> {
    match object {
        Object::String(bytes, _) => Some(decode_pdf_string(bytes)),
        _ => None,
    }
}

/// UTF-16BE when the string carries a byte-order mark, Latin-1 otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(utf16) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = utf16
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        String::from_utf16_lossy(&units)
    } else {
        bytes.iter().map(|&b| b as char).collect()
    }
}
