pub mod config;
pub mod crawler;
pub mod error;
pub mod fetcher;
pub mod identifier;
pub mod references;
pub mod result;
pub mod store;
pub mod text;

pub use config::{CrawlConfig, SweepConfig};
pub use crawler::{CrawlState, Crawler};
pub use error::ScanError;
pub use fetcher::{DocumentSource, FetchedDocument, HttpFetcher, Origin};
pub use identifier::MapId;
pub use references::ReferencePolicy;
pub use result::{CrawlEvent, CrawlReport, EventCallback, VisitOutcome, VisitResult};
pub use store::DocumentStore;
pub use text::{ExtractionStrategy, TextExtractor};
