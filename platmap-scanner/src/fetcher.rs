use crate::config::CrawlConfig;
use crate::error::{Result, ScanError};
use crate::identifier::MapId;
use crate::store::DocumentStore;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::Url;

/// Path of the plat-map folder below the site root.
pub const PLATMAP_PATH: &str = "PropertyImages/Platmaps/";

/// Where the bytes of a fetched document came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Origin {
    Network,
    LocalStore,
}

#[derive(Debug, Clone)]
pub struct FetchedDocument {
    pub id: MapId,
    pub bytes: Vec<u8>,
    pub origin: Origin,
}

/// Anything that can produce the bytes of a map document.
///
/// The crawler asks `load_stored` first and only calls `fetch` (paced) when
/// it yields nothing. `fetch` returns [`ScanError::DocumentAbsent`] when the
/// map does not exist and [`ScanError::FetchFailed`] for any other failure.
#[async_trait]
pub trait DocumentSource: Send + Sync {
    /// A readable copy of `id` that needs no request to the server.
    async fn load_stored(&self, _id: &MapId) -> Option<FetchedDocument> {
        None
    }

    /// Retrieve `id` from the server.
    async fn fetch(&self, id: &MapId) -> Result<FetchedDocument>;
}

/// Retrieval address of a map: `{base}/PropertyImages/Platmaps/{IDENTIFIER}.pdf`.
pub fn document_url(base: &Url, id: &MapId) -> Result<Url> {
    base.join(&format!("{}{}", PLATMAP_PATH, id.file_name()))
        .map_err(|e| ScanError::InvalidUrl(format!("{} for {}: {}", base, id, e)))
}

/// Downloads maps over HTTP and keeps them in a [`DocumentStore`].
pub struct HttpFetcher {
    client: Client,
    base_url: Url,
    store: DocumentStore,
}

impl HttpFetcher {
    pub fn new(base_url: Url, store: DocumentStore, timeout: Duration, user_agent: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(user_agent)
            .timeout(timeout)
            .connect_timeout(timeout / 2)
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self {
            client,
            base_url,
            store,
        })
    }

    /// Builds the fetcher and opens (creating if needed) the output directory.
    pub fn from_config(config: &CrawlConfig) -> Result<Self> {
        let store = DocumentStore::open(&config.output_dir)?;
        Self::new(config.base_url()?, store, config.timeout(), &config.user_agent)
    }

    pub fn store(&self) -> &DocumentStore {
        &self.store
    }

    async fn download(&self, id: &MapId) -> Result<Vec<u8>> {
        let url = document_url(&self.base_url, id)?;
        info!("Downloading {} from {}", id, url);

        let failed = |reason: String| ScanError::FetchFailed {
            id: id.render(),
            reason,
        };

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| failed(e.to_string()))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(ScanError::DocumentAbsent(id.render()));
        }
        if !status.is_success() {
            return Err(failed(format!("HTTP {}", status)));
        }

        let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}

#[async_trait]
impl DocumentSource for HttpFetcher {
    async fn load_stored(&self, id: &MapId) -> Option<FetchedDocument> {
        if !self.store.contains(id) {
            return None;
        }
        match self.store.load(id).await {
            Ok(bytes) => {
                info!("Skipping download of {} - already stored", id);
                Some(FetchedDocument {
                    id: id.clone(),
                    bytes,
                    origin: Origin::LocalStore,
                })
            }
            Err(e) => {
                warn!("Stored copy of {} is unreadable ({}), downloading again", id, e);
                None
            }
        }
    }

    async fn fetch(&self, id: &MapId) -> Result<FetchedDocument> {
        let bytes = self.download(id).await?;
        match self.store.save(id, &bytes).await {
            Ok(path) => debug!("Saved {} to {}", id, path.display()),
            // The bytes are still usable for reference extraction this run.
            Err(e) => warn!("Could not store {}: {}", id, e),
        }
        info!("Successfully downloaded {}", id);

        Ok(FetchedDocument {
            id: id.clone(),
            bytes,
            origin: Origin::Network,
        })
    }
}
