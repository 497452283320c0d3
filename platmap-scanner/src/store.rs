//! Flat on-disk store of downloaded maps, one `{IDENTIFIER}.pdf` per map.
//!
//! Presence of a file is the resume signal: a stored map is reloaded from
//! disk instead of being requested again.

use crate::error::Result;
use crate::identifier::MapId;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    /// Opens the store, creating the directory if needed. Failure here is a
    /// configuration error and aborts the run.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        std::fs::create_dir_all(&root)?;
        info!("Output directory: {}", root.display());
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, id: &MapId) -> PathBuf {
        self.root.join(id.file_name())
    }

    pub fn contains(&self, id: &MapId) -> bool {
        self.path_for(id).is_file()
    }

    pub async fn load(&self, id: &MapId) -> Result<Vec<u8>> {
        Ok(tokio::fs::read(self.path_for(id)).await?)
    }

    /// Writes to a `.part` sibling first so an interrupted run never leaves
    /// a truncated file that would later be mistaken for a complete map.
    pub async fn save(&self, id: &MapId, bytes: &[u8]) -> Result<PathBuf> {
        let path = self.path_for(id);
        let partial = self.root.join(format!("{}.part", id.file_name()));

        tokio::fs::write(&partial, bytes).await?;
        tokio::fs::rename(&partial, &path).await?;
        debug!("Stored {} ({} bytes)", path.display(), bytes.len());

        Ok(path)
    }

    /// Identifiers of every stored map, sorted.
    pub fn list(&self) -> Result<Vec<MapId>> {
        let mut ids: Vec<MapId> = std::fs::read_dir(&self.root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| MapId::from_file_name(&entry.file_name().to_string_lossy()))
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_save_load_and_list() {
        let dir = TempDir::new().unwrap();
        let store = DocumentStore::open(dir.path().join("maps")).unwrap();
        let a: MapId = "001-24".parse().unwrap();
        let b: MapId = "001-03".parse().unwrap();

        assert!(!store.contains(&a));
        let path = store.save(&a, b"%PDF-a").await.unwrap();
        store.save(&b, b"%PDF-b").await.unwrap();

        assert_eq!(path, dir.path().join("maps").join("001-24.pdf"));
        assert!(store.contains(&a));
        assert_eq!(store.load(&a).await.unwrap(), b"%PDF-a");
        assert_eq!(store.list().unwrap(), vec![b, a]);
    }

    #[test]
    fn test_list_skips_foreign_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("001-02.pdf"), b"x").unwrap();
        std::fs::write(dir.path().join("001-05.pdf.part"), b"x").unwrap();
        std::fs::write(dir.path().join("platmap.log"), b"x").unwrap();
        std::fs::create_dir(dir.path().join("002-01.pdf")).unwrap();

        let store = DocumentStore::open(dir.path()).unwrap();
        let ids: Vec<String> = store.list().unwrap().iter().map(MapId::render).collect();
        assert_eq!(ids, vec!["001-02"]);
    }

    #[test]
    fn test_open_fails_when_root_is_a_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("occupied");
        std::fs::write(&file, b"x").unwrap();
        assert!(DocumentStore::open(&file).is_err());
    }
}
