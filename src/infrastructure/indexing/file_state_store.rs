//! File-backed state store: one JSON file per document

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::domain::indexing::{DocumentState, StateStore};
use crate::domain::ingestion::chunker::helpers::hash_bytes;
use crate::domain::DomainError;

/// Stores each [`DocumentState`] as `<sha256(doc_id)>.json` under a directory
///
/// Writes go to a temporary sibling file that is renamed over the target, so a reader
/// sees either the previous record or the new one.
#[derive(Debug, Clone)]
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// File holding the record of `doc_id`
    pub fn path_for(&self, doc_id: &str) -> PathBuf {
        self.root
            .join(format!("{}.json", hash_bytes(doc_id.as_bytes())))
    }

    fn io_error(action: &str, path: &Path, e: std::io::Error) -> DomainError {
        DomainError::storage(format!("Failed to {} {}: {}", action, path.display(), e))
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn load(&self, doc_id: &str) -> Result<Option<DocumentState>, DomainError> {
        let path = self.path_for(doc_id);

        match tokio::fs::read_to_string(&path).await {
            Ok(json) => DocumentState::from_json(doc_id, &json).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::InvalidData => {
                Err(DomainError::state_corruption(doc_id, e.to_string()))
            }
            Err(e) => Err(Self::io_error("read", &path, e)),
        }
    }

    async fn save(&self, doc_id: &str, state: &DocumentState) -> Result<bool, DomainError> {
        state.validate()?;
        let json = state.to_json()?;

        tokio::fs::create_dir_all(&self.root)
            .await
            .map_err(|e| Self::io_error("create", &self.root, e))?;

        let path = self.path_for(doc_id);
        let tmp = path.with_extension(format!("json.{}.tmp", uuid::Uuid::new_v4().simple()));

        tokio::fs::write(&tmp, json.as_bytes())
            .await
            .map_err(|e| Self::io_error("write", &tmp, e))?;

        if let Err(e) = tokio::fs::rename(&tmp, &path).await {
            let _ = tokio::fs::remove_file(&tmp).await;
            return Err(Self::io_error("replace", &path, e));
        }

        debug!(doc_id = %doc_id, path = %path.display(), "Saved document state");
        Ok(true)
    }

    async fn delete(&self, doc_id: &str) -> Result<bool, DomainError> {
        let path = self.path_for(doc_id);

        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(Self::io_error("delete", &path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::tempdir;

    fn state(doc_id: &str) -> DocumentState {
        DocumentState::new(
            doc_id,
            "source",
            vec!["h1".to_string(), "h2".to_string()],
            vec!["e1".to_string(), "e2".to_string()],
            BTreeMap::from([("source_path".to_string(), "docs/a.md".to_string())]),
        )
    }

    #[tokio::test]
    async fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path().join("state"));
        let original = state("docs/a.md");

        assert!(store.load("docs/a.md").await.unwrap().is_none());
        assert!(store.save("docs/a.md", &original).await.unwrap());

        let loaded = store.load("docs/a.md").await.unwrap().unwrap();
        assert_eq!(loaded, original);
        assert_eq!(loaded.source_path.as_deref(), Some("docs/a.md"));
    }

    #[tokio::test]
    async fn test_file_name_is_hashed_id() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("../escape", &state("../escape")).await.unwrap();

        let path = store.path_for("../escape");
        assert_eq!(path.parent().unwrap(), dir.path());
        assert!(path.exists());

        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.path().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[tokio::test]
    async fn test_overwrite_replaces_record() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());

        store.save("doc", &state("doc")).await.unwrap();
        let mut updated = state("doc");
        updated.source_hash = "changed".to_string();
        store.save("doc", &updated).await.unwrap();

        assert_eq!(
            store.load("doc").await.unwrap().unwrap().source_hash,
            "changed"
        );
    }

    #[tokio::test]
    async fn test_corrupt_record() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        std::fs::write(store.path_for("doc"), "{\"doc_id\": 12").unwrap();

        let err = store.load("doc").await.unwrap_err();
        assert!(matches!(err, DomainError::StateCorruption { .. }));
    }

    #[tokio::test]
    async fn test_delete() {
        let dir = tempdir().unwrap();
        let store = FileStateStore::new(dir.path());
        store.save("doc", &state("doc")).await.unwrap();

        assert!(store.delete("doc").await.unwrap());
        assert!(!store.delete("doc").await.unwrap());
        assert!(store.load("doc").await.unwrap().is_none());
    }
}
