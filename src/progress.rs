use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::viewer::{DisplayMode, Rotation};

/// Navigation state remembered for one document
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReadingProgress {
    pub page_index: usize,
    #[serde(default)]
    pub display_mode: DisplayMode,
    #[serde(default)]
    pub rotation: Rotation,
}

#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("progress store I/O: {0}")]
    Io(#[from] std::io::Error),

    #[error("progress store format: {0}")]
    Format(#[from] serde_json::Error),
}

/// Read/write contract for per-document reading progress.
///
/// Callers treat failures as non-fatal: a failed save only means the
/// position is not restored next time.
pub trait ReadingProgressStore {
    fn load(&self, document_id: &str) -> Result<Option<ReadingProgress>, PersistenceError>;

    fn save(
        &mut self,
        document_id: &str,
        progress: &ReadingProgress,
    ) -> Result<(), PersistenceError>;
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressRecord {
    pub progress: ReadingProgress,
    pub last_read: DateTime<Utc>,
}

/// Progress for every document, kept in one JSON file
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct JsonProgressStore {
    documents: HashMap<String, ProgressRecord>,
    #[serde(skip)]
    file_path: Option<PathBuf>,
}

impl JsonProgressStore {
    /// In-memory store that never touches disk
    pub fn ephemeral() -> Self {
        Self::default()
    }

    pub fn with_file(file_path: impl Into<PathBuf>) -> Self {
        Self {
            documents: HashMap::new(),
            file_path: Some(file_path.into()),
        }
    }

    /// Load from `file_path`, starting empty (but still file-backed) if the
    /// file cannot be read
    pub fn load_or_ephemeral(file_path: Option<&Path>) -> Self {
        match file_path {
            Some(path) => Self::load_from_file(path).unwrap_or_else(|e| {
                log::error!("Failed to load reading progress from {}: {}", path.display(), e);
                Self::with_file(path)
            }),
            None => Self::ephemeral(),
        }
    }

    pub fn load_from_file(file_path: &Path) -> Result<Self, PersistenceError> {
        if file_path.exists() {
            let content = fs::read_to_string(file_path)?;
            let mut store: Self = serde_json::from_str(&content)?;
            store.file_path = Some(file_path.to_path_buf());
            Ok(store)
        } else {
            Ok(Self::with_file(file_path))
        }
    }

    pub fn flush(&self) -> Result<(), PersistenceError> {
        match &self.file_path {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    if !parent.as_os_str().is_empty() && !parent.exists() {
                        fs::create_dir_all(parent)?;
                    }
                }
                let content = serde_json::to_string_pretty(self)?;
                fs::write(path, content)?;
                Ok(())
            }
            // Ephemeral stores don't save to disk
            None => Ok(()),
        }
    }

    pub fn record(&self, document_id: &str) -> Option<&ProgressRecord> {
        self.documents.get(document_id)
    }

    /// Most recently read document and its record
    pub fn most_recent(&self) -> Option<(&str, &ProgressRecord)> {
        self.documents
            .iter()
            .max_by_key(|(_, record)| record.last_read)
            .map(|(id, record)| (id.as_str(), record))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ProgressRecord)> {
        self.documents.iter()
    }
}

impl ReadingProgressStore for JsonProgressStore {
    fn load(&self, document_id: &str) -> Result<Option<ReadingProgress>, PersistenceError> {
        Ok(self.documents.get(document_id).map(|record| record.progress))
    }

    fn save(
        &mut self,
        document_id: &str,
        progress: &ReadingProgress,
    ) -> Result<(), PersistenceError> {
        self.documents.insert(
            document_id.to_string(),
            ProgressRecord {
                progress: *progress,
                last_read: Utc::now(),
            },
        );
        self.flush()
    }
}

/// Volatile store, mostly for hosts without persistent storage
#[derive(Debug, Default)]
pub struct MemoryProgressStore {
    documents: HashMap<String, ReadingProgress>,
}

impl MemoryProgressStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ReadingProgressStore for MemoryProgressStore {
    fn load(&self, document_id: &str) -> Result<Option<ReadingProgress>, PersistenceError> {
        Ok(self.documents.get(document_id).copied())
    }

    fn save(
        &mut self,
        document_id: &str,
        progress: &ReadingProgress,
    ) -> Result<(), PersistenceError> {
        self.documents.insert(document_id.to_string(), *progress);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::viewer::HalfSide;

    fn progress(page_index: usize) -> ReadingProgress {
        ReadingProgress {
            page_index,
            display_mode: DisplayMode::HalfPage {
                side: HalfSide::Left,
            },
            rotation: Rotation::Deg270,
        }
    }

    #[test]
    fn json_store_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("progress.json");

        let mut store = JsonProgressStore::with_file(&path);
        store.save("/books/a.pdf", &progress(7)).unwrap();
        std::thread::sleep(std::time::Duration::from_millis(5));
        store.save("/books/b.pdf", &progress(2)).unwrap();

        let reloaded = JsonProgressStore::load_or_ephemeral(Some(path.as_path()));
        assert_eq!(reloaded.load("/books/a.pdf").unwrap(), Some(progress(7)));
        assert_eq!(reloaded.load("/books/missing.pdf").unwrap(), None);
        assert_eq!(reloaded.most_recent().map(|(id, _)| id), Some("/books/b.pdf"));
    }

    #[test]
    fn corrupt_file_falls_back_to_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("progress.json");
        fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            JsonProgressStore::load_from_file(&path),
            Err(PersistenceError::Format(_))
        ));
        let store = JsonProgressStore::load_or_ephemeral(Some(path.as_path()));
        assert_eq!(store.iter().count(), 0);
    }

    #[test]
    fn legacy_record_without_mode_defaults_to_single() {
        let parsed: ReadingProgress = serde_json::from_str(r#"{"page_index": 4}"#).unwrap();
        assert_eq!(parsed.display_mode, DisplayMode::Single);
        assert_eq!(parsed.rotation, Rotation::Deg0);
    }

    #[test]
    fn invalid_rotation_is_rejected() {
        let parsed = serde_json::from_str::<ReadingProgress>(r#"{"page_index": 0, "rotation": 45}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn memory_store_round_trip() {
        let mut store = MemoryProgressStore::new();
        assert_eq!(store.load("doc").unwrap(), None);
        store.save("doc", &progress(3)).unwrap();
        assert_eq!(store.load("doc").unwrap(), Some(progress(3)));
    }
}
