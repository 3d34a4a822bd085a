//! JSON-file row storage.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::memory::Tables;
use super::{MemoryStore, Row, RowKind, Store, StoreError, WriteBatch};

/// Current data file format version.
///
/// Increment this when making breaking changes to the format.
const DATA_FILE_VERSION: u32 = 1;

/// On-disk data file format.
#[derive(Debug, Serialize, Deserialize)]
struct DataFile {
    version: u32,

    /// For debugging only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    saved_at: Option<DateTime<Utc>>,

    #[serde(flatten)]
    tables: Tables,
}

/// Outcome of reading the data file at startup.
#[derive(Debug)]
enum LoadResult {
    Loaded(Tables),
    NotFound,
    Corrupted { reason: String },
}

/// File-backed [`Store`].
///
/// Rows are served from memory; every successful write rewrites the whole
/// data file before the call returns.
///
/// # Atomic Writes
///
/// Uses write-to-temp-then-rename:
/// 1. Write to `{path}.tmp`
/// 2. Rename `{path}.tmp` to `{path}`
///
/// A batch is applied to a copy of the rows. Readers only see the copy once
/// it has been persisted; if persisting fails, the batch reports
/// [`StoreError::Write`] and the served rows are unchanged.
#[derive(Debug)]
pub struct FileStore {
    path: PathBuf,
    memory: MemoryStore,
    write_lock: tokio::sync::Mutex<()>,
}

impl FileStore {
    /// Opens the data file at `path`, starting empty if it does not exist.
    ///
    /// # Errors
    ///
    /// - [`StoreError::Read`] if the file exists but cannot be read
    /// - [`StoreError::Corrupted`] if the file is not a valid data file
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let path = path.into();
        let tables = match Self::load(&path)? {
            LoadResult::Loaded(tables) => {
                tracing::info!(path = %path.display(), "Loaded data file");
                tables
            }
            LoadResult::NotFound => {
                tracing::info!(path = %path.display(), "No data file, starting empty");
                Tables::default()
            }
            LoadResult::Corrupted { reason } => {
                return Err(StoreError::Corrupted { path, reason });
            }
        };

        Ok(Self {
            path,
            memory: MemoryStore::from_tables(tables),
            write_lock: tokio::sync::Mutex::new(()),
        })
    }

    /// Returns the path to the data file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(path: &Path) -> Result<LoadResult, StoreError> {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(LoadResult::NotFound),
            Err(source) => {
                return Err(StoreError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let result = match serde_json::from_str::<DataFile>(&content) {
            Ok(file) if file.version != DATA_FILE_VERSION => LoadResult::Corrupted {
                reason: format!(
                    "Incompatible version: expected {DATA_FILE_VERSION}, got {}",
                    file.version
                ),
            },
            Ok(file) => LoadResult::Loaded(file.tables),
            Err(e) => LoadResult::Corrupted {
                reason: format!("Invalid JSON: {e}"),
            },
        };
        Ok(result)
    }

    fn persist_blocking(path: &Path, file: &DataFile) -> Result<(), StoreError> {
        let content =
            serde_json::to_string_pretty(file).map_err(|e| StoreError::Write(e.into()))?;

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(StoreError::Write)?;
            }
        }

        // state.json -> state.json.tmp, not state.tmp
        let temp_path = PathBuf::from(format!("{}.tmp", path.display()));
        std::fs::write(&temp_path, content).map_err(StoreError::Write)?;
        std::fs::rename(&temp_path, path).map_err(StoreError::Write)?;
        Ok(())
    }

    async fn persist(&self, tables: Tables) -> Result<(), StoreError> {
        let path = self.path.clone();
        let file = DataFile {
            version: DATA_FILE_VERSION,
            saved_at: Some(Utc::now()),
            tables,
        };

        tokio::task::spawn_blocking(move || Self::persist_blocking(&path, &file))
            .await
            .map_err(|e| StoreError::Write(std::io::Error::other(e)))?
    }
}

impl Store for FileStore {
    async fn apply(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut staged = self.memory.snapshot()?;
        staged.apply(batch.into_ops())?;

        if let Err(e) = self.persist(staged.clone()).await {
            tracing::error!(path = %self.path.display(), error = %e, "Failed to persist data file");
            return Err(e);
        }
        self.memory.replace_rows(staged)
    }

    async fn get<R: Row>(&self, key: &str) -> Result<R, StoreError> {
        self.memory.get(key).await
    }

    async fn query<R, P>(&self, predicate: P) -> Result<Vec<R>, StoreError>
    where
        R: Row,
        P: Fn(&R) -> bool + Send,
    {
        self.memory.query(predicate).await
    }

    fn next_id(&self, kind: RowKind) -> Result<u64, StoreError> {
        self.memory.next_id(kind)
    }
}
