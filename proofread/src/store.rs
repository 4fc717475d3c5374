use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::analysis::{AnalysisOutcome, AnalysisResult};
use crate::source::SourceKind;

pub const REPORTS_KEY: &str = "aiReports";
pub const MONITOR_ACTIVE_KEY: &str = "clipboardMonitorActive";
pub const DEFAULT_REPORT_CAPACITY: usize = 20;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid store key `{0}`")]
    InvalidKey(String),
    #[error("storage I/O failed for {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("stored value is not valid JSON: {0}")]
    Encoding(#[from] serde_json::Error),
    #[error("storage lock poisoned")]
    Poisoned,
}

/// String key/value persistence. Values are JSON documents.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One `<key>.json` file per key under a data directory.
#[derive(Debug, Clone)]
pub struct FileKeyValueStore {
    dir: PathBuf,
}

impl FileKeyValueStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.dir.join(format!("{key}.json")))
    }
}

fn io_error(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

impl KeyValueStore for FileKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.path_for(key)?;
        match fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(io_error(&path, err)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        fs::create_dir_all(&self.dir).map_err(|err| io_error(&self.dir, err))?;

        // Readers only ever see the old or the new document.
        let tmp_path = path.with_extension("json.tmp");
        fs::write(&tmp_path, value).map_err(|err| io_error(&tmp_path, err))?;
        fs::rename(&tmp_path, &path).map_err(|err| io_error(&path, err))
    }
}

#[derive(Debug, Default)]
pub struct MemoryKeyValueStore {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryKeyValueStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryKeyValueStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportEntry {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub original_text: String,
    pub analysis: AnalysisResult,
    #[serde(default = "default_report_source")]
    pub source: SourceKind,
    #[serde(default)]
    pub degraded: bool,
}

fn default_report_source() -> SourceKind {
    SourceKind::Manual
}

impl ReportEntry {
    pub fn new(original_text: impl Into<String>, outcome: AnalysisOutcome, source: SourceKind) -> Self {
        let degraded = outcome.is_degraded();
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            original_text: original_text.into(),
            analysis: outcome.into_result(),
            source,
            degraded,
        }
    }
}

/// Bounded, newest-first history of analysis results.
///
/// The in-memory list is authoritative for the running process; every append
/// is written through to the backing [`KeyValueStore`] under [`REPORTS_KEY`].
pub struct ReportStore {
    backend: Arc<dyn KeyValueStore>,
    capacity: usize,
    entries: Vec<ReportEntry>,
}

impl ReportStore {
    /// Loads persisted history. Unreadable history is logged and replaced by an
    /// empty list.
    pub fn open(backend: Arc<dyn KeyValueStore>, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let mut entries = match load_entries(backend.as_ref()) {
            Ok(entries) => entries,
            Err(err) => {
                warn!("failed to load stored reports; starting with empty history: {err}");
                Vec::new()
            }
        };
        entries.truncate(capacity);
        debug!(count = entries.len(), capacity, "report store opened");

        Self {
            backend,
            capacity,
            entries,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Newest first.
    pub fn list(&self) -> &[ReportEntry] {
        &self.entries
    }

    pub fn get(&self, id: &str) -> Option<&ReportEntry> {
        self.entries.iter().find(|entry| entry.id == id)
    }

    /// Inserts `entry` at the head and evicts beyond capacity. The entry stays
    /// in memory even when persisting fails.
    pub fn append(&mut self, entry: ReportEntry) -> Result<(), StoreError> {
        self.entries.insert(0, entry);
        self.entries.truncate(self.capacity);

        let serialized = serde_json::to_string(&self.entries)?;
        self.backend.set(REPORTS_KEY, &serialized)
    }
}

fn load_entries(backend: &dyn KeyValueStore) -> Result<Vec<ReportEntry>, StoreError> {
    match backend.get(REPORTS_KEY)? {
        Some(content) if !content.trim().is_empty() => Ok(serde_json::from_str(&content)?),
        _ => Ok(Vec::new()),
    }
}

pub fn read_monitor_flag(backend: &dyn KeyValueStore) -> Result<bool, StoreError> {
    Ok(backend
        .get(MONITOR_ACTIVE_KEY)?
        .is_some_and(|value| value.trim() == "true"))
}

pub fn write_monitor_flag(backend: &dyn KeyValueStore, active: bool) -> Result<(), StoreError> {
    backend.set(MONITOR_ACTIVE_KEY, if active { "true" } else { "false" })
}
