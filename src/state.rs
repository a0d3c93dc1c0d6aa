//! The persisted document: hunk ids plus undo history.
//!
//! Stored as one JSON file per repository. The document carries a schema
//! version; [`load_document`] upgrades older versions one step at a time
//! before deserializing.

use crate::cache::IdCache;
use crate::history::History;
use chrono::{DateTime, Utc};
use error_set::error_set;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::cell::RefCell;
use std::fs;
use std::path::PathBuf;

pub const SCHEMA_VERSION: u64 = 2;

/// File name inside the repository's git dir
pub const STATE_FILE: &str = "git-hunks.json";

error_set! {
    /// Errors from reading or writing persisted state
    StoreError := {
        #[display("Failed to access {path}: {message}")]
        Io { path: String, message: String },
        #[display("Corrupt state document: {message}")]
        Json { message: String },
        #[display("State schema version {version} is newer than supported version {supported}")]
        UnsupportedVersion { version: u64, supported: u64 },
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    pub version: u64,
    #[serde(flatten)]
    pub cache: IdCache,
    #[serde(default)]
    pub history: History,
}

impl Default for State {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            cache: IdCache::default(),
            history: History::default(),
        }
    }
}

impl State {
    /// Evict stale ids as of `now`; run before every save
    pub fn prune(&mut self, now: DateTime<Utc>) {
        self.cache.prune(now);
    }
}

fn json_error(e: serde_json::Error) -> StoreError {
    StoreError::Json {
        message: e.to_string(),
    }
}

/// v1 kept only `hunks: {fingerprint: id}`; every id is treated as seen at
/// load time
fn migrate_v1(mut doc: Map<String, Value>, now: DateTime<Utc>) -> Map<String, Value> {
    let hunks = match doc.remove("hunks") {
        Some(Value::Object(hunks)) => hunks,
        _ => Map::new(),
    };

    let mut ids = Map::new();
    for (fingerprint, id) in &hunks {
        if let Some(id) = id.as_str() {
            ids.insert(
                id.to_string(),
                json!({ "fingerprint": fingerprint, "lastSeenAt": now }),
            );
        }
    }

    doc.insert("fingerprints".to_string(), Value::Object(hunks));
    doc.insert("ids".to_string(), Value::Object(ids));
    doc.entry("history").or_insert_with(|| json!([]));
    doc.insert("version".to_string(), json!(2));
    doc
}

/// Parse a state document of any known schema version
pub fn load_document(text: &str, now: DateTime<Utc>) -> Result<State, StoreError> {
    let value: Value = serde_json::from_str(text).map_err(json_error)?;
    let Value::Object(mut doc) = value else {
        return Err(StoreError::Json {
            message: "expected a JSON object".to_string(),
        });
    };

    let version = doc.get("version").and_then(Value::as_u64).unwrap_or(1);
    if version > SCHEMA_VERSION {
        return Err(StoreError::UnsupportedVersion {
            version,
            supported: SCHEMA_VERSION,
        });
    }
    if version < 2 {
        tracing::debug!(from = version, "migrating state document");
        doc = migrate_v1(doc, now);
    }

    serde_json::from_value(Value::Object(doc)).map_err(json_error)
}

/// Where persisted state lives
pub trait StateStore {
    /// Load the stored state, or an empty state if nothing was stored yet
    fn load(&self) -> Result<State, StoreError>;
    fn save(&self, state: &State) -> Result<(), StoreError>;
}

/// State kept in a JSON file
#[derive(Debug, Clone)]
pub struct FileStore {
    path: PathBuf,
}

impl FileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    fn io_error(&self, e: std::io::Error) -> StoreError {
        StoreError::Io {
            path: self.path.display().to_string(),
            message: e.to_string(),
        }
    }
}

impl StateStore for FileStore {
    fn load(&self) -> Result<State, StoreError> {
        match fs::read_to_string(&self.path) {
            Ok(text) => load_document(&text, Utc::now()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(State::default()),
            Err(e) => Err(self.io_error(e)),
        }
    }

    fn save(&self, state: &State) -> Result<(), StoreError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| self.io_error(e))?;
        }
        let text = serde_json::to_string_pretty(state).map_err(json_error)?;
        fs::write(&self.path, text).map_err(|e| self.io_error(e))
    }
}

/// State kept in memory as serialized JSON, for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryStore {
    document: RefCell<Option<String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start from an existing document, e.g. an older schema version
    pub fn with_document(document: impl Into<String>) -> Self {
        Self {
            document: RefCell::new(Some(document.into())),
        }
    }

    /// The last saved document
    pub fn document(&self) -> Option<String> {
        self.document.borrow().clone()
    }
}

impl StateStore for MemoryStore {
    fn load(&self) -> Result<State, StoreError> {
        match self.document.borrow().as_deref() {
            Some(text) => load_document(text, Utc::now()),
            None => Ok(State::default()),
        }
    }

    fn save(&self, state: &State) -> Result<(), StoreError> {
        let text = serde_json::to_string(state).map_err(json_error)?;
        *self.document.borrow_mut() = Some(text);
        Ok(())
    }
}

impl<S: StateStore + ?Sized> StateStore for &S {
    fn load(&self) -> Result<State, StoreError> {
        (**self).load()
    }

    fn save(&self, state: &State) -> Result<(), StoreError> {
        (**self).save(state)
    }
}
