//! Bounded log of applied patches, newest first.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entries beyond this count are dropped, oldest first
pub const MAX_HISTORY: usize = 20;

/// A patch that was applied to the index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntry {
    /// Derived from `applied_at`
    pub id: String,
    pub applied_at: DateTime<Utc>,
    pub patch: String,
    pub target_files: Vec<String>,
    /// What the user asked for, as typed
    pub selectors: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// The patch was built without context and needs `--unidiff-zero`
    #[serde(default)]
    pub unidiff_zero: bool,
}

impl HistoryEntry {
    pub fn new(
        applied_at: DateTime<Utc>,
        patch: String,
        target_files: Vec<String>,
        selectors: Vec<String>,
        unidiff_zero: bool,
    ) -> Self {
        Self {
            id: applied_at.format("%Y%m%d%H%M%S%3f").to_string(),
            applied_at,
            patch,
            target_files,
            selectors,
            description: None,
            unidiff_zero,
        }
    }

    #[must_use]
    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct History {
    entries: Vec<HistoryEntry>,
}

impl History {
    /// Record `entry` as the most recent, dropping anything past the bound
    pub fn push(&mut self, entry: HistoryEntry) {
        self.entries.insert(0, entry);
        self.entries.truncate(MAX_HISTORY);
    }

    /// Entry `step` places back, 0 being the most recent
    pub fn get(&self, step: usize) -> Option<&HistoryEntry> {
        self.entries.get(step)
    }

    pub fn remove(&mut self, step: usize) -> Option<HistoryEntry> {
        (step < self.entries.len()).then(|| self.entries.remove(step))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &HistoryEntry> {
        self.entries.iter()
    }
}
