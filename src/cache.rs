//! Persistent fingerprint ↔ id mapping and hunk lookup.

use crate::diff::{Hunk, HunkStats};
use crate::identity::{fingerprint, mint_id};
use crate::parse::Selector;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Entries not seen for this many days are dropped on save
pub const MAX_AGE_DAYS: i64 = 7;

/// Reverse mapping entry, used for collision checks and eviction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdEntry {
    pub fingerprint: String,
    pub last_seen_at: DateTime<Utc>,
}

/// Both directions of the fingerprint/id mapping.
///
/// The two maps are only ever modified together so that every id points at
/// a fingerprint that points back at it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdCache {
    #[serde(default)]
    pub fingerprints: BTreeMap<String, String>,
    #[serde(default)]
    pub ids: BTreeMap<String, IdEntry>,
}

/// A hunk together with its stable id and listing details
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HunkInfo {
    pub id: String,
    pub hunk: Hunk,
    pub summary: String,
    pub stats: HunkStats,
}

impl HunkInfo {
    /// Volatile 1-based position in the current listing
    pub fn index(&self) -> usize {
        self.hunk.index
    }
}

impl IdCache {
    /// Id for `fingerprint`, reusing a known one or minting a new one
    pub fn id_for(&mut self, fingerprint: &str, now: DateTime<Utc>) -> String {
        if let Some(id) = self.fingerprints.get(fingerprint)
            && let Some(entry) = self.ids.get_mut(id)
        {
            entry.last_seen_at = now;
            return id.clone();
        }

        let id = mint_id(fingerprint, |candidate| self.ids.contains_key(candidate));
        tracing::debug!(%id, fingerprint, "minted hunk id");
        self.fingerprints.insert(fingerprint.to_string(), id.clone());
        self.ids.insert(
            id.clone(),
            IdEntry {
                fingerprint: fingerprint.to_string(),
                last_seen_at: now,
            },
        );
        id
    }

    /// Attach ids to every hunk of `file_path`, in listing order
    pub fn map_hunks(&mut self, file_path: &str, hunks: &[Hunk], now: DateTime<Utc>) -> Vec<HunkInfo> {
        hunks
            .iter()
            .map(|hunk| HunkInfo {
                id: self.id_for(&fingerprint(hunk, file_path), now),
                summary: hunk.summary(),
                stats: hunk.stats(),
                hunk: hunk.clone(),
            })
            .collect()
    }

    /// Drop entries last seen more than [`MAX_AGE_DAYS`] before `now`.
    ///
    /// Returns how many ids were evicted.
    pub fn prune(&mut self, now: DateTime<Utc>) -> usize {
        let cutoff = now - Duration::days(MAX_AGE_DAYS);
        let before = self.ids.len();
        self.ids.retain(|_, entry| entry.last_seen_at >= cutoff);

        let ids = &self.ids;
        self.fingerprints
            .retain(|fp, id| ids.get(id).is_some_and(|entry| entry.fingerprint == *fp));

        let evicted = before - self.ids.len();
        if evicted > 0 {
            tracing::debug!(evicted, "pruned stale hunk ids");
        }
        evicted
    }
}

/// Resolve `selector` against the current listing.
///
/// Positions match [`HunkInfo::index`]. Tokens are tried as an exact id
/// first and only then as a position, so an id that happens to look like a
/// number still wins.
pub fn find_hunk<'a>(hunks: &'a [HunkInfo], selector: &Selector) -> Option<&'a HunkInfo> {
    let by_index = |n: usize| hunks.iter().find(|info| info.index() == n);
    match selector {
        Selector::Index(n) => by_index(*n),
        Selector::Token(token) => hunks
            .iter()
            .find(|info| info.id == *token)
            .or_else(|| token.parse::<usize>().ok().and_then(by_index)),
    }
}
