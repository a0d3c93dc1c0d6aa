//! Content-derived hunk identity.
//!
//! A hunk's fingerprint covers its file path, the edited span and up to
//! three context lines on either side. Edited lines are hashed by content
//! only, so the same edit keeps its fingerprint whether it shows up as an
//! addition or a deletion.

use crate::diff::{Change, Hunk};
use sha2::{Digest, Sha256};

/// Length of a freshly minted id, in hex characters
pub const MIN_ID_LEN: usize = 4;

const CONTEXT_LINES: usize = 3;

/// Strip carriage returns, turn tabs into single spaces, drop trailing whitespace
pub fn normalize(line: &str) -> String {
    line.replace('\r', "").replace('\t', " ").trim_end().to_string()
}

/// Hex SHA-256 over the path and the hunk's normalized span
pub fn fingerprint(hunk: &Hunk, path: &str) -> String {
    let changes = &hunk.changes;
    let mut hasher = Sha256::new();
    hasher.update(path.as_bytes());
    hasher.update(b"\n");

    let lines: &[Change] = match (
        changes.iter().position(Change::is_edit),
        changes.iter().rposition(Change::is_edit),
    ) {
        (Some(first), Some(last)) => {
            let start = first.saturating_sub(CONTEXT_LINES);
            let end = (last + 1 + CONTEXT_LINES).min(changes.len());
            &changes[start..end]
        }
        _ => changes,
    };

    for change in lines {
        hasher.update(normalize(&change.content).as_bytes());
        hasher.update(b"\n");
    }

    format!("{:x}", hasher.finalize())
}

/// Shortest prefix of `fingerprint`, at least [`MIN_ID_LEN`] long, that
/// `taken` does not reject
pub fn mint_id(fingerprint: &str, taken: impl Fn(&str) -> bool) -> String {
    (MIN_ID_LEN..=fingerprint.len())
        .filter_map(|len| fingerprint.get(..len))
        .find(|candidate| !taken(*candidate))
        .unwrap_or(fingerprint)
        .to_string()
}
