//! Mapping line numbers onto the changes of a hunk.
//!
//! Additions are addressed by their line number in the new file, deletions
//! by their line number in the old file. Selecting an addition may drag in
//! neighbouring changes when splitting them would corrupt the newline state
//! at the end of the file.

use crate::diff::{Change, ChangeKind, Hunk};
use crate::parse::LineRef;
use std::collections::{BTreeMap, BTreeSet};

/// Positions of selected changes within a hunk, always in hunk order
pub type Selection = BTreeSet<usize>;

/// New-file line number → index of the change occupying it.
///
/// Unchanged and added lines take a slot; deletions only exist in the old
/// numbering and are skipped.
pub fn new_line_map(hunk: &Hunk) -> BTreeMap<u32, usize> {
    line_map(hunk, hunk.new_start, ChangeKind::in_new)
}

/// Old-file line number → index of the change occupying it
pub fn old_line_map(hunk: &Hunk) -> BTreeMap<u32, usize> {
    line_map(hunk, hunk.old_start, ChangeKind::in_old)
}

fn line_map(hunk: &Hunk, start: u32, occupies: fn(ChangeKind) -> bool) -> BTreeMap<u32, usize> {
    let mut line = start;
    let mut map = BTreeMap::new();
    for (i, change) in hunk.changes.iter().enumerate() {
        if occupies(change.kind) {
            map.insert(line, i);
            line += 1;
        }
    }
    map
}

/// `[Deleted(X, no newline), Added(X)]`: the old last line gaining a newline
fn is_eof_pair(deleted: &Change, added: &Change) -> bool {
    deleted.kind == ChangeKind::Deleted
        && !deleted.has_newline
        && added.kind == ChangeKind::Added
        && added.has_newline
        && deleted.content == added.content
}

/// Changes needed to stage the additions at `targets` (new line numbers).
///
/// Targets that land on context or outside the hunk are ignored. When the
/// additions follow a deleted old last line without a newline, that
/// deletion is selected with them; left as context it would swallow the
/// first staged line. An EOF pair is atomic, so its addition comes along
/// too.
pub fn required_changes(hunk: &Hunk, targets: impl IntoIterator<Item = u32>) -> Selection {
    let map = new_line_map(hunk);
    let changes = &hunk.changes;
    let mut selected = Selection::new();

    for target in targets {
        let Some(&idx) = map.get(&target) else {
            continue;
        };
        if changes[idx].kind != ChangeKind::Added {
            continue;
        }
        selected.insert(idx);

        // Change just before the run of additions holding the target
        let before = changes[..idx]
            .iter()
            .rposition(|change| change.kind != ChangeKind::Added);
        if let Some(before) = before
            && changes[before].kind == ChangeKind::Deleted
            && !changes[before].has_newline
        {
            selected.insert(before);
            if is_eof_pair(&changes[before], &changes[before + 1]) {
                selected.insert(before + 1);
            }
        }
    }

    selected
}

/// Changes selected by `refs`: additions through [`required_changes`],
/// deletions directly by old line number.
pub fn select_lines(hunk: &Hunk, refs: &[LineRef]) -> Selection {
    let new_targets = new_line_map(hunk)
        .into_keys()
        .filter(|&line| refs.iter().any(|r| r.selects_new(line)));
    let mut selected = required_changes(hunk, new_targets);

    for (line, idx) in old_line_map(hunk) {
        if hunk.changes[idx].kind == ChangeKind::Deleted
            && refs.iter().any(|r| r.selects_old(line))
        {
            selected.insert(idx);
        }
    }

    selected
}

/// Whether `line_ref` names at least one edit in `hunk`
pub fn touches(hunk: &Hunk, line_ref: &LineRef) -> bool {
    let added = new_line_map(hunk)
        .into_iter()
        .any(|(line, idx)| hunk.changes[idx].kind == ChangeKind::Added && line_ref.selects_new(line));
    let deleted = old_line_map(hunk)
        .into_iter()
        .any(|(line, idx)| hunk.changes[idx].kind == ChangeKind::Deleted && line_ref.selects_old(line));
    added || deleted
}
