//! Rebuilding partial patches from a selection of changes.

use crate::diff::{Change, ChangeKind, FileDiff, FileKind, Hunk};
use crate::lines::Selection;
use std::collections::BTreeMap;

/// Rebuild `original` keeping only the `selected` edits.
///
/// - selected changes are kept as they are
/// - an unselected addition is dropped, it was never in the index
/// - an unselected deletion becomes context, the line still exists there
/// - context stays context
///
/// Both anchors are kept from the original header; only the counts change.
pub fn rebuild_hunk(original: &Hunk, selected: &Selection) -> Hunk {
    let changes = original
        .changes
        .iter()
        .enumerate()
        .filter_map(|(i, change)| {
            if selected.contains(&i) {
                return Some(change.clone());
            }
            match change.kind {
                ChangeKind::Added => None,
                ChangeKind::Deleted => Some(Change {
                    kind: ChangeKind::Unchanged,
                    ..change.clone()
                }),
                ChangeKind::Unchanged => Some(change.clone()),
            }
        })
        .collect();

    Hunk::from_changes(
        original.old_start,
        original.new_start,
        original.section.clone(),
        original.index,
        changes,
    )
}

/// Rebuild a file diff from per-hunk selections keyed by hunk index.
///
/// Hunks without a selection, or left with nothing but context, are
/// dropped. Returns `None` when no hunk survives.
pub fn rebuild_file(file: &FileDiff, selections: &BTreeMap<usize, Selection>) -> Option<FileDiff> {
    let hunks: Vec<Hunk> = file
        .hunks
        .iter()
        .filter_map(|hunk| {
            let selected = selections.get(&hunk.index)?;
            Some(rebuild_hunk(hunk, selected))
        })
        .filter(Hunk::has_edits)
        .collect();

    if hunks.is_empty() {
        return None;
    }

    // A deletion patch must remove every line, otherwise stage the partial
    // content as a modification
    let kind = match file.kind {
        FileKind::Deleted
            if hunks.len() != file.hunks.len() || hunks.iter().any(|h| h.new_count > 0) =>
        {
            FileKind::Modified
        }
        kind => kind,
    };

    Some(FileDiff {
        old_path: file.old_path.clone(),
        new_path: file.new_path.clone(),
        kind,
        mode: file.mode.clone(),
        hunks,
    })
}

/// Concatenate file diffs into one patch for `git apply`
pub fn build_patch(files: &[FileDiff]) -> String {
    files.iter().map(ToString::to_string).collect()
}
