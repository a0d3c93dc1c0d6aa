//! Structural model of `git diff` output.
//!
//! Text flows in through [`Diff::parse`] and back out through the
//! [`std::fmt::Display`] impls, which emit the same unified-diff grammar.

pub mod change;
pub mod file;
pub mod full;
pub mod hunk;

pub use change::{Change, ChangeKind};
pub use file::{FileDiff, FileKind};
pub use full::{Diff, SkippedFile};
pub use hunk::{Hunk, HunkStats, NO_NEWLINE_MARKER};

use error_set::error_set;

error_set! {
    /// Errors from parsing unified diff text
    DiffError := {
        /// `@@` line that does not follow `@@ -a[,b] +c[,d] @@`
        #[display("Invalid hunk header '{line}'")]
        InvalidHunkHeader { line: String },
        /// Body line that does not fit the hunk's declared counts
        #[display("Unexpected line in diff: '{line}'")]
        UnexpectedLine { line: String },
        /// Input ended before the hunk's declared counts were reached
        #[display("Hunk '{header}' ends before its declared line counts")]
        TruncatedHunk { header: String },
        /// Header line outside the known `diff --git` grammar
        #[display("Unrecognized diff framing: '{line}'")]
        UnrecognizedFraming { line: String },
        #[display("Could not find file path in diff")]
        MissingPath,
        #[display("{path} is a binary file")]
        BinaryFile { path: String },
    }
}

/// Paths that `git diff --numstat` reports as binary (`-` for both counts)
pub fn binary_paths(numstat: &str) -> Vec<String> {
    numstat
        .lines()
        .filter_map(|line| {
            let mut fields = line.splitn(3, '\t');
            match (fields.next(), fields.next(), fields.next()) {
                (Some("-"), Some("-"), Some(path)) => Some(file::unquote(path)),
                _ => None,
            }
        })
        .collect()
}

/// Format a file diff for user display with explicit line numbers.
///
/// Each changed line is prefixed with the number to reference when staging
/// lines: new line numbers for additions, old line numbers for deletions.
///
/// ```text
/// flake.nix:
///   +137:      debug = true;
///
///   -15:       enableAutosuggestions = true;
/// ```
pub fn format_file(file_diff: &FileDiff) -> String {
    let mut result = String::new();
    result.push_str(file_diff.path());
    result.push_str(":\n");

    for (i, hunk) in file_diff.hunks.iter().enumerate() {
        if i > 0 {
            result.push('\n');
        }

        let mut old_line = hunk.old_start;
        let mut new_line = hunk.new_start;
        for change in &hunk.changes {
            match change.kind {
                ChangeKind::Added => {
                    result.push_str(&format!("  +{}:\t{}\n", new_line, change.content));
                    new_line += 1;
                }
                ChangeKind::Deleted => {
                    result.push_str(&format!("  -{}:\t{}\n", old_line, change.content));
                    old_line += 1;
                }
                ChangeKind::Unchanged => {
                    old_line += 1;
                    new_line += 1;
                }
            }
        }
    }

    result
}
