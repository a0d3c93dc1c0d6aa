//! Non-interactive staging of git hunks and individual lines.
//!
//! Hunks get short ids derived from their content, so a hunk keeps its id
//! while other hunks in the same file are staged around it. Every applied
//! patch is recorded and can be reversed with [`Stager::undo`].

use error_set::error_set;

pub mod cache;
pub mod diff;
pub mod git;
pub mod history;
pub mod identity;
pub mod lines;
pub mod parse;
pub mod patch;
pub mod stager;
pub mod state;

use cache::HunkInfo;

pub use diff::DiffError;
pub use git::{Git, GitCli};
pub use parse::ParseError;
pub use stager::{ContextMode, Listing, Options, StageOutcome, Stager, UndoOutcome};
pub use state::{FileStore, MemoryStore, StateStore, StoreError};

error_set! {
    /// Top-level error for staging operations
    StageError := {
        #[display("No unstaged changes found in {file}")]
        NoChanges { file: String },
        #[display("{file} is a binary file and cannot be staged partially")]
        BinaryFile { file: String },
        /// Carries the current listing so callers can show what exists
        #[display("No hunk '{selector}' in {file} ({} hunks listed)", hunks.len())]
        SelectorNotFound {
            file: String,
            selector: String,
            hunks: Vec<HunkInfo>,
        },
        #[display("No changed lines at {refs} in {file}")]
        LineOutOfRange { file: String, refs: String },
        #[display("Undo step {step} does not exist, history has {len} entries")]
        HistoryStepOutOfRange { step: usize, len: usize },
        #[display("Selection contains no added or deleted lines")]
        NothingSelected,
        #[display("Could not undo step {step}; the index no longer matches: {stderr}")]
        UndoFailed { step: usize, stderr: String },
        ParseError(ParseError),
        DiffError(DiffError),
        StoreError(StoreError),
    } || GitCommandError

    /// Errors from git command execution
    GitCommandError := {
        #[display("Failed to run git {command}: {message}")]
        CommandFailed { command: String, message: String },
        #[display("git {command} failed: {stderr}")]
        CommandExitError { command: String, stderr: String },
        #[display("Invalid UTF-8 in git output: {message}")]
        InvalidUtf8 { message: String },
        #[display("Failed to spawn git apply: {message}")]
        ApplySpawnFailed { message: String },
        #[display("Failed to get stdin handle for git apply")]
        ApplyStdinFailed,
        #[display("Failed to write patch to git apply: {message}")]
        ApplyWriteFailed { message: String },
        #[display("Failed to wait for git apply: {message}")]
        ApplyWaitFailed { message: String },
        #[display("git apply failed: {stderr}")]
        ApplyExitError { stderr: String },
    }
}
