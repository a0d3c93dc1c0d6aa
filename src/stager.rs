//! Staging orchestration: diff, select, rebuild, apply, record.

use crate::cache::{HunkInfo, find_hunk};
use crate::diff::{self, Diff, DiffError, FileDiff, FileKind};
use crate::git::{ApplyOptions, DiffRequest, Git, GitCli};
use crate::history::HistoryEntry;
use crate::lines::{Selection, select_lines, touches};
use crate::parse::{FileHunkRefs, FileLineRefs};
use crate::patch::{build_patch, rebuild_file};
use crate::state::{FileStore, STATE_FILE, State, StateStore};
use crate::{GitCommandError, StageError};
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use std::path::Path;

/// How much surrounding context diffs are generated with.
///
/// Ids and indices from a listing are only valid for staging in the same
/// mode, since hunk boundaries depend on it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ContextMode {
    /// Three lines, as `git diff` shows by default
    #[default]
    Normal,
    /// No context; adjacent edits become separate hunks
    Precise,
}

impl ContextMode {
    pub fn lines(self) -> u32 {
        match self {
            ContextMode::Normal => 3,
            ContextMode::Precise => 0,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Options {
    pub context: ContextMode,
    /// Build patches but never touch the index or the state file
    pub dry_run: bool,
}

/// Hunks of one file with their ids
#[derive(Debug, Clone)]
pub struct FileHunks {
    pub path: String,
    pub kind: FileKind,
    pub diff: FileDiff,
    pub hunks: Vec<HunkInfo>,
}

/// A file left out of a listing
#[derive(Debug)]
pub struct Skipped {
    pub path: String,
    pub reason: StageError,
}

#[derive(Debug, Default)]
pub struct Listing {
    pub files: Vec<FileHunks>,
    pub skipped: Vec<Skipped>,
}

/// Result of a stage request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub patch: String,
    /// False for dry runs
    pub applied: bool,
    /// The recorded history entry, when applied
    pub entry: Option<HistoryEntry>,
}

/// Result of an undo request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UndoOutcome {
    pub entry: HistoryEntry,
    /// False for dry runs
    pub applied: bool,
}

/// A file's current diff and whether git tracks it yet
struct Fetched {
    diff: FileDiff,
    untracked: bool,
}

/// Accumulates rebuilt files for one stage request
#[derive(Default)]
struct Plan {
    files: Vec<FileDiff>,
    untracked: Vec<String>,
    targets: Vec<String>,
    selectors: Vec<String>,
}

impl Plan {
    fn add(&mut self, fetched: &Fetched, selections: &BTreeMap<usize, Selection>) {
        if let Some(file) = rebuild_file(&fetched.diff, selections) {
            let path = fetched.diff.path().to_string();
            if fetched.untracked {
                self.untracked.push(path.clone());
            }
            self.targets.push(path);
            self.files.push(file);
        } else {
            tracing::debug!(file = fetched.diff.path(), "selection keeps no edits");
        }
    }
}

pub struct Stager<G, S> {
    git: G,
    store: S,
    options: Options,
}

impl Stager<GitCli, FileStore> {
    /// Stager for the repository at `repo_path`, keeping state in its git dir
    pub fn open(repo_path: impl AsRef<Path>, options: Options) -> Result<Self, StageError> {
        let git = GitCli::new(repo_path.as_ref());
        let store = FileStore::new(git.git_dir()?.join(STATE_FILE));
        tracing::debug!(state = %store.path().display(), "opened repository");
        Ok(Self::new(git, store, options))
    }
}

impl<G: Git, S: StateStore> Stager<G, S> {
    pub fn new(git: G, store: S, options: Options) -> Self {
        Self {
            git,
            store,
            options,
        }
    }

    pub fn options(&self) -> Options {
        self.options
    }

    fn precise(&self) -> bool {
        self.options.context == ContextMode::Precise
    }

    /// Current diff of one file.
    ///
    /// Untracked files are diffed against `/dev/null` so that reading has no
    /// side effects; they are registered with git only right before a patch
    /// is applied.
    fn fetch(&self, file: &str) -> Result<Fetched, StageError> {
        let paths = vec![file.to_string()];
        let untracked = !self.git.untracked(&paths)?.is_empty();
        let request = DiffRequest {
            paths: &paths,
            context: self.options.context.lines(),
            untracked,
        };

        if !diff::binary_paths(&self.git.numstat(&request)?).is_empty() {
            return Err(StageError::BinaryFile {
                file: file.to_string(),
            });
        }

        let text = self.git.diff(&request)?;
        let parsed = Diff::parse(&text).into_single().map_err(|e| match e {
            DiffError::BinaryFile { path } => StageError::BinaryFile { file: path },
            other => other.into(),
        })?;

        match parsed {
            Some(diff) if !diff.hunks.is_empty() => Ok(Fetched { diff, untracked }),
            _ => Err(StageError::NoChanges {
                file: file.to_string(),
            }),
        }
    }

    /// Save `state`, evicting stale ids first
    fn persist(&self, state: &mut State, now: DateTime<Utc>) -> Result<(), StageError> {
        state.prune(now);
        Ok(self.store.save(state)?)
    }

    /// List hunks with stable ids.
    ///
    /// With no `files`, every tracked file with unstaged changes is listed.
    /// Files that are binary or fail to parse are reported in
    /// [`Listing::skipped`] instead of failing the whole listing.
    pub fn list_hunks(&self, files: &[String]) -> Result<Listing, StageError> {
        let now = Utc::now();
        let mut state = self.store.load()?;
        let files = if files.is_empty() {
            self.git.changed_files()?
        } else {
            files.to_vec()
        };

        let mut listing = Listing::default();
        for file in files {
            match self.fetch(&file) {
                Ok(fetched) => {
                    let hunks = state
                        .cache
                        .map_hunks(fetched.diff.path(), &fetched.diff.hunks, now);
                    listing.files.push(FileHunks {
                        path: fetched.diff.path().to_string(),
                        kind: fetched.diff.kind,
                        diff: fetched.diff,
                        hunks,
                    });
                }
                Err(StageError::NoChanges { .. }) => {}
                Err(reason @ (StageError::BinaryFile { .. } | StageError::DiffError(_))) => {
                    tracing::warn!(%file, %reason, "skipping file");
                    listing.skipped.push(Skipped { path: file, reason });
                }
                Err(e) => return Err(e),
            }
        }

        if !self.options.dry_run {
            self.persist(&mut state, now)?;
        }
        Ok(listing)
    }

    /// Stage whole hunks chosen by index or id
    pub fn stage_hunks(&self, requests: &[FileHunkRefs]) -> Result<StageOutcome, StageError> {
        let now = Utc::now();
        let mut state = self.store.load()?;
        let mut plan = Plan::default();

        for request in requests {
            let fetched = self.fetch(&request.file)?;
            let hunks = state
                .cache
                .map_hunks(fetched.diff.path(), &fetched.diff.hunks, now);

            let mut selections = BTreeMap::new();
            for selector in &request.selectors {
                let Some(info) = find_hunk(&hunks, selector) else {
                    return Err(StageError::SelectorNotFound {
                        file: request.file.clone(),
                        selector: selector.to_string(),
                        hunks,
                    });
                };
                tracing::debug!(%selector, id = %info.id, index = info.index(), "resolved hunk");
                selections.insert(info.index(), (0..info.hunk.changes.len()).collect());
                plan.selectors.push(format!("{}:{}", request.file, selector));
            }
            plan.add(&fetched, &selections);
        }

        self.finish(state, plan, now, "hunks")
    }

    /// Stage individual lines by new (`N`) or old (`-N`) line number
    pub fn stage_lines(&self, requests: &[FileLineRefs]) -> Result<StageOutcome, StageError> {
        let now = Utc::now();
        let state = self.store.load()?;
        let mut plan = Plan::default();

        for request in requests {
            let fetched = self.fetch(&request.file)?;

            let selections: BTreeMap<usize, Selection> = fetched
                .diff
                .hunks
                .iter()
                .map(|hunk| (hunk.index, select_lines(hunk, &request.refs)))
                .filter(|(_, selection)| !selection.is_empty())
                .collect();

            let unmatched: Vec<String> = request
                .refs
                .iter()
                .filter(|line_ref| !fetched.diff.hunks.iter().any(|h| touches(h, line_ref)))
                .map(ToString::to_string)
                .collect();

            if selections.is_empty() {
                return Err(StageError::LineOutOfRange {
                    file: request.file.clone(),
                    refs: unmatched.join(","),
                });
            }
            if !unmatched.is_empty() {
                tracing::warn!(file = %request.file, refs = %unmatched.join(","), "no changed lines at refs");
            }

            plan.selectors.extend(
                request
                    .refs
                    .iter()
                    .map(|line_ref| format!("{}:{}", request.file, line_ref)),
            );
            plan.add(&fetched, &selections);
        }

        self.finish(state, plan, now, "lines")
    }

    /// Apply the planned patch in one call and record it
    fn finish(
        &self,
        mut state: State,
        plan: Plan,
        now: DateTime<Utc>,
        kind: &str,
    ) -> Result<StageOutcome, StageError> {
        if plan.files.is_empty() {
            return Err(StageError::NothingSelected);
        }
        let patch = build_patch(&plan.files);

        if self.options.dry_run {
            return Ok(StageOutcome {
                patch,
                applied: false,
                entry: None,
            });
        }

        if !plan.untracked.is_empty() {
            self.git.intent_to_add(&plan.untracked)?;
        }
        self.git.apply_cached(
            &patch,
            ApplyOptions {
                reverse: false,
                unidiff_zero: self.precise(),
            },
        )?;
        tracing::info!(files = plan.targets.len(), "staged {kind}");

        let description = format!("stage {kind} {}", plan.selectors.join(" "));
        let entry = HistoryEntry::new(now, patch.clone(), plan.targets, plan.selectors, self.precise())
            .with_description(description);
        state.history.push(entry.clone());
        self.persist(&mut state, now)?;

        Ok(StageOutcome {
            patch,
            applied: true,
            entry: Some(entry),
        })
    }

    /// Reverse-apply the entry `step` places back in history.
    ///
    /// The entry is only removed once git accepted the reversal.
    pub fn undo(&self, step: usize) -> Result<UndoOutcome, StageError> {
        let now = Utc::now();
        let mut state = self.store.load()?;
        let Some(entry) = state.history.get(step).cloned() else {
            return Err(StageError::HistoryStepOutOfRange {
                step,
                len: state.history.len(),
            });
        };

        if self.options.dry_run {
            return Ok(UndoOutcome {
                entry,
                applied: false,
            });
        }

        self.git
            .apply_cached(
                &entry.patch,
                ApplyOptions {
                    reverse: true,
                    unidiff_zero: entry.unidiff_zero,
                },
            )
            .map_err(|e| match e {
                GitCommandError::ApplyExitError { stderr } => StageError::UndoFailed { step, stderr },
                other => other.into(),
            })?;
        tracing::info!(step, id = %entry.id, "undid staging");

        state.history.remove(step);
        self.persist(&mut state, now)?;
        Ok(UndoOutcome {
            entry,
            applied: true,
        })
    }

    /// Applied patches, newest first
    pub fn history(&self) -> Result<Vec<HistoryEntry>, StageError> {
        Ok(self.store.load()?.history.iter().cloned().collect())
    }
}
