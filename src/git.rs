//! The boundary to the `git` executable.
//!
//! Everything the stager needs from git goes through the [`Git`] trait so
//! the orchestration can be exercised without a repository.

use crate::GitCommandError;
use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Output, Stdio};

/// Which diff to produce
#[derive(Debug, Clone, Copy)]
pub struct DiffRequest<'a> {
    pub paths: &'a [String],
    /// Lines of context around each change (`-U`)
    pub context: u32,
    /// Diff the paths against `/dev/null` instead of the index
    pub untracked: bool,
}

/// Hints passed through to `git apply`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOptions {
    pub reverse: bool,
    /// The patch has no context lines
    pub unidiff_zero: bool,
}

pub trait Git {
    /// Unified diff of the working tree against the index
    fn diff(&self, request: &DiffRequest<'_>) -> Result<String, GitCommandError>;

    /// `--numstat` output for the same diff; binaries show `-` counts
    fn numstat(&self, request: &DiffRequest<'_>) -> Result<String, GitCommandError>;

    /// Tracked paths with unstaged changes
    fn changed_files(&self) -> Result<Vec<String>, GitCommandError>;

    /// The subset of `paths` git does not track yet
    fn untracked(&self, paths: &[String]) -> Result<Vec<String>, GitCommandError>;

    /// Register `paths` as empty intent-to-add entries
    fn intent_to_add(&self, paths: &[String]) -> Result<(), GitCommandError>;

    /// Apply `patch` to the index only
    fn apply_cached(&self, patch: &str, options: ApplyOptions) -> Result<(), GitCommandError>;

    /// Private metadata directory of this working copy
    fn git_dir(&self) -> Result<PathBuf, GitCommandError>;
}

/// [`Git`] implemented by running the `git` binary
#[derive(Debug, Clone)]
pub struct GitCli {
    repo_path: PathBuf,
}

impl GitCli {
    pub fn new(repo_path: impl Into<PathBuf>) -> Self {
        Self {
            repo_path: repo_path.into(),
        }
    }

    fn command(&self) -> Command {
        let mut command = Command::new("git");
        // Keep non-ASCII paths verbatim in diff headers
        command
            .arg("-C")
            .arg(&self.repo_path)
            .args(["-c", "core.quotePath=false"]);
        command
    }

    /// Run git, accepting any of `ok_codes` as success
    fn run(&self, args: &[String], ok_codes: &[i32]) -> Result<String, GitCommandError> {
        let name = args.first().cloned().unwrap_or_default();
        tracing::debug!(?args, "running git");

        let output = self
            .command()
            .args(args)
            .output()
            .map_err(|e| GitCommandError::CommandFailed {
                command: name.clone(),
                message: e.to_string(),
            })?;

        if !output.status.code().is_some_and(|code| ok_codes.contains(&code)) {
            return Err(GitCommandError::CommandExitError {
                command: name,
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            });
        }

        String::from_utf8(output.stdout).map_err(|e| GitCommandError::InvalidUtf8 {
            message: e.to_string(),
        })
    }

    fn diff_args(request: &DiffRequest<'_>, extra: &str) -> Vec<String> {
        let mut args: Vec<String> = [
            "diff",
            "--no-ext-diff",
            "--no-color",
            "--src-prefix=a/",
            "--dst-prefix=b/",
            extra,
        ]
        .into_iter()
        .filter(|arg| !arg.is_empty())
        .map(String::from)
        .collect();
        args.push(format!("-U{}", request.context));

        if request.untracked {
            args.push("--no-index".to_string());
            args.push("--".to_string());
            args.push("/dev/null".to_string());
        } else {
            args.push("--".to_string());
        }
        args.extend(request.paths.iter().cloned());
        args
    }

    /// `--no-index` exits 1 when the files differ
    fn diff_ok_codes(request: &DiffRequest<'_>) -> &'static [i32] {
        if request.untracked { &[0, 1] } else { &[0] }
    }
}

impl Git for GitCli {
    fn diff(&self, request: &DiffRequest<'_>) -> Result<String, GitCommandError> {
        self.run(&Self::diff_args(request, ""), Self::diff_ok_codes(request))
    }

    fn numstat(&self, request: &DiffRequest<'_>) -> Result<String, GitCommandError> {
        self.run(
            &Self::diff_args(request, "--numstat"),
            Self::diff_ok_codes(request),
        )
    }

    fn changed_files(&self) -> Result<Vec<String>, GitCommandError> {
        let args = ["diff", "--name-only", "-z"].map(String::from);
        let output = self.run(&args, &[0])?;
        Ok(split_nul(&output))
    }

    fn untracked(&self, paths: &[String]) -> Result<Vec<String>, GitCommandError> {
        let mut args: Vec<String> = ["ls-files", "--others", "--exclude-standard", "-z", "--"]
            .map(String::from)
            .to_vec();
        args.extend(paths.iter().cloned());
        let output = self.run(&args, &[0])?;
        Ok(split_nul(&output))
    }

    fn intent_to_add(&self, paths: &[String]) -> Result<(), GitCommandError> {
        let mut args: Vec<String> = ["add", "--intent-to-add", "--"].map(String::from).to_vec();
        args.extend(paths.iter().cloned());
        self.run(&args, &[0]).map(|_| ())
    }

    fn apply_cached(&self, patch: &str, options: ApplyOptions) -> Result<(), GitCommandError> {
        let mut command = self.command();
        command.args(["apply", "--cached", "--recount"]);
        if options.unidiff_zero {
            command.arg("--unidiff-zero");
        }
        if options.reverse {
            command.arg("--reverse");
        }
        command.arg("-");
        tracing::debug!(?options, bytes = patch.len(), "running git apply");

        let mut child = command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GitCommandError::ApplySpawnFailed {
                message: e.to_string(),
            })?;

        child
            .stdin
            .take()
            .ok_or(GitCommandError::ApplyStdinFailed)?
            .write_all(patch.as_bytes())
            .map_err(|e| GitCommandError::ApplyWriteFailed {
                message: e.to_string(),
            })?;

        let output: Output =
            child
                .wait_with_output()
                .map_err(|e| GitCommandError::ApplyWaitFailed {
                    message: e.to_string(),
                })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GitCommandError::ApplyExitError {
                stderr: stderr.into_owned(),
            });
        }

        Ok(())
    }

    fn git_dir(&self) -> Result<PathBuf, GitCommandError> {
        let args = ["rev-parse", "--absolute-git-dir"].map(String::from);
        Ok(PathBuf::from(self.run(&args, &[0])?.trim_end()))
    }
}

fn split_nul(output: &str) -> Vec<String> {
    output
        .split('\0')
        .filter(|path| !path.is_empty())
        .map(String::from)
        .collect()
}
