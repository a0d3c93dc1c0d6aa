use super::DiffError;
use super::file::{FileDiff, paths_from_git_line};

/// A file section that failed to parse
#[derive(Debug)]
pub struct SkippedFile {
    /// Path from the `diff --git` line, when it could be read
    pub path: Option<String>,
    pub error: DiffError,
}

/// A complete git diff containing changes for multiple files.
///
/// A malformed file section does not abort its siblings; it is recorded in
/// `skipped` and parsing continues with the next `diff --git` line.
#[derive(Debug, Default)]
pub struct Diff {
    pub files: Vec<FileDiff>,
    pub skipped: Vec<SkippedFile>,
}

impl Diff {
    /// Parse a complete git diff output into file diffs
    pub fn parse(text: &str) -> Self {
        let mut diff = Diff::default();
        let mut sections: Vec<String> = Vec::new();

        // Split on LF only so CRLF content keeps its carriage returns
        for line in text.split_terminator('\n') {
            if line.starts_with("diff --git ") {
                sections.push(String::new());
            }
            // Anything before the first file header is noise
            if let Some(section) = sections.last_mut() {
                section.push_str(line);
                section.push('\n');
            }
        }

        for section in sections {
            match FileDiff::parse(&section) {
                Ok(file) => diff.files.push(file),
                Err(error) => {
                    let path = section
                        .lines()
                        .next()
                        .and_then(paths_from_git_line)
                        .map(|(_, path)| path);
                    tracing::warn!(?path, %error, "skipping unparseable file diff");
                    diff.skipped.push(SkippedFile { path, error });
                }
            }
        }

        diff
    }

    /// The single file a per-file diff should contain
    pub fn into_single(self) -> Result<Option<FileDiff>, DiffError> {
        if let Some(skipped) = self.skipped.into_iter().next() {
            return Err(skipped.error);
        }
        Ok(self.files.into_iter().next())
    }
}

impl std::fmt::Display for Diff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for file_diff in &self.files {
            write!(f, "{}", file_diff)?;
        }
        Ok(())
    }
}
