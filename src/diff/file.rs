use super::DiffError;
use super::hunk::Hunk;
use std::fmt;

const DEV_NULL: &str = "/dev/null";
const DEFAULT_MODE: &str = "100644";

/// How the file itself changes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Modified,
    Added,
    Deleted,
    Renamed,
}

/// A complete diff for a single file.
///
/// `old_path` and `new_path` only differ for renames; added and deleted
/// files carry their real path in both.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDiff {
    pub old_path: String,
    pub new_path: String,
    pub kind: FileKind,
    /// Mode from `new file mode` / `deleted file mode`
    pub mode: Option<String>,
    pub hunks: Vec<Hunk>,
}

/// Decode a path git wrapped in quotes with C-style escapes.
///
/// Octal escapes are raw bytes, so a multi-byte UTF-8 name arrives as
/// several of them (`caf\303\251.txt`). Unquoted paths pass through.
pub(crate) fn unquote(path: &str) -> String {
    let Some(inner) = path.strip_prefix('"').and_then(|p| p.strip_suffix('"')) else {
        return path.to_string();
    };

    let mut bytes = Vec::with_capacity(inner.len());
    let mut rest = inner.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        rest = tail;
        if byte != b'\\' {
            bytes.push(byte);
            continue;
        }
        let Some((&escape, tail)) = rest.split_first() else {
            bytes.push(byte);
            break;
        };
        rest = tail;
        let decoded = match escape {
            b'a' => 0x07,
            b'b' => 0x08,
            b't' => b'\t',
            b'n' => b'\n',
            b'v' => 0x0b,
            b'f' => 0x0c,
            b'r' => b'\r',
            b'0'..=b'3' if rest.len() >= 2 && rest[..2].iter().all(|b| (b'0'..=b'7').contains(b)) => {
                let value = (escape - b'0') * 64 + (rest[0] - b'0') * 8 + (rest[1] - b'0');
                rest = &rest[2..];
                value
            }
            other => other,
        };
        bytes.push(decoded);
    }
    String::from_utf8_lossy(&bytes).into_owned()
}

/// Strip the `a/` or `b/` prefix git puts on diff paths
fn strip_side(path: &str, side: &str) -> String {
    let path = unquote(path.trim_end());
    match path.strip_prefix(side) {
        Some(stripped) => stripped.to_string(),
        None => path,
    }
}

/// Paths from `diff --git a/old b/new`, used when no `---`/`+++` lines exist
pub(super) fn paths_from_git_line(line: &str) -> Option<(String, String)> {
    let rest = line.strip_prefix("diff --git ")?.trim_end();
    let (old, new) = match rest.split_once(" b/") {
        Some((old, new)) => (old, format!("b/{new}")),
        None => {
            let (old, new) = rest.split_once(" \"b/")?;
            (old, format!("\"b/{new}"))
        }
    };
    Some((strip_side(old, "a/"), strip_side(&new, "b/")))
}

impl FileDiff {
    /// Parse a single-file diff section.
    ///
    /// Expects the section to start with its `diff --git` line. Header lines
    /// are read up to the first `@@`, then every hunk is parsed in order.
    /// Binary sections are rejected before any hunk parsing.
    pub fn parse(text: &str) -> Result<Self, DiffError> {
        let mut lines = text.split_terminator('\n').peekable();

        let mut git_paths = None;
        let mut minus_path: Option<String> = None;
        let mut plus_path: Option<String> = None;
        let mut rename_from = None;
        let mut rename_to = None;
        let mut kind = FileKind::Modified;
        let mut mode = None;

        while let Some(line) = lines.next_if(|line| !line.starts_with("@@")) {
            if line.starts_with("diff --git ") {
                git_paths = paths_from_git_line(line);
            } else if let Some(m) = line.strip_prefix("new file mode ") {
                kind = FileKind::Added;
                mode = Some(m.trim().to_string());
            } else if let Some(m) = line.strip_prefix("deleted file mode ") {
                kind = FileKind::Deleted;
                mode = Some(m.trim().to_string());
            } else if let Some(p) = line.strip_prefix("rename from ") {
                kind = FileKind::Renamed;
                rename_from = Some(unquote(p.trim_end()));
            } else if let Some(p) = line.strip_prefix("rename to ") {
                kind = FileKind::Renamed;
                rename_to = Some(unquote(p.trim_end()));
            } else if let Some(p) = line.strip_prefix("--- ") {
                minus_path = Some(strip_side(p, "a/"));
            } else if let Some(p) = line.strip_prefix("+++ ") {
                plus_path = Some(strip_side(p, "b/"));
            } else if line.starts_with("Binary files ") || line.starts_with("GIT binary patch") {
                let path = plus_path
                    .clone()
                    .or_else(|| git_paths.as_ref().map(|(_, new)| new.clone()))
                    .unwrap_or_default();
                return Err(DiffError::BinaryFile { path });
            } else if line.starts_with("index ")
                || line.starts_with("old mode ")
                || line.starts_with("new mode ")
                || line.starts_with("similarity index ")
                || line.starts_with("dissimilarity index ")
                || line.starts_with("copy from ")
                || line.starts_with("copy to ")
                || line.is_empty()
            {
                continue;
            } else {
                return Err(DiffError::UnrecognizedFraming {
                    line: line.to_string(),
                });
            }
        }

        let real = |p: Option<String>| p.filter(|p| p != DEV_NULL && !p.is_empty());
        let (git_old, git_new) = git_paths.unzip();
        let old_path = real(rename_from).or(real(minus_path)).or(git_old);
        let new_path = real(rename_to).or(real(plus_path)).or(git_new);
        let (old_path, new_path) = match (old_path, new_path) {
            (Some(old), Some(new)) => (old, new),
            (Some(path), None) | (None, Some(path)) => (path.clone(), path),
            (None, None) => return Err(DiffError::MissingPath),
        };

        let mut hunks = Vec::new();
        while let Some(line) = lines.next() {
            if line.starts_with("@@") {
                hunks.push(Hunk::parse(line, &mut lines, hunks.len() + 1)?);
            } else if !line.is_empty() {
                return Err(DiffError::UnexpectedLine {
                    line: line.to_string(),
                });
            }
        }

        Ok(FileDiff {
            old_path,
            new_path,
            kind,
            mode,
            hunks,
        })
    }

    /// Path of the file in the working tree
    pub fn path(&self) -> &str {
        &self.new_path
    }
}

impl fmt::Display for FileDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "diff --git a/{} b/{}", self.old_path, self.new_path)?;
        let mode = self.mode.as_deref().unwrap_or(DEFAULT_MODE);
        match self.kind {
            FileKind::Added => writeln!(f, "new file mode {mode}")?,
            FileKind::Deleted => writeln!(f, "deleted file mode {mode}")?,
            FileKind::Renamed => {
                writeln!(f, "rename from {}", self.old_path)?;
                writeln!(f, "rename to {}", self.new_path)?;
            }
            FileKind::Modified => {}
        }
        // Blob ids play no part when applying a partial patch
        writeln!(f, "index 0000000..0000000")?;

        match self.kind {
            FileKind::Added => writeln!(f, "--- {DEV_NULL}")?,
            _ => writeln!(f, "--- a/{}", self.old_path)?,
        }
        match self.kind {
            FileKind::Deleted => writeln!(f, "+++ {DEV_NULL}")?,
            _ => writeln!(f, "+++ b/{}", self.new_path)?,
        }

        for hunk in &self.hunks {
            write!(f, "{}", hunk)?;
        }

        Ok(())
    }
}
