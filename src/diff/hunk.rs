use super::DiffError;
use super::change::{Change, ChangeKind};
use nom::{
    IResult, Parser,
    bytes::complete::tag,
    character::complete::{char, u32 as number},
    combinator::opt,
    sequence::preceded,
};
use std::fmt;
use std::iter::Peekable;

/// Marker git emits after a line that has no trailing newline
pub const NO_NEWLINE_MARKER: &str = "\\ No newline at end of file";

const SUMMARY_WIDTH: usize = 50;

/// A single hunk from a git diff.
///
/// `old_start`/`new_start` are the 1-based anchors from the `@@` header.
/// `index` is the 1-based position of the hunk within its file in the diff
/// it was parsed from; it shifts whenever an earlier hunk gets staged.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hunk {
    pub old_start: u32,
    pub old_count: u32,
    pub new_start: u32,
    pub new_count: u32,
    /// Text after the closing `@@` (function context), including its leading space
    pub section: String,
    pub index: usize,
    pub changes: Vec<Change>,
}

/// Added/deleted line counts for a hunk
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HunkStats {
    pub added: usize,
    pub deleted: usize,
}

/// Parsed `@@ -a,b +c,d @@section` line
#[derive(Debug, PartialEq, Eq)]
struct HunkHeader<'a> {
    old_start: u32,
    old_count: u32,
    new_start: u32,
    new_count: u32,
    section: &'a str,
}

/// `start` or `start,count`; a missing count means 1
fn range(input: &str) -> IResult<&str, (u32, u32)> {
    let (rest, (start, count)) = (number, opt(preceded(char(','), number))).parse(input)?;
    Ok((rest, (start, count.unwrap_or(1))))
}

fn header(input: &str) -> IResult<&str, HunkHeader<'_>> {
    let (section, (_, (old_start, old_count), _, (new_start, new_count), _)) =
        (tag("@@ -"), range, tag(" +"), range, tag(" @@")).parse(input)?;
    Ok((
        "",
        HunkHeader {
            old_start,
            old_count,
            new_start,
            new_count,
            section,
        },
    ))
}

fn format_range(start: u32, count: u32) -> String {
    if count == 1 {
        start.to_string()
    } else {
        format!("{start},{count}")
    }
}

impl Hunk {
    /// Build a hunk from its changes, deriving both line counts.
    pub fn from_changes(
        old_start: u32,
        new_start: u32,
        section: impl Into<String>,
        index: usize,
        changes: Vec<Change>,
    ) -> Self {
        let old_count = changes.iter().filter(|c| c.kind.in_old()).count() as u32;
        let new_count = changes.iter().filter(|c| c.kind.in_new()).count() as u32;
        Self {
            old_start,
            old_count,
            new_start,
            new_count,
            section: section.into(),
            index,
            changes,
        }
    }

    /// Parse a hunk starting at its `@@` header line.
    ///
    /// Consumes body lines from `lines` until the header's old and new counts
    /// are satisfied, plus a trailing no-newline marker if present. Each
    /// marker clears `has_newline` on the change immediately before it.
    pub fn parse<'a, I>(
        header_line: &str,
        lines: &mut Peekable<I>,
        index: usize,
    ) -> Result<Self, DiffError>
    where
        I: Iterator<Item = &'a str>,
    {
        let (_, parsed) = header(header_line).map_err(|_| DiffError::InvalidHunkHeader {
            line: header_line.to_string(),
        })?;

        let mut old_remaining = parsed.old_count;
        let mut new_remaining = parsed.new_count;
        let mut changes: Vec<Change> = Vec::new();

        while old_remaining > 0 || new_remaining > 0 {
            let Some(line) = lines.next() else {
                return Err(DiffError::TruncatedHunk {
                    header: header_line.to_string(),
                });
            };

            let (kind, content) = if let Some(content) = line.strip_prefix('+') {
                (ChangeKind::Added, content)
            } else if let Some(content) = line.strip_prefix('-') {
                (ChangeKind::Deleted, content)
            } else if let Some(content) = line.strip_prefix(' ') {
                (ChangeKind::Unchanged, content)
            } else if line.is_empty() {
                // Some tools strip the trailing space of empty context lines
                (ChangeKind::Unchanged, "")
            } else if line.starts_with('\\') {
                if let Some(last) = changes.last_mut() {
                    last.has_newline = false;
                }
                continue;
            } else {
                return Err(DiffError::UnexpectedLine {
                    line: line.to_string(),
                });
            };

            let fits = match kind {
                ChangeKind::Added => new_remaining > 0,
                ChangeKind::Deleted => old_remaining > 0,
                ChangeKind::Unchanged => old_remaining > 0 && new_remaining > 0,
            };
            if !fits {
                return Err(DiffError::UnexpectedLine {
                    line: line.to_string(),
                });
            }
            if kind.in_old() {
                old_remaining -= 1;
            }
            if kind.in_new() {
                new_remaining -= 1;
            }
            changes.push(Change::new(kind, content));
        }

        if lines.peek().is_some_and(|line| line.starts_with('\\')) {
            lines.next();
            if let Some(last) = changes.last_mut() {
                last.has_newline = false;
            }
        }

        Ok(Self {
            old_start: parsed.old_start,
            old_count: parsed.old_count,
            new_start: parsed.new_start,
            new_count: parsed.new_count,
            section: parsed.section.trim_end_matches('\r').to_string(),
            index,
            changes,
        })
    }

    /// The `@@ -a,b +c,d @@` line, omitting counts of 1 the way git does
    pub fn header(&self) -> String {
        format!(
            "@@ -{} +{} @@{}",
            format_range(self.old_start, self.old_count),
            format_range(self.new_start, self.new_count),
            self.section
        )
    }

    pub fn stats(&self) -> HunkStats {
        self.changes
            .iter()
            .fold(HunkStats::default(), |mut stats, change| {
                match change.kind {
                    ChangeKind::Added => stats.added += 1,
                    ChangeKind::Deleted => stats.deleted += 1,
                    ChangeKind::Unchanged => {}
                }
                stats
            })
    }

    /// First non-blank changed line, trimmed and cut to 50 characters
    pub fn summary(&self) -> String {
        self.changes
            .iter()
            .filter(|c| c.is_edit())
            .map(|c| c.content.trim())
            .find(|content| !content.is_empty())
            .map(|content| content.chars().take(SUMMARY_WIDTH).collect())
            .unwrap_or_default()
    }

    /// Whether any line in the hunk is an addition or deletion
    pub fn has_edits(&self) -> bool {
        self.changes.iter().any(Change::is_edit)
    }
}

impl fmt::Display for Hunk {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{}", self.header())?;

        for (i, change) in self.changes.iter().enumerate() {
            writeln!(f, "{}{}", change.kind.prefix(), change.content)?;

            // A missing newline is only legitimate at the end of the hunk or
            // right before an edit, never inside a context run.
            if !change.has_newline {
                let next = self.changes.get(i + 1);
                if next.is_none_or(|next| next.kind != ChangeKind::Unchanged) {
                    writeln!(f, "{NO_NEWLINE_MARKER}")?;
                }
            }
        }

        Ok(())
    }
}
