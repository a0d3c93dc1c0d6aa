/// What a single diff line does to the file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    /// `+` line, present only in the new version
    Added,
    /// `-` line, present only in the old version
    Deleted,
    /// ` ` context line, present in both versions
    Unchanged,
}

impl ChangeKind {
    /// Prefix character used in unified diff output
    pub fn prefix(self) -> char {
        match self {
            ChangeKind::Added => '+',
            ChangeKind::Deleted => '-',
            ChangeKind::Unchanged => ' ',
        }
    }

    /// Whether the line occupies a slot in the old file numbering
    pub fn in_old(self) -> bool {
        matches!(self, ChangeKind::Deleted | ChangeKind::Unchanged)
    }

    /// Whether the line occupies a slot in the new file numbering
    pub fn in_new(self) -> bool {
        matches!(self, ChangeKind::Added | ChangeKind::Unchanged)
    }
}

/// One line of a hunk.
///
/// `has_newline` is false only for the final physical line of the region it
/// belongs to, i.e. the line followed by `\ No newline at end of file`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Change {
    pub kind: ChangeKind,
    pub content: String,
    pub has_newline: bool,
}

impl Change {
    pub fn new(kind: ChangeKind, content: impl Into<String>) -> Self {
        Self {
            kind,
            content: content.into(),
            has_newline: true,
        }
    }

    pub fn added(content: impl Into<String>) -> Self {
        Self::new(ChangeKind::Added, content)
    }

    pub fn deleted(content: impl Into<String>) -> Self {
        Self::new(ChangeKind::Deleted, content)
    }

    pub fn unchanged(content: impl Into<String>) -> Self {
        Self::new(ChangeKind::Unchanged, content)
    }

    /// Mark this line as the last line of a file lacking a trailing newline
    #[must_use]
    pub fn without_newline(mut self) -> Self {
        self.has_newline = false;
        self
    }

    /// Whether this line is an edit rather than context
    pub fn is_edit(&self) -> bool {
        self.kind != ChangeKind::Unchanged
    }
}
