//! Parsing of user selections into structured references.
//!
//! Two forms share the `FILE:LIST` shape:
//!
//! - line references, `file.nix:10,15,-20`, parsed by [`parse_file_refs`]
//! - hunk selectors, `file.nix:2,a3f9`, parsed by [`parse_hunk_refs`]
//!
//! # Line Reference Types
//!
//! - `N` - Addition at new line N
//! - `-N` - Deletion at old line N
//! - `N..M` - Range of additions (inclusive)
//! - `-N..-M` - Range of deletions (inclusive)
//!
//! # Examples
//!
//! ```
//! use git_hunks::parse::{parse_file_refs, parse_hunk_refs, LineRef, Selector};
//! use std::num::NonZeroU32;
//!
//! let refs = parse_file_refs("config.nix:10..15").unwrap();
//! assert_eq!(refs.refs, vec![LineRef::AddRange(
//!     NonZeroU32::new(10).unwrap(),
//!     NonZeroU32::new(15).unwrap()
//! )]);
//!
//! let hunks = parse_hunk_refs("config.nix:2,a3f9").unwrap();
//! assert_eq!(hunks.selectors, vec![
//!     Selector::Token("2".to_string()),
//!     Selector::Token("a3f9".to_string()),
//! ]);
//! ```

use error_set::error_set;
use std::fmt;
use std::num::NonZeroU32;

error_set! {
    /// Errors from parsing file:refs syntax
    ParseError := {
        /// Input string does not contain a colon separator
        #[display("Invalid format '{input}': expected 'file:refs'")]
        InvalidFormat { input: String },
        /// File name portion before the colon is empty or whitespace
        #[display("Invalid format '{input}': file name cannot be empty")]
        EmptyFileName { input: String },
        /// No references provided after the colon
        #[display("No references provided in '{input}'")]
        EmptyRefs { input: String },
        /// Line number could not be parsed as a valid non-zero u32
        #[display("Invalid line number '{value}'")]
        InvalidLineNumber { value: String },
        /// Range has start greater than end
        #[display("Invalid range {start}..{end}: start must be <= end")]
        InvalidRange { start: u32, end: u32 },
        /// One end of a range is a deletion and the other is not
        #[display("Range '{value}' mixes added and deleted lines")]
        MixedRange { value: String },
    }
}

/// A reference to specific lines to stage.
///
/// Additions reference new line numbers, deletions reference old line numbers.
#[derive(Debug, Clone, PartialEq)]
pub enum LineRef {
    /// Addition at new line number
    Add(NonZeroU32),
    /// Addition range (inclusive start and end)
    AddRange(NonZeroU32, NonZeroU32),
    /// Deletion at old line number
    Delete(NonZeroU32),
    /// Deletion range (inclusive start and end)
    DeleteRange(NonZeroU32, NonZeroU32),
}

impl LineRef {
    /// Whether this reference covers new line `line`
    pub fn selects_new(&self, line: u32) -> bool {
        match self {
            LineRef::Add(n) => n.get() == line,
            LineRef::AddRange(start, end) => (start.get()..=end.get()).contains(&line),
            _ => false,
        }
    }

    /// Whether this reference covers old line `line`
    pub fn selects_old(&self, line: u32) -> bool {
        match self {
            LineRef::Delete(n) => n.get() == line,
            LineRef::DeleteRange(start, end) => (start.get()..=end.get()).contains(&line),
            _ => false,
        }
    }
}

impl fmt::Display for LineRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineRef::Add(n) => write!(f, "{n}"),
            LineRef::AddRange(start, end) => write!(f, "{start}..{end}"),
            LineRef::Delete(n) => write!(f, "-{n}"),
            LineRef::DeleteRange(start, end) => write!(f, "-{start}..-{end}"),
        }
    }
}

/// Parsed file reference with line selections.
#[derive(Debug, Clone, PartialEq)]
pub struct FileLineRefs {
    /// The file path
    pub file: String,
    /// The line references to stage from this file
    pub refs: Vec<LineRef>,
}

/// A way of naming one hunk in the current listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selector {
    /// 1-based position in the current listing
    Index(usize),
    /// Tried as an exact hunk id first, then as a position
    Token(String),
}

impl fmt::Display for Selector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Selector::Index(n) => write!(f, "{n}"),
            Selector::Token(token) => f.write_str(token),
        }
    }
}

/// Parsed file reference with hunk selectors
#[derive(Debug, Clone, PartialEq)]
pub struct FileHunkRefs {
    pub file: String,
    pub selectors: Vec<Selector>,
}

/// Split `FILE:LIST` at the last colon
fn split_file_ref(input: &str) -> Result<(&str, &str), ParseError> {
    let (file, list) = input.rsplit_once(':').ok_or_else(|| ParseError::InvalidFormat {
        input: input.to_string(),
    })?;

    let file = file.trim();
    if file.is_empty() {
        return Err(ParseError::EmptyFileName {
            input: input.to_string(),
        });
    }
    Ok((file, list))
}

/// Comma-separated, trimmed, non-empty items
fn split_list(list: &str) -> impl Iterator<Item = &str> {
    list.split(',').map(str::trim).filter(|part| !part.is_empty())
}

/// Parse a file:refs string into structured data.
///
/// # Format
///
/// `FILE:REFS` where REFS is a comma-separated list of:
/// - `N` - Addition at line N
/// - `-N` - Deletion of line N
/// - `N..M` - Addition range
/// - `-N..-M` - Deletion range
///
/// # Examples
///
/// ```
/// use git_hunks::parse::{parse_file_refs, LineRef};
/// use std::num::NonZeroU32;
///
/// let refs = parse_file_refs("file.nix:10,15,-20").unwrap();
/// assert_eq!(refs.refs, vec![
///     LineRef::Add(NonZeroU32::new(10).unwrap()),
///     LineRef::Add(NonZeroU32::new(15).unwrap()),
///     LineRef::Delete(NonZeroU32::new(20).unwrap())
/// ]);
/// ```
///
/// # Errors
///
/// Returns [`ParseError`] if:
/// - Input doesn't contain `:` separator
/// - File name is empty or whitespace
/// - No line references provided
/// - Line numbers are invalid
pub fn parse_file_refs(input: &str) -> Result<FileLineRefs, ParseError> {
    let (file, list) = split_file_ref(input)?;

    let refs = split_list(list)
        .map(parse_single_ref)
        .collect::<Result<Vec<_>, _>>()?;

    if refs.is_empty() {
        return Err(ParseError::EmptyRefs {
            input: input.to_string(),
        });
    }

    Ok(FileLineRefs {
        file: file.to_string(),
        refs,
    })
}

/// Parse a `FILE:SEL,SEL` string of hunk ids or positions.
///
/// Selectors are kept as tokens; whether a token is an id or a position is
/// only decided against the live listing.
pub fn parse_hunk_refs(input: &str) -> Result<FileHunkRefs, ParseError> {
    let (file, list) = split_file_ref(input)?;

    let selectors: Vec<Selector> = split_list(list)
        .map(|token| Selector::Token(token.to_string()))
        .collect();

    if selectors.is_empty() {
        return Err(ParseError::EmptyRefs {
            input: input.to_string(),
        });
    }

    Ok(FileHunkRefs {
        file: file.to_string(),
        selectors,
    })
}

/// `N` or `-N`; the flag is true for the deletion form
fn parse_number(input: &str) -> Result<(bool, NonZeroU32), ParseError> {
    let (deletion, digits) = match input.strip_prefix('-') {
        Some(digits) => (true, digits),
        None => (false, input),
    };
    let line = digits
        .parse::<NonZeroU32>()
        .map_err(|_| ParseError::InvalidLineNumber {
            value: input.to_string(),
        })?;
    Ok((deletion, line))
}

/// One item of a line list: `N`, `-N`, `N..M` or `-N..-M`
fn parse_single_ref(input: &str) -> Result<LineRef, ParseError> {
    let Some((first, last)) = input.split_once("..") else {
        return Ok(match parse_number(input)? {
            (true, line) => LineRef::Delete(line),
            (false, line) => LineRef::Add(line),
        });
    };

    let (deletion, start) = parse_number(first)?;
    let (end_deletion, end) = parse_number(last)?;
    if deletion != end_deletion {
        return Err(ParseError::MixedRange {
            value: input.to_string(),
        });
    }
    if start > end {
        return Err(ParseError::InvalidRange {
            start: start.get(),
            end: end.get(),
        });
    }

    Ok(if deletion {
        LineRef::DeleteRange(start, end)
    } else {
        LineRef::AddRange(start, end)
    })
}
