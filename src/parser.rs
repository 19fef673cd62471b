//! The contract every generated parser satisfies.
//!
//! A `Parser` attempts one match starting at a cursor and reports a `ParseOutcome`.
//! Positions in `ParseNode` and in the `ErrorRecord` it returns are byte offsets into
//! the text it was given; the scan engine translates them back to the fragment.

use std::fmt;

use serde::Serialize;

/// A rule match reported by a parser: rule name, byte span and nested rule matches.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseNode {
    pub tag: String,
    pub start: usize,
    pub end: usize,
    pub children: Vec<ParseNode>,
}

impl ParseNode {
    pub fn new(tag: impl Into<String>, start: usize, end: usize, children: Vec<ParseNode>) -> Self {
        Self {
            tag: tag.into(),
            start,
            end,
            children,
        }
    }
}

/// A parse error as reported by the parser.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorRecord {
    /// The nonterminal that was being attempted.
    pub nonterminal: String,
    pub line: usize,
    pub column: usize,
    /// Absolute offset of the error.
    pub position: usize,
    pub message: String,
}

impl fmt::Display for ErrorRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} (while parsing {} at line {}, column {}, position {})",
            self.message, self.nonterminal, self.line, self.column, self.position
        )
    }
}

/// Result of one match attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseOutcome {
    /// A match consuming input up to `end`.
    Matched { tree: ParseNode, end: usize },
    /// The grammar matched without consuming anything.
    EmptyMatch,
    Error(ErrorRecord),
    /// The parser produced neither a tree nor an error.
    NoMatchPossible,
}

/// A ready-to-use parser.
///
/// Implementations keep no per-call state, so one instance may serve any number of
/// concurrent scans.
pub trait Parser: Send + Sync {
    /// Name of the rule every attempt starts from.
    fn entry_rule(&self) -> &str;

    /// Attempts one match of the entry rule at byte offset `pos` of `input`.
    ///
    /// With `eof_required` the match must extend to the end of `input`.
    fn parse_at(&self, input: &str, pos: usize, eof_required: bool) -> ParseOutcome;
}

/// 1-based line and column of a byte offset.
pub(crate) fn line_col(input: &str, offset: usize) -> (usize, usize) {
    let prefix = input.get(..offset).unwrap_or(input);
    let line = prefix.matches('\n').count() + 1;
    let line_start = prefix.rfind('\n').map_or(0, |newline| newline + 1);
    (line, prefix[line_start..].chars().count() + 1)
}
