//! The fragment scanning engine.
//!
//! One loop serves all three match policies. Matching is always attempted at the
//! leftmost unconsumed character; an emitted match is never revisited. Only the `Free`
//! policy skips whitespace or unmatched words, and only `Free` treats parse errors as
//! "no match here".

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ast::AstNode;
use crate::errors::ScanError;
use crate::fragment::Fragment;
use crate::parser::{ErrorRecord, ParseOutcome, Parser};

pub(crate) mod input;

use input::MatchInput;

// ============================================================================
// POLICY AND OPTIONS
// ============================================================================

/// How much of a fragment the grammar has to account for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchPolicy {
    /// The whole fragment is one match.
    Complete,
    /// Consecutive matches with no unmatched characters in between.
    Adjacent,
    /// Matches and unmatched text interleave freely.
    #[default]
    Free,
}

impl MatchPolicy {
    /// `adjacent` is ignored when `complete` is set.
    pub fn from_flags(complete: bool, adjacent: bool) -> Self {
        match (complete, adjacent) {
            (true, _) => MatchPolicy::Complete,
            (false, true) => MatchPolicy::Adjacent,
            (false, false) => MatchPolicy::Free,
        }
    }

    pub fn allows_unmatched_text(self) -> bool {
        self == MatchPolicy::Free
    }

    pub fn requires_end_of_input(self) -> bool {
        self == MatchPolicy::Complete
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScanOptions {
    pub policy: MatchPolicy,
    /// Under `Complete`/`Adjacent`, emit a parse error and stop instead of failing.
    pub tolerate_errors: bool,
    /// Match against the ASCII-folded text.
    pub fold_ascii: bool,
}

// ============================================================================
// EVENTS
// ============================================================================

/// One item of scan output, in fragment order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "lowercase")]
pub enum ScanEvent {
    Unmatched { start: usize, text: String },
    Matched { tree: AstNode },
    Error { record: ErrorRecord },
}

// ============================================================================
// ENGINE
// ============================================================================

/// Runs a parser over fragments under one set of options.
pub struct ScanEngine<'p> {
    parser: &'p dyn Parser,
    options: ScanOptions,
}

/// Unmatched characters collected up to the next match.
struct UnmatchedRun {
    start: usize,
    text: String,
}

impl UnmatchedRun {
    fn new() -> Self {
        Self {
            start: 0,
            text: String::new(),
        }
    }

    fn push(&mut self, position: usize, c: char) {
        if self.text.is_empty() {
            self.start = position;
        }
        self.text.push(c);
    }

    fn flush(&mut self, emit: &mut impl FnMut(ScanEvent)) {
        if !self.text.is_empty() {
            emit(ScanEvent::Unmatched {
                start: self.start,
                text: std::mem::take(&mut self.text),
            });
        }
    }
}

impl<'p> ScanEngine<'p> {
    pub fn new(parser: &'p dyn Parser, options: ScanOptions) -> Self {
        Self { parser, options }
    }

    pub fn options(&self) -> ScanOptions {
        self.options
    }

    /// Scans `fragment`, handing each event to `emit` as soon as it is known.
    ///
    /// Events emitted before an error stays emitted; buffered unmatched text is always
    /// flushed before the error event.
    pub fn scan_with(
        &self,
        fragment: &Fragment,
        mut emit: impl FnMut(ScanEvent),
    ) -> Result<(), ScanError> {
        let policy = self.options.policy;
        let input = MatchInput::new(fragment, self.options.fold_ascii);
        let end = fragment.char_len();
        let mut pos = 0;
        let mut unmatched = UnmatchedRun::new();

        debug!(origin = fragment.origin(), chars = end, ?policy, "scanning fragment");

        while pos < end {
            if policy.allows_unmatched_text() {
                while let Some(c) = fragment.char_at(pos).filter(|c| c.is_whitespace()) {
                    unmatched.push(pos, c);
                    pos += 1;
                }
                if pos == end {
                    break;
                }
            }

            let cursor = input.cursor(pos);
            let outcome = self
                .parser
                .parse_at(input.text(), cursor, policy.requires_end_of_input());

            match outcome {
                ParseOutcome::Error(record) if !policy.allows_unmatched_text() => {
                    unmatched.flush(&mut emit);
                    let record = input.relocate(&record);
                    emit(ScanEvent::Error {
                        record: record.clone(),
                    });
                    if self.options.tolerate_errors {
                        warn!(origin = fragment.origin(), %record, "tolerated parse error");
                        return Ok(());
                    }
                    return Err(ScanError::parse(fragment, record, pos));
                }
                ParseOutcome::Matched { tree, end: match_end } if match_end > cursor => {
                    unmatched.flush(&mut emit);
                    let tree = AstNode::from_match(&tree, match_end, &input, pos);
                    pos = tree.span().map_or(pos + 1, |(_, tree_end)| tree_end.max(pos + 1));
                    emit(ScanEvent::Matched { tree });
                }
                _ if policy.allows_unmatched_text() => {
                    pos = skip_unmatched(fragment, pos, &mut unmatched);
                }
                _ => {
                    return Err(ScanError::NoProgressPossible {
                        origin: fragment.origin().to_string(),
                        position: pos,
                    });
                }
            }
        }

        unmatched.flush(&mut emit);
        Ok(())
    }

    /// Scans `fragment` and collects the events.
    pub fn scan(&self, fragment: &Fragment) -> Result<Vec<ScanEvent>, ScanError> {
        let mut events = Vec::new();
        self.scan_with(fragment, |event| events.push(event))?;
        Ok(events)
    }
}

/// Moves one character into the unmatched run; a letter or digit takes the rest of its
/// word along so a word is never split over several unmatched runs.
fn skip_unmatched(fragment: &Fragment, mut pos: usize, unmatched: &mut UnmatchedRun) -> usize {
    let Some(first) = fragment.char_at(pos) else {
        return pos;
    };
    unmatched.push(pos, first);
    pos += 1;

    if first.is_alphanumeric() {
        while let Some(c) = fragment.char_at(pos).filter(|c| c.is_alphanumeric()) {
            unmatched.push(pos, c);
            pos += 1;
        }
    }
    pos
}

/// Convenience wrapper around `ScanEngine::scan`.
pub fn scan(
    parser: &dyn Parser,
    fragment: &Fragment,
    options: ScanOptions,
) -> Result<Vec<ScanEvent>, ScanError> {
    ScanEngine::new(parser, options).scan(fragment)
}
