//! Matched trees.
//!
//! An `AstNode` tree is the output of one successful match, expressed in character
//! offsets of the original fragment. Every character inside a nonterminal that no
//! child nonterminal covers is present as a `Terminal`, so a tree always accounts for
//! exactly the text it spans.

use std::fmt::Write as _;

use serde::Serialize;

use crate::fragment::Fragment;
use crate::parser::ParseNode;
use crate::scan::input::MatchInput;

/// Rule name pest gives the zero-width end-of-input match.
const END_OF_INPUT: &str = "EOI";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum AstNode {
    Nonterminal {
        tag: String,
        start: usize,
        end: usize,
        children: Vec<AstNode>,
    },
    /// One source character, by offset.
    Terminal(usize),
    /// A zero-width marker such as end of input.
    Empty,
}

impl AstNode {
    /// Lifts a parser tree into fragment coordinates.
    ///
    /// The root is pinned to `[start, original(end))` so text skipped by folding at
    /// either edge belongs to the match.
    pub(crate) fn from_match(tree: &ParseNode, end: usize, input: &MatchInput<'_>, start: usize) -> Self {
        let end = input.original(end).max(start);
        lift(tree, input, Some((start, end)))
    }

    /// `[start, end)` character span; `None` for `Empty`.
    pub fn span(&self) -> Option<(usize, usize)> {
        match self {
            AstNode::Nonterminal { start, end, .. } => Some((*start, *end)),
            AstNode::Terminal(offset) => Some((*offset, offset + 1)),
            AstNode::Empty => None,
        }
    }

    pub fn tag(&self) -> Option<&str> {
        match self {
            AstNode::Nonterminal { tag, .. } => Some(tag),
            _ => None,
        }
    }

    pub fn children(&self) -> &[AstNode] {
        match self {
            AstNode::Nonterminal { children, .. } => children,
            _ => &[],
        }
    }

    /// Indented dump of the tree, used for the parse-tree diagnostic comment.
    pub fn dump(&self, fragment: &Fragment) -> String {
        let mut out = String::new();
        dump_node(self, fragment, 0, &mut out);
        out
    }
}

fn lift(node: &ParseNode, input: &MatchInput<'_>, bounds: Option<(usize, usize)>) -> AstNode {
    let (start, end) =
        bounds.unwrap_or_else(|| (input.original(node.start), input.original(node.end)));

    if node.tag == END_OF_INPUT && start == end && node.children.is_empty() {
        return AstNode::Empty;
    }

    let mut children = Vec::with_capacity(node.children.len());
    let mut cursor = start;
    for child in &node.children {
        let lifted = lift(child, input, None);
        if let Some((child_start, child_end)) = lifted.span() {
            let child_start = child_start.clamp(cursor, end);
            children.extend((cursor..child_start).map(AstNode::Terminal));
            cursor = cursor.max(child_end.min(end));
        }
        children.push(lifted);
    }
    children.extend((cursor..end).map(AstNode::Terminal));

    AstNode::Nonterminal {
        tag: node.tag.clone(),
        start,
        end,
        children,
    }
}

fn dump_node(node: &AstNode, fragment: &Fragment, depth: usize, out: &mut String) {
    let indent = "  ".repeat(depth);
    match node {
        AstNode::Nonterminal {
            tag,
            start,
            end,
            children,
        } => {
            let _ = writeln!(out, "{indent}{tag} [{start}, {end})");
            let mut run: Option<(usize, usize)> = None;
            for child in children {
                match child {
                    AstNode::Terminal(offset) => match run.as_mut() {
                        Some((_, run_end)) if *run_end == *offset => *run_end += 1,
                        _ => {
                            flush_run(run.take(), fragment, depth + 1, out);
                            run = Some((*offset, offset + 1));
                        }
                    },
                    other => {
                        flush_run(run.take(), fragment, depth + 1, out);
                        dump_node(other, fragment, depth + 1, out);
                    }
                }
            }
            flush_run(run, fragment, depth + 1, out);
        }
        AstNode::Terminal(offset) => flush_run(Some((*offset, offset + 1)), fragment, depth, out),
        AstNode::Empty => {
            let _ = writeln!(out, "{indent}<empty>");
        }
    }
}

fn flush_run(run: Option<(usize, usize)>, fragment: &Fragment, depth: usize, out: &mut String) {
    if let Some((start, end)) = run {
        let _ = writeln!(out, "{}{:?}", "  ".repeat(depth), fragment.slice(start, end));
    }
}
