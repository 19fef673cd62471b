//! Rendering scan output as nested structure events.
//!
//! `TreeEmitter` walks matched trees depth-first and error records, and drives an
//! `EventSink`. Start and end events are always balanced.

use serde::Serialize;

use crate::ast::AstNode;
use crate::fragment::Fragment;
use crate::parser::ErrorRecord;
use crate::scan::ScanEvent;

pub mod markup;

pub use markup::MarkupWriter;

/// Element wrapping a rendered parse error.
pub const ERROR_ELEMENT_TAG: &str = "ERROR";
/// Empty element marking the error position inside the error element.
pub const MARKER_ELEMENT_TAG: &str = "ERROR_POSITION";

// ============================================================================
// SINK INTERFACE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attribute {
    pub name: &'static str,
    pub value: String,
}

impl Attribute {
    pub fn new(name: &'static str, value: impl ToString) -> Self {
        Self {
            name,
            value: value.to_string(),
        }
    }
}

/// Receiver of rendered output, typically the hosting document pipeline.
pub trait EventSink {
    fn structure_start(&mut self, tag: &str, attributes: &[Attribute]);
    fn structure_end(&mut self, tag: &str);
    fn text(&mut self, text: &str);
    /// Only used for the parse-tree diagnostic.
    fn comment(&mut self, text: &str);
}

/// A sink event as recorded by `RecordingSink`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SinkEvent {
    Start {
        tag: String,
        attributes: Vec<(String, String)>,
    },
    End {
        tag: String,
    },
    Text {
        text: String,
    },
    Comment {
        text: String,
    },
}

/// Collects events in memory; handy for tests and JSON output.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RecordingSink {
    pub events: Vec<SinkEvent>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// Concatenation of all text events.
    pub fn text(&self) -> String {
        self.events
            .iter()
            .filter_map(|event| match event {
                SinkEvent::Text { text } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for RecordingSink {
    fn structure_start(&mut self, tag: &str, attributes: &[Attribute]) {
        self.events.push(SinkEvent::Start {
            tag: tag.to_string(),
            attributes: attributes
                .iter()
                .map(|attribute| (attribute.name.to_string(), attribute.value.clone()))
                .collect(),
        });
    }

    fn structure_end(&mut self, tag: &str) {
        self.events.push(SinkEvent::End {
            tag: tag.to_string(),
        });
    }

    fn text(&mut self, text: &str) {
        self.events.push(SinkEvent::Text {
            text: text.to_string(),
        });
    }

    fn comment(&mut self, text: &str) {
        self.events.push(SinkEvent::Comment {
            text: text.to_string(),
        });
    }
}

// ============================================================================
// TREE EMITTER
// ============================================================================

/// Renders scan events of one fragment. Text always comes from the fragment itself,
/// never from the (possibly folded) text the parser matched.
pub struct TreeEmitter<'f> {
    fragment: &'f Fragment,
}

impl<'f> TreeEmitter<'f> {
    pub fn new(fragment: &'f Fragment) -> Self {
        Self { fragment }
    }

    pub fn render_event(&self, event: &ScanEvent, sink: &mut dyn EventSink) {
        match event {
            ScanEvent::Unmatched { text, .. } => send_text(sink, text),
            ScanEvent::Matched { tree } => self.render_tree(tree, sink),
            ScanEvent::Error { record } => self.render_error(record, sink),
        }
    }

    pub fn render_tree(&self, node: &AstNode, sink: &mut dyn EventSink) {
        let mut run = None;
        self.visit(node, &mut run, sink);
        self.flush(&mut run, sink);
    }

    /// Renders an error block: attributes describing the error, then the whole
    /// fragment split at the error position around an empty marker element.
    pub fn render_error(&self, record: &ErrorRecord, sink: &mut dyn EventSink) {
        let attributes = [
            Attribute::new("NT", &record.nonterminal),
            Attribute::new("line", record.line),
            Attribute::new("column", record.column),
            Attribute::new("position", record.position),
            Attribute::new("message", &record.message),
        ];
        sink.structure_start(ERROR_ELEMENT_TAG, &attributes);
        send_text(sink, self.fragment.slice(0, record.position));
        sink.structure_start(MARKER_ELEMENT_TAG, &[]);
        sink.structure_end(MARKER_ELEMENT_TAG);
        send_text(sink, self.fragment.slice(record.position, self.fragment.char_len()));
        sink.structure_end(ERROR_ELEMENT_TAG);
    }

    fn visit(&self, node: &AstNode, run: &mut Option<(usize, usize)>, sink: &mut dyn EventSink) {
        match node {
            AstNode::Nonterminal {
                tag,
                start,
                end,
                children,
            } => {
                self.flush(run, sink);
                sink.structure_start(
                    tag,
                    &[Attribute::new("start", start), Attribute::new("end", end)],
                );
                for child in children {
                    self.visit(child, run, sink);
                }
                self.flush(run, sink);
                sink.structure_end(tag);
            }
            AstNode::Terminal(offset) => match run {
                Some((_, run_end)) if *run_end == *offset => *run_end += 1,
                _ => {
                    self.flush(run, sink);
                    *run = Some((*offset, offset + 1));
                }
            },
            AstNode::Empty => self.flush(run, sink),
        }
    }

    fn flush(&self, run: &mut Option<(usize, usize)>, sink: &mut dyn EventSink) {
        if let Some((start, end)) = run.take() {
            send_text(sink, self.fragment.slice(start, end));
        }
    }
}

fn send_text(sink: &mut dyn EventSink, text: &str) {
    if !text.is_empty() {
        sink.text(text);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn start(tag: &str, attributes: &[(&str, &str)]) -> SinkEvent {
        SinkEvent::Start {
            tag: tag.into(),
            attributes: attributes
                .iter()
                .map(|(name, value)| (name.to_string(), value.to_string()))
                .collect(),
        }
    }

    fn end(tag: &str) -> SinkEvent {
        SinkEvent::End { tag: tag.into() }
    }

    fn text(text: &str) -> SinkEvent {
        SinkEvent::Text { text: text.into() }
    }

    #[test]
    fn test_nested_tree_renders_balanced_events() {
        let fragment = Fragment::new("a+b", "test");
        let tree = AstNode::Nonterminal {
            tag: "sum".into(),
            start: 0,
            end: 3,
            children: vec![
                AstNode::Nonterminal {
                    tag: "x".into(),
                    start: 0,
                    end: 1,
                    children: vec![AstNode::Terminal(0)],
                },
                AstNode::Terminal(1),
                AstNode::Terminal(2),
            ],
        };
        let mut sink = RecordingSink::new();
        TreeEmitter::new(&fragment).render_tree(&tree, &mut sink);

        assert_eq!(
            sink.events,
            vec![
                start("sum", &[("start", "0"), ("end", "3")]),
                start("x", &[("start", "0"), ("end", "1")]),
                text("a"),
                end("x"),
                text("+b"),
                end("sum"),
            ]
        );
    }

    #[test]
    fn test_error_block_splits_fragment_at_marker() {
        let fragment = Fragment::new("1a", "test");
        let record = ErrorRecord {
            nonterminal: "int".into(),
            line: 1,
            column: 2,
            position: 1,
            message: "expected end of input".into(),
        };
        let mut sink = RecordingSink::new();
        TreeEmitter::new(&fragment).render_error(&record, &mut sink);

        assert_eq!(
            sink.events,
            vec![
                start(
                    "ERROR",
                    &[
                        ("NT", "int"),
                        ("line", "1"),
                        ("column", "2"),
                        ("position", "1"),
                        ("message", "expected end of input"),
                    ]
                ),
                text("1"),
                start("ERROR_POSITION", &[]),
                end("ERROR_POSITION"),
                text("a"),
                end("ERROR"),
            ]
        );
    }

    #[test]
    fn test_error_at_start_omits_empty_text() {
        let fragment = Fragment::new("x", "test");
        let record = ErrorRecord {
            nonterminal: "int".into(),
            line: 1,
            column: 1,
            position: 0,
            message: "expected int".into(),
        };
        let mut sink = RecordingSink::new();
        TreeEmitter::new(&fragment).render_error(&record, &mut sink);
        assert_eq!(sink.events[1], start("ERROR_POSITION", &[]));
        assert_eq!(sink.text(), "x");
    }
}
