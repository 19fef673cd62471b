//! An `EventSink` that serializes events as XML-style markup.

use super::{Attribute, EventSink};

/// Accumulates markup in a string.
#[derive(Debug, Default)]
pub struct MarkupWriter {
    out: String,
}

impl MarkupWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn as_str(&self) -> &str {
        &self.out
    }

    pub fn into_string(self) -> String {
        self.out
    }
}

impl EventSink for MarkupWriter {
    fn structure_start(&mut self, tag: &str, attributes: &[Attribute]) {
        self.out.push('<');
        self.out.push_str(tag);
        for attribute in attributes {
            self.out.push(' ');
            self.out.push_str(attribute.name);
            self.out.push_str("=\"");
            escape_into(&attribute.value, true, &mut self.out);
            self.out.push('"');
        }
        self.out.push('>');
    }

    fn structure_end(&mut self, tag: &str) {
        self.out.push_str("</");
        self.out.push_str(tag);
        self.out.push('>');
    }

    fn text(&mut self, text: &str) {
        escape_into(text, false, &mut self.out);
    }

    fn comment(&mut self, text: &str) {
        // A comment may neither contain "--" nor end in "-".
        self.out.push_str("<!--");
        let mut chars = text.chars().peekable();
        while let Some(c) = chars.next() {
            self.out.push(c);
            if c == '-' && chars.peek().map_or(true, |next| *next == '-') {
                self.out.push(' ');
            }
        }
        self.out.push_str("-->");
    }
}

fn escape_into(text: &str, in_attribute: bool, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' if in_attribute => out.push_str("&quot;"),
            '\n' if in_attribute => out.push_str("&#10;"),
            _ => out.push(c),
        }
    }
}
