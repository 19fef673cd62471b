//! The text a parser actually sees, and the way back to the fragment.
//!
//! Without folding the match text is the fragment itself. With folding it is the
//! ASCII-folded copy plus, for every folded character, the index of the original
//! character it came from. Offsets reported by the parser are bytes of the match text;
//! everything leaving the scan engine is a character offset into the fragment.

use crate::fragment::Fragment;
use crate::normalize::normalize_char;
use crate::parser::ErrorRecord;

struct Folded {
    text: String,
    /// Byte offset of every folded character, followed by `text.len()`.
    bytes: Vec<usize>,
    /// Original character index of every folded character, followed by the fragment length.
    origins: Vec<usize>,
}

impl Folded {
    fn new(fragment: &Fragment) -> Self {
        let mut text = String::with_capacity(fragment.text().len());
        let mut bytes = Vec::with_capacity(fragment.char_len() + 1);
        let mut origins = Vec::with_capacity(fragment.char_len() + 1);

        for (index, c) in fragment.text().chars().enumerate() {
            if let Some(folded) = normalize_char(c) {
                bytes.push(text.len());
                origins.push(index);
                text.push(folded);
            }
        }
        bytes.push(text.len());
        origins.push(fragment.char_len());

        Self {
            text,
            bytes,
            origins,
        }
    }
}

pub(crate) struct MatchInput<'f> {
    fragment: &'f Fragment,
    folded: Option<Folded>,
}

impl<'f> MatchInput<'f> {
    pub(crate) fn new(fragment: &'f Fragment, fold: bool) -> Self {
        Self {
            fragment,
            folded: fold.then(|| Folded::new(fragment)),
        }
    }

    pub(crate) fn text(&self) -> &str {
        match &self.folded {
            Some(folded) => &folded.text,
            None => self.fragment.text(),
        }
    }

    /// Byte offset in the match text where an attempt at fragment character `index` starts.
    ///
    /// Characters dropped by folding are skipped over.
    pub(crate) fn cursor(&self, index: usize) -> usize {
        match &self.folded {
            Some(folded) => {
                let k = folded.origins.partition_point(|&origin| origin < index);
                folded.bytes[k]
            }
            None => self.fragment.byte_offset(index),
        }
    }

    /// Fragment character offset of a byte offset in the match text.
    pub(crate) fn original(&self, byte: usize) -> usize {
        match &self.folded {
            Some(folded) => {
                let k = folded.bytes.partition_point(|&b| b < byte);
                folded.origins[k.min(folded.origins.len() - 1)]
            }
            None => self.fragment.char_index(byte),
        }
    }

    /// Re-expresses a parser error against the fragment.
    pub(crate) fn relocate(&self, record: &ErrorRecord) -> ErrorRecord {
        let position = self.original(record.position);
        let (line, column) = self.fragment.line_col(position);
        ErrorRecord {
            nonterminal: record.nonterminal.clone(),
            line,
            column,
            position,
            message: record.message.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_input_maps_bytes_to_characters() {
        let fragment = Fragment::new("Café 12", "test");
        let input = MatchInput::new(&fragment, false);
        assert_eq!(input.text(), "Café 12");
        assert_eq!(input.cursor(5), 6);
        assert_eq!(input.original(6), 5);
        assert_eq!(input.original(8), 7);
    }

    #[test]
    fn test_folded_input_keeps_origins() {
        let fragment = Fragment::new("Café 12", "test");
        let input = MatchInput::new(&fragment, true);
        assert_eq!(input.text(), "Cafe 12");
        assert_eq!(input.cursor(5), 5);
        assert_eq!(input.original(4), 4);
        assert_eq!(input.original(7), 7);
    }

    #[test]
    fn test_dropped_characters_are_skipped() {
        let fragment = Fragment::new("a→b", "test");
        let input = MatchInput::new(&fragment, true);
        assert_eq!(input.text(), "ab");
        assert_eq!(input.cursor(1), 1);
        assert_eq!(input.original(1), 2);
        assert_eq!(input.original(2), 3);
    }

    #[test]
    fn test_relocated_error_uses_fragment_lines() {
        let fragment = Fragment::new("é\nxy", "test");
        let input = MatchInput::new(&fragment, false);
        let record = ErrorRecord {
            nonterminal: "n".into(),
            line: 0,
            column: 0,
            position: 4,
            message: "boom".into(),
        };
        let relocated = input.relocate(&record);
        assert_eq!(relocated.position, 3);
        assert_eq!((relocated.line, relocated.column), (2, 2));
    }
}
