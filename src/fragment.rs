//! Fragments of input text.
//!
//! All positions handed out by the crate are character (Unicode scalar) offsets into
//! the fragment's original text. `Fragment` keeps the byte boundary of every character
//! so those offsets can be turned back into string slices cheaply.

use std::fmt;

/// One immutable unit of text to scan, plus a label naming where it came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    text: String,
    origin: String,
    /// Byte offset of every character, followed by `text.len()`.
    boundaries: Vec<usize>,
}

impl Fragment {
    pub fn new(text: impl Into<String>, origin: impl Into<String>) -> Self {
        let text = text.into();
        let mut boundaries: Vec<usize> = text.char_indices().map(|(offset, _)| offset).collect();
        boundaries.push(text.len());
        Self {
            text,
            origin: origin.into(),
            boundaries,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// The source label used in error messages.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Number of characters in the fragment.
    pub fn char_len(&self) -> usize {
        self.boundaries.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// The character at `index`, or `None` past the end.
    pub fn char_at(&self, index: usize) -> Option<char> {
        let start = *self.boundaries.get(index)?;
        self.text[start..].chars().next()
    }

    /// Byte offset of the character at `index`; `char_len()` maps to the text length.
    pub fn byte_offset(&self, index: usize) -> usize {
        self.boundaries[index.min(self.char_len())]
    }

    /// Character index of the character starting at (or after) byte offset `byte`.
    pub fn char_index(&self, byte: usize) -> usize {
        self.boundaries.partition_point(|&boundary| boundary < byte)
    }

    /// The original text between two character offsets (clamped to the fragment).
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let end = end.min(self.char_len());
        let start = start.min(end);
        &self.text[self.boundaries[start]..self.boundaries[end]]
    }

    /// 1-based line and column of a character offset.
    pub fn line_col(&self, index: usize) -> (usize, usize) {
        let prefix = self.slice(0, index);
        let line = prefix.matches('\n').count() + 1;
        let column = match prefix.rfind('\n') {
            Some(newline) => prefix[newline + 1..].chars().count() + 1,
            None => prefix.chars().count() + 1,
        };
        (line, column)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slice_uses_character_offsets() {
        let fragment = Fragment::new("Café au lait", "test");
        assert_eq!(fragment.char_len(), 12);
        assert_eq!(fragment.slice(0, 4), "Café");
        assert_eq!(fragment.slice(5, 7), "au");
        assert_eq!(fragment.char_at(3), Some('é'));
        assert_eq!(fragment.char_at(12), None);
        assert_eq!(fragment.byte_offset(4), 5);
        assert_eq!(fragment.char_index(5), 4);
    }

    #[test]
    fn test_line_col_counts_from_one() {
        let fragment = Fragment::new("ab\ncd", "test");
        assert_eq!(fragment.line_col(0), (1, 1));
        assert_eq!(fragment.line_col(1), (1, 2));
        assert_eq!(fragment.line_col(3), (2, 1));
        assert_eq!(fragment.line_col(5), (2, 3));
    }
}
