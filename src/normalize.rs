//! ASCII folding of accented letters, ligatures and typographic variants.
//!
//! Folding is a per-character map: every character becomes at most one character, so
//! the result is never longer than the input and keeps its order. ASCII passes through,
//! smart quotes and dashes fold to `'`, `"` and `-`, letters found in the fold table
//! become their plain-ASCII base letter, and anything else is dropped.

use std::collections::HashMap;

use once_cell::sync::Lazy;

// ============================================================================
// FOLD TABLE
// ============================================================================

/// Characters grouped by the ASCII letter they fold to.
const LETTER_FOLDS: &[(&str, char)] = &[
    ("ÀÁÂÃÄÅĀĂĄǍǞẠẢẤẦẨẪẬẮẰẲẴẶÆ", 'A'),
    ("àáâãäåāăąǎǟạảấầẩẫậắằẳẵặæª", 'a'),
    ("Ɓ", 'B'),
    ("ƀ", 'b'),
    ("ÇĆĈĊČƇ", 'C'),
    ("çćĉċčƈ", 'c'),
    ("ÐĎĐƊ", 'D'),
    ("ðďđ", 'd'),
    ("ÈÉÊËĒĔĖĘĚẸẺẼẾỀỂỄỆ", 'E'),
    ("èéêëēĕėęěẹẻẽếềểễệ", 'e'),
    ("Ƒ", 'F'),
    ("ƒﬀﬁﬂﬃﬄ", 'f'),
    ("ĜĞĠĢƓǦǴ", 'G'),
    ("ĝğġģǧǵ", 'g'),
    ("ĤĦ", 'H'),
    ("ĥħ", 'h'),
    ("ÌÍÎÏĨĪĬĮİƗǏỈỊĲ", 'I'),
    ("ìíîïĩīĭįıǐỉịĳ", 'i'),
    ("Ĵ", 'J'),
    ("ĵǰ", 'j'),
    ("ĶƘǨ", 'K'),
    ("ķĸƙǩ", 'k'),
    ("ĹĻĽĿŁ", 'L'),
    ("ĺļľŀłƚ", 'l'),
    ("ÑŃŅŇŊƝǸ", 'N'),
    ("ñńņňŉŋƞǹ", 'n'),
    ("ÒÓÔÕÖØŌŎŐƠǑǪỌỎỐỒỔỖỘỚỜỞỠỢŒ", 'O'),
    ("òóôõöøōŏőơǒǫọỏốồổỗộớờởỡợœº", 'o'),
    ("Ƥ", 'P'),
    ("ƥ", 'p'),
    ("ŔŖŘ", 'R'),
    ("ŕŗř", 'r'),
    ("ŚŜŞŠȘ", 'S'),
    ("śŝşšșſßﬅﬆ", 's'),
    ("ŢŤŦƬƮȚÞ", 'T'),
    ("ţťŧƫƭțþ", 't'),
    ("ÙÚÛÜŨŪŬŮŰŲƯǓǕǗǙǛỤỦỨỪỬỮỰ", 'U'),
    ("ùúûüũūŭůűųưǔǖǘǚǜụủứừửữự", 'u'),
    ("Ʋ", 'V'),
    ("ŴẀẂẄ", 'W'),
    ("ŵẁẃẅ", 'w'),
    ("ÝŶŸƳỲỴỶỸ", 'Y'),
    ("ýÿŷƴỳỵỷỹ", 'y'),
    ("ŹŻŽƵ", 'Z'),
    ("źżžƶ", 'z'),
    ("⁰₀", '0'),
    ("¹₁", '1'),
    ("²₂", '2'),
    ("³₃", '3'),
    ("⁴₄", '4'),
    ("⁵₅", '5'),
    ("⁶₆", '6'),
    ("⁷₇", '7'),
    ("⁸₈", '8'),
    ("⁹₉", '9'),
];

/// Typographic variants folded before the letter table is consulted.
const PUNCTUATION_FOLDS: &[(&str, char)] = &[
    ("\u{2018}`\u{2032}\u{00B4}\u{2019}", '\''),
    ("\u{201C}\u{201D}", '"'),
    ("\u{2010}\u{2011}\u{2012}\u{2013}\u{2014}\u{2015}\u{2212}", '-'),
    (
        "\u{00A0}\u{2000}\u{2001}\u{2002}\u{2003}\u{2004}\u{2005}\u{2006}\u{2007}\u{2008}\u{2009}\u{200A}\u{202F}\u{205F}\u{3000}",
        ' ',
    ),
];

static LETTER_TABLE: Lazy<HashMap<char, char>> = Lazy::new(|| build_table(LETTER_FOLDS));
static PUNCTUATION_TABLE: Lazy<HashMap<char, char>> =
    Lazy::new(|| build_table(PUNCTUATION_FOLDS));

fn build_table(groups: &[(&str, char)]) -> HashMap<char, char> {
    groups
        .iter()
        .flat_map(|(sources, target)| sources.chars().map(move |source| (source, *target)))
        .collect()
}

/// Fullwidth forms U+FF01..=U+FF5E mirror printable ASCII at a fixed distance.
fn fold_fullwidth(c: char) -> Option<char> {
    match c {
        '\u{FF01}'..='\u{FF5E}' => char::from_u32(c as u32 - 0xFEE0),
        _ => None,
    }
}

// ============================================================================
// PUBLIC API
// ============================================================================

/// Folds one character to ASCII; `None` means the character is dropped.
pub fn normalize_char(c: char) -> Option<char> {
    if let Some(folded) = PUNCTUATION_TABLE.get(&c) {
        return Some(*folded);
    }
    if c.is_ascii() {
        return Some(c);
    }
    LETTER_TABLE.get(&c).copied().or_else(|| fold_fullwidth(c))
}

/// Folds a whole string to ASCII. Idempotent: `normalize(&normalize(s)) == normalize(s)`.
pub fn normalize(text: &str) -> String {
    text.chars().filter_map(normalize_char).collect()
}

/// True for ASCII letters, digits and the space character.
pub fn is_low_ascii_without_punctuation(c: char) -> bool {
    (c.is_alphanumeric() || c == ' ') && (' '..='~').contains(&c)
}

/// Folds table letters to ASCII, then keeps only ASCII letters, digits and spaces.
pub fn to_low_ascii_without_punctuation(text: &str) -> String {
    text.chars()
        .filter_map(|c| {
            let c = LETTER_TABLE.get(&c).copied().unwrap_or(c);
            is_low_ascii_without_punctuation(c).then_some(c)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accented_letters_fold_to_base_letter() {
        assert_eq!(normalize("Café"), "Cafe");
        assert_eq!(normalize("Ångström"), "Angstrom");
        assert_eq!(normalize("Łódź"), "Lodz");
        assert_eq!(normalize("Tiếng Việt"), "Tieng Viet");
    }

    #[test]
    fn test_ligatures_fold_to_one_letter() {
        assert_eq!(normalize("Æon"), "Aon");
        assert_eq!(normalize("œuvre"), "ouvre");
        assert_eq!(normalize("ﬁle"), "fle");
        assert_eq!(normalize("Straße"), "Strase");
    }

    #[test]
    fn test_quotes_and_dashes_fold_to_ascii() {
        assert_eq!(normalize("\u{2018}x\u{2019}"), "'x'");
        assert_eq!(normalize("\u{201C}y\u{201D}"), "\"y\"");
        assert_eq!(normalize("1\u{2013}2\u{2014}3"), "1-2-3");
        assert_eq!(normalize("`tick`"), "'tick'");
    }

    #[test]
    fn test_unknown_characters_are_dropped() {
        assert_eq!(normalize("a→b"), "ab");
        assert_eq!(normalize("日本"), "");
        assert_eq!(normalize_char('€'), None);
    }

    #[test]
    fn test_fullwidth_and_spaces() {
        assert_eq!(normalize("ＡＢ１"), "AB1");
        assert_eq!(normalize("10\u{00A0}km"), "10 km");
    }

    #[test]
    fn test_ascii_passes_through_unchanged() {
        let text = "plain ASCII, with\ttabs\nand 123 digits!";
        assert_eq!(normalize(text), text);
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for text in ["Café “quoted” — naïve", "ﬁnal ＦＯＯ ß", "ascii only", "日本語 x"] {
            let once = normalize(text);
            assert_eq!(normalize(&once), once);
        }
    }

    #[test]
    fn test_normalize_never_grows() {
        for text in ["Œuvre ﬃ", "¹²³", "—–-"] {
            assert!(normalize(text).chars().count() <= text.chars().count());
        }
    }

    #[test]
    fn test_normalize_char_matches_string_form() {
        for c in "Éaß—“".chars() {
            let expected: String = normalize(&c.to_string());
            assert_eq!(normalize_char(c).map(String::from).unwrap_or_default(), expected);
        }
    }

    #[test]
    fn test_low_ascii_without_punctuation() {
        assert_eq!(to_low_ascii_without_punctuation("Café, naïve!"), "Cafe naive");
        assert!(is_low_ascii_without_punctuation('a'));
        assert!(is_low_ascii_without_punctuation(' '));
        assert!(!is_low_ascii_without_punctuation('-'));
        assert!(!is_low_ascii_without_punctuation('é'));
    }
}
