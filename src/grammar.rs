//! Grammars: locating their sources, translating them and loading executable parsers.
//!
//! The pipeline is split along the two collaborator contracts the build cache drives:
//! a `GrammarCompiler` turns grammar sources into generated files in a directory, and a
//! `ProgramLoader` turns those files into a `Program` that hands out `Parser`s.

pub mod compiler;
pub mod inspect;
pub mod loader;
pub mod manifest;
pub mod source;

pub use compiler::{CommandGrammarCompiler, GrammarCompiler, PestGrammarCompiler};
pub use inspect::{inspect_grammar, GrammarReport};
pub use loader::{PestParser, PestProgramLoader, Program, ProgramLoader};
pub use source::{GrammarIdentity, GrammarSourceResolver, GrammarSourceSet};

/// Rules pest gives a special meaning; they are never a grammar's entry rule.
pub const IMPLICIT_RULES: &[&str] = &["WHITESPACE", "COMMENT"];

/// Extension of pest grammar files, both source and generated.
pub const GRAMMAR_EXTENSION: &str = "pest";

/// The entry rule of a grammar: its first declared rule that is not implicit.
pub fn entry_rule<'a>(rule_names: impl IntoIterator<Item = &'a str>) -> Option<&'a str> {
    rule_names
        .into_iter()
        .find(|name| !IMPLICIT_RULES.contains(name))
}
