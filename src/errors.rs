//! Grammark Error Handling
//!
//! Build-time failures (`BuildError`), scan-time failures (`ScanError`) and option
//! failures (`ConfigError`) are separate `thiserror` enums that all implement
//! `miette::Diagnostic`. `GrammarkError` wraps them for callers that drive the whole
//! pipeline.

use std::fmt;

use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::fragment::Fragment;
use crate::parser::ErrorRecord;

/// Crate-wide result alias.
pub type Result<T, E = GrammarkError> = std::result::Result<T, E>;

// ============================================================================
// COLLABORATOR FAILURES - reported by compilers and loaders
// ============================================================================

/// Failure reported by a `GrammarCompiler` while translating a grammar.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct TranslationFailure {
    pub message: String,
    /// Diagnostic text produced by the translator (tool output, grammar errors).
    pub diagnostics: String,
}

impl TranslationFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            diagnostics: String::new(),
        }
    }

    pub fn with_diagnostics(mut self, diagnostics: impl Into<String>) -> Self {
        self.diagnostics = diagnostics.into();
        self
    }
}

/// Failure reported by a `ProgramLoader` or a loaded program.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct LoadFailure {
    pub message: String,
}

impl LoadFailure {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

// ============================================================================
// BUILD ERRORS
// ============================================================================

/// Errors raised while resolving, translating or loading a grammar.
///
/// None of these are retried; a failed build never replaces a cache entry.
#[derive(Debug, Clone, Error, Diagnostic)]
pub enum BuildError {
    #[error("the grammar '{grammar}' cannot be read: {reason}")]
    #[diagnostic(
        code(grammark::build::grammar_unreadable),
        help("grammars are local files, given as a path or a file:// URI")
    )]
    GrammarUnreadable { grammar: String, reason: String },

    #[error("error compiling grammar '{grammar}': {reason}")]
    #[diagnostic(code(grammark::build::translation_failed))]
    TranslationFailed {
        grammar: String,
        reason: String,
        #[help]
        diagnostics: Option<String>,
    },

    #[error("error compiling or loading the parser for '{grammar}': {reason}")]
    #[diagnostic(code(grammark::build::load_failed))]
    LoadFailed { grammar: String, reason: String },
}

impl BuildError {
    pub(crate) fn unreadable(grammar: impl fmt::Display, reason: impl fmt::Display) -> Self {
        BuildError::GrammarUnreadable {
            grammar: grammar.to_string(),
            reason: reason.to_string(),
        }
    }

    pub(crate) fn translation(grammar: impl fmt::Display, failure: TranslationFailure) -> Self {
        let diagnostics = failure.diagnostics.trim();
        BuildError::TranslationFailed {
            grammar: grammar.to_string(),
            reason: failure.message,
            diagnostics: (!diagnostics.is_empty()).then(|| diagnostics.to_string()),
        }
    }

    pub(crate) fn load(grammar: impl fmt::Display, failure: LoadFailure) -> Self {
        BuildError::LoadFailed {
            grammar: grammar.to_string(),
            reason: failure.message,
        }
    }
}

// ============================================================================
// SCAN ERRORS
// ============================================================================

/// Errors that abort scanning of a single fragment.
#[derive(Debug, Error, Diagnostic)]
pub enum ScanError {
    #[error("{origin}: the grammar only matches an empty string, no parsing progress can be made")]
    #[diagnostic(
        code(grammark::scan::no_progress),
        help("the start rule must consume input; allow unmatched text or change the grammar")
    )]
    NoProgressPossible { origin: String, position: usize },

    #[error("{origin}: parser error: {record}\nParsing [{excerpt}]")]
    #[diagnostic(
        code(grammark::scan::parse_error),
        help("set parseErrors to emit an error node instead of aborting")
    )]
    GrammarParse {
        origin: String,
        record: ErrorRecord,
        excerpt: String,
        #[source_code]
        src: NamedSource<String>,
        #[label("parsing stopped here")]
        span: SourceSpan,
    },
}

impl ScanError {
    /// Builds a parse error for `record`, quoting the text the failed attempt started on.
    pub(crate) fn parse(fragment: &Fragment, record: ErrorRecord, attempt_start: usize) -> Self {
        let excerpt_end = (attempt_start + 12).min(fragment.char_len());
        let excerpt = fragment.slice(attempt_start, excerpt_end).to_string();
        let offset = fragment.byte_offset(record.position);
        let width = fragment
            .text()
            .get(offset..)
            .and_then(|rest| rest.chars().next())
            .map_or(0, char::len_utf8);

        ScanError::GrammarParse {
            origin: fragment.origin().to_string(),
            excerpt,
            src: NamedSource::new(fragment.origin(), fragment.text().to_string()),
            span: SourceSpan::from((offset, width)),
            record,
        }
    }

    /// The error record of a parse error, if this is one.
    pub fn record(&self) -> Option<&ErrorRecord> {
        match self {
            ScanError::GrammarParse { record, .. } => Some(record),
            ScanError::NoProgressPossible { .. } => None,
        }
    }
}

// ============================================================================
// CONFIGURATION ERRORS
// ============================================================================

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("option '{name}' expects a boolean, found '{value}'")]
    #[diagnostic(code(grammark::config::invalid_boolean), help("use true/false, yes/no or 1/0"))]
    InvalidBoolean { name: String, value: String },

    #[error("invalid options in {origin}: {reason}")]
    #[diagnostic(code(grammark::config::format))]
    Format { origin: String, reason: String },
}

// ============================================================================
// TOP-LEVEL ERROR
// ============================================================================

/// Unified error for callers composing resolution, building and scanning.
#[derive(Debug, Error, Diagnostic)]
pub enum GrammarkError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Scan(#[from] ScanError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error("I/O error on '{path}': {source}")]
    #[diagnostic(code(grammark::io))]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

impl GrammarkError {
    pub fn io(path: impl fmt::Display, source: std::io::Error) -> Self {
        GrammarkError::Io {
            path: path.to_string(),
            source,
        }
    }
}

/// Prints an error with full miette diagnostics on stderr.
pub fn print_error(error: impl Diagnostic + Send + Sync + 'static) {
    let report = miette::Report::new(error);
    eprintln!("{report:?}");
}
