pub use crate::cache::{BuildCache, CompiledParser};
pub use crate::config::Options;
pub use crate::emit::{Attribute, EventSink, MarkupWriter, RecordingSink, SinkEvent, TreeEmitter};
pub use crate::errors::{BuildError, ConfigError, GrammarkError, Result, ScanError};
pub use crate::fragment::Fragment;
pub use crate::grammar::{GrammarIdentity, GrammarSourceResolver, GrammarSourceSet};
pub use crate::parser::{ErrorRecord, ParseNode, ParseOutcome, Parser};
pub use crate::scan::{MatchPolicy, ScanEngine, ScanEvent, ScanOptions};
pub use crate::transformer::FragmentTransformer;

pub mod ast;
pub mod cache;
pub mod cli;
pub mod config;
pub mod emit;
pub mod errors;
pub mod fragment;
pub mod grammar;
pub mod normalize;
pub mod parser;
pub mod scan;
pub mod transformer;
