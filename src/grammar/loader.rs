//! Loading generated grammars as executable programs.
//!
//! A `Program` is the loaded form of one build; it hands out `Parser` instances. The
//! pest implementation keeps the optimized rules of the grammar, and every parser runs
//! them on its own `pest_vm` machine.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use parking_lot::Mutex;
use pest::error::{ErrorVariant, InputLocation};
use pest::iterators::Pair;
use pest_meta::optimizer::OptimizedRule;
use pest_vm::Vm;
use tracing::debug;

use super::{entry_rule, GRAMMAR_EXTENSION};
use crate::errors::LoadFailure;
use crate::parser::{line_col, ErrorRecord, ParseNode, ParseOutcome, Parser};

/// Message of the error reported when a complete match stops short.
pub const END_OF_INPUT_EXPECTED: &str = "expected end of input";

/// Rule appended to every program that wraps the entry rule. It is never silent, so a
/// match always yields one pair spanning all the input the entry rule consumed.
const ENTRY_WRAPPER: &str = "__grammark_entry";

// ============================================================================
// CONTRACTS
// ============================================================================

/// An invocable program unit produced by a `ProgramLoader`.
pub trait Program: Send + Sync {
    fn name(&self) -> &str;

    /// Rule names in declaration order.
    fn rule_names(&self) -> Vec<String>;

    fn instantiate(&self) -> Result<Box<dyn Parser>, LoadFailure>;
}

pub trait ProgramLoader: Send + Sync {
    /// Loads the generated files `names` from `dir`.
    fn load(&self, names: &[String], dir: &Path) -> Result<Arc<dyn Program>, LoadFailure>;

    /// Forgets whatever was loaded from `dir`, so the next `load` reads it again.
    fn unload(&self, dir: &Path);
}

// ============================================================================
// PEST PROGRAMS
// ============================================================================

#[derive(Debug)]
pub struct PestProgram {
    name: String,
    rules: Vec<OptimizedRule>,
    entry: String,
}

impl PestProgram {
    /// Optimizes `source` into a program whose entry rule is its first non-implicit rule.
    pub fn from_source(name: impl Into<String>, source: &str) -> Result<Self, LoadFailure> {
        let name = name.into();
        let declared = optimize(&name, source)?;
        let entry = entry_rule(declared.iter().map(|rule| rule.name.as_str()))
            .ok_or_else(|| LoadFailure::new(format!("{name}: the grammar declares no rules")))?
            .to_string();
        let rules = optimize(&name, &format!("{source}\n{ENTRY_WRAPPER} = {{ {entry} }}\n"))?;

        Ok(Self { name, rules, entry })
    }

    pub fn entry(&self) -> &str {
        &self.entry
    }
}

impl Program for PestProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn rule_names(&self) -> Vec<String> {
        self.rules
            .iter()
            .filter(|rule| rule.name != ENTRY_WRAPPER)
            .map(|rule| rule.name.clone())
            .collect()
    }

    fn instantiate(&self) -> Result<Box<dyn Parser>, LoadFailure> {
        Ok(Box::new(PestParser {
            vm: Vm::new(self.rules.clone()),
            entry: self.entry.clone(),
        }))
    }
}

fn optimize(name: &str, source: &str) -> Result<Vec<OptimizedRule>, LoadFailure> {
    let (_, rules) = pest_meta::parse_and_optimize(source).map_err(|errors| {
        let details: Vec<String> = errors.iter().map(ToString::to_string).collect();
        LoadFailure::new(format!("{name}: {}", details.join("\n")))
    })?;
    Ok(rules)
}

/// Loads `<dir>/<name>.pest` files, caching one program per directory.
#[derive(Default)]
pub struct PestProgramLoader {
    loaded: Mutex<HashMap<PathBuf, Arc<PestProgram>>>,
}

impl PestProgramLoader {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_sources(names: &[String], dir: &Path) -> Result<String, LoadFailure> {
        if names.is_empty() {
            return Err(LoadFailure::new(format!("nothing was generated in {}", dir.display())));
        }
        let mut source = String::new();
        for name in names {
            let path = dir.join(format!("{name}.{GRAMMAR_EXTENSION}"));
            let text = fs::read_to_string(&path)
                .map_err(|e| LoadFailure::new(format!("cannot read {}: {e}", path.display())))?;
            source.push_str(&text);
            source.push('\n');
        }
        Ok(source)
    }
}

impl ProgramLoader for PestProgramLoader {
    fn load(&self, names: &[String], dir: &Path) -> Result<Arc<dyn Program>, LoadFailure> {
        if let Some(program) = self.loaded.lock().get(dir) {
            return Ok(Arc::clone(program) as Arc<dyn Program>);
        }

        let source = Self::read_sources(names, dir)?;
        let program = PestProgram::from_source(names.join("+"), &source)?;
        // Smoke test: the program must hand out a parser.
        program.instantiate()?;
        debug!(dir = %dir.display(), entry = program.entry(), "loaded grammar program");

        let program = Arc::new(program);
        self.loaded
            .lock()
            .insert(dir.to_path_buf(), Arc::clone(&program));
        Ok(program as Arc<dyn Program>)
    }

    fn unload(&self, dir: &Path) {
        if self.loaded.lock().remove(dir).is_some() {
            debug!(dir = %dir.display(), "unloaded grammar program");
        }
    }
}

// ============================================================================
// PEST PARSER
// ============================================================================

/// Runs the entry rule of a pest program. The VM keeps no state between calls, so one
/// parser serves any number of concurrent attempts.
pub struct PestParser {
    vm: Vm,
    entry: String,
}

impl Parser for PestParser {
    fn entry_rule(&self) -> &str {
        &self.entry
    }

    fn parse_at(&self, input: &str, pos: usize, eof_required: bool) -> ParseOutcome {
        let Some(rest) = input.get(pos..) else {
            return ParseOutcome::NoMatchPossible;
        };

        let mut pairs = match self.vm.parse(ENTRY_WRAPPER, rest) {
            Ok(pairs) => pairs,
            Err(error) => {
                let offset = match error.location {
                    InputLocation::Pos(offset) => offset,
                    InputLocation::Span((start, _)) => start,
                };
                let nonterminal = match &error.variant {
                    ErrorVariant::ParsingError { positives, .. } => {
                        positives.iter().copied().find(|rule| *rule != ENTRY_WRAPPER)
                    }
                    ErrorVariant::CustomError { .. } => None,
                }
                .unwrap_or(self.entry.as_str())
                .to_string();
                let message = error.variant.message().replace(ENTRY_WRAPPER, &self.entry);
                return self.error(input, pos + offset, nonterminal, message);
            }
        };
        let Some(wrapper) = pairs.next() else {
            return ParseOutcome::NoMatchPossible;
        };

        let end = pos + wrapper.as_span().end();
        if end <= pos {
            return ParseOutcome::EmptyMatch;
        }
        if eof_required && end < input.len() {
            return self.error(input, end, self.entry.clone(), END_OF_INPUT_EXPECTED.to_string());
        }

        let mut nodes: Vec<ParseNode> = wrapper.into_inner().map(|pair| to_node(pair, pos)).collect();
        let tree = if nodes.len() == 1 && nodes[0].tag == self.entry {
            nodes.remove(0)
        } else {
            // A silent entry rule leaves only the pairs of the rules it called.
            ParseNode::new(self.entry.clone(), pos, end, nodes)
        };
        ParseOutcome::Matched { tree, end }
    }
}

impl PestParser {
    fn error(&self, input: &str, position: usize, nonterminal: String, message: String) -> ParseOutcome {
        let (line, column) = line_col(input, position);
        ParseOutcome::Error(ErrorRecord {
            nonterminal,
            line,
            column,
            position,
            message,
        })
    }
}

fn to_node(pair: Pair<'_, &str>, offset: usize) -> ParseNode {
    let span = pair.as_span();
    let (start, end) = (offset + span.start(), offset + span.end());
    let tag = pair.as_rule().to_string();
    let children = pair.into_inner().map(|inner| to_node(inner, offset)).collect();
    ParseNode::new(tag, start, end, children)
}
