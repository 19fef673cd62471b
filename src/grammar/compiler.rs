//! Grammar translation.
//!
//! A `GrammarCompiler` writes generated sources for one grammar into an output directory
//! and reports their base names. `PestGrammarCompiler` validates pest grammars in process;
//! `CommandGrammarCompiler` drives an external generator executable.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::debug;

use super::{manifest, GRAMMAR_EXTENSION};
use crate::errors::TranslationFailure;

/// Base name of the combined grammar `PestGrammarCompiler` generates.
pub const GENERATED_GRAMMAR: &str = "grammar";

pub trait GrammarCompiler: Send + Sync {
    /// Translates `grammar` (a manifest when `modular`) into `output_dir`.
    ///
    /// Returns the base names of the generated files.
    fn compile(
        &self,
        grammar: &Path,
        output_dir: &Path,
        modular: bool,
    ) -> Result<Vec<String>, TranslationFailure>;
}

// ============================================================================
// IN-PROCESS PEST TRANSLATION
// ============================================================================

/// Concatenates the grammar modules, checks them with `pest_meta` and writes the
/// result to `<output_dir>/grammar.pest`.
#[derive(Debug, Clone, Copy, Default)]
pub struct PestGrammarCompiler;

impl PestGrammarCompiler {
    pub fn new() -> Self {
        Self
    }

    fn combined_source(grammar: &Path, modular: bool) -> Result<String, TranslationFailure> {
        let modules = if modular {
            manifest::expand(grammar)
                .map_err(|e| TranslationFailure::new(e.to_string()))?
                .modules
        } else {
            vec![grammar.to_path_buf()]
        };
        if modules.is_empty() {
            return Err(TranslationFailure::new("the manifest lists no grammar modules"));
        }

        let mut combined = String::new();
        for module in &modules {
            let text = fs::read_to_string(module).map_err(|e| {
                TranslationFailure::new(format!("cannot read {}: {e}", module.display()))
            })?;
            combined.push_str(&text);
            if !combined.ends_with('\n') {
                combined.push('\n');
            }
        }
        Ok(combined)
    }
}

impl GrammarCompiler for PestGrammarCompiler {
    fn compile(
        &self,
        grammar: &Path,
        output_dir: &Path,
        modular: bool,
    ) -> Result<Vec<String>, TranslationFailure> {
        let source = Self::combined_source(grammar, modular)?;

        if let Err(errors) = pest_meta::parse_and_optimize(&source) {
            let diagnostics: Vec<String> = errors.iter().map(ToString::to_string).collect();
            return Err(TranslationFailure::new(format!(
                "the grammar has {} error(s)",
                errors.len()
            ))
            .with_diagnostics(diagnostics.join("\n")));
        }

        let target = output_dir.join(format!("{GENERATED_GRAMMAR}.{GRAMMAR_EXTENSION}"));
        fs::create_dir_all(output_dir)
            .and_then(|_| fs::write(&target, &source))
            .map_err(|e| TranslationFailure::new(format!("cannot write {}: {e}", target.display())))?;

        debug!(output = %target.display(), bytes = source.len(), "wrote generated grammar");
        Ok(vec![GENERATED_GRAMMAR.to_string()])
    }
}

// ============================================================================
// EXTERNAL GENERATOR
// ============================================================================

/// Runs `<program> -g <target> <output_dir> [-m] <grammar>`.
#[derive(Debug, Clone)]
pub struct CommandGrammarCompiler {
    program: PathBuf,
    target: String,
}

impl CommandGrammarCompiler {
    pub fn new(program: impl Into<PathBuf>, target: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            target: target.into(),
        }
    }
}

impl GrammarCompiler for CommandGrammarCompiler {
    fn compile(
        &self,
        grammar: &Path,
        output_dir: &Path,
        modular: bool,
    ) -> Result<Vec<String>, TranslationFailure> {
        fs::create_dir_all(output_dir).map_err(|e| {
            TranslationFailure::new(format!("cannot create {}: {e}", output_dir.display()))
        })?;

        let mut command = Command::new(&self.program);
        command.arg("-g").arg(&self.target).arg(output_dir);
        if modular {
            command.arg("-m");
        }
        command.arg(grammar);

        let output = command.output().map_err(|e| {
            TranslationFailure::new(format!("cannot run {}: {e}", self.program.display()))
        })?;
        let mut diagnostics = String::from_utf8_lossy(&output.stdout).into_owned();
        diagnostics.push_str(&String::from_utf8_lossy(&output.stderr));

        if !output.status.success() {
            return Err(TranslationFailure::new(format!(
                "{} failed ({})",
                self.program.display(),
                output.status
            ))
            .with_diagnostics(diagnostics));
        }

        let generated = generated_names(output_dir);
        if generated.is_empty() {
            return Err(TranslationFailure::new(format!(
                "{} produced no output in {}",
                self.program.display(),
                output_dir.display()
            ))
            .with_diagnostics(diagnostics));
        }
        Ok(generated)
    }
}

/// Sorted base names of the regular files in `dir`.
fn generated_names(dir: &Path) -> Vec<String> {
    let Ok(entries) = fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut names: Vec<String> = entries
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| path.is_file())
        .filter_map(|path| path.file_stem().map(|stem| stem.to_string_lossy().into_owned()))
        .collect();
    names.sort();
    names.dedup();
    names
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pest_compiler_reports_grammar_errors() {
        let dir = tempfile::tempdir().unwrap();
        let grammar = dir.path().join("broken.pest");
        fs::write(&grammar, "number = { ASCII_DIGIT+ \n").unwrap();

        let failure = PestGrammarCompiler
            .compile(&grammar, &dir.path().join("out"), false)
            .unwrap_err();
        assert!(failure.message.contains("error"));
        assert!(!failure.diagnostics.is_empty());
        assert!(!dir.path().join("out").exists());
    }

    #[test]
    fn test_pest_compiler_writes_combined_grammar() {
        let dir = tempfile::tempdir().unwrap();
        let grammar = dir.path().join("digits.pest");
        fs::write(&grammar, "number = { ASCII_DIGIT+ }").unwrap();

        let out = dir.path().join("out");
        let names = PestGrammarCompiler.compile(&grammar, &out, false).unwrap();
        assert_eq!(names, vec!["grammar".to_string()]);
        assert!(fs::read_to_string(out.join("grammar.pest"))
            .unwrap()
            .contains("number"));
    }

    #[test]
    fn test_missing_generator_is_a_translation_failure() {
        let dir = tempfile::tempdir().unwrap();
        let compiler = CommandGrammarCompiler::new("/nonexistent/grammark-generator", "rust");
        let failure = compiler
            .compile(&dir.path().join("g.pest"), dir.path(), false)
            .unwrap_err();
        assert!(failure.message.contains("cannot run"));
    }
}
