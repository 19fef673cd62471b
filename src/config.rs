//! Options recognized by the transformer and the command line.
//!
//! Options arrive as a string parameter map from a host pipeline, or as a YAML/JSON
//! document. Field names follow the host's parameter names.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::BuildCache;
use crate::errors::{ConfigError, GrammarkError, Result};
use crate::grammar::{
    CommandGrammarCompiler, PestGrammarCompiler, PestProgramLoader, GRAMMAR_EXTENSION,
};
use crate::scan::{MatchPolicy, ScanOptions};

/// Name of the built-in in-process generator.
pub const PEST_GENERATOR: &str = "pest";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Options {
    /// Element whose content is scanned. Only the host looks at it.
    pub parse_element_tag: String,
    /// The grammar identifier names a manifest of grammar modules.
    pub modular: bool,
    pub complete_match: bool,
    /// Ignored when `complete_match` is set.
    pub adjacent_matches: bool,
    /// Emit parse errors as error elements instead of failing.
    pub parse_errors: bool,
    pub show_parse_tree: bool,
    /// Kept for hosts that decide whether markup inside the trigger element survives.
    #[serde(rename = "keepXML")]
    pub keep_xml: bool,
    /// Match against the ASCII-folded text.
    #[serde(rename = "toASCII")]
    pub to_ascii: bool,
    /// `pest`, or the path of an external generator executable.
    pub generator: String,
    /// Where generated grammars are written; a temporary directory by default.
    pub work_dir: Option<PathBuf>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            parse_element_tag: "parse".to_string(),
            modular: false,
            complete_match: false,
            adjacent_matches: false,
            parse_errors: false,
            show_parse_tree: false,
            keep_xml: false,
            to_ascii: false,
            generator: PEST_GENERATOR.to_string(),
            work_dir: None,
        }
    }
}

impl Options {
    /// Reads options from host parameters. Unknown names are ignored with a warning.
    pub fn from_parameters<'a>(
        parameters: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> std::result::Result<Self, ConfigError> {
        let mut options = Self::default();
        for (name, value) in parameters {
            match name {
                "parseElementTag" => options.parse_element_tag = value.to_string(),
                "modular" => options.modular = parse_bool(name, value)?,
                "completeMatch" => options.complete_match = parse_bool(name, value)?,
                "adjacentMatches" => options.adjacent_matches = parse_bool(name, value)?,
                "parseErrors" => options.parse_errors = parse_bool(name, value)?,
                "showParseTree" => options.show_parse_tree = parse_bool(name, value)?,
                "keepXML" => options.keep_xml = parse_bool(name, value)?,
                "toASCII" => options.to_ascii = parse_bool(name, value)?,
                "generator" => options.generator = value.to_string(),
                "workDir" => options.work_dir = Some(PathBuf::from(value)),
                _ => warn!(parameter = name, "ignoring unknown parameter"),
            }
        }
        Ok(options)
    }

    pub fn from_yaml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        serde_yaml::from_str(text).map_err(|e| ConfigError::Format {
            origin: "YAML".to_string(),
            reason: e.to_string(),
        })
    }

    pub fn from_json_str(text: &str) -> std::result::Result<Self, ConfigError> {
        serde_json::from_str(text).map_err(|e| ConfigError::Format {
            origin: "JSON".to_string(),
            reason: e.to_string(),
        })
    }

    /// Reads a `.json` file as JSON and anything else as YAML.
    pub fn from_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| GrammarkError::io(path.display(), e))?;
        let parsed = match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json_str(&text),
            _ => Self::from_yaml_str(&text),
        };
        parsed.map_err(|error| match error {
            ConfigError::Format { reason, .. } => ConfigError::Format {
                origin: path.display().to_string(),
                reason,
            }
            .into(),
            other => other.into(),
        })
    }

    pub fn policy(&self) -> MatchPolicy {
        MatchPolicy::from_flags(self.complete_match, self.adjacent_matches)
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            policy: self.policy(),
            tolerate_errors: self.parse_errors,
            fold_ascii: self.to_ascii,
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.work_dir
            .clone()
            .unwrap_or_else(|| std::env::temp_dir().join("grammark"))
    }

    /// A build cache using the configured generator and work directory.
    pub fn build_cache(&self) -> BuildCache {
        if self.generator == PEST_GENERATOR {
            return BuildCache::new(
                Arc::new(PestGrammarCompiler::new()),
                Arc::new(PestProgramLoader::new()),
                self.work_dir(),
            );
        }
        BuildCache::new(
            Arc::new(CommandGrammarCompiler::new(&self.generator, GRAMMAR_EXTENSION)),
            Arc::new(PestProgramLoader::new()),
            self.work_dir(),
        )
    }
}

fn parse_bool(name: &str, value: &str) -> std::result::Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "1" => Ok(true),
        "false" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::InvalidBoolean {
            name: name.to_string(),
            value: value.to_string(),
        }),
    }
}
