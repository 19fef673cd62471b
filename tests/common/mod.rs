//! # Grammark Test Helpers
//!
//! Grammar files live in a temporary directory per test; builds go to a `work`
//! directory inside it.

#![allow(dead_code)]

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime};

use grammark::{BuildCache, CompiledParser, GrammarSourceResolver, GrammarSourceSet};
use tempfile::TempDir;

/// Matches one integer.
pub const INT_GRAMMAR: &str = "int = { ASCII_DIGIT+ }\n";

/// Matches a run of ASCII letters.
pub const WORD_GRAMMAR: &str = "word = { ASCII_ALPHA+ }\n";

/// Matches a `day/month` date with named parts.
pub const DATE_GRAMMAR: &str =
    "date = { day ~ \"/\" ~ month }\nday = { ASCII_DIGIT{1,2} }\nmonth = { ASCII_DIGIT{1,2} }\n";

pub struct GrammarDir {
    dir: TempDir,
}

impl GrammarDir {
    pub fn new() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn work_dir(&self) -> PathBuf {
        self.dir.path().join("work")
    }

    /// Writes `text` to `name` and returns the file's path.
    pub fn write(&self, name: &str, text: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, text).unwrap();
        path
    }

    /// Rewrites `name` and moves its modification time into the future, so it is newer
    /// than any build made so far regardless of filesystem timestamp granularity.
    pub fn edit(&self, name: &str, text: &str) -> PathBuf {
        let path = self.write(name, text);
        let later = SystemTime::now() + Duration::from_secs(10);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(later)
            .unwrap();
        path
    }

    pub fn resolver(&self) -> GrammarSourceResolver {
        GrammarSourceResolver::with_base_dir(self.dir.path())
    }

    pub fn resolve(&self, name: &str) -> GrammarSourceSet {
        self.resolver().resolve(name, false).unwrap()
    }

    pub fn resolve_modular(&self, manifest: &str) -> GrammarSourceSet {
        self.resolver().resolve(manifest, true).unwrap()
    }

    pub fn pest_cache(&self) -> BuildCache {
        BuildCache::with_pest(self.work_dir())
    }
}

/// Builds `grammar` in a fresh directory; the directory must outlive the parser's use.
pub fn compile(grammar: &str) -> (GrammarDir, Arc<CompiledParser>) {
    let dir = GrammarDir::new();
    dir.write("grammar.pest", grammar);
    let compiled = dir
        .pest_cache()
        .ensure_up_to_date(&dir.resolve("grammar.pest"))
        .unwrap();
    (dir, compiled)
}
