//! The build cache: one compiled parser per grammar, rebuilt only when stale.
//!
//! Every grammar identity owns a slot with its own lock. The map of slots is locked
//! only long enough to find or create a slot, so builds of different grammars run in
//! parallel while callers asking for a grammar that is being built wait on its slot
//! and then reuse the result.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Instant, SystemTime};

use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use tracing::{info, warn};

use crate::errors::BuildError;
use crate::grammar::{
    GrammarCompiler, GrammarIdentity, GrammarSourceSet, PestGrammarCompiler, PestProgramLoader,
    Program, ProgramLoader,
};
use crate::parser::Parser;

/// Hex digits of the identity digest in a build directory name.
const DIGEST_LEN: usize = 12;

// ============================================================================
// COMPILED PARSERS
// ============================================================================

/// The product of one successful build. Never mutated; a rebuild replaces it.
pub struct CompiledParser {
    identity: GrammarIdentity,
    program: Arc<dyn Program>,
    parser: Box<dyn Parser>,
    built_at: SystemTime,
    generated_dir: PathBuf,
}

impl CompiledParser {
    pub fn identity(&self) -> &GrammarIdentity {
        &self.identity
    }

    pub fn parser(&self) -> &dyn Parser {
        self.parser.as_ref()
    }

    pub fn program(&self) -> &dyn Program {
        self.program.as_ref()
    }

    /// When the build started. Sources modified after this make the parser stale.
    pub fn built_at(&self) -> SystemTime {
        self.built_at
    }

    pub fn generated_dir(&self) -> &Path {
        &self.generated_dir
    }
}

impl std::fmt::Debug for CompiledParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CompiledParser")
            .field("identity", &self.identity)
            .field("entry_rule", &self.parser.entry_rule())
            .field("built_at", &self.built_at)
            .field("generated_dir", &self.generated_dir)
            .finish()
    }
}

// ============================================================================
// CACHE
// ============================================================================

#[derive(Default)]
struct Slot {
    current: Mutex<Option<Arc<CompiledParser>>>,
}

/// Maps grammar identities to compiled parsers.
///
/// Meant to be created once by whatever composes the pipeline and shared (by reference
/// or `Arc`) with every worker.
pub struct BuildCache {
    compiler: Arc<dyn GrammarCompiler>,
    loader: Arc<dyn ProgramLoader>,
    work_dir: PathBuf,
    slots: Mutex<HashMap<GrammarIdentity, Arc<Slot>>>,
}

impl BuildCache {
    pub fn new(
        compiler: Arc<dyn GrammarCompiler>,
        loader: Arc<dyn ProgramLoader>,
        work_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            compiler,
            loader,
            work_dir: work_dir.into(),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// A cache translating and loading pest grammars in process.
    pub fn with_pest(work_dir: impl Into<PathBuf>) -> Self {
        Self::new(
            Arc::new(PestGrammarCompiler::new()),
            Arc::new(PestProgramLoader::new()),
            work_dir,
        )
    }

    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Returns the parser for `sources`, building it first if there is none yet or a
    /// source changed since the last successful build.
    ///
    /// A failed build leaves the previous parser in place and is reported; the next call
    /// tries again.
    pub fn ensure_up_to_date(&self, sources: &GrammarSourceSet) -> Result<Arc<CompiledParser>, BuildError> {
        let slot = self.slot(&sources.identity);
        let mut current = slot.current.lock();

        if let Some(compiled) = current.as_ref() {
            if !sources.is_newer_than(compiled.built_at) {
                info!(grammar = %sources.identity, "reusing compiled grammar");
                return Ok(Arc::clone(compiled));
            }
            info!(grammar = %sources.identity, "grammar sources changed, rebuilding");
        }

        let compiled = Arc::new(self.build(sources, current.is_some())?);
        *current = Some(Arc::clone(&compiled));
        Ok(compiled)
    }

    /// The current parser for `identity`, without checking staleness. Waits for a build
    /// of that grammar in progress.
    pub fn get(&self, identity: &GrammarIdentity) -> Option<Arc<CompiledParser>> {
        let slot = self.slots.lock().get(identity).cloned()?;
        let current = slot.current.lock();
        current.clone()
    }

    /// Drops the parser for `identity`; the next `ensure_up_to_date` rebuilds it. Waits
    /// for a build of that grammar in progress. True if a parser was dropped.
    pub fn invalidate(&self, identity: &GrammarIdentity) -> bool {
        let Some(slot) = self.slots.lock().get(identity).cloned() else {
            return false;
        };
        let mut current = slot.current.lock();
        self.loader.unload(&self.generated_dir(identity));
        current.take().is_some()
    }

    /// Number of grammars with a slot, built or not.
    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Directory the generated files of `identity` are written to.
    pub fn generated_dir(&self, identity: &GrammarIdentity) -> PathBuf {
        let digest = Sha256::digest(identity.path().to_string_lossy().as_bytes());
        let mut name = sanitize(&identity.stem());
        name.push('-');
        for byte in digest.iter().take(DIGEST_LEN / 2) {
            let _ = write!(name, "{byte:02x}");
        }
        self.work_dir.join(name)
    }

    fn slot(&self, identity: &GrammarIdentity) -> Arc<Slot> {
        let mut slots = self.slots.lock();
        Arc::clone(slots.entry(identity.clone()).or_default())
    }

    fn build(&self, sources: &GrammarSourceSet, rebuilding: bool) -> Result<CompiledParser, BuildError> {
        let grammar = &sources.identity;
        let started = Instant::now();
        let built_at = SystemTime::now();
        let dir = self.generated_dir(grammar);

        if rebuilding {
            self.loader.unload(&dir);
        }
        clear_dir(&dir);

        info!(grammar = %grammar, dir = %dir.display(), "compiling grammar");
        let names = self
            .compiler
            .compile(&sources.primary, &dir, sources.modular)
            .map_err(|failure| BuildError::translation(grammar, failure))?;
        let program = self
            .loader
            .load(&names, &dir)
            .map_err(|failure| BuildError::load(grammar, failure))?;
        let parser = program
            .instantiate()
            .map_err(|failure| BuildError::load(grammar, failure))?;

        info!(
            grammar = %grammar,
            entry_rule = parser.entry_rule(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "grammar built"
        );
        Ok(CompiledParser {
            identity: grammar.clone(),
            program,
            parser,
            built_at,
            generated_dir: dir,
        })
    }
}

/// Removes leftovers of an earlier build so only fresh output is loaded.
fn clear_dir(dir: &Path) {
    match fs::remove_dir_all(dir) {
        Err(e) if e.kind() != io::ErrorKind::NotFound => {
            warn!(dir = %dir.display(), error = %e, "cannot clear build directory");
        }
        _ => {}
    }
}

/// Keeps `[./_A-Za-z0-9]`, replacing everything else with `_`.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| match c {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '/' | '_' => c,
            _ => '_',
        })
        .collect()
}
