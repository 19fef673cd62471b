//! Build cache behavior: compile once, rebuild when stale, keep the old parser when a
//! rebuild fails, and serialize builds per grammar only.

mod common;

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Barrier, Condvar, Mutex};
use std::thread;
use std::time::Duration;

use common::{GrammarDir, INT_GRAMMAR, WORD_GRAMMAR};
use grammark::errors::TranslationFailure;
use grammark::grammar::{GrammarCompiler, PestGrammarCompiler, PestProgramLoader};
use grammark::{BuildCache, BuildError, ParseOutcome};

/// Counts compilations and optionally takes its time.
#[derive(Default)]
struct CountingCompiler {
    calls: AtomicUsize,
    delay: Duration,
}

impl CountingCompiler {
    fn slow(delay: Duration) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            delay,
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl GrammarCompiler for CountingCompiler {
    fn compile(
        &self,
        grammar: &Path,
        output_dir: &Path,
        modular: bool,
    ) -> Result<Vec<String>, TranslationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        thread::sleep(self.delay);
        PestGrammarCompiler.compile(grammar, output_dir, modular)
    }
}

/// Blocks compiling `slow.pest` until released and records how many compilations ran
/// at the same time.
#[derive(Default)]
struct GatedCompiler {
    released: Mutex<bool>,
    signal: Condvar,
    entered: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl GatedCompiler {
    fn release(&self) {
        *self.released.lock().unwrap() = true;
        self.signal.notify_all();
    }

    fn wait_until_entered(&self) {
        while self.entered.load(Ordering::SeqCst) == 0 {
            thread::sleep(Duration::from_millis(5));
        }
    }
}

impl GrammarCompiler for GatedCompiler {
    fn compile(
        &self,
        grammar: &Path,
        output_dir: &Path,
        modular: bool,
    ) -> Result<Vec<String>, TranslationFailure> {
        self.entered.fetch_add(1, Ordering::SeqCst);
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);
        if grammar.file_name().is_some_and(|name| name == "slow.pest") {
            let mut released = self.released.lock().unwrap();
            while !*released {
                released = self.signal.wait(released).unwrap();
            }
        }
        let result = PestGrammarCompiler.compile(grammar, output_dir, modular);
        self.active.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn counting_cache(dir: &GrammarDir, compiler: Arc<CountingCompiler>) -> BuildCache {
    BuildCache::new(compiler, Arc::new(PestProgramLoader::new()), dir.work_dir())
}

fn matches_all(cache_entry: &grammark::CompiledParser, text: &str) -> bool {
    matches!(
        cache_entry.parser().parse_at(text, 0, true),
        ParseOutcome::Matched { .. }
    )
}

// ============================================================================
// STALENESS
// ============================================================================

#[test]
fn test_unchanged_grammar_is_compiled_once() {
    let dir = GrammarDir::new();
    dir.write("int.pest", INT_GRAMMAR);
    let compiler = Arc::new(CountingCompiler::default());
    let cache = counting_cache(&dir, compiler.clone());

    let first = cache.ensure_up_to_date(&dir.resolve("int.pest")).unwrap();
    let second = cache.ensure_up_to_date(&dir.resolve("int.pest")).unwrap();

    assert_eq!(compiler.calls(), 1);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.len(), 1);
}

#[test]
fn test_edited_grammar_is_rebuilt() {
    let dir = GrammarDir::new();
    dir.write("g.pest", INT_GRAMMAR);
    let compiler = Arc::new(CountingCompiler::default());
    let cache = counting_cache(&dir, compiler.clone());

    let before = cache.ensure_up_to_date(&dir.resolve("g.pest")).unwrap();
    assert!(matches_all(&before, "42"));

    dir.edit("g.pest", WORD_GRAMMAR);
    let after = cache.ensure_up_to_date(&dir.resolve("g.pest")).unwrap();

    assert_eq!(compiler.calls(), 2);
    assert!(!Arc::ptr_eq(&before, &after));
    assert!(matches_all(&after, "abc"));
    assert!(!matches_all(&after, "42"));
    // The replaced parser keeps working for whoever still holds it.
    assert!(matches_all(&before, "42"));
}

#[test]
fn test_failed_rebuild_keeps_previous_parser() {
    let dir = GrammarDir::new();
    dir.write("g.pest", INT_GRAMMAR);
    let compiler = Arc::new(CountingCompiler::default());
    let cache = counting_cache(&dir, compiler.clone());
    let good = cache.ensure_up_to_date(&dir.resolve("g.pest")).unwrap();

    dir.edit("g.pest", "int = { ASCII_DIGIT+ \n");
    let sources = dir.resolve("g.pest");
    let error = cache.ensure_up_to_date(&sources).unwrap_err();
    assert!(matches!(error, BuildError::TranslationFailed { .. }));

    let current = cache.get(&sources.identity).unwrap();
    assert!(Arc::ptr_eq(&good, &current));

    // Still stale, so the next call tries again and fails again.
    assert!(cache.ensure_up_to_date(&sources).is_err());
    assert_eq!(compiler.calls(), 3);

    dir.edit("g.pest", WORD_GRAMMAR);
    let fixed = cache.ensure_up_to_date(&dir.resolve("g.pest")).unwrap();
    assert!(matches_all(&fixed, "word"));
}

#[test]
fn test_invalidate_forces_rebuild() {
    let dir = GrammarDir::new();
    dir.write("int.pest", INT_GRAMMAR);
    let compiler = Arc::new(CountingCompiler::default());
    let cache = counting_cache(&dir, compiler.clone());

    let sources = dir.resolve("int.pest");
    cache.ensure_up_to_date(&sources).unwrap();
    assert!(cache.invalidate(&sources.identity));
    assert!(cache.get(&sources.identity).is_none());
    cache.ensure_up_to_date(&sources).unwrap();

    assert_eq!(compiler.calls(), 2);
}

// ============================================================================
// BUILD FAILURES
// ============================================================================

#[test]
fn test_grammar_without_rules_fails_to_load() {
    let dir = GrammarDir::new();
    dir.write("blank.pest", "WHITESPACE = _{ \" \" }\n");
    let cache = dir.pest_cache();

    let sources = dir.resolve("blank.pest");
    let error = cache.ensure_up_to_date(&sources).unwrap_err();
    assert!(matches!(error, BuildError::LoadFailed { .. }));
    assert!(cache.get(&sources.identity).is_none());
}

#[test]
fn test_missing_grammar_is_unreadable() {
    let dir = GrammarDir::new();
    let error = dir.resolver().resolve("absent.pest", false).unwrap_err();
    assert!(matches!(error, BuildError::GrammarUnreadable { .. }));
    assert!(error.to_string().contains("absent.pest"));
}

#[test]
fn test_file_uri_names_same_grammar_as_path() {
    let dir = GrammarDir::new();
    let path = dir.write("int.pest", INT_GRAMMAR);
    let uri = format!("file://{}", path.display());

    let by_path = dir.resolve("int.pest");
    let by_uri = dir.resolver().resolve(&uri, false).unwrap();
    assert_eq!(by_path.identity, by_uri.identity);
}

// ============================================================================
// CONCURRENCY
// ============================================================================

#[test]
fn test_concurrent_requests_share_one_build() {
    let dir = GrammarDir::new();
    dir.write("int.pest", INT_GRAMMAR);
    let compiler = Arc::new(CountingCompiler::slow(Duration::from_millis(100)));
    let cache = Arc::new(counting_cache(&dir, compiler.clone()));
    let sources = dir.resolve("int.pest");

    let workers = 8;
    let barrier = Arc::new(Barrier::new(workers));
    let handles: Vec<_> = (0..workers)
        .map(|_| {
            let cache = Arc::clone(&cache);
            let barrier = Arc::clone(&barrier);
            let sources = sources.clone();
            thread::spawn(move || {
                barrier.wait();
                cache.ensure_up_to_date(&sources).unwrap()
            })
        })
        .collect();

    let built: Vec<_> = handles.into_iter().map(|handle| handle.join().unwrap()).collect();
    assert_eq!(compiler.calls(), 1);
    assert!(built.iter().all(|parser| Arc::ptr_eq(parser, &built[0])));
}

#[test]
fn test_invalidate_waits_for_build_in_progress() {
    let dir = GrammarDir::new();
    dir.write("slow.pest", INT_GRAMMAR);
    let compiler = Arc::new(GatedCompiler::default());
    let cache = Arc::new(BuildCache::new(
        compiler.clone(),
        Arc::new(PestProgramLoader::new()),
        dir.work_dir(),
    ));
    let sources = dir.resolve("slow.pest");

    let first = {
        let cache = Arc::clone(&cache);
        let sources = sources.clone();
        thread::spawn(move || cache.ensure_up_to_date(&sources).map(|_| ()))
    };
    compiler.wait_until_entered();

    let second = {
        let cache = Arc::clone(&cache);
        let sources = sources.clone();
        thread::spawn(move || {
            cache.invalidate(&sources.identity);
            cache.ensure_up_to_date(&sources)
        })
    };
    thread::sleep(Duration::from_millis(100));
    compiler.release();

    assert!(first.join().unwrap().is_ok());
    let rebuilt = second.join().unwrap().unwrap();
    assert_eq!(compiler.max_active.load(Ordering::SeqCst), 1);
    assert!(Arc::ptr_eq(&rebuilt, &cache.get(&sources.identity).unwrap()));
    assert!(matches_all(&rebuilt, "42"));
}

#[test]
fn test_invalidate_of_unknown_grammar_is_a_no_op() {
    let dir = GrammarDir::new();
    dir.write("int.pest", INT_GRAMMAR);
    let cache = dir.pest_cache();
    assert!(!cache.invalidate(&dir.resolve("int.pest").identity));
}

#[test]
fn test_builds_of_different_grammars_do_not_wait_for_each_other() {
    let dir = GrammarDir::new();
    dir.write("slow.pest", INT_GRAMMAR);
    dir.write("fast.pest", WORD_GRAMMAR);
    let compiler = Arc::new(GatedCompiler::default());
    let cache = Arc::new(BuildCache::new(
        compiler.clone(),
        Arc::new(PestProgramLoader::new()),
        dir.work_dir(),
    ));

    let slow_sources = dir.resolve("slow.pest");
    let slow = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || cache.ensure_up_to_date(&slow_sources).map(|_| ()))
    };

    let (done, finished) = mpsc::channel();
    let fast_sources = dir.resolve("fast.pest");
    let fast = {
        let cache = Arc::clone(&cache);
        thread::spawn(move || {
            let result = cache.ensure_up_to_date(&fast_sources).map(|_| ());
            let _ = done.send(());
            result
        })
    };

    let fast_finished_first = finished.recv_timeout(Duration::from_secs(10)).is_ok();
    compiler.release();
    assert!(fast_finished_first, "building fast.pest waited for slow.pest");
    assert!(fast.join().unwrap().is_ok());
    assert!(slow.join().unwrap().is_ok());
}
