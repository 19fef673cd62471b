//! Host adapter: turns fragments inside trigger elements into structure events.
//!
//! A `FragmentTransformer` is set up once per grammar and options, then fed the text
//! content of trigger elements. Trigger elements may nest; only the outermost one is
//! scanned.

use std::sync::Arc;

use tracing::debug;

use crate::cache::{BuildCache, CompiledParser};
use crate::config::Options;
use crate::emit::{EventSink, TreeEmitter};
use crate::errors::{BuildError, ScanError};
use crate::fragment::Fragment;
use crate::grammar::GrammarSourceResolver;
use crate::scan::{ScanEngine, ScanEvent};

pub struct FragmentTransformer {
    options: Options,
    compiled: Arc<CompiledParser>,
    depth: usize,
}

impl FragmentTransformer {
    /// Resolves `grammar` and makes sure its parser is built and current.
    pub fn setup(
        cache: &BuildCache,
        resolver: &GrammarSourceResolver,
        grammar: &str,
        options: Options,
    ) -> Result<Self, BuildError> {
        let sources = resolver.resolve(grammar, options.modular)?;
        let compiled = cache.ensure_up_to_date(&sources)?;
        debug!(
            grammar = %sources.identity,
            policy = ?options.policy(),
            "transformer ready"
        );
        Ok(Self {
            options,
            compiled,
            depth: 0,
        })
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn compiled(&self) -> &CompiledParser {
        &self.compiled
    }

    /// Records entering a trigger element. True for the outermost one.
    pub fn start_trigger(&mut self) -> bool {
        self.depth += 1;
        self.depth == 1
    }

    /// Records leaving a trigger element. True when the outermost one closes.
    pub fn end_trigger(&mut self) -> bool {
        match self.depth {
            0 => false,
            depth => {
                self.depth = depth - 1;
                self.depth == 0
            }
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.depth > 0
    }

    /// Scans `fragment` and renders the result into `sink`.
    ///
    /// On a fatal scan error the events emitted so far stay in the sink, the error
    /// block included.
    pub fn transform(&self, fragment: &Fragment, sink: &mut dyn EventSink) -> Result<(), ScanError> {
        let engine = ScanEngine::new(self.compiled.parser(), self.options.scan_options());
        let emitter = TreeEmitter::new(fragment);
        let show_parse_tree = self.options.show_parse_tree;

        engine.scan_with(fragment, |event| {
            if let (true, ScanEvent::Matched { tree }) = (show_parse_tree, &event) {
                sink.comment(&tree.dump(fragment));
            }
            emitter.render_event(&event, &mut *sink);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nested_triggers_count_depth() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("int.pest"), "int = { ASCII_DIGIT+ }").unwrap();
        let cache = BuildCache::with_pest(dir.path().join("work"));
        let resolver = GrammarSourceResolver::with_base_dir(dir.path());
        let mut transformer =
            FragmentTransformer::setup(&cache, &resolver, "int.pest", Options::default()).unwrap();

        assert!(transformer.start_trigger());
        assert!(!transformer.start_trigger());
        assert!(!transformer.end_trigger());
        assert!(transformer.is_triggered());
        assert!(transformer.end_trigger());
        assert!(!transformer.end_trigger());
        assert!(!transformer.is_triggered());
    }
}
