//! The Grammark Command-Line Interface.
//!
//! `scan` runs a grammar over files or stdin and prints markup or JSON, `fold` prints
//! ASCII-folded text, and `check` builds a grammar and reports on its rules.

use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process;

use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use termcolor::{Color, ColorChoice, ColorSpec, StandardStream, WriteColor};
use tracing_subscriber::EnvFilter;
use walkdir::WalkDir;

use crate::config::Options;
use crate::emit::{MarkupWriter, RecordingSink};
use crate::errors::{print_error, GrammarkError, Result};
use crate::fragment::Fragment;
use crate::grammar::compiler::GENERATED_GRAMMAR;
use crate::grammar::{
    inspect_grammar, GrammarReport, GrammarSourceResolver, Program, GRAMMAR_EXTENSION,
};
use crate::normalize::normalize;
use crate::scan::{ScanEngine, ScanEvent};
use crate::transformer::FragmentTransformer;

// ============================================================================
// CLI ARGUMENTS
// ============================================================================

#[derive(Debug, Parser)]
#[command(
    name = "grammark",
    version,
    about = "Marks up structured fragments of free-form text with a grammar."
)]
pub struct GrammarkArgs {
    /// Log build and scan activity to stderr (RUST_LOG overrides).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: ArgsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ArgsCommand {
    /// Scan files, directories or stdin with a grammar.
    Scan {
        /// Grammar file, manifest (with --modular) or file:// URI.
        grammar: String,
        /// Input files or directories; stdin when none are given.
        inputs: Vec<PathBuf>,
        #[command(flatten)]
        flags: ScanFlags,
        /// Scan every line as its own fragment.
        #[arg(long)]
        lines: bool,
        #[arg(long, value_enum, default_value_t = OutputFormat::Markup)]
        output: OutputFormat,
    },
    /// Print the ASCII-folded form of text.
    Fold {
        #[arg(required = true)]
        text: Vec<String>,
    },
    /// Build a grammar and list its rules.
    Check {
        grammar: String,
        #[arg(long)]
        modular: bool,
        #[arg(long)]
        work_dir: Option<PathBuf>,
    },
}

/// Options of a scan; flags override the configuration file.
#[derive(Debug, Clone, clap::Args)]
pub struct ScanFlags {
    /// YAML or JSON options file.
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// The grammar is a manifest of modules.
    #[arg(long)]
    pub modular: bool,
    /// Each fragment must be one complete match.
    #[arg(long)]
    pub complete: bool,
    /// Matches must follow each other without unmatched text.
    #[arg(long)]
    pub adjacent: bool,
    /// Emit parse errors as ERROR elements instead of failing.
    #[arg(long)]
    pub parse_errors: bool,
    /// Match against ASCII-folded text.
    #[arg(long)]
    pub ascii: bool,
    /// Emit a comment with the parse tree of every match.
    #[arg(long)]
    pub show_parse_tree: bool,
    /// `pest` or the path of an external generator.
    #[arg(long)]
    pub generator: Option<String>,
    #[arg(long)]
    pub work_dir: Option<PathBuf>,
}

impl ScanFlags {
    pub fn to_options(&self) -> Result<Options> {
        let mut options = match &self.config {
            Some(path) => Options::from_file(path)?,
            None => Options::default(),
        };
        options.modular |= self.modular;
        options.complete_match |= self.complete;
        options.adjacent_matches |= self.adjacent;
        options.parse_errors |= self.parse_errors;
        options.to_ascii |= self.ascii;
        options.show_parse_tree |= self.show_parse_tree;
        if let Some(generator) = &self.generator {
            options.generator = generator.clone();
        }
        if let Some(work_dir) = &self.work_dir {
            options.work_dir = Some(work_dir.clone());
        }
        Ok(options)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// XML-style markup, one fragment per line.
    Markup,
    /// Scan events as JSON, one fragment per line.
    Json,
    /// Structure events as JSON, one fragment per line.
    Events,
}

// ============================================================================
// MAIN ENTRY POINT
// ============================================================================

pub fn run() {
    let args = GrammarkArgs::parse();
    init_logging(args.verbose);

    let result = match args.command {
        ArgsCommand::Scan {
            grammar,
            inputs,
            flags,
            lines,
            output,
        } => run_scan(&grammar, &inputs, &flags, lines, output),
        ArgsCommand::Fold { text } => {
            println!("{}", normalize(&text.join(" ")));
            Ok(true)
        }
        ArgsCommand::Check {
            grammar,
            modular,
            work_dir,
        } => run_check(&grammar, modular, work_dir),
    };

    match result {
        Ok(true) => {}
        Ok(false) => process::exit(1),
        Err(e) => {
            print_error(e);
            process::exit(1);
        }
    }
}

/// Installs a stderr subscriber filtered by `RUST_LOG`.
pub fn init_logging(verbose: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        if verbose {
            EnvFilter::new("grammark=debug")
        } else {
            EnvFilter::new("warn")
        }
    });
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

// ============================================================================
// COMMANDS
// ============================================================================

/// Returns `Ok(false)` when some fragment failed; the others are still printed.
fn run_scan(
    grammar: &str,
    inputs: &[PathBuf],
    flags: &ScanFlags,
    lines: bool,
    output: OutputFormat,
) -> Result<bool> {
    let options = flags.to_options()?;
    let cache = options.build_cache();
    let resolver = GrammarSourceResolver::new();
    let transformer = FragmentTransformer::setup(&cache, &resolver, grammar, options)?;

    let mut fragments = Vec::new();
    for (origin, text) in read_inputs(inputs)? {
        if lines {
            fragments.extend(
                text.lines()
                    .enumerate()
                    .map(|(index, line)| Fragment::new(line, format!("{origin}:{}", index + 1))),
            );
        } else {
            fragments.push(Fragment::new(text, origin));
        }
    }

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut all_ok = true;
    for fragment in &fragments {
        let (line, result) = render_fragment(&transformer, fragment, output)?;
        writeln!(out, "{line}").map_err(|e| GrammarkError::io("<stdout>", e))?;
        if let Err(error) = result {
            all_ok = false;
            print_error(error);
        }
    }
    Ok(all_ok)
}

#[derive(Serialize)]
struct FragmentReport<'a, T: Serialize> {
    origin: &'a str,
    events: T,
}

/// Renders one fragment in `format`. The scan result is returned separately so partial
/// output of a failed scan is still printed.
fn render_fragment(
    transformer: &FragmentTransformer,
    fragment: &Fragment,
    format: OutputFormat,
) -> Result<(String, std::result::Result<(), crate::errors::ScanError>)> {
    let origin = fragment.origin();
    let (line, result) = match format {
        OutputFormat::Markup => {
            let mut writer = MarkupWriter::new();
            let result = transformer.transform(fragment, &mut writer);
            (writer.into_string(), result)
        }
        OutputFormat::Events => {
            let mut sink = RecordingSink::new();
            let result = transformer.transform(fragment, &mut sink);
            (to_json(&FragmentReport { origin, events: &sink.events })?, result)
        }
        OutputFormat::Json => {
            let engine = ScanEngine::new(
                transformer.compiled().parser(),
                transformer.options().scan_options(),
            );
            let mut events: Vec<ScanEvent> = Vec::new();
            let result = engine.scan_with(fragment, |event| events.push(event));
            (to_json(&FragmentReport { origin, events: &events })?, result)
        }
    };
    Ok((line, result))
}

fn to_json(value: &impl Serialize) -> Result<String> {
    serde_json::to_string(value).map_err(|e| GrammarkError::io("<stdout>", io::Error::from(e)))
}

fn run_check(grammar: &str, modular: bool, work_dir: Option<PathBuf>) -> Result<bool> {
    let options = Options {
        modular,
        work_dir,
        ..Options::default()
    };
    let cache = options.build_cache();
    let resolver = GrammarSourceResolver::new();
    let sources = resolver.resolve(grammar, modular)?;
    let compiled = cache.ensure_up_to_date(&sources)?;

    let generated = compiled
        .generated_dir()
        .join(format!("{GENERATED_GRAMMAR}.{GRAMMAR_EXTENSION}"));
    let report = std::fs::read_to_string(&generated)
        .map(|source| inspect_grammar(&source))
        .unwrap_or_default();

    print_check(
        &sources.identity.to_string(),
        compiled.program(),
        compiled.parser().entry_rule(),
        &report,
    );
    Ok(report.is_valid())
}

// ============================================================================
// INPUT AND OUTPUT HELPERS
// ============================================================================

/// `(origin, text)` of every input: files as given, directories walked in name order,
/// stdin when there are no inputs.
fn read_inputs(inputs: &[PathBuf]) -> Result<Vec<(String, String)>> {
    if inputs.is_empty() {
        let mut text = String::new();
        io::stdin()
            .read_to_string(&mut text)
            .map_err(|e| GrammarkError::io("<stdin>", e))?;
        return Ok(vec![("<stdin>".to_string(), text)]);
    }

    let mut read = Vec::new();
    for input in inputs {
        if input.is_dir() {
            for entry in WalkDir::new(input).sort_by_file_name() {
                let entry = entry.map_err(|e| GrammarkError::io(input.display(), io::Error::from(e)))?;
                if entry.file_type().is_file() {
                    read.push(read_input(entry.path())?);
                }
            }
        } else {
            read.push(read_input(input)?);
        }
    }
    Ok(read)
}

fn read_input(path: &Path) -> Result<(String, String)> {
    let text = std::fs::read_to_string(path).map_err(|e| GrammarkError::io(path.display(), e))?;
    Ok((path.display().to_string(), text))
}

fn print_check(grammar: &str, program: &dyn Program, entry: &str, report: &GrammarReport) {
    let mut stdout = StandardStream::stdout(ColorChoice::Auto);
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(Color::Green)).set_bold(true));
    let _ = writeln!(stdout, "Built {grammar}");
    let _ = stdout.reset();

    for rule in program.rule_names() {
        let marker = if rule == entry { " (entry)" } else { "" };
        let _ = writeln!(stdout, "  {rule}{marker}");
    }

    print_section(&mut stdout, &report.errors, Color::Red, "errors");
    print_section(&mut stdout, &report.warnings, Color::Yellow, "warnings");
    print_section(&mut stdout, &report.suggestions, Color::Cyan, "suggestions");
}

fn print_section(stdout: &mut StandardStream, items: &[String], color: Color, title: &str) {
    if items.is_empty() {
        return;
    }
    let _ = stdout.set_color(ColorSpec::new().set_fg(Some(color)));
    let _ = writeln!(stdout, "{title}:");
    let _ = stdout.reset();
    for item in items {
        let _ = writeln!(stdout, "  • {item}");
    }
}
