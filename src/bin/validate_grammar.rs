//! Grammar Validation Tool for Grammark
//!
//! Checks a pest grammar (or every module of a modular grammar) before it is used for
//! scanning: syntax and undefined rule references, a usable entry rule, and rules the
//! entry rule can never reach.
//!
//! ## Usage
//! ```bash
//! cargo run --bin validate_grammar -- dates.pest
//! cargo run --bin validate_grammar -- --modular dates.grammars
//! ```

// ============================================================================
// 1. Module docs & imports
// ============================================================================

use std::fs;
use std::process;

use grammark::errors::{print_error, GrammarkError};
use grammark::grammar::{inspect_grammar, GrammarReport, GrammarSourceResolver};

// ============================================================================
// 2. Entry point
// ============================================================================

fn main() {
    let mut modular = false;
    let mut grammars = Vec::new();
    for arg in std::env::args().skip(1) {
        match arg.as_str() {
            "--modular" | "-m" => modular = true,
            _ => grammars.push(arg),
        }
    }

    if grammars.is_empty() {
        eprintln!("usage: validate_grammar [--modular] <grammar>...");
        process::exit(2);
    }

    let mut all_valid = true;
    for grammar in &grammars {
        println!("🔍 Validating grammar: {grammar}");
        match validate_grammar(grammar, modular) {
            Ok(report) => {
                print_report(&report);
                all_valid &= report.is_valid();
            }
            Err(e) => {
                print_error(e);
                all_valid = false;
            }
        }
    }

    if !all_valid {
        process::exit(1);
    }
}

// ============================================================================
// 3. Validation
// ============================================================================

/// Reads every module of `grammar` in build order and inspects the combined text.
fn validate_grammar(grammar: &str, modular: bool) -> Result<GrammarReport, GrammarkError> {
    let sources = GrammarSourceResolver::new().resolve(grammar, modular)?;

    let mut combined = String::new();
    for module in &sources.modules {
        let text = fs::read_to_string(module).map_err(|e| GrammarkError::io(module.display(), e))?;
        combined.push_str(&text);
        combined.push('\n');
    }

    let report = inspect_grammar(&combined);
    println!(
        "📋 Parsed {} grammar rules from {} file(s)",
        report.rules.len(),
        sources.modules.len()
    );
    Ok(report)
}

// ============================================================================
// 4. Reporting
// ============================================================================

fn print_report(report: &GrammarReport) {
    print_section(&report.errors, "❌", "GRAMMAR VALIDATION ERRORS");
    print_section(&report.warnings, "⚠️ ", "GRAMMAR WARNINGS");
    print_section(&report.suggestions, "💡", "GRAMMAR SUGGESTIONS");

    if let Some(entry) = &report.entry {
        println!("▶️  Entry rule: {entry}");
    }
    if report.is_valid() && report.warnings.is_empty() {
        println!("✅ Grammar validation passed");
    }
}

fn print_section(items: &[String], emoji: &str, title: &str) {
    if items.is_empty() {
        return;
    }

    eprintln!("{emoji} {title}:");
    for item in items {
        eprintln!("  • {item}");
    }
    eprintln!();
}
