//! Static checks of a pest grammar, used by `grammark check` and `validate_grammar`.

use std::collections::{BTreeSet, HashMap};

use pest_meta::ast::RuleType;
use pest_meta::optimizer::{OptimizedExpr, OptimizedRule};

use super::{entry_rule, IMPLICIT_RULES};

/// Findings about one grammar, by severity.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct GrammarReport {
    /// Declared rules in order.
    pub rules: Vec<String>,
    pub entry: Option<String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    pub suggestions: Vec<String>,
}

impl GrammarReport {
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    pub fn report_warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    pub fn report_suggestion(&mut self, message: impl Into<String>) {
        self.suggestions.push(message.into());
    }
}

/// Checks grammar text: syntax and rule references, a usable entry rule, and rules the
/// entry rule never reaches.
pub fn inspect_grammar(source: &str) -> GrammarReport {
    let mut report = GrammarReport::default();

    let rules = match pest_meta::parse_and_optimize(source) {
        Ok((_, rules)) => rules,
        Err(errors) => {
            for error in errors {
                report.report_error(error.to_string());
            }
            return report;
        }
    };
    report.rules = rules.iter().map(|rule| rule.name.clone()).collect();

    let Some(entry) = entry_rule(report.rules.iter().map(String::as_str)).map(str::to_string) else {
        report.report_error("the grammar declares no rule besides WHITESPACE and COMMENT");
        return report;
    };

    let by_name: HashMap<&str, &OptimizedRule> =
        rules.iter().map(|rule| (rule.name.as_str(), rule)).collect();
    if let Some(rule) = by_name.get(entry.as_str()) {
        if rule.ty == RuleType::Silent {
            report.report_warning(format!(
                "entry rule '{entry}' is silent; matches will be wrapped in a synthetic '{entry}' node"
            ));
        }
    }

    let reachable = reachable_from(&entry, &by_name);
    let unused: Vec<String> = report
        .rules
        .iter()
        .filter(|name| !reachable.contains(name.as_str()) && !IMPLICIT_RULES.contains(&name.as_str()))
        .map(|name| format!("rule '{name}' is never used by entry rule '{entry}'"))
        .collect();
    for warning in unused {
        report.report_warning(warning);
    }

    if !report.rules.iter().any(|name| name == "WHITESPACE") {
        report.report_suggestion(
            "no WHITESPACE rule: spaces inside a match must be spelled out in the grammar",
        );
    }

    report.entry = Some(entry);
    report
}

fn reachable_from<'g>(entry: &'g str, rules: &HashMap<&'g str, &'g OptimizedRule>) -> BTreeSet<&'g str> {
    let mut reachable = BTreeSet::new();
    let mut pending = vec![entry];
    while let Some(name) = pending.pop() {
        if !reachable.insert(name) {
            continue;
        }
        if let Some(rule) = rules.get(name) {
            collect_references(&rule.expr, &mut pending);
        }
    }
    reachable
}

fn collect_references<'g>(expr: &'g OptimizedExpr, out: &mut Vec<&'g str>) {
    match expr {
        OptimizedExpr::Ident(name) => out.push(name),
        OptimizedExpr::PosPred(inner)
        | OptimizedExpr::NegPred(inner)
        | OptimizedExpr::Opt(inner)
        | OptimizedExpr::Rep(inner)
        | OptimizedExpr::Push(inner)
        | OptimizedExpr::RestoreOnErr(inner) => collect_references(inner, out),
        OptimizedExpr::Seq(left, right) | OptimizedExpr::Choice(left, right) => {
            collect_references(left, out);
            collect_references(right, out);
        }
        _ => {}
    }
}
