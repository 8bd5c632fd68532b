//! Rule-based command classification.
//!
//! The classifier never special-cases individual tools: it iterates ordered,
//! domain-tagged pattern tables compiled from configuration. Precedence is
//! fixed and conservative: one modifying sub-command taints the whole
//! compound command; only unanimous read-only matches approve.

use regex::Regex;

use crate::config::{PatternGroup, RuleTables};
use crate::parse;

/// What a command does to the world, as far as the rules can tell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    Readonly,
    Modifying,
    Ambiguous,
}

#[derive(Debug)]
struct RulePattern {
    regex: Regex,
    domain: String,
}

/// Compiled pattern tables. Built once per invocation from config.
pub struct RuleSet {
    readonly: Vec<RulePattern>,
    modifying: Vec<RulePattern>,
}

/// Substitution recursion guard; deeper nesting than this is pathological.
const MAX_DEPTH: usize = 8;

impl RuleSet {
    pub fn from_tables(tables: &RuleTables) -> Self {
        Self {
            readonly: compile(&tables.readonly),
            modifying: compile(&tables.modifying),
        }
    }

    /// Classify a full command string: unwrap a shell-interpreter wrapper,
    /// decompose into atomic units (sub-commands plus substitution
    /// contents), then aggregate. Modifying > readonly > ambiguous.
    pub fn classify(&self, command: &str) -> Classification {
        let unwrapped =
            parse::unwrap_shell_wrapper(command).unwrap_or_else(|| command.to_string());

        let mut units = Vec::new();
        collect_units(&unwrapped, 0, &mut units);
        if units.is_empty() {
            return Classification::Ambiguous;
        }

        let mut all_readonly = true;
        for unit in &units {
            match self.classify_single(unit).0 {
                Classification::Modifying => return Classification::Modifying,
                Classification::Readonly => {}
                Classification::Ambiguous => all_readonly = false,
            }
        }
        if all_readonly {
            Classification::Readonly
        } else {
            Classification::Ambiguous
        }
    }

    /// Classify one atomic sub-command. Returns the matched domain tag for
    /// logging. The modifying tables are consulted first; that order must
    /// never be inverted.
    pub fn classify_single(&self, command: &str) -> (Classification, Option<&str>) {
        let cmd = command.trim();
        if cmd.is_empty() {
            return (Classification::Ambiguous, None);
        }
        if parse::has_output_redirection(cmd).is_some() {
            return (Classification::Modifying, Some("redirection"));
        }
        let text = parse::match_text(cmd);
        for rule in &self.modifying {
            if rule.regex.is_match(&text) {
                return (Classification::Modifying, Some(&rule.domain));
            }
        }
        for rule in &self.readonly {
            if rule.regex.is_match(&text) {
                return (Classification::Readonly, Some(&rule.domain));
            }
        }
        (Classification::Ambiguous, None)
    }
}

fn compile(groups: &[PatternGroup]) -> Vec<RulePattern> {
    let mut out = Vec::new();
    for group in groups {
        for pattern in &group.patterns {
            match Regex::new(pattern) {
                Ok(regex) => out.push(RulePattern {
                    regex,
                    domain: group.domain.clone(),
                }),
                Err(e) => {
                    log::warn!("rules: skipping invalid pattern {pattern:?}: {e}");
                }
            }
        }
    }
    out
}

/// Flatten a command into atomic units: top-level sub-commands plus the
/// contents of `$()`/backtick substitutions, recursively.
fn collect_units(command: &str, depth: usize, out: &mut Vec<String>) {
    if depth > MAX_DEPTH {
        return;
    }
    for segment in parse::split_commands(command) {
        for inner in parse::extract_substitutions(&segment) {
            collect_units(&inner, depth + 1, out);
        }
        out.push(segment);
    }
}
