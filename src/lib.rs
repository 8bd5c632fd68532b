//! cc-smartgate: a PreToolUse hook for Claude Code that auto-approves
//! read-only Bash commands and routes side-effecting ones through user
//! consent.
//!
//! Given a candidate command and its conversational context, the engine
//! answers allow / deny / defer with a strong bias toward caution: blocking
//! something safe is tolerable, auto-approving something destructive is not.
//!
//! # Architecture
//!
//! - **[`parse`]** — Shell tokenization: quote/subshell-aware compound
//!   splitting, substitution extraction, redirection detection.
//! - **[`rules`]** — Rule classifier: ordered, domain-tagged pattern tables
//!   with conservative taint aggregation.
//! - **[`script`]** — Static analyzer for interpreter-invoked script files,
//!   following local imports.
//! - **[`manifest`]** — Package-manager alias resolution via package.json.
//! - **[`transcript`]** — Conversation reconstruction, consent detection,
//!   agent plan extraction.
//! - **[`store`]** — File-backed shared state: decision cache, oracle lock,
//!   batch record.
//! - **[`oracle`]** — Pluggable external arbitration (claude CLI in
//!   production) with a hard timeout and ambiguous-on-failure semantics.
//! - **[`approval`]** — Batch approval state machine.
//! - **[`pipeline`]** — The per-invocation control flow tying it together.
//! - **[`config`]** — Embedded defaults plus user overlay merge.
//! - **[`hook`]** — The host-facing JSON envelope.

/// Batch approval state machine.
pub mod approval;
/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Host-facing JSON envelope types.
pub mod hook;
/// Env-toggled file logging.
pub mod logging;
/// Package-manager script alias resolution.
pub mod manifest;
/// External arbitration oracle behind a substitutable trait.
pub mod oracle;
/// Shell command parsing: compound splitting, substitutions, redirection.
pub mod parse;
/// The per-invocation decision pipeline.
pub mod pipeline;
/// Rule-based classification over configured pattern tables.
pub mod rules;
/// Static analysis of interpreter-invoked scripts.
pub mod script;
/// File-backed shared state: cache, lock, batch record.
pub mod store;
/// Conversation transcript parsing.
pub mod transcript;

use rules::{Classification, RuleSet};

/// Classify a command against the default rule tables.
///
/// Convenience entry point for tests and simple usage. The full pipeline
/// (cache, oracle, batch approval) lives in [`pipeline::Engine`].
pub fn classify(command: &str) -> Classification {
    let config = config::Config::default_config();
    RuleSet::from_tables(&config.rules).classify(command)
}
