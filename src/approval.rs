//! Batch approval state machine.
//!
//! A modifying command no other stage resolved lands here. The machine
//! persists the agent's stated plan as one pending record, re-prompts
//! idempotently until the user replies affirmatively, then allows exactly
//! the commands enumerated at creation time — never more.

use crate::config::Config;
use crate::rules::{Classification, RuleSet};
use crate::store::{BatchRecord, BatchStatus, BatchStore, now_epoch_secs};
use crate::transcript::Transcript;

/// Outcome of the terminal batch stage.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BatchResolution {
    /// Deny with a summary the host surfaces for confirmation.
    Deny(String),
    /// No opinion; the host's own confirmation flow takes over.
    Defer,
}

/// Allow when the command is already covered: an approved member, or a
/// pending member whose consent just arrived in the transcript.
pub fn check_prior_approval(
    store: &BatchStore,
    config: &Config,
    session_id: &str,
    command: &str,
    transcript: &Transcript,
) -> Option<String> {
    let mut record = store.load()?;
    if record.session_id != session_id || !record.is_member(command) {
        return None;
    }
    match record.status {
        BatchStatus::Approved => {
            Some("Batch approval: command is part of the approved plan".into())
        }
        BatchStatus::Pending => {
            if transcript.has_recent_consent(config.settings.consent_scan_turns, &config.consent) {
                record.status = BatchStatus::Approved;
                store.save(&record);
                log::info!("batch: pending plan approved by user reply");
                Some("Batch approval: user confirmed the pending plan".into())
            } else {
                None
            }
        }
    }
}

/// Terminal stage for a command no earlier stage resolved.
pub fn settle(
    store: &BatchStore,
    rules: &RuleSet,
    session_id: &str,
    command: &str,
    transcript: &Transcript,
) -> BatchResolution {
    if let Some(record) = store.load()
        && record.session_id == session_id
    {
        match (record.status, record.is_member(command)) {
            // Approval never extends to commands outside the plan.
            (BatchStatus::Approved, _) => return BatchResolution::Defer,
            // Idempotent re-prompt with the original summary.
            (BatchStatus::Pending, true) => return BatchResolution::Deny(record.summary),
            // Stale or unrelated plan: replaced wholesale below.
            (BatchStatus::Pending, false) => {}
        }
    }

    let record = create_pending(rules, session_id, command, transcript);
    let summary = record.summary.clone();
    store.save(&record);
    log::info!(
        "batch: created pending plan with {} command(s)",
        record.commands.len()
    );
    BatchResolution::Deny(summary)
}

/// Build a fresh pending record from the agent's stated plan, keeping only
/// commands the rules consider modifying or ambiguous. The triggering
/// command is always a member so the record converges on re-invocation.
fn create_pending(
    rules: &RuleSet,
    session_id: &str,
    command: &str,
    transcript: &Transcript,
) -> BatchRecord {
    let mut commands: Vec<String> = transcript
        .last_agent_plan()
        .into_iter()
        .filter(|c| rules.classify(c) != Classification::Readonly)
        .collect();
    if !commands.iter().any(|c| c.trim() == command.trim()) {
        commands.push(command.to_string());
    }

    let summary = render_summary(&commands);
    BatchRecord {
        session_id: session_id.into(),
        commands,
        status: BatchStatus::Pending,
        summary,
        created_at: now_epoch_secs(),
    }
}

fn render_summary(commands: &[String]) -> String {
    let mut lines = vec![format!(
        "Plan requires approval for {} command(s):",
        commands.len()
    )];
    for (i, command) in commands.iter().enumerate() {
        lines.push(format!("  {}. {}", i + 1, command));
    }
    lines.join("\n")
}
