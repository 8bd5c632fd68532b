//! Conversation transcript parsing.
//!
//! The transcript is a newline-delimited JSON event log. Only `user` and
//! `assistant` events are consulted; message content is either a plain
//! string or a list of typed blocks, of which text and tool-invocation
//! blocks matter. Text beginning with a markup tag is machine-structured
//! and skipped when reconstructing conversational context.

use std::path::Path;

use serde_json::Value;

use crate::config::ConsentConfig;

/// Per-turn text is capped when rendered into oracle context.
const TURN_TEXT_CAP: usize = 500;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Agent,
}

#[derive(Debug, Clone)]
pub struct Turn {
    pub role: Role,
    /// Concatenated text blocks; machine-structured entries dropped.
    pub text: String,
    /// Shell commands from tool-invocation blocks in this turn.
    pub commands: Vec<String>,
}

#[derive(Debug, Default)]
pub struct Transcript {
    turns: Vec<Turn>,
}

impl Transcript {
    /// Read a transcript file. Unreadable input yields an empty
    /// transcript; individual malformed lines are skipped.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content),
            Err(_) => Self::default(),
        }
    }

    pub fn parse(content: &str) -> Self {
        let mut turns = Vec::new();
        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let Ok(event) = serde_json::from_str::<Value>(line) else {
                continue;
            };
            let role = match event.get("type").and_then(Value::as_str) {
                Some("user") => Role::User,
                Some("assistant") => Role::Agent,
                _ => continue,
            };
            if let Some(turn) = parse_turn(role, &event) {
                turns.push(turn);
            }
        }
        Self { turns }
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    /// Reconstruct the last `n` turns as "User:/Agent:" lines for the
    /// oracle's consent judgment.
    pub fn context_window(&self, n: usize) -> String {
        let start = self.turns.len().saturating_sub(n);
        let mut out = Vec::new();
        for turn in &self.turns[start..] {
            let who = match turn.role {
                Role::User => "User",
                Role::Agent => "Agent",
            };
            let mut parts = Vec::new();
            if !turn.text.is_empty() {
                parts.push(truncate(&turn.text, TURN_TEXT_CAP));
            }
            for cmd in &turn.commands {
                parts.push(format!("$ {cmd}"));
            }
            if !parts.is_empty() {
                out.push(format!("{who}: {}", parts.join("\n")));
            }
        }
        out.join("\n")
    }

    /// Any affirmative reply among the last `n` substantive user turns?
    pub fn has_recent_consent(&self, n: usize, consent: &ConsentConfig) -> bool {
        self.turns
            .iter()
            .rev()
            .filter(|t| t.role == Role::User && !t.text.is_empty())
            .take(n)
            .any(|t| is_affirmative(&t.text, consent))
    }

    /// Candidate commands the agent intends to run next, from the most
    /// recent agent turn: fenced code-block lines, inline code spans with
    /// arguments, and tool-invocation commands.
    pub fn last_agent_plan(&self) -> Vec<String> {
        let Some(turn) = self.turns.iter().rev().find(|t| t.role == Role::Agent) else {
            return Vec::new();
        };
        let mut plan = Vec::new();
        extract_plan_from_text(&turn.text, &mut plan);
        plan.extend(turn.commands.iter().cloned());
        dedup_preserving_order(plan)
    }
}

fn parse_turn(role: Role, event: &Value) -> Option<Turn> {
    let content = event.get("message")?.get("content")?;
    let mut texts: Vec<String> = Vec::new();
    let mut commands: Vec<String> = Vec::new();

    match content {
        Value::String(s) => push_text(&mut texts, s),
        Value::Array(blocks) => {
            for block in blocks {
                match block.get("type").and_then(Value::as_str) {
                    Some("text") => {
                        if let Some(t) = block.get("text").and_then(Value::as_str) {
                            push_text(&mut texts, t);
                        }
                    }
                    Some("tool_use") => {
                        if block.get("name").and_then(Value::as_str) == Some("Bash")
                            && let Some(cmd) = block
                                .get("input")
                                .and_then(|i| i.get("command"))
                                .and_then(Value::as_str)
                        {
                            commands.push(cmd.to_string());
                        }
                    }
                    _ => {}
                }
            }
        }
        _ => return None,
    }

    let text = texts.join("\n");
    if text.is_empty() && commands.is_empty() {
        return None;
    }
    Some(Turn {
        role,
        text,
        commands,
    })
}

/// Entries beginning with a markup tag are machine-generated, not speech.
fn push_text(out: &mut Vec<String>, s: &str) {
    let trimmed = s.trim();
    if !trimmed.is_empty() && !trimmed.starts_with('<') {
        out.push(trimmed.to_string());
    }
}

/// Does this user message read as an affirmative reply?
pub fn is_affirmative(text: &str, consent: &ConsentConfig) -> bool {
    let lowered = text.trim().to_lowercase();
    let stripped = lowered.trim_end_matches(['.', '!', '?', '~', ' ']);
    if consent
        .exact
        .iter()
        .any(|k| stripped == k.to_lowercase())
    {
        return true;
    }
    consent
        .contains
        .iter()
        .any(|k| lowered.contains(&k.to_lowercase()))
}

fn extract_plan_from_text(text: &str, out: &mut Vec<String>) {
    let mut in_fence = false;
    for line in text.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            if !trimmed.is_empty() && !trimmed.starts_with('#') {
                out.push(trimmed.to_string());
            }
            continue;
        }
        // Inline spans: `cmd args`. A span without whitespace is a name,
        // not a command.
        for (idx, piece) in line.split('`').enumerate() {
            if idx % 2 == 1 {
                let span = piece.trim();
                if span.contains(char::is_whitespace) {
                    out.push(span.to_string());
                }
            }
        }
    }
}

fn dedup_preserving_order(items: Vec<String>) -> Vec<String> {
    let mut seen = std::collections::HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}

fn truncate(text: &str, cap: usize) -> String {
    if text.chars().count() <= cap {
        text.to_string()
    } else {
        text.chars().take(cap).collect()
    }
}
