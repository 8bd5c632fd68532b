//! External arbitration oracle.
//!
//! Ambiguous and consent-dependent decisions are delegated to an external
//! decision service behind the [`Oracle`] trait. The production
//! implementation shells out to the `claude` CLI; tests substitute a
//! scripted one. The adapter never fails the hosting process: every
//! timeout, transport error, or unparseable response maps to ambiguous.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

/// Hard ceiling on a single oracle round trip. Single shot, no retry.
const ORACLE_TIMEOUT: Duration = Duration::from_secs(15);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
/// Script content attached to a query is capped at this many chars.
pub const SCRIPT_CONTENT_CAP: usize = 5000;

#[derive(Debug, Clone)]
pub struct OracleRequest {
    pub command: String,
    /// Reconstruction of the recent conversation, possibly empty.
    pub context: String,
    pub script: Option<ScriptAttachment>,
}

#[derive(Debug, Clone)]
pub struct ScriptAttachment {
    pub path: String,
    /// Already capped to [`SCRIPT_CONTENT_CAP`].
    pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OracleVerdict {
    Readonly,
    Modifying,
    Ambiguous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsentVerdict {
    Approve,
    Deny,
    Ambiguous,
}

/// Arbitration capability with two framings: effect classification and
/// consent judgment.
pub trait Oracle {
    fn classify(&self, request: &OracleRequest) -> OracleVerdict;
    fn judge_consent(&self, request: &OracleRequest) -> ConsentVerdict;
}

/// Production oracle: one bounded `claude -p` invocation per query.
pub struct ClaudeCliOracle {
    model: String,
}

impl ClaudeCliOracle {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
        }
    }

    /// One CLI round trip. Any failure resolves to None.
    fn query(&self, prompt: &str) -> Option<String> {
        let mut child = Command::new("claude")
            .args([
                "-p",
                "--model",
                &self.model,
                "--max-turns",
                "1",
                "--no-session-persistence",
            ])
            .arg(prompt)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .ok()?;

        let start = Instant::now();
        let status = loop {
            match child.try_wait() {
                Ok(Some(status)) => break status,
                Ok(None) => {
                    if start.elapsed() >= ORACLE_TIMEOUT {
                        log::warn!("oracle: query timed out after {ORACLE_TIMEOUT:?}");
                        let _ = child.kill();
                        let _ = child.wait();
                        return None;
                    }
                    std::thread::sleep(POLL_INTERVAL);
                }
                Err(_) => return None,
            }
        };
        if !status.success() {
            return None;
        }

        let mut output = String::new();
        child.stdout.take()?.read_to_string(&mut output).ok()?;
        Some(output)
    }
}

impl Oracle for ClaudeCliOracle {
    fn classify(&self, request: &OracleRequest) -> OracleVerdict {
        match self.query(&classification_prompt(request)) {
            Some(answer) => parse_classification(&answer),
            None => OracleVerdict::Ambiguous,
        }
    }

    fn judge_consent(&self, request: &OracleRequest) -> ConsentVerdict {
        match self.query(&consent_prompt(request)) {
            Some(answer) => parse_consent(&answer),
            None => ConsentVerdict::Ambiguous,
        }
    }
}

// ── Prompt framing ──

pub fn classification_prompt(request: &OracleRequest) -> String {
    let mut prompt = format!(
        "Analyze this shell command and determine if it modifies the filesystem, \
         system state, or makes destructive network requests.\n\nCommand: {}",
        request.command
    );
    if let Some(script) = &request.script {
        prompt.push_str(&format!(
            "\n\nScript file content ({}):\n```\n{}\n```",
            script.path, script.content
        ));
    }
    prompt.push_str("\n\nRespond with ONLY one word: \"READONLY\" or \"MODIFYING\".");
    prompt
}

pub fn consent_prompt(request: &OracleRequest) -> String {
    let mut prompt = format!(
        "An autonomous coding agent wants to run this shell command:\n\n  {}\n",
        request.command
    );
    if !request.context.is_empty() {
        prompt.push_str(&format!("\nRecent conversation:\n{}\n", request.context));
    }
    prompt.push_str(
        "\nBased only on the conversation, did the user already clearly consent to \
         this exact side effect? Respond with ONLY one word: \"APPROVE\", \"DENY\", \
         or \"UNCLEAR\".",
    );
    prompt
}

// ── Verdict parsing ──

pub fn parse_classification(answer: &str) -> OracleVerdict {
    let upper = answer.trim().to_uppercase();
    if upper.contains("READONLY") {
        OracleVerdict::Readonly
    } else if upper.contains("MODIFYING") {
        OracleVerdict::Modifying
    } else {
        OracleVerdict::Ambiguous
    }
}

pub fn parse_consent(answer: &str) -> ConsentVerdict {
    let upper = answer.trim().to_uppercase();
    if upper.contains("APPROVE") {
        ConsentVerdict::Approve
    } else if upper.contains("DENY") {
        ConsentVerdict::Deny
    } else {
        ConsentVerdict::Ambiguous
    }
}
