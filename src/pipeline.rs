//! The per-invocation decision pipeline.
//!
//! Stage order is fixed. Read-only commands allow immediately. Modifying
//! commands try batch approval, then the cache, then an oracle consent
//! check, and finally fall into the batch state machine. Ambiguous
//! commands try alias resolution and script analysis first, then cache,
//! oracle classification, and the same batch fallback. Every failure mode
//! degrades toward "no opinion", never toward a confident allow.

use std::path::Path;

use crate::approval::{self, BatchResolution};
use crate::config::Config;
use crate::hook::{HookInput, HookOutput};
use crate::manifest;
use crate::oracle::{
    ConsentVerdict, Oracle, OracleRequest, OracleVerdict, SCRIPT_CONTENT_CAP, ScriptAttachment,
};
use crate::rules::{Classification, RuleSet};
use crate::script;
use crate::store::StateDir;
use crate::transcript::Transcript;

/// The tool this hook gates.
const SHELL_TOOL: &str = "Bash";

pub struct Engine<'a> {
    config: &'a Config,
    rules: RuleSet,
    state: StateDir,
    oracle: &'a dyn Oracle,
}

impl<'a> Engine<'a> {
    pub fn new(config: &'a Config, state: StateDir, oracle: &'a dyn Oracle) -> Self {
        Self {
            config,
            rules: RuleSet::from_tables(&config.rules),
            state,
            oracle,
        }
    }

    /// Decide one invocation. None means no opinion: the host's default
    /// confirmation flow takes over.
    pub fn decide(&self, input: &HookInput) -> Option<HookOutput> {
        if input.tool_name != SHELL_TOOL {
            return None;
        }
        let command = input.tool_input.command.trim();
        if command.is_empty() {
            return None;
        }

        let transcript = Transcript::load(Path::new(&input.transcript_path));

        match self.rules.classify(command) {
            Classification::Readonly => {
                log::info!("rules: read-only: {command}");
                Some(HookOutput::allow("Rule-based: read-only command"))
            }
            Classification::Modifying => {
                log::info!("rules: modifying: {command}");
                self.resolve_modifying(command, input, &transcript)
            }
            Classification::Ambiguous => {
                log::info!("rules: ambiguous: {command}");
                self.resolve_ambiguous(command, input, &transcript)
            }
        }
    }

    fn resolve_modifying(
        &self,
        command: &str,
        input: &HookInput,
        transcript: &Transcript,
    ) -> Option<HookOutput> {
        let batch = self.state.batch();
        if let Some(reason) = approval::check_prior_approval(
            &batch,
            self.config,
            &input.session_id,
            command,
            transcript,
        ) {
            return Some(HookOutput::allow(reason));
        }

        let cache = self.state.cache();
        if cache.get(&input.session_id, command).is_some() {
            return Some(HookOutput::allow("Previously approved (decision cache)"));
        }

        let request = self.request(command, None, transcript);
        let verdict = self
            .state
            .lock()
            .with_lock(|| self.oracle.judge_consent(&request));
        if verdict == ConsentVerdict::Approve {
            cache.put(&input.session_id, command);
            return Some(HookOutput::allow(
                "Oracle: user already consented to this command",
            ));
        }

        self.batch_fallback(command, input, transcript)
    }

    fn resolve_ambiguous(
        &self,
        command: &str,
        input: &HookInput,
        transcript: &Transcript,
    ) -> Option<HookOutput> {
        let cwd = Path::new(&input.cwd);

        // Alias resolution substitutes the underlying command and delegates
        // back to the rule classifier.
        if let Some(underlying) = manifest::resolve_alias(
            command,
            cwd,
            &self.config.manifest.builtin_subcommands,
        ) {
            match self.rules.classify(&underlying) {
                Classification::Readonly => {
                    return Some(HookOutput::allow(
                        "Manifest alias resolves to a read-only command",
                    ));
                }
                Classification::Modifying => {
                    return self.resolve_modifying(command, input, transcript);
                }
                Classification::Ambiguous => {}
            }
        }

        let script_path = script::extract_script_path(command);
        if let Some(path) = &script_path {
            match script::analyze_script(path, cwd) {
                Classification::Readonly => {
                    return Some(HookOutput::allow(
                        "Static analysis: no write operations found in script",
                    ));
                }
                Classification::Modifying => {
                    return self.resolve_modifying(command, input, transcript);
                }
                Classification::Ambiguous => {}
            }
        }

        let cache = self.state.cache();
        if cache.get(&input.session_id, command).is_some() {
            return Some(HookOutput::allow("Previously approved (decision cache)"));
        }

        let attachment = script_path
            .as_deref()
            .and_then(|p| read_attachment(p, cwd));
        let request = self.request(command, attachment, transcript);
        let verdict = self
            .state
            .lock()
            .with_lock(|| self.oracle.classify(&request));
        if verdict == OracleVerdict::Readonly {
            cache.put(&input.session_id, command);
            return Some(HookOutput::allow("Oracle: predicted read-only"));
        }

        self.batch_fallback(command, input, transcript)
    }

    /// The batch state machine is the last stage for anything unresolved.
    fn batch_fallback(
        &self,
        command: &str,
        input: &HookInput,
        transcript: &Transcript,
    ) -> Option<HookOutput> {
        let batch = self.state.batch();
        if let Some(reason) = approval::check_prior_approval(
            &batch,
            self.config,
            &input.session_id,
            command,
            transcript,
        ) {
            return Some(HookOutput::allow(reason));
        }
        match approval::settle(
            &batch,
            &self.rules,
            &input.session_id,
            command,
            transcript,
        ) {
            BatchResolution::Deny(summary) => Some(HookOutput::deny(summary)),
            BatchResolution::Defer => None,
        }
    }

    fn request(
        &self,
        command: &str,
        script: Option<ScriptAttachment>,
        transcript: &Transcript,
    ) -> OracleRequest {
        OracleRequest {
            command: command.to_string(),
            context: transcript.context_window(self.config.settings.context_turns),
            script,
        }
    }
}

/// Read and cap script content for attachment to an oracle query.
fn read_attachment(path: &str, cwd: &Path) -> Option<ScriptAttachment> {
    let full = script::resolve_path(path, cwd);
    let content = std::fs::read_to_string(full).ok()?;
    Some(ScriptAttachment {
        path: path.to_string(),
        content: content.chars().take(SCRIPT_CONTENT_CAP).collect(),
    })
}
