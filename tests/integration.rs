use std::cell::RefCell;
use std::fs;
use std::path::Path;

use tempfile::TempDir;

use cc_smartgate::config::Config;
use cc_smartgate::hook::{HookInput, HookOutput, ToolInput};
use cc_smartgate::oracle::{ConsentVerdict, Oracle, OracleRequest, OracleVerdict};
use cc_smartgate::pipeline::Engine;
use cc_smartgate::rules::Classification;
use cc_smartgate::store::StateDir;

// ── Classification (rule tables only) ──

fn classification_for(command: &str) -> Classification {
    cc_smartgate::classify(command)
}

macro_rules! classify_test {
    ($name:ident, $cmd:expr, $class:ident) => {
        #[test]
        fn $name() {
            assert_eq!(
                classification_for($cmd),
                Classification::$class,
                "command: {}",
                $cmd,
            );
        }
    };
}

classify_test!(readonly_ls, "ls -la", Readonly);
classify_test!(readonly_cat, "cat README.md", Readonly);
classify_test!(readonly_git_status, "git status", Readonly);
classify_test!(readonly_git_log, "git log --oneline -10", Readonly);
classify_test!(readonly_grep_pipe, "ps aux | grep node", Readonly);
classify_test!(readonly_chain, "ls -la && cat f.txt", Readonly);
classify_test!(readonly_docker_ps, "docker ps", Readonly);
classify_test!(readonly_kubectl_get, "kubectl get pods", Readonly);
classify_test!(readonly_curl_get, "curl -s https://example.com", Readonly);
classify_test!(readonly_quoted_rm, "echo \"a; rm -rf /\"", Readonly);
classify_test!(readonly_fd_dup, "ls -la 2>&1", Readonly);
classify_test!(readonly_discard, "ls -la 2>/dev/null", Readonly);

classify_test!(modifying_rm, "rm -rf dist", Modifying);
classify_test!(modifying_taint, "ls && rm -rf x", Modifying);
classify_test!(modifying_redirect, "ls -la > out.txt", Modifying);
classify_test!(modifying_git_push, "git push origin main", Modifying);
classify_test!(modifying_npm_install, "npm install left-pad", Modifying);
classify_test!(modifying_wrapper, "bash -c 'rm -rf /tmp/x'", Modifying);
classify_test!(modifying_subst, "echo \"$(rm -rf /)\"", Modifying);
classify_test!(modifying_docker_run, "docker run ubuntu", Modifying);

classify_test!(ambiguous_unknown, "some-unknown-tool --flag", Ambiguous);
classify_test!(ambiguous_node_script, "node build.mjs", Ambiguous);
classify_test!(ambiguous_mixed, "ls && some-unknown-tool", Ambiguous);

// ── Full pipeline harness ──

/// Scripted oracle: returns fixed verdicts, records whether it was asked.
struct ScriptedOracle {
    classify: OracleVerdict,
    consent: ConsentVerdict,
    asked: RefCell<u32>,
}

impl ScriptedOracle {
    fn silent() -> Self {
        Self {
            classify: OracleVerdict::Ambiguous,
            consent: ConsentVerdict::Ambiguous,
            asked: RefCell::new(0),
        }
    }

    fn classifying(verdict: OracleVerdict) -> Self {
        Self {
            classify: verdict,
            ..Self::silent()
        }
    }

    fn consenting(verdict: ConsentVerdict) -> Self {
        Self {
            consent: verdict,
            ..Self::silent()
        }
    }

    fn times_asked(&self) -> u32 {
        *self.asked.borrow()
    }
}

impl Oracle for ScriptedOracle {
    fn classify(&self, _request: &OracleRequest) -> OracleVerdict {
        *self.asked.borrow_mut() += 1;
        self.classify
    }

    fn judge_consent(&self, _request: &OracleRequest) -> ConsentVerdict {
        *self.asked.borrow_mut() += 1;
        self.consent
    }
}

struct Harness {
    dir: TempDir,
    config: Config,
}

impl Harness {
    fn new() -> Self {
        Self {
            dir: TempDir::new().unwrap(),
            config: Config::default_config(),
        }
    }

    fn state(&self) -> StateDir {
        StateDir::at(self.dir.path().join("state"))
    }

    fn cwd(&self) -> &Path {
        self.dir.path()
    }

    fn transcript_path(&self) -> std::path::PathBuf {
        self.dir.path().join("transcript.jsonl")
    }

    fn write_transcript(&self, lines: &[String]) {
        fs::write(self.transcript_path(), lines.join("\n")).unwrap();
    }

    fn input(&self, command: &str) -> HookInput {
        HookInput {
            tool_name: "Bash".into(),
            tool_input: ToolInput {
                command: command.into(),
            },
            cwd: self.cwd().to_string_lossy().into_owned(),
            session_id: "session-1".into(),
            transcript_path: self.transcript_path().to_string_lossy().into_owned(),
        }
    }

    fn decide(&self, oracle: &dyn Oracle, command: &str) -> Option<HookOutput> {
        let engine = Engine::new(&self.config, self.state(), oracle);
        engine.decide(&self.input(command))
    }
}

fn agent_line(text: &str) -> String {
    serde_json::json!({
        "type": "assistant",
        "message": { "content": [ { "type": "text", "text": text } ] }
    })
    .to_string()
}

fn user_line(text: &str) -> String {
    serde_json::json!({ "type": "user", "message": { "content": text } }).to_string()
}

fn decision(output: &HookOutput) -> (&str, &str) {
    (
        output.hook_specific_output.permission_decision.as_str(),
        output.hook_specific_output.permission_decision_reason.as_str(),
    )
}

// ── End-to-end scenarios ──

#[test]
fn non_bash_tool_defers() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();
    let mut input = h.input("ls");
    input.tool_name = "Read".into();
    let engine = Engine::new(&h.config, h.state(), &oracle);
    assert!(engine.decide(&input).is_none());
}

#[test]
fn empty_command_defers() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();
    assert!(h.decide(&oracle, "   ").is_none());
}

#[test]
fn git_status_allows_by_rule() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "git status").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("read-only"), "reason: {reason}");
    assert_eq!(oracle.times_asked(), 0);
}

#[test]
fn rm_without_consent_denies_with_pending_batch() {
    let h = Harness::new();
    h.write_transcript(&[agent_line("I'll clean up with `rm -rf dist` now.")]);
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "rm -rf dist").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "deny");
    assert!(reason.contains("rm -rf dist"), "reason: {reason}");
    assert!(reason.contains("approval"), "reason: {reason}");
}

#[test]
fn rm_after_affirmative_reply_allows_via_batch() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();

    // First invocation creates the pending batch and denies.
    h.write_transcript(&[agent_line("I'll clean up with `rm -rf dist` now.")]);
    let first = h.decide(&oracle, "rm -rf dist").unwrap();
    assert_eq!(decision(&first).0, "deny");

    // The user replies affirmatively; the same command now allows.
    h.write_transcript(&[
        agent_line("I'll clean up with `rm -rf dist` now."),
        user_line("yes"),
    ]);
    let second = h.decide(&oracle, "rm -rf dist").unwrap();
    let (verdict, reason) = decision(&second);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("atch approval"), "reason: {reason}");
}

#[test]
fn approval_covers_only_enumerated_commands() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();

    h.write_transcript(&[agent_line("I'll run `rm -rf dist` and `npm run build`.")]);
    h.decide(&oracle, "rm -rf dist").unwrap();
    h.write_transcript(&[
        agent_line("I'll run `rm -rf dist` and `npm run build`."),
        user_line("go ahead"),
    ]);
    let approved = h.decide(&oracle, "rm -rf dist").unwrap();
    assert_eq!(decision(&approved).0, "allow");

    // A command outside the approved set is not allowed by the batch.
    let outsider = h.decide(&oracle, "rm -rf src");
    assert!(outsider.is_none(), "approved batch must not auto-extend");
}

#[test]
fn pending_batch_reprompts_idempotently() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent();
    h.write_transcript(&[agent_line("Running `rm -rf dist` next.")]);
    let first = h.decide(&oracle, "rm -rf dist").unwrap();
    let second = h.decide(&oracle, "rm -rf dist").unwrap();
    assert_eq!(
        decision(&first).1,
        decision(&second).1,
        "re-prompt must reuse the stored summary"
    );
}

#[test]
fn node_script_allows_via_static_analysis() {
    let h = Harness::new();
    fs::write(
        h.cwd().join("build.mjs"),
        "import fs from 'node:fs';\nconst manifest = JSON.parse(fs.readFileSync('package.json'));\nconsole.log(manifest.name);\n",
    )
    .unwrap();
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "node build.mjs").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("Static analysis"), "reason: {reason}");
    assert_eq!(oracle.times_asked(), 0);
}

#[test]
fn writing_node_script_falls_through_to_batch() {
    let h = Harness::new();
    fs::write(
        h.cwd().join("gen.mjs"),
        "import fs from 'node:fs';\nfs.writeFileSync('out.json', '{}');\n",
    )
    .unwrap();
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "node gen.mjs").unwrap();
    assert_eq!(decision(&output).0, "deny");
}

#[test]
fn alias_resolving_to_readonly_allows() {
    let h = Harness::new();
    fs::write(
        h.cwd().join("package.json"),
        r#"{ "name": "demo", "scripts": { "status": "git status" } }"#,
    )
    .unwrap();
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "npm run status").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("alias"), "reason: {reason}");
}

#[test]
fn alias_resolving_to_modifying_enters_consent_flow() {
    let h = Harness::new();
    fs::write(
        h.cwd().join("package.json"),
        r#"{ "name": "demo", "scripts": { "nuke": "rm -rf dist" } }"#,
    )
    .unwrap();
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "npm run nuke").unwrap();
    // No consent anywhere: lands in the batch machine as a deny.
    assert_eq!(decision(&output).0, "deny");
    assert!(oracle.times_asked() > 0, "consent framing should be tried");
}

#[test]
fn oracle_consent_approval_allows_and_caches() {
    let h = Harness::new();
    h.write_transcript(&[
        user_line("please delete the dist folder"),
        agent_line("Sure, removing it."),
    ]);
    let oracle = ScriptedOracle::consenting(ConsentVerdict::Approve);
    let output = h.decide(&oracle, "rm -rf dist").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("Oracle"), "reason: {reason}");
    assert_eq!(oracle.times_asked(), 1);

    // Second invocation hits the cache; the oracle is not consulted again.
    let quiet = ScriptedOracle::silent();
    let cached = h.decide(&quiet, "rm -rf dist").unwrap();
    assert_eq!(decision(&cached).0, "allow");
    assert!(decision(&cached).1.contains("cache"));
    assert_eq!(quiet.times_asked(), 0);
}

#[test]
fn oracle_readonly_classification_allows_ambiguous_command() {
    let h = Harness::new();
    let oracle = ScriptedOracle::classifying(OracleVerdict::Readonly);
    let output = h.decide(&oracle, "some-unknown-tool --flag").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "allow");
    assert!(reason.contains("Oracle"), "reason: {reason}");
}

#[test]
fn oracle_failure_degrades_to_batch_deny() {
    let h = Harness::new();
    let oracle = ScriptedOracle::silent(); // ambiguous on both framings
    let output = h.decide(&oracle, "some-unknown-tool --flag").unwrap();
    assert_eq!(decision(&output).0, "deny");
}

#[test]
fn cache_key_normalization_spans_cd_prefixes() {
    let h = Harness::new();
    let oracle = ScriptedOracle::classifying(OracleVerdict::Readonly);
    let first = h.decide(&oracle, "cd /app && npm run build").unwrap();
    assert_eq!(decision(&first).0, "allow");

    // Same logical command with a `;` chain hits the same cache entry.
    let quiet = ScriptedOracle::silent();
    let second = h.decide(&quiet, "cd /app; npm run build").unwrap();
    assert_eq!(decision(&second).0, "allow");
    assert!(decision(&second).1.contains("cache"));
    assert_eq!(quiet.times_asked(), 0);
}

#[test]
fn missing_transcript_is_tolerated() {
    let h = Harness::new();
    // No transcript file written at all.
    let oracle = ScriptedOracle::silent();
    let output = h.decide(&oracle, "rm -rf dist").unwrap();
    let (verdict, reason) = decision(&output);
    assert_eq!(verdict, "deny");
    assert!(reason.contains("rm -rf dist"));
}
