//! cc-smartgate: PreToolUse hook for Claude Code.
//!
//! Reads one JSON envelope from stdin, decides, and either prints a
//! permission decision to stdout or prints nothing to defer to the host's
//! own confirmation flow. Exits 0 on every path: a hook that crashes or
//! errors would stall the agent loop for nothing.

use std::io::Read;

use cc_smartgate::config::Config;
use cc_smartgate::hook::HookInput;
use cc_smartgate::logging;
use cc_smartgate::oracle::ClaudeCliOracle;
use cc_smartgate::pipeline::Engine;
use cc_smartgate::store::StateDir;

fn main() {
    let mut raw = String::new();
    if std::io::stdin().read_to_string(&mut raw).is_err() {
        return;
    }

    // Malformed envelope → no opinion.
    let Ok(input) = serde_json::from_str::<HookInput>(&raw) else {
        return;
    };

    let Some(state) = StateDir::default_user() else {
        return;
    };
    logging::init_from_env(&state);
    log::debug!(
        "invocation: tool={} command={:?}",
        input.tool_name,
        input.tool_input.command
    );

    let config = Config::load();
    let oracle = ClaudeCliOracle::new(config.settings.oracle_model.as_str());
    let engine = Engine::new(&config, state, &oracle);

    if let Some(output) = engine.decide(&input)
        && let Ok(json) = serde_json::to_string(&output)
    {
        println!("{json}");
    }
}
