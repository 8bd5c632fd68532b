//! Package-manager script alias resolution.
//!
//! `npm run build` says nothing about what `build` does; the nearest
//! package.json does. This module only substitutes the underlying command —
//! classification is always delegated back to the rule classifier.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::parse;

const MANIFEST_FILE: &str = "package.json";
/// Ancestor directories searched above the working directory.
const MAX_ANCESTORS: usize = 10;

const ALIAS_TOOLS: &[&str] = &["npm", "yarn", "pnpm", "bun"];

#[derive(Deserialize)]
struct Manifest {
    #[serde(default)]
    scripts: HashMap<String, String>,
}

/// Resolve an `npm run X` / `pnpm X` style invocation to the underlying
/// command from the nearest manifest. None when the command is not
/// alias-shaped, no manifest is found, or the script is not defined.
pub fn resolve_alias(command: &str, cwd: &Path, builtins: &[String]) -> Option<String> {
    let script = alias_name(command, builtins)?;
    let path = find_manifest(cwd)?;
    let content = std::fs::read_to_string(&path).ok()?;
    let manifest: Manifest = serde_json::from_str(&content).ok()?;
    let underlying = manifest.scripts.get(&script)?;
    log::debug!("manifest: {script} -> {underlying} ({})", path.display());
    Some(underlying.clone())
}

/// Extract the script name from an alias-shaped invocation.
///
/// `tool run X` always names a user script; bare `tool X` only when X is
/// not one of the tool family's builtin subcommand verbs.
fn alias_name(command: &str, builtins: &[String]) -> Option<String> {
    let ws = parse::words(command);
    let rest = parse::skip_assignments(&ws);
    let (tool, args) = rest.split_first()?;
    let tool = match tool.rsplit_once('/') {
        Some((_, name)) => name,
        None => tool.as_str(),
    };
    if !ALIAS_TOOLS.contains(&tool) {
        return None;
    }

    let mut iter = args.iter().filter(|a| !a.starts_with('-'));
    let first = iter.next()?;
    if first == "run" || first == "run-script" {
        return iter.next().cloned();
    }
    if !builtins.iter().any(|b| b == first) {
        return Some(first.clone());
    }
    None
}

fn find_manifest(cwd: &Path) -> Option<PathBuf> {
    let mut dir = cwd;
    for _ in 0..=MAX_ANCESTORS {
        let candidate = dir.join(MANIFEST_FILE);
        if candidate.is_file() {
            return Some(candidate);
        }
        dir = dir.parent()?;
    }
    None
}
