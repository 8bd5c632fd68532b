//! Static analysis of interpreter-invoked script files.
//!
//! Many "run this file" commands are harmless wrappers; inspecting only the
//! command line misses their true effect. This module resolves the script,
//! pulls in its local imports, and scans the combined corpus for
//! side-effect idioms.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;

use crate::parse;
use crate::rules::Classification;

/// Bounds on the import traversal.
const MAX_SOURCES: usize = 64;
const MAX_CORPUS_BYTES: usize = 512 * 1024;

/// Flags that mean the interpreter is not running a file at all.
const INLINE_FLAGS: &[&str] = &[
    "-e", "--eval", "-p", "--print", "-c", "-m", "-V", "-v", "--version",
];

/// Source language of a script file, by extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Js,
    Py,
    Sh,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "mts" | "cts" | "tsx" => Some(SourceKind::Js),
            "py" | "pyw" => Some(SourceKind::Py),
            "sh" | "bash" | "zsh" => Some(SourceKind::Sh),
            _ => None,
        }
    }

    fn extensions(self) -> &'static [&'static str] {
        match self {
            SourceKind::Js => &["js", "mjs", "cjs", "jsx", "ts", "mts", "cts", "tsx"],
            SourceKind::Py => &["py", "pyw"],
            SourceKind::Sh => &["sh", "bash", "zsh"],
        }
    }
}

/// Recognize "interpreter invoked on a local file" shapes and return the
/// script path argument. Inline-eval, inline-print, and version-flag
/// invocations return None — there is no file to analyze.
pub fn extract_script_path(command: &str) -> Option<String> {
    let ws = parse::words(command);
    let rest = parse::skip_assignments(&ws);
    let (first, args) = rest.split_first()?;
    let mut interp = basename(first);
    let mut args = args;

    // `npx tsx file.ts`
    if interp == "npx" {
        let (second, remainder) = args.split_first()?;
        interp = basename(second);
        args = remainder;
    }

    let kind = match interp {
        "node" | "nodejs" | "tsx" | "ts-node" => SourceKind::Js,
        "python" | "python2" | "python3" => SourceKind::Py,
        "sh" | "bash" | "zsh" => SourceKind::Sh,
        _ => return None,
    };

    if args.iter().any(|a| INLINE_FLAGS.contains(&a.as_str())) {
        return None;
    }
    let path = args.iter().find(|a| !a.starts_with('-'))?;
    let ext = Path::new(path.as_str())
        .extension()?
        .to_str()?
        .to_ascii_lowercase();
    kind.extensions()
        .contains(&ext.as_str())
        .then(|| path.clone())
}

/// Resolve a script argument to an absolute path (tilde expanded,
/// relative to `cwd` when not absolute).
pub fn resolve_path(script: &str, cwd: &Path) -> PathBuf {
    let expanded = shellexpand::tilde(script);
    let path = PathBuf::from(expanded.as_ref());
    if path.is_absolute() {
        path
    } else {
        cwd.join(path)
    }
}

/// Analyze a script file and everything reachable through its local
/// imports. Unreadable or unrecognized files are ambiguous, never an error.
pub fn analyze_script(script: &str, cwd: &Path) -> Classification {
    let full = resolve_path(script, cwd);
    let Some(kind) = SourceKind::from_path(&full) else {
        return Classification::Ambiguous;
    };
    let Ok(content) = std::fs::read_to_string(&full) else {
        return Classification::Ambiguous;
    };

    let mut visited = HashSet::new();
    let mut corpus = String::new();
    collect_sources(&full, content, kind, &mut visited, &mut corpus);

    if idioms(kind).iter().any(|re| re.is_match(&corpus)) {
        log::debug!("static analysis: side-effect idiom found in {script}");
        Classification::Modifying
    } else {
        Classification::Readonly
    }
}

/// Depth-first traversal over the local-include relation, cycle-guarded by
/// a visited set and bounded by file-count and corpus-size caps.
fn collect_sources(
    path: &Path,
    content: String,
    kind: SourceKind,
    visited: &mut HashSet<PathBuf>,
    corpus: &mut String,
) {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !visited.insert(canonical) {
        return;
    }
    if visited.len() > MAX_SOURCES || corpus.len() >= MAX_CORPUS_BYTES {
        return;
    }
    corpus.push_str(&content);
    corpus.push('\n');

    let dir = path.parent().unwrap_or(Path::new("."));
    for import in local_imports(&content, kind) {
        let Some(resolved) = resolve_import(dir, &import, kind) else {
            continue;
        };
        if let Ok(sub) = std::fs::read_to_string(&resolved) {
            collect_sources(&resolved, sub, kind, visited, corpus);
        }
    }
}

/// Relative import/include specifiers found in one source file.
fn local_imports(content: &str, kind: SourceKind) -> Vec<String> {
    let regexes: &[&Regex] = match kind {
        SourceKind::Js => &[&JS_REQUIRE, &JS_IMPORT_FROM, &JS_DYN_IMPORT],
        SourceKind::Py => &[&PY_FROM_IMPORT],
        SourceKind::Sh => &[&SH_SOURCE],
    };
    let mut out = Vec::new();
    for re in regexes {
        for caps in re.captures_iter(content) {
            if let Some(m) = caps.get(1) {
                out.push(m.as_str().to_string());
            }
        }
    }
    out
}

/// Map an import specifier to an existing file, or None for anything that
/// is not a plain local file (bare module names, absolute paths, variables).
fn resolve_import(dir: &Path, import: &str, kind: SourceKind) -> Option<PathBuf> {
    match kind {
        SourceKind::Js => {
            let base = dir.join(import);
            let mut candidates = vec![base.clone()];
            for ext in ["js", "mjs", "cjs", "ts", "tsx"] {
                candidates.push(PathBuf::from(format!("{}.{ext}", base.display())));
            }
            for index in ["index.js", "index.mjs", "index.ts"] {
                candidates.push(base.join(index));
            }
            candidates.into_iter().find(|c| c.is_file())
        }
        SourceKind::Py => {
            let rel = import.trim_start_matches('.').replace('.', "/");
            let candidate = dir.join(format!("{rel}.py"));
            candidate.is_file().then_some(candidate)
        }
        SourceKind::Sh => {
            if import.starts_with('/') || import.contains('$') {
                return None;
            }
            let candidate = dir.join(import);
            candidate.is_file().then_some(candidate)
        }
    }
}

fn basename(word: &str) -> &str {
    match word.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => word,
    }
}

// ── Import shapes ──

static JS_REQUIRE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"require\s*\(\s*['"](\.[^'"]+)['"]\s*\)"#).unwrap());
static JS_IMPORT_FROM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s+.*?from\s+['"](\.[^'"]+)['"]"#).unwrap());
static JS_DYN_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"import\s*\(\s*['"](\.[^'"]+)['"]\s*\)"#).unwrap());
static PY_FROM_IMPORT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"from\s+(\.[\w.]+)\s+import").unwrap());
static SH_SOURCE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^\s*(?:source|\.)\s+(\S+)").unwrap());

// ── Side-effect idioms per source kind ──

static JS_IDIOMS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r"\bfs\.(writeFile|appendFile|mkdir|rmdir|unlink|rename|copyFile|cp|rm)\b",
        r"\bfs\.(createWriteStream|writeFileSync|writeSync|appendFileSync|mkdirSync|rmdirSync|unlinkSync|renameSync|rmSync)\b",
        r"\bfs\.promises\.(writeFile|appendFile|mkdir|rmdir|unlink|rename|copyFile|cp|rm)\b",
        r"\bchild_process\.(exec|spawn|execSync|spawnSync|execFile)\b",
        r#"require\s*\(\s*['"]child_process['"]\s*\)"#,
        r#"from\s+['"](?:node:)?child_process['"]"#,
        r#"\bfetch\(\s*[^)]*method\s*:\s*['"`](?i:post|put|delete|patch)"#,
        r"\bprocess\.exit\b",
    ])
});

static PY_IDIOMS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r#"\bopen\s*\([^)]*['"][waxb+]+['"]"#,
        r"\.write\s*\(",
        r"\.writelines\s*\(",
        r"\bos\.(remove|unlink|rename|mkdir|makedirs|rmdir|removedirs|system|popen)\b",
        r"\bshutil\.(copy|copy2|move|rmtree|copytree)\b",
        r"\bsubprocess\.(run|call|Popen|check_call|check_output)\b",
        r"\bPath\([^)]*\)\.(write_text|write_bytes|mkdir|rmdir|unlink|rename|touch)\b",
        r"\bsys\.exit\b",
    ])
});

static SH_IDIOMS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    compile(&[
        r">{1,2}",
        r"\b(rm|mv|cp|mkdir|touch|chmod|chown|dd)\b",
        r"\bsed\s+-i\b",
        r"\bcurl\b.*(-X\s*(POST|PUT|DELETE|PATCH)|-d\s|--data)",
        r"\bwget\b",
        r"\bkill\b",
    ])
});

fn idioms(kind: SourceKind) -> &'static [Regex] {
    match kind {
        SourceKind::Js => &JS_IDIOMS,
        SourceKind::Py => &PY_IDIOMS,
        SourceKind::Sh => &SH_IDIOMS,
    }
}

fn compile(patterns: &[&str]) -> Vec<Regex> {
    patterns
        .iter()
        .map(|p| Regex::new(p).expect("static idiom pattern must compile"))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    // ── Path extraction ──

    #[test]
    fn extract_node_script() {
        assert_eq!(
            extract_script_path("node build.mjs").as_deref(),
            Some("build.mjs")
        );
    }

    #[test]
    fn extract_node_with_flags() {
        assert_eq!(
            extract_script_path("node --max-old-space-size=4096 scripts/gen.js").as_deref(),
            Some("scripts/gen.js")
        );
    }

    #[test]
    fn extract_python_script() {
        assert_eq!(
            extract_script_path("python3 tools/report.py --all").as_deref(),
            Some("tools/report.py")
        );
    }

    #[test]
    fn extract_shell_script() {
        assert_eq!(
            extract_script_path("bash ./scripts/check.sh").as_deref(),
            Some("./scripts/check.sh")
        );
    }

    #[test]
    fn extract_tsx_runner() {
        assert_eq!(
            extract_script_path("npx tsx src/main.ts").as_deref(),
            Some("src/main.ts")
        );
        assert_eq!(
            extract_script_path("ts-node src/main.ts").as_deref(),
            Some("src/main.ts")
        );
    }

    #[test]
    fn inline_eval_is_not_a_script() {
        assert!(extract_script_path("node -e 'console.log(1)'").is_none());
        assert!(extract_script_path("python3 -c 'print(1)'").is_none());
        assert!(extract_script_path("python3 -m http.server").is_none());
        assert!(extract_script_path("node --version").is_none());
    }

    #[test]
    fn wrong_extension_is_not_a_script() {
        assert!(extract_script_path("node data.json").is_none());
        assert!(extract_script_path("python3 script.sh").is_none());
    }

    #[test]
    fn unrelated_command_is_not_a_script() {
        assert!(extract_script_path("cargo run").is_none());
    }

    // ── Analysis ──

    fn write(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn readonly_js_script() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "report.mjs",
            "import fs from 'node:fs';\nconst data = fs.readFileSync('in.json');\nconsole.log(data.length);\n",
        );
        assert_eq!(
            analyze_script("report.mjs", dir.path()),
            Classification::Readonly
        );
    }

    #[test]
    fn writing_js_script() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "gen.mjs",
            "import fs from 'node:fs';\nfs.writeFileSync('out.json', '{}');\n",
        );
        assert_eq!(
            analyze_script("gen.mjs", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn spawned_process_is_modifying() {
        let dir = TempDir::new().unwrap();
        write(
            &dir,
            "run.js",
            "const { execSync } = require('child_process');\nconsole.log('hi');\n",
        );
        assert_eq!(
            analyze_script("run.js", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn import_taints_entry_file() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.mjs", "import { helper } from './util.mjs';\nhelper();\n");
        write(
            &dir,
            "util.mjs",
            "import fs from 'node:fs';\nexport function helper() { fs.rmSync('x'); }\n",
        );
        assert_eq!(
            analyze_script("main.mjs", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn import_cycle_terminates() {
        let dir = TempDir::new().unwrap();
        write(&dir, "a.mjs", "import { b } from './b.mjs';\nconsole.log(b);\n");
        write(&dir, "b.mjs", "import { a } from './a.mjs';\nexport const b = 1;\n");
        assert_eq!(analyze_script("a.mjs", dir.path()), Classification::Readonly);
    }

    #[test]
    fn python_write_mode_open() {
        let dir = TempDir::new().unwrap();
        write(&dir, "w.py", "f = open('out.txt', 'w')\nf.close()\n");
        assert_eq!(analyze_script("w.py", dir.path()), Classification::Modifying);
    }

    #[test]
    fn python_read_mode_open() {
        let dir = TempDir::new().unwrap();
        write(&dir, "r.py", "f = open('in.txt')\nprint(f.read())\n");
        assert_eq!(analyze_script("r.py", dir.path()), Classification::Readonly);
    }

    #[test]
    fn python_relative_import_followed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "main.py", "from .helpers import run\nrun()\n");
        write(&dir, "helpers.py", "import shutil\ndef run():\n    shutil.rmtree('x')\n");
        assert_eq!(
            analyze_script("main.py", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn shell_script_with_redirect() {
        let dir = TempDir::new().unwrap();
        write(&dir, "build.sh", "#!/bin/sh\nmake all > build.log\n");
        assert_eq!(
            analyze_script("build.sh", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn shell_sourced_include_followed() {
        let dir = TempDir::new().unwrap();
        write(&dir, "entry.sh", "#!/bin/sh\nsource lib.sh\nshow_status\n");
        write(&dir, "lib.sh", "show_status() {\n  rm -f /tmp/stale\n}\n");
        assert_eq!(
            analyze_script("entry.sh", dir.path()),
            Classification::Modifying
        );
    }

    #[test]
    fn missing_file_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        assert_eq!(
            analyze_script("nope.mjs", dir.path()),
            Classification::Ambiguous
        );
    }

    #[test]
    fn unknown_extension_is_ambiguous() {
        let dir = TempDir::new().unwrap();
        write(&dir, "data.bin", "junk");
        assert_eq!(
            analyze_script("data.bin", dir.path()),
            Classification::Ambiguous
        );
    }
}
