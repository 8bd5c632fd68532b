//! Word-level helpers for a single command segment.

/// Tokenize a command segment into words using shlex (POSIX word splitting).
/// Falls back to whitespace splitting when shlex can't parse (e.g. an
/// unterminated quote).
pub fn words(command: &str) -> Vec<String> {
    shlex::split(command)
        .unwrap_or_else(|| command.split_whitespace().map(String::from).collect())
}

/// Drop leading `KEY=VALUE` assignment words.
pub fn skip_assignments(words: &[String]) -> &[String] {
    let mut idx = 0;
    while idx < words.len() && is_assignment(&words[idx]) {
        idx += 1;
    }
    &words[idx..]
}

fn is_assignment(word: &str) -> bool {
    let Some(eq) = word.find('=') else {
        return false;
    };
    let name = &word[..eq];
    !name.is_empty()
        && name
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Strip leading `KEY=VALUE` assignment text from a raw segment.
// Quoted assignment values (FOO="bar baz") are cut at the first space;
// rare in agent-issued commands and the result degrades to ambiguous.
pub fn strip_assignment_prefix(command: &str) -> &str {
    let mut rest = command.trim_start();
    loop {
        let word_end = rest
            .find(char::is_whitespace)
            .unwrap_or(rest.len());
        if word_end == rest.len() || !is_assignment(&rest[..word_end]) {
            break;
        }
        rest = rest[word_end..].trim_start();
    }
    rest
}

/// Normalize a sub-command for pattern matching: leading assignments
/// dropped and the command word reduced to its basename, everything else
/// preserved verbatim (quoting included).
pub fn match_text(command: &str) -> String {
    let stripped = strip_assignment_prefix(command.trim());
    let mut split = stripped.splitn(2, char::is_whitespace);
    let first = split.next().unwrap_or("");
    let base = match first.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name,
        _ => first,
    };
    match split.next() {
        Some(rest) => format!("{base} {rest}"),
        None => base.to_string(),
    }
}

/// The first real command word: leading assignments skipped and any
/// directory prefix stripped (`/usr/bin/ls` → `ls`).
pub fn base_command(command: &str) -> String {
    let ws = words(command);
    let rest = skip_assignments(&ws);
    let Some(word) = rest.first() else {
        return String::new();
    };
    match word.rsplit_once('/') {
        Some((_, name)) if !name.is_empty() => name.to_string(),
        _ => word.clone(),
    }
}
