//! Quote-aware decomposition of compound shell commands.
//!
//! Every later stage of the pipeline operates on what this module believes
//! are independent commands, so an incorrect split is a security-relevant
//! bug: `echo "a; rm -rf /"` is one command, not two.

/// Split a command at unquoted control operators (`&&`, `||`, `;`, `|`)
/// into trimmed, non-empty atomic sub-commands.
///
/// Splitting never happens inside single quotes (literal, no escapes),
/// double quotes (backslash-escape aware), backtick spans, or `$(...)`
/// spans, which may nest parentheses and are tracked with a depth counter.
/// An unmatched opening extends to the end of the string.
pub fn split_commands(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let len = chars.len();
    let mut parts = Vec::new();
    let mut buf = String::new();
    let mut i = 0;
    let (mut sq, mut dq, mut bt, mut esc) = (false, false, false, false);
    let mut subshell_depth: u32 = 0;

    let flush = |buf: &mut String, parts: &mut Vec<String>| {
        let trimmed = buf.trim().to_string();
        if !trimmed.is_empty() {
            parts.push(trimmed);
        }
        buf.clear();
    };

    while i < len {
        let c = chars[i];

        if esc {
            buf.push(c);
            esc = false;
            i += 1;
            continue;
        }
        // Backslash escapes the next char everywhere except single quotes.
        if c == '\\' && !sq {
            esc = true;
            buf.push(c);
            i += 1;
            continue;
        }
        if c == '\'' && !dq && !bt {
            sq = !sq;
            buf.push(c);
            i += 1;
            continue;
        }
        if c == '"' && !sq && !bt {
            dq = !dq;
            buf.push(c);
            i += 1;
            continue;
        }
        if c == '`' && !sq {
            bt = !bt;
            buf.push(c);
            i += 1;
            continue;
        }
        if sq || dq || bt {
            buf.push(c);
            i += 1;
            continue;
        }

        // $( opens a subshell span; operators inside it never split.
        if c == '$' && i + 1 < len && chars[i + 1] == '(' {
            subshell_depth += 1;
            buf.push('$');
            buf.push('(');
            i += 2;
            continue;
        }
        if subshell_depth > 0 {
            if c == '(' {
                subshell_depth += 1;
            }
            if c == ')' {
                subshell_depth -= 1;
            }
            buf.push(c);
            i += 1;
            continue;
        }

        // Two-char operators
        if i + 1 < len {
            let two = (c, chars[i + 1]);
            if two == ('&', '&') || two == ('|', '|') {
                flush(&mut buf, &mut parts);
                i += 2;
                continue;
            }
        }

        // Single-char operators
        if c == '|' || c == ';' {
            flush(&mut buf, &mut parts);
            i += 1;
            continue;
        }

        buf.push(c);
        i += 1;
    }

    flush(&mut buf, &mut parts);
    parts
}

/// Extract the contents of `$(...)` and backtick substitutions so they can
/// be classified as commands in their own right.
///
/// Single quotes block extraction (the shell would not expand there);
/// double quotes do not. Nested `$( )` spans stay inside the extracted
/// text and are handled by the caller's recursion.
pub fn extract_substitutions(command: &str) -> Vec<String> {
    let chars: Vec<char> = command.chars().collect();
    let len = chars.len();
    let mut inners = Vec::new();
    let mut i = 0;
    let (mut sq, mut dq, mut esc) = (false, false, false);

    while i < len {
        let c = chars[i];

        if esc {
            esc = false;
            i += 1;
            continue;
        }
        if c == '\\' && !sq {
            esc = true;
            i += 1;
            continue;
        }
        if c == '\'' && !dq {
            sq = !sq;
            i += 1;
            continue;
        }
        if c == '"' && !sq {
            dq = !dq;
            i += 1;
            continue;
        }
        if sq {
            i += 1;
            continue;
        }

        // $( ... ) with nesting; parens inside quotes do not count.
        if c == '$' && i + 1 < len && chars[i + 1] == '(' {
            let mut depth: u32 = 1;
            let mut inner = String::new();
            let (mut isq, mut idq, mut iesc) = (false, false, false);
            i += 2;
            while i < len && depth > 0 {
                let ic = chars[i];
                if iesc {
                    iesc = false;
                } else if ic == '\\' && !isq {
                    iesc = true;
                } else if ic == '\'' && !idq {
                    isq = !isq;
                } else if ic == '"' && !isq {
                    idq = !idq;
                } else if !isq && !idq {
                    if ic == '(' {
                        depth += 1;
                    }
                    if ic == ')' {
                        depth -= 1;
                        if depth == 0 {
                            i += 1;
                            break;
                        }
                    }
                }
                inner.push(ic);
                i += 1;
            }
            let trimmed = inner.trim().to_string();
            if !trimmed.is_empty() {
                inners.push(trimmed);
            }
            continue;
        }

        // Backtick span (no nesting)
        if c == '`' {
            let mut inner = String::new();
            i += 1;
            while i < len && chars[i] != '`' {
                inner.push(chars[i]);
                i += 1;
            }
            if i < len {
                i += 1; // closing backtick
            }
            let trimmed = inner.trim().to_string();
            if !trimmed.is_empty() {
                inners.push(trimmed);
            }
            continue;
        }

        i += 1;
    }

    inners
}

/// Detect output redirection that writes a file, outside quotes.
///
/// Not flagged:
///   - input redirection (`<`) and here-docs
///   - fd duplication/closing: `2>&1`, `>&2`, `2>&-`
///   - discard forms targeting /dev/null (`2>/dev/null`, `&>/dev/null`)
///   - process substitution `>(...)`
pub fn has_output_redirection(command: &str) -> Option<String> {
    let chars: Vec<char> = command.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let (mut sq, mut dq, mut esc) = (false, false, false);

    while i < len {
        let c = chars[i];

        if esc {
            esc = false;
            i += 1;
            continue;
        }
        if c == '\\' && !sq {
            esc = true;
            i += 1;
            continue;
        }
        if c == '\'' && !dq {
            sq = !sq;
            i += 1;
            continue;
        }
        if c == '"' && !sq {
            dq = !dq;
            i += 1;
            continue;
        }
        if sq || dq {
            i += 1;
            continue;
        }

        // &> or &>> redirects both streams to a file.
        if c == '&' && i + 1 < len && chars[i + 1] == '>' {
            let mut j = i + 2;
            if j < len && chars[j] == '>' {
                j += 1;
            }
            if is_discard_target(&chars, j) {
                i = j;
                continue;
            }
            return Some("output redirection (&>)".into());
        }

        // fd redirects: N>, N>>, N>&M, N>&-
        if c.is_ascii_digit() && i + 1 < len && chars[i + 1] == '>' {
            // N>&M / N>&- is fd duplication or closing, not file output.
            if i + 2 < len
                && chars[i + 2] == '&'
                && i + 3 < len
                && (chars[i + 3].is_ascii_digit() || chars[i + 3] == '-')
            {
                i += 4;
                continue;
            }
            let mut j = i + 2;
            if j < len && chars[j] == '>' {
                j += 1;
            }
            if is_discard_target(&chars, j) {
                i = j;
                continue;
            }
            return Some(format!("output redirection ({c}>)"));
        }

        if c == '>' {
            // >( is process substitution, not redirection.
            if i + 1 < len && chars[i + 1] == '(' {
                i += 1;
                continue;
            }
            // >&N / >&- is fd duplication or closing.
            if i + 1 < len
                && chars[i + 1] == '&'
                && i + 2 < len
                && (chars[i + 2].is_ascii_digit() || chars[i + 2] == '-')
            {
                i += 3;
                continue;
            }
            let mut j = i + 1;
            if j < len && chars[j] == '>' {
                j += 1;
            }
            if is_discard_target(&chars, j) {
                i = j;
                continue;
            }
            return Some("output redirection (>)".into());
        }

        i += 1;
    }

    None
}

/// True when the redirect target starting at `from` (after optional
/// whitespace) is /dev/null.
fn is_discard_target(chars: &[char], from: usize) -> bool {
    let mut j = from;
    while j < chars.len() && chars[j].is_whitespace() {
        j += 1;
    }
    let target: String = chars[j..]
        .iter()
        .take_while(|c| !c.is_whitespace() && **c != ';' && **c != '|' && **c != '&')
        .collect();
    target == "/dev/null"
}

/// Unwrap `sh -c "inner"` style invocations so the inner command is
/// inspected instead of the wrapper. Nested wrappers are unwrapped too.
pub fn unwrap_shell_wrapper(command: &str) -> Option<String> {
    let mut current = command.to_string();
    let mut unwrapped = false;

    loop {
        let ws = super::tokenize::words(&current);
        let rest = super::tokenize::skip_assignments(&ws);
        let Some((first, args)) = rest.split_first() else {
            break;
        };
        let shell = match first.rsplit_once('/') {
            Some((_, name)) => name,
            None => first.as_str(),
        };
        if !matches!(shell, "sh" | "bash" | "zsh" | "dash") {
            break;
        }
        // Find -c (possibly combined, e.g. -lc) followed by the command string.
        let mut inner = None;
        let mut iter = args.iter();
        while let Some(arg) = iter.next() {
            if !arg.starts_with('-') {
                break;
            }
            if !arg.starts_with("--") && arg.contains('c') {
                inner = iter.next().cloned();
                break;
            }
        }
        match inner {
            Some(cmd) if !cmd.trim().is_empty() => {
                current = cmd;
                unwrapped = true;
            }
            _ => break,
        }
    }

    unwrapped.then_some(current)
}
