//! Inline shell tokens (``!`command` ``) in command bodies.

use std::sync::LazyLock;

use regex::Regex;

static SHELL_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"!`([^`]+)`").expect("shell token regex is valid"));

/// One ``!`command` `` occurrence. `start..end` spans the whole token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShellToken {
    pub start: usize,
    pub end: usize,
    pub command: String,
}

/// Find all tokens, leftmost-first and non-overlapping.
pub fn scan_shell_tokens(body: &str) -> Vec<ShellToken> {
    SHELL_TOKEN
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let command = caps.get(1)?;
            Some(ShellToken {
                start: whole.start(),
                end: whole.end(),
                command: command.as_str().to_string(),
            })
        })
        .collect()
}

/// Replace every token with `[Executed: <command>]`.
pub fn render_executed(body: &str) -> String {
    let mut out = String::with_capacity(body.len());
    let mut cursor = 0;
    for token in scan_shell_tokens(body) {
        out.push_str(&body[cursor..token.start]);
        out.push_str(&format!("[Executed: {}]", token.command));
        cursor = token.end;
    }
    out.push_str(&body[cursor..]);
    out
}
