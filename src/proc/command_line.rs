//! Command line rendering for diagnostics

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s").expect("Invalid regex"));

/// Render `command` and `args` as a single shell-like line
///
/// Arguments containing whitespace are single-quoted, with embedded quotes
/// written as `'"'"'`. The result is meant for humans, not for re-parsing.
pub fn format_command_line<S: AsRef<str>>(command: &str, args: &[S]) -> String {
    let mut line = command.to_string();
    for arg in args {
        line.push(' ');
        line.push_str(&shell_escape(arg.as_ref()));
    }
    line
}

fn shell_escape(arg: &str) -> String {
    if WHITESPACE_RE.is_match(arg) {
        format!("'{}'", arg.replace('\'', r#"'"'"'"#))
    } else {
        arg.to_string()
    }
}
