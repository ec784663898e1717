//! Pattern helpers for prompt detection.

use regex::bytes::Regex;

/// Compile a prompt pattern string into a regex.
///
/// Anchors to the end of the buffer (allowing trailing whitespace) unless the
/// pattern already ends with `$`.
pub fn compile_prompt_pattern(pattern: &str) -> Result<Regex, regex::Error> {
    let pattern = if pattern.ends_with('$') {
        pattern.to_string()
    } else {
        format!("(?:{})\\s*$", pattern)
    };

    Regex::new(&pattern)
}

/// Build one regex matching any of the given (already compiled) prompts.
pub fn any_prompt(prompts: &[&Regex]) -> Result<Regex, regex::Error> {
    let combined = prompts
        .iter()
        .map(|p| format!("(?:{})", p.as_str()))
        .collect::<Vec<_>>()
        .join("|");
    Regex::new(&combined)
}

/// Return the last non-empty line of `data`, trimmed.
pub fn last_line(data: &[u8]) -> String {
    String::from_utf8_lossy(data)
        .lines()
        .rev()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .unwrap_or_default()
        .to_string()
}
