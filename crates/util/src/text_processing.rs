//! # Text Processing Utilities
//!
//! Secret redaction for log lines and UTF-8 safe truncation of command output.

use once_cell::sync::Lazy;
use regex::Regex;

/// Redacts values that look like secrets in a string.
///
/// # Example
/// ```rust
/// use chatops_util::text_processing::redact_sensitive;
///
/// assert_eq!(redact_sensitive("API_TOKEN=abc123 ls"), "API_TOKEN=[REDACTED] ls");
/// assert_eq!(redact_sensitive("Authorization: Bearer xoxb-1"), "Authorization: [REDACTED]");
/// ```
pub fn redact_sensitive(input: &str) -> String {
    redact_sensitive_with(input, "[REDACTED]")
}

/// Redacts sensitive-looking values, using a custom replacement token.
pub fn redact_sensitive_with(input: &str, replacement: &str) -> String {
    let mut redacted = input.to_string();
    for pattern in REDACT_PATTERNS.iter() {
        redacted = pattern
            .replace_all(&redacted, |captures: &regex::Captures| {
                let prefix = captures.get(1).map(|m| m.as_str()).unwrap_or("");
                format!("{prefix}{replacement}")
            })
            .to_string();
    }
    redacted
}

static REDACT_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    [
        r"(?i)(authorization:\s+)([^\s]+(?:\s+[^\s]+)?)",
        r"(?i)(\bBearer\s+)([A-Za-z0-9\-._~+/]+=*)",
        r"(?i)(\b[A-Z0-9_]*(?:KEY|TOKEN|SECRET|PASSWORD)=)([^\s]+)",
        r"(?i)(\btoken=)([^\s&]+)",
        r"()(\bxox[abpr]-[A-Za-z0-9-]+)",
    ]
    .iter()
    .filter_map(|pattern| Regex::new(pattern).ok())
    .collect()
});

/// Largest byte index `<= index` that lies on a character boundary of `s`.
pub fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    let mut boundary = index;
    while !s.is_char_boundary(boundary) {
        boundary -= 1;
    }
    boundary
}

/// Truncate `s` to roughly `max_bytes`, keeping the head and the tail.
///
/// Output within the limit is returned unchanged.
pub fn truncate_output(s: &str, max_bytes: usize) -> String {
    if s.len() <= max_bytes {
        return s.to_string();
    }
    let half = max_bytes / 2;
    let head_end = floor_char_boundary(s, half);
    let tail_start = floor_char_boundary(s, s.len() - half);
    format!(
        "{}\n... [truncated {} bytes] ...\n{}",
        &s[..head_end],
        tail_start - head_end,
        &s[tail_start..]
    )
}
