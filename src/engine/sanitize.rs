//! # Fault Message Sanitization
//!
//! Error text from either runtime can embed host filesystem paths and
//! stack-frame noise. Nothing of the host's path layout may reach a
//! caller, so every fault message passes through here before it lands in
//! an envelope.

use std::sync::OnceLock;

use regex::Regex;

fn path_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        // Absolute unix paths with two or more segments, and Windows
        // drive-letter paths.
        Regex::new(r"(?:[A-Za-z]:)?[/\\][\w.@~-]+(?:[/\\][\w.@~-]+)+").expect("path pattern")
    })
}

fn frame_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^\s*at\s").expect("frame pattern"))
}

fn line_patterns() -> &'static [Regex; 2] {
    static PATTERNS: OnceLock<[Regex; 2]> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        [
            Regex::new(r"\(line (\d+)").expect("line pattern"),
            Regex::new(r":(\d+):\d+").expect("position pattern"),
        ]
    })
}

/// Strip stack frames and filesystem paths from a raw error message.
///
/// Frame lines (`    at ...`) are dropped entirely; path-like substrings in
/// the remaining text collapse to `<path>`.
pub fn sanitize_error(raw: &str) -> String {
    let kept: Vec<&str> = raw
        .lines()
        .filter(|line| !frame_pattern().is_match(line))
        .collect();
    let joined = kept.join(" ");
    path_pattern()
        .replace_all(&joined, "<path>")
        .trim()
        .to_string()
}

/// Best-effort source line number from a raw error message.
///
/// Understands both `(line N, position M)` and `file:N:M` shapes.
pub fn extract_line(raw: &str) -> Option<u32> {
    for pattern in line_patterns() {
        if let Some(caps) = pattern.captures(raw) {
            if let Ok(line) = caps[1].parse() {
                return Some(line);
            }
        }
    }
    None
}

/// Sanitize and append the extracted line number when the cleaned message
/// lost it. `line_offset` discounts wrapper lines the runtime prepended to
/// the submitted code.
pub fn sanitize_with_line(raw: &str, line_offset: u32) -> String {
    let message = sanitize_error(raw);
    match extract_line(raw) {
        Some(line) if line > line_offset && !message.contains("line") => {
            format!("{} (line {})", message, line - line_offset)
        }
        _ => message,
    }
}
