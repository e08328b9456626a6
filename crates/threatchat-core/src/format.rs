//! Inline markup for message text.
//!
//! Answers may carry `**bold**`, `` `code` `` and newlines. [`format_text`] turns
//! raw text into HTML for the transcript export, [`inline_lines`] tokenizes the
//! same grammar into styled fragments for the terminal.

use regex::Regex;
use std::sync::OnceLock;

fn bold_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\*\*(.+?)\*\*").expect("valid bold pattern"))
}

fn code_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"`(.+?)`").expect("valid code pattern"))
}

/// Escape text for insertion between tags.
///
/// `&` must go first or the entities produced for `<` and `>` would be mangled.
pub fn escape_text(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Escape text for insertion inside a double- or single-quoted attribute.
pub fn escape_attr(text: &str) -> String {
    escape_text(text)
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

/// Render raw message text as HTML.
///
/// Escapes first, then substitutes bold, code and line breaks in that order.
/// Not idempotent: feeding the output back in escapes the inserted tags.
pub fn format_text(text: &str) -> String {
    let escaped = escape_text(text);
    let bolded = bold_re().replace_all(&escaped, "<strong>${1}</strong>");
    let coded = code_re().replace_all(&bolded, "<code>${1}</code>");
    coded.replace('\n', "<br/>")
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentStyle {
    Plain,
    Bold,
    Code,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fragment {
    pub style: FragmentStyle,
    pub text: String,
}

impl Fragment {
    fn new(style: FragmentStyle, text: impl Into<String>) -> Self {
        Self {
            style,
            text: text.into(),
        }
    }
}

/// Split text into lines of styled fragments. An unterminated marker is kept as
/// literal text; markers never span lines.
pub fn inline_lines(text: &str) -> Vec<Vec<Fragment>> {
    text.split('\n').map(parse_line).collect()
}

fn parse_line(line: &str) -> Vec<Fragment> {
    let mut fragments = Vec::new();
    let mut plain = String::new();
    let mut rest = line;

    while !rest.is_empty() {
        if let Some(after) = rest.strip_prefix("**") {
            if let Some(end) = closing(after, "**") {
                flush(&mut fragments, &mut plain);
                fragments.push(Fragment::new(FragmentStyle::Bold, &after[..end]));
                rest = &after[end + 2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix('`') {
            if let Some(end) = closing(after, "`") {
                flush(&mut fragments, &mut plain);
                fragments.push(Fragment::new(FragmentStyle::Code, &after[..end]));
                rest = &after[end + 1..];
                continue;
            }
        }

        // No markup starts here; consume one char literally
        let mut chars = rest.chars();
        if let Some(c) = chars.next() {
            plain.push(c);
        }
        rest = chars.as_str();
    }

    flush(&mut fragments, &mut plain);
    fragments
}

/// Byte offset of `marker` closing a span of at least one char.
fn closing(s: &str, marker: &str) -> Option<usize> {
    let first = s.chars().next()?.len_utf8();
    s[first..].find(marker).map(|i| i + first)
}

fn flush(fragments: &mut Vec<Fragment>, plain: &mut String) {
    if !plain.is_empty() {
        fragments.push(Fragment::new(FragmentStyle::Plain, std::mem::take(plain)));
    }
}
