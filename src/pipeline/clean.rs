//! Deterministic cleanup of raw model output.
//!
//! Even well-prompted models occasionally wrap their answer in code fences,
//! emit Windows line endings, or sprinkle invisible Unicode into the text.
//! These artefacts would otherwise flow verbatim into the assembled
//! document, so every response is run through a short sequence of cheap,
//! deterministic rules before substitution. Each rule is a pure
//! `&str → String` function with no shared state.
//!
//! Rule order matters: fences are stripped before whitespace passes so the
//! fence detector sees the original shape, and line endings are normalised
//! before per-line trimming.

use once_cell::sync::Lazy;
use regex::Regex;

/// Apply all cleanup rules to a raw model response.
pub fn clean_model_text(input: &str) -> String {
    let s = strip_outer_fences(input);
    let s = normalise_line_endings(&s);
    let s = remove_invisible_chars(&s);
    let s = trim_trailing_whitespace(&s);
    let s = collapse_blank_lines(&s);
    s.trim().to_string()
}

// ── Rule 1: Strip outer code fences ─────────────────────────────────────────

static RE_OUTER_FENCES: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^```(?:[a-zA-Z]+)?\n(.*)\n```\s*$").unwrap());

fn strip_outer_fences(input: &str) -> String {
    if let Some(caps) = RE_OUTER_FENCES.captures(input.trim()) {
        caps[1].to_string()
    } else {
        input.to_string()
    }
}

// ── Rule 2: Normalise line endings ──────────────────────────────────────────

fn normalise_line_endings(input: &str) -> String {
    input.replace("\r\n", "\n").replace('\r', "\n")
}

// ── Rule 3: Strip invisible Unicode ─────────────────────────────────────────

const INVISIBLE_CHARS: [char; 6] = [
    '\u{200B}', // zero-width space
    '\u{200C}', // zero-width non-joiner
    '\u{200D}', // zero-width joiner
    '\u{2060}', // word joiner
    '\u{FEFF}', // BOM
    '\u{00AD}', // soft hyphen
];

fn remove_invisible_chars(input: &str) -> String {
    input.chars().filter(|c| !INVISIBLE_CHARS.contains(c)).collect()
}

// ── Rule 4: Trim trailing whitespace per line ───────────────────────────────

fn trim_trailing_whitespace(input: &str) -> String {
    input
        .lines()
        .map(|line| line.trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

// ── Rule 5: Collapse excessive blank lines ──────────────────────────────────

static RE_BLANK_LINES: Lazy<Regex> = Lazy::new(|| Regex::new(r"\n{3,}").unwrap());

fn collapse_blank_lines(input: &str) -> String {
    RE_BLANK_LINES.replace_all(input, "\n\n").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_plain_fences() {
        assert_eq!(clean_model_text("```\nA cat\n```"), "A cat");
    }

    #[test]
    fn strips_language_tagged_fences() {
        assert_eq!(clean_model_text("```text\nA cat\n```"), "A cat");
    }

    #[test]
    fn leaves_inner_fences_alone() {
        let input = "before\n```\ncode\n```\nafter";
        assert_eq!(clean_model_text(input), input);
    }

    #[test]
    fn normalises_crlf() {
        assert_eq!(clean_model_text("a\r\nb\rc"), "a\nb\nc");
    }

    #[test]
    fn removes_invisible_chars() {
        assert_eq!(clean_model_text("a\u{200B}b\u{FEFF}c"), "abc");
    }

    #[test]
    fn collapses_blank_lines_and_trims() {
        assert_eq!(clean_model_text("  a\n\n\n\nb  \n"), "a\n\nb");
    }

    #[test]
    fn empty_input_stays_empty() {
        assert_eq!(clean_model_text("   \n  "), "");
    }
}
