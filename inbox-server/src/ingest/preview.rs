//! Preview snippets and record field truncation.

use crate::html::text_content;
use crate::mime::ParsedMessage;

pub const PREVIEW_MAX_CHARS: usize = 120;

/// Longest subject or sender kept on a record.
pub const HEADER_MAX_CHARS: usize = 255;

/// Replace every whitespace run with one space and trim the ends.
pub fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First `max` characters of `text`, never splitting a character.
pub fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}

/// Short plain-text preview, or `None` when there is no visible text.
pub fn preview_text(text: &str) -> Option<String> {
    let preview = truncate_chars(&collapse_whitespace(text), PREVIEW_MAX_CHARS);
    if preview.is_empty() {
        None
    } else {
        Some(preview)
    }
}

/// Preview of a parsed message: its text body, else the text of its
/// sanitized HTML.
pub fn preview_snippet(parsed: &ParsedMessage) -> Option<String> {
    match parsed.text_body.as_deref() {
        Some(text) if !text.trim().is_empty() => preview_text(text),
        _ => preview_text(&text_content(&parsed.sanitized_html_body)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  a\n\n b\t\tc \r\n"), "a b c");
        assert_eq!(collapse_whitespace(" \n\t "), "");
    }

    #[test]
    fn test_truncate_chars_respects_characters() {
        assert_eq!(truncate_chars("héllo", 2), "hé");
        assert_eq!(truncate_chars("日本語テキスト", 3), "日本語");
        assert_eq!(truncate_chars("short", 120), "short");
    }

    #[test]
    fn test_preview_limit() {
        let long = "ü ".repeat(200);
        let preview = preview_text(&long).unwrap();
        assert_eq!(preview.chars().count(), PREVIEW_MAX_CHARS);
        assert!(preview_text("   ").is_none());
    }

    #[test]
    fn test_preview_prefers_text_body() {
        let parsed = ParsedMessage {
            text_body: Some("Plain\n\npart".to_string()),
            sanitized_html_body: "<p>Html</p>".to_string(),
            ..Default::default()
        };
        assert_eq!(preview_snippet(&parsed).as_deref(), Some("Plain part"));
    }

    #[test]
    fn test_preview_falls_back_to_html_text() {
        let parsed = ParsedMessage {
            sanitized_html_body: "<p>Hello,</p><p>the <strong>HTML</strong> part.</p>".to_string(),
            ..Default::default()
        };
        assert_eq!(
            preview_snippet(&parsed).as_deref(),
            Some("Hello, the HTML part.")
        );
    }
}
