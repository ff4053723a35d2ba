//! Content-Type classification.

use mailparse::ParsedMail;

/// The only distinctions the body walk cares about.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentKind {
    PlainText,
    Html,
    Multipart,
    Other,
}

impl ContentKind {
    /// Classify a Content-Type value. Case-insensitive; parameters are ignored.
    pub fn classify(content_type: &str) -> Self {
        let mimetype = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();

        match mimetype.as_str() {
            "text/plain" => ContentKind::PlainText,
            "text/html" => ContentKind::Html,
            m if m.starts_with("multipart/") => ContentKind::Multipart,
            _ => ContentKind::Other,
        }
    }

    pub fn of(part: &ParsedMail<'_>) -> Self {
        Self::classify(&part.ctype.mimetype)
    }
}
