//! Parsed message representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Shown in place of a body that sanitized down to nothing.
pub const NO_CONTENT_PLACEHOLDER: &str = "<p><em>(no content)</em></p>";

/// Structured view of an inbound message.
///
/// `chosen_body_html` is the preferred body before sanitization; only
/// `sanitized_html_body` is safe to render.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ParsedMessage {
    pub subject: String,
    pub from_name: String,
    pub from_email: String,
    /// Raw decoded `To` header, possibly several addresses
    pub to: String,
    pub date: Option<DateTime<Utc>>,
    /// `Message-Id` without angle brackets
    pub message_id: Option<String>,
    /// First `text/plain` part
    pub text_body: Option<String>,
    /// First `text/html` part
    pub html_body: Option<String>,
    pub chosen_body_html: String,
    pub sanitized_html_body: String,
}

impl ParsedMessage {
    pub fn has_html_body(&self) -> bool {
        self.html_body.as_deref().is_some_and(|h| !h.is_empty())
    }

    /// `"Name <email>"`, or whichever half is present.
    pub fn from_address(&self) -> String {
        match (self.from_name.is_empty(), self.from_email.is_empty()) {
            (false, false) => format!("{} <{}>", self.from_name, self.from_email),
            (true, false) => self.from_email.clone(),
            (false, true) => self.from_name.clone(),
            (true, true) => String::new(),
        }
    }

    /// Safe HTML to render, with a placeholder for empty bodies.
    pub fn display_body(&self) -> &str {
        if self.sanitized_html_body.trim().is_empty() {
            NO_CONTENT_PLACEHOLDER
        } else {
            &self.sanitized_html_body
        }
    }
}
