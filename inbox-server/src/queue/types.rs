//! Message record published for every accepted inbound mail.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::mime::ParsedMessage;

/// Queue that receives one record per accepted message.
pub const INBOUND_MESSAGES_QUEUE: &str = "inbound_messages";

/// A message accepted for an alias, ready to be persisted.
///
/// `raw_body` is the body exactly as the relay sent it, MIME source or not.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InboundMessage {
    pub recipient_alias_id: u64,
    pub alias_local_part: String,
    pub received_at: DateTime<Utc>,
    /// Header `Message-Id`, or a SHA-256 of the raw body when absent
    pub message_id: String,
    /// At most 255 characters
    pub subject: String,
    /// At most 255 characters
    pub from_address: String,
    /// At most 120 characters of whitespace-collapsed text
    pub preview_snippet: Option<String>,
    pub has_html_body: bool,
    pub raw_body: String,
    /// Absent when the MIME source could not be parsed
    pub parsed: Option<ParsedMessage>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inbound_message_serialization() {
        let message = InboundMessage {
            recipient_alias_id: 7,
            alias_local_part: "river-ab12".to_string(),
            received_at: Utc::now(),
            message_id: "abc@example.com".to_string(),
            subject: "Hello".to_string(),
            from_address: "Jane <jane@example.com>".to_string(),
            preview_snippet: Some("Hi there".to_string()),
            has_html_body: false,
            raw_body: "Hi there".to_string(),
            parsed: None,
        };

        let json = serde_json::to_string(&message).unwrap();
        assert!(json.contains("\"alias_local_part\":\"river-ab12\""));
        assert!(json.contains("\"raw_body\":\"Hi there\""));

        let back: InboundMessage = serde_json::from_str(&json).unwrap();
        assert_eq!(back, message);
    }
}
