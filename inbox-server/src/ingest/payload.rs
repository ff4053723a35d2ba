//! Request payloads accepted by the ingestion endpoints.

use serde::Deserialize;

use crate::mime::ContentKind;

/// Mailgun "store and notify" form fields.
///
/// Every field is optional at the transport level; the ingestor decides
/// which absences are fatal.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboundPayload {
    pub timestamp: Option<String>,
    pub token: Option<String>,
    pub signature: Option<String>,
    pub recipient: Option<String>,
    #[serde(rename = "body-mime")]
    pub body_mime: Option<String>,
    #[serde(rename = "body-plain")]
    pub body_plain: Option<String>,
    #[serde(rename = "body-html")]
    pub body_html: Option<String>,
    pub subject: Option<String>,
    #[serde(rename = "Subject")]
    pub subject_header: Option<String>,
    pub sender: Option<String>,
    pub from: Option<String>,
    #[serde(rename = "From")]
    pub from_header: Option<String>,
}

/// The body to ingest and how to interpret it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InboundBody<'a> {
    Mime(&'a str),
    Plain(&'a str),
    Html(&'a str),
}

impl<'a> InboundBody<'a> {
    pub fn as_str(&self) -> &'a str {
        match self {
            InboundBody::Mime(body) | InboundBody::Plain(body) | InboundBody::Html(body) => body,
        }
    }

    /// Content kind of a relay-extracted body; `None` for full MIME.
    pub fn extracted_kind(&self) -> Option<ContentKind> {
        match self {
            InboundBody::Mime(_) => None,
            InboundBody::Plain(_) => Some(ContentKind::PlainText),
            InboundBody::Html(_) => Some(ContentKind::Html),
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

impl InboundPayload {
    /// First non-empty of `body-mime`, `body-plain`, `body-html`.
    pub fn body(&self) -> Option<InboundBody<'_>> {
        non_empty(&self.body_mime)
            .map(InboundBody::Mime)
            .or_else(|| non_empty(&self.body_plain).map(InboundBody::Plain))
            .or_else(|| non_empty(&self.body_html).map(InboundBody::Html))
    }

    /// Form-supplied subject; the first field present wins even if empty.
    pub fn form_subject(&self) -> Option<&str> {
        self.subject
            .as_deref()
            .or(self.subject_header.as_deref())
    }

    /// Form-supplied sender; the first field present wins even if empty.
    pub fn form_from(&self) -> Option<&str> {
        self.sender
            .as_deref()
            .or(self.from.as_deref())
            .or(self.from_header.as_deref())
    }

    /// Assign a multipart field by its form name.
    ///
    /// Unknown names are ignored and a repeated name keeps its first value.
    pub fn set_field(&mut self, name: &str, value: String) {
        let slot = match name {
            "timestamp" => &mut self.timestamp,
            "token" => &mut self.token,
            "signature" => &mut self.signature,
            "recipient" => &mut self.recipient,
            "body-mime" => &mut self.body_mime,
            "body-plain" => &mut self.body_plain,
            "body-html" => &mut self.body_html,
            "subject" => &mut self.subject,
            "Subject" => &mut self.subject_header,
            "sender" => &mut self.sender,
            "from" => &mut self.from,
            "From" => &mut self.from_header,
            _ => return,
        };
        if slot.is_none() {
            *slot = Some(value);
        }
    }
}

/// JSON body of the development inbound endpoint.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DevInboundPayload {
    #[serde(default)]
    pub to: String,
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub subject: String,
    #[serde(default)]
    pub body: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_preference() {
        let mut payload = InboundPayload {
            body_mime: Some(String::new()),
            body_plain: Some("plain".to_string()),
            body_html: Some("<p>html</p>".to_string()),
            ..Default::default()
        };
        assert_eq!(payload.body(), Some(InboundBody::Plain("plain")));

        payload.body_mime = Some("Subject: x\r\n\r\nmime".to_string());
        assert!(matches!(payload.body(), Some(InboundBody::Mime(_))));

        payload.body_mime = None;
        payload.body_plain = None;
        assert_eq!(payload.body(), Some(InboundBody::Html("<p>html</p>")));

        payload.body_html = Some(String::new());
        assert_eq!(payload.body(), None);
    }

    #[test]
    fn test_form_header_fallbacks() {
        let payload = InboundPayload {
            subject_header: Some("Header subject".to_string()),
            from: Some("a@b.com".to_string()),
            from_header: Some("c@d.com".to_string()),
            ..Default::default()
        };
        assert_eq!(payload.form_subject(), Some("Header subject"));
        assert_eq!(payload.form_from(), Some("a@b.com"));
        assert_eq!(InboundPayload::default().form_subject(), None);
    }

    #[test]
    fn test_form_deserialize_renamed_fields() {
        let payload: InboundPayload = serde_json::from_value(serde_json::json!({
            "recipient": "river-ab12@example.com",
            "body-mime": "raw",
            "Subject": "Hi",
            "From": "x@y.z"
        }))
        .unwrap();
        assert_eq!(payload.body_mime.as_deref(), Some("raw"));
        assert_eq!(payload.subject_header.as_deref(), Some("Hi"));
        assert_eq!(payload.from_header.as_deref(), Some("x@y.z"));
    }

    #[test]
    fn test_set_field_by_form_name() {
        let mut payload = InboundPayload::default();
        payload.set_field("body-mime", "raw".to_string());
        payload.set_field("Subject", "Hi".to_string());
        payload.set_field("recipient", "river-ab12@example.com".to_string());
        payload.set_field("recipient", "other@example.com".to_string());
        payload.set_field("attachment-count", "2".to_string());

        assert_eq!(payload.body(), Some(InboundBody::Mime("raw")));
        assert_eq!(payload.subject_header.as_deref(), Some("Hi"));
        assert_eq!(payload.recipient.as_deref(), Some("river-ab12@example.com"));
        assert_eq!(payload.subject, None);
    }
}
