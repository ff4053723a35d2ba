//! RFC 5322 / MIME parsing using mailparse.
//!
//! Extraction is best effort: a bad `Date` or `From` leaves that field empty,
//! an undecodable part is skipped, and only input without a single
//! recoverable header is rejected.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use mailparse::{
    addrparse_header, dateparse, parse_mail, DispositionType, MailAddr, MailHeader,
    MailHeaderMap, ParsedMail,
};
use tracing::{debug, info, warn};

use super::content_type::ContentKind;
use super::types::ParsedMessage;
use crate::error::MalformedMimeError;
use crate::html::{text_to_html, HtmlSanitizer};

/// Parses raw messages and renders their chosen body through the sanitizer.
#[derive(Clone)]
pub struct MimeParser {
    sanitizer: Arc<HtmlSanitizer>,
}

/// Header fields lifted from the top-level message.
#[derive(Debug, Default)]
struct Headers {
    subject: String,
    from_name: String,
    from_email: String,
    to: String,
    date: Option<DateTime<Utc>>,
    message_id: Option<String>,
}

/// First body of each kind found in the part tree.
#[derive(Debug, Default)]
struct Bodies {
    text: Option<String>,
    html: Option<String>,
}

impl Bodies {
    fn is_complete(&self) -> bool {
        self.text.is_some() && self.html.is_some()
    }
}

impl MimeParser {
    pub fn new(sanitizer: Arc<HtmlSanitizer>) -> Self {
        Self { sanitizer }
    }

    /// Parse a raw MIME message.
    pub fn parse(&self, raw: &[u8]) -> Result<ParsedMessage, MalformedMimeError> {
        debug!(raw_length = raw.len(), "mime_parse_start");

        let mail = parse_mail(raw).map_err(|e| MalformedMimeError(e.to_string()))?;

        // mailparse turns a line without a colon into a key with no value
        if !mail.headers.iter().any(|h| is_field_name(&h.get_key())) {
            return Err(MalformedMimeError("no headers found".to_string()));
        }

        let headers = extract_headers(&mail.headers);

        let mut bodies = Bodies::default();
        collect_bodies(&mail, &mut bodies);

        let parsed = self.assemble(headers, bodies);

        info!(
            subject = %parsed.subject,
            from_email = %parsed.from_email,
            has_date = parsed.date.is_some(),
            has_text = parsed.text_body.is_some(),
            has_html = parsed.html_body.is_some(),
            sanitized_length = parsed.sanitized_html_body.len(),
            "mime_parse_complete"
        );

        Ok(parsed)
    }

    /// Build a message from a body the relay already extracted, with no headers.
    pub fn from_body(&self, body: &str, kind: ContentKind) -> ParsedMessage {
        let bodies = match kind {
            ContentKind::Html => Bodies {
                text: None,
                html: Some(body.to_string()),
            },
            _ => Bodies {
                text: Some(body.to_string()),
                html: None,
            },
        };

        self.assemble(Headers::default(), bodies)
    }

    fn assemble(&self, headers: Headers, bodies: Bodies) -> ParsedMessage {
        let chosen_body_html = choose_body_html(bodies.html.as_deref(), bodies.text.as_deref());
        let sanitized_html_body = self.sanitizer.sanitize(&chosen_body_html);

        ParsedMessage {
            subject: headers.subject,
            from_name: headers.from_name,
            from_email: headers.from_email,
            to: headers.to,
            date: headers.date,
            message_id: headers.message_id,
            text_body: bodies.text,
            html_body: bodies.html,
            chosen_body_html,
            sanitized_html_body,
        }
    }
}

/// Pick the body to display, always as HTML.
///
/// A non-empty HTML body wins; otherwise non-empty text is escaped and its
/// line breaks marked; otherwise the result is empty.
pub fn choose_body_html(html_body: Option<&str>, text_body: Option<&str>) -> String {
    match (html_body, text_body) {
        (Some(html), _) if !html.is_empty() => html.to_string(),
        (_, Some(text)) if !text.is_empty() => text_to_html(text),
        _ => String::new(),
    }
}

/// RFC 5322 field-name: printable US-ASCII except colon.
fn is_field_name(key: &str) -> bool {
    !key.is_empty() && key.bytes().all(|b| (33..=126).contains(&b) && b != b':')
}

fn extract_headers(headers: &[MailHeader<'_>]) -> Headers {
    let (from_name, from_email) = headers
        .get_first_header("From")
        .map(parse_from)
        .unwrap_or_default();

    let date = headers.get_first_value("Date").and_then(|value| {
        let parsed = parse_date(&value);
        if parsed.is_none() {
            warn!(date = %value, "mime_date_unparseable");
        }
        parsed
    });

    let message_id = headers
        .get_first_value("Message-Id")
        .map(|id| id.trim().trim_matches(|c| c == '<' || c == '>').to_string())
        .filter(|id| !id.is_empty());

    Headers {
        subject: headers.get_first_value("Subject").unwrap_or_default(),
        from_name,
        from_email,
        to: headers.get_first_value("To").unwrap_or_default(),
        date,
        message_id,
    }
}

/// Split a `From` header into display name and address.
fn parse_from(header: &MailHeader<'_>) -> (String, String) {
    let parsed = addrparse_header(header).ok().and_then(|list| {
        list.iter().find_map(|addr| match addr {
            MailAddr::Single(info) => Some((
                info.display_name.clone().unwrap_or_default(),
                info.addr.clone(),
            )),
            MailAddr::Group(group) => group.addrs.first().map(|info| {
                (
                    info.display_name.clone().unwrap_or_default(),
                    info.addr.clone(),
                )
            }),
        })
    });

    match parsed {
        Some(pair) => pair,
        None => split_address(&header.get_value()),
    }
}

/// Fallback for addresses mailparse rejects: `<...>` holds the address,
/// otherwise the first bare token is taken.
fn split_address(value: &str) -> (String, String) {
    let value = value.trim();

    if let (Some(start), Some(end)) = (value.rfind('<'), value.rfind('>')) {
        if start < end {
            let name = value[..start].trim().trim_matches('"').trim().to_string();
            let email = value[start + 1..end].trim().to_string();
            return (name, email);
        }
    }

    let email = value.split_whitespace().next().unwrap_or_default().to_string();
    (String::new(), email)
}

fn parse_date(value: &str) -> Option<DateTime<Utc>> {
    let timestamp = dateparse(value).ok()?;
    DateTime::<Utc>::from_timestamp(timestamp, 0)
}

/// Walk the part tree, keeping the first text/plain and text/html bodies.
fn collect_bodies(part: &ParsedMail<'_>, bodies: &mut Bodies) {
    if bodies.is_complete() {
        return;
    }

    match ContentKind::of(part) {
        ContentKind::Multipart => {
            for sub in &part.subparts {
                collect_bodies(sub, bodies);
            }
        }
        ContentKind::PlainText if bodies.text.is_none() && !is_attachment(part) => {
            bodies.text = decode_body(part);
        }
        ContentKind::Html if bodies.html.is_none() && !is_attachment(part) => {
            bodies.html = decode_body(part);
        }
        kind => {
            debug!(
                content_type = %part.ctype.mimetype,
                kind = ?kind,
                "mime_part_skipped"
            );
        }
    }
}

fn is_attachment(part: &ParsedMail<'_>) -> bool {
    part.get_content_disposition().disposition == DispositionType::Attachment
}

/// Transfer-decoded, charset-converted body of a leaf part.
fn decode_body(part: &ParsedMail<'_>) -> Option<String> {
    match part.get_body() {
        Ok(body) => Some(body),
        Err(e) => {
            warn!(
                content_type = %part.ctype.mimetype,
                error = %e,
                "mime_body_decode_failed"
            );
            None
        }
    }
}
