//! Inbound mail ingestion.
//!
//! ```text
//! authenticate → validate → resolve alias → parse (best effort) → preview → store
//! ```
//!
//! A message that fails to parse is still stored with its raw source so
//! delivery is never lost to a parser bug.

pub mod payload;
pub mod preview;

use std::sync::Arc;

use chrono::Utc;
use sha2::{Digest, Sha256};
use tracing::{error, info, warn};

use crate::alias::Alias;
use crate::config::Config;
use crate::error::IngestError;
use crate::mime::{ContentKind, MimeParser, ParsedMessage};
use crate::queue::InboundMessage;
use crate::store::{AliasLookup, MessageSink};
use crate::web::signature::{unix_now, WebhookAuthenticator};

pub use payload::{DevInboundPayload, InboundBody, InboundPayload};
pub use preview::{collapse_whitespace, preview_snippet, truncate_chars, PREVIEW_MAX_CHARS};

use preview::{preview_text, HEADER_MAX_CHARS};

const NO_SUBJECT: &str = "(No subject)";
const UNKNOWN_SENDER: &str = "(Unknown)";

/// Limits of the development endpoint, in bytes.
const DEV_MAX_FROM_BYTES: usize = 255;
const DEV_MAX_SUBJECT_BYTES: usize = 255;
const DEV_MAX_BODY_BYTES: usize = 65535;

/// Runs inbound payloads through the pipeline and hands the result to the sink.
#[derive(Clone)]
pub struct Ingestor {
    authenticator: WebhookAuthenticator,
    require_signature: bool,
    alias_domain: Option<String>,
    max_body_bytes: usize,
    parser: MimeParser,
    aliases: Arc<dyn AliasLookup>,
    sink: Arc<dyn MessageSink>,
}

impl Ingestor {
    pub fn new(
        config: &Config,
        parser: MimeParser,
        aliases: Arc<dyn AliasLookup>,
        sink: Arc<dyn MessageSink>,
    ) -> Self {
        Self {
            authenticator: WebhookAuthenticator::from_config(config),
            require_signature: config.mailgun_require_signature,
            alias_domain: config.alias_domain.clone(),
            max_body_bytes: config.max_body_bytes,
            parser,
            aliases,
            sink,
        }
    }

    /// Ingest a Mailgun webhook payload, returning the stored message id.
    pub async fn ingest(&self, payload: &InboundPayload) -> Result<String, IngestError> {
        self.ingest_at(payload, unix_now()).await
    }

    /// Same as [`ingest`](Self::ingest) with an explicit clock.
    pub async fn ingest_at(&self, payload: &InboundPayload, now: u64) -> Result<String, IngestError> {
        self.authenticate(payload, now)?;

        let recipient = payload
            .recipient
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .ok_or_else(|| {
                warn!(reason = "missing_recipient", "inbound_bad_request");
                IngestError::Validation("missing recipient")
            })?;

        let body = payload.body().ok_or_else(|| {
            warn!(recipient = %recipient, reason = "missing_body", "inbound_bad_request");
            IngestError::Validation("missing body")
        })?;

        if body.as_str().len() > self.max_body_bytes {
            warn!(
                recipient = %recipient,
                body_length = body.as_str().len(),
                max_body_bytes = self.max_body_bytes,
                "inbound_body_too_large"
            );
            return Err(IngestError::Validation("body too large"));
        }

        let local_part = parse_recipient(recipient, self.alias_domain.as_deref())?;
        let alias = self.resolve_alias(&local_part).await?;

        info!(
            recipient = %recipient,
            alias_id = alias.id,
            body_length = body.as_str().len(),
            "inbound_message_accepted"
        );

        let parsed = match body.extracted_kind() {
            None => match self.parser.parse(body.as_str().as_bytes()) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    warn!(alias_id = alias.id, error = %e, "inbound_mime_parse_failed");
                    None
                }
            },
            Some(kind) => Some(self.parser.from_body(body.as_str(), kind)),
        };

        let subject = payload
            .form_subject()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().map(|p| p.subject.clone()).filter(|s| !s.is_empty()))
            .unwrap_or_else(|| NO_SUBJECT.to_string());

        let from_address = payload
            .form_from()
            .map(str::to_string)
            .or_else(|| parsed.as_ref().map(ParsedMessage::from_address).filter(|f| !f.is_empty()))
            .unwrap_or_else(|| UNKNOWN_SENDER.to_string());

        let message_id = parsed
            .as_ref()
            .and_then(|p| p.message_id.clone())
            .unwrap_or_else(|| fallback_message_id(body.as_str()));

        let message = InboundMessage {
            recipient_alias_id: alias.id,
            alias_local_part: alias.local_part,
            received_at: Utc::now(),
            message_id,
            subject: truncate_chars(&subject, HEADER_MAX_CHARS),
            from_address: truncate_chars(&from_address, HEADER_MAX_CHARS),
            preview_snippet: parsed.as_ref().and_then(preview_snippet),
            has_html_body: parsed.as_ref().is_some_and(ParsedMessage::has_html_body),
            raw_body: body.as_str().to_string(),
            parsed,
        };

        self.store(message).await
    }

    /// Ingest a message from the JSON development endpoint.
    pub async fn ingest_dev(&self, payload: &DevInboundPayload) -> Result<String, IngestError> {
        if payload.to.is_empty()
            || payload.from.is_empty()
            || (payload.subject.is_empty() && payload.body.is_empty())
        {
            return Err(IngestError::Unprocessable(
                "Missing required fields: to, from, and at least one of subject or body.".to_string(),
            ));
        }

        for (field, value, max) in [
            ("from", &payload.from, DEV_MAX_FROM_BYTES),
            ("subject", &payload.subject, DEV_MAX_SUBJECT_BYTES),
            ("body", &payload.body, DEV_MAX_BODY_BYTES),
        ] {
            if value.len() > max {
                return Err(IngestError::Unprocessable(format!(
                    "{} must be at most {} characters.",
                    field, max
                )));
            }
        }

        let (local_part, domain) = payload
            .to
            .split_once('@')
            .ok_or_else(|| IngestError::Unprocessable("Invalid recipient email.".to_string()))?;
        let (local_part, domain) = (local_part.trim(), domain.trim());

        let domain_matches = self
            .alias_domain
            .as_deref()
            .map_or(true, |expected| domain.eq_ignore_ascii_case(expected));

        if local_part.is_empty() || domain.is_empty() || !domain_matches {
            return Err(IngestError::Unprocessable(
                "Recipient domain must match alias domain.".to_string(),
            ));
        }

        let alias = self.resolve_alias(&local_part.to_lowercase()).await?;
        let parsed = self.parser.from_body(&payload.body, ContentKind::PlainText);

        let message = InboundMessage {
            recipient_alias_id: alias.id,
            alias_local_part: alias.local_part,
            received_at: Utc::now(),
            message_id: fallback_message_id(&payload.body),
            subject: payload.subject.clone(),
            from_address: payload.from.clone(),
            preview_snippet: preview_text(&payload.body),
            has_html_body: false,
            raw_body: payload.body.clone(),
            parsed: Some(parsed),
        };

        self.store(message).await
    }

    fn authenticate(&self, payload: &InboundPayload, now: u64) -> Result<(), IngestError> {
        if !self.authenticator.is_configured() {
            if self.require_signature {
                warn!("mailgun_signature_key_missing");
                return Err(IngestError::Authentication);
            }
            warn!("mailgun_signature_verification_skipped");
            return Ok(());
        }

        let authenticated = self.authenticator.authenticate(
            payload.timestamp.as_deref(),
            payload.token.as_deref(),
            payload.signature.as_deref(),
            now,
        );

        if authenticated {
            Ok(())
        } else {
            Err(IngestError::Authentication)
        }
    }

    async fn resolve_alias(&self, local_part: &str) -> Result<Alias, IngestError> {
        let alias = self
            .aliases
            .find_enabled_by_local_part(local_part)
            .await
            .map_err(|e| {
                error!(local_part = %local_part, error = %e, "alias_lookup_failed");
                IngestError::Storage(e)
            })?;

        alias.ok_or_else(|| {
            info!(local_part = %local_part, "alias_not_found");
            IngestError::AliasNotFound
        })
    }

    async fn store(&self, message: InboundMessage) -> Result<String, IngestError> {
        let alias_id = message.recipient_alias_id;
        let id = self.sink.store(message).await.map_err(|e| {
            error!(alias_id, error = %e, "inbound_message_store_failed");
            IngestError::Storage(e)
        })?;

        info!(alias_id, id = %id, "inbound_message_stored");
        Ok(id)
    }
}

/// Lowercased local part of `recipient`.
///
/// A missing `@`, an empty local part or a foreign domain all yield
/// [`IngestError::AliasNotFound`], so callers cannot tell which aliases exist.
pub fn parse_recipient(recipient: &str, alias_domain: Option<&str>) -> Result<String, IngestError> {
    let (local_part, domain) = recipient
        .split_once('@')
        .ok_or(IngestError::AliasNotFound)?;

    let local_part = local_part.trim().to_lowercase();
    if local_part.is_empty() {
        return Err(IngestError::AliasNotFound);
    }

    if let Some(expected) = alias_domain {
        if !domain.trim().eq_ignore_ascii_case(expected) {
            return Err(IngestError::AliasNotFound);
        }
    }

    Ok(local_part)
}

/// SHA-256 hex digest of the body, used when a message has no `Message-Id`.
pub fn fallback_message_id(body: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(body.as_bytes());
    let hash = hex::encode(hasher.finalize());

    info!(generated_id = %hash, "message_id_fallback");

    hash
}
