//! Webhook body extraction for both form encodings Mailgun may use.
//!
//! `multipart/form-data` bodies are read field by field, text and file parts
//! alike; anything else goes through the urlencoded form extractor.

use axum::{
    async_trait,
    extract::{
        multipart::{MultipartError, MultipartRejection},
        rejection::FormRejection,
        Form, FromRequest, Multipart, Request,
    },
    http::header::CONTENT_TYPE,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use super::handlers::bad_request;
use crate::ingest::InboundPayload;

/// Webhook fields decoded from either form encoding.
#[derive(Debug)]
pub struct WebhookForm(pub InboundPayload);

#[derive(Debug, Error)]
pub enum WebhookFormRejection {
    #[error(transparent)]
    Form(#[from] FormRejection),
    #[error(transparent)]
    Multipart(#[from] MultipartRejection),
    #[error("unreadable multipart field: {0}")]
    Field(#[from] MultipartError),
}

impl IntoResponse for WebhookFormRejection {
    fn into_response(self) -> Response {
        bad_request()
    }
}

fn is_multipart(req: &Request) -> bool {
    req.headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .map(|value| {
            value
                .trim_start()
                .to_ascii_lowercase()
                .starts_with("multipart/form-data")
        })
        .unwrap_or(false)
}

#[async_trait]
impl<S> FromRequest<S> for WebhookForm
where
    S: Send + Sync,
{
    type Rejection = WebhookFormRejection;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        if !is_multipart(&req) {
            let Form(payload) = Form::<InboundPayload>::from_request(req, state).await?;
            return Ok(Self(payload));
        }

        let mut multipart = Multipart::from_request(req, state).await?;
        let mut payload = InboundPayload::default();

        while let Some(field) = multipart.next_field().await? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let bytes = field.bytes().await?;
            payload.set_field(&name, String::from_utf8_lossy(&bytes).into_owned());
        }

        Ok(Self(payload))
    }
}
