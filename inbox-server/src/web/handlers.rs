//! Webhook endpoint handlers.
//!
//! Handlers only extract the request and translate [`IngestError`] into a
//! status code; all pipeline decisions live in the [`Ingestor`].

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{info, warn};

use super::extract::{WebhookForm, WebhookFormRejection};
use crate::error::IngestError;
use crate::ingest::{DevInboundPayload, Ingestor};
use crate::Config;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub ingestor: Arc<Ingestor>,
}

impl AppState {
    pub fn new(config: Config, ingestor: Ingestor) -> Self {
        Self {
            config: Arc::new(config),
            ingestor: Arc::new(ingestor),
        }
    }
}

// =============================================================================
// Health Check
// =============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse { status: "ok" })
}

// =============================================================================
// Responses
// =============================================================================

/// Body of every ingestion response.
#[derive(Debug, Serialize)]
pub struct WebhookResponse {
    pub status: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl WebhookResponse {
    fn status(status: &'static str) -> Self {
        Self {
            status,
            id: None,
            error: None,
        }
    }

    fn stored(status: &'static str, id: String) -> Self {
        Self {
            status,
            id: Some(id),
            error: None,
        }
    }

    fn error(status: &'static str, error: impl Into<String>) -> Self {
        Self {
            status,
            id: None,
            error: Some(error.into()),
        }
    }
}

/// 400 with `{"status":"bad_request"}`.
pub(crate) fn bad_request() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(WebhookResponse::status("bad_request")),
    )
        .into_response()
}

impl IntoResponse for IngestError {
    fn into_response(self) -> Response {
        let (code, body) = match self {
            IngestError::Authentication => (
                StatusCode::FORBIDDEN,
                WebhookResponse::status("invalid_signature"),
            ),
            IngestError::Validation(_) => {
                (StatusCode::BAD_REQUEST, WebhookResponse::status("bad_request"))
            }
            IngestError::Unprocessable(message) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                WebhookResponse::error("unprocessable", message),
            ),
            IngestError::AliasNotFound => {
                (StatusCode::NOT_FOUND, WebhookResponse::status("not_found"))
            }
            IngestError::Storage(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                WebhookResponse::status("error"),
            ),
        };

        (code, Json(body)).into_response()
    }
}

// =============================================================================
// Mailgun Webhook
// =============================================================================

/// Mailgun raw-MIME webhook endpoint; urlencoded or multipart.
pub async fn mailgun_webhook(
    State(state): State<AppState>,
    form: Result<WebhookForm, WebhookFormRejection>,
) -> Response {
    let WebhookForm(payload) = match form {
        Ok(form) => form,
        Err(rejection) => {
            warn!(error = %rejection, "mailgun_webhook_unreadable");
            return rejection.into_response();
        }
    };

    info!(
        recipient = payload.recipient.as_deref().unwrap_or_default(),
        has_body_mime = payload.body_mime.is_some(),
        has_body_plain = payload.body_plain.is_some(),
        has_body_html = payload.body_html.is_some(),
        has_signature = payload.signature.is_some(),
        "mailgun_webhook_received"
    );

    match state.ingestor.ingest(&payload).await {
        Ok(id) => (StatusCode::OK, Json(WebhookResponse::stored("ok", id))).into_response(),
        Err(e) => {
            warn!(error = %e, "mailgun_webhook_rejected");
            e.into_response()
        }
    }
}

// =============================================================================
// Development Inbound
// =============================================================================

/// JSON endpoint for injecting test messages; mounted only when enabled.
pub async fn dev_inbound(
    State(state): State<AppState>,
    json: Result<Json<DevInboundPayload>, JsonRejection>,
) -> Response {
    let Json(payload) = match json {
        Ok(json) => json,
        Err(JsonRejection::MissingJsonContentType(_)) => {
            return (
                StatusCode::UNSUPPORTED_MEDIA_TYPE,
                Json(WebhookResponse::error(
                    "unsupported_media_type",
                    "Content-Type must be application/json.",
                )),
            )
                .into_response();
        }
        Err(rejection) => {
            warn!(error = %rejection, "dev_inbound_invalid_json");
            return IngestError::Unprocessable("Invalid JSON.".to_string()).into_response();
        }
    };

    info!(to = %payload.to, from = %payload.from, "dev_inbound_received");

    match state.ingestor.ingest_dev(&payload).await {
        Ok(id) => {
            (StatusCode::CREATED, Json(WebhookResponse::stored("created", id))).into_response()
        }
        Err(e) => {
            warn!(error = %e, "dev_inbound_rejected");
            e.into_response()
        }
    }
}
