//! HTTP surface: health check, the Mailgun webhook and the optional
//! development endpoint.

pub mod extract;
pub mod handlers;
pub mod signature;

use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

pub use handlers::{dev_inbound, health, mailgun_webhook, AppState, HealthResponse, WebhookResponse};
pub use extract::{WebhookForm, WebhookFormRejection};
pub use signature::WebhookAuthenticator;

/// Form encoding can inflate a body up to three times.
const FORM_ENCODING_OVERHEAD: usize = 3;

/// Build the application router.
pub fn router(state: AppState) -> Router {
    let body_limit = state
        .config
        .max_body_bytes
        .saturating_mul(FORM_ENCODING_OVERHEAD);

    let mut router = Router::new()
        .route("/health", get(health))
        .route("/inbound/mailgun/raw-mime", post(mailgun_webhook));

    if state.config.dev_inbound_enabled {
        router = router.route("/dev/inbound", post(dev_inbound));
    }

    router
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
