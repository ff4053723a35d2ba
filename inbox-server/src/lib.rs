//! Tempinbox - inbound mail ingestion for disposable aliases.
//!
//! Mail reaches an alias through a Mailgun-style webhook. Each request is
//! authenticated, matched to an enabled alias, parsed, sanitized for
//! display and handed to a message sink.
//!
//! ## Architecture
//!
//! ```text
//! Mailgun → web (auth) → Ingestor → MimeParser + HtmlSanitizer → MessageSink
//!                                  ↘ AliasLookup
//! ```

pub mod alias;
pub mod config;
pub mod error;
pub mod html;
pub mod ingest;
pub mod mime;
pub mod queue;
pub mod store;
pub mod web;

// Re-export commonly used types
pub use alias::{Alias, AliasDirectory, AliasGenerator};
pub use config::Config;
pub use error::{AliasError, ConfigError, ExhaustedError, IngestError, MalformedMimeError};
pub use html::HtmlSanitizer;
pub use ingest::{DevInboundPayload, InboundPayload, Ingestor};
pub use mime::{MimeParser, ParsedMessage};
pub use queue::{InboundMessage, Publisher, INBOUND_MESSAGES_QUEUE};
pub use store::{AliasLookup, MemoryStore, MessageSink};
pub use web::{router, AppState, WebhookAuthenticator};
