//! HTML handling for message bodies: sanitization and text conversion.

pub mod sanitizer;
pub mod text;

pub use sanitizer::HtmlSanitizer;
pub use text::{text_content, text_to_html};
