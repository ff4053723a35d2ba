pub mod content_type;
pub mod parser;
pub mod types;

pub use content_type::ContentKind;
pub use parser::{choose_body_html, MimeParser};
pub use types::{ParsedMessage, NO_CONTENT_PLACEHOLDER};
