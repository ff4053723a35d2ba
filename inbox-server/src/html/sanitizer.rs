//! Allow-list HTML sanitizer for message bodies.
//!
//! Markup is parsed with a full HTML5 tree builder (via `ammonia`) and
//! re-serialized, so fragments split across tags cannot be reassembled into
//! something that was removed.

use std::collections::{HashMap, HashSet};

use ammonia::{Builder, UrlRelative};

/// Structural and text-formatting elements kept in the output.
const ALLOWED_TAGS: &[&str] = &[
    "a", "abbr", "b", "bdi", "bdo", "blockquote", "br", "caption", "center", "cite", "code", "col",
    "colgroup", "dd", "del", "dfn", "div", "dl", "dt", "em", "figcaption", "figure", "h1", "h2",
    "h3", "h4", "h5", "h6", "hr", "i", "img", "ins", "kbd", "li", "mark", "ol", "p", "pre", "q",
    "s", "samp", "small", "span", "strike", "strong", "sub", "sup", "table", "tbody", "td",
    "tfoot", "th", "thead", "time", "tr", "tt", "u", "ul", "var", "wbr",
];

/// Removed together with everything inside them.
const DROPPED_WITH_CONTENT: &[&str] = &[
    "script", "style", "iframe", "object", "embed", "form", "noscript", "template", "title",
    "frameset", "frame", "applet",
];

const GENERIC_ATTRIBUTES: &[&str] = &["title", "lang", "dir", "align"];

const TAG_ATTRIBUTES: &[(&str, &[&str])] = &[
    ("a", &["href", "hreflang"]),
    ("img", &["src", "alt", "width", "height"]),
    ("table", &["width", "border", "cellpadding", "cellspacing", "summary"]),
    ("td", &["colspan", "rowspan", "valign", "width", "height"]),
    ("th", &["colspan", "rowspan", "valign", "width", "height", "scope"]),
    ("col", &["span", "width"]),
    ("colgroup", &["span", "width"]),
    ("ol", &["start", "type", "reversed"]),
    ("li", &["value"]),
    ("time", &["datetime"]),
];

const URL_SCHEMES: &[&str] = &["http", "https", "mailto"];

/// Sanitizes untrusted HTML into a renderable subset.
///
/// Construct once and share; sanitizing does not mutate the sanitizer.
pub struct HtmlSanitizer {
    builder: Builder<'static>,
}

impl HtmlSanitizer {
    pub fn new() -> Self {
        let tag_attributes: HashMap<&'static str, HashSet<&'static str>> = TAG_ATTRIBUTES
            .iter()
            .map(|(tag, attrs)| (*tag, attrs.iter().copied().collect()))
            .collect();

        let mut builder = Builder::default();
        builder
            .tags(ALLOWED_TAGS.iter().copied().collect())
            .clean_content_tags(DROPPED_WITH_CONTENT.iter().copied().collect())
            .generic_attributes(GENERIC_ATTRIBUTES.iter().copied().collect())
            .tag_attributes(tag_attributes)
            .url_schemes(URL_SCHEMES.iter().copied().collect())
            .url_relative(UrlRelative::Deny)
            .link_rel(Some("noopener noreferrer"))
            .strip_comments(true);

        Self { builder }
    }

    /// Sanitize `html`. Never fails; hostile input may come back empty.
    ///
    /// The HTML5 parser drops the newline right after `<pre>` and the
    /// serializer does not restore it, so one pass is not always a fixed
    /// point. Passes repeat while the output keeps shrinking.
    pub fn sanitize(&self, html: &str) -> String {
        if html.is_empty() {
            return String::new();
        }

        let mut out = self.builder.clean(html).to_string();
        loop {
            let next = self.builder.clean(&out).to_string();
            if next.len() >= out.len() {
                return out;
            }
            out = next;
        }
    }
}

impl Default for HtmlSanitizer {
    fn default() -> Self {
        Self::new()
    }
}
