//! Conversions between plain text and HTML.

use scraper::Html;

/// Escape text for HTML and mark every line break with `<br>`.
///
/// The line breaks themselves are kept, so the line structure and all other
/// whitespace survive unchanged. `\r\n`, `\n` and `\r` each count as one break.
pub fn text_to_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            '\r' => {
                out.push_str("<br>\r");
                if chars.peek() == Some(&'\n') {
                    chars.next();
                    out.push('\n');
                }
            }
            '\n' => out.push_str("<br>\n"),
            _ => out.push(c),
        }
    }

    out
}

/// Visible text of an HTML fragment, text nodes separated by spaces.
pub fn text_content(html: &str) -> String {
    let fragment = Html::parse_fragment(html);
    fragment.root_element().text().collect::<Vec<_>>().join(" ")
}
