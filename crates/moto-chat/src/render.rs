//! Presentation transforms for assistant text.
//!
//! Model answers use a restricted inline markup: `**bold**` and literal
//! newlines. These functions are pure and run on finalized turn text only.

use std::sync::LazyLock;

use regex::Regex;

static BOLD_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)\*\*(.*?)\*\*").expect("Invalid bold regex"));

/// Escape the characters that would otherwise be read as HTML.
fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

/// Render turn text as an HTML fragment.
///
/// Escapes the input first, so model output can never inject markup of its
/// own. Newlines become `<br/>` and `**x**` becomes `<b>x</b>`.
pub fn render_markup(text: &str) -> String {
    let escaped = escape_html(text);
    let with_breaks = escaped.replace("\r\n", "\n").replace('\n', "<br/>");
    BOLD_RE.replace_all(&with_breaks, "<b>$1</b>").into_owned()
}

/// Render turn text for a plain terminal: emphasis markers are dropped.
pub fn render_plain(text: &str) -> String {
    let text = text.replace("\r\n", "\n");
    BOLD_RE.replace_all(&text, "$1").into_owned()
}
