use std::fmt::Write as _;

/// Escapes text for use both as element content and inside quoted attribute
/// values.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#039;"),
            _ => out.push(ch),
        }
    }
    out
}

pub fn stylesheet_route() -> &'static str {
    "/assets/bingo.css"
}

pub fn script_route() -> &'static str {
    "/assets/bingo.js"
}

/// Wraps a fragment in a complete document that loads the board assets.
pub fn page(title: &str, body: &str) -> String {
    let mut html = String::from("<!DOCTYPE html>\n<html lang=\"en\"><head><meta charset=\"utf-8\">");
    let _ = write!(
        html,
        "<title>{}</title><link rel=\"stylesheet\" href=\"{}\"><script src=\"{}\" defer></script>",
        escape_html(title),
        stylesheet_route(),
        script_route()
    );
    html.push_str("</head><body>");
    html.push_str(body);
    html.push_str("</body></html>\n");
    html
}
