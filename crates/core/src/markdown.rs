//! HTML to markdown. Only `<body>` content is converted, so `<title>` and
//! other head elements never leak into the output.

use scraper::Html;

use crate::html::body;

pub fn html_to_markdown(html: &str) -> String {
    let doc = Html::parse_document(html);
    let inner = match body(&doc) {
        Some(body) => body.inner_html(),
        None => html.to_string(),
    };
    html2md::parse_html(&inner).trim().to_string()
}

/// Join converted documents with blank lines, skipping empty ones.
pub fn join_markdown<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}
