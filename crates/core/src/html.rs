//! Small DOM helpers over `scraper` trees.

use scraper::{ElementRef, Html};

/// First element (document order) whose `id` attribute equals `id`.
pub fn find_by_id<'a>(doc: &'a Html, id: &str) -> Option<ElementRef<'a>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().id() == Some(id))
}

/// The `<body>` element, if the document has one.
pub fn body(doc: &Html) -> Option<ElementRef<'_>> {
    doc.root_element()
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "body")
}

/// Element children of `el` with the given local name.
pub fn child_elements<'a>(el: ElementRef<'a>, name: &'a str) -> impl Iterator<Item = ElementRef<'a>> + 'a {
    el.children()
        .filter_map(ElementRef::wrap)
        .filter(move |child| child.value().name() == name)
}

/// Outer HTML of `start` and each following sibling element, stopping right
/// before a later sibling whose id is `stop_id` or when siblings run out.
/// `start` itself is always included. Text between elements is dropped. The
/// run is wrapped in a `<div>`.
pub fn sibling_run(start: ElementRef<'_>, stop_id: Option<&str>) -> String {
    let mut html = String::from("<div>");
    html.push_str(&start.html());
    let mut cursor = start.next_sibling();
    while let Some(node) = cursor {
        if let Some(el) = ElementRef::wrap(node) {
            if stop_id.is_some() && el.value().id() == stop_id {
                break;
            }
            html.push_str(&el.html());
        }
        cursor = node.next_sibling();
    }
    html.push_str("</div>");
    html
}

/// Collapse internal whitespace runs and trim.
pub fn squash_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}
