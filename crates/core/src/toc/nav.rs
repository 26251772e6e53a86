//! EPUB3 navigation document (`<nav epub:type="toc">` with nested `<ol>`).

use scraper::{ElementRef, Html, Selector};

use super::NavRecord;
use crate::html::{child_elements, squash_whitespace};

/// Decode the table-of-contents `<nav>` of an XHTML navigation document.
/// Returns `None` when the document has no `<nav>` with a list.
pub fn decode(html: &str) -> Option<Vec<NavRecord>> {
    let doc = Html::parse_document(html);
    let nav = toc_nav(&doc)?;
    let ol = nav
        .descendants()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "ol")?;
    Some(decode_list(ol))
}

/// The `<nav>` typed as the table of contents, else the first `<nav>`.
fn toc_nav(doc: &Html) -> Option<ElementRef<'_>> {
    let selector = Selector::parse("nav").ok()?;
    let navs: Vec<_> = doc.select(&selector).collect();
    navs.iter()
        .copied()
        .find(|nav| {
            let el = nav.value();
            el.attr("epub:type")
                .map_or(false, |t| t.split_whitespace().any(|t| t == "toc"))
                || el.attr("role") == Some("doc-toc")
        })
        .or_else(|| navs.first().copied())
}

fn decode_list(ol: ElementRef<'_>) -> Vec<NavRecord> {
    child_elements(ol, "li").map(decode_item).collect()
}

/// One `<li>`: its first direct link gives label and target; a direct `<ol>`
/// gives children. Headings without a link keep an empty href.
fn decode_item(li: ElementRef<'_>) -> NavRecord {
    let link = child_elements(li, "a").next();
    let (label, href) = match link {
        Some(a) => (link_label(a), a.value().attr("href").unwrap_or("").trim().to_string()),
        None => {
            let heading = child_elements(li, "span").next();
            let label = heading.map(|s| s.text().collect::<String>()).unwrap_or_default();
            (squash_whitespace(&label), String::new())
        }
    };
    let children = child_elements(li, "ol")
        .next()
        .map(decode_list)
        .unwrap_or_default();

    NavRecord {
        label,
        href,
        play_order: None,
        children,
    }
}

/// Link text with any direct `<span>` labels (e.g. a chapter number)
/// prepended to the remaining text.
fn link_label(a: ElementRef<'_>) -> String {
    let mut prefix = String::new();
    let mut rest = String::new();
    for child in a.children() {
        match ElementRef::wrap(child) {
            Some(el) if el.value().name() == "span" => prefix.extend(el.text()),
            Some(el) => rest.extend(el.text()),
            None => {
                if let Some(text) = child.value().as_text() {
                    rest.push_str(text);
                }
            }
        }
    }
    prefix.push(' ');
    prefix.push_str(&rest);
    squash_whitespace(&prefix)
}
