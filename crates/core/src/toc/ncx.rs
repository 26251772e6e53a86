//! EPUB2 NCX navigation map.

use quick_xml::events::Event;
use quick_xml::Reader as XmlReader;

use super::NavRecord;
use crate::error::{EpubError, Result};
use crate::html::squash_whitespace;

#[derive(Default)]
struct PointBuilder {
    record: NavRecord,
    label_done: bool,
}

/// Decode the `<navMap>` of an NCX document into nested records. Each
/// `navPoint` takes its label from its first `navLabel/text` and its target
/// from its own `content@src`.
pub fn decode(xml: &str, path: &str) -> Result<Vec<NavRecord>> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();

    let mut roots = Vec::new();
    let mut stack: Vec<PointBuilder> = Vec::new();
    let mut in_nav_map = false;
    let mut in_label = false;
    let mut in_text = false;

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| EpubError::parse(path, e))?;
        match event {
            Event::Start(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = true,
                b"navPoint" if in_nav_map => {
                    let play_order = e
                        .attributes()
                        .flatten()
                        .find(|a| a.key.local_name().as_ref() == b"playOrder")
                        .and_then(|a| String::from_utf8_lossy(&a.value).trim().parse().ok());
                    stack.push(PointBuilder {
                        record: NavRecord {
                            play_order,
                            ..NavRecord::default()
                        },
                        label_done: false,
                    });
                }
                b"navLabel" => in_label = true,
                b"text" if in_label => in_text = true,
                b"content" => set_src(&mut stack, e),
                _ => {}
            },
            Event::Empty(ref e) => {
                if e.local_name().as_ref() == b"content" {
                    set_src(&mut stack, e);
                }
            }
            Event::Text(ref e) if in_text => {
                if let Some(top) = stack.last_mut().filter(|t| !t.label_done) {
                    let text = e.unescape().map_err(|e| EpubError::parse(path, e))?;
                    top.record.label.push_str(&text);
                }
            }
            Event::CData(ref e) if in_text => {
                if let Some(top) = stack.last_mut().filter(|t| !t.label_done) {
                    top.record.label.push_str(&String::from_utf8_lossy(e));
                }
            }
            Event::End(ref e) => match e.local_name().as_ref() {
                b"navMap" => in_nav_map = false,
                b"text" => in_text = false,
                b"navLabel" => {
                    in_label = false;
                    if let Some(top) = stack.last_mut() {
                        top.label_done = true;
                    }
                }
                b"navPoint" if in_nav_map => {
                    if let Some(mut done) = stack.pop() {
                        done.record.label = squash_whitespace(&done.record.label);
                        match stack.last_mut() {
                            Some(parent) => parent.record.children.push(done.record),
                            None => roots.push(done.record),
                        }
                    }
                }
                _ => {}
            },
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    Ok(roots)
}

fn set_src(stack: &mut [PointBuilder], e: &quick_xml::events::BytesStart<'_>) {
    let Some(top) = stack.last_mut() else {
        return;
    };
    if !top.record.href.is_empty() {
        return;
    }
    if let Some(src) = e
        .attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == b"src")
    {
        top.record.href = src
            .unescape_value()
            .map(|v| v.trim().to_string())
            .unwrap_or_else(|_| String::from_utf8_lossy(&src.value).trim().to_string());
    }
}

/// Local name of the document element, if the text parses that far.
pub fn root_element(xml: &str) -> Option<String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();
    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(ref e)) | Ok(Event::Empty(ref e)) => {
                return Some(String::from_utf8_lossy(e.local_name().as_ref()).to_lowercase());
            }
            Ok(Event::Eof) | Err(_) => return None,
            _ => {}
        }
        buf.clear();
    }
}
