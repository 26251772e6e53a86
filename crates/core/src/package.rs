//! Container and package (OPF) documents decoded into typed records.

use std::collections::HashSet;

use quick_xml::events::attributes::Attribute;
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader as XmlReader;
use serde::{Deserialize, Serialize};

use crate::error::{EpubError, Result};

pub const CONTAINER_PATH: &str = "META-INF/container.xml";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManifestItem {
    pub id: String,
    pub href: String,
    pub media_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<String>,
}

impl ManifestItem {
    /// True if the whitespace-separated `properties` list names `property`.
    pub fn has_property(&self, property: &str) -> bool {
        self.properties
            .as_deref()
            .map_or(false, |p| p.split_whitespace().any(|p| p == property))
    }
}

/// Book-level metadata. Every field is best-effort.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BookInfo {
    pub title: Option<String>,
    pub author: Option<String>,
    pub publisher: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackageInfo {
    /// Major version from `<package version>`.
    pub version: Option<u32>,
    pub manifest: Vec<ManifestItem>,
    /// Manifest ids in reading order, first occurrence wins.
    pub spine: Vec<String>,
    /// Legacy navigation document id declared on `<spine toc>`.
    pub toc_id: Option<String>,
    pub metadata: BookInfo,
}

impl PackageInfo {
    pub fn item(&self, id: &str) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.id == id)
    }

    /// First manifest item flagged with the `nav` property.
    pub fn nav_item(&self) -> Option<&ManifestItem> {
        self.manifest.iter().find(|item| item.has_property("nav"))
    }

    pub fn spine_position(&self, id: &str) -> Option<usize> {
        self.spine.iter().position(|s| s == id)
    }
}

/// Path of the package document named by the first `<rootfile>`.
pub fn parse_container(xml: &str) -> Result<String> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e))
                if e.local_name().as_ref() == b"rootfile" =>
            {
                if let Some(path) = attr(e, b"full-path") {
                    return Ok(path);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(EpubError::parse(CONTAINER_PATH, e)),
            _ => {}
        }
        buf.clear();
    }

    Err(EpubError::parse(CONTAINER_PATH, "no rootfile full-path"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MetaField {
    Title,
    Creator,
    Publisher,
}

impl MetaField {
    fn from_local(name: &[u8]) -> Option<Self> {
        match name {
            b"title" => Some(Self::Title),
            b"creator" => Some(Self::Creator),
            b"publisher" => Some(Self::Publisher),
            _ => None,
        }
    }

    fn slot(self, info: &mut BookInfo) -> &mut Option<String> {
        match self {
            Self::Title => &mut info.title,
            Self::Creator => &mut info.author,
            Self::Publisher => &mut info.publisher,
        }
    }
}

/// Decode a package document. Missing `<manifest>` or `<spine>` yield empty
/// lists; malformed XML is a parse error.
pub fn parse_package(xml: &str, path: &str) -> Result<PackageInfo> {
    let mut reader = XmlReader::from_str(xml);
    let mut buf = Vec::new();

    let mut package = PackageInfo::default();
    let mut seen_ids = HashSet::new();
    let mut seen_spine = HashSet::new();

    let mut depth = 0usize;
    let mut in_metadata = false;
    // Field being captured and the depth of its element; nested markup
    // (e.g. a compound creator) contributes its text.
    let mut capture: Option<(MetaField, usize)> = None;
    let mut text = String::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| EpubError::parse(path, e))?;
        match event {
            Event::Start(ref e) | Event::Empty(ref e) => {
                let is_start = matches!(event, Event::Start(_));
                if is_start {
                    depth += 1;
                }
                match e.local_name().as_ref() {
                    b"package" => {
                        package.version = attr(e, b"version").and_then(|v| leading_int(&v));
                    }
                    b"metadata" if is_start => in_metadata = true,
                    b"item" => match attr(e, b"id") {
                        Some(id) if seen_ids.insert(id.clone()) => {
                            package.manifest.push(ManifestItem {
                                id,
                                href: attr(e, b"href").unwrap_or_default(),
                                media_type: attr(e, b"media-type").unwrap_or_default(),
                                properties: attr(e, b"properties"),
                            });
                        }
                        Some(id) => tracing::warn!("Duplicate manifest id '{}' ignored", id),
                        None => tracing::warn!("Manifest item without id ignored in {}", path),
                    },
                    b"spine" => package.toc_id = attr(e, b"toc").filter(|t| !t.is_empty()),
                    b"itemref" => {
                        if let Some(idref) = attr(e, b"idref") {
                            if seen_spine.insert(idref.clone()) {
                                package.spine.push(idref);
                            }
                        }
                    }
                    name if is_start && in_metadata && capture.is_none() => {
                        if let Some(field) = MetaField::from_local(name) {
                            if field.slot(&mut package.metadata).is_none() {
                                capture = Some((field, depth));
                                text.clear();
                            }
                        }
                    }
                    _ => {}
                }
            }
            Event::Text(ref e) if capture.is_some() => {
                text.push_str(&e.unescape().map_err(|e| EpubError::parse(path, e))?);
            }
            Event::CData(ref e) if capture.is_some() => {
                text.push_str(&String::from_utf8_lossy(e));
            }
            Event::End(ref e) => {
                if let Some((field, at)) = capture {
                    if at == depth {
                        let value = text.trim();
                        if !value.is_empty() {
                            *field.slot(&mut package.metadata) = Some(value.to_string());
                        }
                        capture = None;
                        text.clear();
                    }
                }
                if e.local_name().as_ref() == b"metadata" {
                    in_metadata = false;
                }
                depth = depth.saturating_sub(1);
            }
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    tracing::debug!(
        version = ?package.version,
        manifest = package.manifest.len(),
        spine = package.spine.len(),
        "Parsed package document {}",
        path
    );
    Ok(package)
}

fn attr(e: &BytesStart<'_>, name: &[u8]) -> Option<String> {
    e.attributes()
        .flatten()
        .find(|a| a.key.local_name().as_ref() == name)
        .map(|a| attr_value(&a))
}

fn attr_value(a: &Attribute<'_>) -> String {
    match a.unescape_value() {
        Ok(v) => v.into_owned(),
        Err(_) => String::from_utf8_lossy(&a.value).into_owned(),
    }
}

/// Integer prefix of a version string: "3.0" -> 3, "x" -> None.
fn leading_int(s: &str) -> Option<u32> {
    let s = s.trim();
    let end = s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len());
    s[..end].parse().ok()
}
