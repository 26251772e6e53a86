//! Section reader: one content unit per spine entry, with lazy markdown and
//! optional expansion into an owned HTML node tree.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::OnceLock;

use base64::Engine;
use scraper::{ElementRef, Html, Node};
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};

use crate::archive::Archive;
use crate::error::{EpubError, Result};
use crate::html::body;
use crate::links::{is_internal, parse_link, resolve_section_id};
use crate::markdown::html_to_markdown;
use crate::package::PackageInfo;
use crate::paths;
use crate::security::{check_nesting_depth, SecurityLimits};

/// Owned element tree of a section body, links and images rewritten.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum HtmlNode {
    Element {
        tag: String,
        attrs: BTreeMap<String, String>,
        children: Vec<HtmlNode>,
    },
    Text {
        text: String,
    },
}

impl HtmlNode {
    pub fn tag(&self) -> Option<&str> {
        match self {
            HtmlNode::Element { tag, .. } => Some(tag),
            HtmlNode::Text { .. } => None,
        }
    }

    pub fn attr(&self, name: &str) -> Option<&str> {
        match self {
            HtmlNode::Element { attrs, .. } => attrs.get(name).map(String::as_str),
            HtmlNode::Text { .. } => None,
        }
    }

    pub fn children(&self) -> &[HtmlNode] {
        match self {
            HtmlNode::Element { children, .. } => children,
            HtmlNode::Text { .. } => &[],
        }
    }

    /// Concatenated text of this node and its descendants.
    pub fn text(&self) -> String {
        match self {
            HtmlNode::Text { text } => text.clone(),
            HtmlNode::Element { children, .. } => children.iter().map(HtmlNode::text).collect(),
        }
    }
}

/// Access to the container's resources while expanding a section.
pub trait ResourceResolver {
    /// Raw bytes of an archive path.
    fn read_bytes(&self, path: &str) -> Result<&[u8]>;

    /// Declared media type of the manifest item stored at `path`.
    fn media_type_of(&self, path: &str) -> Option<&str>;

    /// Manifest id a link target points into.
    fn section_id_for(&self, href: &str) -> Option<&str>;
}

/// Resolver over an archive and its parsed package document.
#[derive(Debug, Clone, Copy)]
pub struct PackageResolver<'a> {
    pub archive: &'a Archive,
    pub package: &'a PackageInfo,
    pub root: &'a str,
}

impl<'a> PackageResolver<'a> {
    pub fn media_type(&self, path: &str) -> Option<&'a str> {
        let wanted = paths::percent_decode(path);
        self.package
            .manifest
            .iter()
            .find(|item| paths::percent_decode(&paths::resolve(&item.href, self.root)) == wanted)
            .map(|item| item.media_type.as_str())
    }

    pub fn section_id(&self, href: &str) -> Option<&'a str> {
        resolve_section_id(href, &self.package.manifest)
    }
}

impl ResourceResolver for PackageResolver<'_> {
    fn read_bytes(&self, path: &str) -> Result<&[u8]> {
        self.archive.bytes(path)
    }

    fn media_type_of(&self, path: &str) -> Option<&str> {
        self.media_type(path)
    }

    fn section_id_for(&self, href: &str) -> Option<&str> {
        self.section_id(href)
    }
}

#[derive(Debug, Clone, Copy)]
pub struct ExpandOptions<'a> {
    pub inline_images: bool,
    pub limits: &'a SecurityLimits,
}

/// One spine document.
#[derive(Debug, Clone)]
pub struct Section {
    id: String,
    html_string: String,
    file_path: String,
    markdown: OnceLock<String>,
    html_nodes: Option<Vec<HtmlNode>>,
}

impl Section {
    pub fn new(id: impl Into<String>, file_path: impl Into<String>, html_string: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            html_string: html_string.into(),
            file_path: file_path.into(),
            markdown: OnceLock::new(),
            html_nodes: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn html_string(&self) -> &str {
        &self.html_string
    }

    /// Archive path of the document.
    pub fn file_path(&self) -> &str {
        &self.file_path
    }

    /// Markdown of the document body, converted on first use.
    pub fn markdown(&self) -> &str {
        self.markdown.get_or_init(|| html_to_markdown(&self.html_string))
    }

    /// Node tree built during parsing when expansion was requested.
    pub fn html_nodes(&self) -> Option<&[HtmlNode]> {
        self.html_nodes.as_deref()
    }

    pub fn expand(&self, resolver: &dyn ResourceResolver, opts: &ExpandOptions<'_>) -> Vec<HtmlNode> {
        Expander::new(self, resolver, opts).run(&self.html_string)
    }
}

impl Serialize for Section {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("Section", 3)?;
        s.serialize_field("id", &self.id)?;
        s.serialize_field("htmlString", &self.html_string)?;
        s.serialize_field("markdown", self.markdown())?;
        s.end()
    }
}

/// Build one section per spine id, in spine order. A spine id with no
/// manifest item, or whose document is missing from the archive, fails the
/// whole read.
pub fn read_sections(
    resolver: &PackageResolver<'_>,
    expand: Option<&ExpandOptions<'_>>,
) -> Result<Vec<Section>> {
    let package = resolver.package;
    let mut sections = Vec::with_capacity(package.spine.len());
    for id in &package.spine {
        let item = package
            .item(id)
            .ok_or_else(|| EpubError::NotFound(format!("manifest item '{id}' for spine entry")))?;
        let path = paths::resolve(&item.href, resolver.root);
        let text = resolver.archive.text(&path)?;

        let mut section = Section::new(id.as_str(), path, text.into_owned());
        if let Some(opts) = expand {
            section.html_nodes = Some(section.expand(resolver, opts));
        }
        sections.push(section);
    }
    tracing::debug!(sections = sections.len(), "Read spine sections");
    Ok(sections)
}

struct Expander<'a> {
    section_id: &'a str,
    base_dir: &'a str,
    resolver: &'a dyn ResourceResolver,
    opts: &'a ExpandOptions<'a>,
    truncated: Cell<bool>,
}

impl<'a> Expander<'a> {
    fn new(section: &'a Section, resolver: &'a dyn ResourceResolver, opts: &'a ExpandOptions<'a>) -> Self {
        Self {
            section_id: &section.id,
            base_dir: paths::parent_dir(&section.file_path),
            resolver,
            opts,
            truncated: Cell::new(false),
        }
    }

    fn run(&self, html: &str) -> Vec<HtmlNode> {
        let doc = Html::parse_document(html);
        let root = body(&doc).unwrap_or_else(|| doc.root_element());
        self.children(root, 1)
    }

    fn children(&self, parent: ElementRef<'_>, depth: u32) -> Vec<HtmlNode> {
        let mut out = Vec::new();
        for child in parent.children() {
            match child.value() {
                Node::Element(_) => {
                    if let Some(node) = ElementRef::wrap(child).and_then(|el| self.element(el, depth)) {
                        out.push(node);
                    }
                }
                Node::Text(text) if !text.trim().is_empty() => out.push(HtmlNode::Text {
                    text: text.text.to_string(),
                }),
                _ => {}
            }
        }
        out
    }

    fn element(&self, el: ElementRef<'_>, depth: u32) -> Option<HtmlNode> {
        if let Err(e) = check_nesting_depth(depth, self.opts.limits) {
            if !self.truncated.replace(true) {
                tracing::warn!("Section '{}' truncated: {}", self.section_id, e);
            }
            return None;
        }

        let tag = el.value().name().to_string();
        let mut attrs: BTreeMap<String, String> = el
            .value()
            .attrs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        match tag.as_str() {
            "a" => {
                if let Some(href) = attrs.get_mut("href") {
                    if let Some(rewritten) = self.rewrite_link(href) {
                        *href = rewritten;
                    }
                }
            }
            "img" | "image" if self.opts.inline_images => {
                for key in ["src", "href", "xlink:href"] {
                    if let Some(src) = attrs.get_mut(key) {
                        if let Some(data) = self.inline_image(src) {
                            *src = data;
                        }
                    }
                }
            }
            _ => {}
        }

        Some(HtmlNode::Element {
            tag,
            attrs,
            children: self.children(el, depth + 1),
        })
    }

    /// `#<section>` or `#<section>,<fragment>` for internal links.
    fn rewrite_link(&self, href: &str) -> Option<String> {
        if !is_internal(href) {
            return None;
        }
        let link = parse_link(href);
        let target = if link.name.is_empty() {
            self.section_id
        } else {
            self.resolver.section_id_for(href)?
        };
        Some(if link.hash.is_empty() {
            format!("#{target}")
        } else {
            format!("#{target},{}", link.hash)
        })
    }

    fn inline_image(&self, src: &str) -> Option<String> {
        if !is_internal(src) || src.starts_with("data:") {
            return None;
        }
        let path = paths::resolve(paths::strip_fragment(src), self.base_dir);
        let bytes = match self.resolver.read_bytes(&path) {
            Ok(bytes) => bytes,
            Err(e) => {
                tracing::warn!("Image left as-is in '{}': {}", self.section_id, e);
                return None;
            }
        };
        let media_type = self
            .resolver
            .media_type_of(&path)
            .unwrap_or_else(|| guess_media_type(&path));
        let encoded = base64::engine::general_purpose::STANDARD.encode(bytes);
        Some(format!("data:{media_type};base64,{encoded}"))
    }
}

fn guess_media_type(path: &str) -> &'static str {
    let ext = Path::new(path)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase();
    match ext.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        _ => "application/octet-stream",
    }
}
