//! The parsed book and the entry points that produce it.

use std::path::{Path, PathBuf};

use serde::{Serialize, Serializer};

use crate::archive::Archive;
use crate::error::Result;
use crate::package::{parse_container, parse_package, BookInfo, PackageInfo, CONTAINER_PATH};
use crate::paths;
use crate::section::{read_sections, ExpandOptions, HtmlNode, PackageResolver, ResourceResolver, Section};
use crate::security::SecurityLimits;
use crate::segment::Segmenter;
use crate::toc::{flatten, TocContext, TocNode};

/// How the caller labels its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    /// Always read from disk.
    Path,
    Buffer,
    /// Text whose chars are byte values.
    BinaryString,
}

#[derive(Debug, Clone)]
pub struct ParseOptions {
    pub kind: Option<InputKind>,
    /// Build HTML node trees for every section while parsing.
    pub expand: bool,
    pub inline_images: bool,
    pub security: SecurityLimits,
}

impl Default for ParseOptions {
    fn default() -> Self {
        Self {
            kind: None,
            expand: false,
            inline_images: true,
            security: SecurityLimits::default(),
        }
    }
}

/// Parse input: a filesystem path, archive bytes, or a string that is either
/// a path or a binary string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EpubSource {
    Path(PathBuf),
    Bytes(Vec<u8>),
    Text(String),
}

impl From<PathBuf> for EpubSource {
    fn from(path: PathBuf) -> Self {
        EpubSource::Path(path)
    }
}

impl From<&Path> for EpubSource {
    fn from(path: &Path) -> Self {
        EpubSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for EpubSource {
    fn from(bytes: Vec<u8>) -> Self {
        EpubSource::Bytes(bytes)
    }
}

impl From<&[u8]> for EpubSource {
    fn from(bytes: &[u8]) -> Self {
        EpubSource::Bytes(bytes.to_vec())
    }
}

impl From<String> for EpubSource {
    fn from(text: String) -> Self {
        EpubSource::Text(text)
    }
}

impl From<&str> for EpubSource {
    fn from(text: &str) -> Self {
        EpubSource::Text(text.to_string())
    }
}

#[derive(Debug, PartialEq, Eq)]
enum Located {
    Disk(PathBuf),
    Memory(Vec<u8>),
}

impl EpubSource {
    fn locate(self, kind: Option<InputKind>) -> Located {
        match self {
            EpubSource::Path(path) => Located::Disk(path),
            EpubSource::Text(text) => {
                if kind == Some(InputKind::Path) || Path::new(&text).is_file() {
                    Located::Disk(PathBuf::from(text))
                } else {
                    Located::Memory(binary_string_bytes(&text))
                }
            }
            EpubSource::Bytes(bytes) if kind == Some(InputKind::Path) => {
                Located::Disk(PathBuf::from(String::from_utf8_lossy(&bytes).into_owned()))
            }
            EpubSource::Bytes(bytes) => Located::Memory(bytes),
        }
    }
}

/// One byte per char for Latin-1 text; anything wider keeps its UTF-8 bytes.
fn binary_string_bytes(text: &str) -> Vec<u8> {
    if text.chars().all(|c| (c as u32) <= 0xFF) {
        text.chars().map(|c| c as u8).collect()
    } else {
        text.as_bytes().to_vec()
    }
}

/// Parse an EPUB, reading from disk through `tokio::fs` when the input names
/// a file.
pub async fn parse_epub(source: impl Into<EpubSource>, opts: &ParseOptions) -> Result<Epub> {
    let bytes = match source.into().locate(opts.kind) {
        Located::Disk(path) => {
            tracing::debug!(path = %path.display(), "Reading archive from disk");
            tokio::fs::read(&path).await?
        }
        Located::Memory(bytes) => bytes,
    };
    EpubReader::new(&bytes, &opts.security)?.parse(opts)
}

pub fn parse_epub_blocking(source: impl Into<EpubSource>, opts: &ParseOptions) -> Result<Epub> {
    let bytes = match source.into().locate(opts.kind) {
        Located::Disk(path) => {
            tracing::debug!(path = %path.display(), "Reading archive from disk");
            std::fs::read(&path)?
        }
        Located::Memory(bytes) => bytes,
    };
    EpubReader::new(&bytes, &opts.security)?.parse(opts)
}

/// An opened archive waiting for its parse pass.
#[derive(Debug)]
pub struct EpubReader {
    archive: Archive,
}

impl EpubReader {
    pub fn new(bytes: &[u8], limits: &SecurityLimits) -> Result<Self> {
        Ok(Self::from_archive(Archive::from_bytes(bytes, limits)?))
    }

    pub fn from_archive(archive: Archive) -> Self {
        Self { archive }
    }

    /// Container, package, table of contents, segmentation, sections.
    pub fn parse(self, opts: &ParseOptions) -> Result<Epub> {
        let archive = self.archive;

        let package_path = parse_container(&archive.text(CONTAINER_PATH)?)?;
        let package_path = paths::resolve(&package_path, "");
        let root = paths::resolve_root(&package_path);
        let package = parse_package(&archive.text(&package_path)?, &package_path)?;

        let toc = TocContext {
            archive: &archive,
            package: &package,
            root: &root,
        };
        let structure = toc
            .build()?
            .map(|nodes| Segmenter::new(&archive, &package, &root).segment(&nodes));
        if structure.is_none() {
            tracing::debug!("No table of contents found");
        }

        let expand = ExpandOptions {
            inline_images: opts.inline_images,
            limits: &opts.security,
        };
        let resolver = PackageResolver {
            archive: &archive,
            package: &package,
            root: &root,
        };
        let sections = read_sections(&resolver, opts.expand.then_some(&expand))?;

        Ok(Epub {
            archive,
            root,
            package,
            structure,
            sections,
            inline_images: opts.inline_images,
            limits: opts.security.clone(),
        })
    }
}

/// A fully parsed book. Immutable once built.
#[derive(Debug)]
pub struct Epub {
    archive: Archive,
    root: String,
    package: PackageInfo,
    structure: Option<Vec<TocNode>>,
    sections: Vec<Section>,
    inline_images: bool,
    limits: SecurityLimits,
}

impl Epub {
    pub fn info(&self) -> &BookInfo {
        &self.package.metadata
    }

    pub fn package(&self) -> &PackageInfo {
        &self.package
    }

    /// Directory of the package document inside the archive.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn archive(&self) -> &Archive {
        &self.archive
    }

    /// Segmented table of contents; `None` when the book has none.
    pub fn structure(&self) -> Option<&[TocNode]> {
        self.structure.as_deref()
    }

    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    pub fn section(&self, id: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.id() == id)
    }

    /// First node in pre-order with the given play order.
    pub fn find_node(&self, play_order: u32) -> Option<&TocNode> {
        flatten(self.structure()?)
            .into_iter()
            .find(|node| node.play_order == Some(play_order))
    }

    /// Node tree of one section, built now with the options used to parse.
    pub fn expand_section(&self, id: &str) -> Option<Vec<HtmlNode>> {
        let section = self.section(id)?;
        if let Some(nodes) = section.html_nodes() {
            return Some(nodes.to_vec());
        }
        let opts = ExpandOptions {
            inline_images: self.inline_images,
            limits: &self.limits,
        };
        Some(section.expand(self, &opts))
    }

    pub fn resolver(&self) -> PackageResolver<'_> {
        PackageResolver {
            archive: &self.archive,
            package: &self.package,
            root: &self.root,
        }
    }
}

impl ResourceResolver for Epub {
    fn read_bytes(&self, path: &str) -> Result<&[u8]> {
        self.archive.bytes(path)
    }

    fn media_type_of(&self, path: &str) -> Option<&str> {
        self.resolver().media_type(path)
    }

    fn section_id_for(&self, href: &str) -> Option<&str> {
        self.resolver().section_id(href)
    }
}

#[derive(Serialize)]
struct EpubRecord<'a> {
    info: &'a BookInfo,
    #[serde(skip_serializing_if = "Option::is_none")]
    structure: Option<&'a [TocNode]>,
    sections: &'a [Section],
}

impl Serialize for Epub {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        EpubRecord {
            info: self.info(),
            structure: self.structure(),
            sections: &self.sections,
        }
        .serialize(serializer)
    }
}
