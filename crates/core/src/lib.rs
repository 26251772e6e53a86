pub mod archive;
pub mod config;
pub mod epub;
pub mod error;
pub mod html;
pub mod links;
pub mod markdown;
pub mod package;
pub mod paths;
pub mod section;
pub mod security;
pub mod segment;
pub mod toc;

#[cfg(test)]
pub(crate) mod test_support;

pub use epub::{parse_epub, parse_epub_blocking, Epub, EpubReader, EpubSource, InputKind, ParseOptions};

pub mod prelude {
    pub use crate::epub::*;
    pub use crate::error::*;
    pub use crate::package::{BookInfo, ManifestItem, PackageInfo};
    pub use crate::section::{HtmlNode, ResourceResolver, Section};
    pub use crate::toc::TocNode;
}
