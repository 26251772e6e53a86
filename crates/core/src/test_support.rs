//! In-memory EPUB archives for tests.

use std::io::{Cursor, Write};

pub const OPF_PATH: &str = "OEBPS/content.opf";

/// Builds a ZIP container entry by entry. `new()` starts with `mimetype` and
/// a container document pointing at [`OPF_PATH`].
#[derive(Debug, Clone, Default)]
pub struct EpubFixture {
    files: Vec<(String, Vec<u8>)>,
}

impl EpubFixture {
    pub fn new() -> Self {
        Self::bare()
            .file("mimetype", "application/epub+zip")
            .file("META-INF/container.xml", container_xml(OPF_PATH))
    }

    /// No entries at all.
    pub fn bare() -> Self {
        Self::default()
    }

    /// Add or replace an entry.
    pub fn file(mut self, path: &str, content: impl Into<Vec<u8>>) -> Self {
        let content = content.into();
        match self.files.iter_mut().find(|(p, _)| p == path) {
            Some(entry) => entry.1 = content,
            None => self.files.push((path.to_string(), content)),
        }
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let opts: zip::write::FileOptions<'_, ()> =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (path, content) in &self.files {
            zip.start_file(path.as_str(), opts).unwrap();
            zip.write_all(content).unwrap();
        }
        zip.finish().unwrap().into_inner()
    }
}

pub fn container_xml(opf_path: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<container version="1.0" xmlns="urn:oasis:names:tc:opendocument:xmlns:container">
  <rootfiles>
    <rootfile full-path="{opf_path}" media-type="application/oebps-package+xml"/>
  </rootfiles>
</container>"#
    )
}

/// Manifest entry for [`package_xml`].
pub struct Item<'a> {
    pub id: &'a str,
    pub href: &'a str,
    pub media_type: &'a str,
    pub properties: Option<&'a str>,
}

pub fn item<'a>(id: &'a str, href: &'a str) -> Item<'a> {
    let media_type = if href.ends_with(".ncx") {
        "application/x-dtbncx+xml"
    } else if href.ends_with(".png") {
        "image/png"
    } else {
        "application/xhtml+xml"
    };
    Item {
        id,
        href,
        media_type,
        properties: None,
    }
}

pub fn nav_item<'a>(id: &'a str, href: &'a str) -> Item<'a> {
    Item {
        properties: Some("nav"),
        ..item(id, href)
    }
}

pub fn package_xml(version: &str, items: &[Item<'_>], spine: &[&str], toc: Option<&str>) -> String {
    let manifest: String = items
        .iter()
        .map(|i| {
            let props = i
                .properties
                .map(|p| format!(r#" properties="{p}""#))
                .unwrap_or_default();
            format!(
                r#"    <item id="{}" href="{}" media-type="{}"{props}/>
"#,
                i.id, i.href, i.media_type
            )
        })
        .collect();
    let refs: String = spine
        .iter()
        .map(|id| format!("    <itemref idref=\"{id}\"/>\n"))
        .collect();
    let toc = toc.map(|t| format!(r#" toc="{t}""#)).unwrap_or_default();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="{version}" unique-identifier="uid">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Fixture Book</dc:title>
    <dc:creator>A. Writer</dc:creator>
    <dc:publisher>Fixture Press</dc:publisher>
  </metadata>
  <manifest>
{manifest}  </manifest>
  <spine{toc}>
{refs}  </spine>
</package>"#
    )
}

/// Flat NCX with one navPoint per `(label, src)`.
pub fn ncx_xml(points: &[(&str, &str)]) -> String {
    let body: String = points
        .iter()
        .enumerate()
        .map(|(i, (label, src))| {
            format!(
                r#"    <navPoint id="np{n}" playOrder="{n}"><navLabel><text>{label}</text></navLabel><content src="{src}"/></navPoint>
"#,
                n = i + 1
            )
        })
        .collect();
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
{body}  </navMap>
</ncx>"#
    )
}

/// Navigation document with a flat `<ol>` of `(label, href)` links.
pub fn nav_xhtml(links: &[(&str, &str)]) -> String {
    let items: String = links
        .iter()
        .map(|(label, href)| format!("      <li><a href=\"{href}\">{label}</a></li>\n"))
        .collect();
    xhtml(
        "Contents",
        &format!("  <nav epub:type=\"toc\">\n    <ol>\n{items}    </ol>\n  </nav>"),
    )
}

pub fn xhtml(title: &str, body: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<html xmlns="http://www.w3.org/1999/xhtml" xmlns:epub="http://www.idpf.org/2007/ops">
<head><title>{title}</title></head>
<body>
{body}
</body>
</html>"#
    )
}
