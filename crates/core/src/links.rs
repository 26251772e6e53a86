//! Cross-references between navigation targets, manifest items and in-document
//! anchors.

use crate::package::ManifestItem;
use crate::paths::percent_decode;

/// An href split at its first `#`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LinkParts<'a> {
    pub name: &'a str,
    pub hash: &'a str,
}

pub fn parse_link(href: &str) -> LinkParts<'_> {
    match href.split_once('#') {
        Some((name, hash)) => LinkParts { name, hash },
        None => LinkParts {
            name: href,
            hash: "",
        },
    }
}

/// Final path segment of an href, fragment and query excluded.
pub fn file_name(href: &str) -> &str {
    let path = parse_link(href).name;
    let path = path.split_once('?').map_or(path, |(p, _)| p);
    path.rsplit('/').next().unwrap_or(path)
}

/// Manifest id of the item whose href has the same file name as `href`.
/// Directories are ignored; the first match in manifest order wins.
pub fn resolve_section_id<'m>(href: &str, manifest: &'m [ManifestItem]) -> Option<&'m str> {
    let target = percent_decode(file_name(href));
    if target.is_empty() {
        return None;
    }
    manifest
        .iter()
        .find(|item| percent_decode(file_name(&item.href)) == target)
        .map(|item| item.id.as_str())
}

/// Anything without an http(s) scheme stays inside the container.
pub fn is_internal(uri: &str) -> bool {
    !uri.contains("http://") && !uri.contains("https://")
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn item(id: &str, href: &str) -> ManifestItem {
        ManifestItem {
            id: id.into(),
            href: href.into(),
            media_type: "application/xhtml+xml".into(),
            properties: None,
        }
    }

    #[test]
    fn parse_link_splits_fragment() {
        assert_eq!(
            parse_link("chap1.xhtml#s2"),
            LinkParts { name: "chap1.xhtml", hash: "s2" }
        );
        assert_eq!(
            parse_link("chap1.xhtml"),
            LinkParts { name: "chap1.xhtml", hash: "" }
        );
        assert_eq!(parse_link("#note"), LinkParts { name: "", hash: "note" });
    }

    #[test]
    fn file_name_ignores_directories() {
        assert_eq!(file_name("Text/chap1.xhtml#s2"), "chap1.xhtml");
        assert_eq!(file_name("../Text/chap1.xhtml?x=1"), "chap1.xhtml");
        assert_eq!(file_name("chap1.xhtml"), "chap1.xhtml");
    }

    #[test]
    fn section_id_matches_by_file_name() {
        let manifest = vec![
            item("ncx", "toc.ncx"),
            item("c1", "Text/chap1.xhtml"),
            item("c2", "Text/chap2.xhtml"),
        ];
        assert_eq!(resolve_section_id("chap2.xhtml#x", &manifest), Some("c2"));
        assert_eq!(resolve_section_id("../Text/chap1.xhtml", &manifest), Some("c1"));
        assert_eq!(resolve_section_id("missing.xhtml", &manifest), None);
        assert_eq!(resolve_section_id("#only-hash", &manifest), None);
    }

    #[test]
    fn section_id_ties_break_in_manifest_order() {
        let manifest = vec![item("first", "a/index.xhtml"), item("second", "b/index.xhtml")];
        assert_eq!(resolve_section_id("b/index.xhtml", &manifest), Some("first"));
    }

    #[test]
    fn section_id_compares_decoded_names() {
        let manifest = vec![item("c1", "Text/Chapter%201.xhtml")];
        assert_eq!(resolve_section_id("Chapter 1.xhtml", &manifest), Some("c1"));
    }

    #[test]
    fn internal_uris() {
        assert!(is_internal("../Images/a.png"));
        assert!(!is_internal("https://example.com/a.png"));
        assert!(!is_internal("http://example.com"));
    }

    proptest! {
        #[test]
        fn parse_link_reassembles(name in "[a-z/._]{0,16}", hash in "[a-z0-9_-]{0,8}") {
            let href = if hash.is_empty() { name.clone() } else { format!("{name}#{hash}") };
            let parts = parse_link(&href);
            prop_assert_eq!(parts.name, name.as_str());
            prop_assert_eq!(parts.hash, hash.as_str());
        }
    }
}
