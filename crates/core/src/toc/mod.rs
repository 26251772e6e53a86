//! Table of contents: locating the navigation document, decoding either
//! format into records, and building the `TocNode` tree.
//!
//! Candidates are tried in order: the EPUB3 navigation document (package
//! version 3+ only, failures fall through), then the legacy NCX declared on
//! the spine, or the `nav`-flagged item when no NCX is declared.

pub mod nav;
pub mod ncx;

use serde::{Deserialize, Serialize};

use crate::archive::Archive;
use crate::error::Result;
use crate::links::{parse_link, resolve_section_id};
use crate::package::{ManifestItem, PackageInfo};
use crate::paths;

/// One entry of the navigation tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TocNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub section_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_node_id: Option<String>,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub play_order: Option<u32>,
    #[serde(default)]
    pub children: Vec<TocNode>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown_content: Option<String>,
}

impl TocNode {
    /// Pre-order traversal of this node and its descendants.
    pub fn flatten(&self) -> Vec<&TocNode> {
        let mut out = Vec::new();
        self.collect_into(&mut out);
        out
    }

    fn collect_into<'a>(&'a self, out: &mut Vec<&'a TocNode>) {
        out.push(self);
        for child in &self.children {
            child.collect_into(out);
        }
    }

    /// Number of nodes in this subtree, including itself.
    pub fn count(&self) -> usize {
        1 + self.children.iter().map(TocNode::count).sum::<usize>()
    }
}

/// Pre-order traversal over a list of root nodes.
pub fn flatten(nodes: &[TocNode]) -> Vec<&TocNode> {
    nodes.iter().flat_map(TocNode::flatten).collect()
}

/// Format-independent navigation entry, as decoded from either document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NavRecord {
    pub label: String,
    pub href: String,
    pub play_order: Option<u32>,
    pub children: Vec<NavRecord>,
}

/// Turn decoded records into nodes. Records without an href are dropped and
/// their children hoisted into the parent list. Nodes without a declared play
/// order get their 1-based pre-order position.
pub fn build_nodes(records: &[NavRecord], manifest: &[ManifestItem]) -> Vec<TocNode> {
    let mut position = 0;
    build_level(records, manifest, &mut position)
}

fn build_level(
    records: &[NavRecord],
    manifest: &[ManifestItem],
    position: &mut u32,
) -> Vec<TocNode> {
    let mut nodes = Vec::with_capacity(records.len());
    for record in records {
        if record.href.is_empty() {
            tracing::warn!("Navigation entry '{}' has no target, hoisting children", record.label);
            nodes.extend(build_level(&record.children, manifest, position));
            continue;
        }

        *position += 1;
        let play_order = record.play_order.unwrap_or(*position);
        let hash = parse_link(&record.href).hash;
        nodes.push(TocNode {
            name: record.label.clone(),
            section_id: resolve_section_id(&record.href, manifest).map(str::to_string),
            node_id: (!hash.is_empty()).then(|| hash.to_string()),
            path: record.href.clone(),
            play_order: Some(play_order),
            children: build_level(&record.children, manifest, position),
            ..TocNode::default()
        });
    }
    nodes
}

/// Navigation document formats, recognised by their root element.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TocFormat {
    /// NCX `<ncx><navMap>` tree.
    Legacy,
    /// XHTML `<nav>` with nested `<ol>` lists.
    Modern,
}

impl TocFormat {
    pub fn sniff(text: &str) -> Self {
        match ncx::root_element(text).as_deref() {
            Some("ncx") => TocFormat::Legacy,
            _ => TocFormat::Modern,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Candidate {
    /// `nav`-flagged manifest item, parsed as a navigation document.
    NavDocument,
    /// `<spine toc>` item, or the `nav`-flagged item when none is declared;
    /// the format is taken from the document itself.
    DeclaredToc,
}

impl Candidate {
    fn recoverable(self) -> bool {
        matches!(self, Candidate::NavDocument)
    }
}

/// Everything a candidate needs to find and decode its document.
pub struct TocContext<'a> {
    pub archive: &'a Archive,
    pub package: &'a PackageInfo,
    pub root: &'a str,
}

impl TocContext<'_> {
    fn candidates(&self) -> Vec<Candidate> {
        let mut candidates = Vec::with_capacity(2);
        if self.package.version.map_or(false, |v| v >= 3) {
            candidates.push(Candidate::NavDocument);
        }
        candidates.push(Candidate::DeclaredToc);
        candidates
    }

    /// Locate and build the navigation tree. `Ok(None)` means the book has no
    /// usable table of contents.
    pub fn build(&self) -> Result<Option<Vec<TocNode>>> {
        for candidate in self.candidates() {
            match self.try_candidate(candidate) {
                Ok(Some(nodes)) if !nodes.is_empty() => {
                    tracing::debug!(?candidate, nodes = nodes.len(), "Built table of contents");
                    return Ok(Some(nodes));
                }
                Ok(_) => tracing::debug!(?candidate, "No table of contents from candidate"),
                Err(e) if candidate.recoverable() => {
                    tracing::warn!("Navigation document unusable, falling back: {}", e);
                }
                Err(e) => return Err(e),
            }
        }
        Ok(None)
    }

    fn try_candidate(&self, candidate: Candidate) -> Result<Option<Vec<TocNode>>> {
        let (href, forced) = match candidate {
            Candidate::NavDocument => match self.package.nav_item() {
                Some(item) => (item.href.as_str(), Some(TocFormat::Modern)),
                None => return Ok(None),
            },
            Candidate::DeclaredToc => match &self.package.toc_id {
                Some(id) => match self.package.item(id) {
                    Some(item) => (item.href.as_str(), None),
                    None => {
                        tracing::warn!("Spine toc '{}' is not in the manifest", id);
                        return Ok(None);
                    }
                },
                None => match self.package.nav_item() {
                    Some(item) => (item.href.as_str(), None),
                    None => return Ok(None),
                },
            },
        };

        let path = paths::resolve(href, self.root);
        let text = self.archive.text(&path)?;
        let format = forced.unwrap_or_else(|| TocFormat::sniff(&text));
        let records = match format {
            TocFormat::Legacy => ncx::decode(&text, &path)?,
            TocFormat::Modern => match nav::decode(&text) {
                Some(records) => records,
                None => return Ok(None),
            },
        };
        Ok(Some(build_nodes(&records, &self.package.manifest)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn record(label: &str, href: &str, children: Vec<NavRecord>) -> NavRecord {
        NavRecord {
            label: label.into(),
            href: href.into(),
            play_order: None,
            children,
        }
    }

    fn manifest() -> Vec<ManifestItem> {
        ["ch1", "ch2"]
            .iter()
            .map(|id| ManifestItem {
                id: id.to_string(),
                href: format!("Text/{id}.xhtml"),
                media_type: "application/xhtml+xml".into(),
                properties: None,
            })
            .collect()
    }

    #[test]
    fn builds_nodes_with_cross_references() {
        let records = vec![record(
            "One",
            "Text/ch1.xhtml#start",
            vec![record("Two", "Text/ch2.xhtml", vec![])],
        )];
        let nodes = build_nodes(&records, &manifest());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].section_id.as_deref(), Some("ch1"));
        assert_eq!(nodes[0].node_id.as_deref(), Some("start"));
        assert_eq!(nodes[0].children[0].section_id.as_deref(), Some("ch2"));
        assert_eq!(nodes[0].children[0].node_id, None);
    }

    #[test]
    fn play_order_is_global_pre_order() {
        let records = vec![
            record(
                "a",
                "ch1.xhtml",
                vec![
                    record("a1", "ch1.xhtml#1", vec![record("a1x", "ch1.xhtml#x", vec![])]),
                    record("a2", "ch1.xhtml#2", vec![]),
                ],
            ),
            record("b", "ch2.xhtml", vec![]),
        ];
        let nodes = build_nodes(&records, &manifest());
        let orders: Vec<_> = flatten(&nodes).iter().map(|n| n.play_order.unwrap()).collect();
        assert_eq!(orders, vec![1, 2, 3, 4, 5]);
    }

    #[test]
    fn declared_play_order_is_kept() {
        let mut declared = record("a", "ch1.xhtml", vec![]);
        declared.play_order = Some(7);
        let nodes = build_nodes(&[declared, record("b", "ch2.xhtml", vec![])], &manifest());
        assert_eq!(nodes[0].play_order, Some(7));
        assert_eq!(nodes[1].play_order, Some(2));
    }

    #[test]
    fn entries_without_target_hoist_children() {
        let records = vec![record(
            "Part I",
            "",
            vec![record("Chapter", "ch1.xhtml", vec![])],
        )];
        let nodes = build_nodes(&records, &manifest());
        assert_eq!(nodes.len(), 1);
        assert_eq!(nodes[0].name, "Chapter");
        assert!(flatten(&nodes).iter().all(|n| !n.path.is_empty()));
    }

    #[test]
    fn node_serialization_round_trips() {
        let nodes = build_nodes(
            &[record("a", "Text/ch1.xhtml#s", vec![record("b", "Text/ch2.xhtml", vec![])])],
            &manifest(),
        );
        let json = serde_json::to_value(&nodes).unwrap();
        assert_eq!(json[0]["sectionId"], "ch1");
        assert_eq!(json[0]["playOrder"], 1);
        assert!(json[0]["children"][0].get("nodeId").is_none());
        let back: Vec<TocNode> = serde_json::from_value(json).unwrap();
        assert_eq!(back, nodes);
    }

    #[test]
    fn counts_and_flattens() {
        let nodes = build_nodes(
            &[record("a", "ch1.xhtml", vec![record("b", "ch2.xhtml", vec![])])],
            &manifest(),
        );
        assert_eq!(nodes[0].count(), 2);
        let names: Vec<_> = nodes[0].flatten().iter().map(|n| n.name.as_str()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn sniffs_document_format() {
        assert_eq!(TocFormat::sniff("<?xml version=\"1.0\"?><ncx><navMap/></ncx>"), TocFormat::Legacy);
        assert_eq!(TocFormat::sniff("<html><body><nav/></body></html>"), TocFormat::Modern);
    }
}
