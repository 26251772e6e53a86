//! Content segmentation: fill each navigation node with the slice of book
//! content it stands for.
//!
//! Runs as two pure passes over the tree. `resolve_file_paths` records every
//! node's archive path; `segment` then picks a strategy:
//!
//! * a single node takes its whole file;
//! * when every node points into one file, each anchored node takes the run of
//!   sibling elements from its anchor up to (not including) the next node's
//!   anchor;
//! * otherwise each node takes the spine documents from its own section up to
//!   (not including) the next sibling's section, which also picks up spine
//!   documents that no navigation entry references.

use crate::archive::{Archive, OpenFiles};
use crate::html::{find_by_id, sibling_run};
use crate::markdown::{html_to_markdown, join_markdown};
use crate::package::PackageInfo;
use crate::paths;
use crate::toc::{flatten, TocNode};

/// How node content is carved out of the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    SingleNode,
    SameFile,
    PerFile,
}

impl Strategy {
    pub fn choose(nodes: &[TocNode]) -> Self {
        let flat = flatten(nodes);
        if flat.len() == 1 {
            return Strategy::SingleNode;
        }
        let first = flat.first().and_then(|n| n.file_path.as_deref());
        if flat.iter().all(|n| n.file_path.as_deref() == first) {
            Strategy::SameFile
        } else {
            Strategy::PerFile
        }
    }
}

/// Copy of the tree with `file_path` set on every node: the node's path
/// without its fragment, resolved against `root`.
pub fn resolve_file_paths(nodes: &[TocNode], root: &str) -> Vec<TocNode> {
    nodes
        .iter()
        .map(|node| TocNode {
            file_path: Some(paths::resolve(paths::strip_fragment(&node.path), root)),
            children: resolve_file_paths(&node.children, root),
            ..node.clone()
        })
        .collect()
}

pub struct Segmenter<'a> {
    package: &'a PackageInfo,
    root: &'a str,
    files: OpenFiles<'a>,
}

impl<'a> Segmenter<'a> {
    pub fn new(archive: &'a Archive, package: &'a PackageInfo, root: &'a str) -> Self {
        Self {
            package,
            root,
            files: OpenFiles::new(archive),
        }
    }

    /// Resolve paths and fill `content`/`markdown_content` across the tree.
    pub fn segment(mut self, nodes: &[TocNode]) -> Vec<TocNode> {
        let resolved = resolve_file_paths(nodes, self.root);
        let strategy = Strategy::choose(&resolved);
        tracing::debug!(?strategy, nodes = flatten(&resolved).len(), "Segmenting content");

        match strategy {
            Strategy::SingleNode => resolved
                .into_iter()
                .map(|mut node| {
                    if let Some((html, markdown)) = self.whole_file(&node) {
                        node.content = Some(html);
                        node.markdown_content = Some(markdown);
                    }
                    node
                })
                .collect(),
            Strategy::SameFile => self.same_file(&resolved, None),
            Strategy::PerFile => self.per_file(&resolved),
        }
    }

    fn whole_file(&mut self, node: &TocNode) -> Option<(String, String)> {
        let path = node.file_path.as_deref()?;
        let file = self.files.get(path)?;
        Some((file.text().to_string(), file.markdown().to_string()))
    }

    /// `fallback` is the parent's next sibling; it bounds the last
    /// sibling of this level.
    fn same_file(&mut self, nodes: &[TocNode], fallback: Option<&TocNode>) -> Vec<TocNode> {
        let mut out = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let boundary = next_boundary(node, nodes.get(index + 1), fallback);
            let mut filled = TocNode {
                children: Vec::new(),
                ..node.clone()
            };

            if let Some(node_id) = node.node_id.as_deref() {
                filled.next_node_id = boundary.and_then(|b| b.node_id.clone());
                if let Some(html) = self.slice(node, node_id, filled.next_node_id.as_deref()) {
                    filled.markdown_content = Some(html_to_markdown(&html));
                    filled.content = Some(html);
                }
            }

            filled.children = self.same_file(&node.children, nodes.get(index + 1));
            out.push(filled);
        }
        out
    }

    fn slice(&mut self, node: &TocNode, node_id: &str, stop_id: Option<&str>) -> Option<String> {
        let path = node.file_path.as_deref()?;
        let file = self.files.get(path)?;
        match find_by_id(file.dom(), node_id) {
            Some(start) => Some(sibling_run(start, stop_id)),
            None => {
                tracing::warn!("Anchor '{}' not found in {}", node_id, path);
                None
            }
        }
    }

    fn per_file(&mut self, nodes: &[TocNode]) -> Vec<TocNode> {
        let mut out = Vec::with_capacity(nodes.len());
        for (index, node) in nodes.iter().enumerate() {
            let mut filled = TocNode {
                children: Vec::new(),
                ..node.clone()
            };

            let merged = self
                .spine_span(node, nodes.get(index + 1))
                .and_then(|ids| self.merge_sections(&ids));
            if let Some((html, markdown)) = merged.or_else(|| self.whole_file(node)) {
                filled.content = Some(html);
                filled.markdown_content = Some(markdown);
            }

            filled.children = self.per_file(&node.children);
            out.push(filled);
        }
        out
    }

    /// Spine ids from `node`'s section up to, not including, `next`'s.
    fn spine_span(&self, node: &TocNode, next: Option<&TocNode>) -> Option<Vec<String>> {
        let start = self.package.spine_position(node.section_id.as_deref()?)?;
        let end = self.package.spine_position(next?.section_id.as_deref()?)?;
        (start < end).then(|| self.package.spine[start..end].to_vec())
    }

    fn merge_sections(&mut self, ids: &[String]) -> Option<(String, String)> {
        let mut html = String::new();
        let mut markdown = Vec::with_capacity(ids.len());
        for id in ids {
            let Some(item) = self.package.item(id) else {
                tracing::warn!("Spine item '{}' is not in the manifest", id);
                continue;
            };
            let path = paths::resolve(&item.href, self.root);
            if let Some(file) = self.files.get(&path) {
                html.push_str(file.text());
                markdown.push(file.markdown().to_string());
            }
        }
        if markdown.is_empty() {
            return None;
        }
        Some((html, join_markdown(markdown.iter().map(String::as_str))))
    }
}

/// The node whose anchor ends `node`'s slice: the next sibling when it is
/// anchored in the same file, else the parent's next sibling under the same
/// condition.
fn next_boundary<'n>(
    node: &TocNode,
    next: Option<&'n TocNode>,
    fallback: Option<&'n TocNode>,
) -> Option<&'n TocNode> {
    let bounds = |candidate: &&TocNode| {
        candidate.node_id.is_some() && candidate.file_path == node.file_path
    };
    next.filter(bounds).or_else(|| fallback.filter(bounds))
}
