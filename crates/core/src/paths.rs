//! Archive path resolution relative to the package document.

use std::borrow::Cow;

/// Directory of the package document, with a trailing `/` and no leading
/// `/`. Empty when the package document sits at the archive root.
pub fn resolve_root(package_path: &str) -> String {
    let trimmed = package_path.trim_start_matches('/');
    match trimmed.rfind('/') {
        Some(i) => trimmed[..=i].to_string(),
        None => String::new(),
    }
}

/// Resolve an href to an archive path. A leading `/` means archive-root
/// relative; anything else is joined onto `root`. `.` and `..` segments are
/// collapsed.
pub fn resolve(path: &str, root: &str) -> String {
    match path.strip_prefix('/') {
        Some(absolute) => normalize(absolute),
        None => normalize(&format!("{root}{path}")),
    }
}

/// Directory part of an archive path including the trailing `/`.
pub fn parent_dir(path: &str) -> &str {
    match path.rfind('/') {
        Some(i) => &path[..=i],
        None => "",
    }
}

pub fn strip_fragment(href: &str) -> &str {
    href.split_once('#').map_or(href, |(path, _)| path)
}

pub fn percent_decode(path: &str) -> Cow<'_, str> {
    percent_encoding::percent_decode_str(path).decode_utf8_lossy()
}

fn normalize(path: &str) -> String {
    let dotted = path.split('/').any(|s| s == "." || s == "..");
    if !dotted && !path.contains("//") {
        return path.to_string();
    }
    let mut parts: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            s => parts.push(s),
        }
    }
    let mut out = parts.join("/");
    if path.ends_with('/') && !out.is_empty() {
        out.push('/');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn root_of_nested_package() {
        assert_eq!(resolve_root("OEBPS/content.opf"), "OEBPS/");
        assert_eq!(resolve_root("/OPS/book/package.opf"), "OPS/book/");
    }

    #[test]
    fn root_of_top_level_package() {
        assert_eq!(resolve_root("content.opf"), "");
    }

    #[test]
    fn relative_paths_join_root() {
        assert_eq!(resolve("Text/ch1.xhtml", "OEBPS/"), "OEBPS/Text/ch1.xhtml");
        assert_eq!(resolve("ch1.xhtml", ""), "ch1.xhtml");
    }

    #[test]
    fn absolute_paths_ignore_root() {
        assert_eq!(resolve("/META-INF/container.xml", "OEBPS/"), "META-INF/container.xml");
    }

    #[test]
    fn dot_segments_collapse() {
        assert_eq!(resolve("../Images/a.png", "OEBPS/Text/"), "OEBPS/Images/a.png");
        assert_eq!(resolve("./ch1.xhtml", "OEBPS/"), "OEBPS/ch1.xhtml");
    }

    #[test]
    fn fragment_and_parent_helpers() {
        assert_eq!(strip_fragment("ch1.xhtml#s2"), "ch1.xhtml");
        assert_eq!(strip_fragment("ch1.xhtml"), "ch1.xhtml");
        assert_eq!(parent_dir("OEBPS/Text/ch1.xhtml"), "OEBPS/Text/");
        assert_eq!(parent_dir("ch1.xhtml"), "");
    }

    #[test]
    fn decodes_percent_escapes() {
        assert_eq!(percent_decode("Chapter%201.xhtml"), "Chapter 1.xhtml");
        assert_eq!(percent_decode("plain.xhtml"), "plain.xhtml");
    }

    proptest! {
        #[test]
        fn resolution_is_idempotent(
            dirs in proptest::collection::vec("[a-zA-Z0-9_]{1,8}", 0..4),
            file in "[a-zA-Z0-9_]{1,8}\\.xhtml",
        ) {
            let root: String = dirs.iter().map(|d| format!("{d}/")).collect();
            let once = resolve(&file, &root);
            let twice = resolve(&format!("/{once}"), &root);
            prop_assert_eq!(&once, &twice);
            prop_assert!(!once.starts_with('/'));
        }
    }
}
