//! CLI integration tests over a small generated book.

#![allow(deprecated)] // Command::cargo_bin deprecated for custom build-dir; still works for default

use assert_cmd::Command;
use pretty_assertions::assert_eq;
use std::io::Write;
use std::path::{Path, PathBuf};

const OPF: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<package xmlns="http://www.idpf.org/2007/opf" version="2.0">
  <metadata xmlns:dc="http://purl.org/dc/elements/1.1/">
    <dc:title>Two Chapters</dc:title>
    <dc:creator>Jo Example</dc:creator>
  </metadata>
  <manifest>
    <item id="ncx" href="toc.ncx" media-type="application/x-dtbncx+xml"/>
    <item id="c1" href="c1.xhtml" media-type="application/xhtml+xml"/>
    <item id="c2" href="c2.xhtml" media-type="application/xhtml+xml"/>
  </manifest>
  <spine toc="ncx">
    <itemref idref="c1"/>
    <itemref idref="c2"/>
  </spine>
</package>"#;

const NCX: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<ncx xmlns="http://www.daisy.org/z3986/2005/ncx/" version="2005-1">
  <navMap>
    <navPoint id="p1" playOrder="1"><navLabel><text>Opening</text></navLabel><content src="c1.xhtml"/></navPoint>
    <navPoint id="p2" playOrder="2"><navLabel><text>Closing</text></navLabel><content src="c2.xhtml"/></navPoint>
  </navMap>
</ncx>"#;

fn chapter(text: &str) -> String {
    format!("<html><head><title>t</title></head><body><p>{text}</p></body></html>")
}

fn write_book(dir: &Path) -> PathBuf {
    let path = dir.join("book.epub");
    let file = std::fs::File::create(&path).unwrap();
    let mut zip = zip::ZipWriter::new(file);
    let opts: zip::write::FileOptions<'_, ()> =
        zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
    let entries = [
        ("mimetype", "application/epub+zip".to_string()),
        (
            "META-INF/container.xml",
            r#"<container><rootfiles><rootfile full-path="OEBPS/content.opf"/></rootfiles></container>"#
                .to_string(),
        ),
        ("OEBPS/content.opf", OPF.to_string()),
        ("OEBPS/toc.ncx", NCX.to_string()),
        ("OEBPS/c1.xhtml", chapter("It was a dark night.")),
        ("OEBPS/c2.xhtml", chapter("The end.")),
    ];
    for (name, content) in entries {
        zip.start_file(name, opts).unwrap();
        zip.write_all(content.as_bytes()).unwrap();
    }
    zip.finish().unwrap();
    path
}

fn cli(config_home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("epub-parser").unwrap();
    cmd.env("XDG_CONFIG_HOME", config_home).env("HOME", config_home);
    cmd
}

fn stdout_of(cmd: &mut Command) -> String {
    let out = cmd.assert().success();
    String::from_utf8(out.get_output().stdout.clone()).unwrap()
}

#[test]
fn help_prints_and_exits_success() {
    Command::cargo_bin("epub-parser")
        .unwrap()
        .arg("--help")
        .assert()
        .success();
}

#[test]
fn info_prints_metadata() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).arg("info").arg(&book));
    assert!(stdout.contains("Title: Two Chapters"));
    assert!(stdout.contains("Author: Jo Example"));
    assert!(stdout.contains("Sections: 2"));
    assert!(stdout.contains("TOC entries: 2"));
}

#[test]
fn info_json_is_valid() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).args(["info", "--json"]).arg(&book));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["info"]["title"], "Two Chapters");
    assert_eq!(v["version"], 2);
}

#[test]
fn toc_prints_tree() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).arg("toc").arg(&book));
    assert_eq!(stdout, "1. Opening [c1]\n2. Closing [c2]\n");
}

#[test]
fn show_prints_entry_markdown() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).arg("show").arg(&book).arg("1"));
    assert!(stdout.contains("It was a dark night."));
    assert!(!stdout.contains("The end."));
}

#[test]
fn show_unknown_entry_fails() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let out = cli(dir.path()).arg("show").arg(&book).arg("9").assert().failure();
    let stderr = String::from_utf8_lossy(&out.get_output().stderr).into_owned();
    assert!(stderr.contains("No TOC entry with play order 9"));
}

#[test]
fn sections_lists_spine() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).arg("sections").arg(&book));
    let ids: Vec<_> = stdout.lines().map(|l| l.split('\t').next().unwrap()).collect();
    assert_eq!(ids, vec!["c1", "c2"]);
}

#[test]
fn dump_serializes_book() {
    let dir = tempfile::tempdir().unwrap();
    let book = write_book(dir.path());
    let stdout = stdout_of(cli(dir.path()).args(["dump", "--expand"]).arg(&book));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["structure"][0]["name"], "Opening");
    assert_eq!(v["sections"][1]["markdown"], "The end.");
    assert_eq!(v["sections"][0]["htmlNodes"][0]["tag"], "p");
}

#[test]
fn missing_input_fails() {
    let dir = tempfile::tempdir().unwrap();
    let out = cli(dir.path())
        .args(["info", "/nonexistent/file.epub"])
        .assert()
        .failure();
    let stderr = String::from_utf8_lossy(&out.get_output().stderr).into_owned();
    assert!(stderr.contains("Input file not found"));
}

#[test]
fn config_init_set_show() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path()).args(["config", "init"]).assert().success();
    cli(dir.path())
        .args(["config", "set", "parse.expand", "true"])
        .assert()
        .success();

    let stdout = stdout_of(cli(dir.path()).args(["config", "show", "--json"]));
    let v: serde_json::Value = serde_json::from_str(&stdout).unwrap();
    assert_eq!(v["parse"]["expand"], true);
    assert_eq!(v["parse"]["inline_images"], true);
}

#[test]
fn config_set_rejects_unknown_key() {
    let dir = tempfile::tempdir().unwrap();
    cli(dir.path())
        .args(["config", "set", "parse.colour", "blue"])
        .assert()
        .failure();
}
