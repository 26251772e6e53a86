//! Archive accessor: the container's file table, loaded once and read-only
//! afterwards, plus per-parse file handles with memoized DOM and markdown.

use std::borrow::Cow;
use std::cell::OnceCell;
use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Read};

use scraper::Html;

use crate::error::{EpubError, Result};
use crate::markdown::html_to_markdown;
use crate::paths::percent_decode;
use crate::security::{check_entry_count, check_entry_name, EntryBudget, SecurityLimits};

#[derive(Debug, Clone, Default)]
pub struct Archive {
    entries: BTreeMap<String, Vec<u8>>,
}

impl Archive {
    /// Decompress every file entry of a ZIP container into memory.
    pub fn from_bytes(bytes: &[u8], limits: &SecurityLimits) -> Result<Self> {
        let mut zip = zip::ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| EpubError::Archive(format!("Invalid ZIP archive: {e}")))?;

        check_entry_count(zip.len() as u64, limits)?;
        let mut budget = EntryBudget::new(limits);
        let mut entries = BTreeMap::new();

        for index in 0..zip.len() {
            let mut file = zip
                .by_index(index)
                .map_err(|e| EpubError::Archive(format!("Unreadable entry #{index}: {e}")))?;
            if file.is_dir() {
                continue;
            }

            let name = file.name().to_string();
            if let Err(e) = check_entry_name(&name) {
                tracing::warn!("Skipping archive entry: {}", e);
                continue;
            }
            budget.admit(&name, file.compressed_size(), file.size())?;

            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)
                .map_err(|e| EpubError::Archive(format!("Failed to read {name}: {e}")))?;
            entries.insert(name, data);
        }

        tracing::debug!(
            entries = entries.len(),
            bytes = budget.total_bytes(),
            "Loaded archive"
        );
        Ok(Self { entries })
    }

    /// Build an archive from already-extracted entries.
    pub fn from_entries<I, P, B>(entries: I) -> Self
    where
        I: IntoIterator<Item = (P, B)>,
        P: Into<String>,
        B: Into<Vec<u8>>,
    {
        Self {
            entries: entries
                .into_iter()
                .map(|(p, b)| (p.into(), b.into()))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    /// Find the stored key for `path`, trying it verbatim and then
    /// percent-decoded.
    fn key_for(&self, path: &str) -> Option<&str> {
        if let Some((key, _)) = self.entries.get_key_value(path) {
            return Some(key);
        }
        let decoded = percent_decode(path);
        self.entries
            .get_key_value(decoded.as_ref())
            .map(|(key, _)| key.as_str())
    }

    pub fn contains(&self, path: &str) -> bool {
        self.key_for(path).is_some()
    }

    pub fn bytes(&self, path: &str) -> Result<&[u8]> {
        self.key_for(path)
            .and_then(|key| self.entries.get(key))
            .map(Vec::as_slice)
            .ok_or_else(|| EpubError::NotFound(path.to_string()))
    }

    /// Entry contents as text. A UTF-8 BOM is dropped; invalid sequences are
    /// replaced rather than rejected.
    pub fn text(&self, path: &str) -> Result<Cow<'_, str>> {
        let bytes = self.bytes(path)?;
        let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
        let text = String::from_utf8_lossy(bytes);
        if let Cow::Owned(_) = text {
            tracing::warn!("{} is not valid UTF-8, replacing invalid sequences", path);
        }
        Ok(text)
    }

    pub fn file(&self, path: &str) -> Result<FileHandle<'_>> {
        Ok(FileHandle::new(path, self.text(path)?))
    }
}

/// One archive document opened for segmentation. The parsed DOM and the
/// markdown rendering are computed at most once.
pub struct FileHandle<'a> {
    path: String,
    text: Cow<'a, str>,
    dom: OnceCell<Html>,
    markdown: OnceCell<String>,
}

impl<'a> FileHandle<'a> {
    pub fn new(path: impl Into<String>, text: Cow<'a, str>) -> Self {
        Self {
            path: path.into(),
            text,
            dom: OnceCell::new(),
            markdown: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn dom(&self) -> &Html {
        self.dom.get_or_init(|| Html::parse_document(&self.text))
    }

    pub fn markdown(&self) -> &str {
        self.markdown.get_or_init(|| html_to_markdown(&self.text))
    }
}

impl std::fmt::Debug for FileHandle<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileHandle")
            .field("path", &self.path)
            .field("len", &self.text.len())
            .field("dom_parsed", &self.dom.get().is_some())
            .finish()
    }
}

/// Handles opened during one parse, keyed by archive path. Misses are
/// remembered too, so a missing file is reported once.
pub struct OpenFiles<'a> {
    archive: &'a Archive,
    handles: HashMap<String, Option<FileHandle<'a>>>,
}

impl<'a> OpenFiles<'a> {
    pub fn new(archive: &'a Archive) -> Self {
        Self {
            archive,
            handles: HashMap::new(),
        }
    }

    pub fn get(&mut self, path: &str) -> Option<&FileHandle<'a>> {
        let archive = self.archive;
        self.handles
            .entry(path.to_string())
            .or_insert_with(|| match archive.file(path) {
                Ok(handle) => Some(handle),
                Err(e) => {
                    tracing::warn!("Leaving content empty: {}", e);
                    None
                }
            })
            .as_ref()
    }
}
