/// Top-level error type. All public API functions return this.
#[derive(Debug, thiserror::Error)]
pub enum EpubError {
    #[error("{0} not found")]
    NotFound(String),

    #[error("Failed to parse {path}: {detail}")]
    Parse { path: String, detail: String },

    #[error("Invalid archive: {0}")]
    Archive(String),

    #[error("Security violation: {0}")]
    Security(#[from] SecurityError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl EpubError {
    pub(crate) fn parse(path: &str, detail: impl std::fmt::Display) -> Self {
        EpubError::Parse {
            path: path.to_string(),
            detail: detail.to_string(),
        }
    }

    /// True for lookups that missed the archive's file table.
    pub fn is_not_found(&self) -> bool {
        matches!(self, EpubError::NotFound(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SecurityError {
    #[error("ZIP bomb detected: decompression ratio {ratio}:1 exceeds limit {limit}:1")]
    ZipBomb { ratio: u64, limit: u64 },

    #[error("Path traversal detected in archive entry: {path}")]
    PathTraversal { path: String },

    #[error("Archive contains {count} files, exceeding limit of {limit}")]
    TooManyFiles { count: u64, limit: u64 },

    #[error("Resource {name} is {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedResource {
        name: String,
        size_mb: u64,
        limit_mb: u64,
    },

    #[error("Archive expands to {size_mb}MB, exceeding limit of {limit_mb}MB")]
    OversizedArchive { size_mb: u64, limit_mb: u64 },

    #[error("HTML nesting depth {depth} exceeds limit of {limit}")]
    ExcessiveNesting { depth: u32, limit: u32 },
}

pub type Result<T, E = EpubError> = std::result::Result<T, E>;
