//! Archive hardening: entry-count, size and compression-ratio budgets, entry
//! name sanitising, and the nesting bound used by HTML node expansion.

use serde::{Deserialize, Serialize};
use std::path::{Component, Path};

use crate::error::SecurityError;

const MB: u64 = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityLimits {
    /// Maximum decompression ratio before flagging as ZIP bomb.
    pub max_compression_ratio: u64,
    /// Maximum number of entries allowed in an archive.
    pub max_file_count: u64,
    /// Maximum size of a single entry in bytes.
    pub max_resource_size_bytes: u64,
    /// Maximum total decompressed size in bytes.
    pub max_total_size_bytes: u64,
    /// Maximum HTML nesting depth kept when expanding sections.
    pub max_nesting_depth: u32,
}

impl Default for SecurityLimits {
    fn default() -> Self {
        Self {
            max_compression_ratio: 100,
            max_file_count: 10_000,
            max_resource_size_bytes: 200 * MB,
            max_total_size_bytes: 1024 * MB,
            max_nesting_depth: 200,
        }
    }
}

/// Reject entry names that would escape the archive root once joined onto a
/// directory: absolute paths, drive prefixes and `..` components.
pub fn check_entry_name(entry_path: &str) -> Result<(), SecurityError> {
    let traversal = || SecurityError::PathTraversal {
        path: entry_path.to_string(),
    };

    if entry_path.starts_with('/') || entry_path.starts_with('\\') {
        return Err(traversal());
    }
    if entry_path.len() >= 2 && entry_path.as_bytes()[1] == b':' {
        return Err(traversal());
    }
    if Path::new(entry_path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
        || entry_path.split('\\').any(|c| c == "..")
    {
        return Err(traversal());
    }

    Ok(())
}

pub fn check_entry_count(count: u64, limits: &SecurityLimits) -> Result<(), SecurityError> {
    if count > limits.max_file_count {
        return Err(SecurityError::TooManyFiles {
            count,
            limit: limits.max_file_count,
        });
    }
    Ok(())
}

pub fn check_nesting_depth(depth: u32, limits: &SecurityLimits) -> Result<(), SecurityError> {
    if depth > limits.max_nesting_depth {
        return Err(SecurityError::ExcessiveNesting {
            depth,
            limit: limits.max_nesting_depth,
        });
    }
    Ok(())
}

/// Running size budget for one archive load.
#[derive(Debug)]
pub struct EntryBudget<'a> {
    limits: &'a SecurityLimits,
    total_bytes: u64,
}

impl<'a> EntryBudget<'a> {
    pub fn new(limits: &'a SecurityLimits) -> Self {
        Self {
            limits,
            total_bytes: 0,
        }
    }

    /// Charge one entry against the budget using its declared sizes.
    pub fn admit(
        &mut self,
        name: &str,
        compressed_size: u64,
        uncompressed_size: u64,
    ) -> Result<(), SecurityError> {
        if uncompressed_size > self.limits.max_resource_size_bytes {
            return Err(SecurityError::OversizedResource {
                name: name.to_string(),
                size_mb: uncompressed_size / MB,
                limit_mb: self.limits.max_resource_size_bytes / MB,
            });
        }

        if compressed_size == 0 {
            if uncompressed_size > 0 {
                return Err(SecurityError::ZipBomb {
                    ratio: u64::MAX,
                    limit: self.limits.max_compression_ratio,
                });
            }
        } else {
            let ratio = uncompressed_size / compressed_size;
            if ratio > self.limits.max_compression_ratio {
                return Err(SecurityError::ZipBomb {
                    ratio,
                    limit: self.limits.max_compression_ratio,
                });
            }
        }

        self.total_bytes = self.total_bytes.saturating_add(uncompressed_size);
        if self.total_bytes > self.limits.max_total_size_bytes {
            return Err(SecurityError::OversizedArchive {
                size_mb: self.total_bytes / MB,
                limit_mb: self.limits.max_total_size_bytes / MB,
            });
        }
        Ok(())
    }

    pub fn total_bytes(&self) -> u64 {
        self.total_bytes
    }
}
