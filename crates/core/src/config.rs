//! Config file parsing for `~/.config/epub-parser/config.toml`.
//!
//! Use `parse_options_from_config` to turn the loaded config into
//! `ParseOptions` so expansion and security settings apply.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::epub::ParseOptions;
use crate::security::SecurityLimits;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub parse: ParseConfig,
    #[serde(default)]
    pub security: SecurityConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParseConfig {
    #[serde(default)]
    pub expand: bool,
    #[serde(default = "default_inline_images")]
    pub inline_images: bool,
}

fn default_inline_images() -> bool {
    true
}

impl Default for ParseConfig {
    fn default() -> Self {
        Self {
            expand: false,
            inline_images: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SecurityConfig {
    pub max_file_size_mb: Option<u64>,
    pub max_file_count: Option<u64>,
    pub max_compression_ratio: Option<u64>,
}

/// Load config from the default path, falling back to defaults when the file
/// is missing or invalid.
pub fn load_config() -> AppConfig {
    match config_path() {
        Some(path) => load_config_from(&path),
        None => AppConfig::default(),
    }
}

pub fn load_config_from(path: &Path) -> AppConfig {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(_) => return AppConfig::default(),
    };

    match toml::from_str::<AppConfig>(&content) {
        Ok(cfg) => cfg,
        Err(e) => {
            tracing::warn!("Ignoring invalid config {}: {}", path.display(), e);
            AppConfig::default()
        }
    }
}

/// Return the default config file path (for init and show).
pub fn config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|mut p| {
        p.push("epub-parser");
        p.push("config.toml");
        p
    })
}

/// Build security limits from config. Uses defaults for any unset values.
pub fn security_limits_from_config(c: &SecurityConfig) -> SecurityLimits {
    let mut limits = SecurityLimits::default();
    if let Some(mb) = c.max_file_size_mb {
        limits.max_total_size_bytes = mb.saturating_mul(1024).saturating_mul(1024);
    }
    if let Some(count) = c.max_file_count {
        limits.max_file_count = count;
    }
    if let Some(r) = c.max_compression_ratio {
        limits.max_compression_ratio = r;
    }
    limits
}

pub fn parse_options_from_config(cfg: &AppConfig) -> ParseOptions {
    ParseOptions {
        kind: None,
        expand: cfg.parse.expand,
        inline_images: cfg.parse.inline_images,
        security: security_limits_from_config(&cfg.security),
    }
}
