use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::message::{Compression, DEFAULT_COMPRESSION_THRESHOLD, MessageType};

/// Location of the per-folder config file, relative to the folder root.
pub const CONFIG_RELATIVE_PATH: &str = ".peersync/config.toml";

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProtocolConfig {
    #[serde(default)]
    pub compression: CompressionConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionConfig {
    #[serde(default)]
    pub mode: Compression,
    #[serde(default = "default_compression_threshold")]
    pub threshold: usize,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            mode: Compression::default(),
            threshold: default_compression_threshold(),
        }
    }
}

impl ProtocolConfig {
    /// Compression bit for an outgoing message under this config.
    #[must_use]
    pub const fn should_compress(&self, msg_type: MessageType, body_len: usize) -> bool {
        self.compression
            .mode
            .should_compress(msg_type, body_len, self.compression.threshold)
    }
}

#[must_use]
pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_RELATIVE_PATH)
}

/// Load `<root>/.peersync/config.toml`, falling back to defaults when the
/// file does not exist.
///
/// # Errors
///
/// Returns an error if the file exists but cannot be read or parsed.
pub fn load_config(root: &Path) -> Result<ProtocolConfig> {
    let path = config_path(root);
    if !path.exists() {
        tracing::debug!(path = %path.display(), "no config file, using defaults");
        return Ok(ProtocolConfig::default());
    }

    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    parse_config(&content).with_context(|| {
        format!(
            "{}: failed to parse {}",
            ErrorCode::ConfigParseError,
            path.display()
        )
    })
}

/// Parse config text.
///
/// # Errors
///
/// Returns an error if `content` is not valid config TOML.
pub fn parse_config(content: &str) -> Result<ProtocolConfig> {
    Ok(toml::from_str::<ProtocolConfig>(content)?)
}

const fn default_compression_threshold() -> usize {
    DEFAULT_COMPRESSION_THRESHOLD
}
