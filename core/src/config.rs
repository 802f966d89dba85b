//! Importer settings: parser limits and on-disk locations

use crate::{Error, FsCertStore, ParseOptions, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Current config version for migration support
pub const CONFIG_VERSION: u32 = 1;

/// Global configuration for the importer
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImporterConfig {
    pub version: u32,
    pub parser: ParserSection,
    pub paths: PathsSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParserSection {
    /// Longest accepted config line in bytes
    pub max_line_len: usize,
    /// Byte cap of the diagnostic raw text copy
    pub raw_text_cap: usize,
    /// Reject inline blocks left open at end of file
    pub strict_inline_blocks: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathsSection {
    /// Directory inline certificates are written to
    pub cert_dir: PathBuf,
    /// Optional diagnostic log file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        let options = ParseOptions::default();
        Self {
            version: CONFIG_VERSION,
            parser: ParserSection {
                max_line_len: options.max_line_len,
                raw_text_cap: options.raw_text_cap,
                strict_inline_blocks: options.strict_inline_blocks,
            },
            paths: PathsSection {
                cert_dir: FsCertStore::default_root(),
                log_file: None,
            },
        }
    }
}

impl ImporterConfig {
    /// Get the default config file path
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("~/.config"))
            .join("ovpn-import")
            .join("config.toml")
    }

    /// Load config from the default path, falling back to defaults
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path();
        if path.exists() {
            Self::load(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load config from a specific path
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        let config: Self = toml::from_str(&content)?;

        if config.version > CONFIG_VERSION {
            return Err(Error::config(format!(
                "Config version {} is newer than supported version {}",
                config.version, CONFIG_VERSION
            )));
        }

        config.validate()?;
        Ok(config)
    }

    /// Save config to a specific path
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        fs::write(path, content)?;
        Ok(())
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.parser.max_line_len < 64 {
            return Err(Error::validation("Maximum line length must be at least 64 bytes"));
        }
        if self.parser.raw_text_cap == 0 {
            return Err(Error::validation("Raw text cap must be greater than 0"));
        }
        if self.paths.cert_dir.as_os_str().is_empty() {
            return Err(Error::validation("Certificate directory cannot be empty"));
        }
        Ok(())
    }

    pub fn parse_options(&self) -> ParseOptions {
        ParseOptions {
            max_line_len: self.parser.max_line_len,
            raw_text_cap: self.parser.raw_text_cap,
            strict_inline_blocks: self.parser.strict_inline_blocks,
        }
    }

    pub fn cert_store(&self) -> FsCertStore {
        FsCertStore::new(&self.paths.cert_dir)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_matches_parse_options() {
        let config = ImporterConfig::default();
        assert_eq!(config.version, CONFIG_VERSION);
        assert_eq!(config.parse_options(), ParseOptions::default());
        assert!(config.paths.cert_dir.ends_with(".cert/nm-openvpn"));
    }

    #[test]
    fn test_save_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ImporterConfig::default();
        config.parser.strict_inline_blocks = false;
        config.paths.cert_dir = dir.path().join("certs");
        config.paths.log_file = Some(dir.path().join("import.log"));
        config.save_to(&path).unwrap();

        let loaded = ImporterConfig::load(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.parse_options().strict_inline_blocks);
        assert_eq!(loaded.cert_store().root(), dir.path().join("certs"));
    }

    #[test]
    fn test_load_rejects_invalid() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
version = 1

[parser]
max_line_len = 8
raw_text_cap = 8192
strict_inline_blocks = true

[paths]
cert_dir = "/tmp/certs"
"#,
        )
        .unwrap();

        assert!(matches!(
            ImporterConfig::load(&path),
            Err(Error::Validation(_))
        ));
    }

    #[test]
    fn test_load_rejects_newer_version() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");

        let mut config = ImporterConfig::default();
        config.version = CONFIG_VERSION + 1;
        config.save_to(&path).unwrap();

        assert!(matches!(ImporterConfig::load(&path), Err(Error::Config(_))));
    }
}
