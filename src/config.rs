//! `config.toml` handling.
//!
//! ```toml
//! rows = 100
//! cols = 26
//! recalc = "cascade"   # or "on-entry"
//!
//! [autosave]
//! enabled = true
//! debounce_ms = 1500
//! ```

use directories::ProjectDirs;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use testsheet_core::{
    AutoSaveOptions, EditSession, RecalcPolicy, SaveSink, Sheet, SheetOptions,
};

use crate::error::{ConfigError, Result};

const MAX_CONFIG_FILE_BYTES: u64 = 1_048_576; // 1 MiB
const MAX_DEBOUNCE_MS: u64 = 60_000;

#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct TestsheetConfig {
    pub rows: usize,
    pub cols: usize,
    pub recalc: RecalcPolicy,
    pub autosave: AutoSaveOptions,
}

impl Default for TestsheetConfig {
    fn default() -> Self {
        let sheet = SheetOptions::default();
        TestsheetConfig {
            rows: sheet.rows,
            cols: sheet.cols,
            recalc: sheet.recalc,
            autosave: AutoSaveOptions::default(),
        }
    }
}

impl TestsheetConfig {
    /// Load from `explicit`, or from the user config file when no path is
    /// given. A missing user config file means defaults; a missing explicit
    /// file is an error.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::NotFound(path.to_path_buf()));
                }
                path.to_path_buf()
            }
            None => {
                let Some(path) = default_config_path() else {
                    tracing::warn!("no config directory available, using defaults");
                    return Ok(Self::default());
                };
                if !path.exists() {
                    tracing::debug!(path = %path.display(), "no config file, using defaults");
                    return Ok(Self::default());
                }
                path
            }
        };
        Self::load_file(&path)
    }

    fn load_file(path: &Path) -> Result<Self> {
        let io_err = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };
        let size = std::fs::metadata(path).map_err(io_err)?.len();
        if size > MAX_CONFIG_FILE_BYTES {
            return Err(ConfigError::TooLarge {
                path: path.to_path_buf(),
                size,
                max: MAX_CONFIG_FILE_BYTES,
            });
        }
        let content = std::fs::read_to_string(path).map_err(io_err)?;
        let config = Self::from_toml_str(&content)?;
        tracing::debug!(path = %path.display(), "config loaded");
        Ok(config)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: TestsheetConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.rows == 0 || self.cols == 0 {
            return Err(ConfigError::Invalid(format!(
                "sheet bounds must be non-zero, got {}x{}",
                self.rows, self.cols
            )));
        }
        if self.autosave.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid(format!(
                "autosave.debounce_ms must be at most {}, got {}",
                MAX_DEBOUNCE_MS, self.autosave.debounce_ms
            )));
        }
        Ok(())
    }

    pub fn sheet_options(&self) -> SheetOptions {
        SheetOptions {
            rows: self.rows,
            cols: self.cols,
            recalc: self.recalc,
        }
    }

    pub fn new_sheet(&self) -> Sheet {
        Sheet::with_options(self.sheet_options())
    }

    /// An empty sheet wired to `sink` with this config's auto-save settings.
    pub fn open_session<S: SaveSink>(&self, sink: S) -> EditSession<S> {
        EditSession::new(self.new_sheet(), sink, self.autosave.clone())
    }
}

/// `<config dir>/testsheet/config.toml`, if the platform has a config dir.
pub fn default_config_path() -> Option<PathBuf> {
    let proj = ProjectDirs::from("", "", "testsheet")?;
    let mut path = proj.config_dir().to_path_buf();
    path.push("config.toml");
    Some(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_is_default() {
        let config = TestsheetConfig::from_toml_str("").unwrap();
        assert_eq!(config, TestsheetConfig::default());
        assert_eq!(config.rows, 100);
        assert_eq!(config.cols, 26);
        assert_eq!(config.recalc, RecalcPolicy::Cascade);
        assert_eq!(config.autosave.debounce_ms, 1500);
    }

    #[test]
    fn test_partial_config() {
        let config = TestsheetConfig::from_toml_str(
            r#"
            cols = 8
            recalc = "on-entry"

            [autosave]
            debounce_ms = 250
            "#,
        )
        .unwrap();
        assert_eq!(config.rows, 100);
        assert_eq!(config.cols, 8);
        assert_eq!(config.recalc, RecalcPolicy::OnEntry);
        assert!(config.autosave.enabled);
        assert_eq!(config.autosave.debounce_ms, 250);
    }

    #[test]
    fn test_rejects_bad_values() {
        assert!(matches!(
            TestsheetConfig::from_toml_str("rows = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TestsheetConfig::from_toml_str("[autosave]\ndebounce_ms = 60001"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            TestsheetConfig::from_toml_str("recalc = \"lazy\""),
            Err(ConfigError::Toml(_))
        ));
        assert!(matches!(
            TestsheetConfig::from_toml_str("colour = \"red\""),
            Err(ConfigError::Toml(_))
        ));
    }

    #[test]
    fn default_config_path_is_deterministic() {
        assert_eq!(default_config_path(), default_config_path());
        if let Some(path) = default_config_path() {
            assert!(path.ends_with("config.toml"));
        }
    }
}
