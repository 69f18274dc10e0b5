//! TOML configuration.
//!
//! ```toml
//! [learning]
//! min_samples = 3
//! grind_bound = 4.0
//!
//! [storage]
//! backend = "sqlite"
//! data_dir = "/var/lib/brew-coach"
//!
//! [history]
//! capacity = 1000
//! ```
//!
//! Every key is optional; missing keys take their defaults.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::engine::learning::LearningConfig;
use crate::error::Result;
use crate::journal::{HistoryConfig, StorageConfig};

/// Default config file name, looked up inside the data directory.
pub const CONFIG_FILE_NAME: &str = "brew-coach.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrewConfig {
    pub learning: LearningConfig,
    pub storage: StorageConfig,
    pub history: HistoryConfig,
}

impl BrewConfig {
    /// Parse and validate.  Values that would break the learning rule
    /// (NaN bounds, negative steps, ...) are rejected here.
    pub fn from_toml(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text)?;
        cfg.learning.validate()?;
        Ok(cfg)
    }

    /// Load `path`.  A missing file yields defaults; a malformed one is an error.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            tracing::debug!(target: "brew_coach::config", path = %path.display(), "no config file; using defaults");
            return Ok(Self::default());
        }
        let text = fs::read_to_string(path)?;
        Self::from_toml(&text)
    }

    /// Resolve the config path: explicit `--config`, else `<data_dir>/brew-coach.toml`.
    pub fn resolve_path(explicit: Option<&Path>, data_dir: &Path) -> PathBuf {
        explicit
            .map(Path::to_path_buf)
            .unwrap_or_else(|| data_dir.join(CONFIG_FILE_NAME))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BrewError;
    use crate::journal::BackendKind;
    use rstest::rstest;

    #[test]
    fn test_empty_toml_is_default() {
        assert_eq!(BrewConfig::from_toml("").unwrap(), BrewConfig::default());
    }

    #[test]
    fn test_partial_sections() {
        let cfg = BrewConfig::from_toml(
            r#"
            [learning]
            min_samples = 5

            [storage]
            backend = "sqlite"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.learning.min_samples, 5);
        assert_eq!(cfg.learning.grind_bound, 4.0);
        assert_eq!(cfg.storage.backend, BackendKind::Sqlite);
        assert_eq!(cfg.history.capacity, 500);
    }

    #[test]
    fn test_bad_backend_is_config_error() {
        let err = BrewConfig::from_toml("[storage]\nbackend = \"redis\"").unwrap_err();
        assert!(matches!(err, BrewError::Config(_)));
    }

    #[rstest]
    #[case("[learning]\ngrind_bound = nan", "grind_bound")]
    #[case("[learning]\nnoise_floor = nan", "noise_floor")]
    #[case("[learning]\ntime_bound = inf", "time_bound")]
    #[case("[learning]\ngrind_step = -0.5", "grind_step")]
    #[case("[learning]\nconfidence_scale = 0.0", "confidence_scale")]
    fn test_unusable_learning_values_rejected(#[case] text: &str, #[case] field: &str) {
        let err = BrewConfig::from_toml(text).unwrap_err();
        assert!(matches!(err, BrewError::InvalidSetting(_)));
        assert!(err.to_string().contains(field), "{}", err);
    }

    #[test]
    fn test_load_missing_file_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = BrewConfig::load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(cfg, BrewConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "[history]\ncapacity = 10\n").unwrap();
        assert_eq!(BrewConfig::load(&path).unwrap().history.capacity, 10);
    }

    #[test]
    fn test_resolve_path_prefers_explicit() {
        let p = BrewConfig::resolve_path(Some(Path::new("/etc/bc.toml")), Path::new("/data"));
        assert_eq!(p, PathBuf::from("/etc/bc.toml"));
        let p = BrewConfig::resolve_path(None, Path::new("/data"));
        assert_eq!(p, PathBuf::from("/data/brew-coach.toml"));
    }
}
