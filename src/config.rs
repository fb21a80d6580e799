//! Library configuration.
//!
//! [`Config`] is read from a JSON file where every field is optional, or built in code
//! with [`ConfigBuilder`]:
//!
//! ```rust
//! use hondana::config::{Config, ConfigBuilder};
//! use hondana::chapter::PinPolicy;
//!
//! let config = ConfigBuilder::default()
//!     .repo_url("https://example.com/repo")
//!     .pin_policy(PinPolicy::BookmarkedOrInProgress)
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(config.install_timeout_secs, 180);
//! assert!(config.validate().is_ok());
//! ```

use derive_builder::Builder;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::catalog::api::DEFAULT_REPO_URL;
use crate::chapter::PinPolicy;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Builder)]
#[builder(setter(into), default)]
pub struct Config {
    /// Repository serving `index.min.json` and the packages it lists
    #[serde(default = "default_repo_url")]
    pub repo_url: String,

    /// Directory installed packages are stored in
    #[serde(default = "default_packages_dir")]
    pub packages_dir: PathBuf,

    /// File the last fetched remote index is cached in; no cache when unset
    #[serde(default)]
    #[builder(setter(into, strip_option))]
    pub cache_path: Option<PathBuf>,

    /// Bound on each of the download and install phases of an installation
    #[serde(default = "default_install_timeout")]
    pub install_timeout_secs: u64,

    /// Minimum delay between two non-forced remote index fetches
    #[serde(default = "default_remote_check_interval")]
    pub remote_check_interval_secs: u64,

    /// Lowest source library major version a package may target
    #[serde(default = "default_lib_version")]
    pub lib_version_min: u32,

    /// Highest source library major version a package may target
    #[serde(default = "default_lib_version")]
    pub lib_version_max: u32,

    /// Which chapters survive when their source stops listing them
    #[serde(default)]
    pub pin_policy: PinPolicy,

    /// Register the bundled test source as an internal catalog
    #[serde(default)]
    pub include_test_source: bool,
}

fn default_repo_url() -> String {
    DEFAULT_REPO_URL.to_string()
}

fn default_packages_dir() -> PathBuf {
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("hondana")
        .join("packages")
}

fn default_install_timeout() -> u64 {
    180
}

fn default_remote_check_interval() -> u64 {
    300
}

fn default_lib_version() -> u32 {
    1
}

impl Default for Config {
    fn default() -> Self {
        Self {
            repo_url: default_repo_url(),
            packages_dir: default_packages_dir(),
            cache_path: None,
            install_timeout_secs: default_install_timeout(),
            remote_check_interval_secs: default_remote_check_interval(),
            lib_version_min: default_lib_version(),
            lib_version_max: default_lib_version(),
            pin_policy: PinPolicy::default(),
            include_test_source: false,
        }
    }
}

impl Config {
    /// Reads and validates a JSON configuration file.
    ///
    /// # Errors
    ///
    /// * [`Error::Io`] - If the file can't be read
    /// * [`Error::Json`] - If it isn't valid JSON for this structure
    /// * [`Error::Parse`] - If a value is out of range, see [`validate`](Config::validate)
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        debug!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    /// Like [`from_file`](Config::from_file), but a missing file yields the defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        if !path.as_ref().exists() {
            debug!(path = %path.as_ref().display(), "No configuration file, using defaults");
            return Ok(Self::default());
        }
        Self::from_file(path)
    }

    /// Checks values that deserialization alone doesn't.
    pub fn validate(&self) -> Result<()> {
        url::Url::parse(&self.repo_url)
            .map_err(|e| Error::parse(format!("Invalid repo_url {:?}: {}", self.repo_url, e)))?;

        if self.lib_version_min > self.lib_version_max {
            return Err(Error::parse(format!(
                "lib_version_min ({}) is greater than lib_version_max ({})",
                self.lib_version_min, self.lib_version_max
            )));
        }
        if self.install_timeout_secs == 0 {
            return Err(Error::parse("install_timeout_secs must be positive"));
        }
        Ok(())
    }

    pub fn install_timeout(&self) -> Duration {
        Duration::from_secs(self.install_timeout_secs)
    }

    pub fn remote_check_interval(&self) -> Duration {
        Duration::from_secs(self.remote_check_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("hondana.json");
        std::fs::write(
            &path,
            r#"{ "pin_policy": "bookmarked_or_in_progress", "include_test_source": true }"#,
        )
        .unwrap();

        let config = Config::from_file(&path).unwrap();

        assert_eq!(config.pin_policy, PinPolicy::BookmarkedOrInProgress);
        assert!(config.include_test_source);
        assert_eq!(config.repo_url, DEFAULT_REPO_URL);
        assert_eq!(config.install_timeout(), Duration::from_secs(180));
        assert_eq!(config.remote_check_interval(), Duration::from_secs(300));
        assert!(config.cache_path.is_none());
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load(dir.path().join("missing.json")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let bad_url = Config {
            repo_url: "not a url".to_string(),
            ..Config::default()
        };
        assert!(bad_url.validate().is_err());

        let bad_range = Config {
            lib_version_min: 3,
            lib_version_max: 2,
            ..Config::default()
        };
        assert!(matches!(bad_range.validate(), Err(Error::Parse(_))));
    }

    #[test]
    fn test_builder_sets_cache_path() {
        let config = ConfigBuilder::default()
            .cache_path("/tmp/catalogs.json")
            .install_timeout_secs(5u64)
            .build()
            .unwrap();

        assert_eq!(config.cache_path, Some(PathBuf::from("/tmp/catalogs.json")));
        assert_eq!(config.install_timeout(), Duration::from_secs(5));
    }
}
