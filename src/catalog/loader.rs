//! Loading installed packages into live catalogs.
//!
//! A package is a JSON [`PackageManifest`] stored as `{packages_dir}/{pkg_name}.json`. The
//! manifest says which source the package provides; a [`SourceFactory`] turns it into a
//! live [`Source`].

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, error};

use super::model::CatalogInstalled;
use crate::error::{Error, Result};
use crate::source::Source;

/// File extension of stored packages.
pub const PACKAGE_EXTENSION: &str = "json";

/// Prefix some packages carry in their display name.
const NAME_PREFIX: &str = "Tachiyomi: ";

/// Metadata of a catalog package.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageManifest {
    pub pkg_name: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    /// `major.minor.patch`; the major part is the source library version
    pub version_name: String,
    pub version_code: i32,
    pub source_id: i64,
    #[serde(default = "default_lang")]
    pub lang: String,
}

fn default_lang() -> String {
    "all".to_string()
}

impl PackageManifest {
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        serde_json::from_slice(bytes)
            .map_err(|e| Error::parse(format!("Invalid package manifest: {}", e)))
    }

    /// Returns the source library version the package was built against.
    pub fn lib_version(&self) -> Result<u32> {
        self.version_name
            .split('.')
            .next()
            .and_then(|major| major.trim().parse().ok())
            .ok_or_else(|| {
                Error::parse(format!(
                    "Invalid version name {:?} in {}",
                    self.version_name, self.pkg_name
                ))
            })
    }

    /// Returns the display name without the legacy prefix.
    pub fn display_name(&self) -> &str {
        self.name.strip_prefix(NAME_PREFIX).unwrap_or(&self.name)
    }
}

/// Creates the live source a package provides.
pub trait SourceFactory: Send + Sync {
    fn create(&self, manifest: &PackageManifest) -> Result<Arc<dyn Source>>;
}

impl<F> SourceFactory for F
where
    F: Fn(&PackageManifest) -> Result<Arc<dyn Source>> + Send + Sync,
{
    fn create(&self, manifest: &PackageManifest) -> Result<Arc<dyn Source>> {
        self(manifest)
    }
}

/// Turns stored packages into [`CatalogInstalled`] records.
#[derive(Clone)]
pub struct CatalogLoader {
    packages_dir: PathBuf,
    factory: Arc<dyn SourceFactory>,
    lib_versions: RangeInclusive<u32>,
}

impl CatalogLoader {
    /// Creates a loader accepting library version 1 only.
    pub fn new(packages_dir: impl Into<PathBuf>, factory: Arc<dyn SourceFactory>) -> Self {
        Self {
            packages_dir: packages_dir.into(),
            factory,
            lib_versions: 1..=1,
        }
    }

    pub fn with_lib_versions(mut self, min: u32, max: u32) -> Self {
        self.lib_versions = min..=max;
        self
    }

    pub fn packages_dir(&self) -> &Path {
        &self.packages_dir
    }

    /// Returns where the package `pkg_name` is stored.
    ///
    /// Package names are dot-separated identifiers; anything that could escape the
    /// packages directory is refused.
    pub fn package_path(&self, pkg_name: &str) -> Result<PathBuf> {
        let valid = !pkg_name.is_empty()
            && !pkg_name.starts_with('.')
            && !pkg_name.contains("..")
            && pkg_name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));

        if !valid {
            return Err(Error::parse(format!("Invalid package name {:?}", pkg_name)));
        }
        Ok(self
            .packages_dir
            .join(format!("{}.{}", pkg_name, PACKAGE_EXTENSION)))
    }

    /// Validates a package blob and creates its catalog.
    ///
    /// When `expected_pkg` is given the manifest must declare that package name.
    pub fn load_bytes(&self, bytes: &[u8], expected_pkg: Option<&str>) -> Result<CatalogInstalled> {
        let manifest = PackageManifest::from_bytes(bytes)?;

        if let Some(expected) = expected_pkg {
            if manifest.pkg_name != expected {
                return Err(Error::install(
                    expected,
                    format!("package declares name {}", manifest.pkg_name),
                ));
            }
        }

        let lib_version = manifest.lib_version()?;
        if !self.lib_versions.contains(&lib_version) {
            return Err(Error::install(
                &manifest.pkg_name,
                format!(
                    "Lib version is {}, while only versions {} to {} are allowed",
                    lib_version,
                    self.lib_versions.start(),
                    self.lib_versions.end()
                ),
            ));
        }

        let source = self.factory.create(&manifest)?;
        if source.id() != manifest.source_id {
            return Err(Error::install(
                &manifest.pkg_name,
                format!(
                    "source id {} does not match manifest id {}",
                    source.id(),
                    manifest.source_id
                ),
            ));
        }

        Ok(CatalogInstalled {
            name: manifest.display_name().to_string(),
            description: manifest.description.clone(),
            pkg_name: manifest.pkg_name.clone(),
            version_name: manifest.version_name.clone(),
            version_code: manifest.version_code,
            source,
            has_update: false,
        })
    }

    /// Loads one stored package.
    pub async fn load_from_pkg_name(&self, pkg_name: &str) -> Result<CatalogInstalled> {
        let path = self.package_path(pkg_name)?;
        let bytes = tokio::fs::read(&path).await?;
        self.load_bytes(&bytes, Some(pkg_name))
    }

    /// Loads every stored package concurrently.
    ///
    /// One result per package file; a missing packages directory means no packages.
    pub async fn load_extensions(&self) -> Result<Vec<Result<CatalogInstalled>>> {
        let mut entries = match tokio::fs::read_dir(&self.packages_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut pkg_names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(PACKAGE_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                pkg_names.push(stem.to_string());
            }
        }
        pkg_names.sort();
        debug!(count = pkg_names.len(), dir = %self.packages_dir.display(), "Loading packages");

        let results = join_all(pkg_names.iter().map(|pkg| self.load_from_pkg_name(pkg))).await;
        for (pkg, result) in pkg_names.iter().zip(&results) {
            if let Err(e) = result {
                error!(pkg = %pkg, error = %e, "Extension load error");
            }
        }
        Ok(results)
    }
}
