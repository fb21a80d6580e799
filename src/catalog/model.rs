//! Catalog records.
//!
//! A catalog is a named, versioned package that provides one [`Source`]. It comes in three
//! shapes:
//!
//! - [`CatalogInternal`] - Bundled with the application, always available
//! - [`CatalogInstalled`] - Installed from a package, may be updated or removed
//! - [`CatalogRemote`] - Listed in the remote index, available for installation
//!
//! A source id appears at most once among internal and installed catalogs.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

use crate::source::Source;

/// A catalog shipped with the application.
#[derive(Clone)]
pub struct CatalogInternal {
    pub name: String,
    pub description: String,
    pub source: Arc<dyn Source>,
}

impl CatalogInternal {
    /// Wraps a bundled source, naming the catalog after it.
    pub fn new(source: Arc<dyn Source>) -> Self {
        Self {
            name: source.name().to_string(),
            description: String::new(),
            source,
        }
    }

    pub fn source_id(&self) -> i64 {
        self.source.id()
    }
}

impl fmt::Debug for CatalogInternal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogInternal")
            .field("name", &self.name)
            .field("source_id", &self.source.id())
            .finish()
    }
}

/// A catalog installed from a package.
#[derive(Clone)]
pub struct CatalogInstalled {
    pub name: String,
    pub description: String,
    /// Unique package name, e.g. `eu.kanade.tachiyomi.extension.en.mangadex`
    pub pkg_name: String,
    pub version_name: String,
    pub version_code: i32,
    pub source: Arc<dyn Source>,
    /// Whether the remote index offers a newer version.
    ///
    /// Always derived from the remote collection; see [`has_update`].
    pub has_update: bool,
}

impl CatalogInstalled {
    pub fn source_id(&self) -> i64 {
        self.source.id()
    }

    /// Returns a copy with `has_update` recomputed against `remotes`.
    pub fn with_update_check(&self, remotes: &[CatalogRemote]) -> Self {
        Self {
            has_update: has_update(self, remotes),
            ..self.clone()
        }
    }
}

impl fmt::Debug for CatalogInstalled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogInstalled")
            .field("name", &self.name)
            .field("pkg_name", &self.pkg_name)
            .field("version_name", &self.version_name)
            .field("version_code", &self.version_code)
            .field("source_id", &self.source.id())
            .field("has_update", &self.has_update)
            .finish()
    }
}

/// A catalog listed in the remote index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CatalogRemote {
    pub name: String,
    pub description: String,
    pub source_id: i64,
    pub pkg_name: String,
    pub version_name: String,
    pub version_code: i32,
    pub lang: String,
    /// Where the package blob is downloaded from
    pub pkg_url: String,
    pub icon_url: String,
    #[serde(default)]
    pub nsfw: bool,
}

/// A catalog available on this device.
#[derive(Debug, Clone)]
pub enum CatalogLocal {
    Internal(CatalogInternal),
    Installed(CatalogInstalled),
}

impl CatalogLocal {
    pub fn name(&self) -> &str {
        match self {
            CatalogLocal::Internal(c) => &c.name,
            CatalogLocal::Installed(c) => &c.name,
        }
    }

    pub fn source(&self) -> &Arc<dyn Source> {
        match self {
            CatalogLocal::Internal(c) => &c.source,
            CatalogLocal::Installed(c) => &c.source,
        }
    }

    pub fn source_id(&self) -> i64 {
        self.source().id()
    }
}

/// Any catalog, local or remote.
#[derive(Debug, Clone)]
pub enum Catalog {
    Internal(CatalogInternal),
    Installed(CatalogInstalled),
    Remote(CatalogRemote),
}

impl Catalog {
    pub fn name(&self) -> &str {
        match self {
            Catalog::Internal(c) => &c.name,
            Catalog::Installed(c) => &c.name,
            Catalog::Remote(c) => &c.name,
        }
    }

    pub fn source_id(&self) -> i64 {
        match self {
            Catalog::Internal(c) => c.source_id(),
            Catalog::Installed(c) => c.source_id(),
            Catalog::Remote(c) => c.source_id,
        }
    }

    /// Package name, if the catalog comes from a package.
    pub fn pkg_name(&self) -> Option<&str> {
        match self {
            Catalog::Internal(_) => None,
            Catalog::Installed(c) => Some(&c.pkg_name),
            Catalog::Remote(c) => Some(&c.pkg_name),
        }
    }
}

impl From<CatalogLocal> for Catalog {
    fn from(local: CatalogLocal) -> Self {
        match local {
            CatalogLocal::Internal(c) => Catalog::Internal(c),
            CatalogLocal::Installed(c) => Catalog::Installed(c),
        }
    }
}

impl From<CatalogRemote> for Catalog {
    fn from(remote: CatalogRemote) -> Self {
        Catalog::Remote(remote)
    }
}

/// Returns `true` if `remotes` holds a strictly newer version of `installed`.
///
/// Versions are matched by package name only.
pub fn has_update(installed: &CatalogInstalled, remotes: &[CatalogRemote]) -> bool {
    remotes
        .iter()
        .any(|r| r.pkg_name == installed.pkg_name && r.version_code > installed.version_code)
}

/// Progress of a catalog installation.
///
/// An install stream yields `Pending`, `Downloading` and `Installing` in that order, then
/// ends with exactly one of `Installed` or `Error`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallStep {
    Pending,
    Downloading,
    Installing,
    Installed,
    Error(String),
}

impl InstallStep {
    /// Returns `true` for the terminal steps.
    pub fn is_completed(&self) -> bool {
        matches!(self, InstallStep::Installed | InstallStep::Error(_))
    }
}
