//! Package download, installation and removal.
//!
//! The [`PackageInstaller`] trait is what the catalog repository drives during an
//! install. [`FsPackageInstaller`] is the filesystem implementation: packages are
//! downloaded into a temporary file inside the packages directory, validated by the
//! [`CatalogLoader`], and renamed into place.
//!
//! Installing is split in two. [`prepare`](PackageInstaller::prepare) validates a
//! download and instantiates its source without making anything visible;
//! [`persist`](PackageInstaller::persist) then replaces the installed package. The
//! repository only persists once the prepared catalog has been accepted, so a rejected
//! package never reaches the packages directory.

use async_trait::async_trait;
use std::path::Path;
use tempfile::NamedTempFile;
use tracing::{debug, info};

use super::loader::CatalogLoader;
use super::model::{CatalogInstalled, CatalogRemote};
use crate::error::{Error, Result};
use crate::net::HttpClient;

/// A downloaded package waiting to be installed.
///
/// Dropping it deletes the downloaded data.
#[derive(Debug)]
pub struct PendingPackage {
    pub catalog: CatalogRemote,
    file: NamedTempFile,
}

impl PendingPackage {
    pub fn new(catalog: CatalogRemote, file: NamedTempFile) -> Self {
        Self { catalog, file }
    }

    /// Location of the downloaded data.
    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn into_file(self) -> NamedTempFile {
        self.file
    }
}

/// A validated package whose source is ready, not installed yet.
///
/// Dropping it deletes the downloaded data.
pub struct PreparedPackage {
    pub catalog: CatalogInstalled,
    file: NamedTempFile,
}

impl PreparedPackage {
    pub fn new(catalog: CatalogInstalled, file: NamedTempFile) -> Self {
        Self { catalog, file }
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn into_parts(self) -> (CatalogInstalled, NamedTempFile) {
        (self.catalog, self.file)
    }
}

/// Platform mechanism that installs and removes catalog packages.
#[async_trait]
pub trait PackageInstaller: Send + Sync {
    /// Loads every installed package, one result per package.
    async fn load_installed(&self) -> Result<Vec<Result<CatalogInstalled>>>;

    /// Downloads the package of `catalog`.
    async fn download(&self, catalog: &CatalogRemote) -> Result<PendingPackage>;

    /// Validates a downloaded package and creates its catalog.
    ///
    /// Must leave the installed packages untouched.
    async fn prepare(&self, package: PendingPackage) -> Result<PreparedPackage>;

    /// Makes a prepared package the installed one, replacing a package of the same name.
    ///
    /// Called with the repository's state lock held, so it must not block for long. On
    /// error the previously installed package is still in place.
    fn persist(&self, package: PreparedPackage) -> Result<CatalogInstalled>;

    /// Removes an installed package.
    ///
    /// # Errors
    ///
    /// * [`Error::UninstallRejected`] - If the package is not installed or can't be removed
    async fn uninstall(&self, pkg_name: &str) -> Result<()>;
}

/// [`PackageInstaller`] storing packages as files in a directory.
#[derive(Clone)]
pub struct FsPackageInstaller {
    loader: CatalogLoader,
    client: HttpClient,
}

impl FsPackageInstaller {
    pub fn new(loader: CatalogLoader) -> Self {
        Self {
            loader,
            client: HttpClient::new("packages").with_rate_limit(0),
        }
    }

    pub fn with_client(mut self, client: HttpClient) -> Self {
        self.client = client;
        self
    }

    pub fn loader(&self) -> &CatalogLoader {
        &self.loader
    }

    /// Stores a package blob obtained without a download, e.g. a local file.
    pub async fn stage(&self, catalog: CatalogRemote, bytes: &[u8]) -> Result<PendingPackage> {
        tokio::fs::create_dir_all(self.loader.packages_dir()).await?;
        let file = NamedTempFile::new_in(self.loader.packages_dir())?;
        tokio::fs::write(file.path(), bytes).await?;
        Ok(PendingPackage::new(catalog, file))
    }
}

#[async_trait]
impl PackageInstaller for FsPackageInstaller {
    async fn load_installed(&self) -> Result<Vec<Result<CatalogInstalled>>> {
        self.loader.load_extensions().await
    }

    async fn download(&self, catalog: &CatalogRemote) -> Result<PendingPackage> {
        debug!(pkg = %catalog.pkg_name, url = %catalog.pkg_url, "Downloading package");
        let bytes = self.client.get(&catalog.pkg_url).await?;
        self.stage(catalog.clone(), &bytes).await
    }

    async fn prepare(&self, package: PendingPackage) -> Result<PreparedPackage> {
        let bytes = tokio::fs::read(package.path()).await?;
        let catalog = self
            .loader
            .load_bytes(&bytes, Some(&package.catalog.pkg_name))?;
        Ok(PreparedPackage::new(catalog, package.into_file()))
    }

    fn persist(&self, package: PreparedPackage) -> Result<CatalogInstalled> {
        let (catalog, file) = package.into_parts();
        let target = self.loader.package_path(&catalog.pkg_name)?;
        file.persist(&target)
            .map_err(|e| Error::install(&catalog.pkg_name, e.error.to_string()))?;

        info!(pkg = %catalog.pkg_name, version = %catalog.version_name, "Installed package");
        Ok(catalog)
    }

    async fn uninstall(&self, pkg_name: &str) -> Result<()> {
        let path = self
            .loader
            .package_path(pkg_name)
            .map_err(|e| Error::uninstall_rejected(pkg_name, e.to_string()))?;

        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                info!(pkg = %pkg_name, "Uninstalled package");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(Error::uninstall_rejected(pkg_name, "package is not installed"))
            }
            Err(e) => Err(Error::uninstall_rejected(pkg_name, e.to_string())),
        }
    }
}
