//! Catalog lifecycle: discovery, installation, updates and removal.
//!
//! - [`model`] - Catalog records and [`InstallStep`]
//! - [`api`] - The remote catalog index
//! - [`cache`] - On-disk copy of the last fetched index
//! - [`loader`] - Package manifests and source instantiation
//! - [`installer`] - Package download, install and removal
//! - [`repository`] - [`CatalogRepository`], tying it all to the [`SourceRegistry`](crate::source::SourceRegistry)

pub mod api;
pub mod cache;
pub mod installer;
pub mod loader;
pub mod model;
pub mod repository;

pub use api::{CatalogApi, DEFAULT_REPO_URL, RemoteIndexApi, parse_index};
pub use cache::CatalogCache;
pub use installer::{FsPackageInstaller, PackageInstaller, PendingPackage, PreparedPackage};
pub use loader::{CatalogLoader, PackageManifest, SourceFactory};
pub use model::{
    Catalog, CatalogInstalled, CatalogInternal, CatalogLocal, CatalogRemote, InstallStep, has_update,
};
pub use repository::{CatalogListing, CatalogRepository, InstallSteps, ListingOptions};
