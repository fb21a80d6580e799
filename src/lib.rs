//! # Hondana - Catalog lifecycle and chapter synchronization for manga readers
//!
//! Hondana is the core of a manga reader that gets its content from pluggable sources.
//! It keeps track of which source catalogs are bundled, installed or available remotely,
//! installs and removes catalog packages, and keeps the locally stored chapter lists of
//! each manga in step with what the sources report.
//!
//! ## Features
//!
//! - **Source Registry**: Live sources keyed by a stable 64-bit id
//! - **Catalog Repository**: Reactive internal/installed/remote catalog collections with
//!   step-wise, cancellable installation
//! - **Chapter Synchronization**: Diff stored chapters against a source and commit the
//!   result atomically, never touching what the user owns (read state, bookmarks, progress)
//! - **Chapter Number Recognition**: Chapter numbers parsed from chapter names
//! - **Async/Await Support**: Built on tokio
//! - **Robust Error Handling**: One error type with detailed context
//!
//! ## Quick Start
//!
//! ### Synchronizing chapters
//!
//! ```rust
//! use std::sync::Arc;
//! use hondana::prelude::*;
//! use hondana::sources::TestSource;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let registry = Arc::new(SourceRegistry::new());
//!     registry.register_source(Arc::new(TestSource::new()), false);
//!
//!     let chapters = Arc::new(InMemoryChapterRepository::new());
//!     let sync = SyncChaptersFromSource::new(chapters.clone(), registry)
//!         .with_pin_policy(Arc::new(PinPolicy::BookmarkedOrInProgress));
//!
//!     let manga = Manga { id: 1, source_id: TestSource::ID, key: "1".into(), title: "Manga 1".into() };
//!     let diff = sync.sync(&manga).await?;
//!
//!     println!("{} new chapters", diff.notified_added().len());
//!     Ok(())
//! }
//! ```
//!
//! ### Installing a catalog
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use futures::StreamExt;
//! use hondana::prelude::*;
//! use hondana::catalog::PackageManifest;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = Config::load("hondana.json")?;
//!     let registry = Arc::new(SourceRegistry::new());
//!     let factory = |manifest: &PackageManifest| -> Result<Arc<dyn Source>> {
//!         Err(Error::Other(format!("no plugin for {}", manifest.pkg_name)))
//!     };
//!
//!     let catalogs = CatalogRepository::from_config(&config, registry, Vec::new(), Arc::new(factory));
//!     catalogs.init().await;
//!     catalogs.refresh_remote_catalogs(true).await?;
//!
//!     let listing = catalogs.catalog_listing(&ListingOptions {
//!         exclude_remote_installed: true,
//!         with_nsfw: false,
//!     });
//!     if let Some(remote) = listing.remote.into_iter().next() {
//!         let mut steps = catalogs.install_catalog(remote);
//!         while let Some(step) = steps.next().await {
//!             println!("{:?}", step);
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Architecture
//!
//! - [`source`]: The [`Source`] trait and the [`SourceRegistry`]
//! - [`catalog`]: Catalog records, package installation and the [`CatalogRepository`]
//! - [`chapter`]: Stored chapters, their repository and the synchronizer
//! - [`types`]: Data exchanged with sources
//! - [`config`]: Library configuration
//! - [`net`]: HTTP client and rate limiting
//! - [`error`]: Error handling
//!
//! Hondana logs through [`tracing`](https://docs.rs/tracing) and never installs a
//! subscriber; applications pick their own.

pub mod catalog;
pub mod chapter;
pub mod config;
pub mod error;
pub mod net;
pub mod source;
pub mod sources;
pub mod types;

/// Prelude module for convenient imports.
///
/// ```rust
/// use hondana::prelude::*;
///
/// // Now you have access to:
/// // - Source, SourceRegistry
/// // - CatalogRepository, InstallStep and the catalog records
/// // - SyncChaptersFromSource, ChapterRepository, Chapter, Manga
/// // - Config, Error, Result
/// ```
pub mod prelude {
    pub use crate::{
        catalog::{
            Catalog, CatalogInstalled, CatalogInternal, CatalogListing, CatalogLocal, CatalogRemote,
            CatalogRepository, InstallStep, ListingOptions,
        },
        chapter::{
            Chapter, ChapterRepository, ChapterUpdate, Diff, FindOrInitChapter,
            InMemoryChapterRepository, Manga, Patch, PinPolicy, SyncChaptersFromSource,
        },
        config::Config,
        error::{Error, Result},
        source::{Source, SourceRegistry},
        types::{ChapterInfo, MangaInfo, MangaStatus},
    };
}

// Re-export main types at crate root for direct access
pub use catalog::{CatalogRepository, InstallStep};
pub use chapter::{ChapterRepository, SyncChaptersFromSource};
pub use config::Config;
pub use error::{Error, Result};
pub use source::{Source, SourceRegistry};
