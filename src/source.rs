//! Source trait and the registry of live sources.
//!
//! This module defines the core [`Source`] trait that every content provider implements,
//! and the [`SourceRegistry`] that maps a source id to its live implementation. Catalogs
//! register their sources here when they are installed and remove them when they are
//! uninstalled; everything else only reads.
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use hondana::prelude::*;
//! # use hondana::sources::TestSource;
//!
//! let registry = SourceRegistry::new();
//! registry.register_source(Arc::new(TestSource::new()), false);
//!
//! if let Some(source) = registry.get(TestSource::ID) {
//!     println!("Found source: {}", source.name());
//! }
//! ```

use async_trait::async_trait;
use parking_lot::RwLock;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

use crate::{
    error::Result,
    types::{ChapterInfo, MangaInfo},
};

/// Trait that all content sources must implement.
///
/// A source answers three questions about a manga: its details, its chapter list, and
/// the pages of a chapter. How it gets the answers (HTTP API, scraping, local files) is
/// entirely up to the implementation.
///
/// # Required Methods
///
/// * [`id()`](Source::id) - Stable 64-bit identifier, unique across all sources
/// * [`name()`](Source::name) - Human-readable name
/// * [`fetch_manga_details()`](Source::fetch_manga_details) - Refresh manga metadata
/// * [`fetch_chapter_list()`](Source::fetch_chapter_list) - List chapters of a manga
/// * [`fetch_page_list()`](Source::fetch_page_list) - List page URLs of a chapter
///
/// # Implementation Guidelines
///
/// - Return chapters from most to least recent; the synchronizer relies on that order
///   for `source_order` and fetch dates
/// - Keep chapter keys stable across fetches; a changed key is a deleted chapter plus a
///   new one
/// - Set `number` on [`ChapterInfo`] when the source knows it, otherwise leave it negative
///   and optionally provide [`chapter_number_regex()`](Source::chapter_number_regex)
///
/// # Examples
///
/// ```rust
/// use hondana::prelude::*;
/// use hondana::error::Result;
/// use async_trait::async_trait;
///
/// struct MySource;
///
/// #[async_trait]
/// impl Source for MySource {
///     fn id(&self) -> i64 { 4242 }
///     fn name(&self) -> &str { "My Source" }
///
///     async fn fetch_manga_details(&self, manga: &MangaInfo) -> Result<MangaInfo> {
///         Ok(manga.clone())
///     }
///
///     async fn fetch_chapter_list(&self, manga: &MangaInfo) -> Result<Vec<ChapterInfo>> {
///         // Implementation here
/// #       Ok(vec![])
///     }
///
///     async fn fetch_page_list(&self, chapter: &ChapterInfo) -> Result<Vec<String>> {
///         // Implementation here
/// #       Ok(vec![])
///     }
/// }
/// ```
#[async_trait]
pub trait Source: Send + Sync {
    /// Returns the unique identifier for this source.
    ///
    /// The id must never change between versions of the same source: stored manga
    /// reference their source by this value.
    fn id(&self) -> i64;

    /// Returns the human-readable name of this source.
    fn name(&self) -> &str;

    /// Returns the language code of the content this source serves.
    fn lang(&self) -> &str {
        "all"
    }

    /// Fetches up-to-date details for a manga.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`](crate::Error::NotFound) - If the manga doesn't exist
    /// * [`Error::Source`](crate::Error::Source) - For source-specific errors
    /// * [`Error::Network`](crate::Error::Network) - For network/connection issues
    async fn fetch_manga_details(&self, manga: &MangaInfo) -> Result<MangaInfo>;

    /// Fetches every available chapter of a manga, most recent first.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`](crate::Error::NotFound) - If the manga doesn't exist
    /// * [`Error::Source`](crate::Error::Source) - For source-specific errors
    /// * [`Error::Network`](crate::Error::Network) - For network/connection issues
    async fn fetch_chapter_list(&self, manga: &MangaInfo) -> Result<Vec<ChapterInfo>>;

    /// Fetches the page URLs of a chapter in reading order.
    async fn fetch_page_list(&self, chapter: &ChapterInfo) -> Result<Vec<String>>;

    /// Returns a regex used to extract chapter numbers from chapter names.
    ///
    /// The first capture group must hold the integer part, the optional second group a
    /// decimal part and the optional third an alpha suffix. `None` selects the default
    /// heuristics in [`chapter::recognition`](crate::chapter::recognition).
    fn chapter_number_regex(&self) -> Option<&Regex> {
        None
    }
}

/// The authoritative in-memory directory of live sources.
///
/// `SourceRegistry` maps a source id to its implementation. It is not persisted: the
/// catalog repository rebuilds it on startup from the internal and installed catalogs.
///
/// # Concurrency
///
/// Writes (register/unregister) take an exclusive lock; reads take the shared lock just
/// long enough to clone an `Arc`, so a reader never blocks on a slow source call.
///
/// # Examples
///
/// ```rust
/// use std::sync::Arc;
/// use hondana::prelude::*;
/// # use hondana::sources::TestSource;
///
/// let registry = SourceRegistry::new();
/// assert!(registry.is_empty());
///
/// let source = Arc::new(TestSource::new());
/// registry.register_source(source.clone(), false);
/// assert_eq!(registry.len(), 1);
///
/// registry.unregister_source(source.as_ref());
/// assert!(registry.get(TestSource::ID).is_none());
/// ```
#[derive(Default)]
pub struct SourceRegistry {
    sources: RwLock<HashMap<i64, Arc<dyn Source>>>,
}

impl SourceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Retrieves a source by its id.
    ///
    /// Absence is not an error; callers treat `None` as "source unavailable".
    pub fn get(&self, id: i64) -> Option<Arc<dyn Source>> {
        self.sources.read().get(&id).cloned()
    }

    /// Registers a source under its own id.
    ///
    /// When an entry already exists for the id it is kept, unless `overwrite` is set, in
    /// which case the new source replaces it unconditionally.
    ///
    /// Returns `true` when the registry now holds `source`.
    pub fn register_source(&self, source: Arc<dyn Source>, overwrite: bool) -> bool {
        let id = source.id();
        let mut sources = self.sources.write();
        if !overwrite && sources.contains_key(&id) {
            debug!(source_id = id, "Source already registered, keeping existing entry");
            return false;
        }
        debug!(source_id = id, name = source.name(), "Registering source");
        sources.insert(id, source);
        true
    }

    /// Removes the entry keyed by `source.id()`.
    ///
    /// The stored instance does not have to be the same object as `source`.
    pub fn unregister_source(&self, source: &dyn Source) {
        if self.sources.write().remove(&source.id()).is_some() {
            debug!(source_id = source.id(), "Unregistered source");
        }
    }

    /// Returns a snapshot of every registered source.
    pub fn sources(&self) -> Vec<Arc<dyn Source>> {
        self.sources.read().values().cloned().collect()
    }

    /// Returns the ids of every registered source, sorted ascending.
    pub fn ids(&self) -> Vec<i64> {
        let mut ids: Vec<i64> = self.sources.read().keys().copied().collect();
        ids.sort_unstable();
        ids
    }

    /// Returns the number of registered sources.
    pub fn len(&self) -> usize {
        self.sources.read().len()
    }

    /// Returns `true` if no source is registered.
    pub fn is_empty(&self) -> bool {
        self.sources.read().is_empty()
    }
}
