//! Chapter synchronization with a source.
//!
//! [`SyncChaptersFromSource`] fetches the chapter list of a manga from its source, computes
//! a [`Diff`] against the stored chapters and commits it through
//! [`ChapterRepository::sync_chapters`] in a single transaction.
//!
//! The diff itself is a pure function, [`compute_diff`]:
//!
//! - source chapters with an unknown key are **added** with default user fields
//! - known keys whose source-owned fields changed are **updated** sparsely, leaving
//!   `read`, `bookmark` and `progress` alone
//! - stored chapters missing from the source are **deleted**, unless the
//!   [`ChapterPinPolicy`] keeps them as orphans
//!
//! # Examples
//!
//! ```rust
//! use std::sync::Arc;
//! use hondana::prelude::*;
//! use hondana::chapter::{InMemoryChapterRepository, Manga, SyncChaptersFromSource};
//! use hondana::sources::TestSource;
//!
//! #[tokio::main]
//! async fn main() -> hondana::Result<()> {
//!     let registry = Arc::new(SourceRegistry::new());
//!     registry.register_source(Arc::new(TestSource::new()), false);
//!
//!     let chapters = Arc::new(InMemoryChapterRepository::new());
//!     let sync = SyncChaptersFromSource::new(chapters.clone(), registry);
//!
//!     let manga = Manga { id: 1, source_id: TestSource::ID, key: "1".into(), title: "Manga 1".into() };
//!     let diff = sync.sync(&manga).await?;
//!     assert_eq!(diff.added.len(), 3);
//!
//!     // Nothing changed at the source, nothing to do
//!     assert!(sync.sync(&manga).await?.is_empty());
//!     Ok(())
//! }
//! ```

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::model::{Chapter, ChapterUpdate, Manga, Patch, UNSAVED_ID};
use super::recognition;
use super::repository::ChapterRepository;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::source::SourceRegistry;
use crate::types::ChapterInfo;

/// Result of reconciling stored chapters with a source's chapter list.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Diff {
    /// New chapters, not yet stored (`id` is unset)
    pub added: Vec<Chapter>,
    /// Stored chapters that no longer exist at the source
    pub deleted: Vec<Chapter>,
    /// Sparse updates of stored chapters whose source-owned fields changed
    pub updated: Vec<ChapterUpdate>,
}

impl Diff {
    /// Returns `true` if the diff would not change anything.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.updated.is_empty()
    }

    /// Returns the added chapters worth announcing as new.
    ///
    /// A chapter that was deleted and re-added under a new key with the same recognized
    /// number is the same chapter to a reader, so it is left out.
    pub fn notified_added(&self) -> Vec<&Chapter> {
        let deleted_numbers: Vec<f32> = self
            .deleted
            .iter()
            .filter(|c| c.is_recognized_number())
            .map(|c| c.number)
            .collect();

        self.added
            .iter()
            .filter(|c| !(c.is_recognized_number() && deleted_numbers.contains(&c.number)))
            .collect()
    }
}

/// Decides which stored chapters survive when their source drops them.
pub trait ChapterPinPolicy: Send + Sync {
    /// Returns `true` if `chapter` must be kept even though the source no longer lists it.
    fn is_pinned(&self, chapter: &Chapter) -> bool;
}

/// Built-in pin policies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PinPolicy {
    /// Every chapter missing at the source is deleted
    Never,
    /// Bookmarked chapters are kept
    #[default]
    Bookmarked,
    /// Bookmarked chapters and unread chapters with reading progress are kept
    BookmarkedOrInProgress,
}

impl ChapterPinPolicy for PinPolicy {
    fn is_pinned(&self, chapter: &Chapter) -> bool {
        match self {
            PinPolicy::Never => false,
            PinPolicy::Bookmarked => chapter.bookmark,
            PinPolicy::BookmarkedOrInProgress => {
                chapter.bookmark || (!chapter.read && chapter.progress > 0)
            }
        }
    }
}

/// Drops earlier entries that share a key with a later one.
///
/// Surviving entries keep their relative order.
fn dedupe_by_key(infos: Vec<ChapterInfo>) -> Vec<ChapterInfo> {
    let mut seen = HashSet::new();
    let mut kept: Vec<ChapterInfo> = Vec::with_capacity(infos.len());

    for info in infos.into_iter().rev() {
        if seen.contains(&info.key) {
            warn!(key = %info.key, name = %info.name, "Source listed chapter key twice, dropping earlier entry");
            continue;
        }
        seen.insert(info.key.clone());
        kept.push(info);
    }

    kept.reverse();
    kept
}

/// Turns a fetched chapter list into unsaved chapter records for `manga`.
///
/// `source_order` is the position in the de-duplicated list. `date_fetch` counts down
/// from `now + local_count`, so that sorting by fetch date keeps the source's order.
pub(crate) fn build_source_chapters(
    manga: &Manga,
    infos: Vec<ChapterInfo>,
    number_regex: Option<&Regex>,
    local_count: usize,
    now: i64,
) -> Vec<Chapter> {
    let end_date_fetch = now + local_count as i64;

    dedupe_by_key(infos)
        .into_iter()
        .enumerate()
        .map(|(i, info)| {
            let number = if info.has_number() {
                info.number
            } else {
                recognition::parse(&info.name, &manga.title, number_regex)
            };

            Chapter {
                id: UNSAVED_ID,
                manga_id: manga.id,
                key: info.key,
                name: info.name,
                read: false,
                bookmark: false,
                progress: 0,
                date_upload: info.date_upload,
                date_fetch: end_date_fetch - i as i64,
                source_order: i as i32,
                number,
                scanlator: info.scanlator,
            }
        })
        .collect()
}

/// Computes the changes that bring `local` in line with `source`.
///
/// `source` must not contain duplicate keys. Chapters are matched by exact key.
///
/// An added chapter whose recognized number equals that of a deleted, read chapter is
/// added as read: the source re-keyed a chapter the user had already read.
pub fn compute_diff(
    local: &[Chapter],
    source: &[Chapter],
    pin_policy: &dyn ChapterPinPolicy,
) -> Diff {
    let local_by_key: HashMap<&str, &Chapter> =
        local.iter().map(|c| (c.key.as_str(), c)).collect();
    let source_keys: HashSet<&str> = source.iter().map(|c| c.key.as_str()).collect();

    let deleted: Vec<Chapter> = local
        .iter()
        .filter(|c| !source_keys.contains(c.key.as_str()))
        .filter(|c| {
            let pinned = pin_policy.is_pinned(c);
            if pinned {
                debug!(key = %c.key, "Keeping pinned chapter missing from source");
            }
            !pinned
        })
        .cloned()
        .collect();

    let read_numbers: Vec<f32> = deleted
        .iter()
        .filter(|c| c.read && c.is_recognized_number())
        .map(|c| c.number)
        .collect();

    let mut added = Vec::new();
    let mut updated = Vec::new();

    for chapter in source {
        match local_by_key.get(chapter.key.as_str()) {
            None => {
                let mut new = chapter.clone();
                new.id = UNSAVED_ID;
                new.bookmark = false;
                new.progress = 0;
                new.read = new.is_recognized_number() && read_numbers.contains(&new.number);
                added.push(new);
            }
            Some(stored) => {
                let update = source_changes(stored, chapter);
                if !update.is_empty() {
                    updated.push(update);
                }
            }
        }
    }

    Diff {
        added,
        deleted,
        updated,
    }
}

/// Builds an update of the source-owned fields that differ between `stored` and `fetched`.
fn source_changes(stored: &Chapter, fetched: &Chapter) -> ChapterUpdate {
    fn changed<T: PartialEq + Clone>(stored: &T, fetched: &T) -> Patch<T> {
        if stored == fetched {
            Patch::Unset
        } else {
            Patch::Set(fetched.clone())
        }
    }

    ChapterUpdate {
        name: changed(&stored.name, &fetched.name),
        number: changed(&stored.number, &fetched.number),
        scanlator: changed(&stored.scanlator, &fetched.scanlator),
        date_upload: changed(&stored.date_upload, &fetched.date_upload),
        source_order: changed(&stored.source_order, &fetched.source_order),
        ..ChapterUpdate::new(stored.id)
    }
}

/// Synchronizes the stored chapters of a manga with its source.
///
/// Cheap to share: all collaborators are reference counted.
#[derive(Clone)]
pub struct SyncChaptersFromSource {
    chapters: Arc<dyn ChapterRepository>,
    sources: Arc<SourceRegistry>,
    pin_policy: Arc<dyn ChapterPinPolicy>,
}

impl SyncChaptersFromSource {
    /// Creates a synchronizer with the default [`PinPolicy`].
    pub fn new(chapters: Arc<dyn ChapterRepository>, sources: Arc<SourceRegistry>) -> Self {
        Self {
            chapters,
            sources,
            pin_policy: Arc::new(PinPolicy::default()),
        }
    }

    /// Creates a synchronizer with the pin policy chosen in `config`.
    pub fn from_config(
        config: &Config,
        chapters: Arc<dyn ChapterRepository>,
        sources: Arc<SourceRegistry>,
    ) -> Self {
        Self::new(chapters, sources).with_pin_policy(Arc::new(config.pin_policy))
    }

    /// Replaces the policy deciding which orphaned chapters are kept.
    pub fn with_pin_policy(mut self, pin_policy: Arc<dyn ChapterPinPolicy>) -> Self {
        self.pin_policy = pin_policy;
        self
    }

    /// Fetches the manga's chapters from its source and commits the resulting diff.
    ///
    /// Returns the committed diff; an empty diff means storage was not touched.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] - If the manga's source is not registered
    /// * [`Error::Source`] - If the source fails or returns no chapters
    /// * Any error of the chapter repository; the commit is then rolled back entirely
    pub async fn sync(&self, manga: &Manga) -> Result<Diff> {
        let source = self
            .sources
            .get(manga.source_id)
            .ok_or_else(|| Error::not_found(format!("source {}", manga.source_id)))?;

        let infos = source.fetch_chapter_list(&manga.to_info()).await?;
        if infos.is_empty() {
            return Err(Error::source(manga.source_id, "No chapters found"));
        }

        let local = self.chapters.get_chapters(manga.id).await?;
        let now = chrono::Utc::now().timestamp_millis();
        let source_chapters = build_source_chapters(
            manga,
            infos,
            source.chapter_number_regex(),
            local.len(),
            now,
        );

        let diff = compute_diff(&local, &source_chapters, self.pin_policy.as_ref());
        if diff.is_empty() {
            debug!(manga_id = manga.id, "Chapters already in sync");
            return Ok(diff);
        }

        self.chapters.sync_chapters(&diff, &source_chapters).await?;
        info!(
            manga_id = manga.id,
            added = diff.added.len(),
            updated = diff.updated.len(),
            deleted = diff.deleted.len(),
            "Synchronized chapters"
        );
        Ok(diff)
    }
}
