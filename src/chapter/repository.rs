//! Chapter persistence contract.

use async_trait::async_trait;
use tokio::sync::watch;

use super::model::{Chapter, ChapterUpdate};
use super::sync::Diff;
use crate::error::Result;

/// Storage of chapters, keyed by id and by `(manga_id, key)`.
///
/// The synchronizer only talks to storage through [`sync_chapters`] and [`sync_chapter`],
/// which must commit atomically: when they return `Err`, nothing they were asked to do
/// is visible to readers or subscribers.
///
/// [`sync_chapters`]: ChapterRepository::sync_chapters
/// [`sync_chapter`]: ChapterRepository::sync_chapter
#[async_trait]
pub trait ChapterRepository: Send + Sync {
    /// Subscribes to the chapters of a manga.
    ///
    /// The receiver holds the current list immediately and sees a new list after every
    /// committed change to that manga's chapters, ordered by `source_order`.
    fn subscribe_chapters(&self, manga_id: i64) -> watch::Receiver<Vec<Chapter>>;

    /// Returns the stored chapters of a manga ordered by `source_order`.
    async fn get_chapters(&self, manga_id: i64) -> Result<Vec<Chapter>>;

    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>>;

    async fn get_chapter_by_key(&self, key: &str, manga_id: i64) -> Result<Option<Chapter>>;

    /// Inserts or replaces whole records, returning them with their assigned ids.
    ///
    /// Records with `id <= 0` are inserted; others replace the stored record with the
    /// same id.
    async fn save_chapters(&self, chapters: Vec<Chapter>) -> Result<Vec<Chapter>>;

    /// Applies sparse updates, writing only the fields each update sets.
    async fn update_chapters(&self, updates: &[ChapterUpdate]) -> Result<()>;

    async fn delete_chapter(&self, id: i64) -> Result<()>;

    async fn delete_chapters(&self, ids: &[i64]) -> Result<()>;

    /// Commits a synchronization diff in one transaction.
    ///
    /// A chapter of `diff.deleted` whose stored read, bookmark or progress no longer match
    /// the record in the diff was edited after the diff was computed; it is kept.
    ///
    /// After the diff is applied, the `source_order` of every stored chapter whose key
    /// appears in `source_chapters` is set to that chapter's `source_order`.
    async fn sync_chapters(&self, diff: &Diff, source_chapters: &[Chapter]) -> Result<()>;

    /// Inserts a single chapter found at the source and realigns `source_order` like
    /// [`sync_chapters`](ChapterRepository::sync_chapters). Returns the stored record.
    async fn sync_chapter(&self, chapter: &Chapter, source_chapters: &[Chapter])
    -> Result<Chapter>;
}
