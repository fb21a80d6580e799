//! In-memory chapter storage.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tokio::sync::watch;
use tracing::debug;

use super::model::{Chapter, ChapterUpdate};
use super::repository::ChapterRepository;
use super::sync::Diff;
use crate::error::{Error, Result};

/// A [`ChapterRepository`] kept entirely in memory.
///
/// Every write runs as a transaction on a copy of the table which replaces the live table
/// only when the whole operation succeeded, so a failed batch leaves nothing behind.
/// Subscribers of each manga touched by a committed transaction receive the new list.
///
/// # Examples
///
/// ```rust
/// use hondana::chapter::{ChapterRepository, InMemoryChapterRepository};
///
/// #[tokio::main]
/// async fn main() -> hondana::Result<()> {
///     let repository = InMemoryChapterRepository::new();
///     let mut chapters = repository.subscribe_chapters(1);
///
///     assert!(chapters.borrow_and_update().is_empty());
///     assert!(repository.get_chapter(42).await?.is_none());
///     Ok(())
/// }
/// ```
#[derive(Default)]
pub struct InMemoryChapterRepository {
    table: Mutex<Table>,
    subscribers: Mutex<HashMap<i64, watch::Sender<Vec<Chapter>>>>,
}

#[derive(Clone, Default)]
struct Table {
    last_id: i64,
    chapters: BTreeMap<i64, Chapter>,
    by_key: HashMap<(i64, String), i64>,
}

impl Table {
    fn chapters_of(&self, manga_id: i64) -> Vec<Chapter> {
        let mut chapters: Vec<Chapter> = self
            .chapters
            .values()
            .filter(|c| c.manga_id == manga_id)
            .cloned()
            .collect();
        chapters.sort_by_key(|c| (c.source_order, c.id));
        chapters
    }

    fn find_by_key(&self, key: &str, manga_id: i64) -> Option<&Chapter> {
        self.by_key
            .get(&(manga_id, key.to_string()))
            .and_then(|id| self.chapters.get(id))
    }

    fn claim_key(&mut self, chapter: &Chapter) -> Result<()> {
        let index_key = (chapter.manga_id, chapter.key.clone());
        match self.by_key.get(&index_key) {
            Some(&owner) if owner != chapter.id => Err(Error::storage(format!(
                "chapter key {:?} already exists for manga {}",
                chapter.key, chapter.manga_id
            ))),
            _ => {
                self.by_key.insert(index_key, chapter.id);
                Ok(())
            }
        }
    }

    fn release_key(&mut self, chapter: &Chapter) {
        self.by_key.remove(&(chapter.manga_id, chapter.key.clone()));
    }

    fn save(&mut self, mut chapter: Chapter) -> Result<Chapter> {
        if chapter.id <= 0 {
            self.last_id += 1;
            chapter.id = self.last_id;
        } else {
            let previous = self
                .chapters
                .get(&chapter.id)
                .cloned()
                .ok_or_else(|| Error::storage(format!("chapter {} does not exist", chapter.id)))?;
            self.release_key(&previous);
        }

        self.claim_key(&chapter)?;
        self.chapters.insert(chapter.id, chapter.clone());
        Ok(chapter)
    }

    fn update(&mut self, update: &ChapterUpdate) -> Result<(i64, i64)> {
        let mut chapter = self
            .chapters
            .get(&update.id)
            .cloned()
            .ok_or_else(|| Error::storage(format!("chapter {} does not exist", update.id)))?;
        let previous_manga = chapter.manga_id;

        self.release_key(&chapter);
        chapter.apply(update);
        self.claim_key(&chapter)?;

        let manga_id = chapter.manga_id;
        self.chapters.insert(chapter.id, chapter);
        Ok((previous_manga, manga_id))
    }

    fn delete(&mut self, id: i64) -> Option<Chapter> {
        let chapter = self.chapters.remove(&id)?;
        self.release_key(&chapter);
        Some(chapter)
    }

    fn realign(&mut self, source_chapters: &[Chapter]) {
        for source in source_chapters {
            let id = self.by_key.get(&(source.manga_id, source.key.clone())).copied();
            if let Some(stored) = id.and_then(|id| self.chapters.get_mut(&id)) {
                stored.source_order = source.source_order;
            }
        }
    }
}

impl InMemoryChapterRepository {
    /// Creates an empty repository.
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `op` against a copy of the table and commits the copy if it succeeds.
    ///
    /// `op` records the manga ids it touches; their subscribers are notified after the
    /// commit, while the table lock is still held so notifications follow commit order.
    fn transaction<T>(
        &self,
        op: impl FnOnce(&mut Table, &mut BTreeSet<i64>) -> Result<T>,
    ) -> Result<T> {
        let mut table = self.table.lock();
        let mut draft = table.clone();
        let mut touched = BTreeSet::new();

        let value = op(&mut draft, &mut touched)?;
        *table = draft;

        let subscribers = self.subscribers.lock();
        for manga_id in touched {
            if let Some(sender) = subscribers.get(&manga_id) {
                sender.send_replace(table.chapters_of(manga_id));
            }
        }
        Ok(value)
    }
}

#[async_trait]
impl ChapterRepository for InMemoryChapterRepository {
    fn subscribe_chapters(&self, manga_id: i64) -> watch::Receiver<Vec<Chapter>> {
        let table = self.table.lock();
        let mut subscribers = self.subscribers.lock();
        subscribers
            .entry(manga_id)
            .or_insert_with(|| watch::channel(table.chapters_of(manga_id)).0)
            .subscribe()
    }

    async fn get_chapters(&self, manga_id: i64) -> Result<Vec<Chapter>> {
        Ok(self.table.lock().chapters_of(manga_id))
    }

    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        Ok(self.table.lock().chapters.get(&id).cloned())
    }

    async fn get_chapter_by_key(&self, key: &str, manga_id: i64) -> Result<Option<Chapter>> {
        Ok(self.table.lock().find_by_key(key, manga_id).cloned())
    }

    async fn save_chapters(&self, chapters: Vec<Chapter>) -> Result<Vec<Chapter>> {
        self.transaction(|table, touched| {
            let mut saved = Vec::with_capacity(chapters.len());
            for chapter in chapters {
                if let Some(previous) = table.chapters.get(&chapter.id) {
                    touched.insert(previous.manga_id);
                }
                touched.insert(chapter.manga_id);
                saved.push(table.save(chapter)?);
            }
            Ok(saved)
        })
    }

    async fn update_chapters(&self, updates: &[ChapterUpdate]) -> Result<()> {
        self.transaction(|table, touched| {
            for update in updates {
                let (before, after) = table.update(update)?;
                touched.insert(before);
                touched.insert(after);
            }
            Ok(())
        })
    }

    async fn delete_chapter(&self, id: i64) -> Result<()> {
        self.delete_chapters(&[id]).await
    }

    async fn delete_chapters(&self, ids: &[i64]) -> Result<()> {
        self.transaction(|table, touched| {
            for &id in ids {
                if let Some(chapter) = table.delete(id) {
                    touched.insert(chapter.manga_id);
                }
            }
            Ok(())
        })
    }

    async fn sync_chapters(&self, diff: &Diff, source_chapters: &[Chapter]) -> Result<()> {
        self.transaction(|table, touched| {
            for chapter in &diff.deleted {
                match table.chapters.get(&chapter.id) {
                    Some(current) if !current.same_user_state(chapter) => {
                        debug!(key = %chapter.key, "Keeping chapter edited during sync");
                    }
                    Some(_) => {
                        if let Some(removed) = table.delete(chapter.id) {
                            touched.insert(removed.manga_id);
                        }
                    }
                    None => {}
                }
            }
            for update in &diff.updated {
                let (before, after) = table.update(update)?;
                touched.insert(before);
                touched.insert(after);
            }
            for chapter in &diff.added {
                touched.insert(chapter.manga_id);
                table.save(chapter.clone())?;
            }
            table.realign(source_chapters);
            touched.extend(source_chapters.iter().map(|c| c.manga_id));

            debug!(
                added = diff.added.len(),
                updated = diff.updated.len(),
                deleted = diff.deleted.len(),
                "Committed chapter diff"
            );
            Ok(())
        })
    }

    async fn sync_chapter(
        &self,
        chapter: &Chapter,
        source_chapters: &[Chapter],
    ) -> Result<Chapter> {
        self.transaction(|table, touched| {
            touched.insert(chapter.manga_id);
            let saved = table.save(chapter.clone())?;
            table.realign(source_chapters);
            table
                .chapters
                .get(&saved.id)
                .cloned()
                .ok_or_else(|| Error::storage(format!("chapter {} vanished", saved.id)))
        })
    }
}
