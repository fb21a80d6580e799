//! Chapter synchronization tests
//!
//! Runs [`SyncChaptersFromSource`] and [`FindOrInitChapter`] against the in-memory chapter
//! repository and a source whose chapter list each test controls.

use async_trait::async_trait;
use hondana::chapter::{
    Chapter, ChapterRepository, ChapterUpdate, Diff, FindOrInitChapter,
    InMemoryChapterRepository, Patch, PinPolicy, SyncChaptersFromSource,
};
use hondana::config::Config;
use hondana::error::{Error, Result};
use hondana::source::SourceRegistry;
use pretty_assertions::assert_eq;
use std::sync::Arc;
use tokio::sync::watch;

mod common;
use common::{FakeSource, info, init_test_logging, keys, manga};

const SOURCE_ID: i64 = 100;

struct Fixture {
    source: Arc<FakeSource>,
    registry: Arc<SourceRegistry>,
    chapters: Arc<InMemoryChapterRepository>,
}

impl Fixture {
    fn new() -> Self {
        init_test_logging();
        let source = Arc::new(FakeSource::new(SOURCE_ID, "Fake"));
        let registry = Arc::new(SourceRegistry::new());
        registry.register_source(source.clone(), false);

        Self {
            source,
            registry,
            chapters: Arc::new(InMemoryChapterRepository::new()),
        }
    }

    fn sync(&self) -> SyncChaptersFromSource {
        SyncChaptersFromSource::new(self.chapters.clone(), self.registry.clone())
    }

    async fn stored(&self) -> Vec<Chapter> {
        self.chapters.get_chapters(1).await.unwrap()
    }

    async fn stored_by_key(&self, key: &str) -> Chapter {
        self.chapters
            .get_chapter_by_key(key, 1)
            .await
            .unwrap()
            .unwrap_or_else(|| panic!("chapter {} should be stored", key))
    }
}

fn three_chapters() -> Vec<hondana::types::ChapterInfo> {
    vec![
        info("c3", "Chapter 3"),
        info("c2", "Chapter 2"),
        info("c1", "Chapter 1"),
    ]
}

/// Delegates to an in-memory repository but refuses every sync commit.
struct RefusingRepository {
    inner: InMemoryChapterRepository,
}

#[async_trait]
impl ChapterRepository for RefusingRepository {
    fn subscribe_chapters(&self, manga_id: i64) -> watch::Receiver<Vec<Chapter>> {
        self.inner.subscribe_chapters(manga_id)
    }

    async fn get_chapters(&self, manga_id: i64) -> Result<Vec<Chapter>> {
        self.inner.get_chapters(manga_id).await
    }

    async fn get_chapter(&self, id: i64) -> Result<Option<Chapter>> {
        self.inner.get_chapter(id).await
    }

    async fn get_chapter_by_key(&self, key: &str, manga_id: i64) -> Result<Option<Chapter>> {
        self.inner.get_chapter_by_key(key, manga_id).await
    }

    async fn save_chapters(&self, chapters: Vec<Chapter>) -> Result<Vec<Chapter>> {
        self.inner.save_chapters(chapters).await
    }

    async fn update_chapters(&self, updates: &[ChapterUpdate]) -> Result<()> {
        self.inner.update_chapters(updates).await
    }

    async fn delete_chapter(&self, id: i64) -> Result<()> {
        self.inner.delete_chapter(id).await
    }

    async fn delete_chapters(&self, ids: &[i64]) -> Result<()> {
        self.inner.delete_chapters(ids).await
    }

    async fn sync_chapters(&self, _diff: &Diff, _source_chapters: &[Chapter]) -> Result<()> {
        Err(Error::storage("disk full"))
    }

    async fn sync_chapter(&self, chapter: &Chapter, source_chapters: &[Chapter]) -> Result<Chapter> {
        self.inner.sync_chapter(chapter, source_chapters).await
    }
}

#[cfg(test)]
mod sync_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_first_sync_stores_source_chapters() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());

        let diff = f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert_eq!(diff.added.len(), 3);
        assert!(diff.deleted.is_empty());
        assert_eq!(diff.notified_added().len(), 3);

        let stored = f.stored().await;
        assert_eq!(keys(&stored), vec!["c3", "c2", "c1"]);
        let numbers: Vec<f32> = stored.iter().map(|c| c.number).collect();
        assert_eq!(numbers, vec![3.0, 2.0, 1.0]);
        assert!(stored.iter().all(|c| c.id > 0 && !c.read && !c.bookmark));
        // Most recent first keeps the latest fetch date
        assert!(stored[0].date_fetch > stored[2].date_fetch);
    }

    #[tokio::test]
    async fn test_second_sync_is_empty() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let sync = f.sync();
        let manga = manga(1, SOURCE_ID);

        sync.sync(&manga).await.unwrap();
        let before = f.stored().await;

        let diff = sync.sync(&manga).await.unwrap();

        assert!(diff.is_empty());
        assert_eq!(f.stored().await, before);
    }

    #[tokio::test]
    async fn test_sync_preserves_user_fields() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let sync = f.sync();
        let manga = manga(1, SOURCE_ID);
        sync.sync(&manga).await.unwrap();

        let c2 = f.stored_by_key("c2").await;
        f.chapters
            .update_chapters(&[ChapterUpdate {
                read: Patch::Set(true),
                bookmark: Patch::Set(true),
                progress: Patch::Set(12),
                ..ChapterUpdate::new(c2.id)
            }])
            .await
            .unwrap();

        let mut renamed = info("c2", "Chapter 2 - The Return");
        renamed.scanlator = Some("Group".to_string());
        f.source.set_chapters(vec![
            info("c4", "Chapter 4"),
            info("c3", "Chapter 3"),
            renamed,
            info("c1", "Chapter 1"),
        ]);

        let diff = sync.sync(&manga).await.unwrap();
        assert_eq!(keys(&diff.added), vec!["c4"]);

        let after = f.stored_by_key("c2").await;
        assert_eq!(after.id, c2.id);
        assert_eq!(after.name, "Chapter 2 - The Return");
        assert_eq!(after.scanlator.as_deref(), Some("Group"));
        assert_eq!(after.source_order, 2);
        assert!(after.read);
        assert!(after.bookmark);
        assert_eq!(after.progress, 12);

        let update = diff.updated.iter().find(|u| u.id == c2.id).unwrap();
        assert!(!update.touches_user_fields());
    }

    #[tokio::test]
    async fn test_duplicate_keys_keep_last_entry() {
        let f = Fixture::new();
        f.source.set_chapters(vec![
            info("a", "First listing"),
            info("b", "Chapter 2"),
            info("a", "Second listing"),
        ]);

        f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();

        let stored = f.stored().await;
        assert_eq!(keys(&stored), vec!["b", "a"]);
        assert_eq!(stored[1].name, "Second listing");
    }

    #[tokio::test]
    async fn test_rekeyed_read_chapter_stays_read() {
        let f = Fixture::new();
        f.source.set_chapters(vec![info("old", "Chapter 5")]);
        let sync = f.sync();
        let manga = manga(1, SOURCE_ID);
        sync.sync(&manga).await.unwrap();

        let old = f.stored_by_key("old").await;
        f.chapters
            .update_chapters(&[ChapterUpdate {
                read: Patch::Set(true),
                ..ChapterUpdate::new(old.id)
            }])
            .await
            .unwrap();

        f.source.set_chapters(vec![info("new", "Chapter 5")]);
        let diff = sync.sync(&manga).await.unwrap();

        assert_eq!(keys(&diff.deleted), vec!["old"]);
        assert!(diff.notified_added().is_empty());
        assert!(f.stored_by_key("new").await.read);
        assert_eq!(keys(&f.stored().await), vec!["new"]);
    }

    #[tokio::test]
    async fn test_subscribers_see_committed_chapters() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let mut updates = f.chapters.subscribe_chapters(1);
        assert!(updates.borrow_and_update().is_empty());

        f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert!(updates.has_changed().unwrap());
        assert_eq!(keys(&updates.borrow_and_update()), vec!["c3", "c2", "c1"]);

        // A no-op sync publishes nothing
        f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();
        assert!(!updates.has_changed().unwrap());
    }
}

#[cfg(test)]
mod pin_policy_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    async fn bookmarked_and_in_progress(f: &Fixture) {
        f.source.set_chapters(three_chapters());
        f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();

        let c1 = f.stored_by_key("c1").await;
        let c2 = f.stored_by_key("c2").await;
        f.chapters
            .update_chapters(&[
                ChapterUpdate {
                    bookmark: Patch::Set(true),
                    ..ChapterUpdate::new(c1.id)
                },
                ChapterUpdate {
                    progress: Patch::Set(4),
                    ..ChapterUpdate::new(c2.id)
                },
            ])
            .await
            .unwrap();

        // The source drops every chapter but c3
        f.source.set_chapters(vec![info("c3", "Chapter 3")]);
    }

    fn sorted(mut keys: Vec<String>) -> Vec<String> {
        keys.sort();
        keys
    }

    #[tokio::test]
    async fn test_default_policy_keeps_bookmarked() {
        let f = Fixture::new();
        bookmarked_and_in_progress(&f).await;

        let diff = f.sync().sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert_eq!(keys(&diff.deleted), vec!["c2"]);
        assert_eq!(sorted(keys(&f.stored().await)), vec!["c1", "c3"]);
    }

    #[tokio::test]
    async fn test_in_progress_policy_keeps_started_chapters() {
        let f = Fixture::new();
        bookmarked_and_in_progress(&f).await;

        let sync = f.sync().with_pin_policy(Arc::new(PinPolicy::BookmarkedOrInProgress));
        let diff = sync.sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert!(diff.deleted.is_empty());
        assert_eq!(sorted(keys(&f.stored().await)), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_configured_policy_keeps_in_progress_chapters() {
        let f = Fixture::new();
        bookmarked_and_in_progress(&f).await;

        let config: Config =
            serde_json::from_str(r#"{ "pin_policy": "bookmarked_or_in_progress" }"#).unwrap();
        let sync =
            SyncChaptersFromSource::from_config(&config, f.chapters.clone(), f.registry.clone());
        let diff = sync.sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert!(diff.deleted.is_empty());
        assert_eq!(sorted(keys(&f.stored().await)), vec!["c1", "c2", "c3"]);
    }

    #[tokio::test]
    async fn test_never_policy_mirrors_source() {
        let f = Fixture::new();
        bookmarked_and_in_progress(&f).await;

        let sync = f.sync().with_pin_policy(Arc::new(PinPolicy::Never));
        sync.sync(&manga(1, SOURCE_ID)).await.unwrap();

        assert_eq!(keys(&f.stored().await), vec!["c3"]);
    }
}

#[cfg(test)]
mod failure_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unregistered_source_is_not_found() {
        let f = Fixture::new();

        let result = f.sync().sync(&manga(1, 999)).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_source_list_is_an_error() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let sync = f.sync();
        sync.sync(&manga(1, SOURCE_ID)).await.unwrap();

        f.source.set_chapters(Vec::new());
        let result = sync.sync(&manga(1, SOURCE_ID)).await;

        assert!(matches!(result, Err(Error::Source { message, .. }) if message == "No chapters found"));
        assert_eq!(f.stored().await.len(), 3);
    }

    #[tokio::test]
    async fn test_source_failure_leaves_chapters() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let sync = f.sync();
        sync.sync(&manga(1, SOURCE_ID)).await.unwrap();

        f.source.set_failing(true);

        assert!(sync.sync(&manga(1, SOURCE_ID)).await.is_err());
        assert_eq!(keys(&f.stored().await), vec!["c3", "c2", "c1"]);
    }

    #[tokio::test]
    async fn test_refused_commit_changes_nothing() {
        let f = Fixture::new();
        let repository = Arc::new(RefusingRepository {
            inner: InMemoryChapterRepository::new(),
        });
        f.source.set_chapters(three_chapters());

        let sync = SyncChaptersFromSource::new(repository.clone(), f.registry.clone());
        let result = sync.sync(&manga(1, SOURCE_ID)).await;

        assert!(matches!(result, Err(Error::Storage(_))));
        assert!(repository.get_chapters(1).await.unwrap().is_empty());
    }
}

#[cfg(test)]
mod find_or_init_tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[tokio::test]
    async fn test_unknown_chapter_is_fetched_and_stored() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let find = FindOrInitChapter::new(f.chapters.clone(), f.registry.clone());
        let manga = manga(1, SOURCE_ID);

        let chapter = find.find("c2", &manga).await.unwrap();

        assert!(chapter.id > 0);
        assert_eq!(chapter.key, "c2");
        assert_eq!(chapter.number, 2.0);
        assert_eq!(chapter.source_order, 1);
        assert_eq!(keys(&f.stored().await), vec!["c2"]);

        // Stored now, so the source is not asked again
        f.source.set_failing(true);
        assert_eq!(find.find("c2", &manga).await.unwrap().id, chapter.id);

        // A later sync fills in the rest around it
        f.source.set_failing(false);
        let diff = f.sync().sync(&manga).await.unwrap();
        assert_eq!(diff.added.len(), 2);
        assert_eq!(f.stored_by_key("c2").await.id, chapter.id);
    }

    #[tokio::test]
    async fn test_chapter_missing_at_source_is_not_found() {
        let f = Fixture::new();
        f.source.set_chapters(three_chapters());
        let find = FindOrInitChapter::new(f.chapters.clone(), f.registry.clone());

        let result = find.find("c9", &manga(1, SOURCE_ID)).await;

        assert!(matches!(result, Err(Error::NotFound(_))));
        assert!(f.stored().await.is_empty());
    }
}
