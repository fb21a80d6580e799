//! Chapter lookup by key, initializing the chapter from its source when needed.

use std::sync::Arc;
use tracing::debug;

use super::model::{Chapter, Manga};
use super::repository::ChapterRepository;
use super::sync::build_source_chapters;
use crate::error::{Error, Result};
use crate::source::SourceRegistry;

/// Looks up a chapter by key, pulling it from the source when it isn't stored yet.
///
/// Used when a chapter is opened through a link before the manga was ever synced.
#[derive(Clone)]
pub struct FindOrInitChapter {
    chapters: Arc<dyn ChapterRepository>,
    sources: Arc<SourceRegistry>,
}

impl FindOrInitChapter {
    pub fn new(chapters: Arc<dyn ChapterRepository>, sources: Arc<SourceRegistry>) -> Self {
        Self { chapters, sources }
    }

    /// Returns the stored chapter `key` of `manga`, fetching and storing it first if needed.
    ///
    /// # Errors
    ///
    /// * [`Error::NotFound`] - If the source is not registered or does not list `key`
    /// * [`Error::Source`] - If the source fails or returns no chapters
    pub async fn find(&self, key: &str, manga: &Manga) -> Result<Chapter> {
        if let Some(chapter) = self.chapters.get_chapter_by_key(key, manga.id).await? {
            return Ok(chapter);
        }

        let source = self
            .sources
            .get(manga.source_id)
            .ok_or_else(|| Error::not_found(format!("source {}", manga.source_id)))?;

        let infos = source.fetch_chapter_list(&manga.to_info()).await?;
        if infos.is_empty() {
            return Err(Error::source(manga.source_id, "No chapters found"));
        }

        let now = chrono::Utc::now().timestamp_millis();
        let source_chapters =
            build_source_chapters(manga, infos, source.chapter_number_regex(), 0, now);

        let chapter = source_chapters
            .iter()
            .find(|c| c.key == key)
            .ok_or_else(|| {
                Error::not_found(format!("chapter {} in source list of {}", key, manga.key))
            })?;

        debug!(manga_id = manga.id, key, "Storing chapter found at source");
        self.chapters.sync_chapter(chapter, &source_chapters).await
    }
}
