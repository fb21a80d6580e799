use crate::{
    error::{Error, Result},
    source::Source,
    types::{ChapterInfo, MangaInfo, MangaStatus},
};
use async_trait::async_trait;

/// Upload date of the first test chapter, 2018-01-01T00:00:00Z in milliseconds
const FIRST_UPLOAD: i64 = 1_514_764_800_000;

/// One day in milliseconds
const DAY: i64 = 86_400_000;

/// Offline source returning a fixed catalog, used for testing and development builds
pub struct TestSource {
    chapter_count: usize,
}

impl TestSource {
    pub const ID: i64 = 1;

    /// Create a test source serving three chapters per manga
    pub fn new() -> Self {
        Self { chapter_count: 3 }
    }

    /// Create a test source serving `chapter_count` chapters per manga
    pub fn with_chapter_count(chapter_count: usize) -> Self {
        Self { chapter_count }
    }
}

impl Default for TestSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Source for TestSource {
    fn id(&self) -> i64 {
        Self::ID
    }

    fn name(&self) -> &str {
        "Test source"
    }

    fn lang(&self) -> &str {
        "en"
    }

    async fn fetch_manga_details(&self, manga: &MangaInfo) -> Result<MangaInfo> {
        // Titles look like "Manga 12"; the number picks the cover
        let pic_id = manga
            .title
            .split(' ')
            .nth(1)
            .and_then(|n| n.parse::<u32>().ok())
            .ok_or_else(|| Error::source(Self::ID, format!("Unknown manga: {}", manga.title)))?;

        Ok(MangaInfo {
            cover: format!("https://picsum.photos/300/400/?image={}", pic_id + 10),
            status: MangaStatus::Ongoing,
            ..manga.clone()
        })
    }

    async fn fetch_chapter_list(&self, _manga: &MangaInfo) -> Result<Vec<ChapterInfo>> {
        // Most recent first
        let chapters = (1..=self.chapter_count)
            .rev()
            .map(|n| ChapterInfo {
                key: n.to_string(),
                name: format!("Chapter {}", n),
                date_upload: FIRST_UPLOAD + (n as i64 - 1) * DAY,
                number: -1.0,
                scanlator: None,
            })
            .collect();

        Ok(chapters)
    }

    async fn fetch_page_list(&self, chapter: &ChapterInfo) -> Result<Vec<String>> {
        Ok((1..=2)
            .map(|page| format!("https://example.com/{}/page{}.jpg", chapter.key, page))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_chapters_are_most_recent_first() {
        let source = TestSource::with_chapter_count(4);
        let chapters = source
            .fetch_chapter_list(&MangaInfo::new("1", "Manga 1"))
            .await
            .unwrap();

        let keys: Vec<&str> = chapters.iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, vec!["4", "3", "2", "1"]);
        assert!(chapters[0].date_upload > chapters[3].date_upload);
    }

    #[tokio::test]
    async fn test_manga_details_sets_cover() {
        let source = TestSource::new();
        let details = source
            .fetch_manga_details(&MangaInfo::new("5", "Manga 5"))
            .await
            .unwrap();

        assert_eq!(details.cover, "https://picsum.photos/300/400/?image=15");
        assert_eq!(details.status, MangaStatus::Ongoing);

        let unknown = source
            .fetch_manga_details(&MangaInfo::new("x", "Nope"))
            .await;
        assert!(unknown.is_err());
    }
}
