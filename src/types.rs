//! Data types exchanged with content sources.
//!
//! These are the shapes a [`Source`](crate::source::Source) speaks. They carry only what
//! the source knows; local bookkeeping (ids, read state, ordering) lives in
//! [`chapter::Chapter`](crate::chapter::Chapter) and [`chapter::Manga`](crate::chapter::Manga).
//!
//! - [`MangaInfo`] - A manga as described by its source
//! - [`ChapterInfo`] - A chapter entry from a source's chapter list
//! - [`MangaStatus`] - Publication status reported by the source
//!
//! # Examples
//!
//! ```rust
//! use hondana::types::*;
//!
//! let manga = MangaInfo::new("/title/one-piece", "One Piece");
//! let chapter = ChapterInfo {
//!     key: "/chapter/1".to_string(),
//!     name: "Chapter 1: Romance Dawn".to_string(),
//!     date_upload: 0,
//!     number: -1.0,
//!     scanlator: None,
//! };
//! assert!(!chapter.has_number());
//! ```

use serde::{Deserialize, Serialize};

/// Represents a manga as reported by its source.
///
/// The `key` is source-assigned and stable; it is what the source needs to fetch the
/// manga's details and chapters again later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MangaInfo {
    /// Source-assigned stable key
    pub key: String,

    /// Main title
    pub title: String,

    #[serde(default)]
    pub artist: String,

    #[serde(default)]
    pub author: String,

    #[serde(default)]
    pub description: String,

    /// Tags/genres
    #[serde(default)]
    pub genres: Vec<String>,

    #[serde(default)]
    pub status: MangaStatus,

    /// Cover image URL
    #[serde(default)]
    pub cover: String,
}

impl MangaInfo {
    /// Creates a manga description with only a key and a title.
    ///
    /// This is what callers usually have when asking a source for chapters.
    pub fn new(key: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            title: title.into(),
            artist: String::new(),
            author: String::new(),
            description: String::new(),
            genres: Vec::new(),
            status: MangaStatus::Unknown,
            cover: String::new(),
        }
    }
}

/// Publication status of a manga.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MangaStatus {
    #[default]
    Unknown,
    Ongoing,
    Completed,
    Licensed,
}

/// A single entry of a source's chapter list.
///
/// # Fields
///
/// * `key` - Source-assigned key, unique within the manga and never reused
/// * `name` - Display name, also used for chapter number recognition
/// * `date_upload` - Upload time in milliseconds since the epoch, `0` when unknown
/// * `number` - Chapter number when the source knows it, negative otherwise
/// * `scanlator` - Scanlation group, when the source reports one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChapterInfo {
    pub key: String,

    pub name: String,

    #[serde(default)]
    pub date_upload: i64,

    #[serde(default = "unknown_number")]
    pub number: f32,

    #[serde(default)]
    pub scanlator: Option<String>,
}

fn unknown_number() -> f32 {
    -1.0
}

impl ChapterInfo {
    /// Returns `true` when the source supplied a usable chapter number.
    pub fn has_number(&self) -> bool {
        self.number >= 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chapter_info_defaults_from_json() {
        let chapter: ChapterInfo =
            serde_json::from_str(r#"{"key":"c1","name":"Chapter 1"}"#).unwrap();

        assert_eq!(chapter.number, -1.0);
        assert!(!chapter.has_number());
        assert_eq!(chapter.date_upload, 0);
        assert!(chapter.scanlator.is_none());
    }

    #[test]
    fn test_manga_status_serializes_snake_case() {
        let json = serde_json::to_string(&MangaStatus::Ongoing).unwrap();
        assert_eq!(json, "\"ongoing\"");
    }
}
