//! Local chapter records and sparse updates.

use serde::{Deserialize, Serialize};

use crate::types::MangaInfo;

/// Chapter number used when no number could be recognized.
pub const UNRECOGNIZED_NUMBER: f32 = -1.0;

/// Id carried by chapters that have not been stored yet.
pub const UNSAVED_ID: i64 = -1;

/// A manga as stored locally.
///
/// Only the fields the synchronizer needs: where it comes from and how to ask the
/// source about it again.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Manga {
    pub id: i64,
    pub source_id: i64,
    /// Source-assigned key
    pub key: String,
    pub title: String,
}

impl Manga {
    /// Returns the description a source needs to look this manga up.
    pub fn to_info(&self) -> MangaInfo {
        MangaInfo::new(self.key.clone(), self.title.clone())
    }
}

/// A stored chapter.
///
/// `(manga_id, key)` is unique. Fields fall in two groups: those fetched from the source
/// (`name`, `number`, `scanlator`, `date_upload`, `source_order`) and those owned by the
/// user (`read`, `bookmark`, `progress`). Synchronization only ever rewrites the first
/// group of an existing chapter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chapter {
    pub id: i64,
    pub manga_id: i64,
    pub key: String,
    pub name: String,
    pub read: bool,
    pub bookmark: bool,
    /// Last read page
    pub progress: i32,
    /// Milliseconds since the epoch
    pub date_upload: i64,
    /// Milliseconds since the epoch
    pub date_fetch: i64,
    pub source_order: i32,
    pub number: f32,
    pub scanlator: Option<String>,
}

impl Chapter {
    /// Returns `true` when `number` holds a recognized chapter number.
    pub fn is_recognized_number(&self) -> bool {
        self.number >= 0.0
    }

    /// Returns `true` if both records carry the same user-owned fields.
    pub fn same_user_state(&self, other: &Chapter) -> bool {
        self.read == other.read && self.bookmark == other.bookmark && self.progress == other.progress
    }

    /// Applies every `Set` field of `update` to this chapter.
    ///
    /// The update's `id` is not checked; callers match records before applying.
    pub fn apply(&mut self, update: &ChapterUpdate) {
        update.manga_id.apply_to(&mut self.manga_id);
        update.key.apply_to(&mut self.key);
        update.name.apply_to(&mut self.name);
        update.read.apply_to(&mut self.read);
        update.bookmark.apply_to(&mut self.bookmark);
        update.progress.apply_to(&mut self.progress);
        update.date_upload.apply_to(&mut self.date_upload);
        update.date_fetch.apply_to(&mut self.date_fetch);
        update.source_order.apply_to(&mut self.source_order);
        update.number.apply_to(&mut self.number);
        update.scanlator.apply_to(&mut self.scanlator);
    }
}

/// A field of a sparse update: either left alone or set to a value.
///
/// Unlike `Option<T>`, this keeps "leave unchanged" apart from "set to nothing" for
/// fields that are themselves optional (`Patch<Option<String>>`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum Patch<T> {
    #[default]
    Unset,
    Set(T),
}

impl<T: Clone> Patch<T> {
    /// Returns `true` if this patch carries a value.
    pub fn is_set(&self) -> bool {
        matches!(self, Patch::Set(_))
    }

    /// Overwrites `target` when set.
    pub fn apply_to(&self, target: &mut T) {
        if let Patch::Set(value) = self {
            *target = value.clone();
        }
    }
}

impl<T> From<T> for Patch<T> {
    fn from(value: T) -> Self {
        Patch::Set(value)
    }
}

/// Sparse update of a stored chapter.
///
/// Every field but `id` defaults to [`Patch::Unset`], so an update only touches what it
/// names.
///
/// ```rust
/// use hondana::chapter::{ChapterUpdate, Patch};
///
/// let mark_read = ChapterUpdate {
///     read: Patch::Set(true),
///     ..ChapterUpdate::new(12)
/// };
/// assert!(!mark_read.is_empty());
/// assert!(ChapterUpdate::new(12).is_empty());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChapterUpdate {
    pub id: i64,
    pub manga_id: Patch<i64>,
    pub key: Patch<String>,
    pub name: Patch<String>,
    pub read: Patch<bool>,
    pub bookmark: Patch<bool>,
    pub progress: Patch<i32>,
    pub date_upload: Patch<i64>,
    pub date_fetch: Patch<i64>,
    pub source_order: Patch<i32>,
    pub number: Patch<f32>,
    pub scanlator: Patch<Option<String>>,
}

impl ChapterUpdate {
    /// Creates an update for chapter `id` that changes nothing.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }

    /// Returns `true` if no field is set.
    pub fn is_empty(&self) -> bool {
        !(self.manga_id.is_set()
            || self.key.is_set()
            || self.name.is_set()
            || self.read.is_set()
            || self.bookmark.is_set()
            || self.progress.is_set()
            || self.date_upload.is_set()
            || self.date_fetch.is_set()
            || self.source_order.is_set()
            || self.number.is_set()
            || self.scanlator.is_set())
    }

    /// Returns `true` if the update writes any user-owned field.
    pub fn touches_user_fields(&self) -> bool {
        self.read.is_set() || self.bookmark.is_set() || self.progress.is_set()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chapter() -> Chapter {
        Chapter {
            id: 1,
            manga_id: 10,
            key: "c1".to_string(),
            name: "Chapter 1".to_string(),
            read: true,
            bookmark: false,
            progress: 7,
            date_upload: 100,
            date_fetch: 200,
            source_order: 0,
            number: 1.0,
            scanlator: Some("group".to_string()),
        }
    }

    #[test]
    fn test_apply_only_touches_set_fields() {
        let mut chapter = chapter();
        let update = ChapterUpdate {
            name: Patch::Set("Chapter 1 (fixed)".to_string()),
            scanlator: Patch::Set(None),
            ..ChapterUpdate::new(1)
        };

        chapter.apply(&update);

        assert_eq!(chapter.name, "Chapter 1 (fixed)");
        assert_eq!(chapter.scanlator, None);
        assert!(chapter.read);
        assert_eq!(chapter.progress, 7);
        assert_eq!(chapter.date_upload, 100);
    }

    #[test]
    fn test_recognized_number() {
        let mut chapter = chapter();
        assert!(chapter.is_recognized_number());
        chapter.number = UNRECOGNIZED_NUMBER;
        assert!(!chapter.is_recognized_number());
    }

    #[test]
    fn test_user_field_detection() {
        let update = ChapterUpdate {
            source_order: 3.into(),
            ..ChapterUpdate::new(1)
        };
        assert!(!update.touches_user_fields());

        let update = ChapterUpdate {
            progress: 3.into(),
            ..ChapterUpdate::new(1)
        };
        assert!(update.touches_user_fields());
    }
}
