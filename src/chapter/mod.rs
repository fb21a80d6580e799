//! Stored chapters and their synchronization with sources.
//!
//! - [`model`] - [`Chapter`], [`Manga`] and sparse [`ChapterUpdate`]s
//! - [`repository`] - The [`ChapterRepository`] storage contract
//! - [`sync`] - [`SyncChaptersFromSource`] and the pure [`compute_diff`]
//! - [`recognition`] - Chapter numbers guessed from chapter names

pub mod find;
pub mod memory;
pub mod model;
pub mod recognition;
pub mod repository;
pub mod sync;

pub use find::FindOrInitChapter;
pub use memory::InMemoryChapterRepository;
pub use model::{Chapter, ChapterUpdate, Manga, Patch, UNRECOGNIZED_NUMBER, UNSAVED_ID};
pub use repository::ChapterRepository;
pub use sync::{ChapterPinPolicy, Diff, PinPolicy, SyncChaptersFromSource, compute_diff};
