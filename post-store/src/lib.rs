//! Deduplication state for republished posts.
//!
//! A post is identified only by its sanitized title. The store answers
//! "has this title been published?" and records new publications; the
//! [`DirectoryStore`] adapter keeps one directory per published title.

pub mod directory;
pub mod sanitize;


pub use directory::DirectoryStore;
pub use sanitize::{sanitize_title, Sanitizer, DEFAULT_MAX_TITLE_LENGTH, FORBIDDEN_CHARS};

use repostbot_core::CoreError;
use std::path::PathBuf;

pub trait PostStore: Send {
    /// Whether `title` (after sanitizing) has already been published.
    fn contains(&self, title: &str) -> bool;

    /// Record `title` as published. Returns `true` if it was not present before.
    fn insert(&mut self, title: &str) -> Result<bool, CoreError>;

    /// Folder where content for `title` is kept.
    fn entry_dir(&self, title: &str) -> PathBuf;

    /// Sanitized key for `title`. Fails with `StoreError::InvalidKey` when
    /// the title has no usable entry name (empty, `.` or `..`).
    fn key_for(&self, title: &str) -> Result<String, CoreError>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
