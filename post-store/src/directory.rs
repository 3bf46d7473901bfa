use crate::sanitize::Sanitizer;
use crate::PostStore;
use repostbot_core::{CoreError, StoreError};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Post store backed by one directory per published title under a base folder.
///
/// Membership is loaded once by listing the base folder; afterwards the
/// in-memory set and the directories only grow. A directory is created
/// before its key is recorded, so every key has a directory behind it.
#[derive(Debug)]
pub struct DirectoryStore {
    base_folder: PathBuf,
    sanitizer: Sanitizer,
    entries: HashSet<String>,
}

impl DirectoryStore {
    /// Open (creating if needed) the store at `base_folder`.
    ///
    /// Unlike a silent empty store, an unreadable base folder is an error:
    /// starting without history would republish everything again.
    pub fn open(base_folder: impl Into<PathBuf>, sanitizer: Sanitizer) -> Result<Self, CoreError> {
        let base_folder = base_folder.into();

        if !base_folder.exists() {
            fs::create_dir_all(&base_folder).map_err(|e| load_failed(&base_folder, e))?;
            info!("Created post store folder {}", base_folder.display());
        }

        let entries = Self::scan(&base_folder)?;
        info!(
            "Post store loaded: {} posts found in {}",
            entries.len(),
            base_folder.display()
        );

        Ok(Self {
            base_folder,
            sanitizer,
            entries,
        })
    }

    fn scan(base_folder: &Path) -> Result<HashSet<String>, CoreError> {
        let mut entries = HashSet::new();
        let listing = fs::read_dir(base_folder).map_err(|e| load_failed(base_folder, e))?;

        for item in listing {
            let item = item.map_err(|e| load_failed(base_folder, e))?;
            // follows symlinks
            if !item.path().is_dir() {
                continue;
            }
            match item.file_name().into_string() {
                Ok(name) => {
                    entries.insert(name);
                }
                Err(raw) => warn!("Skipping non UTF-8 entry {:?}", raw),
            }
        }

        Ok(entries)
    }

    /// Sanitized keys currently recorded.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }
}

impl PostStore for DirectoryStore {
    fn contains(&self, title: &str) -> bool {
        self.entries.contains(&self.sanitizer.sanitize(title))
    }

    fn insert(&mut self, title: &str) -> Result<bool, CoreError> {
        let key = self.key_for(title)?;
        let dir = self.base_folder.join(&key);

        if !dir.is_dir() {
            fs::create_dir_all(&dir).map_err(|e| StoreError::CreateEntryFailed {
                path: dir.display().to_string(),
                reason: e.to_string(),
            })?;
            debug!("Created entry {}", dir.display());
        }

        Ok(self.entries.insert(key))
    }

    fn entry_dir(&self, title: &str) -> PathBuf {
        self.base_folder.join(self.sanitizer.sanitize(title))
    }

    fn key_for(&self, title: &str) -> Result<String, CoreError> {
        let key = self.sanitizer.sanitize(title);
        if key.is_empty() || key == "." || key == ".." {
            return Err(StoreError::InvalidKey {
                title: title.to_string(),
            }
            .into());
        }
        Ok(key)
    }

    fn len(&self) -> usize {
        self.entries.len()
    }
}

fn load_failed(path: &Path, error: std::io::Error) -> CoreError {
    CoreError::Store(StoreError::LoadFailed {
        path: path.display().to_string(),
        reason: error.to_string(),
    })
}
