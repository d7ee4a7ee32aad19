//! Storage location backed file access

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use super::{ResourceError, ResourceResult, StorageLocation};
use crate::core::config::StorageSettings;

/// Reads resource files by storage location
pub trait FileSystem: Send + Sync {
    /// Read a whole file
    fn read(&self, location: StorageLocation, path: &Path) -> ResourceResult<Vec<u8>>;

    /// Read a whole file as UTF-8 text
    fn read_to_string(&self, location: StorageLocation, path: &Path) -> ResourceResult<String> {
        let bytes = self.read(location, path)?;
        String::from_utf8(bytes)
            .map_err(|e| ResourceError::InvalidData(format!("{} is not UTF-8: {}", path.display(), e)))
    }
}

/// File system over the directories named in [`StorageSettings`]
#[derive(Debug, Clone)]
pub struct DirectoryFileSystem {
    settings: StorageSettings,
}

impl DirectoryFileSystem {
    /// Create a file system over the configured directories
    pub fn new(settings: StorageSettings) -> Self {
        Self { settings }
    }

    /// Full path of a file in a storage location
    pub fn resolve(&self, location: StorageLocation, path: &Path) -> ResourceResult<PathBuf> {
        let directory = self
            .settings
            .directory(location)
            .ok_or(ResourceError::NoStorageDirectory(location))?;
        Ok(directory.join(path))
    }
}

impl FileSystem for DirectoryFileSystem {
    fn read(&self, location: StorageLocation, path: &Path) -> ResourceResult<Vec<u8>> {
        let full_path = self.resolve(location, path)?;
        log::trace!("Reading {}", full_path.display());
        std::fs::read(&full_path).map_err(|source| match source.kind() {
            ErrorKind::NotFound => ResourceError::NotFound(full_path),
            _ => ResourceError::Io { path: full_path, source },
        })
    }
}

/// In-memory file system, for tests and embedded assets
#[derive(Debug, Default)]
pub struct MemoryFileSystem {
    files: Mutex<HashMap<(StorageLocation, PathBuf), Vec<u8>>>,
}

impl MemoryFileSystem {
    /// Create an empty file system
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&self, location: StorageLocation, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert((location, path.into()), contents.into());
    }

    /// Remove a file
    pub fn remove(&self, location: StorageLocation, path: impl Into<PathBuf>) -> Option<Vec<u8>> {
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&(location, path.into()))
    }

    /// Builder form of [`MemoryFileSystem::insert`]
    pub fn with_file(self, location: StorageLocation, path: impl Into<PathBuf>, contents: impl Into<Vec<u8>>) -> Self {
        self.insert(location, path, contents);
        self
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, location: StorageLocation, path: &Path) -> ResourceResult<Vec<u8>> {
        if location == StorageLocation::None {
            return Err(ResourceError::NoStorageDirectory(location));
        }
        self.files
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&(location, path.to_path_buf()))
            .cloned()
            .ok_or_else(|| ResourceError::NotFound(path.to_path_buf()))
    }
}
