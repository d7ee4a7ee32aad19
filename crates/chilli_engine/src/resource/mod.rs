//! # Resource System
//!
//! File-backed loading and bookkeeping of render resources.
//!
//! - [`StorageLocation`]: where a resource's file lives
//! - [`FileSystem`]: reads files from a storage location
//! - [`formats`]: on-disk formats for shaders, models, textures and cubemaps
//! - [`ResourcePool`]: owns every resource and reloads file-backed ones after
//!   context loss

pub mod file_system;
pub mod formats;
pub mod pool;

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use file_system::{DirectoryFileSystem, FileSystem, MemoryFileSystem};
pub use pool::{PooledResource, ResourcePool};

/// Where a resource is stored
///
/// [`StorageLocation::None`] marks resources built in memory, which cannot be
/// reloaded and are restored from CPU backups instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum StorageLocation {
    /// Built in memory
    #[default]
    None,
    /// Application package
    Package,
    /// Engine-provided assets
    ChilliSource,
    /// Cache directory
    Cache,
    /// Save data directory
    SaveData,
    /// Downloadable content
    Dlc,
}

/// Load progress of a resource
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    /// Load requested, backend not created yet
    Loading,
    /// Backend created
    Loaded,
    /// Loading failed
    Failed,
}

/// Resource loading errors
#[derive(Error, Debug)]
pub enum ResourceError {
    /// Reading a file failed
    #[error("IO error reading {path}: {source}")]
    Io {
        /// File that failed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// No file at the path
    #[error("Resource not found: {0}")]
    NotFound(PathBuf),

    /// Image decoding failed
    #[error("Image decode error: {0}")]
    Image(#[from] image::ImageError),

    /// A text resource failed to parse
    #[error("Parse error: {0}")]
    Parse(String),

    /// File contents are inconsistent
    #[error("Invalid resource data: {0}")]
    InvalidData(String),

    /// The storage location has no backing directory
    #[error("No storage directory for {0:?}")]
    NoStorageDirectory(StorageLocation),

    /// The resource was built in memory and has no file to reload
    #[error("Resource {0} is not file backed")]
    NotFileBacked(String),
}

/// Result type for resource operations
pub type ResourceResult<T> = Result<T, ResourceError>;
