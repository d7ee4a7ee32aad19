//! CPU-side copies of GPU data and the invalidate capability

use std::fmt;

/// Owned copy of GPU data kept to survive context loss
///
/// The storage is released when the backup is dropped, whichever path the
/// owning wrapper takes.
#[derive(Clone, PartialEq, Eq)]
pub struct BackupData(Box<[u8]>);

impl BackupData {
    /// Copy bytes into a new backup
    pub fn copy_from(bytes: &[u8]) -> Self {
        Self(bytes.into())
    }

    /// Take ownership of bytes
    pub fn from_vec(bytes: Vec<u8>) -> Self {
        Self(bytes.into_boxed_slice())
    }

    /// Backed-up bytes
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Size in bytes
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the backup holds no bytes
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for BackupData {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BackupData({} bytes)", self.0.len())
    }
}

/// Capability shared by every GL resource wrapper
///
/// Invalidation marks native handles as meaningless without issuing any GL
/// call (the context may already be gone) and without dropping CPU-side
/// backups. Each wrapper restores itself through its own `restore` method,
/// since what a restore needs differs per resource type.
pub trait GpuResource {
    /// Zero native handles and mark the wrapper invalid
    fn invalidate(&mut self);

    /// Whether the wrapper's native handles are meaningful
    fn is_valid(&self) -> bool;
}
