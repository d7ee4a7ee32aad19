//! Render pipeline error types

use thiserror::Error;

use super::gl::GlError;
use crate::resource::ResourceError;

/// Errors raised while building, executing or recovering frames
#[derive(Error, Debug)]
pub enum RenderError {
    /// A GL call failed
    #[error("GL error: {0}")]
    Gl(#[from] GlError),

    /// The resource cannot be restored through this path
    #[error("Restore unsupported for {0}")]
    RestoreUnsupported(&'static str),

    /// A command referenced a wrapper whose handles died with the context
    #[error("Use of invalidated {0}")]
    InvalidatedResource(&'static str),

    /// A command referenced a resource whose backend was never loaded
    #[error("{kind} {id} has no loaded backend")]
    NotLoaded {
        /// Resource kind
        kind: &'static str,
        /// Resource id
        id: u64,
    },

    /// Reloading resources after context loss failed
    #[error("Failed to restore resources: {0}")]
    RestoreFailed(String),

    /// Reading a resource back from storage failed
    #[error("Resource error: {0}")]
    Resource(#[from] ResourceError),

    /// The command buffer pipeline has been shut down
    #[error("Render pipeline shut down")]
    ShutDown,
}

/// Result type for render operations
pub type RenderResult<T> = Result<T, RenderError>;
