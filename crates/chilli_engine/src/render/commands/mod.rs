//! Render commands and the hand-off between update and render threads
//!
//! - [`RenderCommand`]: one GPU operation
//! - [`RenderCommandList`] / [`RenderCommandBuffer`]: a frame's ordered lists
//! - [`RenderCommandCompiler`]: frozen frame to sealed buffer
//! - [`RenderCommandBufferManager`]: publish-once queue to the render thread

pub mod buffer;
pub mod command;
pub mod compiler;
pub mod manager;

pub use buffer::{RenderCommandBuffer, RenderCommandList};
pub use command::{RenderCommand, RenderCommandKind};
pub use compiler::RenderCommandCompiler;
pub use manager::{ConsumerWork, RenderCommandBufferManager};
