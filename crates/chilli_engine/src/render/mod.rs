//! # Render Pipeline
//!
//! Frames flow from the update thread to the render thread:
//!
//! ```text
//! Application::on_render ─► RenderSnapshot ─► observers ─► RenderFrame
//!        ─► RenderCommandCompiler ─► RenderCommandBuffer (sealed)
//!        ─► RenderCommandBufferManager ─► render thread ─► RenderCommandExecutor ─► GL
//! ```
//!
//! ## Modules
//!
//! - [`gl`]: GL context abstraction, bind cache and resource wrappers
//! - [`commands`]: commands, command buffers, the compiler and the hand-off queue
//! - [`resources`]: `Arc`-shared render resources with typed backend slots
//! - [`snapshot`]: per-frame capture filled by the application
//! - [`executor`] / [`thread`]: the render thread's side
//! - [`renderer`]: the update thread's side
//! - [`resource_manager`] / [`context_restorer`]: snapshot observers that
//!   inject resource loads and context-loss restores

pub mod commands;
pub mod context_restorer;
pub mod error;
pub mod executor;
pub mod gl;
pub mod renderer;
pub mod resource_manager;
pub mod resources;
pub mod snapshot;
pub mod thread;

pub use commands::{RenderCommand, RenderCommandBuffer, RenderCommandBufferManager, RenderCommandList};
pub use context_restorer::GlContextRestorer;
pub use error::{RenderError, RenderResult};
pub use executor::{ExecutionStats, ExecutorSettings, RenderCommandExecutor};
pub use renderer::Renderer;
pub use resource_manager::RenderResourceManager;
pub use resources::{
    CubemapData, MeshData, Model, RenderCubemap, RenderMaterial, RenderMesh, RenderShader, RenderTargetGroup,
    RenderTexture, ResourceId, ResourceSource, TextureData,
};
pub use snapshot::{
    DirectionalLight, RenderBatch, RenderCamera, RenderFrame, RenderObject, RenderSnapshot, RenderSnapshotObserver,
    RenderTarget,
};
pub use thread::RenderThread;
