//! # Chilli Engine
//!
//! The render pipeline and GPU resource lifecycle of a mobile game engine.
//!
//! ## Features
//!
//! - **Threaded Rendering**: The update thread builds sealed command buffers
//!   that a dedicated render thread executes against the GL context
//! - **Lifecycle State Machine**: Init, resume, foreground, background,
//!   suspend and destroy, driven from a lifecycle thread
//! - **Context-Loss Recovery**: GPU resources are backed up or reloaded from
//!   storage when the platform destroys the GL context
//! - **Resource Pool**: Shaders, textures, cubemaps and models loaded by
//!   storage location and cached by source
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use chilli_engine::prelude::*;
//! use std::sync::Arc;
//!
//! struct MyApp;
//!
//! impl Application for MyApp {
//!     fn on_update(&mut self, systems: &EngineSystems, delta_time: f32) -> Result<(), AppError> {
//!         // Update game logic
//!         Ok(())
//!     }
//!
//!     fn on_render(&mut self, systems: &EngineSystems, snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
//!         // Describe the frame
//!         Ok(())
//!     }
//!
//!     fn on_destroy(&mut self, systems: &EngineSystems) {
//!         // Cleanup resources
//!     }
//! }
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ApplicationConfig::default();
//!     let files = Arc::new(DirectoryFileSystem::new(config.storage.clone()));
//!     let mut engine = Engine::new(config, Box::new(MyApp), Box::new(HeadlessGl::new()), files)?;
//!     engine.resume()?;
//!     engine.foreground()?;
//!     // ... platform event loop ...
//!     engine.background()?;
//!     engine.suspend()?;
//!     engine.destroy()?;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

// Core engine modules
pub mod config;
pub mod core;
pub mod foundation;
pub mod render;
pub mod resource;

mod application;
mod engine;

#[cfg(test)]
mod tests;

pub use application::{AppError, Application};
pub use engine::{Engine, EngineError, EngineSystems};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        AppError, Application, Engine, EngineError, EngineSystems,
        core::config::{ApplicationConfig, EngineSettings, RendererSettings, StorageSettings, Config},
        core::lifecycle::LifecycleState,
        foundation::{
            math::{Colour, Mat4, Resolution, Vec3},
            time::Timer,
        },
        render::{
            gl::{GlContext, HeadlessGl, VertexFormat},
            DirectionalLight, MeshData, Model, RenderCamera, RenderMaterial, RenderObject, RenderShader,
            RenderSnapshot, RenderTexture, TextureData,
        },
        resource::{DirectoryFileSystem, FileSystem, MemoryFileSystem, StorageLocation},
    };
}
