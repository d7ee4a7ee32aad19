//! Application trait and lifecycle hooks

use crate::engine::{EngineError, EngineSystems};
use crate::render::RenderSnapshot;
use thiserror::Error;

/// Application lifecycle trait
///
/// Implement this trait to plug a game into the engine. Every hook runs on
/// the lifecycle thread, so the application must be `Send`.
///
/// Hooks fire in state order:
///
/// ```text
/// on_init → on_resume → on_foreground → (on_update, on_render)* → on_background → on_suspend → on_destroy
/// ```
pub trait Application: Send {
    /// Initialise the application
    ///
    /// Called once, before the first resume. The GL context may not exist
    /// yet, but resources can already be created: their loads are queued
    /// until the first frame.
    fn on_init(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let _ = systems;
        Ok(())
    }

    /// The application is about to start rendering again
    ///
    /// Lost GPU resources have been queued for restore when this runs.
    fn on_resume(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let _ = systems;
        Ok(())
    }

    /// The application gained input focus
    fn on_foreground(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let _ = systems;
        Ok(())
    }

    /// Update the application
    ///
    /// Called once per frame while resumed.
    ///
    /// # Arguments
    /// * `systems` - Shared engine systems
    /// * `delta_time` - Time since last frame in seconds
    fn on_update(&mut self, systems: &EngineSystems, delta_time: f32) -> Result<(), AppError>;

    /// Describe the frame to draw
    ///
    /// Called after `on_update`. Add cameras, lights, objects and offscreen
    /// targets to the snapshot; the renderer submits it afterwards.
    fn on_render(&mut self, systems: &EngineSystems, snapshot: &mut RenderSnapshot) -> Result<(), AppError> {
        let _ = (systems, snapshot);
        Ok(())
    }

    /// The application lost input focus
    fn on_background(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let _ = systems;
        Ok(())
    }

    /// The application stopped rendering
    ///
    /// The render pipeline is already idle and GPU state backed up; the GL
    /// context may be destroyed once this returns.
    fn on_suspend(&mut self, systems: &EngineSystems) -> Result<(), AppError> {
        let _ = systems;
        Ok(())
    }

    /// Cleanup the application
    ///
    /// Called once when the engine is destroyed. Use this to save state and
    /// release resources.
    fn on_destroy(&mut self, systems: &EngineSystems);
}

/// Application-level errors
#[derive(Error, Debug)]
pub enum AppError {
    /// Engine error propagated to application level
    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),

    /// Custom application error
    #[error("Application error: {0}")]
    Custom(String),

    /// Resource loading error
    #[error("Resource error: {0}")]
    Resource(#[from] crate::resource::ResourceError),

    /// Configuration error
    #[error("Config error: {0}")]
    Config(String),

    /// Game logic error
    #[error("Game logic error: {0}")]
    GameLogic(String),
}
