//! Main engine coordination and threads

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use crate::application::{AppError, Application};
use crate::config::ConfigError;
use crate::core::config::ApplicationConfig;
use crate::core::lifecycle::{LifecycleDriver, LifecycleManager, LifecycleState};
use crate::foundation::logging;
use crate::render::gl::GlContext;
use crate::render::{
    ExecutionStats, ExecutorSettings, GlContextRestorer, RenderCommandBufferManager, RenderError,
    RenderResourceManager, RenderSnapshotObserver, RenderThread, Renderer,
};
use crate::resource::{FileSystem, ResourcePool};
use thiserror::Error;

/// Systems shared by the lifecycle thread and the application
///
/// Cheap to clone; every field is reference counted.
#[derive(Clone)]
pub struct EngineSystems {
    /// Hand-off queue between the update and render threads
    pub command_buffer_manager: Arc<RenderCommandBufferManager>,
    /// Builds and submits frames
    pub renderer: Arc<Renderer>,
    /// Invalidates and restores GPU resources across context loss
    pub context_restorer: Arc<GlContextRestorer>,
    /// Queues resource loads and unloads for the next frame
    pub render_resource_manager: Arc<RenderResourceManager>,
    /// Cache of loaded resources
    pub resource_pool: Arc<Mutex<ResourcePool>>,
    /// Configuration the engine was started with
    pub settings: Arc<ApplicationConfig>,
}

impl EngineSystems {
    /// Wire up the update-thread systems
    ///
    /// Snapshot observers run resource loads first, then context restores.
    pub fn new(config: ApplicationConfig, file_system: Arc<dyn FileSystem>) -> Self {
        let command_buffer_manager = Arc::new(RenderCommandBufferManager::new(config.renderer.max_queued_frames));
        let render_resource_manager = Arc::new(RenderResourceManager::new());
        let context_restorer = Arc::new(GlContextRestorer::new(config.renderer.context_loss_recovery_enabled()));

        let observers: Vec<Arc<dyn RenderSnapshotObserver>> =
            vec![render_resource_manager.clone(), context_restorer.clone()];
        let renderer = Arc::new(Renderer::new(Arc::clone(&command_buffer_manager), observers));
        let resource_pool = ResourcePool::new(file_system, Arc::clone(&render_resource_manager));

        Self {
            command_buffer_manager,
            renderer,
            context_restorer,
            render_resource_manager,
            resource_pool: Arc::new(Mutex::new(resource_pool)),
            settings: Arc::new(config),
        }
    }

    /// Lock the resource pool
    pub fn lock_resource_pool(&self) -> MutexGuard<'_, ResourcePool> {
        self.resource_pool.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Main engine struct
///
/// Owns the lifecycle thread, which drives the [`Application`], and the
/// render thread, which owns the GL context. The platform layer forwards its
/// lifecycle events through [`Engine::resume`], [`Engine::foreground`],
/// [`Engine::background`] and [`Engine::suspend`].
pub struct Engine {
    systems: EngineSystems,
    lifecycle: LifecycleManager,
    render_thread: Option<RenderThread>,
}

impl Engine {
    /// Create the engine and initialise the application
    ///
    /// Returns once `Application::on_init` has run.
    pub fn new(
        config: ApplicationConfig,
        app: Box<dyn Application>,
        gl: Box<dyn GlContext>,
        file_system: Arc<dyn FileSystem>,
    ) -> Result<Self, EngineError> {
        config.validate()?;
        logging::init_with_filter(&config.engine.log_level);
        log::info!("Initializing engine...");

        let frame_interval = config
            .engine
            .target_fps
            .map(|fps| Duration::from_secs_f64(1.0 / f64::from(fps)));
        let executor_settings = ExecutorSettings::from(&config.renderer);
        let systems = EngineSystems::new(config, file_system);

        let render_thread = RenderThread::spawn(gl, Arc::clone(&systems.command_buffer_manager), executor_settings)
            .map_err(|e| EngineError::InitializationFailed(format!("Render thread: {}", e)))?;

        let driver = LifecycleDriver::new(app, systems.clone());
        let lifecycle = match LifecycleManager::start(driver, frame_interval) {
            Ok(lifecycle) => lifecycle,
            Err(error) => {
                systems.command_buffer_manager.shutdown();
                let _ = render_thread.join();
                return Err(error);
            }
        };

        log::info!("Engine initialized");
        Ok(Self { systems, lifecycle, render_thread: Some(render_thread) })
    }

    /// Start updating and rendering
    pub fn resume(&mut self) -> Result<(), EngineError> {
        self.lifecycle.resume()
    }

    /// Gain input focus
    pub fn foreground(&mut self) -> Result<(), EngineError> {
        self.lifecycle.foreground()
    }

    /// Lose input focus
    pub fn background(&mut self) -> Result<(), EngineError> {
        self.lifecycle.background()
    }

    /// Stop rendering; the GL context may be destroyed once this returns
    pub fn suspend(&mut self) -> Result<(), EngineError> {
        self.lifecycle.suspend()
    }

    /// Block until the lifecycle thread has reached the requested state
    pub fn sync(&mut self) -> Result<(), EngineError> {
        self.lifecycle.sync()
    }

    /// State last requested through the lifecycle methods
    pub fn target_state(&self) -> LifecycleState {
        self.lifecycle.target()
    }

    /// Destroy the application and stop both threads
    ///
    /// Must be called while suspended. Returns the render thread's totals.
    pub fn destroy(mut self) -> Result<ExecutionStats, EngineError> {
        self.lifecycle.destroy()?;
        self.systems.command_buffer_manager.shutdown();
        let stats = self.join_render_thread()?;
        log::info!("Engine shutdown complete");
        Ok(stats)
    }

    fn join_render_thread(&mut self) -> Result<ExecutionStats, EngineError> {
        match self.render_thread.take() {
            Some(thread) => {
                let result = thread.join().map_err(|_| EngineError::ThreadPanicked("render"))?;
                Ok(result?)
            }
            None => Ok(ExecutionStats::default()),
        }
    }

    /// Shared engine systems
    pub fn systems(&self) -> &EngineSystems {
        &self.systems
    }

    /// Hand-off queue between the update and render threads
    pub fn render_command_buffer_manager(&self) -> &Arc<RenderCommandBufferManager> {
        &self.systems.command_buffer_manager
    }

    /// Frame builder
    pub fn renderer(&self) -> &Arc<Renderer> {
        &self.systems.renderer
    }

    /// Context-loss recovery
    pub fn context_restorer(&self) -> &Arc<GlContextRestorer> {
        &self.systems.context_restorer
    }

    /// Resource load and unload queue
    pub fn render_resource_manager(&self) -> &Arc<RenderResourceManager> {
        &self.systems.render_resource_manager
    }

    /// Lock the resource pool
    pub fn resource_pool(&self) -> MutexGuard<'_, ResourcePool> {
        self.systems.lock_resource_pool()
    }

    /// Configuration the engine was started with
    pub fn config(&self) -> &ApplicationConfig {
        &self.systems.settings
    }
}

impl Drop for Engine {
    fn drop(&mut self) {
        if self.render_thread.is_none() {
            return;
        }
        log::debug!("Engine dropped without destroy; stopping threads");
        if let Err(error) = self.lifecycle.stop() {
            log::error!("Lifecycle stopped with error: {}", error);
        }
        self.systems.command_buffer_manager.shutdown();
        if let Err(error) = self.join_render_thread() {
            log::error!("Render thread stopped with error: {}", error);
        }
    }
}

/// Engine errors
#[derive(Error, Debug)]
pub enum EngineError {
    /// Engine initialization failed
    #[error("Engine initialization failed: {0}")]
    InitializationFailed(String),

    /// Invalid configuration
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Render pipeline error
    #[error("Render error: {0}")]
    Render(#[from] RenderError),

    /// Application hook failed
    #[error("Application error: {0}")]
    Application(String),

    /// The lifecycle thread has exited
    #[error("Lifecycle thread is not running")]
    LifecycleStopped,

    /// An engine thread panicked
    #[error("The {0} thread panicked")]
    ThreadPanicked(&'static str),
}

impl From<AppError> for EngineError {
    fn from(error: AppError) -> Self {
        Self::Application(error.to_string())
    }
}
