//! The render thread
//!
//! Owns the GL context and a [`RenderCommandExecutor`], and consumes work
//! from the [`RenderCommandBufferManager`] until it shuts down. Any execution
//! error is fatal: it is logged, the manager is shut down so the update
//! thread stops blocking on it, and the error is returned from `join`.

use std::sync::Arc;
use std::thread::{self, JoinHandle};

use super::commands::{ConsumerWork, RenderCommandBufferManager};
use super::error::RenderResult;
use super::executor::{ExecutionStats, ExecutorSettings, RenderCommandExecutor};
use super::gl::GlContext;

/// Handle to the running render thread
pub struct RenderThread {
    handle: JoinHandle<RenderResult<ExecutionStats>>,
}

impl RenderThread {
    /// Start consuming command buffers on a new thread
    ///
    /// The consumer is attached before this returns, so a suspend issued
    /// right after waits for the render thread's suspend step.
    pub fn spawn(
        gl: Box<dyn GlContext>,
        buffer_manager: Arc<RenderCommandBufferManager>,
        settings: ExecutorSettings,
    ) -> std::io::Result<Self> {
        buffer_manager.attach_consumer();
        let thread_manager = Arc::clone(&buffer_manager);
        let spawned = thread::Builder::new()
            .name("chilli-render".to_string())
            .spawn(move || run(gl, &thread_manager, settings));
        match spawned {
            Ok(handle) => Ok(Self { handle }),
            Err(error) => {
                buffer_manager.detach_consumer();
                Err(error)
            }
        }
    }

    /// Whether the thread has exited
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the thread to exit
    ///
    /// The outer `Err` carries a panic payload; the inner result is the
    /// thread's own outcome.
    pub fn join(self) -> thread::Result<RenderResult<ExecutionStats>> {
        self.handle.join()
    }
}

fn run(
    mut gl: Box<dyn GlContext>,
    buffer_manager: &RenderCommandBufferManager,
    settings: ExecutorSettings,
) -> RenderResult<ExecutionStats> {
    log::info!("Render thread started");
    let mut executor = RenderCommandExecutor::new(settings);
    let result = consume(gl.as_mut(), buffer_manager, &mut executor);

    executor.shutdown(gl.as_mut());
    buffer_manager.detach_consumer();
    match result {
        Ok(()) => {
            let stats = executor.stats();
            log::info!("Render thread stopped after {} frames, {} draw calls", stats.frames, stats.draw_calls);
            Ok(stats)
        }
        Err(error) => {
            log::error!("Render thread failed: {}", error);
            buffer_manager.shutdown();
            Err(error)
        }
    }
}

fn consume(
    gl: &mut dyn GlContext,
    buffer_manager: &RenderCommandBufferManager,
    executor: &mut RenderCommandExecutor,
) -> RenderResult<()> {
    while let Some(work) = buffer_manager.wait_then_pop() {
        match work {
            ConsumerWork::Frame(buffer) => {
                let executed = executor.execute(gl, &buffer);
                buffer_manager.recycle(buffer);
                executed?;
            }
            ConsumerWork::Suspend => {
                let backed_up = executor.on_suspend(gl);
                buffer_manager.acknowledge_suspend();
                backed_up?;
            }
            ConsumerWork::Resume => executor.on_resume(gl)?,
        }
    }
    Ok(())
}
