//! Update-thread side of the render pipeline
//!
//! The [`Renderer`] turns the application's snapshot into a sealed command
//! buffer and publishes it. Snapshot observers (resource manager, context
//! restorer) run on every pass first, in registration order.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use super::commands::{RenderCommandBufferManager, RenderCommandCompiler};
use super::error::RenderResult;
use super::snapshot::{RenderSnapshot, RenderSnapshotObserver};

/// Builds and submits one command buffer per frame
pub struct Renderer {
    buffer_manager: Arc<RenderCommandBufferManager>,
    observers: Vec<Arc<dyn RenderSnapshotObserver>>,
    compiler: RenderCommandCompiler,
    suspended: AtomicBool,
    frames_submitted: AtomicU64,
}

impl Renderer {
    /// Create a renderer publishing to `buffer_manager`
    pub fn new(buffer_manager: Arc<RenderCommandBufferManager>, observers: Vec<Arc<dyn RenderSnapshotObserver>>) -> Self {
        Self {
            buffer_manager,
            observers,
            compiler: RenderCommandCompiler::new(),
            suspended: AtomicBool::new(false),
            frames_submitted: AtomicU64::new(0),
        }
    }

    /// Notify observers, compile and submit a frame
    ///
    /// Skipped while suspended; queued resource commands wait for the next
    /// frame after resume.
    pub fn render_frame(&self, mut snapshot: RenderSnapshot) -> RenderResult<()> {
        if self.is_suspended() {
            log::trace!("Skipping frame while suspended");
            return Ok(());
        }

        for pass in snapshot.offscreen_passes_mut() {
            for observer in &self.observers {
                observer.on_render_snapshot(pass);
            }
        }
        for observer in &self.observers {
            observer.on_render_snapshot(&mut snapshot);
        }

        let frame = snapshot.freeze();
        let mut buffer = self.buffer_manager.acquire_buffer(frame.passes.len());
        self.compiler.compile(frame, self.buffer_manager.take_carried_commands(), &mut buffer);
        self.buffer_manager.submit(buffer)?;
        self.frames_submitted.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Lifecycle suspend hook, called after the buffer manager's
    pub fn on_suspend(&self) {
        self.suspended.store(true, Ordering::Release);
        log::debug!("Renderer suspended");
    }

    /// Lifecycle resume hook
    pub fn on_resume(&self) {
        self.suspended.store(false, Ordering::Release);
        log::debug!("Renderer resumed");
    }

    /// Whether frames are being skipped
    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::Acquire)
    }

    /// Number of frames handed to the buffer manager
    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted.load(Ordering::Relaxed)
    }
}
