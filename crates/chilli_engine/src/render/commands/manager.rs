//! # Render Command Buffer Manager
//!
//! Hands sealed [`RenderCommandBuffer`]s from the update thread (single
//! producer) to the render thread (single consumer).
//!
//! ## Protocol
//!
//! - The producer acquires a buffer, fills and seals it, then submits it. At
//!   most `max_queued_frames` buffers wait at once; `submit` blocks when full.
//! - The consumer pops buffers in submission order, executes them and
//!   recycles them. A buffer is never visible to the consumer before it is
//!   sealed, and never reused before it is recycled.
//! - On suspend, queued frames are dropped but their load/unload commands are
//!   carried into the next frame. The consumer is told to run its suspend
//!   step (backing up render-thread-owned buffers) while the context is still
//!   alive, and `on_suspend` waits for it to finish.

use std::collections::VecDeque;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use super::buffer::RenderCommandBuffer;
use super::command::RenderCommand;
use crate::render::error::{RenderError, RenderResult};

/// Work handed to the render thread
#[derive(Debug)]
pub enum ConsumerWork {
    /// Execute a frame, then [`recycle`](RenderCommandBufferManager::recycle) it
    Frame(RenderCommandBuffer),
    /// Back up render-thread state before the context is lost, then call
    /// [`acknowledge_suspend`](RenderCommandBufferManager::acknowledge_suspend)
    Suspend,
    /// Restore render-thread state before the next frame
    Resume,
}

#[derive(Debug, Default)]
struct ManagerState {
    queue: VecDeque<RenderCommandBuffer>,
    free: Vec<RenderCommandBuffer>,
    carried: Vec<RenderCommand>,
    consumer_attached: bool,
    consumer_busy: bool,
    suspended: bool,
    suspend_acknowledged: bool,
    resume_pending: bool,
    shut_down: bool,
}

impl ManagerState {
    fn salvage(&mut self, mut buffer: RenderCommandBuffer) {
        let commands = buffer.take_resource_commands();
        if !commands.is_empty() {
            log::debug!("Carrying {} resource commands out of a dropped frame", commands.len());
        }
        self.carried.extend(commands);
        buffer.reset(0);
        self.free.push(buffer);
    }
}

/// Publish-once queue of command buffers
#[derive(Debug)]
pub struct RenderCommandBufferManager {
    max_queued_frames: usize,
    state: Mutex<ManagerState>,
    changed: Condvar,
}

impl RenderCommandBufferManager {
    /// Create a manager allowing `max_queued_frames` frames in flight
    pub fn new(max_queued_frames: usize) -> Self {
        assert!(max_queued_frames > 0, "at least one frame must be allowed in flight");
        Self {
            max_queued_frames,
            state: Mutex::new(ManagerState::default()),
            changed: Condvar::new(),
        }
    }

    fn state(&self) -> MutexGuard<'_, ManagerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn wait<'a>(&self, guard: MutexGuard<'a, ManagerState>) -> MutexGuard<'a, ManagerState> {
        self.changed.wait(guard).unwrap_or_else(PoisonError::into_inner)
    }

    // Producer side

    /// Get an empty buffer laid out for `pass_count` passes
    pub fn acquire_buffer(&self, pass_count: usize) -> RenderCommandBuffer {
        let recycled = self.state().free.pop();
        match recycled {
            Some(mut buffer) => {
                buffer.reset(pass_count);
                buffer
            }
            None => RenderCommandBuffer::new(pass_count),
        }
    }

    /// Take the resource commands salvaged from dropped frames
    pub fn take_carried_commands(&self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.state().carried)
    }

    /// Publish a sealed buffer to the render thread
    ///
    /// Blocks while the queue is full. While suspended the frame is dropped
    /// and only its resource commands are kept.
    ///
    /// # Panics
    ///
    /// Panics if the buffer is not sealed.
    pub fn submit(&self, buffer: RenderCommandBuffer) -> RenderResult<()> {
        assert!(buffer.is_sealed(), "submitted an unsealed command buffer");

        let mut state = self.state();
        while state.queue.len() >= self.max_queued_frames && !state.suspended && !state.shut_down {
            state = self.wait(state);
        }
        if state.shut_down {
            return Err(RenderError::ShutDown);
        }
        if state.suspended {
            log::trace!("Dropping frame submitted while suspended");
            state.salvage(buffer);
            return Ok(());
        }

        state.queue.push_back(buffer);
        self.changed.notify_all();
        Ok(())
    }

    // Consumer side

    /// Register the render thread; `on_suspend` will wait for its suspend step
    pub fn attach_consumer(&self) {
        self.state().consumer_attached = true;
        self.changed.notify_all();
    }

    /// Unregister the render thread
    pub fn detach_consumer(&self) {
        let mut state = self.state();
        state.consumer_attached = false;
        state.consumer_busy = false;
        self.changed.notify_all();
    }

    /// Block until there is work for the render thread
    ///
    /// Returns `None` once the manager has been shut down.
    pub fn wait_then_pop(&self) -> Option<ConsumerWork> {
        let mut state = self.state();
        loop {
            if state.shut_down {
                return None;
            }
            if state.suspended {
                if !state.suspend_acknowledged && !state.consumer_busy {
                    state.consumer_busy = true;
                    return Some(ConsumerWork::Suspend);
                }
            } else if state.resume_pending {
                state.resume_pending = false;
                return Some(ConsumerWork::Resume);
            } else if let Some(buffer) = state.queue.pop_front() {
                state.consumer_busy = true;
                // Room for the producer
                self.changed.notify_all();
                return Some(ConsumerWork::Frame(buffer));
            }
            state = self.wait(state);
        }
    }

    /// Return an executed buffer for reuse
    pub fn recycle(&self, mut buffer: RenderCommandBuffer) {
        buffer.reset(0);
        let mut state = self.state();
        state.free.push(buffer);
        state.consumer_busy = false;
        self.changed.notify_all();
    }

    /// Report that the render thread finished its suspend step
    pub fn acknowledge_suspend(&self) {
        let mut state = self.state();
        state.suspend_acknowledged = true;
        state.consumer_busy = false;
        self.changed.notify_all();
    }

    // Lifecycle hooks

    /// Stop accepting frames and wait for the render thread to go idle
    ///
    /// On return no buffer is executing, no frame is queued and the
    /// consumer (if attached) has run its suspend step.
    pub fn on_suspend(&self) {
        let mut state = self.state();
        state.suspended = true;
        state.suspend_acknowledged = false;
        self.changed.notify_all();

        while !state.shut_down && (state.consumer_busy || (state.consumer_attached && !state.suspend_acknowledged)) {
            state = self.wait(state);
        }

        let dropped: Vec<RenderCommandBuffer> = state.queue.drain(..).collect();
        if !dropped.is_empty() {
            log::debug!("Dropping {} queued frames on suspend", dropped.len());
        }
        for buffer in dropped {
            state.salvage(buffer);
        }
        log::info!("Render command buffer manager suspended");
    }

    /// Accept frames again
    pub fn on_resume(&self) {
        let mut state = self.state();
        state.suspended = false;
        if state.suspend_acknowledged {
            state.resume_pending = true;
        }
        state.suspend_acknowledged = false;
        self.changed.notify_all();
        log::info!("Render command buffer manager resumed");
    }

    /// Wake every waiter and make all further waits return immediately
    pub fn shutdown(&self) {
        self.state().shut_down = true;
        self.changed.notify_all();
    }

    /// Whether frames are currently being dropped
    pub fn is_suspended(&self) -> bool {
        self.state().suspended
    }

    /// Number of sealed buffers waiting for the render thread
    pub fn queued_frames(&self) -> usize {
        self.state().queue.len()
    }

    /// Maximum number of waiting buffers
    pub fn max_queued_frames(&self) -> usize {
        self.max_queued_frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    use crate::render::gl::VertexFormat;
    use crate::render::resources::{RenderMesh, ResourceSource};

    fn sealed_frame(manager: &RenderCommandBufferManager, marker: usize) -> RenderCommandBuffer {
        let mut buffer = manager.acquire_buffer(1);
        for _ in 0..marker {
            buffer.pass_list_mut(0).push(RenderCommand::End);
        }
        buffer.seal();
        buffer
    }

    #[test]
    fn test_frames_pop_in_submission_order() {
        let manager = RenderCommandBufferManager::new(2);
        manager.submit(sealed_frame(&manager, 1)).unwrap();
        manager.submit(sealed_frame(&manager, 2)).unwrap();

        for expected in 1..=2 {
            match manager.wait_then_pop() {
                Some(ConsumerWork::Frame(buffer)) => {
                    assert_eq!(buffer.command_count(), expected);
                    manager.recycle(buffer);
                }
                other => panic!("expected a frame, got {other:?}"),
            }
        }
    }

    #[test]
    #[should_panic(expected = "unsealed")]
    fn test_submit_unsealed_panics() {
        let manager = RenderCommandBufferManager::new(1);
        let buffer = manager.acquire_buffer(1);
        let _ = manager.submit(buffer);
    }

    #[test]
    fn test_consumer_never_sees_partial_frames() {
        let manager = Arc::new(RenderCommandBufferManager::new(1));
        let consumer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut frames = 0;
                while let Some(work) = manager.wait_then_pop() {
                    if let ConsumerWork::Frame(buffer) = work {
                        assert!(buffer.is_sealed());
                        assert!(buffer.lists().iter().all(|list| list.is_closed()));
                        assert_eq!(buffer.command_count(), 64);
                        frames += 1;
                        manager.recycle(buffer);
                    }
                }
                frames
            })
        };

        for _ in 0..200 {
            manager.submit(sealed_frame(&manager, 64)).unwrap();
        }
        while manager.queued_frames() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        manager.shutdown();
        assert!(consumer.join().unwrap() >= 199);
    }

    #[test]
    fn test_suspend_carries_resource_commands() {
        let manager = RenderCommandBufferManager::new(1);
        let mesh = RenderMesh::new(ResourceSource::in_memory(), VertexFormat::StaticMesh);
        let mut buffer = manager.acquire_buffer(1);
        buffer.pre_render_list_mut().push(RenderCommand::UnloadMesh(mesh));
        buffer.pass_list_mut(0).push(RenderCommand::End);
        buffer.seal();
        manager.submit(buffer).unwrap();

        manager.on_suspend();
        assert_eq!(manager.queued_frames(), 0);

        // Frames submitted while suspended are dropped too
        manager.submit(sealed_frame(&manager, 3)).unwrap();
        assert_eq!(manager.queued_frames(), 0);

        let carried = manager.take_carried_commands();
        assert_eq!(carried.len(), 1);
        assert!(carried[0].is_unload_command());
        assert!(manager.take_carried_commands().is_empty());
    }

    #[test]
    fn test_suspend_waits_for_consumer_step() {
        let manager = Arc::new(RenderCommandBufferManager::new(1));
        manager.attach_consumer();
        let consumer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || {
                let mut steps = Vec::new();
                while let Some(work) = manager.wait_then_pop() {
                    match work {
                        ConsumerWork::Frame(buffer) => {
                            steps.push("frame");
                            manager.recycle(buffer);
                        }
                        ConsumerWork::Suspend => {
                            thread::sleep(Duration::from_millis(20));
                            steps.push("suspend");
                            manager.acknowledge_suspend();
                        }
                        ConsumerWork::Resume => steps.push("resume"),
                    }
                }
                steps
            })
        };

        manager.submit(sealed_frame(&manager, 1)).unwrap();
        manager.on_suspend();
        assert!(manager.is_suspended());
        manager.on_resume();
        manager.submit(sealed_frame(&manager, 1)).unwrap();
        while manager.queued_frames() > 0 {
            thread::sleep(Duration::from_millis(1));
        }
        thread::sleep(Duration::from_millis(20));
        manager.shutdown();

        let steps = consumer.join().unwrap();
        let suspend = steps.iter().position(|step| *step == "suspend").unwrap();
        assert_eq!(steps[suspend + 1..], ["resume", "frame"]);
    }

    #[test]
    fn test_shutdown_unblocks_producer() {
        let manager = Arc::new(RenderCommandBufferManager::new(1));
        manager.submit(sealed_frame(&manager, 1)).unwrap();

        let producer = {
            let manager = Arc::clone(&manager);
            thread::spawn(move || manager.submit(sealed_frame(&manager, 1)))
        };
        thread::sleep(Duration::from_millis(10));
        manager.shutdown();

        assert!(matches!(producer.join().unwrap(), Err(RenderError::ShutDown)));
        assert!(manager.wait_then_pop().is_none());
    }
}
