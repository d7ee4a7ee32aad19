//! Queues resource load/unload commands until the next frame
//!
//! Resources may be created or released from any thread. Their commands are
//! parked here and moved into the main snapshot when the next frame is
//! built: loads ahead of every pass, unloads after every pass, so a resource
//! released this frame can still be drawn by it.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::commands::RenderCommand;
use super::snapshot::{RenderSnapshot, RenderSnapshotObserver};

#[derive(Debug, Default)]
struct PendingCommands {
    loads: Vec<RenderCommand>,
    unloads: Vec<RenderCommand>,
}

/// Pending resource commands, flushed into the main snapshot
#[derive(Debug, Default)]
pub struct RenderResourceManager {
    pending: Mutex<PendingCommands>,
}

impl RenderResourceManager {
    /// Create an empty manager
    pub fn new() -> Self {
        Self::default()
    }

    fn pending(&self) -> MutexGuard<'_, PendingCommands> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Queue a load or unload command for the next frame
    ///
    /// # Panics
    ///
    /// Panics if `command` is not a resource command.
    pub fn queue(&self, command: RenderCommand) {
        assert!(command.is_resource_command(), "{:?} is not a resource command", command.kind());
        let mut pending = self.pending();
        if command.is_load_command() {
            pending.loads.push(command);
        } else {
            pending.unloads.push(command);
        }
    }

    /// Number of commands waiting for a frame
    pub fn pending_count(&self) -> usize {
        let pending = self.pending();
        pending.loads.len() + pending.unloads.len()
    }
}

impl RenderSnapshotObserver for RenderResourceManager {
    fn on_render_snapshot(&self, snapshot: &mut RenderSnapshot) {
        if !snapshot.is_main_target() {
            return;
        }
        let (loads, unloads) = {
            let mut pending = self.pending();
            (std::mem::take(&mut pending.loads), std::mem::take(&mut pending.unloads))
        };
        if !loads.is_empty() || !unloads.is_empty() {
            log::trace!("Flushing {} loads and {} unloads into frame", loads.len(), unloads.len());
        }
        snapshot.pre_render_commands_mut().extend(loads);
        snapshot.post_render_commands_mut().extend(unloads);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::math::{Colour, Resolution};
    use crate::render::resources::{RenderShader, RenderTargetGroup, ResourceSource};

    #[test]
    fn test_loads_before_unloads_after() {
        let manager = RenderResourceManager::new();
        let shader = RenderShader::new(ResourceSource::in_memory());
        manager.queue(RenderCommand::UnloadShader(shader.clone()));
        manager.queue(RenderCommand::LoadShader {
            shader,
            vertex_source: String::new(),
            fragment_source: String::new(),
        });
        assert_eq!(manager.pending_count(), 2);

        let mut snapshot = RenderSnapshot::new(Resolution::new(4, 4), Colour::BLACK);
        manager.on_render_snapshot(&mut snapshot);
        let frame = snapshot.freeze();
        assert!(frame.pre_render_commands[0].is_load_command());
        assert!(frame.post_render_commands[0].is_unload_command());
        assert_eq!(manager.pending_count(), 0);
    }

    #[test]
    fn test_offscreen_snapshots_are_ignored() {
        let manager = RenderResourceManager::new();
        manager.queue(RenderCommand::LoadTargetGroup(RenderTargetGroup::new(Resolution::new(2, 2), None, None, true)));

        let group = RenderTargetGroup::new(Resolution::new(2, 2), None, None, true);
        let mut offscreen = RenderSnapshot::for_target_group(group, Colour::BLACK);
        manager.on_render_snapshot(&mut offscreen);
        assert_eq!(manager.pending_count(), 1);
    }

    #[test]
    #[should_panic(expected = "not a resource command")]
    fn test_queue_rejects_frame_commands() {
        RenderResourceManager::new().queue(RenderCommand::End);
    }
}
