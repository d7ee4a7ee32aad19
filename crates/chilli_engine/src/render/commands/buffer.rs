//! Command lists and the per-frame buffer that holds them

use super::command::RenderCommand;

/// Ordered, append-only list of commands
///
/// A list is built on one thread, closed, then moved to the render thread.
/// Appending to a closed list is a programming error and panics.
#[derive(Debug, Default)]
pub struct RenderCommandList {
    commands: Vec<RenderCommand>,
    closed: bool,
}

impl RenderCommandList {
    /// Create an empty, open list
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command
    ///
    /// # Panics
    ///
    /// Panics if the list has been closed.
    pub fn push(&mut self, command: RenderCommand) {
        assert!(!self.closed, "append of {:?} to a closed command list", command.kind());
        self.commands.push(command);
    }

    /// Append every command of an iterator, in order
    pub fn extend(&mut self, commands: impl IntoIterator<Item = RenderCommand>) {
        for command in commands {
            self.push(command);
        }
    }

    /// Seal the list; it becomes read-only
    pub fn close(&mut self) {
        self.closed = true;
    }

    /// Whether the list has been sealed
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Commands in execution order
    pub fn commands(&self) -> &[RenderCommand] {
        &self.commands
    }

    /// Number of commands
    pub fn len(&self) -> usize {
        self.commands.len()
    }

    /// Whether the list holds no commands
    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Take every command out of the list, leaving it empty
    pub fn take_commands(&mut self) -> Vec<RenderCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Empty and reopen the list, keeping its capacity
    pub fn clear(&mut self) {
        self.commands.clear();
        self.closed = false;
    }
}

/// All command lists of one frame
///
/// Layout: index 0 is the pre-render list, then one list per render pass,
/// and the last list is the post-render list. A buffer is only handed to the
/// render thread once [`seal`](Self::seal) has closed every list.
#[derive(Debug)]
pub struct RenderCommandBuffer {
    lists: Vec<RenderCommandList>,
    sealed: bool,
}

impl RenderCommandBuffer {
    /// Create a buffer with lists for `pass_count` render passes
    pub fn new(pass_count: usize) -> Self {
        let mut buffer = Self { lists: Vec::new(), sealed: false };
        buffer.reset(pass_count);
        buffer
    }

    /// Clear every list and lay the buffer out for `pass_count` passes
    pub fn reset(&mut self, pass_count: usize) {
        self.lists.resize_with(pass_count + 2, RenderCommandList::new);
        for list in &mut self.lists {
            list.clear();
        }
        self.sealed = false;
    }

    /// Number of render pass lists
    pub fn pass_count(&self) -> usize {
        self.lists.len() - 2
    }

    /// List executed before any pass
    pub fn pre_render_list_mut(&mut self) -> &mut RenderCommandList {
        &mut self.lists[0]
    }

    /// List of one render pass
    ///
    /// # Panics
    ///
    /// Panics if `pass` is out of range.
    pub fn pass_list_mut(&mut self, pass: usize) -> &mut RenderCommandList {
        assert!(pass < self.pass_count(), "pass {pass} out of range");
        &mut self.lists[pass + 1]
    }

    /// List executed after every pass
    pub fn post_render_list_mut(&mut self) -> &mut RenderCommandList {
        let last = self.lists.len() - 1;
        &mut self.lists[last]
    }

    /// Close every list, publishing the buffer
    pub fn seal(&mut self) {
        for list in &mut self.lists {
            list.close();
        }
        self.sealed = true;
    }

    /// Whether the buffer is complete
    pub fn is_sealed(&self) -> bool {
        self.sealed
    }

    /// Lists in execution order
    pub fn lists(&self) -> &[RenderCommandList] {
        &self.lists
    }

    /// Total number of commands across all lists
    pub fn command_count(&self) -> usize {
        self.lists.iter().map(RenderCommandList::len).sum()
    }

    /// Drain every list, returning only the load/unload commands in execution order
    pub fn take_resource_commands(&mut self) -> Vec<RenderCommand> {
        self.lists
            .iter_mut()
            .flat_map(RenderCommandList::take_commands)
            .filter(RenderCommand::is_resource_command)
            .collect()
    }
}
