//! # Application Lifecycle
//!
//! The engine moves through four ordered states:
//!
//! ```text
//! Uninitialised < Initialised < Resumed < Foregrounded
//! ```
//!
//! The platform layer only ever sets a *target* state. The lifecycle thread
//! owns the *current* state and walks towards the target one transition at a
//! time, running an update pass whenever it is active.
//!
//! ## Pieces
//!
//! - [`LifecycleState::plan`]: pure transition table from current to target
//! - [`LifecycleDriver`]: applies a plan to the application and engine systems
//! - [`LifecycleManager`]: runs the driver on its own thread, fed by a channel

use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender, TryRecvError};

use crate::application::Application;
use crate::engine::{EngineError, EngineSystems};
use crate::foundation::time::Timer;
use crate::render::RenderSnapshot;

/// Lifecycle states, ordered from dormant to fully active
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LifecycleState {
    /// Not started, or destroyed
    Uninitialised,
    /// Initialised but suspended; the GL context may be gone
    Initialised,
    /// Running and rendering, without input focus
    Resumed,
    /// Running with input focus
    Foregrounded,
}

/// A single step between two adjacent states, or an update pass
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleTransition {
    /// Uninitialised → Initialised
    Init,
    /// Initialised → Resumed
    Resume,
    /// Resumed → Foregrounded
    Foreground,
    /// One frame of update and render
    Update,
    /// Foregrounded → Resumed
    Background,
    /// Resumed → Initialised
    Suspend,
    /// Initialised → Uninitialised
    Destroy,
}

/// Ordered transitions taking the current state to a target
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransitionPlan {
    steps: Vec<LifecycleTransition>,
}

impl TransitionPlan {
    /// Steps in execution order
    pub fn steps(&self) -> &[LifecycleTransition] {
        &self.steps
    }

    /// Whether there is nothing to do
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl LifecycleState {
    fn step_up(self) -> Option<(LifecycleTransition, Self)> {
        match self {
            Self::Uninitialised => Some((LifecycleTransition::Init, Self::Initialised)),
            Self::Initialised => Some((LifecycleTransition::Resume, Self::Resumed)),
            Self::Resumed => Some((LifecycleTransition::Foreground, Self::Foregrounded)),
            Self::Foregrounded => None,
        }
    }

    fn step_down(self) -> Option<(LifecycleTransition, Self)> {
        match self {
            Self::Foregrounded => Some((LifecycleTransition::Background, Self::Resumed)),
            Self::Resumed => Some((LifecycleTransition::Suspend, Self::Initialised)),
            Self::Initialised => Some((LifecycleTransition::Destroy, Self::Uninitialised)),
            Self::Uninitialised => None,
        }
    }

    /// Whether update passes run in this state
    pub fn is_active(self) -> bool {
        self >= Self::Resumed
    }

    /// Plan the transitions from `self` to `target`
    ///
    /// Ascending steps come first, then an `Update` when either `self` or the
    /// state after ascending is active, then descending steps. A plan never
    /// both ascends and descends, so an active app always gets one last frame
    /// before it backgrounds or suspends.
    pub fn plan(self, target: Self) -> TransitionPlan {
        let mut steps = Vec::new();
        let mut state = self;
        while state < target {
            let Some((transition, next)) = state.step_up() else { break };
            steps.push(transition);
            state = next;
        }
        if self.is_active() || state.is_active() {
            steps.push(LifecycleTransition::Update);
        }
        while state > target {
            let Some((transition, next)) = state.step_down() else { break };
            steps.push(transition);
            state = next;
        }
        TransitionPlan { steps }
    }
}

/// Applies transition plans to the application and engine systems
pub struct LifecycleDriver {
    app: Box<dyn Application>,
    systems: EngineSystems,
    state: LifecycleState,
    timer: Timer,
}

impl LifecycleDriver {
    /// Create a driver in the `Uninitialised` state
    pub fn new(app: Box<dyn Application>, systems: EngineSystems) -> Self {
        Self { app, systems, state: LifecycleState::Uninitialised, timer: Timer::new() }
    }

    /// Current state
    pub fn state(&self) -> LifecycleState {
        self.state
    }

    /// Frame timer
    pub fn timer(&self) -> &Timer {
        &self.timer
    }

    /// Run every step of a plan, stopping at the first error
    pub fn apply(&mut self, plan: &TransitionPlan) -> Result<(), EngineError> {
        for &step in plan.steps() {
            self.step(step)?;
        }
        Ok(())
    }

    fn step(&mut self, transition: LifecycleTransition) -> Result<(), EngineError> {
        log::trace!("Lifecycle {:?} from {:?}", transition, self.state);
        let systems = &self.systems;
        match transition {
            LifecycleTransition::Init => {
                self.app.on_init(systems)?;
                self.state = LifecycleState::Initialised;
                log::info!("Application initialised");
            }
            LifecycleTransition::Resume => {
                systems.context_restorer.on_resume(&mut systems.lock_resource_pool())?;
                systems.command_buffer_manager.on_resume();
                systems.renderer.on_resume();
                self.app.on_resume(systems)?;
                self.timer.reset_frame();
                self.state = LifecycleState::Resumed;
                log::info!("Application resumed");
            }
            LifecycleTransition::Foreground => {
                self.app.on_foreground(systems)?;
                self.state = LifecycleState::Foregrounded;
            }
            LifecycleTransition::Update => {
                self.timer.update();
                self.app.on_update(systems, self.timer.delta_time())?;

                let renderer_settings = &systems.settings.renderer;
                let mut snapshot = RenderSnapshot::new(renderer_settings.resolution, renderer_settings.clear_colour);
                self.app.on_render(systems, &mut snapshot)?;
                systems.renderer.render_frame(snapshot)?;
            }
            LifecycleTransition::Background => {
                self.app.on_background(systems)?;
                self.state = LifecycleState::Resumed;
            }
            LifecycleTransition::Suspend => {
                systems.command_buffer_manager.on_suspend();
                systems.renderer.on_suspend();
                systems.context_restorer.on_system_suspend(&systems.lock_resource_pool());
                self.app.on_suspend(systems)?;
                self.state = LifecycleState::Initialised;
                log::info!("Application suspended");
            }
            LifecycleTransition::Destroy => {
                self.app.on_destroy(systems);
                self.state = LifecycleState::Uninitialised;
                log::info!("Application destroyed");
            }
        }
        Ok(())
    }
}

enum LifecycleMessage {
    SetTarget(LifecycleState),
    Sync(Sender<()>),
}

/// Runs a [`LifecycleDriver`] on a dedicated thread
///
/// The controller side (this struct) tracks the target it last requested and
/// enforces the legal request order.
pub struct LifecycleManager {
    sender: Sender<LifecycleMessage>,
    target: LifecycleState,
    thread: Option<JoinHandle<Result<(), EngineError>>>,
}

impl LifecycleManager {
    /// Start the lifecycle thread and initialise the application
    ///
    /// `frame_interval` paces update passes; `None` runs them back to back.
    pub fn start(driver: LifecycleDriver, frame_interval: Option<Duration>) -> Result<Self, EngineError> {
        let (sender, receiver) = unbounded();
        let thread = thread::Builder::new()
            .name("chilli-lifecycle".to_string())
            .spawn(move || run(driver, &receiver, frame_interval))
            .map_err(|e| EngineError::InitializationFailed(format!("lifecycle thread: {}", e)))?;

        let mut manager = Self { sender, target: LifecycleState::Uninitialised, thread: Some(thread) };
        manager.request(LifecycleState::Initialised)?;
        manager.sync()?;
        Ok(manager)
    }

    /// Target state last requested
    pub fn target(&self) -> LifecycleState {
        self.target
    }

    /// Whether the lifecycle thread is still running
    pub fn is_running(&self) -> bool {
        self.thread.as_ref().is_some_and(|thread| !thread.is_finished())
    }

    /// Start updating and rendering
    ///
    /// # Panics
    ///
    /// Panics unless the target is `Initialised`.
    pub fn resume(&mut self) -> Result<(), EngineError> {
        assert_eq!(self.target, LifecycleState::Initialised, "resume requires a suspended application");
        self.request(LifecycleState::Resumed)
    }

    /// Gain input focus
    ///
    /// # Panics
    ///
    /// Panics unless the target is `Resumed`.
    pub fn foreground(&mut self) -> Result<(), EngineError> {
        assert_eq!(self.target, LifecycleState::Resumed, "foreground requires a resumed application");
        self.request(LifecycleState::Foregrounded)
    }

    /// Lose input focus
    ///
    /// # Panics
    ///
    /// Panics unless the target is `Foregrounded`.
    pub fn background(&mut self) -> Result<(), EngineError> {
        assert_eq!(self.target, LifecycleState::Foregrounded, "background requires a foregrounded application");
        self.request(LifecycleState::Resumed)
    }

    /// Stop updating and rendering; returns once the suspend pass completed
    ///
    /// After this returns the platform may destroy the GL context.
    ///
    /// # Panics
    ///
    /// Panics unless the target is `Resumed`.
    pub fn suspend(&mut self) -> Result<(), EngineError> {
        assert_eq!(self.target, LifecycleState::Resumed, "suspend requires a resumed, backgrounded application");
        self.request(LifecycleState::Initialised)?;
        self.sync()
    }

    /// Destroy the application and stop the lifecycle thread
    ///
    /// # Panics
    ///
    /// Panics unless the target is `Initialised`, which also makes a second
    /// destroy fatal.
    pub fn destroy(&mut self) -> Result<(), EngineError> {
        assert_eq!(self.target, LifecycleState::Initialised, "destroy requires a suspended application");
        self.stop()
    }

    /// Block until the lifecycle thread has caught up with the target
    pub fn sync(&mut self) -> Result<(), EngineError> {
        let (reply, done) = bounded(1);
        if self.sender.send(LifecycleMessage::Sync(reply)).is_err() || done.recv().is_err() {
            return Err(self.stopped_error());
        }
        Ok(())
    }

    fn request(&mut self, target: LifecycleState) -> Result<(), EngineError> {
        self.target = target;
        if self.sender.send(LifecycleMessage::SetTarget(target)).is_err() {
            return Err(self.stopped_error());
        }
        Ok(())
    }

    /// Walk down to `Uninitialised` from wherever the thread is and join it
    pub(crate) fn stop(&mut self) -> Result<(), EngineError> {
        self.target = LifecycleState::Uninitialised;
        let _ = self.sender.send(LifecycleMessage::SetTarget(LifecycleState::Uninitialised));
        self.join()
    }

    fn join(&mut self) -> Result<(), EngineError> {
        match self.thread.take() {
            Some(thread) => thread.join().map_err(|_| EngineError::ThreadPanicked("lifecycle"))?,
            None => Ok(()),
        }
    }

    /// The thread has gone away: report why
    fn stopped_error(&mut self) -> EngineError {
        match self.join() {
            Err(error) => error,
            Ok(()) => EngineError::LifecycleStopped,
        }
    }
}

impl Drop for LifecycleManager {
    fn drop(&mut self) {
        if self.thread.is_some() {
            if let Err(error) = self.stop() {
                log::error!("Lifecycle thread stopped with error: {}", error);
            }
        }
    }
}

fn run(
    mut driver: LifecycleDriver,
    receiver: &Receiver<LifecycleMessage>,
    frame_interval: Option<Duration>,
) -> Result<(), EngineError> {
    let mut target = LifecycleState::Uninitialised;
    let mut waiters: Vec<Sender<()>> = Vec::new();

    loop {
        let current = driver.state();
        let first = if current == target && !current.is_active() {
            // Dormant: nothing to do until the controller asks
            receiver.recv().ok()
        } else if current == target {
            let wait = frame_interval.map_or(Duration::ZERO, |interval| driver.timer().time_until_next_frame(interval));
            match receiver.recv_timeout(wait) {
                Ok(message) => Some(message),
                Err(RecvTimeoutError::Timeout) => Some(LifecycleMessage::SetTarget(target)),
                Err(RecvTimeoutError::Disconnected) => None,
            }
        } else {
            match receiver.try_recv() {
                Ok(message) => Some(message),
                Err(TryRecvError::Empty) => Some(LifecycleMessage::SetTarget(target)),
                Err(TryRecvError::Disconnected) => None,
            }
        };

        // Every request gets its own pass, in arrival order
        let mut disconnected = first.is_none();
        let mut next = first;
        while let Some(message) = next {
            match message {
                LifecycleMessage::SetTarget(state) => {
                    target = state;
                    driver.apply(&driver.state().plan(target))?;
                }
                LifecycleMessage::Sync(reply) => waiters.push(reply),
            }
            next = match receiver.try_recv() {
                Ok(message) => Some(message),
                Err(TryRecvError::Empty) => None,
                Err(TryRecvError::Disconnected) => {
                    disconnected = true;
                    None
                }
            };
        }
        if disconnected {
            target = LifecycleState::Uninitialised;
            driver.apply(&driver.state().plan(target))?;
        }

        for waiter in waiters.drain(..) {
            let _ = waiter.send(());
        }

        if driver.state() == LifecycleState::Uninitialised && target == LifecycleState::Uninitialised {
            log::debug!("Lifecycle thread exiting");
            return Ok(());
        }
    }
}
