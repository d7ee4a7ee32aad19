//! # Core Engine Module
//!
//! Shared configuration and the application lifecycle state machine.
//!
//! ## Organization
//!
//! - **Config**: Unified configuration for lifecycle, rendering and storage
//! - **Lifecycle**: Transition table, driver and the dedicated lifecycle thread

pub mod config;
pub mod lifecycle;

pub use config::{
    ApplicationConfig,
    EngineSettings,
    RendererSettings,
    StorageSettings,
    Config,
    ConfigError,
};
pub use lifecycle::{LifecycleDriver, LifecycleManager, LifecycleState, LifecycleTransition, TransitionPlan};
