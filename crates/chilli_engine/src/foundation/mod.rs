//! Foundation module - Core utilities and types
//!
//! This module provides fundamental utilities used throughout the engine:
//! - Math types shared by snapshots and render commands
//! - Frame timing
//! - Logging initialisation

pub mod math;
pub mod time;
pub mod logging;
