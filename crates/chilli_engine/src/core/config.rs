//! # Unified Configuration System
//!
//! Configuration for the engine core: lifecycle pacing and logging, the render
//! pipeline, and the storage locations resources are reloaded from.
//!
//! ## Configuration Categories
//!
//! - **Engine Settings**: Frame pacing, logging, debug features
//! - **Renderer Settings**: Command buffer queue depth, context-loss recovery, dynamic buffers
//! - **Storage Settings**: Directory roots for each [`StorageLocation`](crate::resource::StorageLocation)

use serde::{Serialize, Deserialize};
use std::path::PathBuf;

use crate::foundation::math::{Colour, Resolution};
use crate::resource::StorageLocation;

pub use crate::config::{Config, ConfigError};

/// # Engine Settings
///
/// Core behaviour of the lifecycle thread and logging.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Default log filter, overridden by `RUST_LOG`
    pub log_level: String,
    /// Target frames per second while resumed; `None` runs unpaced
    pub target_fps: Option<u32>,
    /// Whether to enable debug features
    pub debug_mode: bool,
}

impl EngineSettings {
    /// Create engine settings with defaults
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            target_fps: Some(60),
            debug_mode: cfg!(debug_assertions),
        }
    }

    /// Set log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set target FPS
    pub fn with_target_fps(mut self, fps: u32) -> Self {
        self.target_fps = Some(fps);
        self
    }

    /// Run the update loop without frame pacing
    pub fn unpaced(mut self) -> Self {
        self.target_fps = None;
        self
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// # Renderer Settings
///
/// Tuning for the command buffer hand-off and GPU resource recovery.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RendererSettings {
    /// Resolution of the main render target
    pub resolution: Resolution,
    /// Clear colour of the main render target
    pub clear_colour: Colour,
    /// Maximum number of built frames waiting for the render thread
    pub max_queued_frames: usize,
    /// Whether GPU resources are backed up and restored across context loss.
    /// `None` enables it only on platforms known to lose the context.
    pub context_loss_recovery: Option<bool>,
    /// Capacity in bytes of the dynamic vertex buffer used for mesh batches
    pub dynamic_vertex_capacity: usize,
    /// Capacity in indices of the dynamic index buffer used for mesh batches
    pub dynamic_index_capacity: usize,
}

impl RendererSettings {
    /// Create renderer settings with defaults
    pub fn new() -> Self {
        Self {
            resolution: Resolution::new(1280, 720),
            clear_colour: Colour::BLACK,
            max_queued_frames: 1,
            context_loss_recovery: None,
            dynamic_vertex_capacity: 64 * 1024,
            dynamic_index_capacity: 16 * 1024,
        }
    }

    /// Set the main target resolution
    pub fn with_resolution(mut self, width: u32, height: u32) -> Self {
        self.resolution = Resolution::new(width, height);
        self
    }

    /// Set the maximum number of queued frames
    pub fn with_max_queued_frames(mut self, frames: usize) -> Self {
        self.max_queued_frames = frames;
        self
    }

    /// Force context-loss recovery on or off
    pub fn with_context_loss_recovery(mut self, enabled: bool) -> Self {
        self.context_loss_recovery = Some(enabled);
        self
    }

    /// Whether context-loss recovery is active for this build
    pub fn context_loss_recovery_enabled(&self) -> bool {
        self.context_loss_recovery.unwrap_or(cfg!(target_os = "android"))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_queued_frames == 0 {
            return Err(ConfigError::Invalid("max_queued_frames must be at least 1".to_string()));
        }
        if self.max_queued_frames > 4 {
            return Err(ConfigError::Invalid("max_queued_frames should not exceed 4".to_string()));
        }
        if self.resolution.width == 0 || self.resolution.height == 0 {
            return Err(ConfigError::Invalid("resolution must be non-zero".to_string()));
        }
        if self.dynamic_vertex_capacity == 0 || self.dynamic_index_capacity == 0 {
            return Err(ConfigError::Invalid("dynamic buffer capacities must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Default for RendererSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// # Storage Settings
///
/// Directory roots backing each storage location when resources are read
/// from disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Application package (read-only)
    pub package_dir: PathBuf,
    /// Engine-provided assets (read-only)
    pub chilli_source_dir: PathBuf,
    /// Cache directory
    pub cache_dir: PathBuf,
    /// Save data directory
    pub save_data_dir: PathBuf,
    /// Downloadable content directory
    pub dlc_dir: PathBuf,
}

impl StorageSettings {
    /// Create storage settings rooted at `resources/`
    pub fn new() -> Self {
        Self::rooted_at("resources")
    }

    /// Lay out every storage location under a single root directory
    pub fn rooted_at(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            package_dir: root.join("package"),
            chilli_source_dir: root.join("chilli_source"),
            cache_dir: root.join("cache"),
            save_data_dir: root.join("save_data"),
            dlc_dir: root.join("dlc"),
        }
    }

    /// Directory backing a storage location, `None` for in-memory resources
    pub fn directory(&self, location: StorageLocation) -> Option<&PathBuf> {
        match location {
            StorageLocation::None => None,
            StorageLocation::Package => Some(&self.package_dir),
            StorageLocation::ChilliSource => Some(&self.chilli_source_dir),
            StorageLocation::Cache => Some(&self.cache_dir),
            StorageLocation::SaveData => Some(&self.save_data_dir),
            StorageLocation::Dlc => Some(&self.dlc_dir),
        }
    }
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self::new()
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration that encompasses all engine subsystems.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine core settings
    pub engine: EngineSettings,
    /// Render pipeline settings
    pub renderer: RendererSettings,
    /// Storage location roots
    pub storage: StorageSettings,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.renderer.validate()?;
        if self.engine.target_fps == Some(0) {
            return Err(ConfigError::Invalid("target_fps must be non-zero".to_string()));
        }
        Ok(())
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("chilli_config_{}_{}", std::process::id(), name))
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(ApplicationConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_queued_frames_rejected() {
        let mut config = ApplicationConfig::default();
        config.renderer = config.renderer.with_max_queued_frames(0);
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_toml_round_trip() {
        let path = temp_path("round_trip.toml");
        let mut config = ApplicationConfig::default();
        config.engine = config.engine.with_log_level("debug").with_target_fps(30);
        config.renderer = config.renderer.with_context_loss_recovery(true).with_resolution(640, 480);

        config.save_to_file(&path).expect("save");
        let loaded = ApplicationConfig::load_from_file(&path).expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.engine.log_level, "debug");
        assert_eq!(loaded.engine.target_fps, Some(30));
        assert!(loaded.renderer.context_loss_recovery_enabled());
        assert_eq!(loaded.renderer.resolution, Resolution::new(640, 480));
    }

    #[test]
    fn test_partial_ron_uses_defaults() {
        let path = temp_path("partial.ron");
        std::fs::write(&path, "(renderer: (max_queued_frames: 2))").expect("write");
        let loaded = ApplicationConfig::load_from_file(&path).expect("load");
        std::fs::remove_file(&path).ok();

        assert_eq!(loaded.renderer.max_queued_frames, 2);
        assert_eq!(loaded.engine.log_level, "info");
    }

    #[test]
    fn test_unknown_extension_rejected() {
        let result = ApplicationConfig::load_from_file("settings.json");
        assert!(matches!(result, Err(ConfigError::UnsupportedFormat(_))));
    }

    #[test]
    fn test_storage_directory_lookup() {
        let storage = StorageSettings::rooted_at("/data");
        assert!(storage.directory(StorageLocation::None).is_none());
        assert_eq!(storage.directory(StorageLocation::Package), Some(&PathBuf::from("/data/package")));
    }
}
