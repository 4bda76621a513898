//! # Engine and Scene Configuration
//!
//! All configuration is plain serde data so it can live in TOML or RON files
//! next to the host application.
//!
//! ## Configuration Categories
//!
//! - **Engine Config**: logging, nominal refresh rate, controller retry budget
//! - **Scene Config**: what the composition layer passes when a scene mounts
//! - **Application Config**: an engine config plus the scenes to mount

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{SceneError, SceneResult};
use crate::scene::SchedulingMode;

/// # Engine Configuration
///
/// Host-wide settings shared by every scene context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Default log filter when `RUST_LOG` is not set
    pub log_level: String,
    /// Nominal display refresh rate; one over this is the nominal frame interval
    pub refresh_rate_hz: f32,
    /// How many `poll` calls a controller waits for a pending context before giving up
    pub attach_retry_budget: u32,
}

impl EngineConfig {
    /// Create a new engine configuration
    pub fn new() -> Self {
        Self {
            log_level: "info".to_string(),
            refresh_rate_hz: 60.0,
            attach_retry_budget: 120,
        }
    }

    /// Set log level
    #[must_use]
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the nominal refresh rate
    #[must_use]
    pub fn with_refresh_rate(mut self, hz: f32) -> Self {
        self.refresh_rate_hz = hz;
        self
    }

    /// Set the controller attach retry budget
    #[must_use]
    pub fn with_attach_retry_budget(mut self, polls: u32) -> Self {
        self.attach_retry_budget = polls;
        self
    }

    /// Nominal frame interval derived from the refresh rate
    pub fn frame_interval(&self) -> Duration {
        Duration::from_secs_f32(1.0 / self.refresh_rate_hz)
    }

    /// Validate the configuration
    pub fn validate(&self) -> SceneResult<()> {
        if !(self.refresh_rate_hz.is_finite() && self.refresh_rate_hz > 0.0) {
            return Err(SceneError::InvalidConfig(format!(
                "refresh rate must be positive, got {}",
                self.refresh_rate_hz
            )));
        }
        Ok(())
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// # Scene Configuration
///
/// Passed by the composition layer when a scene mounts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SceneConfig {
    /// Human readable label used in logs
    pub label: String,
    /// Initial camera position in world space
    pub camera_position: [f32; 3],
    /// Initial camera look-at target
    pub camera_target: [f32; 3],
    /// Vertical field of view in degrees
    pub field_of_view: f32,
    /// Near clipping plane distance
    pub near_plane: f32,
    /// Far clipping plane distance
    pub far_plane: f32,
    /// Render surface size in pixels `[width, height]`
    pub render_surface_size: [u32; 2],
    /// Whether the scene ticks every refresh or only after invalidation
    pub scheduling_mode: SchedulingMode,
}

impl SceneConfig {
    /// Create a scene configuration with defaults and the given label
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            ..Self::default()
        }
    }

    /// Set the camera position
    #[must_use]
    pub fn with_camera_position(mut self, position: [f32; 3]) -> Self {
        self.camera_position = position;
        self
    }

    /// Set the field of view in degrees
    #[must_use]
    pub fn with_field_of_view(mut self, degrees: f32) -> Self {
        self.field_of_view = degrees;
        self
    }

    /// Set the render surface size
    #[must_use]
    pub fn with_surface_size(mut self, width: u32, height: u32) -> Self {
        self.render_surface_size = [width, height];
        self
    }

    /// Set the scheduling mode
    #[must_use]
    pub fn with_scheduling_mode(mut self, mode: SchedulingMode) -> Self {
        self.scheduling_mode = mode;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> SceneResult<()> {
        let [width, height] = self.render_surface_size;
        if width == 0 || height == 0 {
            return Err(SceneError::InvalidConfig(format!(
                "render surface must be non-empty, got {width}x{height}"
            )));
        }
        if !(self.field_of_view > 0.0 && self.field_of_view < 180.0) {
            return Err(SceneError::InvalidConfig(format!(
                "field of view must be within (0, 180) degrees, got {}",
                self.field_of_view
            )));
        }
        if !(self.near_plane > 0.0 && self.far_plane > self.near_plane) {
            return Err(SceneError::InvalidConfig(format!(
                "clip planes must satisfy 0 < near < far, got {} / {}",
                self.near_plane, self.far_plane
            )));
        }
        Ok(())
    }
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            label: "scene".to_string(),
            camera_position: [0.0, 0.0, 5.0],
            camera_target: [0.0, 0.0, 0.0],
            field_of_view: 75.0,
            near_plane: 0.1,
            far_plane: 1000.0,
            render_surface_size: [800, 600],
            scheduling_mode: SchedulingMode::Always,
        }
    }
}

/// # Complete Application Configuration
///
/// Top-level configuration: engine settings plus the scenes to mount.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApplicationConfig {
    /// Engine configuration
    pub engine: EngineConfig,
    /// Scenes mounted at startup
    pub scenes: Vec<SceneConfig>,
}

impl ApplicationConfig {
    /// Validate the entire configuration
    pub fn validate(&self) -> SceneResult<()> {
        self.engine.validate()?;
        self.scenes.iter().try_for_each(SceneConfig::validate)
    }
}

impl Config for ApplicationConfig {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigFormat;

    #[test]
    fn test_default_scene_config_is_valid() {
        assert!(SceneConfig::default().validate().is_ok());
    }

    #[test]
    fn test_zero_surface_rejected() {
        let config = SceneConfig::new("broken").with_surface_size(0, 600);
        assert!(matches!(config.validate(), Err(SceneError::InvalidConfig(_))));
    }

    #[test]
    fn test_field_of_view_range() {
        assert!(SceneConfig::new("a").with_field_of_view(180.0).validate().is_err());
        assert!(SceneConfig::new("b").with_field_of_view(0.0).validate().is_err());
        assert!(SceneConfig::new("c").with_field_of_view(45.0).validate().is_ok());
    }

    #[test]
    fn test_frame_interval() {
        let config = EngineConfig::new().with_refresh_rate(50.0);
        assert_eq!(config.frame_interval(), Duration::from_millis(20));
    }

    #[test]
    fn test_parse_toml_application_config() {
        let text = r#"
            [engine]
            log_level = "debug"
            refresh_rate_hz = 120.0

            [[scenes]]
            label = "hero"
            render_surface_size = [1280, 720]
            scheduling_mode = "OnDemand"

            [[scenes]]
            label = "sidebar"
        "#;

        let config = ApplicationConfig::parse(text, ConfigFormat::Toml).unwrap();
        assert_eq!(config.engine.log_level, "debug");
        assert_eq!(config.engine.attach_retry_budget, 120);
        assert_eq!(config.scenes.len(), 2);
        assert_eq!(config.scenes[0].scheduling_mode, SchedulingMode::OnDemand);
        assert_eq!(config.scenes[1].render_surface_size, [800, 600]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_ron_render_and_parse() {
        let mut config = ApplicationConfig::default();
        config.scenes.push(SceneConfig::new("ron-scene").with_field_of_view(50.0));

        let text = config.render(ConfigFormat::Ron).unwrap();
        let parsed = ApplicationConfig::parse(&text, ConfigFormat::Ron).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_save_and_load_file() {
        let mut config = ApplicationConfig::default();
        config.scenes.push(SceneConfig::new("saved").with_surface_size(640, 360));

        let dir = std::env::temp_dir();
        for name in ["toml", "ron"] {
            let path = dir.join(format!("scene_engine_config_{}.{name}", std::process::id()));
            config.save_to_file(&path).unwrap();
            let loaded = ApplicationConfig::load_from_file(&path).unwrap();
            std::fs::remove_file(&path).unwrap();
            assert_eq!(loaded, config);
        }

        let bad = dir.join("scene_engine_config.yaml");
        assert!(matches!(
            config.save_to_file(&bad),
            Err(crate::config::ConfigError::UnsupportedFormat(_))
        ));
    }
}
