//! # Core Engine Module
//!
//! Shared configuration types used by every subsystem.

pub mod config;

pub use crate::config::{Config, ConfigError, ConfigFormat};
pub use config::{ApplicationConfig, EngineConfig, SceneConfig};
