//! Foundation module - Core utilities and types
//!
//! - Math types and the node transform
//! - Arena keys and context-scoped identifiers
//! - Frame timing
//! - Logging setup

pub mod collections;
pub mod logging;
pub mod math;
pub mod time;
