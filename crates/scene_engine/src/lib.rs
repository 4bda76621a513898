//! # Scene Engine
//!
//! Multi-scene render scheduling and object lifecycle core.
//!
//! ## Features
//!
//! - **Isolated contexts**: any number of scenes on one device, each with its
//!   own registry, scheduler, effect pipeline, camera and surface
//! - **Scoped identities**: ids carry the context that minted them, so
//!   cross-context access fails with [`SceneError::ScopeViolation`]
//! - **Deterministic lifecycle**: controllers dispose superseded GPU handles
//!   before allocating replacements, and context teardown releases every
//!   handle exactly once
//! - **Frame scheduling**: continuous or on-demand ticks, stable callback
//!   order, pause on hidden pages with a clamped resume delta
//! - **Procedural builders**: glow sprites, spheres and rings from declarative
//!   parameters
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use scene_engine::prelude::*;
//! use std::time::Duration;
//!
//! fn main() -> SceneResult<()> {
//!     let mut host = SceneHost::headless();
//!     let scene = host.create_context(&SceneConfig::new("orbit"))?;
//!
//!     let mut planet = ObjectController::new(scene, SphereBuilder);
//!     planet.build(&mut host, SphereParams::default())?;
//!
//!     let report = host.frame(Duration::ZERO);
//!     assert_eq!(report.ticked, 1);
//!
//!     planet.dispose(&mut host)?;
//!     host.destroy_context(scene)
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]

pub mod assets;
pub mod config;
pub mod core;
pub mod error;
pub mod foundation;
pub mod procedural;
pub mod render;
pub mod scene;

#[cfg(test)]
mod tests;

pub use error::{ParentRejection, SceneError, SceneResult};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        assets::{promise, AssetError, AssetPoll, AssetPromise, AssetResolver, TextureData},
        config::Config,
        core::config::{ApplicationConfig, EngineConfig, SceneConfig},
        error::{SceneError, SceneResult},
        foundation::{
            collections::{ContextId, NodeId},
            math::{Transform, Vec3},
        },
        procedural::{
            GlowParams, GlowPulse, GlowSpriteBuilder, ProceduralBuilder, RingBuilder, RingParams,
            SphereBuilder, SphereParams, Spin, TexturePolicy,
        },
        render::{BloomPass, Camera, ExposurePass, RenderDevice, VignettePass},
        scene::{
            BuildStatus, ContextScope, LifecycleState, ObjectController, SceneHost, SceneNode,
            SchedulingMode, TextureState,
        },
    };
}
