//! Scene contexts and object lifecycle
//!
//! ```text
//! SceneHost
//!  ├── SceneContext (A) ── registry, scheduler, effects, camera, surface
//!  │     └── attached controllers (weak)
//!  └── SceneContext (B) ── ...
//!
//! ObjectController ── owns ResourceSet ── nodes reference ids only
//! ```
//!
//! Every id handed out here is tagged with the context that minted it, and
//! every registry operation takes the caller's [`ContextScope`]. Addressing
//! another context's node fails instead of resolving.

pub mod context;
pub mod controller;
pub mod host;
pub mod node;
pub mod registry;
pub mod scheduler;
pub mod scope;

pub use context::SceneContext;
pub use controller::{BuildStatus, LifecycleState, ObjectController, TextureState};
pub use host::{ContextAvailability, FrameReport, SceneHost};
pub use node::{Renderable, SceneNode};
pub use registry::SceneRegistry;
pub use scheduler::{FrameCallback, FrameScheduler, FrameState, SchedulerState, SchedulingMode, TickReport};
pub use scope::ContextScope;
