//! # Rendering System
//!
//! Backend-agnostic rendering layer shared by every scene context.
//!
//! ## Architecture
//!
//! - **Device**: cloneable handle over the active [`GpuBackend`]; the only
//!   path for allocating and releasing GPU objects
//! - **Resources**: descriptions plus owning, idempotently disposable handles
//! - **Surface / Camera**: per-context presentation target and view
//! - **Effects**: per-context ordered post-render passes with clamped parameters
//! - **Headless backend**: bookkeeping backend for tests and demos

pub mod backend;
pub mod camera;
pub mod device;
pub mod effects;
pub mod headless;
pub mod passes;
pub mod resource;
pub mod surface;

pub use backend::{
    BackendError, BackendResult, DeviceStats, DrawItem, FramePacket, GpuBackend, PassRecord, SurfaceId,
};
pub use camera::Camera;
pub use device::RenderDevice;
pub use effects::{EffectPass, EffectPipeline, ParamSpec, PassParameters};
pub use headless::{DeviceEvent, HeadlessBackend};
pub use passes::{BloomPass, ExposurePass, VignettePass};
pub use resource::{
    BlendMode, GeometryDesc, MaterialDesc, MaterialState, ResourceDesc, ResourceHandle, ResourceId,
    ResourceKind, ResourcePayload, ResourceSet, ResourceUsage, Shading, TextureDesc, TextureFormat, Vertex,
};
pub use surface::RenderSurface;
