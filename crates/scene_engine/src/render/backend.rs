//! Backend abstraction trait for the rendering system
//!
//! This module defines the trait that GPU backends implement and the plain
//! data a scene context hands them each frame. The scene core never talks to
//! a graphics API directly; everything goes through [`GpuBackend`].

use thiserror::Error;

use crate::foundation::collections::{ContextId, NodeId};
use crate::foundation::math::Mat4;
use crate::render::resource::{MaterialState, ResourceDesc, ResourceId};

/// Result type for backend operations
pub type BackendResult<T> = Result<T, BackendError>;

/// Backend errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// Device memory budget exhausted
    #[error("Out of device memory: requested {requested} bytes, {available} available")]
    OutOfMemory {
        /// Bytes requested
        requested: u64,
        /// Bytes still available
        available: u64,
    },

    /// Surface id not known to the backend
    #[error("Unknown surface {0:?}")]
    UnknownSurface(SurfaceId),

    /// Resource id not known to the backend
    #[error("Unknown resource {0:?}")]
    UnknownResource(ResourceId),

    /// Any other backend failure
    #[error("Backend failure: {0}")]
    Other(String),
}

/// Handle to a presentation surface stored in the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SurfaceId(pub u64);

/// One visible renderable node, flattened with its world matrix
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    /// Node that produced this draw
    pub node: NodeId,
    /// World transform
    pub world: Mat4,
    /// Geometry buffer
    pub geometry: Option<ResourceId>,
    /// Material
    pub material: Option<ResourceId>,
    /// Bound texture
    pub texture: Option<ResourceId>,
    /// Material uniforms for this frame
    pub state: MaterialState,
}

/// One post-render pass as recorded for a frame
#[derive(Debug, Clone, PartialEq)]
pub struct PassRecord {
    /// Pass label
    pub label: String,
    /// Clamped parameter values
    pub parameters: Vec<(String, f32)>,
    /// Offscreen target the pass writes, if any
    pub target: Option<ResourceId>,
    /// Size the pass renders at
    pub size: (u32, u32),
}

/// Everything a backend needs to render one frame of one context
#[derive(Debug, Clone, PartialEq)]
pub struct FramePacket {
    /// Context that rendered the frame
    pub context: ContextId,
    /// Destination surface
    pub surface: SurfaceId,
    /// Scheduler frame index
    pub frame_index: u64,
    /// Camera view matrix
    pub view: Mat4,
    /// Camera projection matrix
    pub projection: Mat4,
    /// Scene draws in traversal order
    pub draws: Vec<DrawItem>,
    /// Effect passes in pipeline order
    pub passes: Vec<PassRecord>,
}

/// Allocation and submission counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeviceStats {
    /// Live textures
    pub live_textures: usize,
    /// Live geometries
    pub live_geometries: usize,
    /// Live materials
    pub live_materials: usize,
    /// Live render targets
    pub live_render_targets: usize,
    /// Live surfaces
    pub live_surfaces: usize,
    /// Resources created since startup
    pub created: u64,
    /// Resources released since startup
    pub released: u64,
    /// Releases of ids that were not live
    pub double_releases: u64,
    /// Material uniform updates
    pub material_updates: u64,
    /// Frames submitted since startup
    pub frames_submitted: u64,
}

impl DeviceStats {
    /// Total live resources of every kind, surfaces excluded
    pub fn live_resources(&self) -> usize {
        self.live_textures + self.live_geometries + self.live_materials + self.live_render_targets
    }
}

/// Main GPU backend trait
///
/// All methods are called from the host thread. Release calls never fail;
/// a backend that is handed an id it does not know records it as a double
/// release.
pub trait GpuBackend {
    /// Backend name for logs
    fn name(&self) -> &str;

    /// Allocate the resource described by `desc`
    fn create_resource(&mut self, desc: &ResourceDesc) -> BackendResult<ResourceId>;

    /// Release a resource
    fn release_resource(&mut self, id: ResourceId);

    /// Upload new material uniforms
    fn update_material(&mut self, id: ResourceId, state: &MaterialState) -> BackendResult<()>;

    /// Create a presentation surface
    fn create_surface(&mut self, width: u32, height: u32) -> BackendResult<SurfaceId>;

    /// Resize a presentation surface
    fn resize_surface(&mut self, surface: SurfaceId, width: u32, height: u32) -> BackendResult<()>;

    /// Release a presentation surface
    fn release_surface(&mut self, surface: SurfaceId);

    /// Render and present one frame
    fn submit_frame(&mut self, packet: &FramePacket) -> BackendResult<()>;

    /// Snapshot of allocation counters
    fn stats(&self) -> DeviceStats;

    /// Downcast to concrete backend type for inspection
    fn as_any(&self) -> &dyn std::any::Any;
}
