//! GPU resource descriptions and owning handles
//!
//! A [`ResourceDesc`] is plain data describing what to allocate. The device
//! turns it into a [`ResourceHandle`], the single owner of the backend object.
//!
//! # Ownership
//!
//! ```text
//! ResourceDesc ──allocate──▶ ResourceHandle ──dispose / drop──▶ backend release
//!                                 │
//!                           exactly once
//! ```

use std::cell::Cell;
use std::fmt;

use bitflags::bitflags;
use bytemuck::{Pod, Zeroable};

use crate::render::device::RenderDevice;

bitflags! {
    /// How a resource is bound by the renderer
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ResourceUsage: u32 {
        /// Sampled from shaders
        const SAMPLED = 1 << 0;
        /// Written as a color attachment
        const RENDER_TARGET = 1 << 1;
        /// Vertex buffer
        const VERTEX = 1 << 2;
        /// Index buffer
        const INDEX = 1 << 3;
        /// Uniform data
        const UNIFORM = 1 << 4;
    }
}

/// Category of GPU resource
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Sampled image
    Texture,
    /// Vertex and index buffers
    Geometry,
    /// Shading parameters
    Material,
    /// Offscreen color attachment
    RenderTarget,
}

/// Backend-assigned identity of one GPU object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u64);

/// Vertex layout shared by every procedural geometry
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    /// Object-space position
    pub position: [f32; 3],
    /// Unit normal
    pub normal: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
}

/// Pixel formats understood by the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextureFormat {
    /// 8-bit RGBA
    Rgba8,
    /// 16-bit float RGBA, used for HDR targets
    Rgba16F,
}

impl TextureFormat {
    /// Bytes per pixel
    pub fn bytes_per_pixel(self) -> u64 {
        match self {
            Self::Rgba8 => 4,
            Self::Rgba16F => 8,
        }
    }
}

/// Texture contents
#[derive(Debug, Clone, PartialEq)]
pub struct TextureDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
    /// Tightly packed pixel data
    pub data: Vec<u8>,
}

/// Indexed triangle list
#[derive(Debug, Clone, PartialEq)]
pub struct GeometryDesc {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Triangle indices into `vertices`
    pub indices: Vec<u32>,
}

impl GeometryDesc {
    /// Raw vertex bytes as uploaded to the vertex buffer
    pub fn vertex_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.vertices)
    }

    /// Number of triangles
    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }
}

/// Lighting model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Shading {
    /// Flat color, no lighting
    Unlit,
    /// Diffuse and specular lighting
    Lit,
    /// Camera-facing sprite
    Sprite,
}

/// Framebuffer blending
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlendMode {
    /// No blending
    Opaque,
    /// Standard alpha blending
    Alpha,
    /// Additive blending, for glows
    Additive,
}

/// Mutable per-material uniforms animated by frame callbacks
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MaterialState {
    /// Linear RGBA base color
    pub color: [f32; 4],
    /// Opacity multiplier in `[0, 1]`
    pub opacity: f32,
    /// Emissive intensity
    pub emissive: f32,
}

impl Default for MaterialState {
    fn default() -> Self {
        Self {
            color: [1.0, 1.0, 1.0, 1.0],
            opacity: 1.0,
            emissive: 0.0,
        }
    }
}

/// Material description
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialDesc {
    /// Lighting model
    pub shading: Shading,
    /// Blend mode
    pub blend: BlendMode,
    /// Render both faces
    pub double_sided: bool,
    /// Initial uniforms
    pub state: MaterialState,
}

/// Offscreen color attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderTargetDesc {
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Pixel format
    pub format: TextureFormat,
}

/// Kind-specific part of a [`ResourceDesc`]
#[derive(Debug, Clone, PartialEq)]
pub enum ResourcePayload {
    /// Texture payload
    Texture(TextureDesc),
    /// Geometry payload
    Geometry(GeometryDesc),
    /// Material payload
    Material(MaterialDesc),
    /// Render target payload
    RenderTarget(RenderTargetDesc),
}

/// Everything the backend needs to allocate one resource
#[derive(Debug, Clone, PartialEq)]
pub struct ResourceDesc {
    /// Debug label
    pub label: String,
    /// Binding usage
    pub usage: ResourceUsage,
    /// Contents
    pub payload: ResourcePayload,
}

impl ResourceDesc {
    /// Describe a sampled RGBA8 texture
    pub fn texture(label: impl Into<String>, width: u32, height: u32, rgba: Vec<u8>) -> Self {
        Self {
            label: label.into(),
            usage: ResourceUsage::SAMPLED,
            payload: ResourcePayload::Texture(TextureDesc {
                width,
                height,
                format: TextureFormat::Rgba8,
                data: rgba,
            }),
        }
    }

    /// Describe an indexed geometry
    pub fn geometry(label: impl Into<String>, geometry: GeometryDesc) -> Self {
        Self {
            label: label.into(),
            usage: ResourceUsage::VERTEX | ResourceUsage::INDEX,
            payload: ResourcePayload::Geometry(geometry),
        }
    }

    /// Describe a material
    pub fn material(label: impl Into<String>, material: MaterialDesc) -> Self {
        Self {
            label: label.into(),
            usage: ResourceUsage::UNIFORM,
            payload: ResourcePayload::Material(material),
        }
    }

    /// Describe a render target that later passes can sample
    pub fn render_target(label: impl Into<String>, width: u32, height: u32, format: TextureFormat) -> Self {
        Self {
            label: label.into(),
            usage: ResourceUsage::RENDER_TARGET | ResourceUsage::SAMPLED,
            payload: ResourcePayload::RenderTarget(RenderTargetDesc { width, height, format }),
        }
    }

    /// Kind of resource described
    pub fn kind(&self) -> ResourceKind {
        match self.payload {
            ResourcePayload::Texture(_) => ResourceKind::Texture,
            ResourcePayload::Geometry(_) => ResourceKind::Geometry,
            ResourcePayload::Material(_) => ResourceKind::Material,
            ResourcePayload::RenderTarget(_) => ResourceKind::RenderTarget,
        }
    }

    /// Approximate device memory footprint in bytes
    pub fn byte_size(&self) -> u64 {
        match &self.payload {
            ResourcePayload::Texture(tex) => {
                u64::from(tex.width) * u64::from(tex.height) * tex.format.bytes_per_pixel()
            }
            ResourcePayload::Geometry(geo) => {
                (geo.vertex_bytes().len() + geo.indices.len() * std::mem::size_of::<u32>()) as u64
            }
            ResourcePayload::Material(_) => 64,
            ResourcePayload::RenderTarget(rt) => {
                u64::from(rt.width) * u64::from(rt.height) * rt.format.bytes_per_pixel()
            }
        }
    }
}

/// Owning handle of one backend resource
///
/// Disposal is idempotent and also happens on drop, so the backend sees
/// exactly one release per allocation.
pub struct ResourceHandle {
    id: ResourceId,
    kind: ResourceKind,
    label: String,
    device: RenderDevice,
    disposed: Cell<bool>,
}

impl ResourceHandle {
    pub(crate) fn new(id: ResourceId, kind: ResourceKind, label: String, device: RenderDevice) -> Self {
        Self {
            id,
            kind,
            label,
            device,
            disposed: Cell::new(false),
        }
    }

    /// Backend identity
    pub fn id(&self) -> ResourceId {
        self.id
    }

    /// Resource kind
    pub fn kind(&self) -> ResourceKind {
        self.kind
    }

    /// Debug label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Whether the backend object has been released
    pub fn is_disposed(&self) -> bool {
        self.disposed.get()
    }

    /// Device that owns the backend object
    pub fn device(&self) -> &RenderDevice {
        &self.device
    }

    /// Release the backend object; later calls are no-ops
    pub fn dispose(&self) {
        if self.disposed.replace(true) {
            return;
        }
        log::trace!("Disposing {:?} '{}' ({:?})", self.kind, self.label, self.id);
        self.device.release(self.id);
    }
}

impl Drop for ResourceHandle {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl fmt::Debug for ResourceHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .field("label", &self.label)
            .field("disposed", &self.disposed.get())
            .finish()
    }
}

/// Ordered set of handles produced by one build
#[derive(Debug, Default)]
pub struct ResourceSet {
    handles: Vec<ResourceHandle>,
}

impl ResourceSet {
    /// Create an empty set
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a handle
    pub fn push(&mut self, handle: ResourceHandle) {
        self.handles.push(handle);
    }

    /// Number of handles, disposed or not
    pub fn len(&self) -> usize {
        self.handles.len()
    }

    /// Whether the set holds no handles
    pub fn is_empty(&self) -> bool {
        self.handles.is_empty()
    }

    /// Number of handles not yet disposed
    pub fn live_count(&self) -> usize {
        self.handles.iter().filter(|h| !h.is_disposed()).count()
    }

    /// Backend id of the handle at `index`
    pub fn id_at(&self, index: usize) -> Option<ResourceId> {
        self.handles.get(index).map(ResourceHandle::id)
    }

    /// First handle of the given kind
    pub fn first_of(&self, kind: ResourceKind) -> Option<&ResourceHandle> {
        self.handles.iter().find(|h| h.kind() == kind)
    }

    /// Iterate over handles in allocation order
    pub fn iter(&self) -> impl Iterator<Item = &ResourceHandle> {
        self.handles.iter()
    }

    /// Dispose every handle and empty the set, returning how many were live
    pub fn dispose_all(&mut self) -> usize {
        let live = self.live_count();
        for handle in self.handles.drain(..) {
            handle.dispose();
        }
        live
    }
}
