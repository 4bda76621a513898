//! Flat annulus builder, used for planetary rings

use std::f32::consts::TAU;

use crate::error::{SceneError, SceneResult};
use crate::foundation::math::{Quat, Transform, Vec3};
use crate::procedural::{
    require_between, require_color, require_positive, require_range, Bindings, Blueprint, NodeTemplate,
    ProceduralBuilder,
};
use crate::render::{BlendMode, GeometryDesc, MaterialDesc, MaterialState, ResourceDesc, Shading, Vertex};

/// Most segments the builder accepts
pub const MAX_SEGMENTS: u32 = 4096;

/// Parameters of a ring
#[derive(Debug, Clone, PartialEq)]
pub struct RingParams {
    /// Inner edge radius
    pub inner_radius: f32,
    /// Outer edge radius, greater than `inner_radius`
    pub outer_radius: f32,
    /// Segments around the ring
    pub segments: u32,
    /// Linear RGBA color
    pub color: [f32; 4],
    /// Opacity
    pub opacity: f32,
    /// Tilt about the X axis, in radians
    pub tilt: f32,
}

impl Default for RingParams {
    fn default() -> Self {
        Self {
            inner_radius: 1.2,
            outer_radius: 2.0,
            segments: 64,
            color: [0.8, 0.75, 0.6, 1.0],
            opacity: 0.8,
            tilt: 0.0,
        }
    }
}

/// Builds double-sided rings in the XZ plane
#[derive(Debug, Clone, Copy, Default)]
pub struct RingBuilder;

impl RingBuilder {
    /// Annulus vertices and indices; `u` runs across the band, `v` around it
    pub fn geometry(inner_radius: f32, outer_radius: f32, segments: u32) -> GeometryDesc {
        let mut vertices = Vec::with_capacity(2 * (segments as usize + 1));
        for i in 0..=segments {
            let t = i as f32 / segments as f32;
            let (sin, cos) = (t * TAU).sin_cos();
            for (radius, u) in [(inner_radius, 0.0), (outer_radius, 1.0)] {
                vertices.push(Vertex {
                    position: [cos * radius, 0.0, sin * radius],
                    normal: [0.0, 1.0, 0.0],
                    uv: [u, t],
                });
            }
        }

        let mut indices = Vec::with_capacity(segments as usize * 6);
        for i in 0..segments {
            let inner = i * 2;
            let outer = inner + 1;
            let next_inner = inner + 2;
            let next_outer = inner + 3;
            indices.extend_from_slice(&[inner, next_inner, outer, outer, next_inner, next_outer]);
        }

        GeometryDesc { vertices, indices }
    }
}

impl ProceduralBuilder for RingBuilder {
    type Params = RingParams;

    fn name(&self) -> &'static str {
        "ring"
    }

    fn describe(&self, params: &RingParams) -> SceneResult<Blueprint> {
        require_positive("inner_radius", params.inner_radius)?;
        require_positive("outer_radius", params.outer_radius)?;
        if params.outer_radius <= params.inner_radius {
            return Err(SceneError::invalid_parameter(
                "outer_radius",
                format!(
                    "must exceed inner_radius {}, got {}",
                    params.inner_radius, params.outer_radius
                ),
            ));
        }
        require_between("segments", params.segments, 3, MAX_SEGMENTS)?;
        require_color("color", params.color)?;
        require_range("opacity", params.opacity, 0.0, 1.0)?;
        require_range("tilt", params.tilt, -TAU, TAU)?;

        let state = MaterialState {
            color: params.color,
            opacity: params.opacity,
            emissive: 0.0,
        };
        let resources = vec![
            ResourceDesc::geometry(
                "ring-geometry",
                Self::geometry(params.inner_radius, params.outer_radius, params.segments),
            ),
            ResourceDesc::material(
                "ring-material",
                MaterialDesc {
                    shading: Shading::Unlit,
                    blend: BlendMode::Alpha,
                    double_sided: true,
                    state,
                },
            ),
        ];

        let tilt = Quat::from_axis_angle(&Vec3::x_axis(), params.tilt);
        let node = NodeTemplate::new("ring")
            .with_transform(Transform::identity().with_rotation(tilt))
            .with_bindings(Bindings {
                geometry: Some(0),
                material: Some(1),
                texture: None,
            })
            .with_material_state(state);

        Ok(Blueprint {
            resources,
            node,
            animation: None,
        })
    }
}
