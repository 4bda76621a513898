//! UV-sphere builder with an optional spin animation

use std::f32::consts::{PI, TAU};

use crate::error::{SceneError, SceneResult};
use crate::foundation::math::Vec3;
use crate::procedural::{
    require_between, require_color, require_positive, Animation, Bindings, Blueprint, NodeTemplate,
    ProceduralBuilder, TexturePolicy,
};
use crate::render::{BlendMode, GeometryDesc, MaterialDesc, MaterialState, ResourceDesc, Shading, Vertex};

/// Most segments the builder accepts along either axis
pub const MAX_SEGMENTS: u32 = 512;

/// Constant rotation of a sphere
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spin {
    /// Rotation axis, need not be normalized
    pub axis: [f32; 3],
    /// Angular speed
    pub radians_per_second: f32,
}

/// Parameters of a sphere
#[derive(Debug, Clone, PartialEq)]
pub struct SphereParams {
    /// Radius in world units
    pub radius: f32,
    /// Segments around the equator
    pub width_segments: u32,
    /// Segments from pole to pole
    pub height_segments: u32,
    /// Linear RGBA base color
    pub color: [f32; 4],
    /// Emissive intensity
    pub emissive: f32,
    /// Optional spin
    pub spin: Option<Spin>,
    /// How a later texture interacts with `color`
    pub texture_policy: TexturePolicy,
}

impl Default for SphereParams {
    fn default() -> Self {
        Self {
            radius: 1.0,
            width_segments: 32,
            height_segments: 16,
            color: [1.0, 1.0, 1.0, 1.0],
            emissive: 0.0,
            spin: None,
            texture_policy: TexturePolicy::PreserveColor,
        }
    }
}

/// Builds lit UV spheres
#[derive(Debug, Clone, Copy, Default)]
pub struct SphereBuilder;

impl SphereBuilder {
    /// Vertices and indices of a UV sphere, poles on the Y axis
    ///
    /// Segment counts are expected within [`MAX_SEGMENTS`].
    pub fn geometry(radius: f32, width_segments: u32, height_segments: u32) -> GeometryDesc {
        let columns = width_segments + 1;
        let mut vertices = Vec::with_capacity((columns * (height_segments + 1)) as usize);

        for iy in 0..=height_segments {
            let v = iy as f32 / height_segments as f32;
            // Pole rows share one position; offset u so their texels center
            let u_offset = match iy {
                0 => 0.5 / width_segments as f32,
                _ if iy == height_segments => -0.5 / width_segments as f32,
                _ => 0.0,
            };
            for ix in 0..=width_segments {
                let u = ix as f32 / width_segments as f32;
                let (sin_theta, cos_theta) = (v * PI).sin_cos();
                let (sin_phi, cos_phi) = (u * TAU).sin_cos();
                let normal = [-cos_phi * sin_theta, cos_theta, sin_phi * sin_theta];
                vertices.push(Vertex {
                    position: normal.map(|n| n * radius),
                    normal,
                    uv: [u + u_offset, 1.0 - v],
                });
            }
        }

        let at = |ix: u32, iy: u32| iy * columns + ix;
        let mut indices = Vec::new();
        for iy in 0..height_segments {
            for ix in 0..width_segments {
                let a = at(ix + 1, iy);
                let b = at(ix, iy);
                let c = at(ix, iy + 1);
                let d = at(ix + 1, iy + 1);
                if iy != 0 {
                    indices.extend_from_slice(&[a, b, d]);
                }
                if iy != height_segments - 1 {
                    indices.extend_from_slice(&[b, c, d]);
                }
            }
        }

        GeometryDesc { vertices, indices }
    }
}

impl ProceduralBuilder for SphereBuilder {
    type Params = SphereParams;

    fn name(&self) -> &'static str {
        "sphere"
    }

    fn describe(&self, params: &SphereParams) -> SceneResult<Blueprint> {
        require_positive("radius", params.radius)?;
        require_between("width_segments", params.width_segments, 3, MAX_SEGMENTS)?;
        require_between("height_segments", params.height_segments, 2, MAX_SEGMENTS)?;
        require_color("color", params.color)?;
        if !(params.emissive.is_finite() && params.emissive >= 0.0) {
            return Err(SceneError::invalid_parameter(
                "emissive",
                format!("must be non-negative, got {}", params.emissive),
            ));
        }
        let animation = match params.spin {
            Some(spin) => {
                let axis = Vec3::from(spin.axis);
                require_positive("spin.axis", axis.norm())?;
                if !spin.radians_per_second.is_finite() {
                    return Err(SceneError::invalid_parameter(
                        "spin.radians_per_second",
                        "must be finite",
                    ));
                }
                Some(Animation::Spin {
                    axis: axis.normalize(),
                    radians_per_second: spin.radians_per_second,
                })
            }
            None => None,
        };

        let state = MaterialState {
            color: params.color,
            opacity: params.color[3].min(1.0),
            emissive: params.emissive,
        };
        let resources = vec![
            ResourceDesc::geometry(
                "sphere-geometry",
                Self::geometry(params.radius, params.width_segments, params.height_segments),
            ),
            ResourceDesc::material(
                "sphere-material",
                MaterialDesc {
                    shading: Shading::Lit,
                    blend: BlendMode::Opaque,
                    double_sided: false,
                    state,
                },
            ),
        ];

        let node = NodeTemplate::new("sphere")
            .with_bindings(Bindings {
                geometry: Some(0),
                material: Some(1),
                texture: None,
            })
            .with_material_state(state)
            .with_texture_policy(params.texture_policy);

        Ok(Blueprint {
            resources,
            node,
            animation,
        })
    }
}
