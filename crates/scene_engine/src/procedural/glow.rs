//! Glow sprite builder: radial-gradient alpha mask plus an additive material

use crate::error::{SceneError, SceneResult};
use crate::foundation::math::Transform;
use crate::procedural::{
    require_at_least, require_color, require_positive, require_range, Animation, Bindings, Blueprint,
    NodeTemplate, ProceduralBuilder,
};
use crate::render::{BlendMode, MaterialDesc, MaterialState, ResourceDesc, Shading};

/// Largest texture edge the builder will generate
pub const MAX_RESOLUTION: u32 = 1024;

/// Opacity pulse of a glow
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GlowPulse {
    /// Cycles per second
    pub frequency_hz: f32,
    /// Opacity at the trough, as a fraction of the base opacity
    pub min_factor: f32,
}

/// Parameters of a glow sprite
#[derive(Debug, Clone, PartialEq)]
pub struct GlowParams {
    /// Texture edge length in pixels
    pub resolution: u32,
    /// Linear RGBA tint
    pub color: [f32; 4],
    /// Fraction of the radius that stays fully opaque
    pub inner_radius: f32,
    /// Exponent of the falloff curve
    pub falloff: f32,
    /// Base opacity
    pub opacity: f32,
    /// World-space sprite size
    pub scale: f32,
    /// Optional opacity pulse
    pub pulse: Option<GlowPulse>,
}

impl Default for GlowParams {
    fn default() -> Self {
        Self {
            resolution: 64,
            color: [1.0, 0.85, 0.5, 1.0],
            inner_radius: 0.1,
            falloff: 2.0,
            opacity: 1.0,
            scale: 1.0,
            pulse: None,
        }
    }
}

/// Builds glow sprites
#[derive(Debug, Clone, Copy, Default)]
pub struct GlowSpriteBuilder;

impl GlowSpriteBuilder {
    /// Alpha of the mask at normalized distance `d` from the center
    fn alpha(d: f32, inner_radius: f32, falloff: f32) -> f32 {
        if d <= inner_radius {
            1.0
        } else if d >= 1.0 {
            0.0
        } else {
            (1.0 - (d - inner_radius) / (1.0 - inner_radius)).powf(falloff)
        }
    }

    /// RGBA8 pixels of the gradient mask
    pub fn gradient(params: &GlowParams) -> Vec<u8> {
        let size = params.resolution as usize;
        let half = params.resolution as f32 / 2.0;
        let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
        let [r, g, b, a] = params.color;

        let mut pixels = Vec::with_capacity(size * size * 4);
        for y in 0..size {
            for x in 0..size {
                let dx = (x as f32 + 0.5 - half) / half;
                let dy = (y as f32 + 0.5 - half) / half;
                let alpha = Self::alpha(dx.hypot(dy), params.inner_radius, params.falloff);
                pixels.extend_from_slice(&[to_byte(r), to_byte(g), to_byte(b), to_byte(alpha * a)]);
            }
        }
        pixels
    }
}

impl ProceduralBuilder for GlowSpriteBuilder {
    type Params = GlowParams;

    fn name(&self) -> &'static str {
        "glow"
    }

    fn describe(&self, params: &GlowParams) -> SceneResult<Blueprint> {
        require_at_least("resolution", params.resolution, 2)?;
        if params.resolution > MAX_RESOLUTION {
            return Err(SceneError::invalid_parameter(
                "resolution",
                format!("must be at most {MAX_RESOLUTION}, got {}", params.resolution),
            ));
        }
        require_color("color", params.color)?;
        require_range("inner_radius", params.inner_radius, 0.0, 0.99)?;
        require_positive("falloff", params.falloff)?;
        require_range("opacity", params.opacity, 0.0, 1.0)?;
        require_positive("scale", params.scale)?;
        if let Some(pulse) = params.pulse {
            require_positive("pulse.frequency_hz", pulse.frequency_hz)?;
            require_range("pulse.min_factor", pulse.min_factor, 0.0, 1.0)?;
        }

        let state = MaterialState {
            color: params.color,
            opacity: params.opacity,
            emissive: 1.0,
        };
        let resources = vec![
            ResourceDesc::texture(
                "glow-mask",
                params.resolution,
                params.resolution,
                Self::gradient(params),
            ),
            ResourceDesc::material(
                "glow-material",
                MaterialDesc {
                    shading: Shading::Sprite,
                    blend: BlendMode::Additive,
                    double_sided: true,
                    state,
                },
            ),
        ];

        let node = NodeTemplate::new("glow")
            .with_transform(Transform::identity().with_uniform_scale(params.scale))
            .with_bindings(Bindings {
                geometry: None,
                material: Some(1),
                texture: Some(0),
            })
            .with_material_state(state);

        let animation = params.pulse.map(|pulse| Animation::Pulse {
            frequency_hz: pulse.frequency_hz,
            min_opacity: params.opacity * pulse.min_factor,
            max_opacity: params.opacity,
        });

        Ok(Blueprint {
            resources,
            node,
            animation,
        })
    }
}
