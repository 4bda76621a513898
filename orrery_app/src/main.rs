//! Orrery demo application
//!
//! Mounts two independent scenes on a headless device: a small solar system
//! that animates every refresh, and an on-demand inspector view of a moon
//! whose texture arrives from a worker thread. The demo drives both with
//! simulated display refresh timestamps, rebuilds the planet reactively,
//! hides the page for a while, resizes the inspector, and prints device
//! statistics once everything is torn down.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use rand::Rng;
use scene_engine::config::{Config, ConfigError};
use scene_engine::core::config::{ApplicationConfig, SceneConfig};
use scene_engine::foundation::collections::ContextId;
use scene_engine::foundation::logging;
use scene_engine::prelude::*;
use scene_engine::render::{DeviceStats, HeadlessBackend};
use thiserror::Error;

const REFRESHES: u64 = 600;
const REBUILD_EVERY: u64 = 120;
const HIDE_AT: u64 = 200;
const SHOW_AT: u64 = 260;
const RESIZE_AT: u64 = 300;
const RETUNE_AT: u64 = 400;

#[derive(Error, Debug)]
enum OrreryError {
    #[error(transparent)]
    Scene(#[from] SceneError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("expected at least two scenes, found {0}")]
    MissingScenes(usize),
}

struct OrreryApp {
    host: SceneHost,
    system: ContextId,
    inspector: ContextId,
    sun: ObjectController<GlowSpriteBuilder>,
    planet: ObjectController<SphereBuilder>,
    rings: ObjectController<RingBuilder>,
    moon: ObjectController<SphereBuilder>,
    planet_params: SphereParams,
}

impl OrreryApp {
    fn new(config: &ApplicationConfig) -> Result<Self, OrreryError> {
        config.validate()?;
        let [system_config, inspector_config, ..] = config.scenes.as_slice() else {
            return Err(OrreryError::MissingScenes(config.scenes.len()));
        };

        let mut host = SceneHost::new(config.engine.clone(), RenderDevice::headless())?;
        let system = host.create_context(system_config)?;
        let inspector = host.create_context(inspector_config)?;

        host.context_mut(system)?
            .effects_mut()
            .add_pass(Box::new(BloomPass::new()), None)?;
        let inspector_effects = host.context_mut(inspector)?.effects_mut();
        inspector_effects.add_pass(Box::new(ExposurePass::new()), None)?;
        inspector_effects.add_pass(Box::new(VignettePass::new()), None)?;

        let mut sun = ObjectController::new(system, GlowSpriteBuilder);
        sun.build(
            &mut host,
            GlowParams {
                resolution: 256,
                scale: 4.0,
                pulse: Some(GlowPulse {
                    frequency_hz: 0.25,
                    min_factor: 0.7,
                }),
                ..GlowParams::default()
            },
        )?;

        let planet_params = SphereParams {
            radius: 1.2,
            color: [0.35, 0.55, 0.9, 1.0],
            spin: Some(Spin {
                axis: [0.1, 1.0, 0.0],
                radians_per_second: 0.6,
            }),
            ..SphereParams::default()
        };
        let mut planet = ObjectController::new(system, SphereBuilder);
        planet.build(&mut host, planet_params.clone())?;

        let mut rings = ObjectController::new(system, RingBuilder);
        rings.build(
            &mut host,
            RingParams {
                inner_radius: 1.6,
                outer_radius: 2.6,
                ..RingParams::default()
            },
        )?;

        let mut moon = ObjectController::new(inspector, SphereBuilder);
        moon.build(
            &mut host,
            SphereParams {
                color: [0.8, 0.3, 0.3, 1.0],
                texture_policy: TexturePolicy::NeutralizeColor,
                ..SphereParams::default()
            },
        )?;

        Ok(Self {
            host,
            system,
            inspector,
            sun,
            planet,
            rings,
            moon,
            planet_params,
        })
    }

    /// Start loading the moon texture on a worker thread
    fn request_moon_texture(&mut self) -> Result<(), OrreryError> {
        let (pending, resolver) = promise::<TextureData>();
        self.moon.bind_texture(pending, "moon-surface")?;
        thread::spawn(move || {
            let mut rng = rand::thread_rng();
            let mut rgba = Vec::with_capacity(64 * 64 * 4);
            for _ in 0..64 * 64 {
                let shade: u8 = rng.gen_range(120..200);
                rgba.extend_from_slice(&[shade, shade, shade, 255]);
            }
            thread::sleep(Duration::from_millis(30));
            resolver.complete(TextureData::from_rgba(64, 64, rgba));
        });
        Ok(())
    }

    fn run(&mut self) -> Result<(), OrreryError> {
        let nominal = self.host.config().frame_interval();
        let mut rng = rand::thread_rng();
        let mut now = Duration::ZERO;
        let mut segments = self.planet_params.width_segments;

        for refresh in 0..REFRESHES {
            // Display refresh with a little vsync jitter
            now += nominal + Duration::from_micros(rng.gen_range(0..400));

            match refresh {
                HIDE_AT => {
                    log::info!("Page hidden at refresh {}", refresh);
                    self.host.set_page_visible(false);
                }
                SHOW_AT => {
                    log::info!("Page visible again at refresh {}", refresh);
                    self.host.set_page_visible(true);
                }
                RESIZE_AT => self.host.resize(self.inspector, 720, 720)?,
                RETUNE_AT => {
                    let effects = self.host.context_mut(self.system)?.effects_mut();
                    if let Some(bloom) = effects.pass_ids().first().copied() {
                        let applied = effects.set_parameter(bloom, "strength", 9.0)?;
                        log::info!("Bloom strength requested 9.0, applied {}", applied);
                    }
                }
                _ => {}
            }

            if refresh > 0 && refresh % REBUILD_EVERY == 0 {
                segments = if segments >= 64 { 16 } else { segments * 2 };
                self.planet_params.width_segments = segments;
                self.planet_params.height_segments = segments / 2;
                self.planet.rebuild(&mut self.host, self.planet_params.clone())?;
            }

            self.moon.poll(&mut self.host)?;
            self.planet.poll(&mut self.host)?;

            let report = self.host.frame(now);
            for (context, err) in &report.failures {
                log::warn!("Context {:?} reported: {}", context, err);
            }
        }
        Ok(())
    }

    fn shutdown(mut self) -> Result<DeviceStats, OrreryError> {
        self.rings.dispose(&mut self.host)?;
        self.planet.dispose(&mut self.host)?;
        self.sun.dispose(&mut self.host)?;

        // The moon is released by its context's teardown
        self.host.destroy_context(self.inspector)?;
        log::info!("Moon controller after teardown: {:?}", self.moon.state());
        self.host.destroy_context(self.system)?;

        Ok(self.host.device().stats())
    }
}

fn load_config() -> Result<ApplicationConfig, OrreryError> {
    let path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from("orrery_app/config/orrery.toml"), PathBuf::from);
    if path.exists() {
        return Ok(ApplicationConfig::load_from_file(&path)?);
    }
    Ok(ApplicationConfig {
        scenes: vec![
            SceneConfig::new("system").with_camera_position([0.0, 6.0, 18.0]),
            SceneConfig::new("inspector")
                .with_surface_size(480, 480)
                .with_scheduling_mode(SchedulingMode::OnDemand),
        ],
        ..ApplicationConfig::default()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config()?;
    logging::init(&config.engine.log_level);
    log::info!("Starting orrery demo with {} scenes", config.scenes.len());

    let mut app = OrreryApp::new(&config)?;
    app.request_moon_texture()?;
    app.run()?;

    let frames = app
        .host
        .device()
        .with_backend(|b: &HeadlessBackend| b.journal().len())
        .unwrap_or_default();
    let inspector_ticks = app.host.context(app.inspector)?.scheduler().frame_count();
    let system_ticks = app.host.context(app.system)?.scheduler().frame_count();
    let moon_texture = app.moon.texture_state();

    let stats = app.shutdown()?;
    println!("orrery: {REFRESHES} refreshes simulated");
    println!("  system ticks:      {system_ticks}");
    println!("  inspector ticks:   {inspector_ticks}");
    println!("  moon texture:      {moon_texture:?}");
    println!("  journal entries:   {frames}");
    println!("  frames submitted:  {}", stats.frames_submitted);
    println!("  resources created: {}", stats.created);
    println!("  resources freed:   {}", stats.released);
    println!("  still live:        {}", stats.live_resources() + stats.live_surfaces);
    println!("  double releases:   {}", stats.double_releases);
    Ok(())
}
