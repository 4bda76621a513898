//! Controller lifecycle and resource accounting scenarios

use std::time::Duration;

use crate::assets::{promise, SharedResourcePool, TextureData};
use crate::core::config::SceneConfig;
use crate::error::SceneError;
use crate::foundation::logging;
use crate::procedural::{GlowParams, GlowSpriteBuilder, RingBuilder, RingParams, SphereBuilder, SphereParams};
use crate::render::{BloomPass, DeviceEvent, HeadlessBackend, RenderDevice, ResourceDesc};
use crate::scene::{BuildStatus, LifecycleState, ObjectController, SceneHost, TextureState};

fn journal(device: &RenderDevice) -> Vec<DeviceEvent> {
    device
        .with_backend(|b: &HeadlessBackend| b.journal().to_vec())
        .unwrap_or_default()
}

#[test]
fn test_rebuild_releases_superseded_before_creating() {
    logging::init_for_tests();
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("glow")).unwrap();
    let mut glow = ObjectController::new(ctx, GlowSpriteBuilder);
    glow.build(&mut host, GlowParams::default()).unwrap();
    assert_eq!(glow.live_resources(), 2);

    let mark = journal(host.device()).len();
    let params = GlowParams {
        resolution: 128,
        ..GlowParams::default()
    };
    glow.rebuild(&mut host, params).unwrap();

    let events: Vec<DeviceEvent> = journal(host.device()).split_off(mark);
    let resource_events: Vec<&DeviceEvent> = events
        .iter()
        .filter(|e| matches!(e, DeviceEvent::Created { .. } | DeviceEvent::Released { .. }))
        .collect();
    assert_eq!(resource_events.len(), 4);
    assert!(matches!(resource_events[0], DeviceEvent::Released { .. }));
    assert!(matches!(resource_events[1], DeviceEvent::Released { .. }));
    assert!(matches!(resource_events[2], DeviceEvent::Created { .. }));
    assert!(matches!(resource_events[3], DeviceEvent::Created { .. }));
    assert_eq!(glow.live_resources(), 2);
}

#[test]
fn test_repeated_rebuilds_stay_leak_free() {
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("rings")).unwrap();
    let mut ring = ObjectController::new(ctx, RingBuilder);

    for step in 0..25u32 {
        let params = RingParams {
            segments: 16 + step,
            ..RingParams::default()
        };
        ring.build(&mut host, params).unwrap();
        assert_eq!(ring.live_resources(), 2);
        assert_eq!(host.device().stats().live_resources(), 2);
        assert_eq!(host.context(ctx).unwrap().registry().len(), 1);
    }
    assert_eq!(host.device().stats().double_releases, 0);
}

#[test]
fn test_degraded_rebuild_recovers() {
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("s")).unwrap();
    let mut sphere = ObjectController::new(ctx, SphereBuilder);
    sphere.build(&mut host, SphereParams::default()).unwrap();

    let bad = SphereParams {
        width_segments: 1,
        ..SphereParams::default()
    };
    assert_eq!(sphere.rebuild(&mut host, bad).unwrap(), BuildStatus::Degraded);
    assert_eq!(sphere.live_resources(), 0);
    assert_eq!(host.device().stats().live_resources(), 0);

    assert_eq!(
        sphere.rebuild(&mut host, SphereParams::default()).unwrap(),
        BuildStatus::Attached
    );
    assert!(!sphere.is_degraded());
    assert_eq!(sphere.live_resources(), 2);
}

#[test]
fn test_allocation_failure_leaves_nothing_live() {
    let device = RenderDevice::new(Box::new(HeadlessBackend::new().with_memory_budget(4096)));
    let mut host = SceneHost::new(Default::default(), device).unwrap();
    let ctx = host.create_context(&SceneConfig::new("tight")).unwrap();
    let mut glow = ObjectController::new(ctx, GlowSpriteBuilder);

    let result = glow.build(&mut host, GlowParams::default());
    assert!(matches!(result, Err(SceneError::Backend(_))));
    assert!(glow.is_degraded());
    assert_eq!(glow.state(), LifecycleState::Built);
    assert_eq!(host.device().stats().live_resources(), 0);
    assert!(glow.root().is_some());
}

#[test]
fn test_context_teardown_disposes_controllers() {
    logging::init_for_tests();
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("teardown")).unwrap();
    host.context_mut(ctx)
        .unwrap()
        .effects_mut()
        .add_pass(Box::new(BloomPass::new()), None)
        .unwrap();
    let mut sphere = ObjectController::new(ctx, SphereBuilder);
    let mut glow = ObjectController::new(ctx, GlowSpriteBuilder);
    sphere.build(&mut host, SphereParams::default()).unwrap();
    glow.build(&mut host, GlowParams::default()).unwrap();

    host.destroy_context(ctx).unwrap();
    assert_eq!(sphere.state(), LifecycleState::Disposed);
    assert_eq!(glow.state(), LifecycleState::Disposed);
    assert_eq!(sphere.live_resources(), 0);

    let stats = host.device().stats();
    assert_eq!(stats.live_resources(), 0);
    assert_eq!(stats.live_surfaces, 0);
    assert_eq!(stats.double_releases, 0);
    assert!(matches!(sphere.dispose(&mut host), Err(SceneError::ControllerDisposed)));
}

#[test]
fn test_dropped_controller_is_reaped() {
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("reap")).unwrap();
    {
        let mut sphere = ObjectController::new(ctx, SphereBuilder);
        sphere.build(&mut host, SphereParams::default()).unwrap();
        assert_eq!(host.context(ctx).unwrap().registry().len(), 1);
    }
    assert_eq!(host.device().stats().live_resources(), 0);

    host.frame(Duration::ZERO);
    let context = host.context(ctx).unwrap();
    assert!(context.registry().is_empty());
    assert_eq!(context.controller_count(), 0);
}

#[test]
fn test_shared_texture_across_contexts() {
    let mut host = SceneHost::headless();
    let a = host.create_context(&SceneConfig::new("a")).unwrap();
    let b = host.create_context(&SceneConfig::new("b")).unwrap();
    let mut earth_a = ObjectController::new(a, SphereBuilder);
    let mut earth_b = ObjectController::new(b, SphereBuilder);
    earth_a.build(&mut host, SphereParams::default()).unwrap();
    earth_b.build(&mut host, SphereParams::default()).unwrap();

    let texture = TextureData::solid(4, 4, [0, 128, 255, 255]);
    earth_a
        .bind_texture(crate::assets::AssetPromise::ready(texture.clone()), "earth")
        .unwrap();
    earth_b
        .bind_texture(crate::assets::AssetPromise::ready(texture), "earth")
        .unwrap();
    earth_a.poll(&mut host).unwrap();
    earth_b.poll(&mut host).unwrap();

    assert_eq!(earth_a.texture_state(), TextureState::Bound);
    assert_eq!(host.device().stats().live_textures, 1);
    assert!(host.shared_pool().contains("earth"));

    earth_a.dispose(&mut host).unwrap();
    assert_eq!(host.device().stats().live_textures, 1);
    earth_b.dispose(&mut host).unwrap();
    assert_eq!(host.device().stats().live_textures, 0);
}

#[test]
fn test_texture_loaded_on_worker_thread() {
    let mut host = SceneHost::headless();
    let ctx = host.create_context(&SceneConfig::new("async")).unwrap();
    let mut sphere = ObjectController::new(ctx, SphereBuilder);
    sphere.build(&mut host, SphereParams::default()).unwrap();

    let (pending, resolver) = promise::<TextureData>();
    sphere.bind_texture(pending, "moon").unwrap();
    let worker = std::thread::spawn(move || {
        resolver.complete(TextureData::from_rgba(2, 1, vec![200; 8]));
    });
    worker.join().unwrap();

    sphere.poll(&mut host).unwrap();
    assert_eq!(sphere.texture_state(), TextureState::Bound);
}

#[test]
fn test_handle_dispose_is_idempotent() {
    let device = RenderDevice::headless();
    let mut pool = SharedResourcePool::new();
    let handle = pool
        .get_or_allocate("once", &device, || ResourceDesc::texture("once", 1, 1, vec![0; 4]))
        .unwrap();
    for _ in 0..5 {
        handle.dispose();
    }
    drop(handle);

    let stats = device.stats();
    assert_eq!(stats.released, 1);
    assert_eq!(stats.double_releases, 0);
}
