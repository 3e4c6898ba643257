//! Runs a small lit scene through the frame pipeline on the headless
//! renderer and prints what was submitted.
//!
//! ```text
//! cargo run --example headless_frames            # single-threaded
//! cargo run --example headless_frames -- threads # one thread per frame slot
//! ```

use glam::{Affine3A, Vec3};
use log::info;

use lumen::frame::{AppContext, FrameScheduler};
use lumen::lighting::ShadowPlannerState;
use lumen::renderer::{Command, HeadlessRenderer, MaterialId, QueueId};
use lumen::scene::{
    Attenuation, BoundingBox, Light, LightBatch, MaterialState, Renderable, Scene, Shadow,
};
use lumen::settings::EngineSettings;

const FRAMES: usize = 8;

fn build_scene() -> anyhow::Result<Scene> {
    let mut scene = Scene::new();

    for i in 0..6 {
        let z = -6.0 - i as f32 * 8.0;
        let x = if i % 2 == 0 { -2.0 } else { 2.0 };
        scene.add_renderable(
            Renderable::new(
                format!("crate_{i}"),
                BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE),
                MaterialState::new(MaterialId(1 + i % 2), QueueId::OPAQUE),
            )
            .with_transform(Affine3A::from_translation(Vec3::new(x, 0.0, z)))
            .with_controller(|transform, ctx| {
                *transform = *transform * Affine3A::from_rotation_y(ctx.dt());
            }),
        );
    }
    scene.add_renderable(Renderable::new(
        "window",
        BoundingBox::from_center_half_extent(Vec3::new(0.0, 0.0, -12.0), Vec3::new(2.0, 2.0, 0.1)),
        MaterialState::new(MaterialId(10), QueueId::TWO_SIDED),
    ));

    let sun = scene.add_light(LightBatch::new(
        Light::new_directional(Vec3::new(1.0, 0.95, 0.9), 1.0).with_shadows(true),
        Affine3A::from_translation(Vec3::new(10.0, 40.0, 0.0)),
    ));
    scene.attach_shadow(sun, Shadow::perspective())?;

    scene.add_light(LightBatch::new(
        Light::new_point(Vec3::new(1.0, 0.5, 0.2), 2.0, Attenuation::new(1.0, 0.09, 0.032)),
        Affine3A::from_translation(Vec3::new(0.0, 3.0, -10.0)),
    ));

    Ok(scene)
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let threaded = std::env::args().any(|arg| arg == "threads");
    let settings = EngineSettings::from_json_str(if threaded {
        r#"{ "threading": "multi_threaded", "max_cull_threads": 2, "shadowmap_splits": 2 }"#
    } else {
        r#"{ "shadowmap_splits": 2 }"#
    })?;

    let renderer = HeadlessRenderer::new(settings.display.width, settings.display.height);
    let log = renderer.log();
    let app = AppContext::new(settings, Box::new(renderer), build_scene()?)?;
    app.add_game_state(ShadowPlannerState::new());

    let mut scheduler = FrameScheduler::new(app)?;
    if threaded {
        scheduler.spawn()?;
        scheduler.run_frames(FRAMES)?;
    } else {
        for _ in 0..FRAMES {
            scheduler.run_frame()?;
        }
    }
    scheduler.shutdown()?;

    info!(
        "{FRAMES} frames: {} draws, {} render target switches, {} shadow maps released",
        log.draws().len(),
        log.count(|c| matches!(c, Command::SetRenderTarget(_))),
        log.count(|c| matches!(c, Command::ReleaseTexture(_)))
    );
    Ok(())
}
