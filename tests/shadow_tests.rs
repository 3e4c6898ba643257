//! Shadow Tests
//!
//! Tests for:
//! - Split distance computation and endpoint pinning
//! - Shadow single-parent rule
//! - Cascade growth and texel dimensions
//! - Shadow planning: depth/light passes, dependencies, pass pooling
//! - Cleanup of pooled shadow resources

use std::sync::Arc;
use std::time::Duration;

use glam::{Affine3A, Vec3};
use parking_lot::Mutex;

use lumen::errors::{LumenError, Result};
use lumen::frame::{
    AppContext, CullContext, CullJob, CullTarget, Frame, FrameScheduler, GameState, UpdateContext,
};
use lumen::lighting::shadow_utils::{DEFAULT_SPLIT_LAMBDA, calculate_split_distances};
use lumen::lighting::{PlannerStats, ShadowPlannerState};
use lumen::renderer::{
    Command, CommandLog, HeadlessRenderer, MaterialId, PassStage, QueueId, RenderPass,
    RenderQueueManager, RenderTarget, Renderer,
};
use lumen::scene::{
    Attenuation, BoundingBox, Camera, Light, LightBatch, LightKey, MaterialState, Renderable,
    Scene, Shadow,
};
use lumen::settings::EngineSettings;

const EPSILON: f32 = 1e-4;

fn approx(a: f32, b: f32) -> bool {
    (a - b).abs() < EPSILON
}

// ============================================================================
// Split Distances
// ============================================================================

#[test]
fn split_endpoints_are_pinned() {
    let d = calculate_split_distances(4, 1.0, 5000.0, DEFAULT_SPLIT_LAMBDA);
    assert_eq!(d.len(), 5);
    assert_eq!(d[0], 1.0);
    assert_eq!(d[4], 5000.0);
    assert!(d.windows(2).all(|w| w[0] < w[1]));
}

#[test]
fn single_split_covers_the_whole_range() {
    let d = calculate_split_distances(1, 0.5, 300.0, DEFAULT_SPLIT_LAMBDA);
    assert_eq!(d, vec![0.5, 300.0]);
}

#[test]
fn lambda_moves_between_uniform_and_logarithmic() {
    let uniform = calculate_split_distances(2, 1.0, 100.0, 0.0);
    let log = calculate_split_distances(2, 1.0, 100.0, 1.0);
    assert!(approx(uniform[1], 50.5));
    assert!(approx(log[1], 10.0));

    let blended = calculate_split_distances(2, 1.0, 100.0, DEFAULT_SPLIT_LAMBDA);
    assert!(approx(blended[1], 0.6 * 10.0 + 0.4 * 50.5));
}

// ============================================================================
// Shadow Ownership & Cascades
// ============================================================================

#[test]
fn shadow_has_a_single_parent() {
    let mut scene = Scene::new();
    let a = scene.add_light(LightBatch::new(Light::new_directional(Vec3::ONE, 1.0), Affine3A::IDENTITY));
    let b = scene.add_light(LightBatch::new(Light::new_directional(Vec3::ONE, 1.0), Affine3A::IDENTITY));

    let mut shadow = Shadow::perspective();
    shadow.set_parent(a).unwrap();
    assert!(matches!(
        shadow.set_parent(b),
        Err(LumenError::ShadowAlreadyParented { existing }) if existing == a
    ));
    assert_eq!(shadow.parent(), Some(a));

    assert!(scene.attach_shadow(b, shadow).is_err());
    assert!(scene.light(b).unwrap().shadow().is_none());

    scene.attach_shadow(a, Shadow::perspective()).unwrap();
    assert_eq!(scene.light(a).unwrap().shadow().unwrap().parent(), Some(a));
}

#[test]
fn cascade_dimensions_halve_per_split() {
    let mut shadow = Shadow::perspective();
    shadow.ensure_perspective_splits(3, 1024);
    let dims: Vec<u32> = (0..3).map(|i| shadow.part(i).unwrap().dimension).collect();
    assert_eq!(dims, vec![1024, 512, 256]);

    let texture = shadow.part(0).unwrap().texture;
    shadow.ensure_perspective_splits(2, 1024);
    assert_eq!(shadow.split_count(), 3);
    assert_eq!(shadow.part(0).unwrap().texture, texture);
}

#[test]
fn depth_culls_collect_shadow_casters_only() {
    let mut scene = Scene::new();
    let caster = scene.add_renderable(Renderable::new(
        "caster",
        BoundingBox::from_center_half_extent(Vec3::new(-1.0, 0.0, -10.0), Vec3::ONE),
        MaterialState::new(MaterialId(1), QueueId::OPAQUE),
    ));
    let ghost = scene.add_renderable(Renderable::new(
        "ghost",
        BoundingBox::from_center_half_extent(Vec3::new(1.0, 0.0, -10.0), Vec3::ONE),
        MaterialState::new(MaterialId(2), QueueId::OPAQUE).without_shadows(),
    ));
    let ctx = UpdateContext {
        delta: Duration::from_millis(16),
        elapsed: Duration::from_millis(16),
        frame_count: 1,
        slot: 0,
    };
    scene.update_geometric_state(&ctx, true);

    let camera = Camera::new_perspective(45.0, 1.0, 1.0, 100.0);
    let keys = scene.renderable_keys();
    let depth_queue = RenderQueueManager::new().create_queue();

    let mut out = CullContext::new(1);
    let job = CullJob {
        camera: &camera,
        target: CullTarget::Redirect(depth_queue),
        slot: 0,
    };
    scene.queue(&job, &keys, &mut out);
    assert_eq!(out.queues.queue(depth_queue), &[caster]);

    let mut main = CullContext::new(2);
    let job = CullJob {
        camera: &camera,
        target: CullTarget::Main,
        slot: 0,
    };
    scene.queue(&job, &keys, &mut main);
    assert_eq!(main.queues.queue(QueueId::OPAQUE).len(), 2);
    assert!(main.queues.queue(QueueId::OPAQUE).contains(&ghost));
}

// ============================================================================
// Shadow Planning
// ============================================================================

/// Forwards to a planner the test can still inspect.
struct SharedPlanner(Arc<Mutex<ShadowPlannerState>>);

impl GameState for SharedPlanner {
    fn pre_frame(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        self.0.lock().pre_frame(frame, scene)
    }

    fn post_cull(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        self.0.lock().post_cull(frame, scene)
    }

    fn post_render(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        self.0.lock().post_render(frame, scene)
    }

    fn cleanup(&mut self, renderer: &mut dyn Renderer) {
        self.0.lock().cleanup(renderer);
    }
}

struct Rig {
    scheduler: FrameScheduler,
    planner: Arc<Mutex<ShadowPlannerState>>,
    log: CommandLog,
    sun: LightKey,
    lamp: LightKey,
}

impl Rig {
    fn stats(&self) -> PlannerStats {
        self.planner.lock().stats()
    }
}

/// Runs `scene` with a planner using two 512-texel splits.
fn start(scene: Scene) -> (FrameScheduler, Arc<Mutex<ShadowPlannerState>>, CommandLog) {
    let settings = EngineSettings {
        shadowmap_splits: 2,
        shadowmap_dimension: 512,
        ..Default::default()
    };
    let renderer = HeadlessRenderer::new(32, 32);
    let log = renderer.log();
    let app = AppContext::new(settings, Box::new(renderer), scene).unwrap();
    let planner = Arc::new(Mutex::new(ShadowPlannerState::new()));
    app.add_game_state(SharedPlanner(Arc::clone(&planner)));
    (FrameScheduler::new(app).unwrap(), planner, log)
}

fn add_box(scene: &mut Scene, at: Vec3) {
    scene.add_renderable(
        Renderable::new(
            "box",
            BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE),
            MaterialState::new(MaterialId(1), QueueId::OPAQUE),
        )
        .with_transform(Affine3A::from_translation(at)),
    );
}

fn lamp_light() -> Light {
    Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.1, 0.01))
}

/// Two boxes close to the camera, a shadowing sun and a plain point lamp.
fn rig() -> Rig {
    let mut scene = Scene::new();
    for x in [-2.0, 2.0] {
        add_box(&mut scene, Vec3::new(x, 0.0, -15.0));
    }
    let sun = scene.add_light(LightBatch::new(
        Light::new_directional(Vec3::ONE, 1.0).with_shadows(true),
        Affine3A::from_translation(Vec3::new(0.0, 30.0, 0.0)),
    ));
    scene.attach_shadow(sun, Shadow::perspective()).unwrap();
    let lamp = scene.add_light(LightBatch::new(
        lamp_light(),
        Affine3A::from_translation(Vec3::new(0.0, 3.0, -15.0)),
    ));

    let (scheduler, planner, log) = start(scene);
    Rig {
        scheduler,
        planner,
        log,
        sun,
        lamp,
    }
}

#[test]
fn plans_depth_and_light_passes() {
    let mut rig = rig();
    rig.scheduler.run_frame().unwrap();

    // Both boxes sit in the first split only.
    let stats = rig.stats();
    assert_eq!(stats.depth_passes_allocated, 1);
    assert_eq!(stats.light_passes_allocated, 2);

    let draws = rig.log.draws();
    let sun_draws: Vec<_> = draws.iter().filter(|d| d.light == Some(rig.sun)).collect();
    assert_eq!(sun_draws.len(), 2);
    assert!(sun_draws.iter().all(|d| d.shadow.is_some() && d.light_state.is_none()));

    let lamp_draws: Vec<_> = draws.iter().filter(|d| d.light == Some(rig.lamp)).collect();
    assert_eq!(lamp_draws.len(), 2);
    assert!(lamp_draws.iter().all(|d| d.shadow.is_none()));

    let scene = rig.scheduler.app().scene();
    let scene = scene.read();
    let shadow = scene.light(rig.sun).unwrap().shadow().unwrap();
    assert_eq!(shadow.split_count(), 1);
    assert_eq!(shadow.part(0).unwrap().dimension, 512);
}

#[test]
fn depth_pass_renders_before_its_light_pass() {
    let mut rig = rig();
    rig.scheduler.run_frame().unwrap();

    let commands = rig.log.commands();
    let depth_target = commands
        .iter()
        .position(|c| matches!(c, Command::SetRenderTarget(RenderTarget::Framebuffer { dimension: 512, .. })))
        .unwrap();
    let first_sun_draw = commands
        .iter()
        .position(|c| matches!(c, Command::Draw(d) if d.light == Some(rig.sun)))
        .unwrap();
    assert!(depth_target < first_sun_draw);
}

#[test]
fn passes_return_to_the_pools() {
    let mut rig = rig();
    rig.scheduler.run_frame().unwrap();

    let after_first = rig.stats();
    assert_eq!(after_first.free_depth_passes, 1);
    assert_eq!(after_first.free_light_passes, 2);
    assert_eq!(after_first.current_lights, 0);
    assert_eq!(after_first.current_shadowing_lights, 0);
    assert_eq!(after_first.free_lists, after_first.lists_allocated);

    for _ in 0..3 {
        rig.scheduler.run_frame().unwrap();
    }
    let after_four = rig.stats();
    assert_eq!(after_four.depth_passes_allocated, 1);
    assert_eq!(after_four.light_passes_allocated, 2);
    assert_eq!(after_four.free_depth_passes, 1);
    assert_eq!(after_four.free_light_passes, 2);
    assert_eq!(after_four.lists_allocated, after_first.lists_allocated);

    let sun_draws = rig.log.draws().iter().filter(|d| d.light == Some(rig.sun)).count();
    assert_eq!(sun_draws, 8);
}

#[test]
fn disabled_shadow_light_is_lit_without_shadows() {
    let mut rig = rig();
    {
        let scene = rig.scheduler.app().scene();
        let mut scene = scene.write();
        scene.light_mut(rig.sun).unwrap().light.cast_shadows = false;
    }
    rig.scheduler.run_frame().unwrap();

    let stats = rig.stats();
    assert_eq!(stats.depth_passes_allocated, 0);
    assert_eq!(stats.light_passes_allocated, 2);
    assert!(rig.log.draws().iter().all(|d| d.shadow.is_none()));
}

#[test]
fn cleanup_releases_pooled_shadow_maps() {
    let mut rig = rig();
    rig.scheduler.run_frame().unwrap();
    rig.scheduler.shutdown().unwrap();

    assert_eq!(rig.log.count(|c| matches!(c, Command::ReleaseTexture(_))), 1);
    assert_eq!(rig.log.count(|c| matches!(c, Command::ReleaseFramebuffer(_))), 1);
    assert_eq!(rig.stats().free_depth_passes, 0);
}

#[test]
fn point_shadow_caster_is_lit_without_shadows() {
    let mut scene = Scene::new();
    add_box(&mut scene, Vec3::new(0.0, 0.0, -15.0));
    let lamp = scene.add_light(LightBatch::new(
        lamp_light().with_shadows(true),
        Affine3A::from_translation(Vec3::new(0.0, 3.0, -15.0)),
    ));
    scene.attach_shadow(lamp, Shadow::perspective()).unwrap();

    let (mut scheduler, planner, log) = start(scene);
    scheduler.run_frame().unwrap();

    let lamp_draws: Vec<_> = log.draws().into_iter().filter(|d| d.light == Some(lamp)).collect();
    assert_eq!(lamp_draws.len(), 1);
    assert!(lamp_draws.iter().all(|d| d.shadow.is_none()));

    let stats = planner.lock().stats();
    assert_eq!(stats.depth_passes_allocated, 0);
    assert_eq!(stats.light_passes_allocated, 1);

    let scene = scheduler.app().scene();
    let scene = scene.read();
    assert_eq!(scene.light(lamp).unwrap().shadow().unwrap().split_count(), 0);
}

#[test]
fn overlapping_pass_camera_does_not_repeat_light_draws() {
    let mut rig = rig();
    let pass = RenderPass::scene("Mirror", &[QueueId::OPAQUE], PassStage::Overlay)
        .with_camera(Camera::new_perspective(45.0, 1.0, 1.0, 100.0))
        .persistent();
    rig.scheduler.frame_mut(0).unwrap().passes_mut().add(pass);
    rig.scheduler.run_frame().unwrap();

    let draws = rig.log.draws();
    let mut lamp_targets: Vec<_> = draws
        .iter()
        .filter(|d| d.light == Some(rig.lamp))
        .map(|d| d.renderable)
        .collect();
    assert_eq!(lamp_targets.len(), 2);
    lamp_targets.dedup();
    assert_eq!(lamp_targets.len(), 2);

    let sun_draws = draws.iter().filter(|d| d.light == Some(rig.sun)).count();
    assert_eq!(sun_draws, 2);
}
