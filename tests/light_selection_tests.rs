//! Light Selection Tests
//!
//! Tests for:
//! - Top-K selection per renderable
//! - Light state sharing across renderables lit by the same lights
//! - Zero-priority exclusion (disabled and out-of-range lights)
//! - Unlit materials
//! - Selection as a game state inside the frame pipeline

use std::time::Duration;

use glam::{Affine3A, Vec3};

use lumen::frame::{AppContext, FrameScheduler, UpdateContext};
use lumen::lighting::{LOWPROFILE_LIGHTS, LightIdRegistry, LightSelectionState};
use lumen::renderer::{
    Command, HeadlessRenderer, LightStateCache, MaterialId, PassStage, QueueId, RenderPass,
    RenderQueueManager, StateKind,
};
use lumen::scene::{
    Attenuation, BoundingBox, Camera, Light, LightBatch, LightKey, MaterialState, Renderable,
    RenderableKey, Scene,
};
use lumen::settings::EngineSettings;

fn update(scene: &mut Scene, slot: usize) {
    let ctx = UpdateContext {
        delta: Duration::from_millis(16),
        elapsed: Duration::from_millis(16),
        frame_count: 1,
        slot,
    };
    scene.update_geometric_state(&ctx, true);
}

fn point_light(scene: &mut Scene, at: Vec3) -> LightKey {
    let light = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.1, 0.01));
    scene.add_light(LightBatch::new(light, Affine3A::from_translation(at)))
}

fn renderable(scene: &mut Scene, at: Vec3) -> RenderableKey {
    scene.add_renderable(
        Renderable::new(
            "box",
            BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::splat(0.5)),
            MaterialState::new(MaterialId(1), QueueId::OPAQUE),
        )
        .with_transform(Affine3A::from_translation(at)),
    )
}

struct Selection {
    queues: RenderQueueManager,
    states: LightStateCache,
    registry: LightIdRegistry,
}

impl Selection {
    fn new(renderables: &[RenderableKey], lights: &[LightKey]) -> Self {
        let mut queues = RenderQueueManager::new();
        for key in renderables {
            queues.push(QueueId::OPAQUE, *key);
        }
        for light in lights {
            queues.push_light(*light);
        }
        Self {
            queues,
            states: LightStateCache::new(),
            registry: LightIdRegistry::new(),
        }
    }

    fn run(&mut self, scene: &mut Scene) {
        LightSelectionState::select(scene, &self.queues, &mut self.states, &mut self.registry, 0);
    }
}

fn selected(scene: &Scene, key: RenderableKey) -> Vec<LightKey> {
    scene
        .renderable(key)
        .unwrap()
        .lights(0)
        .as_slice()
        .iter()
        .map(|s| s.light)
        .collect()
}

// ============================================================================
// Top-K
// ============================================================================

#[test]
fn keeps_the_strongest_lights_only() {
    let mut scene = Scene::new();
    let target = renderable(&mut scene, Vec3::ZERO);
    // Queue order deliberately unrelated to distance.
    let l5 = point_light(&mut scene, Vec3::new(6.0, 0.0, 0.0));
    let l2 = point_light(&mut scene, Vec3::new(3.0, 0.0, 0.0));
    let l4 = point_light(&mut scene, Vec3::new(5.0, 0.0, 0.0));
    let l1 = point_light(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    let l3 = point_light(&mut scene, Vec3::new(4.0, 0.0, 0.0));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[target], &[l5, l2, l4, l1, l3]);
    selection.run(&mut scene);

    let lights = selected(&scene, target);
    assert_eq!(lights.len(), LOWPROFILE_LIGHTS);
    assert_eq!(lights, vec![l1, l2]);

    let priorities: Vec<f32> = scene.renderable(target).unwrap().lights(0).as_slice().iter().map(|s| s.priority).collect();
    assert!(priorities[0] >= priorities[1]);
}

#[test]
fn selection_is_recomputed_every_run() {
    let mut scene = Scene::new();
    let target = renderable(&mut scene, Vec3::ZERO);
    let near = point_light(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    let far = point_light(&mut scene, Vec3::new(8.0, 0.0, 0.0));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[target], &[near, far]);
    selection.run(&mut scene);
    selection.run(&mut scene);
    assert_eq!(selected(&scene, target), vec![near, far]);
    assert_eq!(selection.states.len(), 1);
}

// ============================================================================
// Light State Sharing
// ============================================================================

#[test]
fn same_light_set_shares_one_state() {
    let mut scene = Scene::new();
    let left_light = point_light(&mut scene, Vec3::new(-3.0, 0.0, 0.0));
    let right_light = point_light(&mut scene, Vec3::new(3.0, 0.0, 0.0));
    // Each box ranks a different light first.
    let left = renderable(&mut scene, Vec3::new(-1.0, 0.0, 0.0));
    let right = renderable(&mut scene, Vec3::new(1.0, 0.0, 0.0));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[left, right], &[left_light, right_light]);
    selection.run(&mut scene);

    assert_eq!(selected(&scene, left), vec![left_light, right_light]);
    assert_eq!(selected(&scene, right), vec![right_light, left_light]);

    let a = scene.renderable(left).unwrap().light_state(0).unwrap();
    let b = scene.renderable(right).unwrap().light_state(0).unwrap();
    assert_eq!(a, b);
    assert_eq!(selection.states.len(), 1);

    let state = selection.states.get(a).unwrap();
    assert!(state.lights().windows(2).all(|w| w[0] < w[1]));
    assert!(state.ambient);
    assert!(!state.two_sided);
}

#[test]
fn different_light_sets_get_different_states() {
    let mut scene = Scene::new();
    let a_light = point_light(&mut scene, Vec3::new(-40.0, 0.0, 0.0));
    let b_light = point_light(&mut scene, Vec3::new(40.0, 0.0, 0.0));
    let shared = point_light(&mut scene, Vec3::new(0.0, 2.0, 0.0));
    let a = renderable(&mut scene, Vec3::new(-38.0, 0.0, 0.0));
    let b = renderable(&mut scene, Vec3::new(38.0, 0.0, 0.0));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[a, b], &[a_light, b_light, shared]);
    selection.run(&mut scene);

    let sa = scene.renderable(a).unwrap().light_state(0).unwrap();
    let sb = scene.renderable(b).unwrap().light_state(0).unwrap();
    assert_ne!(sa, sb);
    assert_eq!(selection.states.len(), 2);
    let shared_id = selection.registry.get(shared).unwrap();
    assert_eq!(selection.states.states_with(shared_id).len(), 2);
}

// ============================================================================
// Zero Priority Exclusion
// ============================================================================

#[test]
fn disabled_and_distant_lights_are_never_selected() {
    let mut scene = Scene::new();
    let target = renderable(&mut scene, Vec3::ZERO);
    let lit = point_light(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    let disabled = point_light(&mut scene, Vec3::new(2.0, 0.0, 0.0));
    scene.light_mut(disabled).unwrap().light.enabled = false;
    let distant = scene.add_light(LightBatch::new(
        Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 1.0, 1.0)),
        Affine3A::from_translation(Vec3::new(100.0, 0.0, 0.0)),
    ));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[target], &[disabled, distant, lit]);
    selection.run(&mut scene);

    assert_eq!(selected(&scene, target), vec![lit]);
    assert!(selection.registry.get(disabled).is_none());
}

#[test]
fn unlit_renderables_get_no_lights() {
    let mut scene = Scene::new();
    let unlit = scene.add_renderable(Renderable::new(
        "sky",
        BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE),
        MaterialState::new(MaterialId(9), QueueId::OPAQUE).unlit(),
    ));
    let light = point_light(&mut scene, Vec3::new(1.0, 0.0, 0.0));
    update(&mut scene, 0);

    let mut selection = Selection::new(&[unlit], &[light]);
    selection.run(&mut scene);

    assert!(selected(&scene, unlit).is_empty());
    assert!(scene.renderable(unlit).unwrap().light_state(0).is_none());
    assert!(selection.states.is_empty());
}

// ============================================================================
// Frame Integration
// ============================================================================

#[test]
fn selection_runs_inside_frames() {
    let mut scene = Scene::new();
    let a = renderable(&mut scene, Vec3::new(-1.0, 0.0, -10.0));
    let b = renderable(&mut scene, Vec3::new(1.0, 0.0, -10.0));
    point_light(&mut scene, Vec3::new(-3.0, 0.0, -10.0));
    point_light(&mut scene, Vec3::new(3.0, 0.0, -10.0));

    let renderer = HeadlessRenderer::new(32, 32);
    let log = renderer.log();
    let app = AppContext::new(EngineSettings::default(), Box::new(renderer), scene).unwrap();
    app.add_game_state(LightSelectionState::new());
    let mut scheduler = FrameScheduler::new(app).unwrap();

    for _ in 0..4 {
        scheduler.run_frame().unwrap();
    }

    let scene = scheduler.app().scene();
    let scene = scene.read();
    for slot in 0..2 {
        let sa = scene.renderable(a).unwrap().light_state(slot);
        assert!(sa.is_some());
        assert_eq!(sa, scene.renderable(b).unwrap().light_state(slot));
    }

    // One light state per frame slot, created once.
    let created = log.count(|c| matches!(c, Command::CreateState(StateKind::LightCombination, _)));
    assert_eq!(created, 2);
    assert!(log.draws().iter().all(|d| d.light_state.is_some()));
}

#[test]
fn overlapping_pass_camera_assigns_each_light_once() {
    let mut scene = Scene::new();
    let target = renderable(&mut scene, Vec3::new(0.0, 0.0, -10.0));
    let light = point_light(&mut scene, Vec3::new(2.0, 0.0, -10.0));

    let renderer = HeadlessRenderer::new(32, 32);
    let log = renderer.log();
    let app = AppContext::new(EngineSettings::default(), Box::new(renderer), scene).unwrap();
    app.add_game_state(LightSelectionState::new());
    let mut scheduler = FrameScheduler::new(app).unwrap();

    // A second forward-looking camera sees the same renderable.
    let pass = RenderPass::scene("Mirror", &[QueueId::OPAQUE], PassStage::Overlay)
        .with_camera(Camera::new_perspective(45.0, 1.0, 1.0, 100.0))
        .persistent();
    scheduler.frame_mut(0).unwrap().passes_mut().add(pass);
    scheduler.run_frame().unwrap();

    let frame = scheduler.frame_mut(0).unwrap();
    assert_eq!(frame.processed_cameras().len(), 2);
    assert_eq!(frame.queues().queue(QueueId::OPAQUE), &[target]);
    assert_eq!(frame.light_states().len(), 1);

    let scene = scheduler.app().scene();
    let scene = scene.read();
    assert_eq!(selected(&scene, target), vec![light]);
    assert_eq!(
        log.count(|c| matches!(c, Command::CreateState(StateKind::LightCombination, _))),
        1
    );
}
