use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use glam::{Affine3A, Vec3};

use lumen::frame::UpdateContext;
use lumen::lighting::shadow_utils::{DEFAULT_SPLIT_LAMBDA, calculate_split_distances};
use lumen::lighting::{LightIdRegistry, LightSelectionState};
use lumen::renderer::{LightStateCache, MaterialId, QueueId, RenderQueueManager};
use lumen::scene::{Attenuation, BoundingBox, Light, LightBatch, MaterialState, Renderable, Scene};

/// A grid of boxes with a light hovering over every fourth one.
fn grid(side: usize) -> (Scene, RenderQueueManager) {
    let mut scene = Scene::new();
    let mut queues = RenderQueueManager::new();
    for x in 0..side {
        for z in 0..side {
            let at = Vec3::new(x as f32 * 3.0, 0.0, z as f32 * -3.0);
            let key = scene.add_renderable(
                Renderable::new(
                    "box",
                    BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE),
                    MaterialState::new(MaterialId(1), QueueId::OPAQUE),
                )
                .with_transform(Affine3A::from_translation(at)),
            );
            queues.push(QueueId::OPAQUE, key);

            if (x + z) % 4 == 0 {
                let light = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.05, 0.01));
                let key = scene.add_light(LightBatch::new(
                    light,
                    Affine3A::from_translation(at + Vec3::Y * 2.0),
                ));
                queues.push_light(key);
            }
        }
    }

    let ctx = UpdateContext {
        delta: Duration::from_millis(16),
        elapsed: Duration::from_millis(16),
        frame_count: 1,
        slot: 0,
    };
    scene.update_geometric_state(&ctx, true);
    (scene, queues)
}

fn bench_selection(c: &mut Criterion) {
    let mut group = c.benchmark_group("Light Selection");

    for side in [8, 32] {
        let (mut scene, queues) = grid(side);
        let mut states = LightStateCache::new();
        let mut registry = LightIdRegistry::new();

        group.bench_function(format!("select {} renderables", side * side), |b| {
            b.iter(|| {
                let stats = LightSelectionState::select(
                    &mut scene,
                    &queues,
                    &mut states,
                    &mut registry,
                    0,
                );
                black_box(stats);
            });
        });
    }

    group.finish();
}

fn bench_splits(c: &mut Criterion) {
    c.bench_function("split distances (4)", |b| {
        b.iter(|| {
            black_box(calculate_split_distances(
                black_box(4),
                1.0,
                5000.0,
                DEFAULT_SPLIT_LAMBDA,
            ))
        });
    });
}

criterion_group!(benches, bench_selection, bench_splits);
criterion_main!(benches);
