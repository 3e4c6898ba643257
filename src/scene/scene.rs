use std::sync::atomic::{AtomicU32, Ordering};

use log::trace;
use slotmap::SlotMap;

use crate::errors::{LumenError, Result};
use crate::frame::MAX_FRAMES;
use crate::frame::context::UpdateContext;
use crate::frame::cull::{CullContext, CullJob, CullTarget};
use crate::scene::bounds::BoundingBox;
use crate::scene::camera::Camera;
use crate::scene::light::LightBatch;
use crate::scene::renderable::Renderable;
use crate::scene::shadow::Shadow;
use crate::scene::{LightKey, RenderableKey};

static NEXT_SCENE_ID: AtomicU32 = AtomicU32::new(1);

/// Flat scene: renderables and lights in slot maps, no hierarchy.
///
/// World data is double-buffered per frame slot so the update of one frame
/// never disturbs the data another frame is rendering.
#[derive(Debug)]
pub struct Scene {
    pub id: u32,

    pub renderables: SlotMap<RenderableKey, Renderable>,
    pub lights: SlotMap<LightKey, LightBatch>,

    world_bounds: [BoundingBox; MAX_FRAMES],
}

impl Default for Scene {
    fn default() -> Self {
        Self::new()
    }
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: NEXT_SCENE_ID.fetch_add(1, Ordering::Relaxed),
            renderables: SlotMap::with_key(),
            lights: SlotMap::with_key(),
            world_bounds: [BoundingBox::empty(); MAX_FRAMES],
        }
    }

    // === Content ===

    pub fn add_renderable(&mut self, renderable: Renderable) -> RenderableKey {
        self.renderables.insert(renderable)
    }

    pub fn add_light(&mut self, light: LightBatch) -> LightKey {
        self.lights.insert(light)
    }

    #[inline]
    #[must_use]
    pub fn renderable(&self, key: RenderableKey) -> Option<&Renderable> {
        self.renderables.get(key)
    }

    #[inline]
    pub fn renderable_mut(&mut self, key: RenderableKey) -> Option<&mut Renderable> {
        self.renderables.get_mut(key)
    }

    #[inline]
    #[must_use]
    pub fn light(&self, key: LightKey) -> Option<&LightBatch> {
        self.lights.get(key)
    }

    #[inline]
    pub fn light_mut(&mut self, key: LightKey) -> Option<&mut LightBatch> {
        self.lights.get_mut(key)
    }

    #[must_use]
    pub fn renderable_keys(&self) -> Vec<RenderableKey> {
        self.renderables.keys().collect()
    }

    /// Gives `light` its shadow. The shadow must not belong to another
    /// light yet.
    pub fn attach_shadow(&mut self, light: LightKey, shadow: Shadow) -> Result<()> {
        let batch = self
            .lights
            .get_mut(light)
            .ok_or_else(|| LumenError::StaleKey(format!("{light:?}")))?;
        batch.attach_shadow(light, shadow)
    }

    /// Union of every renderable's world bound, as of the last initiating
    /// update of `slot`.
    #[must_use]
    pub fn world_bound(&self, slot: usize) -> &BoundingBox {
        &self.world_bounds[slot]
    }

    // === Frame hooks ===

    /// Refreshes the world data of `ctx.slot`. The initiating call also
    /// rebuilds the scene bound.
    pub fn update_geometric_state(&mut self, ctx: &UpdateContext, initiator: bool) {
        let slot = ctx.slot;
        for renderable in self.renderables.values_mut() {
            renderable.update(ctx);
        }
        for light in self.lights.values_mut() {
            light.update_world(slot);
        }

        if initiator {
            self.world_bounds[slot] = self
                .renderables
                .values()
                .fold(BoundingBox::empty(), |acc, r| acc.union(r.world_bound(slot)));
        }
        trace!(
            "Scene {} updated for slot {slot}: {} renderables, {} lights",
            self.id,
            self.renderables.len(),
            self.lights.len()
        );
    }

    /// Returns `true` if the renderable is visible from `camera` in `slot`.
    #[must_use]
    pub fn docull(&self, camera: &Camera, key: RenderableKey, slot: usize) -> bool {
        self.renderables
            .get(key)
            .is_some_and(|r| camera.contains(r.world_bound(slot)))
    }

    /// Queues the visible renderables among `keys` into `out`.
    ///
    /// The main target sorts renderables into their material's bucket and
    /// records the ones whose material is not prepared yet. A redirected
    /// target only collects shadow casters.
    pub fn queue(&self, job: &CullJob<'_>, keys: &[RenderableKey], out: &mut CullContext) {
        for &key in keys {
            if !self.docull(job.camera, key, job.slot) {
                continue;
            }
            let Some(renderable) = self.renderables.get(key) else {
                continue;
            };
            match job.target {
                CullTarget::Main => {
                    out.queues.push(renderable.material.queue, key);
                    if renderable.material.render_state().is_none() {
                        out.pending_materials.push(key);
                    }
                }
                CullTarget::Redirect(queue) => {
                    if renderable.material.casts_shadows {
                        out.queues.push(queue, key);
                    }
                }
            }
        }
    }

    /// Queues the lights that can reach the camera's view: global lights
    /// and bounded lights intersecting the frustum.
    pub fn queue_lights(&self, job: &CullJob<'_>, out: &mut CullContext) {
        for (key, light) in &self.lights {
            let visible = light
                .world_bound(job.slot)
                .is_none_or(|bound| job.camera.contains(bound));
            if visible {
                out.queues.push_light(key);
            }
        }
    }
}
