//! Shadow Planning
//!
//! After the last camera of a frame is culled, [`ShadowPlannerState`] turns
//! the visible lights into passes:
//!
//! ```text
//! light queue ──► classify ──► shadowing lights ──► per split:
//!                     │                              depth pass ◄── shadow camera cull
//!                     │                                  ▲
//!                     │                              light pass (split camera)
//!                     └──► other lights ──► one light pass each (main camera)
//! ```
//!
//! # Pools
//!
//! Depth passes, light passes and the per-light renderable lists are pooled.
//! Passes move into the frame's pass manager when registered and come back
//! in `post_render`:
//!
//! ```text
//! free ──► frame.passes ──► (rendered) ──► free
//! ```
//!
//! A depth pass is reused only for a slice of the same texel dimension.
//! Every pooled depth pass keeps its framebuffer until `cleanup`.

use log::{debug, trace, warn};

use crate::errors::Result;
use crate::frame::{Frame, GameState, MAX_FRAMES};
use crate::lighting::shadow_utils::{
    calculate_split_distances, check_shadow_camera_support, frustum_corners, place_shadow_camera,
    split_camera,
};
use crate::lighting::sorter::LightSorter;
use crate::renderer::{
    DepthTexturePass, FramebufferId, LightPass, PassId, PassKind, QueueId, RenderPass,
    RenderQueueManager, Renderer, TextureId,
};
use crate::scene::camera::Camera;
use crate::scene::{LightKey, RenderableKey, Scene};

/// Renderables one light affects, split by how they are drawn.
#[derive(Debug, Default)]
pub struct ListPair {
    pub opaque: Vec<RenderableKey>,
    /// Alpha-tested and two-sided geometry.
    pub transparent: Vec<RenderableKey>,
}

impl ListPair {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.opaque.is_empty() && self.transparent.is_empty()
    }

    pub fn clear(&mut self) {
        self.opaque.clear();
        self.transparent.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.opaque.len() + self.transparent.len()
    }

    fn iter(&self) -> impl Iterator<Item = &RenderableKey> {
        self.opaque.iter().chain(&self.transparent)
    }
}

/// Pool and plan counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerStats {
    pub depth_passes_allocated: usize,
    pub light_passes_allocated: usize,
    pub lists_allocated: usize,
    pub free_depth_passes: usize,
    pub free_light_passes: usize,
    pub free_lists: usize,
    pub current_lights: usize,
    pub current_shadowing_lights: usize,
}

/// What the planner issued for one frame slot.
#[derive(Debug, Default)]
struct SlotPlan {
    /// Lights without shadows, in light queue order.
    current_lights: Vec<(LightKey, ListPair)>,
    /// Shadow casting lights, in light queue order.
    current_shadowing_lights: Vec<(LightKey, ListPair)>,
    issued: Vec<PassId>,
    processed: bool,
}

#[derive(Debug, Default)]
pub struct ShadowPlannerState {
    free_depth_passes: Vec<RenderPass>,
    free_light_passes: Vec<RenderPass>,
    free_lists: Vec<ListPair>,
    depth_passes_allocated: usize,
    light_passes_allocated: usize,
    lists_allocated: usize,
    plans: [SlotPlan; MAX_FRAMES],
}

impl ShadowPlannerState {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn stats(&self) -> PlannerStats {
        PlannerStats {
            depth_passes_allocated: self.depth_passes_allocated,
            light_passes_allocated: self.light_passes_allocated,
            lists_allocated: self.lists_allocated,
            free_depth_passes: self.free_depth_passes.len(),
            free_light_passes: self.free_light_passes.len(),
            free_lists: self.free_lists.len(),
            current_lights: self.plans.iter().map(|p| p.current_lights.len()).sum(),
            current_shadowing_lights: self
                .plans
                .iter()
                .map(|p| p.current_shadowing_lights.len())
                .sum(),
        }
    }

    fn acquire_list(&mut self) -> ListPair {
        self.free_lists.pop().unwrap_or_else(|| {
            self.lists_allocated += 1;
            ListPair::default()
        })
    }

    fn release_list(&mut self, mut list: ListPair) {
        list.clear();
        self.free_lists.push(list);
    }

    // === Classification ===

    /// Sorts the enabled queued lights into shadowing and plain lights,
    /// each with the lit renderables it affects.
    fn classify(&mut self, scene: &Scene, queues: &RenderQueueManager, slot: usize) {
        for &light_key in queues.lights() {
            let Some(batch) = scene.light(light_key) else {
                continue;
            };
            if !batch.light.enabled {
                continue;
            }

            let mut lists = self.acquire_list();
            for queue in QueueId::GEOMETRY {
                for &key in queues.queue(queue) {
                    let Some(renderable) = scene.renderable(key) else {
                        continue;
                    };
                    if !renderable.material.is_lit()
                        || LightSorter::value_for(batch, slot, renderable.world_bound(slot)) <= 0.0
                    {
                        continue;
                    }
                    if queue == QueueId::OPAQUE {
                        lists.opaque.push(key);
                    } else {
                        lists.transparent.push(key);
                    }
                }
            }

            if lists.is_empty() {
                self.release_list(lists);
            } else if batch.is_shadow_caster() {
                self.plans[slot].current_shadowing_lights.push((light_key, lists));
            } else {
                self.plans[slot].current_lights.push((light_key, lists));
            }
        }
    }

    // === Pass pools ===

    fn acquire_depth_pass(
        &mut self,
        light: LightKey,
        split: usize,
        dimension: u32,
        texture: TextureId,
        camera: Camera,
    ) -> RenderPass {
        let reusable = self
            .free_depth_passes
            .iter()
            .position(|p| p.depth_pass().is_some_and(|d| d.dimension == dimension));
        match reusable {
            Some(index) => {
                let mut pass = self.free_depth_passes.swap_remove(index);
                pass.rebind_depth(light, split, texture, camera);
                pass
            }
            None => {
                self.depth_passes_allocated += 1;
                debug!("Allocating depth pass #{} ({dimension} texels)", self.depth_passes_allocated);
                let depth = DepthTexturePass {
                    light,
                    split,
                    dimension,
                    framebuffer: FramebufferId::allocate(),
                    texture,
                };
                RenderPass::depth_texture(depth, camera)
            }
        }
    }

    fn acquire_light_pass(&mut self, light: LightPass, camera: Option<Camera>) -> RenderPass {
        match self.free_light_passes.pop() {
            Some(mut pass) => {
                pass.rebind_light(light, camera);
                pass
            }
            None => {
                self.light_passes_allocated += 1;
                debug!("Allocating light pass #{}", self.light_passes_allocated);
                RenderPass::light(light, camera)
            }
        }
    }

    fn register(&mut self, frame: &mut Frame, pass: RenderPass) -> PassId {
        let id = frame.passes_mut().add(pass);
        self.plans[frame.id()].issued.push(id);
        id
    }

    /// Registers a light pass drawing `keys` (opaque first) from `camera`.
    fn add_light_pass<'a>(
        &mut self,
        frame: &mut Frame,
        light: LightPass,
        camera: Option<Camera>,
        keys: impl Iterator<Item = &'a RenderableKey>,
    ) -> PassId {
        let mut pass = self.acquire_light_pass(light, camera);
        let queue = frame.queues_mut().create_queue();
        for &key in keys {
            frame.queues_mut().push(queue, key);
        }
        pass.queues.push(queue);
        self.register(frame, pass)
    }

    // === Planning ===

    /// Builds the depth and light passes for this frame's lights.
    pub fn plan(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        let slot = frame.id();
        self.classify(scene, frame.queues(), slot);

        let settings = frame.app().settings();
        let splits = settings.shadowmap_splits as usize;
        let base_dimension = settings.shadowmap_dimension;
        let lambda = settings.shadow_split_lambda;

        let main = frame.camera().clone();
        let distances = calculate_split_distances(splits, main.near(), main.far(), lambda);

        let shadowing = std::mem::take(&mut self.plans[slot].current_shadowing_lights);
        let planned = self.plan_splits(frame, scene, &main, &distances, base_dimension, &shadowing);
        self.plans[slot].current_shadowing_lights = shadowing;
        planned?;

        let lights = std::mem::take(&mut self.plans[slot].current_lights);
        for (light, lists) in &lights {
            let pass = LightPass {
                light: *light,
                split: None,
                shadow: None,
            };
            self.add_light_pass(frame, pass, None, lists.iter());
        }
        self.plans[slot].current_lights = lights;

        trace!(
            "Frame {slot}: {} shadowing and {} plain lights planned",
            self.plans[slot].current_shadowing_lights.len(),
            self.plans[slot].current_lights.len()
        );
        Ok(())
    }

    fn plan_splits(
        &mut self,
        frame: &mut Frame,
        scene: &mut Scene,
        main: &Camera,
        distances: &[f32],
        base_dimension: u32,
        shadowing: &[(LightKey, ListPair)],
    ) -> Result<()> {
        let slot = frame.id();
        let Scene {
            renderables, lights, ..
        } = scene;
        let renderables = &*renderables;

        for (split, range) in distances.windows(2).enumerate() {
            let split_cam = split_camera(main, range[0], range[1]);
            let corners = frustum_corners(&split_cam);
            // shadowmap_reduction_ratio is not applied here: slices halve.
            let dimension = base_dimension >> split;

            for (light_key, lists) in shadowing {
                let Some(batch) = lights.get_mut(*light_key) else {
                    continue;
                };
                if batch.world_bound(slot).is_some_and(|b| !split_cam.contains(b)) {
                    continue;
                }

                let in_split = |key: &&RenderableKey| {
                    renderables
                        .get(**key)
                        .is_some_and(|r| split_cam.contains(r.world_bound(slot)))
                };
                let opaque: Vec<RenderableKey> = lists.opaque.iter().filter(in_split).copied().collect();
                let transparent: Vec<RenderableKey> =
                    lists.transparent.iter().filter(in_split).copied().collect();
                if opaque.is_empty() && transparent.is_empty() {
                    continue;
                }

                let light = batch.light.clone();
                let translation = batch.world_translation(slot);
                let placed = match check_shadow_camera_support(&light) {
                    Ok(()) => batch.shadow_mut().and_then(|shadow| {
                        shadow.ensure_perspective_splits(split + 1, base_dimension);
                        let part = shadow.part_mut(split)?;
                        place_shadow_camera(part, &light, translation, &corners).ok()?;
                        Some((part.camera.clone(), part.texture, part.light_space))
                    }),
                    Err(err) => {
                        warn!("Light {light_key:?} split {split}: {err}, lit without shadows");
                        None
                    }
                };
                let Some((shadow_camera, texture, light_space)) = placed else {
                    let pass = LightPass {
                        light: *light_key,
                        split: Some(split),
                        shadow: None,
                    };
                    self.add_light_pass(
                        frame,
                        pass,
                        Some(split_cam.clone()),
                        opaque.iter().chain(&transparent),
                    );
                    continue;
                };

                let mut depth =
                    self.acquire_depth_pass(*light_key, split, dimension, texture, shadow_camera.clone());
                let depth_queue = frame.queues_mut().create_queue();
                depth.queues.push(depth_queue);
                frame.add_camera_to_cull(shadow_camera, Some(depth_queue));
                let depth_id = self.register(frame, depth);

                let light_pass = LightPass {
                    light: *light_key,
                    split: Some(split),
                    shadow: Some((texture, light_space)),
                };
                let light_id = self.add_light_pass(
                    frame,
                    light_pass,
                    Some(split_cam.clone()),
                    opaque.iter().chain(&transparent),
                );
                frame.passes_mut().add_dependency(light_id, depth_id)?;
            }
        }
        Ok(())
    }

    /// Takes this frame's passes back into the pools and recycles the
    /// light lists.
    fn reclaim(&mut self, frame: &mut Frame) {
        let plan = std::mem::take(&mut self.plans[frame.id()]);
        for id in plan.issued {
            let Some(pass) = frame.passes_mut().remove(id) else {
                continue;
            };
            match &pass.kind {
                PassKind::DepthTexture(_) => self.free_depth_passes.push(pass),
                PassKind::Light(_) => self.free_light_passes.push(pass),
                PassKind::Scene | PassKind::Custom(_) => {}
            }
        }

        for (_, list) in plan
            .current_lights
            .into_iter()
            .chain(plan.current_shadowing_lights)
        {
            self.release_list(list);
        }
    }
}

impl GameState for ShadowPlannerState {
    fn pre_frame(&mut self, frame: &mut Frame, _scene: &mut Scene) -> Result<()> {
        self.plans[frame.id()].processed = false;
        Ok(())
    }

    fn post_cull(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        let slot = frame.id();
        if frame.has_camera_to_cull() || self.plans[slot].processed {
            return Ok(());
        }
        self.plans[slot].processed = true;
        self.plan(frame, scene)
    }

    fn post_render(&mut self, frame: &mut Frame, _scene: &mut Scene) -> Result<()> {
        self.reclaim(frame);
        Ok(())
    }

    fn cleanup(&mut self, renderer: &mut dyn Renderer) {
        for pass in self.free_depth_passes.drain(..) {
            if let PassKind::DepthTexture(depth) = pass.kind {
                renderer.release_texture(depth.texture);
                renderer.release_framebuffer(depth.framebuffer);
            }
        }
        self.free_light_passes.clear();
        debug!("Shadow planner released its pooled passes");
    }
}
