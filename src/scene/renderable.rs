use std::fmt;

use glam::Affine3A;

use crate::frame::MAX_FRAMES;
use crate::frame::context::UpdateContext;
use crate::lighting::slots::{LOWPROFILE_LIGHTS, LightSlots};
use crate::renderer::{LightStateId, MaterialId, QueueId, RenderStateId};
use crate::scene::bounds::BoundingBox;

/// Per-frame transform driver, run during the update stage.
pub type Controller = Box<dyn FnMut(&mut Affine3A, &UpdateContext) + Send + Sync>;

/// Whether a material takes part in lighting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LightCombine {
    /// Unlit; light selection skips the renderable.
    Off,
    #[default]
    Combine,
}

#[derive(Debug, Clone)]
pub struct MaterialState {
    pub material: MaterialId,
    pub lighting: LightCombine,
    /// Bucket the renderable is culled into.
    pub queue: QueueId,
    pub casts_shadows: bool,
    render_state: Option<RenderStateId>,
}

impl MaterialState {
    #[must_use]
    pub fn new(material: MaterialId, queue: QueueId) -> Self {
        Self {
            material,
            lighting: LightCombine::Combine,
            queue,
            casts_shadows: true,
            render_state: None,
        }
    }

    #[must_use]
    pub fn unlit(mut self) -> Self {
        self.lighting = LightCombine::Off;
        self
    }

    #[must_use]
    pub fn without_shadows(mut self) -> Self {
        self.casts_shadows = false;
        self
    }

    #[inline]
    #[must_use]
    pub fn is_lit(&self) -> bool {
        self.lighting != LightCombine::Off
    }

    /// Renderer state, `None` until the frame prepares the material.
    #[inline]
    #[must_use]
    pub fn render_state(&self) -> Option<RenderStateId> {
        self.render_state
    }

    pub fn set_render_state(&mut self, state: RenderStateId) {
        self.render_state = Some(state);
    }
}

/// Lighting and placement of a renderable in one frame slot.
#[derive(Debug, Clone, Default)]
pub struct RenderableFrameData {
    pub world_bound: BoundingBox,
    pub lights: LightSlots<LOWPROFILE_LIGHTS>,
    pub light_state: Option<LightStateId>,
}

/// A drawable batch.
pub struct Renderable {
    pub name: String,
    pub local_bound: BoundingBox,
    pub transform: Affine3A,
    pub material: MaterialState,
    frames: [RenderableFrameData; MAX_FRAMES],
    controller: Option<Controller>,
}

impl fmt::Debug for Renderable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Renderable")
            .field("name", &self.name)
            .field("local_bound", &self.local_bound)
            .field("transform", &self.transform)
            .field("material", &self.material)
            .field("frames", &self.frames)
            .field("controlled", &self.controller.is_some())
            .finish()
    }
}

impl Renderable {
    #[must_use]
    pub fn new(name: impl Into<String>, local_bound: BoundingBox, material: MaterialState) -> Self {
        Self {
            name: name.into(),
            local_bound,
            transform: Affine3A::IDENTITY,
            material,
            frames: Default::default(),
            controller: None,
        }
    }

    #[must_use]
    pub fn with_transform(mut self, transform: Affine3A) -> Self {
        self.transform = transform;
        self
    }

    #[must_use]
    pub fn with_controller(
        mut self,
        controller: impl FnMut(&mut Affine3A, &UpdateContext) + Send + Sync + 'static,
    ) -> Self {
        self.controller = Some(Box::new(controller));
        self
    }

    /// Runs the controller and refreshes the world bound of `ctx.slot`.
    pub fn update(&mut self, ctx: &UpdateContext) {
        if let Some(controller) = self.controller.as_mut() {
            controller(&mut self.transform, ctx);
        }
        self.frames[ctx.slot].world_bound = self.local_bound.transform(&self.transform);
    }

    #[inline]
    #[must_use]
    pub fn frame_data(&self, slot: usize) -> &RenderableFrameData {
        &self.frames[slot]
    }

    #[inline]
    #[must_use]
    pub fn frame_data_mut(&mut self, slot: usize) -> &mut RenderableFrameData {
        &mut self.frames[slot]
    }

    #[inline]
    #[must_use]
    pub fn world_bound(&self, slot: usize) -> &BoundingBox {
        &self.frames[slot].world_bound
    }

    #[inline]
    #[must_use]
    pub fn lights(&self, slot: usize) -> &LightSlots<LOWPROFILE_LIGHTS> {
        &self.frames[slot].lights
    }

    #[inline]
    #[must_use]
    pub fn light_state(&self, slot: usize) -> Option<LightStateId> {
        self.frames[slot].light_state
    }

    /// Drops the lights and light state selected for `slot`.
    pub fn clear_lights(&mut self, slot: usize) {
        let frame = &mut self.frames[slot];
        frame.lights.clear();
        frame.light_state = None;
    }
}
