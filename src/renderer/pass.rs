//! Render Passes
//!
//! A [`RenderPass`] draws some queues of the frame from one camera into one
//! target. The pass kind decides what a draw carries:
//!
//! - [`PassKind::Scene`]: plain material draws.
//! - [`PassKind::DepthTexture`]: depth capture into a shadow map, forced
//!   depth material.
//! - [`PassKind::Light`]: additive lighting for one light, optionally with a
//!   shadow map lookup.
//! - [`PassKind::Custom`]: user code.
//!
//! Passes are either *persistent* (registered once, kept across frames) or
//! transient (registered for one frame; pooled passes are taken back out of
//! the frame after rendering).

use std::fmt;
use std::sync::atomic::{AtomicU32, Ordering};

use glam::Mat4;
use smallvec::SmallVec;

use crate::errors::Result;
use crate::renderer::backend::{
    ClearFlags, DrawCall, FramebufferId, MaterialId, RenderTarget, Renderer, TextureId,
};
use crate::renderer::light_state::LightStateCache;
use crate::renderer::queue::{QueueId, RenderQueueManager};
use crate::renderer::stage::PassStage;
use crate::scene::camera::Camera;
use crate::scene::{LightKey, Scene};

static NEXT_PASS_ID: AtomicU32 = AtomicU32::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PassId(u32);

impl PassId {
    fn next() -> Self {
        Self(NEXT_PASS_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Everything a pass may touch while rendering.
pub struct PassContext<'a> {
    pub renderer: &'a mut dyn Renderer,
    pub scene: &'a Scene,
    pub queues: &'a RenderQueueManager,
    pub light_states: &'a LightStateCache,
    /// Frame slot being rendered.
    pub slot: usize,
}

/// User-implemented pass body.
pub trait CustomPass: Send {
    fn render(&mut self, queues: &[QueueId], ctx: &mut PassContext<'_>) -> Result<()>;
}

/// Refreshes one shadow map slice.
#[derive(Debug, Clone)]
pub struct DepthTexturePass {
    pub light: LightKey,
    pub split: usize,
    pub dimension: u32,
    pub framebuffer: FramebufferId,
    pub texture: TextureId,
}

/// Adds one light's contribution to the renderables it affects.
#[derive(Debug, Clone)]
pub struct LightPass {
    pub light: LightKey,
    /// Cascade index for shadowed lights.
    pub split: Option<usize>,
    /// Shadow map and light-space matrix for shadowed lights.
    pub shadow: Option<(TextureId, Mat4)>,
}

pub enum PassKind {
    Scene,
    DepthTexture(DepthTexturePass),
    Light(LightPass),
    Custom(Box<dyn CustomPass>),
}

impl fmt::Debug for PassKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Scene => f.write_str("Scene"),
            Self::DepthTexture(pass) => f.debug_tuple("DepthTexture").field(pass).finish(),
            Self::Light(pass) => f.debug_tuple("Light").field(pass).finish(),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Debug)]
pub struct RenderPass {
    id: PassId,
    pub name: String,
    /// `None` renders from the frame's main camera.
    pub camera: Option<Camera>,
    pub target: RenderTarget,
    pub queues: SmallVec<[QueueId; 4]>,
    pub stage: PassStage,
    /// Lower values run first within a stage.
    pub priority: i32,
    /// Material forced on every draw; `None` falls back to the frame's
    /// forced material.
    pub forced_material: Option<MaterialId>,
    /// Buffers cleared when the pass switches onto a dirty target.
    pub clear: ClearFlags,
    pub enabled: bool,
    pub persistent: bool,
    pub kind: PassKind,
}

impl RenderPass {
    #[must_use]
    pub fn new(name: impl Into<String>, kind: PassKind) -> Self {
        Self {
            id: PassId::next(),
            name: name.into(),
            camera: None,
            target: RenderTarget::Main,
            queues: SmallVec::new(),
            stage: PassStage::default(),
            priority: 0,
            forced_material: None,
            clear: ClearFlags::COLOR | ClearFlags::DEPTH,
            enabled: true,
            persistent: false,
            kind,
        }
    }

    /// Main-camera pass over the given queues.
    #[must_use]
    pub fn scene(name: impl Into<String>, queues: &[QueueId], stage: PassStage) -> Self {
        let mut pass = Self::new(name, PassKind::Scene);
        pass.queues.extend_from_slice(queues);
        pass.stage = stage;
        pass
    }

    /// Shadow map capture from `camera` into the pass's framebuffer.
    #[must_use]
    pub fn depth_texture(depth: DepthTexturePass, camera: Camera) -> Self {
        let target = RenderTarget::Framebuffer {
            id: depth.framebuffer,
            attachment: depth.texture,
            dimension: depth.dimension,
        };
        let mut pass = Self::new(format!("ShadowDepth[{}]", depth.split), PassKind::DepthTexture(depth));
        pass.camera = Some(camera);
        pass.target = target;
        pass.stage = PassStage::ShadowMap;
        pass.forced_material = Some(MaterialId::DEPTH);
        pass.clear = ClearFlags::DEPTH;
        pass
    }

    #[must_use]
    pub fn light(light: LightPass, camera: Option<Camera>) -> Self {
        let mut pass = Self::new("Light", PassKind::Light(light));
        pass.camera = camera;
        pass.stage = PassStage::Lighting;
        pass.clear = ClearFlags::empty();
        pass
    }

    #[must_use]
    pub fn with_camera(mut self, camera: Camera) -> Self {
        self.camera = Some(camera);
        self
    }

    #[must_use]
    pub fn with_target(mut self, target: RenderTarget) -> Self {
        self.target = target;
        self
    }

    #[must_use]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    #[must_use]
    pub fn with_forced_material(mut self, material: MaterialId) -> Self {
        self.forced_material = Some(material);
        self
    }

    #[must_use]
    pub fn persistent(mut self) -> Self {
        self.persistent = true;
        self
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> PassId {
        self.id
    }

    #[must_use]
    pub fn depth_pass(&self) -> Option<&DepthTexturePass> {
        match &self.kind {
            PassKind::DepthTexture(depth) => Some(depth),
            _ => None,
        }
    }

    #[must_use]
    pub fn light_pass(&self) -> Option<&LightPass> {
        match &self.kind {
            PassKind::Light(light) => Some(light),
            _ => None,
        }
    }

    /// Points a pooled depth pass at another shadow slice. The framebuffer
    /// and dimension stay; the attachment follows `texture`.
    pub fn rebind_depth(&mut self, light: LightKey, split: usize, texture: TextureId, camera: Camera) {
        if let PassKind::DepthTexture(depth) = &mut self.kind {
            depth.light = light;
            depth.split = split;
            depth.texture = texture;
            self.target = RenderTarget::Framebuffer {
                id: depth.framebuffer,
                attachment: texture,
                dimension: depth.dimension,
            };
            self.name = format!("ShadowDepth[{split}]");
            self.camera = Some(camera);
            self.queues.clear();
        }
    }

    /// Points a pooled light pass at another light.
    pub fn rebind_light(&mut self, light: LightPass, camera: Option<Camera>) {
        if let PassKind::Light(current) = &mut self.kind {
            *current = light;
            self.camera = camera;
            self.queues.clear();
        }
    }

    pub(crate) fn render(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        let Self { queues, kind, .. } = self;
        let queues = &queues[..];
        match kind {
            PassKind::Custom(custom) => custom.render(queues, ctx),
            PassKind::Scene | PassKind::DepthTexture(_) => draw_queues(ctx, queues, None, None),
            PassKind::Light(light) => draw_queues(ctx, queues, Some(light.light), light.shadow),
        }
    }
}

fn draw_queues(
    ctx: &mut PassContext<'_>,
    queues: &[QueueId],
    light: Option<LightKey>,
    shadow: Option<(TextureId, Mat4)>,
) -> Result<()> {
    let (scene, queue_manager, light_states) = (ctx.scene, ctx.queues, ctx.light_states);
    for queue in queues {
        for key in queue_manager.queue(*queue) {
            // Renderables removed after culling are skipped.
            let Some(renderable) = scene.renderable(*key) else {
                continue;
            };
            let light_state = if light.is_none() {
                renderable
                    .light_state(ctx.slot)
                    .and_then(|id| light_states.get(id))
                    .and_then(|state| state.render_state)
            } else {
                None
            };
            ctx.renderer.draw_direct(&DrawCall {
                renderable: *key,
                world: renderable.transform,
                material: renderable.material.material,
                material_state: renderable.material.render_state(),
                light_state,
                light,
                shadow,
            })?;
        }
    }
    Ok(())
}
