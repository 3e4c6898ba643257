//! Renderer Capability
//!
//! The engine talks to the GPU through the [`Renderer`] trait. Only the
//! operations the frame pipeline needs are exposed; device creation, shader
//! generation and buffer plumbing are the backend's business.
//!
//! GPU-side objects are addressed by small copyable handles
//! ([`TextureId`], [`FramebufferId`], [`RenderStateId`]). Texture and
//! framebuffer handles are allocated engine-side from process-wide counters,
//! so shadow maps can be named before any renderer sees them; backends
//! realize the underlying resources on first use.
//!
//! Access is serialized by the mutex in
//! [`AppContext`](crate::frame::AppContext): the render stage holds it for
//! the whole pass walk, so only one frame submits draws at a time.

use std::sync::atomic::{AtomicU32, Ordering};

use bitflags::bitflags;
use glam::{Affine3A, Mat4};

use crate::errors::Result;
use crate::scene::camera::Camera;
use crate::scene::{LightKey, RenderableKey};

static NEXT_TEXTURE_ID: AtomicU32 = AtomicU32::new(1);
static NEXT_FRAMEBUFFER_ID: AtomicU32 = AtomicU32::new(1);

// ─── Handles ──────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TextureId(u32);

impl TextureId {
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_TEXTURE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FramebufferId(u32);

impl FramebufferId {
    #[must_use]
    pub fn allocate() -> Self {
        Self(NEXT_FRAMEBUFFER_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Renderer-side state object created by [`Renderer::create_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RenderStateId(pub u32);

/// Material identity. Materials themselves live outside the engine core;
/// the pipeline only sorts and binds by id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct MaterialId(pub u32);

impl MaterialId {
    /// Depth-only material forced by shadow map passes.
    pub const DEPTH: Self = Self(u32::MAX);
}

/// What a render state is created for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateKind {
    /// Material binding for one material.
    Material(MaterialId),
    /// A light combination shared by every renderable lit by it.
    LightCombination,
}

bitflags! {
    /// Buffers cleared by [`Renderer::clear_buffers`].
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ClearFlags: u8 {
        const COLOR   = 1 << 0;
        const DEPTH   = 1 << 1;
        const STENCIL = 1 << 2;
    }
}

/// Where a pass draws.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RenderTarget {
    /// The window's back buffer.
    #[default]
    Main,
    /// An offscreen framebuffer with a single attachment.
    Framebuffer {
        id: FramebufferId,
        attachment: TextureId,
        dimension: u32,
    },
}

/// One draw submitted by a pass.
#[derive(Debug, Clone)]
pub struct DrawCall {
    pub renderable: RenderableKey,
    pub world: Affine3A,
    pub material: MaterialId,
    pub material_state: Option<RenderStateId>,
    pub light_state: Option<RenderStateId>,
    /// Set by per-light passes.
    pub light: Option<LightKey>,
    /// Shadow map and light-space matrix for shadowed lighting passes.
    pub shadow: Option<(TextureId, Mat4)>,
}

/// Screenshot taken from the current target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Screenshot {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

/// The GPU capability object.
pub trait Renderer: Send {
    fn create_state(&mut self, kind: StateKind) -> Result<RenderStateId>;

    fn set_render_target(&mut self, target: RenderTarget) -> Result<()>;

    fn set_camera(&mut self, camera: &Camera);

    fn clear_buffers(&mut self, flags: ClearFlags);

    /// Overrides the material of every following draw. `None` restores
    /// per-draw materials.
    fn set_forced_material(&mut self, material: Option<MaterialId>);

    fn draw_direct(&mut self, draw: &DrawCall) -> Result<()>;

    fn display_back_buffer(&mut self) -> Result<()>;

    fn take_screenshot(&mut self) -> Result<Screenshot>;

    fn release_texture(&mut self, texture: TextureId);

    fn release_framebuffer(&mut self, framebuffer: FramebufferId);
}
