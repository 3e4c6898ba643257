//! Headless Renderer
//!
//! A [`Renderer`] that executes nothing and records every command. Used by
//! the tests, the benchmark and the demo binary in place of a GPU.
//!
//! The recording is shared through a [`CommandLog`] handle, so it stays
//! readable after the renderer has been boxed into the application context.

use std::sync::Arc;

use log::trace;
use parking_lot::Mutex;
use rustc_hash::FxHashSet;

use crate::errors::{LumenError, Result};
use crate::renderer::backend::{
    ClearFlags, DrawCall, FramebufferId, MaterialId, RenderStateId, RenderTarget, Renderer,
    Screenshot, StateKind, TextureId,
};
use crate::scene::camera::{Camera, CameraId};

/// One recorded renderer call.
#[derive(Debug, Clone)]
pub enum Command {
    CreateState(StateKind, RenderStateId),
    SetRenderTarget(RenderTarget),
    SetCamera(CameraId),
    Clear(ClearFlags),
    ForcedMaterial(Option<MaterialId>),
    Draw(DrawCall),
    Display,
    Screenshot,
    ReleaseTexture(TextureId),
    ReleaseFramebuffer(FramebufferId),
}

#[derive(Debug, Default)]
struct LogInner {
    commands: Vec<Command>,
    fail_on_draw: bool,
}

/// Shared view of a [`HeadlessRenderer`]'s recording.
#[derive(Debug, Clone, Default)]
pub struct CommandLog {
    inner: Arc<Mutex<LogInner>>,
}

impl CommandLog {
    #[must_use]
    pub fn commands(&self) -> Vec<Command> {
        self.inner.lock().commands.clone()
    }

    #[must_use]
    pub fn count(&self, predicate: impl Fn(&Command) -> bool) -> usize {
        self.inner.lock().commands.iter().filter(|c| predicate(c)).count()
    }

    #[must_use]
    pub fn draws(&self) -> Vec<DrawCall> {
        self.inner
            .lock()
            .commands
            .iter()
            .filter_map(|c| match c {
                Command::Draw(draw) => Some(draw.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn clear(&self) {
        self.inner.lock().commands.clear();
    }

    /// Makes every following `draw_direct` fail.
    pub fn fail_draws(&self, fail: bool) {
        self.inner.lock().fail_on_draw = fail;
    }

    fn push(&self, command: Command) {
        trace!("headless: {command:?}");
        self.inner.lock().commands.push(command);
    }
}

/// Recording renderer with no GPU behind it.
#[derive(Debug)]
pub struct HeadlessRenderer {
    log: CommandLog,
    next_state: u32,
    width: u32,
    height: u32,
    live_textures: FxHashSet<TextureId>,
}

impl HeadlessRenderer {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            log: CommandLog::default(),
            next_state: 1,
            width,
            height,
            live_textures: FxHashSet::default(),
        }
    }

    #[must_use]
    pub fn log(&self) -> CommandLog {
        self.log.clone()
    }
}

impl Renderer for HeadlessRenderer {
    fn create_state(&mut self, kind: StateKind) -> Result<RenderStateId> {
        let id = RenderStateId(self.next_state);
        self.next_state += 1;
        self.log.push(Command::CreateState(kind, id));
        Ok(id)
    }

    fn set_render_target(&mut self, target: RenderTarget) -> Result<()> {
        if let RenderTarget::Framebuffer { attachment, .. } = target {
            self.live_textures.insert(attachment);
        }
        self.log.push(Command::SetRenderTarget(target));
        Ok(())
    }

    fn set_camera(&mut self, camera: &Camera) {
        self.log.push(Command::SetCamera(camera.id()));
    }

    fn clear_buffers(&mut self, flags: ClearFlags) {
        self.log.push(Command::Clear(flags));
    }

    fn set_forced_material(&mut self, material: Option<MaterialId>) {
        self.log.push(Command::ForcedMaterial(material));
    }

    fn draw_direct(&mut self, draw: &DrawCall) -> Result<()> {
        if self.log.inner.lock().fail_on_draw {
            return Err(LumenError::Renderer(format!(
                "draw of {:?} rejected",
                draw.renderable
            )));
        }
        self.log.push(Command::Draw(draw.clone()));
        Ok(())
    }

    fn display_back_buffer(&mut self) -> Result<()> {
        self.log.push(Command::Display);
        Ok(())
    }

    fn take_screenshot(&mut self) -> Result<Screenshot> {
        self.log.push(Command::Screenshot);
        Ok(Screenshot {
            width: self.width,
            height: self.height,
            rgba: vec![0; (self.width * self.height * 4) as usize],
        })
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.live_textures.remove(&texture);
        self.log.push(Command::ReleaseTexture(texture));
    }

    fn release_framebuffer(&mut self, framebuffer: FramebufferId) {
        self.log.push(Command::ReleaseFramebuffer(framebuffer));
    }
}
