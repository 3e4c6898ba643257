//! Game State Hooks
//!
//! Game states plug into fixed points of every frame cycle:
//!
//! | Hook           | Called                                               |
//! |----------------|------------------------------------------------------|
//! | `pre_frame`    | after the frame reset its per-frame collections     |
//! | `pre_update`   | before the scene update (skipped while paused)       |
//! | `pre_cull`     | before the first camera is culled                    |
//! | `post_cull`    | after each culled camera; may add cameras to cull    |
//! | `pre_material` | renderer locked, before pending materials are built  |
//! | `pre_render`   | renderer locked, before the first pass               |
//! | `post_render`  | renderer released, after the back buffer swap       |
//! | `after_render` | renderer released, last hook of the cycle            |
//! | `cleanup`      | once, at engine shutdown                             |
//!
//! Hooks run in registration order while the application's game state
//! lock and the scene write lock are held.

use crate::errors::Result;
use crate::frame::frame::Frame;
use crate::renderer::Renderer;
use crate::scene::Scene;

#[allow(unused_variables)]
pub trait GameState: Send {
    fn pre_frame(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn pre_update(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn pre_cull(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn post_cull(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn pre_material(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn pre_render(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn post_render(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    fn after_render(&mut self, frame: &mut Frame, scene: &mut Scene) -> Result<()> {
        Ok(())
    }

    /// Releases renderer resources held by the state.
    fn cleanup(&mut self, renderer: &mut dyn Renderer) {}
}

/// Hook selector used by the frame to dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Hook {
    PreFrame,
    PreUpdate,
    PreCull,
    PostCull,
    PreMaterial,
    PreRender,
    PostRender,
    AfterRender,
}

impl Hook {
    pub(crate) fn call(
        self,
        state: &mut dyn GameState,
        frame: &mut Frame,
        scene: &mut Scene,
    ) -> Result<()> {
        match self {
            Hook::PreFrame => state.pre_frame(frame, scene),
            Hook::PreUpdate => state.pre_update(frame, scene),
            Hook::PreCull => state.pre_cull(frame, scene),
            Hook::PostCull => state.post_cull(frame, scene),
            Hook::PreMaterial => state.pre_material(frame, scene),
            Hook::PreRender => state.pre_render(frame, scene),
            Hook::PostRender => state.post_render(frame, scene),
            Hook::AfterRender => state.after_render(frame, scene),
        }
    }
}
