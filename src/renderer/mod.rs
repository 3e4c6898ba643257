//! Rendering Layer
//!
//! Everything between the culled scene and the GPU:
//!
//! - [`backend`]: the [`Renderer`] capability trait and GPU handles
//! - [`headless`]: a recording renderer for tests and tools
//! - [`queue`]: per-frame render queues
//! - [`pass`] / [`pass_manager`]: render passes and their ordering
//! - [`stage`]: coarse pass stages
//! - [`light_state`]: shared light-combination states

pub mod backend;
pub mod headless;
pub mod light_state;
pub mod pass;
pub mod pass_manager;
pub mod queue;
pub mod stage;

pub use backend::{
    ClearFlags, DrawCall, FramebufferId, MaterialId, RenderStateId, RenderTarget, Renderer,
    Screenshot, StateKind, TextureId,
};
pub use headless::{Command, CommandLog, HeadlessRenderer};
pub use light_state::{LightState, LightStateCache, LightStateId};
pub use pass::{CustomPass, DepthTexturePass, LightPass, PassContext, PassId, PassKind, RenderPass};
pub use pass_manager::PassManager;
pub use queue::{QueueId, RenderQueueManager};
pub use stage::PassStage;
