//! Frame Pipeline
//!
//! Up to [`MAX_FRAMES`] logical frames are in flight. Each runs
//! update → cull → material → render and hands control to game states at
//! fixed hook points.
//!
//! - [`Frame`]: one slot's pipeline
//! - [`FrameState`] / [`FrameSignal`]: the lifecycle and its waitable cell
//! - [`CullContext`] / [`CullContextPool`]: per-worker culling output
//! - [`GameState`]: hook trait for lighting and shadow planning
//! - [`AppContext`]: what all slots share
//! - [`FrameScheduler`]: the application loop

pub mod context;
pub mod cull;
#[allow(clippy::module_inception)]
pub mod frame;
pub mod game_state;
pub mod scheduler;
pub mod state;

/// Number of frame slots. Per-frame world data is indexed by slot.
pub const MAX_FRAMES: usize = 2;

pub use context::{AppContext, UpdateContext};
pub use cull::{CullContext, CullContextId, CullContextPool, CullJob, CullTarget};
pub use frame::{CameraEntry, Frame};
pub use game_state::GameState;
pub use scheduler::FrameScheduler;
pub use state::{FrameSignal, FrameState};
