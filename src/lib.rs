#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::cast_precision_loss)]
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::too_many_arguments)]

pub mod errors;
pub mod frame;
pub mod lighting;
pub mod renderer;
pub mod scene;
pub mod settings;
pub mod utils;

pub use errors::{LumenError, Result};
pub use frame::{AppContext, Frame, FrameScheduler, FrameState, GameState, MAX_FRAMES};
pub use lighting::{LightSelectionState, ShadowPlannerState};
pub use renderer::{HeadlessRenderer, Renderer};
pub use scene::{Camera, Light, LightBatch, Renderable, Scene, Shadow};
pub use settings::{DisplaySettings, EngineSettings, ThreadingMode};
