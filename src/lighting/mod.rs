//! Lighting
//!
//! Chooses which lights touch which renderables, and plans shadow passes.
//!
//! | Module             | Role                                            |
//! |--------------------|-------------------------------------------------|
//! | [`sorter`]         | influence of one light on one bound             |
//! | [`registry`]       | stable per-session light ids                    |
//! | [`slots`]          | top-K light slots per renderable                |
//! | [`selection`]      | [`LightSelectionState`]: slots + shared states  |
//! | [`shadow_utils`]   | split distances and shadow camera placement     |
//! | [`shadow_planner`] | [`ShadowPlannerState`]: depth and light passes  |
//!
//! The two game states are alternatives: selection lights renderables
//! through combined light states in the scene passes, the planner through
//! one additive pass per light (per split for shadowing lights).

pub mod registry;
pub mod selection;
pub mod shadow_planner;
pub mod shadow_utils;
pub mod slots;
pub mod sorter;

pub use registry::{LightId, LightIdRegistry};
pub use selection::{LightSelectionState, SelectionStats};
pub use shadow_planner::{ListPair, PlannerStats, ShadowPlannerState};
pub use shadow_utils::{ShadowCameraError, calculate_split_distances};
pub use slots::{LOWPROFILE_LIGHTS, LightSlot, LightSlots};
pub use sorter::{LIGHT_EPSILON, LightSorter};
