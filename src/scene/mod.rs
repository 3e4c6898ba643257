//! Scene Module
//!
//! The flat scene the frame pipeline works on:
//! - [`Scene`]: renderable and light storage plus the update/cull hooks
//! - [`Renderable`]: a drawable batch with per-frame light slots
//! - [`LightBatch`] / [`Light`]: lights as they appear in the light queue
//! - [`Shadow`]: per-light shadow map slices
//! - [`Camera`], [`BoundingBox`]: view and volume math

pub mod bounds;
pub mod camera;
pub mod light;
pub mod renderable;
#[allow(clippy::module_inception)]
pub mod scene;
pub mod shadow;

pub use bounds::{BoundingBox, Plane, PlaneSide};
pub use camera::{Camera, CameraId, Frustum};
pub use light::{Attenuation, Light, LightBatch, LightKind, SpotLight};
pub use renderable::{LightCombine, MaterialState, Renderable};
pub use scene::Scene;
pub use shadow::{Shadow, ShadowMode, ShadowPart};

use slotmap::new_key_type;

new_key_type! {
    pub struct RenderableKey;
    pub struct LightKey;
}
