use glam::{Affine3A, Vec3};

use crate::errors::Result;
use crate::frame::MAX_FRAMES;
use crate::lighting::sorter::LightSorter;
use crate::scene::LightKey;
use crate::scene::bounds::BoundingBox;
use crate::scene::shadow::Shadow;

/// Distance attenuation `1 / (constant + linear·d + quadratic·d²)`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Attenuation {
    pub enabled: bool,
    pub constant: f32,
    pub linear: f32,
    pub quadratic: f32,
}

impl Default for Attenuation {
    fn default() -> Self {
        Self {
            enabled: false,
            constant: 1.0,
            linear: 0.0,
            quadratic: 0.0,
        }
    }
}

impl Attenuation {
    #[must_use]
    pub fn new(constant: f32, linear: f32, quadratic: f32) -> Self {
        Self {
            enabled: true,
            constant,
            linear,
            quadratic,
        }
    }

    #[inline]
    #[must_use]
    pub fn factor(&self, distance: f32) -> f32 {
        self.constant + self.linear * distance + self.quadratic * distance * distance
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpotLight {
    /// Outer cone half-angle in radians.
    pub outer_angle: f32,
    /// Inner (full intensity) cone half-angle in radians.
    pub inner_angle: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum LightKind {
    Directional,
    Point,
    Spot(SpotLight),
}

/// Light description: what kind of light, how bright, how it falls off.
///
/// Placement lives in the owning [`LightBatch`]; position is the world
/// translation and direction the world rotation's local −Z.
#[derive(Debug, Clone, PartialEq)]
pub struct Light {
    pub kind: LightKind,
    pub color: Vec3,
    pub intensity: f32,
    pub attenuation: Attenuation,
    pub enabled: bool,
    pub cast_shadows: bool,
}

impl Light {
    #[must_use]
    pub fn new_directional(color: Vec3, intensity: f32) -> Self {
        Self {
            kind: LightKind::Directional,
            color,
            intensity,
            attenuation: Attenuation::default(),
            enabled: true,
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn new_point(color: Vec3, intensity: f32, attenuation: Attenuation) -> Self {
        Self {
            kind: LightKind::Point,
            color,
            intensity,
            attenuation,
            enabled: true,
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn new_spot(
        color: Vec3,
        intensity: f32,
        attenuation: Attenuation,
        inner_angle: f32,
        outer_angle: f32,
    ) -> Self {
        Self {
            kind: LightKind::Spot(SpotLight {
                outer_angle,
                inner_angle,
            }),
            color,
            intensity,
            attenuation,
            enabled: true,
            cast_shadows: false,
        }
    }

    #[must_use]
    pub fn with_shadows(mut self, cast_shadows: bool) -> Self {
        self.cast_shadows = cast_shadows;
        self
    }

    /// Scalar brightness used for ranking: the brightest channel times the
    /// intensity.
    #[inline]
    #[must_use]
    pub fn color_intensity(&self) -> f32 {
        self.color.max_element() * self.intensity
    }

    #[inline]
    #[must_use]
    pub fn is_directional(&self) -> bool {
        matches!(self.kind, LightKind::Directional)
    }
}

/// World placement of a light for one frame slot.
#[derive(Debug, Clone, Copy)]
pub struct LightFrameData {
    pub world_transform: Affine3A,
    /// `None` for global lights (unbounded influence).
    pub world_bound: Option<BoundingBox>,
}

impl Default for LightFrameData {
    fn default() -> Self {
        Self {
            world_transform: Affine3A::IDENTITY,
            world_bound: None,
        }
    }
}

/// A light as it appears in the light queue: the light itself, its
/// transform, per-slot world data and an optional shadow.
#[derive(Debug)]
pub struct LightBatch {
    pub light: Light,
    pub transform: Affine3A,
    frames: [LightFrameData; MAX_FRAMES],
    shadow: Option<Shadow>,
}

impl LightBatch {
    #[must_use]
    pub fn new(light: Light, transform: Affine3A) -> Self {
        Self {
            light,
            transform,
            frames: [LightFrameData::default(); MAX_FRAMES],
            shadow: None,
        }
    }

    /// Recomputes world transform and bound for `slot`.
    pub fn update_world(&mut self, slot: usize) {
        let bound = LightSorter::create_light_bound(&self.light).map(|b| b.transform(&self.transform));
        self.frames[slot] = LightFrameData {
            world_transform: self.transform,
            world_bound: bound,
        };
    }

    #[inline]
    #[must_use]
    pub fn frame_data(&self, slot: usize) -> &LightFrameData {
        &self.frames[slot]
    }

    #[inline]
    #[must_use]
    pub fn world_bound(&self, slot: usize) -> Option<&BoundingBox> {
        self.frames[slot].world_bound.as_ref()
    }

    #[must_use]
    pub fn world_translation(&self, slot: usize) -> Vec3 {
        self.frames[slot].world_transform.translation.into()
    }

    /// World-space facing direction (local −Z).
    #[must_use]
    pub fn world_direction(&self, slot: usize) -> Vec3 {
        self.frames[slot]
            .world_transform
            .transform_vector3(Vec3::NEG_Z)
            .normalize_or_zero()
    }

    #[must_use]
    pub fn shadow(&self) -> Option<&Shadow> {
        self.shadow.as_ref()
    }

    #[must_use]
    pub fn shadow_mut(&mut self) -> Option<&mut Shadow> {
        self.shadow.as_mut()
    }

    /// Gives this light its shadow. Fails if the shadow already belongs to
    /// another light; the shadow is dropped in that case and this light is
    /// left unchanged.
    pub(crate) fn attach_shadow(&mut self, key: LightKey, mut shadow: Shadow) -> Result<()> {
        shadow.set_parent(key)?;
        self.shadow = Some(shadow);
        Ok(())
    }

    /// Enabled, flagged as caster and carrying a shadow.
    #[must_use]
    pub fn is_shadow_caster(&self) -> bool {
        self.light.enabled && self.light.cast_shadows && self.shadow.is_some()
    }
}
