//! Light influence ranking.
//!
//! Priorities only order lights against each other for one renderable; they
//! are not comparable across light types and carry no physical meaning.
//! Zero always means "does not affect".

use glam::Vec3;

use crate::scene::bounds::{BoundingBox, Plane, PlaneSide};
use crate::scene::light::{Light, LightBatch, LightKind};

/// Intensity below which a light is considered to have no effect.
pub const LIGHT_EPSILON: f32 = 0.01;

/// Closest distance used by the `1 / distance` ranking.
const MIN_DISTANCE: f32 = 1e-4;

pub struct LightSorter;

impl LightSorter {
    /// Influence of `batch` on a renderable bounded by `bound` in frame
    /// `slot`.
    ///
    /// - global light (no world bound): 1.0, or 0 when disabled
    /// - bounds do not overlap, or light disabled: 0
    /// - directional/spot light with the bound fully behind its facing
    ///   plane: 0
    /// - otherwise `1 / distance(light, bound center)`
    #[must_use]
    pub fn value_for(batch: &LightBatch, slot: usize, bound: &BoundingBox) -> f32 {
        let light = &batch.light;
        let Some(light_bound) = batch.world_bound(slot) else {
            return if light.enabled { 1.0 } else { 0.0 };
        };

        if !light_bound.intersects(bound) || !light.enabled {
            return 0.0;
        }

        let position = batch.world_translation(slot);
        if matches!(light.kind, LightKind::Directional | LightKind::Spot(_)) {
            let plane = Plane::from_origin_normal(position, batch.world_direction(slot));
            if bound.which_side(&plane) == PlaneSide::Negative {
                return 0.0;
            }
        }

        1.0 / position.distance(bound.center()).max(MIN_DISTANCE)
    }

    /// Attenuation-aware influence of `light` placed at `position` facing
    /// `direction` on `target`.
    #[must_use]
    pub fn value_for_light(
        light: &Light,
        position: Vec3,
        direction: Vec3,
        target: &BoundingBox,
    ) -> f32 {
        if !light.enabled {
            return 0.0;
        }
        let intensity = light.color_intensity();
        match light.kind {
            LightKind::Directional => intensity,
            LightKind::Point => attenuated(light, intensity, position.distance(target.center())),
            LightKind::Spot(_) => {
                let plane = Plane::from_origin_normal(position, direction);
                if target.which_side(&plane) == PlaneSide::Negative {
                    return 0.0;
                }
                attenuated(light, intensity, position.distance(target.center()))
            }
        }
    }

    /// Distance at which the light's attenuated intensity drops to
    /// [`LIGHT_EPSILON`]. NaN when the light never falls off.
    #[must_use]
    pub fn light_distance(light: &Light) -> f32 {
        let att = &light.attenuation;
        if !att.enabled || (att.linear == 0.0 && att.quadratic == 0.0) {
            return f32::NAN;
        }

        // quadratic·d² + linear·d + (constant − intensity/ε) = 0
        let c = att.constant - light.color_intensity() / LIGHT_EPSILON;
        let distance = if att.quadratic == 0.0 {
            -c / att.linear
        } else {
            let discriminant = att.linear * att.linear - 4.0 * att.quadratic * c;
            if discriminant < 0.0 {
                return 0.0;
            }
            (-att.linear + discriminant.sqrt()) / (2.0 * att.quadratic)
        };
        distance.max(0.0)
    }

    /// Local-space influence box of `light`, centered at the origin.
    /// `None` for global lights.
    #[must_use]
    pub fn create_light_bound(light: &Light) -> Option<BoundingBox> {
        if light.is_directional() {
            return None;
        }
        let distance = Self::light_distance(light);
        if distance.is_nan() {
            return None;
        }
        Some(BoundingBox::from_center_half_extent(
            Vec3::ZERO,
            Vec3::splat(distance),
        ))
    }
}

fn attenuated(light: &Light, intensity: f32, distance: f32) -> f32 {
    if !light.attenuation.enabled {
        return intensity;
    }
    let factor = light.attenuation.factor(distance);
    if factor <= 0.0 { intensity } else { intensity / factor }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::Attenuation;
    use glam::Affine3A;

    fn point(at: Vec3) -> LightBatch {
        let light = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.1, 0.01));
        let mut batch = LightBatch::new(light, Affine3A::from_translation(at));
        batch.update_world(0);
        batch
    }

    #[test]
    fn closer_light_ranks_higher() {
        let bound = BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let near = LightSorter::value_for(&point(Vec3::new(2.0, 0.0, 0.0)), 0, &bound);
        let far = LightSorter::value_for(&point(Vec3::new(6.0, 0.0, 0.0)), 0, &bound);
        assert!(near > far);
        assert!(far > 0.0);
    }

    #[test]
    fn out_of_range_light_is_zero() {
        let bound = BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        let distant = point(Vec3::new(10_000.0, 0.0, 0.0));
        assert_eq!(LightSorter::value_for(&distant, 0, &bound), 0.0);
    }

    #[test]
    fn disabled_global_light_is_zero() {
        let mut light = Light::new_directional(Vec3::ONE, 1.0);
        light.enabled = false;
        let mut batch = LightBatch::new(light, Affine3A::IDENTITY);
        batch.update_world(0);
        let bound = BoundingBox::from_center_half_extent(Vec3::ZERO, Vec3::ONE);
        assert_eq!(LightSorter::value_for(&batch, 0, &bound), 0.0);
        batch.light.enabled = true;
        assert_eq!(LightSorter::value_for(&batch, 0, &bound), 1.0);
    }

    #[test]
    fn spot_ignores_targets_behind_it() {
        let light = Light::new_spot(
            Vec3::ONE,
            1.0,
            Attenuation::new(1.0, 0.1, 0.0),
            0.3,
            0.5,
        );
        let mut batch = LightBatch::new(light, Affine3A::IDENTITY);
        batch.update_world(0);
        let front = BoundingBox::from_center_half_extent(Vec3::new(0.0, 0.0, -5.0), Vec3::ONE);
        let behind = BoundingBox::from_center_half_extent(Vec3::new(0.0, 0.0, 5.0), Vec3::ONE);
        assert!(LightSorter::value_for(&batch, 0, &front) > 0.0);
        assert_eq!(LightSorter::value_for(&batch, 0, &behind), 0.0);
        assert_eq!(
            LightSorter::value_for_light(&batch.light, Vec3::ZERO, Vec3::NEG_Z, &behind),
            0.0
        );
    }

    #[test]
    fn falloff_distance_solves_epsilon() {
        let light = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.0, 1.0));
        let d = LightSorter::light_distance(&light);
        let at_d = light.color_intensity() / light.attenuation.factor(d);
        assert!((at_d - LIGHT_EPSILON).abs() < 1e-5);

        let flat = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.0, 0.0));
        assert!(LightSorter::light_distance(&flat).is_nan());
        assert!(LightSorter::create_light_bound(&flat).is_none());
    }

    #[test]
    fn attenuation_lowers_priority_with_distance() {
        let light = Light::new_point(Vec3::ONE, 2.0, Attenuation::new(1.0, 0.5, 0.0));
        let target = BoundingBox::from_center_half_extent(Vec3::new(4.0, 0.0, 0.0), Vec3::ONE);
        let value = LightSorter::value_for_light(&light, Vec3::ZERO, Vec3::NEG_Z, &target);
        assert!((value - 2.0 / 3.0).abs() < 1e-5);
    }
}
