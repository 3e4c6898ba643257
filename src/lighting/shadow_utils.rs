//! Shadow Utilities
//!
//! Pure math for cascaded shadow maps.
//!
//! # Provided Functions
//!
//! - Split distances (practical split scheme, pinned endpoints)
//! - Split cameras and their world-space corners
//! - Shadow camera placement for one split

use glam::Vec3;
use thiserror::Error;

use crate::scene::camera::Camera;
use crate::scene::light::{Light, LightKind};
use crate::scene::shadow::ShadowPart;

/// Default blend between uniform (0) and logarithmic (1) splits.
pub const DEFAULT_SPLIT_LAMBDA: f32 = 0.6;

/// Field of view of a shadow camera before it is zoomed onto its split.
pub const SHADOW_CAMERA_FOV: f32 = 45.0;
pub const SHADOW_CAMERA_NEAR: f32 = 1.8;
pub const SHADOW_CAMERA_FAR: f32 = 50.0;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowCameraError {
    #[error("Shadow camera placement is not supported for {0} lights")]
    Unsupported(&'static str),
}

// ============================================================================
// Split Distances
// ============================================================================

/// Computes `splits + 1` view-space distances from `near` to `far`.
///
/// Inner boundaries blend a logarithmic and a uniform distribution by
/// `lambda`. The first entry is exactly `near` and the last exactly `far`.
/// Returns an empty list for zero splits.
#[must_use]
pub fn calculate_split_distances(splits: usize, near: f32, far: f32, lambda: f32) -> Vec<f32> {
    if splits == 0 {
        return Vec::new();
    }
    let ratio = far / near;
    let mut distances: Vec<f32> = (0..=splits)
        .map(|i| {
            let p = i as f32 / splits as f32;
            let log = near * ratio.powf(p);
            let uniform = near + (far - near) * p;
            lambda * log + (1.0 - lambda) * uniform
        })
        .collect();

    distances[0] = near;
    distances[splits] = far;
    distances
}

// ============================================================================
// Split Frusta
// ============================================================================

/// A fresh camera matching `camera` but covering `[near, far]` only.
#[must_use]
pub fn split_camera(camera: &Camera, near: f32, far: f32) -> Camera {
    let mut split = camera.duplicate();
    split.name = format!("{}[{near:.1}..{far:.1}]", camera.name);
    split.set_frustum_near_far(near, far);
    split
}

/// World-space corners of `camera`'s frustum: near face then far face,
/// each counter-clockwise from bottom-left.
#[must_use]
pub fn frustum_corners(camera: &Camera) -> [Vec3; 8] {
    let (left, right, bottom, top) = camera.frustum_extents();
    let near = camera.near();
    let far = camera.far();
    let scale = far / near;
    let transform = camera.world_transform();

    let corners_view = [
        Vec3::new(left, bottom, -near),
        Vec3::new(right, bottom, -near),
        Vec3::new(right, top, -near),
        Vec3::new(left, top, -near),
        Vec3::new(left * scale, bottom * scale, -far),
        Vec3::new(right * scale, bottom * scale, -far),
        Vec3::new(right * scale, top * scale, -far),
        Vec3::new(left * scale, top * scale, -far),
    ];
    corners_view.map(|c| transform.transform_point3(c))
}

#[must_use]
pub fn corners_center(corners: &[Vec3; 8]) -> Vec3 {
    corners.iter().copied().sum::<Vec3>() / 8.0
}

// ============================================================================
// Shadow Camera Placement
// ============================================================================

/// Fails for light kinds whose shadow camera cannot be placed yet.
pub fn check_shadow_camera_support(light: &Light) -> Result<(), ShadowCameraError> {
    match light.kind {
        LightKind::Directional => Ok(()),
        LightKind::Point => Err(ShadowCameraError::Unsupported("point")),
        LightKind::Spot(_) => Err(ShadowCameraError::Unsupported("spot")),
    }
}

/// Places `part`'s camera so it covers `corners` as seen from `light`,
/// whose world translation is `light_translation`.
///
/// Directional lights only: the camera sits at the corner center offset by
/// the light's translation, looks back at the center with +Y up and is then
/// zoomed around the corners. The part's matrices are synced afterwards.
pub fn place_shadow_camera(
    part: &mut ShadowPart,
    light: &Light,
    light_translation: Vec3,
    corners: &[Vec3; 8],
) -> Result<(), ShadowCameraError> {
    check_shadow_camera_support(light)?;

    let center = corners_center(corners);
    let camera = &mut part.camera;
    camera.set_location(center + light_translation);
    camera.look_at(center, Vec3::Y);
    camera.set_frustum_perspective(SHADOW_CAMERA_FOV, 1.0, SHADOW_CAMERA_NEAR, SHADOW_CAMERA_FAR);
    camera.zoom_to_points(corners);
    part.sync_matrices();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::light::Attenuation;

    #[test]
    fn splits_blend_and_stay_ordered() {
        let d = calculate_split_distances(3, 1.0, 100.0, DEFAULT_SPLIT_LAMBDA);
        assert_eq!(d.len(), 4);
        assert!(d.windows(2).all(|w| w[0] < w[1]));
        // Blend at 1/3: 0.6·(100^(1/3)) + 0.4·34.0
        let expected = 0.6 * 100f32.powf(1.0 / 3.0) + 0.4 * 34.0;
        assert!((d[1] - expected).abs() < 1e-3);
    }

    #[test]
    fn zero_splits_is_empty() {
        assert!(calculate_split_distances(0, 1.0, 10.0, 0.5).is_empty());
    }

    #[test]
    fn corners_cover_the_slice() {
        let camera = Camera::new_perspective(90.0, 1.0, 1.0, 10.0);
        let corners = frustum_corners(&camera);
        assert!((corners[0].z + 1.0).abs() < 1e-5);
        assert!((corners[6].z + 10.0).abs() < 1e-4);
        // 90° vertical fov: half height equals depth.
        assert!((corners[6].y - 10.0).abs() < 1e-3);
    }

    #[test]
    fn split_camera_gets_a_new_identity() {
        let camera = Camera::new_perspective(45.0, 1.0, 1.0, 100.0);
        let split = split_camera(&camera, 5.0, 20.0);
        assert_ne!(split.id(), camera.id());
        assert!((split.near() - 5.0).abs() < 1e-6);
        assert!((split.far() - 20.0).abs() < 1e-6);
    }

    #[test]
    fn only_directional_lights_place_cameras() {
        let camera = Camera::new_perspective(45.0, 1.0, 1.0, 20.0);
        let corners = frustum_corners(&camera);
        let mut part = ShadowPart::new(512);

        let point = Light::new_point(Vec3::ONE, 1.0, Attenuation::new(1.0, 0.1, 0.0));
        assert_eq!(
            place_shadow_camera(&mut part, &point, Vec3::ZERO, &corners),
            Err(ShadowCameraError::Unsupported("point"))
        );

        let sun = Light::new_directional(Vec3::ONE, 1.0);
        place_shadow_camera(&mut part, &sun, Vec3::new(0.0, 30.0, 0.0), &corners).unwrap();
        let center = corners_center(&corners);
        assert!((part.camera.location() - (center + Vec3::new(0.0, 30.0, 0.0))).length() < 1e-4);
        assert!(part.camera.direction().y < -0.99);
        assert_eq!(part.light_space, part.camera.view_projection_matrix());
    }
}
