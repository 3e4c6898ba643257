use std::sync::atomic::{AtomicU32, Ordering};

use glam::{Affine3A, Mat4, Quat, Vec3, Vec4};

use crate::scene::bounds::BoundingBox;

static NEXT_CAMERA_ID: AtomicU32 = AtomicU32::new(1);

/// Identity of a camera. Cloning a [`Camera`] keeps its id (a snapshot of
/// the same camera); [`Camera::duplicate`] creates a distinct camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CameraId(u32);

impl CameraId {
    fn next() -> Self {
        Self(NEXT_CAMERA_ID.fetch_add(1, Ordering::Relaxed))
    }
}

/// Perspective camera with an (optionally asymmetric) view frustum.
///
/// The frustum is described by its extents on the near plane, which lets
/// shadow cameras be zoomed tightly around a point set. Right-handed,
/// looking down local −Z, depth range `[0, 1]`.
#[derive(Debug, Clone)]
pub struct Camera {
    id: CameraId,
    pub name: String,

    location: Vec3,
    rotation: Quat,

    frustum_left: f32,
    frustum_right: f32,
    frustum_bottom: f32,
    frustum_top: f32,
    frustum_near: f32,
    frustum_far: f32,

    // derived
    view_matrix: Mat4,
    projection_matrix: Mat4,
    view_projection_matrix: Mat4,
    frustum: Frustum,
}

impl Camera {
    #[must_use]
    pub fn new_perspective(fov_y_degrees: f32, aspect: f32, near: f32, far: f32) -> Self {
        let mut cam = Self {
            id: CameraId::next(),
            name: "Camera".to_string(),
            location: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            frustum_left: -1.0,
            frustum_right: 1.0,
            frustum_bottom: -1.0,
            frustum_top: 1.0,
            frustum_near: 1.0,
            frustum_far: 2.0,
            view_matrix: Mat4::IDENTITY,
            projection_matrix: Mat4::IDENTITY,
            view_projection_matrix: Mat4::IDENTITY,
            frustum: Frustum::default(),
        };
        cam.set_frustum_perspective(fov_y_degrees, aspect, near, far);
        cam
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// A copy of this camera with a fresh identity.
    #[must_use]
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = CameraId::next();
        copy
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> CameraId {
        self.id
    }

    // === Frustum parameters ===

    pub fn set_frustum_perspective(&mut self, fov_y_degrees: f32, aspect: f32, near: f32, far: f32) {
        let h = (fov_y_degrees.to_radians() * 0.5).tan() * near;
        let w = h * aspect;
        self.frustum_left = -w;
        self.frustum_right = w;
        self.frustum_bottom = -h;
        self.frustum_top = h;
        self.frustum_near = near;
        self.frustum_far = far;
        self.update();
    }

    /// Moves the near and far planes while keeping the field of view.
    pub fn set_frustum_near_far(&mut self, near: f32, far: f32) {
        let scale = near / self.frustum_near;
        self.frustum_left *= scale;
        self.frustum_right *= scale;
        self.frustum_bottom *= scale;
        self.frustum_top *= scale;
        self.frustum_near = near;
        self.frustum_far = far;
        self.update();
    }

    /// Extents on the near plane: `(left, right, bottom, top)`.
    #[must_use]
    pub fn frustum_extents(&self) -> (f32, f32, f32, f32) {
        (
            self.frustum_left,
            self.frustum_right,
            self.frustum_bottom,
            self.frustum_top,
        )
    }

    #[inline]
    #[must_use]
    pub fn near(&self) -> f32 {
        self.frustum_near
    }

    #[inline]
    #[must_use]
    pub fn far(&self) -> f32 {
        self.frustum_far
    }

    /// Tightens the lateral frustum extents around `points` (world space),
    /// keeping near and far. Points at or behind the eye are ignored; if no
    /// point is in front the frustum is left unchanged.
    pub fn zoom_to_points(&mut self, points: &[Vec3]) {
        let view = self.view_matrix;
        let near = self.frustum_near;
        let mut min = glam::Vec2::splat(f32::INFINITY);
        let mut max = glam::Vec2::splat(f32::NEG_INFINITY);

        for p in points {
            let v = view.transform_point3(*p);
            let depth = -v.z;
            if depth <= f32::EPSILON {
                continue;
            }
            let projected = glam::Vec2::new(v.x, v.y) * (near / depth);
            min = min.min(projected);
            max = max.max(projected);
        }

        if !min.is_finite() || !max.is_finite() {
            return;
        }

        self.frustum_left = min.x;
        self.frustum_right = max.x;
        self.frustum_bottom = min.y;
        self.frustum_top = max.y;
        self.update();
    }

    // === Placement ===

    #[inline]
    #[must_use]
    pub fn location(&self) -> Vec3 {
        self.location
    }

    #[inline]
    #[must_use]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_location(&mut self, location: Vec3) {
        self.location = location;
        self.update();
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation.normalize();
        self.update();
    }

    /// Orients the camera so that −Z points at `target`.
    pub fn look_at(&mut self, target: Vec3, world_up: Vec3) {
        let forward = (target - self.location).normalize_or_zero();
        if forward == Vec3::ZERO {
            return;
        }
        let up = if forward.cross(world_up).length_squared() < 1e-8 {
            if forward.y.abs() > 0.99 { Vec3::X } else { Vec3::Y }
        } else {
            world_up
        };
        let view = Mat4::look_at_rh(self.location, target, up);
        let (_, rotation, _) = view.inverse().to_scale_rotation_translation();
        self.set_rotation(rotation);
    }

    #[must_use]
    pub fn direction(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    #[must_use]
    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }

    #[must_use]
    pub fn world_transform(&self) -> Affine3A {
        Affine3A::from_rotation_translation(self.rotation, self.location)
    }

    // === Derived matrices ===

    #[inline]
    #[must_use]
    pub fn view_matrix(&self) -> Mat4 {
        self.view_matrix
    }

    #[inline]
    #[must_use]
    pub fn projection_matrix(&self) -> Mat4 {
        self.projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn view_projection_matrix(&self) -> Mat4 {
        self.view_projection_matrix
    }

    #[inline]
    #[must_use]
    pub fn frustum(&self) -> &Frustum {
        &self.frustum
    }

    /// Returns `true` if `bound` is at least partially inside the frustum.
    #[must_use]
    pub fn contains(&self, bound: &BoundingBox) -> bool {
        self.frustum.intersects_box(bound)
    }

    fn update(&mut self) {
        self.view_matrix = Mat4::from(self.world_transform()).inverse();
        self.projection_matrix = off_center_perspective(
            self.frustum_left,
            self.frustum_right,
            self.frustum_bottom,
            self.frustum_top,
            self.frustum_near,
            self.frustum_far,
        );
        self.view_projection_matrix = self.projection_matrix * self.view_matrix;
        self.frustum = Frustum::from_matrix(self.view_projection_matrix);
    }
}

/// Right-handed off-center perspective projection with depth in `[0, 1]`.
///
/// Reduces to `Mat4::perspective_rh` for a symmetric frustum.
#[must_use]
pub fn off_center_perspective(l: f32, r: f32, b: f32, t: f32, n: f32, f: f32) -> Mat4 {
    let x = 2.0 * n / (r - l);
    let y = 2.0 * n / (t - b);
    let a = (r + l) / (r - l);
    let c = (t + b) / (t - b);
    let depth = f / (n - f);
    Mat4::from_cols(
        Vec4::new(x, 0.0, 0.0, 0.0),
        Vec4::new(0.0, y, 0.0, 0.0),
        Vec4::new(a, c, depth, -1.0),
        Vec4::new(0.0, 0.0, depth * n, 0.0),
    )
}

#[derive(Debug, Clone, Copy, Default)]
pub struct Frustum {
    planes: [Vec4; 6], // Left, Right, Bottom, Top, Near, Far
}

impl Frustum {
    /// Gribb-Hartmann plane extraction for a `[0, 1]` depth range.
    #[must_use]
    pub fn from_matrix(m: Mat4) -> Self {
        let rows = [m.row(0), m.row(1), m.row(2), m.row(3)];

        let mut planes = [
            rows[3] + rows[0],
            rows[3] - rows[0],
            rows[3] + rows[1],
            rows[3] - rows[1],
            rows[2],
            rows[3] - rows[2],
        ];

        for plane in &mut planes {
            let length = plane.truncate().length();
            if length > 0.0 {
                *plane /= length;
            }
        }

        Self { planes }
    }

    #[must_use]
    pub fn planes(&self) -> &[Vec4; 6] {
        &self.planes
    }

    /// Conservative box test: rejects only boxes fully outside one plane.
    #[must_use]
    pub fn intersects_box(&self, bound: &BoundingBox) -> bool {
        if bound.is_empty() {
            return false;
        }
        for plane in &self.planes {
            let normal = plane.truncate();
            let positive = Vec3::select(normal.cmpge(Vec3::ZERO), bound.max, bound.min);
            if normal.dot(positive) + plane.w < 0.0 {
                return false;
            }
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn symmetric_frustum_matches_glam() {
        let cam = Camera::new_perspective(60.0, 1.5, 0.5, 100.0);
        let expected = Mat4::perspective_rh(60f32.to_radians(), 1.5, 0.5, 100.0);
        assert!(cam.projection_matrix().abs_diff_eq(expected, 1e-4));
    }

    #[test]
    fn box_in_front_is_visible_box_behind_is_not() {
        let cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        let front = BoundingBox::from_center_half_extent(Vec3::new(0.0, 0.0, -10.0), Vec3::ONE);
        let behind = BoundingBox::from_center_half_extent(Vec3::new(0.0, 0.0, 10.0), Vec3::ONE);
        assert!(cam.contains(&front));
        assert!(!cam.contains(&behind));
    }

    #[test]
    fn near_far_change_keeps_fov() {
        let mut cam = Camera::new_perspective(90.0, 1.0, 1.0, 10.0);
        cam.set_frustum_near_far(2.0, 20.0);
        let (l, r, _, _) = cam.frustum_extents();
        assert!((r - 2.0).abs() < 1e-4);
        assert!((l + 2.0).abs() < 1e-4);
    }

    #[test]
    fn duplicate_gets_new_id() {
        let cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        assert_eq!(cam.clone().id(), cam.id());
        assert_ne!(cam.duplicate().id(), cam.id());
    }

    #[test]
    fn look_at_points_forward() {
        let mut cam = Camera::new_perspective(60.0, 1.0, 0.1, 100.0);
        cam.set_location(Vec3::new(0.0, 0.0, 10.0));
        cam.look_at(Vec3::ZERO, Vec3::Y);
        assert!((cam.direction() - Vec3::NEG_Z).length() < 1e-4);
    }
}
