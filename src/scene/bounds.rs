//! Bounding volumes and planes used by culling and light ranking.

use glam::{Affine3A, Vec3};

/// Which side of a plane a volume lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaneSide {
    Positive,
    Negative,
    Both,
}

/// An infinite plane `normal · p = constant`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Plane {
    pub normal: Vec3,
    pub constant: f32,
}

impl Plane {
    /// Plane through `origin` facing `normal` (normalized internally).
    #[must_use]
    pub fn from_origin_normal(origin: Vec3, normal: Vec3) -> Self {
        let normal = normal.normalize_or_zero();
        Self {
            normal,
            constant: normal.dot(origin),
        }
    }

    #[inline]
    #[must_use]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        self.normal.dot(point) - self.constant
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Vec3,
    pub max: Vec3,
}

impl Default for BoundingBox {
    fn default() -> Self {
        Self::empty()
    }
}

impl BoundingBox {
    #[must_use]
    pub const fn empty() -> Self {
        Self {
            min: Vec3::splat(f32::INFINITY),
            max: Vec3::splat(f32::NEG_INFINITY),
        }
    }

    #[must_use]
    pub fn from_center_half_extent(center: Vec3, half_extent: Vec3) -> Self {
        Self {
            min: center - half_extent,
            max: center + half_extent,
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.min.x > self.max.x || self.min.y > self.max.y || self.min.z > self.max.z
    }

    #[must_use]
    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }

    #[must_use]
    pub fn half_extent(&self) -> Vec3 {
        (self.max - self.min) * 0.5
    }

    #[must_use]
    pub fn union(&self, other: &BoundingBox) -> BoundingBox {
        BoundingBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    #[must_use]
    pub fn intersects(&self, other: &BoundingBox) -> bool {
        if self.is_empty() || other.is_empty() {
            return false;
        }
        self.min.cmple(other.max).all() && other.min.cmple(self.max).all()
    }

    /// Classifies the box against a plane.
    #[must_use]
    pub fn which_side(&self, plane: &Plane) -> PlaneSide {
        let radius = self.half_extent().dot(plane.normal.abs());
        let distance = plane.signed_distance(self.center());
        if distance < -radius {
            PlaneSide::Negative
        } else if distance > radius {
            PlaneSide::Positive
        } else {
            PlaneSide::Both
        }
    }

    #[must_use]
    pub fn corners(&self) -> [Vec3; 8] {
        [
            Vec3::new(self.min.x, self.min.y, self.min.z),
            Vec3::new(self.min.x, self.min.y, self.max.z),
            Vec3::new(self.min.x, self.max.y, self.min.z),
            Vec3::new(self.min.x, self.max.y, self.max.z),
            Vec3::new(self.max.x, self.min.y, self.min.z),
            Vec3::new(self.max.x, self.min.y, self.max.z),
            Vec3::new(self.max.x, self.max.y, self.min.z),
            Vec3::new(self.max.x, self.max.y, self.max.z),
        ]
    }

    /// Bounds of the box after an affine transform.
    #[must_use]
    pub fn transform(&self, matrix: &Affine3A) -> Self {
        if self.is_empty() {
            return *self;
        }
        let mut new_min = Vec3::splat(f32::INFINITY);
        let mut new_max = Vec3::splat(f32::NEG_INFINITY);
        for point in self.corners() {
            let transformed = matrix.transform_point3(point);
            new_min = new_min.min(transformed);
            new_max = new_max.max(transformed);
        }
        Self {
            min: new_min,
            max: new_max,
        }
    }
}
