//! Sphere collider.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::obb::Obb;

/// Radius used when a caller asks for a non-positive one.
pub const MIN_RADIUS: f64 = 1e-6;

/// Sphere given by center and radius.
///
/// The radius is always strictly positive.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawSphere")]
pub struct Sphere {
    /// Center point
    pub center: DVec3,
    radius: f64,
}

#[derive(Deserialize)]
struct RawSphere {
    center: DVec3,
    radius: f64,
}

impl From<RawSphere> for Sphere {
    fn from(raw: RawSphere) -> Self {
        Self::new(raw.center, raw.radius)
    }
}

impl Sphere {
    /// Create a sphere. Non-positive or NaN radii are clamped to [`MIN_RADIUS`].
    #[inline]
    pub fn new(center: DVec3, radius: f64) -> Self {
        let radius = if radius > MIN_RADIUS { radius } else { MIN_RADIUS };
        Self { center, radius }
    }

    /// Sphere at the origin.
    #[inline]
    pub fn with_radius(radius: f64) -> Self {
        Self::new(DVec3::ZERO, radius)
    }

    /// Radius of the sphere.
    #[inline]
    pub fn radius(&self) -> f64 {
        self.radius
    }

    /// Same sphere moved to `position`.
    #[inline]
    pub fn at(&self, position: DVec3) -> Self {
        Self {
            center: position,
            radius: self.radius,
        }
    }

    /// Check overlap with another sphere.
    #[inline]
    pub fn intersects_sphere(&self, other: &Sphere) -> bool {
        let r = self.radius + other.radius;
        self.center.distance_squared(other.center) <= r * r
    }

    /// Clamp the center into the box and compare against radius².
    #[inline]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        aabb.distance_squared(self.center) <= self.radius * self.radius
    }

    /// Same idea as the box test, using the OBB's closest point.
    #[inline]
    pub fn intersects_obb(&self, obb: &Obb) -> bool {
        obb.closest_point(self.center).distance_squared(self.center) <= self.radius * self.radius
    }

    /// Check if the point lies on or inside the sphere.
    #[inline]
    pub fn contains(&self, point: DVec3) -> bool {
        self.center.distance_squared(point) <= self.radius * self.radius
    }
}
