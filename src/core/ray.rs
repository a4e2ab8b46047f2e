//! Ray collider
//!
//! A ray is a finite segment: it starts at `origin` and ends at
//! `origin + direction`, so the direction's length is the ray's range.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::obb::Obb;
use super::sphere::Sphere;

/// Direction components smaller than this are treated as zero by the slab test.
const PARALLEL_EPSILON: f64 = 1e-9;

/// Finite ray (segment).
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Ray {
    /// Start point
    pub origin: DVec3,
    /// Offset from start to end point
    pub direction: DVec3,
}

impl Ray {
    /// Create a ray from origin and direction (length = range).
    #[inline]
    pub const fn new(origin: DVec3, direction: DVec3) -> Self {
        Self { origin, direction }
    }

    /// Create a ray along `direction` (normalized here) covering `range`.
    pub fn with_range(origin: DVec3, direction: DVec3, range: f64) -> Self {
        Self {
            origin,
            direction: direction.normalize_or_zero() * range,
        }
    }

    /// End point of the segment.
    #[inline]
    pub fn end(&self) -> DVec3 {
        self.origin + self.direction
    }

    /// Midpoint of the segment.
    #[inline]
    pub fn position(&self) -> DVec3 {
        self.origin + self.direction * 0.5
    }

    /// Half extents of the segment's bounding box.
    #[inline]
    pub fn half_extents(&self) -> DVec3 {
        self.direction.abs() * 0.5
    }

    /// Same ray with its origin moved to `position`.
    #[inline]
    pub fn at(&self, position: DVec3) -> Self {
        Self {
            origin: position,
            direction: self.direction,
        }
    }

    /// Closest point on the segment to `point`.
    pub fn closest_point(&self, point: DVec3) -> DVec3 {
        let len_sq = self.direction.length_squared();
        if len_sq <= PARALLEL_EPSILON {
            return self.origin;
        }
        let t = ((point - self.origin).dot(self.direction) / len_sq).clamp(0.0, 1.0);
        self.origin + self.direction * t
    }

    /// Slab intersection against an AABB, restricted to the segment.
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        let mut t_min = 0.0f64;
        let mut t_max = 1.0f64;

        for i in 0..3 {
            let o = self.origin[i];
            let d = self.direction[i];

            if d.abs() < PARALLEL_EPSILON {
                // Parallel to this slab: the origin must already be inside it
                if o < aabb.min[i] || o > aabb.max[i] {
                    return false;
                }
                continue;
            }

            let inv = 1.0 / d;
            let mut t1 = (aabb.min[i] - o) * inv;
            let mut t2 = (aabb.max[i] - o) * inv;
            if t1 > t2 {
                std::mem::swap(&mut t1, &mut t2);
            }

            t_min = t_min.max(t1);
            t_max = t_max.min(t2);
            if t_min > t_max {
                return false;
            }
        }

        true
    }

    /// Move the ray into the OBB's local frame and run the slab test there.
    pub fn intersects_obb(&self, obb: &Obb) -> bool {
        let local = Ray {
            origin: obb.to_local_point(self.origin),
            direction: obb.to_local_direction(self.direction),
        };
        local.intersects_aabb(&obb.local_aabb())
    }

    /// Distance from the sphere center to the nearest point on the segment.
    #[inline]
    pub fn intersects_sphere(&self, sphere: &Sphere) -> bool {
        let r = sphere.radius();
        self.closest_point(sphere.center).distance_squared(sphere.center) <= r * r
    }

    /// Check if the point lies on the segment (within a small tolerance).
    pub fn contains(&self, point: DVec3) -> bool {
        self.closest_point(point).distance_squared(point) <= PARALLEL_EPSILON
    }
}
