//! Axis-Aligned Bounding Box
//!
//! The workhorse collider. Corners are sorted on construction so every
//! other test can assume `min <= max` on each axis.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// Axis-aligned box given by its two extreme corners.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawAabb")]
pub struct Aabb {
    /// Minimum corner
    pub min: DVec3,
    /// Maximum corner
    pub max: DVec3,
}

#[derive(Deserialize)]
struct RawAabb {
    min: DVec3,
    max: DVec3,
}

impl From<RawAabb> for Aabb {
    fn from(raw: RawAabb) -> Self {
        Self::new(raw.min, raw.max)
    }
}

impl Aabb {
    /// Degenerate box at the origin.
    pub const DUMMY: Self = Self {
        min: DVec3::ZERO,
        max: DVec3::ZERO,
    };

    /// Create a box from any two opposite corners.
    #[inline]
    pub fn new(a: DVec3, b: DVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Create a box from its center and (absolute) half extents.
    #[inline]
    pub fn from_center(center: DVec3, half_extents: DVec3) -> Self {
        let e = half_extents.abs();
        Self {
            min: center - e,
            max: center + e,
        }
    }

    /// Center of the box.
    #[inline]
    pub fn position(&self) -> DVec3 {
        (self.min + self.max) * 0.5
    }

    /// Half extents along each axis.
    #[inline]
    pub fn half_extents(&self) -> DVec3 {
        (self.max - self.min) * 0.5
    }

    /// Same box translated so its center is at `position`.
    #[inline]
    pub fn at(&self, position: DVec3) -> Self {
        let e = self.half_extents();
        Self {
            min: position - e,
            max: position + e,
        }
    }

    /// Box grown by `amount` on every side.
    pub fn grow(&self, amount: DVec3) -> Self {
        Self::new(self.min - amount, self.max + amount)
    }

    /// Closed-interval overlap on all three axes (touching counts).
    #[inline]
    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Point nearest to `point` that lies on or inside the box.
    #[inline]
    pub fn closest_point(&self, point: DVec3) -> DVec3 {
        point.clamp(self.min, self.max)
    }

    /// Squared distance from `point` to the box (zero when inside).
    #[inline]
    pub fn distance_squared(&self, point: DVec3) -> f64 {
        self.closest_point(point).distance_squared(point)
    }

    /// Check if the point lies on or inside the box.
    #[inline]
    pub fn contains(&self, point: DVec3) -> bool {
        point.cmpge(self.min).all() && point.cmple(self.max).all()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_corners_sorted() {
        let aabb = Aabb::new(DVec3::new(1.0, -1.0, 3.0), DVec3::new(-1.0, 2.0, 0.0));
        assert_eq!(aabb.min, DVec3::new(-1.0, -1.0, 0.0));
        assert_eq!(aabb.max, DVec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn test_deserialize_sorts_corners() {
        let aabb: Aabb = serde_json::from_str(r#"{"min":[1.0,1.0,1.0],"max":[-1.0,0.0,2.0]}"#).unwrap();
        assert_eq!(aabb.min, DVec3::new(-1.0, 0.0, 1.0));
        assert_eq!(aabb.max, DVec3::new(1.0, 1.0, 2.0));
    }

    #[test]
    fn test_at_keeps_extents() {
        let aabb = Aabb::new(DVec3::splat(-1.0), DVec3::splat(1.0));
        let moved = aabb.at(DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(moved.position(), DVec3::new(10.0, 0.0, 0.0));
        assert_eq!(moved.half_extents(), aabb.half_extents());
    }

    #[test]
    fn test_aabb_overlap() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        let touching = Aabb::new(DVec3::new(1.0, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));
        let apart = Aabb::new(DVec3::new(1.5, 0.0, 0.0), DVec3::new(2.0, 1.0, 1.0));

        assert!(a.intersects(&touching));
        assert!(touching.intersects(&a));
        assert!(!a.intersects(&apart));
    }

    #[test]
    fn test_contains_and_distance() {
        let a = Aabb::new(DVec3::ZERO, DVec3::ONE);
        assert!(a.contains(DVec3::splat(0.5)));
        assert!(a.contains(DVec3::ONE));
        assert!(!a.contains(DVec3::new(1.1, 0.5, 0.5)));
        assert_eq!(a.distance_squared(DVec3::new(3.0, 0.5, 0.5)), 4.0);
    }
}
