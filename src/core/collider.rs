//! Collider Algebra
//!
//! A closed set of shapes plus the pairwise dispatch for `intersects`.
//! Every pair is handled in one place so the test is symmetric by
//! construction: `a.intersects(&b) == b.intersects(&a)`.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::disk::Disk;
use super::obb::Obb;
use super::ray::Ray;
use super::sphere::Sphere;

/// One tick's worth of geometry for an ability instance.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Collider {
    /// Axis-aligned box
    Aabb(Aabb),
    /// Oriented box
    Obb(Obb),
    /// Sphere
    Sphere(Sphere),
    /// Finite ray
    Ray(Ray),
    /// Disk (OBB ∩ Sphere)
    Disk(Disk),
}

impl Collider {
    /// Short shape name for logging.
    pub fn shape_name(&self) -> &'static str {
        match self {
            Collider::Aabb(_) => "aabb",
            Collider::Obb(_) => "obb",
            Collider::Sphere(_) => "sphere",
            Collider::Ray(_) => "ray",
            Collider::Disk(_) => "disk",
        }
    }

    /// Narrow-phase overlap test.
    ///
    /// Ray-vs-ray is never needed by any power and always returns false.
    pub fn intersects(&self, other: &Collider) -> bool {
        use Collider as C;

        match (self, other) {
            (C::Disk(d), o) | (o, C::Disk(d)) => {
                C::Obb(d.obb).intersects(o) && C::Sphere(d.sphere).intersects(o)
            }

            (C::Aabb(a), C::Aabb(b)) => a.intersects(b),
            (C::Sphere(a), C::Sphere(b)) => a.intersects_sphere(b),
            (C::Obb(a), C::Obb(b)) => a.intersects(b),
            (C::Ray(_), C::Ray(_)) => false,

            (C::Sphere(s), C::Aabb(b)) | (C::Aabb(b), C::Sphere(s)) => s.intersects_aabb(b),
            (C::Sphere(s), C::Obb(b)) | (C::Obb(b), C::Sphere(s)) => s.intersects_obb(b),
            (C::Obb(o), C::Aabb(b)) | (C::Aabb(b), C::Obb(o)) => o.intersects_aabb(b),

            (C::Ray(r), C::Aabb(b)) | (C::Aabb(b), C::Ray(r)) => r.intersects_aabb(b),
            (C::Ray(r), C::Sphere(s)) | (C::Sphere(s), C::Ray(r)) => r.intersects_sphere(s),
            (C::Ray(r), C::Obb(o)) | (C::Obb(o), C::Ray(r)) => r.intersects_obb(o),
        }
    }

    /// Center of the shape.
    pub fn position(&self) -> DVec3 {
        match self {
            Collider::Aabb(a) => a.position(),
            Collider::Obb(o) => o.position(),
            Collider::Sphere(s) => s.center,
            Collider::Ray(r) => r.position(),
            Collider::Disk(d) => d.position(),
        }
    }

    /// Half extents of the enclosing world-space box.
    pub fn half_extents(&self) -> DVec3 {
        match self {
            Collider::Aabb(a) => a.half_extents(),
            Collider::Obb(o) => o.half_extents(),
            Collider::Sphere(s) => DVec3::splat(s.radius()),
            Collider::Ray(r) => r.half_extents(),
            Collider::Disk(d) => d.half_extents(),
        }
    }

    /// Enclosing world-space box.
    pub fn bounds(&self) -> Aabb {
        Aabb::from_center(self.position(), self.half_extents())
    }

    /// Same shape moved to `position` (rays move their origin).
    pub fn at(&self, position: DVec3) -> Collider {
        match self {
            Collider::Aabb(a) => Collider::Aabb(a.at(position)),
            Collider::Obb(o) => Collider::Obb(o.at(position)),
            Collider::Sphere(s) => Collider::Sphere(s.at(position)),
            Collider::Ray(r) => Collider::Ray(r.at(position)),
            Collider::Disk(d) => Collider::Disk(d.at(position)),
        }
    }

    /// Check if the point lies inside the shape.
    pub fn contains(&self, point: DVec3) -> bool {
        match self {
            Collider::Aabb(a) => a.contains(point),
            Collider::Obb(o) => o.contains(point),
            Collider::Sphere(s) => s.contains(point),
            Collider::Ray(r) => r.contains(point),
            Collider::Disk(d) => d.contains(point),
        }
    }
}

impl From<Aabb> for Collider {
    fn from(value: Aabb) -> Self {
        Collider::Aabb(value)
    }
}

impl From<Obb> for Collider {
    fn from(value: Obb) -> Self {
        Collider::Obb(value)
    }
}

impl From<Sphere> for Collider {
    fn from(value: Sphere) -> Self {
        Collider::Sphere(value)
    }
}

impl From<Ray> for Collider {
    fn from(value: Ray) -> Self {
        Collider::Ray(value)
    }
}

impl From<Disk> for Collider {
    fn from(value: Disk) -> Self {
        Collider::Disk(value)
    }
}
