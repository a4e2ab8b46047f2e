//! Disk collider: the intersection of a thin OBB and a sphere.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use super::obb::Obb;
use super::sphere::Sphere;

/// A flat disk approximated as `obb ∩ sphere`.
///
/// Anything that hits a disk must hit both parts.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Disk {
    /// Thin slab giving the disk its orientation and thickness
    pub obb: Obb,
    /// Sphere giving the disk its round outline
    pub sphere: Sphere,
}

impl Disk {
    /// Combine an OBB and a sphere; both are re-centered on the OBB.
    pub fn new(obb: Obb, sphere: Sphere) -> Self {
        Self {
            sphere: sphere.at(obb.position()),
            obb,
        }
    }

    /// Center of the disk.
    #[inline]
    pub fn position(&self) -> DVec3 {
        self.obb.position()
    }

    /// Half extents of the enclosing box.
    pub fn half_extents(&self) -> DVec3 {
        self.obb.half_extents().min(DVec3::splat(self.sphere.radius()))
    }

    /// Same disk moved to `position`.
    pub fn at(&self, position: DVec3) -> Self {
        Self {
            obb: self.obb.at(position),
            sphere: self.sphere.at(position),
        }
    }

    /// Check if the point lies inside both parts.
    pub fn contains(&self, point: DVec3) -> bool {
        self.obb.contains(point) && self.sphere.contains(point)
    }
}
