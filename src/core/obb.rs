//! Oriented Bounding Box
//!
//! Box with an arbitrary orthonormal basis. Tests against other shapes are
//! done in the OBB's local frame, where it degenerates into an AABB.

use glam::{DQuat, DVec3};
use serde::{Deserialize, Serialize};

use super::aabb::Aabb;

/// Slack added to the rotation terms of the separating-axis test so that
/// near-parallel edges don't produce a zero cross product.
const SAT_EPSILON: f64 = 1e-6;

/// Squared distance under which a point counts as contained.
const CONTAINS_EPSILON: f64 = 1e-3;

/// Oriented box given by center, basis axes and local half extents.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Obb {
    center: DVec3,
    /// Local X, Y, Z axes expressed in world space (orthonormal)
    axes: [DVec3; 3],
    /// Half extents along the local axes
    extents: DVec3,
}

impl Obb {
    /// Box with identity rotation covering the given AABB.
    pub fn from_aabb(aabb: &Aabb) -> Self {
        Self {
            center: aabb.position(),
            axes: [DVec3::X, DVec3::Y, DVec3::Z],
            extents: aabb.half_extents(),
        }
    }

    /// Rotate an AABB about the origin.
    ///
    /// The center of the box is rotated too, so callers usually build the box
    /// around the origin and move it afterwards with [`Obb::at`] or
    /// [`Obb::add_position`].
    pub fn rotated(aabb: &Aabb, rotation: DQuat) -> Self {
        let rotation = rotation.normalize();
        Self {
            center: rotation * aabb.position(),
            axes: [rotation * DVec3::X, rotation * DVec3::Y, rotation * DVec3::Z],
            extents: aabb.half_extents(),
        }
    }

    /// Box centered at `center` with local half extents and orientation.
    pub fn new(center: DVec3, half_extents: DVec3, rotation: DQuat) -> Self {
        let rotation = rotation.normalize();
        Self {
            center,
            axes: [rotation * DVec3::X, rotation * DVec3::Y, rotation * DVec3::Z],
            extents: half_extents.abs(),
        }
    }

    /// Center of the box.
    #[inline]
    pub fn position(&self) -> DVec3 {
        self.center
    }

    /// Local axes in world space.
    #[inline]
    pub fn axes(&self) -> &[DVec3; 3] {
        &self.axes
    }

    /// Half extents along the local axes.
    #[inline]
    pub fn local_extents(&self) -> DVec3 {
        self.extents
    }

    /// Half extents of the world-space AABB enclosing this box.
    pub fn half_extents(&self) -> DVec3 {
        self.axes[0].abs() * self.extents.x
            + self.axes[1].abs() * self.extents.y
            + self.axes[2].abs() * self.extents.z
    }

    /// Same box moved to `position`.
    #[inline]
    pub fn at(&self, position: DVec3) -> Self {
        Self {
            center: position,
            ..*self
        }
    }

    /// Same box translated by `offset`.
    #[inline]
    pub fn add_position(&self, offset: DVec3) -> Self {
        Self {
            center: self.center + offset,
            ..*self
        }
    }

    /// Express a world-space direction in the local frame.
    #[inline]
    pub fn to_local_direction(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.axes[0]), v.dot(self.axes[1]), v.dot(self.axes[2]))
    }

    /// Express a world-space point in the local frame (center at origin).
    #[inline]
    pub fn to_local_point(&self, p: DVec3) -> DVec3 {
        self.to_local_direction(p - self.center)
    }

    /// The box in its own local frame.
    #[inline]
    pub fn local_aabb(&self) -> Aabb {
        Aabb::from_center(DVec3::ZERO, self.extents)
    }

    /// Point nearest to `target` that lies on or inside the box.
    pub fn closest_point(&self, target: DVec3) -> DVec3 {
        let t = target - self.center;
        let mut closest = self.center;
        for i in 0..3 {
            let r = self.extents[i];
            let dist = t.dot(self.axes[i]).clamp(-r, r);
            closest += self.axes[i] * dist;
        }
        closest
    }

    /// Check if the point lies on or inside the box.
    pub fn contains(&self, point: DVec3) -> bool {
        self.closest_point(point).distance_squared(point) <= CONTAINS_EPSILON
    }

    /// Overlap with an AABB (treated as an unrotated OBB).
    #[inline]
    pub fn intersects_aabb(&self, aabb: &Aabb) -> bool {
        self.intersects(&Obb::from_aabb(aabb))
    }

    /// Separating-axis test over the 15 candidate axes.
    pub fn intersects(&self, other: &Obb) -> bool {
        let a = self.extents;
        let b = other.extents;

        // Rotation expressing `other` in this box's frame
        let mut r = [[0.0f64; 3]; 3];
        let mut abs_r = [[0.0f64; 3]; 3];
        for i in 0..3 {
            for j in 0..3 {
                r[i][j] = self.axes[i].dot(other.axes[j]);
                abs_r[i][j] = r[i][j].abs() + SAT_EPSILON;
            }
        }

        // Translation in this box's frame
        let t = self.to_local_point(other.center);

        // This box's face axes
        for i in 0..3 {
            let ra = a[i];
            let rb = b.x * abs_r[i][0] + b.y * abs_r[i][1] + b.z * abs_r[i][2];
            if t[i].abs() > ra + rb {
                return false;
            }
        }

        // Other box's face axes
        for j in 0..3 {
            let ra = a.x * abs_r[0][j] + a.y * abs_r[1][j] + a.z * abs_r[2][j];
            let rb = b[j];
            let proj = t.x * r[0][j] + t.y * r[1][j] + t.z * r[2][j];
            if proj.abs() > ra + rb {
                return false;
            }
        }

        // Edge-edge cross products A_i x B_j
        for i in 0..3 {
            let i1 = (i + 1) % 3;
            let i2 = (i + 2) % 3;
            for j in 0..3 {
                let j1 = (j + 1) % 3;
                let j2 = (j + 2) % 3;
                let ra = a[i1] * abs_r[i2][j] + a[i2] * abs_r[i1][j];
                let rb = b[j1] * abs_r[i][j2] + b[j2] * abs_r[i][j1];
                let proj = t[i2] * r[i1][j] - t[i1] * r[i2][j];
                if proj.abs() > ra + rb {
                    return false;
                }
            }
        }

        true
    }
}
