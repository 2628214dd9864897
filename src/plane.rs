//! Static collision planes bounding the swarm.

use crate::Vec3;

/// An infinite plane `dot(normal, x) + offset == 0`.
///
/// The normal is unit length and points into the box.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CollisionPlane {
    pub normal: Vec3,
    pub offset: f32,
}

impl CollisionPlane {
    /// Plane with the given unit `normal` passing through `point`.
    pub fn through(normal: Vec3, point: Vec3) -> Self {
        Self {
            normal,
            offset: -normal.dot(point),
        }
    }

    /// Signed distance from `point` to the plane, positive on the inside.
    #[inline]
    pub fn signed_distance(&self, point: Vec3) -> f32 {
        point.dot(self.normal) + self.offset
    }

    /// Penetration of a sphere of `radius` centred at `center`.
    ///
    /// Negative when the sphere crosses the plane.
    #[inline]
    pub fn penetration(&self, center: Vec3, radius: f32) -> f32 {
        self.signed_distance(center) - radius
    }
}

/// The four vertical walls of a box spanning `±half_extent` in X and Z.
///
/// There is no floor or ceiling: buoyancy holds particles up.
pub fn box_planes(half_extent: f32) -> [CollisionPlane; 4] {
    [
        CollisionPlane::through(Vec3::Z, Vec3::new(0.0, 0.0, -half_extent)),
        CollisionPlane::through(Vec3::NEG_Z, Vec3::new(0.0, 0.0, half_extent)),
        CollisionPlane::through(Vec3::NEG_X, Vec3::new(half_extent, 0.0, 0.0)),
        CollisionPlane::through(Vec3::X, Vec3::new(-half_extent, 0.0, 0.0)),
    ]
}
