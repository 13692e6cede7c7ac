/*!
Core types and math aliases shared by the movement modules.

This module intentionally contains no algorithms. It defines the data exchanged between:
- the shape query provider (casts, overlaps, penetration, rays)
- the bounce resolver (collide-and-slide)
- the grounded-state evaluator
- the moving-ground tracker and the per-tick motor
*/

use nalgebra as na;
use serde::Deserialize;

/// Common math aliases for clarity and consistency.
pub type Vec3 = na::Vector3<f32>;
pub type Quat = na::UnitQuaternion<f32>;
pub type Iso = na::Isometry3<f32>;

/// A rigid transform (isometry) in world space.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Transform {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Transform {
    #[inline]
    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    #[inline]
    pub fn from_translation(translation: Vec3) -> Self {
        Self::new(translation, Quat::identity())
    }

    /// Convert to nalgebra `Isometry3` for use with parry/rapier queries.
    #[inline]
    pub fn iso(&self) -> Iso {
        Iso::from_parts(na::Translation3::from(self.translation), self.rotation)
    }

    /// Transform a point from this frame's local space into world space.
    #[inline]
    pub fn transform_point(&self, local: &Vec3) -> Vec3 {
        self.translation + self.rotation * local
    }

    /// Transform a world-space point into this frame's local space.
    #[inline]
    pub fn inverse_transform_point(&self, world: &Vec3) -> Vec3 {
        self.rotation.inverse() * (world - self.translation)
    }
}

impl From<Iso> for Transform {
    fn from(iso: Iso) -> Self {
        Self::new(iso.translation.vector, iso.rotation)
    }
}

/// Capsule dimensions of a kinematic agent.
///
/// half_height is the half-length of the cylinder section (aligned with the local +Y axis),
/// so the total capsule height is 2*half_height + 2*radius.
#[derive(Clone, Copy, Debug, PartialEq, Deserialize)]
pub struct CapsuleSpec {
    pub radius: f32,
    pub half_height: f32,
}

impl CapsuleSpec {
    /// Distance from the capsule center to its lowest point along its own axis.
    #[inline]
    pub fn foot_offset(&self) -> f32 {
        self.half_height + self.radius
    }
}

impl Default for CapsuleSpec {
    fn default() -> Self {
        Self {
            radius: 0.5,
            half_height: 0.5,
        }
    }
}

/// A single result of casting the agent's shape through the scene.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ShapeHit<C> {
    /// Distance travelled along the cast direction before contact (meters).
    pub distance: f32,
    /// World-space contact point.
    pub point: Vec3,
    /// World-space surface normal at the contact, facing the agent.
    ///
    /// Providers may report a zero vector when no normal can be computed.
    pub normal: Vec3,
    /// The collider that was hit.
    pub collider: C,
}

/// A single result of a ray cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit<C> {
    pub distance: f32,
    pub point: Vec3,
    pub normal: Vec3,
    pub collider: C,
}

/// How far and in which direction the agent must move to stop overlapping a collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Penetration {
    /// Unit push-out direction for the agent.
    pub direction: Vec3,
    /// Penetration depth (meters, positive when overlapping).
    pub distance: f32,
}

impl Penetration {
    /// A penetration is usable when its direction is finite and non-zero and its depth positive.
    pub fn is_degenerate(&self) -> bool {
        !self.distance.is_finite()
            || self.distance <= 0.0
            || !self.direction.iter().all(|c| c.is_finite())
            || self.direction.norm_squared() <= 1.0e-12
    }
}

/// Normalize `v`, returning zero for vectors too short to carry a direction.
#[inline]
pub fn normalize_or_zero(v: &Vec3) -> Vec3 {
    let len_sq = v.norm_squared();
    if len_sq > 1.0e-12 {
        v / len_sq.sqrt()
    } else {
        Vec3::zeros()
    }
}

/// Remove the component of `v` along `normal` (`normal` is expected to be unit or zero).
#[inline]
pub fn project_on_plane(v: &Vec3, normal: &Vec3) -> Vec3 {
    v - normal * v.dot(normal)
}

/// Angle in degrees between two vectors; zero when either is degenerate.
#[inline]
pub fn angle_deg(a: &Vec3, b: &Vec3) -> f32 {
    let a = normalize_or_zero(a);
    let b = normalize_or_zero(b);
    if a == Vec3::zeros() || b == Vec3::zeros() {
        return 0.0;
    }
    a.dot(&b).clamp(-1.0, 1.0).acos().to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn transform_round_trips_points_through_local_space() {
        let t = Transform::new(
            Vec3::new(1.0, 2.0, 3.0),
            Quat::from_axis_angle(&Vec3::y_axis(), 0.7),
        );
        let world = Vec3::new(-4.0, 0.5, 9.0);
        let local = t.inverse_transform_point(&world);
        assert_relative_eq!(t.transform_point(&local), world, epsilon = 1.0e-5);
    }

    #[test]
    fn angle_between_up_and_tilted_normal() {
        let up = Vec3::y();
        assert_relative_eq!(angle_deg(&up, &up), 0.0, epsilon = 1.0e-3);
        assert_relative_eq!(angle_deg(&up, &Vec3::x()), 90.0, epsilon = 1.0e-3);
        assert_eq!(angle_deg(&up, &Vec3::zeros()), 0.0);
    }

    #[test]
    fn degenerate_penetrations_are_flagged() {
        let ok = Penetration {
            direction: Vec3::y(),
            distance: 0.1,
        };
        assert!(!ok.is_degenerate());
        assert!(
            Penetration {
                direction: Vec3::zeros(),
                ..ok
            }
            .is_degenerate()
        );
        assert!(
            Penetration {
                distance: f32::NAN,
                ..ok
            }
            .is_degenerate()
        );
        assert!(
            Penetration {
                distance: 0.0,
                ..ok
            }
            .is_degenerate()
        );
    }
}
