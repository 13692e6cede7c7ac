//! Scene query seam between the movement algorithms and the collision world.
//!
//! The resolver, the grounded-state evaluator and the overlap push only ever talk to the
//! scene through [`ShapeQueryProvider`]. The Rapier-backed implementation lives in
//! [`crate::rapier_world`]; tests use small analytic fakes.

use crate::types::{Penetration, Quat, RayHit, ShapeHit, Vec3};

/// Shape, overlap and ray queries for one agent's shape against the scene.
///
/// Implementations must exclude the agent's own collider from every query. They must be
/// safe to call repeatedly within a tick; none of the core algorithms cache results.
pub trait ShapeQueryProvider {
    /// Identity of a collider in the scene (a handle, an index, ...).
    type Collider: Copy + PartialEq + std::fmt::Debug;

    /// Sweep the agent's shape from `position` along the unit `direction` for up to
    /// `max_distance` and return the earliest hit.
    ///
    /// A hit at distance zero means the shape already overlaps something in that direction.
    fn cast_self(
        &self,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<ShapeHit<Self::Collider>>;

    /// Colliders intersecting the agent's shape at the given pose.
    fn overlapping(&self, position: Vec3, rotation: Quat) -> Vec<Self::Collider>;

    /// Push-out direction and depth separating the agent at the given pose from `other`.
    ///
    /// Returns `None` when the shapes do not overlap or the query is unsupported.
    fn penetration(
        &self,
        position: Vec3,
        rotation: Quat,
        other: Self::Collider,
    ) -> Option<Penetration>;

    /// Cast a ray through the scene.
    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit<Self::Collider>>;

    /// Lowest point of the agent's shape along `up`, used to measure step heights.
    ///
    /// Defaults to the shape origin.
    fn lowest_point(&self, position: Vec3, _rotation: Quat, _up: &Vec3) -> Vec3 {
        position
    }
}
