//! Grounded-state evaluation.
//!
//! One downward shape cast per tick decides whether the agent is standing, sliding or falling,
//! and on what. The result is an immutable [`GroundedState`] value; the derived predicates are
//! computed from its fields on demand so they can never disagree with each other.

use crate::{
    query::ShapeQueryProvider,
    types::{Quat, ShapeHit, Vec3, angle_deg, normalize_or_zero},
};

/// Parameters for the downward ground cast.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundCheck {
    /// Unit world up direction.
    pub up: Vec3,
    /// Length of the downward cast.
    pub cast_distance: f32,
    /// Hits at or below this distance count as touching the ground.
    pub grounded_threshold: f32,
    /// Steeper ground makes the agent slide.
    pub max_walk_angle_deg: f32,
    /// Extra cast length used while the agent was standing on the previous tick.
    pub snap_down_distance: f32,
}

impl Default for GroundCheck {
    fn default() -> Self {
        crate::settings::KccSettings::default().ground_check()
    }
}

/// Relationship between the agent and the ground under it for one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GroundedState<C> {
    distance_to_ground: f32,
    on_ground: bool,
    angle: f32,
    surface_normal: Vec3,
    ground_hit_position: Vec3,
    floor: Option<C>,
    grounded_threshold: f32,
    max_walk_angle_deg: f32,
}

impl<C: Copy> GroundedState<C> {
    /// Build the state from the result of a downward cast.
    pub fn new(hit: Option<ShapeHit<C>>, check: &GroundCheck) -> Self {
        match hit {
            Some(hit) => {
                let normal = normalize_or_zero(&hit.normal);
                let surface_normal = if normal == Vec3::zeros() {
                    check.up
                } else {
                    normal
                };
                Self {
                    distance_to_ground: hit.distance.max(0.0),
                    on_ground: true,
                    angle: angle_deg(&surface_normal, &check.up),
                    surface_normal,
                    ground_hit_position: hit.point,
                    floor: Some(hit.collider),
                    grounded_threshold: check.grounded_threshold,
                    max_walk_angle_deg: check.max_walk_angle_deg,
                }
            }
            None => Self::airborne(check),
        }
    }

    /// State for an agent with nothing below it.
    pub fn airborne(check: &GroundCheck) -> Self {
        Self {
            distance_to_ground: f32::INFINITY,
            on_ground: false,
            angle: 0.0,
            surface_normal: check.up,
            ground_hit_position: Vec3::zeros(),
            floor: None,
            grounded_threshold: check.grounded_threshold,
            max_walk_angle_deg: check.max_walk_angle_deg,
        }
    }

    #[inline]
    pub fn distance_to_ground(&self) -> f32 {
        self.distance_to_ground
    }

    /// Whether the downward cast hit anything at all.
    #[inline]
    pub fn on_ground(&self) -> bool {
        self.on_ground
    }

    /// Degrees between the surface normal and up.
    #[inline]
    pub fn angle(&self) -> f32 {
        self.angle
    }

    #[inline]
    pub fn surface_normal(&self) -> Vec3 {
        self.surface_normal
    }

    #[inline]
    pub fn ground_hit_position(&self) -> Vec3 {
        self.ground_hit_position
    }

    #[inline]
    pub fn floor(&self) -> Option<C> {
        self.floor
    }

    /// Touching the ground without overlapping it.
    ///
    /// A distance of exactly zero is excluded: it cannot be told apart from being embedded in
    /// a wall.
    pub fn standing_on_ground(&self) -> bool {
        self.on_ground
            && self.distance_to_ground > 0.0
            && self.distance_to_ground <= self.grounded_threshold
    }

    /// Touching or overlapping the ground.
    pub fn standing_on_ground_or_overlap(&self) -> bool {
        self.on_ground && self.distance_to_ground <= self.grounded_threshold
    }

    pub fn falling(&self) -> bool {
        !self.standing_on_ground()
    }

    /// Standing on ground too steep to walk on.
    pub fn sliding(&self) -> bool {
        self.standing_on_ground() && self.angle > self.max_walk_angle_deg
    }

    /// Standing on walkable ground.
    pub fn walkable(&self) -> bool {
        self.standing_on_ground() && !self.sliding()
    }
}

/// Probe the ground below the agent.
///
/// When `previous` was standing on ground the cast is lengthened by the snap-down distance so
/// the agent stays latched to descending slopes and steps.
pub fn check_grounded<P: ShapeQueryProvider + ?Sized>(
    provider: &P,
    position: Vec3,
    rotation: Quat,
    check: &GroundCheck,
    previous: Option<&GroundedState<P::Collider>>,
) -> GroundedState<P::Collider> {
    let mut reach = check.cast_distance;
    if previous.is_some_and(|p| p.standing_on_ground()) {
        reach += check.snap_down_distance;
    }

    let hit = provider.cast_self(position, rotation, -check.up, reach);
    GroundedState::new(hit, check)
}
