/*!
Moving-ground tracking.

Keeps the agent glued to platforms that translate or rotate under it, carries it along surfaces
that push without being followed (conveyors), and computes the velocity inherited when the agent
leaves a moving floor.

Notes
- Floors are looked up through a [`GroundRegistry`] every tick. A floor whose pose can no longer
  be resolved counts as destroyed and detaches the agent.
- Floors without a [`MovingGround`] capability behave like [`StaticGround`]: full attach, zero
  velocity at every point.
- [`RelativeParentState`] is a value; the tracker replaces it wholesale each tick.
*/

use crate::{
    grounded::GroundedState,
    types::{Transform, Vec3},
};

/// Capability exposed by floors that move.
pub trait MovingGround {
    /// World-space velocity of the floor surface at `point`.
    fn velocity_at_point(&self, point: &Vec3) -> Vec3;

    /// Fraction in [0, 1] of the floor's motion applied to an agent pushed but not attached.
    fn movement_weight(&self, _point: &Vec3, _agent_velocity: &Vec3) -> f32 {
        1.0
    }

    /// Fraction in [0, 1] of the floor velocity inherited when the agent leaves the floor.
    fn transfer_momentum_weight(&self, _point: &Vec3, _agent_velocity: &Vec3) -> f32 {
        1.0
    }

    fn avoid_transfer_momentum(&self) -> bool {
        false
    }

    /// `false` for floors that push the agent without being followed kinematically.
    fn should_attach(&self) -> bool {
        true
    }
}

/// Null capability for ordinary static floors.
#[derive(Clone, Copy, Debug, Default)]
pub struct StaticGround;

impl MovingGround for StaticGround {
    fn velocity_at_point(&self, _point: &Vec3) -> Vec3 {
        Vec3::zeros()
    }
}

static STATIC_GROUND: StaticGround = StaticGround;

/// Resolves floor identities to their current pose and capability.
pub trait GroundRegistry<C> {
    /// Current world pose of `floor`, or `None` when it no longer exists.
    fn pose(&self, floor: C) -> Option<Transform>;

    /// Moving-ground capability of `floor`, if it has one.
    fn moving_ground(&self, _floor: C) -> Option<&dyn MovingGround> {
        None
    }
}

fn capability<'r, C, R>(registry: &'r R, floor: C) -> &'r dyn MovingGround
where
    R: GroundRegistry<C> + ?Sized,
{
    registry.moving_ground(floor).unwrap_or(&STATIC_GROUND)
}

/// The agent's offset in the local frame of the floor it is attached to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RelativeParentState<C> {
    relative_position: Vec3,
    previous_parent: Option<C>,
}

impl<C> Default for RelativeParentState<C> {
    fn default() -> Self {
        Self {
            relative_position: Vec3::zeros(),
            previous_parent: None,
        }
    }
}

impl<C: Copy + PartialEq> RelativeParentState<C> {
    /// Anchor the agent at world `position` to `parent` at its current pose.
    pub fn anchored(parent: C, parent_pose: &Transform, position: Vec3) -> Self {
        Self {
            relative_position: parent_pose.inverse_transform_point(&position),
            previous_parent: Some(parent),
        }
    }

    /// Accumulate the agent's own world-space movement `delta` into the local offset.
    pub fn advanced(&self, parent_pose: &Transform, delta: Vec3) -> Self {
        Self {
            relative_position: self.relative_position + parent_pose.rotation.inverse() * delta,
            previous_parent: self.previous_parent,
        }
    }

    #[inline]
    pub fn relative_position(&self) -> Vec3 {
        self.relative_position
    }

    #[inline]
    pub fn previous_parent(&self) -> Option<C> {
        self.previous_parent
    }

    /// World position that keeps the recorded offset under `parent_pose`.
    #[inline]
    pub fn followed_position(&self, parent_pose: &Transform) -> Vec3 {
        parent_pose.transform_point(&self.relative_position)
    }

    /// Displacement the parent has applied to an agent currently at `position`.
    #[inline]
    pub fn delta_position(&self, parent_pose: &Transform, position: Vec3) -> Vec3 {
        self.followed_position(parent_pose) - position
    }
}

/// Attachment of the agent to the floor under it.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Attachment {
    #[default]
    Detached,
    /// Kinematically following the floor's pose.
    AttachedFollow,
    /// Carried by the floor's surface velocity without following its pose.
    AttachedPushOnly,
}

/// Inputs that drive [`Attachment`] transitions.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AttachmentEvent {
    /// Standing on the same floor as before (or newly landed on one).
    Standing { should_attach: bool },
    /// Standing on a different floor than the one attached to.
    FloorChanged,
    /// No longer standing on ground.
    Airborne,
    /// The floor's pose can no longer be resolved.
    FloorLost,
}

impl Attachment {
    /// Transition table. Changing floors always passes through `Detached`.
    pub fn on_event(self, event: AttachmentEvent) -> Attachment {
        use Attachment::*;
        use AttachmentEvent::*;

        match (self, event) {
            (_, Airborne | FloorLost | FloorChanged) => Detached,
            (_, Standing { should_attach: true }) => AttachedFollow,
            (_, Standing { should_attach: false }) => AttachedPushOnly,
        }
    }

    #[inline]
    pub fn is_attached(self) -> bool {
        self != Attachment::Detached
    }
}

/// Per-agent moving-ground state.
#[derive(Clone, Debug)]
pub struct MovingGroundTracker<C> {
    parent: RelativeParentState<C>,
    attachment: Attachment,
    floor: Option<C>,
}

impl<C> Default for MovingGroundTracker<C> {
    fn default() -> Self {
        Self {
            parent: RelativeParentState::default(),
            attachment: Attachment::Detached,
            floor: None,
        }
    }
}

impl<C: Copy + PartialEq + std::fmt::Debug> MovingGroundTracker<C> {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn attachment(&self) -> Attachment {
        self.attachment
    }

    #[inline]
    pub fn parent(&self) -> &RelativeParentState<C> {
        &self.parent
    }

    /// Floor the agent is currently attached to.
    #[inline]
    pub fn floor(&self) -> Option<C> {
        self.floor
    }

    fn transition(&mut self, event: AttachmentEvent) {
        let next = self.attachment.on_event(event);
        if next != self.attachment {
            log::debug!(
                "attachment {:?} -> {:?} on {:?} (floor {:?})",
                self.attachment,
                next,
                event,
                self.floor
            );
            self.attachment = next;
        }
    }

    fn detach(&mut self, event: AttachmentEvent) {
        self.transition(event);
        self.parent = RelativeParentState::default();
        self.floor = None;
    }

    /// Record this tick's relationship with the floor.
    ///
    /// `position` is the agent's position before `intended_delta` (its own movement this tick)
    /// was applied. Returns the extra displacement a push-only floor applies to the agent; zero
    /// when attached or detached.
    pub fn update_moving_ground<R>(
        &mut self,
        registry: &R,
        position: Vec3,
        grounded: &GroundedState<C>,
        intended_delta: Vec3,
        agent_velocity: Vec3,
        dt: f32,
    ) -> Vec3
    where
        R: GroundRegistry<C> + ?Sized,
    {
        let Some(floor) = grounded.floor().filter(|_| grounded.standing_on_ground()) else {
            self.detach(AttachmentEvent::Airborne);
            return Vec3::zeros();
        };

        let Some(pose) = registry.pose(floor) else {
            if self.attachment.is_attached() {
                log::warn!("floor {floor:?} vanished while attached, detaching");
            }
            self.detach(AttachmentEvent::FloorLost);
            return Vec3::zeros();
        };

        if self.floor.is_some_and(|f| f != floor) {
            self.detach(AttachmentEvent::FloorChanged);
        }

        let ground = capability(registry, floor);
        let should_attach = ground.should_attach();
        self.transition(AttachmentEvent::Standing { should_attach });
        self.floor = Some(floor);

        if !should_attach {
            self.parent = RelativeParentState::default();
            return surface_displacement(ground, grounded, agent_velocity, dt);
        }

        self.parent = if self.parent.previous_parent() == Some(floor) {
            self.parent.advanced(&pose, intended_delta)
        } else {
            RelativeParentState::anchored(floor, &pose, position + intended_delta)
        };
        Vec3::zeros()
    }

    /// Position that tracks the attached floor's current pose.
    ///
    /// Returns `position` unchanged when not following a floor or the floor is gone.
    pub fn follow_ground<R>(&self, registry: &R, position: Vec3) -> Vec3
    where
        R: GroundRegistry<C> + ?Sized,
    {
        self.parent_pose(registry)
            .map_or(position, |pose| self.parent.followed_position(&pose))
    }

    /// Displacement the followed floor has applied since the agent was last placed on it.
    pub fn delta_position<R>(&self, registry: &R, position: Vec3) -> Vec3
    where
        R: GroundRegistry<C> + ?Sized,
    {
        self.parent_pose(registry)
            .map_or_else(Vec3::zeros, |pose| self.parent.delta_position(&pose, position))
    }

    fn parent_pose<R>(&self, registry: &R) -> Option<Transform>
    where
        R: GroundRegistry<C> + ?Sized,
    {
        if self.attachment != Attachment::AttachedFollow {
            return None;
        }
        registry.pose(self.parent.previous_parent()?)
    }
}

fn surface_displacement<C: Copy>(
    ground: &dyn MovingGround,
    grounded: &GroundedState<C>,
    agent_velocity: Vec3,
    dt: f32,
) -> Vec3 {
    let point = grounded.ground_hit_position();
    let weight = ground
        .movement_weight(&point, &agent_velocity)
        .clamp(0.0, 1.0);
    ground.velocity_at_point(&point) * weight * dt
}

/// Displacement a push-only floor applies to the agent during this tick.
///
/// Computed from the grounded state of the current tick so it can be added to the desired
/// displacement before resolution. Zero when the agent is not standing, the floor no longer
/// resolves, or the floor attaches the agent instead of pushing it.
pub fn push_only_displacement<C, R>(
    registry: &R,
    grounded: &GroundedState<C>,
    agent_velocity: Vec3,
    dt: f32,
) -> Vec3
where
    C: Copy,
    R: GroundRegistry<C> + ?Sized,
{
    let Some(floor) = grounded.floor().filter(|_| grounded.standing_on_ground()) else {
        return Vec3::zeros();
    };
    if registry.pose(floor).is_none() {
        return Vec3::zeros();
    }
    let ground = capability(registry, floor);
    if ground.should_attach() {
        return Vec3::zeros();
    }
    surface_displacement(ground, grounded, agent_velocity, dt)
}

/// Velocity inherited from the floor when the agent leaves it.
///
/// `previous` is the grounded state from before the departure. Zero when the agent was not
/// standing on a moving floor, the floor is gone, or it avoids momentum transfer.
pub fn departure_velocity<C, R>(registry: &R, previous: &GroundedState<C>, velocity: Vec3) -> Vec3
where
    C: Copy,
    R: GroundRegistry<C> + ?Sized,
{
    let Some(floor) = previous.floor().filter(|_| previous.standing_on_ground()) else {
        return Vec3::zeros();
    };
    if registry.pose(floor).is_none() {
        return Vec3::zeros();
    }
    let Some(ground) = registry.moving_ground(floor) else {
        return Vec3::zeros();
    };
    if ground.avoid_transfer_momentum() {
        return Vec3::zeros();
    }

    let point = previous.ground_hit_position();
    let weight = ground
        .transfer_momentum_weight(&point, &velocity)
        .clamp(0.0, 1.0);
    ground.velocity_at_point(&point) * weight
}
