//! Bounce resolver: collide-and-slide with step climbing.
//!
//! A resolution call turns one desired displacement into an ordered sequence of [`Bounce`]
//! segments. Each segment starts where the previous one ended and the sequence always ends in
//! exactly one [`BounceAction::Stop`].
//!
//! Algorithm, per iteration:
//! - Shape-cast the agent along the remaining momentum for its full length.
//! - No hit: move the whole way and stop.
//! - Hit at (near) zero distance: the agent is already overlapping, stop in place.
//! - Hit a steep obstruction low enough to climb: raise, advance, keep going.
//! - Otherwise: advance to the contact minus [`EPSILON`], project the leftover onto the
//!   contact plane and damp it by how far the direction turned.
//!
//! At most `max_bounces + 1` iterations run; a final `Stop` caps degenerate geometry.

use std::iter::FusedIterator;

use crate::{
    query::ShapeQueryProvider,
    settings::{EPSILON, MIN_MOVE_DISTANCE, MovementConfig, OVERLAP_DISTANCE},
    types::{Quat, ShapeHit, Vec3, angle_deg, normalize_or_zero, project_on_plane},
};

/// What happened during one movement segment.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BounceAction {
    /// Free movement (no obstruction, or an accepted step climb).
    Move,
    /// Movement up to an obstruction followed by a slide along its surface.
    Bounce,
    /// Terminal segment; the agent does not move.
    Stop,
}

/// One discrete movement segment of a resolution call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Bounce {
    pub action: BounceAction,
    pub initial_position: Vec3,
    pub final_position: Vec3,
    /// Displacement still to be applied when the segment started.
    pub initial_momentum: Vec3,
    /// Displacement still to be applied when the segment ended.
    pub remaining_momentum: Vec3,
}

impl Bounce {
    fn stop(position: Vec3, momentum: Vec3) -> Self {
        Self {
            action: BounceAction::Stop,
            initial_position: position,
            final_position: position,
            initial_momentum: momentum,
            remaining_momentum: Vec3::zeros(),
        }
    }

    /// Displacement covered by this segment.
    #[inline]
    pub fn displacement(&self) -> Vec3 {
        self.final_position - self.initial_position
    }
}

/// Notification sent to a [`PushListener`] whenever the resolver slides along a collider.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PushEvent<C> {
    pub collider: C,
    pub point: Vec3,
    /// Surface normal at the contact, facing the agent.
    pub normal: Vec3,
    /// Unit direction the collider is pushed in.
    pub direction: Vec3,
    /// Displacement the agent lost into the surface (meters).
    pub magnitude: f32,
}

/// Optional capability for pushing dynamic obstacles the agent runs into.
///
/// The listener decides whether the collider is pushable; the resolver only reports contacts.
pub trait PushListener<C> {
    fn on_push(&mut self, event: PushEvent<C>);
}

impl<C, L: PushListener<C> + ?Sized> PushListener<C> for &mut L {
    fn on_push(&mut self, event: PushEvent<C>) {
        (**self).on_push(event);
    }
}

/// Listener used when nothing should be pushed.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoPush;

impl<C> PushListener<C> for NoPush {
    fn on_push(&mut self, _event: PushEvent<C>) {}
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Phase {
    Running,
    /// The momentum has been consumed; only the terminal `Stop` is left to emit.
    Stopping,
    Done,
}

/// Lazily evaluated bounce sequence for one resolution call.
///
/// Finite and not restartable: once it yields its `Stop` it is exhausted.
pub struct Bounces<'a, P: ShapeQueryProvider + ?Sized, L = NoPush> {
    provider: &'a P,
    rotation: Quat,
    config: MovementConfig,
    start: Vec3,
    position: Vec3,
    momentum: Vec3,
    iterations: u32,
    phase: Phase,
    pusher: L,
}

/// Resolve `desired` from `position`, producing the bounce sequence.
pub fn resolve<P: ShapeQueryProvider + ?Sized>(
    provider: &P,
    position: Vec3,
    rotation: Quat,
    desired: Vec3,
    config: MovementConfig,
) -> Bounces<'_, P> {
    resolve_with_pusher(provider, position, rotation, desired, config, NoPush)
}

/// Like [`resolve`], notifying `pusher` of every surface the agent slides along.
pub fn resolve_with_pusher<P, L>(
    provider: &P,
    position: Vec3,
    rotation: Quat,
    desired: Vec3,
    config: MovementConfig,
    pusher: L,
) -> Bounces<'_, P, L>
where
    P: ShapeQueryProvider + ?Sized,
    L: PushListener<P::Collider>,
{
    Bounces {
        provider,
        rotation,
        config,
        start: position,
        position,
        momentum: desired,
        iterations: 0,
        phase: Phase::Running,
        pusher,
    }
}

impl<P, L> Bounces<'_, P, L>
where
    P: ShapeQueryProvider + ?Sized,
    L: PushListener<P::Collider>,
{
    /// Drain the sequence and return where the agent ends up.
    pub fn final_position(self) -> Vec3 {
        let start = self.start;
        self.last().map_or(start, |b| b.final_position)
    }

    fn finish(&mut self) -> Bounce {
        self.phase = Phase::Done;
        Bounce::stop(self.position, self.momentum)
    }

    fn step(&mut self) -> Bounce {
        let distance = self.momentum.norm();
        if distance < MIN_MOVE_DISTANCE {
            return self.finish();
        }

        if self.iterations > self.config.max_bounces {
            log::warn!(
                "bounce limit ({}) reached with {:.4}m of movement left",
                self.config.max_bounces,
                distance
            );
            return self.finish();
        }
        self.iterations += 1;

        let start = self.position;
        let momentum = self.momentum;
        let dir = momentum / distance;

        let hit = match self.provider.cast_self(start, self.rotation, dir, distance) {
            Some(hit) if hit.distance <= distance => hit,
            _ => {
                // No hit: move fully and finish.
                self.position += momentum;
                self.momentum = Vec3::zeros();
                self.phase = Phase::Stopping;
                return Bounce {
                    action: BounceAction::Move,
                    initial_position: start,
                    final_position: self.position,
                    initial_momentum: momentum,
                    remaining_momentum: self.momentum,
                };
            }
        };

        if hit.distance <= OVERLAP_DISTANCE {
            log::trace!("already overlapping {:?}, stopping", hit.collider);
            return self.finish();
        }

        // Travel up to the contact point (minus skin).
        let travel = (hit.distance - EPSILON).clamp(0.0, distance);
        let contact = start + dir * travel;
        let leftover = momentum * (1.0 - travel / distance);

        if let Some((stepped, remaining)) = self.try_step_up(&hit, contact, leftover) {
            log::trace!("stepped up onto {:?}", hit.collider);
            self.position = stepped;
            self.momentum = remaining;
            return Bounce {
                action: BounceAction::Move,
                initial_position: start,
                final_position: stepped,
                initial_momentum: momentum,
                remaining_momentum: remaining,
            };
        }

        // Slide along the hit plane: remove the normal component from the leftover.
        let normal = normalize_or_zero(&hit.normal);
        let projected = project_on_plane(&leftover, &normal);

        // Damp by how far the direction turned: grazing hits keep most of their momentum.
        let turn = normalize_or_zero(&projected).dot(&dir).max(0.0);
        let remaining = projected * turn.powf(self.config.angle_power);

        let lost = leftover - projected;
        if lost.norm_squared() > 0.0 {
            let magnitude = lost.norm();
            self.pusher.on_push(PushEvent {
                collider: hit.collider,
                point: hit.point,
                normal,
                direction: lost / magnitude,
                magnitude,
            });
        }

        log::trace!(
            "bounce off {:?} after {:.4}m, {:.4}m left",
            hit.collider,
            travel,
            remaining.norm()
        );

        self.position = contact;
        self.momentum = remaining;
        Bounce {
            action: BounceAction::Bounce,
            initial_position: start,
            final_position: contact,
            initial_momentum: momentum,
            remaining_momentum: remaining,
        }
    }

    /// Try to climb a short obstruction: up, then forward.
    ///
    /// Returns the new position and the momentum left after the climb.
    fn try_step_up(
        &self,
        hit: &ShapeHit<P::Collider>,
        contact: Vec3,
        leftover: Vec3,
    ) -> Option<(Vec3, Vec3)> {
        let config = &self.config;
        if !config.can_snap_up || config.attempting_jump || config.vertical_snap_up <= 0.0 {
            return None;
        }

        let up = config.up;
        let normal = normalize_or_zero(&hit.normal);
        // Only steep obstructions are stepped; walkable floors are slid on.
        if normal == Vec3::zeros() || angle_deg(&normal, &up) <= config.max_walk_angle_deg {
            return None;
        }

        let feet = self.provider.lowest_point(contact, self.rotation, &up);
        let step_height = (hit.point - feet).dot(&up);
        if step_height <= 0.0 || step_height > config.vertical_snap_up {
            return None;
        }

        let horizontal = project_on_plane(&leftover, &up);
        let forward_len = horizontal.norm();
        if forward_len <= MIN_MOVE_DISTANCE {
            return None;
        }
        let forward = horizontal / forward_len;

        // Headroom for the climb.
        let raise = step_height + 2.0 * EPSILON;
        if self
            .provider
            .cast_self(contact, self.rotation, up, raise)
            .is_some_and(|ceiling| ceiling.distance <= raise)
        {
            return None;
        }
        let raised = contact + up * raise;

        // Require `step_up_depth` of clear travel on top of the step.
        let reach = config.step_up_depth.max(forward_len);
        let clear = self
            .provider
            .cast_self(raised, self.rotation, forward, reach)
            .map_or(reach, |h| h.distance.min(reach));
        if clear < config.step_up_depth || clear <= OVERLAP_DISTANCE {
            return None;
        }

        let advance = forward_len.min((clear - EPSILON).max(0.0));
        let stepped = raised + forward * advance;
        let remaining = (leftover - horizontal) + forward * (forward_len - advance);
        Some((stepped, remaining))
    }
}

impl<P, L> Iterator for Bounces<'_, P, L>
where
    P: ShapeQueryProvider + ?Sized,
    L: PushListener<P::Collider>,
{
    type Item = Bounce;

    fn next(&mut self) -> Option<Bounce> {
        match self.phase {
            Phase::Done => None,
            Phase::Stopping => Some(self.finish()),
            Phase::Running => Some(self.step()),
        }
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        match self.phase {
            Phase::Done => (0, Some(0)),
            Phase::Stopping => (1, Some(1)),
            Phase::Running => {
                let left = self
                    .config
                    .max_bounces
                    .saturating_add(1)
                    .saturating_sub(self.iterations) as usize;
                (1, Some(left.saturating_add(1)))
            }
        }
    }
}

impl<P, L> FusedIterator for Bounces<'_, P, L>
where
    P: ShapeQueryProvider + ?Sized,
    L: PushListener<P::Collider>,
{
}

/// Pull the agent down onto walkable ground within `distance` along `-up`.
///
/// Returns `position` unchanged when nothing walkable is in range or the agent already
/// overlaps the ground.
pub fn snap_down<P: ShapeQueryProvider + ?Sized>(
    provider: &P,
    position: Vec3,
    rotation: Quat,
    config: &MovementConfig,
    distance: f32,
) -> Vec3 {
    if distance <= 0.0 {
        return position;
    }

    let up = config.up;
    match provider.cast_self(position, rotation, -up, distance) {
        Some(hit)
            if hit.distance > OVERLAP_DISTANCE
                && hit.distance <= distance
                && angle_deg(&hit.normal, &up) <= config.max_walk_angle_deg =>
        {
            position - up * (hit.distance - EPSILON).max(0.0)
        }
        _ => position,
    }
}
