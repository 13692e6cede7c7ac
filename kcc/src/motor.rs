//! Per-tick character motor.
//!
//! Thin driver around the core algorithms. One [`CharacterMotor::tick`] runs, in order:
//! 1) follow the attached floor
//! 2) evaluate the grounded state
//! 3) inherit floor momentum when leaving the ground
//! 4) jump and gravity
//! 5) bounce resolution of intent + velocity + push-only floor displacement
//! 6) step-down snap, then overlap push
//! 7) moving-ground update with the displacement actually travelled
//!
//! Notes:
//! - The motor owns the agent's position, velocity and moving-ground state. The scene (query
//!   provider and ground registry) is borrowed per tick.
//! - Push-only floors add their surface displacement to the same tick's resolution, computed
//!   from that tick's grounded state.

use crate::{
    bounce::{Bounce, NoPush, PushListener, resolve_with_pusher, snap_down},
    grounded::{GroundedState, check_grounded},
    moving_ground::{
        Attachment, GroundRegistry, MovingGroundTracker, departure_velocity, push_only_displacement,
    },
    overlap::{OverlapPush, push_out_of_overlaps},
    query::ShapeQueryProvider,
    settings::KccSettings,
    types::{Quat, Vec3, project_on_plane},
};

/// Agent intent for one tick.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct MotorInput {
    /// Desired walking velocity (m/s). The component along up is ignored.
    pub walk: Vec3,
    pub jump: bool,
}

/// What happened during one motor tick.
#[derive(Clone, Debug)]
pub struct TickReport<C> {
    pub bounces: Vec<Bounce>,
    /// Grounded state evaluated at the start of the tick.
    pub grounded: GroundedState<C>,
    pub overlap: OverlapPush,
    /// Displacement applied by following the attached floor.
    pub followed: Vec3,
    /// Velocity inherited from a floor the agent just left.
    pub inherited_velocity: Vec3,
    pub jumped: bool,
    /// Push-only floor displacement included in this tick's resolution.
    pub transferred: Vec3,
}

/// A kinematic character driven tick by tick.
#[derive(Clone, Debug)]
pub struct CharacterMotor<C> {
    settings: KccSettings,
    position: Vec3,
    rotation: Quat,
    velocity: Vec3,
    grounded: Option<GroundedState<C>>,
    tracker: MovingGroundTracker<C>,
}

impl<C: Copy + PartialEq + std::fmt::Debug> CharacterMotor<C> {
    pub fn new(settings: KccSettings, position: Vec3) -> Self {
        Self {
            settings,
            position,
            rotation: Quat::identity(),
            velocity: Vec3::zeros(),
            grounded: None,
            tracker: MovingGroundTracker::new(),
        }
    }

    #[inline]
    pub fn settings(&self) -> &KccSettings {
        &self.settings
    }

    #[inline]
    pub fn position(&self) -> Vec3 {
        self.position
    }

    #[inline]
    pub fn rotation(&self) -> Quat {
        self.rotation
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.rotation = rotation;
    }

    /// Non-intent velocity: gravity, jumps and inherited floor momentum.
    #[inline]
    pub fn velocity(&self) -> Vec3 {
        self.velocity
    }

    pub fn set_velocity(&mut self, velocity: Vec3) {
        self.velocity = velocity;
    }

    /// Grounded state from the last tick, if any tick ran.
    #[inline]
    pub fn grounded(&self) -> Option<&GroundedState<C>> {
        self.grounded.as_ref()
    }

    #[inline]
    pub fn attachment(&self) -> Attachment {
        self.tracker.attachment()
    }

    #[inline]
    pub fn tracker(&self) -> &MovingGroundTracker<C> {
        &self.tracker
    }

    /// Move the agent without collision and forget its floor.
    pub fn teleport(&mut self, position: Vec3) {
        self.position = position;
        self.velocity = Vec3::zeros();
        self.grounded = None;
        self.tracker = MovingGroundTracker::new();
    }

    /// Advance the agent by `dt` seconds.
    pub fn tick<P, R>(
        &mut self,
        provider: &P,
        registry: &R,
        input: &MotorInput,
        dt: f32,
    ) -> TickReport<C>
    where
        P: ShapeQueryProvider<Collider = C> + ?Sized,
        R: GroundRegistry<C> + ?Sized,
    {
        self.tick_with_pusher(provider, registry, input, dt, NoPush)
    }

    /// Like [`Self::tick`], reporting blocking hits to `pusher`.
    pub fn tick_with_pusher<P, R, L>(
        &mut self,
        provider: &P,
        registry: &R,
        input: &MotorInput,
        dt: f32,
        pusher: L,
    ) -> TickReport<C>
    where
        P: ShapeQueryProvider<Collider = C> + ?Sized,
        R: GroundRegistry<C> + ?Sized,
        L: PushListener<C>,
    {
        let settings = &self.settings;
        let up = settings.up();

        // 1) Platform motion first, so resolution only handles the agent's own movement.
        let followed_position = self.tracker.follow_ground(registry, self.position);
        let followed = followed_position - self.position;
        self.position = followed_position;

        // 2) Ground under the agent.
        let check = settings.ground_check();
        let grounded = check_grounded(
            provider,
            self.position,
            self.rotation,
            &check,
            self.grounded.as_ref(),
        );

        // 3) Leaving a floor: inherit its momentum.
        let mut inherited_velocity = Vec3::zeros();
        if let Some(previous) = &self.grounded {
            if previous.standing_on_ground() != grounded.standing_on_ground() {
                log::debug!(
                    "standing {} -> {} (floor {:?}, distance {:.4})",
                    previous.standing_on_ground(),
                    grounded.standing_on_ground(),
                    grounded.floor(),
                    grounded.distance_to_ground()
                );
            }
            if previous.standing_on_ground() && !grounded.standing_on_ground() {
                inherited_velocity = departure_velocity(registry, previous, self.velocity);
                self.velocity += inherited_velocity;
            }
        }

        // 4) Jump and gravity.
        let walkable = grounded.walkable();
        let jumped = input.jump && walkable;
        if jumped {
            self.velocity = project_on_plane(&self.velocity, &up) + up * settings.jump_velocity;
        } else if walkable {
            // Resting on walkable ground absorbs fall speed and inherited momentum.
            self.velocity = Vec3::zeros();
        }
        if jumped || !walkable {
            self.velocity += settings.gravity * dt;
        }

        // 5) Resolve.
        let walk = project_on_plane(&input.walk, &up);
        let transferred = push_only_displacement(registry, &grounded, walk + self.velocity, dt);
        let desired = (walk + self.velocity) * dt + transferred;
        let config = settings.movement_config(jumped, walkable);
        let start = self.position;
        let bounces: Vec<Bounce> =
            resolve_with_pusher(provider, start, self.rotation, desired, config, pusher).collect();
        let mut position = bounces.last().map_or(start, |b| b.final_position);

        // 6) Stay latched to descending ground, then resolve leftover overlaps.
        if walkable && !jumped && self.velocity.dot(&up) <= 0.0 {
            position = snap_down(
                provider,
                position,
                self.rotation,
                &config,
                settings.vertical_snap_down,
            );
        }

        let overlap = push_out_of_overlaps(
            provider,
            position,
            self.rotation,
            settings.max_push_speed,
            dt,
        );
        if overlap.moved() {
            self.velocity *= settings.push_decay;
        }
        self.position = overlap.position;

        // 7) Record the travelled delta against the floor. Push-only carry is already applied.
        let travelled = self.position - start;
        self.tracker.update_moving_ground(
            registry,
            start,
            &grounded,
            travelled,
            walk + self.velocity,
            dt,
        );

        log::trace!(
            "tick: {} bounce(s), position {:?}, velocity {:?}",
            bounces.len(),
            self.position,
            self.velocity
        );

        self.grounded = Some(grounded);
        TickReport {
            bounces,
            grounded,
            overlap,
            followed,
            inherited_velocity,
            jumped,
            transferred,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::{
        moving_ground::MovingGround,
        settings::EPSILON,
        test_support::{Plane, SpherePlanes},
        types::Transform,
    };
    use approx::assert_relative_eq;

    const DT: f32 = 1.0 / 60.0;

    fn floor() -> SpherePlanes {
        SpherePlanes {
            radius: 0.5,
            planes: vec![Plane::new(Vec3::y(), Vec3::zeros())],
        }
    }

    struct Belt {
        velocity: Vec3,
        attach: bool,
    }

    impl MovingGround for Belt {
        fn velocity_at_point(&self, _point: &Vec3) -> Vec3 {
            self.velocity
        }

        fn should_attach(&self) -> bool {
            self.attach
        }
    }

    /// Plane 0 as a floor whose horizontal pose can be scripted. `None` means destroyed.
    struct Platform {
        pose: Cell<Option<Transform>>,
        belt: Option<Belt>,
    }

    impl Platform {
        fn fixed() -> Self {
            Self::with_belt(None)
        }

        fn with_belt(belt: Option<Belt>) -> Self {
            Self {
                pose: Cell::new(Some(Transform::from_translation(Vec3::zeros()))),
                belt,
            }
        }
    }

    impl GroundRegistry<u32> for Platform {
        fn pose(&self, floor: u32) -> Option<Transform> {
            self.pose.get().filter(|_| floor == 0)
        }

        fn moving_ground(&self, _floor: u32) -> Option<&dyn MovingGround> {
            self.belt.as_ref().map(|b| b as &dyn MovingGround)
        }
    }

    fn resting_motor() -> CharacterMotor<u32> {
        CharacterMotor::new(KccSettings::default(), Vec3::new(0.0, 0.505, 0.0))
    }

    #[test]
    fn falling_agent_lands_and_rests() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = CharacterMotor::new(KccSettings::default(), Vec3::new(0.0, 2.0, 0.0));

        for _ in 0..120 {
            motor.tick(&provider, &registry, &MotorInput::default(), DT);
        }

        assert!(motor.position().y >= 0.5);
        assert!(motor.position().y < 0.5 + 0.01);
        assert!(motor.grounded().is_some_and(|g| g.walkable()));
        assert_eq!(motor.velocity(), Vec3::zeros());
        assert_eq!(motor.attachment(), Attachment::AttachedFollow);
    }

    #[test]
    fn walking_on_flat_ground_covers_the_intended_distance() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = resting_motor();
        let input = MotorInput {
            walk: Vec3::new(1.0, 0.0, 0.0),
            jump: false,
        };

        for _ in 0..60 {
            motor.tick(&provider, &registry, &input, DT);
        }

        assert_relative_eq!(motor.position().x, 1.0, epsilon = 1.0e-3);
        assert!(motor.position().y >= 0.5 && motor.position().y < 0.5 + 0.01);
    }

    #[test]
    fn agent_follows_a_translating_platform() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = resting_motor();
        let step = Vec3::new(0.01, 0.0, 0.0);

        let ticks = 30;
        for i in 0..ticks {
            registry
                .pose
                .set(Some(Transform::from_translation(step * i as f32)));
            motor.tick(&provider, &registry, &MotorInput::default(), DT);
        }

        assert_relative_eq!(motor.position().x, 0.01 * (ticks - 1) as f32, epsilon = 1.0e-4);
    }

    #[test]
    fn jump_leaves_the_ground_and_lands_again() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = resting_motor();
        for _ in 0..3 {
            motor.tick(&provider, &registry, &MotorInput::default(), DT);
        }

        let report = motor.tick(
            &provider,
            &registry,
            &MotorInput {
                walk: Vec3::zeros(),
                jump: true,
            },
            DT,
        );
        assert!(report.jumped);
        assert!(motor.velocity().y > 0.0);

        let mut peak: f32 = 0.0;
        for _ in 0..180 {
            motor.tick(&provider, &registry, &MotorInput::default(), DT);
            peak = peak.max(motor.position().y);
        }
        assert!(peak > 1.5);
        assert!(motor.grounded().is_some_and(|g| g.standing_on_ground()));
        assert!(motor.position().y < 0.5 + 0.01);
    }

    #[test]
    fn jumping_off_a_moving_floor_inherits_its_velocity() {
        let provider = floor();
        let registry = Platform::with_belt(Some(Belt {
            velocity: Vec3::new(3.0, 0.0, 0.0),
            attach: true,
        }));
        let mut motor = resting_motor();
        for _ in 0..3 {
            motor.tick(&provider, &registry, &MotorInput::default(), DT);
        }
        motor.tick(
            &provider,
            &registry,
            &MotorInput {
                walk: Vec3::zeros(),
                jump: true,
            },
            DT,
        );

        let report = motor.tick(&provider, &registry, &MotorInput::default(), DT);
        assert_relative_eq!(report.inherited_velocity, Vec3::new(3.0, 0.0, 0.0));
        assert_relative_eq!(motor.velocity().x, 3.0);
    }

    #[test]
    fn push_only_floor_carries_the_agent() {
        let provider = floor();
        let registry = Platform::with_belt(Some(Belt {
            velocity: Vec3::new(0.0, 0.0, 2.0),
            attach: false,
        }));
        let mut motor = resting_motor();
        let ticks = 60;
        for _ in 0..ticks {
            let report = motor.tick(&provider, &registry, &MotorInput::default(), DT);
            assert_relative_eq!(report.transferred, Vec3::new(0.0, 0.0, 2.0 * DT));
        }

        assert_eq!(motor.attachment(), Attachment::AttachedPushOnly);
        assert_relative_eq!(motor.position().z, 2.0 * DT * ticks as f32, epsilon = 1.0e-3);
    }

    #[test]
    fn destroyed_belt_stops_carrying_at_once() {
        let provider = floor();
        let registry = Platform::with_belt(Some(Belt {
            velocity: Vec3::new(0.0, 0.0, 6.0),
            attach: false,
        }));
        let mut motor = resting_motor();
        let dt = 0.1;

        motor.tick(&provider, &registry, &MotorInput::default(), dt);
        assert!(motor.grounded().is_some_and(|g| g.standing_on_ground()));
        assert_relative_eq!(motor.position().z, 0.6, epsilon = 1.0e-4);

        registry.pose.set(None);
        let report = motor.tick(&provider, &registry, &MotorInput::default(), dt);
        assert_eq!(report.transferred, Vec3::zeros());
        assert_eq!(motor.attachment(), Attachment::Detached);
        assert_relative_eq!(motor.position().z, 0.6, epsilon = 1.0e-4);
    }

    #[test]
    fn embedded_agent_is_pushed_out_and_slowed() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = CharacterMotor::new(KccSettings::default(), Vec3::new(0.0, 0.45, 0.0));
        motor.set_velocity(Vec3::new(0.0, -1.0, 0.0));

        let report = motor.tick(&provider, &registry, &MotorInput::default(), DT);
        assert!(report.overlap.moved());
        assert_relative_eq!(motor.position().y, 0.5 + 2.0 * EPSILON, epsilon = 1.0e-4);
    }

    #[test]
    fn teleport_forgets_the_floor() {
        let provider = floor();
        let registry = Platform::fixed();
        let mut motor = resting_motor();
        motor.tick(&provider, &registry, &MotorInput::default(), DT);
        assert!(motor.attachment().is_attached());

        motor.teleport(Vec3::new(0.0, 5.0, 0.0));
        assert_eq!(motor.attachment(), Attachment::Detached);
        assert!(motor.grounded().is_none());
        assert_eq!(motor.position(), Vec3::new(0.0, 5.0, 0.0));
    }
}
