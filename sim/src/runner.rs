//! Fixed-rate scene runner.
//!
//! Each tick:
//! 1) advance platforms and refresh the query world
//! 2) look up the scripted intent
//! 3) tick the character motor against the refreshed world
//!
//! Notes:
//! - Ticks use a fixed step derived from `tick_hz`, clamped to `MAX_DT_S` so slow scenes cannot
//!   produce huge steps.

use kcc::{
    Attachment, CharacterMotor, MotorInput, RapierShapeQuery, TickReport, Vec3,
    rapier_world::rapier3d::prelude::ColliderHandle,
};

use crate::{error::SimError, scene::SceneConfig, world::SceneWorld};

/// Default tick frequency (Hz).
pub const DEFAULT_TICK_HZ: u32 = 60;

/// Max dt (seconds) for one motor update.
pub const MAX_DT_S: f32 = 0.10;

/// Agent state after one tick.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TickSample {
    pub tick: u64,
    pub position: Vec3,
    pub velocity: Vec3,
    pub standing: bool,
    pub sliding: bool,
    pub attachment: Attachment,
    pub bounces: usize,
}

/// Drives one agent through a scene.
pub struct Runner {
    scene: SceneConfig,
    world: SceneWorld,
    motor: CharacterMotor<ColliderHandle>,
    dt: f32,
    tick: u64,
}

impl Runner {
    pub fn new(scene: SceneConfig) -> Result<Self, SimError> {
        scene.validate()?;
        let dt = scene.tick_dt().min(MAX_DT_S);
        let world = SceneWorld::build(&scene, dt);
        let motor = CharacterMotor::new(scene.settings.clone(), scene.agent.position);
        log::info!(
            "scene loaded: {} collider(s), {} platform(s), dt {:.4}s",
            world.query_world().len(),
            world.platforms().count(),
            dt
        );
        Ok(Self {
            scene,
            world,
            motor,
            dt,
            tick: 0,
        })
    }

    #[inline]
    pub fn tick(&self) -> u64 {
        self.tick
    }

    #[inline]
    pub fn motor(&self) -> &CharacterMotor<ColliderHandle> {
        &self.motor
    }

    #[inline]
    pub fn world(&self) -> &SceneWorld {
        &self.world
    }

    /// Advance the scene by one tick.
    pub fn step(&mut self) -> TickSample {
        self.world.step_platforms(self.tick, self.dt);

        let (walk, jump) = self.scene.agent.intent_at(self.tick);
        let input = MotorInput { walk, jump };

        let report: TickReport<ColliderHandle> = {
            let query =
                RapierShapeQuery::new(self.world.query_world(), self.scene.agent.capsule, None);
            self.motor.tick(&query, &self.world, &input, self.dt)
        };

        let sample = TickSample {
            tick: self.tick,
            position: self.motor.position(),
            velocity: self.motor.velocity(),
            standing: report.grounded.standing_on_ground(),
            sliding: report.grounded.sliding(),
            attachment: self.motor.attachment(),
            bounces: report.bounces.len(),
        };
        if report.jumped {
            log::debug!("tick {}: jump", self.tick);
        }
        if report.inherited_velocity != Vec3::zeros() {
            log::debug!(
                "tick {}: inherited {:?} from floor",
                self.tick,
                report.inherited_velocity
            );
        }
        log::trace!("{sample:?}");

        self.tick += 1;
        sample
    }

    /// Run `ticks` ticks and return every sample.
    pub fn run(&mut self, ticks: u64) -> Vec<TickSample> {
        (0..ticks).map(|_| self.step()).collect()
    }
}
