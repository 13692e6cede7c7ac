//! Scripted moving platforms.

use kcc::{
    MovingGround, Quat, Transform, Vec3,
    rapier_world::rapier3d::prelude::ColliderHandle,
};

use crate::scene::PlatformConfig;

/// A platform moving with constant linear and angular velocity.
///
/// The angular velocity spins the platform about its own origin.
#[derive(Clone, Debug)]
pub struct Platform {
    pub id: u32,
    pub handle: ColliderHandle,
    pose: Transform,
    linear_velocity: Vec3,
    /// Radians per second about world axes.
    angular_velocity: Vec3,
    surface_velocity: Vec3,
    attach: bool,
    movement_weight: f32,
    transfer_momentum_weight: f32,
    avoid_transfer_momentum: bool,
    destroy_at_tick: Option<u64>,
}

impl Platform {
    pub fn new(config: &PlatformConfig, handle: ColliderHandle) -> Self {
        Self {
            id: config.id,
            handle,
            pose: config.pose.transform(),
            linear_velocity: config.linear_velocity,
            angular_velocity: config.angular_velocity_deg.map(f32::to_radians),
            surface_velocity: config.surface_velocity,
            attach: config.attach,
            movement_weight: config.movement_weight,
            transfer_momentum_weight: config.transfer_momentum_weight,
            avoid_transfer_momentum: config.avoid_transfer_momentum,
            destroy_at_tick: config.destroy_at_tick,
        }
    }

    #[inline]
    pub fn pose(&self) -> Transform {
        self.pose
    }

    /// Integrate the pose over `dt` and return it.
    pub fn advance(&mut self, dt: f32) -> Transform {
        self.pose.translation += self.linear_velocity * dt;
        let spin = Quat::from_scaled_axis(self.angular_velocity * dt);
        self.pose.rotation = spin * self.pose.rotation;
        self.pose
    }

    pub fn expires_at(&self, tick: u64) -> bool {
        self.destroy_at_tick == Some(tick)
    }
}

impl MovingGround for Platform {
    fn velocity_at_point(&self, point: &Vec3) -> Vec3 {
        self.linear_velocity
            + self.angular_velocity.cross(&(point - self.pose.translation))
            + self.surface_velocity
    }

    fn movement_weight(&self, _point: &Vec3, _agent_velocity: &Vec3) -> f32 {
        self.movement_weight
    }

    fn transfer_momentum_weight(&self, _point: &Vec3, _agent_velocity: &Vec3) -> f32 {
        self.transfer_momentum_weight
    }

    fn avoid_transfer_momentum(&self) -> bool {
        self.avoid_transfer_momentum
    }

    fn should_attach(&self) -> bool {
        self.attach
    }
}
