//! Scene world: the Rapier query world plus the platforms moving inside it.

use std::collections::HashMap;

use kcc::{
    ColliderDef, GroundRegistry, MovingGround, RapierQueryWorld, Transform,
    rapier_world::rapier3d::prelude::ColliderHandle,
};

use crate::{platform::Platform, scene::SceneConfig};

pub struct SceneWorld {
    world: RapierQueryWorld,
    platforms: Vec<Platform>,
    by_handle: HashMap<ColliderHandle, usize>,
}

impl SceneWorld {
    pub fn build(scene: &SceneConfig, dt: f32) -> Self {
        let statics = scene.colliders.iter().map(|c| c.def());
        let moving = scene.platforms.iter().map(|p| ColliderDef {
            id: p.id,
            pose: p.pose.transform(),
            shape: p.shape.clone(),
        });
        let world = RapierQueryWorld::build(statics.chain(moving), dt);

        let mut platforms = Vec::new();
        let mut by_handle = HashMap::new();
        for config in &scene.platforms {
            let Some(handle) = world.handle(config.id) else {
                log::warn!("platform {} has no collider, skipping", config.id);
                continue;
            };
            by_handle.insert(handle, platforms.len());
            platforms.push(Platform::new(config, handle));
        }

        Self {
            world,
            platforms,
            by_handle,
        }
    }

    #[inline]
    pub fn query_world(&self) -> &RapierQueryWorld {
        &self.world
    }

    pub fn platforms(&self) -> impl Iterator<Item = &Platform> {
        self.platforms
            .iter()
            .filter(|p| self.by_handle.contains_key(&p.handle))
    }

    /// Move every live platform by one tick and remove the ones that expire at `tick`.
    pub fn step_platforms(&mut self, tick: u64, dt: f32) {
        for platform in &mut self.platforms {
            if !self.by_handle.contains_key(&platform.handle) {
                continue;
            }
            if platform.expires_at(tick) {
                log::info!("tick {tick}: platform {} destroyed", platform.id);
                self.by_handle.remove(&platform.handle);
                self.world.remove(platform.handle);
                continue;
            }
            let pose = platform.advance(dt);
            self.world.set_pose_with_dt(platform.handle, pose, dt);
        }
        self.world.refresh(dt);
    }
}

impl GroundRegistry<ColliderHandle> for SceneWorld {
    fn pose(&self, floor: ColliderHandle) -> Option<Transform> {
        self.world.pose(floor)
    }

    fn moving_ground(&self, floor: ColliderHandle) -> Option<&dyn MovingGround> {
        let index = *self.by_handle.get(&floor)?;
        Some(&self.platforms[index] as &dyn MovingGround)
    }
}
