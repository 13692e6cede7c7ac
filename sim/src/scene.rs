//! TOML scene description.
//!
//! A scene is a set of static colliders, scripted moving platforms and one agent with a
//! scripted intent timeline. Every table has defaults, so small scenes stay small:
//!
//! ```toml
//! ticks = 300
//!
//! [agent]
//! position = [0.0, 1.2, 0.0]
//!
//! [[agent.intent]]
//! from_tick = 0
//! walk = [1.0, 0.0, 0.0]
//!
//! [[colliders]]
//! id = 1
//! shape = { type = "plane" }
//! ```

use std::{collections::HashSet, path::Path};

use kcc::{CapsuleSpec, ColliderDef, ColliderShapeDef, KccSettings, Quat, Transform, Vec3};
use serde::Deserialize;

use crate::{error::SimError, runner::DEFAULT_TICK_HZ};

/// Root of a scene file.
#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct SceneConfig {
    /// Number of ticks `kcc-sim` runs when no override is given.
    #[serde(default = "default_ticks")]
    pub ticks: u64,
    #[serde(default = "default_tick_hz")]
    pub tick_hz: u32,
    #[serde(default)]
    pub settings: KccSettings,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub colliders: Vec<ColliderConfig>,
    #[serde(default)]
    pub platforms: Vec<PlatformConfig>,
}

fn default_ticks() -> u64 {
    600
}

fn default_tick_hz() -> u32 {
    DEFAULT_TICK_HZ
}

/// The simulated agent.
#[derive(Clone, Debug, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AgentConfig {
    pub position: Vec3,
    pub capsule: CapsuleSpec,
    /// Intent segments; each applies from its `from_tick` until the next one starts.
    pub intent: Vec<IntentSegment>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 1.0, 0.0),
            capsule: CapsuleSpec::default(),
            intent: Vec::new(),
        }
    }
}

impl AgentConfig {
    /// Intent active at `tick`. Jumps fire only on a segment's first tick.
    pub fn intent_at(&self, tick: u64) -> (Vec3, bool) {
        self.intent
            .iter()
            .filter(|s| s.from_tick <= tick)
            .max_by_key(|s| s.from_tick)
            .map_or((Vec3::zeros(), false), |s| {
                (s.walk, s.jump && s.from_tick == tick)
            })
    }
}

#[derive(Clone, Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IntentSegment {
    pub from_tick: u64,
    #[serde(default = "Vec3::zeros")]
    pub walk: Vec3,
    #[serde(default)]
    pub jump: bool,
}

/// Pose of a collider as written in a scene file.
#[derive(Clone, Copy, Debug, Default, Deserialize)]
#[serde(default)]
pub struct PoseConfig {
    pub translation: Vec3,
    /// Euler angles in degrees (roll, pitch, yaw about x, y, z).
    pub rotation_deg: Vec3,
}

impl PoseConfig {
    pub fn transform(&self) -> Transform {
        let r = self.rotation_deg.map(f32::to_radians);
        Transform::new(self.translation, Quat::from_euler_angles(r.x, r.y, r.z))
    }
}

/// A static collider.
#[derive(Clone, Debug, Deserialize)]
pub struct ColliderConfig {
    pub id: u32,
    #[serde(flatten)]
    pub pose: PoseConfig,
    pub shape: ColliderShapeDef,
}

impl ColliderConfig {
    pub fn def(&self) -> ColliderDef {
        ColliderDef {
            id: self.id,
            pose: self.pose.transform(),
            shape: self.shape.clone(),
        }
    }
}

/// A scripted moving platform.
#[derive(Clone, Debug, Deserialize)]
pub struct PlatformConfig {
    pub id: u32,
    #[serde(flatten)]
    pub pose: PoseConfig,
    pub shape: ColliderShapeDef,
    /// Meters per second.
    #[serde(default = "Vec3::zeros")]
    pub linear_velocity: Vec3,
    /// Degrees per second about each world axis, around the platform origin.
    #[serde(default = "Vec3::zeros")]
    pub angular_velocity_deg: Vec3,
    /// Extra velocity of the surface itself (conveyor belts); does not move the platform.
    #[serde(default = "Vec3::zeros")]
    pub surface_velocity: Vec3,
    /// `false` makes the platform push the agent without carrying it kinematically.
    #[serde(default = "default_true")]
    pub attach: bool,
    #[serde(default = "default_weight")]
    pub movement_weight: f32,
    #[serde(default = "default_weight")]
    pub transfer_momentum_weight: f32,
    #[serde(default)]
    pub avoid_transfer_momentum: bool,
    /// Tick at which the platform is removed from the world.
    #[serde(default)]
    pub destroy_at_tick: Option<u64>,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f32 {
    1.0
}

impl SceneConfig {
    /// Parse and validate a scene document.
    pub fn from_toml_str(content: &str) -> Result<Self, SimError> {
        let scene: SceneConfig = toml::from_str(content)?;
        scene.validate()?;
        Ok(scene)
    }

    pub fn from_file(path: &Path) -> Result<Self, SimError> {
        let content =
            std::fs::read_to_string(path).map_err(|e| SimError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    pub fn validate(&self) -> Result<(), SimError> {
        self.settings.validate()?;

        if self.tick_hz == 0 {
            return Err(SimError::InvalidScene("`tick_hz` must be positive".into()));
        }

        let capsule = &self.agent.capsule;
        if !(capsule.radius > 0.0 && capsule.half_height >= 0.0) {
            return Err(SimError::InvalidScene(format!(
                "agent capsule must have a positive radius, got {capsule:?}"
            )));
        }

        let mut ids = HashSet::new();
        let all_ids = self
            .colliders
            .iter()
            .map(|c| c.id)
            .chain(self.platforms.iter().map(|p| p.id));
        for id in all_ids {
            if !ids.insert(id) {
                return Err(SimError::InvalidScene(format!("duplicate collider id {id}")));
            }
        }

        for platform in &self.platforms {
            for (name, weight) in [
                ("movement_weight", platform.movement_weight),
                ("transfer_momentum_weight", platform.transfer_momentum_weight),
            ] {
                if !(0.0..=1.0).contains(&weight) {
                    return Err(SimError::InvalidScene(format!(
                        "platform {}: `{name}` must be in [0, 1], got {weight}",
                        platform.id
                    )));
                }
            }
        }
        Ok(())
    }

    /// Seconds per tick.
    pub fn tick_dt(&self) -> f32 {
        1.0 / self.tick_hz as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCENE: &str = r#"
        ticks = 120
        tick_hz = 30

        [settings]
        max_bounces = 4

        [agent]
        position = [0.0, 1.5, 0.0]
        capsule = { radius = 0.3, half_height = 0.6 }

        [[agent.intent]]
        from_tick = 0
        walk = [1.0, 0.0, 0.0]

        [[agent.intent]]
        from_tick = 10
        jump = true

        [[colliders]]
        id = 1
        shape = { type = "plane" }

        [[platforms]]
        id = 2
        translation = [4.0, 0.0, 0.0]
        rotation_deg = [0.0, 90.0, 0.0]
        shape = { type = "cuboid", half_extents = [1.0, 0.25, 1.0] }
        linear_velocity = [0.0, 0.0, 1.0]
        attach = false
    "#;

    #[test]
    fn parses_a_full_scene() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        assert_eq!(scene.ticks, 120);
        assert_eq!(scene.settings.max_bounces, 4);
        assert_eq!(scene.agent.capsule.radius, 0.3);
        assert_eq!(scene.colliders[0].shape, ColliderShapeDef::Plane { offset_along_normal: 0.0 });
        assert_eq!(scene.platforms[0].pose.translation, Vec3::new(4.0, 0.0, 0.0));
        assert!(!scene.platforms[0].attach);
        assert_eq!(scene.platforms[0].transfer_momentum_weight, 1.0);
    }

    #[test]
    fn intent_timeline_switches_segments_and_fires_jumps_once() {
        let scene = SceneConfig::from_toml_str(SCENE).unwrap();
        assert_eq!(scene.agent.intent_at(0), (Vec3::new(1.0, 0.0, 0.0), false));
        assert_eq!(scene.agent.intent_at(9).0, Vec3::new(1.0, 0.0, 0.0));
        assert_eq!(scene.agent.intent_at(10), (Vec3::zeros(), true));
        assert_eq!(scene.agent.intent_at(11), (Vec3::zeros(), false));
    }

    #[test]
    fn rejects_duplicate_ids() {
        let doc = r#"
            [[colliders]]
            id = 1
            shape = { type = "plane" }

            [[platforms]]
            id = 1
            shape = { type = "sphere", radius = 1.0 }
        "#;
        let err = SceneConfig::from_toml_str(doc).unwrap_err();
        assert!(matches!(err, SimError::InvalidScene(_)));
    }

    #[test]
    fn rejects_invalid_settings() {
        let err = SceneConfig::from_toml_str("[settings]\npush_decay = -1.0").unwrap_err();
        assert!(matches!(err, SimError::Settings(_)));
    }

    #[test]
    fn rejects_unknown_fields() {
        let err = SceneConfig::from_toml_str("tick_rate = 5").unwrap_err();
        assert!(matches!(err, SimError::Parse(_)));
    }
}
