/*!
Kinematic character controller (KCC) settings and tolerances.

These constants centralize the parameters used by the bounce resolver, the grounded-state
evaluator and the motor. Keeping them together makes tuning easier and helps ensure
deterministic behavior across platforms.

Notes
- Distances are in meters, time in seconds, angles in degrees unless a name says otherwise.
- Favor practical world-space tolerances over machine epsilon for robust behavior.
- `KccSettings` holds per-agent tuning that can be loaded from TOML; the constants below are
  its defaults and the fixed tolerances the algorithms rely on.
*/

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use crate::{grounded::GroundCheck, types::Vec3};

/// Separation kept from surfaces when a cast stops at a contact (meters).
/// Too large creates visible gaps; too small risks re-embedding on the next cast.
pub const EPSILON: f32 = 0.001;

/// Displacements shorter than this are treated as no movement at all (meters).
pub const MIN_MOVE_DISTANCE: f32 = 1.0e-5;

/// Cast hits at or below this distance mean the agent already overlaps the obstruction.
pub const OVERLAP_DISTANCE: f32 = 1.0e-6;

/// Default maximum number of bounces per resolution call.
pub const DEFAULT_MAX_BOUNCES: u32 = 5;

/// Default fraction of momentum kept after the agent has been pushed out of an overlap.
pub const DEFAULT_PUSH_DECAY: f32 = 0.9;

/// Default exponent of the angle damping term applied after each bounce.
pub const DEFAULT_ANGLE_POWER: f32 = 0.5;

/// Default maximum step height the agent can climb (meters).
pub const DEFAULT_VERTICAL_SNAP_UP: f32 = 0.325;

/// Default clear horizontal depth required on top of a step (meters).
pub const DEFAULT_STEP_UP_DEPTH: f32 = 0.2;

/// Default distance the agent is pulled down to stay on descending ground (meters).
pub const DEFAULT_VERTICAL_SNAP_DOWN: f32 = 0.25;

/// Default distance under which the agent counts as touching the ground (meters).
pub const DEFAULT_GROUNDED_THRESHOLD: f32 = 0.01;

/// Default steepest walkable slope (degrees between surface normal and up).
pub const DEFAULT_MAX_WALK_ANGLE_DEG: f32 = 52.0;

/// Default length of the downward ground cast (meters).
pub const DEFAULT_GROUND_CAST_DISTANCE: f32 = 0.25;

/// Default maximum speed used to push the agent out of overlaps (meters per second).
pub const DEFAULT_MAX_PUSH_SPEED: f32 = 100.0;

/// Gravity magnitude in meters per second squared (positive value).
/// Integrate as an acceleration along `-up`.
pub const GRAVITY_MPS2: f32 = 9.81;

/// Default jump take-off speed along `up` (meters per second).
pub const DEFAULT_JUMP_VELOCITY: f32 = 5.0;

/// Per-agent movement tuning.
///
/// Every field has a default, so a TOML file only needs the values it overrides.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(default)]
pub struct KccSettings {
    /// World up direction. Normalized on use.
    pub up: Vec3,
    pub max_bounces: u32,
    pub push_decay: f32,
    pub angle_power: f32,
    pub vertical_snap_up: f32,
    pub step_up_depth: f32,
    pub vertical_snap_down: f32,
    pub max_walk_angle_deg: f32,
    pub grounded_threshold: f32,
    pub ground_cast_distance: f32,
    pub max_push_speed: f32,
    /// Gravity acceleration vector (m/s^2).
    pub gravity: Vec3,
    pub jump_velocity: f32,
}

impl Default for KccSettings {
    fn default() -> Self {
        Self {
            up: Vec3::y(),
            max_bounces: DEFAULT_MAX_BOUNCES,
            push_decay: DEFAULT_PUSH_DECAY,
            angle_power: DEFAULT_ANGLE_POWER,
            vertical_snap_up: DEFAULT_VERTICAL_SNAP_UP,
            step_up_depth: DEFAULT_STEP_UP_DEPTH,
            vertical_snap_down: DEFAULT_VERTICAL_SNAP_DOWN,
            max_walk_angle_deg: DEFAULT_MAX_WALK_ANGLE_DEG,
            grounded_threshold: DEFAULT_GROUNDED_THRESHOLD,
            ground_cast_distance: DEFAULT_GROUND_CAST_DISTANCE,
            max_push_speed: DEFAULT_MAX_PUSH_SPEED,
            gravity: Vec3::new(0.0, -GRAVITY_MPS2, 0.0),
            jump_velocity: DEFAULT_JUMP_VELOCITY,
        }
    }
}

/// Errors that can occur when loading or validating [`KccSettings`].
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("`{field}` is out of range: {value}")]
    OutOfRange { field: &'static str, value: f32 },
    #[error("`up` must be a non-zero finite vector")]
    DegenerateUp,
}

impl KccSettings {
    /// Parse settings from a TOML document and validate them.
    pub fn from_toml_str(content: &str) -> Result<Self, SettingsError> {
        let settings: KccSettings = toml::from_str(content)?;
        settings.validate()?;
        Ok(settings)
    }

    /// Load settings from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self, SettingsError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| SettingsError::Io(path.to_path_buf(), e))?;
        Self::from_toml_str(&content)
    }

    /// Reject values the algorithms cannot work with.
    pub fn validate(&self) -> Result<(), SettingsError> {
        if !self.up.iter().all(|c| c.is_finite()) || self.up.norm_squared() <= 1.0e-12 {
            return Err(SettingsError::DegenerateUp);
        }

        let in_range = |field: &'static str, value: f32, ok: bool| {
            if ok && value.is_finite() {
                Ok(())
            } else {
                Err(SettingsError::OutOfRange { field, value })
            }
        };

        in_range(
            "push_decay",
            self.push_decay,
            (0.0..=1.0).contains(&self.push_decay),
        )?;
        in_range("angle_power", self.angle_power, self.angle_power >= 0.0)?;
        in_range(
            "vertical_snap_up",
            self.vertical_snap_up,
            self.vertical_snap_up >= 0.0,
        )?;
        in_range("step_up_depth", self.step_up_depth, self.step_up_depth >= 0.0)?;
        in_range(
            "vertical_snap_down",
            self.vertical_snap_down,
            self.vertical_snap_down >= 0.0,
        )?;
        in_range(
            "max_walk_angle_deg",
            self.max_walk_angle_deg,
            self.max_walk_angle_deg > 0.0 && self.max_walk_angle_deg <= 90.0,
        )?;
        in_range(
            "grounded_threshold",
            self.grounded_threshold,
            self.grounded_threshold > 0.0,
        )?;
        in_range(
            "ground_cast_distance",
            self.ground_cast_distance,
            self.ground_cast_distance >= self.grounded_threshold,
        )?;
        in_range(
            "max_push_speed",
            self.max_push_speed,
            self.max_push_speed >= 0.0,
        )?;
        in_range("jump_velocity", self.jump_velocity, self.jump_velocity >= 0.0)?;
        Ok(())
    }

    /// Unit up vector.
    #[inline]
    pub fn up(&self) -> Vec3 {
        self.up.normalize()
    }

    /// Build the parameter bundle for one bounce resolution.
    pub fn movement_config(&self, attempting_jump: bool, can_snap_up: bool) -> MovementConfig {
        MovementConfig {
            max_bounces: self.max_bounces,
            push_decay: self.push_decay,
            vertical_snap_up: self.vertical_snap_up,
            step_up_depth: self.step_up_depth,
            angle_power: self.angle_power,
            max_walk_angle_deg: self.max_walk_angle_deg,
            attempting_jump,
            can_snap_up,
            up: self.up(),
        }
    }

    /// Build the parameters for the downward ground cast.
    pub fn ground_check(&self) -> GroundCheck {
        GroundCheck {
            up: self.up(),
            cast_distance: self.ground_cast_distance,
            grounded_threshold: self.grounded_threshold,
            max_walk_angle_deg: self.max_walk_angle_deg,
            snap_down_distance: self.vertical_snap_down,
        }
    }
}

/// Immutable parameters for a single bounce resolution call.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct MovementConfig {
    /// Upper bound on slide iterations. The resolver emits at most `max_bounces + 2` bounces.
    pub max_bounces: u32,
    /// Fraction of momentum kept after an overlap push, in [0, 1].
    pub push_decay: f32,
    /// Maximum step height that can be climbed.
    pub vertical_snap_up: f32,
    /// Clear horizontal travel required on top of a step to accept the climb.
    pub step_up_depth: f32,
    /// Exponent of the angle damping term.
    pub angle_power: f32,
    /// Surfaces steeper than this are obstructions rather than floors.
    pub max_walk_angle_deg: f32,
    pub attempting_jump: bool,
    pub can_snap_up: bool,
    /// Unit world up direction.
    pub up: Vec3,
}

impl Default for MovementConfig {
    fn default() -> Self {
        KccSettings::default().movement_config(false, true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_document_uses_defaults() {
        let settings = KccSettings::from_toml_str("").unwrap();
        assert_eq!(settings, KccSettings::default());
    }

    #[test]
    fn parse_overrides_selected_fields() {
        let toml = r#"
            up = [0.0, 0.0, 2.0]
            max_bounces = 8
            angle_power = 2.0
            gravity = [0.0, 0.0, -20.0]
        "#;
        let settings = KccSettings::from_toml_str(toml).unwrap();
        assert_eq!(settings.max_bounces, 8);
        assert_eq!(settings.angle_power, 2.0);
        assert_eq!(settings.up(), Vec3::z());
        assert_eq!(settings.gravity, Vec3::new(0.0, 0.0, -20.0));
        assert_eq!(settings.vertical_snap_up, DEFAULT_VERTICAL_SNAP_UP);
    }

    #[test]
    fn validate_rejects_push_decay_outside_unit_range() {
        let err = KccSettings::from_toml_str("push_decay = 1.5").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::OutOfRange {
                field: "push_decay",
                ..
            }
        ));
    }

    #[test]
    fn validate_rejects_zero_up() {
        let err = KccSettings::from_toml_str("up = [0.0, 0.0, 0.0]").unwrap_err();
        assert!(matches!(err, SettingsError::DegenerateUp));
    }

    #[test]
    fn validate_rejects_non_positive_grounded_threshold() {
        let err = KccSettings::from_toml_str("grounded_threshold = 0.0").unwrap_err();
        assert!(matches!(
            err,
            SettingsError::OutOfRange {
                field: "grounded_threshold",
                ..
            }
        ));
    }

    #[test]
    fn parse_errors_are_reported() {
        let err = KccSettings::from_toml_str("max_bounces = \"many\"").unwrap_err();
        assert!(matches!(err, SettingsError::Parse(_)));
    }

    #[test]
    fn movement_config_carries_flags_and_unit_up() {
        let settings = KccSettings {
            up: Vec3::new(0.0, 3.0, 0.0),
            ..KccSettings::default()
        };
        let config = settings.movement_config(true, false);
        assert!(config.attempting_jump);
        assert!(!config.can_snap_up);
        assert_eq!(config.up, Vec3::y());
        assert_eq!(config.max_bounces, DEFAULT_MAX_BOUNCES);
    }
}
