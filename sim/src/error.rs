use std::path::PathBuf;

use kcc::SettingsError;
use thiserror::Error;

/// Errors surfaced while loading or running a scene.
#[derive(Debug, Error)]
pub enum SimError {
    #[error("failed to read {}: {1}", .0.display())]
    Io(PathBuf, #[source] std::io::Error),
    #[error("failed to parse scene: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid agent settings: {0}")]
    Settings(#[from] SettingsError),
    #[error("invalid scene: {0}")]
    InvalidScene(String),
}
