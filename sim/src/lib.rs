pub mod error;
pub mod platform;
pub mod runner;
pub mod scene;
pub mod world;

pub use error::SimError;
pub use platform::Platform;
pub use runner::{DEFAULT_TICK_HZ, MAX_DT_S, Runner, TickSample};
pub use scene::SceneConfig;
pub use world::SceneWorld;
