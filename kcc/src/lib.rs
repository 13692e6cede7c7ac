pub mod bounce;
pub mod grounded;
pub mod motor;
pub mod moving_ground;
pub mod overlap;
pub mod query;
pub mod rapier_world;
pub mod settings;
pub mod types;

#[cfg(test)]
mod test_support;

pub use bounce::{
    Bounce, BounceAction, Bounces, NoPush, PushEvent, PushListener, resolve, resolve_with_pusher,
    snap_down,
};
pub use grounded::{GroundCheck, GroundedState, check_grounded};
pub use motor::{CharacterMotor, MotorInput, TickReport};
pub use moving_ground::{
    Attachment, AttachmentEvent, GroundRegistry, MovingGround, MovingGroundTracker,
    RelativeParentState, StaticGround, departure_velocity, push_only_displacement,
};
pub use overlap::{OverlapPush, push_out_of_overlaps};
pub use query::ShapeQueryProvider;
pub use rapier_world::{
    ColliderDef, ColliderShapeDef, RapierQueryWorld, RapierShapeQuery, SampledMotion,
    collider_from_def,
};
pub use settings::{
    EPSILON, GRAVITY_MPS2, KccSettings, MIN_MOVE_DISTANCE, MovementConfig, OVERLAP_DISTANCE,
    SettingsError,
};
pub use types::{CapsuleSpec, Iso, Penetration, Quat, RayHit, ShapeHit, Transform, Vec3};
