//! Rapier-based query world and the shape query provider built on it.
//!
//! Design goals
//! - Deterministic: given the same definitions (sorted by `id`), build identical in-memory sets.
//! - Query-only: colliders are inserted without rigid bodies; no dynamics are ever stepped.
//! - Re-posable: moving platforms update their collider pose and refresh the broad phase once
//!   per tick before any agent queries the world.
//! - Floors moved with [`RapierQueryWorld::set_pose_with_dt`] report the velocity sampled from
//!   that pose delta until the next refresh without a move.

// Re-export Rapier so downstream crates can use its types without depending on it directly.
pub use rapier3d;

use std::collections::HashMap;

use rapier3d::{
    na::Translation3,
    parry::{
        query::{self, Ray, ShapeCastOptions},
        shape::{Capsule, Shape},
    },
    prelude::{
        BroadPhaseBvh, Collider, ColliderBuilder, ColliderHandle, ColliderSet,
        IntegrationParameters, IslandManager, NarrowPhase, QueryFilter, QueryPipeline,
        RigidBodySet, SharedShape,
    },
};
use serde::Deserialize;

use crate::{
    moving_ground::{GroundRegistry, MovingGround},
    query::ShapeQueryProvider,
    types::{CapsuleSpec, Iso, Penetration, Quat, RayHit, ShapeHit, Transform, Vec3},
};

/// Canonical, schema-agnostic definition of a world collider.
///
/// Conventions
/// - Units are meters.
/// - For planes the normal is derived from the pose as `rotation * +Y`.
#[derive(Clone, Debug)]
pub struct ColliderDef {
    /// Stable unique identifier used to ensure deterministic insertion order.
    pub id: u32,
    pub pose: Transform,
    pub shape: ColliderShapeDef,
}

/// Supported collider shapes.
#[derive(Clone, Debug, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ColliderShapeDef {
    /// Infinite plane (half-space), offset along its normal.
    ///
    /// In Rapier a half-space is infinite; any finite size is purely a rendering concern.
    Plane {
        #[serde(default)]
        offset_along_normal: f32,
    },

    /// Oriented cuboid with given half-extents.
    Cuboid { half_extents: Vec3 },

    Sphere { radius: f32 },

    /// Y-aligned capsule.
    CapsuleY { radius: f32, half_height: f32 },

    /// Y-aligned cylinder.
    CylinderY { radius: f32, half_height: f32 },

    /// Y-aligned cone.
    ConeY { radius: f32, half_height: f32 },

    /// Rounded cuboid; `border_radius` rounds all edges and corners.
    RoundCuboid {
        half_extents: Vec3,
        border_radius: f32,
    },

    RoundCylinderY {
        radius: f32,
        half_height: f32,
        border_radius: f32,
    },

    RoundConeY {
        radius: f32,
        half_height: f32,
        border_radius: f32,
    },
}

/// World pose of the collider built for `def`.
///
/// Half-spaces are shifted along their normal by the plane offset.
fn collider_pose(def: &ColliderDef) -> Iso {
    match def.shape {
        ColliderShapeDef::Plane {
            offset_along_normal,
        } => {
            let normal = def.pose.rotation * Vec3::y();
            Iso::from_parts(
                Translation3::from(def.pose.translation + normal * offset_along_normal),
                def.pose.rotation,
            )
        }
        _ => def.pose.iso(),
    }
}

/// Build a Rapier collider for `def` with its world pose applied.
pub fn collider_from_def(def: &ColliderDef) -> Collider {
    let builder = match &def.shape {
        ColliderShapeDef::Plane { .. } => {
            ColliderBuilder::new(SharedShape::halfspace(Vec3::y_axis()))
        }

        ColliderShapeDef::Cuboid { half_extents } => {
            ColliderBuilder::cuboid(half_extents.x, half_extents.y, half_extents.z)
        }

        ColliderShapeDef::Sphere { radius } => ColliderBuilder::ball(*radius),

        ColliderShapeDef::CapsuleY {
            radius,
            half_height,
        } => ColliderBuilder::capsule_y(*half_height, *radius),

        ColliderShapeDef::CylinderY {
            radius,
            half_height,
        } => ColliderBuilder::cylinder(*half_height, *radius),

        ColliderShapeDef::ConeY {
            radius,
            half_height,
        } => ColliderBuilder::cone(*half_height, *radius),

        ColliderShapeDef::RoundCuboid {
            half_extents,
            border_radius,
        } => ColliderBuilder::round_cuboid(
            half_extents.x,
            half_extents.y,
            half_extents.z,
            *border_radius,
        ),

        ColliderShapeDef::RoundCylinderY {
            radius,
            half_height,
            border_radius,
        } => ColliderBuilder::round_cylinder(*half_height, *radius, *border_radius),

        ColliderShapeDef::RoundConeY {
            radius,
            half_height,
            border_radius,
        } => ColliderBuilder::round_cone(*half_height, *radius, *border_radius),
    };

    let mut collider = builder.build();
    collider.set_position(collider_pose(def));
    collider
}

/// Rigid velocity of a collider, sampled from its last pose change.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SampledMotion {
    pub linear: Vec3,
    /// Radians per second about world axes, around `center`.
    pub angular: Vec3,
    pub center: Vec3,
}

impl SampledMotion {
    /// Motion taking `from` to `to` over `dt` seconds. Zero for a non-positive `dt`.
    pub fn between(from: &Transform, to: &Transform, dt: f32) -> Self {
        let inv_dt = if dt > 0.0 { 1.0 / dt } else { 0.0 };
        Self {
            linear: (to.translation - from.translation) * inv_dt,
            angular: (to.rotation * from.rotation.inverse()).scaled_axis() * inv_dt,
            center: to.translation,
        }
    }
}

impl MovingGround for SampledMotion {
    fn velocity_at_point(&self, point: &Vec3) -> Vec3 {
        self.linear + self.angular.cross(&(point - self.center))
    }
}

/// In-memory Rapier structures needed for scene queries.
///
/// Colliders are parentless; `RigidBodySet` stays empty but is required by the query API.
pub struct RapierQueryWorld {
    bodies: RigidBodySet,
    colliders: ColliderSet,
    islands: IslandManager,
    broad_phase: BroadPhaseBvh,
    narrow_phase: NarrowPhase,
    handles: HashMap<u32, ColliderHandle>,
    motions: HashMap<ColliderHandle, SampledMotion>,
    modified: Vec<ColliderHandle>,
    removed: Vec<ColliderHandle>,
}

impl RapierQueryWorld {
    /// Build a query world from collider definitions.
    ///
    /// The input is sorted by `id` before insertion. NaN or otherwise invalid values must be
    /// rejected by the caller.
    pub fn build(defs: impl IntoIterator<Item = ColliderDef>, dt: f32) -> Self {
        let mut defs: Vec<_> = defs.into_iter().collect();
        defs.sort_by_key(|d| d.id);

        let mut world = Self {
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhaseBvh::new(),
            narrow_phase: NarrowPhase::default(),
            handles: HashMap::new(),
            motions: HashMap::new(),
            modified: Vec::new(),
            removed: Vec::new(),
        };
        for def in &defs {
            world.insert(def);
        }
        world.refresh(dt);
        log::debug!("built query world with {} collider(s)", world.colliders.len());
        world
    }

    /// Insert a collider. Takes effect for queries after the next [`Self::refresh`].
    pub fn insert(&mut self, def: &ColliderDef) -> ColliderHandle {
        let handle = self.colliders.insert(collider_from_def(def));
        if let Some(previous) = self.handles.insert(def.id, handle) {
            log::warn!("collider id {} inserted twice, replacing {previous:?}", def.id);
            self.remove(previous);
        }
        self.modified.push(handle);
        handle
    }

    /// Handle of the collider inserted with `id`.
    pub fn handle(&self, id: u32) -> Option<ColliderHandle> {
        self.handles.get(&id).copied()
    }

    /// Current world pose of a collider.
    pub fn pose(&self, handle: ColliderHandle) -> Option<Transform> {
        self.colliders
            .get(handle)
            .map(|c| Transform::from(*c.position()))
    }

    /// Teleport a collider. It reports no velocity. Returns `false` for unknown handles.
    pub fn set_pose(&mut self, handle: ColliderHandle, pose: Transform) -> bool {
        let Some(collider) = self.colliders.get_mut(handle) else {
            return false;
        };
        collider.set_position(pose.iso());
        self.motions.remove(&handle);
        self.modified.push(handle);
        true
    }

    /// Move a collider over `dt` seconds and sample its velocity from the pose delta.
    pub fn set_pose_with_dt(&mut self, handle: ColliderHandle, pose: Transform, dt: f32) -> bool {
        let Some(collider) = self.colliders.get_mut(handle) else {
            return false;
        };
        let from = Transform::from(*collider.position());
        collider.set_position(pose.iso());
        self.motions.insert(handle, SampledMotion::between(&from, &pose, dt));
        self.modified.push(handle);
        true
    }

    /// Velocity sampled by the last [`Self::set_pose_with_dt`], if still current.
    pub fn motion(&self, handle: ColliderHandle) -> Option<&SampledMotion> {
        self.motions.get(&handle)
    }

    /// Remove a collider. Its handle stops resolving immediately.
    pub fn remove(&mut self, handle: ColliderHandle) -> bool {
        let removed = self
            .colliders
            .remove(handle, &mut self.islands, &mut self.bodies, false)
            .is_some();
        if removed {
            self.handles.retain(|_, h| *h != handle);
            self.motions.remove(&handle);
            self.modified.retain(|h| *h != handle);
            self.removed.push(handle);
        }
        removed
    }

    /// Push pending insertions, moves and removals into the broad phase.
    ///
    /// Colliders not moved since the previous refresh stop reporting a sampled velocity.
    pub fn refresh(&mut self, dt: f32) {
        let modified = &self.modified;
        self.motions.retain(|h, _| modified.contains(h));
        if self.modified.is_empty() && self.removed.is_empty() {
            return;
        }

        let mut events = Vec::new();
        self.broad_phase.update(
            &IntegrationParameters {
                dt,
                ..IntegrationParameters::default()
            },
            &self.colliders,
            &self.bodies,
            &self.modified,
            &self.removed,
            &mut events,
        );
        self.modified.clear();
        self.removed.clear();
    }

    /// Create a borrowed `QueryPipeline` view for scene queries.
    pub fn query_pipeline<'a>(&'a self, filter: QueryFilter<'a>) -> QueryPipeline<'a> {
        self.broad_phase.as_query_pipeline(
            self.narrow_phase.query_dispatcher(),
            &self.bodies,
            &self.colliders,
            filter,
        )
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }
}

impl GroundRegistry<ColliderHandle> for RapierQueryWorld {
    fn pose(&self, floor: ColliderHandle) -> Option<Transform> {
        RapierQueryWorld::pose(self, floor)
    }

    fn moving_ground(&self, floor: ColliderHandle) -> Option<&dyn MovingGround> {
        self.motion(floor).map(|m| m as &dyn MovingGround)
    }
}

/// [`ShapeQueryProvider`] for a capsule agent in a [`RapierQueryWorld`].
pub struct RapierShapeQuery<'a> {
    world: &'a RapierQueryWorld,
    pipeline: QueryPipeline<'a>,
    dims: CapsuleSpec,
    capsule: Capsule,
}

impl<'a> RapierShapeQuery<'a> {
    /// Query view for a capsule agent. `exclude` is the agent's own collider, if it has one.
    pub fn new(
        world: &'a RapierQueryWorld,
        dims: CapsuleSpec,
        exclude: Option<ColliderHandle>,
    ) -> Self {
        let filter = match exclude {
            Some(handle) => QueryFilter::default().exclude_collider(handle),
            None => QueryFilter::default(),
        };
        Self {
            world,
            pipeline: world.query_pipeline(filter),
            dims,
            capsule: Capsule::new_y(dims.half_height, dims.radius),
        }
    }

    pub fn capsule(&self) -> CapsuleSpec {
        self.dims
    }
}

impl ShapeQueryProvider for RapierShapeQuery<'_> {
    type Collider = ColliderHandle;

    fn cast_self(
        &self,
        position: Vec3,
        rotation: Quat,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<ShapeHit<ColliderHandle>> {
        let iso = Transform::new(position, rotation).iso();
        let mut opts = ShapeCastOptions::with_max_time_of_impact(max_distance.max(0.0));
        opts.stop_at_penetration = true;

        let (handle, hit) =
            self.pipeline
                .cast_shape(&iso, &direction, &self.capsule as &dyn Shape, opts)?;

        // Normal on the obstacle; make sure it opposes the motion.
        let mut normal = hit.normal1.into_inner();
        if normal.dot(&direction) > 0.0 {
            normal = -normal;
        }
        Some(ShapeHit {
            distance: hit.time_of_impact,
            point: hit.witness1.coords,
            normal,
            collider: handle,
        })
    }

    fn overlapping(&self, position: Vec3, rotation: Quat) -> Vec<ColliderHandle> {
        let iso = Transform::new(position, rotation).iso();
        self.pipeline
            .intersect_shape(iso, &self.capsule as &dyn Shape)
            .map(|(handle, _)| handle)
            .collect()
    }

    fn penetration(
        &self,
        position: Vec3,
        rotation: Quat,
        other: ColliderHandle,
    ) -> Option<Penetration> {
        let collider = self.world.colliders.get(other)?;
        let iso = Transform::new(position, rotation).iso();
        let contact = query::contact(
            &iso,
            &self.capsule as &dyn Shape,
            collider.position(),
            collider.shape(),
            0.0,
        )
        .ok()??;

        // `normal1` points from the agent toward the obstacle.
        (contact.dist < 0.0).then(|| Penetration {
            direction: -contact.normal1.into_inner(),
            distance: -contact.dist,
        })
    }

    fn raycast(
        &self,
        origin: Vec3,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<RayHit<ColliderHandle>> {
        let ray = Ray::new(origin.into(), direction);
        let (handle, hit) =
            self.pipeline
                .cast_ray_and_get_normal(&ray, max_distance.max(0.0), true)?;
        Some(RayHit {
            distance: hit.time_of_impact,
            point: origin + direction * hit.time_of_impact,
            normal: hit.normal,
            collider: handle,
        })
    }

    fn lowest_point(&self, position: Vec3, rotation: Quat, up: &Vec3) -> Vec3 {
        let axis = rotation * Vec3::y();
        let along_up = axis.dot(up);
        // Lying across `up`, the whole segment is equally low; its center is the foot.
        let end = if along_up.abs() <= f32::EPSILON {
            Vec3::zeros()
        } else {
            axis * self.dims.half_height * along_up.signum()
        };
        position - end - up * self.dims.radius
    }
}

