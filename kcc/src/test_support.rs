//! Analytic query providers for unit tests.

use std::{cell::RefCell, collections::VecDeque};

use crate::{
    query::ShapeQueryProvider,
    types::{Penetration, Quat, RayHit, ShapeHit, Vec3},
};

/// Reports the same cast result for every cast, ignoring the requested distance.
pub struct FixedHit {
    pub hit: Option<ShapeHit<u32>>,
}

impl FixedHit {
    pub fn none() -> Self {
        Self { hit: None }
    }

    pub fn at(distance: f32, normal: Vec3) -> Self {
        Self {
            hit: Some(ShapeHit {
                distance,
                point: Vec3::zeros(),
                normal,
                collider: 1,
            }),
        }
    }
}

impl ShapeQueryProvider for FixedHit {
    type Collider = u32;

    fn cast_self(&self, _: Vec3, _: Quat, _: Vec3, _: f32) -> Option<ShapeHit<u32>> {
        self.hit
    }

    fn overlapping(&self, _: Vec3, _: Quat) -> Vec<u32> {
        Vec::new()
    }

    fn penetration(&self, _: Vec3, _: Quat, _: u32) -> Option<Penetration> {
        None
    }

    fn raycast(&self, _: Vec3, _: Vec3, _: f32) -> Option<RayHit<u32>> {
        None
    }
}

/// Replays a queue of cast results, one per call, then reports no hits.
#[derive(Default)]
pub struct ScriptedCasts {
    pub casts: RefCell<VecDeque<Option<ShapeHit<u32>>>>,
    pub calls: RefCell<Vec<(Vec3, Vec3, f32)>>,
}

impl ScriptedCasts {
    pub fn new(casts: impl IntoIterator<Item = Option<ShapeHit<u32>>>) -> Self {
        Self {
            casts: RefCell::new(casts.into_iter().collect()),
            calls: RefCell::new(Vec::new()),
        }
    }
}

impl ShapeQueryProvider for ScriptedCasts {
    type Collider = u32;

    fn cast_self(
        &self,
        position: Vec3,
        _: Quat,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<ShapeHit<u32>> {
        self.calls
            .borrow_mut()
            .push((position, direction, max_distance));
        self.casts.borrow_mut().pop_front().flatten()
    }

    fn overlapping(&self, _: Vec3, _: Quat) -> Vec<u32> {
        Vec::new()
    }

    fn penetration(&self, _: Vec3, _: Quat, _: u32) -> Option<Penetration> {
        None
    }

    fn raycast(&self, _: Vec3, _: Vec3, _: f32) -> Option<RayHit<u32>> {
        None
    }
}

/// Infinite plane `normal . x = offset`; the solid side is behind the normal.
#[derive(Clone, Copy, Debug)]
pub struct Plane {
    pub normal: Vec3,
    pub offset: f32,
}

impl Plane {
    pub fn new(normal: Vec3, point: Vec3) -> Self {
        let normal = normal.normalize();
        Self {
            normal,
            offset: normal.dot(&point),
        }
    }
}

/// A sphere agent against a set of infinite planes. Collider ids are plane indices.
pub struct SpherePlanes {
    pub radius: f32,
    pub planes: Vec<Plane>,
}

impl SpherePlanes {
    fn clearance(&self, plane: &Plane, center: &Vec3) -> f32 {
        plane.normal.dot(center) - plane.offset - self.radius
    }
}

impl ShapeQueryProvider for SpherePlanes {
    type Collider = u32;

    fn cast_self(
        &self,
        position: Vec3,
        _: Quat,
        direction: Vec3,
        max_distance: f32,
    ) -> Option<ShapeHit<u32>> {
        let mut best: Option<ShapeHit<u32>> = None;
        for (i, plane) in self.planes.iter().enumerate() {
            let approach = -plane.normal.dot(&direction);
            if approach <= 0.0 {
                continue;
            }
            let clearance = self.clearance(plane, &position);
            let distance = (clearance / approach).max(0.0);
            if distance > max_distance {
                continue;
            }
            if best.is_none_or(|b| distance < b.distance) {
                best = Some(ShapeHit {
                    distance,
                    point: position + direction * distance - plane.normal * self.radius,
                    normal: plane.normal,
                    collider: i as u32,
                });
            }
        }
        best
    }

    fn overlapping(&self, position: Vec3, _: Quat) -> Vec<u32> {
        self.planes
            .iter()
            .enumerate()
            .filter(|(_, p)| self.clearance(p, &position) < 0.0)
            .map(|(i, _)| i as u32)
            .collect()
    }

    fn penetration(&self, position: Vec3, _: Quat, other: u32) -> Option<Penetration> {
        let plane = self.planes.get(other as usize)?;
        let clearance = self.clearance(plane, &position);
        (clearance < 0.0).then(|| Penetration {
            direction: plane.normal,
            distance: -clearance,
        })
    }

    fn raycast(&self, origin: Vec3, direction: Vec3, max_distance: f32) -> Option<RayHit<u32>> {
        let mut best: Option<RayHit<u32>> = None;
        for (i, plane) in self.planes.iter().enumerate() {
            let approach = -plane.normal.dot(&direction);
            if approach <= 0.0 {
                continue;
            }
            let distance = ((plane.normal.dot(&origin) - plane.offset) / approach).max(0.0);
            if distance <= max_distance && best.is_none_or(|b| distance < b.distance) {
                best = Some(RayHit {
                    distance,
                    point: origin + direction * distance,
                    normal: plane.normal,
                    collider: i as u32,
                });
            }
        }
        best
    }

    fn lowest_point(&self, position: Vec3, _: Quat, up: &Vec3) -> Vec3 {
        position - up * self.radius
    }
}
