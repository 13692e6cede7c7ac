//! Overlap push-out.
//!
//! Goal:
//! - After a resolution, nudge the agent out of anything it still overlaps (moving platforms
//!   closing in on it, spawns inside geometry, numeric drift).
//!
//! Notes:
//! - Each overlap is corrected by at most `max_push_speed * dt`, so deep embeddings are resolved
//!   over several ticks instead of teleporting the agent.
//! - Penetration is re-queried at the updated position for each collider, so pushes accumulate.
//! - Failed or degenerate penetration queries are skipped for the tick; movement never halts.

use crate::{
    query::ShapeQueryProvider,
    settings::EPSILON,
    types::{Quat, Vec3},
};

/// Result of one overlap push pass.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct OverlapPush {
    /// Corrected agent position.
    pub position: Vec3,
    /// Sum of all displacements applied.
    pub total_push: Vec3,
    /// Number of overlaps that moved the agent.
    pub pushed: usize,
    /// Number of overlaps skipped because their penetration was degenerate.
    pub skipped: usize,
}

impl OverlapPush {
    #[inline]
    pub fn moved(&self) -> bool {
        self.pushed > 0
    }
}

/// Push the agent out of every collider it overlaps at `position`.
pub fn push_out_of_overlaps<P: ShapeQueryProvider + ?Sized>(
    provider: &P,
    position: Vec3,
    rotation: Quat,
    max_push_speed: f32,
    dt: f32,
) -> OverlapPush {
    let mut result = OverlapPush {
        position,
        total_push: Vec3::zeros(),
        pushed: 0,
        skipped: 0,
    };

    let max_step = (max_push_speed * dt).max(0.0);
    if max_step <= 0.0 {
        return result;
    }

    for collider in provider.overlapping(position, rotation) {
        // Earlier pushes may already have separated this one.
        let Some(penetration) = provider.penetration(result.position, rotation, collider) else {
            continue;
        };
        if penetration.is_degenerate() {
            log::warn!("skipping degenerate penetration against {collider:?}: {penetration:?}");
            result.skipped += 1;
            continue;
        }

        let step = max_step.min(penetration.distance + 2.0 * EPSILON);
        let push = penetration.direction.normalize() * step;
        result.position += push;
        result.total_push += push;
        result.pushed += 1;
    }

    if result.moved() {
        log::debug!(
            "overlap push {:.4}m from {} collider(s)",
            result.total_push.norm(),
            result.pushed
        );
    }
    result
}
