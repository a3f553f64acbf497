//! Collision detection between entity categories
//!
//! Everything here is a pure function over snapshots of pool contents. The
//! engine never mutates entities; gameplay reads the `CollisionReport` and
//! flags what it resolves. Entities whose geometry is malformed (`bounds()`
//! returns `None`) are skipped in every pass, as if already removed.

use serde::{Deserialize, Serialize};

use super::aabb::Aabb;
use super::entity::{Collider, EntityId};
use super::state::SimContext;

/// One resolved intersection, `(subject, other)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pair {
    pub a: EntityId,
    pub b: EntityId,
}

impl Pair {
    pub fn new(a: EntityId, b: EntityId) -> Self {
        Self { a, b }
    }
}

/// Every intersection found in one frame. Rebuilt from scratch each frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CollisionReport {
    /// (player, hostile) body contact; at most one per frame
    pub player_hostile: Vec<Pair>,
    /// (hostile projectile, player) hits
    pub hostile_projectile_player: Vec<Pair>,
    /// (player, pickup) collections
    pub player_pickup: Vec<Pair>,
    /// (player projectile, hostile) hits
    pub projectile_hostile: Vec<Pair>,
    /// (player projectile, destructible) hits
    pub projectile_destructible: Vec<Pair>,
}

impl CollisionReport {
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Number of pairs across all categories
    pub fn total(&self) -> usize {
        self.player_hostile.len()
            + self.hostile_projectile_player.len()
            + self.player_pickup.len()
            + self.projectile_hostile.len()
            + self.projectile_destructible.len()
    }

    /// True if anything touched the player this frame
    pub fn player_hit(&self) -> bool {
        !self.player_hostile.is_empty() || !self.hostile_projectile_player.is_empty()
    }
}

/// Strict AABB overlap; boxes that only share an edge do not intersect
#[inline]
pub fn intersects(a: &Aabb, b: &Aabb) -> bool {
    a.intersects(b)
}

/// First candidate, in slice (insertion) order, whose box overlaps `subject`.
///
/// Older entities are checked first, so the result is deterministic but
/// biased toward the oldest contact.
pub fn first_contact<'a, S, C>(subject: &S, candidates: &'a [C]) -> Option<&'a C>
where
    S: Collider + ?Sized,
    C: Collider,
{
    let subject_box = subject.bounds()?;
    candidates
        .iter()
        .find(|c| c.bounds().is_some_and(|b| intersects(&subject_box, &b)))
}

/// Every intersecting `(a, b)` pair, in `a`-major insertion order. O(|A|·|B|).
pub fn all_pairs<'a, 'b, A, B>(set_a: &'a [A], set_b: &'b [B]) -> Vec<(&'a A, &'b B)>
where
    A: Collider,
    B: Collider,
{
    if set_a.is_empty() || set_b.is_empty() {
        return Vec::new();
    }

    // Extract B's boxes once; malformed entries drop out here
    let b_boxes: Vec<(&'b B, Aabb)> = set_b
        .iter()
        .filter_map(|b| b.bounds().map(|bb| (b, bb)))
        .collect();

    let mut pairs = Vec::new();
    for a in set_a {
        let Some(a_box) = a.bounds() else {
            continue;
        };
        for (b, b_box) in &b_boxes {
            if intersects(&a_box, b_box) {
                pairs.push((a, *b));
            }
        }
    }
    pairs
}

fn to_pairs<A: Collider, B: Collider>(pairs: Vec<(&A, &B)>) -> Vec<Pair> {
    pairs
        .into_iter()
        .map(|(a, b)| Pair::new(a.id(), b.id()))
        .collect()
}

/// Run every category pass in fixed order and assemble the frame's report:
/// player–hostile, player–hostile projectile, player–pickup,
/// player projectile–hostile, player projectile–destructible.
pub fn process(ctx: &SimContext) -> CollisionReport {
    let mut report = CollisionReport::default();

    if let Some(player) = ctx.player.as_ref().filter(|p| p.bounds().is_some()) {
        if let Some(hostile) = first_contact(player, ctx.hostiles.as_slice()) {
            report.player_hostile.push(Pair::new(player.id(), hostile.id()));
        }

        let player_slice = std::slice::from_ref(player);
        report.hostile_projectile_player =
            to_pairs(all_pairs(ctx.hostile_projectiles.as_slice(), player_slice));

        report.player_pickup = to_pairs(all_pairs(player_slice, ctx.pickups.as_slice()));
    }

    report.projectile_hostile = to_pairs(all_pairs(
        ctx.player_projectiles.as_slice(),
        ctx.hostiles.as_slice(),
    ));
    report.projectile_destructible = to_pairs(all_pairs(
        ctx.player_projectiles.as_slice(),
        ctx.destructibles.as_slice(),
    ));

    report
}
