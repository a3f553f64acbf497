//! Simulation context
//!
//! Owns every bounded pool, the player and id allocation. The scheduler holds
//! the only instance; gameplay code reaches it through the scheduler to spawn
//! entities and flag the ones it has resolved.

use glam::Vec2;
use rand::Rng;

use super::aabb::{Aabb, Playfield};
use super::degradation::DegradationLevel;
use super::entity::{
    Category, Collider, Destructible, Entity, EntityId, Hostile, Owner, Particle, Pickup,
    PickupKind, Player, Projectile,
};
use super::pool::BoundedPool;
use crate::ms_to_secs;
use crate::settings::Settings;

/// What the render layer needs to draw one entity
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderItem {
    pub id: EntityId,
    pub category: Category,
    pub bounds: Aabb,
}

fn render_items<T: Entity>(pool: &BoundedPool<T>) -> impl Iterator<Item = RenderItem> + '_ {
    let category = pool.category();
    pool.iter().filter_map(move |e| {
        e.bounds().map(|bounds| RenderItem {
            id: e.id(),
            category,
            bounds,
        })
    })
}

/// All pools plus the player, threaded explicitly through each frame
#[derive(Debug, Clone)]
pub struct SimContext {
    /// `None` while the player is dead or not yet spawned
    pub player: Option<Player>,
    pub player_projectiles: BoundedPool<Projectile>,
    pub hostile_projectiles: BoundedPool<Projectile>,
    pub hostiles: BoundedPool<Hostile>,
    pub particles: BoundedPool<Particle>,
    pub pickups: BoundedPool<Pickup>,
    pub destructibles: BoundedPool<Destructible>,
    pub playfield: Playfield,
    level: DegradationLevel,
    /// Gap enforced between particle spawns while degraded
    particle_cooldown_ms: f64,
    particle_cooldown_remaining_ms: f64,
    /// Particle spawn requests refused by the cooldown
    particles_suppressed: u64,
    next_id: u32,
}

impl SimContext {
    pub fn new(settings: &Settings) -> Self {
        let caps = &settings.caps;
        let playfield = Playfield::new(
            settings.playfield_width,
            settings.playfield_height,
            settings.playfield_margin,
        );
        let mut ctx = Self {
            player: None,
            player_projectiles: BoundedPool::new(
                Category::PlayerProjectile,
                caps.get(Category::PlayerProjectile),
            ),
            hostile_projectiles: BoundedPool::new(
                Category::HostileProjectile,
                caps.get(Category::HostileProjectile),
            ),
            hostiles: BoundedPool::new(Category::Hostile, caps.get(Category::Hostile)),
            particles: BoundedPool::new(Category::Particle, caps.get(Category::Particle)),
            pickups: BoundedPool::new(Category::Pickup, caps.get(Category::Pickup)),
            destructibles: BoundedPool::new(
                Category::Destructible,
                caps.get(Category::Destructible),
            ),
            playfield,
            level: DegradationLevel::Normal,
            particle_cooldown_ms: settings.particle_cooldown_ms,
            particle_cooldown_remaining_ms: 0.0,
            particles_suppressed: 0,
            next_id: 1,
        };
        ctx.spawn_player();
        ctx
    }

    /// Allocate a new entity ID
    pub fn next_entity_id(&mut self) -> EntityId {
        let id = EntityId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Place a fresh player at the bottom centre of the playfield
    pub fn spawn_player(&mut self) -> EntityId {
        let id = self.next_entity_id();
        let area = self.playfield.area;
        let start = Vec2::new(area.center().x, area.bottom - area.height() * 0.1);
        self.player = Some(Player::new(id, start));
        id
    }

    /// Move the player to `pos`, spawning one if needed
    pub fn set_player_pos(&mut self, pos: Vec2) {
        if self.player.is_none() {
            self.spawn_player();
        }
        if let Some(player) = self.player.as_mut() {
            player.pos = pos;
        }
    }

    pub fn spawn_projectile(&mut self, owner: Owner, pos: Vec2, vel: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.insert_projectile(Projectile::new(id, owner, pos, vel));
        id
    }

    /// Insert a pre-built projectile into the pool matching its owner
    pub fn insert_projectile(&mut self, projectile: Projectile) {
        match projectile.owner {
            Owner::Player => self.player_projectiles.insert(projectile),
            Owner::Hostile => self.hostile_projectiles.insert(projectile),
        }
    }

    pub fn spawn_hostile(&mut self, pos: Vec2, vel: Vec2, hp: i32) -> EntityId {
        let id = self.next_entity_id();
        self.hostiles.insert(Hostile::new(id, pos, vel, hp));
        id
    }

    pub fn spawn_pickup(&mut self, kind: PickupKind, pos: Vec2) -> EntityId {
        let id = self.next_entity_id();
        self.pickups.insert(Pickup::new(id, kind, pos));
        id
    }

    pub fn spawn_destructible(&mut self, pos: Vec2, size: Vec2, hp: i32) -> EntityId {
        let id = self.next_entity_id();
        self.destructibles
            .insert(Destructible::new(id, pos, size, hp));
        id
    }

    /// Spawn one particle. Returns `None` when the degraded-mode cooldown
    /// refuses the request.
    pub fn spawn_particle(
        &mut self,
        pos: Vec2,
        vel: Vec2,
        life: f32,
        color: [u8; 3],
    ) -> Option<EntityId> {
        if !self.particle_gate_open() {
            return None;
        }
        let id = self.next_entity_id();
        self.particles.insert(Particle::new(id, pos, vel, life, color));
        Some(id)
    }

    /// Emit a radial burst of `count` particles as one creation event.
    /// Returns the number spawned (0 if the cooldown refused it).
    pub fn emit_particle_burst<R: Rng>(
        &mut self,
        rng: &mut R,
        origin: Vec2,
        count: usize,
        color: [u8; 3],
    ) -> usize {
        if count == 0 || !self.particle_gate_open() {
            return 0;
        }
        let mut burst = Vec::with_capacity(count);
        for _ in 0..count {
            let id = self.next_entity_id();
            let angle = rng.random::<f32>() * std::f32::consts::TAU;
            let speed = rng.random_range(50.0..200.0);
            let life = rng.random_range(0.3..0.7);
            let vel = Vec2::new(angle.cos(), angle.sin()) * speed;
            burst.push(Particle::new(id, origin, vel, life, color));
        }
        self.particles.insert_batch(burst);
        count
    }

    fn particle_gate_open(&mut self) -> bool {
        if !self.level.particle_cooldown_enabled() {
            return true;
        }
        if self.particle_cooldown_remaining_ms > 0.0 {
            self.particles_suppressed += 1;
            return false;
        }
        self.particle_cooldown_remaining_ms = self.particle_cooldown_ms;
        true
    }

    /// Adopt a new degradation level on every pool. Called between frames only.
    /// Returns the number of entities evicted by the switch.
    pub fn apply_level(&mut self, level: DegradationLevel) -> usize {
        self.level = level;
        if !level.particle_cooldown_enabled() {
            self.particle_cooldown_remaining_ms = 0.0;
        }
        self.player_projectiles.set_level(level)
            + self.hostile_projectiles.set_level(level)
            + self.hostiles.set_level(level)
            + self.particles.set_level(level)
            + self.pickups.set_level(level)
            + self.destructibles.set_level(level)
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    /// Integrate every pool by `dt_ms`
    pub fn advance(&mut self, dt_ms: f64) {
        let dt = ms_to_secs(dt_ms);
        let field = self.playfield;
        self.player_projectiles.advance(dt, &field);
        self.hostile_projectiles.advance(dt, &field);
        self.hostiles.advance(dt, &field);
        self.particles.advance(dt, &field);
        self.pickups.advance(dt, &field);
        self.destructibles.advance(dt, &field);
        self.particle_cooldown_remaining_ms = (self.particle_cooldown_remaining_ms - dt_ms).max(0.0);
    }

    /// Drop flagged and malformed entities from every pool
    pub fn compact(&mut self) -> usize {
        self.player_projectiles.compact()
            + self.hostile_projectiles.compact()
            + self.hostiles.compact()
            + self.particles.compact()
            + self.pickups.compact()
            + self.destructibles.compact()
    }

    /// Trim every pool to its active cap
    pub fn enforce_caps(&mut self) -> usize {
        self.player_projectiles.enforce_cap()
            + self.hostile_projectiles.enforce_cap()
            + self.hostiles.enforce_cap()
            + self.particles.enforce_cap()
            + self.pickups.enforce_cap()
            + self.destructibles.enforce_cap()
    }

    /// Live pooled entities across every category
    pub fn total_active(&self) -> usize {
        self.player_projectiles.len()
            + self.hostile_projectiles.len()
            + self.hostiles.len()
            + self.particles.len()
            + self.pickups.len()
            + self.destructibles.len()
    }

    /// Live count for one category
    pub fn count(&self, category: Category) -> usize {
        match category {
            Category::PlayerProjectile => self.player_projectiles.len(),
            Category::HostileProjectile => self.hostile_projectiles.len(),
            Category::Hostile => self.hostiles.len(),
            Category::Particle => self.particles.len(),
            Category::Pickup => self.pickups.len(),
            Category::Destructible => self.destructibles.len(),
        }
    }

    /// Entities evicted by cap pressure since start, across all pools
    pub fn evicted_total(&self) -> u64 {
        self.player_projectiles.evicted_total()
            + self.hostile_projectiles.evicted_total()
            + self.hostiles.evicted_total()
            + self.particles.evicted_total()
            + self.pickups.evicted_total()
            + self.destructibles.evicted_total()
    }

    pub fn particles_suppressed(&self) -> u64 {
        self.particles_suppressed
    }

    /// Every well-formed pooled entity, back to front: destructibles,
    /// pickups, hostiles, projectiles, then particles on top
    pub fn render_items(&self) -> impl Iterator<Item = RenderItem> + '_ {
        render_items(&self.destructibles)
            .chain(render_items(&self.pickups))
            .chain(render_items(&self.hostiles))
            .chain(render_items(&self.player_projectiles))
            .chain(render_items(&self.hostile_projectiles))
            .chain(render_items(&self.particles))
    }

    /// Empty every pool and start over with a fresh player
    pub fn reset(&mut self) {
        self.player_projectiles.clear();
        self.hostile_projectiles.clear();
        self.hostiles.clear();
        self.particles.clear();
        self.pickups.clear();
        self.destructibles.clear();
        self.apply_level(DegradationLevel::Normal);
        self.particles_suppressed = 0;
        self.next_id = 1;
        self.spawn_player();
        log::info!("Simulation context reset");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_pcg::Pcg32;

    fn ctx() -> SimContext {
        SimContext::new(&Settings::default())
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut ctx = ctx();
        let a = ctx.spawn_hostile(Vec2::new(100.0, 100.0), Vec2::ZERO, 1);
        let b = ctx.spawn_projectile(Owner::Player, Vec2::new(100.0, 100.0), Vec2::ZERO);
        let c = ctx.spawn_pickup(PickupKind::Score, Vec2::new(100.0, 100.0));
        assert!(a < b && b < c);
        assert!(ctx.player.as_ref().unwrap().id < a);
    }

    #[test]
    fn test_projectiles_routed_by_owner() {
        let mut ctx = ctx();
        ctx.spawn_projectile(Owner::Player, Vec2::new(10.0, 10.0), Vec2::ZERO);
        ctx.spawn_projectile(Owner::Hostile, Vec2::new(10.0, 10.0), Vec2::ZERO);
        ctx.spawn_projectile(Owner::Hostile, Vec2::new(10.0, 10.0), Vec2::ZERO);
        assert_eq!(ctx.count(Category::PlayerProjectile), 1);
        assert_eq!(ctx.count(Category::HostileProjectile), 2);
        assert_eq!(ctx.total_active(), 3);
    }

    #[test]
    fn test_particle_cooldown_only_when_degraded() {
        let mut ctx = ctx();
        let pos = Vec2::new(50.0, 50.0);
        for _ in 0..5 {
            assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_some());
        }

        ctx.apply_level(DegradationLevel::Warning);
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_some());
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_none());
        assert_eq!(ctx.particles_suppressed(), 1);

        // Cooldown (50ms) elapses over a few frames
        ctx.advance(30.0);
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_none());
        ctx.advance(30.0);
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_some());

        // Back to Normal lifts the gate at once
        ctx.apply_level(DegradationLevel::Normal);
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_some());
        assert!(ctx.spawn_particle(pos, Vec2::ZERO, 1.0, [255, 0, 0]).is_some());
    }

    #[test]
    fn test_burst_counts_as_one_creation() {
        let mut ctx = ctx();
        let mut rng = Pcg32::seed_from_u64(7);
        ctx.apply_level(DegradationLevel::Warning);
        assert_eq!(ctx.emit_particle_burst(&mut rng, Vec2::new(100.0, 100.0), 12, [255; 3]), 12);
        assert_eq!(ctx.emit_particle_burst(&mut rng, Vec2::new(100.0, 100.0), 12, [255; 3]), 0);
        assert_eq!(ctx.count(Category::Particle), 12);
    }

    #[test]
    fn test_burst_respects_particle_cap() {
        let mut settings = Settings::default();
        settings.caps.particles = crate::settings::CapPair::new(8, 4);
        let mut ctx = SimContext::new(&settings);
        let mut rng = Pcg32::seed_from_u64(1);
        ctx.emit_particle_burst(&mut rng, Vec2::new(100.0, 100.0), 20, [255; 3]);
        assert_eq!(ctx.count(Category::Particle), 8);
    }

    #[test]
    fn test_emergency_truncates_all_pools() {
        let mut ctx = ctx();
        for i in 0..60 {
            ctx.spawn_hostile(Vec2::new(10.0 + i as f32, 100.0), Vec2::ZERO, 1);
        }
        for _ in 0..250 {
            ctx.spawn_projectile(Owner::Player, Vec2::new(100.0, 100.0), Vec2::ZERO);
        }
        let newest_hostile = ctx.hostiles.as_slice().last().unwrap().id;
        let evicted = ctx.apply_level(DegradationLevel::Emergency);
        assert_eq!(evicted, 30 + 130);
        assert_eq!(ctx.count(Category::Hostile), 30);
        assert_eq!(ctx.count(Category::PlayerProjectile), 120);
        assert_eq!(ctx.hostiles.as_slice().last().unwrap().id, newest_hostile);
    }

    #[test]
    fn test_render_items_skip_malformed() {
        let mut ctx = ctx();
        let good = ctx.spawn_hostile(Vec2::new(100.0, 100.0), Vec2::ZERO, 1);
        let bad = ctx.spawn_hostile(Vec2::new(100.0, 100.0), Vec2::ZERO, 1);
        ctx.hostiles.get_mut(bad).unwrap().size = Vec2::new(f32::NAN, 1.0);
        let shot = ctx.spawn_projectile(Owner::Player, Vec2::new(50.0, 50.0), Vec2::ZERO);

        let items: Vec<(EntityId, Category)> =
            ctx.render_items().map(|r| (r.id, r.category)).collect();
        assert_eq!(
            items,
            vec![(good, Category::Hostile), (shot, Category::PlayerProjectile)]
        );
    }

    #[test]
    fn test_reset_clears_everything() {
        let mut ctx = ctx();
        ctx.spawn_hostile(Vec2::new(100.0, 100.0), Vec2::ZERO, 1);
        ctx.apply_level(DegradationLevel::Emergency);
        ctx.player = None;
        ctx.reset();
        assert_eq!(ctx.total_active(), 0);
        assert_eq!(ctx.level(), DegradationLevel::Normal);
        assert_eq!(ctx.player.as_ref().unwrap().id, EntityId(1));
        assert_eq!(ctx.hostiles.active_cap(), 60);
    }
}
