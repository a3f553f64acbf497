//! Entity types and the capability traits the core relies on
//!
//! The set of entity kinds is closed: projectiles, hostile actors, particles,
//! pickups and destructibles live in pools; the player is a single collider
//! owned by the simulation context.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::aabb::{Aabb, Playfield};

/// Stable entity handle, allocated in increasing order by `SimContext`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub u32);

/// Pool category. One bounded pool exists per category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    PlayerProjectile,
    HostileProjectile,
    Hostile,
    Particle,
    Pickup,
    Destructible,
}

impl Category {
    pub const ALL: [Category; 6] = [
        Category::PlayerProjectile,
        Category::HostileProjectile,
        Category::Hostile,
        Category::Particle,
        Category::Pickup,
        Category::Destructible,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::PlayerProjectile => "player_projectiles",
            Category::HostileProjectile => "hostile_projectiles",
            Category::Hostile => "hostiles",
            Category::Particle => "particles",
            Category::Pickup => "pickups",
            Category::Destructible => "destructibles",
        }
    }
}

/// Anything the collision engine can test
pub trait Collider {
    fn id(&self) -> EntityId;
    /// Current bounding box, or `None` if the geometry is malformed
    fn bounds(&self) -> Option<Aabb>;
}

/// Per-frame capabilities of a pooled entity
pub trait Entity: Collider {
    fn category(&self) -> Category;
    /// Integrate movement and count down lifetime by `dt` seconds
    fn advance(&mut self, dt: f32, field: &Playfield);
    fn should_remove(&self) -> bool;
    /// Flag for removal on the next compaction
    fn mark_removed(&mut self);
}

/// Who fired a projectile
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Owner {
    Player,
    Hostile,
}

/// A bullet, either the player's or a hostile's
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Projectile {
    pub id: EntityId,
    pub owner: Owner,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    /// Seconds until the projectile expires
    pub ttl: f32,
    pub damage: i32,
    /// Passes through hostiles instead of being consumed
    pub piercing: bool,
    pub removed: bool,
}

impl Projectile {
    pub fn new(id: EntityId, owner: Owner, pos: Vec2, vel: Vec2) -> Self {
        Self {
            id,
            owner,
            pos,
            vel,
            size: Vec2::new(4.0, 10.0),
            ttl: 3.0,
            damage: 1,
            piercing: false,
            removed: false,
        }
    }
}

impl Collider for Projectile {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, self.size)
    }
}

impl Entity for Projectile {
    fn category(&self) -> Category {
        match self.owner {
            Owner::Player => Category::PlayerProjectile,
            Owner::Hostile => Category::HostileProjectile,
        }
    }

    fn advance(&mut self, dt: f32, field: &Playfield) {
        self.pos += self.vel * dt;
        self.ttl -= dt;
        if self.ttl <= 0.0 {
            self.removed = true;
        }
        if let Some(b) = self.bounds()
            && field.is_outside(&b)
        {
            self.removed = true;
        }
    }

    fn should_remove(&self) -> bool {
        self.removed
    }

    fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// An enemy body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hostile {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    pub hp: i32,
    pub removed: bool,
}

impl Hostile {
    pub fn new(id: EntityId, pos: Vec2, vel: Vec2, hp: i32) -> Self {
        Self {
            id,
            pos,
            vel,
            size: Vec2::new(28.0, 28.0),
            hp,
            removed: false,
        }
    }

    /// Apply damage; returns true if this hit destroyed the hostile
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if self.removed {
            return false;
        }
        self.hp -= amount;
        if self.hp <= 0 {
            self.removed = true;
            return true;
        }
        false
    }
}

impl Collider for Hostile {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, self.size)
    }
}

impl Entity for Hostile {
    fn category(&self) -> Category {
        Category::Hostile
    }

    fn advance(&mut self, dt: f32, field: &Playfield) {
        self.pos += self.vel * dt;
        if let Some(b) = self.bounds()
            && field.is_outside(&b)
        {
            self.removed = true;
        }
    }

    fn should_remove(&self) -> bool {
        self.removed
    }

    fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// A purely visual spark. Particles never take part in collision.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Particle {
    pub id: EntityId,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: f32,
    /// Remaining life in seconds
    pub life: f32,
    /// Total lifetime (for fade interpolation)
    pub max_life: f32,
    pub color: [u8; 3],
    pub removed: bool,
}

/// Velocity kept per second of flight
const PARTICLE_DRAG: f32 = 0.3;

impl Particle {
    pub fn new(id: EntityId, pos: Vec2, vel: Vec2, life: f32, color: [u8; 3]) -> Self {
        Self {
            id,
            pos,
            vel,
            size: 3.0,
            life,
            max_life: life,
            color,
            removed: false,
        }
    }

    /// 1.0 when freshly spawned, 0.0 when expired
    pub fn fade(&self) -> f32 {
        if self.max_life <= 0.0 {
            return 0.0;
        }
        (self.life / self.max_life).clamp(0.0, 1.0)
    }
}

impl Collider for Particle {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, Vec2::splat(self.size))
    }
}

impl Entity for Particle {
    fn category(&self) -> Category {
        Category::Particle
    }

    fn advance(&mut self, dt: f32, _field: &Playfield) {
        self.pos += self.vel * dt;
        self.vel *= PARTICLE_DRAG.powf(dt);
        self.life -= dt;
        if self.life <= 0.0 {
            self.removed = true;
        }
    }

    fn should_remove(&self) -> bool {
        self.removed
    }

    fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// Power-up types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PickupKind {
    Power,
    Score,
    Bomb,
    ExtraLife,
}

/// A collectible that drifts toward the bottom of the screen
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Pickup {
    pub id: EntityId,
    pub kind: PickupKind,
    pub pos: Vec2,
    pub vel: Vec2,
    pub size: Vec2,
    /// Seconds before the pickup vanishes
    pub ttl: f32,
    pub removed: bool,
}

impl Pickup {
    pub fn new(id: EntityId, kind: PickupKind, pos: Vec2) -> Self {
        Self {
            id,
            kind,
            pos,
            vel: Vec2::new(0.0, 60.0),
            size: Vec2::splat(16.0),
            ttl: 8.0,
            removed: false,
        }
    }
}

impl Collider for Pickup {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, self.size)
    }
}

impl Entity for Pickup {
    fn category(&self) -> Category {
        Category::Pickup
    }

    fn advance(&mut self, dt: f32, field: &Playfield) {
        self.pos += self.vel * dt;
        self.ttl -= dt;
        if self.ttl <= 0.0 {
            self.removed = true;
        }
        if let Some(b) = self.bounds()
            && field.is_outside(&b)
        {
            self.removed = true;
        }
    }

    fn should_remove(&self) -> bool {
        self.removed
    }

    fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// Scenery that player shots can break (crates, turrets' shields)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Destructible {
    pub id: EntityId,
    pub pos: Vec2,
    /// Scroll velocity
    pub vel: Vec2,
    pub size: Vec2,
    pub hp: i32,
    pub removed: bool,
}

impl Destructible {
    pub fn new(id: EntityId, pos: Vec2, size: Vec2, hp: i32) -> Self {
        Self {
            id,
            pos,
            vel: Vec2::ZERO,
            size,
            hp,
            removed: false,
        }
    }

    /// Apply damage; returns true if this hit broke it
    pub fn apply_damage(&mut self, amount: i32) -> bool {
        if self.removed {
            return false;
        }
        self.hp -= amount;
        if self.hp <= 0 {
            self.removed = true;
            return true;
        }
        false
    }
}

impl Collider for Destructible {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, self.size)
    }
}

impl Entity for Destructible {
    fn category(&self) -> Category {
        Category::Destructible
    }

    fn advance(&mut self, dt: f32, field: &Playfield) {
        self.pos += self.vel * dt;
        if let Some(b) = self.bounds()
            && field.is_outside(&b)
        {
            self.removed = true;
        }
    }

    fn should_remove(&self) -> bool {
        self.removed
    }

    fn mark_removed(&mut self) {
        self.removed = true;
    }
}

/// The player's ship. Not pooled; there is exactly one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Player {
    pub id: EntityId,
    pub pos: Vec2,
    pub size: Vec2,
}

impl Player {
    pub fn new(id: EntityId, pos: Vec2) -> Self {
        Self {
            id,
            pos,
            size: Vec2::new(crate::consts::PLAYER_WIDTH, crate::consts::PLAYER_HEIGHT),
        }
    }

    /// Move by `delta`, staying inside the visible playfield
    pub fn move_by(&mut self, delta: Vec2, field: &Playfield) {
        let target = self.pos + delta;
        if target.is_finite() {
            self.pos = field.clamp_point(target);
        }
    }
}

impl Collider for Player {
    fn id(&self) -> EntityId {
        self.id
    }

    fn bounds(&self) -> Option<Aabb> {
        Aabb::from_center_size(self.pos, self.size)
    }
}
