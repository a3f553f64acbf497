//! Real-time simulation core
//!
//! Single-threaded and cooperative: one host callback drives one `tick`.
//! - Pools are owned by `SimContext`, which the `Scheduler` owns
//! - Collision is pure and runs after pools advance, before caps are enforced
//! - One `DegradationLevel` governs caps, particle cooldown and frame skipping
//! - No rendering, audio or input dependencies

pub mod aabb;
pub mod collision;
pub mod degradation;
pub mod entity;
pub mod pool;
pub mod state;
pub mod tick;

pub use aabb::{Aabb, Playfield};
pub use collision::{CollisionReport, Pair, all_pairs, first_contact, intersects, process};
pub use degradation::{
    DegradationConfig, DegradationController, DegradationLevel, FpsHistory, LevelChange,
};
pub use entity::{
    Category, Collider, Destructible, Entity, EntityId, Hostile, Owner, Particle, Pickup,
    PickupKind, Player, Projectile,
};
pub use pool::BoundedPool;
pub use state::{RenderItem, SimContext};
pub use tick::{FrameClock, FrameHost, FrameOutcome, FrameStats, Scheduler};
