//! Bounded entity pools
//!
//! A pool is an insertion-ordered `Vec` (front = oldest) with a soft cap used
//! in Normal/Warning and a smaller hard cap used in Emergency. Overflow is
//! resolved by FIFO eviction: the oldest entities go first.
//!
//! Eviction only moves a `head` offset past the dead prefix. The prefix is
//! dropped at the next `compact`, or once it outgrows the live entities, so
//! evicting from a full pool is amortized O(1) and the live range is always
//! one contiguous slice.
//!
//! Gameplay code may insert and may flag entities via `should_remove`; it never
//! reorders or deletes from the backing sequence directly.

use super::aabb::Playfield;
use super::degradation::DegradationLevel;
use super::entity::{Category, Entity, EntityId};
use crate::settings::CapPair;

/// Capacity-limited, FIFO-evicting collection of one entity category
#[derive(Debug, Clone)]
pub struct BoundedPool<T> {
    category: Category,
    items: Vec<T>,
    /// Start of the live range; everything before it is evicted
    head: usize,
    caps: CapPair,
    level: DegradationLevel,
    /// Entities dropped by cap pressure since creation
    evicted_total: u64,
}

impl<T: Entity> BoundedPool<T> {
    pub fn new(category: Category, caps: CapPair) -> Self {
        Self {
            category,
            items: Vec::with_capacity(caps.soft.min(1024)),
            head: 0,
            caps,
            level: DegradationLevel::Normal,
            evicted_total: 0,
        }
    }

    pub fn category(&self) -> Category {
        self.category
    }

    pub fn caps(&self) -> CapPair {
        self.caps
    }

    /// Cap in force for the current degradation level
    #[inline]
    pub fn active_cap(&self) -> usize {
        match self.level {
            DegradationLevel::Normal | DegradationLevel::Warning => self.caps.soft,
            DegradationLevel::Emergency => self.caps.hard,
        }
    }

    pub fn level(&self) -> DegradationLevel {
        self.level
    }

    /// Switch the active cap. Only called between frames; entering Emergency
    /// truncates immediately. Returns the number of entities evicted.
    pub fn set_level(&mut self, level: DegradationLevel) -> usize {
        self.level = level;
        if level == DegradationLevel::Emergency {
            self.enforce_cap()
        } else {
            0
        }
    }

    /// Append one entity, evicting the oldest first if the pool is full
    pub fn insert(&mut self, entity: T) {
        self.check_category(&entity);
        let cap = self.active_cap();
        if cap == 0 {
            self.evicted_total += 1;
            return;
        }
        if self.len() >= cap {
            let excess = self.len() + 1 - cap;
            self.evict_front(excess);
        }
        self.items.push(entity);
    }

    /// Append a batch. Evicts `max(0, len + k - cap)` oldest entities first;
    /// when the batch alone exceeds the cap only its last `cap` entries survive.
    pub fn insert_batch<I>(&mut self, entities: I)
    where
        I: IntoIterator<Item = T>,
    {
        let mut batch: Vec<T> = entities.into_iter().collect();
        for entity in &batch {
            self.check_category(entity);
        }
        let cap = self.active_cap();
        let k = batch.len();
        if k >= cap {
            let dropped_from_batch = k - cap;
            self.evicted_total += (self.len() + dropped_from_batch) as u64;
            self.clear();
            batch.drain(..dropped_from_batch);
            self.items.extend(batch);
            log::trace!(
                "{}: batch of {} overflowed cap {}",
                self.category.as_str(),
                k,
                cap
            );
            return;
        }
        let excess = (self.len() + k).saturating_sub(cap);
        self.evict_front(excess);
        self.items.extend(batch);
    }

    /// Step every entity forward by `dt` seconds
    pub fn advance(&mut self, dt: f32, field: &Playfield) {
        for entity in &mut self.items[self.head..] {
            entity.advance(dt, field);
        }
    }

    /// Drop flagged and malformed entities, keeping survivors in order.
    /// Returns the number removed.
    pub fn compact(&mut self) -> usize {
        self.reclaim();
        let before = self.items.len();
        let category = self.category;
        self.items.retain(|e| {
            if e.should_remove() {
                return false;
            }
            if e.bounds().is_none() {
                log::debug!(
                    "{}: dropping entity {:?} with malformed geometry",
                    category.as_str(),
                    e.id()
                );
                return false;
            }
            true
        });
        before - self.items.len()
    }

    /// Trim from the front until within the active cap. Idempotent.
    /// Returns the number evicted.
    pub fn enforce_cap(&mut self) -> usize {
        let excess = self.len().saturating_sub(self.active_cap());
        self.evict_front(excess);
        excess
    }

    fn evict_front(&mut self, n: usize) {
        if n == 0 {
            return;
        }
        let n = n.min(self.len());
        self.head += n;
        self.evicted_total += n as u64;
        if self.head >= self.len() {
            self.reclaim();
        }
        log::trace!(
            "{}: evicted {} oldest (cap {})",
            self.category.as_str(),
            n,
            self.active_cap()
        );
    }

    /// Physically drop the evicted prefix
    fn reclaim(&mut self) {
        if self.head > 0 {
            self.items.drain(..self.head);
            self.head = 0;
        }
    }

    /// Inserting an entity of the wrong category is a wiring bug
    #[inline]
    fn check_category(&self, entity: &T) {
        debug_assert_eq!(
            entity.category(),
            self.category,
            "entity {:?} inserted into the {} pool",
            entity.id(),
            self.category.as_str()
        );
    }

    pub fn get(&self, id: EntityId) -> Option<&T> {
        self.as_slice().iter().find(|e| e.id() == id)
    }

    pub fn get_mut(&mut self, id: EntityId) -> Option<&mut T> {
        self.items[self.head..].iter_mut().find(|e| e.id() == id)
    }

    /// Flag an entity for removal. Returns false if it is no longer pooled.
    pub fn mark_removed(&mut self, id: EntityId) -> bool {
        match self.get_mut(id) {
            Some(e) => {
                e.mark_removed();
                true
            }
            None => false,
        }
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.as_slice().iter()
    }

    /// Read-only view in insertion (age) order
    pub fn as_slice(&self) -> &[T] {
        &self.items[self.head..]
    }

    pub fn len(&self) -> usize {
        self.items.len() - self.head
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted_total
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.head = 0;
    }
}

impl<'a, T: Entity> IntoIterator for &'a BoundedPool<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::{Hostile, Owner, Projectile};
    use glam::Vec2;
    use proptest::prelude::*;

    fn shot(id: u32) -> Projectile {
        Projectile::new(EntityId(id), Owner::Player, Vec2::new(100.0, 100.0), Vec2::ZERO)
    }

    fn pool(soft: usize, hard: usize) -> BoundedPool<Projectile> {
        BoundedPool::new(Category::PlayerProjectile, CapPair::new(soft, hard))
    }

    fn ids(pool: &BoundedPool<Projectile>) -> Vec<u32> {
        pool.iter().map(|p| p.id.0).collect()
    }

    #[test]
    fn test_fifo_eviction_on_insert() {
        let mut pool = pool(3, 1);
        for id in 1..=3 {
            pool.insert(shot(id));
        }
        pool.insert(shot(4));
        assert_eq!(ids(&pool), vec![2, 3, 4]);
        assert_eq!(pool.evicted_total(), 1);
    }

    #[test]
    fn test_batch_evicts_oldest_then_appends() {
        let mut pool = pool(5, 2);
        pool.insert_batch((1..=4).map(shot));
        pool.insert_batch((5..=7).map(shot));
        // 4 + 3 - 5 = 2 evicted from the front
        assert_eq!(ids(&pool), vec![3, 4, 5, 6, 7]);
    }

    #[test]
    fn test_batch_larger_than_cap_keeps_last() {
        let mut pool = pool(4, 2);
        pool.insert(shot(100));
        pool.insert_batch((1..=10).map(shot));
        assert_eq!(ids(&pool), vec![7, 8, 9, 10]);
        assert_eq!(pool.evicted_total(), 7);
    }

    #[test]
    fn test_enforce_cap_keeps_newest() {
        // 400 live projectiles, cap 250 in Normal
        let mut pool = pool(400, 100);
        pool.insert_batch((1..=400).map(shot));
        pool.caps = CapPair::new(250, 100);
        assert_eq!(pool.enforce_cap(), 150);
        assert_eq!(pool.len(), 250);
        assert_eq!(ids(&pool), (151..=400).collect::<Vec<_>>());
        // Idempotent
        assert_eq!(pool.enforce_cap(), 0);
        assert_eq!(pool.len(), 250);
    }

    #[test]
    fn test_emergency_truncates_immediately() {
        let mut pool = pool(10, 3);
        pool.insert_batch((1..=8).map(shot));
        assert_eq!(pool.set_level(DegradationLevel::Warning), 0);
        assert_eq!(pool.len(), 8);
        assert_eq!(pool.set_level(DegradationLevel::Emergency), 5);
        assert_eq!(ids(&pool), vec![6, 7, 8]);
        // Back to Normal does not resurrect anything
        pool.set_level(DegradationLevel::Normal);
        assert_eq!(pool.active_cap(), 10);
        assert_eq!(pool.len(), 3);
    }

    #[test]
    fn test_compact_preserves_order() {
        let mut pool = pool(10, 5);
        pool.insert_batch((1..=6).map(shot));
        assert!(pool.mark_removed(EntityId(2)));
        assert!(pool.mark_removed(EntityId(5)));
        assert!(!pool.mark_removed(EntityId(99)));
        assert_eq!(pool.compact(), 2);
        assert_eq!(ids(&pool), vec![1, 3, 4, 6]);
    }

    #[test]
    fn test_compact_drops_malformed() {
        let mut pool = pool(10, 5);
        pool.insert(shot(1));
        let mut bad = shot(2);
        bad.pos = Vec2::new(f32::NAN, 0.0);
        pool.insert(bad);
        pool.insert(shot(3));
        assert_eq!(pool.compact(), 1);
        assert_eq!(ids(&pool), vec![1, 3]);
    }

    #[test]
    fn test_eviction_storm_keeps_storage_bounded() {
        let mut pool = pool(50, 10);
        for id in 1..=10_000 {
            pool.insert(shot(id));
            assert!(pool.items.len() <= 2 * 50 + 1);
        }
        assert_eq!(pool.len(), 50);
        assert_eq!(ids(&pool), (9951..=10_000).collect::<Vec<_>>());
        assert_eq!(pool.evicted_total(), 10_000 - 50);
        assert_eq!(pool.get(EntityId(9950)).map(|p| p.id), None);
        assert!(pool.get(EntityId(9951)).is_some());
    }

    #[test]
    fn test_compact_drops_evicted_prefix() {
        let mut pool = pool(4, 2);
        pool.insert_batch((1..=4).map(shot));
        pool.insert(shot(5));
        assert!(pool.head > 0);
        assert!(!pool.mark_removed(EntityId(1)));
        pool.compact();
        assert_eq!(pool.head, 0);
        assert_eq!(pool.items.len(), 4);
        assert_eq!(ids(&pool), vec![2, 3, 4, 5]);
    }

    #[test]
    fn test_zero_cap_drops_inserts() {
        let mut pool = pool(0, 0);
        pool.insert(shot(1));
        pool.insert_batch((2..=4).map(shot));
        assert!(pool.is_empty());
    }

    #[test]
    fn test_get_mut_by_id() {
        let mut hostiles = BoundedPool::new(Category::Hostile, CapPair::new(4, 2));
        hostiles.insert(Hostile::new(EntityId(7), Vec2::new(50.0, 50.0), Vec2::ZERO, 3));
        hostiles.get_mut(EntityId(7)).unwrap().apply_damage(1);
        assert_eq!(hostiles.get(EntityId(7)).unwrap().hp, 2);
        assert!(hostiles.get(EntityId(8)).is_none());
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "inserted into the player_projectiles pool")]
    fn test_wrong_category_panics_in_debug() {
        let mut pool = pool(4, 2);
        pool.insert(Projectile::new(
            EntityId(1),
            Owner::Hostile,
            Vec2::ZERO,
            Vec2::ZERO,
        ));
    }

    proptest! {
        #[test]
        fn prop_cap_invariant_holds(
            soft in 0usize..40,
            hard_frac in 0.0f64..1.0,
            ops in proptest::collection::vec((0usize..60, any::<bool>(), 0u8..3), 1..30),
        ) {
            let hard = (soft as f64 * hard_frac) as usize;
            let mut pool = pool(soft, hard);
            let mut next = 0u32;
            for (count, remove_some, level) in ops {
                let level = match level {
                    0 => DegradationLevel::Normal,
                    1 => DegradationLevel::Warning,
                    _ => DegradationLevel::Emergency,
                };
                pool.set_level(level);
                pool.insert_batch((0..count).map(|_| { next += 1; shot(next) }));
                prop_assert!(pool.len() <= pool.active_cap());
                if remove_some {
                    let victims: Vec<EntityId> = pool.iter().step_by(2).map(|p| p.id).collect();
                    for id in victims {
                        pool.mark_removed(id);
                    }
                    pool.compact();
                }
                pool.enforce_cap();
                prop_assert!(pool.len() <= pool.active_cap());
                // Survivors stay in insertion order
                let ids = ids(&pool);
                prop_assert!(ids.windows(2).all(|w| w[0] < w[1]));
            }
        }

        #[test]
        fn prop_bulk_overflow_keeps_last_cap(cap in 1usize..50, k in 0usize..120) {
            let mut pool = pool(cap, cap / 2);
            pool.insert_batch((1..=k as u32).map(shot));
            let expected: Vec<u32> = (1..=k as u32).skip(k.saturating_sub(cap)).collect();
            prop_assert_eq!(ids(&pool), expected);
        }
    }
}
