//! Bounded object recycling for high-churn transients
//!
//! Live objects sit in a dense vector that the simulation iterates directly.
//! Released objects go to a free list up to `capacity`; past that they are
//! dropped. Acquiring prefers the free list and allocates only when it is empty.

/// An object that can be recycled by a [`Pool`]
pub trait Poolable {
    /// Parameters used to (re)initialize an object
    type Init;

    fn create(init: Self::Init) -> Self;
    /// Reinitialize a recycled object in place
    fn reset(&mut self, init: Self::Init);
    fn is_active(&self) -> bool;
    fn set_active(&mut self, active: bool);
}

/// Lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PoolStats {
    pub acquired: u64,
    pub released: u64,
    /// Acquires served by a fresh allocation
    pub allocated: u64,
    /// Releases discarded because the free list was full
    pub dropped: u64,
}

#[derive(Debug, Clone)]
pub struct Pool<T> {
    live: Vec<T>,
    free: Vec<T>,
    capacity: usize,
    stats: PoolStats,
}

impl<T: Poolable> Pool<T> {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            live: Vec::new(),
            free: Vec::with_capacity(capacity),
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Activate an object and add it to the live set. Returns its live index.
    pub fn acquire(&mut self, init: T::Init) -> usize {
        let mut obj = match self.free.pop() {
            Some(mut obj) => {
                obj.reset(init);
                obj
            }
            None => {
                self.stats.allocated += 1;
                T::create(init)
            }
        };
        obj.set_active(true);
        self.live.push(obj);
        self.stats.acquired += 1;
        self.live.len() - 1
    }

    /// Deactivate the live object at `index` and recycle it.
    ///
    /// The last live object moves into `index`, so callers iterating while
    /// releasing should walk from the end. Returns false if `index` is out of range.
    pub fn release(&mut self, index: usize) -> bool {
        if index >= self.live.len() {
            return false;
        }
        let mut obj = self.live.swap_remove(index);
        obj.set_active(false);
        self.stats.released += 1;
        if self.free.len() < self.capacity {
            self.free.push(obj);
        } else {
            self.stats.dropped += 1;
        }
        true
    }

    /// Release every live object that has gone inactive. Returns how many.
    pub fn reclaim(&mut self) -> usize {
        let mut count = 0;
        for i in (0..self.live.len()).rev() {
            if !self.live[i].is_active() {
                self.release(i);
                count += 1;
            }
        }
        count
    }

    /// Release everything
    pub fn clear(&mut self) {
        while !self.live.is_empty() {
            self.release(self.live.len() - 1);
        }
    }

    pub fn live(&self) -> &[T] {
        &self.live
    }

    pub fn live_mut(&mut self) -> &mut [T] {
        &mut self.live
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.live.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.live.get_mut(index)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn pooled_count(&self) -> usize {
        self.free.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[derive(Debug)]
    struct Spark {
        serial: u32,
        ttl: u32,
        active: bool,
    }

    impl Poolable for Spark {
        type Init = u32;

        fn create(ttl: u32) -> Self {
            Self {
                serial: 0,
                ttl,
                active: false,
            }
        }

        fn reset(&mut self, ttl: u32) {
            self.serial += 1;
            self.ttl = ttl;
        }

        fn is_active(&self) -> bool {
            self.active
        }

        fn set_active(&mut self, active: bool) {
            self.active = active;
        }
    }

    #[test]
    fn test_acquire_reuses_released() {
        let mut pool: Pool<Spark> = Pool::with_capacity(4);
        let i = pool.acquire(10);
        assert_eq!(pool.stats().allocated, 1);
        assert!(pool.release(i));
        assert_eq!(pool.pooled_count(), 1);

        let j = pool.acquire(20);
        let spark = pool.get(j).unwrap();
        assert!(spark.active);
        assert_eq!(spark.ttl, 20);
        assert_eq!(spark.serial, 1);
        assert_eq!(pool.stats().allocated, 1);
        assert_eq!(pool.pooled_count(), 0);
    }

    #[test]
    fn test_release_past_capacity_drops() {
        let mut pool: Pool<Spark> = Pool::with_capacity(2);
        for _ in 0..5 {
            pool.acquire(1);
        }
        pool.clear();
        assert_eq!(pool.live_count(), 0);
        assert_eq!(pool.pooled_count(), 2);
        assert_eq!(pool.stats().dropped, 3);
    }

    #[test]
    fn test_release_out_of_range() {
        let mut pool: Pool<Spark> = Pool::with_capacity(2);
        assert!(!pool.release(0));
        assert_eq!(pool.stats().released, 0);
    }

    #[test]
    fn test_reclaim_releases_inactive_only() {
        let mut pool: Pool<Spark> = Pool::with_capacity(8);
        for ttl in 0..6 {
            pool.acquire(ttl);
        }
        for spark in pool.live_mut() {
            if spark.ttl % 2 == 0 {
                spark.active = false;
            }
        }
        assert_eq!(pool.reclaim(), 3);
        assert_eq!(pool.live_count(), 3);
        assert!(pool.live().iter().all(|s| s.active && s.ttl % 2 == 1));
        assert_eq!(pool.pooled_count(), 3);
    }

    #[derive(Debug, Clone)]
    enum Op {
        Acquire,
        Release(usize),
        Expire(usize),
        Reclaim,
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            3 => Just(Op::Acquire),
            2 => (0usize..64).prop_map(Op::Release),
            1 => (0usize..64).prop_map(Op::Expire),
            1 => Just(Op::Reclaim),
        ]
    }

    proptest! {
        #[test]
        fn test_pool_conservation(
            capacity in 0usize..16,
            ops in proptest::collection::vec(op_strategy(), 0..200),
        ) {
            let mut pool: Pool<Spark> = Pool::with_capacity(capacity);
            for op in ops {
                match op {
                    Op::Acquire => {
                        pool.acquire(5);
                    }
                    Op::Release(i) => {
                        if pool.live_count() > 0 {
                            pool.release(i % pool.live_count());
                        }
                    }
                    Op::Expire(i) => {
                        let n = pool.live_count();
                        if n > 0 {
                            pool.live_mut()[i % n].active = false;
                        }
                    }
                    Op::Reclaim => {
                        pool.reclaim();
                    }
                }

                let stats = pool.stats();
                prop_assert_eq!(stats.acquired - stats.released, pool.live_count() as u64);
                prop_assert!(pool.pooled_count() <= capacity);
                // Objects ever allocated are live, pooled, or dropped
                prop_assert_eq!(
                    stats.allocated,
                    pool.live_count() as u64 + pool.pooled_count() as u64 + stats.dropped
                );
                prop_assert!(pool.free.iter().all(|s| !s.active));
            }
        }
    }
}
