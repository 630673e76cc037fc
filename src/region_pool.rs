//! Pool of reusable per-request `Region`s (`spec.md` §4.2).
//!
//! The free list is the only mutex-guarded structure in the core — every
//! other shared structure (the trie, the connection list) is either built
//! once up front or owned by a single thread at a time.

use std::sync::Mutex;

use crate::region::Region;

pub struct RegionPoolConfig {
    pub region_size: usize,
    pub preallocate: usize,
    pub low_watermark: usize,
    pub high_watermark: usize,
    pub grow_batch: usize,
    /// Hard ceiling on regions live at once (allocated + free). Once hit,
    /// `acquire` returns `None` instead of growing further (`spec.md`
    /// §4.2).
    pub max_pool_size: usize,
}

impl Default for RegionPoolConfig {
    fn default() -> Self {
        RegionPoolConfig {
            region_size: crate::region::DEFAULT_REGION_SIZE,
            preallocate: 16,
            low_watermark: 8,
            high_watermark: 64,
            grow_batch: 8,
            max_pool_size: 4096,
        }
    }
}

struct Inner {
    free: Vec<Region>,
    /// Regions currently allocated, whether sitting in `free` or checked
    /// out to a connection. Never exceeds `max_pool_size`.
    total_allocated: usize,
}

pub struct RegionPool {
    inner: Mutex<Inner>,
    config: RegionPoolConfig,
}

/// How many regions are floored in the pool even under sustained contention:
/// `preallocate + grow_batch`, so a burst just past `preallocate` doesn't
/// immediately need a second grow round.
fn reserve_floor(config: &RegionPoolConfig) -> usize {
    config.preallocate + config.grow_batch
}

impl RegionPool {
    pub fn new(config: RegionPoolConfig) -> Self {
        let initial = config
            .preallocate
            .max(reserve_floor(&config).min(config.high_watermark))
            .min(config.max_pool_size);
        let free = (0..initial)
            .map(|_| Region::new(config.region_size))
            .collect();
        log::debug!(
            "region pool initialized with {} regions ({} bytes each)",
            initial,
            config.region_size
        );
        RegionPool {
            inner: Mutex::new(Inner {
                free,
                total_allocated: initial,
            }),
            config,
        }
    }

    /// Acquire a region from the free list, growing the pool by
    /// `grow_batch` if it has fallen to or below `low_watermark`. Returns
    /// `None` if the pool has hit `max_pool_size` and nothing is free —
    /// the exhaustion sentinel of `spec.md` §4.2, which the caller must
    /// turn into a 500-and-close response (§4.7 step 1).
    pub fn acquire(&self) -> Option<Region> {
        let mut inner = self.inner.lock().unwrap();
        if inner.free.len() <= self.config.low_watermark {
            let grow_by = self
                .config
                .grow_batch
                .min(self.config.max_pool_size.saturating_sub(inner.total_allocated));
            if grow_by > 0 {
                log::debug!(
                    "region pool below low watermark ({} <= {}), growing by {}",
                    inner.free.len(),
                    self.config.low_watermark,
                    grow_by
                );
                inner
                    .free
                    .extend((0..grow_by).map(|_| Region::new(self.config.region_size)));
                inner.total_allocated += grow_by;
            }
        }
        if let Some(region) = inner.free.pop() {
            return Some(region);
        }
        if inner.total_allocated < self.config.max_pool_size {
            inner.total_allocated += 1;
            Some(Region::new(self.config.region_size))
        } else {
            log::warn!(
                "region pool exhausted at {} regions",
                self.config.max_pool_size
            );
            None
        }
    }

    /// Return a region to the pool after resetting its cursor. If the pool
    /// has grown past `high_watermark`, the region is dropped instead of
    /// returned, shrinking the pool back down (and freeing its slot under
    /// `max_pool_size`); regions that grew past a single block are shrunk
    /// back to one block before being kept.
    pub fn release(&self, mut region: Region) {
        let mut inner = self.inner.lock().unwrap();
        if inner.free.len() >= self.config.high_watermark {
            log::debug!(
                "region pool at high watermark ({}), dropping returned region",
                self.config.high_watermark
            );
            inner.total_allocated = inner.total_allocated.saturating_sub(1);
            return;
        }
        if region.block_count() > 1 {
            region.shrink_to_one_block();
        } else {
            region.reset();
        }
        inner.free.push(region);
    }

    pub fn stats(&self) -> RegionPoolStats {
        let inner = self.inner.lock().unwrap();
        RegionPoolStats {
            free: inner.free.len(),
            low_watermark: self.config.low_watermark,
            high_watermark: self.config.high_watermark,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct RegionPoolStats {
    pub free: usize,
    pub low_watermark: usize,
    pub high_watermark: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RegionPoolConfig {
        RegionPoolConfig {
            region_size: 64,
            preallocate: 2,
            low_watermark: 1,
            high_watermark: 4,
            grow_batch: 2,
            max_pool_size: 4096,
        }
    }

    #[test]
    fn acquire_grows_past_low_watermark() {
        let pool = RegionPool::new(small_config());
        assert_eq!(pool.stats().free, 2);
        let _a = pool.acquire().unwrap();
        // free dropped to 1, at-or-below low watermark, so it grows by grow_batch
        assert!(pool.stats().free >= 2);
    }

    #[test]
    fn release_drops_above_high_watermark() {
        let pool = RegionPool::new(small_config());
        let regions: Vec<_> = (0..6).map(|_| pool.acquire().unwrap()).collect();
        for r in regions {
            pool.release(r);
        }
        assert!(pool.stats().free <= 4);
    }

    #[test]
    fn released_region_is_reset() {
        let pool = RegionPool::new(small_config());
        let region = pool.acquire().unwrap();
        let _ = region.memdup(b"some request data");
        assert!(region.bytes_in_use() > 0);
        pool.release(region);
        let reacquired = pool.acquire().unwrap();
        assert_eq!(reacquired.bytes_in_use(), 0);
    }

    #[test]
    fn acquire_returns_none_once_max_pool_size_is_hit() {
        let pool = RegionPool::new(RegionPoolConfig {
            region_size: 64,
            preallocate: 1,
            low_watermark: 0,
            high_watermark: 4,
            grow_batch: 1,
            max_pool_size: 2,
        });
        let a = pool.acquire().unwrap();
        let b = pool.acquire().unwrap();
        assert!(pool.acquire().is_none());
        pool.release(a);
        assert!(pool.acquire().is_some());
        pool.release(b);
    }
}
