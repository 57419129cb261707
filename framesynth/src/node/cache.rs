use std::num::NonZeroUsize;

use log::debug;
use lru::LruCache;

use crate::filter::RequestPattern;
use crate::frame::Frame;

/// Describes how the output of a node is cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Cache is enabled or disabled based on the reported request patterns
    /// and number of consumers.
    Auto,
    /// Never cache anything.
    ForceDisable,
    /// Always cache everything.
    ForceEnable,
}

const DEFAULT_MAX_SIZE: usize = 20;
const DEFAULT_HISTORY_SIZE: usize = 20;
const GROW_LIMIT: usize = 100;
/// Consecutive lookups without any hit before the cache gives back a slot.
const SHRINK_INTERVAL: u32 = 50;

/// Per-node LRU cache of completed frames (or the errors that replaced them).
///
/// The size adapts to the observed request pattern: a lookup that misses the
/// cache but hits the eviction history means the cache was recently too
/// small, so it grows; long hitless streaks shrink it again.
pub(crate) struct FrameCache {
    lru: LruCache<i32, Result<Frame, String>>,
    history: LruCache<i32, ()>,
    mode: CacheMode,
    fixed_size: bool,
    max_size: usize,
    /// Sticky disable requested by a NoFrameReuse consumer.
    consumer_disabled: bool,
    /// Number of registered consumers and whether all of them are
    /// FrameReuseLastOnly; a sole such consumer caps the cache at one frame.
    consumers: usize,
    last_only_consumers: usize,
    misses_since_hit: u32,
}

impl FrameCache {
    pub fn new() -> Self {
        Self {
            lru: LruCache::new(NonZeroUsize::new(DEFAULT_MAX_SIZE).unwrap()),
            history: LruCache::new(NonZeroUsize::new(DEFAULT_HISTORY_SIZE).unwrap()),
            mode: CacheMode::Auto,
            fixed_size: false,
            max_size: DEFAULT_MAX_SIZE,
            consumer_disabled: false,
            consumers: 0,
            last_only_consumers: 0,
            misses_since_hit: 0,
        }
    }

    pub fn register_consumer(&mut self, pattern: RequestPattern) {
        self.consumers += 1;
        match pattern {
            RequestPattern::NoFrameReuse => self.consumer_disabled = true,
            RequestPattern::FrameReuseLastOnly => self.last_only_consumers += 1,
            _ => {}
        }
    }

    fn enabled(&self) -> bool {
        match self.mode {
            CacheMode::ForceDisable => false,
            CacheMode::ForceEnable => true,
            CacheMode::Auto => !self.consumer_disabled,
        }
    }

    /// Effective size limit under the current consumer set.
    fn limit(&self) -> usize {
        if self.consumers == 1 && self.last_only_consumers == 1 {
            1
        } else {
            self.max_size.max(1)
        }
    }

    pub fn set_mode(&mut self, mode: CacheMode) {
        self.mode = mode;
        self.fixed_size = false;
        self.max_size = DEFAULT_MAX_SIZE;
        self.apply_limit();
    }

    pub fn set_options(&mut self, fixed_size: bool, max_size: usize, max_history_size: usize) {
        self.fixed_size = fixed_size;
        self.max_size = max_size.max(1);
        self.history
            .resize(NonZeroUsize::new(max_history_size.max(1)).unwrap());
        self.apply_limit();
    }

    fn apply_limit(&mut self) {
        self.lru
            .resize(NonZeroUsize::new(self.limit()).unwrap());
    }

    pub fn insert(&mut self, n: i32, result: &Result<Frame, String>) {
        if !self.enabled() {
            return;
        }
        self.apply_limit();
        if let Some((evicted, _)) = self.lru.push(n, result.clone()) {
            if evicted != n {
                self.history.put(evicted, ());
            }
        }
    }

    pub fn get(&mut self, n: i32) -> Option<Result<Frame, String>> {
        if !self.enabled() {
            return None;
        }
        if let Some(hit) = self.lru.get(&n) {
            self.misses_since_hit = 0;
            return Some(hit.clone());
        }

        if self.history.pop(&n).is_some() {
            // A recently evicted frame was wanted again.
            if !self.fixed_size && self.max_size < GROW_LIMIT {
                self.max_size += 1;
                debug!("frame cache grown to {}", self.max_size);
            }
            self.misses_since_hit = 0;
        } else {
            self.misses_since_hit += 1;
            if !self.fixed_size
                && self.misses_since_hit >= SHRINK_INTERVAL
                && self.max_size > 1
            {
                self.max_size -= 1;
                self.misses_since_hit = 0;
                debug!("frame cache shrunk to {}", self.max_size);
            }
        }
        None
    }
}
