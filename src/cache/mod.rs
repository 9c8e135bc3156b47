//! Shared-string caches for the legacy binary producer.
//!
//! The producer retains the raw shared-string payload and consults a
//! [`ReadCache`] for decoded strings; a miss means re-decoding from the
//! payload. Strategies trade retained memory for repeat decode cost.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use log::debug;
use serde::{Deserialize, Serialize};

/// Which cache a read session uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CacheLocation {
    /// Keep nothing; decode on every lookup
    None,
    /// Keep decoded strings in the session, up to `capacity` entries
    #[default]
    Memory,
    /// Bounded variant of [`CacheLocation::Memory`]
    MemoryBounded { capacity: usize },
    /// Keep decoded strings in the calling thread's store
    ThreadLocal,
}

/// Shared-string index to decoded string.
pub trait ReadCache {
    /// Store a string; an index already present keeps its first value.
    fn put(&mut self, index: u32, value: String);

    fn get(&self, index: u32) -> Option<String>;

    /// Drop every retained string.
    fn clear(&mut self);
}

/// Build the cache selected by `location`.
pub fn new_cache(location: CacheLocation) -> Box<dyn ReadCache> {
    match location {
        CacheLocation::None => Box::new(NoneCache),
        CacheLocation::Memory => Box::new(MemoryCache::new(None)),
        CacheLocation::MemoryBounded { capacity } => Box::new(MemoryCache::new(Some(capacity))),
        CacheLocation::ThreadLocal => Box::new(ThreadLocalCache::new()),
    }
}

/// Retains nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoneCache;

impl ReadCache for NoneCache {
    fn put(&mut self, _index: u32, _value: String) {}

    fn get(&self, _index: u32) -> Option<String> {
        None
    }

    fn clear(&mut self) {}
}

/// Session-owned map, optionally bounded.
///
/// Once full, further strings are not retained and will be re-decoded.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: HashMap<u32, String>,
    capacity: Option<usize>,
}

impl MemoryCache {
    pub fn new(capacity: Option<usize>) -> Self {
        Self {
            entries: HashMap::new(),
            capacity,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ReadCache for MemoryCache {
    fn put(&mut self, index: u32, value: String) {
        if self.capacity.is_some_and(|cap| self.entries.len() >= cap) {
            return;
        }
        self.entries.entry(index).or_insert(value);
    }

    fn get(&self, index: u32) -> Option<String> {
        self.entries.get(&index).cloned()
    }

    fn clear(&mut self) {
        self.entries.clear();
    }
}

thread_local! {
    static THREAD_STORE: RefCell<HashMap<u64, HashMap<u32, String>>> = RefCell::new(HashMap::new());
}

static NEXT_SESSION: AtomicU64 = AtomicU64::new(1);

/// Strings kept in a store owned by the current thread.
///
/// Each cache claims its own session slot, so sessions reused on a pooled
/// thread never see each other's strings. The slot is released by
/// [`ReadCache::clear`] and on drop.
#[derive(Debug)]
pub struct ThreadLocalCache {
    session: u64,
}

impl ThreadLocalCache {
    pub fn new() -> Self {
        Self {
            session: NEXT_SESSION.fetch_add(1, Ordering::Relaxed),
        }
    }

    /// Number of live session slots on this thread.
    pub fn live_sessions() -> usize {
        THREAD_STORE.with(|store| store.borrow().len())
    }
}

impl Default for ThreadLocalCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadCache for ThreadLocalCache {
    fn put(&mut self, index: u32, value: String) {
        THREAD_STORE.with(|store| {
            store
                .borrow_mut()
                .entry(self.session)
                .or_default()
                .entry(index)
                .or_insert(value);
        });
    }

    fn get(&self, index: u32) -> Option<String> {
        THREAD_STORE.with(|store| {
            store
                .borrow()
                .get(&self.session)
                .and_then(|strings| strings.get(&index).cloned())
        })
    }

    fn clear(&mut self) {
        let removed = THREAD_STORE.with(|store| store.borrow_mut().remove(&self.session));
        if let Some(strings) = removed {
            debug!("released {} cached strings of session {}", strings.len(), self.session);
        }
    }
}

impl Drop for ThreadLocalCache {
    fn drop(&mut self) {
        // The store may already be gone during thread teardown
        let _ = THREAD_STORE.try_with(|store| store.borrow_mut().remove(&self.session));
    }
}
