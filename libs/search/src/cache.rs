//! Memoization of executed searches
//!
//! Entries are keyed by `(config identity, query text, page, page size)` and
//! hold the `(total, entities)` pair of one executed search. The config part of
//! the key is the identity of the shared config instance, not its content, so
//! two domains never share entries even if they behave identically. A key
//! holds a reference to its config, so an instance stays allocated while any
//! of its entries do and its address cannot be handed to another config.
//!
//! Values are type-erased so one cache can serve executors of different entity
//! types.

use lru::LruCache;
use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::num::NonZeroUsize;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

/// How entries are stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheMode {
    /// Keep every entry for the lifetime of the cache.
    Unbounded,
    /// Keep at most `capacity` entries, evicting the least recently used.
    Lru { capacity: NonZeroUsize },
    /// Never store anything.
    Disabled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    pub mode: CacheMode,
    /// Entries older than this are treated as absent. `None` keeps them forever.
    pub ttl: Option<Duration>,
    /// Let at most one caller compute a missing key at a time.
    pub single_flight: bool,
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            mode: CacheMode::Unbounded,
            ttl: None,
            single_flight: true,
        }
    }
}

/// Identity of a config instance.
#[derive(Clone)]
pub struct ConfigId {
    anchor: Arc<dyn Any + Send + Sync>,
    type_id: TypeId,
}

impl ConfigId {
    /// Identity of the instance behind `config`. Clones of the same `Arc`
    /// share an identity; separately allocated configs never do.
    pub fn of<C: Any + Send + Sync>(config: &Arc<C>) -> Self {
        Self {
            anchor: Arc::clone(config) as Arc<dyn Any + Send + Sync>,
            type_id: TypeId::of::<C>(),
        }
    }

    fn addr(&self) -> usize {
        Arc::as_ptr(&self.anchor) as *const () as usize
    }
}

impl PartialEq for ConfigId {
    fn eq(&self, other: &Self) -> bool {
        self.addr() == other.addr() && self.type_id == other.type_id
    }
}

impl Eq for ConfigId {}

impl Hash for ConfigId {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
        self.type_id.hash(state);
    }
}

impl fmt::Debug for ConfigId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConfigId")
            .field("addr", &format_args!("{:#x}", self.addr()))
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub config: ConfigId,
    pub query_text: String,
    pub page: u64,
    pub page_size: u64,
}

pub type CachedValue = Arc<dyn Any + Send + Sync>;

struct Entry {
    value: CachedValue,
    stored_at: Instant,
}

enum Store {
    Unbounded(HashMap<CacheKey, Entry>),
    Lru(LruCache<CacheKey, Entry>),
    Disabled,
}

/// Shared result cache. Cheap to share behind an `Arc`.
pub struct ResultCache {
    policy: CachePolicy,
    store: Mutex<Store>,
    in_flight: Mutex<HashSet<CacheKey>>,
    in_flight_done: Condvar,
}

impl fmt::Debug for ResultCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResultCache")
            .field("policy", &self.policy)
            .field("len", &self.len())
            .finish()
    }
}

impl Default for ResultCache {
    fn default() -> Self {
        Self::new(CachePolicy::default())
    }
}

impl ResultCache {
    pub fn new(policy: CachePolicy) -> Self {
        let store = match policy.mode {
            CacheMode::Unbounded => Store::Unbounded(HashMap::new()),
            CacheMode::Lru { capacity } => Store::Lru(LruCache::new(capacity)),
            CacheMode::Disabled => Store::Disabled,
        };
        Self {
            policy,
            store: Mutex::new(store),
            in_flight: Mutex::new(HashSet::new()),
            in_flight_done: Condvar::new(),
        }
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    pub fn contains(&self, key: &CacheKey) -> bool {
        self.get(key).is_some()
    }

    /// Look up an entry. Expired entries are dropped and reported as absent.
    pub fn get(&self, key: &CacheKey) -> Option<CachedValue> {
        let ttl = self.policy.ttl;
        let is_stale = |entry: &Entry| ttl.is_some_and(|ttl| entry.stored_at.elapsed() >= ttl);

        let mut store = self.lock_store();
        match &mut *store {
            Store::Unbounded(map) => {
                if map.get(key).is_some_and(is_stale) {
                    map.remove(key);
                    return None;
                }
                map.get(key).map(|e| e.value.clone())
            }
            Store::Lru(lru) => {
                if lru.peek(key).is_some_and(is_stale) {
                    lru.pop(key);
                    return None;
                }
                lru.get(key).map(|e| e.value.clone())
            }
            Store::Disabled => None,
        }
    }

    /// Look up an entry and downcast it. A value of another type counts as a miss.
    pub fn get_typed<T: Any + Send + Sync>(&self, key: &CacheKey) -> Option<Arc<T>> {
        self.get(key)?.downcast::<T>().ok()
    }

    pub fn put(&self, key: CacheKey, value: CachedValue) {
        let entry = Entry {
            value,
            stored_at: Instant::now(),
        };
        let mut store = self.lock_store();
        match &mut *store {
            Store::Unbounded(map) => {
                map.insert(key, entry);
            }
            Store::Lru(lru) => {
                lru.put(key, entry);
            }
            Store::Disabled => {}
        }
    }

    /// Drop every entry of one config. Returns the number of removed entries.
    pub fn invalidate_config(&self, config: &ConfigId) -> usize {
        let mut store = self.lock_store();
        match &mut *store {
            Store::Unbounded(map) => {
                let before = map.len();
                map.retain(|k, _| &k.config != config);
                before - map.len()
            }
            Store::Lru(lru) => {
                let keys: Vec<CacheKey> = lru
                    .iter()
                    .filter(|(k, _)| &k.config == config)
                    .map(|(k, _)| k.clone())
                    .collect();
                for key in &keys {
                    lru.pop(key);
                }
                keys.len()
            }
            Store::Disabled => 0,
        }
    }

    pub fn clear(&self) {
        let mut store = self.lock_store();
        match &mut *store {
            Store::Unbounded(map) => map.clear(),
            Store::Lru(lru) => lru.clear(),
            Store::Disabled => {}
        }
    }

    pub fn len(&self) -> usize {
        match &*self.lock_store() {
            Store::Unbounded(map) => map.len(),
            Store::Lru(lru) => lru.len(),
            Store::Disabled => 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Claim the right to compute `key`.
    ///
    /// With single-flight enabled this blocks while another caller holds the
    /// claim for the same key; the claim is released when the returned guard
    /// is dropped. Returns `None` when single-flight is off or nothing is
    /// cached anyway.
    pub fn claim(&self, key: &CacheKey) -> Option<InFlightGuard<'_>> {
        if !self.policy.single_flight || self.policy.mode == CacheMode::Disabled {
            return None;
        }

        let mut in_flight = self
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        while in_flight.contains(key) {
            in_flight = self
                .in_flight_done
                .wait(in_flight)
                .unwrap_or_else(PoisonError::into_inner);
        }
        in_flight.insert(key.clone());

        Some(InFlightGuard {
            cache: self,
            key: key.clone(),
        })
    }

    fn lock_store(&self) -> MutexGuard<'_, Store> {
        self.store.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Releases a key claimed with [`ResultCache::claim`] on drop.
pub struct InFlightGuard<'a> {
    cache: &'a ResultCache,
    key: CacheKey,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        let mut in_flight = self
            .cache
            .in_flight
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        in_flight.remove(&self.key);
        drop(in_flight);
        self.cache.in_flight_done.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    struct DomainA;
    struct DomainB;

    fn key(config: &ConfigId, text: &str) -> CacheKey {
        CacheKey {
            config: config.clone(),
            query_text: text.to_string(),
            page: 1,
            page_size: 100,
        }
    }

    fn value(n: u64) -> CachedValue {
        Arc::new(n)
    }

    #[test]
    fn stores_and_returns_values() {
        let cache = ResultCache::default();
        let id = ConfigId::of(&Arc::new(DomainA));
        let k = key(&id, "foo");

        assert!(!cache.contains(&k));
        cache.put(k.clone(), value(7));
        assert!(cache.contains(&k));
        assert_eq!(cache.get_typed::<u64>(&k).as_deref(), Some(&7));
        assert!(cache.get_typed::<String>(&k).is_none());
    }

    #[test]
    fn key_components_are_all_significant() {
        let cache = ResultCache::default();
        let id = ConfigId::of(&Arc::new(DomainA));
        let base = key(&id, "foo");
        cache.put(base.clone(), value(1));

        let mut other_page = base.clone();
        other_page.page = 2;
        let mut other_size = base.clone();
        other_size.page_size = 50;
        let other_text = key(&id, "bar");

        assert!(cache.contains(&base));
        assert!(!cache.contains(&other_page));
        assert!(!cache.contains(&other_size));
        assert!(!cache.contains(&other_text));
    }

    #[test]
    fn config_identity_is_per_instance() {
        let a1 = Arc::new(DomainA);
        let a2 = Arc::new(DomainA);
        let b = Arc::new(DomainB);

        assert_eq!(ConfigId::of(&a1), ConfigId::of(&a1.clone()));
        assert_ne!(ConfigId::of(&a1), ConfigId::of(&a2));
        assert_ne!(ConfigId::of(&a1), ConfigId::of(&b));
    }

    #[test]
    fn entries_keep_their_config_allocated() {
        let cache = ResultCache::default();
        let config = Arc::new(DomainA);
        cache.put(key(&ConfigId::of(&config), "a"), value(1));
        assert_eq!(Arc::strong_count(&config), 2);

        cache.clear();
        assert_eq!(Arc::strong_count(&config), 1);
    }

    #[test]
    fn lru_mode_evicts_least_recently_used() {
        let cache = ResultCache::new(CachePolicy {
            mode: CacheMode::Lru {
                capacity: NonZeroUsize::new(2).unwrap(),
            },
            ..CachePolicy::default()
        });
        let id = ConfigId::of(&Arc::new(DomainA));

        cache.put(key(&id, "a"), value(1));
        cache.put(key(&id, "b"), value(2));
        assert!(cache.contains(&key(&id, "a")));
        cache.put(key(&id, "c"), value(3));

        assert_eq!(cache.len(), 2);
        assert!(cache.contains(&key(&id, "a")));
        assert!(!cache.contains(&key(&id, "b")));
        assert!(cache.contains(&key(&id, "c")));
    }

    #[test]
    fn disabled_mode_stores_nothing() {
        let cache = ResultCache::new(CachePolicy {
            mode: CacheMode::Disabled,
            ..CachePolicy::default()
        });
        let id = ConfigId::of(&Arc::new(DomainA));
        cache.put(key(&id, "a"), value(1));
        assert!(cache.is_empty());
        assert!(cache.claim(&key(&id, "a")).is_none());
    }

    #[test]
    fn expired_entries_are_misses() {
        let cache = ResultCache::new(CachePolicy {
            ttl: Some(Duration::from_millis(20)),
            ..CachePolicy::default()
        });
        let id = ConfigId::of(&Arc::new(DomainA));
        cache.put(key(&id, "a"), value(1));
        assert!(cache.contains(&key(&id, "a")));

        thread::sleep(Duration::from_millis(40));
        assert!(!cache.contains(&key(&id, "a")));
        assert!(cache.is_empty());
    }

    #[test]
    fn invalidate_config_only_touches_that_config() {
        for policy in [
            CachePolicy::default(),
            CachePolicy {
                mode: CacheMode::Lru {
                    capacity: NonZeroUsize::new(8).unwrap(),
                },
                ..CachePolicy::default()
            },
        ] {
            let cache = ResultCache::new(policy);
            let a = ConfigId::of(&Arc::new(DomainA));
            let b = ConfigId::of(&Arc::new(DomainB));
            cache.put(key(&a, "x"), value(1));
            cache.put(key(&a, "y"), value(2));
            cache.put(key(&b, "x"), value(3));

            assert_eq!(cache.invalidate_config(&a), 2);
            assert_eq!(cache.len(), 1);
            assert!(cache.contains(&key(&b, "x")));

            cache.clear();
            assert!(cache.is_empty());
        }
    }

    #[test]
    fn claims_serialize_callers_of_the_same_key() {
        let cache = Arc::new(ResultCache::default());
        let id = ConfigId::of(&Arc::new(DomainA));
        let k = key(&id, "slow");
        let active = Arc::new(Mutex::new(0usize));
        let max_active = Arc::new(Mutex::new(0usize));

        thread::scope(|s| {
            for _ in 0..4 {
                let cache = Arc::clone(&cache);
                let k = k.clone();
                let active = Arc::clone(&active);
                let max_active = Arc::clone(&max_active);
                s.spawn(move || {
                    let _claim = cache.claim(&k);
                    {
                        let mut n = active.lock().unwrap();
                        *n += 1;
                        let mut m = max_active.lock().unwrap();
                        *m = (*m).max(*n);
                    }
                    thread::sleep(Duration::from_millis(10));
                    *active.lock().unwrap() -= 1;
                });
            }
        });

        assert_eq!(*max_active.lock().unwrap(), 1);
    }
}
