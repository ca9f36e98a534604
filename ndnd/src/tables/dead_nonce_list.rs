use std::collections::hash_map::RandomState;
use std::collections::{HashMap, VecDeque};
use std::hash::{BuildHasher, Hash, Hasher};
use std::time::{Duration, Instant};

use log::trace;
use ndn_core::Name;

/// Default retention window for retired nonces
pub const DEFAULT_DNL_LIFETIME: Duration = Duration::from_secs(6);
/// Default capacity (entries)
pub const DEFAULT_DNL_CAPACITY: usize = 65536;

/// Dead Nonce List: a bounded, time-windowed set of retired (name, nonce)
/// pairs used to suppress looped Interests whose PIT entry is gone
///
/// Entries are stored as salted 64-bit hashes in FIFO order; the oldest drop
/// first, both on age-out and on capacity overflow. Age-out runs inline on
/// every mutation, so no background timer is needed.
pub struct DeadNonceList {
    queue: VecDeque<(Instant, u64)>,
    index: HashMap<u64, u32>,
    capacity: usize,
    lifetime: Duration,
    salt: RandomState,
}

impl DeadNonceList {
    pub fn new(capacity: usize, lifetime: Duration) -> Self {
        Self {
            queue: VecDeque::new(),
            index: HashMap::new(),
            capacity,
            lifetime,
            salt: RandomState::new(),
        }
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    fn hash_entry(&self, name: &Name, nonce: u32) -> u64 {
        let mut hasher = self.salt.build_hasher();
        name.hash(&mut hasher);
        nonce.hash(&mut hasher);
        hasher.finish()
    }

    fn evict_front(&mut self) {
        if let Some((_, hash)) = self.queue.pop_front() {
            if let Some(count) = self.index.get_mut(&hash) {
                *count -= 1;
                if *count == 0 {
                    self.index.remove(&hash);
                }
            }
        }
    }

    fn evict_expired(&mut self, now: Instant) {
        while let Some(&(added, _)) = self.queue.front() {
            if now.duration_since(added) < self.lifetime {
                break;
            }
            self.evict_front();
        }
    }

    /// Record a retired (name, nonce) pair
    pub fn add(&mut self, name: &Name, nonce: u32, now: Instant) {
        self.evict_expired(now);

        let hash = self.hash_entry(name, nonce);
        trace!("DNL add {} nonce {:#x}", name, nonce);
        self.queue.push_back((now, hash));
        *self.index.entry(hash).or_insert(0) += 1;

        while self.queue.len() > self.capacity {
            self.evict_front();
        }
    }

    /// Check whether the pair was retired within the lifetime window
    pub fn has(&mut self, name: &Name, nonce: u32, now: Instant) -> bool {
        self.evict_expired(now);
        self.index.contains_key(&self.hash_entry(name, nonce))
    }
}

impl Default for DeadNonceList {
    fn default() -> Self {
        Self::new(DEFAULT_DNL_CAPACITY, DEFAULT_DNL_LIFETIME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_then_has() {
        let mut dnl = DeadNonceList::default();
        let now = Instant::now();
        let name = Name::from_str("/x");

        assert!(!dnl.has(&name, 0x7, now));
        dnl.add(&name, 0x7, now);
        assert!(dnl.has(&name, 0x7, now));
        assert!(!dnl.has(&name, 0x8, now));
        assert!(!dnl.has(&Name::from_str("/y"), 0x7, now));
    }

    #[test]
    fn test_lifetime_age_out() {
        let mut dnl = DeadNonceList::new(16, Duration::from_millis(100));
        let now = Instant::now();
        let name = Name::from_str("/x");

        dnl.add(&name, 1, now);
        assert!(dnl.has(&name, 1, now + Duration::from_millis(50)));
        assert!(!dnl.has(&name, 1, now + Duration::from_millis(150)));
        assert!(dnl.is_empty());
    }

    #[test]
    fn test_capacity_drops_oldest_first() {
        let mut dnl = DeadNonceList::new(2, Duration::from_secs(60));
        let now = Instant::now();
        let name = Name::from_str("/x");

        dnl.add(&name, 1, now);
        dnl.add(&name, 2, now + Duration::from_millis(1));
        dnl.add(&name, 3, now + Duration::from_millis(2));

        let later = now + Duration::from_millis(3);
        assert_eq!(dnl.len(), 2);
        assert!(!dnl.has(&name, 1, later));
        assert!(dnl.has(&name, 2, later));
        assert!(dnl.has(&name, 3, later));
    }

    #[test]
    fn test_duplicate_pairs_count_separately() {
        let mut dnl = DeadNonceList::new(16, Duration::from_secs(60));
        let now = Instant::now();
        let name = Name::from_str("/x");

        dnl.add(&name, 1, now);
        dnl.add(&name, 1, now);
        assert_eq!(dnl.len(), 2);

        // dropping one copy keeps the pair present
        dnl.evict_front();
        assert!(dnl.has(&name, 1, now));
        dnl.evict_front();
        assert!(!dnl.has(&name, 1, now));
    }
}
