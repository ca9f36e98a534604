use std::collections::BTreeMap;
use std::ops::Bound;
use std::time::{Duration, Instant};

use log::{debug, trace};
use ndn_core::{Data, Interest, Name};

/// Default content store capacity (packets)
pub const DEFAULT_CS_CAPACITY: usize = 65536;

/// A cached Data packet
#[derive(Debug, Clone)]
pub struct CsEntry {
    pub data: Data,
    /// Instant after which the entry no longer satisfies MustBeFresh
    pub staleness_time: Instant,
    pub unsolicited: bool,
    inserted_seq: u64,
    last_used_seq: u64,
}

impl CsEntry {
    pub fn is_stale(&self, now: Instant) -> bool {
        self.staleness_time <= now
    }
}

/// Content Store: bounded cache of recently seen Data packets
///
/// Entries are keyed by the digest-qualified full name, so prefix range scans
/// over the `BTreeMap` enumerate every candidate for an Interest name.
/// Replacement is LRU by access.
pub struct ContentStore {
    entries: BTreeMap<Name, CsEntry>,
    capacity: usize,
    seq: u64,
}

impl ContentStore {
    pub fn new(capacity: usize) -> Self {
        Self { entries: BTreeMap::new(), capacity, seq: 0 }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Insert a Data packet, evicting by LRU when over capacity
    pub fn insert(&mut self, data: Data, unsolicited: bool, now: Instant) {
        if self.capacity == 0 {
            return;
        }

        let full_name = data.full_name();
        let staleness_time = now + data.freshness_period();
        self.seq += 1;
        let entry = CsEntry {
            data,
            staleness_time,
            unsolicited,
            inserted_seq: self.seq,
            last_used_seq: self.seq,
        };
        trace!("CS insert {}", full_name);
        self.entries.insert(full_name, entry);

        while self.entries.len() > self.capacity {
            self.evict_one();
        }
    }

    fn evict_one(&mut self) {
        let victim = self
            .entries
            .iter()
            .min_by_key(|(_, e)| e.last_used_seq)
            .map(|(name, _)| name.clone());
        if let Some(name) = victim {
            debug!("CS evict {}", name);
            self.entries.remove(&name);
        }
    }

    /// Find the Data that satisfies `interest`, or None for a miss
    ///
    /// Among matching entries (stale ones excluded when MustBeFresh is set)
    /// the most recently inserted wins, ties going to the lexicographically
    /// smallest full name. A hit refreshes the entry's LRU position.
    pub fn find(&mut self, interest: &Interest, now: Instant) -> Option<Data> {
        let prefix = &interest.name;
        let upper = if prefix.is_empty() {
            Bound::Unbounded
        } else {
            Bound::Excluded(prefix.successor())
        };

        let mut best: Option<(&Name, &CsEntry)> = None;
        for (full_name, entry) in
            self.entries.range::<Name, _>((Bound::Included(prefix.clone()), upper))
        {
            if !prefix.is_prefix_of(full_name) {
                continue;
            }
            if !interest.can_be_prefix
                && entry.data.name != *prefix
                && *full_name != *prefix
            {
                continue;
            }
            if interest.must_be_fresh && entry.is_stale(now) {
                continue;
            }
            let better = match &best {
                None => true,
                Some((_, current)) => entry.inserted_seq > current.inserted_seq,
            };
            if better {
                best = Some((full_name, entry));
            }
        }

        let winner = best.map(|(name, _)| name.clone())?;
        self.seq += 1;
        let seq = self.seq;
        let entry = self.entries.get_mut(&winner)?;
        entry.last_used_seq = seq;
        Some(entry.data.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(name: &str, freshness_ms: u64) -> Data {
        let mut d = Data::new(Name::from_str(name), name.as_bytes().to_vec());
        if freshness_ms > 0 {
            d = d.with_freshness_period(Duration::from_millis(freshness_ms));
        }
        d
    }

    #[test]
    fn test_exact_and_prefix_lookup() {
        let mut cs = ContentStore::new(16);
        let now = Instant::now();
        cs.insert(data("/a/b", 5000), false, now);

        assert!(cs.find(&Interest::new(Name::from_str("/a/b")), now).is_some());
        assert!(cs
            .find(&Interest::new(Name::from_str("/a")).with_can_be_prefix(true), now)
            .is_some());
        // without CanBePrefix a shorter name misses
        assert!(cs.find(&Interest::new(Name::from_str("/a")), now).is_none());
        assert!(cs.find(&Interest::new(Name::from_str("/a/c")), now).is_none());
    }

    #[test]
    fn test_must_be_fresh_expired_is_miss() {
        let mut cs = ContentStore::new(16);
        let now = Instant::now();
        cs.insert(data("/a/b", 100), false, now);

        let fresh_interest = Interest::new(Name::from_str("/a/b")).with_must_be_fresh(true);
        let later = now + Duration::from_millis(200);

        assert!(cs.find(&fresh_interest.clone(), now).is_some());
        assert!(cs.find(&fresh_interest, later).is_none());
        // a plain Interest still hits the stale entry
        assert!(cs.find(&Interest::new(Name::from_str("/a/b")), later).is_some());
    }

    #[test]
    fn test_most_recent_insert_wins() {
        let mut cs = ContentStore::new(16);
        let now = Instant::now();
        cs.insert(data("/p/one", 1000), false, now);
        cs.insert(data("/p/two", 1000), false, now);

        let found = cs
            .find(&Interest::new(Name::from_str("/p")).with_can_be_prefix(true), now)
            .unwrap();
        assert_eq!(found.name, Name::from_str("/p/two"));
    }

    #[test]
    fn test_lru_eviction_at_capacity() {
        let mut cs = ContentStore::new(2);
        let now = Instant::now();
        cs.insert(data("/a", 1000), false, now);
        cs.insert(data("/b", 1000), false, now);

        // touch /a so /b becomes least recently used
        assert!(cs.find(&Interest::new(Name::from_str("/a")), now).is_some());
        cs.insert(data("/c", 1000), false, now);

        assert_eq!(cs.len(), 2);
        assert!(cs.find(&Interest::new(Name::from_str("/a")), now).is_some());
        assert!(cs.find(&Interest::new(Name::from_str("/b")), now).is_none());
        assert!(cs.find(&Interest::new(Name::from_str("/c")), now).is_some());
    }

    #[test]
    fn test_zero_capacity_never_admits() {
        let mut cs = ContentStore::new(0);
        let now = Instant::now();
        cs.insert(data("/a", 1000), false, now);
        assert!(cs.is_empty());
    }

    #[test]
    fn test_full_name_interest_hits() {
        let mut cs = ContentStore::new(16);
        let now = Instant::now();
        let packet = data("/a/b", 1000);
        let full = packet.full_name();
        cs.insert(packet, false, now);

        assert!(cs.find(&Interest::new(full), now).is_some());
    }
}
