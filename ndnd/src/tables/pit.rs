use std::time::{Duration, Instant};

use log::trace;
use ndn_core::{Data, Interest, Nack};

use crate::face::FaceId;
use crate::scheduler::TimerHandle;
use crate::tables::measurements::StrategyScratch;
use crate::tables::name_tree::{NameTree, NameTreeEntryId};

/// Stable index of a PIT entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PitEntryId(usize);

impl PitEntryId {
    /// Construct from a raw slot index (tests and scheduler plumbing)
    pub fn from_raw(raw: usize) -> Self {
        Self(raw)
    }
}

/// Downstream record: a face that sent the Interest and awaits the Data
#[derive(Debug, Clone)]
pub struct InRecord {
    pub face: FaceId,
    pub interest: Interest,
    pub last_nonce: u32,
    pub expiry: Instant,
}

/// Upstream record: a face the Interest was forwarded to
#[derive(Debug, Clone)]
pub struct OutRecord {
    pub face: FaceId,
    pub last_nonce: u32,
    pub last_renewed: Instant,
    pub expiry: Instant,
    pub incoming_nack: Option<Nack>,
}

/// An Interest awaiting Data, together with its forwarding state
///
/// Invariant: at most one in-record and one out-record per face.
pub struct PitEntry {
    /// Representative Interest; its name and match flags form the aggregation key
    pub interest: Interest,
    name_tree_entry: NameTreeEntryId,
    pub in_records: Vec<InRecord>,
    pub out_records: Vec<OutRecord>,
    pub is_satisfied: bool,
    pub data_freshness_period: Duration,
    pub expiry_timer: Option<TimerHandle>,
    pub scratch: StrategyScratch,
}

impl PitEntry {
    fn new(interest: Interest, name_tree_entry: NameTreeEntryId) -> Self {
        Self {
            interest,
            name_tree_entry,
            in_records: Vec::new(),
            out_records: Vec::new(),
            is_satisfied: false,
            data_freshness_period: Duration::ZERO,
            expiry_timer: None,
            scratch: StrategyScratch::default(),
        }
    }

    pub fn name_tree_entry(&self) -> NameTreeEntryId {
        self.name_tree_entry
    }

    /// True when this Interest and `other` aggregate into the same entry
    fn same_key(&self, other: &Interest) -> bool {
        self.interest.name == other.name
            && self.interest.can_be_prefix == other.can_be_prefix
            && self.interest.must_be_fresh == other.must_be_fresh
    }

    pub fn find_in_record(&self, face: FaceId) -> Option<&InRecord> {
        self.in_records.iter().find(|r| r.face == face)
    }

    pub fn find_out_record(&self, face: FaceId) -> Option<&OutRecord> {
        self.out_records.iter().find(|r| r.face == face)
    }

    pub fn find_out_record_mut(&mut self, face: FaceId) -> Option<&mut OutRecord> {
        self.out_records.iter_mut().find(|r| r.face == face)
    }

    pub fn insert_or_update_in_record(&mut self, face: FaceId, interest: Interest, expiry: Instant) {
        let nonce = interest.nonce_or_zero();
        match self.in_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.interest = interest;
                record.last_nonce = nonce;
                record.expiry = expiry;
            }
            None => self.in_records.push(InRecord { face, interest, last_nonce: nonce, expiry }),
        }
    }

    pub fn insert_or_update_out_record(&mut self, face: FaceId, nonce: u32, now: Instant, expiry: Instant) {
        match self.out_records.iter_mut().find(|r| r.face == face) {
            Some(record) => {
                record.last_nonce = nonce;
                record.last_renewed = now;
                record.expiry = expiry;
                record.incoming_nack = None;
            }
            None => self.out_records.push(OutRecord {
                face,
                last_nonce: nonce,
                last_renewed: now,
                expiry,
                incoming_nack: None,
            }),
        }
    }

    pub fn delete_in_record(&mut self, face: FaceId) {
        self.in_records.retain(|r| r.face != face);
    }

    pub fn delete_out_record(&mut self, face: FaceId) {
        self.out_records.retain(|r| r.face != face);
    }

    pub fn clear_in_records(&mut self) {
        self.in_records.clear();
    }
}

/// Duplicate-nonce classification (bitmask)
pub const DUPLICATE_NONCE_NONE: u8 = 0;
/// The nonce matches the in-record of the same face
pub const DUPLICATE_NONCE_IN_SAME: u8 = 1 << 0;
/// The nonce matches the in-record of another face
pub const DUPLICATE_NONCE_IN_OTHER: u8 = 1 << 1;
/// The nonce matches the out-record of the same face
pub const DUPLICATE_NONCE_OUT_SAME: u8 = 1 << 2;
/// The nonce matches the out-record of another face
pub const DUPLICATE_NONCE_OUT_OTHER: u8 = 1 << 3;

/// Classify where `nonce` duplicates an existing record of `entry`
pub fn find_duplicate_nonce(entry: &PitEntry, nonce: u32, face: FaceId) -> u8 {
    let mut result = DUPLICATE_NONCE_NONE;
    for record in &entry.in_records {
        if record.last_nonce == nonce {
            result |= if record.face == face {
                DUPLICATE_NONCE_IN_SAME
            } else {
                DUPLICATE_NONCE_IN_OTHER
            };
        }
    }
    for record in &entry.out_records {
        if record.last_nonce == nonce {
            result |= if record.face == face {
                DUPLICATE_NONCE_OUT_SAME
            } else {
                DUPLICATE_NONCE_OUT_OTHER
            };
        }
    }
    result
}

/// True while some upstream may still answer: an out-record that has neither
/// expired nor been nacked
pub fn has_pending_out_records(entry: &PitEntry, now: Instant) -> bool {
    entry
        .out_records
        .iter()
        .any(|r| r.incoming_nack.is_none() && r.expiry > now)
}

/// Pending Interest Table
///
/// Entries live in an arena and are attached to their name tree entry;
/// Interests with distinct match flags never aggregate.
#[derive(Default)]
pub struct Pit {
    slots: Vec<Option<PitEntry>>,
    free: Vec<usize>,
    len: usize,
}

impl Pit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn get(&self, id: PitEntryId) -> &PitEntry {
        self.slots[id.0].as_ref().expect("stale PIT entry id")
    }

    pub fn get_mut(&mut self, id: PitEntryId) -> &mut PitEntry {
        self.slots[id.0].as_mut().expect("stale PIT entry id")
    }

    pub fn contains(&self, id: PitEntryId) -> bool {
        self.slots.get(id.0).map_or(false, Option::is_some)
    }

    /// Find or create the entry this Interest aggregates into
    pub fn insert(&mut self, name_tree: &mut NameTree, interest: &Interest) -> (PitEntryId, bool) {
        let nte = name_tree.lookup(&interest.name);
        for &id in &name_tree.entry(nte).pit_entries {
            if self.get(id).same_key(interest) {
                return (id, false);
            }
        }

        let entry = PitEntry::new(interest.clone(), nte);
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                PitEntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                PitEntryId(self.slots.len() - 1)
            }
        };
        name_tree.entry_mut(nte).pit_entries.push(id);
        self.len += 1;
        trace!("PIT insert {}", interest.name);
        (id, true)
    }

    /// Find the entry this Interest aggregates into, without creating one
    pub fn find(&self, name_tree: &NameTree, interest: &Interest) -> Option<PitEntryId> {
        let nte = name_tree.find(&interest.name)?;
        name_tree
            .entry(nte)
            .pit_entries
            .iter()
            .copied()
            .find(|&id| self.get(id).same_key(interest))
    }

    /// Every entry whose Interest is satisfied by this Data
    pub fn find_all_data_matches(&self, name_tree: &NameTree, data: &Data) -> Vec<PitEntryId> {
        let mut matches = Vec::new();
        let full_name = data.full_name();
        for k in 0..=full_name.len() {
            let Some(nte) = name_tree.find(&full_name.get_prefix(k)) else {
                continue;
            };
            for &id in &name_tree.entry(nte).pit_entries {
                if self.get(id).interest.matches_data(data) {
                    matches.push(id);
                }
            }
        }
        matches
    }

    /// Erase an entry and detach it from the name tree
    pub fn erase(&mut self, name_tree: &mut NameTree, id: PitEntryId) {
        let Some(entry) = self.slots[id.0].take() else {
            return;
        };
        self.free.push(id.0);
        self.len -= 1;
        trace!("PIT erase {}", entry.interest.name);

        let nte = entry.name_tree_entry;
        name_tree.entry_mut(nte).pit_entries.retain(|&p| p != id);
        name_tree.cleanup_if_empty(nte);
    }

    /// Iterate over all live entries
    pub fn iter(&self) -> impl Iterator<Item = (PitEntryId, &PitEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (PitEntryId(i), e)))
    }

    /// Iterate mutably over all live entries
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PitEntryId, &mut PitEntry)> {
        self.slots
            .iter_mut()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_mut().map(|e| (PitEntryId(i), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndn_core::Name;

    fn interest(name: &str) -> Interest {
        Interest::new(Name::from_str(name))
    }

    #[test]
    fn test_insert_aggregates_same_key() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();

        let (a, is_new_a) = pit.insert(&mut nt, &interest("/x").with_nonce(1));
        let (b, is_new_b) = pit.insert(&mut nt, &interest("/x").with_nonce(2));

        assert!(is_new_a);
        assert!(!is_new_b);
        assert_eq!(a, b);
        assert_eq!(pit.len(), 1);
    }

    #[test]
    fn test_distinct_keys_never_aggregate() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();

        let (plain, _) = pit.insert(&mut nt, &interest("/x"));
        let (fresh, _) = pit.insert(&mut nt, &interest("/x").with_must_be_fresh(true));
        let (prefix, _) = pit.insert(&mut nt, &interest("/x").with_can_be_prefix(true));

        assert_ne!(plain, fresh);
        assert_ne!(plain, prefix);
        assert_ne!(fresh, prefix);
        assert_eq!(pit.len(), 3);
        assert_eq!(nt.entry(nt.find(&Name::from_str("/x")).unwrap()).pit_entries.len(), 3);
    }

    #[test]
    fn test_records_unique_per_face() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let now = Instant::now();
        let (id, _) = pit.insert(&mut nt, &interest("/x"));

        let entry = pit.get_mut(id);
        entry.insert_or_update_in_record(10, interest("/x").with_nonce(1), now);
        entry.insert_or_update_in_record(10, interest("/x").with_nonce(2), now);
        entry.insert_or_update_out_record(20, 1, now, now);
        entry.insert_or_update_out_record(20, 2, now, now);

        assert_eq!(entry.in_records.len(), 1);
        assert_eq!(entry.in_records[0].last_nonce, 2);
        assert_eq!(entry.out_records.len(), 1);
        assert_eq!(entry.out_records[0].last_nonce, 2);
    }

    #[test]
    fn test_find_duplicate_nonce_classification() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let now = Instant::now();
        let (id, _) = pit.insert(&mut nt, &interest("/x"));

        let entry = pit.get_mut(id);
        entry.insert_or_update_in_record(10, interest("/x").with_nonce(7), now);
        entry.insert_or_update_out_record(20, 7, now, now);

        let entry = pit.get(id);
        assert_eq!(find_duplicate_nonce(entry, 7, 10), DUPLICATE_NONCE_IN_SAME | DUPLICATE_NONCE_OUT_OTHER);
        assert_eq!(find_duplicate_nonce(entry, 7, 11), DUPLICATE_NONCE_IN_OTHER | DUPLICATE_NONCE_OUT_OTHER);
        assert_eq!(find_duplicate_nonce(entry, 7, 20), DUPLICATE_NONCE_IN_OTHER | DUPLICATE_NONCE_OUT_SAME);
        assert_eq!(find_duplicate_nonce(entry, 8, 10), DUPLICATE_NONCE_NONE);
    }

    #[test]
    fn test_find_all_data_matches() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let data = Data::new(Name::from_str("/a/b/c"), vec![1]);

        let (exact, _) = pit.insert(&mut nt, &interest("/a/b/c"));
        let (prefix, _) = pit.insert(&mut nt, &interest("/a/b").with_can_be_prefix(true));
        let (non_prefix, _) = pit.insert(&mut nt, &interest("/a/b"));
        let (other, _) = pit.insert(&mut nt, &interest("/z"));

        let matches = pit.find_all_data_matches(&nt, &data);
        assert!(matches.contains(&exact));
        assert!(matches.contains(&prefix));
        assert!(!matches.contains(&non_prefix));
        assert!(!matches.contains(&other));
    }

    #[test]
    fn test_must_be_fresh_match_requires_freshness() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let (fresh, _) = pit.insert(&mut nt, &interest("/a").with_must_be_fresh(true));

        let stale_data = Data::new(Name::from_str("/a"), vec![]);
        assert!(pit.find_all_data_matches(&nt, &stale_data).is_empty());

        let fresh_data =
            Data::new(Name::from_str("/a"), vec![]).with_freshness_period(Duration::from_secs(1));
        assert_eq!(pit.find_all_data_matches(&nt, &fresh_data), vec![fresh]);
    }

    #[test]
    fn test_erase_detaches_and_cleans_tree() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let (id, _) = pit.insert(&mut nt, &interest("/a/b"));

        pit.erase(&mut nt, id);

        assert_eq!(pit.len(), 0);
        assert!(nt.is_empty());
        assert!(!pit.contains(id));
    }

    #[test]
    fn test_has_pending_out_records() {
        let mut nt = NameTree::new();
        let mut pit = Pit::new();
        let now = Instant::now();
        let later = now + Duration::from_secs(1);
        let (id, _) = pit.insert(&mut nt, &interest("/x"));

        assert!(!has_pending_out_records(pit.get(id), now));

        pit.get_mut(id).insert_or_update_out_record(20, 1, now, later);
        assert!(has_pending_out_records(pit.get(id), now));

        pit.get_mut(id).find_out_record_mut(20).unwrap().incoming_nack =
            Some(Nack::new(interest("/x"), ndn_core::NackReason::NoRoute));
        assert!(!has_pending_out_records(pit.get(id), now));
    }
}
