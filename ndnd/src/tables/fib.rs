use log::debug;
use ndn_core::Name;

use crate::face::FaceId;
use crate::tables::name_tree::{NameTree, NameTreeEntryId};

/// Next hop record: an upstream face and its routing cost
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NextHop {
    pub face: FaceId,
    pub cost: u64,
}

/// FIB entry: the next hops registered for one name prefix
///
/// Next hops are kept sorted by (cost, face id); at most one record per face.
#[derive(Debug, Clone, Default)]
pub struct FibEntry {
    next_hops: Vec<NextHop>,
}

impl FibEntry {
    pub fn next_hops(&self) -> &[NextHop] {
        &self.next_hops
    }

    pub fn has_next_hops(&self) -> bool {
        !self.next_hops.is_empty()
    }

    fn set_next_hop(&mut self, face: FaceId, cost: u64) -> bool {
        let is_new = match self.next_hops.iter_mut().find(|h| h.face == face) {
            Some(hop) => {
                hop.cost = cost;
                false
            }
            None => {
                self.next_hops.push(NextHop { face, cost });
                true
            }
        };
        self.next_hops.sort_by_key(|h| (h.cost, h.face));
        is_new
    }

    fn remove_face(&mut self, face: FaceId) {
        self.next_hops.retain(|h| h.face != face);
    }
}

/// Find the FIB entry with the longest prefix of `name`
pub fn find_longest_prefix_match(name_tree: &NameTree, name: &Name) -> Option<NameTreeEntryId> {
    name_tree.find_longest_prefix_match(name, |entry| entry.fib.is_some())
}

/// Insert or replace the next hop for `face` under `prefix`
///
/// Returns true when the face was not a next hop of this prefix before (the
/// caller then runs the new-next-hop pipeline).
pub fn add_or_update_next_hop(
    name_tree: &mut NameTree,
    prefix: &Name,
    face: FaceId,
    cost: u64,
) -> bool {
    let nte = name_tree.lookup(prefix);
    let entry = name_tree.entry_mut(nte);
    let is_new = entry.fib.get_or_insert_with(FibEntry::default).set_next_hop(face, cost);
    debug!("FIB add {} -> face {} cost {}", prefix, face, cost);
    is_new
}

/// Remove the next hop for `face` under `prefix`; the entry is erased when its
/// last next hop goes
pub fn remove_next_hop(name_tree: &mut NameTree, prefix: &Name, face: FaceId) {
    let Some(nte) = name_tree.find(prefix) else {
        return;
    };
    let entry = name_tree.entry_mut(nte);
    if let Some(fib) = entry.fib.as_mut() {
        fib.remove_face(face);
        if !fib.has_next_hops() {
            entry.fib = None;
            debug!("FIB erase {}", prefix);
        }
    }
    name_tree.cleanup_if_empty(nte);
}

/// Remove every next hop that references `face` (face removal cleanup)
pub fn remove_face(name_tree: &mut NameTree, face: FaceId) {
    let affected: Vec<NameTreeEntryId> = name_tree
        .iter()
        .filter(|(_, entry)| {
            entry.fib.as_ref().map_or(false, |fib| fib.next_hops.iter().any(|h| h.face == face))
        })
        .map(|(id, _)| id)
        .collect();

    for nte in affected {
        let entry = name_tree.entry_mut(nte);
        if let Some(fib) = entry.fib.as_mut() {
            fib.remove_face(face);
            if !fib.has_next_hops() {
                entry.fib = None;
            }
        }
        name_tree.cleanup_if_empty(nte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_next_hops_sorted_by_cost_then_face() {
        let mut nt = NameTree::new();
        let prefix = Name::from_str("/x");

        assert!(add_or_update_next_hop(&mut nt, &prefix, 30, 10));
        assert!(add_or_update_next_hop(&mut nt, &prefix, 21, 10));
        assert!(add_or_update_next_hop(&mut nt, &prefix, 40, 5));

        let nte = find_longest_prefix_match(&nt, &Name::from_str("/x/y")).unwrap();
        let hops: Vec<FaceId> = nt.entry(nte).fib.as_ref().unwrap().next_hops().iter().map(|h| h.face).collect();
        assert_eq!(hops, vec![40, 21, 30]);
    }

    #[test]
    fn test_update_existing_hop_is_not_new() {
        let mut nt = NameTree::new();
        let prefix = Name::from_str("/x");

        assert!(add_or_update_next_hop(&mut nt, &prefix, 20, 10));
        assert!(!add_or_update_next_hop(&mut nt, &prefix, 20, 3));

        let nte = nt.find(&prefix).unwrap();
        assert_eq!(nt.entry(nte).fib.as_ref().unwrap().next_hops()[0].cost, 3);
    }

    #[test]
    fn test_longest_prefix_match_prefers_deepest() {
        let mut nt = NameTree::new();
        add_or_update_next_hop(&mut nt, &Name::from_str("/a"), 20, 1);
        add_or_update_next_hop(&mut nt, &Name::from_str("/a/b"), 21, 1);

        let nte = find_longest_prefix_match(&nt, &Name::from_str("/a/b/c")).unwrap();
        assert_eq!(nt.entry(nte).name(), &Name::from_str("/a/b"));

        let nte = find_longest_prefix_match(&nt, &Name::from_str("/a/z")).unwrap();
        assert_eq!(nt.entry(nte).name(), &Name::from_str("/a"));

        assert!(find_longest_prefix_match(&nt, &Name::from_str("/z")).is_none());
    }

    #[test]
    fn test_last_next_hop_removal_erases_entry() {
        let mut nt = NameTree::new();
        let prefix = Name::from_str("/x/y");
        add_or_update_next_hop(&mut nt, &prefix, 20, 1);
        add_or_update_next_hop(&mut nt, &prefix, 21, 1);

        remove_next_hop(&mut nt, &prefix, 20);
        assert!(nt.find(&prefix).is_some());

        remove_next_hop(&mut nt, &prefix, 21);
        assert!(nt.find(&prefix).is_none());
        assert!(nt.is_empty());
    }

    #[test]
    fn test_remove_face_scrubs_all_entries() {
        let mut nt = NameTree::new();
        add_or_update_next_hop(&mut nt, &Name::from_str("/a"), 11, 1);
        add_or_update_next_hop(&mut nt, &Name::from_str("/a"), 20, 2);
        add_or_update_next_hop(&mut nt, &Name::from_str("/b"), 11, 1);

        remove_face(&mut nt, 11);

        let a = nt.find(&Name::from_str("/a")).unwrap();
        let hops: Vec<FaceId> = nt.entry(a).fib.as_ref().unwrap().next_hops().iter().map(|h| h.face).collect();
        assert_eq!(hops, vec![20]);
        assert!(nt.find(&Name::from_str("/b")).is_none());
    }
}
