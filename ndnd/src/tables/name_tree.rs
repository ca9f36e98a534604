use std::collections::HashMap;

use log::trace;
use ndn_core::Name;

use crate::tables::fib::FibEntry;
use crate::tables::measurements::MeasurementsEntry;
use crate::tables::pit::PitEntryId;

/// Stable index of a name tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NameTreeEntryId(usize);

/// Node of the name tree
///
/// Each entry owns its name and carries the table entries anchored at that
/// name. An entry stays alive while it has a dependent (FIB, PIT,
/// measurements, strategy choice) or a descendant with one.
pub struct NameTreeEntry {
    name: Name,
    parent: Option<NameTreeEntryId>,
    children: Vec<NameTreeEntryId>,
    pub fib: Option<FibEntry>,
    pub pit_entries: Vec<PitEntryId>,
    pub measurements: Option<MeasurementsEntry>,
    /// Strategy instance name chosen for this prefix
    pub strategy_choice: Option<Name>,
}

impl NameTreeEntry {
    fn new(name: Name, parent: Option<NameTreeEntryId>) -> Self {
        Self {
            name,
            parent,
            children: Vec::new(),
            fib: None,
            pit_entries: Vec::new(),
            measurements: None,
            strategy_choice: None,
        }
    }

    pub fn name(&self) -> &Name {
        &self.name
    }

    pub fn parent(&self) -> Option<NameTreeEntryId> {
        self.parent
    }

    pub fn children(&self) -> &[NameTreeEntryId] {
        &self.children
    }

    /// True when nothing anchors this entry (children aside)
    fn has_no_dependents(&self) -> bool {
        self.fib.is_none()
            && self.pit_entries.is_empty()
            && self.measurements.is_none()
            && self.strategy_choice.is_none()
    }
}

/// Hash index from names to entries, shared by FIB, PIT, measurements and
/// strategy choice
///
/// Entries are kept in an arena with stable indices; the `HashMap` index uses
/// the standard salted SipHash, which resists adversarial collisions without
/// being cryptographic.
#[derive(Default)]
pub struct NameTree {
    slots: Vec<Option<NameTreeEntry>>,
    free: Vec<usize>,
    index: HashMap<Name, NameTreeEntryId>,
}

impl NameTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live entries
    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn entry(&self, id: NameTreeEntryId) -> &NameTreeEntry {
        self.slots[id.0].as_ref().expect("stale name tree entry id")
    }

    pub fn entry_mut(&mut self, id: NameTreeEntryId) -> &mut NameTreeEntry {
        self.slots[id.0].as_mut().expect("stale name tree entry id")
    }

    /// Find the entry for an exact name
    pub fn find(&self, name: &Name) -> Option<NameTreeEntryId> {
        self.index.get(name).copied()
    }

    /// Find the entry for an exact name, inserting it (and every missing
    /// ancestor) if absent
    pub fn lookup(&mut self, name: &Name) -> NameTreeEntryId {
        if let Some(id) = self.find(name) {
            return id;
        }

        // deepest existing ancestor
        let mut depth = 0;
        let mut parent = None;
        for k in (0..name.len()).rev() {
            if let Some(id) = self.find(&name.get_prefix(k)) {
                depth = k;
                parent = Some(id);
                break;
            }
        }
        if parent.is_none() && !name.is_empty() {
            parent = Some(self.insert_entry(Name::new(), None));
            depth = 0;
        }
        if name.is_empty() {
            return self.insert_entry(Name::new(), None);
        }

        let mut parent = parent.expect("root entry exists");
        for k in depth + 1..=name.len() {
            let child = self.insert_entry(name.get_prefix(k), Some(parent));
            self.entry_mut(parent).children.push(child);
            parent = child;
        }
        parent
    }

    fn insert_entry(&mut self, name: Name, parent: Option<NameTreeEntryId>) -> NameTreeEntryId {
        let entry = NameTreeEntry::new(name.clone(), parent);
        let id = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(entry);
                NameTreeEntryId(slot)
            }
            None => {
                self.slots.push(Some(entry));
                NameTreeEntryId(self.slots.len() - 1)
            }
        };
        trace!("name tree insert {}", name);
        self.index.insert(name, id);
        id
    }

    /// Erase `id` if it carries no dependents and no children, then repeat for
    /// each ancestor that became empty
    pub fn cleanup_if_empty(&mut self, id: NameTreeEntryId) {
        let mut current = Some(id);
        while let Some(id) = current {
            let entry = self.entry(id);
            if !entry.has_no_dependents() || !entry.children.is_empty() {
                return;
            }
            let parent = entry.parent;
            let name = entry.name.clone();

            if let Some(parent_id) = parent {
                self.entry_mut(parent_id).children.retain(|&c| c != id);
            }
            trace!("name tree erase {}", name);
            self.index.remove(&name);
            self.slots[id.0] = None;
            self.free.push(id.0);

            current = parent;
        }
    }

    /// Find the deepest entry whose name is a prefix of `name` and which
    /// satisfies `predicate`
    pub fn find_longest_prefix_match(
        &self,
        name: &Name,
        predicate: impl Fn(&NameTreeEntry) -> bool,
    ) -> Option<NameTreeEntryId> {
        for k in (0..=name.len()).rev() {
            if let Some(id) = self.find(&name.get_prefix(k)) {
                if predicate(self.entry(id)) {
                    return Some(id);
                }
            }
        }
        None
    }

    /// Visit the subtree rooted at `prefix`
    ///
    /// The visitor returns `(include_self, descend_into_children)`; the ids of
    /// included entries are returned. Each qualifying entry is visited exactly
    /// once; the order is unspecified.
    pub fn partial_enumerate(
        &self,
        prefix: &Name,
        mut visitor: impl FnMut(&NameTreeEntry) -> (bool, bool),
    ) -> Vec<NameTreeEntryId> {
        let mut included = Vec::new();
        let Some(root) = self.find(prefix) else {
            return included;
        };

        let mut stack = vec![root];
        while let Some(id) = stack.pop() {
            let entry = self.entry(id);
            let (include, descend) = visitor(entry);
            if include {
                included.push(id);
            }
            if descend {
                stack.extend_from_slice(&entry.children);
            }
        }
        included
    }

    /// Iterate over all live entries
    pub fn iter(&self) -> impl Iterator<Item = (NameTreeEntryId, &NameTreeEntry)> {
        self.slots
            .iter()
            .enumerate()
            .filter_map(|(i, slot)| slot.as_ref().map(|e| (NameTreeEntryId(i), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_creates_ancestors() {
        let mut nt = NameTree::new();
        let abc = nt.lookup(&Name::from_str("/a/b/c"));

        assert_eq!(nt.len(), 4); // /, /a, /a/b, /a/b/c
        let ab = nt.find(&Name::from_str("/a/b")).unwrap();
        assert_eq!(nt.entry(abc).parent(), Some(ab));
        assert!(nt.entry(ab).children().contains(&abc));
        assert_eq!(nt.lookup(&Name::from_str("/a/b/c")), abc);
        assert_eq!(nt.len(), 4);
    }

    #[test]
    fn test_cleanup_erases_empty_chain() {
        let mut nt = NameTree::new();
        let abc = nt.lookup(&Name::from_str("/a/b/c"));
        let a = nt.find(&Name::from_str("/a")).unwrap();
        nt.entry_mut(a).strategy_choice = Some(Name::from_str("/s"));

        nt.cleanup_if_empty(abc);

        // /a survives (it has a dependent) and so does /
        assert!(nt.find(&Name::from_str("/a/b/c")).is_none());
        assert!(nt.find(&Name::from_str("/a/b")).is_none());
        assert!(nt.find(&Name::from_str("/a")).is_some());
        assert!(nt.find(&Name::new()).is_some());
        assert_eq!(nt.len(), 2);
    }

    #[test]
    fn test_cleanup_keeps_entries_with_children() {
        let mut nt = NameTree::new();
        nt.lookup(&Name::from_str("/a/b"));
        let a = nt.find(&Name::from_str("/a")).unwrap();
        let b = nt.find(&Name::from_str("/a/b")).unwrap();
        nt.entry_mut(b).pit_entries.push(PitEntryId::from_raw(0));

        nt.cleanup_if_empty(a);
        assert!(nt.find(&Name::from_str("/a")).is_some());
    }

    #[test]
    fn test_longest_prefix_match_with_predicate() {
        let mut nt = NameTree::new();
        let a = nt.lookup(&Name::from_str("/a"));
        let abc = nt.lookup(&Name::from_str("/a/b/c"));
        nt.entry_mut(a).strategy_choice = Some(Name::from_str("/s"));
        nt.entry_mut(abc).strategy_choice = Some(Name::from_str("/t"));

        let found = nt
            .find_longest_prefix_match(&Name::from_str("/a/b/c/d"), |e| e.strategy_choice.is_some())
            .unwrap();
        assert_eq!(found, abc);

        let found = nt
            .find_longest_prefix_match(&Name::from_str("/a/b"), |e| e.strategy_choice.is_some())
            .unwrap();
        assert_eq!(found, a);

        assert!(nt
            .find_longest_prefix_match(&Name::from_str("/z"), |e| e.strategy_choice.is_some())
            .is_none());
    }

    #[test]
    fn test_partial_enumerate_visits_each_once() {
        let mut nt = NameTree::new();
        nt.lookup(&Name::from_str("/p/x"));
        nt.lookup(&Name::from_str("/p/y/z"));
        nt.lookup(&Name::from_str("/q"));

        let mut seen = Vec::new();
        let included = nt.partial_enumerate(&Name::from_str("/p"), |entry| {
            seen.push(entry.name().clone());
            (true, true)
        });

        assert_eq!(included.len(), 4); // /p, /p/x, /p/y, /p/y/z
        assert_eq!(seen.len(), 4);
        assert!(!seen.contains(&Name::from_str("/q")));

        // no descend below /p
        let included = nt.partial_enumerate(&Name::from_str("/p"), |_| (true, false));
        assert_eq!(included.len(), 1);
    }

    #[test]
    fn test_slot_reuse_after_erase() {
        let mut nt = NameTree::new();
        let x = nt.lookup(&Name::from_str("/x"));
        nt.cleanup_if_empty(x);
        assert!(nt.is_empty());

        let y = nt.lookup(&Name::from_str("/y"));
        assert_eq!(nt.entry(y).name(), &Name::from_str("/y"));
    }
}
