use std::any::{Any, TypeId};
use std::collections::HashMap;

use ndn_core::Name;

use crate::tables::name_tree::{NameTree, NameTreeEntryId};

/// Typed scratch space for strategies
///
/// Strategies park arbitrary per-entry state here, keyed by type. The
/// forwarder never reads it.
#[derive(Default)]
pub struct StrategyScratch {
    slots: HashMap<TypeId, Box<dyn Any>>,
}

impl StrategyScratch {
    pub fn get<T: 'static>(&self) -> Option<&T> {
        self.slots.get(&TypeId::of::<T>()).and_then(|b| b.downcast_ref())
    }

    pub fn get_mut<T: 'static>(&mut self) -> Option<&mut T> {
        self.slots.get_mut(&TypeId::of::<T>()).and_then(|b| b.downcast_mut())
    }

    pub fn get_or_insert_default<T: Default + 'static>(&mut self) -> &mut T {
        self.slots
            .entry(TypeId::of::<T>())
            .or_insert_with(|| Box::<T>::default())
            .downcast_mut()
            .expect("scratch slot holds its key type")
    }

    pub fn insert<T: 'static>(&mut self, value: T) {
        self.slots.insert(TypeId::of::<T>(), Box::new(value));
    }

    pub fn clear(&mut self) {
        self.slots.clear();
    }
}

/// Per-name scratch entry owned by strategies
#[derive(Default)]
pub struct MeasurementsEntry {
    pub scratch: StrategyScratch,
}

/// Get or create the measurements entry anchored at `name`
pub fn get_or_create(name_tree: &mut NameTree, name: &Name) -> NameTreeEntryId {
    let nte = name_tree.lookup(name);
    let entry = name_tree.entry_mut(nte);
    if entry.measurements.is_none() {
        entry.measurements = Some(MeasurementsEntry::default());
    }
    nte
}

/// Drop the measurements entry anchored at `name`, if any
pub fn erase(name_tree: &mut NameTree, name: &Name) {
    if let Some(nte) = name_tree.find(name) {
        name_tree.entry_mut(nte).measurements = None;
        name_tree.cleanup_if_empty(nte);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Default, PartialEq, Debug)]
    struct RetryCount(u32);

    #[test]
    fn test_scratch_is_typed() {
        let mut scratch = StrategyScratch::default();
        assert!(scratch.get::<RetryCount>().is_none());

        scratch.get_or_insert_default::<RetryCount>().0 += 1;
        scratch.get_or_insert_default::<RetryCount>().0 += 1;
        assert_eq!(scratch.get::<RetryCount>(), Some(&RetryCount(2)));

        scratch.insert(RetryCount(9));
        assert_eq!(scratch.get::<RetryCount>(), Some(&RetryCount(9)));
    }

    #[test]
    fn test_entry_lifecycle_follows_name_tree() {
        let mut nt = NameTree::new();
        let name = Name::from_str("/m");

        let nte = get_or_create(&mut nt, &name);
        assert!(nt.entry(nte).measurements.is_some());
        // idempotent
        assert_eq!(get_or_create(&mut nt, &name), nte);

        erase(&mut nt, &name);
        assert!(nt.find(&name).is_none());
    }
}
