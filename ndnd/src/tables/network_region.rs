use std::collections::HashSet;

use ndn_core::Name;

/// The router's network region names, used to decide when a forwarding hint
/// has served its purpose
#[derive(Default)]
pub struct NetworkRegionTable {
    regions: HashSet<Name>,
}

impl NetworkRegionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, region: Name) {
        self.regions.insert(region);
    }

    pub fn remove(&mut self, region: &Name) {
        self.regions.remove(region);
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// True when any delegation of the hint names a namespace this router's
    /// regions belong to; the Interest has then reached the producer region
    /// and the hint can be stripped
    pub fn is_in_producer_region(&self, hint: &[Name]) -> bool {
        hint.iter()
            .any(|delegation| self.regions.iter().any(|region| delegation.is_prefix_of(region)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_producer_region_match() {
        let mut table = NetworkRegionTable::new();
        table.add(Name::from_str("/telia/terabits/router5"));

        assert!(table.is_in_producer_region(&[Name::from_str("/telia/terabits")]));
        assert!(table.is_in_producer_region(&[
            Name::from_str("/att"),
            Name::from_str("/telia"),
        ]));
        assert!(!table.is_in_producer_region(&[Name::from_str("/att")]));
        assert!(!table.is_in_producer_region(&[]));
    }
}
