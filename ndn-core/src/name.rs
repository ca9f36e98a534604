use serde::{Deserialize, Serialize};

use crate::packets::tlv_types;
use crate::tlv::{TlvElement, TlvError};

/// Represents a hierarchical name in the NDN network
///
/// A name is an ordered sequence of opaque byte-string components. Ordering is
/// lexicographic component-wise, so a proper prefix sorts before every name
/// that extends it.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Name {
    components: Vec<Vec<u8>>,
}

impl Name {
    /// Create a new empty name (the root "/")
    pub fn new() -> Self {
        Self { components: Vec::new() }
    }

    /// Create a name from a string path (e.g., "/hello/world")
    pub fn from_str(path: &str) -> Self {
        let mut name = Name::new();
        for component in path.split('/') {
            if !component.is_empty() {
                name.components.push(component.as_bytes().to_vec());
            }
        }
        name
    }

    /// Append a component to the name
    pub fn append(&mut self, component: Vec<u8>) -> &mut Self {
        self.components.push(component);
        self
    }

    /// Append a string component to the name
    pub fn append_str(&mut self, component: &str) -> &mut Self {
        self.components.push(component.as_bytes().to_vec());
        self
    }

    /// Get the number of components
    pub fn len(&self) -> usize {
        self.components.len()
    }

    /// Check if the name is empty
    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    /// Get a component by index
    pub fn get(&self, index: usize) -> Option<&[u8]> {
        self.components.get(index).map(Vec::as_slice)
    }

    /// Iterate over the components
    pub fn components(&self) -> impl Iterator<Item = &[u8]> {
        self.components.iter().map(Vec::as_slice)
    }

    /// Check if this name is a prefix of another name
    pub fn is_prefix_of(&self, other: &Name) -> bool {
        if self.len() > other.len() {
            return false;
        }
        self.components.iter().zip(other.components.iter()).all(|(a, b)| a == b)
    }

    /// Get a prefix of this name with the specified number of components
    pub fn get_prefix(&self, length: usize) -> Name {
        Name {
            components: self.components.iter().take(length).cloned().collect(),
        }
    }

    /// The smallest name that orders after every name having `self` as a prefix
    ///
    /// Used as the exclusive upper bound of a prefix range scan. The root name
    /// has no successor (every name is under it); callers must special-case an
    /// empty name with an unbounded range.
    pub fn successor(&self) -> Name {
        let mut succ = self.clone();
        if let Some(last) = succ.components.last_mut() {
            last.push(0x00);
        }
        succ
    }

    /// Encode name to TLV format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        self.to_element()?.encode()
    }

    /// Encode name as a TLV element (for nesting inside packets)
    pub fn to_element(&self) -> Result<TlvElement, TlvError> {
        let mut components_tlv = Vec::new();
        for component in &self.components {
            TlvElement::new(tlv_types::NAME_COMPONENT, component.clone())
                .encode_to(&mut components_tlv)?;
        }
        Ok(TlvElement::new(tlv_types::NAME, components_tlv))
    }

    /// Decode name from TLV format, returning the name and bytes consumed
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (name_element, consumed) = TlvElement::decode(data)?;
        let name = Self::from_element(&name_element)?;
        Ok((name, consumed))
    }

    /// Decode name from a TLV element
    pub fn from_element(element: &TlvElement) -> Result<Self, TlvError> {
        if element.type_ != tlv_types::NAME {
            return Err(TlvError::InvalidType(element.type_));
        }

        let mut name = Name::new();
        let mut offset = 0;
        while offset < element.value.len() {
            let (comp, consumed) = TlvElement::decode(&element.value[offset..])?;
            if !matches!(
                comp.type_,
                tlv_types::NAME_COMPONENT
                    | tlv_types::IMPLICIT_SHA256_DIGEST_COMPONENT
                    | tlv_types::PARAMETERS_SHA256_DIGEST_COMPONENT
            ) {
                return Err(TlvError::InvalidType(comp.type_));
            }
            name.components.push(comp.value);
            offset += consumed;
        }

        Ok(name)
    }
}

impl std::fmt::Display for Name {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "/");
        }
        for component in &self.components {
            write!(f, "/{}", String::from_utf8_lossy(component))?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_str_and_display() {
        let name = Name::from_str("/a/b/c");
        assert_eq!(name.len(), 3);
        assert_eq!(name.get(0), Some(&b"a"[..]));
        assert_eq!(name.to_string(), "/a/b/c");
        assert_eq!(Name::new().to_string(), "/");
        assert_eq!(Name::from_str("//x//"), Name::from_str("/x"));
    }

    #[test]
    fn test_prefix_relations() {
        let root = Name::new();
        let ab = Name::from_str("/a/b");
        let abc = Name::from_str("/a/b/c");
        let ax = Name::from_str("/a/x");

        assert!(root.is_prefix_of(&abc));
        assert!(ab.is_prefix_of(&abc));
        assert!(ab.is_prefix_of(&ab));
        assert!(!abc.is_prefix_of(&ab));
        assert!(!ax.is_prefix_of(&abc));
        assert_eq!(abc.get_prefix(2), ab);
        assert_eq!(abc.get_prefix(0), root);
    }

    #[test]
    fn test_ordering_prefix_sorts_first() {
        let ab = Name::from_str("/a/b");
        let abc = Name::from_str("/a/b/c");
        let ac = Name::from_str("/a/c");
        assert!(ab < abc);
        assert!(abc < ac);
    }

    #[test]
    fn test_successor_bounds_prefix_range() {
        let ab = Name::from_str("/a/b");
        let succ = ab.successor();

        // everything under /a/b sorts before the successor
        assert!(ab < succ);
        assert!(Name::from_str("/a/b/zzz") < succ);
        // siblings do not
        assert!(Name::from_str("/a/c") >= succ);
    }

    #[test]
    fn test_encode_decode_round_trip() {
        let name = Name::from_str("/hello/world/1");
        let encoded = name.encode().unwrap();
        let (decoded, consumed) = Name::decode(&encoded).unwrap();
        assert_eq!(decoded, name);
        assert_eq!(consumed, encoded.len());
    }

    #[test]
    fn test_decode_rejects_wrong_type() {
        let bogus = TlvElement::new(0x42, vec![]).encode().unwrap();
        assert!(Name::decode(&bogus).is_err());
    }
}
