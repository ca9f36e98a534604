use std::time::{Duration, SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::name::Name;
use crate::tlv::{self, TlvElement, TlvError};

/// TLV Type constants for NDN packets
pub mod tlv_types {
    pub const INTEREST: u8 = 0x05;
    pub const DATA: u8 = 0x06;
    pub const NAME: u8 = 0x07;
    pub const NAME_COMPONENT: u8 = 0x08;
    pub const IMPLICIT_SHA256_DIGEST_COMPONENT: u8 = 0x01;
    pub const PARAMETERS_SHA256_DIGEST_COMPONENT: u8 = 0x02;
    pub const NONCE: u8 = 0x0A;
    pub const INTEREST_LIFETIME: u8 = 0x0C;
    pub const MUST_BE_FRESH: u8 = 0x12;
    pub const CAN_BE_PREFIX: u8 = 0x21;
    pub const FORWARDING_HINT: u8 = 0x1E;
    pub const META_INFO: u8 = 0x14;
    pub const CONTENT: u8 = 0x15;
    pub const SIGNATURE_INFO: u8 = 0x16;
    pub const SIGNATURE_VALUE: u8 = 0x17;
    pub const CONTENT_TYPE: u8 = 0x18;
    pub const FRESHNESS_PERIOD: u8 = 0x19;
    pub const FINAL_BLOCK_ID: u8 = 0x1A;
    pub const SIGNATURE_TYPE: u8 = 0x1B;
    pub const KEY_LOCATOR: u8 = 0x1C;
    pub const HOP_LIMIT: u8 = 0x22;
    pub const APPLICATION_PARAMETERS: u8 = 0x24;
    pub const NACK: u8 = 0x64;
    pub const NACK_REASON: u8 = 0x65;
}

/// Interest lifetime applied when the packet does not carry one
pub const DEFAULT_INTEREST_LIFETIME: Duration = Duration::from_secs(4);

/// Hop-local annotations attached to a packet while it moves through the
/// forwarder. Tags are never serialized to the wire.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PacketTags {
    /// Id of the face the packet arrived on
    pub incoming_face_id: Option<u64>,
    /// Privileged egress override set by a local application
    pub next_hop_face_id: Option<u64>,
    /// Opaque downstream correlation token, echoed on the matching Data
    pub pit_token: Option<Vec<u8>>,
}

/// Interest packet structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Interest {
    pub name: Name,
    pub can_be_prefix: bool,
    pub must_be_fresh: bool,
    pub forwarding_hint: Vec<Name>,
    pub nonce: Option<u32>,
    pub interest_lifetime: Option<Duration>,
    pub hop_limit: Option<u8>,
    pub application_parameters: Option<Vec<u8>>,
    /// Unrecognized TLV elements, preserved across forwarding
    pub unrecognized: Vec<TlvElement>,
    #[serde(skip)]
    pub tag: PacketTags,
}

impl Interest {
    /// Create a new Interest with the given name
    pub fn new(name: Name) -> Self {
        Self {
            name,
            can_be_prefix: false,
            must_be_fresh: false,
            forwarding_hint: Vec::new(),
            nonce: None,
            interest_lifetime: None,
            hop_limit: None,
            application_parameters: None,
            unrecognized: Vec::new(),
            tag: PacketTags::default(),
        }
    }

    /// Set the nonce for this Interest
    pub fn with_nonce(mut self, nonce: u32) -> Self {
        self.nonce = Some(nonce);
        self
    }

    /// Set the interest lifetime
    pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
        self.interest_lifetime = Some(lifetime);
        self
    }

    /// Set the hop limit
    pub fn with_hop_limit(mut self, hop_limit: u8) -> Self {
        self.hop_limit = Some(hop_limit);
        self
    }

    /// Set the CanBePrefix flag
    pub fn with_can_be_prefix(mut self, can_be_prefix: bool) -> Self {
        self.can_be_prefix = can_be_prefix;
        self
    }

    /// Set the MustBeFresh flag
    pub fn with_must_be_fresh(mut self, must_be_fresh: bool) -> Self {
        self.must_be_fresh = must_be_fresh;
        self
    }

    /// Set the forwarding hint
    pub fn with_forwarding_hint(mut self, hint: Vec<Name>) -> Self {
        self.forwarding_hint = hint;
        self
    }

    /// Set application parameters
    pub fn with_application_parameters(mut self, params: Vec<u8>) -> Self {
        self.application_parameters = Some(params);
        self
    }

    /// The nonce, or 0 when the packet arrived without one
    pub fn nonce_or_zero(&self) -> u32 {
        self.nonce.unwrap_or(0)
    }

    /// The lifetime, defaulted when the packet does not carry one
    pub fn lifetime(&self) -> Duration {
        self.interest_lifetime.unwrap_or(DEFAULT_INTEREST_LIFETIME)
    }

    /// Generate a nonce if none is set
    pub fn ensure_nonce(&mut self) {
        if self.nonce.is_none() {
            self.nonce = Some(
                SystemTime::now()
                    .duration_since(UNIX_EPOCH)
                    .unwrap_or_default()
                    .subsec_nanos(),
            );
        }
    }

    /// Check if the Interest can be satisfied by the given Data packet
    ///
    /// Name matching is exact (against the plain name or the digest-qualified
    /// full name) unless CanBePrefix is set; MustBeFresh additionally requires
    /// the Data to carry a positive freshness period.
    pub fn matches_data(&self, data: &Data) -> bool {
        let name_ok = if self.can_be_prefix {
            self.name.is_prefix_of(&data.name) || self.name.is_prefix_of(&data.full_name())
        } else {
            self.name == data.name
                || (self.name.len() == data.name.len() + 1 && self.name == data.full_name())
        };
        let fresh_ok = !self.must_be_fresh || data.freshness_period() > Duration::ZERO;
        name_ok && fresh_ok
    }

    /// Encode Interest packet to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut elements = Vec::new();

        elements.push(self.name.to_element()?);

        if self.can_be_prefix {
            elements.push(TlvElement::new(tlv_types::CAN_BE_PREFIX, vec![]));
        }
        if self.must_be_fresh {
            elements.push(TlvElement::new(tlv_types::MUST_BE_FRESH, vec![]));
        }
        if !self.forwarding_hint.is_empty() {
            let mut hint_value = Vec::new();
            for delegation in &self.forwarding_hint {
                delegation.to_element()?.encode_to(&mut hint_value)?;
            }
            elements.push(TlvElement::new(tlv_types::FORWARDING_HINT, hint_value));
        }
        if let Some(nonce) = self.nonce {
            elements.push(TlvElement::new(tlv_types::NONCE, nonce.to_be_bytes().to_vec()));
        }
        if let Some(lifetime) = self.interest_lifetime {
            elements.push(TlvElement::new(
                tlv_types::INTEREST_LIFETIME,
                tlv::encode_nonneg_integer(lifetime.as_millis() as u64),
            ));
        }
        if let Some(hop_limit) = self.hop_limit {
            elements.push(TlvElement::new(tlv_types::HOP_LIMIT, vec![hop_limit]));
        }
        if let Some(params) = &self.application_parameters {
            elements.push(TlvElement::new(tlv_types::APPLICATION_PARAMETERS, params.clone()));
        }
        elements.extend(self.unrecognized.iter().cloned());

        let interest_content = tlv::encode_tlv_sequence(&elements)?;
        TlvElement::new(tlv_types::INTEREST, interest_content).encode()
    }

    /// Decode Interest packet from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (interest_element, consumed) = TlvElement::decode(data)?;

        if interest_element.type_ != tlv_types::INTEREST {
            return Err(TlvError::InvalidType(interest_element.type_));
        }

        let inner = tlv::decode_tlv_sequence(&interest_element.value)?;

        let mut interest = Interest::new(Name::new());
        let mut name = None;

        for element in inner {
            match element.type_ {
                tlv_types::NAME => {
                    name = Some(Name::from_element(&element)?);
                }
                tlv_types::CAN_BE_PREFIX => {
                    interest.can_be_prefix = true;
                }
                tlv_types::MUST_BE_FRESH => {
                    interest.must_be_fresh = true;
                }
                tlv_types::FORWARDING_HINT => {
                    let mut offset = 0;
                    while offset < element.value.len() {
                        let (delegation, used) = Name::decode(&element.value[offset..])?;
                        interest.forwarding_hint.push(delegation);
                        offset += used;
                    }
                }
                tlv_types::NONCE => {
                    if element.value.len() != 4 {
                        return Err(TlvError::ValueLengthMismatch {
                            expected: 4,
                            actual: element.value.len(),
                        });
                    }
                    interest.nonce = Some(u32::from_be_bytes([
                        element.value[0],
                        element.value[1],
                        element.value[2],
                        element.value[3],
                    ]));
                }
                tlv_types::INTEREST_LIFETIME => {
                    let ms = tlv::decode_nonneg_integer(&element.value)?;
                    interest.interest_lifetime = Some(Duration::from_millis(ms));
                }
                tlv_types::HOP_LIMIT => {
                    if let Some(&hop_limit) = element.value.first() {
                        interest.hop_limit = Some(hop_limit);
                    }
                }
                tlv_types::APPLICATION_PARAMETERS => {
                    interest.application_parameters = Some(element.value);
                }
                _ => interest.unrecognized.push(element),
            }
        }

        interest.name = name.ok_or(TlvError::InvalidType(tlv_types::NAME))?;
        Ok((interest, consumed))
    }
}

/// Content type for Data packets
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContentType {
    #[default]
    Blob = 0,
    Link = 1,
    Key = 2,
}

/// MetaInfo for Data packets
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MetaInfo {
    pub content_type: ContentType,
    pub freshness_period: Option<Duration>,
    pub final_block_id: Option<Vec<u8>>,
}

/// Signature information
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureInfo {
    pub signature_type: u8,
    pub key_locator: Option<Name>,
}

/// Data packet structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Data {
    pub name: Name,
    pub meta_info: Option<MetaInfo>,
    pub content: Vec<u8>,
    pub signature_info: Option<SignatureInfo>,
    pub signature_value: Option<Vec<u8>>,
    /// Unrecognized TLV elements, preserved across forwarding
    pub unrecognized: Vec<TlvElement>,
    #[serde(skip)]
    pub tag: PacketTags,
}

impl Data {
    /// Create a new Data packet with the given name and content
    pub fn new(name: Name, content: Vec<u8>) -> Self {
        Self {
            name,
            meta_info: None,
            content,
            signature_info: None,
            signature_value: None,
            unrecognized: Vec::new(),
            tag: PacketTags::default(),
        }
    }

    /// Set the freshness period
    pub fn with_freshness_period(mut self, freshness_period: Duration) -> Self {
        self.meta_info.get_or_insert_with(Default::default).freshness_period =
            Some(freshness_period);
        self
    }

    /// Set the content type
    pub fn with_content_type(mut self, content_type: ContentType) -> Self {
        self.meta_info.get_or_insert_with(Default::default).content_type = content_type;
        self
    }

    /// Set the signature info
    pub fn with_signature_info(mut self, signature_info: SignatureInfo) -> Self {
        self.signature_info = Some(signature_info);
        self
    }

    /// Set the signature value
    pub fn with_signature_value(mut self, signature_value: Vec<u8>) -> Self {
        self.signature_value = Some(signature_value);
        self
    }

    /// The freshness period, or zero when the packet does not carry one
    pub fn freshness_period(&self) -> Duration {
        self.meta_info
            .as_ref()
            .and_then(|m| m.freshness_period)
            .unwrap_or(Duration::ZERO)
    }

    /// The name extended with the implicit SHA-256 digest of the encoded packet
    pub fn full_name(&self) -> Name {
        let mut hasher = Sha256::new();
        // encoding into a Vec cannot fail in practice
        if let Ok(wire) = self.encode() {
            hasher.update(&wire);
        }
        let mut full = self.name.clone();
        full.append(hasher.finalize().to_vec());
        full
    }

    /// Encode Data packet to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut elements = Vec::new();

        elements.push(self.name.to_element()?);

        if let Some(meta_info) = &self.meta_info {
            let mut meta_value = Vec::new();
            TlvElement::new(
                tlv_types::CONTENT_TYPE,
                tlv::encode_nonneg_integer(meta_info.content_type as u64),
            )
            .encode_to(&mut meta_value)?;
            if let Some(freshness) = meta_info.freshness_period {
                TlvElement::new(
                    tlv_types::FRESHNESS_PERIOD,
                    tlv::encode_nonneg_integer(freshness.as_millis() as u64),
                )
                .encode_to(&mut meta_value)?;
            }
            if let Some(final_block_id) = &meta_info.final_block_id {
                TlvElement::new(tlv_types::FINAL_BLOCK_ID, final_block_id.clone())
                    .encode_to(&mut meta_value)?;
            }
            elements.push(TlvElement::new(tlv_types::META_INFO, meta_value));
        }

        elements.push(TlvElement::new(tlv_types::CONTENT, self.content.clone()));

        if let Some(sig_info) = &self.signature_info {
            let mut sig_value = Vec::new();
            TlvElement::new(tlv_types::SIGNATURE_TYPE, vec![sig_info.signature_type])
                .encode_to(&mut sig_value)?;
            if let Some(key_locator) = &sig_info.key_locator {
                let locator = key_locator.encode()?;
                TlvElement::new(tlv_types::KEY_LOCATOR, locator).encode_to(&mut sig_value)?;
            }
            elements.push(TlvElement::new(tlv_types::SIGNATURE_INFO, sig_value));
        }
        if let Some(sig_value) = &self.signature_value {
            elements.push(TlvElement::new(tlv_types::SIGNATURE_VALUE, sig_value.clone()));
        }
        elements.extend(self.unrecognized.iter().cloned());

        let data_content = tlv::encode_tlv_sequence(&elements)?;
        TlvElement::new(tlv_types::DATA, data_content).encode()
    }

    /// Decode Data packet from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (data_element, consumed) = TlvElement::decode(data)?;

        if data_element.type_ != tlv_types::DATA {
            return Err(TlvError::InvalidType(data_element.type_));
        }

        let inner = tlv::decode_tlv_sequence(&data_element.value)?;

        let mut packet = Data::new(Name::new(), Vec::new());
        let mut name = None;

        for element in inner {
            match element.type_ {
                tlv_types::NAME => {
                    name = Some(Name::from_element(&element)?);
                }
                tlv_types::META_INFO => {
                    packet.meta_info = Some(decode_meta_info(&element.value)?);
                }
                tlv_types::CONTENT => {
                    packet.content = element.value;
                }
                tlv_types::SIGNATURE_INFO => {
                    packet.signature_info = Some(decode_signature_info(&element.value)?);
                }
                tlv_types::SIGNATURE_VALUE => {
                    packet.signature_value = Some(element.value);
                }
                _ => packet.unrecognized.push(element),
            }
        }

        packet.name = name.ok_or(TlvError::InvalidType(tlv_types::NAME))?;
        Ok((packet, consumed))
    }
}

fn decode_meta_info(value: &[u8]) -> Result<MetaInfo, TlvError> {
    let mut meta_info = MetaInfo::default();
    for element in tlv::decode_tlv_sequence(value)? {
        match element.type_ {
            tlv_types::CONTENT_TYPE => {
                meta_info.content_type = match tlv::decode_nonneg_integer(&element.value)? {
                    1 => ContentType::Link,
                    2 => ContentType::Key,
                    _ => ContentType::Blob,
                };
            }
            tlv_types::FRESHNESS_PERIOD => {
                let ms = tlv::decode_nonneg_integer(&element.value)?;
                meta_info.freshness_period = Some(Duration::from_millis(ms));
            }
            tlv_types::FINAL_BLOCK_ID => {
                meta_info.final_block_id = Some(element.value);
            }
            _ => {}
        }
    }
    Ok(meta_info)
}

fn decode_signature_info(value: &[u8]) -> Result<SignatureInfo, TlvError> {
    let mut signature_type = 0;
    let mut key_locator = None;
    for element in tlv::decode_tlv_sequence(value)? {
        match element.type_ {
            tlv_types::SIGNATURE_TYPE => {
                if let Some(&t) = element.value.first() {
                    signature_type = t;
                }
            }
            tlv_types::KEY_LOCATOR => {
                key_locator = Some(Name::decode(&element.value)?.0);
            }
            _ => {}
        }
    }
    Ok(SignatureInfo { signature_type, key_locator })
}

/// Reason code carried by a Nack packet
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum NackReason {
    #[default]
    None,
    Congestion,
    Duplicate,
    NoRoute,
    Unrecognized(u8),
}

impl NackReason {
    pub fn code(&self) -> u8 {
        match self {
            NackReason::None => 0,
            NackReason::Congestion => 50,
            NackReason::Duplicate => 100,
            NackReason::NoRoute => 150,
            NackReason::Unrecognized(code) => *code,
        }
    }

    pub fn from_code(code: u8) -> Self {
        match code {
            0 => NackReason::None,
            50 => NackReason::Congestion,
            100 => NackReason::Duplicate,
            150 => NackReason::NoRoute,
            other => NackReason::Unrecognized(other),
        }
    }

    /// The less severe of two reasons; `None` counts as most severe
    pub fn less_severe(a: NackReason, b: NackReason) -> NackReason {
        if a == NackReason::None {
            return b;
        }
        if b == NackReason::None {
            return a;
        }
        if a.code() <= b.code() {
            a
        } else {
            b
        }
    }
}

impl std::fmt::Display for NackReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            NackReason::None => write!(f, "None"),
            NackReason::Congestion => write!(f, "Congestion"),
            NackReason::Duplicate => write!(f, "Duplicate"),
            NackReason::NoRoute => write!(f, "NoRoute"),
            NackReason::Unrecognized(code) => write!(f, "Unrecognized({code})"),
        }
    }
}

/// Nack packet: a negative response to an Interest
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Nack {
    pub reason: NackReason,
    pub interest: Interest,
}

impl Nack {
    pub fn new(interest: Interest, reason: NackReason) -> Self {
        Self { reason, interest }
    }

    /// Encode Nack packet to TLV wire format
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut value = Vec::new();
        TlvElement::new(tlv_types::NACK_REASON, vec![self.reason.code()]).encode_to(&mut value)?;
        value.extend(self.interest.encode()?);
        TlvElement::new(tlv_types::NACK, value).encode()
    }

    /// Decode Nack packet from TLV wire format
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        let (nack_element, consumed) = TlvElement::decode(data)?;

        if nack_element.type_ != tlv_types::NACK {
            return Err(TlvError::InvalidType(nack_element.type_));
        }

        let (reason_element, used) = TlvElement::decode(&nack_element.value)?;
        if reason_element.type_ != tlv_types::NACK_REASON {
            return Err(TlvError::InvalidType(reason_element.type_));
        }
        let reason = NackReason::from_code(*reason_element.value.first().unwrap_or(&0));

        let (interest, _) = Interest::decode(&nack_element.value[used..])?;

        Ok((Nack { reason, interest }, consumed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interest_round_trip() {
        let interest = Interest::new(Name::from_str("/test/interest"))
            .with_nonce(0xDEADBEEF)
            .with_lifetime(Duration::from_millis(1500))
            .with_hop_limit(7)
            .with_must_be_fresh(true)
            .with_can_be_prefix(true)
            .with_forwarding_hint(vec![Name::from_str("/hub/a")])
            .with_application_parameters(vec![1, 2, 3]);

        let wire = interest.encode().unwrap();
        let (decoded, consumed) = Interest::decode(&wire).unwrap();

        assert_eq!(decoded, interest);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_interest_preserves_unrecognized_elements() {
        let mut interest = Interest::new(Name::from_str("/x")).with_nonce(1);
        interest.unrecognized.push(TlvElement::new(0x7B, vec![0xCA, 0xFE]));

        let wire = interest.encode().unwrap();
        let (decoded, _) = Interest::decode(&wire).unwrap();

        assert_eq!(decoded.unrecognized.len(), 1);
        assert_eq!(decoded.encode().unwrap(), wire);
    }

    #[test]
    fn test_interest_defaults() {
        let interest = Interest::new(Name::from_str("/x"));
        assert_eq!(interest.nonce_or_zero(), 0);
        assert_eq!(interest.lifetime(), DEFAULT_INTEREST_LIFETIME);

        let mut interest = interest;
        interest.ensure_nonce();
        assert!(interest.nonce.is_some());
    }

    #[test]
    fn test_data_round_trip() {
        let data = Data::new(Name::from_str("/test/data"), b"hello".to_vec())
            .with_freshness_period(Duration::from_secs(5))
            .with_signature_info(SignatureInfo { signature_type: 0, key_locator: None })
            .with_signature_value(vec![0u8; 32]);

        let wire = data.encode().unwrap();
        let (decoded, consumed) = Data::decode(&wire).unwrap();

        assert_eq!(decoded, data);
        assert_eq!(consumed, wire.len());
        assert_eq!(decoded.freshness_period(), Duration::from_secs(5));
    }

    #[test]
    fn test_full_name_appends_digest() {
        let data = Data::new(Name::from_str("/a/b"), vec![1, 2, 3]);
        let full = data.full_name();
        assert_eq!(full.len(), 3);
        assert_eq!(full.get(2).unwrap().len(), 32);
        assert!(data.name.is_prefix_of(&full));
    }

    #[test]
    fn test_interest_data_matching() {
        let data = Data::new(Name::from_str("/a/b/c"), vec![]).with_freshness_period(Duration::from_secs(1));

        assert!(Interest::new(Name::from_str("/a/b/c")).matches_data(&data));
        assert!(Interest::new(Name::from_str("/a/b")).with_can_be_prefix(true).matches_data(&data));
        assert!(!Interest::new(Name::from_str("/a/b")).matches_data(&data));
        assert!(!Interest::new(Name::from_str("/a/x")).with_can_be_prefix(true).matches_data(&data));
        assert!(Interest::new(data.full_name()).matches_data(&data));

        let stale = Data::new(Name::from_str("/a/b/c"), vec![]);
        assert!(!Interest::new(Name::from_str("/a/b/c")).with_must_be_fresh(true).matches_data(&stale));
        assert!(Interest::new(Name::from_str("/a/b/c")).with_must_be_fresh(true).matches_data(&data));
    }

    #[test]
    fn test_nack_round_trip() {
        let interest = Interest::new(Name::from_str("/n")).with_nonce(42);
        let nack = Nack::new(interest, NackReason::NoRoute);

        let wire = nack.encode().unwrap();
        let (decoded, consumed) = Nack::decode(&wire).unwrap();

        assert_eq!(decoded, nack);
        assert_eq!(consumed, wire.len());
    }

    #[test]
    fn test_nack_reason_severity() {
        use NackReason::*;
        assert_eq!(NackReason::less_severe(None, NoRoute), NoRoute);
        assert_eq!(NackReason::less_severe(Congestion, NoRoute), Congestion);
        assert_eq!(NackReason::less_severe(NoRoute, Duplicate), Duplicate);
    }
}
