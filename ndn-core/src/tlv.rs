use std::convert::TryInto;
use std::io::{self, Read, Write};

/// TLV (Type-Length-Value) codec for the packet wire format
///
/// Wire format:
/// - Type: 1 byte (0-255)
/// - Length: variable length encoding (1-9 bytes, big-endian)
/// - Value: variable length data
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct TlvElement {
    pub type_: u8,
    pub value: Vec<u8>,
}

/// Errors that can occur during TLV encoding/decoding
#[derive(Debug, thiserror::Error)]
pub enum TlvError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("Invalid length encoding")]
    InvalidLength,
    #[error("Buffer too short")]
    BufferTooShort,
    #[error("Invalid TLV type: {0}")]
    InvalidType(u8),
    #[error("Value length mismatch: expected {expected}, got {actual}")]
    ValueLengthMismatch { expected: usize, actual: usize },
}

impl TlvElement {
    /// Create a new TLV element
    pub fn new(type_: u8, value: Vec<u8>) -> Self {
        Self { type_, value }
    }

    /// Get the total encoded length of this TLV element
    pub fn encoded_length(&self) -> usize {
        1 + length_field_size(self.value.len()) + self.value.len()
    }

    /// Encode this TLV element to bytes
    pub fn encode(&self) -> Result<Vec<u8>, TlvError> {
        let mut buffer = Vec::with_capacity(self.encoded_length());
        self.encode_to(&mut buffer)?;
        Ok(buffer)
    }

    /// Encode this TLV element to a writer
    pub fn encode_to<W: Write>(&self, writer: &mut W) -> Result<(), TlvError> {
        writer.write_all(&[self.type_])?;
        encode_length(self.value.len(), writer)?;
        writer.write_all(&self.value)?;
        Ok(())
    }

    /// Decode a TLV element from bytes, returning the element and bytes consumed
    pub fn decode(data: &[u8]) -> Result<(Self, usize), TlvError> {
        if data.is_empty() {
            return Err(TlvError::BufferTooShort);
        }

        let mut offset = 0;

        let type_ = data[offset];
        offset += 1;

        let (length, length_bytes) = decode_length(&data[offset..])?;
        offset += length_bytes;

        if data.len() < offset + length {
            return Err(TlvError::BufferTooShort);
        }

        let value = data[offset..offset + length].to_vec();
        offset += length;

        Ok((TlvElement::new(type_, value), offset))
    }

    /// Decode a TLV element from a reader
    pub fn decode_from<R: Read>(reader: &mut R) -> Result<Self, TlvError> {
        let mut type_buf = [0u8; 1];
        reader.read_exact(&mut type_buf)?;

        let length = decode_length_from(reader)?;

        let mut value = vec![0u8; length];
        reader.read_exact(&mut value)?;

        Ok(TlvElement::new(type_buf[0], value))
    }
}

/// Encode length using variable-length encoding
///
/// Format:
/// - If length < 253: 1 byte
/// - If length < 65536: 0xFD + 2 bytes (big-endian)
/// - If length < 4294967296: 0xFE + 4 bytes (big-endian)
/// - Otherwise: 0xFF + 8 bytes (big-endian)
fn encode_length<W: Write>(length: usize, writer: &mut W) -> Result<(), TlvError> {
    if length < 253 {
        writer.write_all(&[length as u8])?;
    } else if length < 65536 {
        writer.write_all(&[0xFD])?;
        writer.write_all(&(length as u16).to_be_bytes())?;
    } else if length < 4294967296 {
        writer.write_all(&[0xFE])?;
        writer.write_all(&(length as u32).to_be_bytes())?;
    } else {
        writer.write_all(&[0xFF])?;
        writer.write_all(&(length as u64).to_be_bytes())?;
    }
    Ok(())
}

/// Get the size needed to encode a length value
fn length_field_size(length: usize) -> usize {
    if length < 253 {
        1
    } else if length < 65536 {
        3
    } else if length < 4294967296 {
        5
    } else {
        9
    }
}

/// Decode length from bytes, returning the length and bytes consumed
fn decode_length(data: &[u8]) -> Result<(usize, usize), TlvError> {
    if data.is_empty() {
        return Err(TlvError::BufferTooShort);
    }

    match data[0] {
        first @ 0..=252 => Ok((first as usize, 1)),
        0xFD => {
            if data.len() < 3 {
                return Err(TlvError::BufferTooShort);
            }
            Ok((u16::from_be_bytes(data[1..3].try_into().unwrap()) as usize, 3))
        }
        0xFE => {
            if data.len() < 5 {
                return Err(TlvError::BufferTooShort);
            }
            Ok((u32::from_be_bytes(data[1..5].try_into().unwrap()) as usize, 5))
        }
        0xFF => {
            if data.len() < 9 {
                return Err(TlvError::BufferTooShort);
            }
            Ok((u64::from_be_bytes(data[1..9].try_into().unwrap()) as usize, 9))
        }
    }
}

/// Decode length from a reader
fn decode_length_from<R: Read>(reader: &mut R) -> Result<usize, TlvError> {
    let mut first = [0u8; 1];
    reader.read_exact(&mut first)?;

    match first[0] {
        f @ 0..=252 => Ok(f as usize),
        0xFD => {
            let mut buf = [0u8; 2];
            reader.read_exact(&mut buf)?;
            Ok(u16::from_be_bytes(buf) as usize)
        }
        0xFE => {
            let mut buf = [0u8; 4];
            reader.read_exact(&mut buf)?;
            Ok(u32::from_be_bytes(buf) as usize)
        }
        0xFF => {
            let mut buf = [0u8; 8];
            reader.read_exact(&mut buf)?;
            Ok(u64::from_be_bytes(buf) as usize)
        }
    }
}

/// Encode multiple TLV elements into a single buffer
pub fn encode_tlv_sequence(elements: &[TlvElement]) -> Result<Vec<u8>, TlvError> {
    let total_size = elements.iter().map(|e| e.encoded_length()).sum();
    let mut buffer = Vec::with_capacity(total_size);

    for element in elements {
        element.encode_to(&mut buffer)?;
    }

    Ok(buffer)
}

/// Decode multiple TLV elements from a buffer
pub fn decode_tlv_sequence(data: &[u8]) -> Result<Vec<TlvElement>, TlvError> {
    let mut elements = Vec::new();
    let mut offset = 0;

    while offset < data.len() {
        let (element, consumed) = TlvElement::decode(&data[offset..])?;
        elements.push(element);
        offset += consumed;
    }

    Ok(elements)
}

/// Encode a non-negative integer in the fewest big-endian bytes (1, 2, 4, or 8)
pub fn encode_nonneg_integer(value: u64) -> Vec<u8> {
    if value <= u8::MAX as u64 {
        vec![value as u8]
    } else if value <= u16::MAX as u64 {
        (value as u16).to_be_bytes().to_vec()
    } else if value <= u32::MAX as u64 {
        (value as u32).to_be_bytes().to_vec()
    } else {
        value.to_be_bytes().to_vec()
    }
}

/// Decode a non-negative integer from 1, 2, 4, or 8 big-endian bytes
pub fn decode_nonneg_integer(data: &[u8]) -> Result<u64, TlvError> {
    match data.len() {
        1 => Ok(data[0] as u64),
        2 => Ok(u16::from_be_bytes(data.try_into().unwrap()) as u64),
        4 => Ok(u32::from_be_bytes(data.try_into().unwrap()) as u64),
        8 => Ok(u64::from_be_bytes(data.try_into().unwrap())),
        actual => Err(TlvError::ValueLengthMismatch { expected: 8, actual }),
    }
}
