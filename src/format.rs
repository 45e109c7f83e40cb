//! Defines the physical binary layout of a graphcode archive.
//!
//! # Layout
//! An archive is a header followed by one record per encoded root:
//!
//! `[Header] [Root Record] [Root Record] ...`
//!
//! The header is the signature `GRPH` followed by the stream version as a
//! big-endian `u16`. Every record starts with a single [`Tag`] byte:
//!
//! ```text
//!  bit 7      bits 0-6
//! [ ref ] [ value kind code ]
//! ```
//!
//! - **Value record:** `tag(object)`, class name (varint length + UTF-8 bytes),
//!   class version (varint), then the type's own payload.
//! - **Back-reference record:** `tag(ref | object)`, archive-id (varint).
//! - **Nil record:** `tag(nil)`.
//!
//! Scalar field values use the same tag byte with their own kind code followed
//! by the big-endian value; strings and blobs are a varint length followed by
//! raw bytes.

use crate::error::{GraphCodeError, Result};

/// Signature bytes identifying the format: "GRPH".
pub const SIGNATURE: [u8; 4] = *b"GRPH";

/// The stream version written by this implementation.
pub const STREAM_VERSION: u16 = 1;

/// The fixed size of the header.
/// Signature(4) + Version(2) = 6
pub const HEADER_SIZE: usize = 6;

/// The kinds of value a tag byte can announce.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ValueKind {
    /// Absent object reference.
    Nil = 0x00,
    /// Signed 8-bit integer.
    I8 = 0x01,
    /// Unsigned 8-bit integer.
    U8 = 0x02,
    /// Signed 16-bit integer.
    I16 = 0x03,
    /// Unsigned 16-bit integer.
    U16 = 0x04,
    /// Signed 32-bit integer.
    I32 = 0x05,
    /// Unsigned 32-bit integer.
    U32 = 0x06,
    /// Signed 64-bit integer.
    I64 = 0x07,
    /// Unsigned 64-bit integer.
    U64 = 0x08,
    /// 32-bit IEEE float.
    F32 = 0x09,
    /// 64-bit IEEE float.
    F64 = 0x0A,
    /// Boolean, one byte.
    Bool = 0x0B,
    /// Length-prefixed UTF-8 string.
    String = 0x0C,
    /// Length-prefixed raw byte block.
    Blob = 0x0D,
    /// Object record (value or back-reference).
    Object = 0x0E,
}

impl ValueKind {
    /// Decodes a kind code (the low seven bits of a tag).
    pub fn from_code(code: u8) -> Option<Self> {
        Some(match code {
            0x00 => Self::Nil,
            0x01 => Self::I8,
            0x02 => Self::U8,
            0x03 => Self::I16,
            0x04 => Self::U16,
            0x05 => Self::I32,
            0x06 => Self::U32,
            0x07 => Self::I64,
            0x08 => Self::U64,
            0x09 => Self::F32,
            0x0A => Self::F64,
            0x0B => Self::Bool,
            0x0C => Self::String,
            0x0D => Self::Blob,
            0x0E => Self::Object,
            _ => return None,
        })
    }

    /// Returns the kind code.
    pub fn code(self) -> u8 {
        self as u8
    }
}

/// A decoded tag byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tag {
    /// A value of the given kind follows.
    Value(ValueKind),
    /// A back-reference (varint archive-id) follows.
    Reference,
}

impl Tag {
    const REFERENCE_MASK: u8 = 0b1000_0000; // Bit 7
    const KIND_MASK: u8 = 0b0111_1111; // Bits 0-6

    /// The nil marker.
    pub const NIL: Tag = Tag::Value(ValueKind::Nil);

    /// Encodes the tag into its single byte.
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Value(kind) => kind.code(),
            // The kind bits are not read back for references; keep them
            // pointing at the object kind for readability of hex dumps.
            Self::Reference => Self::REFERENCE_MASK | ValueKind::Object.code(),
        }
    }

    /// Decodes a tag byte.
    pub fn from_byte(byte: u8) -> Result<Self> {
        if byte & Self::REFERENCE_MASK != 0 {
            return Ok(Self::Reference);
        }
        ValueKind::from_code(byte & Self::KIND_MASK)
            .map(Self::Value)
            .ok_or_else(|| GraphCodeError::Format(format!("unknown tag byte 0x{byte:02x}")))
    }
}

/// The header written once at the start of every archive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArchiveHeader {
    /// Signature bytes, always [`SIGNATURE`] for a valid stream.
    pub signature: [u8; 4],
    /// Version of the stream layout.
    pub version: u16,
}

impl ArchiveHeader {
    /// Creates the header for the current stream version.
    pub fn new() -> Self {
        Self {
            signature: SIGNATURE,
            version: STREAM_VERSION,
        }
    }

    /// Serializes the header to bytes.
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut buf = [0u8; HEADER_SIZE];
        buf[0..4].copy_from_slice(&self.signature);
        buf[4..6].copy_from_slice(&self.version.to_be_bytes());
        buf
    }

    /// Parses and validates a header.
    ///
    /// # Errors
    /// Returns `GraphCodeError::Format` for short input, a wrong signature,
    /// or a version newer than [`STREAM_VERSION`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let Some(raw) = bytes.get(..HEADER_SIZE) else {
            return Err(GraphCodeError::Format("stream shorter than header".into()));
        };
        if raw[0..4] != SIGNATURE {
            return Err(GraphCodeError::Format(format!(
                "invalid signature {:?}",
                &raw[0..4]
            )));
        }
        let version = u16::from_be_bytes([raw[4], raw[5]]);
        if version == 0 || version > STREAM_VERSION {
            return Err(GraphCodeError::Format(format!(
                "unsupported stream version: {version}"
            )));
        }
        Ok(Self {
            signature: SIGNATURE,
            version,
        })
    }
}

impl Default for ArchiveHeader {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reference_bit_wins_over_kind_bits() {
        assert_eq!(Tag::from_byte(0x8E), Ok(Tag::Reference));
        assert_eq!(Tag::from_byte(0x80), Ok(Tag::Reference));
        assert_eq!(Tag::Reference.as_u8(), 0x8E);
    }

    #[test]
    fn every_kind_code_round_trips() {
        for code in 0x00..=0x0E {
            let kind = ValueKind::from_code(code);
            assert_eq!(kind.map(ValueKind::code), Some(code));
        }
        assert!(Tag::from_byte(0x0F).is_err());
        assert!(Tag::from_byte(0x7F).is_err());
    }

    #[test]
    fn header_validation() {
        let bytes = ArchiveHeader::new().to_bytes();
        assert_eq!(&bytes, b"GRPH\x00\x01");
        assert_eq!(ArchiveHeader::from_bytes(&bytes), Ok(ArchiveHeader::new()));

        assert!(ArchiveHeader::from_bytes(b"GRP").is_err());
        assert!(ArchiveHeader::from_bytes(b"PAR4\x00\x01").is_err());
        assert!(ArchiveHeader::from_bytes(b"GRPH\x00\x02").is_err());
    }
}
