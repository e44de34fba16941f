//! Container header codec.
//!
//! Layout (little-endian):
//!
//! ```text
//! offset 0  : 5 bytes  codec properties (lc/lp/pb byte, dictionary size)
//! offset 5  : 8 bytes  uncompressed size (u64::MAX = unknown)
//! offset 13 : payload
//! ```

use lzkit_core::error::{CodecError, Result};
use lzkit_core::io::{Source, read_full};
use lzkit_lzma::LzmaProperties;
use lzkit_lzma::model::PROPERTIES_BYTE_LIMIT;

/// Size of the container header in bytes.
pub const HEADER_SIZE: usize = 13;

/// Size of the codec properties block.
pub const PROPERTIES_SIZE: usize = 5;

/// Uncompressed size value meaning "unknown, decode until the end marker".
pub const UNKNOWN_SIZE: u64 = u64::MAX;

/// Smallest dictionary size a header can announce.
pub const DICTIONARY_SIZE_MIN: u32 = 4096;

/// Literal context, literal position and position bits from the first
/// properties byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LcLpPb {
    /// Literal context bits (0-8).
    pub lc: u8,
    /// Literal position bits (0-4).
    pub lp: u8,
    /// Position bits (0-4).
    pub pb: u8,
}

impl LcLpPb {
    /// Pack back into a properties byte.
    pub fn to_byte(self) -> u8 {
        (self.pb * 5 + self.lp) * 9 + self.lc
    }
}

impl From<LcLpPb> for LzmaProperties {
    fn from(value: LcLpPb) -> Self {
        LzmaProperties::new(value.lc as u32, value.lp as u32, value.pb as u32)
    }
}

/// A decoded container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerHeader {
    /// Codec properties block.
    pub properties: [u8; PROPERTIES_SIZE],
    /// Uncompressed size, or [`UNKNOWN_SIZE`].
    pub original_size: u64,
}

impl ContainerHeader {
    /// Create a header.
    pub fn new(properties: [u8; PROPERTIES_SIZE], original_size: u64) -> Self {
        Self {
            properties,
            original_size,
        }
    }

    /// Read exactly [`HEADER_SIZE`] bytes from `source` and decode them.
    ///
    /// Stops early only when the source reports end of input.
    pub fn read_from(source: &mut dyn Source) -> Result<Self> {
        let mut bytes = [0u8; HEADER_SIZE];
        let read = read_full(source, &mut bytes)?;
        decode_header(&bytes[..read])
    }

    /// Serialize to the 13-byte on-disk form.
    pub fn encode(&self) -> [u8; HEADER_SIZE] {
        encode_header(self.properties, self.original_size)
    }

    /// The declared uncompressed size, `None` if unknown.
    pub fn declared_size(&self) -> Option<u64> {
        (self.original_size != UNKNOWN_SIZE).then_some(self.original_size)
    }

    /// Dictionary size, clamped to at least 4096.
    pub fn dictionary_size(&self) -> u32 {
        decode_dictionary_size(self.properties)
    }

    /// lc/lp/pb from the first properties byte.
    pub fn lc_lp_pb(&self) -> Result<LcLpPb> {
        decode_lc_lp_pb(self.properties[0])
    }

    /// The codec properties described by this header.
    pub fn lzma_properties(&self) -> Result<LzmaProperties> {
        self.lc_lp_pb().map(LzmaProperties::from)
    }
}

/// Encode a header.
pub fn encode_header(properties: [u8; PROPERTIES_SIZE], original_size: u64) -> [u8; HEADER_SIZE] {
    let mut bytes = [0u8; HEADER_SIZE];
    bytes[..PROPERTIES_SIZE].copy_from_slice(&properties);
    bytes[PROPERTIES_SIZE..].copy_from_slice(&original_size.to_le_bytes());
    bytes
}

/// Decode a header from the first 13 bytes of `bytes`.
///
/// Fewer than 13 bytes is [`CodecError::InvalidHeader`]. The properties are
/// not validated here; see [`decode_lc_lp_pb`].
pub fn decode_header(bytes: &[u8]) -> Result<ContainerHeader> {
    if bytes.len() < HEADER_SIZE {
        return Err(CodecError::invalid_header(HEADER_SIZE, bytes.len()));
    }

    let mut properties = [0u8; PROPERTIES_SIZE];
    properties.copy_from_slice(&bytes[..PROPERTIES_SIZE]);

    let mut size = [0u8; 8];
    size.copy_from_slice(&bytes[PROPERTIES_SIZE..HEADER_SIZE]);

    Ok(ContainerHeader {
        properties,
        original_size: u64::from_le_bytes(size),
    })
}

/// Dictionary size from properties bytes 1-4, never below 4096.
pub fn decode_dictionary_size(properties: [u8; PROPERTIES_SIZE]) -> u32 {
    let raw = u32::from_le_bytes([properties[1], properties[2], properties[3], properties[4]]);
    raw.max(DICTIONARY_SIZE_MIN)
}

/// Split the first properties byte into lc/lp/pb.
pub fn decode_lc_lp_pb(byte: u8) -> Result<LcLpPb> {
    if byte >= PROPERTIES_BYTE_LIMIT {
        return Err(CodecError::not_a_container(byte));
    }

    let mut d = byte;
    let lc = d % 9;
    d /= 9;
    let pb = d / 5;
    let lp = d % 5;

    Ok(LcLpPb { lc, lp, pb })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_encode_layout() {
        let bytes = encode_header([0x5D, 0x00, 0x00, 0x01, 0x00], 0x0102_0304_0506_0708);
        assert_eq!(
            bytes,
            [0x5D, 0x00, 0x00, 0x01, 0x00, 0x08, 0x07, 0x06, 0x05, 0x04, 0x03, 0x02, 0x01]
        );
    }

    #[test]
    fn test_short_header() {
        let err = decode_header(&[0x5D; 12]).unwrap_err();
        assert!(matches!(
            err,
            CodecError::InvalidHeader {
                expected: 13,
                found: 12
            }
        ));
    }

    #[test]
    fn test_read_from_short_source() {
        let mut source: &[u8] = &[0x5D, 0, 0, 1];
        let err = ContainerHeader::read_from(&mut source).unwrap_err();
        assert!(matches!(err, CodecError::InvalidHeader { found: 4, .. }));
    }

    #[test]
    fn test_read_from_leaves_payload() {
        let mut file = encode_header([0x5D, 0, 0, 1, 0], 3).to_vec();
        file.extend_from_slice(b"payload");
        let mut source: &[u8] = &file;

        let header = ContainerHeader::read_from(&mut source).unwrap();
        assert_eq!(header.original_size, 3);
        assert_eq!(source, b"payload");
    }

    #[test]
    fn test_lc_lp_pb_default() {
        let props = decode_lc_lp_pb(0x5D).unwrap();
        assert_eq!(props, LcLpPb { lc: 3, lp: 0, pb: 2 });
        assert_eq!(props.to_byte(), 0x5D);
        assert_eq!(LzmaProperties::from(props), LzmaProperties::default());
    }

    #[test]
    fn test_validity_boundary() {
        assert_eq!(decode_lc_lp_pb(224).unwrap(), LcLpPb { lc: 8, lp: 4, pb: 4 });
        for byte in 225..=255u8 {
            assert!(matches!(
                decode_lc_lp_pb(byte),
                Err(CodecError::NotAContainer { byte: b }) if b == byte
            ));
        }
    }

    #[test]
    fn test_unknown_size() {
        let header = ContainerHeader::new([0x5D, 0, 0, 0x80, 0], UNKNOWN_SIZE);
        assert_eq!(header.declared_size(), None);
        assert_eq!(header.dictionary_size(), 8 << 20);
        assert_eq!(ContainerHeader::new([0x5D, 0, 0, 0, 0], 0).declared_size(), Some(0));
    }

    proptest! {
        #[test]
        fn prop_header_roundtrip(properties in any::<[u8; 5]>(), size in any::<u64>()) {
            let header = decode_header(&encode_header(properties, size)).unwrap();
            prop_assert_eq!(header.properties, properties);
            prop_assert_eq!(header.original_size, size);
        }

        #[test]
        fn prop_dictionary_floor(properties in any::<[u8; 5]>()) {
            let size = decode_dictionary_size(properties);
            prop_assert!(size >= DICTIONARY_SIZE_MIN);
            let raw = u32::from_le_bytes([properties[1], properties[2], properties[3], properties[4]]);
            if raw >= DICTIONARY_SIZE_MIN {
                prop_assert_eq!(size, raw);
            }
        }

        #[test]
        fn prop_valid_bytes_repack(byte in 0u8..225) {
            let props = decode_lc_lp_pb(byte).unwrap();
            prop_assert!(props.lc <= 8 && props.lp <= 4 && props.pb <= 4);
            prop_assert_eq!(props.to_byte(), byte);
        }
    }
}
