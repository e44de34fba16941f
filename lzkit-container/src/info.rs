//! Header inspection.

use crate::header::{ContainerHeader, PROPERTIES_SIZE};
use lzkit_core::error::Result;
use lzkit_core::io::Source;
use std::fmt;

/// Metadata from a container header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ContainerInfo {
    /// Raw properties block.
    pub properties: [u8; PROPERTIES_SIZE],
    /// Uncompressed size, `None` if the header says unknown.
    pub original_size: Option<u64>,
    /// Dictionary size after clamping.
    pub dictionary_size: u32,
    /// Literal context bits.
    pub lc: u8,
    /// Literal position bits.
    pub lp: u8,
    /// Position bits.
    pub pb: u8,
}

impl ContainerInfo {
    /// Summarize a decoded header.
    pub fn from_header(header: &ContainerHeader) -> Result<Self> {
        let props = header.lc_lp_pb()?;
        Ok(Self {
            properties: header.properties,
            original_size: header.declared_size(),
            dictionary_size: header.dictionary_size(),
            lc: props.lc,
            lp: props.lp,
            pb: props.pb,
        })
    }

    /// Floor of the base-2 logarithm of the dictionary size.
    pub fn dictionary_size_log2(&self) -> u32 {
        self.dictionary_size.ilog2()
    }
}

impl fmt::Display for ContainerInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.original_size {
            Some(size) => writeln!(
                f,
                "Uncompressed size:              {} MB ({} bytes)",
                size / 1024 / 1024,
                size
            )?,
            None => writeln!(f, "Uncompressed size:              Unknown")?,
        }
        writeln!(
            f,
            "Dictionary size:                {} MB (2^{} bytes)",
            self.dictionary_size / 1024 / 1024,
            self.dictionary_size_log2()
        )?;
        writeln!(f, "Literal context bits (lc):      {}", self.lc)?;
        writeln!(f, "Literal pos bits (lp):          {}", self.lp)?;
        write!(f, "Number of pos bits (pb):        {}", self.pb)
    }
}

/// Read the header from `input` and describe it.
///
/// Reads exactly 13 bytes; the payload is never touched.
pub fn inspect(input: &mut dyn Source) -> Result<ContainerInfo> {
    let header = ContainerHeader::read_from(input)?;
    ContainerInfo::from_header(&header)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::{UNKNOWN_SIZE, encode_header};
    use lzkit_core::error::CodecError;

    #[test]
    fn test_inspect_reads_only_header() {
        let mut file = encode_header([0x5D, 0x00, 0x00, 0x01, 0x00], 5 << 20).to_vec();
        file.extend_from_slice(&[0xAB; 100]);
        let mut source: &[u8] = &file;

        let info = inspect(&mut source).unwrap();
        assert_eq!(source.len(), 100);
        assert_eq!(info.original_size, Some(5 << 20));
        assert_eq!(info.dictionary_size, 65536);
        assert_eq!(info.dictionary_size_log2(), 16);
        assert_eq!((info.lc, info.lp, info.pb), (3, 0, 2));
    }

    #[test]
    fn test_display_layout() {
        let header = ContainerHeader::new([0x5D, 0x00, 0x00, 0x80, 0x00], 3 << 20);
        let info = ContainerInfo::from_header(&header).unwrap();

        let expected = "\
Uncompressed size:              3 MB (3145728 bytes)
Dictionary size:                8 MB (2^23 bytes)
Literal context bits (lc):      3
Literal pos bits (lp):          0
Number of pos bits (pb):        2";
        assert_eq!(info.to_string(), expected);
    }

    #[test]
    fn test_display_unknown_size() {
        let header = ContainerHeader::new([0x5D, 0x00, 0x00, 0x80, 0x00], UNKNOWN_SIZE);
        let info = ContainerInfo::from_header(&header).unwrap();
        assert!(info.to_string().starts_with("Uncompressed size:              Unknown\n"));
    }

    #[test]
    fn test_small_dictionary_is_floored() {
        let header = ContainerHeader::new([0x00, 0x10, 0x00, 0x00, 0x00], 0);
        let info = ContainerInfo::from_header(&header).unwrap();
        assert_eq!(info.dictionary_size, 4096);
        assert_eq!(info.dictionary_size_log2(), 12);
    }

    #[test]
    fn test_rejects_properties_byte() {
        let mut source: &[u8] = &encode_header([225, 0, 0, 1, 0], 1);
        assert!(matches!(
            inspect(&mut source),
            Err(CodecError::NotAContainer { byte: 225 })
        ));

        let mut source: &[u8] = &encode_header([224, 0, 0, 1, 0], 1);
        let info = inspect(&mut source).unwrap();
        assert_eq!((info.lc, info.lp, info.pb), (8, 4, 4));
    }
}
