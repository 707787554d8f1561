//! The 4-byte framing header that precedes every protocol message.
//!
//! # Layout (big-endian `u32`)
//!
//! ```text
//! bits 31-28  version           4 bits
//! bits 27-16  message id       12 bits
//! bits 15-8   message type      8 bits
//! bits  7-1   reserved          7 bits (zero)
//! bit   0     compression flag  1 bit
//! ```
//!
//! Field values wider than their slot are masked on encode, not rejected.
//! A header built with version 20 encodes exactly like one built with
//! version 4.

use tracing::debug;

use crate::error::ProtocolError;

/// Encoded header size in bytes.
pub const HEADER_LEN: usize = 4;

const VERSION_MASK: u32 = 0xf;
const MSG_ID_MASK: u32 = 0xfff;
const MSG_TYPE_MASK: u32 = 0xff;
const COMPRESSION_BIT: u32 = 1;

/// Decoded message header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Header {
    pub version: u32,
    pub msg_id: u32,
    pub msg_type: u32,
    pub compression: bool,
}

impl Header {
    #[must_use]
    pub const fn new(version: u32, msg_id: u32, msg_type: u32, compression: bool) -> Self {
        Self {
            version,
            msg_id,
            msg_type,
            compression,
        }
    }

    /// Pack the header into its 32-bit word, masking each field.
    #[must_use]
    pub const fn encode_u32(&self) -> u32 {
        let comp = if self.compression { COMPRESSION_BIT } else { 0 };
        ((self.version & VERSION_MASK) << 28)
            | ((self.msg_id & MSG_ID_MASK) << 16)
            | ((self.msg_type & MSG_TYPE_MASK) << 8)
            | comp
    }

    /// Unpack a 32-bit word. Reserved bits are ignored.
    #[must_use]
    pub const fn decode_u32(word: u32) -> Self {
        Self {
            version: (word >> 28) & VERSION_MASK,
            msg_id: (word >> 16) & MSG_ID_MASK,
            msg_type: (word >> 8) & MSG_TYPE_MASK,
            compression: word & COMPRESSION_BIT == COMPRESSION_BIT,
        }
    }

    #[must_use]
    pub const fn marshal(&self) -> [u8; HEADER_LEN] {
        self.encode_u32().to_be_bytes()
    }

    /// Write the encoded header into the front of `buf`.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::BufferTooSmall`] if `buf` holds fewer than
    /// [`HEADER_LEN`] bytes.
    pub fn marshal_to(&self, buf: &mut [u8]) -> Result<(), ProtocolError> {
        let Some(dst) = buf.get_mut(..HEADER_LEN) else {
            return Err(ProtocolError::BufferTooSmall {
                needed: HEADER_LEN,
                available: buf.len(),
            });
        };
        dst.copy_from_slice(&self.marshal());
        Ok(())
    }

    /// Decode a header from exactly [`HEADER_LEN`] bytes.
    ///
    /// # Errors
    ///
    /// Returns [`ProtocolError::InvalidHeaderLength`] for any other input
    /// length.
    pub fn unmarshal(bytes: &[u8]) -> Result<Self, ProtocolError> {
        let word: [u8; HEADER_LEN] = bytes.try_into().map_err(|_| {
            debug!(len = bytes.len(), "rejecting header of wrong length");
            ProtocolError::InvalidHeaderLength {
                expected: HEADER_LEN,
                actual: bytes.len(),
            }
        })?;
        Ok(Self::decode_u32(u32::from_be_bytes(word)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_is_bit_exact() {
        let h = Header::new(0x1, 0x234, 0x56, true);
        assert_eq!(h.encode_u32(), 0x1234_5601);
        assert_eq!(h.marshal(), [0x12, 0x34, 0x56, 0x01]);
    }

    #[test]
    fn all_fields_max() {
        let h = Header::new(15, 4095, 255, true);
        assert_eq!(h.marshal(), [0xff, 0xff, 0xff, 0x01]);
        assert_eq!(Header::unmarshal(&h.marshal()).unwrap(), h);
    }

    #[test]
    fn zero_header() {
        assert_eq!(Header::default().marshal(), [0, 0, 0, 0]);
    }

    #[test]
    fn out_of_range_fields_are_masked() {
        assert_eq!(
            Header::new(20, 7, 1, false).marshal(),
            Header::new(4, 7, 1, false).marshal()
        );
        assert_eq!(
            Header::new(0, 0x1001, 0, false).marshal(),
            Header::new(0, 0x001, 0, false).marshal()
        );
        assert_eq!(
            Header::new(0, 0, 0x1ff, false).marshal(),
            Header::new(0, 0, 0xff, false).marshal()
        );
    }

    #[test]
    fn masked_header_decodes_to_truncated_values() {
        let decoded = Header::unmarshal(&Header::new(20, 5000, 300, true).marshal()).unwrap();
        assert_eq!(decoded, Header::new(4, 5000 & 0xfff, 300 & 0xff, true));
    }

    #[test]
    fn reserved_bits_never_set_on_encode() {
        let h = Header::new(u32::MAX, u32::MAX, u32::MAX, true);
        assert_eq!(h.encode_u32() & 0xfe, 0);
    }

    #[test]
    fn reserved_bits_ignored_on_decode() {
        let decoded = Header::unmarshal(&[0x10, 0x01, 0x02, 0xfe]).unwrap();
        assert_eq!(decoded, Header::new(1, 1, 2, false));
    }

    #[test]
    fn unmarshal_rejects_short_input() {
        for len in 0..HEADER_LEN {
            let buf = vec![0u8; len];
            let err = Header::unmarshal(&buf).unwrap_err();
            assert_eq!(
                err,
                ProtocolError::InvalidHeaderLength {
                    expected: HEADER_LEN,
                    actual: len
                }
            );
        }
    }

    #[test]
    fn unmarshal_rejects_long_input() {
        let err = Header::unmarshal(&[0u8; 5]).unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHeaderLength { actual: 5, .. }));
    }

    #[test]
    fn marshal_to_writes_prefix() {
        let mut buf = [0xaa_u8; 6];
        Header::new(1, 2, 3, false).marshal_to(&mut buf).unwrap();
        assert_eq!(buf, [0x10, 0x02, 0x03, 0x00, 0xaa, 0xaa]);
    }

    #[test]
    fn marshal_to_rejects_small_buffer() {
        let mut buf = [0u8; 3];
        let err = Header::new(1, 2, 3, false).marshal_to(&mut buf).unwrap_err();
        assert_eq!(
            err,
            ProtocolError::BufferTooSmall {
                needed: 4,
                available: 3
            }
        );
    }
}
