//! Byte-level packing shared by every typed value, and the error taxonomy.
//!
//! Integers and bit fields are packed into fixed-width byte spans in a configurable
//! byte order. Spans of 1, 2, 4, 8 and 16 bytes go through `byteorder` directly; other
//! widths (3-byte bit fields, 5..7-byte spans) are cut out of a 16-byte scratch word.

use byteorder::{BigEndian, ByteOrder, LittleEndian};
use serde::{Deserialize, Serialize};

/// Byte order for multi-byte values (integers, bit fields, UTF-16 text).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Endianness {
    #[default]
    Big,
    Little,
}

/// Everything a typed value can signal.
///
/// `Config` is fatal and only produced while building a value or a binding set.
/// `ContentMismatch` and `Insufficient` are the two recoverable absorption outcomes: the
/// first means "these bytes are not mine", the second "there are not enough bytes yet".
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValueError {
    #[error("Configuration: {0}")]
    Config(String),
    #[error("Content mismatch at offset {offset}: {reason} (valid prefix: {valid_prefix})")]
    ContentMismatch {
        offset: usize,
        valid_prefix: usize,
        reason: String,
    },
    #[error("Insufficient bytes: need {needed}, have {available}")]
    Insufficient { needed: usize, available: usize },
    #[error("Encoding: {0}")]
    Encoding(String),
    #[error("Binding: {0}")]
    Binding(String),
}

impl ValueError {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        ValueError::Config(msg.into())
    }

    pub(crate) fn mismatch(offset: usize, valid_prefix: usize, reason: impl Into<String>) -> Self {
        ValueError::ContentMismatch {
            offset,
            valid_prefix,
            reason: reason.into(),
        }
    }

    pub(crate) fn insufficient(needed: usize, available: usize) -> Self {
        ValueError::Insufficient { needed, available }
    }

    /// True for errors a parser may recover from by trying another offset or alternative.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ValueError::ContentMismatch { .. } | ValueError::Insufficient { .. } | ValueError::Encoding(_)
        )
    }

    /// Content did not match (an undecodable encoded span counts as a mismatch).
    pub fn is_content_mismatch(&self) -> bool {
        matches!(self, ValueError::ContentMismatch { .. } | ValueError::Encoding(_))
    }

    pub fn is_insufficient(&self) -> bool {
        matches!(self, ValueError::Insufficient { .. })
    }
}

/// Mask keeping the low `bits` bits.
pub(crate) fn low_mask(bits: u32) -> u128 {
    if bits >= 128 {
        u128::MAX
    } else {
        (1u128 << bits) - 1
    }
}

/// Read an unsigned big/little endian integer of `buf.len()` bytes (at most 16).
pub fn bytes_to_u128(buf: &[u8], endianness: Endianness) -> u128 {
    debug_assert!(buf.len() <= 16);
    match endianness {
        Endianness::Big => match buf.len() {
            0 => 0,
            1 => buf[0] as u128,
            2 => BigEndian::read_u16(buf) as u128,
            4 => BigEndian::read_u32(buf) as u128,
            8 => BigEndian::read_u64(buf) as u128,
            16 => BigEndian::read_u128(buf),
            _ => {
                let mut b = [0u8; 16];
                let start = 16 - buf.len();
                b[start..].copy_from_slice(buf);
                BigEndian::read_u128(&b)
            }
        },
        Endianness::Little => match buf.len() {
            0 => 0,
            1 => buf[0] as u128,
            2 => LittleEndian::read_u16(buf) as u128,
            4 => LittleEndian::read_u32(buf) as u128,
            8 => LittleEndian::read_u64(buf) as u128,
            16 => LittleEndian::read_u128(buf),
            _ => {
                let mut b = [0u8; 16];
                b[..buf.len()].copy_from_slice(buf);
                LittleEndian::read_u128(&b)
            }
        },
    }
}

/// Write the low `len` bytes of `v` (at most 16) in the given byte order.
pub fn u128_to_bytes(v: u128, len: usize, endianness: Endianness) -> Vec<u8> {
    debug_assert!(len <= 16);
    let mut buf = vec![0u8; len];
    match endianness {
        Endianness::Big => match len {
            0 => {}
            1 => buf[0] = v as u8,
            2 => BigEndian::write_u16(&mut buf, v as u16),
            4 => BigEndian::write_u32(&mut buf, v as u32),
            8 => BigEndian::write_u64(&mut buf, v as u64),
            16 => BigEndian::write_u128(&mut buf, v),
            _ => {
                let mut b = [0u8; 16];
                BigEndian::write_u128(&mut b, v);
                buf.copy_from_slice(&b[16 - len..]);
            }
        },
        Endianness::Little => match len {
            0 => {}
            1 => buf[0] = v as u8,
            2 => LittleEndian::write_u16(&mut buf, v as u16),
            4 => LittleEndian::write_u32(&mut buf, v as u32),
            8 => LittleEndian::write_u64(&mut buf, v as u64),
            16 => LittleEndian::write_u128(&mut buf, v),
            _ => {
                let mut b = [0u8; 16];
                LittleEndian::write_u128(&mut b, v);
                buf.copy_from_slice(&b[..len]);
            }
        },
    }
    buf
}
