//! Character sets and pluggable encoders for string values.
//!
//! A string candidate goes through two layers before it is emitted:
//!
//! 1. a [`Charset`] turns text into bytes (`latin-1`, `ascii`, `utf-8`, `utf-16`);
//! 2. an optional [`Encoder`] transforms those bytes (septet packing, base64, framing...).
//!
//! Encoders are stateless and shared between clones of a value. `decode` must invert
//! `encode` on everything `decode` accepts.

use crate::codec::ValueError;
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;

/// Text-to-bytes codec of a string value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Charset {
    #[default]
    Latin1,
    Ascii,
    Utf8,
    Utf16Le,
    Utf16Be,
}

impl Charset {
    pub fn name(&self) -> &'static str {
        match self {
            Charset::Latin1 => "latin-1",
            Charset::Ascii => "ascii",
            Charset::Utf8 => "utf-8",
            Charset::Utf16Le => "utf-16-le",
            Charset::Utf16Be => "utf-16-be",
        }
    }

    pub fn is_single_byte(&self) -> bool {
        matches!(self, Charset::Latin1 | Charset::Ascii)
    }

    pub fn is_utf16(&self) -> bool {
        matches!(self, Charset::Utf16Le | Charset::Utf16Be)
    }

    pub fn encode_str(&self, s: &str) -> Result<Vec<u8>, ValueError> {
        match self {
            Charset::Latin1 | Charset::Ascii => {
                let limit = if *self == Charset::Ascii { 0x80 } else { 0x100 };
                s.chars()
                    .map(|c| {
                        if (c as u32) < limit {
                            Ok(c as u32 as u8)
                        } else {
                            Err(ValueError::Encoding(format!(
                                "{:?} not representable in {}",
                                c,
                                self.name()
                            )))
                        }
                    })
                    .collect()
            }
            Charset::Utf8 => Ok(s.as_bytes().to_vec()),
            Charset::Utf16Le => Ok(s.encode_utf16().flat_map(u16::to_le_bytes).collect()),
            Charset::Utf16Be => Ok(s.encode_utf16().flat_map(u16::to_be_bytes).collect()),
        }
    }

    pub fn encode_char(&self, c: char) -> Result<Vec<u8>, ValueError> {
        let mut buf = [0u8; 4];
        self.encode_str(c.encode_utf8(&mut buf))
    }

    /// Strict decode of a whole byte string.
    pub fn decode(&self, bytes: &[u8]) -> Result<String, ValueError> {
        let mut out = String::new();
        let mut rest = bytes;
        while !rest.is_empty() {
            let (c, n) = self.next_char(rest).ok_or_else(|| {
                ValueError::Encoding(format!(
                    "invalid {} sequence at byte {}",
                    self.name(),
                    bytes.len() - rest.len()
                ))
            })?;
            out.push(c);
            rest = &rest[n..];
        }
        Ok(out)
    }

    /// First character of `bytes` and its encoded length.
    pub fn next_char(&self, bytes: &[u8]) -> Option<(char, usize)> {
        match self {
            Charset::Latin1 => bytes.first().map(|&b| (b as char, 1)),
            Charset::Ascii => bytes.first().filter(|b| **b < 0x80).map(|&b| (b as char, 1)),
            Charset::Utf8 => (1..=bytes.len().min(4)).find_map(|n| {
                std::str::from_utf8(&bytes[..n])
                    .ok()
                    .and_then(|s| s.chars().next())
                    .map(|c| (c, n))
            }),
            Charset::Utf16Le | Charset::Utf16Be => {
                let unit = |i: usize| -> Option<u16> {
                    let b = bytes.get(i..i + 2)?;
                    Some(if *self == Charset::Utf16Le {
                        u16::from_le_bytes([b[0], b[1]])
                    } else {
                        u16::from_be_bytes([b[0], b[1]])
                    })
                };
                let hi = unit(0)?;
                match hi {
                    0xD800..=0xDBFF => {
                        let lo = unit(2).filter(|lo| (0xDC00..=0xDFFF).contains(lo))?;
                        let cp = 0x10000 + (((hi as u32) - 0xD800) << 10) + ((lo as u32) - 0xDC00);
                        char::from_u32(cp).map(|c| (c, 4))
                    }
                    0xDC00..=0xDFFF => None,
                    _ => char::from_u32(hi as u32).map(|c| (c, 2)),
                }
            }
        }
    }

    /// Number of characters in `bytes`; undecodable tails count one character per code
    /// unit.
    pub fn char_len(&self, bytes: &[u8]) -> usize {
        let mut count = 0;
        let mut rest = bytes;
        while !rest.is_empty() {
            match self.next_char(rest) {
                Some((_, n)) => rest = &rest[n..],
                None => {
                    let unit = if self.is_utf16() { 2 } else { 1 };
                    rest = &rest[unit.min(rest.len())..];
                }
            }
            count += 1;
        }
        count
    }

    /// Byte length of the first `chars` characters (or of all of `bytes` if shorter).
    pub fn prefix_len(&self, bytes: &[u8], chars: usize) -> usize {
        let mut used = 0;
        for _ in 0..chars {
            match self.next_char(&bytes[used..]) {
                Some((_, n)) => used += n,
                None => break,
            }
        }
        used
    }

    /// Codec boundary case derived from `current`: the 8th bit forced on for single-byte
    /// codecs, a lone continuation byte for UTF-8, an unpaired high surrogate for UTF-16.
    pub fn boundary_case(&self, current: &[u8]) -> Vec<u8> {
        match self {
            Charset::Latin1 | Charset::Ascii => {
                let mut v = current.to_vec();
                match v.first_mut() {
                    Some(b) => *b |= 0x80,
                    None => v.push(0xE9),
                }
                v
            }
            Charset::Utf8 => {
                let mut v = current.to_vec();
                v.push(0x80);
                v
            }
            Charset::Utf16Le => {
                let mut v = current.to_vec();
                v.extend_from_slice(&[0x00, 0xD8]);
                v
            }
            Charset::Utf16Be => {
                let mut v = current.to_vec();
                v.extend_from_slice(&[0xD8, 0x00]);
                v
            }
        }
    }
}

/// Byte transform applied to a string after its charset.
pub trait Encoder: fmt::Debug + Send + Sync {
    fn name(&self) -> &str;

    fn encode(&self, raw: &[u8]) -> Vec<u8>;

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError>;

    /// Encoded-domain byte strings that `decode` rejects or misreads, emitted as-is in
    /// fuzz mode.
    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        let _ = current;
        Vec::new()
    }
}

/// 3GPP TS 23.038 septet packing: 8 characters in 7 bytes, LSB first.
#[derive(Debug, Clone, Copy, Default)]
pub struct Gsm7BitPacking;

impl Encoder for Gsm7BitPacking {
    fn name(&self) -> &str {
        "gsm-7bit"
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(raw.len() * 7 / 8 + 1);
        let mut acc: u32 = 0;
        let mut nbits = 0;
        for &c in raw {
            acc |= ((c & 0x7F) as u32) << nbits;
            nbits += 7;
            while nbits >= 8 {
                out.push((acc & 0xFF) as u8);
                acc >>= 8;
                nbits -= 8;
            }
        }
        if nbits > 0 {
            out.push((acc & 0xFF) as u8);
        }
        out
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError> {
        let mut out = Vec::with_capacity(encoded.len() * 8 / 7);
        let mut acc: u32 = 0;
        let mut nbits = 0;
        for &b in encoded {
            acc |= (b as u32) << nbits;
            nbits += 8;
            while nbits >= 7 {
                out.push((acc & 0x7F) as u8);
                acc >>= 7;
                nbits -= 7;
            }
        }
        // 7 spare bits in the last byte decode as a trailing '@' (0x00).
        if (encoded.len() * 8) % 7 == 0 && out.last() == Some(&0) {
            out.pop();
        }
        Ok(out)
    }

    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        // Characters with the 8th bit set cannot be packed; emit them unpacked.
        let mut high = current.to_vec();
        high.iter_mut().for_each(|b| *b |= 0x80);
        vec![high]
    }
}

/// Nibble-swapped BCD phone numbers padded with an `F` filler.
#[derive(Debug, Clone, Copy, Default)]
pub struct GsmPhoneNumber;

impl GsmPhoneNumber {
    fn nibble(c: u8) -> u8 {
        match c {
            b'0'..=b'9' => c - b'0',
            b'*' => 0xA,
            b'#' => 0xB,
            _ => c & 0x0F,
        }
    }

    fn digit(n: u8) -> Option<u8> {
        match n {
            0..=9 => Some(b'0' + n),
            0xA => Some(b'*'),
            0xB => Some(b'#'),
            _ => None,
        }
    }
}

impl Encoder for GsmPhoneNumber {
    fn name(&self) -> &str {
        "gsm-phone-number"
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        raw.chunks(2)
            .map(|pair| {
                let lo = Self::nibble(pair[0]);
                let hi = pair.get(1).map_or(0xF, |c| Self::nibble(*c));
                (hi << 4) | lo
            })
            .collect()
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError> {
        let mut out = Vec::with_capacity(encoded.len() * 2);
        for (i, b) in encoded.iter().enumerate() {
            let last = i + 1 == encoded.len();
            let lo = Self::digit(b & 0x0F)
                .ok_or_else(|| ValueError::Encoding(format!("bad low nibble in byte {}", i)))?;
            out.push(lo);
            match (b >> 4, last) {
                (0xF, true) => {}
                (hi, _) => out.push(
                    Self::digit(hi)
                        .ok_or_else(|| ValueError::Encoding(format!("bad high nibble in byte {}", i)))?,
                ),
            }
        }
        Ok(out)
    }

    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        let mut filler_inside = self.encode(current);
        filler_inside.insert(0, 0xF1);
        vec![vec![0xFA], filler_inside]
    }
}

/// Standard-alphabet base64 with padding.
#[derive(Debug, Clone, Copy, Default)]
pub struct Base64Encoder;

impl Encoder for Base64Encoder {
    fn name(&self) -> &str {
        "base64"
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        STANDARD.encode(raw).into_bytes()
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError> {
        STANDARD
            .decode(encoded)
            .map_err(|e| ValueError::Encoding(format!("base64: {}", e)))
    }

    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        let mut unpadded = self.encode(current);
        while unpadded.last() == Some(&b'=') {
            unpadded.pop();
        }
        unpadded.push(b'A');
        vec![b"A===".to_vec(), b"====".to_vec(), unpadded]
    }
}

/// Lowercase hexadecimal text.
#[derive(Debug, Clone, Copy, Default)]
pub struct HexEncoder;

impl Encoder for HexEncoder {
    fn name(&self) -> &str {
        "hex"
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        hex::encode(raw).into_bytes()
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError> {
        hex::decode(encoded).map_err(|e| ValueError::Encoding(format!("hex: {}", e)))
    }

    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        let mut odd = self.encode(current);
        odd.push(b'0');
        vec![odd, b"zz".to_vec()]
    }
}

/// Frames the payload between a fixed prefix and suffix.
#[derive(Debug, Clone, Default)]
pub struct WrapEncoder {
    pub prefix: Vec<u8>,
    pub suffix: Vec<u8>,
}

impl Encoder for WrapEncoder {
    fn name(&self) -> &str {
        "wrap"
    }

    fn encode(&self, raw: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.prefix.len() + raw.len() + self.suffix.len());
        out.extend_from_slice(&self.prefix);
        out.extend_from_slice(raw);
        out.extend_from_slice(&self.suffix);
        out
    }

    fn decode(&self, encoded: &[u8]) -> Result<Vec<u8>, ValueError> {
        encoded
            .strip_prefix(self.prefix.as_slice())
            .and_then(|rest| rest.strip_suffix(self.suffix.as_slice()))
            .map(<[u8]>::to_vec)
            .ok_or_else(|| ValueError::Encoding("wrap: prefix/suffix missing".to_string()))
    }

    fn malformed_cases(&self, current: &[u8]) -> Vec<Vec<u8>> {
        let mut no_suffix = self.prefix.clone();
        no_suffix.extend_from_slice(current);
        let mut no_prefix = current.to_vec();
        no_prefix.extend_from_slice(&self.suffix);
        vec![no_suffix, no_prefix]
    }
}

/// Data-driven choice of a stock encoder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncoderSpec {
    Gsm7Bit,
    GsmPhoneNumber,
    Base64,
    Hex,
    Wrap { prefix: Vec<u8>, suffix: Vec<u8> },
}

impl EncoderSpec {
    pub fn build(&self) -> Arc<dyn Encoder> {
        match self {
            EncoderSpec::Gsm7Bit => Arc::new(Gsm7BitPacking),
            EncoderSpec::GsmPhoneNumber => Arc::new(GsmPhoneNumber),
            EncoderSpec::Base64 => Arc::new(Base64Encoder),
            EncoderSpec::Hex => Arc::new(HexEncoder),
            EncoderSpec::Wrap { prefix, suffix } => Arc::new(WrapEncoder {
                prefix: prefix.clone(),
                suffix: suffix.clone(),
            }),
        }
    }
}
