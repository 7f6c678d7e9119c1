//! Integer values: fixed-width binary integers, text integers and fuzzy presets.
//!
//! ## Kinds
//!
//! Every binary width/sign/byte-order combination is an [`IntKind`] constant; the table
//! [`INT_KINDS`] lists them for lookup by name (`UINT16_be`, `SINT32_le`, ...). 8-bit kinds
//! have no byte-order suffix.
//!
//! ## Candidate space
//!
//! An [`IntSpace`] is either an explicit ordered list or a closed interval. Determinist
//! draws follow list order (or ascend through the interval, starting at the default when
//! one is configured); random draws go through the whole space once per round.
//!
//! ## Text integers
//!
//! [`TextFormat`] integers are emitted as digits in a base (10 unless configured), with
//! no fixed width. They are bounded to `[i64::MIN, u64::MAX]` in normal mode; their fuzz
//! space reaches past both ends.

use crate::absorb::{window, Absorb, AbsorbConstraints, Absorbed, Snapshot};
use crate::codec::{bytes_to_u128, low_mask, u128_to_bytes, Endianness, ValueError};
use crate::cursor::{Cursor, Mode};
use crate::value::{truncate_display, RawValue, TypedValue};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

/// Width, signedness and byte order of a binary integer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct IntKind {
    pub name: &'static str,
    pub bits: u32,
    pub signed: bool,
    pub endianness: Endianness,
}

macro_rules! int_kinds {
    ($($id:ident = ($name:expr, $bits:expr, $signed:expr, $e:ident);)*) => {
        $(
            pub const $id: IntKind = IntKind {
                name: $name,
                bits: $bits,
                signed: $signed,
                endianness: Endianness::$e,
            };
        )*

        /// Registry of every binary integer kind.
        pub static INT_KINDS: &[IntKind] = &[$($id),*];
    };
}

int_kinds! {
    SINT8 = ("SINT8", 8, true, Big);
    UINT8 = ("UINT8", 8, false, Big);
    SINT16_BE = ("SINT16_be", 16, true, Big);
    SINT16_LE = ("SINT16_le", 16, true, Little);
    UINT16_BE = ("UINT16_be", 16, false, Big);
    UINT16_LE = ("UINT16_le", 16, false, Little);
    SINT32_BE = ("SINT32_be", 32, true, Big);
    SINT32_LE = ("SINT32_le", 32, true, Little);
    UINT32_BE = ("UINT32_be", 32, false, Big);
    UINT32_LE = ("UINT32_le", 32, false, Little);
    SINT64_BE = ("SINT64_be", 64, true, Big);
    SINT64_LE = ("SINT64_le", 64, true, Little);
    UINT64_BE = ("UINT64_be", 64, false, Big);
    UINT64_LE = ("UINT64_le", 64, false, Little);
}

impl IntKind {
    /// Case-insensitive lookup in [`INT_KINDS`].
    pub fn by_name(name: &str) -> Option<IntKind> {
        INT_KINDS.iter().copied().find(|k| k.name.eq_ignore_ascii_case(name))
    }

    pub fn byte_len(&self) -> usize {
        (self.bits / 8) as usize
    }

    pub fn min(&self) -> i128 {
        if self.signed {
            -(1i128 << (self.bits - 1))
        } else {
            0
        }
    }

    pub fn max(&self) -> i128 {
        if self.signed {
            (1i128 << (self.bits - 1)) - 1
        } else {
            (1i128 << self.bits) - 1
        }
    }

    pub fn contains(&self, v: i128) -> bool {
        v >= self.min() && v <= self.max()
    }

    /// Two's-complement reinterpretation of the low `bits` bits of `v`.
    pub fn wrap(&self, v: i128) -> i128 {
        let u = (v as u128) & low_mask(self.bits);
        if self.signed && (u >> (self.bits - 1)) & 1 == 1 {
            u as i128 - (1i128 << self.bits)
        } else {
            u as i128
        }
    }

    pub fn encode(&self, v: i128) -> Vec<u8> {
        u128_to_bytes((v as u128) & low_mask(self.bits), self.byte_len(), self.endianness)
    }

    pub fn decode(&self, buf: &[u8]) -> i128 {
        self.wrap(bytes_to_u128(&buf[..self.byte_len()], self.endianness) as i128)
    }
}

/// Digits-as-text integer layout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct TextFormat {
    pub base: u32,
    pub uppercase: bool,
    /// Left-pad with zeros to at least this many digits.
    pub min_digits: usize,
}

impl Default for TextFormat {
    fn default() -> Self {
        TextFormat::DECIMAL
    }
}

impl TextFormat {
    pub const DECIMAL: TextFormat = TextFormat {
        base: 10,
        uppercase: true,
        min_digits: 0,
    };

    pub fn encode(&self, v: i128) -> Vec<u8> {
        let mut mag = v.unsigned_abs();
        let base = self.base as u128;
        let mut digits = Vec::new();
        loop {
            let d = (mag % base) as u32;
            let mut c = std::char::from_digit(d, self.base).unwrap_or('?');
            if self.uppercase {
                c = c.to_ascii_uppercase();
            }
            digits.push(c as u8);
            mag /= base;
            if mag == 0 {
                break;
            }
        }
        while digits.len() < self.min_digits {
            digits.push(b'0');
        }
        if v < 0 {
            digits.push(b'-');
        }
        digits.reverse();
        digits
    }

    /// Length of the `-`? digit+ token at the start of `buf` (0 when there is none).
    fn token_len(&self, buf: &[u8]) -> usize {
        let sign = usize::from(buf.first() == Some(&b'-'));
        let digits = buf[sign..]
            .iter()
            .take_while(|b| (**b as char).is_digit(self.base))
            .count();
        if digits == 0 {
            0
        } else {
            sign + digits
        }
    }

    fn parse(&self, token: &[u8]) -> Option<i128> {
        let s = std::str::from_utf8(token).ok()?;
        i128::from_str_radix(s, self.base).ok()
    }
}

/// How an integer is laid out in bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntFormat {
    Binary(IntKind),
    Text(TextFormat),
}

impl IntFormat {
    /// Values the normal candidate space may hold.
    pub fn bounds(&self) -> (i128, i128) {
        match self {
            IntFormat::Binary(k) => (k.min(), k.max()),
            IntFormat::Text(_) => (i64::MIN as i128, u64::MAX as i128),
        }
    }

    pub fn encode(&self, v: i128) -> Vec<u8> {
        match self {
            IntFormat::Binary(k) => k.encode(v),
            IntFormat::Text(t) => t.encode(v),
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            IntFormat::Binary(k) => k.name,
            IntFormat::Text(_) => "INT_str",
        }
    }
}

impl From<IntKind> for IntFormat {
    fn from(k: IntKind) -> Self {
        IntFormat::Binary(k)
    }
}

/// Candidate space of an integer (also used by bit field subfields).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntSpace {
    List(Vec<i128>),
    Range { min: i128, max: i128 },
}

impl IntSpace {
    pub fn len(&self) -> u128 {
        match self {
            IntSpace::List(v) => v.len() as u128,
            IntSpace::Range { min, max } => (max - min) as u128 + 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, idx: u128) -> i128 {
        match self {
            IntSpace::List(v) => v[idx as usize],
            IntSpace::Range { min, .. } => min + idx as i128,
        }
    }

    pub fn position(&self, v: i128) -> Option<u128> {
        match self {
            IntSpace::List(vals) => vals.iter().position(|x| *x == v).map(|p| p as u128),
            IntSpace::Range { min, max } => (v >= *min && v <= *max).then(|| (v - min) as u128),
        }
    }

    pub fn contains(&self, v: i128) -> bool {
        self.position(v).is_some()
    }

    pub fn lowest(&self) -> i128 {
        match self {
            IntSpace::List(v) => v.iter().copied().min().unwrap_or(0),
            IntSpace::Range { min, .. } => *min,
        }
    }

    pub fn highest(&self) -> i128 {
        match self {
            IntSpace::List(v) => v.iter().copied().max().unwrap_or(0),
            IntSpace::Range { max, .. } => *max,
        }
    }

    /// Make `v` part of the space and return its position: a list moves (or inserts) it to
    /// the front, an interval widens to include it.
    pub(crate) fn admit(&mut self, v: i128) -> u128 {
        match self {
            IntSpace::List(vals) => {
                if let Some(p) = vals.iter().position(|x| *x == v) {
                    vals.remove(p);
                }
                vals.insert(0, v);
                0
            }
            IntSpace::Range { min, max } => {
                *min = (*min).min(v);
                *max = (*max).max(v);
                (v - *min) as u128
            }
        }
    }

    /// Smallest and largest values missing from a sparse list, strictly inside its span.
    fn gaps(&self) -> Option<(i128, i128)> {
        let IntSpace::List(vals) = self else {
            return None;
        };
        let mut sorted = vals.clone();
        sorted.sort_unstable();
        sorted.dedup();
        let first = sorted.windows(2).find(|w| w[1] > w[0] + 1).map(|w| w[0] + 1)?;
        let last = sorted.windows(2).rev().find(|w| w[1] > w[0] + 1).map(|w| w[1] - 1)?;
        Some((first, last))
    }
}

/// Static configuration of an integer value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IntConfig {
    pub values: Option<Vec<i128>>,
    pub min: Option<i128>,
    pub max: Option<i128>,
    pub default: Option<i128>,
    pub mode: Mode,
    pub seed: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
struct Walk {
    space: IntSpace,
    cursor: Cursor,
}

impl Walk {
    fn new(space: IntSpace, start: u128) -> Self {
        let cursor = Cursor::starting_at(space.len(), start);
        Walk { space, cursor }
    }

    fn drawn(&self) -> Option<i128> {
        self.cursor.last().map(|i| self.space.get(i))
    }

    fn current(&self, mode: Mode) -> i128 {
        self.drawn()
            .unwrap_or_else(|| self.space.get(self.cursor.peek(mode)))
    }
}

/// Everything an integer absorption may change.
#[derive(Debug, Clone, PartialEq)]
pub struct IntState {
    normal: Walk,
    fuzz: Option<Walk>,
    fuzzing: bool,
}

impl IntState {
    fn active(&self) -> &Walk {
        match (self.fuzzing, self.fuzz.as_ref()) {
            (true, Some(f)) => f,
            _ => &self.normal,
        }
    }

    fn active_mut(&mut self) -> &mut Walk {
        match (self.fuzzing, self.fuzz.as_mut()) {
            (true, Some(f)) => f,
            _ => &mut self.normal,
        }
    }
}

/// An enumerated integer.
#[derive(Debug, Clone)]
pub struct IntValue {
    format: IntFormat,
    /// Configured default; a range keeps its determinist start on it when absorption
    /// widens the interval.
    default: Option<i128>,
    mode: Mode,
    state: IntState,
    rng: StdRng,
}

pub(crate) fn rng_from(seed: Option<u64>) -> StdRng {
    match seed {
        Some(s) => StdRng::seed_from_u64(s),
        None => StdRng::from_entropy(),
    }
}

impl IntValue {
    pub fn new(kind: IntKind, config: IntConfig) -> Result<Self, ValueError> {
        Self::with_format(IntFormat::Binary(kind), config)
    }

    /// Integer emitted as text digits.
    pub fn text(format: TextFormat, config: IntConfig) -> Result<Self, ValueError> {
        if !(2..=16).contains(&format.base) {
            return Err(ValueError::config(format!(
                "text integer base {} not in 2..=16",
                format.base
            )));
        }
        Self::with_format(IntFormat::Text(format), config)
    }

    /// Preset boundary values for `kind`: all-ones, 0, 1, the sign bit alone and the
    /// largest positive value, kept within `config.min..=config.max`. For signed kinds the
    /// unsigned patterns are reinterpreted through two's-complement wrap, and a wrapped
    /// value already listed is not repeated.
    pub fn fuzzy(kind: IntKind, config: IntConfig) -> Result<Self, ValueError> {
        if config.values.is_some() {
            return Err(ValueError::config("fuzzy integers carry their own values"));
        }
        let all_ones = low_mask(kind.bits) as i128;
        let patterns = [all_ones, 0, 1, 1i128 << (kind.bits - 1), all_ones >> 1];
        let lo = config.min.unwrap_or(kind.min());
        let hi = config.max.unwrap_or(kind.max());
        let mut values: Vec<i128> = Vec::new();
        for p in patterns {
            let v = if kind.contains(p) {
                p
            } else {
                let wrapped = kind.wrap(p);
                if values.contains(&wrapped) {
                    continue;
                }
                wrapped
            };
            if v >= lo && v <= hi && !values.contains(&v) {
                values.push(v);
            }
        }
        if values.is_empty() {
            return Err(ValueError::config(format!(
                "no {} boundary value within [{}, {}]",
                kind.name, lo, hi
            )));
        }
        Self::new(
            kind,
            IntConfig {
                values: Some(values),
                min: None,
                max: None,
                ..config
            },
        )
    }

    /// Single-candidate integer (derived values).
    pub fn constant(format: IntFormat, v: i128) -> Result<Self, ValueError> {
        Self::with_format(
            format,
            IntConfig {
                values: Some(vec![v]),
                seed: Some(0),
                ..IntConfig::default()
            },
        )
    }

    fn with_format(format: IntFormat, config: IntConfig) -> Result<Self, ValueError> {
        let (lo, hi) = format.bounds();
        let mut space = match (config.values, config.min, config.max) {
            (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
                return Err(ValueError::config("give either values or min/max, not both"));
            }
            (Some(values), None, None) => {
                if values.is_empty() {
                    return Err(ValueError::config("empty candidate list"));
                }
                let mut list: Vec<i128> = Vec::with_capacity(values.len());
                for v in values {
                    if v < lo || v > hi {
                        return Err(ValueError::config(format!(
                            "{} cannot represent {}",
                            format.name(),
                            v
                        )));
                    }
                    if !list.contains(&v) {
                        list.push(v);
                    }
                }
                IntSpace::List(list)
            }
            (None, min, max) => {
                let min = min.unwrap_or(lo);
                let max = max.unwrap_or(hi);
                if min > max {
                    return Err(ValueError::config(format!("min {} > max {}", min, max)));
                }
                if min < lo || max > hi {
                    return Err(ValueError::config(format!(
                        "[{}, {}] exceeds {} bounds [{}, {}]",
                        min,
                        max,
                        format.name(),
                        lo,
                        hi
                    )));
                }
                IntSpace::Range { min, max }
            }
        };
        let mut start = 0;
        if let Some(d) = config.default {
            if !space.contains(d) {
                return Err(ValueError::config(format!("default {} not in candidate space", d)));
            }
            let is_range = matches!(space, IntSpace::Range { .. });
            if is_range {
                start = (d - space.lowest()) as u128;
            } else {
                space.admit(d);
            }
        }
        let mut rng = rng_from(config.seed);
        let mut normal = Walk::new(space, start);
        if config.mode == Mode::Random {
            normal.cursor.shuffle(&mut rng);
        }
        Ok(IntValue {
            format,
            default: config.default,
            mode: config.mode,
            state: IntState {
                normal,
                fuzz: None,
                fuzzing: false,
            },
            rng,
        })
    }

    pub fn format(&self) -> IntFormat {
        self.format
    }

    /// Normal candidate space.
    pub fn space(&self) -> &IntSpace {
        &self.state.normal.space
    }

    /// Fuzz candidate space, once computed.
    pub fn fuzz_space(&self) -> Option<&IntSpace> {
        self.state.fuzz.as_ref().map(|w| &w.space)
    }

    pub fn current_int(&self) -> i128 {
        if self.state.fuzzing {
            if let Some(v) = self.state.fuzz.as_ref().and_then(Walk::drawn) {
                return v;
            }
        }
        self.state.normal.current(self.mode)
    }

    /// Draw and return the integer rather than its encoding.
    pub fn draw_int(&mut self) -> i128 {
        let mode = self.mode;
        let walk = self.state.active_mut();
        let idx = walk.cursor.draw(mode, &mut self.rng);
        let v = walk.space.get(idx);
        tracing::trace!(value = %v, exhausted = walk.cursor.is_exhausted(), "int draw");
        v
    }

    /// Boundary, off-by-one and type-confusable values around `v`.
    fn fuzz_cases(&self, v: i128) -> Vec<i128> {
        let mut cands = vec![v.checked_add(1), v.checked_sub(1)];
        let space = &self.state.normal.space;
        if let Some((first, last)) = space.gaps() {
            cands.push(Some(first));
            cands.push(Some(last));
        }
        cands.push(space.lowest().checked_sub(1));
        cands.push(space.highest().checked_add(1));
        let bounds = match self.format {
            IntFormat::Binary(k) => {
                let sign_bit = 1i128 << (k.bits - 1);
                cands.extend([
                    Some(k.min()),
                    Some(k.max()),
                    Some(k.wrap(k.max() / 2)),
                    Some(k.wrap(k.max() / 2 + 1)),
                    Some(0),
                    Some(k.wrap(v ^ sign_bit)),
                    Some(k.wrap(-1)),
                ]);
                (k.min(), k.max())
            }
            IntFormat::Text(_) => {
                cands.extend([
                    Some(0),
                    v.checked_neg(),
                    Some(i64::MAX as i128),
                    Some(i64::MIN as i128),
                    Some(i64::MIN as i128 - 1),
                    Some(u64::MAX as i128 + 1),
                ]);
                (i128::MIN, i128::MAX)
            }
        };
        let mut out = Vec::new();
        for c in cands.into_iter().flatten() {
            if c != v && c >= bounds.0 && c <= bounds.1 && !out.contains(&c) {
                out.push(c);
            }
        }
        out
    }

    fn absorb_text(
        &self,
        format: TextFormat,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<(i128, usize), ValueError> {
        let w = window(blob, offset, size.unwrap_or(1))?;
        let w = match size {
            Some(sz) => &w[..sz],
            None => w,
        };
        let run = format.token_len(w);
        if run == 0 {
            return Err(ValueError::mismatch(offset, 0, "no digits"));
        }
        if size.is_some() && run != w.len() {
            return Err(ValueError::mismatch(offset, run, "non-digit inside the expected span"));
        }
        let digits = run - usize::from(w[0] == b'-');
        if constraints.size && digits < format.min_digits {
            return Err(ValueError::mismatch(
                offset,
                run,
                format!("{} digits, at least {} required", digits, format.min_digits),
            ));
        }
        let v = format
            .parse(&w[..run])
            .ok_or_else(|| ValueError::mismatch(offset, run, "integer overflow"))?;
        let (lo, hi) = IntFormat::Text(format).bounds();
        if v < lo || v > hi {
            return Err(ValueError::mismatch(offset, run, format!("{} out of text integer bounds", v)));
        }
        Ok((v, run))
    }
}

impl TypedValue for IntValue {
    fn draw(&mut self) -> Vec<u8> {
        let v = self.draw_int();
        self.format.encode(v)
    }

    fn rewind(&mut self) -> bool {
        self.state.active_mut().cursor.rewind()
    }

    fn reset_state(&mut self) {
        self.state.normal.cursor.reset();
        self.state.fuzz = None;
        self.state.fuzzing = false;
    }

    fn switch_mode(&mut self) -> bool {
        if self.state.fuzzing {
            self.state.fuzzing = false;
            tracing::debug!(format = self.format.name(), "int back to normal mode");
            return false;
        }
        if self.state.fuzz.is_none() {
            let cases = self.fuzz_cases(self.current_int());
            if cases.is_empty() {
                return false;
            }
            let mut walk = Walk::new(IntSpace::List(cases), 0);
            if self.mode == Mode::Random {
                walk.cursor.shuffle(&mut self.rng);
            }
            self.state.fuzz = Some(walk);
        }
        self.state.fuzzing = true;
        tracing::debug!(format = self.format.name(), "int in fuzz mode");
        true
    }

    fn fuzz_mode(&self) -> bool {
        self.state.fuzzing
    }

    fn is_exhausted(&self) -> bool {
        self.state.active().cursor.is_exhausted()
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn make_determinist(&mut self) {
        self.mode = Mode::Determinist;
    }

    fn make_random(&mut self) {
        self.mode = Mode::Random;
        self.state.normal.cursor.shuffle(&mut self.rng);
        if let Some(f) = self.state.fuzz.as_mut() {
            f.cursor.shuffle(&mut self.rng);
        }
    }

    fn current_raw_value(&self) -> RawValue {
        RawValue::Int(self.current_int())
    }

    fn current_bytes(&self) -> Vec<u8> {
        self.format.encode(self.current_int())
    }

    fn pretty_print(&self, max_len: Option<usize>) -> String {
        let v = self.current_int();
        let mut s = match self.format {
            IntFormat::Binary(k) => format!("{} (0x{}) [{}]", v, hex::encode_upper(k.encode(v)), k.name),
            IntFormat::Text(t) => format!(
                "{} [INT_str base {}]",
                String::from_utf8_lossy(&t.encode(v)),
                t.base
            ),
        };
        if self.state.fuzzing {
            s.push_str(" [fuzz]");
        }
        truncate_display(s, max_len)
    }
}

impl Absorb for IntValue {
    type State = IntState;

    fn stage(&self) -> Snapshot<IntState> {
        Snapshot::new(self.state.clone())
    }

    fn attempt(
        &mut self,
        _staged: &Snapshot<IntState>,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Absorbed, ValueError> {
        let (value, consumed) = match self.format {
            IntFormat::Binary(kind) => {
                let need = kind.byte_len();
                if let Some(sz) = size {
                    if sz < need {
                        return Err(ValueError::insufficient(need, sz));
                    }
                    if constraints.size && sz != need {
                        return Err(ValueError::mismatch(
                            offset,
                            0,
                            format!("{} spans {} bytes, not {}", kind.name, need, sz),
                        ));
                    }
                }
                let w = window(blob, offset, need)?;
                (kind.decode(w), need)
            }
            IntFormat::Text(format) => self.absorb_text(format, blob, offset, constraints, size)?,
        };
        if constraints.contents && !self.state.normal.space.contains(value) {
            return Err(ValueError::mismatch(
                offset,
                0,
                format!("{} not in candidate space", value),
            ));
        }
        self.state.fuzz = None;
        self.state.fuzzing = false;
        let mode = self.mode;
        let normal = &mut self.state.normal;
        let idx = normal.space.admit(value);
        normal.cursor.resize(normal.space.len());
        if let (Some(d), IntSpace::Range { min, .. }) = (self.default, &normal.space) {
            let start = (d - *min) as u128;
            normal.cursor.set_start(start);
        }
        normal.cursor.place_after(idx, mode, &mut self.rng);
        tracing::debug!(value = %value, offset, consumed, "int absorbed");
        Ok(Absorbed {
            bytes: blob[offset..offset + consumed].to_vec(),
            offset,
            size: consumed,
        })
    }

    fn revert(&mut self, snapshot: Snapshot<IntState>) {
        self.state = snapshot.into_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_lookup() {
        assert_eq!(IntKind::by_name("uint16_BE"), Some(UINT16_BE));
        assert_eq!(INT_KINDS.len(), 14);
        assert!(IntKind::by_name("UINT24").is_none());
    }

    #[test]
    fn wrap_and_encode_signed() {
        assert_eq!(SINT8.wrap(0xFF), -1);
        assert_eq!(SINT8.wrap(0x80), -128);
        assert_eq!(SINT16_LE.encode(-2), vec![0xFE, 0xFF]);
        assert_eq!(SINT16_BE.decode(&[0xFF, 0xFE]), -2);
    }

    #[test]
    fn text_format_layout() {
        let hex = TextFormat {
            base: 16,
            uppercase: false,
            min_digits: 4,
        };
        assert_eq!(hex.encode(255), b"00ff".to_vec());
        assert_eq!(TextFormat::DECIMAL.encode(-42), b"-42".to_vec());
        assert_eq!(TextFormat::DECIMAL.token_len(b"-12ab"), 3);
        assert_eq!(TextFormat::DECIMAL.token_len(b"-x"), 0);
    }

    #[test]
    fn list_gaps() {
        let s = IntSpace::List(vec![1, 2, 5, 9]);
        assert_eq!(s.gaps(), Some((3, 8)));
        assert_eq!(IntSpace::List(vec![3, 4]).gaps(), None);
    }
}
