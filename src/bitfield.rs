//! Bit fields: several integer subfields packed into one byte-aligned span.
//!
//! ## Packing
//!
//! `subfields[0]` occupies the least significant bits, each following subfield sits right
//! above the previous one. The whole field is padded to a byte boundary with a constant
//! bit pattern, either below the subfields (`lsb_padding`) or above them, and the
//! resulting integer is written in the configured byte order.
//!
//! ```text
//! limits [2, 6, 8, 10], every subfield = 1, lsb padding with zeros:
//!   bits   9..8  7..6  5..2  1..0  | padding
//!          01    01    0001  01    | 000000     => 0x51 0x40
//! ```
//!
//! ## Enumeration
//!
//! A round starts with the initial combination (defaults or first candidates). Then one
//! subfield at a time sweeps through its other candidates while the rest stay at their
//! initial values; a subfield returns to its initial value once its sweep is over. A round
//! therefore has `1 + Σ(len_i - 1)` draws. Random mode draws every subfield at random
//! and only counts draws to end the round after the same number.

use crate::absorb::{window, Absorb, AbsorbConstraints, Absorbed, Snapshot};
use crate::codec::{bytes_to_u128, low_mask, u128_to_bytes, Endianness, ValueError};
use crate::cursor::{Cursor, Mode};
use crate::int::{rng_from, IntSpace};
use crate::value::{truncate_display, RawValue, TypedValue};
use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Widest packed field.
pub const MAX_BITS: u32 = 128;
/// Widest single subfield.
pub const MAX_SUBFIELD_BITS: u32 = 64;

/// Padding bit pattern.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PadBit {
    #[default]
    Zero,
    One,
}

/// Candidate space of one subfield. Neither `values` nor `min`/`max` means the full
/// width range.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubfieldSpec {
    pub values: Option<Vec<u64>>,
    pub min: Option<u64>,
    pub max: Option<u64>,
    pub default: Option<u64>,
    pub description: Option<String>,
}

impl SubfieldSpec {
    pub fn values(values: impl IntoIterator<Item = u64>) -> Self {
        SubfieldSpec {
            values: Some(values.into_iter().collect()),
            ..SubfieldSpec::default()
        }
    }

    pub fn range(min: u64, max: u64) -> Self {
        SubfieldSpec {
            min: Some(min),
            max: Some(max),
            ..SubfieldSpec::default()
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }
}

/// Static configuration of a bit field. Exactly one of `limits` (cumulative bit
/// positions) and `sizes` (bit widths) is given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BitFieldConfig {
    pub limits: Option<Vec<u32>>,
    pub sizes: Option<Vec<u32>>,
    pub subfields: Vec<SubfieldSpec>,
    pub padding: PadBit,
    pub lsb_padding: bool,
    pub endianness: Endianness,
    pub mode: Mode,
    pub seed: Option<u64>,
}

impl Default for BitFieldConfig {
    fn default() -> Self {
        BitFieldConfig {
            limits: None,
            sizes: None,
            subfields: Vec::new(),
            padding: PadBit::Zero,
            lsb_padding: true,
            endianness: Endianness::Big,
            mode: Mode::Determinist,
            seed: None,
        }
    }
}

/// Layout of one subfield.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Subfield {
    width: u32,
    offset: u32,
    description: Option<String>,
}

impl Subfield {
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Position of the lowest bit, padding excluded.
    pub fn offset(&self) -> u32 {
        self.offset
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    fn max_value(&self) -> i128 {
        low_mask(self.width) as i128
    }
}

#[derive(Debug, Clone, PartialEq)]
struct Progress {
    in_use: Vec<i128>,
    active: usize,
    step: u128,
    count: u128,
    exhausted: bool,
}

impl Progress {
    fn fresh(initial: &[i128]) -> Self {
        Progress {
            in_use: initial.to_vec(),
            active: 0,
            step: 0,
            count: 0,
            exhausted: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
struct FuzzWalk {
    base: Vec<i128>,
    cases: Vec<(usize, i128)>,
    cursor: Cursor,
}

/// Everything a bit field absorption may change.
#[derive(Debug, Clone, PartialEq)]
pub struct BitFieldState {
    spaces: Vec<IntSpace>,
    initial: Vec<i128>,
    progress: Progress,
    history: Option<Progress>,
    fuzz: Option<FuzzWalk>,
    fuzzing: bool,
}

/// A packed group of integer subfields.
#[derive(Debug, Clone)]
pub struct BitField {
    subfields: Vec<Subfield>,
    total_bits: u32,
    padding: PadBit,
    lsb_padding: bool,
    endianness: Endianness,
    mode: Mode,
    state: BitFieldState,
    rng: StdRng,
}

fn widths_from(config: &BitFieldConfig) -> Result<Vec<u32>, ValueError> {
    let widths = match (&config.limits, &config.sizes) {
        (Some(_), Some(_)) => {
            return Err(ValueError::config("give either limits or sizes, not both"));
        }
        (None, None) => return Err(ValueError::config("bit field needs limits or sizes")),
        (None, Some(sizes)) => sizes.clone(),
        (Some(limits), None) => {
            let mut prev = 0u32;
            let mut out = Vec::with_capacity(limits.len());
            for &l in limits {
                if l <= prev {
                    return Err(ValueError::config(format!(
                        "limits must increase strictly, got {} after {}",
                        l, prev
                    )));
                }
                out.push(l - prev);
                prev = l;
            }
            out
        }
    };
    if widths.is_empty() {
        return Err(ValueError::config("bit field without subfields"));
    }
    if let Some(w) = widths.iter().find(|w| **w == 0 || **w > MAX_SUBFIELD_BITS) {
        return Err(ValueError::config(format!(
            "subfield width {} not in 1..={}",
            w, MAX_SUBFIELD_BITS
        )));
    }
    let total: u32 = widths.iter().sum();
    if total > MAX_BITS {
        return Err(ValueError::config(format!(
            "{} bits exceed the {}-bit maximum",
            total, MAX_BITS
        )));
    }
    Ok(widths)
}

fn space_from(index: usize, width: u32, spec: &SubfieldSpec) -> Result<(IntSpace, i128), ValueError> {
    let m = low_mask(width) as i128;
    let mut space = match (&spec.values, spec.min, spec.max) {
        (Some(_), Some(_), _) | (Some(_), _, Some(_)) => {
            return Err(ValueError::config(format!(
                "subfield {}: give either values or min/max, not both",
                index
            )));
        }
        (Some(values), None, None) => {
            let mut list: Vec<i128> = Vec::with_capacity(values.len());
            for v in values.iter().map(|v| *v as i128) {
                if v > m {
                    tracing::debug!(subfield = index, value = %v, width, "candidate wider than subfield dropped");
                    continue;
                }
                if !list.contains(&v) {
                    list.push(v);
                }
            }
            if list.is_empty() {
                return Err(ValueError::config(format!(
                    "subfield {}: no candidate fits {} bits",
                    index, width
                )));
            }
            IntSpace::List(list)
        }
        (None, min, max) => {
            let min = min.map_or(0, |v| v as i128);
            let max = max.map_or(m, |v| v as i128);
            if min > max || max > m {
                return Err(ValueError::config(format!(
                    "subfield {}: [{}, {}] does not fit {} bits",
                    index, min, max, width
                )));
            }
            IntSpace::Range { min, max }
        }
    };
    let initial = match spec.default.map(|d| d as i128) {
        Some(d) if !space.contains(d) => {
            return Err(ValueError::config(format!(
                "subfield {}: default {} not in candidate space",
                index, d
            )));
        }
        Some(d) => {
            if let IntSpace::List(_) = space {
                space.admit(d);
            }
            d
        }
        None => space.get(0),
    };
    Ok((space, initial))
}

impl BitField {
    pub fn new(config: BitFieldConfig) -> Result<Self, ValueError> {
        let widths = widths_from(&config)?;
        if config.subfields.len() > widths.len() {
            return Err(ValueError::config(format!(
                "{} subfield specs for {} subfields",
                config.subfields.len(),
                widths.len()
            )));
        }
        let full_range = SubfieldSpec::default();
        let mut subfields = Vec::with_capacity(widths.len());
        let mut spaces = Vec::with_capacity(widths.len());
        let mut initial = Vec::with_capacity(widths.len());
        let mut offset = 0;
        for (i, &width) in widths.iter().enumerate() {
            let spec = config.subfields.get(i).unwrap_or(&full_range);
            let (space, init) = space_from(i, width, spec)?;
            subfields.push(Subfield {
                width,
                offset,
                description: spec.description.clone(),
            });
            spaces.push(space);
            initial.push(init);
            offset += width;
        }
        Ok(BitField {
            subfields,
            total_bits: offset,
            padding: config.padding,
            lsb_padding: config.lsb_padding,
            endianness: config.endianness,
            mode: config.mode,
            state: BitFieldState {
                spaces,
                progress: Progress::fresh(&initial),
                initial,
                history: None,
                fuzz: None,
                fuzzing: false,
            },
            rng: rng_from(config.seed),
        })
    }

    pub fn subfields(&self) -> &[Subfield] {
        &self.subfields
    }

    pub fn subfield_count(&self) -> usize {
        self.subfields.len()
    }

    pub fn subfield_space(&self, index: usize) -> &IntSpace {
        &self.state.spaces[index]
    }

    pub fn total_bits(&self) -> u32 {
        self.total_bits
    }

    pub fn byte_len(&self) -> usize {
        self.total_bits.div_ceil(8) as usize
    }

    pub fn padding_bits(&self) -> u32 {
        self.byte_len() as u32 * 8 - self.total_bits
    }

    /// Draws per round, in both modes.
    pub fn round_len(&self) -> u128 {
        self.state
            .spaces
            .iter()
            .fold(1u128, |acc, s| acc.saturating_add(s.len() - 1))
    }

    fn current_values(&self) -> Vec<i128> {
        if self.state.fuzzing {
            if let Some(walk) = &self.state.fuzz {
                if let Some(idx) = walk.cursor.last() {
                    let (i, v) = walk.cases[idx as usize];
                    let mut vals = walk.base.clone();
                    vals[i] = v;
                    return vals;
                }
            }
        }
        self.state.progress.in_use.clone()
    }

    pub fn subfield_value(&self, index: usize) -> u64 {
        assert!(index < self.subfields.len(), "subfield {} out of range", index);
        self.current_values()[index] as u64
    }

    pub fn subfield_values(&self) -> Vec<u64> {
        self.current_values().into_iter().map(|v| v as u64).collect()
    }

    /// Force a subfield value without advancing the enumeration. A value outside the
    /// candidate space joins it.
    pub fn set_subfield(&mut self, index: usize, value: u64) -> Result<(), ValueError> {
        assert!(index < self.subfields.len(), "subfield {} out of range", index);
        let sf = &self.subfields[index];
        let v = value as i128;
        if v > sf.max_value() {
            return Err(ValueError::config(format!(
                "{} does not fit subfield {} ({} bits)",
                value, index, sf.width
            )));
        }
        if !self.state.spaces[index].contains(v) {
            self.state.spaces[index].admit(v);
        }
        self.state.progress.in_use[index] = v;
        self.state.fuzz = None;
        self.state.fuzzing = false;
        Ok(())
    }

    fn pack(&self, values: &[i128]) -> u128 {
        self.subfields
            .iter()
            .zip(values)
            .fold(0u128, |acc, (sf, v)| acc | ((*v as u128) & low_mask(sf.width)) << sf.offset)
    }

    fn pad_pattern(&self) -> u128 {
        match self.padding {
            PadBit::Zero => 0,
            PadBit::One => low_mask(self.padding_bits()),
        }
    }

    fn encode(&self, values: &[i128]) -> Vec<u8> {
        let bits = self.pack(values);
        let pad = self.padding_bits();
        let full = if self.lsb_padding {
            (bits << pad) | self.pad_pattern()
        } else {
            bits | self.pad_pattern().checked_shl(self.total_bits).unwrap_or(0)
        };
        u128_to_bytes(full, self.byte_len(), self.endianness)
    }

    /// Concatenate `low` and `high` at the bit level, `low` taking the low bits. Layout
    /// settings and the RNG come from `self`.
    fn joined(&self, low: &BitField, high: &BitField) -> Result<BitField, ValueError> {
        let total_bits = low.total_bits + high.total_bits;
        if total_bits > MAX_BITS {
            return Err(ValueError::config(format!(
                "{} bits exceed the {}-bit maximum",
                total_bits, MAX_BITS
            )));
        }
        let shifted = high.subfields.iter().map(|sf| Subfield {
            offset: sf.offset + low.total_bits,
            ..sf.clone()
        });
        let subfields: Vec<Subfield> = low.subfields.iter().cloned().chain(shifted).collect();
        let spaces = [low.state.spaces.as_slice(), high.state.spaces.as_slice()].concat();
        let initial = [low.state.initial.as_slice(), high.state.initial.as_slice()].concat();
        let mut in_use = low.current_values();
        in_use.extend(high.current_values());
        let mut progress = Progress::fresh(&initial);
        progress.in_use = in_use;
        Ok(BitField {
            subfields,
            total_bits,
            padding: self.padding,
            lsb_padding: self.lsb_padding,
            endianness: self.endianness,
            mode: self.mode,
            state: BitFieldState {
                spaces,
                initial,
                progress,
                history: None,
                fuzz: None,
                fuzzing: false,
            },
            rng: self.rng.clone(),
        })
    }

    /// Append `other` above the current most significant subfield.
    pub fn extend_right(&mut self, other: &BitField) -> Result<(), ValueError> {
        *self = self.joined(self, other)?;
        tracing::debug!(bits = self.total_bits, "bit field extended right");
        Ok(())
    }

    /// Insert `other` below the current least significant subfield.
    pub fn extend_left(&mut self, other: &BitField) -> Result<(), ValueError> {
        *self = self.joined(other, self)?;
        tracing::debug!(bits = self.total_bits, "bit field extended left");
        Ok(())
    }

    fn fuzz_cases(&self, base: &[i128]) -> Vec<(usize, i128)> {
        let mut cases = Vec::new();
        for (i, (sf, space)) in self.subfields.iter().zip(&self.state.spaces).enumerate() {
            let m = sf.max_value();
            let c = base[i];
            let candidates = [
                0,
                m,
                m / 2 + 1,
                c + 1,
                c - 1,
                space.lowest() - 1,
                space.highest() + 1,
            ];
            for v in candidates {
                if v >= 0 && v <= m && v != c && !cases.contains(&(i, v)) {
                    cases.push((i, v));
                }
            }
        }
        cases
    }

    fn advance(&mut self) {
        let round = self.round_len();
        let BitField {
            state, rng, mode, ..
        } = self;
        let prev = state.progress.clone();
        if state.progress.exhausted {
            state.progress = Progress::fresh(&state.initial);
        }
        let p = &mut state.progress;
        match mode {
            Mode::Determinist if p.count > 0 => {
                let n = state.spaces.len();
                while p.active < n && p.step + 1 >= state.spaces[p.active].len() {
                    p.in_use[p.active] = state.initial[p.active];
                    p.active += 1;
                    p.step = 0;
                }
                if p.active < n {
                    let space = &state.spaces[p.active];
                    let start = space.position(state.initial[p.active]).unwrap_or(0);
                    p.step += 1;
                    p.in_use[p.active] = space.get((start + p.step) % space.len());
                }
            }
            Mode::Determinist => {}
            Mode::Random => {
                for (slot, space) in p.in_use.iter_mut().zip(&state.spaces) {
                    *slot = space.get(rng.gen_range(0..space.len()));
                }
            }
        }
        p.count += 1;
        p.exhausted = p.count >= round;
        state.history = Some(prev);
    }
}

impl TypedValue for BitField {
    fn draw(&mut self) -> Vec<u8> {
        if self.state.fuzzing {
            if let Some(walk) = self.state.fuzz.as_mut() {
                walk.cursor.draw(self.mode, &mut self.rng);
                return self.encode(&self.current_values());
            }
        }
        self.advance();
        tracing::trace!(
            count = %self.state.progress.count,
            exhausted = self.state.progress.exhausted,
            "bit field draw"
        );
        self.encode(&self.state.progress.in_use)
    }

    fn rewind(&mut self) -> bool {
        if let (true, Some(walk)) = (self.state.fuzzing, self.state.fuzz.as_mut()) {
            return walk.cursor.rewind();
        }
        match self.state.history.take() {
            Some(prev) => {
                self.state.progress = prev;
                true
            }
            None => false,
        }
    }

    fn reset_state(&mut self) {
        self.state.progress = Progress::fresh(&self.state.initial);
        self.state.history = None;
        self.state.fuzz = None;
        self.state.fuzzing = false;
    }

    fn switch_mode(&mut self) -> bool {
        if self.state.fuzzing {
            self.state.fuzzing = false;
            tracing::debug!("bit field back to normal mode");
            return false;
        }
        if self.state.fuzz.is_none() {
            let base = self.state.progress.in_use.clone();
            let cases = self.fuzz_cases(&base);
            if cases.is_empty() {
                return false;
            }
            let mut cursor = Cursor::new(cases.len() as u128);
            if self.mode == Mode::Random {
                cursor.shuffle(&mut self.rng);
            }
            self.state.fuzz = Some(FuzzWalk { base, cases, cursor });
        }
        self.state.fuzzing = true;
        tracing::debug!("bit field in fuzz mode");
        true
    }

    fn fuzz_mode(&self) -> bool {
        self.state.fuzzing
    }

    fn is_exhausted(&self) -> bool {
        match (self.state.fuzzing, self.state.fuzz.as_ref()) {
            (true, Some(walk)) => walk.cursor.is_exhausted(),
            _ => self.state.progress.exhausted,
        }
    }

    fn mode(&self) -> Mode {
        self.mode
    }

    fn make_determinist(&mut self) {
        self.mode = Mode::Determinist;
    }

    fn make_random(&mut self) {
        self.mode = Mode::Random;
        if let Some(walk) = self.state.fuzz.as_mut() {
            walk.cursor.shuffle(&mut self.rng);
        }
    }

    fn current_raw_value(&self) -> RawValue {
        RawValue::Bits(self.pack(&self.current_values()))
    }

    fn current_bytes(&self) -> Vec<u8> {
        self.encode(&self.current_values())
    }

    fn pretty_print(&self, max_len: Option<usize>) -> String {
        let values = self.current_values();
        let parts: Vec<String> = self
            .subfields
            .iter()
            .zip(&values)
            .enumerate()
            .rev()
            .map(|(i, (sf, v))| {
                let name = sf.description.clone().unwrap_or_else(|| i.to_string());
                format!("{}={:0w$b}", name, v, w = sf.width as usize)
            })
            .collect();
        let mut s = format!(
            "0x{} ({}) [{} bits]",
            hex::encode(self.encode(&values)),
            parts.join(" "),
            self.total_bits
        );
        if self.state.fuzzing {
            s.push_str(" [fuzz]");
        }
        truncate_display(s, max_len)
    }
}

impl Absorb for BitField {
    type State = BitFieldState;

    fn stage(&self) -> Snapshot<BitFieldState> {
        Snapshot::new(self.state.clone())
    }

    fn attempt(
        &mut self,
        _staged: &Snapshot<BitFieldState>,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Absorbed, ValueError> {
        let len = self.byte_len();
        if let Some(sz) = size {
            if constraints.size && sz != len {
                return Err(ValueError::mismatch(
                    offset,
                    0,
                    format!("bit field spans {} bytes, not {}", len, sz),
                ));
            }
        }
        let span = &window(blob, offset, len)?[..len];
        let full = bytes_to_u128(span, self.endianness);
        let pad = self.padding_bits();
        let (bits, pad_found) = if self.lsb_padding {
            (full >> pad, full & low_mask(pad))
        } else {
            (
                full & low_mask(self.total_bits),
                full.checked_shr(self.total_bits).unwrap_or(0),
            )
        };
        if constraints.contents && pad_found != self.pad_pattern() {
            return Err(ValueError::mismatch(offset, 0, "padding bits do not match"));
        }
        let values: Vec<i128> = self
            .subfields
            .iter()
            .map(|sf| ((bits >> sf.offset) & low_mask(sf.width)) as i128)
            .collect();
        if constraints.contents {
            if let Some(i) = (0..values.len()).find(|&i| !self.state.spaces[i].contains(values[i])) {
                return Err(ValueError::mismatch(
                    offset,
                    0,
                    format!("subfield {} value {} outside its candidates", i, values[i]),
                ));
            }
        }
        for (space, v) in self.state.spaces.iter_mut().zip(&values) {
            if !space.contains(*v) {
                space.admit(*v);
            }
        }
        let round = self.round_len();
        let state = &mut self.state;
        state.initial = values.clone();
        state.progress = Progress::fresh(&values);
        state.progress.count = 1;
        state.progress.exhausted = round <= 1;
        state.history = None;
        state.fuzz = None;
        state.fuzzing = false;
        tracing::debug!(offset, bytes = len, "bit field absorbed");
        Ok(Absorbed {
            bytes: span.to_vec(),
            offset,
            size: len,
        })
    }

    fn revert(&mut self, snapshot: Snapshot<BitFieldState>) {
        self.state = snapshot.into_state();
    }
}
