//! String values.
//!
//! Candidates are kept as bytes in the charset domain (text already encoded by the
//! [`Charset`], no [`Encoder`] applied yet). `draw` applies the encoder. Two independent
//! size ranges are tracked:
//!
//! - **logical** size, in characters of the charset;
//! - **encoded** size, in bytes after the encoder.
//!
//! Without explicit values the candidate list is populated from the alphabet: one
//! max-size sample, one min-size sample, then up to three random in-range samples.
//!
//! ## Absorption
//!
//! - an absorption regex (when configured and the regexp constraint is on) must match at
//!   the start of the input;
//! - with user-given values, the longest candidate that prefixes the input wins; failing
//!   that (and without the structure constraint) the earliest offset where any candidate
//!   occurs is used;
//! - with an alphabet, the longest run of alphabet characters is taken;
//! - with an encoder, encoded spans are tried from the longest allowed by the encoded
//!   bounds downwards until one decodes to an acceptable logical value.

use crate::absorb::{Absorb, AbsorbConstraints, Absorbed, Snapshot};
use crate::codec::ValueError;
use crate::cursor::{Cursor, Mode};
use crate::encoder::{Charset, Encoder, EncoderSpec};
use crate::int::rng_from;
use crate::value::{truncate_display, RawValue, TypedValue};
use rand::rngs::StdRng;
use rand::Rng;
use regex::bytes::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;

/// Static configuration of a string value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StringConfig {
    pub values: Option<Vec<String>>,
    /// Sets both `min_size` and `max_size` unless they are given.
    pub size: Option<usize>,
    pub min_size: Option<usize>,
    pub max_size: Option<usize>,
    pub alphabet: Option<String>,
    pub charset: Charset,
    pub encoder: Option<EncoderSpec>,
    pub min_encoded_size: Option<usize>,
    pub max_encoded_size: Option<usize>,
    pub absorb_regex: Option<String>,
    pub case_sensitive: bool,
    /// Additional fuzz cases (charset domain bytes).
    pub extra_fuzz: Vec<Vec<u8>>,
    pub default: Option<String>,
    pub mode: Mode,
    pub seed: Option<u64>,
}

impl Default for StringConfig {
    fn default() -> Self {
        StringConfig {
            values: None,
            size: None,
            min_size: None,
            max_size: None,
            alphabet: None,
            charset: Charset::default(),
            encoder: None,
            min_encoded_size: None,
            max_encoded_size: None,
            absorb_regex: None,
            case_sensitive: true,
            extra_fuzz: Vec::new(),
            default: None,
            mode: Mode::default(),
            seed: None,
        }
    }
}

impl StringConfig {
    pub fn with_values<S: Into<String>>(values: impl IntoIterator<Item = S>) -> Self {
        StringConfig {
            values: Some(values.into_iter().map(Into::into).collect()),
            ..StringConfig::default()
        }
    }
}

/// Logical (characters) and encoded (bytes) size bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizeBounds {
    pub min: usize,
    pub max: usize,
    pub min_encoded: usize,
    pub max_encoded: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum FuzzCase {
    /// Charset-domain bytes, encoded on emission.
    Logical(Vec<u8>),
    /// Encoder-domain bytes, emitted as they are.
    Encoded(Vec<u8>),
}

#[derive(Debug, Clone, PartialEq)]
struct FuzzWalk {
    cases: Vec<FuzzCase>,
    cursor: Cursor,
}

/// Everything a string absorption may change.
#[derive(Debug, Clone, PartialEq)]
pub struct StringState {
    values: Vec<Vec<u8>>,
    cursor: Cursor,
    bounds: SizeBounds,
    fuzz: Option<FuzzWalk>,
    fuzzing: bool,
}

struct Found {
    value: Vec<u8>,
    skip: usize,
    consumed: usize,
}

const PRINTABLE: std::ops::RangeInclusive<u8> = 0x20..=0x7E;

/// An enumerated byte string.
#[derive(Debug, Clone)]
pub struct StringValue {
    charset: Charset,
    encoder: Option<Arc<dyn Encoder>>,
    alphabet: Option<BTreeSet<char>>,
    user_values: bool,
    case_sensitive: bool,
    absorb_regex: Option<Regex>,
    extra_fuzz: Vec<Vec<u8>>,
    mode: Mode,
    state: StringState,
    rng: StdRng,
}

impl StringValue {
    pub fn new(config: StringConfig) -> Result<Self, ValueError> {
        let encoder = config.encoder.as_ref().map(EncoderSpec::build);
        Self::build(config, encoder)
    }

    /// Same as [`StringValue::new`] with a custom encoder (overrides `config.encoder`).
    pub fn with_encoder(config: StringConfig, encoder: Arc<dyn Encoder>) -> Result<Self, ValueError> {
        Self::build(config, Some(encoder))
    }

    fn build(config: StringConfig, encoder: Option<Arc<dyn Encoder>>) -> Result<Self, ValueError> {
        let charset = config.charset;
        let alphabet: Option<BTreeSet<char>> = config.alphabet.as_ref().map(|a| a.chars().collect());
        if let Some(a) = &alphabet {
            if a.is_empty() {
                return Err(ValueError::config("empty alphabet"));
            }
            for c in a {
                charset
                    .encode_char(*c)
                    .map_err(|e| ValueError::config(format!("alphabet: {}", e)))?;
            }
        }
        let absorb_regex = match &config.absorb_regex {
            Some(r) => Some(
                Regex::new(&format!("^(?:{})", r))
                    .map_err(|e| ValueError::config(format!("absorb regex: {}", e)))?,
            ),
            None => None,
        };
        let explicit_min = config.min_size.or(config.size);
        let explicit_max = config.max_size.or(config.size);
        if let (Some(lo), Some(hi)) = (explicit_min, explicit_max) {
            if lo > hi {
                return Err(ValueError::config(format!("min size {} > max size {}", lo, hi)));
            }
        }
        let mut rng = rng_from(config.seed);
        let user_values = config.values.is_some();

        let mut texts: Vec<String> = match &config.values {
            Some(v) if v.is_empty() => return Err(ValueError::config("empty candidate list")),
            Some(v) => v.clone(),
            None => {
                let max = explicit_max
                    .ok_or_else(|| ValueError::config("a string without values needs a size"))?;
                let min = explicit_min.unwrap_or(0);
                let pool: Vec<char> = match &alphabet {
                    Some(a) => a.iter().copied().collect(),
                    None => PRINTABLE.map(char::from).collect(),
                };
                populate(&pool, min, max, &mut rng)
            }
        };
        if let Some(d) = &config.default {
            texts.retain(|t| t != d);
            texts.insert(0, d.clone());
        }

        let mut values: Vec<Vec<u8>> = Vec::with_capacity(texts.len());
        for t in &texts {
            if let Some(a) = &alphabet {
                if let Some(bad) = t.chars().find(|c| !a.contains(c)) {
                    return Err(ValueError::config(format!(
                        "{:?} has {:?} outside the alphabet",
                        t, bad
                    )));
                }
            }
            let bytes = charset
                .encode_str(t)
                .map_err(|e| ValueError::config(format!("{:?}: {}", t, e)))?;
            if !values.contains(&bytes) {
                values.push(bytes);
            }
        }

        let counts: Vec<usize> = texts.iter().map(|t| t.chars().count()).collect();
        let min = explicit_min.unwrap_or_else(|| counts.iter().copied().min().unwrap_or(0));
        let max = explicit_max.unwrap_or_else(|| counts.iter().copied().max().unwrap_or(0));
        if let Some((t, n)) = texts.iter().zip(&counts).find(|(_, n)| **n < min || **n > max) {
            return Err(ValueError::config(format!(
                "{:?} has {} characters, outside [{}, {}]",
                t, n, min, max
            )));
        }

        if let Some(enc) = &encoder {
            for v in &values {
                match enc.decode(&enc.encode(v)) {
                    Ok(back) if back == *v => {}
                    _ => {
                        return Err(ValueError::config(format!(
                            "{} encoder cannot carry {:?}",
                            enc.name(),
                            String::from_utf8_lossy(v)
                        )))
                    }
                }
            }
        }

        let encoded_lens: Vec<usize> = values
            .iter()
            .map(|v| encoder.as_ref().map_or(v.len(), |e| e.encode(v).len()))
            .collect();
        let min_encoded = config
            .min_encoded_size
            .unwrap_or_else(|| encoded_lens.iter().copied().min().unwrap_or(0));
        let max_encoded = config
            .max_encoded_size
            .unwrap_or_else(|| encoded_lens.iter().copied().max().unwrap_or(0));
        if min_encoded > max_encoded {
            return Err(ValueError::config(format!(
                "min encoded size {} > max encoded size {}",
                min_encoded, max_encoded
            )));
        }
        if encoded_lens.iter().any(|n| *n < min_encoded || *n > max_encoded) {
            return Err(ValueError::config(format!(
                "encoded candidates do not fit [{}, {}]",
                min_encoded, max_encoded
            )));
        }

        let mut cursor = Cursor::new(values.len() as u128);
        if config.mode == Mode::Random {
            cursor.shuffle(&mut rng);
        }
        Ok(StringValue {
            charset,
            encoder,
            alphabet,
            user_values,
            case_sensitive: config.case_sensitive,
            absorb_regex,
            extra_fuzz: config.extra_fuzz,
            mode: config.mode,
            state: StringState {
                values,
                cursor,
                bounds: SizeBounds {
                    min,
                    max,
                    min_encoded,
                    max_encoded,
                },
                fuzz: None,
                fuzzing: false,
            },
            rng,
        })
    }

    pub fn charset(&self) -> Charset {
        self.charset
    }

    pub fn bounds(&self) -> SizeBounds {
        self.state.bounds
    }

    /// Normal candidates, charset domain.
    pub fn values(&self) -> &[Vec<u8>] {
        &self.state.values
    }

    pub fn alphabet(&self) -> Option<&BTreeSet<char>> {
        self.alphabet.as_ref()
    }

    pub fn encoder(&self) -> Option<&Arc<dyn Encoder>> {
        self.encoder.as_ref()
    }

    fn encode(&self, logical: &[u8]) -> Vec<u8> {
        match &self.encoder {
            Some(e) => e.encode(logical),
            None => logical.to_vec(),
        }
    }

    fn emit(&self, case: &FuzzCase) -> Vec<u8> {
        match case {
            FuzzCase::Logical(v) => self.encode(v),
            FuzzCase::Encoded(e) => e.clone(),
        }
    }

    fn drawn_fuzz_case(&self) -> Option<&FuzzCase> {
        if !self.state.fuzzing {
            return None;
        }
        let walk = self.state.fuzz.as_ref()?;
        walk.cursor.last().map(|i| &walk.cases[i as usize])
    }

    /// Current value before the encoder (charset domain bytes).
    pub fn current_logical(&self) -> Vec<u8> {
        match self.drawn_fuzz_case() {
            Some(FuzzCase::Logical(v)) => v.clone(),
            Some(FuzzCase::Encoded(e)) => match &self.encoder {
                Some(enc) => enc.decode(e).unwrap_or_else(|_| e.clone()),
                None => e.clone(),
            },
            None => {
                let c = &self.state.cursor;
                let idx = c.last().unwrap_or_else(|| c.peek(self.mode));
                self.state.values[idx as usize].clone()
            }
        }
    }

    /// Current value decoded by the charset, when it decodes.
    pub fn current_text(&self) -> Option<String> {
        self.charset.decode(&self.current_logical()).ok()
    }

    fn in_alphabet(&self, alphabet: &BTreeSet<char>, c: char) -> bool {
        alphabet.contains(&c)
            || (!self.case_sensitive
                && (alphabet.contains(&c.to_ascii_lowercase())
                    || alphabet.contains(&c.to_ascii_uppercase())))
    }

    /// Characters and bytes of the alphabet run at the start of `w`.
    fn alphabet_run(&self, w: &[u8], alphabet: &BTreeSet<char>, limit: Option<usize>) -> (usize, usize) {
        let (mut chars, mut bytes) = (0, 0);
        while limit.map_or(true, |l| chars < l) {
            match self.charset.next_char(&w[bytes..]) {
                Some((c, n)) if self.in_alphabet(alphabet, c) => {
                    chars += 1;
                    bytes += n;
                }
                _ => break,
            }
        }
        (chars, bytes)
    }

    fn check_size(
        &self,
        value: Vec<u8>,
        skip: usize,
        consumed: usize,
        offset: usize,
        constraints: &AbsorbConstraints,
    ) -> Result<Found, ValueError> {
        if constraints.size {
            let b = self.state.bounds;
            let n = self.charset.char_len(&value);
            if n < b.min {
                return Err(ValueError::mismatch(
                    offset + skip,
                    n,
                    format!("{} characters, at least {} required", n, b.min),
                ));
            }
            if n > b.max {
                return Err(ValueError::mismatch(
                    offset + skip,
                    b.max,
                    format!("{} characters, at most {} allowed", n, b.max),
                ));
            }
        }
        Ok(Found {
            value,
            skip,
            consumed,
        })
    }

    /// Match charset-domain bytes. `exact` requires the whole of `w` to be the value.
    fn match_logical(
        &self,
        w: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        exact: bool,
    ) -> Result<Found, ValueError> {
        if constraints.regexp {
            if let Some(re) = &self.absorb_regex {
                let m = re
                    .find(w)
                    .ok_or_else(|| ValueError::mismatch(offset, 0, "absorb regex does not match"))?;
                if exact && m.end() != w.len() {
                    return Err(ValueError::mismatch(
                        offset,
                        m.end(),
                        "absorb regex does not cover the expected span",
                    ));
                }
                return self.check_size(w[..m.end()].to_vec(), 0, m.end(), offset, constraints);
            }
        }
        if constraints.contents {
            if self.user_values {
                return self.match_candidates(w, offset, constraints, exact);
            }
            if let Some(alphabet) = &self.alphabet {
                let limit = constraints.size.then_some(self.state.bounds.max);
                let (chars, bytes) = self.alphabet_run(w, alphabet, limit);
                if exact && bytes != w.len() {
                    return Err(ValueError::mismatch(offset, chars, "character outside the alphabet"));
                }
                return self.check_size(w[..bytes].to_vec(), 0, bytes, offset, constraints);
            }
        }
        let take = if !exact && constraints.size {
            self.charset.prefix_len(w, self.state.bounds.max)
        } else {
            w.len()
        };
        self.check_size(w[..take].to_vec(), 0, take, offset, constraints)
    }

    fn match_candidates(
        &self,
        w: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        exact: bool,
    ) -> Result<Found, ValueError> {
        let sensitive = self.case_sensitive;
        let best = self
            .state
            .values
            .iter()
            .filter(|v| starts_with(w, v, sensitive) && (!exact || v.len() == w.len()))
            .max_by_key(|v| v.len());
        if let Some(v) = best {
            return self.check_size(w[..v.len()].to_vec(), 0, v.len(), offset, constraints);
        }
        if exact || constraints.structure {
            return Err(ValueError::mismatch(offset, 0, "no candidate at this offset"));
        }
        let mut hit: Option<(usize, usize)> = None;
        for v in self.state.values.iter().filter(|v| !v.is_empty()) {
            if let Some(p) = find(w, v, sensitive) {
                if hit.map_or(true, |(hp, hl)| p < hp || (p == hp && v.len() > hl)) {
                    hit = Some((p, v.len()));
                }
            }
        }
        let (p, len) = hit.ok_or_else(|| ValueError::mismatch(offset, 0, "no candidate in the input"))?;
        self.check_size(w[p..p + len].to_vec(), p, len, offset, constraints)
    }

    fn match_encoded(
        &self,
        encoder: &dyn Encoder,
        rest: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Found, ValueError> {
        let b = self.state.bounds;
        let (lo, hi) = match size {
            Some(sz) => {
                if constraints.size && (sz < b.min_encoded || sz > b.max_encoded) {
                    return Err(ValueError::mismatch(
                        offset,
                        0,
                        format!("{} encoded bytes outside [{}, {}]", sz, b.min_encoded, b.max_encoded),
                    ));
                }
                (sz, sz)
            }
            None if constraints.size => {
                if rest.len() < b.min_encoded {
                    return Err(ValueError::insufficient(b.min_encoded, rest.len()));
                }
                (b.min_encoded, b.max_encoded.min(rest.len()))
            }
            None => (0, rest.len()),
        };
        let mut last_err = None;
        for span in (lo..=hi).rev() {
            let decoded = match encoder.decode(&rest[..span]) {
                Ok(d) => d,
                Err(e) => {
                    last_err = Some(e);
                    continue;
                }
            };
            match self.match_logical(&decoded, offset, constraints, true) {
                Ok(found) => {
                    return Ok(Found {
                        value: found.value,
                        skip: 0,
                        consumed: span,
                    })
                }
                Err(e) => last_err = Some(e),
            }
        }
        Err(match last_err {
            Some(e @ ValueError::ContentMismatch { .. }) => e,
            Some(e) => ValueError::mismatch(offset, 0, e.to_string()),
            None => ValueError::mismatch(offset, 0, format!("no {} span decodes", encoder.name())),
        })
    }

    fn admit(&mut self, value: Vec<u8>, encoded_len: usize) {
        let n = self.charset.char_len(&value);
        let mode = self.mode;
        let state = &mut self.state;
        state.fuzz = None;
        state.fuzzing = false;
        state.values.retain(|v| *v != value);
        state.values.insert(0, value);
        let b = &mut state.bounds;
        b.min = b.min.min(n);
        b.max = b.max.max(n);
        b.min_encoded = b.min_encoded.min(encoded_len);
        b.max_encoded = b.max_encoded.max(encoded_len);
        state.cursor.resize(state.values.len() as u128);
        state.cursor.place_after(0, mode, &mut self.rng);
    }

    /// Deterministic fuzz battery derived from `val` (charset domain).
    fn fuzz_cases(&self, val: &[u8]) -> Vec<FuzzCase> {
        let cs = self.charset;
        let b = self.state.bounds;
        let n = cs.char_len(val);
        let unit = last_char(cs, val)
            .or_else(|| cs.encode_char('A').ok())
            .unwrap_or_else(|| b"A".to_vec());
        let padded = |extra: usize| -> Vec<u8> { [val, unit.repeat(extra).as_slice()].concat() };

        let mut cases: Vec<Vec<u8>> = Vec::new();
        if !val.is_empty() {
            let mut flipped = val.to_vec();
            flipped[0] ^= 0x01;
            cases.push(flipped);
        }
        if b.max > n {
            cases.push(padded(b.max - n));
        }
        cases.push(padded(b.max.saturating_sub(n) + 1));
        cases.push(Vec::new());
        if b.min > 0 {
            cases.push(val[..cs.prefix_len(val, b.min - 1)].to_vec());
        }
        cases.push(padded((8 * b.max.max(1)).saturating_sub(n).max(1)));
        if n > 0 {
            let nul = cs.encode_char('\0').unwrap_or_else(|_| vec![0]);
            cases.push(nul.repeat(n));
        }
        if n > 1 {
            for (pair, tail) in [("%s", "%"), ("%n", "%"), ("\r\n", "\r")] {
                let mut s = pair.repeat(n / 2);
                if n % 2 == 1 {
                    s.push_str(tail);
                }
                if let Ok(e) = cs.encode_str(&s) {
                    cases.push(e);
                }
            }
        }
        if !self.case_sensitive {
            cases.push(
                val.iter()
                    .map(|c| {
                        if c.is_ascii_lowercase() {
                            c.to_ascii_uppercase()
                        } else {
                            c.to_ascii_lowercase()
                        }
                    })
                    .collect(),
            );
        }
        cases.push(cs.boundary_case(val));
        cases.extend(self.extra_fuzz.iter().cloned());

        let mut out: Vec<FuzzCase> = Vec::new();
        for c in cases {
            if c.as_slice() == val {
                continue;
            }
            let case = FuzzCase::Logical(c);
            if !out.contains(&case) {
                out.push(case);
            }
        }
        if let Some(enc) = &self.encoder {
            for m in enc.malformed_cases(val) {
                let case = FuzzCase::Encoded(m);
                if !out.contains(&case) {
                    out.push(case);
                }
            }
        }
        out
    }
}

fn populate<R: Rng + ?Sized>(pool: &[char], min: usize, max: usize, rng: &mut R) -> Vec<String> {
    let sample = |len: usize, rng: &mut R| -> String {
        (0..len).map(|_| pool[rng.gen_range(0..pool.len())]).collect()
    };
    let mut out = vec![sample(max, &mut *rng)];
    let shortest = sample(min, &mut *rng);
    if !out.contains(&shortest) {
        out.push(shortest);
    }
    for _ in 0..3 {
        let len = rng.gen_range(min..=max);
        let s = sample(len, &mut *rng);
        if !out.contains(&s) {
            out.push(s);
        }
    }
    out
}

fn last_char(cs: Charset, val: &[u8]) -> Option<Vec<u8>> {
    let mut pos = 0;
    let mut last = None;
    while let Some((_, n)) = cs.next_char(&val[pos..]) {
        last = Some(val[pos..pos + n].to_vec());
        pos += n;
    }
    last
}

fn starts_with(hay: &[u8], needle: &[u8], case_sensitive: bool) -> bool {
    hay.len() >= needle.len()
        && if case_sensitive {
            hay[..needle.len()] == *needle
        } else {
            hay[..needle.len()].eq_ignore_ascii_case(needle)
        }
}

fn find(hay: &[u8], needle: &[u8], case_sensitive: bool) -> Option<usize> {
    (0..=hay.len().checked_sub(needle.len())?).find(|&i| starts_with(&hay[i..], needle, case_sensitive))
}

impl TypedValue for StringValue {
    fn draw(&mut self) -> Vec<u8> {
        let mode = self.mode;
        if self.state.fuzzing {
            if let Some(walk) = self.state.fuzz.as_mut() {
                let idx = walk.cursor.draw(mode, &mut self.rng);
                let case = walk.cases[idx as usize].clone();
                return self.emit(&case);
            }
        }
        let idx = self.state.cursor.draw(mode, &mut self.rng);
        tracing::trace!(index = %idx, exhausted = self.state.cursor.is_exhausted(), "string draw");
        let v = self.state.values[idx as usize].clone();
        self.encode(&v)
    }

    fn rewind(&mut self) -> bool {
        match (self.state.fuzzing, self.state.fuzz.as_mut()) {
            (true, Some(walk)) => walk.cursor.rewind(),
            _ => self.state.cursor.rewind(),
        }
    }

    fn reset_state(&mut self) {
        self.state.cursor.reset();
        self.state.fuzz = None;
        self.state.fuzzing = false;
    }

    fn switch_mode(&mut self) -> bool {
        if self.state.fuzzing {
            self.state.fuzzing = false;
            tracing::debug!("string back to normal mode");
            return false;
        }
        if self.state.fuzz.is_none() {
            let cases = self.fuzz_cases(&self.current_logical());
            if cases.is_empty() {
                return false;
            }
            let mut cursor = Cursor::new(cases.len() as u128);
            if self.mode == Mode::Random {
                cursor.shuffle(&mut self.rng);
            }
            self.state.fuzz = Some(FuzzWalk { cases, cursor });
        }
        self.state.fuzzing = true;
        tracing::debug!("string in fuzz mode");
        true
    }

    fn fuzz_mode(&self) -> bool {
        self.state.fuzzing
    }

    fn is_exhausted(&self) -> bool {
        match (self.state.fuzzing, self.state.fuzz.as_ref()) {
            (true, Some(walk)) => walk.cursor.is_exhausted(),
            _ => self.state.cursor.is_exhausted(),
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
        self.state.cursor.shuffle(&mut self.rng);
        if let Some(walk) = self.state.fuzz.as_mut() {
            walk.cursor.shuffle(&mut self.rng);
        }
    }

    fn current_raw_value(&self) -> RawValue {
        RawValue::Bytes(self.current_logical())
    }

    fn current_bytes(&self) -> Vec<u8> {
        match self.drawn_fuzz_case() {
            Some(case) => self.emit(case),
            None => self.encode(&self.current_logical()),
        }
    }

    fn pretty_print(&self, max_len: Option<usize>) -> String {
        let logical = self.current_logical();
        let shown = match self.charset.decode(&logical) {
            Ok(text) => format!("{:?}", text),
            Err(_) => format!("0x{}", hex::encode(&logical)),
        };
        let mut s = format!("{} [{}]", shown, self.charset.name());
        if let Some(enc) = &self.encoder {
            s.push_str(&format!(" -{}-> 0x{}", enc.name(), hex::encode(self.current_bytes())));
        }
        if self.state.fuzzing {
            s.push_str(" [fuzz]");
        }
        truncate_display(s, max_len)
    }
}

impl Absorb for StringValue {
    type State = StringState;

    fn stage(&self) -> Snapshot<StringState> {
        Snapshot::new(self.state.clone())
    }

    fn attempt(
        &mut self,
        _staged: &Snapshot<StringState>,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Absorbed, ValueError> {
        let rest = blob.get(offset..).unwrap_or(&[]);
        if let Some(sz) = size {
            if sz > rest.len() {
                return Err(ValueError::insufficient(sz, rest.len()));
            }
        }
        let found = match self.encoder.clone() {
            Some(enc) => self.match_encoded(enc.as_ref(), rest, offset, constraints, size)?,
            None => {
                let w = match size {
                    Some(sz) => &rest[..sz],
                    None => rest,
                };
                self.match_logical(w, offset, constraints, size.is_some())?
            }
        };
        let bytes = rest[found.skip..found.skip + found.consumed].to_vec();
        self.admit(found.value, found.consumed);
        tracing::debug!(offset = offset + found.skip, consumed = found.consumed, "string absorbed");
        Ok(Absorbed {
            bytes,
            offset: offset + found.skip,
            size: found.consumed,
        })
    }

    fn revert(&mut self, snapshot: Snapshot<StringState>) {
        self.state = snapshot.into_state();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn find_respects_case_flag() {
        assert_eq!(find(b"xxABCx", b"abc", false), Some(2));
        assert_eq!(find(b"xxABCx", b"abc", true), None);
        assert_eq!(find(b"ab", b"abc", true), None);
    }

    #[test]
    fn populate_has_both_extremes() {
        let mut rng = rng_from(Some(5));
        let pool: Vec<char> = "xyz".chars().collect();
        let out = populate(&pool, 2, 6, &mut rng);
        assert_eq!(out[0].chars().count(), 6);
        assert_eq!(out[1].chars().count(), 2);
        assert!(out.len() <= 5);
        assert!(out.iter().all(|s| s.chars().all(|c| pool.contains(&c))));
    }

    #[test]
    fn populate_fixed_size_still_samples() {
        let mut rng = rng_from(Some(9));
        let pool: Vec<char> = ('a'..='z').collect();
        let out = populate(&pool, 4, 4, &mut rng);
        assert!(out.len() >= 3, "{:?}", out);
        assert!(out.iter().all(|s| s.chars().count() == 4));
    }
}
