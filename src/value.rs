//! The typed-value contract shared by integers, strings and bit fields.

use crate::absorb::{Absorb, AbsorbConstraints, Absorbed, Snapshot};
use crate::bitfield::{BitField, BitFieldState};
use crate::codec::ValueError;
use crate::cursor::Mode;
use crate::int::{IntState, IntValue};
use crate::string::{StringState, StringValue};
use std::fmt;

/// A drawn value before byte encoding.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RawValue {
    Int(i128),
    Bytes(Vec<u8>),
    /// Packed bit field content without padding.
    Bits(u128),
}

impl RawValue {
    pub fn as_i128(&self) -> Option<i128> {
        match self {
            RawValue::Int(v) => Some(*v),
            RawValue::Bits(v) => i128::try_from(*v).ok(),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_u128(&self) -> Option<u128> {
        match self {
            RawValue::Int(v) => u128::try_from(*v).ok(),
            RawValue::Bits(v) => Some(*v),
            RawValue::Bytes(_) => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            RawValue::Bytes(b) => Some(b),
            _ => None,
        }
    }

    /// Numeric values compare by value regardless of `Int`/`Bits` tagging.
    pub fn same_as(&self, other: &RawValue) -> bool {
        match (self, other) {
            (RawValue::Bytes(a), RawValue::Bytes(b)) => a == b,
            (RawValue::Bytes(_), _) | (_, RawValue::Bytes(_)) => false,
            (a, b) => match (a.as_i128(), b.as_i128()) {
                (Some(x), Some(y)) => x == y,
                _ => a.as_u128().is_some() && a.as_u128() == b.as_u128(),
            },
        }
    }
}

/// Operations every typed value exposes to the graph and mutation layers.
pub trait TypedValue: Clone + fmt::Debug {
    /// Next value's canonical byte encoding; advances the enumeration.
    fn draw(&mut self) -> Vec<u8>;

    /// Undo the latest `draw`. Returns false (and does nothing) without a prior draw.
    fn rewind(&mut self) -> bool;

    /// Back to the just-constructed enumeration position; configuration is kept.
    fn reset_state(&mut self);

    /// Toggle between the normal and the fuzz candidate space. Returns whether the value
    /// is now in fuzz mode; values without a fuzz space return false.
    fn switch_mode(&mut self) -> bool {
        false
    }

    fn fuzz_mode(&self) -> bool {
        false
    }

    fn is_exhausted(&self) -> bool;

    fn mode(&self) -> Mode;

    fn make_determinist(&mut self);

    fn make_random(&mut self);

    /// Drawn value without advancing (before any draw: the value the next draw yields).
    fn current_raw_value(&self) -> RawValue;

    /// Canonical encoding of [`TypedValue::current_raw_value`].
    fn current_bytes(&self) -> Vec<u8>;

    /// Human-readable form, cut to `max_len` characters when given.
    fn pretty_print(&self, max_len: Option<usize>) -> String;
}

/// Cut `s` to `max_len` characters, marking the cut with `...`.
pub(crate) fn truncate_display(s: String, max_len: Option<usize>) -> String {
    match max_len {
        Some(n) if s.chars().count() > n => {
            if n <= 3 {
                s.chars().take(n).collect()
            } else {
                let mut out: String = s.chars().take(n - 3).collect();
                out.push_str("...");
                out
            }
        }
        _ => s,
    }
}

/// Any leaf value, for graph layers storing heterogeneous leaves.
#[derive(Debug, Clone)]
pub enum AnyValue {
    Int(IntValue),
    Str(StringValue),
    BitField(BitField),
}

impl AnyValue {
    /// Bytes of the current value before any string encoder is applied.
    pub fn logical_bytes(&self) -> Vec<u8> {
        match self {
            AnyValue::Str(s) => s.current_logical(),
            other => other.current_bytes(),
        }
    }

    pub fn as_int(&self) -> Option<&IntValue> {
        match self {
            AnyValue::Int(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&StringValue> {
        match self {
            AnyValue::Str(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_bitfield(&self) -> Option<&BitField> {
        match self {
            AnyValue::BitField(v) => Some(v),
            _ => None,
        }
    }
}

impl From<IntValue> for AnyValue {
    fn from(v: IntValue) -> Self {
        AnyValue::Int(v)
    }
}

impl From<StringValue> for AnyValue {
    fn from(v: StringValue) -> Self {
        AnyValue::Str(v)
    }
}

impl From<BitField> for AnyValue {
    fn from(v: BitField) -> Self {
        AnyValue::BitField(v)
    }
}

macro_rules! delegate {
    ($self:expr, $v:ident => $e:expr) => {
        match $self {
            AnyValue::Int($v) => $e,
            AnyValue::Str($v) => $e,
            AnyValue::BitField($v) => $e,
        }
    };
}

impl TypedValue for AnyValue {
    fn draw(&mut self) -> Vec<u8> {
        delegate!(self, v => v.draw())
    }

    fn rewind(&mut self) -> bool {
        delegate!(self, v => v.rewind())
    }

    fn reset_state(&mut self) {
        delegate!(self, v => v.reset_state())
    }

    fn switch_mode(&mut self) -> bool {
        delegate!(self, v => v.switch_mode())
    }

    fn fuzz_mode(&self) -> bool {
        delegate!(self, v => v.fuzz_mode())
    }

    fn is_exhausted(&self) -> bool {
        delegate!(self, v => v.is_exhausted())
    }

    fn mode(&self) -> Mode {
        delegate!(self, v => v.mode())
    }

    fn make_determinist(&mut self) {
        delegate!(self, v => v.make_determinist())
    }

    fn make_random(&mut self) {
        delegate!(self, v => v.make_random())
    }

    fn current_raw_value(&self) -> RawValue {
        delegate!(self, v => v.current_raw_value())
    }

    fn current_bytes(&self) -> Vec<u8> {
        delegate!(self, v => v.current_bytes())
    }

    fn pretty_print(&self, max_len: Option<usize>) -> String {
        delegate!(self, v => v.pretty_print(max_len))
    }
}

/// Snapshot state of an [`AnyValue`], tagged by the variant it was taken from.
#[derive(Debug, PartialEq)]
pub enum AnyState {
    Int(Snapshot<IntState>),
    Str(Snapshot<StringState>),
    BitField(Snapshot<BitFieldState>),
}

impl Absorb for AnyValue {
    type State = AnyState;

    fn stage(&self) -> Snapshot<AnyState> {
        let state = match self {
            AnyValue::Int(v) => AnyState::Int(v.stage()),
            AnyValue::Str(v) => AnyState::Str(v.stage()),
            AnyValue::BitField(v) => AnyState::BitField(v.stage()),
        };
        Snapshot::new(state)
    }

    fn attempt(
        &mut self,
        staged: &Snapshot<AnyState>,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Absorbed, ValueError> {
        match (self, staged.state()) {
            (AnyValue::Int(v), AnyState::Int(s)) => v.attempt(s, blob, offset, constraints, size),
            (AnyValue::Str(v), AnyState::Str(s)) => v.attempt(s, blob, offset, constraints, size),
            (AnyValue::BitField(v), AnyState::BitField(s)) => v.attempt(s, blob, offset, constraints, size),
            (value, _) => panic!("snapshot taken from another variant than {}", value.pretty_print(Some(40))),
        }
    }

    fn revert(&mut self, snapshot: Snapshot<AnyState>) {
        match (self, snapshot.into_state()) {
            (AnyValue::Int(v), AnyState::Int(s)) => v.revert(s),
            (AnyValue::Str(v), AnyState::Str(s)) => v.revert(s),
            (AnyValue::BitField(v), AnyState::BitField(s)) => v.revert(s),
            (value, _) => panic!("snapshot taken from another variant than {}", value.pretty_print(Some(40))),
        }
    }
}
