//! # protoval: typed values for a model-based fuzzer
//!
//! Leaf values of a data-model graph: each one owns a candidate space and an enumeration
//! cursor, emits bytes on `draw()`, and can parse bytes back (absorption) so a captured
//! sample can be turned into a starting point for mutation.
//!
//! ## Value families
//!
//! - **Integers** ([`IntValue`]): every binary width/sign/byte order ([`int::INT_KINDS`]),
//!   text integers in a base from 2 to 16, fuzzy boundary presets.
//! - **Strings** ([`StringValue`]): charset ([`Charset`]), optional alphabet, logical and
//!   encoded size bounds, pluggable [`Encoder`]s (GSM 7-bit, BCD phone numbers, base64,
//!   hex, framing).
//! - **Bit fields** ([`BitField`]): integer subfields packed at the bit level and padded to
//!   a byte boundary.
//!
//! Every family implements [`TypedValue`] (draw, rewind, fuzz mode, exhaustion) and
//! [`Absorb`], the stage / attempt / revert / cleanup transaction used while parsing.
//! [`AnyValue`] wraps the three for graphs holding heterogeneous leaves.
//!
//! ## Bindings
//!
//! [`binding`] derives values (lengths, counts, checksums, offsets, copies) and gates
//! (existence, size, repetitions) from other nodes of an external [`Structure`], in
//! dependency order.
//!
//! ## Example
//!
//! ```
//! use protoval::{IntConfig, IntValue, TypedValue};
//! use protoval::int::UINT16_BE;
//!
//! let mut v = IntValue::new(
//!     UINT16_BE,
//!     IntConfig { values: Some(vec![0x0102, 7]), ..IntConfig::default() },
//! )
//! .unwrap();
//! assert_eq!(v.draw(), vec![0x01, 0x02]);
//! assert_eq!(v.draw(), vec![0x00, 0x07]);
//! assert!(v.is_exhausted());
//! ```

pub mod absorb;
pub mod binding;
pub mod bitfield;
pub mod codec;
pub mod cursor;
pub mod encoder;
pub mod int;
pub mod string;
pub mod value;

pub use absorb::{try_absorb, Absorb, AbsorbConstraints, Absorbed, Snapshot};
pub use binding::{
    Binding, BindingEffect, BindingResolver, BindingScope, Checksum, Condition, CopySource, NodeId,
    Structure,
};
pub use bitfield::{BitField, BitFieldConfig, PadBit, SubfieldSpec};
pub use codec::{Endianness, ValueError};
pub use cursor::{Cursor, Mode};
pub use encoder::{Charset, Encoder, EncoderSpec};
pub use int::{IntConfig, IntFormat, IntKind, IntSpace, IntValue, TextFormat};
pub use string::{StringConfig, StringValue};
pub use value::{AnyValue, RawValue, TypedValue};
