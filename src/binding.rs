//! Derived-value bindings between nodes of an external structure tree.
//!
//! The graph layer owns the nodes; this module only sees them through [`Structure`].
//! A [`Binding`] computes something for its `target` from one or more source nodes:
//! either a new value (length, quantity, checksum, custom function, offset, copy) or a
//! gate on the target (existence, size, repetition count).
//!
//! [`BindingResolver`] orders bindings once at construction: binding `A` must run before
//! `B` when `A`'s target lies inside one of `B`'s sources. Cycles are rejected. After
//! nodes change, [`BindingResolver::mark_dirty`] flags the affected bindings and
//! [`BindingResolver::resolve`] recomputes each dirty one once, in order, flagging its
//! dependents as it goes.

use crate::codec::ValueError;
use crate::int::{IntFormat, IntValue};
use crate::value::{AnyValue, RawValue, TypedValue};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;

/// Handle of a node owned by the graph layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u32);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a binding needs from the structure tree.
pub trait Structure {
    /// Concatenated bytes of the subtree rooted at `id`. With `encoded == false` string
    /// leaves contribute their bytes before the encoder.
    fn subtree_bytes(&self, id: NodeId, encoded: bool) -> Result<Vec<u8>, ValueError>;

    /// Byte offset of `id` inside its parent.
    fn offset_in_parent(&self, id: NodeId) -> Result<usize, ValueError>;

    /// Number of currently materialized repetitions of `id`.
    fn repetitions(&self, id: NodeId) -> Result<usize, ValueError>;

    /// Value of a leaf node; `None` for non-leaves.
    fn value(&self, id: NodeId) -> Option<&AnyValue>;

    /// Locate a node from `from` with an ancestor-relative path (e.g. `../header/len`).
    fn resolve_path(&self, from: NodeId, path: &str) -> Option<NodeId>;

    /// Whether `node` is `subtree` or lies below it.
    fn is_within(&self, node: NodeId, subtree: NodeId) -> bool;

    fn apply(&mut self, target: NodeId, effect: BindingEffect) -> Result<(), ValueError>;
}

/// What a recomputed binding does to its target.
#[derive(Debug, Clone)]
pub enum BindingEffect {
    Value(AnyValue),
    Exists(bool),
    Size(usize),
    Repetitions(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Checksum {
    /// zlib CRC-32.
    Crc32,
    /// Castagnoli CRC-32.
    Crc32c,
    Adler32,
}

impl Checksum {
    pub fn compute(&self, data: &[u8]) -> u32 {
        match self {
            Checksum::Crc32 => crc32fast::hash(data),
            Checksum::Crc32c => crc32c::crc32c(data),
            Checksum::Adler32 => adler32(data),
        }
    }
}

fn adler32(data: &[u8]) -> u32 {
    const MOD: u32 = 65521;
    // Largest n with 255 n (n + 1) / 2 + (n + 1)(MOD - 1) < 2^32.
    const NMAX: usize = 5552;
    let (mut a, mut b) = (1u32, 0u32);
    for chunk in data.chunks(NMAX) {
        for &x in chunk {
            a += u32::from(x);
            b += a;
        }
        a %= MOD;
        b %= MOD;
    }
    (b << 16) | a
}

/// Where a `Copy` binding takes its value from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopySource {
    Node(NodeId),
    /// Path relative to `from`, resolved once the whole tree exists.
    Path { from: NodeId, path: String },
}

/// Gate condition on a node's current value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Condition {
    Equals(RawValue),
    OneOf(Vec<RawValue>),
    /// `all_set`: every bit of `mask` set; otherwise any of them.
    BitTest { mask: u128, all_set: bool },
    /// Subfield `index` of a bit field holds one of `values`.
    Subfield { index: usize, values: Vec<u64> },
    Not(Box<Condition>),
}

impl Condition {
    pub fn holds(&self, value: &AnyValue) -> Result<bool, ValueError> {
        Ok(match self {
            Condition::Equals(expected) => value.current_raw_value().same_as(expected),
            Condition::OneOf(set) => {
                let raw = value.current_raw_value();
                set.iter().any(|v| raw.same_as(v))
            }
            Condition::BitTest { mask, all_set } => {
                let v = value.current_raw_value().as_u128().ok_or_else(|| {
                    ValueError::Binding(format!(
                        "bit test on non-numeric value {}",
                        value.pretty_print(Some(40))
                    ))
                })?;
                if *all_set {
                    v & mask == *mask
                } else {
                    v & mask != 0
                }
            }
            Condition::Subfield { index, values } => {
                let bf = value
                    .as_bitfield()
                    .ok_or_else(|| ValueError::Binding("subfield condition on a non bit field".into()))?;
                if *index >= bf.subfield_count() {
                    return Err(ValueError::Binding(format!(
                        "subfield {} of a {}-subfield bit field",
                        index,
                        bf.subfield_count()
                    )));
                }
                values.contains(&bf.subfield_value(*index))
            }
            Condition::Not(inner) => !inner.holds(value)?,
        })
    }
}

/// Custom derived value from concatenated source bytes.
pub type WrapFn = Arc<dyn Fn(&[u8]) -> anyhow::Result<AnyValue> + Send + Sync>;

#[derive(Clone)]
pub enum BindingScope {
    /// Byte length of `source` plus `base`.
    Length {
        source: NodeId,
        base: i128,
        encoded: bool,
        kind: IntFormat,
    },
    Quantity {
        source: NodeId,
        kind: IntFormat,
    },
    Crc {
        sources: Vec<NodeId>,
        checksum: Checksum,
        pre_encoding: bool,
        kind: IntFormat,
    },
    Wrap {
        sources: Vec<NodeId>,
        func: WrapFn,
        pre_encoding: bool,
    },
    /// Offset of `source` in its parent, plus the lengths of `preceding`, plus `base`.
    Offset {
        source: NodeId,
        preceding: Vec<NodeId>,
        base: i128,
        kind: IntFormat,
    },
    Copy {
        source: CopySource,
    },
    Existence {
        source: NodeId,
        condition: Condition,
    },
    /// Target size taken from an integer node.
    Size {
        source: NodeId,
    },
    /// Target repetition count taken from an integer node, clamped to `[min, max]`.
    QuantityFrom {
        source: NodeId,
        min: usize,
        max: Option<usize>,
    },
}

impl fmt::Debug for BindingScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BindingScope::Length {
                source,
                base,
                encoded,
                kind,
            } => f
                .debug_struct("Length")
                .field("source", source)
                .field("base", base)
                .field("encoded", encoded)
                .field("kind", &kind.name())
                .finish(),
            BindingScope::Quantity { source, kind } => f
                .debug_struct("Quantity")
                .field("source", source)
                .field("kind", &kind.name())
                .finish(),
            BindingScope::Crc {
                sources,
                checksum,
                pre_encoding,
                kind,
            } => f
                .debug_struct("Crc")
                .field("sources", sources)
                .field("checksum", checksum)
                .field("pre_encoding", pre_encoding)
                .field("kind", &kind.name())
                .finish(),
            BindingScope::Wrap {
                sources,
                pre_encoding,
                ..
            } => f
                .debug_struct("Wrap")
                .field("sources", sources)
                .field("pre_encoding", pre_encoding)
                .finish_non_exhaustive(),
            BindingScope::Offset {
                source,
                preceding,
                base,
                kind,
            } => f
                .debug_struct("Offset")
                .field("source", source)
                .field("preceding", preceding)
                .field("base", base)
                .field("kind", &kind.name())
                .finish(),
            BindingScope::Copy { source } => f.debug_struct("Copy").field("source", source).finish(),
            BindingScope::Existence { source, condition } => f
                .debug_struct("Existence")
                .field("source", source)
                .field("condition", condition)
                .finish(),
            BindingScope::Size { source } => f.debug_struct("Size").field("source", source).finish(),
            BindingScope::QuantityFrom { source, min, max } => f
                .debug_struct("QuantityFrom")
                .field("source", source)
                .field("min", min)
                .field("max", max)
                .finish(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Binding {
    pub target: NodeId,
    pub scope: BindingScope,
}

fn int_effect(kind: IntFormat, v: i128, what: &str) -> Result<BindingEffect, ValueError> {
    IntValue::constant(kind, v)
        .map(|iv| BindingEffect::Value(AnyValue::Int(iv)))
        .map_err(|e| ValueError::Binding(format!("{} {}: {}", what, v, e)))
}

fn node_value<S: Structure + ?Sized>(structure: &S, id: NodeId) -> Result<&AnyValue, ValueError> {
    structure
        .value(id)
        .ok_or_else(|| ValueError::Binding(format!("node {} has no value", id)))
}

fn node_count<S: Structure + ?Sized>(structure: &S, id: NodeId) -> Result<usize, ValueError> {
    let raw = node_value(structure, id)?.current_raw_value();
    raw.as_u128()
        .and_then(|v| usize::try_from(v).ok())
        .ok_or_else(|| ValueError::Binding(format!("node {} does not hold a count: {:?}", id, raw)))
}

fn concat<S: Structure + ?Sized>(structure: &S, ids: &[NodeId], encoded: bool) -> Result<Vec<u8>, ValueError> {
    let mut out = Vec::new();
    for id in ids {
        out.extend(structure.subtree_bytes(*id, encoded)?);
    }
    Ok(out)
}

impl Binding {
    pub fn new(target: NodeId, scope: BindingScope) -> Self {
        Binding { target, scope }
    }

    /// Source nodes, with copy paths resolved against `structure`.
    pub fn sources<S: Structure + ?Sized>(&self, structure: &S) -> Result<Vec<NodeId>, ValueError> {
        Ok(match &self.scope {
            BindingScope::Length { source, .. }
            | BindingScope::Quantity { source, .. }
            | BindingScope::Existence { source, .. }
            | BindingScope::Size { source }
            | BindingScope::QuantityFrom { source, .. } => vec![*source],
            BindingScope::Crc { sources, .. } | BindingScope::Wrap { sources, .. } => sources.clone(),
            BindingScope::Offset {
                source, preceding, ..
            } => std::iter::once(*source).chain(preceding.iter().copied()).collect(),
            BindingScope::Copy {
                source: CopySource::Node(id),
            } => vec![*id],
            BindingScope::Copy {
                source: CopySource::Path { from, path },
            } => vec![structure.resolve_path(*from, path).ok_or_else(|| {
                ValueError::config(format!("path {:?} from {} leads nowhere", path, from))
            })?],
        })
    }

    /// Compute the effect on the target from the current state of `sources` (as
    /// returned by [`Binding::sources`]).
    pub fn evaluate<S: Structure + ?Sized>(
        &self,
        structure: &S,
        sources: &[NodeId],
    ) -> Result<BindingEffect, ValueError> {
        match &self.scope {
            BindingScope::Length {
                source,
                base,
                encoded,
                kind,
            } => {
                let n = structure.subtree_bytes(*source, *encoded)?.len() as i128;
                int_effect(*kind, n + base, "length")
            }
            BindingScope::Quantity { source, kind } => {
                let n = structure.repetitions(*source)? as i128;
                int_effect(*kind, n, "quantity")
            }
            BindingScope::Crc {
                sources,
                checksum,
                pre_encoding,
                kind,
            } => {
                let data = concat(structure, sources, !pre_encoding)?;
                int_effect(*kind, i128::from(checksum.compute(&data)), "checksum")
            }
            BindingScope::Wrap {
                sources,
                func,
                pre_encoding,
            } => {
                let data = concat(structure, sources, !pre_encoding)?;
                func(&data)
                    .map(BindingEffect::Value)
                    .map_err(|e| ValueError::Binding(format!("wrap over {:?}: {:#}", sources, e)))
            }
            BindingScope::Offset {
                source,
                preceding,
                base,
                kind,
            } => {
                let mut off = structure.offset_in_parent(*source)? as i128;
                for p in preceding {
                    off += structure.subtree_bytes(*p, true)?.len() as i128;
                }
                int_effect(*kind, off + base, "offset")
            }
            BindingScope::Copy { .. } => {
                let id = *sources
                    .first()
                    .ok_or_else(|| ValueError::Binding("copy without a source".into()))?;
                Ok(BindingEffect::Value(node_value(structure, id)?.clone()))
            }
            BindingScope::Existence { source, condition } => {
                let exists = condition.holds(node_value(structure, *source)?)?;
                Ok(BindingEffect::Exists(exists))
            }
            BindingScope::Size { source } => Ok(BindingEffect::Size(node_count(structure, *source)?)),
            BindingScope::QuantityFrom { source, min, max } => {
                let n = node_count(structure, *source)?.max(*min);
                Ok(BindingEffect::Repetitions(max.map_or(n, |m| n.min(m))))
            }
        }
    }
}

/// Dependency-ordered, dirty-flag driven evaluation of a set of bindings.
#[derive(Debug)]
pub struct BindingResolver {
    bindings: Vec<Binding>,
    sources: Vec<Vec<NodeId>>,
    order: Vec<usize>,
    dependents: Vec<Vec<usize>>,
    dirty: Vec<bool>,
}

impl BindingResolver {
    pub fn new<S: Structure + ?Sized>(bindings: Vec<Binding>, structure: &S) -> Result<Self, ValueError> {
        let sources = bindings
            .iter()
            .map(|b| b.sources(structure))
            .collect::<Result<Vec<_>, _>>()?;
        let n = bindings.len();
        let mut dependents = vec![Vec::new(); n];
        let mut indegree = vec![0usize; n];
        for (a, binding) in bindings.iter().enumerate() {
            for (b, srcs) in sources.iter().enumerate() {
                // A length covering its own target reads it once per resolve.
                if a != b && srcs.iter().any(|s| structure.is_within(binding.target, *s)) {
                    dependents[a].push(b);
                    indegree[b] += 1;
                }
            }
        }
        let mut queue: VecDeque<usize> = (0..n).filter(|i| indegree[*i] == 0).collect();
        let mut order = Vec::with_capacity(n);
        while let Some(i) = queue.pop_front() {
            order.push(i);
            for &d in &dependents[i] {
                indegree[d] -= 1;
                if indegree[d] == 0 {
                    queue.push_back(d);
                }
            }
        }
        if order.len() != n {
            let stuck: Vec<NodeId> = (0..n)
                .filter(|i| indegree[*i] > 0)
                .map(|i| bindings[i].target)
                .collect();
            tracing::debug!(targets = ?stuck, "binding cycle");
            return Err(ValueError::config(format!(
                "cyclic bindings between targets {:?}",
                stuck
            )));
        }
        Ok(BindingResolver {
            bindings,
            sources,
            order,
            dependents,
            dirty: vec![true; n],
        })
    }

    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    /// Binding indexes in evaluation order.
    pub fn order(&self) -> &[usize] {
        &self.order
    }

    pub fn is_dirty(&self, index: usize) -> bool {
        self.dirty[index]
    }

    pub fn pending(&self) -> usize {
        self.dirty.iter().filter(|d| **d).count()
    }

    /// Flag every binding reading `node` (or a subtree containing it). Returns how many
    /// bindings were newly flagged.
    pub fn mark_dirty<S: Structure + ?Sized>(&mut self, structure: &S, node: NodeId) -> usize {
        let mut flagged = 0;
        for (i, srcs) in self.sources.iter().enumerate() {
            if !self.dirty[i] && srcs.iter().any(|s| structure.is_within(node, *s)) {
                self.dirty[i] = true;
                flagged += 1;
            }
        }
        flagged
    }

    /// Recompute every dirty binding once, in dependency order. Returns how many were
    /// recomputed. A failing binding stays dirty.
    pub fn resolve<S: Structure + ?Sized>(&mut self, structure: &mut S) -> Result<usize, ValueError> {
        let mut count = 0;
        for &i in &self.order {
            if !self.dirty[i] {
                continue;
            }
            let binding = &self.bindings[i];
            let effect = binding.evaluate(&*structure, &self.sources[i])?;
            tracing::debug!(node = %binding.target, scope = ?binding.scope, "binding recomputed");
            structure.apply(binding.target, effect)?;
            self.dirty[i] = false;
            for &d in &self.dependents[i] {
                self.dirty[d] = true;
            }
            count += 1;
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adler32_known_vector() {
        assert_eq!(adler32(b"Wikipedia"), 0x11E6_0398);
        assert_eq!(adler32(b""), 1);
    }

    #[test]
    fn crc_known_vectors() {
        assert_eq!(Checksum::Crc32.compute(b"123456789"), 0xCBF4_3926);
        assert_eq!(Checksum::Crc32c.compute(b"123456789"), 0xE306_9283);
    }

    #[test]
    fn adler32_large_input_stays_reduced() {
        let data = vec![0xFFu8; 100_000];
        let v = adler32(&data);
        assert!((v & 0xFFFF) < 65521);
        assert!((v >> 16) < 65521);
    }
}
