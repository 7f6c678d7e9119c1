//! Absorption: parsing bytes back into a typed value, as a reversible transaction.
//!
//! A grammar trying several structural alternatives at one offset needs every leaf it
//! touched to be restorable. Each absorption is therefore a four-step transaction:
//!
//! 1. [`Absorb::stage`] copies the value's mutable enumeration state into a [`Snapshot`].
//! 2. [`Absorb::attempt`] parses optimistically (e.g. moves the observed value to the front
//!    of the candidate list) and reports success or a recoverable error.
//! 3. [`Absorb::revert`] consumes the snapshot and restores the value exactly.
//! 4. [`Absorb::cleanup`] consumes the snapshot once the enclosing structure is confirmed.
//!
//! A [`Snapshot`] can only be produced by `stage`, is not `Clone`, and is consumed by
//! `revert`/`cleanup`, so reverting without staging or committing twice does not compile.
//!
//! ```ignore
//! let snap = value.stage();
//! match value.attempt(&snap, blob, off, &AbsorbConstraints::full(), None) {
//!     Ok(done) => { /* continue parsing at done.offset + done.size */ value.cleanup(snap) }
//!     Err(e) if e.is_recoverable() => value.revert(snap),
//!     Err(e) => return Err(e),
//! }
//! ```

use crate::codec::ValueError;
use crate::value::TypedValue;
use std::fmt;

/// Which properties of the input must match during absorption.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AbsorbConstraints {
    /// Value must belong to the candidate space (list, interval, alphabet, subfield spaces,
    /// padding pattern).
    pub contents: bool,
    /// Size must be within the declared bounds.
    pub size: bool,
    /// String values with an absorption regex must match it.
    pub regexp: bool,
    /// The consumed span must start at the requested offset (no forward search).
    pub structure: bool,
}

impl AbsorbConstraints {
    pub const fn full() -> Self {
        AbsorbConstraints {
            contents: true,
            size: true,
            regexp: true,
            structure: true,
        }
    }

    pub const fn none() -> Self {
        AbsorbConstraints {
            contents: false,
            size: false,
            regexp: false,
            structure: false,
        }
    }

    pub fn with_contents(mut self, on: bool) -> Self {
        self.contents = on;
        self
    }

    pub fn with_size(mut self, on: bool) -> Self {
        self.size = on;
        self
    }

    pub fn with_regexp(mut self, on: bool) -> Self {
        self.regexp = on;
        self
    }

    pub fn with_structure(mut self, on: bool) -> Self {
        self.structure = on;
        self
    }
}

impl Default for AbsorbConstraints {
    fn default() -> Self {
        AbsorbConstraints::full()
    }
}

/// Successful absorption: the bytes consumed, where they start and how many there were.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Absorbed {
    pub bytes: Vec<u8>,
    pub offset: usize,
    pub size: usize,
}

impl Absorbed {
    /// Offset of the first byte after the consumed span.
    pub fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Opaque copy of the state an absorption attempt may mutate.
#[must_use = "a staged snapshot must be reverted or cleaned up"]
#[derive(PartialEq)]
pub struct Snapshot<S> {
    state: S,
}

impl<S> Snapshot<S> {
    pub(crate) fn new(state: S) -> Self {
        Snapshot { state }
    }

    pub(crate) fn state(&self) -> &S {
        &self.state
    }

    pub(crate) fn into_state(self) -> S {
        self.state
    }
}

impl<S: fmt::Debug> fmt::Debug for Snapshot<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Snapshot").field("state", &self.state).finish()
    }
}

/// The transaction protocol every absorbable typed value implements.
pub trait Absorb: TypedValue {
    type State: PartialEq + fmt::Debug;

    /// Copy the mutable enumeration state.
    fn stage(&self) -> Snapshot<Self::State>;

    /// Parse `blob[offset..]` under `constraints`. `size`, when given, is the exact span
    /// the caller expects to be consumed.
    fn attempt(
        &mut self,
        staged: &Snapshot<Self::State>,
        blob: &[u8],
        offset: usize,
        constraints: &AbsorbConstraints,
        size: Option<usize>,
    ) -> Result<Absorbed, ValueError>;

    /// Restore the state captured by `stage`.
    fn revert(&mut self, snapshot: Snapshot<Self::State>);

    /// Confirm the attempt; the snapshot is discarded.
    fn cleanup(&mut self, snapshot: Snapshot<Self::State>) {
        drop(snapshot);
    }
}

/// Stage and attempt in one call; a failed attempt is reverted before the error is
/// returned. On success the caller keeps the snapshot to revert or clean up later.
pub fn try_absorb<V: Absorb>(
    value: &mut V,
    blob: &[u8],
    offset: usize,
    constraints: &AbsorbConstraints,
    size: Option<usize>,
) -> Result<(Absorbed, Snapshot<V::State>), ValueError> {
    let snapshot = value.stage();
    match value.attempt(&snapshot, blob, offset, constraints, size) {
        Ok(done) => Ok((done, snapshot)),
        Err(e) => {
            tracing::debug!(offset, error = %e, "absorption failed, reverting");
            value.revert(snapshot);
            Err(e)
        }
    }
}

/// Bytes available at `offset`, or `Insufficient` when `needed` exceeds them or `offset`
/// lies past the end of `blob`.
pub(crate) fn window(blob: &[u8], offset: usize, needed: usize) -> Result<&[u8], ValueError> {
    let rest = blob.get(offset..).ok_or(ValueError::insufficient(needed, 0))?;
    if rest.len() < needed {
        return Err(ValueError::insufficient(needed, rest.len()));
    }
    Ok(rest)
}
