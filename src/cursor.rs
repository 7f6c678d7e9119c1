//! Index-space enumeration shared by every typed value.
//!
//! A [`Cursor`] never sees candidate values. It hands out positions in `[0, len)` and the
//! owning value maps a position to a list entry (`list[i]`) or an interval point
//! (`min + i`). Keeping the walk separate from the values means one implementation of
//! exhaustion, wrap-around, random order and rewind serves integers, strings and the
//! fuzz spaces alike.
//!
//! ## Orders
//!
//! - **Determinist**: `start, start + 1, ...` modulo `len` (`start` is 0 unless a range
//!   value was configured with a default).
//! - **Random**: every round draws through a fresh affine permutation
//!   `i -> (mul * i + add) mod len` with `gcd(mul, len) = 1`, so each position is drawn
//!   exactly once per round without storing the already-drawn set.
//!
//! A round ends after `len` draws; the draw that ends it reports exhaustion and the next
//! draw starts a new round.

use rand::Rng;
use serde::{Deserialize, Serialize};

/// Enumeration order of a typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Mode {
    #[default]
    Determinist,
    Random,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Permutation {
    mul: u128,
    add: u128,
}

impl Permutation {
    const IDENTITY: Permutation = Permutation { mul: 1, add: 0 };

    fn random<R: Rng + ?Sized>(len: u128, rng: &mut R) -> Self {
        if len <= 1 {
            return Permutation::IDENTITY;
        }
        let mut mul = rng.gen_range(1..len);
        while gcd(mul, len) != 1 {
            mul = rng.gen_range(1..len);
        }
        Permutation {
            mul,
            add: rng.gen_range(0..len),
        }
    }

    fn apply(&self, step: u128, len: u128) -> u128 {
        (mul_mod(self.mul, step, len) + self.add % len) % len
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Position {
    step: u128,
    exhausted: bool,
    last: Option<u128>,
}

impl Position {
    const INITIAL: Position = Position {
        step: 0,
        exhausted: false,
        last: None,
    };
}

/// Walk state over `[0, len)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    len: u128,
    start: u128,
    order: Permutation,
    pos: Position,
    history: Option<(Position, Permutation)>,
}

impl Cursor {
    pub fn new(len: u128) -> Self {
        Self::starting_at(len, 0)
    }

    /// Determinist walks begin at `start` instead of 0.
    pub fn starting_at(len: u128, start: u128) -> Self {
        assert!(len > 0, "cursor over an empty space");
        Cursor {
            len,
            start: start % len,
            order: Permutation::IDENTITY,
            pos: Position::INITIAL,
            history: None,
        }
    }

    pub fn len(&self) -> u128 {
        self.len
    }

    pub fn is_exhausted(&self) -> bool {
        self.pos.exhausted
    }

    /// Position handed out by the latest draw (or set by [`Cursor::place_after`]).
    pub fn last(&self) -> Option<u128> {
        self.pos.last
    }

    /// Number of draws made in the current round.
    pub fn step(&self) -> u128 {
        self.pos.step
    }

    /// Position the next draw would return, without drawing.
    pub fn peek(&self, mode: Mode) -> u128 {
        self.index_at(self.pos.step, mode)
    }

    fn index_at(&self, step: u128, mode: Mode) -> u128 {
        match mode {
            Mode::Determinist => (self.start + step) % self.len,
            Mode::Random => self.order.apply(step, self.len),
        }
    }

    /// Advance and return the drawn position. Sets the exhaustion flag on the draw that
    /// completes a round; a fresh random order is picked for the next round.
    pub fn draw<R: Rng + ?Sized>(&mut self, mode: Mode, rng: &mut R) -> u128 {
        self.history = Some((self.pos, self.order));
        let idx = self.index_at(self.pos.step, mode);
        self.pos.last = Some(idx);
        self.pos.step += 1;
        if self.pos.step >= self.len {
            self.pos.step = 0;
            self.pos.exhausted = true;
            if mode == Mode::Random {
                self.order = Permutation::random(self.len, rng);
            }
        } else {
            self.pos.exhausted = false;
        }
        idx
    }

    /// Undo the latest draw. Returns false when there is nothing to undo.
    pub fn rewind(&mut self) -> bool {
        match self.history.take() {
            Some((pos, order)) => {
                self.pos = pos;
                self.order = order;
                true
            }
            None => false,
        }
    }

    /// Back to the just-constructed walk position (the random order is kept).
    pub fn reset(&mut self) {
        self.pos = Position::INITIAL;
        self.history = None;
    }

    pub fn shuffle<R: Rng + ?Sized>(&mut self, rng: &mut R) {
        self.order = Permutation::random(self.len, rng);
    }

    /// The candidate space changed size. Drops rewind history; a random order that is no
    /// longer a permutation of the new length falls back to identity until the next round.
    pub fn resize(&mut self, len: u128) {
        assert!(len > 0, "cursor over an empty space");
        self.len = len;
        self.start %= len;
        if gcd(self.order.mul, len) != 1 {
            self.order = Permutation::IDENTITY;
        }
        self.pos.step %= len;
        if self.pos.last.is_some_and(|l| l >= len) {
            self.pos.last = None;
        }
        self.history = None;
    }

    /// Move the determinist starting position; the current round is left as it is.
    pub fn set_start(&mut self, start: u128) {
        self.start = start % self.len;
    }

    /// Mark `idx` as the value just produced (absorption). A determinist walk continues
    /// right after it; a random walk starts a fresh round in a new order.
    pub fn place_after<R: Rng + ?Sized>(&mut self, idx: u128, mode: Mode, rng: &mut R) {
        let step = match mode {
            Mode::Determinist => {
                let rel = (idx % self.len + self.len - self.start) % self.len;
                (rel + 1) % self.len
            }
            Mode::Random => {
                self.order = Permutation::random(self.len, rng);
                0
            }
        };
        self.pos = Position {
            step,
            exhausted: false,
            last: Some(idx % self.len),
        };
        self.history = None;
    }
}

fn gcd(mut a: u128, mut b: u128) -> u128 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

fn mul_mod(a: u128, b: u128, m: u128) -> u128 {
    let (a, b) = (a % m, b % m);
    if let Some(p) = a.checked_mul(b) {
        return p % m;
    }
    let mut result = 0u128;
    let mut base = a;
    let mut exp = b;
    while exp > 0 {
        if exp & 1 == 1 {
            result = add_mod(result, base, m);
        }
        base = add_mod(base, base, m);
        exp >>= 1;
    }
    result
}

fn add_mod(a: u128, b: u128, m: u128) -> u128 {
    if a >= m - b {
        a - (m - b)
    } else {
        a + b
    }
}
