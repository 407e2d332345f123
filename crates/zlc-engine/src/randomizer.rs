// SPDX-License-Identifier: LGPL-3.0-or-later

//! Linear Congruential Generator for synthetic impulse responses.
//!
//! Based on the recurrence `X[n+1] = (a * X[n] + c) mod 2^32` with
//! constants from Numerical Recipes (a=1664525, c=1013904223). A fixed
//! seed makes the `{random, length}` impulse source reproducible across
//! runs, which the determinism tests rely on.

/// Linear Congruential Generator for pseudorandom numbers.
#[derive(Debug, Clone)]
pub struct Randomizer {
    state: u32,
}

impl Randomizer {
    /// Create a randomizer with the given seed.
    pub fn with_seed(seed: u32) -> Self {
        Self { state: seed }
    }

    /// Generate the next random number in the sequence (raw u32).
    fn next(&mut self) -> u32 {
        const A: u32 = 1664525;
        const C: u32 = 1013904223;
        self.state = self.state.wrapping_mul(A).wrapping_add(C);
        self.state
    }

    /// Generate a uniform random value in `[0, 1)`.
    pub fn uniform(&mut self) -> f32 {
        let val = self.next();
        (val as f64 / (u32::MAX as f64 + 1.0)) as f32
    }

    /// Generate a uniform random value in `[lo, hi)`.
    pub fn uniform_in(&mut self, lo: f32, hi: f32) -> f32 {
        lo + (hi - lo) * self.uniform()
    }
}
