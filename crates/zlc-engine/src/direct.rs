// SPDX-License-Identifier: LGPL-3.0-or-later

//! Direct-form head convolver (partition 0).
//!
//! The first `N` taps of the impulse response run as a plain FIR inline
//! on the audio thread, one output sample per input sample. This is what
//! makes the engine zero-latency: the head's contribution to output time
//! `t` is computed within the same `process` call that consumed input
//! sample `t`, while every FFT partition has at least half a window of
//! slack before its contribution is read.
//!
//! For a window this small the direct form is also cheaper than the
//! FFT round-trip it would otherwise take.

use crate::ring::SampleRing;
use std::sync::Arc;

/// Time-domain FIR over the head slice of the impulse response.
#[derive(Debug)]
pub struct DirectConvolver {
    taps: Vec<f32>,
    x: Arc<SampleRing>,
    y: Arc<SampleRing>,
    out_ptr: usize,
    window: Vec<f32>,
}

impl DirectConvolver {
    /// Create the head convolver.
    ///
    /// # Arguments
    /// * `taps` - The head coefficients `h[0 .. W0/2]` (or fewer for a
    ///   short IR)
    /// * `offset` - Starting output offset in the IR (0 for the head)
    /// * `x` - Shared input ring
    /// * `y` - Shared output ring
    pub fn new(taps: Vec<f32>, offset: usize, x: Arc<SampleRing>, y: Arc<SampleRing>) -> Self {
        let window = vec![0.0; taps.len()];
        Self {
            taps,
            x,
            y,
            out_ptr: offset,
            window,
        }
    }

    /// Number of taps in the head.
    pub fn len(&self) -> usize {
        self.taps.len()
    }

    /// True when the head holds no taps.
    pub fn is_empty(&self) -> bool {
        self.taps.is_empty()
    }

    /// Compute one output sample and add it into the output ring.
    ///
    /// `in_ptr` is the input ring's write pointer *after* the current
    /// sample was stored, so the newest sample sits at `in_ptr - 1`.
    /// The accumulated sample lands at the current output offset, which
    /// then advances by one.
    pub fn process(&mut self, in_ptr: usize) {
        let m = self.x.len();

        // Gather the window newest-first so it lines up with the taps.
        let mut idx = (in_ptr + m - 1) % m;
        for slot in self.window.iter_mut() {
            *slot = self.x.load(idx);
            idx = if idx == 0 { m - 1 } else { idx - 1 };
        }

        let sample = zlc_dsp::convolution::dot(&self.taps, &self.window);
        self.y.add(self.out_ptr, sample);
        self.out_ptr = (self.out_ptr + 1) % self.y.len();
    }
}
