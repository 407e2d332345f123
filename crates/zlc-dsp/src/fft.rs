// SPDX-License-Identifier: LGPL-3.0-or-later

//! FFT operations using `rustfft` as the backend.
//!
//! The engine transforms windows of size `2^k · N` where `N` derives from
//! the host block size, so transform sizes are *not* restricted to powers
//! of two; `rustfft`'s mixed-radix planner handles arbitrary sizes.
//!
//! Conventions:
//! - Frequency-domain data is kept as separate real/imaginary arrays
//!   (unlike rustfft's interleaved `Complex`), the format the convolution
//!   kernels in [`crate::complex`] operate on.
//! - The inverse transform is **not** normalized; callers fold the `1/n`
//!   scale into their output stage or call [`normalize`].

use num_complex::Complex;
use rustfft::{Fft, FftPlanner};
use std::sync::Arc;

/// Cached FFT state for allocation-free repeated transforms.
///
/// Holds pre-planned forward/inverse FFT instances and a reusable scratch
/// buffer so that hot-path code (the per-partition convolvers) can run
/// transforms without per-call heap allocation. `rustfft` plans are
/// `Send + Sync`, so the state may live inside a worker-owned mutex.
///
/// # Examples
/// ```
/// use zlc_dsp::fft::FftState;
///
/// let mut state = FftState::new(192); // 2 * 96, not a power of two
/// let src_re = vec![0.0f32; 192];
/// let src_im = vec![0.0f32; 192];
/// let mut dst_re = vec![0.0f32; 192];
/// let mut dst_im = vec![0.0f32; 192];
/// state.direct(&mut dst_re, &mut dst_im, &src_re, &src_im);
/// ```
#[derive(Clone)]
pub struct FftState {
    n: usize,
    fwd: Arc<dyn Fft<f32>>,
    inv: Arc<dyn Fft<f32>>,
    buf: Vec<Complex<f32>>,
}

impl std::fmt::Debug for FftState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftState")
            .field("n", &self.n)
            .finish_non_exhaustive()
    }
}

impl FftState {
    /// Create a new FFT state for transforms of `size` points.
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let fwd = planner.plan_fft_forward(size);
        let inv = planner.plan_fft_inverse(size);
        let buf = vec![Complex::new(0.0, 0.0); size];
        Self {
            n: size,
            fwd,
            inv,
            buf,
        }
    }

    /// Return the transform size this state was created for.
    pub fn size(&self) -> usize {
        self.n
    }

    /// Perform a forward FFT using cached plans and scratch buffer.
    ///
    /// # Arguments
    /// - `dst_re`, `dst_im` -- output (length >= `size`)
    /// - `src_re`, `src_im` -- input  (length >= `size`)
    pub fn direct(
        &mut self,
        dst_re: &mut [f32],
        dst_im: &mut [f32],
        src_re: &[f32],
        src_im: &[f32],
    ) {
        let n = self.n;
        assert!(src_re.len() >= n && src_im.len() >= n);
        assert!(dst_re.len() >= n && dst_im.len() >= n);

        for i in 0..n {
            self.buf[i] = Complex::new(src_re[i], src_im[i]);
        }

        self.fwd.process(&mut self.buf);

        for i in 0..n {
            dst_re[i] = self.buf[i].re;
            dst_im[i] = self.buf[i].im;
        }
    }

    /// Perform an inverse FFT using cached plans and scratch buffer.
    ///
    /// Note: the output is **not** normalized (scaled by `size`).
    /// Call [`normalize`] afterwards, or fold `1/size` into the output
    /// stage as the convolvers do.
    pub fn inverse(
        &mut self,
        dst_re: &mut [f32],
        dst_im: &mut [f32],
        src_re: &[f32],
        src_im: &[f32],
    ) {
        let n = self.n;
        assert!(src_re.len() >= n && src_im.len() >= n);
        assert!(dst_re.len() >= n && dst_im.len() >= n);

        for i in 0..n {
            self.buf[i] = Complex::new(src_re[i], src_im[i]);
        }

        self.inv.process(&mut self.buf);

        for i in 0..n {
            dst_re[i] = self.buf[i].re;
            dst_im[i] = self.buf[i].im;
        }
    }
}

/// Normalize FFT output by dividing by `size` (in-place).
///
/// This is the `1/n` scaling needed after an inverse transform.
pub fn normalize(re: &mut [f32], im: &mut [f32], size: usize) {
    let scale = 1.0 / size as f32;
    for i in 0..size {
        re[i] *= scale;
        im[i] *= scale;
    }
}
