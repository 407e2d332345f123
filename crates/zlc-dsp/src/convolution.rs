// SPDX-License-Identifier: LGPL-3.0-or-later

//! Direct time-domain convolution kernels.
//!
//! Provides O(N*M) convolution of two signals, used as the reference in
//! accuracy tests, and the tap-accumulation kernel the head partition
//! runs once per sample on the audio thread. For long kernels the engine
//! switches to FFT partitions; these stay cheaper below ~64 taps.

use multiversion::multiversion;

/// Compute the linear convolution of `src` with kernel `kernel`, writing
/// the result to `dst`.
///
/// The output length is `src.len() + kernel.len() - 1`. If `dst` is
/// shorter, only the first `dst.len()` samples are written. If `dst` is
/// longer than the full convolution length, the remaining samples are
/// set to zero.
///
/// # Arguments
/// * `dst` - Output buffer
/// * `src` - Input signal
/// * `kernel` - Convolution kernel (impulse response)
///
/// # Examples
/// ```
/// use zlc_dsp::convolution::convolve;
///
/// let signal = [1.0f32, 0.0, 0.0, 0.0];
/// let kernel = [1.0f32, 0.5, 0.25];
/// let mut output = [0.0f32; 6];
/// convolve(&mut output, &signal, &kernel);
/// assert!((output[0] - 1.0).abs() < 1e-6);
/// assert!((output[1] - 0.5).abs() < 1e-6);
/// assert!((output[2] - 0.25).abs() < 1e-6);
/// ```
pub fn convolve(dst: &mut [f32], src: &[f32], kernel: &[f32]) {
    if src.is_empty() || kernel.is_empty() {
        dst.fill(0.0);
        return;
    }

    let full_len = src.len() + kernel.len() - 1;
    let out_len = dst.len().min(full_len);

    dst[..out_len].fill(0.0);
    if dst.len() > full_len {
        dst[full_len..].fill(0.0);
    }

    for (i, &x) in src.iter().enumerate() {
        if x == 0.0 {
            continue;
        }
        for (j, &h) in kernel.iter().enumerate() {
            let idx = i + j;
            if idx >= out_len {
                break;
            }
            dst[idx] += x * h;
        }
    }
}

/// Dot product of two buffers: `sum(a[i] * b[i])`.
///
/// This is the inner loop of a direct-form FIR: with `a` holding the taps
/// and `b` the input window ordered newest-first, the result is one
/// output sample. Processes `min(a.len(), b.len())` elements.
#[multiversion(targets("x86_64+avx2+fma", "x86_64+avx", "x86_64+sse4.1", "aarch64+neon",))]
pub fn dot(a: &[f32], b: &[f32]) -> f32 {
    let mut acc = 0.0f32;
    for (&x, &y) in a.iter().zip(b.iter()) {
        acc += x * y;
    }
    acc
}
