// SPDX-License-Identifier: LGPL-3.0-or-later

//! Complex arithmetic on split real/imaginary arrays.
//!
//! The convolvers keep spectra as separate real and imaginary float
//! arrays (SOA layout), which vectorizes better than interleaved
//! complex pairs for the bin-wise filter multiply.

use multiversion::multiversion;

/// Complex multiply: `(dst_re, dst_im) = (a_re, a_im) * (b_re, b_im)`.
///
/// Applies a frequency-domain filter `b` to a spectrum `a` bin by bin.
/// Processes `min(dst_re.len(), dst_im.len())` bins.
#[multiversion(targets("x86_64+avx2+fma", "x86_64+avx", "x86_64+sse4.1", "aarch64+neon",))]
pub fn complex_mul(
    dst_re: &mut [f32],
    dst_im: &mut [f32],
    a_re: &[f32],
    a_im: &[f32],
    b_re: &[f32],
    b_im: &[f32],
) {
    for i in 0..dst_re.len().min(dst_im.len()) {
        let ar = a_re[i];
        let ai = a_im[i];
        let br = b_re[i];
        let bi = b_im[i];
        dst_re[i] = ar * br - ai * bi;
        dst_im[i] = ar * bi + ai * br;
    }
}
