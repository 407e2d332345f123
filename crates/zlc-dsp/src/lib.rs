// SPDX-License-Identifier: LGPL-3.0-or-later

//! # zlc-dsp
//!
//! Low-level DSP primitives shared by the zero-latency convolution engine.
//!
//! This crate provides the numeric building blocks:
//!
//! - **FFT**: cached forward/inverse transforms on split real/imaginary
//!   arrays, backed by [`rustfft`]
//! - **Complex**: split-array complex arithmetic for frequency-domain
//!   filtering
//! - **Convolution**: direct time-domain kernels for short FIR heads and
//!   for test references
//!
//! Everything here is allocation-free on the processing path; buffers are
//! provided by the caller or pre-allocated at setup time.

pub mod complex;
pub mod convolution;
pub mod fft;
