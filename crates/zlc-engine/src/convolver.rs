// SPDX-License-Identifier: LGPL-3.0-or-later

//! Per-partition FFT convolver.
//!
//! Each non-head partition owns one `FftConvolver`: the pre-transformed
//! spectrum of its slice of the impulse response, scratch buffers for
//! the per-invocation transforms, and a write cursor into the shared
//! output ring. The audio thread hands work over with [`FftConvolver::queue`]
//! (non-blocking), a worker thread executes it with [`FftConvolver::process`]:
//! gather half a window of input ending at the snapshot, forward FFT,
//! bin-wise multiply with the stored spectrum, inverse FFT, and
//! overlap-add all `W` output samples behind the global write lock.
//!
//! The write cursor is advanced by the audio thread on *every* counter
//! fire (accepted, refused, or bypassed), so a dropped window or a
//! bypassed stretch never knocks later output out of alignment.
//!
//! Spectra are full-size: both operands are FFTs of real signals, so
//! conjugate symmetry of the product holds bin by bin and the inverse
//! transform's imaginary part vanishes to rounding.

use crate::plan::Partition;
use crate::ring::SampleRing;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use zlc_dsp::fft::FftState;

/// Frequency-domain convolver for one partition of the impulse response.
pub struct FftConvolver {
    index: usize,
    fft_size: usize,
    offset: usize,
    priority: u8,
    x: Arc<SampleRing>,
    y: Arc<SampleRing>,
    write_lock: Arc<Mutex<()>>,
    /// Pre-computed spectrum of the zero-padded IR slice.
    h_re: Vec<f32>,
    h_im: Vec<f32>,
    /// Output write cursor; owned by the audio thread (see `queue`).
    out_ptr: AtomicUsize,
    state: Mutex<ConvState>,
    overruns: AtomicUsize,
    write_waits: AtomicUsize,
}

/// Worker-side state: the queued invocation plus transform scratch.
struct ConvState {
    queued: bool,
    bypass: bool,
    in_snap: usize,
    out_at: usize,
    fft: FftState,
    td_re: Vec<f32>,
    td_im: Vec<f32>,
    fd_re: Vec<f32>,
    fd_im: Vec<f32>,
}

impl FftConvolver {
    /// Create the convolver for `partition` and pre-transform its IR
    /// slice.
    ///
    /// # Arguments
    /// * `partition` - Plan entry (index, offset, window size)
    /// * `h_slice` - The partition's coefficients; exactly half the window
    /// * `x` - Shared input ring
    /// * `y` - Shared output ring
    /// * `write_lock` - Global write mutex shared by all convolvers
    /// * `priority` - Scheduling priority of this partition's worker
    ///
    /// # Panics
    /// Panics unless `partition.fft_size == 2 * h_slice.len()`.
    pub fn new(
        partition: &Partition,
        h_slice: &[f32],
        x: Arc<SampleRing>,
        y: Arc<SampleRing>,
        write_lock: Arc<Mutex<()>>,
        priority: u8,
    ) -> Self {
        let fft_size = partition.fft_size;
        assert_eq!(
            fft_size,
            2 * h_slice.len(),
            "window must be twice the partition's coefficient count"
        );

        let mut fft = FftState::new(fft_size);
        let mut td_re = vec![0.0f32; fft_size];
        let td_im = vec![0.0f32; fft_size];
        td_re[..h_slice.len()].copy_from_slice(h_slice);

        let mut h_re = vec![0.0f32; fft_size];
        let mut h_im = vec![0.0f32; fft_size];
        fft.direct(&mut h_re, &mut h_im, &td_re, &td_im);
        td_re.fill(0.0);

        Self {
            index: partition.index,
            fft_size,
            offset: partition.offset,
            priority,
            x,
            y,
            write_lock,
            h_re,
            h_im,
            out_ptr: AtomicUsize::new(partition.offset),
            state: Mutex::new(ConvState {
                queued: false,
                bypass: false,
                in_snap: 0,
                out_at: 0,
                fft,
                td_re,
                td_im,
                fd_re: vec![0.0f32; fft_size],
                fd_im: vec![0.0f32; fft_size],
            }),
            overruns: AtomicUsize::new(0),
            write_waits: AtomicUsize::new(0),
        }
    }

    /// FFT window size `W`.
    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    /// Starting offset of this partition in the impulse response.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Worker priority this partition was assigned.
    pub fn priority(&self) -> u8 {
        self.priority
    }

    /// Number of refused hand-offs (worker still busy when queued).
    pub fn overruns(&self) -> usize {
        self.overruns.load(Ordering::Relaxed)
    }

    /// Number of times the worker found the write lock contended.
    pub fn write_waits(&self) -> usize {
        self.write_waits.load(Ordering::Relaxed)
    }

    /// True while an invocation is pending or executing.
    pub fn is_queued(&self) -> bool {
        match self.state.try_lock() {
            Some(st) => st.queued,
            None => true,
        }
    }

    /// Hand the worker one invocation: the input snapshot (write pointer
    /// after the current sample) and the bypass flag. Non-blocking;
    /// called by the audio thread each time the partition's counter
    /// reaches half a window.
    ///
    /// Returns false when the previous invocation is still in flight; the
    /// window is then skipped and counted, and the write cursor has still
    /// advanced so later windows stay aligned.
    pub fn queue(&self, in_snap: usize, bypass: bool) -> bool {
        let out_at = self.out_ptr.load(Ordering::Relaxed);
        self.out_ptr
            .store((out_at + self.fft_size / 2) % self.y.len(), Ordering::Relaxed);

        if let Some(mut st) = self.state.try_lock() {
            if !st.queued {
                st.queued = true;
                st.bypass = bypass;
                st.in_snap = in_snap;
                st.out_at = out_at;
                return true;
            }
        }
        self.overruns.fetch_add(1, Ordering::Relaxed);
        log::warn!("convolver {} not ready", self.index);
        false
    }

    /// Execute the pending invocation. Runs on the partition's worker
    /// thread; a wake with nothing pending (coalesced schedule) is a
    /// no-op.
    pub fn process(&self) {
        let mut guard = self.state.lock();
        let st = &mut *guard;
        if !st.queued {
            return;
        }

        if !st.bypass {
            let w = self.fft_size;
            let half = w / 2;
            let m = self.x.len();

            // Gather the half-window of input ending at the snapshot;
            // the second half stays zero for linear convolution.
            for n in 0..half {
                st.td_re[n] = self.x.load((st.in_snap + n + m - half) % m);
            }
            st.td_re[half..].fill(0.0);
            st.td_im.fill(0.0);

            st.fft.direct(&mut st.fd_re, &mut st.fd_im, &st.td_re, &st.td_im);

            // Apply the filter bin-wise; the time-domain scratch doubles
            // as the product buffer.
            zlc_dsp::complex::complex_mul(
                &mut st.td_re,
                &mut st.td_im,
                &st.fd_re,
                &st.fd_im,
                &self.h_re,
                &self.h_im,
            );

            st.fft.inverse(&mut st.fd_re, &mut st.fd_im, &st.td_re, &st.td_im);

            // Overlap-add the whole window, folding in the 1/W inverse
            // normalization. The tail half overlaps the next invocation.
            let scale = 1.0 / w as f32;
            let my = self.y.len();
            {
                let _write = match self.write_lock.try_lock() {
                    Some(lock) => lock,
                    None => {
                        self.write_waits.fetch_add(1, Ordering::Relaxed);
                        log::debug!("convolver {}: waiting for write lock", self.index);
                        self.write_lock.lock()
                    }
                };
                for n in 0..w {
                    self.y.add((st.out_at + n) % my, st.fd_re[n] * scale);
                }
            }
        }

        st.queued = false;
    }
}

impl std::fmt::Debug for FftConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FftConvolver")
            .field("index", &self.index)
            .field("fft_size", &self.fft_size)
            .field("offset", &self.offset)
            .field("priority", &self.priority)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use zlc_dsp::convolution::convolve;

    fn make(partition: Partition, h: &[f32], ring_len: usize) -> (FftConvolver, Arc<SampleRing>, Arc<SampleRing>) {
        let x = Arc::new(SampleRing::new(ring_len));
        let y = Arc::new(SampleRing::new(ring_len));
        let lock = Arc::new(Mutex::new(()));
        let conv = FftConvolver::new(&partition, h, Arc::clone(&x), Arc::clone(&y), lock, 50);
        (conv, x, y)
    }

    fn part(index: usize, offset: usize, fft_size: usize) -> Partition {
        Partition {
            index,
            offset,
            fft_size,
            direct: false,
        }
    }

    #[test]
    #[should_panic(expected = "twice the partition")]
    fn test_window_precondition() {
        make(part(1, 0, 16), &[1.0; 4], 64);
    }

    #[test]
    fn test_delta_reproduces_input_block() {
        // h = delta at the partition origin: the block convolution is the
        // input block itself, landing at the partition offset.
        let mut h = vec![0.0f32; 8];
        h[0] = 1.0;
        let (conv, x, y) = make(part(1, 4, 16), &h, 64);

        let input: Vec<f32> = (1..=8).map(|i| i as f32 * 0.1).collect();
        for (i, &s) in input.iter().enumerate() {
            x.store(i, s);
        }

        assert!(conv.queue(8, false));
        conv.process();

        for (i, &s) in input.iter().enumerate() {
            assert!((y.load(4 + i) - s).abs() < 1e-5, "sample {}", i);
        }
        // Tail of the delta convolution is zero
        for i in 8..16 {
            assert!(y.load(4 + i).abs() < 1e-5, "tail {}", i);
        }
    }

    #[test]
    fn test_block_matches_reference() {
        let h = [0.5f32, -0.25, 0.125, 0.0625, -0.3, 0.2, 0.1, -0.05];
        let (conv, x, y) = make(part(1, 0, 16), &h, 64);

        let input: Vec<f32> = (0..8).map(|i| ((i as f32) * 0.7).sin()).collect();
        for (i, &s) in input.iter().enumerate() {
            x.store(i, s);
        }

        assert!(conv.queue(8, false));
        conv.process();

        let mut expected = vec![0.0f32; 16];
        convolve(&mut expected, &input, &h);
        for (i, &e) in expected.iter().enumerate() {
            assert!(
                (y.load(i) - e).abs() < 1e-4,
                "sample {}: got {}, expected {}",
                i,
                y.load(i),
                e
            );
        }
    }

    #[test]
    fn test_overlap_add_across_invocations() {
        let h = [1.0f32, 0.5, 0.25, 0.125, 0.0, -0.5, 0.75, -0.125];
        let (conv, x, y) = make(part(1, 0, 16), &h, 64);

        let input: Vec<f32> = (0..16).map(|i| ((i as f32) * 0.4).cos()).collect();
        for (i, &s) in input.iter().enumerate() {
            x.store(i, s);
        }

        assert!(conv.queue(8, false));
        conv.process();
        assert!(conv.queue(16, false));
        conv.process();

        let mut expected = vec![0.0f32; 24];
        convolve(&mut expected, &input, &h);
        for (i, &e) in expected.iter().enumerate() {
            assert!(
                (y.load(i) - e).abs() < 1e-4,
                "sample {}: got {}, expected {}",
                i,
                y.load(i),
                e
            );
        }
    }

    #[test]
    fn test_bypass_skips_compute_but_stays_aligned() {
        let mut h = vec![0.0f32; 8];
        h[0] = 1.0;
        let (conv, x, y) = make(part(1, 0, 16), &h, 64);

        for i in 0..16 {
            x.store(i, (i + 1) as f32);
        }

        // First window bypassed: no output, but the cursor moves on.
        assert!(conv.queue(8, true));
        conv.process();
        for i in 0..16 {
            assert_eq!(y.load(i), 0.0, "bypassed write at {}", i);
        }

        // Second window lands where it would have without the bypass.
        assert!(conv.queue(16, false));
        conv.process();
        for i in 0..8 {
            assert!((y.load(8 + i) - (9 + i) as f32).abs() < 1e-4, "sample {}", i);
        }
    }

    #[test]
    fn test_refused_queue_counts_and_realigns() {
        let mut h = vec![0.0f32; 8];
        h[0] = 1.0;
        let (conv, x, y) = make(part(1, 0, 16), &h, 64);

        for i in 0..24 {
            x.store(i, (i + 1) as f32);
        }

        assert!(conv.queue(8, false));
        // Still pending: the second hand-off is refused, not overwritten.
        assert!(!conv.queue(16, false));
        assert_eq!(conv.overruns(), 1);

        conv.process(); // runs the first invocation
        assert!(conv.queue(24, false));
        conv.process();

        // Window 0 landed at offset 0, window 2 at offset 16; the skipped
        // window 1 left a gap instead of shifting everything.
        for i in 0..8 {
            assert!((y.load(i) - (1 + i) as f32).abs() < 1e-4, "first {}", i);
        }
        for i in 8..16 {
            assert_eq!(y.load(i), 0.0, "gap {}", i);
        }
        for i in 0..8 {
            assert!((y.load(16 + i) - (17 + i) as f32).abs() < 1e-4, "third {}", i);
        }
    }

    #[test]
    fn test_is_queued_lifecycle() {
        let (conv, _x, _y) = make(part(1, 0, 16), &[0.0; 8], 64);
        assert!(!conv.is_queued());
        conv.queue(8, false);
        assert!(conv.is_queued());
        conv.process();
        assert!(!conv.is_queued());
    }

    #[test]
    fn test_accessors() {
        let (conv, _x, _y) = make(part(3, 12, 16), &[0.0; 8], 64);
        assert_eq!(conv.fft_size(), 16);
        assert_eq!(conv.offset(), 12);
        assert_eq!(conv.priority(), 50);
        assert_eq!(conv.overruns(), 0);
        assert_eq!(conv.write_waits(), 0);
    }
}
