// SPDX-License-Identifier: LGPL-3.0-or-later

//! The zero-latency convolution orchestrator.
//!
//! [`ZlConvolver`] owns the shared rings, the partition plan, the
//! direct head and the FFT convolver bank, and runs the per-sample
//! dispatch loop on the audio thread:
//!
//! 1. store the input sample and advance the write pointer
//! 2. run the head FIR inline
//! 3. tick every partition's sample counter; when one reaches half its
//!    window, hand the convolver its snapshot and schedule its worker
//! 4. read one output sample at the fixed-offset tap and clear the slot
//!
//! The read tap trails the write pointer by the latency pad `A = 2N`,
//! which is pipeline pre-fill, not algorithmic latency: the head's
//! contribution to output time `t` is computed at time `t`, and every
//! worker finishes its window well before the tap reaches it.

use crate::convolver::FftConvolver;
use crate::direct::DirectConvolver;
use crate::plan::PartitionPlan;
use crate::pool::{TaskId, WorkerPool};
use crate::randomizer::Randomizer;
use crate::ring::SampleRing;
use parking_lot::Mutex;
use std::sync::Arc;
use thiserror::Error;

/// Default worker base priority: below a typical audio callback,
/// above non-real-time work.
pub const DEFAULT_BASE_PRIORITY: u8 = 80;

/// Where the impulse response comes from.
#[derive(Debug, Clone)]
pub enum ImpulseSource {
    /// Decoded coefficients, e.g. from a host-provided IR file reader.
    Coefficients(Vec<f32>),
    /// Synthetic noise IR, uniform in `[-0.1, +0.1)`, reproducible by
    /// seed.
    Random { length: usize, seed: u32 },
}

/// Engine construction parameters.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Host audio callback block length in frames.
    pub block_size: usize,
    /// Host sample rate; used for diagnostics only.
    pub sample_rate: f32,
    /// The impulse response.
    pub impulse: ImpulseSource,
    /// Optional clamp on the effective IR length.
    pub max_kernel_size: Option<usize>,
    /// Priority of partition 1's worker; each later partition gets one
    /// less (larger windows have later deadlines).
    pub base_priority: u8,
}

/// Setup-time failures. Runtime trouble (overruns) is soft: logged,
/// counted, never propagated.
#[derive(Debug, Error)]
pub enum SetupError {
    /// `block_size` was zero.
    #[error("block size must be positive")]
    ZeroBlockSize,
    /// The impulse source resolved to no samples.
    #[error("impulse response is empty")]
    EmptyImpulse,
}

/// Real-time zero-latency partitioned convolver.
pub struct ZlConvolver {
    x: Arc<SampleRing>,
    y: Arc<SampleRing>,
    plan: PartitionPlan,
    head: DirectConvolver,
    bank: Vec<Arc<FftConvolver>>,
    tasks: Vec<TaskId>,
    counters: Vec<usize>,
    pool: Box<dyn WorkerPool>,
    in_ptr: usize,
    out_ptr: usize,
}

impl ZlConvolver {
    /// Build the engine: resolve the impulse response, lay out the
    /// partition plan, pre-transform every partition and register one
    /// worker task per FFT convolver with `pool`.
    pub fn new(config: EngineConfig, mut pool: Box<dyn WorkerPool>) -> Result<Self, SetupError> {
        if config.block_size == 0 {
            return Err(SetupError::ZeroBlockSize);
        }

        let mut h = match config.impulse {
            ImpulseSource::Coefficients(c) => c,
            ImpulseSource::Random { length, seed } => {
                let mut rng = Randomizer::with_seed(seed);
                (0..length).map(|_| rng.uniform_in(-0.1, 0.1)).collect()
            }
        };
        if let Some(max) = config.max_kernel_size {
            h.truncate(max);
        }
        if h.is_empty() {
            return Err(SetupError::EmptyImpulse);
        }

        log::info!(
            "impulse response: {} samples ({:.2} s at {} Hz)",
            h.len(),
            h.len() as f32 / config.sample_rate,
            config.sample_rate
        );

        let plan = PartitionPlan::new(config.block_size, h.len());
        let m = plan.ring_size();
        let x = Arc::new(SampleRing::new(m));
        let y = Arc::new(SampleRing::new(m));
        let write_lock = Arc::new(Mutex::new(()));

        let head_len = plan.partitions()[0].half().min(h.len());
        let head = DirectConvolver::new(
            h[..head_len].to_vec(),
            0,
            Arc::clone(&x),
            Arc::clone(&y),
        );

        let mut bank = Vec::new();
        let mut tasks = Vec::new();
        let mut padded = Vec::new();
        for part in &plan.partitions()[1..] {
            let half = part.half();
            let end = (part.offset + half).min(h.len());
            // The final partition zero-pads its coefficient tail.
            let slice: &[f32] = if end - part.offset == half {
                &h[part.offset..end]
            } else {
                padded.clear();
                padded.extend_from_slice(&h[part.offset..end]);
                padded.resize(half, 0.0);
                &padded
            };

            let priority = config.base_priority.saturating_sub(part.index as u8);
            let conv = Arc::new(FftConvolver::new(
                part,
                slice,
                Arc::clone(&x),
                Arc::clone(&y),
                Arc::clone(&write_lock),
                priority,
            ));
            log::info!(
                "partition {}: fft_size {} priority {} samples {} offset {}",
                part.index,
                part.fft_size,
                priority,
                end - part.offset,
                part.offset
            );

            let task = {
                let conv = Arc::clone(&conv);
                pool.register(
                    &format!("convolver-{}", part.index),
                    priority,
                    Arc::new(move || conv.process()),
                )
            };
            bank.push(conv);
            tasks.push(task);
        }
        log::info!("split impulse into {} partitions", plan.len());

        let counters = vec![0; bank.len()];
        let out_ptr = m - plan.latency();
        Ok(Self {
            x,
            y,
            plan,
            head,
            bank,
            tasks,
            counters,
            pool,
            in_ptr: 0,
            out_ptr,
        })
    }

    /// Process one input sample and return one output sample.
    ///
    /// # Arguments
    /// * `input` - The input sample
    /// * `max_blocks` - Partitions with index greater than this are
    ///   bypassed (`usize::MAX` for dense operation, 0 for head-only)
    /// * `sparsity` - Fraction of partitions to periodically drop,
    ///   in `[0, 1]`: 0 keeps all, 1 keeps only the head
    ///
    /// Bypassed partitions skip their compute but keep their output
    /// cursors moving, so re-enabling them later produces aligned
    /// output.
    pub fn process(&mut self, input: f32, max_blocks: usize, sparsity: f32) -> f32 {
        let m = self.x.len();

        self.x.store(self.in_ptr, input);
        self.in_ptr = (self.in_ptr + 1) % m;

        self.head.process(self.in_ptr);

        let period = sparsity_period(sparsity, self.plan.len());
        for (slot, conv) in self.bank.iter().enumerate() {
            let index = slot + 1; // partition 0 is the inline head
            let bypass = index > max_blocks || (sparsity > 0.0 && index % period == 0);

            self.counters[slot] += 1;
            if self.counters[slot] == conv.fft_size() / 2 {
                conv.queue(self.in_ptr, bypass);
                self.pool.schedule(self.tasks[slot]);
                self.counters[slot] = 0;
            }
        }

        let out = self.y.take(self.out_ptr);
        self.out_ptr = (self.out_ptr + 1) % m;
        out
    }

    /// Convenience wrapper: process `src` into `dst` sample by sample.
    /// Lengths are matched on the shorter of the two.
    pub fn process_block(
        &mut self,
        dst: &mut [f32],
        src: &[f32],
        max_blocks: usize,
        sparsity: f32,
    ) {
        for (d, &s) in dst.iter_mut().zip(src.iter()) {
            *d = self.process(s, max_blocks, sparsity);
        }
    }

    /// Fixed pipeline delay between input and output, in samples
    /// (`A = 2 * max(32, 4 * block_size)`).
    pub fn latency(&self) -> usize {
        self.plan.latency()
    }

    /// The partition layout this engine was built with.
    pub fn plan(&self) -> &PartitionPlan {
        &self.plan
    }

    /// Total refused hand-offs across all partitions since setup.
    pub fn overruns(&self) -> usize {
        self.bank.iter().map(|c| c.overruns()).sum()
    }
}

impl std::fmt::Debug for ZlConvolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZlConvolver")
            .field("plan", &self.plan)
            .field("in_ptr", &self.in_ptr)
            .field("out_ptr", &self.out_ptr)
            .finish_non_exhaustive()
    }
}

/// Dropout period for the periodic sparsity pattern: partitions whose
/// index is a multiple of the period are bypassed. Tightens to 1 (drop
/// every dispatched partition) as sparsity approaches 1.
fn sparsity_period(sparsity: f32, total_partitions: usize) -> usize {
    ((1.0 - sparsity) * total_partitions as f32 * 0.5) as usize + 1
}
