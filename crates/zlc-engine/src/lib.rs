// SPDX-License-Identifier: LGPL-3.0-or-later

//! # zlc-engine
//!
//! Real-time zero-latency partitioned convolution.
//!
//! Given a finite impulse response of arbitrary length and a continuous
//! sample stream, the engine produces the convolved stream sample by
//! sample with no added algorithmic latency. The impulse response is
//! split into exponentially growing partitions: the first runs as a
//! direct-form FIR inline on the audio thread, the rest as FFT
//! convolvers on priority-ordered background workers that overlap-add
//! into a shared output ring.
//!
//! ## Threads
//!
//! [`ZlConvolver::process`] is called by the audio thread once per
//! sample and never blocks: shared buffers use word-atomic slots, and
//! the hand-off to each worker is a `try_lock` that degrades to a
//! logged one-window dropout under overload. Workers are scheduled
//! through the [`pool::WorkerPool`] seam; [`pool::RtThreadPool`] runs
//! one named thread per partition at a strictly decreasing priority,
//! while [`pool::InlinePool`] executes synchronously for deterministic
//! tests and offline use.
//!
//! ## Example
//!
//! ```
//! use zlc_engine::{EngineConfig, ImpulseSource, ZlConvolver};
//! use zlc_engine::pool::InlinePool;
//!
//! let cfg = EngineConfig {
//!     block_size: 32,
//!     sample_rate: 48_000.0,
//!     impulse: ImpulseSource::Coefficients(vec![1.0, 0.5]),
//!     max_kernel_size: None,
//!     base_priority: zlc_engine::engine::DEFAULT_BASE_PRIORITY,
//! };
//! let mut conv = ZlConvolver::new(cfg, Box::new(InlinePool::new())).unwrap();
//!
//! // The pipeline pre-fill delays output by the fixed latency pad.
//! let pad = conv.latency();
//! for t in 0..pad {
//!     assert_eq!(conv.process(if t == 0 { 1.0 } else { 0.0 }, usize::MAX, 0.0), 0.0);
//! }
//! let first = conv.process(0.0, usize::MAX, 0.0);
//! assert!((first - 1.0).abs() < 1e-5);
//! ```

pub mod convolver;
pub mod direct;
pub mod engine;
pub mod plan;
pub mod pool;
pub mod randomizer;
pub mod ring;

pub use engine::{EngineConfig, ImpulseSource, SetupError, ZlConvolver};
pub use plan::{Partition, PartitionPlan};
pub use pool::{InlinePool, RtThreadPool, TaskId, WorkerPool};
