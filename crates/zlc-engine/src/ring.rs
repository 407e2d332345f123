// SPDX-License-Identifier: LGPL-3.0-or-later

//! Shared circular sample buffer with word-atomic slots.
//!
//! Both engine rings are crossed by threads of different priorities:
//! the input ring has one writer (the audio thread) and many readers
//! (workers); the output ring has many additive writers (workers plus
//! the inline head) and a single reader that clears each slot as it
//! consumes it. Samples are stored as `AtomicU32` bit patterns so every
//! access is a single word-atomic operation and the audio thread never
//! takes a lock on this path.
//!
//! Index arithmetic is the caller's business: the convolvers track their
//! own pointers modulo [`SampleRing::len`].

use std::sync::atomic::{AtomicU32, Ordering};

/// Fixed-capacity circular buffer of `f32` samples with atomic slots.
pub struct SampleRing {
    slots: Box<[AtomicU32]>,
}

impl SampleRing {
    /// Allocate a ring of `len` zeroed samples.
    pub fn new(len: usize) -> Self {
        let slots = (0..len).map(|_| AtomicU32::new(0)).collect();
        Self { slots }
    }

    /// Ring capacity in samples.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// True when the ring has no slots.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Read the sample at `idx`.
    ///
    /// Relaxed: readers of the input ring are synchronized with the
    /// writer through the convolver hand-off mutex, which orders all
    /// stores up to the snapshot before the worker's gather.
    pub fn load(&self, idx: usize) -> f32 {
        f32::from_bits(self.slots[idx].load(Ordering::Relaxed))
    }

    /// Overwrite the sample at `idx`.
    pub fn store(&self, idx: usize, value: f32) {
        self.slots[idx].store(value.to_bits(), Ordering::Relaxed);
    }

    /// Atomically add `value` to the sample at `idx`.
    ///
    /// Lossless under concurrent additions from workers and the audio
    /// thread; the release ordering pairs with [`SampleRing::take`] so
    /// a completed addition is visible to the consuming read.
    pub fn add(&self, idx: usize, value: f32) {
        self.slots[idx]
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
                Some((f32::from_bits(bits) + value).to_bits())
            })
            .ok();
    }

    /// Atomically read the sample at `idx` and clear the slot.
    pub fn take(&self, idx: usize) -> f32 {
        f32::from_bits(self.slots[idx].swap(0, Ordering::Acquire))
    }
}

impl std::fmt::Debug for SampleRing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SampleRing")
            .field("len", &self.slots.len())
            .finish_non_exhaustive()
    }
}
