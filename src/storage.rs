//! Slot storage shared between the writer and reader halves.
//!
//! Every slot is an atomic so the writer may overwrite a column the reader is
//! copying without a data race. Readers detect such overwrites through the
//! reservation cursor and throw the affected columns away.

#![forbid(unsafe_code)]

use std::sync::atomic::{AtomicI64, AtomicU32, AtomicU64, AtomicUsize, Ordering};

/// Backing arrays for one buffer: channel-major samples plus per-column metadata.
#[derive(Debug)]
pub(crate) struct SlotStorage {
    num_channels: usize,
    capacity: usize,
    /// `f32` bit patterns, `num_channels * capacity` long.
    samples: Box<[AtomicU32]>,
    sample_numbers: Box<[AtomicI64]>,
    /// `f64` bit patterns.
    timestamps: Box<[AtomicU64]>,
    event_codes: Box<[AtomicU64]>,
}

impl SlotStorage {
    pub(crate) fn new(num_channels: usize, capacity: usize) -> Self {
        Self {
            num_channels,
            capacity,
            samples: (0..num_channels * capacity).map(|_| AtomicU32::new(0)).collect(),
            sample_numbers: (0..capacity).map(|_| AtomicI64::new(0)).collect(),
            timestamps: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
            event_codes: (0..capacity).map(|_| AtomicU64::new(0)).collect(),
        }
    }

    #[inline]
    pub(crate) fn num_channels(&self) -> usize {
        self.num_channels
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    #[inline]
    pub(crate) fn slot(&self, column: u64) -> usize {
        (column % self.capacity as u64) as usize
    }

    #[inline]
    pub(crate) fn store_sample(&self, chan: usize, slot: usize, value: f32) {
        self.samples[chan * self.capacity + slot].store(value.to_bits(), Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn load_sample(&self, chan: usize, slot: usize) -> f32 {
        f32::from_bits(self.samples[chan * self.capacity + slot].load(Ordering::Relaxed))
    }

    #[inline]
    pub(crate) fn store_meta(&self, slot: usize, sample_number: i64, timestamp: f64, event_code: u64) {
        self.sample_numbers[slot].store(sample_number, Ordering::Relaxed);
        self.timestamps[slot].store(timestamp.to_bits(), Ordering::Relaxed);
        self.event_codes[slot].store(event_code, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn load_meta(&self, slot: usize) -> (i64, f64, u64) {
        (
            self.sample_numbers[slot].load(Ordering::Relaxed),
            f64::from_bits(self.timestamps[slot].load(Ordering::Relaxed)),
            self.event_codes[slot].load(Ordering::Relaxed),
        )
    }
}

/// Cursors and counters. Cursors count columns since the last reset and never wrap.
#[derive(Debug, Default)]
pub(crate) struct Cursors {
    /// Shape of the storage currently attached; changes only on resize.
    pub(crate) capacity: AtomicUsize,
    pub(crate) num_channels: AtomicUsize,
    /// Columns fully published by the writer.
    pub(crate) write: AtomicU64,
    /// Columns the writer has claimed; may run ahead of `write` mid-batch.
    pub(crate) reserve: AtomicU64,
    /// Columns consumed or skipped by the reader.
    pub(crate) read: AtomicU64,
    /// Columns the reader skipped or discarded after an overrun.
    pub(crate) dropped: AtomicU64,
    /// Columns actually delivered to the reader.
    pub(crate) delivered: AtomicU64,
    pub(crate) peak_available: AtomicUsize,
    /// First sample number / timestamp bits of the last non-empty read.
    pub(crate) last_sample_number: AtomicI64,
    pub(crate) last_timestamp: AtomicU64,
}

impl Cursors {
    pub(crate) fn new(num_channels: usize, capacity: usize) -> Self {
        let cursors = Self::default();
        cursors.set_shape(num_channels, capacity);
        cursors.reset();
        cursors
    }

    pub(crate) fn set_shape(&self, num_channels: usize, capacity: usize) {
        self.num_channels.store(num_channels, Ordering::Relaxed);
        self.capacity.store(capacity, Ordering::Relaxed);
    }

    #[inline]
    pub(crate) fn capacity(&self) -> usize {
        self.capacity.load(Ordering::Relaxed)
    }

    /// Only valid while neither half is in use.
    pub(crate) fn reset(&self) {
        self.write.store(0, Ordering::Relaxed);
        self.reserve.store(0, Ordering::Relaxed);
        self.read.store(0, Ordering::Relaxed);
        self.dropped.store(0, Ordering::Relaxed);
        self.delivered.store(0, Ordering::Relaxed);
        self.peak_available.store(0, Ordering::Relaxed);
        self.last_sample_number.store(0, Ordering::Relaxed);
        self.last_timestamp.store((-1.0f64).to_bits(), Ordering::Relaxed);
    }

    /// Unread columns, capped at `capacity`.
    #[inline]
    pub(crate) fn available(&self) -> usize {
        let capacity = self.capacity();
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        (write.saturating_sub(read)).min(capacity as u64) as usize
    }

    /// Skipped/discarded columns plus whatever is overrun right now.
    #[inline]
    pub(crate) fn dropped(&self) -> u64 {
        let capacity = self.capacity();
        let write = self.write.load(Ordering::Acquire);
        let read = self.read.load(Ordering::Acquire);
        let pending = write.saturating_sub(read).saturating_sub(capacity as u64);
        self.dropped.load(Ordering::Relaxed) + pending
    }

    pub(crate) fn last_block_start(&self) -> (i64, f64) {
        (
            self.last_sample_number.load(Ordering::Relaxed),
            f64::from_bits(self.last_timestamp.load(Ordering::Relaxed)),
        )
    }
}
