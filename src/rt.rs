//! RT module: the writer and reader hot paths.
//!
//! Neither path blocks, allocates, logs or panics on well-formed handles.
//! The writer publishes a reservation before touching slots and the final
//! cursor after; the reader validates its copy against the reservation and
//! drops any prefix the writer may have overwritten meanwhile.

// IMPORTANT: Do not call assert_invariant or any PPT logging in RT paths to avoid locks/allocs.

use crate::block::{ColumnMetadata, SampleBlock};
use crate::invariant_rt::{
    signal_invariant, INV_BLOCK_FILLED, INV_BLOCK_SHORT, INV_OVERRUN_SKIPPED,
    INV_SAMPLE_ORDER_KEPT, INV_TORN_COLUMNS_DISCARDED,
};
use crate::storage::{Cursors, SlotStorage};
use rtrb::Producer;
use std::sync::atomic::{fence, Ordering};

/// Outcome of one read.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ReadResult {
    /// Columns copied into the destination, starting at column 0.
    pub num_samples: usize,
    /// Sample number of the first copied column.
    pub first_sample_number: Option<i64>,
    /// Timestamp of the first copied column.
    pub first_timestamp: Option<f64>,
    /// Columns lost to overflow immediately before this block.
    pub dropped: u64,
}

impl ReadResult {
    pub(crate) const EMPTY: ReadResult = ReadResult {
        num_samples: 0,
        first_sample_number: None,
        first_timestamp: None,
        dropped: 0,
    };

    pub fn is_empty(&self) -> bool {
        self.num_samples == 0
    }
}

/// Source layout of the samples handed to a write.
#[derive(Debug, Clone, Copy)]
pub(crate) enum Layout {
    /// `samples[chan * n + i]`.
    Contiguous,
    /// Consecutive chunks, each channel-contiguous.
    Chunked(usize),
}

impl Layout {
    /// `stride` is the column count the caller laid `samples` out with.
    #[inline]
    fn index(self, chan: usize, column: usize, stride: usize, num_channels: usize) -> usize {
        match self {
            Layout::Contiguous => chan * stride + column,
            Layout::Chunked(chunk_size) => {
                let base = column - column % chunk_size;
                let chunk_len = chunk_size.min(stride - base);
                base * num_channels + chan * chunk_len + (column - base)
            }
        }
    }
}

/// Write up to `sample_numbers.len()` columns; returns how many were accepted.
pub(crate) fn write_columns(
    storage: &SlotStorage,
    cursors: &Cursors,
    samples: &[f32],
    sample_numbers: &[i64],
    timestamps: &[f64],
    event_codes: &[u64],
    layout: Layout,
) -> usize {
    let num_channels = storage.num_channels();
    let capacity = storage.capacity();
    // Sample positions follow the caller's layout even when the metadata is shorter.
    let stride = samples.len() / num_channels;
    let num_items = sample_numbers
        .len()
        .min(timestamps.len())
        .min(event_codes.len())
        .min(stride);
    if num_items == 0 {
        return 0;
    }
    let layout = match layout {
        Layout::Chunked(0) => Layout::Contiguous,
        Layout::Chunked(chunk) if chunk >= stride => Layout::Contiguous,
        other => other,
    };

    // Only the writer stores `write`, so a relaxed load sees our own last store.
    let start = cursors.write.load(Ordering::Relaxed);
    let end = start + num_items as u64;
    cursors.reserve.store(end, Ordering::Relaxed);
    fence(Ordering::Release);

    // A batch larger than the ring keeps only its newest `capacity` columns.
    let first = num_items.saturating_sub(capacity);
    for chan in 0..num_channels {
        for column in first..num_items {
            let slot = storage.slot(start + column as u64);
            let value = samples[layout.index(chan, column, stride, num_channels)];
            storage.store_sample(chan, slot, value);
        }
    }
    for column in first..num_items {
        let slot = storage.slot(start + column as u64);
        storage.store_meta(
            slot,
            sample_numbers[column],
            timestamps[column],
            event_codes[column],
        );
    }

    cursors.write.store(end, Ordering::Release);
    cursors
        .peak_available
        .fetch_max(cursors.available(), Ordering::Relaxed);
    num_items
}

/// Copy the oldest available columns into `dest` channels
/// `dst_start..dst_start + channels`.
#[allow(clippy::too_many_arguments)]
pub(crate) fn read_columns(
    storage: &SlotStorage,
    cursors: &Cursors,
    dest: &mut SampleBlock,
    dst_start: usize,
    channels: usize,
    meta: &mut ColumnMetadata,
    max_samples: usize,
    signals: Option<&mut Producer<u8>>,
) -> ReadResult {
    let capacity = storage.capacity() as u64;
    let channels = channels
        .min(storage.num_channels())
        .min(dest.num_channels().saturating_sub(dst_start));
    let limit = max_samples.min(dest.capacity()).min(meta.capacity());

    let write = cursors.write.load(Ordering::Acquire);
    let mut read = cursors.read.load(Ordering::Relaxed);
    let mut skipped = 0u64;
    if write - read > capacity {
        skipped = write - capacity - read;
        read = write - capacity;
    }

    let wanted = (write - read).min(limit as u64) as usize;
    if wanted == 0 {
        if skipped > 0 {
            cursors.dropped.fetch_add(skipped, Ordering::Relaxed);
            cursors.read.store(read, Ordering::Release);
        }
        if let Some(tx) = signals {
            if skipped > 0 {
                signal_invariant(tx, INV_OVERRUN_SKIPPED);
            }
            if max_samples > 0 {
                signal_invariant(tx, INV_BLOCK_SHORT);
            }
        }
        return ReadResult {
            dropped: skipped,
            ..ReadResult::EMPTY
        };
    }

    for chan in 0..channels {
        let out = dest.channel_mut(dst_start + chan);
        for (column, sample) in out[..wanted].iter_mut().enumerate() {
            *sample = storage.load_sample(chan, storage.slot(read + column as u64));
        }
    }
    for column in 0..wanted {
        let (sample_number, timestamp, event_code) =
            storage.load_meta(storage.slot(read + column as u64));
        meta.sample_numbers[column] = sample_number;
        meta.timestamps[column] = timestamp;
        meta.event_codes[column] = event_code;
    }

    // Anything below `reserve - capacity` may have been rewritten under us.
    fence(Ordering::Acquire);
    let reserve = cursors.reserve.load(Ordering::Relaxed);
    let stable_from = reserve.saturating_sub(capacity);
    let torn = (stable_from.saturating_sub(read)).min(wanted as u64) as usize;
    let num_samples = wanted - torn;
    if torn > 0 && num_samples > 0 {
        for chan in 0..channels {
            dest.channel_mut(dst_start + chan)
                .copy_within(torn..wanted, 0);
        }
        meta.shift_front(torn, num_samples);
    }

    let dropped = skipped + torn as u64;
    if dropped > 0 {
        cursors.dropped.fetch_add(dropped, Ordering::Relaxed);
    }
    cursors
        .delivered
        .fetch_add(num_samples as u64, Ordering::Relaxed);
    let result = if num_samples > 0 {
        cursors
            .last_sample_number
            .store(meta.sample_numbers[0], Ordering::Relaxed);
        cursors
            .last_timestamp
            .store(meta.timestamps[0].to_bits(), Ordering::Relaxed);
        ReadResult {
            num_samples,
            first_sample_number: Some(meta.sample_numbers[0]),
            first_timestamp: Some(meta.timestamps[0]),
            dropped,
        }
    } else {
        ReadResult {
            dropped,
            ..ReadResult::EMPTY
        }
    };
    cursors.read.store(read + wanted as u64, Ordering::Release);

    if let Some(tx) = signals {
        if skipped > 0 {
            signal_invariant(tx, INV_OVERRUN_SKIPPED);
        }
        if torn > 0 {
            signal_invariant(tx, INV_TORN_COLUMNS_DISCARDED);
        }
        if num_samples == max_samples {
            signal_invariant(tx, INV_BLOCK_FILLED);
        } else {
            signal_invariant(tx, INV_BLOCK_SHORT);
        }
        if meta.sample_numbers[..num_samples]
            .windows(2)
            .all(|pair| pair[0] <= pair[1])
        {
            signal_invariant(tx, INV_SAMPLE_ORDER_KEPT);
        }
    }
    result
}
