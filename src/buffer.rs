//! The acquisition ring buffer and its writer/reader/monitor handles.
//!
//! A [`DataBuffer`] is built once per acquisition session, then [`split`] into
//! a [`BufferWriter`] for the acquisition thread and a [`BufferReader`] for the
//! real-time thread. `clear` and `resize` need `&mut DataBuffer`, which only
//! exists before the split or after [`reunite`], so neither can race a live
//! write or read.
//!
//! Overflow never blocks or fails the writer: the oldest unread columns are
//! overwritten and counted in [`dropped_samples`].
//!
//! [`split`]: DataBuffer::split
//! [`dropped_samples`]: BufferMonitor::dropped_samples

use crate::block::{ColumnMetadata, SampleBlock};
use crate::config::BufferConfig;
use crate::invariant_ppt::{
    assert_invariant, BUFFER_DIMENSIONS_VALID, CLEAR_RESETS_CURSORS, RESIZE_INVALIDATES_DATA,
    REUNITE_SAME_BUFFER, SPLIT_SHARES_STORAGE,
};
use crate::rt::{read_columns, write_columns, Layout, ReadResult};
use crate::storage::{Cursors, SlotStorage};
use rtrb::Producer;
use std::fmt;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use thiserror::Error;

/// Errors from buffer setup.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BufferError {
    /// A dimension was zero.
    #[error("invalid buffer configuration: {num_channels} channels x {num_samples} samples")]
    InvalidConfiguration {
        num_channels: usize,
        num_samples: usize,
    },
    /// The processing quantum does not fit in the ring.
    #[error("block size {block_size} exceeds buffer capacity {capacity}")]
    BlockLargerThanCapacity { block_size: usize, capacity: usize },
}

/// Returned by [`reunite`] when the halves belong to different buffers.
#[derive(Debug, Error)]
#[error("writer and reader come from different buffers")]
pub struct ReuniteError {
    pub writer: BufferWriter,
    pub reader: BufferReader,
}

/// Snapshot of a buffer's counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BufferMetrics {
    pub num_channels: usize,
    pub capacity: usize,
    pub available: usize,
    pub peak_available: usize,
    pub total_written: u64,
    pub total_read: u64,
    pub dropped: u64,
}

fn metrics_of(cursors: &Cursors) -> BufferMetrics {
    BufferMetrics {
        num_channels: cursors.num_channels.load(Ordering::Relaxed),
        capacity: cursors.capacity(),
        available: cursors.available(),
        peak_available: cursors.peak_available.load(Ordering::Relaxed),
        total_written: cursors.write.load(Ordering::Acquire),
        total_read: cursors.delivered.load(Ordering::Relaxed),
        dropped: cursors.dropped(),
    }
}

fn check_dimensions(num_channels: usize, num_samples: usize) -> Result<(), BufferError> {
    if num_channels == 0 || num_samples == 0 {
        log::warn!(
            "rejecting buffer dimensions {} channels x {} samples",
            num_channels,
            num_samples
        );
        return Err(BufferError::InvalidConfiguration {
            num_channels,
            num_samples,
        });
    }
    Ok(())
}

/// A fixed-capacity multichannel ring of sample columns.
#[derive(Debug)]
pub struct DataBuffer {
    storage: Arc<SlotStorage>,
    cursors: Arc<Cursors>,
}

impl DataBuffer {
    /// Allocate a buffer of `num_samples` columns across `num_channels` channels.
    pub fn new(num_channels: usize, num_samples: usize) -> Result<Self, BufferError> {
        check_dimensions(num_channels, num_samples)?;
        let buffer = Self {
            storage: Arc::new(SlotStorage::new(num_channels, num_samples)),
            cursors: Arc::new(Cursors::new(num_channels, num_samples)),
        };
        assert_invariant(
            BUFFER_DIMENSIONS_VALID,
            buffer.storage.capacity() == num_samples && buffer.storage.num_channels() == num_channels,
            "Storage matches requested dimensions",
            Some("new"),
        );
        log::debug!(
            "allocated data buffer: {} channels x {} samples",
            num_channels,
            num_samples
        );
        Ok(buffer)
    }

    /// Allocate from a validated session config.
    pub fn from_config(config: &BufferConfig) -> Result<Self, BufferError> {
        config.validate()?;
        Self::new(config.num_channels, config.num_samples)
    }

    /// Reallocate storage. All buffered data, counters and the last block
    /// header are discarded. On error the buffer is left as it was.
    pub fn resize(&mut self, num_channels: usize, num_samples: usize) -> Result<(), BufferError> {
        check_dimensions(num_channels, num_samples)?;
        self.storage = Arc::new(SlotStorage::new(num_channels, num_samples));
        self.cursors.set_shape(num_channels, num_samples);
        self.cursors.reset();
        assert_invariant(
            RESIZE_INVALIDATES_DATA,
            self.cursors.available() == 0 && self.cursors.capacity() == num_samples,
            "Resize leaves an empty buffer of the new shape",
            Some("resize"),
        );
        log::info!(
            "resized data buffer to {} channels x {} samples",
            num_channels,
            num_samples
        );
        Ok(())
    }

    /// Reset cursors, counters and the last block header. Storage is kept.
    pub fn clear(&mut self) {
        self.cursors.reset();
        assert_invariant(
            CLEAR_RESETS_CURSORS,
            self.cursors.available() == 0 && self.cursors.dropped() == 0,
            "Clear leaves no unread or dropped columns",
            Some("clear"),
        );
        log::debug!("cleared data buffer");
    }

    /// Hand the two ends to the acquisition and real-time threads.
    pub fn split(self) -> (BufferWriter, BufferReader) {
        let writer = BufferWriter {
            storage: Arc::clone(&self.storage),
            cursors: Arc::clone(&self.cursors),
        };
        let reader = BufferReader {
            storage: self.storage,
            cursors: self.cursors,
            signals: None,
        };
        assert_invariant(
            SPLIT_SHARES_STORAGE,
            Arc::ptr_eq(&writer.storage, &reader.storage),
            "Writer and reader share storage",
            Some("split"),
        );
        log::debug!("split data buffer into writer and reader");
        (writer, reader)
    }

    /// A read-only view for monitoring threads.
    pub fn monitor(&self) -> BufferMonitor {
        BufferMonitor {
            cursors: Arc::clone(&self.cursors),
        }
    }

    /// Append columns; see [`BufferWriter::add_to_buffer`].
    pub fn add_to_buffer(
        &mut self,
        samples: &[f32],
        sample_numbers: &[i64],
        timestamps: &[f64],
        event_codes: &[u64],
    ) -> usize {
        write_columns(
            &self.storage,
            &self.cursors,
            samples,
            sample_numbers,
            timestamps,
            event_codes,
            Layout::Contiguous,
        )
    }

    /// Append chunked columns; see [`BufferWriter::add_chunked_to_buffer`].
    pub fn add_chunked_to_buffer(
        &mut self,
        samples: &[f32],
        sample_numbers: &[i64],
        timestamps: &[f64],
        event_codes: &[u64],
        chunk_size: usize,
    ) -> usize {
        write_columns(
            &self.storage,
            &self.cursors,
            samples,
            sample_numbers,
            timestamps,
            event_codes,
            Layout::Chunked(chunk_size),
        )
    }

    /// Drain columns; see [`BufferReader::read_all_from_buffer`].
    pub fn read_all_from_buffer(
        &mut self,
        dest: &mut SampleBlock,
        meta: &mut ColumnMetadata,
        max_samples: usize,
    ) -> ReadResult {
        let channels = self.storage.num_channels();
        read_columns(&self.storage, &self.cursors, dest, 0, channels, meta, max_samples, None)
    }

    /// Drain columns into a channel range; see [`BufferReader::read_into_channels`].
    pub fn read_into_channels(
        &mut self,
        dest: &mut SampleBlock,
        dst_start_channel: usize,
        num_channels: usize,
        meta: &mut ColumnMetadata,
        max_samples: usize,
    ) -> ReadResult {
        read_columns(
            &self.storage,
            &self.cursors,
            dest,
            dst_start_channel,
            num_channels,
            meta,
            max_samples,
            None,
        )
    }

    /// Unread columns.
    pub fn num_samples(&self) -> usize {
        self.cursors.available()
    }

    /// Columns lost to overflow since the last reset.
    pub fn dropped_samples(&self) -> u64 {
        self.cursors.dropped()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn num_channels(&self) -> usize {
        self.storage.num_channels()
    }

    /// `(sample_number, timestamp)` of the first column of the last non-empty
    /// read, or `(0, -1.0)` if nothing has been read since the last reset.
    pub fn last_block_start(&self) -> (i64, f64) {
        self.cursors.last_block_start()
    }

    pub fn metrics(&self) -> BufferMetrics {
        metrics_of(&self.cursors)
    }
}

/// Rebuild a [`DataBuffer`] from its two halves, e.g. to clear it after
/// acquisition stops.
pub fn reunite(writer: BufferWriter, reader: BufferReader) -> Result<DataBuffer, ReuniteError> {
    if !Arc::ptr_eq(&writer.cursors, &reader.cursors) {
        log::warn!("refusing to reunite halves of different buffers");
        return Err(ReuniteError { writer, reader });
    }
    assert_invariant(
        REUNITE_SAME_BUFFER,
        Arc::ptr_eq(&writer.storage, &reader.storage),
        "Reunited halves share storage",
        Some("reunite"),
    );
    drop(writer);
    log::debug!("reunited data buffer");
    Ok(DataBuffer {
        storage: reader.storage,
        cursors: reader.cursors,
    })
}

/// The acquisition-thread end.
#[derive(Debug)]
pub struct BufferWriter {
    storage: Arc<SlotStorage>,
    cursors: Arc<Cursors>,
}

impl BufferWriter {
    /// Append one batch of columns.
    ///
    /// `samples` is channel-contiguous: channel `c` of column `i` lives at
    /// `samples[c * n + i]`, where `n` is `samples.len() / num_channels`. If
    /// the metadata is shorter, only its leading columns are written; the
    /// sample positions still use `n`. Oldest unread columns are overwritten
    /// when the ring is full.
    ///
    /// Returns the number of columns accepted.
    pub fn add_to_buffer(
        &mut self,
        samples: &[f32],
        sample_numbers: &[i64],
        timestamps: &[f64],
        event_codes: &[u64],
    ) -> usize {
        write_columns(
            &self.storage,
            &self.cursors,
            samples,
            sample_numbers,
            timestamps,
            event_codes,
            Layout::Contiguous,
        )
    }

    /// Append a batch delivered as consecutive chunks of `chunk_size`
    /// columns, each chunk channel-contiguous. A trailing partial chunk uses
    /// its own length as channel stride. `chunk_size == 0` means one chunk.
    pub fn add_chunked_to_buffer(
        &mut self,
        samples: &[f32],
        sample_numbers: &[i64],
        timestamps: &[f64],
        event_codes: &[u64],
        chunk_size: usize,
    ) -> usize {
        write_columns(
            &self.storage,
            &self.cursors,
            samples,
            sample_numbers,
            timestamps,
            event_codes,
            Layout::Chunked(chunk_size),
        )
    }

    pub fn num_samples(&self) -> usize {
        self.cursors.available()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.cursors.dropped()
    }

    pub fn num_channels(&self) -> usize {
        self.storage.num_channels()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn monitor(&self) -> BufferMonitor {
        BufferMonitor {
            cursors: Arc::clone(&self.cursors),
        }
    }
}

/// The real-time-thread end.
pub struct BufferReader {
    storage: Arc<SlotStorage>,
    cursors: Arc<Cursors>,
    signals: Option<Producer<u8>>,
}

impl fmt::Debug for BufferReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BufferReader")
            .field("num_channels", &self.storage.num_channels())
            .field("capacity", &self.storage.capacity())
            .field("signals", &self.signals.is_some())
            .finish()
    }
}

impl BufferReader {
    /// Route RT invariant signals from every read into `tx`.
    pub fn attach_signals(&mut self, tx: Producer<u8>) {
        self.signals = Some(tx);
    }

    pub fn detach_signals(&mut self) -> Option<Producer<u8>> {
        self.signals.take()
    }

    /// Copy up to `max_samples` of the oldest unread columns into `dest` and
    /// `meta`, starting at column 0.
    ///
    /// The count is also capped by the block and metadata capacities. Buffer
    /// channels beyond `dest.num_channels()` are not copied. An empty buffer
    /// returns immediately with a zero count and leaves the outputs untouched.
    pub fn read_all_from_buffer(
        &mut self,
        dest: &mut SampleBlock,
        meta: &mut ColumnMetadata,
        max_samples: usize,
    ) -> ReadResult {
        let channels = self.storage.num_channels();
        read_columns(
            &self.storage,
            &self.cursors,
            dest,
            0,
            channels,
            meta,
            max_samples,
            self.signals.as_mut(),
        )
    }

    /// Like [`read_all_from_buffer`](Self::read_all_from_buffer), but buffer
    /// channels `0..num_channels` land in `dest` channels starting at
    /// `dst_start_channel`.
    pub fn read_into_channels(
        &mut self,
        dest: &mut SampleBlock,
        dst_start_channel: usize,
        num_channels: usize,
        meta: &mut ColumnMetadata,
        max_samples: usize,
    ) -> ReadResult {
        read_columns(
            &self.storage,
            &self.cursors,
            dest,
            dst_start_channel,
            num_channels,
            meta,
            max_samples,
            self.signals.as_mut(),
        )
    }

    pub fn num_samples(&self) -> usize {
        self.cursors.available()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.cursors.dropped()
    }

    pub fn num_channels(&self) -> usize {
        self.storage.num_channels()
    }

    pub fn capacity(&self) -> usize {
        self.storage.capacity()
    }

    pub fn last_block_start(&self) -> (i64, f64) {
        self.cursors.last_block_start()
    }

    pub fn monitor(&self) -> BufferMonitor {
        BufferMonitor {
            cursors: Arc::clone(&self.cursors),
        }
    }
}

/// Read-only counters, safe to poll from any thread.
#[derive(Debug, Clone)]
pub struct BufferMonitor {
    cursors: Arc<Cursors>,
}

impl BufferMonitor {
    /// Unread columns right now; stale as soon as it returns.
    pub fn num_samples(&self) -> usize {
        self.cursors.available()
    }

    pub fn dropped_samples(&self) -> u64 {
        self.cursors.dropped()
    }

    pub fn metrics(&self) -> BufferMetrics {
        metrics_of(&self.cursors)
    }
}
