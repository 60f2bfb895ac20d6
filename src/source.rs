//! Source stage: drains several stream buffers into one block per quantum.
//!
//! Each stream's channels land at a running channel offset in the shared
//! block. Event codes are compared column by column and every bit that flips
//! on one of the stream's TTL lines becomes a [`TtlEvent`].

use crate::block::{ColumnMetadata, SampleBlock};
use crate::buffer::BufferReader;
use crate::invariant_ppt::{assert_invariant, STREAM_CHANNELS_BOUNDED, TTL_LINES_BOUNDED};

/// Most TTL lines an event code can carry.
pub const MAX_TTL_LINES: u8 = 64;

/// Index of a stream within a [`SourceNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub usize);

/// Header of the block a stream contributed in the last `process` call.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamBlockInfo {
    pub first_sample_number: i64,
    pub first_timestamp: f64,
    pub num_samples: usize,
    /// Columns lost to overflow just before this block.
    pub dropped: u64,
}

impl Default for StreamBlockInfo {
    fn default() -> Self {
        Self {
            first_sample_number: 0,
            first_timestamp: -1.0,
            num_samples: 0,
            dropped: 0,
        }
    }
}

/// One TTL line changing state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlEvent {
    pub stream: StreamId,
    pub sample_number: i64,
    /// Column within the block.
    pub sample_offset: usize,
    pub line: u8,
    pub state: bool,
    /// Full event code at the transition.
    pub word: u64,
}

#[derive(Debug)]
struct Stream {
    reader: BufferReader,
    channels: usize,
    ttl_lines: u8,
    meta: ColumnMetadata,
    last_code: u64,
    info: StreamBlockInfo,
}

/// Multi-stream consumer.
#[derive(Debug)]
pub struct SourceNode {
    block_size: usize,
    streams: Vec<Stream>,
    /// TTL transitions that did not fit in the caller's event list.
    dropped_events: u64,
}

impl SourceNode {
    pub fn new(block_size: usize) -> Self {
        Self {
            block_size,
            streams: Vec::new(),
            dropped_events: 0,
        }
    }

    /// Register a stream. `channels` is clamped to the reader's channel count
    /// and `ttl_lines` to [`MAX_TTL_LINES`]. Setup only: allocates.
    pub fn add_stream(&mut self, reader: BufferReader, channels: usize, ttl_lines: u8) -> StreamId {
        let channels = channels.min(reader.num_channels());
        let ttl_lines = ttl_lines.min(MAX_TTL_LINES);
        assert_invariant(
            STREAM_CHANNELS_BOUNDED,
            channels <= reader.num_channels(),
            "Stream channel count fits its buffer",
            Some("add_stream"),
        );
        assert_invariant(
            TTL_LINES_BOUNDED,
            ttl_lines <= MAX_TTL_LINES,
            "TTL lines fit in an event code",
            Some("add_stream"),
        );
        let id = StreamId(self.streams.len());
        log::info!(
            "source stream {} registered: {} channels, {} TTL lines",
            id.0,
            channels,
            ttl_lines
        );
        self.streams.push(Stream {
            reader,
            channels,
            ttl_lines,
            meta: ColumnMetadata::with_capacity(self.block_size),
            last_code: 0,
            info: StreamBlockInfo::default(),
        });
        id
    }

    pub fn num_streams(&self) -> usize {
        self.streams.len()
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Channels the block must hold to receive every stream.
    pub fn total_channels(&self) -> usize {
        self.streams.iter().map(|s| s.channels).sum()
    }

    /// Fill `block` from every stream and append TTL transitions to `events`.
    ///
    /// Events beyond `events`' spare capacity are not recorded so the call
    /// never allocates; reserve enough up front. Those are counted in
    /// [`dropped_events`](Self::dropped_events). Returns the number of events
    /// appended.
    pub fn process(&mut self, block: &mut SampleBlock, events: &mut Vec<TtlEvent>) -> usize {
        let max_samples = self.block_size.min(block.capacity());
        let mut channel_offset = 0;
        let mut emitted = 0;

        for (index, stream) in self.streams.iter_mut().enumerate() {
            let result = stream.reader.read_into_channels(
                block,
                channel_offset,
                stream.channels,
                &mut stream.meta,
                max_samples,
            );
            channel_offset += stream.channels;

            let (last_number, last_stamp) = stream.reader.last_block_start();
            stream.info = StreamBlockInfo {
                first_sample_number: result.first_sample_number.unwrap_or(last_number),
                first_timestamp: result.first_timestamp.unwrap_or(last_stamp),
                num_samples: result.num_samples,
                dropped: result.dropped,
            };

            if stream.ttl_lines == 0 {
                continue;
            }
            let mut last_code = stream.last_code;
            for offset in 0..result.num_samples {
                let code = stream.meta.event_codes[offset];
                if code == last_code {
                    continue;
                }
                let changed = code ^ last_code;
                for line in 0..stream.ttl_lines {
                    if (changed >> line) & 1 == 0 {
                        continue;
                    }
                    if events.len() < events.capacity() {
                        events.push(TtlEvent {
                            stream: StreamId(index),
                            sample_number: stream.meta.sample_numbers[offset],
                            sample_offset: offset,
                            line,
                            state: (code >> line) & 1 == 1,
                            word: code,
                        });
                        emitted += 1;
                    } else {
                        self.dropped_events += 1;
                    }
                }
                last_code = code;
            }
            stream.last_code = last_code;
        }
        emitted
    }

    /// TTL transitions lost to a full event list since creation or the last
    /// [`reset_event_state`](Self::reset_event_state).
    pub fn dropped_events(&self) -> u64 {
        self.dropped_events
    }

    /// Header of `stream`'s last contribution.
    pub fn stream_info(&self, stream: StreamId) -> Option<StreamBlockInfo> {
        self.streams.get(stream.0).map(|s| s.info)
    }

    /// Forget TTL state, e.g. after the buffers were cleared.
    pub fn reset_event_state(&mut self) {
        for stream in &mut self.streams {
            stream.last_code = 0;
            stream.info = StreamBlockInfo::default();
        }
        self.dropped_events = 0;
    }

    /// Give the readers back, in registration order.
    pub fn into_readers(self) -> Vec<BufferReader> {
        self.streams.into_iter().map(|s| s.reader).collect()
    }
}
