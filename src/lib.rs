//! Real-time-safe multichannel acquisition ring buffer.
//!
//! An acquisition thread appends columns (one sample per channel plus sample
//! number, timestamp and event code) through a [`BufferWriter`]; a real-time
//! thread drains fixed-size blocks through a [`BufferReader`]. The writer
//! never blocks: when the reader falls behind, the oldest columns are
//! overwritten and counted as dropped.

pub mod block;
pub mod buffer;
pub mod config;
#[doc(hidden)]
pub mod harness;
#[doc(hidden)]
pub mod invariant_ppt;
pub mod invariant_rt;
pub mod rt;
pub mod source;
mod storage;

pub use block::{ColumnMetadata, SampleBlock};
pub use buffer::{
    reunite, BufferError, BufferMetrics, BufferMonitor, BufferReader, BufferWriter, DataBuffer,
    ReuniteError,
};
pub use config::{BufferConfig, DEFAULT_BLOCK_SIZE};
pub use rt::ReadResult;
pub use source::{SourceNode, StreamBlockInfo, StreamId, TtlEvent};


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hot_path_does_not_allocate() {
        let (mut writer, mut reader) = DataBuffer::new(4, 256).unwrap().split();
        let samples = vec![1.0f32; 4 * 32];
        let numbers: Vec<i64> = (0..32).collect();
        let stamps = vec![0.0f64; 32];
        let codes = vec![0u64; 32];
        let mut block = SampleBlock::new(4, 32);
        let mut meta = ColumnMetadata::with_capacity(32);

        let before = alloc_counter::allocations();
        for _ in 0..1_000 {
            writer.add_to_buffer(&samples, &numbers, &stamps, &codes);
            writer.add_chunked_to_buffer(&samples, &numbers, &stamps, &codes, 8);
            reader.read_all_from_buffer(&mut block, &mut meta, 32);
        }
        assert_eq!(alloc_counter::allocations(), before, "hot path allocated");
    }
}
