//! Session-setup dimensions for a buffer and its real-time consumer.

use crate::block::{ColumnMetadata, SampleBlock};
use crate::buffer::BufferError;
use crate::invariant_ppt::{assert_invariant, CONFIG_VALIDATED};

/// Samples per processing quantum when none is given.
pub const DEFAULT_BLOCK_SIZE: usize = 1024;

/// Buffer dimensions plus the consumer's processing quantum.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferConfig {
    pub num_channels: usize,
    /// Capacity in columns.
    pub num_samples: usize,
    /// Columns drained per processing quantum.
    pub block_size: usize,
}

impl BufferConfig {
    pub fn new(num_channels: usize, num_samples: usize) -> Self {
        Self {
            num_channels,
            num_samples,
            block_size: DEFAULT_BLOCK_SIZE.min(num_samples.max(1)),
        }
    }

    pub fn with_block_size(mut self, block_size: usize) -> Self {
        self.block_size = block_size;
        self
    }

    /// Reject dimensions the buffer cannot be built with.
    pub fn validate(&self) -> Result<(), BufferError> {
        if self.num_channels == 0 || self.num_samples == 0 || self.block_size == 0 {
            log::warn!(
                "rejecting buffer config: {} channels x {} samples, block {}",
                self.num_channels,
                self.num_samples,
                self.block_size
            );
            return Err(BufferError::InvalidConfiguration {
                num_channels: self.num_channels,
                num_samples: self.num_samples,
            });
        }
        if self.block_size > self.num_samples {
            log::warn!(
                "rejecting buffer config: block {} exceeds capacity {}",
                self.block_size,
                self.num_samples
            );
            return Err(BufferError::BlockLargerThanCapacity {
                block_size: self.block_size,
                capacity: self.num_samples,
            });
        }
        assert_invariant(CONFIG_VALIDATED, true, "Buffer config accepted", Some("validate"));
        Ok(())
    }

    /// Destination block sized to one quantum.
    pub fn make_block(&self) -> SampleBlock {
        SampleBlock::new(self.num_channels, self.block_size)
    }

    /// Metadata outputs sized to one quantum.
    pub fn make_metadata(&self) -> ColumnMetadata {
        ColumnMetadata::with_capacity(self.block_size)
    }
}
