//! Consumer-side destination storage, allocated once per processing quantum.

#![forbid(unsafe_code)]

/// A fixed-capacity multichannel block of samples, stored channel-major.
#[derive(Debug, Clone, PartialEq)]
pub struct SampleBlock {
    num_channels: usize,
    capacity: usize,
    data: Vec<f32>,
}

impl SampleBlock {
    /// Create a zero-filled block.
    pub fn new(num_channels: usize, capacity: usize) -> Self {
        Self {
            num_channels,
            capacity,
            data: vec![0.0; num_channels * capacity],
        }
    }

    /// Number of channels.
    pub fn num_channels(&self) -> usize {
        self.num_channels
    }

    /// Samples per channel.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// One channel's samples.
    ///
    /// # Panics
    /// Panics if `chan >= num_channels()`.
    pub fn channel(&self, chan: usize) -> &[f32] {
        &self.data[chan * self.capacity..(chan + 1) * self.capacity]
    }

    /// One channel's samples, mutably.
    ///
    /// # Panics
    /// Panics if `chan >= num_channels()`.
    pub fn channel_mut(&mut self, chan: usize) -> &mut [f32] {
        &mut self.data[chan * self.capacity..(chan + 1) * self.capacity]
    }

    /// Zero every sample.
    pub fn clear(&mut self) {
        self.data.fill(0.0);
    }
}

/// Per-column metadata outputs that travel with a [`SampleBlock`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMetadata {
    pub sample_numbers: Vec<i64>,
    pub timestamps: Vec<f64>,
    pub event_codes: Vec<u64>,
}

impl ColumnMetadata {
    /// Zero-filled arrays of length `capacity`.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            sample_numbers: vec![0; capacity],
            timestamps: vec![0.0; capacity],
            event_codes: vec![0; capacity],
        }
    }

    /// Columns that fit in all three arrays.
    pub fn capacity(&self) -> usize {
        self.sample_numbers
            .len()
            .min(self.timestamps.len())
            .min(self.event_codes.len())
    }

    // Shift columns `from..from + len` to the front of every array.
    pub(crate) fn shift_front(&mut self, from: usize, len: usize) {
        self.sample_numbers.copy_within(from..from + len, 0);
        self.timestamps.copy_within(from..from + len, 0);
        self.event_codes.copy_within(from..from + len, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channels_are_disjoint() {
        let mut block = SampleBlock::new(3, 4);
        block.channel_mut(1).fill(2.0);
        assert_eq!(block.channel(0), &[0.0; 4]);
        assert_eq!(block.channel(1), &[2.0; 4]);
        assert_eq!(block.channel(2), &[0.0; 4]);
        block.clear();
        assert_eq!(block.channel(1), &[0.0; 4]);
    }

    #[test]
    fn metadata_capacity_is_shortest_array() {
        let mut meta = ColumnMetadata::with_capacity(8);
        assert_eq!(meta.capacity(), 8);
        meta.event_codes.truncate(5);
        assert_eq!(meta.capacity(), 5);
    }

    #[test]
    fn shift_front_moves_all_arrays() {
        let mut meta = ColumnMetadata::with_capacity(4);
        meta.sample_numbers.copy_from_slice(&[10, 11, 12, 13]);
        meta.timestamps.copy_from_slice(&[1.0, 1.1, 1.2, 1.3]);
        meta.event_codes.copy_from_slice(&[0, 1, 2, 3]);
        meta.shift_front(2, 2);
        assert_eq!(&meta.sample_numbers[..2], &[12, 13]);
        assert_eq!(&meta.timestamps[..2], &[1.2, 1.3]);
        assert_eq!(&meta.event_codes[..2], &[2, 3]);
    }
}
