//! Acquisition harness: a synthetic producer for tests, benches and demos.

use crate::buffer::BufferWriter;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// Deterministic stand-in for an acquisition device.
///
/// Channel `c` of sample number `s` carries `c * 1000 + s`; timestamps are
/// `s / sample_rate`; the event code toggles bit 0 every `ttl_period`
/// samples (never, if zero).
#[derive(Debug, Clone)]
pub struct SyntheticStream {
    num_channels: usize,
    sample_rate: f64,
    ttl_period: i64,
    next_sample_number: i64,
    samples: Vec<f32>,
    sample_numbers: Vec<i64>,
    timestamps: Vec<f64>,
    event_codes: Vec<u64>,
}

impl SyntheticStream {
    pub fn new(num_channels: usize, sample_rate: f64) -> Self {
        Self {
            num_channels,
            sample_rate,
            ttl_period: 0,
            next_sample_number: 0,
            samples: Vec::new(),
            sample_numbers: Vec::new(),
            timestamps: Vec::new(),
            event_codes: Vec::new(),
        }
    }

    pub fn with_ttl_period(mut self, period: i64) -> Self {
        self.ttl_period = period;
        self
    }

    /// Expected value of `chan` at `sample_number`.
    pub fn value(chan: usize, sample_number: i64) -> f32 {
        (chan as i64 * 1000 + sample_number) as f32
    }

    pub fn next_sample_number(&self) -> i64 {
        self.next_sample_number
    }

    /// Generate the next `n` columns and write them.
    pub fn write_batch(&mut self, writer: &mut BufferWriter, n: usize) -> usize {
        self.fill(n);
        writer.add_to_buffer(
            &self.samples,
            &self.sample_numbers,
            &self.timestamps,
            &self.event_codes,
        )
    }

    /// Generate the next `n` columns as `(samples, sample_numbers, timestamps, event_codes)`.
    pub fn next_batch(&mut self, n: usize) -> (&[f32], &[i64], &[f64], &[u64]) {
        self.fill(n);
        (
            &self.samples,
            &self.sample_numbers,
            &self.timestamps,
            &self.event_codes,
        )
    }

    fn fill(&mut self, n: usize) {
        self.samples.resize(self.num_channels * n, 0.0);
        self.sample_numbers.clear();
        self.timestamps.clear();
        self.event_codes.clear();
        for i in 0..n {
            let s = self.next_sample_number + i as i64;
            self.sample_numbers.push(s);
            self.timestamps.push(s as f64 / self.sample_rate);
            let code = if self.ttl_period > 0 {
                ((s / self.ttl_period) & 1) as u64
            } else {
                0
            };
            self.event_codes.push(code);
            for chan in 0..self.num_channels {
                self.samples[chan * n + i] = Self::value(chan, s);
            }
        }
        self.next_sample_number += n as i64;
    }
}

/// Run `stream` on its own thread, writing `batches` batches of `batch`
/// columns with `pace` between them. The writer comes back on join.
pub fn spawn_acquisition(
    mut writer: BufferWriter,
    mut stream: SyntheticStream,
    batch: usize,
    batches: usize,
    pace: Duration,
) -> JoinHandle<BufferWriter> {
    thread::spawn(move || {
        for _ in 0..batches {
            stream.write_batch(&mut writer, batch);
            if !pace.is_zero() {
                thread::sleep(pace);
            }
        }
        writer
    })
}
