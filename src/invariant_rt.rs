//! RT-safe invariant signaling for the buffer's hot path.
//!
//! This module provides a two-tier invariant system:
//! - **Tier 1 (RT-safe)**: Lock-free signaling of invariant IDs from the reader
//! - **Tier 2 (Non-RT)**: Verification and contract testing on a monitor thread
//!
//! RT code **signals facts**. Non-RT code **judges correctness**.
//!
//! Signaling never allocates, never locks and never panics. When the queue is
//! full the signal is dropped.
//!
//! # Example
//!
//! ```ignore
//! let (tx, mut rx) = new_invariant_queue();
//! reader.attach_signals(tx);
//! reader.read_all_from_buffer(&mut block, &mut meta, 64);
//! let signals = drain_invariant_signals(&mut rx);
//! assert!(signals.contains(&INV_BLOCK_SHORT));
//! ```

use rtrb::{Consumer, Producer, RingBuffer};

// ============================================================================
// RT-Safe Invariant IDs (Tier 1)
// ============================================================================

/// A read filled the whole requested block.
pub const INV_BLOCK_FILLED: u8 = 1;

/// A read returned fewer columns than requested (underflow, not an error).
pub const INV_BLOCK_SHORT: u8 = 2;

/// The reader skipped columns the writer had already overwritten.
pub const INV_OVERRUN_SKIPPED: u8 = 3;

/// Columns overwritten while being copied were discarded.
pub const INV_TORN_COLUMNS_DISCARDED: u8 = 4;

/// Sample numbers in a read were non-decreasing.
pub const INV_SAMPLE_ORDER_KEPT: u8 = 5;

// ============================================================================
// Invariant Signal Queue
// ============================================================================

/// Capacity for invariant signal queue.
/// Large enough to hold several reads' worth of signals between drains.
pub const INVARIANT_QUEUE_CAPACITY: usize = 256;

/// Creates a new invariant signal queue pair.
///
/// Returns (producer for RT, consumer for main thread).
pub fn new_invariant_queue() -> (Producer<u8>, Consumer<u8>) {
    RingBuffer::new(INVARIANT_QUEUE_CAPACITY)
}

/// Signals an invariant from the RT path.
///
/// If the queue is full the signal is dropped.
#[inline]
pub fn signal_invariant(tx: &mut Producer<u8>, id: u8) {
    let _ = tx.push(id);
}

// ============================================================================
// Non-RT Verification (Tier 2)
// ============================================================================

/// Drains all pending invariant signals from the queue.
pub fn drain_invariant_signals(rx: &mut Consumer<u8>) -> Vec<u8> {
    let mut signals = Vec::with_capacity(rx.slots());
    while let Ok(id) = rx.pop() {
        signals.push(id);
    }
    signals
}

/// Counts occurrences of each invariant ID in a signal list.
pub fn count_invariant_signals(signals: &[u8]) -> [usize; 256] {
    let mut counts = [0usize; 256];
    for &id in signals {
        counts[id as usize] += 1;
    }
    counts
}

/// Contract verification: asserts that required invariants were signaled.
///
/// # Panics
/// Panics if any required invariant was not signaled at least once.
#[cfg(any(test, feature = "ppt"))]
pub fn contract_test_rt(contract_name: &str, signals: &[u8], required: &[u8]) {
    let counts = count_invariant_signals(signals);
    let missing: Vec<&str> = required
        .iter()
        .filter(|&&id| counts[id as usize] == 0)
        .map(|&id| invariant_name(id))
        .collect();

    if !missing.is_empty() {
        let present: std::collections::BTreeSet<&str> =
            signals.iter().map(|&id| invariant_name(id)).collect();

        panic!(
            "RT Contract '{}' missing invariants: {:?}. Present: {:?}",
            contract_name, missing, present
        );
    }
}

/// Maps invariant ID to human-readable name (for diagnostics only).
pub const fn invariant_name(id: u8) -> &'static str {
    match id {
        INV_BLOCK_FILLED => "BLOCK_FILLED",
        INV_BLOCK_SHORT => "BLOCK_SHORT",
        INV_OVERRUN_SKIPPED => "OVERRUN_SKIPPED",
        INV_TORN_COLUMNS_DISCARDED => "TORN_COLUMNS_DISCARDED",
        INV_SAMPLE_ORDER_KEPT => "SAMPLE_ORDER_KEPT",
        _ => "UNKNOWN",
    }
}
