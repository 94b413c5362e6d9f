//! Sequence-numbered publish cell for `f64` tuples.
//!
//! Lock-free odd/even protocol over atomics:
//! - Odd sequence = write in progress (reader must retry)
//! - Even sequence = committed (reader can use the values)
//!
//! Writers claim the cell by moving the sequence from even to odd with a
//! CAS, so concurrent writers serialize on a handful of stores instead of
//! tearing each other. Readers never write and never block a writer.
//!
//! A writer preempted mid-store leaves the sequence odd until it runs again.
//! Real-time readers therefore use [`SeqLockCell::load_bounded`] and keep
//! their own fallback; [`SeqLockCell::load`] is for non-RT callers only.

use core::hint::spin_loop;
use core::sync::atomic::{AtomicU32, AtomicU64, Ordering, fence};

/// Lock-free cell holding `N` `f64` values published as one unit.
#[derive(Debug)]
pub struct SeqLockCell<const N: usize> {
    seq: AtomicU32,
    slots: [AtomicU64; N],
}

impl<const N: usize> SeqLockCell<N> {
    /// Create a cell holding all zeros.
    pub const fn new() -> Self {
        Self {
            seq: AtomicU32::new(0),
            slots: [const { AtomicU64::new(0) }; N],
        }
    }

    /// Create a cell holding `values`.
    pub fn with_values(values: [f64; N]) -> Self {
        let cell = Self::new();
        cell.store(values);
        cell
    }

    /// Publish `values` as one consistent unit.
    pub fn store(&self, values: [f64; N]) {
        let start = self.claim();
        // Odd sequence must be visible before any slot store.
        fence(Ordering::Release);
        for (slot, value) in self.slots.iter().zip(values) {
            slot.store(value.to_bits(), Ordering::Relaxed);
        }
        // Commit: back to even.
        self.seq.store(start.wrapping_add(2), Ordering::Release);
    }

    /// Read the last committed values.
    ///
    /// Retries while a write is in progress. Unbounded: never call on the RT
    /// thread.
    pub fn load(&self) -> [f64; N] {
        loop {
            if let Some(values) = self.try_load() {
                return values;
            }
            spin_loop();
        }
    }

    /// Read with at most `max_attempts` tries.
    ///
    /// `None` if every attempt overlapped a write.
    pub fn load_bounded(&self, max_attempts: u32) -> Option<[f64; N]> {
        for _ in 0..max_attempts {
            if let Some(values) = self.try_load() {
                return Some(values);
            }
            spin_loop();
        }
        None
    }

    /// Single read attempt. `None` if a write overlapped the read.
    pub fn try_load(&self) -> Option<[f64; N]> {
        let before = self.seq.load(Ordering::Acquire);
        if before & 1 == 1 {
            return None;
        }
        let values = self
            .slots
            .each_ref()
            .map(|slot| f64::from_bits(slot.load(Ordering::Relaxed)));
        fence(Ordering::Acquire);
        let after = self.seq.load(Ordering::Relaxed);
        (before == after).then_some(values)
    }

    /// Number of committed writes since creation (wraps).
    #[inline]
    pub fn version(&self) -> u32 {
        self.seq.load(Ordering::Acquire) >> 1
    }

    /// Leave a write half-done, as a writer preempted mid-store would.
    #[cfg(test)]
    pub(crate) fn stall_writer(&self) {
        self.claim();
    }

    /// Move the sequence from even to odd, returning the even value.
    fn claim(&self) -> u32 {
        let mut current = self.seq.load(Ordering::Relaxed);
        loop {
            if current & 1 == 1 {
                spin_loop();
                current = self.seq.load(Ordering::Relaxed);
                continue;
            }
            match self.seq.compare_exchange_weak(
                current,
                current.wrapping_add(1),
                Ordering::Acquire,
                Ordering::Relaxed,
            ) {
                Ok(_) => return current,
                Err(observed) => current = observed,
            }
        }
    }
}

impl<const N: usize> Default for SeqLockCell<N> {
    fn default() -> Self {
        Self::new()
    }
}
