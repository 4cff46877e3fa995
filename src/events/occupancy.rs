//! # Occupancy marker and lifecycle stage tag.
//!
//! The occupancy marker is a single atomic cell holding either 0 ("free") or
//! the wall-clock millisecond timestamp of the acquisition. One cell serves
//! both as the free/busy flag and as the tie-break ordering key that the
//! forced-reclaim path compares against its wait-start time.
//!
//! The [`Stage`] tag tracks where a carrier is in its delivery lifecycle.
//! It exists for diagnostics (double release, use after release); control
//! flow never branches on it.

use std::sync::atomic::{AtomicU64, AtomicU8, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Wall-clock milliseconds, clamped to at least 1 so a valid timestamp never
/// collides with the "free" sentinel.
pub(crate) fn clock_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or(0)
        .max(1)
}

/// Delivery lifecycle of an event carrier (diagnostics only).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Stage {
    /// Not occupied; ready for acquisition.
    Free = 0,
    /// A producer holds the carrier and is filling the payload.
    Acquired = 1,
    /// Enqueued into a dispatcher's immediate queue.
    Queued = 2,
    /// The consumer callback is running.
    Executing = 3,
    /// Delivery finished; release/bookkeeping in progress.
    PostProcessing = 4,
    /// Released back to the free pool of one.
    Released = 5,
}

pub(crate) struct StageCell(AtomicU8);

impl StageCell {
    pub(crate) fn new() -> Self {
        Self(AtomicU8::new(Stage::Free as u8))
    }

    pub(crate) fn get(&self) -> Stage {
        match self.0.load(Ordering::Relaxed) {
            1 => Stage::Acquired,
            2 => Stage::Queued,
            3 => Stage::Executing,
            4 => Stage::PostProcessing,
            5 => Stage::Released,
            _ => Stage::Free,
        }
    }

    pub(crate) fn set(&self, stage: Stage) {
        self.0.store(stage as u8, Ordering::Relaxed);
    }
}

/// The single-writer gate of a reusable carrier: 0 = free, nonzero = the
/// acquisition timestamp in wall-clock milliseconds.
pub(crate) struct OccupancyCell(AtomicU64);

impl OccupancyCell {
    /// A free cell, for dynamically acquired carriers.
    pub(crate) fn free() -> Self {
        Self(AtomicU64::new(0))
    }

    /// A cell stamped at construction, for statically bound carriers that
    /// skip the acquire/release protocol.
    pub(crate) fn stamped() -> Self {
        Self(AtomicU64::new(clock_ms()))
    }

    /// Atomically claims the cell if free. Returns the stored timestamp on
    /// success.
    pub(crate) fn try_claim(&self) -> Option<u64> {
        let now = clock_ms();
        self.0
            .compare_exchange(0, now, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| now)
    }

    /// Stamps the cell if it is still free; covers fire-and-forget sends on
    /// carriers that were never explicitly acquired. Loses gracefully to a
    /// concurrent claim.
    pub(crate) fn stamp_if_free(&self) {
        let now = clock_ms();
        let _ = self
            .0
            .compare_exchange(0, now, Ordering::SeqCst, Ordering::SeqCst);
    }

    /// Clears the cell; returns whether it was occupied.
    pub(crate) fn clear(&self) -> bool {
        self.0.swap(0, Ordering::SeqCst) != 0
    }

    /// Forcibly clears the cell, but only if the recorded acquisition
    /// strictly predates `than_ms` — proof that no newer acquisition raced
    /// the caller's wait.
    pub(crate) fn force_clear_if_older(&self, than_ms: u64) -> bool {
        loop {
            let ts = self.0.load(Ordering::SeqCst);
            if ts == 0 || ts >= than_ms {
                return false;
            }
            if self
                .0
                .compare_exchange(ts, 0, Ordering::SeqCst, Ordering::SeqCst)
                .is_ok()
            {
                return true;
            }
        }
    }

    pub(crate) fn get(&self) -> u64 {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn is_occupied(&self) -> bool {
        self.get() != 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_claim_succeeds_once() {
        let cell = OccupancyCell::free();
        assert!(cell.try_claim().is_some());
        assert!(cell.try_claim().is_none());
        assert!(cell.is_occupied());
    }

    #[test]
    fn test_clear_frees_the_cell() {
        let cell = OccupancyCell::free();
        cell.try_claim();
        assert!(cell.clear());
        assert!(!cell.clear(), "second clear must report already-free");
        assert!(cell.try_claim().is_some());
    }

    #[test]
    fn test_stamp_if_free_does_not_steal() {
        let cell = OccupancyCell::free();
        let ts = cell.try_claim().expect("fresh cell claims");
        cell.stamp_if_free();
        assert_eq!(cell.get(), ts, "stamp must not overwrite a live claim");
    }

    #[test]
    fn test_force_clear_respects_newer_claims() {
        let cell = OccupancyCell::free();
        let ts = cell.try_claim().expect("fresh cell claims");
        // A wait that started before the claim must not reclaim it.
        assert!(!cell.force_clear_if_older(ts));
        assert!(!cell.force_clear_if_older(ts.saturating_sub(10)));
        // A wait that started after the claim may.
        assert!(cell.force_clear_if_older(ts + 10));
        assert!(!cell.is_occupied());
    }

    #[test]
    fn test_stage_roundtrip() {
        let stage = StageCell::new();
        assert_eq!(stage.get(), Stage::Free);
        stage.set(Stage::Executing);
        assert_eq!(stage.get(), Stage::Executing);
        stage.set(Stage::Released);
        assert_eq!(stage.get(), Stage::Released);
    }
}
