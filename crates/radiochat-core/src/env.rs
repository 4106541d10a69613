//! Environment abstraction for deterministic testing.
//!
//! Decouples synchronization logic from system resources (time, randomness).
//! Production uses the tokio clock and OS entropy; simulation uses a paused
//! clock, a settable wall clock and a seeded RNG.

use std::time::Duration;

/// Abstract environment providing time and randomness.
///
/// Implementations MUST guarantee that `now()` never goes backwards.
pub trait Environment: Clone + Send + Sync + 'static {
    /// Monotonic instant type used for deadlines and intervals.
    ///
    /// Production and simulation both use `tokio::time::Instant` so timers
    /// follow a paused test clock.
    type Instant: Copy + Ord + Send + Sync + std::ops::Sub<Output = Duration>;

    /// Current monotonic time.
    fn now(&self) -> Self::Instant;

    /// Wall-clock time as unix milliseconds.
    ///
    /// Used for message timestamps and generated ids, never for deadlines.
    fn wall_clock_millis(&self) -> i64;

    /// Fills the provided buffer with random bytes.
    fn random_bytes(&self, buffer: &mut [u8]);

    /// Generates a random `u64`.
    fn random_u64(&self) -> u64 {
        let mut bytes = [0u8; 8];
        self.random_bytes(&mut bytes);
        u64::from_be_bytes(bytes)
    }

    /// Picks an index in `0..len`. Returns 0 for an empty range.
    fn random_index(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.random_u64() % len as u64) as usize
    }
}
