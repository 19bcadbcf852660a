//! [`MissGuard`] – lost-target detector.
//!
//! Counts consecutive cycles without a verified detection.  Once the count
//! reaches the threshold [`MissGuard::record_miss`] returns `true`, meaning
//! the controller should stop tracking and fall back to `Idle`.  Any
//! detection resets the count.
//!
//! # Example
//!
//! ```rust
//! use turret_runtime::miss_guard::MissGuard;
//!
//! let mut guard = MissGuard::new(3);
//!
//! assert!(!guard.record_miss());
//! assert!(!guard.record_miss());
//! assert!(guard.record_miss()); // third empty cycle → target lost
//!
//! // A detection clears the streak.
//! guard.reset();
//! assert!(!guard.record_miss());
//! ```

// ─────────────────────────────────────────────────────────────────────────────
// MissGuard
// ─────────────────────────────────────────────────────────────────────────────

/// Tracks how many cycles in a row produced no detection.
#[derive(Debug, Clone)]
pub struct MissGuard {
    /// Consecutive misses that count as "target lost".
    threshold: u32,
    misses: u32,
}

impl MissGuard {
    /// A `threshold` of 0 is treated as 1.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold: threshold.max(1),
            misses: 0,
        }
    }

    /// Record an empty cycle.  Returns `true` once `threshold` misses have
    /// been recorded in a row; stays `true` until [`reset`][Self::reset].
    pub fn record_miss(&mut self) -> bool {
        self.misses = self.misses.saturating_add(1);
        self.is_lost()
    }

    pub fn is_lost(&self) -> bool {
        self.misses >= self.threshold
    }

    pub fn misses(&self) -> u32 {
        self.misses
    }

    pub fn threshold(&self) -> u32 {
        self.threshold
    }

    /// Clear the streak after a detection.
    pub fn reset(&mut self) {
        self.misses = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn triggers_at_threshold() {
        let mut guard = MissGuard::new(3);
        assert!(!guard.record_miss());
        assert!(!guard.record_miss());
        assert!(guard.record_miss());
        assert!(guard.record_miss()); // still lost
        assert_eq!(guard.misses(), 4);
    }

    #[test]
    fn reset_breaks_streak() {
        let mut guard = MissGuard::new(2);
        guard.record_miss();
        guard.reset();
        assert!(!guard.record_miss());
        assert_eq!(guard.misses(), 1);
    }

    #[test]
    fn zero_threshold_behaves_as_one() {
        let mut guard = MissGuard::new(0);
        assert_eq!(guard.threshold(), 1);
        assert!(guard.record_miss());
    }
}
