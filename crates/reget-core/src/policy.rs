//! Process-wide bandwidth limit shared by all running transfers.

use std::sync::atomic::{AtomicU64, Ordering};

/// A single bytes-per-second cap, 0 = unlimited.
///
/// Read lock-free by every running transfer at each throttle check, written
/// only from the control thread. Limit changes take effect on the next check
/// of every job; nothing is snapshotted at transfer start.
#[derive(Debug, Default)]
pub struct BandwidthPolicy {
    limit_bps: AtomicU64,
}

impl BandwidthPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the limit. Negative values clamp to 0 (unlimited).
    pub fn set_limit(&self, bps: i64) {
        self.limit_bps.store(bps.max(0) as u64, Ordering::Release);
    }

    pub fn limit(&self) -> u64 {
        self.limit_bps.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negative_limit_clamps_to_unlimited() {
        let policy = BandwidthPolicy::new();
        policy.set_limit(-500);
        assert_eq!(policy.limit(), 0);

        policy.set_limit(65536);
        assert_eq!(policy.limit(), 65536);

        policy.set_limit(0);
        assert_eq!(policy.limit(), 0);
    }
}
