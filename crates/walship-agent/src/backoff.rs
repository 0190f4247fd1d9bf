//! Retry Backoff Schedule
//!
//! Retryable send failures back off 1 s, 2 s, 4 s, … capped at the
//! configured hard interval. Attempts are unbounded: the agent is a
//! best-effort shipper, and the operator stops it if the endpoint stays
//! down. The cap keeps restart-after-outage latency within the same bound
//! as time-based batch closes.

use std::time::Duration;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);

/// Delay before retry number `attempt` (0-indexed), capped at `cap`.
pub fn retry_backoff(attempt: u32, cap: Duration) -> Duration {
    let shift = attempt.min(20);
    INITIAL_BACKOFF.saturating_mul(1u32 << shift).min(cap)
}
