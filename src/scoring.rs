//! Point value for a correct answer, decaying with response time.

use std::time::Duration;

pub const MAX_POINTS: u32 = 100;
pub const MIN_POINTS: u32 = 10;
pub const DECAY_PER_SECOND: u32 = 5;

/// Points awarded for a correct answer submitted `elapsed` after the
/// question became active. Always positive, never above `MAX_POINTS`, and
/// non-increasing in `elapsed`. Incorrect answers score zero and never reach
/// this function.
pub fn score_for(elapsed: Duration) -> u32 {
    let decay = elapsed.as_secs().saturating_mul(DECAY_PER_SECOND as u64);
    (MAX_POINTS as u64)
        .saturating_sub(decay)
        .max(MIN_POINTS as u64) as u32
}
