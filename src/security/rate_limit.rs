//! Token bucket rate limiting.

use std::sync::{Mutex, PoisonError};
use std::time::Instant;

/// A token bucket with lazy refill.
///
/// Starts full. Tokens accrue at `rate` per second up to `capacity`, but
/// only whole tokens are credited: `last_refill` moves forward only when at
/// least one token was added, so fractional progress carries over to the
/// next call. There is no background timer.
#[derive(Debug)]
pub struct TokenBucket {
    capacity: u64,
    rate: u64,
    state: Mutex<BucketState>,
}

#[derive(Debug)]
struct BucketState {
    tokens: u64,
    last_refill: Instant,
}

impl TokenBucket {
    /// Create a full bucket holding `capacity` tokens refilled at `rate`
    /// tokens per second.
    pub fn new(capacity: u64, rate: u64) -> Self {
        Self {
            capacity,
            rate,
            state: Mutex::new(BucketState {
                tokens: capacity,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn capacity(&self) -> u64 {
        self.capacity
    }

    pub fn rate(&self) -> u64 {
        self.rate
    }

    /// Take one token if available.
    pub fn allow(&self) -> bool {
        self.allow_at(Instant::now())
    }

    fn allow_at(&self, now: Instant) -> bool {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);

        let elapsed = now.saturating_duration_since(state.last_refill).as_secs_f64();
        let new_tokens = (elapsed * self.rate as f64) as u64;
        if new_tokens > 0 {
            state.tokens = state.tokens.saturating_add(new_tokens).min(self.capacity);
            state.last_refill = now;
        }

        if state.tokens > 0 {
            state.tokens -= 1;
            true
        } else {
            false
        }
    }
}
