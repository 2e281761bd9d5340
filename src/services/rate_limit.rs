// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Token bucket shared by every outgoing Bungie API call.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub const DEFAULT_MAX_TOKENS: u32 = 20;
pub const DEFAULT_RATE_PER_SECOND: u32 = 20;

/// How long a blocked `acquire` sleeps between refill attempts.
pub const POLL_INTERVAL: Duration = Duration::from_millis(100);

struct Bucket {
    tokens: u32,
    last_refill: Instant,
}

/// Token bucket with wall-clock refill.
///
/// Refill and check-and-decrement happen under one lock, so concurrent
/// acquirers can never both take the last token.
pub struct TokenBucket {
    max_tokens: u32,
    rate_per_second: u32,
    poll_interval: Duration,
    bucket: Mutex<Bucket>,
}

impl Default for TokenBucket {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS, DEFAULT_RATE_PER_SECOND)
    }
}

impl TokenBucket {
    /// Create a full bucket.
    pub fn new(max_tokens: u32, rate_per_second: u32) -> Self {
        Self {
            max_tokens,
            rate_per_second,
            poll_interval: POLL_INTERVAL,
            bucket: Mutex::new(Bucket {
                tokens: max_tokens,
                last_refill: Instant::now(),
            }),
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Wait until a token is available and take it.
    pub async fn acquire(&self) {
        let mut waited = false;
        loop {
            if self.try_acquire().await {
                if waited {
                    tracing::trace!("Rate limiter released waiting caller");
                }
                return;
            }
            if !waited {
                tracing::debug!("Rate limiter empty, waiting for refill");
                waited = true;
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    /// Take a token if one is available, without waiting.
    pub async fn try_acquire(&self) -> bool {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);

        if bucket.tokens > 0 {
            bucket.tokens -= 1;
            true
        } else {
            false
        }
    }

    /// Tokens currently in the pool (after refill).
    pub async fn available(&self) -> u32 {
        let mut bucket = self.bucket.lock().await;
        self.refill(&mut bucket);
        bucket.tokens
    }

    fn refill(&self, bucket: &mut Bucket) {
        let now = Instant::now();
        let elapsed_ms = now.duration_since(bucket.last_refill).as_millis();
        let new_tokens = elapsed_ms * u128::from(self.rate_per_second) / 1000;

        // Advancing the timestamp without adding tokens would drop the
        // fractional progress towards the next token.
        if new_tokens > 0 {
            let total = u128::from(bucket.tokens) + new_tokens;
            bucket.tokens = total.min(u128::from(self.max_tokens)) as u32;
            bucket.last_refill = now;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_starts_full_and_drains() {
        let bucket = TokenBucket::new(3, 1);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(bucket.try_acquire().await);
        assert!(!bucket.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_is_per_second() {
        let bucket = TokenBucket::new(20, 20);
        for _ in 0..20 {
            assert!(bucket.try_acquire().await);
        }
        assert_eq!(bucket.available().await, 0);

        // 20 tokens/s is one token per 50 ms
        tokio::time::advance(Duration::from_millis(49)).await;
        assert_eq!(bucket.available().await, 0);
        tokio::time::advance(Duration::from_millis(1)).await;
        assert_eq!(bucket.available().await, 1);
        tokio::time::advance(Duration::from_millis(100)).await;
        assert_eq!(bucket.available().await, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_partial_progress_is_kept() {
        let bucket = TokenBucket::new(1, 10);
        assert!(bucket.try_acquire().await);

        // Two polls at 60 ms each: the first adds nothing, so the second sees
        // 120 ms of accumulated time and yields a token.
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(!bucket.try_acquire().await);
        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(bucket.try_acquire().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_refill_clamps_to_capacity() {
        let bucket = TokenBucket::new(5, 20);
        tokio::time::advance(Duration::from_secs(60)).await;
        assert_eq!(bucket.available().await, 5);
    }
}
