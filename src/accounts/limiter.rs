// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Harbor Systems

//! Token limiter gating the account-creation path.
//!
//! Creation jobs can queue up in bursts; taking a token immediately before
//! building the transaction keeps reference blocks and sequence numbers
//! fresh at actual submission time instead of queueing time. The limiter
//! paces takers evenly (one token per interval) and must be safe for
//! concurrent acquisition across all worker tasks.

use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

/// Paces calls to one per interval; unlimited by default.
pub struct CreationLimiter {
    interval: Option<Duration>,
    next_slot: Mutex<Option<Instant>>,
}

impl CreationLimiter {
    /// No pacing: `take` returns immediately.
    pub fn unlimited() -> Self {
        Self {
            interval: None,
            next_slot: Mutex::new(None),
        }
    }

    /// Allow `per_second` tokens per second. Zero means unlimited.
    pub fn per_second(per_second: u32) -> Self {
        if per_second == 0 {
            return Self::unlimited();
        }
        Self {
            interval: Some(Duration::from_secs(1) / per_second),
            next_slot: Mutex::new(None),
        }
    }

    /// Take one token, sleeping until the next slot when paced. Concurrent
    /// callers are serialized onto consecutive slots.
    pub async fn take(&self) {
        let Some(interval) = self.interval else { return };

        let slot = {
            let mut next_slot = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next_slot {
                Some(at) if at > now => at,
                _ => now,
            };
            *next_slot = Some(slot + interval);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn unlimited_never_sleeps() {
        let limiter = CreationLimiter::unlimited();
        let start = Instant::now();
        for _ in 0..100 {
            limiter.take().await;
        }
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_rate_means_unlimited() {
        let limiter = CreationLimiter::per_second(0);
        let start = Instant::now();
        limiter.take().await;
        assert_eq!(Instant::now(), start);
    }

    #[tokio::test(start_paused = true)]
    async fn paces_sequential_takers() {
        let limiter = CreationLimiter::per_second(10);
        let start = Instant::now();

        limiter.take().await; // immediate
        limiter.take().await; // +100ms
        limiter.take().await; // +200ms

        assert_eq!(Instant::now().duration_since(start), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_takers_get_consecutive_slots() {
        let limiter = std::sync::Arc::new(CreationLimiter::per_second(10));
        let start = Instant::now();

        let handles: Vec<_> = (0..3)
            .map(|_| {
                let limiter = limiter.clone();
                tokio::spawn(async move {
                    limiter.take().await;
                    Instant::now().duration_since(start)
                })
            })
            .collect();

        let mut elapsed = Vec::new();
        for handle in handles {
            elapsed.push(handle.await.unwrap());
        }
        elapsed.sort();

        assert_eq!(
            elapsed,
            vec![
                Duration::ZERO,
                Duration::from_millis(100),
                Duration::from_millis(200)
            ]
        );
    }
}
