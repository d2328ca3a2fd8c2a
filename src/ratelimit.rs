use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Fixed window of the public data API budget.
pub const RATE_LIMIT_PERIOD: Duration = Duration::from_secs(10);

struct Window {
    started: Instant,
    calls: u32,
}

/// Fixed-window call budget shared by every caller in the process.
///
/// `acquire` never fails: when the window's budget is spent the caller sleeps
/// until the window rolls over.
pub struct RateLimiter {
    max_calls: u32,
    period: Duration,
    window: Mutex<Window>,
}

impl RateLimiter {
    pub fn new(max_calls: u32, period: Duration) -> Self {
        Self {
            max_calls: max_calls.max(1),
            period,
            window: Mutex::new(Window {
                started: Instant::now(),
                calls: 0,
            }),
        }
    }

    /// Wait until one call fits in the budget, then consume it.
    pub async fn acquire(&self) {
        loop {
            let wait = {
                let mut window = self.window.lock();
                let now = Instant::now();
                if now.duration_since(window.started) >= self.period {
                    window.started = now;
                    window.calls = 0;
                }
                if window.calls < self.max_calls {
                    window.calls += 1;
                    return;
                }
                self.period
                    .saturating_sub(now.duration_since(window.started))
            };
            debug!(
                "Rate limit reached ({} calls / {:?}), sleeping {wait:?}",
                self.max_calls, self.period
            );
            tokio::time::sleep(wait).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[tokio::test(start_paused = true)]
    async fn calls_within_budget_do_not_wait() {
        let limiter = RateLimiter::new(3, RATE_LIMIT_PERIOD);
        let start = Instant::now();
        for _ in 0..3 {
            limiter.acquire().await;
        }
        assert_eq!(start.elapsed(), Duration::ZERO);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_budget_blocks_until_next_window() {
        let limiter = RateLimiter::new(2, RATE_LIMIT_PERIOD);
        let start = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;
        assert!(start.elapsed() >= RATE_LIMIT_PERIOD);
        assert!(start.elapsed() < RATE_LIMIT_PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn budget_is_shared_across_tasks() {
        let limiter = Arc::new(RateLimiter::new(2, RATE_LIMIT_PERIOD));
        let start = Instant::now();
        let handles: Vec<_> = (0..5)
            .map(|_| {
                let limiter = Arc::clone(&limiter);
                tokio::spawn(async move {
                    limiter.acquire().await;
                    Instant::now()
                })
            })
            .collect();

        let mut finished = Vec::new();
        for handle in handles {
            finished.push(handle.await.unwrap().duration_since(start));
        }
        finished.sort();
        // 2 calls per window: 2 immediately, 2 after one period, 1 after two
        assert!(finished[1] < RATE_LIMIT_PERIOD);
        assert!(finished[2] >= RATE_LIMIT_PERIOD);
        assert!(finished[4] >= RATE_LIMIT_PERIOD * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_budget_is_clamped_to_one() {
        let limiter = RateLimiter::new(0, Duration::from_secs(1));
        let start = Instant::now();
        limiter.acquire().await;
        assert_eq!(start.elapsed(), Duration::ZERO);
    }
}
