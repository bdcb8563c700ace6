use crate::config::RateLimitConfig;
use rand::Rng;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tokio_util::sync::CancellationToken;

/// Floor applied to every delay so consecutive mutations always yield.
const MIN_DELAY: Duration = Duration::from_millis(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    Elapsed,
    Cancelled,
}

/// Randomized spacing between consecutive mutations.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    min: Duration,
    max: Duration,
    tick: Duration,
}

impl RateLimiter {
    pub fn new(min: Duration, max: Duration, tick: Duration) -> Self {
        let min = min.max(MIN_DELAY);
        Self {
            min,
            max: max.max(min),
            tick: tick.max(MIN_DELAY),
        }
    }

    pub fn from_config(config: &RateLimitConfig, tick_ms: u64) -> Self {
        Self::new(
            Duration::from_millis(config.min_delay_ms),
            Duration::from_millis(config.max_delay_ms),
            Duration::from_millis(tick_ms),
        )
    }

    /// Uniformly random delay in `[min, max]`.
    pub fn next_delay(&self) -> Duration {
        self.next_delay_with(&mut rand::thread_rng())
    }

    pub fn next_delay_with<R: Rng + ?Sized>(&self, rng: &mut R) -> Duration {
        let min = self.min.as_millis() as u64;
        let max = self.max.as_millis() as u64;
        Duration::from_millis(rng.gen_range(min..=max))
    }

    /// Sleep for `duration`, reporting the time left every tick.
    ///
    /// Returns as soon as `cancel` fires; no tick is delivered after that.
    pub async fn await_with_countdown<F>(
        &self,
        duration: Duration,
        cancel: &CancellationToken,
        mut on_tick: F,
    ) -> WaitOutcome
    where
        F: FnMut(Duration),
    {
        let deadline = Instant::now() + duration;

        loop {
            if cancel.is_cancelled() {
                return WaitOutcome::Cancelled;
            }

            let left = deadline.saturating_duration_since(Instant::now());
            if left.is_zero() {
                return WaitOutcome::Elapsed;
            }
            on_tick(left);

            tokio::select! {
                _ = sleep(left.min(self.tick)) => {}
                _ = cancel.cancelled() => return WaitOutcome::Cancelled,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn limiter() -> RateLimiter {
        RateLimiter::new(
            Duration::from_secs(1),
            Duration::from_secs(3),
            Duration::from_millis(100),
        )
    }

    #[test]
    fn test_delays_stay_in_range() {
        let limiter = limiter();
        let mut rng = StdRng::seed_from_u64(7);

        for _ in 0..500 {
            let delay = limiter.next_delay_with(&mut rng);
            assert!(delay >= Duration::from_secs(1));
            assert!(delay <= Duration::from_secs(3));
        }
    }

    #[test]
    fn test_zero_range_is_clamped() {
        let limiter = RateLimiter::new(Duration::ZERO, Duration::ZERO, Duration::ZERO);
        assert_eq!(limiter.next_delay(), Duration::from_millis(1));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ticks_until_elapsed() {
        let limiter = limiter();
        let mut ticks = Vec::new();
        let start = Instant::now();

        let outcome = limiter
            .await_with_countdown(
                Duration::from_millis(1000),
                &CancellationToken::new(),
                |left| ticks.push(left),
            )
            .await;

        assert_eq!(outcome, WaitOutcome::Elapsed);
        assert_eq!(ticks.len(), 10);
        assert_eq!(ticks[0], Duration::from_millis(1000));
        assert!(ticks.windows(2).all(|w| w[0] > w[1]));
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_stops_on_cancel() {
        let limiter = limiter();
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut ticks = 0;

        let outcome = limiter
            .await_with_countdown(Duration::from_secs(10), &cancel, |_| {
                ticks += 1;
                if ticks == 3 {
                    trigger.cancel();
                }
            })
            .await;

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_already_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut ticked = false;

        let outcome = limiter()
            .await_with_countdown(Duration::from_secs(5), &cancel, |_| ticked = true)
            .await;

        assert_eq!(outcome, WaitOutcome::Cancelled);
        assert!(!ticked);
    }
}
