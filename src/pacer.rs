//! Reply pacing.
//!
//! A reply that arrives in a few milliseconds does not read like someone
//! typing. [`Pacer`] pads each round trip with a random delay so the total
//! latency lands inside a `[min, max]` window. Round trips that already
//! took `max` or longer are returned as they are.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rand::Rng;
use tokio::time::Instant;
use tracing::trace;

use crate::config::PacingConfig;
use crate::payload::{RequestPayload, ResponsePayload};

/// Anything that turns a request into a reply without failing.
#[async_trait]
pub trait Dispatch: Send + Sync {
    async fn dispatch(&self, request: RequestPayload) -> ResponsePayload;
}

#[async_trait]
impl<D: Dispatch + ?Sized> Dispatch for Arc<D> {
    async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
        (**self).dispatch(request).await
    }
}

/// How long to sleep after a round trip that took `elapsed`.
///
/// Drawn uniformly from `[min - elapsed, max - elapsed)`, with the lower
/// bound clamped at zero. Zero once `elapsed >= max`.
pub fn pacing_delay<R: Rng + ?Sized>(
    rng: &mut R,
    elapsed: Duration,
    min: Duration,
    max: Duration,
) -> Duration {
    if elapsed >= max {
        return Duration::ZERO;
    }
    let low = min.saturating_sub(elapsed);
    let high = max - elapsed;
    if low >= high {
        return low;
    }
    let nanos = rng.gen_range(low.as_nanos() as u64..high.as_nanos() as u64);
    Duration::from_nanos(nanos)
}

/// Dispatch through `dispatcher`, then pad the reply into `[min, max]`.
pub async fn dispatch_paced<D: Dispatch + ?Sized>(
    dispatcher: &D,
    request: RequestPayload,
    min: Duration,
    max: Duration,
) -> ResponsePayload {
    let start = Instant::now();
    let response = dispatcher.dispatch(request).await;
    let elapsed = start.elapsed();

    let delay = pacing_delay(&mut rand::thread_rng(), elapsed, min, max);
    trace!(
        elapsed_ms = elapsed.as_millis() as u64,
        delay_ms = delay.as_millis() as u64,
        "pacing reply"
    );
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
    response
}

/// A dispatcher wrapped with a latency window.
pub struct Pacer<D> {
    inner: D,
    min: Duration,
    max: Duration,
}

impl<D: Dispatch> Pacer<D> {
    /// `min` greater than `max` is treated as a fixed latency of `min`.
    pub fn new(inner: D, min: Duration, max: Duration) -> Self {
        Self {
            inner,
            min,
            max: max.max(min),
        }
    }

    pub fn from_config(inner: D, config: &PacingConfig) -> Self {
        Self::new(inner, config.min(), config.max())
    }

    pub fn inner(&self) -> &D {
        &self.inner
    }

    pub fn window(&self) -> (Duration, Duration) {
        (self.min, self.max)
    }

    pub async fn dispatch_paced(&self, request: RequestPayload) -> ResponsePayload {
        dispatch_paced(&self.inner, request, self.min, self.max).await
    }
}

#[async_trait]
impl<D: Dispatch> Dispatch for Pacer<D> {
    async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
        self.dispatch_paced(request).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    const MIN: Duration = Duration::from_secs(2);
    const MAX: Duration = Duration::from_secs(5);

    #[test]
    fn fast_round_trip_is_padded_into_window() {
        let mut rng = StdRng::seed_from_u64(7);
        for ms in [0u64, 10, 500, 1999, 2000, 3000, 4999] {
            let elapsed = Duration::from_millis(ms);
            for _ in 0..50 {
                let total = elapsed + pacing_delay(&mut rng, elapsed, MIN, MAX);
                assert!(total >= MIN, "{:?} below window", total);
                assert!(total < MAX, "{:?} above window", total);
            }
        }
    }

    #[test]
    fn slow_round_trip_is_not_padded() {
        let mut rng = StdRng::seed_from_u64(7);
        assert_eq!(pacing_delay(&mut rng, MAX, MIN, MAX), Duration::ZERO);
        assert_eq!(
            pacing_delay(&mut rng, Duration::from_secs(9), MIN, MAX),
            Duration::ZERO
        );
    }

    #[test]
    fn degenerate_window_is_fixed_delay() {
        let mut rng = StdRng::seed_from_u64(7);
        let window = Duration::from_millis(300);
        let delay = pacing_delay(&mut rng, Duration::from_millis(100), window, window);
        assert_eq!(delay, Duration::from_millis(200));
    }

    #[test]
    fn inverted_window_is_clamped() {
        struct Never;
        #[async_trait]
        impl Dispatch for Never {
            async fn dispatch(&self, request: RequestPayload) -> ResponsePayload {
                request.fallback_response("Ok")
            }
        }
        let pacer = Pacer::new(Never, Duration::from_secs(3), Duration::from_secs(1));
        assert_eq!(
            pacer.window(),
            (Duration::from_secs(3), Duration::from_secs(3))
        );
    }
}
