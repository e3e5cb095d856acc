//! Global pacing for outbound requests
//!
//! One limiter is shared by the search pager and the content extractor, so
//! metadata pages and document downloads draw from the same budget. The
//! quota admits a single request per period with no burst, which turns the
//! token bucket into a fixed minimum delay between consecutive requests.

use governor::{
    clock::QuantaClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::sync::Arc;
use std::time::Duration;

type DirectLimiter = RateLimiter<NotKeyed, InMemoryState, QuantaClock>;

/// Cloneable handle to the shared limiter
#[derive(Clone)]
pub struct RequestPacer {
    limiter: Option<Arc<DirectLimiter>>,
    delay: Duration,
}

impl RequestPacer {
    /// Space requests at least `delay` apart. A zero delay disables pacing.
    pub fn new(delay: Duration) -> Self {
        let limiter = Quota::with_period(delay).map(|quota| Arc::new(RateLimiter::direct(quota)));

        Self { limiter, delay }
    }

    /// No pacing at all, for tests against local fixtures
    pub fn unlimited() -> Self {
        Self::new(Duration::ZERO)
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait until the next request may be sent
    pub async fn acquire(&self) {
        if let Some(limiter) = &self.limiter {
            limiter.until_ready().await;
        }
    }
}
