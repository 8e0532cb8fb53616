//! Rate limiting utilities

use governor::{
    clock::DefaultClock,
    state::{InMemoryState, NotKeyed},
    Quota, RateLimiter,
};
use std::num::NonZeroU32;
use std::sync::Arc;

/// Rate limiter type alias
pub type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Create a rate limiter with the specified requests per second
pub fn create_limiter(requests_per_second: u32) -> Arc<Limiter> {
    let quota = Quota::per_second(NonZeroU32::new(requests_per_second).unwrap_or(NonZeroU32::MIN));
    Arc::new(RateLimiter::direct(quota))
}

/// Headroom over the simulation rate so a client sending one input per
/// frame at a higher frame rate is not throttled
pub const INPUT_RATE_HEADROOM: u32 = 2;

/// Per-connection rate limiter state
#[derive(Clone)]
pub struct ConnectionRateLimiter {
    input_limiter: Arc<Limiter>,
}

impl ConnectionRateLimiter {
    /// Allow `INPUT_RATE_HEADROOM` times the simulation rate
    pub fn new(simulation_tps: u32) -> Self {
        Self {
            input_limiter: create_limiter(simulation_tps.saturating_mul(INPUT_RATE_HEADROOM)),
        }
    }

    /// Check if an input message is allowed (returns true if allowed)
    pub fn check_input(&self) -> bool {
        self.input_limiter.check().is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_burst_beyond_quota_is_refused() {
        let limiter = ConnectionRateLimiter::new(5);
        let allowed = (0..50).filter(|_| limiter.check_input()).count();
        assert!(allowed >= 1);
        assert!(allowed < 50);
    }
}
