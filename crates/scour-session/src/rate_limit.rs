//! Minimum-interval throttle with exponential backoff for outbound
//! search requests. This paces calls; it is not a concurrency limiter.

use parking_lot::Mutex;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::errors::{Result, SessionError};

#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Minimum interval between requests when the backend is healthy.
    pub initial_delay: Duration,
    /// Ceiling for the backed-off interval.
    pub max_delay: Duration,
    /// Interval multiplier applied on each throttling signal.
    pub retry_multiplier: f64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(30),
            retry_multiplier: 2.0,
        }
    }
}

impl RateLimiterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.initial_delay.is_zero() {
            return Err(SessionError::InvalidConfig(
                "initial_delay must be greater than 0".into(),
            ));
        }
        if self.max_delay < self.initial_delay {
            return Err(SessionError::InvalidConfig(
                "max_delay must be greater than or equal to initial_delay".into(),
            ));
        }
        if self.retry_multiplier <= 1.0 {
            return Err(SessionError::InvalidConfig(
                "retry_multiplier must be greater than 1.0".into(),
            ));
        }
        Ok(())
    }
}

struct State {
    last_request: Option<Instant>,
    retry_after: Duration,
}

pub struct RateLimiter {
    config: RateLimiterConfig,
    state: Mutex<State>,
}

impl RateLimiter {
    pub fn new(config: RateLimiterConfig) -> Result<Self> {
        config.validate()?;
        let retry_after = config.initial_delay;
        Ok(Self {
            config,
            state: Mutex::new(State {
                last_request: None,
                retry_after,
            }),
        })
    }

    /// Block until at least the current interval has elapsed since the
    /// previous request, then stamp the request time. The wait races
    /// against `cancel`; a cancelled wait leaves the stamp untouched.
    pub async fn wait_for_slot(&self, cancel: &CancellationToken) -> Result<()> {
        if cancel.is_cancelled() {
            return Err(SessionError::Cancelled);
        }
        let deadline = {
            let state = self.state.lock();
            state.last_request.map(|last| last + state.retry_after)
        };
        if let Some(deadline) = deadline {
            if deadline > Instant::now() {
                tokio::select! {
                    _ = cancel.cancelled() => return Err(SessionError::Cancelled),
                    _ = tokio::time::sleep_until(deadline) => {}
                }
            }
        }
        self.state.lock().last_request = Some(Instant::now());
        Ok(())
    }

    /// Escalate the interval after a throttling response, capped at the
    /// configured maximum.
    pub fn handle_too_many_requests(&self) {
        let mut state = self.state.lock();
        let next = state.retry_after.mul_f64(self.config.retry_multiplier);
        state.retry_after = next.min(self.config.max_delay);
        debug!(retry_after_ms = state.retry_after.as_millis() as u64, "backing off");
    }

    /// Restore the interval after a non-throttled success.
    pub fn reset(&self) {
        self.state.lock().retry_after = self.config.initial_delay;
    }

    /// The interval currently enforced between requests.
    pub fn current_delay(&self) -> Duration {
        self.state.lock().retry_after
    }
}
