//! Reconnect backoff for the push channel.
//!
//! # Policy
//!
//! - Initial delay: 500ms
//! - Max delay: 8 seconds
//! - Jitter: down-jitter up to 25% (multiplier in [0.75, 1.0])
//! - The step counter resets once a connection is established.
//!
//! A server may override the base delay in two ways: a `retry:` field inside
//! the event stream (kept for the rest of the subscription), or a
//! `Retry-After` / `Retry-After-Ms` header on a rejected connection attempt
//! (used for that attempt only).

use std::time::Duration;

use reqwest::header::HeaderMap;
use ribbon_config::ReconnectConfig;

/// Backoff configuration for reconnect attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffConfig {
    /// Delay before the first reconnect attempt.
    pub initial_delay: Duration,
    pub max_delay: Duration,
    /// Jitter factor for down-jitter (0.25 = up to 25% reduction).
    pub jitter_factor: f64,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter_factor: 0.25,
        }
    }
}

impl From<&ReconnectConfig> for BackoffConfig {
    fn from(config: &ReconnectConfig) -> Self {
        Self {
            initial_delay: Duration::from_millis(config.initial_delay_ms),
            max_delay: Duration::from_millis(config.max_delay_ms.max(config.initial_delay_ms)),
            jitter_factor: if config.jitter_factor.is_finite() {
                config.jitter_factor.clamp(0.0, 1.0)
            } else {
                BackoffConfig::default().jitter_factor
            },
        }
    }
}

/// Parse `Retry-After` or `Retry-After-Ms` headers.
///
/// Returns `Some(duration)` if a valid value is found and `0 < duration < 60s`.
/// Returns `None` if headers are missing, invalid, or out of range.
#[must_use]
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    if let Some(val) = headers.get("retry-after-ms")
        && let Ok(s) = val.to_str()
        && let Ok(ms) = s.parse::<f64>()
        && ms > 0.0
        && ms < 60_000.0
    {
        return Some(Duration::from_secs_f64(ms / 1000.0));
    }

    if let Some(val) = headers.get("retry-after")
        && let Ok(s) = val.to_str()
        && let Ok(secs) = s.trim().parse::<u64>()
    {
        let duration = Duration::from_secs(secs);
        if duration > Duration::ZERO && duration < Duration::from_secs(60) {
            return Some(duration);
        }
    }

    None
}

/// Exponential backoff with down-jitter.
///
/// `backoff_step` is 0 before the first reconnect, 1 before the second, etc.
/// `base` replaces `config.initial_delay` when the server supplied one.
#[must_use]
pub fn calculate_reconnect_delay(
    backoff_step: u32,
    config: &BackoffConfig,
    base: Option<Duration>,
) -> Duration {
    let initial = base.unwrap_or(config.initial_delay);
    // Steps past 16 are capped by max_delay anyway.
    let exponent = i32::try_from(backoff_step.min(16)).unwrap_or(16);
    let delay = initial.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = delay.min(config.max_delay.max(initial).as_secs_f64());

    let jitter_factor = if config.jitter_factor.is_finite() {
        config.jitter_factor.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let jitter = 1.0 - rand::random::<f64>() * jitter_factor;
    Duration::try_from_secs_f64(capped * jitter).unwrap_or(config.max_delay)
}

/// Per-subscription reconnect state.
#[derive(Debug)]
pub(crate) struct Backoff {
    config: BackoffConfig,
    step: u32,
    server_delay: Option<Duration>,
}

impl Backoff {
    pub(crate) fn new(config: BackoffConfig) -> Self {
        Self {
            config,
            step: 0,
            server_delay: None,
        }
    }

    /// Delay before the next attempt. Headers from a rejected connection take
    /// precedence over the computed delay.
    pub(crate) fn next_delay(&mut self, headers: Option<&HeaderMap>) -> Duration {
        if let Some(delay) = headers.and_then(parse_retry_after) {
            self.step = self.step.saturating_add(1);
            return delay;
        }
        let delay = calculate_reconnect_delay(self.step, &self.config, self.server_delay);
        self.step = self.step.saturating_add(1);
        delay
    }

    pub(crate) fn reset(&mut self) {
        self.step = 0;
    }

    /// Record a `retry:` value from the event stream.
    pub(crate) fn set_server_delay(&mut self, delay: Duration) {
        self.server_delay = Some(delay);
    }

    #[cfg(test)]
    pub(crate) fn step(&self) -> u32 {
        self.step
    }
}
