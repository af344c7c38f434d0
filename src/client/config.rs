// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Client configuration types.

use std::time::Duration;

use crate::error::ConfigError;

/// Endpoint of the `WeatherFlow` real-time feed; the token is appended.
pub const WEATHERFLOW_URL: &str = "wss://ws.weatherflow.com/swd/data?token=";

/// Default idle timeout before a silent connection is recycled.
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

/// Default timeout for the WebSocket handshake.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Builds the feed URL for an API token.
///
/// # Examples
///
/// ```
/// use weatherflow_lib::client::token_url;
///
/// assert_eq!(
///     token_url("abc 123"),
///     "wss://ws.weatherflow.com/swd/data?token=abc%20123"
/// );
/// ```
#[must_use]
pub fn token_url(token: &str) -> String {
    format!("{WEATHERFLOW_URL}{}", urlencoding::encode(token))
}

/// Resolved configuration of a [`Client`](super::Client).
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// WebSocket endpoint, including any credential query.
    pub url: String,
    /// A connection with no inbound frame for this long is recycled.
    pub idle_timeout: Duration,
    /// Maximum time for the WebSocket handshake.
    pub connect_timeout: Duration,
    /// Delay policy between reconnect attempts.
    pub backoff: BackoffPolicy,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            backoff: BackoffPolicy::default(),
        }
    }
}

/// Exponential delay between reconnect attempts.
///
/// The delay after `n` consecutive errors is `unit * base^n`, capped at
/// `max`, and zero when `n` is zero.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
/// use weatherflow_lib::client::BackoffPolicy;
///
/// let policy = BackoffPolicy::default();
/// assert_eq!(policy.delay_for(0), Duration::ZERO);
/// assert_eq!(policy.delay_for(1), Duration::from_secs(2));
/// assert_eq!(policy.delay_for(3), Duration::from_secs(8));
/// assert_eq!(policy.delay_for(10), Duration::from_secs(32));
///
/// // Millisecond units for tests
/// let fast = BackoffPolicy::new()
///     .with_unit(Duration::from_millis(10))
///     .with_max(Duration::from_millis(80));
/// assert_eq!(fast.delay_for(2), Duration::from_millis(40));
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct BackoffPolicy {
    /// Growth factor per error; must be greater than 1.
    pub base: f64,
    /// Time unit the factor is applied to.
    pub unit: Duration,
    /// Upper bound on any single delay.
    pub max: Duration,
}

impl BackoffPolicy {
    /// Creates a policy with default settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the growth factor.
    #[must_use]
    pub fn with_base(mut self, base: f64) -> Self {
        self.base = base;
        self
    }

    /// Sets the time unit.
    #[must_use]
    pub fn with_unit(mut self, unit: Duration) -> Self {
        self.unit = unit;
        self
    }

    /// Sets the maximum delay.
    #[must_use]
    pub fn with_max(mut self, max: Duration) -> Self {
        self.max = max;
        self
    }

    /// Checks that the policy actually backs off.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the base is not greater than 1, the unit is
    /// zero, or the maximum is below one unit.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base.is_finite() && self.base > 1.0) {
            return Err(ConfigError::InvalidBackoffBase(self.base));
        }
        if self.unit.is_zero() {
            return Err(ConfigError::ZeroBackoffUnit);
        }
        if self.max < self.unit {
            return Err(ConfigError::MaxBelowUnit);
        }
        Ok(())
    }

    /// Calculates the delay after `errors` consecutive errors.
    #[must_use]
    pub fn delay_for(&self, errors: u32) -> Duration {
        if errors == 0 {
            return Duration::ZERO;
        }

        let factor = self
            .base
            .powi(i32::try_from(errors).unwrap_or(i32::MAX));
        let secs = self.unit.as_secs_f64() * factor;

        if !secs.is_finite() || secs >= self.max.as_secs_f64() {
            return self.max;
        }
        Duration::from_secs_f64(secs).min(self.max)
    }
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base: 2.0,
            unit: Duration::from_secs(1),
            max: Duration::from_secs(32),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_defaults() {
        let config = ClientConfig::default();
        assert!(config.url.is_empty());
        assert_eq!(config.idle_timeout, Duration::from_secs(43_200));
        assert_eq!(config.connect_timeout, Duration::from_secs(10));
        assert_eq!(config.backoff, BackoffPolicy::default());
    }

    #[test]
    fn token_is_url_encoded() {
        assert_eq!(
            token_url("a/b&c"),
            "wss://ws.weatherflow.com/swd/data?token=a%2Fb%26c"
        );
    }

    #[test]
    fn delay_calculation() {
        let policy = BackoffPolicy::default();

        assert_eq!(policy.delay_for(0), Duration::ZERO);
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(4), Duration::from_secs(16));
        assert_eq!(policy.delay_for(5), Duration::from_secs(32));
        // Capped at max
        assert_eq!(policy.delay_for(6), Duration::from_secs(32));
        assert_eq!(policy.delay_for(u32::MAX), Duration::from_secs(32));
    }

    #[test]
    fn delays_are_monotonic_and_capped() {
        let policy = BackoffPolicy::new()
            .with_base(1.5)
            .with_unit(Duration::from_millis(100))
            .with_max(Duration::from_secs(5));

        let delays: Vec<_> = (1..=40).map(|n| policy.delay_for(n)).collect();
        assert!(delays.windows(2).all(|w| w[0] <= w[1]));
        assert!(delays.iter().all(|d| *d <= policy.max));
        assert_eq!(*delays.last().unwrap(), policy.max);
    }

    #[test]
    fn validate_rejects_flat_base() {
        assert_eq!(
            BackoffPolicy::new().with_base(1.0).validate(),
            Err(ConfigError::InvalidBackoffBase(1.0))
        );
        assert!(BackoffPolicy::new().with_base(0.5).validate().is_err());
        assert!(BackoffPolicy::new().with_base(f64::NAN).validate().is_err());
    }

    #[test]
    fn validate_rejects_bad_bounds() {
        assert_eq!(
            BackoffPolicy::new().with_unit(Duration::ZERO).validate(),
            Err(ConfigError::ZeroBackoffUnit)
        );
        assert_eq!(
            BackoffPolicy::new()
                .with_unit(Duration::from_secs(2))
                .with_max(Duration::from_secs(1))
                .validate(),
            Err(ConfigError::MaxBelowUnit)
        );
        assert!(BackoffPolicy::default().validate().is_ok());
    }
}
