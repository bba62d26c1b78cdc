//! Tunables of the depot service and its sweeper.

use ferry_core::DEFAULT_TTL;
use jiff::SignedDuration;
use std::time::Duration;
use thiserror::Error;
use typed_builder::TypedBuilder;

pub const DEFAULT_MAX_MINT_ATTEMPTS: u32 = 50;
pub const DEFAULT_DISPOSAL_DELAY: Duration = Duration::from_secs(1);
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(2 * 60 * 60);
pub const DEFAULT_ORPHAN_GRACE: SignedDuration = SignedDuration::from_mins(10);
/// Upper bound on the ttl, keeping every expiry well inside the timestamp range.
pub const MAX_TTL: SignedDuration = SignedDuration::from_hours(24 * 365);

/// Configuration for [`DepotService`](crate::DepotService) and
/// [`Sweeper`](crate::Sweeper).
///
/// # Example
///
/// ```rust
/// use ferry_depot::DepotConfig;
/// use std::time::Duration;
///
/// // 24 h TTL, 50 mint attempts, 1 s disposal delay, 2 h sweeps
/// let config = DepotConfig::builder().build();
///
/// let config = DepotConfig::builder()
///     .max_mint_attempts(10)
///     .disposal_delay(Duration::ZERO)
///     .build();
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, TypedBuilder)]
pub struct DepotConfig {
    /// Lifetime of a record, counted from its creation.
    #[builder(default = DEFAULT_TTL)]
    pub ttl: SignedDuration,

    /// Codes drawn before creation gives up with `CodeSpaceExhausted`.
    #[builder(default = DEFAULT_MAX_MINT_ATTEMPTS)]
    pub max_mint_attempts: u32,

    /// Delay between the last permitted download and the removal of the
    /// blob, leaving time for the response to finish streaming.
    #[builder(default = DEFAULT_DISPOSAL_DELAY)]
    pub disposal_delay: Duration,

    /// Period of the background sweep.
    #[builder(default = DEFAULT_SWEEP_INTERVAL)]
    pub sweep_interval: Duration,

    /// Minimum age of an unowned blob before the sweeper removes it.
    #[builder(default = DEFAULT_ORPHAN_GRACE)]
    pub orphan_grace: SignedDuration,
}

impl Default for DepotConfig {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl DepotConfig {
    /// Converts a ttl given in whole hours, rejecting values too large to
    /// represent instead of overflowing.
    pub fn ttl_from_hours(hours: i64) -> Result<SignedDuration, ConfigError> {
        hours
            .checked_mul(60 * 60)
            .map(SignedDuration::from_secs)
            .ok_or(ConfigError::TtlHoursOutOfRange(hours))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.ttl.is_positive() || self.ttl > MAX_TTL {
            return Err(ConfigError::InvalidTtl(self.ttl));
        }
        if self.max_mint_attempts == 0 {
            return Err(ConfigError::InvalidMintAttempts);
        }
        if self.sweep_interval.is_zero() {
            return Err(ConfigError::InvalidSweepInterval);
        }
        if self.orphan_grace.is_negative() {
            return Err(ConfigError::InvalidOrphanGrace(self.orphan_grace));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Error)]
pub enum ConfigError {
    #[error("ttl must be positive and at most 365 days, got {0:#}")]
    InvalidTtl(SignedDuration),
    #[error("ttl of {0} hours is out of range")]
    TtlHoursOutOfRange(i64),
    #[error("at least one mint attempt is required")]
    InvalidMintAttempts,
    #[error("sweep interval must be non-zero")]
    InvalidSweepInterval,
    #[error("orphan grace must not be negative, got {0:#}")]
    InvalidOrphanGrace(SignedDuration),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = DepotConfig::default();
        assert_eq!(config.ttl, SignedDuration::from_hours(24));
        assert_eq!(config.max_mint_attempts, 50);
        assert_eq!(config.disposal_delay, Duration::from_secs(1));
        assert_eq!(config.sweep_interval, Duration::from_secs(7200));
        assert_eq!(config.orphan_grace, SignedDuration::from_mins(10));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_custom_config() {
        let config = DepotConfig::builder()
            .ttl(SignedDuration::from_hours(1))
            .max_mint_attempts(3)
            .build();

        assert_eq!(config.ttl, SignedDuration::from_hours(1));
        assert_eq!(config.max_mint_attempts, 3);
        assert_eq!(config.disposal_delay, DEFAULT_DISPOSAL_DELAY);
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let config = DepotConfig::builder().ttl(SignedDuration::ZERO).build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTtl(_))));

        let config = DepotConfig::builder()
            .ttl(MAX_TTL + SignedDuration::from_secs(1))
            .build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTtl(_))));

        let config = DepotConfig::builder().max_mint_attempts(0).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidMintAttempts)
        ));

        let config = DepotConfig::builder().sweep_interval(Duration::ZERO).build();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidSweepInterval)
        ));
    }

    #[test]
    fn test_ttl_from_hours() {
        assert_eq!(
            DepotConfig::ttl_from_hours(24).unwrap(),
            SignedDuration::from_hours(24)
        );
        assert!(matches!(
            DepotConfig::ttl_from_hours(i64::MAX),
            Err(ConfigError::TtlHoursOutOfRange(i64::MAX))
        ));

        let huge = DepotConfig::ttl_from_hours(1_000_000_000).unwrap();
        let config = DepotConfig::builder().ttl(huge).build();
        assert!(matches!(config.validate(), Err(ConfigError::InvalidTtl(_))));
    }
}
