//! Configuration for the aggregation core.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum supported monitor fan-in.
pub const K_MIN: u32 = 3;

/// Error raised when watermark thresholds are inconsistent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// The thresholds do not satisfy `K >= H >= L >= 0` with `K >= 3`.
    #[error("thresholds do not satisfy K >= H >= L >= 0 with K >= 3: (K: {k}, H: {h}, L: {l})")]
    InvalidThresholds {
        /// Monitor fan-in.
        k: u32,
        /// High watermark.
        h: u32,
        /// Low watermark.
        l: u32,
    },
}

/// Watermark parameters of the aggregation core.
///
/// `monitors_per_node` (`K`) is the expected number of monitors observing
/// each node and bounds the size of a report set. `high_watermark` (`H`)
/// is the number of distinct reporters required to declare a destination
/// stable; `low_watermark` (`L`) the number required to declare it
/// interesting, which delays emission until it stabilizes too.
///
/// # Examples
///
/// ```
/// use cohort_membership::MembershipConfig;
///
/// let config = MembershipConfig::default();
/// assert!(config.validate().is_ok());
///
/// let config = MembershipConfig {
///     monitors_per_node: 10,
///     high_watermark: 3,
///     low_watermark: 2,
/// };
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MembershipConfig {
    /// Expected monitors per node (`K`). Must be at least [`K_MIN`].
    pub monitors_per_node: u32,

    /// Stability threshold (`H`). Must not exceed `monitors_per_node`.
    pub high_watermark: u32,

    /// Suspicion threshold (`L`). Must not exceed `high_watermark`.
    pub low_watermark: u32,
}

impl Default for MembershipConfig {
    fn default() -> Self {
        Self {
            monitors_per_node: 10,
            high_watermark: 9,
            low_watermark: 3,
        }
    }
}

impl MembershipConfig {
    /// Validates the threshold relationships.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidThresholds`] if `H > K`, `L > H`, or
    /// `K < 3`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (k, h, l) = (
            self.monitors_per_node,
            self.high_watermark,
            self.low_watermark,
        );
        if h > k || l > h || k < K_MIN {
            return Err(ConfigError::InvalidThresholds { k, h, l });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_valid() {
        assert!(MembershipConfig::default().validate().is_ok());
    }

    #[test]
    fn test_rejects_small_fan_in() {
        let config = MembershipConfig {
            monitors_per_node: 2,
            high_watermark: 2,
            low_watermark: 1,
        };
        assert_eq!(
            config.validate(),
            Err(ConfigError::InvalidThresholds { k: 2, h: 2, l: 1 })
        );
    }

    #[test]
    fn test_rejects_high_above_fan_in() {
        let config = MembershipConfig {
            monitors_per_node: 4,
            high_watermark: 5,
            low_watermark: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_rejects_low_above_high() {
        let config = MembershipConfig {
            monitors_per_node: 10,
            high_watermark: 3,
            low_watermark: 4,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_equal_thresholds_are_valid() {
        let config = MembershipConfig {
            monitors_per_node: 3,
            high_watermark: 3,
            low_watermark: 3,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_zero_low_watermark_is_valid() {
        let config = MembershipConfig {
            monitors_per_node: 10,
            high_watermark: 3,
            low_watermark: 0,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_error_message_names_all_thresholds() {
        let err = ConfigError::InvalidThresholds { k: 2, h: 5, l: 7 };
        let message = err.to_string();
        assert!(message.contains("K: 2"));
        assert!(message.contains("H: 5"));
        assert!(message.contains("L: 7"));
    }

    #[test]
    fn test_serde_round_trip() {
        let config = MembershipConfig {
            monitors_per_node: 10,
            high_watermark: 3,
            low_watermark: 2,
        };

        let json = serde_json::to_string(&config).unwrap();
        let deserialized: MembershipConfig = serde_json::from_str(&json).unwrap();

        assert_eq!(config, deserialized);
    }
}
