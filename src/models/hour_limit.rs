//! Hour limit model
//!
//! One limit per period. Usage is reported as a percentage of `max_hours`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Aggregation window for an hour limit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    Weekly,
    Monthly,
}

impl Period {
    pub const ALL: [Period; 2] = [Period::Weekly, Period::Monthly];

    pub fn as_str(&self) -> &'static str {
        match self {
            Period::Weekly => "weekly",
            Period::Monthly => "monthly",
        }
    }
}

impl fmt::Display for Period {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Period {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            _ => Err(anyhow::anyhow!("Invalid period: {}", s)),
        }
    }
}

/// Maximum hours for a period
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HourLimit {
    pub id: i64,
    pub period: Period,
    /// Two decimal places, non-negative
    pub max_hours: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HourLimit {
    /// Share of the limit used by `hours`, in percent
    pub fn usage_percent(&self, hours: f64) -> f64 {
        usage_percent(hours, Some(self.max_hours))
    }
}

/// `hours / max_hours * 100`, or 0 when there is no usable limit
pub fn usage_percent(hours: f64, max_hours: Option<f64>) -> f64 {
    match max_hours {
        Some(max) if max > 0.0 => hours / max * 100.0,
        _ => 0.0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_period_display_and_parse() {
        assert_eq!(Period::Weekly.to_string(), "weekly");
        assert_eq!(Period::from_str("MONTHLY").unwrap(), Period::Monthly);
        assert!(Period::from_str("daily").is_err());
    }

    #[test]
    fn test_usage_percent() {
        assert_eq!(usage_percent(42.0, Some(40.0)), 105.0);
        assert_eq!(usage_percent(80.0, Some(160.0)), 50.0);
        assert_eq!(usage_percent(10.0, Some(0.0)), 0.0);
        assert_eq!(usage_percent(10.0, None), 0.0);
    }

    proptest! {
        #[test]
        fn prop_usage_scales_linearly(hours in 0.0f64..1000.0, max in 0.01f64..1000.0) {
            let pct = usage_percent(hours, Some(max));
            prop_assert!(pct >= 0.0);
            prop_assert!((pct * max / 100.0 - hours).abs() < 1e-6);
        }
    }
}
