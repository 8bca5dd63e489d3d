//! Pay rate model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Hourly rate for one account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PayRate {
    pub id: i64,
    /// Owning account (at most one rate each)
    pub user_id: i64,
    /// Currency units per hour, two decimal places
    pub hourly_rate: f64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PayRate {
    /// Estimated pay for `hours` worked at this rate
    pub fn pay_for(&self, hours: f64) -> f64 {
        hours * self.hourly_rate
    }
}

/// A pay rate with its account's username
#[derive(Debug, Clone, Serialize)]
pub struct PayRateWithUser {
    #[serde(flatten)]
    pub rate: PayRate,
    pub username: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pay_for() {
        let rate = PayRate {
            id: 1,
            user_id: 1,
            hourly_rate: 20.0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(rate.pay_for(8.5), 170.0);
        assert_eq!(rate.pay_for(0.0), 0.0);
    }
}
