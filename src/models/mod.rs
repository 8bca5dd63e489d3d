//! Data models
//!
//! Database entities (Account, Session, TimeEntry, PayRate, HourLimit) and the
//! inputs used to create or update them.

mod account;
mod hour_limit;
mod pay_rate;
mod session;
mod time_entry;

pub use account::{Account, CreateAccountInput};
pub use hour_limit::{usage_percent, HourLimit, Period};
pub use pay_rate::{PayRate, PayRateWithUser};
pub use session::Session;
pub use time_entry::{
    ceil_to_second, check_clock_order, hours_between, ClockOrderError, TimeEntry, TimeEntryInput, TimeEntryWithUser,
};

/// Round to two decimal places, the precision of stored rates and limits
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
