//! Services layer - Business logic
//!
//! Services implement the business rules on top of the repositories:
//! - Account registration, login and server-side sessions
//! - Clocking in and out, time entry editing and the personal dashboard
//! - Pay rates and hour limits
//! - Staff reports over calendar windows

pub mod account;
pub mod password;
pub mod period;
pub mod records;
pub mod report;
pub mod time_entry;

pub use account::{AccountService, AccountServiceError};
pub use password::{hash_password, validate_password_strength, verify_password};
pub use period::Window;
pub use records::{HourLimitService, PayRateService, RecordServiceError};
pub use report::{AdminSummary, PayReport, PeriodUsage, ReportService, ReportServiceError};
pub use time_entry::{DashboardSummary, TimeEntryService, TimeEntryServiceError};
