//! Account model
//!
//! An account is the identity every time entry, pay rate and session hangs off.
//! Staff accounts may open the aggregate dashboard and the pay report.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A registered account
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Unique identifier
    pub id: i64,
    /// Username (unique, case-insensitive)
    pub username: String,
    /// Email address (unique)
    pub email: String,
    /// Password hash (argon2)
    #[serde(skip_serializing)]
    pub password_hash: String,
    /// May view staff pages
    pub is_staff: bool,
    /// Inactive accounts cannot log in
    pub is_active: bool,
    /// Creation timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Account {
    /// Create an active, non-staff account.
    ///
    /// The password must already be hashed with `services::password::hash_password()`.
    pub fn new(username: String, email: String, password_hash: String) -> Self {
        let now = Utc::now();
        Self {
            id: 0,
            username,
            email,
            password_hash,
            is_staff: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    /// Whether the account may open staff-only pages
    pub fn can_view_staff_pages(&self) -> bool {
        self.is_active && self.is_staff
    }
}

/// Input for creating an account (before password hashing)
#[derive(Debug, Clone)]
pub struct CreateAccountInput {
    pub username: String,
    pub email: String,
    /// Plaintext password (will be hashed)
    pub password: String,
    pub is_staff: bool,
}
