//! Form objects
//!
//! Forms are deserialized from `application/x-www-form-urlencoded` bodies and
//! validated into the inputs the services accept. A failed validation yields
//! [`FormErrors`], which the handlers render next to the submitted values.

mod auth;
mod time_entry;

pub use auth::{LoginForm, RegistrationForm};
pub use time_entry::{parse_local_datetime, ClockInForm, TimeEntryForm};

use serde::Serialize;
use std::collections::BTreeMap;

pub const REQUIRED: &str = "This field is required.";

/// Validation errors keyed by field name, plus errors about the form as a whole
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FormErrors {
    pub fields: BTreeMap<String, Vec<String>>,
    pub non_field: Vec<String>,
}

impl FormErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, field: &str, message: impl Into<String>) {
        self.fields
            .entry(field.to_string())
            .or_default()
            .push(message.into());
    }

    pub fn add_non_field(&mut self, message: impl Into<String>) {
        self.non_field.push(message.into());
    }

    pub fn has(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn field(&self, field: &str) -> &[String] {
        self.fields.get(field).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty() && self.non_field.is_empty()
    }

    /// `Ok(value)` when nothing was recorded
    pub fn into_result<T>(self, value: T) -> Result<T, FormErrors> {
        if self.is_empty() {
            Ok(value)
        } else {
            Err(self)
        }
    }
}
