//! Registration and login forms

use super::{FormErrors, REQUIRED};
use crate::models::CreateAccountInput;
use crate::services::account::{validate_email, validate_username};
use crate::services::password::validate_password_strength;
use serde::{Deserialize, Serialize};

pub const PASSWORD_MISMATCH: &str = "The two password fields didn't match.";

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct RegistrationForm {
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, skip_serializing)]
    pub password1: String,
    #[serde(default, skip_serializing)]
    pub password2: String,
}

impl RegistrationForm {
    /// Check every field; uniqueness is left to the account service.
    ///
    /// Password rule violations are attached to `password2`.
    pub fn validate(&self) -> Result<CreateAccountInput, FormErrors> {
        let mut errors = FormErrors::new();
        let username = self.username.trim();
        let email = self.email.trim();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if let Err(message) = validate_username(username) {
            errors.add("username", message);
        }

        if email.is_empty() {
            errors.add("email", REQUIRED);
        } else if let Err(message) = validate_email(email) {
            errors.add("email", message);
        }

        if self.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if self.password2.is_empty() {
            errors.add("password2", REQUIRED);
        }

        if !self.password1.is_empty() && !self.password2.is_empty() {
            if self.password1 != self.password2 {
                errors.add("password2", PASSWORD_MISMATCH);
            } else {
                for message in validate_password_strength(&self.password2, username, email) {
                    errors.add("password2", message);
                }
            }
        }

        errors.into_result(CreateAccountInput {
            username: username.to_string(),
            email: email.to_string(),
            password: self.password1.clone(),
            is_staff: false,
        })
    }
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoginForm {
    #[serde(default)]
    pub username: String,
    #[serde(default, skip_serializing)]
    pub password: String,
    /// Where to go after logging in
    #[serde(default)]
    pub next: Option<String>,
}

impl LoginForm {
    pub fn validate(&self) -> Result<(), FormErrors> {
        let mut errors = FormErrors::new();
        if self.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if self.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(username: &str, email: &str, p1: &str, p2: &str) -> RegistrationForm {
        RegistrationForm {
            username: username.to_string(),
            email: email.to_string(),
            password1: p1.to_string(),
            password2: p2.to_string(),
        }
    }

    #[test]
    fn test_valid_registration() {
        let input = form(" dana ", "dana@example.com", "Lantern-Orbit-42", "Lantern-Orbit-42")
            .validate()
            .unwrap();
        assert_eq!(input.username, "dana");
        assert!(!input.is_staff);
    }

    #[test]
    fn test_all_fields_required() {
        let errors = RegistrationForm::default().validate().unwrap_err();
        for field in ["username", "email", "password1", "password2"] {
            assert_eq!(errors.field(field), [REQUIRED.to_string()]);
        }
    }

    #[test]
    fn test_bad_username_and_email() {
        let errors = form("dana smith", "not-an-email", "Lantern-Orbit-42", "Lantern-Orbit-42")
            .validate()
            .unwrap_err();
        assert!(errors.has("username"));
        assert_eq!(errors.field("email"), ["Enter a valid email address.".to_string()]);
        assert!(!errors.has("password2"));
    }

    #[test]
    fn test_password_mismatch_and_strength() {
        let errors = form("dana", "dana@example.com", "Lantern-Orbit-42", "Lantern-Orbit-43")
            .validate()
            .unwrap_err();
        assert_eq!(errors.field("password2"), [PASSWORD_MISMATCH.to_string()]);

        let errors = form("dana", "dana@example.com", "1234", "1234").validate().unwrap_err();
        assert!(errors.field("password2").len() >= 2);
        assert!(!errors.has("password1"));
    }

    #[test]
    fn test_login_form_requires_both_fields() {
        let login = LoginForm {
            username: "dana".to_string(),
            ..Default::default()
        };
        let errors = login.validate().unwrap_err();
        assert!(errors.has("password"));
        assert!(!errors.has("username"));
    }
}
