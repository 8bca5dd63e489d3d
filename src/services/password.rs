//! Password hashing and strength rules
//!
//! Hashes use Argon2id with the argon2 crate's default parameters and a fresh
//! random salt per password. New passwords must also pass
//! [`validate_password_strength`] before they are hashed.

use anyhow::{Context, Result};
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use once_cell::sync::Lazy;
use std::collections::HashSet;

/// Minimum accepted password length, in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Similarity ratio at which a password counts as too close to a user attribute
const MAX_SIMILARITY: f64 = 0.7;

static COMMON_PASSWORDS: Lazy<HashSet<&'static str>> = Lazy::new(|| {
    [
        "123456", "123456789", "12345678", "password", "qwerty", "123123", "111111",
        "1234567890", "1234567", "qwerty123", "000000", "1q2w3e", "aa12345678", "abc123",
        "password1", "1234", "qwertyuiop", "123321", "password123", "1q2w3e4r5t", "iloveyou",
        "654321", "666666", "987654321", "123", "123456a", "qwe123", "1q2w3e4r", "7777777",
        "1qaz2wsx", "123qwe", "zxcvbnm", "121212", "asdasd", "a123456", "555555", "dragon",
        "112233", "123123123", "monkey", "11111111", "qazwsx", "159753", "asdfghjkl",
        "222222", "1234qwer", "qwerty1", "123654", "123abc", "asdfgh", "777777", "aaaaaa",
        "myspace1", "88888888", "fuckyou", "123456789a", "999999", "888888", "football",
        "princess", "sunshine", "welcome", "welcome1", "letmein", "shadow", "master",
        "baseball", "superman", "trustno1", "starwars", "passw0rd", "p@ssw0rd", "admin",
        "admin123", "administrator", "changeme", "secret", "whatever", "computer",
        "michael", "jennifer", "jordan23", "hunter2", "charlie", "freedom", "qwerty12",
        "zaq12wsx", "loveme", "liverpool", "chelsea", "arsenal", "pokemon", "batman",
        "access", "flower", "hello123", "login", "solo", "starwars1", "abcd1234",
        "abcdefgh", "12341234", "11223344", "qwertyui", "asdf1234", "test1234", "testtest",
        "timetrack", "employee", "payroll",
    ]
    .into_iter()
    .collect()
});

/// Hash a password using Argon2id.
///
/// Returns the PHC string (algorithm, parameters, salt and hash).
///
/// ```ignore
/// let hash = hash_password("correct horse battery")?;
/// assert!(hash.starts_with("$argon2id$"));
/// ```
pub fn hash_password(password: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    let password_hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {}", e))
        .context("Password hashing failed")?;

    Ok(password_hash.to_string())
}

/// Verify a password against a stored hash.
///
/// A mismatch is `Ok(false)`; only a malformed hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
    let parsed_hash = PasswordHash::new(hash)
        .map_err(|e| anyhow::anyhow!("Invalid password hash format: {}", e))
        .context("Failed to parse password hash")?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(anyhow::anyhow!("Password verification failed: {}", e))
            .context("Password verification error"),
    }
}

/// Check a new password against the strength rules.
///
/// Returns every violated rule as a user-facing message; an empty list means
/// the password is acceptable.
pub fn validate_password_strength(password: &str, username: &str, email: &str) -> Vec<String> {
    let mut errors = Vec::new();

    if let Some(message) = similarity_error(password, username, email) {
        errors.push(message);
    }

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        errors.push(format!(
            "This password is too short. It must contain at least {} characters.",
            MIN_PASSWORD_LENGTH
        ));
    }

    if COMMON_PASSWORDS.contains(password.trim().to_lowercase().as_str()) {
        errors.push("This password is too common.".to_string());
    }

    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        errors.push("This password is entirely numeric.".to_string());
    }

    errors
}

fn similarity_error(password: &str, username: &str, email: &str) -> Option<String> {
    let password = password.to_lowercase();

    for (label, value) in [("username", username), ("email address", email)] {
        let value = value.to_lowercase();
        if value.is_empty() {
            continue;
        }

        let parts = value
            .split(|c: char| !c.is_alphanumeric() && c != '_')
            .filter(|part| !part.is_empty())
            .chain(std::iter::once(value.as_str()));

        for part in parts {
            if exceeds_length_ratio(&password, part) {
                continue;
            }
            if quick_ratio(&password, part) >= MAX_SIMILARITY {
                return Some(format!("The password is too similar to the {}.", label));
            }
        }
    }

    None
}

/// A password far longer than the attribute can't be "too similar" to it
fn exceeds_length_ratio(password: &str, value: &str) -> bool {
    let pwd_len = password.chars().count();
    let value_len = value.chars().count();
    let length_bound = MAX_SIMILARITY / 2.0 * pwd_len as f64;
    pwd_len >= 10 * value_len && (value_len as f64) < length_bound
}

/// Upper bound on sequence similarity: `2 * shared characters / total length`
fn quick_ratio(a: &str, b: &str) -> f64 {
    let total = a.chars().count() + b.chars().count();
    if total == 0 {
        return 1.0;
    }

    let mut available: std::collections::HashMap<char, usize> = std::collections::HashMap::new();
    for c in b.chars() {
        *available.entry(c).or_default() += 1;
    }

    let mut matches = 0;
    for c in a.chars() {
        if let Some(count) = available.get_mut(&c) {
            if *count > 0 {
                *count -= 1;
                matches += 1;
            }
        }
    }

    2.0 * matches as f64 / total as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_password_produces_argon2id_hash() {
        let hash = hash_password("test_password_123").expect("Failed to hash password");
        assert!(hash.starts_with("$argon2id$"));
    }

    #[test]
    fn test_hash_password_uses_fresh_salt() {
        let hash1 = hash_password("same_password").unwrap();
        let hash2 = hash_password("same_password").unwrap();
        assert_ne!(hash1, hash2);
    }

    #[test]
    fn test_verify_password() {
        let hash = hash_password("correct_password").unwrap();
        assert!(verify_password("correct_password", &hash).unwrap());
        assert!(!verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_verify_password_invalid_hash() {
        assert!(verify_password("password", "invalid_hash_format").is_err());
    }

    #[test]
    fn test_strong_password_passes() {
        assert!(validate_password_strength("Tr0mbone-Quiver", "alice", "alice@example.com").is_empty());
    }

    #[test]
    fn test_short_password() {
        let errors = validate_password_strength("Zq9!", "alice", "alice@example.com");
        assert_eq!(
            errors,
            vec!["This password is too short. It must contain at least 8 characters.".to_string()]
        );
    }

    #[test]
    fn test_common_and_numeric_passwords() {
        let errors = validate_password_strength("12345678", "alice", "alice@example.com");
        assert!(errors.contains(&"This password is too common.".to_string()));
        assert!(errors.contains(&"This password is entirely numeric.".to_string()));

        let errors = validate_password_strength("Password", "alice", "alice@example.com");
        assert_eq!(errors, vec!["This password is too common.".to_string()]);
    }

    #[test]
    fn test_password_similar_to_username_or_email() {
        let errors = validate_password_strength("margaret1", "margaret", "mw@example.com");
        assert_eq!(errors, vec!["The password is too similar to the username.".to_string()]);

        let errors = validate_password_strength("bobsmith9", "worker7", "bob.smith9@example.com");
        assert_eq!(errors, vec!["The password is too similar to the email address.".to_string()]);
    }

    #[test]
    fn test_quick_ratio() {
        assert_eq!(quick_ratio("abcd", "abcd"), 1.0);
        assert_eq!(quick_ratio("abcd", "wxyz"), 0.0);
        assert_eq!(quick_ratio("aab", "abb"), 2.0 * 2.0 / 6.0);
    }
}
