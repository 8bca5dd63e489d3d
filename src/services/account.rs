//! Account service
//!
//! Registration, login/logout and server-side sessions. Username and email
//! formats are checked here as well as in the registration form so the admin
//! tool gets the same rules.

use crate::db::is_unique_violation;
use crate::db::repositories::{AccountRepository, SessionRepository};
use crate::models::{Account, CreateAccountInput, Session};
use crate::services::password::{hash_password, validate_password_strength, verify_password};
use anyhow::Context;
use chrono::{Duration, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

/// Longest accepted username
pub const USERNAME_MAX_LENGTH: usize = 150;

/// Longest accepted email address
pub const EMAIL_MAX_LENGTH: usize = 254;

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid username regex"));

static EMAIL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[^\s@]+@[^\s@.]+(\.[^\s@.]+)+$").expect("valid email regex")
});

/// Error types for account service operations
#[derive(Debug, thiserror::Error)]
pub enum AccountServiceError {
    #[error("{0}")]
    InvalidUsername(String),

    #[error("{0}")]
    InvalidEmail(String),

    #[error("A user with that username already exists.")]
    UsernameTaken,

    #[error("A user with that email already exists.")]
    EmailTaken,

    /// Every violated password rule
    #[error("{}", .0.join(" "))]
    WeakPassword(Vec<String>),

    #[error("Please enter a correct username and password. Note that both fields may be case-sensitive.")]
    InvalidCredentials,

    #[error("This account is inactive.")]
    Inactive,

    #[error("No account named '{0}'")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Check username length and characters
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.chars().count() > USERNAME_MAX_LENGTH {
        return Err(format!(
            "Ensure this value has at most {} characters (it has {}).",
            USERNAME_MAX_LENGTH,
            username.chars().count()
        ));
    }
    if !USERNAME_RE.is_match(username) {
        return Err(
            "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters."
                .to_string(),
        );
    }
    Ok(())
}

/// Check email syntax
pub fn validate_email(email: &str) -> Result<(), String> {
    if email.chars().count() > EMAIL_MAX_LENGTH || !EMAIL_RE.is_match(email) {
        return Err("Enter a valid email address.".to_string());
    }
    Ok(())
}

/// Account service for registration and authentication
pub struct AccountService {
    account_repo: Arc<dyn AccountRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_lifetime: Duration,
}

impl AccountService {
    pub fn new(
        account_repo: Arc<dyn AccountRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_lifetime_days: i64,
    ) -> Self {
        Self {
            account_repo,
            session_repo,
            session_lifetime: Duration::days(session_lifetime_days),
        }
    }

    /// Register a regular (non-staff) account
    pub async fn register(
        &self,
        username: &str,
        email: &str,
        password: &str,
    ) -> Result<Account, AccountServiceError> {
        self.create_account(CreateAccountInput {
            username: username.to_string(),
            email: email.to_string(),
            password: password.to_string(),
            is_staff: false,
        })
        .await
    }

    /// Validate and persist a new account
    pub async fn create_account(&self, input: CreateAccountInput) -> Result<Account, AccountServiceError> {
        let username = input.username.trim();
        let email = input.email.trim();

        validate_username(username).map_err(AccountServiceError::InvalidUsername)?;
        validate_email(email).map_err(AccountServiceError::InvalidEmail)?;

        if self
            .account_repo
            .get_by_username(username)
            .await
            .context("Failed to check username")?
            .is_some()
        {
            return Err(AccountServiceError::UsernameTaken);
        }

        if self
            .account_repo
            .get_by_email(email)
            .await
            .context("Failed to check email")?
            .is_some()
        {
            return Err(AccountServiceError::EmailTaken);
        }

        let weaknesses = validate_password_strength(&input.password, username, email);
        if !weaknesses.is_empty() {
            return Err(AccountServiceError::WeakPassword(weaknesses));
        }

        let password_hash = hash_password(&input.password)?;
        let mut account = Account::new(username.to_string(), email.to_string(), password_hash);
        account.is_staff = input.is_staff;

        match self.account_repo.create(&account).await {
            Ok(created) => {
                tracing::info!(username = %created.username, staff = created.is_staff, "Account created");
                Ok(created)
            }
            // Lost a race with a concurrent registration
            Err(e) if is_unique_violation(&e) => Err(AccountServiceError::UsernameTaken),
            Err(e) => Err(e.context("Failed to create account").into()),
        }
    }

    /// Check credentials without starting a session
    pub async fn authenticate(&self, username: &str, password: &str) -> Result<Account, AccountServiceError> {
        let account = self
            .account_repo
            .get_by_username(username.trim())
            .await
            .context("Failed to look up account")?
            .ok_or(AccountServiceError::InvalidCredentials)?;

        if !verify_password(password, &account.password_hash).context("Failed to verify password")? {
            return Err(AccountServiceError::InvalidCredentials);
        }

        if !account.is_active {
            return Err(AccountServiceError::Inactive);
        }

        Ok(account)
    }

    /// Authenticate and start a session
    pub async fn login(&self, username: &str, password: &str) -> Result<(Account, Session), AccountServiceError> {
        let account = self.authenticate(username, password).await?;
        let session = self.create_session(account.id).await?;
        tracing::debug!(username = %account.username, "Logged in");
        Ok((account, session))
    }

    /// Start a session for an account
    pub async fn create_session(&self, user_id: i64) -> Result<Session, AccountServiceError> {
        let session = Session::new(user_id, self.session_lifetime);
        let session = self
            .session_repo
            .create(&session)
            .await
            .context("Failed to create session")?;
        Ok(session)
    }

    /// End a session
    pub async fn logout(&self, token: &str) -> Result<(), AccountServiceError> {
        self.session_repo
            .delete(token)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its account.
    ///
    /// Unknown or expired tokens and inactive accounts yield `None`; expired
    /// sessions are deleted on the way.
    pub async fn validate_session(&self, token: &str) -> Result<Option<Account>, AccountServiceError> {
        let session = match self
            .session_repo
            .get_by_id(token)
            .await
            .context("Failed to get session")?
        {
            Some(s) => s,
            None => return Ok(None),
        };

        if session.is_expired() {
            self.session_repo
                .delete(token)
                .await
                .context("Failed to delete expired session")?;
            return Ok(None);
        }

        let account = self
            .account_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get account")?;

        Ok(account.filter(|a| a.is_active))
    }

    /// Purge sessions past their expiry
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AccountServiceError> {
        let count = self
            .session_repo
            .delete_expired(Utc::now())
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Account, AccountServiceError> {
        self.account_repo
            .get_by_username(username)
            .await
            .context("Failed to get account")?
            .ok_or_else(|| AccountServiceError::NotFound(username.to_string()))
    }

    /// Grant or revoke staff access
    pub async fn set_staff(&self, username: &str, is_staff: bool) -> Result<Account, AccountServiceError> {
        let mut account = self.get_by_username(username).await?;
        account.is_staff = is_staff;
        let updated = self.account_repo.update(&account).await?;
        tracing::info!(username = %updated.username, is_staff, "Staff flag changed");
        Ok(updated)
    }

    /// Activate or deactivate an account; deactivation also ends its sessions
    pub async fn set_active(&self, username: &str, is_active: bool) -> Result<Account, AccountServiceError> {
        let mut account = self.get_by_username(username).await?;
        account.is_active = is_active;
        let updated = self.account_repo.update(&account).await?;

        if !is_active {
            self.session_repo
                .delete_by_user(updated.id)
                .await
                .context("Failed to end sessions")?;
        }

        tracing::info!(username = %updated.username, is_active, "Active flag changed");
        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::{SqlxAccountRepository, SqlxSessionRepository};
    use crate::db::{create_test_pool, migrations};

    const PASSWORD: &str = "Correct-Horse-42";

    async fn setup_test_service() -> AccountService {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");

        AccountService::new(
            SqlxAccountRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
            14,
        )
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("jane.doe+work@corp_1-x").is_ok());
        assert!(validate_username("jane doe").is_err());
        assert!(validate_username("").is_err());
        assert!(validate_username(&"a".repeat(150)).is_ok());
        assert!(validate_username(&"a".repeat(151)).is_err());
    }

    #[test]
    fn test_validate_email() {
        assert!(validate_email("jane@example.com").is_ok());
        assert!(validate_email("jane@localhost").is_err());
        assert!(validate_email("jane.example.com").is_err());
        assert!(validate_email("jane @example.com").is_err());
    }

    #[tokio::test]
    async fn test_register_creates_active_worker() {
        let service = setup_test_service().await;
        let account = service.register("jane", "jane@example.com", PASSWORD).await.unwrap();

        assert!(account.id > 0);
        assert!(account.is_active);
        assert!(!account.is_staff);
        assert_ne!(account.password_hash, PASSWORD);
    }

    #[tokio::test]
    async fn test_register_rejects_duplicates() {
        let service = setup_test_service().await;
        service.register("jane", "jane@example.com", PASSWORD).await.unwrap();

        let err = service.register("JANE", "other@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::UsernameTaken));

        let err = service.register("janet", "jane@example.com", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::EmailTaken));
    }

    #[tokio::test]
    async fn test_register_rejects_weak_password() {
        let service = setup_test_service().await;
        let err = service.register("jane", "jane@example.com", "12345678").await.unwrap_err();

        match err {
            AccountServiceError::WeakPassword(reasons) => assert_eq!(reasons.len(), 2),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_test_service().await;
        service.register("jane", "jane@example.com", PASSWORD).await.unwrap();

        let (account, session) = service.login("jane", PASSWORD).await.unwrap();
        let resolved = service.validate_session(&session.id).await.unwrap().expect("valid session");
        assert_eq!(resolved.id, account.id);

        service.logout(&session.id).await.unwrap();
        assert!(service.validate_session(&session.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_login_wrong_password() {
        let service = setup_test_service().await;
        service.register("jane", "jane@example.com", PASSWORD).await.unwrap();

        let err = service.login("jane", "not-the-password").await.unwrap_err();
        assert!(matches!(err, AccountServiceError::InvalidCredentials));

        let err = service.login("nobody", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::InvalidCredentials));
    }

    #[tokio::test]
    async fn test_deactivated_account_loses_sessions_and_login() {
        let service = setup_test_service().await;
        service.register("jane", "jane@example.com", PASSWORD).await.unwrap();
        let (_, session) = service.login("jane", PASSWORD).await.unwrap();

        service.set_active("jane", false).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        let err = service.login("jane", PASSWORD).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::Inactive));
    }

    #[tokio::test]
    async fn test_create_staff_account_and_toggle() {
        let service = setup_test_service().await;
        let boss = service
            .create_account(CreateAccountInput {
                username: "boss".to_string(),
                email: "boss@example.com".to_string(),
                password: PASSWORD.to_string(),
                is_staff: true,
            })
            .await
            .unwrap();
        assert!(boss.can_view_staff_pages());

        let demoted = service.set_staff("boss", false).await.unwrap();
        assert!(!demoted.is_staff);

        let err = service.set_staff("ghost", true).await.unwrap_err();
        assert!(matches!(err, AccountServiceError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions_keeps_live_ones() {
        let service = setup_test_service().await;
        service.register("jane", "jane@example.com", PASSWORD).await.unwrap();
        let (_, session) = service.login("jane", PASSWORD).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 0);
        assert!(service.validate_session(&session.id).await.unwrap().is_some());
    }
}
