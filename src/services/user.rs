//! User service
//!
//! Registration, login/logout and session resolution. Signup validation mirrors
//! the classic username/password rules: a restricted username alphabet, a
//! unique username, and passwords of at least eight non-numeric characters.

use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{FormErrors, LoginInput, NewUser, Session, SignupInput, User};
use crate::services::password::{hash_password, password_problems, verify_password};
use anyhow::Context;
use once_cell::sync::Lazy;
use regex::Regex;
use std::sync::Arc;

const DEFAULT_SESSION_DAYS: i64 = 14;
const USERNAME_MAX_LEN: usize = 150;

pub const REQUIRED: &str = "This field is required.";
pub const INVALID_LOGIN: &str =
    "Please enter a correct username and password. Note that both fields may be case-sensitive.";

static USERNAME_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[\w.@+-]+$").expect("valid regex"));

/// Error types for user service operations
#[derive(Debug, thiserror::Error)]
pub enum UserServiceError {
    /// The submitted form has field errors
    #[error("Validation error: {0}")]
    Validation(FormErrors),

    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("Internal error: {0}")]
    InternalError(#[from] anyhow::Error),
}

/// User service for accounts and sessions
pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(user_repo: Arc<dyn UserRepository>, session_repo: Arc<dyn SessionRepository>) -> Self {
        Self::with_session_days(user_repo, session_repo, DEFAULT_SESSION_DAYS)
    }

    pub fn with_session_days(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Validate the signup form and create the account.
    ///
    /// The new user is not logged in.
    pub async fn register(&self, input: SignupInput) -> Result<User, UserServiceError> {
        let username = input.username.trim().to_string();
        let email = input.email.trim().to_string();
        let mut errors = FormErrors::new();

        if username.is_empty() {
            errors.add("username", REQUIRED);
        } else if username.chars().count() > USERNAME_MAX_LEN {
            errors.add(
                "username",
                format!("Ensure this value has at most {} characters.", USERNAME_MAX_LEN),
            );
        } else if !USERNAME_RE.is_match(&username) {
            errors.add(
                "username",
                "Enter a valid username. This value may contain only letters, numbers, and @/./+/-/_ characters.",
            );
        } else if self
            .user_repo
            .exists_by_username(&username)
            .await
            .context("Failed to check username")?
        {
            errors.add("username", "A user with that username already exists.");
        }

        if !email.is_empty() && !looks_like_email(&email) {
            errors.add("email", "Enter a valid email address.");
        }

        if input.password1.is_empty() {
            errors.add("password1", REQUIRED);
        }
        if input.password2.is_empty() {
            errors.add("password2", REQUIRED);
        } else if !input.password1.is_empty() {
            if input.password1 != input.password2 {
                errors.add("password2", "The two password fields didn't match.");
            } else {
                for problem in password_problems(&input.password2) {
                    errors.add("password2", problem);
                }
            }
        }

        errors.into_result().map_err(UserServiceError::Validation)?;

        let password_hash = hash_password(&input.password1).context("Failed to hash password")?;
        let user = self
            .user_repo
            .create(&NewUser {
                username,
                email,
                first_name: input.first_name.trim().to_string(),
                last_name: input.last_name.trim().to_string(),
                password_hash,
            })
            .await
            .context("Failed to create user")?;

        tracing::info!("Registered user '{}'", user.username);
        Ok(user)
    }

    /// Check credentials and open a session
    pub async fn login(&self, input: &LoginInput) -> Result<(User, Session), UserServiceError> {
        let mut errors = FormErrors::new();
        if input.username.trim().is_empty() {
            errors.add("username", REQUIRED);
        }
        if input.password.is_empty() {
            errors.add("password", REQUIRED);
        }
        errors.into_result().map_err(UserServiceError::Validation)?;

        let user = self
            .user_repo
            .get_by_username(input.username.trim())
            .await
            .context("Failed to get user by username")?
            .ok_or(UserServiceError::InvalidCredentials)?;

        let valid = verify_password(&input.password, &user.password_hash)
            .context("Failed to verify password")?;
        if !valid {
            tracing::debug!("Rejected login for '{}'", user.username);
            return Err(UserServiceError::InvalidCredentials);
        }

        let session = self
            .session_repo
            .create(&Session::start(user.id, self.session_days))
            .await
            .context("Failed to create session")?;

        Ok((user, session))
    }

    /// Delete the session; unknown tokens are ignored
    pub async fn logout(&self, session_id: &str) -> Result<(), UserServiceError> {
        self.session_repo
            .delete(session_id)
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    /// Resolve a session token to its user.
    ///
    /// Expired sessions are deleted and resolve to `None`.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, UserServiceError> {
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

        let user = self
            .user_repo
            .get_by_id(session.user_id)
            .await
            .context("Failed to get user")?;
        Ok(user)
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<User>, UserServiceError> {
        let user = self
            .user_repo
            .get_by_username(username)
            .await
            .context("Failed to get user by username")?;
        Ok(user)
    }

    /// Remove every expired session, returning how many were deleted
    pub async fn cleanup_expired_sessions(&self) -> Result<u64, UserServiceError> {
        let count = self
            .session_repo
            .delete_expired()
            .await
            .context("Failed to delete expired sessions")?;
        Ok(count)
    }
}

fn looks_like_email(email: &str) -> bool {
    match email.rsplit_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::testing::setup_pool;
    use crate::db::repositories::{SqlxSessionRepository, SqlxUserRepository};
    use chrono::{Duration, Utc};

    async fn setup_service() -> UserService {
        let pool = setup_pool().await;
        UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool),
        )
    }

    fn signup(username: &str, password: &str) -> SignupInput {
        SignupInput {
            first_name: "Leo".to_string(),
            last_name: "Tolstoy".to_string(),
            username: username.to_string(),
            email: format!("{}@example.com", username),
            password1: password.to_string(),
            password2: password.to_string(),
        }
    }

    fn login(username: &str, password: &str) -> LoginInput {
        LoginInput {
            username: username.to_string(),
            password: password.to_string(),
            next: None,
        }
    }

    fn validation_errors(result: Result<User, UserServiceError>) -> FormErrors {
        match result {
            Err(UserServiceError::Validation(errors)) => errors,
            other => panic!("Expected validation error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let service = setup_service().await;
        let user = service.register(signup("leo", "war-and-peace")).await.unwrap();

        assert_eq!(user.username, "leo");
        assert_eq!(user.display_name(), "Leo Tolstoy");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_duplicate_username() {
        let service = setup_service().await;
        service.register(signup("leo", "war-and-peace")).await.unwrap();

        let errors = validation_errors(service.register(signup("leo", "anna-karenina")).await);
        assert_eq!(errors.get("username"), ["A user with that username already exists."]);
    }

    #[tokio::test]
    async fn test_register_rejects_bad_username() {
        let service = setup_service().await;

        let errors = validation_errors(service.register(signup("no spaces", "war-and-peace")).await);
        assert!(errors.has("username"));

        let long = "a".repeat(151);
        let errors = validation_errors(service.register(signup(&long, "war-and-peace")).await);
        assert!(errors.has("username"));

        let errors = validation_errors(service.register(signup("", "war-and-peace")).await);
        assert_eq!(errors.get("username"), [REQUIRED]);
    }

    #[tokio::test]
    async fn test_register_password_rules() {
        let service = setup_service().await;

        let errors = validation_errors(service.register(signup("leo", "1234567890")).await);
        assert_eq!(errors.get("password2"), ["This password is entirely numeric."]);

        let mut mismatched = signup("leo", "war-and-peace");
        mismatched.password2 = "war-and-peas".to_string();
        let errors = validation_errors(service.register(mismatched).await);
        assert_eq!(errors.get("password2"), ["The two password fields didn't match."]);

        let errors = validation_errors(service.register(signup("leo", "")).await);
        assert!(errors.has("password1"));
        assert!(errors.has("password2"));
    }

    #[tokio::test]
    async fn test_register_email_optional_but_checked() {
        let service = setup_service().await;

        let mut no_email = signup("leo", "war-and-peace");
        no_email.email = String::new();
        assert!(service.register(no_email).await.is_ok());

        let mut bad_email = signup("anna", "war-and-peace");
        bad_email.email = "anna-at-example".to_string();
        let errors = validation_errors(service.register(bad_email).await);
        assert!(errors.has("email"));
    }

    #[tokio::test]
    async fn test_login_and_validate_session() {
        let service = setup_service().await;
        let user = service.register(signup("leo", "war-and-peace")).await.unwrap();

        let (logged_in, session) = service.login(&login("leo", "war-and-peace")).await.unwrap();
        assert_eq!(logged_in.id, user.id);

        let resolved = service.validate_session(&session.id).await.unwrap();
        assert_eq!(resolved.map(|u| u.id), Some(user.id));
    }

    #[tokio::test]
    async fn test_login_rejects_bad_credentials() {
        let service = setup_service().await;
        service.register(signup("leo", "war-and-peace")).await.unwrap();

        assert!(matches!(
            service.login(&login("leo", "wrong-password")).await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(&login("nobody", "war-and-peace")).await,
            Err(UserServiceError::InvalidCredentials)
        ));
        assert!(matches!(
            service.login(&login("", "")).await,
            Err(UserServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_invalidates_session() {
        let service = setup_service().await;
        service.register(signup("leo", "war-and-peace")).await.unwrap();
        let (_, session) = service.login(&login("leo", "war-and-peace")).await.unwrap();

        service.logout(&session.id).await.unwrap();

        assert!(service.validate_session(&session.id).await.unwrap().is_none());
        service.logout("unknown-token").await.unwrap();
    }

    #[tokio::test]
    async fn test_expired_session_is_removed() {
        let pool = setup_pool().await;
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(SqlxUserRepository::boxed(pool), sessions.clone());
        let user = service.register(signup("leo", "war-and-peace")).await.unwrap();

        let mut stale = Session::start(user.id, 1);
        stale.expires_at = Utc::now() - Duration::hours(1);
        sessions.create(&stale).await.unwrap();

        assert!(service.validate_session(&stale.id).await.unwrap().is_none());
        assert!(sessions.get_by_id(&stale.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cleanup_expired_sessions() {
        let pool = setup_pool().await;
        let sessions = SqlxSessionRepository::boxed(pool.clone());
        let service = UserService::new(SqlxUserRepository::boxed(pool), sessions.clone());
        let user = service.register(signup("leo", "war-and-peace")).await.unwrap();

        let mut stale = Session::start(user.id, 1);
        stale.expires_at = Utc::now() - Duration::days(2);
        sessions.create(&stale).await.unwrap();
        service.login(&login("leo", "war-and-peace")).await.unwrap();

        assert_eq!(service.cleanup_expired_sessions().await.unwrap(), 1);
    }

    #[test]
    fn test_looks_like_email() {
        assert!(looks_like_email("leo@example.com"));
        assert!(!looks_like_email("leo@localhost"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("leo @example.com"));
    }
}
