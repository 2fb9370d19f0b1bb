//! Identity providers: who may open the admin panel.

use std::sync::Arc;

use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{self, PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::Argon2;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::watch;

use super::sessions::{Session, SessionRegistry};
use super::constant_time_compare;
use crate::db::Repository;
use crate::errors::AppError;

/// Why a sign-in attempt failed. None of these are fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignInError {
    IdentityNotFound,
    WrongCredential,
    /// Identity or secret is wrong, without saying which.
    InvalidCredential,
    MalformedIdentifier,
    Unavailable,
}

impl SignInError {
    /// Message shown on the login form.
    pub fn message(&self) -> &'static str {
        match self {
            SignInError::IdentityNotFound => "কোনো অ্যাডমিন অ্যাকাউন্ট পাওয়া যায়নি।",
            SignInError::WrongCredential => "ভুল পাসওয়ার্ড। অনুগ্রহ করে আবার চেষ্টা করুন।",
            SignInError::InvalidCredential => "ভুল ইমেইল অথবা পাসওয়ার্ড।",
            SignInError::MalformedIdentifier => "অনুগ্রহ করে একটি সঠিক ইমেইল দিন।",
            SignInError::Unavailable => {
                "লগইন করতে একটি সমস্যা হয়েছে। অনুগ্রহ করে আবার চেষ্টা করুন।"
            }
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            SignInError::IdentityNotFound => "IDENTITY_NOT_FOUND",
            SignInError::WrongCredential => "WRONG_CREDENTIAL",
            SignInError::InvalidCredential => "INVALID_CREDENTIAL",
            SignInError::MalformedIdentifier => "MALFORMED_IDENTIFIER",
            SignInError::Unavailable => "SIGN_IN_UNAVAILABLE",
        }
    }
}

impl std::fmt::Display for SignInError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code(), self.message())
    }
}

impl std::error::Error for SignInError {}

#[async_trait]
pub trait IdentityProvider: Send + Sync + 'static {
    /// Observe the session behind `token`; `None` means signed out.
    fn subscribe_session(&self, token: &str) -> watch::Receiver<Option<Session>>;

    /// The session behind `token` right now.
    fn current_session(&self, token: &str) -> Option<Session>;

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, SignInError>;

    async fn sign_out(&self, token: &str);
}

fn normalize_email(identifier: &str) -> Result<String, SignInError> {
    let email = identifier.trim().to_lowercase();
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
                && !domain.contains('@')
        }
        None => false,
    };
    if well_formed {
        Ok(email)
    } else {
        Err(SignInError::MalformedIdentifier)
    }
}

/// Hash a password with Argon2id and a random salt.
pub fn hash_password(password: &str) -> Result<String, AppError> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))
}

/// Admin accounts stored in the content database.
pub struct AccountProvider {
    repo: Repository,
    sessions: Arc<SessionRegistry>,
}

impl AccountProvider {
    pub fn new(repo: Repository, sessions: Arc<SessionRegistry>) -> Self {
        Self { repo, sessions }
    }

    /// Create the first account from configuration when none exists yet.
    pub async fn bootstrap(
        &self,
        email: Option<&str>,
        password: Option<&str>,
    ) -> Result<(), AppError> {
        if self.repo.count_admin_accounts().await? > 0 {
            return Ok(());
        }
        let (Some(email), Some(password)) = (email, password) else {
            tracing::warn!(
                "No admin account exists; set CMS_ADMIN_EMAIL and CMS_ADMIN_PASSWORD to create one"
            );
            return Ok(());
        };
        let email = normalize_email(email)
            .map_err(|_| AppError::Config(format!("Invalid CMS_ADMIN_EMAIL '{}'", email)))?;
        self.repo
            .create_admin_account(&email, &hash_password(password)?)
            .await?;
        tracing::info!("Created initial admin account {}", email);
        Ok(())
    }
}

#[async_trait]
impl IdentityProvider for AccountProvider {
    fn subscribe_session(&self, token: &str) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe(token)
    }

    fn current_session(&self, token: &str) -> Option<Session> {
        self.sessions.current(token)
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, SignInError> {
        let email = normalize_email(identifier)?;
        let stored = self
            .repo
            .get_admin_password_hash(&email)
            .await
            .map_err(|e| {
                tracing::error!("Account lookup failed: {}", e);
                SignInError::Unavailable
            })?
            .ok_or(SignInError::IdentityNotFound)?;

        let parsed = PasswordHash::new(&stored).map_err(|e| {
            tracing::error!("Stored password hash for {} is corrupt: {}", email, e);
            SignInError::Unavailable
        })?;

        match Argon2::default().verify_password(secret.as_bytes(), &parsed) {
            Ok(()) => Ok(self.sessions.issue(&email)),
            Err(password_hash::Error::Password) => {
                tracing::info!("Wrong password for {}", email);
                Err(SignInError::WrongCredential)
            }
            Err(e) => {
                tracing::error!("Password verification failed: {}", e);
                Err(SignInError::Unavailable)
            }
        }
    }

    async fn sign_out(&self, token: &str) {
        self.sessions.revoke(token);
    }
}

/// One configured credential pair.
pub struct StaticProvider {
    email: String,
    password: String,
    sessions: Arc<SessionRegistry>,
}

impl StaticProvider {
    pub fn new(email: &str, password: &str, sessions: Arc<SessionRegistry>) -> Self {
        Self {
            email: email.trim().to_lowercase(),
            password: password.to_string(),
            sessions,
        }
    }
}

#[async_trait]
impl IdentityProvider for StaticProvider {
    fn subscribe_session(&self, token: &str) -> watch::Receiver<Option<Session>> {
        self.sessions.subscribe(token)
    }

    fn current_session(&self, token: &str) -> Option<Session> {
        self.sessions.current(token)
    }

    async fn sign_in(&self, identifier: &str, secret: &str) -> Result<Session, SignInError> {
        let email = normalize_email(identifier)?;
        // Compare both halves so the timing does not reveal which one was wrong.
        let email_ok = constant_time_compare(&email, &self.email);
        let password_ok = constant_time_compare(secret, &self.password);
        if email_ok & password_ok {
            Ok(self.sessions.issue(&email))
        } else {
            Err(SignInError::InvalidCredential)
        }
    }

    async fn sign_out(&self, token: &str) {
        self.sessions.revoke(token);
    }
}

/// No authentication: everyone is an admin.
pub struct OpenProvider {
    session: watch::Sender<Option<Session>>,
}

impl OpenProvider {
    pub const TOKEN: &'static str = "open";

    pub fn new() -> Self {
        let session = Session {
            token: Self::TOKEN.to_string(),
            identity: "anonymous".to_string(),
            expires_at: DateTime::<Utc>::MAX_UTC,
        };
        let (tx, _) = watch::channel(Some(session));
        Self { session: tx }
    }
}

impl Default for OpenProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for OpenProvider {
    fn subscribe_session(&self, _token: &str) -> watch::Receiver<Option<Session>> {
        self.session.subscribe()
    }

    fn current_session(&self, _token: &str) -> Option<Session> {
        self.session.borrow().clone()
    }

    async fn sign_in(&self, _identifier: &str, _secret: &str) -> Result<Session, SignInError> {
        self.session.borrow().clone().ok_or(SignInError::Unavailable)
    }

    async fn sign_out(&self, _token: &str) {}
}
