//! Remote identity and profile backend.
//!
//! The session core only consumes the [`IdentityProvider`] contract; the
//! hosted backend is reached through [`BackendClient`]. Tests substitute a
//! scripted provider.

mod client;

pub use client::BackendClient;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::broadcast;

use farmacia_core::{Email, RemoteUserId};

use crate::models::session::{AuthEvent, AuthSession, Credentials, ProfileRecord, SignUpRequest};
use crate::storage::StorageError;

/// Errors that can occur when talking to the backend.
#[derive(Debug, Error)]
pub enum BackendError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// API returned an error response.
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    /// Failed to parse response.
    #[error("Parse error: {0}")]
    Parse(String),

    /// Wrong identifier or password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// An account with this email already exists.
    #[error("user already exists")]
    UserAlreadyExists,

    /// The request needs a session and there is none.
    #[error("not authenticated")]
    NotAuthenticated,

    /// Endpoint URL could not be built.
    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),

    /// Persisted session could not be read or written.
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Everything the session core needs from the identity provider.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// The currently established session, if any.
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError>;

    /// Subscribe to sign-in and sign-out events.
    fn subscribe(&self) -> broadcast::Receiver<AuthEvent>;

    /// Sign in with an email or phone and a password.
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, BackendError>;

    /// Create an account. Returns `None` when the provider requires email
    /// confirmation before a session exists.
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, BackendError>;

    /// End the current session.
    async fn sign_out(&self) -> Result<(), BackendError>;

    /// Send a password recovery email.
    async fn reset_password_for_email(&self, email: &Email) -> Result<(), BackendError>;

    /// Fetch the `profiles` row for a user, if one exists.
    async fn fetch_profile(
        &self,
        user_id: &RemoteUserId,
    ) -> Result<Option<ProfileRecord>, BackendError>;
}
