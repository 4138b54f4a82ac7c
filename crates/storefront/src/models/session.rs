//! Session-related types.
//!
//! Shapes exchanged with the remote identity provider, the events the auth
//! bridge consumes, and the durable storage keys.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use farmacia_core::{Email, EmailError, PhoneError, PhoneNumber, RemoteUserId};

/// Seconds of slack before `expires_at` at which a session counts as expired.
const EXPIRY_MARGIN_SECS: i64 = 30;

/// An established session at the identity provider.
///
/// Owned by the provider; the storefront only observes it.
#[derive(Clone, Serialize, Deserialize)]
pub struct AuthSession {
    /// Bearer token for authenticated requests.
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    /// Unix timestamp (seconds) at which the access token expires.
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: RemoteUser,
}

impl AuthSession {
    /// Whether the access token is expired (or about to be) at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: chrono::DateTime<chrono::Utc>) -> bool {
        self.expires_at
            .is_some_and(|expires_at| now.timestamp() + EXPIRY_MARGIN_SECS >= expires_at)
    }

    /// Whether the access token is expired now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(chrono::Utc::now())
    }
}

// Manual Debug impl to avoid leaking tokens into logs
impl std::fmt::Debug for AuthSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSession")
            .field("access_token", &"[REDACTED]")
            .field(
                "refresh_token",
                &self.refresh_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("expires_at", &self.expires_at)
            .field("user", &self.user)
            .finish()
    }
}

/// The account record embedded in sessions and auth events.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteUser {
    pub id: RemoteUserId,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub user_metadata: UserMetadata,
}

impl RemoteUser {
    /// A user with only an ID and email, as some events carry.
    #[must_use]
    pub fn new(id: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            id: RemoteUserId::new(id),
            email: Some(email.into()),
            phone: None,
            user_metadata: UserMetadata::default(),
        }
    }
}

/// Free-form metadata saved with the account at sign-up.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UserMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub document_number: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gender: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
}

/// A row of the backend `profiles` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileRecord {
    pub id: RemoteUserId,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub document_type: Option<String>,
    #[serde(default)]
    pub document_number: Option<String>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub avatar_url: Option<String>,
}

/// Everything the auth bridge reacts to.
#[derive(Debug, Clone)]
pub enum AuthEvent {
    /// The provider established a session for `user`.
    SignedIn { user: RemoteUser },
    /// The provider ended the session.
    SignedOut,
    /// Result of the one-time probe for a session established before start.
    SessionProbeResult { session: Option<AuthSession> },
}

impl AuthEvent {
    /// Short name for logs.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SignedIn { .. } => "signed_in",
            Self::SignedOut => "signed_out",
            Self::SessionProbeResult { .. } => "session_probe",
        }
    }
}

/// Errors that can occur when parsing a login identifier.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    /// Looked like an email but was not a valid one.
    #[error("invalid email: {0}")]
    Email(#[from] EmailError),

    /// Looked like a phone but was not a valid one.
    #[error("invalid phone: {0}")]
    Phone(#[from] PhoneError),
}

/// What the customer typed into the first login step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginIdentifier {
    Email(Email),
    Phone(PhoneNumber),
}

impl LoginIdentifier {
    /// Parse an email (anything containing `@`) or a phone number.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if the input is neither a valid email nor a
    /// valid phone number.
    pub fn parse(input: &str) -> Result<Self, IdentifierError> {
        if input.contains('@') {
            Ok(Self::Email(Email::parse(input)?))
        } else {
            Ok(Self::Phone(PhoneNumber::parse(input)?))
        }
    }
}

impl std::fmt::Display for LoginIdentifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Email(email) => write!(f, "{email}"),
            Self::Phone(phone) => write!(f, "{phone}"),
        }
    }
}

/// Password sign-in request.
#[derive(Debug, Clone)]
pub struct Credentials {
    pub identifier: LoginIdentifier,
    pub password: SecretString,
}

/// Account creation request.
#[derive(Debug, Clone)]
pub struct SignUpRequest {
    pub email: Email,
    pub password: SecretString,
    /// Saved with the account and used as the profile fallback.
    pub metadata: UserMetadata,
}

/// Durable storage keys.
pub mod keys {
    /// Persisted cart projection.
    pub const CART: &str = "cart";

    /// Whether a customer is logged in.
    pub const IS_LOGGED_IN: &str = "ft_is_logged_in";

    /// The customer's profile.
    pub const USER_PROFILE: &str = "ft_user_profile";

    /// Saved delivery addresses.
    pub const ADDRESSES: &str = "ft_addresses";

    /// Purchase history.
    pub const PURCHASES: &str = "ft_purchases";

    /// Saved favorites.
    pub const FAVORITES: &str = "ft_favorites";

    /// Identity provider session, owned by the backend client.
    pub const AUTH_SESSION: &str = "ft_auth_session";

    /// Keys holding per-account data, removed on logout.
    pub const SESSION_DATA: [&str; 4] = [USER_PROFILE, ADDRESSES, PURCHASES, FAVORITES];
}
