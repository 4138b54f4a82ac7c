//! HTTP client for the hosted auth and data backend.
//!
//! Talks to GoTrue-style `/auth/v1` endpoints and a PostgREST-style
//! `/rest/v1/profiles` table. Every request carries the project's anon key in
//! the `apikey` header; authenticated requests add the session's bearer
//! token. The established session is persisted so a restart finds it again.

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tokio::sync::{RwLock, broadcast};
use tracing::instrument;
use url::Url;

use farmacia_core::{Email, RemoteUserId};

use super::{BackendError, IdentityProvider};
use crate::config::BackendConfig;
use crate::models::session::{
    AuthEvent, AuthSession, Credentials, LoginIdentifier, ProfileRecord, RemoteUser,
    SignUpRequest, keys,
};
use crate::storage::{self, KeyValueStore};

/// Buffered auth events per subscriber before it starts lagging.
const EVENT_CAPACITY: usize = 16;

/// Client for the hosted backend.
///
/// Cheaply cloneable; clones share the session and event channel.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<ClientInner>,
}

struct ClientInner {
    http: reqwest::Client,
    base_url: Url,
    anon_key: SecretString,
    session: RwLock<Option<AuthSession>>,
    store: Arc<dyn KeyValueStore>,
    events: broadcast::Sender<AuthEvent>,
}

/// Token endpoint response.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    /// Token lifetime in seconds.
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: RemoteUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> AuthSession {
        AuthSession {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: self
                .expires_at
                .or_else(|| self.expires_in.map(|secs| now + secs)),
            user: self.user,
        }
    }
}

/// Error body; the auth and REST APIs use different field names.
#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    error_description: Option<String>,
    #[serde(default)]
    msg: Option<String>,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
    #[serde(default)]
    error_code: Option<String>,
}

impl ErrorBody {
    fn parse(body: &str) -> Self {
        serde_json::from_str(body).unwrap_or_default()
    }

    fn message(&self) -> Option<&str> {
        self.error_description
            .as_deref()
            .or(self.msg.as_deref())
            .or(self.message.as_deref())
            .or(self.error.as_deref())
    }

    fn is_user_already_exists(&self) -> bool {
        self.error_code.as_deref() == Some("user_already_exists")
            || self
                .message()
                .is_some_and(|m| m.to_lowercase().contains("already registered"))
    }
}

impl BackendClient {
    /// Create a client and restore any persisted session.
    ///
    /// # Errors
    ///
    /// Returns error if the anon key is not a valid header value or the HTTP
    /// client fails to build.
    pub fn new(config: &BackendConfig, store: Arc<dyn KeyValueStore>) -> Result<Self, BackendError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "apikey",
            HeaderValue::from_str(config.anon_key.expose_secret())
                .map_err(|e| BackendError::Parse(format!("Invalid anon key format: {e}")))?,
        );

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        let session: Option<AuthSession> = storage::restore(store.as_ref(), keys::AUTH_SESSION);
        if let Some(session) = &session {
            tracing::debug!(user_id = %session.user.id, "Restored persisted auth session");
        }

        let (events, _) = broadcast::channel(EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(ClientInner {
                http,
                base_url: with_trailing_slash(config.url.clone()),
                anon_key: config.anon_key.clone(),
                session: RwLock::new(session),
                store,
                events,
            }),
        })
    }

    fn endpoint(&self, path: &str) -> Result<Url, BackendError> {
        Ok(self.inner.base_url.join(path)?)
    }

    fn token_endpoint(&self, grant_type: &str) -> Result<Url, BackendError> {
        let mut url = self.endpoint("auth/v1/token")?;
        url.query_pairs_mut().append_pair("grant_type", grant_type);
        Ok(url)
    }

    fn profile_endpoint(&self, user_id: &RemoteUserId) -> Result<Url, BackendError> {
        let mut url = self.endpoint("rest/v1/profiles")?;
        url.query_pairs_mut()
            .append_pair("id", &format!("eq.{user_id}"))
            .append_pair("select", "*");
        Ok(url)
    }

    /// Bearer token for data requests: the session's, or the anon key.
    async fn bearer(&self) -> String {
        match self.inner.session.read().await.as_ref() {
            Some(session) => session.access_token.clone(),
            None => self.inner.anon_key.expose_secret().to_owned(),
        }
    }

    async fn store_session(&self, session: Option<AuthSession>) {
        let mut current = self.inner.session.write().await;
        match &session {
            Some(session) => storage::persist(self.inner.store.as_ref(), keys::AUTH_SESSION, session),
            None => storage::forget(self.inner.store.as_ref(), keys::AUTH_SESSION),
        }
        *current = session;
    }

    fn emit(&self, event: AuthEvent) {
        let kind = event.kind();
        if self.inner.events.send(event).is_err() {
            tracing::debug!(event = kind, "No auth event subscribers");
        }
    }

    async fn request_token(
        &self,
        grant_type: &str,
        body: &serde_json::Value,
    ) -> Result<AuthSession, BackendError> {
        let now = chrono::Utc::now().timestamp();
        let response = self
            .inner
            .http
            .post(self.token_endpoint(grant_type)?)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            let token: TokenResponse = response
                .json()
                .await
                .map_err(|e| BackendError::Parse(e.to_string()))?;
            return Ok(token.into_session(now));
        }

        let text = response.text().await.unwrap_or_default();
        if status == reqwest::StatusCode::BAD_REQUEST || status == reqwest::StatusCode::UNAUTHORIZED
        {
            tracing::debug!(status = status.as_u16(), "Token request rejected");
            return Err(BackendError::InvalidCredentials);
        }
        Err(api_error(status, &text))
    }

    /// Exchange the refresh token for a new session.
    #[instrument(skip(self, refresh_token))]
    async fn refresh(&self, refresh_token: &str) -> Result<AuthSession, BackendError> {
        self.request_token(
            "refresh_token",
            &serde_json::json!({ "refresh_token": refresh_token }),
        )
        .await
    }
}

#[async_trait]
impl IdentityProvider for BackendClient {
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError> {
        let Some(session) = self.inner.session.read().await.clone() else {
            return Ok(None);
        };
        if !session.is_expired() {
            return Ok(Some(session));
        }

        let Some(refresh_token) = session.refresh_token.as_deref() else {
            tracing::info!(user_id = %session.user.id, "Session expired without refresh token");
            self.store_session(None).await;
            return Ok(None);
        };

        match self.refresh(refresh_token).await {
            Ok(refreshed) => {
                tracing::debug!(user_id = %refreshed.user.id, "Session refreshed");
                self.store_session(Some(refreshed.clone())).await;
                Ok(Some(refreshed))
            }
            Err(BackendError::InvalidCredentials) => {
                tracing::info!(user_id = %session.user.id, "Refresh token rejected, dropping session");
                self.store_session(None).await;
                self.emit(AuthEvent::SignedOut);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.inner.events.subscribe()
    }

    #[instrument(skip(self, credentials), fields(identifier = %credentials.identifier))]
    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, BackendError> {
        let password = credentials.password.expose_secret();
        let body = match &credentials.identifier {
            LoginIdentifier::Email(email) => {
                serde_json::json!({ "email": email.as_str(), "password": password })
            }
            LoginIdentifier::Phone(phone) => {
                serde_json::json!({ "phone": phone.e164(), "password": password })
            }
        };

        let session = self.request_token("password", &body).await?;
        tracing::info!(user_id = %session.user.id, "Signed in");
        self.store_session(Some(session.clone())).await;
        self.emit(AuthEvent::SignedIn {
            user: session.user.clone(),
        });
        Ok(session)
    }

    #[instrument(skip(self, request), fields(email = %request.email))]
    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, BackendError> {
        let now = chrono::Utc::now().timestamp();
        let body = serde_json::json!({
            "email": request.email.as_str(),
            "password": request.password.expose_secret(),
            "data": request.metadata,
        });

        let response = self
            .inner
            .http
            .post(self.endpoint("auth/v1/signup")?)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            if ErrorBody::parse(&text).is_user_already_exists() {
                return Err(BackendError::UserAlreadyExists);
            }
            return Err(api_error(status, &text));
        }

        // Without auto-confirm the response is the bare user, not a session
        let value: serde_json::Value =
            serde_json::from_str(&text).map_err(|e| BackendError::Parse(e.to_string()))?;
        if value.get("access_token").is_none() {
            tracing::info!("Sign-up pending email confirmation");
            return Ok(None);
        }

        let token: TokenResponse =
            serde_json::from_value(value).map_err(|e| BackendError::Parse(e.to_string()))?;
        let session = token.into_session(now);
        tracing::info!(user_id = %session.user.id, "Signed up");
        self.store_session(Some(session.clone())).await;
        self.emit(AuthEvent::SignedIn {
            user: session.user.clone(),
        });
        Ok(Some(session))
    }

    #[instrument(skip(self))]
    async fn sign_out(&self) -> Result<(), BackendError> {
        let token = self
            .inner
            .session
            .read()
            .await
            .as_ref()
            .map(|session| session.access_token.clone());

        if let Some(token) = token {
            let response = self
                .inner
                .http
                .post(self.endpoint("auth/v1/logout")?)
                .bearer_auth(token)
                .send()
                .await?;

            // An already-revoked token still ends the local session
            let status = response.status();
            if !status.is_success() {
                tracing::warn!(status = status.as_u16(), "Logout rejected by backend");
            }
        }

        self.store_session(None).await;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    #[instrument(skip(self), fields(email = %email))]
    async fn reset_password_for_email(&self, email: &Email) -> Result<(), BackendError> {
        let response = self
            .inner
            .http
            .post(self.endpoint("auth/v1/recover")?)
            .json(&serde_json::json!({ "email": email.as_str() }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }
        Ok(())
    }

    #[instrument(skip(self), fields(user_id = %user_id))]
    async fn fetch_profile(
        &self,
        user_id: &RemoteUserId,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        let response = self
            .inner
            .http
            .get(self.profile_endpoint(user_id)?)
            .bearer_auth(self.bearer().await)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(api_error(status, &text));
        }

        let rows: Vec<ProfileRecord> = response
            .json()
            .await
            .map_err(|e| BackendError::Parse(e.to_string()))?;
        Ok(rows.into_iter().next())
    }
}

fn api_error(status: reqwest::StatusCode, body: &str) -> BackendError {
    let parsed = ErrorBody::parse(body);
    let message = parsed.message().map_or_else(|| body.to_owned(), str::to_owned);
    BackendError::Api {
        status: status.as_u16(),
        message,
    }
}

/// `Url::join` drops the last path segment unless the base ends in `/`.
fn with_trailing_slash(mut url: Url) -> Url {
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}
