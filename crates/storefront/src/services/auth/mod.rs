//! Auth session bridge.
//!
//! Mirrors the identity provider's session into the [`UserStore`]. Provider
//! events and the one-time startup probe go through the same transition
//! function, serialized by one async mutex, so a session is never processed
//! twice and a sign-in can never interleave with a sign-out.
//!
//! ```text
//! Anonymous --SignedIn / probe found session--> Authenticated{user_id}
//! Authenticated --SignedOut / probe found nothing--> Anonymous
//! ```
//!
//! The bridge also runs the dialogs' auth actions. Their failures are turned
//! into notifications and an [`AuthOutcome`]; nothing is returned as an error.

mod error;
mod forms;
mod mapping;

pub use error::AuthError;
pub use forms::{FieldError, MIN_PASSWORD_LENGTH, RegistrationForm};
pub use mapping::{profile_from_metadata, profile_from_record};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use secrecy::SecretString;
use tokio::sync::{Mutex, broadcast};
use tokio::task::JoinHandle;
use tracing::instrument;

use farmacia_core::{Email, RemoteUserId};

use crate::backend::IdentityProvider;
use crate::error::{clear_sentry_user, set_sentry_user};
use crate::models::session::{AuthEvent, Credentials, LoginIdentifier, RemoteUser};
use crate::services::notifications::{Notification, Notifier};
use crate::services::user::UserStore;

/// Where the bridge believes the session is.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    #[default]
    Anonymous,
    Authenticated { user_id: RemoteUserId },
}

impl SessionState {
    fn is_user(&self, id: &RemoteUserId) -> bool {
        matches!(self, Self::Authenticated { user_id } if user_id == id)
    }
}

/// Result of an auth action, for the dialog to react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthOutcome {
    Success,
    Failed { message: String },
}

impl AuthOutcome {
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// Keeps the user store in step with the identity provider.
///
/// Cheaply cloneable; clones share state and the event loop task.
#[derive(Clone)]
pub struct AuthBridge {
    inner: Arc<BridgeInner>,
}

struct BridgeInner {
    provider: Arc<dyn IdentityProvider>,
    users: Arc<UserStore>,
    notifier: Arc<dyn Notifier>,
    session: Mutex<SessionState>,
    probe_claimed: AtomicBool,
    initialized: AtomicBool,
    in_flight: AtomicUsize,
    task: parking_lot::Mutex<Option<JoinHandle<()>>>,
}

/// Marks an auth action as running until dropped.
struct LoadingGuard<'a>(&'a AtomicUsize);

impl<'a> LoadingGuard<'a> {
    fn new(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::AcqRel);
        Self(counter)
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::AcqRel);
    }
}

impl AuthBridge {
    #[must_use]
    pub fn new(
        provider: Arc<dyn IdentityProvider>,
        users: Arc<UserStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(BridgeInner {
                provider,
                users,
                notifier,
                session: Mutex::new(SessionState::Anonymous),
                probe_claimed: AtomicBool::new(false),
                initialized: AtomicBool::new(false),
                in_flight: AtomicUsize::new(0),
                task: parking_lot::Mutex::new(None),
            }),
        }
    }

    /// Subscribe to provider events, spawn the event loop, then probe for a
    /// session established before startup.
    ///
    /// Calling `start` on a running bridge does nothing.
    #[instrument(skip(self))]
    pub async fn start(&self) {
        {
            let mut task = self.inner.task.lock();
            if task.is_some() {
                tracing::warn!("Auth bridge already started");
                return;
            }
            let events = self.inner.provider.subscribe();
            let inner = Arc::clone(&self.inner);
            *task = Some(tokio::spawn(inner.run_events(events)));
        }

        self.inner.probe().await;
    }

    /// Abort the event loop and drop the subscription. Idempotent.
    ///
    /// A later [`AuthBridge::start`] subscribes and checks the session again.
    pub fn stop(&self) {
        if let Some(task) = self.inner.task.lock().take() {
            task.abort();
            self.inner.probe_claimed.store(false, Ordering::Release);
            tracing::info!("Auth bridge stopped");
        }
    }

    /// Whether the event loop is running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.inner
            .task
            .lock()
            .as_ref()
            .is_some_and(|task| !task.is_finished())
    }

    /// Whether the startup probe has completed.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.inner.initialized.load(Ordering::Acquire)
    }

    /// Whether an auth action is in flight.
    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.inner.in_flight.load(Ordering::Acquire) > 0
    }

    /// Current session state.
    pub async fn session_state(&self) -> SessionState {
        self.inner.session.lock().await.clone()
    }

    /// Feed an event through the transition function directly.
    pub async fn handle_event(&self, event: AuthEvent) {
        self.inner.handle(event).await;
    }

    /// Sign in with an email or phone and a password.
    #[instrument(skip(self, identifier, password), fields(identifier = %identifier))]
    pub async fn sign_in(&self, identifier: &LoginIdentifier, password: SecretString) -> AuthOutcome {
        let _loading = LoadingGuard::new(&self.inner.in_flight);
        let credentials = Credentials {
            identifier: identifier.clone(),
            password,
        };

        match self.inner.provider.sign_in_with_password(&credentials).await {
            Ok(session) => {
                self.inner
                    .handle(AuthEvent::SignedIn { user: session.user })
                    .await;
                AuthOutcome::Success
            }
            Err(e) => self.inner.fail("Could not sign in", &AuthError::from(e)),
        }
    }

    /// Validate the registration form and create the account.
    #[instrument(skip(self, form), fields(email = %form.email))]
    pub async fn sign_up(&self, form: RegistrationForm) -> AuthOutcome {
        let _loading = LoadingGuard::new(&self.inner.in_flight);
        let request = match form.validate() {
            Ok(request) => request,
            Err(e) => return self.inner.fail("Could not create account", &e),
        };

        match self.inner.provider.sign_up(&request).await {
            Ok(Some(session)) => {
                self.inner
                    .notifier
                    .notify(Notification::success("Account created"));
                self.inner
                    .handle(AuthEvent::SignedIn { user: session.user })
                    .await;
                AuthOutcome::Success
            }
            Ok(None) => {
                self.inner.notifier.notify(
                    Notification::info("Account created")
                        .with_description("Check your email to confirm your account"),
                );
                AuthOutcome::Success
            }
            Err(e) => self.inner.fail("Could not create account", &AuthError::from(e)),
        }
    }

    /// End the session at the provider, then locally.
    #[instrument(skip(self))]
    pub async fn sign_out(&self) -> AuthOutcome {
        let _loading = LoadingGuard::new(&self.inner.in_flight);
        match self.inner.provider.sign_out().await {
            Ok(()) => {
                self.inner.handle(AuthEvent::SignedOut).await;
                AuthOutcome::Success
            }
            Err(e) => self.inner.fail("Could not sign out", &AuthError::from(e)),
        }
    }

    /// Ask the provider to send a password recovery email.
    #[instrument(skip(self))]
    pub async fn request_password_reset(&self, email: &str) -> AuthOutcome {
        let _loading = LoadingGuard::new(&self.inner.in_flight);
        let email = match Email::parse(email) {
            Ok(email) => email,
            Err(e) => return self.inner.fail("Could not send reset email", &AuthError::from(e)),
        };

        match self.inner.provider.reset_password_for_email(&email).await {
            Ok(()) => {
                self.inner.notifier.notify(
                    Notification::success("Check your email")
                        .with_description("We sent you a link to reset your password"),
                );
                AuthOutcome::Success
            }
            Err(e) => self.inner.fail("Could not send reset email", &AuthError::from(e)),
        }
    }
}

impl BridgeInner {
    async fn run_events(self: Arc<Self>, mut events: broadcast::Receiver<AuthEvent>) {
        loop {
            match events.recv().await {
                Ok(event) => self.handle(event).await,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "Auth event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    tracing::debug!("Auth event stream closed");
                    break;
                }
            }
        }
    }

    /// Run the startup probe once per start; later calls return immediately.
    async fn probe(&self) {
        if self
            .probe_claimed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!("Session probe already claimed");
            return;
        }

        match self.provider.get_session().await {
            Ok(session) => self.handle(AuthEvent::SessionProbeResult { session }).await,
            // Keep local state when the provider is unreachable
            Err(e) => tracing::warn!(error = %e, "Session probe failed"),
        }
        self.initialized.store(true, Ordering::Release);
    }

    #[instrument(skip(self, event), fields(event = event.kind()))]
    async fn handle(&self, event: AuthEvent) {
        let mut state = self.session.lock().await;

        match event {
            AuthEvent::SignedIn { user } => {
                if state.is_user(&user.id) {
                    tracing::debug!(user_id = %user.id, "Session already handled");
                    return;
                }
                self.establish(&user).await;
                *state = SessionState::Authenticated {
                    user_id: user.id.clone(),
                };
                let greeting = self
                    .users
                    .profile()
                    .map(|p| p.name)
                    .filter(|name| !name.is_empty());
                let notification = Notification::success("Signed in");
                self.notifier.notify(match greeting {
                    Some(name) => notification.with_description(format!("Welcome, {name}")),
                    None => notification,
                });
            }
            AuthEvent::SignedOut => {
                if *state == SessionState::Anonymous && !self.users.is_logged_in() {
                    tracing::debug!("Already signed out");
                    return;
                }
                self.users.logout();
                *state = SessionState::Anonymous;
                clear_sentry_user();
                self.notifier.notify(Notification::info("Signed out"));
            }
            AuthEvent::SessionProbeResult {
                session: Some(session),
            } => {
                if state.is_user(&session.user.id) {
                    tracing::debug!(user_id = %session.user.id, "Probe skipped, session already handled");
                    return;
                }
                self.establish(&session.user).await;
                *state = SessionState::Authenticated {
                    user_id: session.user.id.clone(),
                };
            }
            AuthEvent::SessionProbeResult { session: None } => {
                if self.users.is_logged_in() {
                    tracing::info!("No remote session, clearing local login");
                    self.users.logout();
                    clear_sentry_user();
                }
                *state = SessionState::Anonymous;
            }
        }
    }

    /// Make `user` the local account and refresh its profile.
    ///
    /// Data left by a different account is cleared first; data stored for
    /// the same account (after a restart) is kept.
    async fn establish(&self, user: &RemoteUser) {
        let same_account = self
            .users
            .profile()
            .is_some_and(|profile| profile.id == user.id.as_str());
        if same_account {
            tracing::debug!(user_id = %user.id, "Keeping stored data for returning account");
        } else {
            self.users.clear_session_data();
        }

        let update = match self.provider.fetch_profile(&user.id).await {
            Ok(Some(record)) => profile_from_record(user, &record),
            Ok(None) => {
                tracing::debug!(user_id = %user.id, "No profile row, using account metadata");
                profile_from_metadata(user)
            }
            Err(e) => {
                tracing::warn!(user_id = %user.id, error = %e, "Profile fetch failed, using account metadata");
                profile_from_metadata(user)
            }
        };

        self.users.login();
        self.users.update_user_profile(update);
        set_sentry_user(&user.id, user.email.as_deref());
        tracing::info!(user_id = %user.id, "Session established");
    }

    fn fail(&self, title: &str, error: &AuthError) -> AuthOutcome {
        tracing::warn!(error = %error, "{title}");
        let message = error.user_message();
        self.notifier
            .notify(Notification::error(title).with_description(message.clone()));
        AuthOutcome::Failed { message }
    }
}
