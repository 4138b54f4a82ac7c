//! Integration tests for the Farmacia storefront session core.
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p farmacia-integration-tests
//! ```
//!
//! # Test Categories
//!
//! - `cart_persistence` - Cart rehydration against the catalog
//! - `user_addresses` - Default address bookkeeping across reloads
//! - `auth_bridge` - Session mirroring from the identity provider
//! - `dialog_flow` - Auth dialogs driven through the storefront state
//!
//! Everything runs in-process against a [`FakeProvider`] and a
//! [`MemoryStore`]; no network or database is needed.

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use secrecy::ExposeSecret;
use tokio::sync::{broadcast, mpsc};

use farmacia_core::{Email, Price, ProductId, RemoteUserId};
use farmacia_storefront::backend::{BackendError, IdentityProvider};
use farmacia_storefront::catalog::{Catalog, Product};
use farmacia_storefront::models::session::{
    AuthEvent, AuthSession, Credentials, LoginIdentifier, ProfileRecord, RemoteUser, SignUpRequest,
};
use farmacia_storefront::services::notifications::{ChannelNotifier, Notification};
use farmacia_storefront::state::StorefrontState;
use farmacia_storefront::storage::MemoryStore;

/// Scripted identity provider.
///
/// Accounts and profile rows are registered up front; every call is counted
/// so tests can assert what the session core asked for.
pub struct FakeProvider {
    events: broadcast::Sender<AuthEvent>,
    session: Mutex<Option<AuthSession>>,
    accounts: Mutex<HashMap<String, (String, RemoteUser)>>,
    profiles: Mutex<HashMap<RemoteUserId, ProfileRecord>>,
    reset_requests: Mutex<Vec<String>>,
    probe_fails: AtomicBool,
    profile_fails: AtomicBool,
    sign_out_fails: AtomicBool,
    confirm_email: AtomicBool,
    get_session_calls: AtomicUsize,
    fetch_profile_calls: AtomicUsize,
}

impl Default for FakeProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeProvider {
    #[must_use]
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(16);
        Self {
            events,
            session: Mutex::new(None),
            accounts: Mutex::new(HashMap::new()),
            profiles: Mutex::new(HashMap::new()),
            reset_requests: Mutex::new(Vec::new()),
            probe_fails: AtomicBool::new(false),
            profile_fails: AtomicBool::new(false),
            sign_out_fails: AtomicBool::new(false),
            confirm_email: AtomicBool::new(false),
            get_session_calls: AtomicUsize::new(0),
            fetch_profile_calls: AtomicUsize::new(0),
        }
    }

    /// Register an account reachable by `identifier` (an email or an E.164
    /// phone) and `password`.
    pub fn add_account(&self, identifier: &str, password: &str, user: RemoteUser) {
        self.accounts
            .lock()
            .insert(identifier.to_string(), (password.to_string(), user));
    }

    pub fn add_profile(&self, record: ProfileRecord) {
        self.profiles.lock().insert(record.id.clone(), record);
    }

    /// Pretend a session already exists, as if restored by the provider.
    pub fn set_session(&self, session: Option<AuthSession>) {
        *self.session.lock() = session;
    }

    pub fn set_probe_fails(&self, fails: bool) {
        self.probe_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_profile_fails(&self, fails: bool) {
        self.profile_fails.store(fails, Ordering::SeqCst);
    }

    pub fn set_sign_out_fails(&self, fails: bool) {
        self.sign_out_fails.store(fails, Ordering::SeqCst);
    }

    /// Make sign-up return no session until the email is confirmed.
    pub fn set_confirm_email(&self, required: bool) {
        self.confirm_email.store(required, Ordering::SeqCst);
    }

    /// Push an event to subscribers. Returns how many received it.
    pub fn emit(&self, event: AuthEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }

    /// Number of live event subscriptions.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.events.receiver_count()
    }

    #[must_use]
    pub fn get_session_calls(&self) -> usize {
        self.get_session_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn fetch_profile_calls(&self) -> usize {
        self.fetch_profile_calls.load(Ordering::SeqCst)
    }

    #[must_use]
    pub fn reset_requests(&self) -> Vec<String> {
        self.reset_requests.lock().clone()
    }

    #[must_use]
    pub fn has_session(&self) -> bool {
        self.session.lock().is_some()
    }

    fn open_session(&self, user: RemoteUser) -> AuthSession {
        let session = session_for(user);
        *self.session.lock() = Some(session.clone());
        self.emit(AuthEvent::SignedIn {
            user: session.user.clone(),
        });
        session
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<AuthSession>, BackendError> {
        self.get_session_calls.fetch_add(1, Ordering::SeqCst);
        if self.probe_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 503,
                message: "unavailable".to_string(),
            });
        }
        Ok(self.session.lock().clone())
    }

    fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    async fn sign_in_with_password(
        &self,
        credentials: &Credentials,
    ) -> Result<AuthSession, BackendError> {
        let key = match &credentials.identifier {
            LoginIdentifier::Email(email) => email.as_str().to_string(),
            LoginIdentifier::Phone(phone) => phone.e164(),
        };
        let user = {
            let accounts = self.accounts.lock();
            match accounts.get(&key) {
                Some((password, user)) if password == credentials.password.expose_secret() => {
                    user.clone()
                }
                _ => return Err(BackendError::InvalidCredentials),
            }
        };
        Ok(self.open_session(user))
    }

    async fn sign_up(&self, request: &SignUpRequest) -> Result<Option<AuthSession>, BackendError> {
        let email = request.email.as_str().to_string();
        let user = {
            let mut accounts = self.accounts.lock();
            if accounts.contains_key(&email) {
                return Err(BackendError::UserAlreadyExists);
            }
            let mut user = RemoteUser::new(format!("user-{}", accounts.len() + 1), email.clone());
            user.user_metadata = request.metadata.clone();
            accounts.insert(
                email,
                (request.password.expose_secret().to_string(), user.clone()),
            );
            user
        };

        if self.confirm_email.load(Ordering::SeqCst) {
            return Ok(None);
        }
        Ok(Some(self.open_session(user)))
    }

    async fn sign_out(&self) -> Result<(), BackendError> {
        if self.sign_out_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 500,
                message: "logout failed".to_string(),
            });
        }
        *self.session.lock() = None;
        self.emit(AuthEvent::SignedOut);
        Ok(())
    }

    async fn reset_password_for_email(&self, email: &Email) -> Result<(), BackendError> {
        self.reset_requests.lock().push(email.as_str().to_string());
        Ok(())
    }

    async fn fetch_profile(
        &self,
        user_id: &RemoteUserId,
    ) -> Result<Option<ProfileRecord>, BackendError> {
        self.fetch_profile_calls.fetch_add(1, Ordering::SeqCst);
        if self.profile_fails.load(Ordering::SeqCst) {
            return Err(BackendError::Api {
                status: 500,
                message: "profiles unavailable".to_string(),
            });
        }
        Ok(self.profiles.lock().get(user_id).cloned())
    }
}

/// A non-expiring session for `user`.
#[must_use]
pub fn session_for(user: RemoteUser) -> AuthSession {
    AuthSession {
        access_token: format!("token-{}", user.id),
        refresh_token: Some(format!("refresh-{}", user.id)),
        expires_at: None,
        user,
    }
}

/// A small catalog: a pain reliever, vitamins and a thermometer.
#[must_use]
pub fn sample_catalog() -> Catalog {
    let product = |id: i32, name: &str, cents: i64, category: &str| Product {
        id: ProductId::new(id),
        name: name.to_string(),
        description: String::new(),
        price: Price::from_cents(cents),
        image_url: format!("/images/{id}.png"),
        category: category.to_string(),
        in_stock: true,
    };

    Catalog::new(vec![
        product(1, "Acetaminofén 500mg", 450, "analgesicos"),
        product(2, "Vitamina C 1g", 1299, "vitaminas"),
        product(3, "Termómetro digital", 2500, "equipos"),
    ])
    .unwrap_or_default()
}

/// A storefront wired to in-memory storage and a fake provider.
pub struct TestContext {
    pub store: Arc<MemoryStore>,
    pub provider: Arc<FakeProvider>,
    pub state: StorefrontState,
    pub notifications: mpsc::UnboundedReceiver<Notification>,
}

impl TestContext {
    /// Fresh storage, fresh provider.
    #[must_use]
    pub fn new() -> Self {
        Self::with(Arc::new(MemoryStore::new()), Arc::new(FakeProvider::new()))
    }

    /// Build over existing storage and provider, as after a page reload.
    #[must_use]
    pub fn with(store: Arc<MemoryStore>, provider: Arc<FakeProvider>) -> Self {
        let (notifier, notifications) = ChannelNotifier::new();
        let state = StorefrontState::new(
            sample_catalog(),
            store.clone(),
            provider.clone(),
            Arc::new(notifier),
        );
        Self {
            store,
            provider,
            state,
            notifications,
        }
    }

    /// Reload the storefront over the same storage and provider.
    #[must_use]
    pub fn reload(&self) -> Self {
        self.state.stop();
        Self::with(self.store.clone(), self.provider.clone())
    }

    #[must_use]
    pub fn product(&self, id: i32) -> Option<Product> {
        self.state.catalog().find(ProductId::new(id)).cloned()
    }

    /// Drain the notifications raised so far.
    pub fn take_notifications(&mut self) -> Vec<Notification> {
        let mut taken = Vec::new();
        while let Ok(notification) = self.notifications.try_recv() {
            taken.push(notification);
        }
        taken
    }

    /// Give the bridge's event loop a chance to run.
    pub async fn settle(&self) {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }
}

impl Default for TestContext {
    fn default() -> Self {
        Self::new()
    }
}
