//! Storefront state shared across the UI.

use std::sync::Arc;

use parking_lot::Mutex;
use secrecy::SecretString;

use crate::backend::IdentityProvider;
use crate::catalog::Catalog;
use crate::services::auth::{AuthBridge, AuthOutcome, RegistrationForm};
use crate::services::cart::CartStore;
use crate::services::notifications::{Notification, Notifier};
use crate::services::user::UserStore;
use crate::storage::KeyValueStore;
use crate::ui::{AuthDialog, DialogKind};

/// Everything the storefront UI reads and drives.
///
/// This struct is cheaply cloneable via `Arc`; clones share the stores, the
/// auth bridge and the dialog.
#[derive(Clone)]
pub struct StorefrontState {
    inner: Arc<StorefrontStateInner>,
}

struct StorefrontStateInner {
    catalog: Arc<Catalog>,
    cart: Arc<CartStore>,
    users: Arc<UserStore>,
    auth: AuthBridge,
    notifier: Arc<dyn Notifier>,
    dialog: Mutex<AuthDialog>,
}

impl StorefrontState {
    /// Rehydrate the stores from `store` and wire the auth bridge.
    ///
    /// The bridge is idle until [`StorefrontState::start`] is called.
    #[must_use]
    pub fn new(
        catalog: Catalog,
        store: Arc<dyn KeyValueStore>,
        provider: Arc<dyn IdentityProvider>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let cart = Arc::new(CartStore::load(
            &catalog,
            Arc::clone(&store),
            Arc::clone(&notifier),
        ));
        let users = Arc::new(UserStore::load(store));
        let auth = AuthBridge::new(provider, Arc::clone(&users), Arc::clone(&notifier));

        Self {
            inner: Arc::new(StorefrontStateInner {
                catalog: Arc::new(catalog),
                cart,
                users,
                auth,
                notifier,
                dialog: Mutex::new(AuthDialog::new()),
            }),
        }
    }

    /// Start the auth bridge and probe for an existing session.
    pub async fn start(&self) {
        self.inner.auth.start().await;
    }

    /// Stop the auth bridge.
    pub fn stop(&self) {
        self.inner.auth.stop();
    }

    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    #[must_use]
    pub fn cart(&self) -> &CartStore {
        &self.inner.cart
    }

    #[must_use]
    pub fn users(&self) -> &UserStore {
        &self.inner.users
    }

    #[must_use]
    pub fn auth(&self) -> &AuthBridge {
        &self.inner.auth
    }

    /// Snapshot of the auth dialog.
    #[must_use]
    pub fn dialog(&self) -> AuthDialog {
        self.inner.dialog.lock().clone()
    }

    /// Run `f` against the auth dialog.
    pub fn with_dialog<R>(&self, f: impl FnOnce(&mut AuthDialog) -> R) -> R {
        f(&mut self.inner.dialog.lock())
    }

    pub fn open_dialog(&self, kind: DialogKind) {
        self.inner.dialog.lock().open(kind);
    }

    pub fn close_dialog(&self) {
        self.inner.dialog.lock().close();
    }

    /// Sign in with the identifier entered in the login dialog.
    ///
    /// Closes the dialog on success.
    pub async fn sign_in(&self, password: SecretString) -> AuthOutcome {
        let identifier = self.inner.dialog.lock().identifier().cloned();
        let Some(identifier) = identifier else {
            let message = "Enter your email or phone number first".to_string();
            self.inner
                .notifier
                .notify(Notification::error("Could not sign in").with_description(message.clone()));
            return AuthOutcome::Failed { message };
        };

        let outcome = self.inner.auth.sign_in(&identifier, password).await;
        self.close_on_success(&outcome);
        outcome
    }

    /// Create an account from the registration dialog.
    ///
    /// Closes the dialog on success.
    pub async fn sign_up(&self, form: RegistrationForm) -> AuthOutcome {
        let outcome = self.inner.auth.sign_up(form).await;
        self.close_on_success(&outcome);
        outcome
    }

    /// Send a password recovery email from the recovery dialog.
    ///
    /// Closes the dialog on success.
    pub async fn request_password_reset(&self, email: &str) -> AuthOutcome {
        let outcome = self.inner.auth.request_password_reset(email).await;
        self.close_on_success(&outcome);
        outcome
    }

    pub async fn sign_out(&self) -> AuthOutcome {
        self.inner.auth.sign_out().await
    }

    fn close_on_success(&self, outcome: &AuthOutcome) {
        if outcome.is_success() {
            self.close_dialog();
        }
    }
}
