//! User profile store.
//!
//! Owns the logged-in flag, profile, addresses, purchase history and
//! favorites. Each collection is persisted under its own key after every
//! change and rehydrated independently on load.
//!
//! The store does not talk to the identity provider; the auth bridge drives
//! [`UserStore::login`] and [`UserStore::logout`] from provider events.

use std::sync::Arc;

use parking_lot::RwLock;

use farmacia_core::{AddressId, FavoriteId};

use crate::models::session::keys;
use crate::models::user::{
    Address, AddressDraft, AddressUpdate, FavoriteDraft, FavoriteItem, ProfileUpdate, Purchase,
    UserProfile,
};
use crate::storage::{self, KeyValueStore};

#[derive(Debug, Default)]
struct UserState {
    is_logged_in: bool,
    profile: Option<UserProfile>,
    addresses: Vec<Address>,
    purchases: Vec<Purchase>,
    favorites: Vec<FavoriteItem>,
}

/// Profile, addresses, purchases and favorites of the current customer.
pub struct UserStore {
    store: Arc<dyn KeyValueStore>,
    state: RwLock<UserState>,
}

impl UserStore {
    /// Rehydrate every collection from `store`.
    #[must_use]
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let kv = store.as_ref();
        let mut addresses: Vec<Address> = storage::restore(kv, keys::ADDRESSES).unwrap_or_default();
        if normalize_default(&mut addresses) {
            tracing::warn!(key = keys::ADDRESSES, "Repaired default flag on persisted addresses");
        }

        let state = UserState {
            is_logged_in: storage::restore(kv, keys::IS_LOGGED_IN).unwrap_or(false),
            profile: storage::restore(kv, keys::USER_PROFILE),
            addresses,
            purchases: storage::restore(kv, keys::PURCHASES).unwrap_or_default(),
            favorites: storage::restore(kv, keys::FAVORITES).unwrap_or_default(),
        };
        tracing::debug!(
            is_logged_in = state.is_logged_in,
            has_profile = state.profile.is_some(),
            addresses = state.addresses.len(),
            "User store rehydrated"
        );

        Self {
            store,
            state: RwLock::new(state),
        }
    }

    /// Mark the customer as logged in. Profile data is filled separately.
    pub fn login(&self) {
        let mut state = self.state.write();
        state.is_logged_in = true;
        storage::persist(self.store.as_ref(), keys::IS_LOGGED_IN, &true);
    }

    /// Mark the customer as logged out and drop all per-account data from
    /// memory and the durable store.
    pub fn logout(&self) {
        let mut state = self.state.write();
        state.is_logged_in = false;
        storage::persist(self.store.as_ref(), keys::IS_LOGGED_IN, &false);
        self.clear_locked(&mut state);
        tracing::info!("User logged out, session data cleared");
    }

    /// Drop per-account data without changing the logged-in flag.
    pub fn clear_session_data(&self) {
        let mut state = self.state.write();
        self.clear_locked(&mut state);
    }

    /// Merge `update` into the profile, starting from defaults if there is
    /// none yet.
    pub fn update_user_profile(&self, update: ProfileUpdate) {
        let mut state = self.state.write();
        let profile = state.profile.get_or_insert_with(UserProfile::default);
        update.apply_to(profile);
        storage::persist(self.store.as_ref(), keys::USER_PROFILE, profile);
    }

    /// Save a new address and return its ID.
    ///
    /// The first address, or one that asks for it, becomes the default and
    /// every other address is demoted.
    pub fn add_address(&self, draft: AddressDraft) -> AddressId {
        let mut state = self.state.write();
        let id = AddressId::generate();
        let make_default = state.addresses.is_empty() || draft.is_default;
        if make_default {
            for address in &mut state.addresses {
                address.is_default = false;
            }
        }
        state
            .addresses
            .push(draft.into_address(id.clone(), make_default));
        storage::persist(self.store.as_ref(), keys::ADDRESSES, &state.addresses);
        id
    }

    /// Merge `update` into an address. Returns `false` if no address has
    /// that ID.
    ///
    /// Setting `is_default` to `true` demotes every other address. Clearing
    /// it is ignored, since some address must stay the default.
    pub fn update_address(&self, id: &AddressId, update: AddressUpdate) -> bool {
        let mut state = self.state.write();
        let Some(index) = state.addresses.iter().position(|a| &a.id == id) else {
            return false;
        };

        if update.is_default == Some(true) {
            for (i, address) in state.addresses.iter_mut().enumerate() {
                address.is_default = i == index;
            }
        }
        if let Some(address) = state.addresses.get_mut(index) {
            update.apply_to(address);
        }
        storage::persist(self.store.as_ref(), keys::ADDRESSES, &state.addresses);
        true
    }

    /// Delete an address. Returns `false` if no address has that ID.
    ///
    /// Removing the default promotes the first remaining address.
    pub fn remove_address(&self, id: &AddressId) -> bool {
        let mut state = self.state.write();
        let Some(index) = state.addresses.iter().position(|a| &a.id == id) else {
            return false;
        };

        let removed = state.addresses.remove(index);
        if removed.is_default
            && let Some(first) = state.addresses.first_mut()
        {
            first.is_default = true;
        }
        storage::persist(self.store.as_ref(), keys::ADDRESSES, &state.addresses);
        true
    }

    /// Save a favorite and return its ID.
    pub fn add_to_favorites(&self, draft: FavoriteDraft) -> FavoriteId {
        let mut state = self.state.write();
        let id = FavoriteId::generate();
        state.favorites.push(FavoriteItem {
            id: id.clone(),
            name: draft.name,
            price: draft.price,
            image_url: draft.image_url,
            in_stock: draft.in_stock,
        });
        storage::persist(self.store.as_ref(), keys::FAVORITES, &state.favorites);
        id
    }

    /// Delete a favorite. Returns `false` if no favorite has that ID.
    pub fn remove_from_favorites(&self, id: &FavoriteId) -> bool {
        let mut state = self.state.write();
        let before = state.favorites.len();
        state.favorites.retain(|f| &f.id != id);
        if state.favorites.len() == before {
            return false;
        }
        storage::persist(self.store.as_ref(), keys::FAVORITES, &state.favorites);
        true
    }

    #[must_use]
    pub fn is_logged_in(&self) -> bool {
        self.state.read().is_logged_in
    }

    #[must_use]
    pub fn profile(&self) -> Option<UserProfile> {
        self.state.read().profile.clone()
    }

    #[must_use]
    pub fn addresses(&self) -> Vec<Address> {
        self.state.read().addresses.clone()
    }

    /// The address preselected at checkout.
    #[must_use]
    pub fn default_address(&self) -> Option<Address> {
        self.state
            .read()
            .addresses
            .iter()
            .find(|a| a.is_default)
            .cloned()
    }

    #[must_use]
    pub fn purchases(&self) -> Vec<Purchase> {
        self.state.read().purchases.clone()
    }

    #[must_use]
    pub fn favorites(&self) -> Vec<FavoriteItem> {
        self.state.read().favorites.clone()
    }

    fn clear_locked(&self, state: &mut UserState) {
        state.profile = None;
        state.addresses.clear();
        state.purchases.clear();
        state.favorites.clear();
        for key in keys::SESSION_DATA {
            storage::forget(self.store.as_ref(), key);
        }
    }
}

/// Leave exactly one default in a non-empty list: the first flagged address,
/// or the first address if none is flagged. Returns whether anything changed.
fn normalize_default(addresses: &mut [Address]) -> bool {
    let keep = addresses.iter().position(|a| a.is_default).unwrap_or(0);
    let mut changed = false;
    for (i, address) in addresses.iter_mut().enumerate() {
        let should_be_default = i == keep;
        if address.is_default != should_be_default {
            address.is_default = should_be_default;
            changed = true;
        }
    }
    changed
}
