//! Cart store.
//!
//! Single source of truth for the shopping cart. Every mutation updates the
//! in-memory line items and then writes the `(productId, quantity)` projection
//! under [`keys::CART`]. Loading rejoins that projection against the catalog.

use std::sync::Arc;

use parking_lot::RwLock;
use thiserror::Error;

use farmacia_core::{Price, ProductId};

use crate::catalog::{Catalog, Product};
use crate::error::add_breadcrumb;
use crate::models::cart::{CartItem, CartSummary, MAX_QUANTITY_PER_ITEM, StoredCartLine};
use crate::models::session::keys;
use crate::services::notifications::{Notification, Notifier};
use crate::storage::{self, KeyValueStore};

/// Errors that can occur when changing cart quantities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CartError {
    /// Quantity must be positive when adding.
    #[error("invalid quantity: {0}")]
    InvalidQuantity(i64),

    /// Resulting line quantity is above the per-item cap.
    #[error("quantity {requested} exceeds limit of {max}")]
    QuantityExceedsLimit { requested: i64, max: u32 },
}

#[derive(Debug, Default)]
struct CartState {
    items: Vec<CartItem>,
    is_open: bool,
}

/// The shopping cart.
pub struct CartStore {
    store: Arc<dyn KeyValueStore>,
    notifier: Arc<dyn Notifier>,
    state: RwLock<CartState>,
}

impl CartStore {
    /// Rehydrate the cart from `store`, dropping lines the catalog no longer
    /// lists.
    #[must_use]
    pub fn load(
        catalog: &Catalog,
        store: Arc<dyn KeyValueStore>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let items = restore_items(catalog, store.as_ref());
        tracing::debug!(lines = items.len(), "Cart rehydrated");
        Self {
            store,
            notifier,
            state: RwLock::new(CartState {
                items,
                is_open: false,
            }),
        }
    }

    /// Add `quantity` of `product`, accumulating onto an existing line.
    ///
    /// Opens the cart panel and shows a confirmation.
    ///
    /// # Errors
    ///
    /// Returns `CartError::InvalidQuantity` for a zero quantity and
    /// `CartError::QuantityExceedsLimit` if the line would go above
    /// [`MAX_QUANTITY_PER_ITEM`].
    pub fn add_to_cart(&self, product: &Product, quantity: u32) -> Result<(), CartError> {
        if quantity == 0 {
            return Err(CartError::InvalidQuantity(0));
        }

        {
            let mut state = self.state.write();
            let existing = state
                .items
                .iter()
                .position(|item| item.product.id == product.id);

            let current = existing
                .and_then(|index| state.items.get(index))
                .map_or(0, |item| item.quantity);
            let requested = u64::from(current) + u64::from(quantity);
            let new_quantity = u32::try_from(requested)
                .ok()
                .filter(|q| *q <= MAX_QUANTITY_PER_ITEM)
                .ok_or_else(|| CartError::QuantityExceedsLimit {
                    requested: i64::try_from(requested).unwrap_or(i64::MAX),
                    max: MAX_QUANTITY_PER_ITEM,
                })?;

            match existing {
                Some(index) => {
                    if let Some(item) = state.items.get_mut(index) {
                        item.quantity = new_quantity;
                    }
                }
                None => state.items.push(CartItem {
                    product: product.clone(),
                    quantity: new_quantity,
                }),
            }
            state.is_open = true;
            self.persist(&state.items);
        }

        tracing::info!(product_id = %product.id, quantity, "Added to cart");
        let product_id = product.id.to_string();
        add_breadcrumb(
            "cart",
            "Added to cart",
            Some(&[("product_id", product_id.as_str())]),
        );
        self.notifier.notify(
            Notification::success("Added to cart")
                .with_description(format!("{} x{quantity}", product.name)),
        );
        Ok(())
    }

    /// Replace the quantity of a line. Zero or negative removes it; an
    /// unknown product is ignored.
    ///
    /// # Errors
    ///
    /// Returns `CartError::QuantityExceedsLimit` if `quantity` is above
    /// [`MAX_QUANTITY_PER_ITEM`].
    pub fn update_quantity(&self, product_id: ProductId, quantity: i64) -> Result<(), CartError> {
        if quantity <= 0 {
            self.remove_from_cart(product_id);
            return Ok(());
        }

        let new_quantity = u32::try_from(quantity)
            .ok()
            .filter(|q| *q <= MAX_QUANTITY_PER_ITEM)
            .ok_or(CartError::QuantityExceedsLimit {
                requested: quantity,
                max: MAX_QUANTITY_PER_ITEM,
            })?;

        let mut state = self.state.write();
        let Some(item) = state
            .items
            .iter_mut()
            .find(|item| item.product.id == product_id)
        else {
            return Ok(());
        };
        if item.quantity != new_quantity {
            item.quantity = new_quantity;
            self.persist(&state.items);
        }
        Ok(())
    }

    /// Remove a line. Unknown products are ignored.
    pub fn remove_from_cart(&self, product_id: ProductId) {
        let mut state = self.state.write();
        let before = state.items.len();
        state.items.retain(|item| item.product.id != product_id);
        if state.items.len() != before {
            tracing::debug!(%product_id, "Removed from cart");
            self.persist(&state.items);
        }
    }

    /// Empty the cart.
    pub fn clear_cart(&self) {
        let mut state = self.state.write();
        state.items.clear();
        self.persist(&state.items);
    }

    pub fn open_cart(&self) {
        self.state.write().is_open = true;
    }

    pub fn close_cart(&self) {
        self.state.write().is_open = false;
    }

    /// Whether the cart panel is visible.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.state.read().is_open
    }

    /// Snapshot of the line items in insertion order.
    #[must_use]
    pub fn items(&self) -> Vec<CartItem> {
        self.state.read().items.clone()
    }

    /// Quantity of a product, if it is in the cart.
    #[must_use]
    pub fn quantity_of(&self, product_id: ProductId) -> Option<u32> {
        self.state
            .read()
            .items
            .iter()
            .find(|item| item.product.id == product_id)
            .map(|item| item.quantity)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.state.read().items.is_empty()
    }

    /// Total units across all lines.
    #[must_use]
    pub fn item_count(&self) -> u64 {
        self.state
            .read()
            .items
            .iter()
            .map(|item| u64::from(item.quantity))
            .sum()
    }

    /// Sum of price times quantity.
    #[must_use]
    pub fn subtotal(&self) -> Price {
        self.state.read().items.iter().map(CartItem::line_total).sum()
    }

    /// Price breakdown with an optional promo code.
    #[must_use]
    pub fn summary(&self, promo_code: Option<&str>) -> CartSummary {
        CartSummary::compute(self.subtotal(), promo_code)
    }

    fn persist(&self, items: &[CartItem]) {
        let lines: Vec<StoredCartLine> = items.iter().map(StoredCartLine::from).collect();
        storage::persist(self.store.as_ref(), keys::CART, &lines);
    }
}

/// Read the persisted projection and join it against the catalog.
fn restore_items(catalog: &Catalog, store: &dyn KeyValueStore) -> Vec<CartItem> {
    let Some(value) = storage::restore::<serde_json::Value>(store, keys::CART) else {
        return Vec::new();
    };
    let serde_json::Value::Array(entries) = value else {
        tracing::warn!(key = keys::CART, "Persisted cart is not an array, starting empty");
        return Vec::new();
    };

    let mut items: Vec<CartItem> = Vec::with_capacity(entries.len());
    for entry in entries {
        let line: StoredCartLine = match serde_json::from_value(entry) {
            Ok(line) => line,
            Err(e) => {
                tracing::warn!(error = %e, "Skipping malformed cart line");
                continue;
            }
        };

        let Some(quantity) = u32::try_from(line.quantity)
            .ok()
            .filter(|q| (1..=MAX_QUANTITY_PER_ITEM).contains(q))
        else {
            tracing::warn!(product_id = %line.product_id, quantity = line.quantity, "Skipping cart line with invalid quantity");
            continue;
        };
        if items.iter().any(|item| item.product.id == line.product_id) {
            tracing::warn!(product_id = %line.product_id, "Skipping duplicate cart line");
            continue;
        }
        let Some(product) = catalog.find(line.product_id) else {
            tracing::debug!(product_id = %line.product_id, "Dropping cart line for product no longer listed");
            continue;
        };

        items.push(CartItem {
            product: product.clone(),
            quantity,
        });
    }
    items
}
