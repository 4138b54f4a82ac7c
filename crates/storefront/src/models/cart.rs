//! Cart domain types.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use farmacia_core::{CurrencyCode, Price, ProductId};

use crate::catalog::Product;

/// Maximum quantity allowed per line item.
pub const MAX_QUANTITY_PER_ITEM: u32 = 9999;

/// Promo code accepted by the cart summary (compared case-insensitively).
pub const PROMO_CODE: &str = "discount10";

/// Percentage taken off the subtotal by [`PROMO_CODE`].
pub const PROMO_PERCENT: u32 = 10;

/// Subtotal above which shipping is free.
pub const FREE_SHIPPING_THRESHOLD: Price =
    Price::new(Decimal::from_parts(50, 0, 0, false, 0), CurrencyCode::USD);

/// Flat shipping charged below the threshold.
pub const FLAT_SHIPPING: Price =
    Price::new(Decimal::from_parts(599, 0, 0, false, 2), CurrencyCode::USD);

/// A product and how many of it are in the cart.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CartItem {
    pub product: Product,
    /// Always at least 1.
    pub quantity: u32,
}

impl CartItem {
    /// Unit price times quantity.
    #[must_use]
    pub fn line_total(&self) -> Price {
        self.product.price.times(self.quantity)
    }
}

/// The persisted projection of a line item.
///
/// Only the product reference is stored; product details are rejoined from
/// the catalog on load. Quantity is signed so corrupt entries can be
/// recognised and dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredCartLine {
    pub product_id: ProductId,
    pub quantity: i64,
}

impl From<&CartItem> for StoredCartLine {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product.id,
            quantity: i64::from(item.quantity),
        }
    }
}

/// Price breakdown shown in the cart panel and at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartSummary {
    pub subtotal: Price,
    pub discount: Price,
    pub shipping: Price,
    pub total: Price,
    /// How much more to spend for free shipping, when shipping is charged.
    pub amount_until_free_shipping: Option<Price>,
}

impl CartSummary {
    /// Compute the breakdown for a subtotal and an optional promo code.
    #[must_use]
    pub fn compute(subtotal: Price, promo_code: Option<&str>) -> Self {
        let promo_applied =
            promo_code.is_some_and(|code| code.trim().eq_ignore_ascii_case(PROMO_CODE));
        let discount = if promo_applied {
            subtotal.percent(PROMO_PERCENT)
        } else {
            Price::zero()
        };

        let free = subtotal.is_zero() || subtotal.amount > FREE_SHIPPING_THRESHOLD.amount;
        let (shipping, amount_until_free_shipping) = if free {
            (Price::zero(), None)
        } else {
            (FLAT_SHIPPING, Some(FREE_SHIPPING_THRESHOLD - subtotal))
        };

        Self {
            subtotal,
            discount,
            shipping,
            total: (subtotal - discount + shipping).rounded(),
            amount_until_free_shipping,
        }
    }

    /// Whether the promo discount was applied.
    #[must_use]
    pub fn has_discount(&self) -> bool {
        !self.discount.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_below_threshold() {
        let summary = CartSummary::compute(Price::from_cents(3000), None);
        assert_eq!(summary.shipping, Price::from_cents(599));
        assert_eq!(summary.total, Price::from_cents(3599));
        assert_eq!(summary.amount_until_free_shipping, Some(Price::from_cents(2000)));
        assert!(!summary.has_discount());
    }

    #[test]
    fn test_summary_with_promo_and_free_shipping() {
        let summary = CartSummary::compute(Price::from_cents(6000), Some("  DISCOUNT10 "));
        assert_eq!(summary.discount, Price::from_cents(600));
        assert!(summary.shipping.is_zero());
        assert_eq!(summary.total, Price::from_cents(5400));
        assert_eq!(summary.amount_until_free_shipping, None);
    }

    #[test]
    fn test_summary_exactly_at_threshold_still_charges() {
        let summary = CartSummary::compute(Price::from_cents(5000), None);
        assert_eq!(summary.shipping, FLAT_SHIPPING);
        assert_eq!(summary.amount_until_free_shipping, Some(Price::zero()));
    }

    #[test]
    fn test_summary_empty_cart() {
        let summary = CartSummary::compute(Price::zero(), Some("discount10"));
        assert!(summary.total.is_zero());
        assert!(summary.shipping.is_zero());
    }

    #[test]
    fn test_unknown_promo_ignored() {
        let summary = CartSummary::compute(Price::from_cents(1000), Some("FREE"));
        assert!(summary.discount.is_zero());
    }
}
