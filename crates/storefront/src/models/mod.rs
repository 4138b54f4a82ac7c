//! Domain models for the storefront session core.
//!
//! - [`cart`] - line items, the persisted cart projection, price summary
//! - [`user`] - profile, addresses, purchases, favorites
//! - [`session`] - remote identity session, auth events, storage keys

pub mod cart;
pub mod session;
pub mod user;
