//! Client-side stores and the auth bridge.
//!
//! # Services
//!
//! - `cart` - Cart lines, persisted as `(productId, quantity)` pairs
//! - `user` - Login flag, profile, addresses, purchases and favorites
//! - `auth` - Keeps the user store in step with the identity provider
//! - `notifications` - Toast-style messages for the UI

pub mod auth;
pub mod cart;
pub mod notifications;
pub mod user;

pub use auth::{AuthBridge, AuthError, AuthOutcome, RegistrationForm, SessionState};
pub use cart::{CartError, CartStore};
pub use notifications::{Notification, NotificationLevel, Notifier};
pub use user::UserStore;
