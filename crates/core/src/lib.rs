//! Farmacia Core - Shared types library.
//!
//! This crate provides common types used across the Farmacia components:
//! - `storefront` - Client-side session core (cart, profile, auth bridge)
//! - `integration-tests` - Cross-store scenarios
//!
//! # Architecture
//!
//! The core crate contains only types and parsing rules - no I/O, no storage,
//! no HTTP clients. This keeps it lightweight and allows it to be used anywhere.
//!
//! # Modules
//!
//! - [`types`] - Newtype wrappers for type-safe IDs, prices, emails, phones, and statuses

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod types;

pub use types::*;
