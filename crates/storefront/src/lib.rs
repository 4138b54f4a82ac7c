//! Farmacia storefront session core.
//!
//! Holds the shopper's cart, profile and auth session on the client side and
//! keeps them in step with the hosted identity backend.

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod backend;
pub mod catalog;
pub mod config;
pub mod error;
pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod ui;
