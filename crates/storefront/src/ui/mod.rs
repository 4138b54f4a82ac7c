//! Ephemeral UI state machines.
//!
//! - [`auth_dialog`] - which auth dialog is visible and its current step

pub mod auth_dialog;

pub use auth_dialog::{AuthDialog, DialogKind, LoginStep, RecoveryMethod, RecoveryStep};
