//! Auth dialog state machine.
//!
//! Tracks which dialog (login, register, recovery) is visible and the step
//! inside it. Nothing here is persisted; closing the dialog resets it.

use serde::{Deserialize, Serialize};

use crate::models::session::{IdentifierError, LoginIdentifier};

/// Which auth dialog is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DialogKind {
    #[default]
    Login,
    Register,
    Recovery,
}

/// Step inside the login dialog.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum LoginStep {
    /// Asking for email or phone.
    #[default]
    Identifier,
    /// Asking for the password of an entered identifier.
    Password { identifier: LoginIdentifier },
}

/// Channel for the password recovery code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryMethod {
    Sms,
    Email,
    Whatsapp,
}

impl RecoveryMethod {
    /// Whether the contact to enter is a phone number.
    #[must_use]
    pub const fn uses_phone(&self) -> bool {
        matches!(self, Self::Sms | Self::Whatsapp)
    }
}

impl std::str::FromStr for RecoveryMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "sms" => Ok(Self::Sms),
            "email" => Ok(Self::Email),
            "whatsapp" => Ok(Self::Whatsapp),
            _ => Err(format!("invalid recovery method: {s}")),
        }
    }
}

/// Step inside the recovery dialog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecoveryStep {
    #[default]
    MethodSelection,
    ContactEntry { method: RecoveryMethod },
}

/// Visibility and step state of the auth dialogs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthDialog {
    open: bool,
    kind: DialogKind,
    login_step: LoginStep,
    recovery_step: RecoveryStep,
}

impl AuthDialog {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Show the dialog of `kind` at its first step.
    pub fn open(&mut self, kind: DialogKind) {
        self.open = true;
        self.switch_to(kind);
    }

    /// Hide the dialog and forget all progress.
    pub fn close(&mut self) {
        *self = Self::default();
    }

    /// Move to another dialog at its first step.
    pub fn switch_to(&mut self, kind: DialogKind) {
        self.kind = kind;
        self.login_step = LoginStep::Identifier;
        self.recovery_step = RecoveryStep::MethodSelection;
    }

    /// Accept the login identifier and advance to the password step.
    ///
    /// # Errors
    ///
    /// Returns `IdentifierError` if the input is neither a valid email nor a
    /// valid phone number; the step is unchanged.
    pub fn submit_identifier(&mut self, input: &str) -> Result<(), IdentifierError> {
        let identifier = LoginIdentifier::parse(input)?;
        self.kind = DialogKind::Login;
        self.login_step = LoginStep::Password { identifier };
        Ok(())
    }

    /// Go one step back: password to identifier, contact entry to method
    /// selection, and from the first step of register or recovery to login.
    pub fn back(&mut self) {
        match (self.kind, &self.login_step, self.recovery_step) {
            (DialogKind::Login, LoginStep::Password { .. }, _) => {
                self.login_step = LoginStep::Identifier;
            }
            (DialogKind::Recovery, _, RecoveryStep::ContactEntry { .. }) => {
                self.recovery_step = RecoveryStep::MethodSelection;
            }
            (DialogKind::Recovery | DialogKind::Register, _, _) => {
                self.switch_to(DialogKind::Login);
            }
            (DialogKind::Login, LoginStep::Identifier, _) => {}
        }
    }

    /// Choose how to receive the recovery code.
    pub fn select_recovery_method(&mut self, method: RecoveryMethod) {
        self.kind = DialogKind::Recovery;
        self.recovery_step = RecoveryStep::ContactEntry { method };
    }

    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.open
    }

    #[must_use]
    pub const fn kind(&self) -> DialogKind {
        self.kind
    }

    #[must_use]
    pub const fn login_step(&self) -> &LoginStep {
        &self.login_step
    }

    #[must_use]
    pub const fn recovery_step(&self) -> RecoveryStep {
        self.recovery_step
    }

    /// The identifier entered in the first login step, if any.
    #[must_use]
    pub const fn identifier(&self) -> Option<&LoginIdentifier> {
        match &self.login_step {
            LoginStep::Password { identifier } => Some(identifier),
            LoginStep::Identifier => None,
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_login_flow_and_back() {
        let mut dialog = AuthDialog::new();
        dialog.open(DialogKind::Login);
        assert!(dialog.is_open());

        assert!(dialog.submit_identifier("not an email").is_err());
        assert_eq!(dialog.login_step(), &LoginStep::Identifier);

        dialog.submit_identifier("cliente@farmacia.com").unwrap();
        assert!(matches!(
            dialog.identifier(),
            Some(LoginIdentifier::Email(email)) if email.as_str() == "cliente@farmacia.com"
        ));

        dialog.back();
        assert_eq!(dialog.login_step(), &LoginStep::Identifier);
        dialog.back();
        assert_eq!(dialog.kind(), DialogKind::Login);
    }

    #[test]
    fn test_phone_identifier_accepted() {
        let mut dialog = AuthDialog::new();
        dialog.open(DialogKind::Login);
        dialog.submit_identifier("0412 500 2930").unwrap();
        assert!(matches!(dialog.identifier(), Some(LoginIdentifier::Phone(_))));
    }

    #[test]
    fn test_recovery_steps() {
        let mut dialog = AuthDialog::new();
        dialog.open(DialogKind::Recovery);
        assert_eq!(dialog.recovery_step(), RecoveryStep::MethodSelection);

        dialog.select_recovery_method("WhatsApp".parse().unwrap());
        assert_eq!(
            dialog.recovery_step(),
            RecoveryStep::ContactEntry {
                method: RecoveryMethod::Whatsapp
            }
        );
        assert!(RecoveryMethod::Whatsapp.uses_phone());

        dialog.back();
        assert_eq!(dialog.recovery_step(), RecoveryStep::MethodSelection);
        dialog.back();
        assert_eq!(dialog.kind(), DialogKind::Login);
    }

    #[test]
    fn test_switch_and_close_reset_steps() {
        let mut dialog = AuthDialog::new();
        dialog.open(DialogKind::Login);
        dialog.submit_identifier("a@b.com").unwrap();

        dialog.switch_to(DialogKind::Register);
        assert_eq!(dialog.kind(), DialogKind::Register);
        assert!(dialog.identifier().is_none());
        assert!(dialog.is_open());

        dialog.select_recovery_method(RecoveryMethod::Email);
        dialog.close();
        assert_eq!(dialog, AuthDialog::default());
        assert!(!dialog.is_open());
    }
}
