//! Authentication error types.

use thiserror::Error;

use farmacia_core::EmailError;

use super::forms::FieldError;
use crate::backend::BackendError;
use crate::models::session::IdentifierError;

/// Errors that can occur during authentication actions.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Invalid email format.
    #[error("invalid email: {0}")]
    InvalidEmail(#[from] EmailError),

    /// Identifier is neither an email nor a phone number.
    #[error("invalid identifier: {0}")]
    InvalidIdentifier(#[from] IdentifierError),

    /// Registration form has invalid fields.
    #[error("registration form has {} invalid field(s)", .0.len())]
    InvalidForm(Vec<FieldError>),

    /// Backend request failed.
    #[error("backend error: {0}")]
    Backend(#[from] BackendError),
}

impl AuthError {
    /// Message safe to show the customer.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidEmail(_) => "Invalid email address".to_string(),
            Self::InvalidIdentifier(_) => "Enter a valid email or phone number".to_string(),
            Self::InvalidForm(errors) => errors
                .first()
                .map_or_else(|| "Check the form".to_string(), |e| e.message.clone()),
            Self::Backend(err) => match err {
                BackendError::InvalidCredentials => "Invalid credentials".to_string(),
                BackendError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                BackendError::NotAuthenticated => "Session expired, please sign in again".to_string(),
                BackendError::Http(_) => "Could not reach the server, try again".to_string(),
                _ => "Something went wrong, try again".to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_message_hides_internals() {
        let err = AuthError::Backend(BackendError::Api {
            status: 500,
            message: "relation \"profiles\" does not exist".to_string(),
        });
        assert_eq!(err.user_message(), "Something went wrong, try again");

        let err = AuthError::Backend(BackendError::InvalidCredentials);
        assert_eq!(err.user_message(), "Invalid credentials");
    }

    #[test]
    fn test_form_error_uses_first_field() {
        let err = AuthError::InvalidForm(vec![
            FieldError::new("name", "Name must have at least 2 characters"),
            FieldError::new("email", "Invalid email address"),
        ]);
        assert_eq!(err.to_string(), "registration form has 2 invalid field(s)");
        assert_eq!(err.user_message(), "Name must have at least 2 characters");
    }
}
