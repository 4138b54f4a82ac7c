//! Registration form validation.

use secrecy::{ExposeSecret, SecretString};

use farmacia_core::{Email, Gender, PhoneNumber, phone::SUBSCRIBER_DIGITS};

use super::AuthError;
use crate::models::session::{SignUpRequest, UserMetadata};
use crate::models::user::DEFAULT_ID_TYPE;

/// Minimum password length.
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Minimum length of the name and surname fields.
const MIN_NAME_LENGTH: usize = 2;

/// A validation failure on one form field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    pub field: &'static str,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

/// The register dialog's fields.
#[derive(Debug, Clone)]
pub struct RegistrationForm {
    pub name: String,
    pub surname: String,
    pub email: String,
    pub password: SecretString,
    pub id_type: String,
    pub document_number: String,
    pub phone_country_code: String,
    pub phone_prefix: String,
    pub phone_number: String,
    pub gender: Gender,
    pub accept_terms: bool,
}

impl Default for RegistrationForm {
    fn default() -> Self {
        let phone = PhoneNumber::default();
        Self {
            name: String::new(),
            surname: String::new(),
            email: String::new(),
            password: SecretString::from(String::new()),
            id_type: DEFAULT_ID_TYPE.to_string(),
            document_number: String::new(),
            phone_country_code: phone.country_code,
            phone_prefix: phone.prefix,
            phone_number: phone.number,
            gender: Gender::default(),
            accept_terms: false,
        }
    }
}

impl RegistrationForm {
    /// Every failing field, in form order.
    #[must_use]
    pub fn field_errors(&self) -> Vec<FieldError> {
        let mut errors = Vec::new();

        if self.name.trim().chars().count() < MIN_NAME_LENGTH {
            errors.push(FieldError::new(
                "name",
                "Name must have at least 2 characters",
            ));
        }
        if self.surname.trim().chars().count() < MIN_NAME_LENGTH {
            errors.push(FieldError::new(
                "surname",
                "Surname must have at least 2 characters",
            ));
        }
        if Email::parse(&self.email).is_err() {
            errors.push(FieldError::new("email", "Invalid email address"));
        }
        if self.password.expose_secret().chars().count() < MIN_PASSWORD_LENGTH {
            errors.push(FieldError::new(
                "password",
                format!("Password must have at least {MIN_PASSWORD_LENGTH} characters"),
            ));
        }
        if self.document_number.trim().is_empty() {
            errors.push(FieldError::new("document_number", "Document number is required"));
        }
        if self.phone_prefix.trim().is_empty() {
            errors.push(FieldError::new("phone_prefix", "Select a prefix"));
        }
        let number = self.phone_number.trim();
        if number.len() < SUBSCRIBER_DIGITS || !number.chars().all(|c| c.is_ascii_digit()) {
            errors.push(FieldError::new("phone_number", "Enter a valid phone number"));
        }
        if !self.accept_terms {
            errors.push(FieldError::new(
                "accept_terms",
                "You must accept the terms and conditions",
            ));
        }

        errors
    }

    /// The form's phone as a structured number.
    #[must_use]
    pub fn phone(&self) -> PhoneNumber {
        PhoneNumber {
            country_code: self.phone_country_code.trim().to_string(),
            prefix: self.phone_prefix.trim().to_string(),
            number: self.phone_number.trim().to_string(),
        }
    }

    /// Validate and turn the form into a sign-up request.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::InvalidForm` listing every failing field.
    pub fn validate(self) -> Result<SignUpRequest, AuthError> {
        let errors = self.field_errors();
        if !errors.is_empty() {
            return Err(AuthError::InvalidForm(errors));
        }

        let email = Email::parse(&self.email)?;
        let metadata = UserMetadata {
            first_name: Some(self.name.trim().to_string()),
            last_name: Some(self.surname.trim().to_string()),
            phone: Some(self.phone().to_string()),
            document_type: Some(self.id_type.trim().to_string()),
            document_number: Some(self.document_number.trim().to_string()),
            gender: Some(self.gender.as_str().to_string()),
            avatar_url: None,
        };

        Ok(SignUpRequest {
            email,
            password: self.password,
            metadata,
        })
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn valid_form() -> RegistrationForm {
        RegistrationForm {
            name: "Byron".to_string(),
            surname: "Miranda".to_string(),
            email: "byron@farmacia.com".to_string(),
            password: SecretString::from("s3gura-clave"),
            document_number: "V-12345678".to_string(),
            phone_number: "5002930".to_string(),
            gender: Gender::Male,
            accept_terms: true,
            ..RegistrationForm::default()
        }
    }

    #[test]
    fn test_valid_form_builds_request() {
        let request = valid_form().validate().unwrap();
        assert_eq!(request.email.as_str(), "byron@farmacia.com");
        assert_eq!(request.metadata.first_name.as_deref(), Some("Byron"));
        assert_eq!(request.metadata.phone.as_deref(), Some("+58 0412 5002930"));
        assert_eq!(request.metadata.gender.as_deref(), Some("male"));
        assert_eq!(request.metadata.document_type.as_deref(), Some(DEFAULT_ID_TYPE));
    }

    #[test]
    fn test_default_form_reports_every_field() {
        let fields: Vec<&str> = RegistrationForm::default()
            .field_errors()
            .iter()
            .map(|e| e.field)
            .collect();
        assert_eq!(
            fields,
            vec![
                "name",
                "surname",
                "email",
                "password",
                "document_number",
                "phone_number",
                "accept_terms"
            ]
        );
    }

    #[test]
    fn test_short_password_rejected() {
        let form = RegistrationForm {
            password: SecretString::from("1234567"),
            ..valid_form()
        };
        let Err(AuthError::InvalidForm(errors)) = form.validate() else {
            panic!("expected form error");
        };
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "password");
    }

    #[test]
    fn test_phone_number_must_be_digits() {
        let form = RegistrationForm {
            phone_number: "500-2930".to_string(),
            ..valid_form()
        };
        assert_eq!(form.field_errors()[0].field, "phone_number");
    }
}
