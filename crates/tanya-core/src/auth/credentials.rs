//! Sign-in and registration forms.
//!
//! Validation is synchronous and local; an invalid form never reaches the
//! identity provider. Errors are surfaced inline next to the triggering form.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum accepted password length, matching the identity service's policy.
const MIN_PASSWORD_LEN: usize = 6;

/// A rejected form field.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationError {
    #[error("Email wajib diisi")]
    EmptyEmail,
    #[error("Format email tidak valid")]
    InvalidEmail,
    #[error("Password wajib diisi")]
    EmptyPassword,
    #[error("Password minimal {MIN_PASSWORD_LEN} karakter")]
    PasswordTooShort,
    #[error("Password dan konfirmasi tidak sama")]
    PasswordMismatch,
}

/// Credentials entered on the login form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignInForm {
    pub email: String,
    pub password: String,
}

impl SignInForm {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        Ok(())
    }
}

/// Fields entered on the registration form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationForm {
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    /// Optional display name applied right after the account is created.
    pub display_name: Option<String>,
}

impl RegistrationForm {
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(ValidationError::EmptyPassword);
        }
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ValidationError::PasswordTooShort);
        }
        if self.password != self.confirm_password {
            return Err(ValidationError::PasswordMismatch);
        }
        Ok(())
    }
}

fn validate_email(email: &str) -> Result<(), ValidationError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }
    // Deliberately loose: the provider is the authority, this only catches
    // obvious typos before a round trip.
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or_default();
    let domain = parts.next().unwrap_or_default();
    if local.is_empty() || domain.is_empty() || !domain.contains('.') {
        return Err(ValidationError::InvalidEmail);
    }
    Ok(())
}
