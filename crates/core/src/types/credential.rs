//! Registration and login credential types.
//!
//! Input rules mirror what the remote service accepts so obviously bad values
//! are rejected before a request is made.

use core::fmt;

/// Errors produced while validating credentials.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("Username is a required field")]
    UsernameMissing,
    #[error("Username must be at least {min} characters")]
    UsernameTooShort { min: usize },
    #[error("Username must be at most {max} characters")]
    UsernameTooLong { max: usize },
    #[error("Password is a required field")]
    PasswordMissing,
    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
    #[error("Password must be at most {max} characters")]
    PasswordTooLong { max: usize },
    #[error("Passwords do not match")]
    PasswordMismatch,
}

/// A display name chosen at registration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Username(String);

impl Username {
    pub const MIN_LENGTH: usize = 6;
    pub const MAX_LENGTH: usize = 32;

    /// Validate a username for registration.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or outside
    /// `MIN_LENGTH..=MAX_LENGTH` characters.
    pub fn parse(s: &str) -> Result<Self, CredentialError> {
        let len = s.chars().count();
        if len == 0 {
            return Err(CredentialError::UsernameMissing);
        }
        if len < Self::MIN_LENGTH {
            return Err(CredentialError::UsernameTooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(CredentialError::UsernameTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        Ok(Self(s.to_owned()))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Username {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A plaintext password on its way to the remote service.
///
/// `Debug` never prints the value.
#[derive(Clone, PartialEq, Eq)]
pub struct Password(String);

impl Password {
    pub const MIN_LENGTH: usize = 8;
    pub const MAX_LENGTH: usize = 32;

    /// Accept any non-empty password (login).
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError::PasswordMissing`] for empty input.
    pub fn for_login(s: &str) -> Result<Self, CredentialError> {
        if s.is_empty() {
            return Err(CredentialError::PasswordMissing);
        }
        Ok(Self(s.to_owned()))
    }

    /// Validate a new password and its confirmation (registration).
    ///
    /// # Errors
    ///
    /// Returns an error if the password is empty, outside
    /// `MIN_LENGTH..=MAX_LENGTH` characters, or differs from `confirm`.
    pub fn for_registration(s: &str, confirm: &str) -> Result<Self, CredentialError> {
        let len = s.chars().count();
        if len == 0 {
            return Err(CredentialError::PasswordMissing);
        }
        if len < Self::MIN_LENGTH {
            return Err(CredentialError::PasswordTooShort {
                min: Self::MIN_LENGTH,
            });
        }
        if len > Self::MAX_LENGTH {
            return Err(CredentialError::PasswordTooLong {
                max: Self::MAX_LENGTH,
            });
        }
        if s != confirm {
            return Err(CredentialError::PasswordMismatch);
        }
        Ok(Self(s.to_owned()))
    }

    /// Expose the plaintext for the request body.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Password([REDACTED])")
    }
}
