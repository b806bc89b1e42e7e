//! Candidate field validation. Fails fast; nothing here touches the store.

use crate::{MAX_NAME_LEN, MIN_PASSWORD_LEN, types::EntityType};
use thiserror::Error as ThisError;

///
/// ValidationError
///

#[derive(Clone, Debug, Eq, PartialEq, ThisError)]
pub enum ValidationError {
    #[error("display name is empty")]
    EmptyName,

    #[error("display name exceeds {MAX_NAME_LEN} characters")]
    NameTooLong,

    #[error("email address is empty")]
    EmptyEmail,

    #[error("malformed email address: '{email}'")]
    MalformedEmail { email: String },

    #[error("password shorter than {MIN_PASSWORD_LEN} characters")]
    PasswordTooShort,

    #[error("{entity_type} accounts cannot self-register")]
    NotSelfRegistrable { entity_type: EntityType },
}

/// Validate a normalized email address. Deliberately shallow: one `@`,
/// non-empty local part, domain with at least one dot.
pub fn validate_email(email: &str) -> Result<(), ValidationError> {
    if email.is_empty() {
        return Err(ValidationError::EmptyEmail);
    }

    let malformed = || ValidationError::MalformedEmail {
        email: email.to_string(),
    };

    let (local, domain) = email.split_once('@').ok_or_else(malformed)?;
    if local.is_empty() || domain.is_empty() || domain.contains('@') {
        return Err(malformed());
    }
    if !domain.contains('.') || domain.starts_with('.') || domain.ends_with('.') {
        return Err(malformed());
    }
    if email.chars().any(char::is_whitespace) {
        return Err(malformed());
    }

    Ok(())
}

/// Validate a trimmed display name.
pub fn validate_name(name: &str) -> Result<(), ValidationError> {
    if name.is_empty() {
        return Err(ValidationError::EmptyName);
    }
    if name.chars().count() > MAX_NAME_LEN {
        return Err(ValidationError::NameTooLong);
    }

    Ok(())
}

/// Validate a raw (pre-hash) password.
pub fn validate_password(password: &str) -> Result<(), ValidationError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ValidationError::PasswordTooShort);
    }

    Ok(())
}

/// Validate the requested account role.
pub const fn validate_registrable(entity_type: EntityType) -> Result<(), ValidationError> {
    if !entity_type.is_self_registrable() {
        return Err(ValidationError::NotSelfRegistrable { entity_type });
    }

    Ok(())
}
