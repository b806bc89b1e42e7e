//! Input normalization. Runs before validation and before any key is
//! derived, so every store key sees the same canonical form.

/// Canonical email form: trimmed, lowercased.
#[must_use]
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Display name as stored: trimmed, inner whitespace preserved.
#[must_use]
pub fn trim_name(name: &str) -> String {
    name.trim().to_string()
}

/// Display name form used for collision checks: trimmed, lowercased.
#[must_use]
pub fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}
