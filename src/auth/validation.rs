//! Input checks shared by registration, login and profile updates.

use std::sync::OnceLock;

use regex::Regex;

use crate::auth::{AuthError, AuthResult};

static EMAIL_REGEX: OnceLock<Regex> = OnceLock::new();

fn email_regex() -> &'static Regex {
    EMAIL_REGEX.get_or_init(|| {
        Regex::new(
            r"^[A-Za-z0-9.!#$%&'*+/=?^_`{|}~-]+@[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?(?:\.[A-Za-z0-9](?:[A-Za-z0-9-]{0,61}[A-Za-z0-9])?)+$",
        )
        .expect("Invalid email regex")
    })
}

pub fn is_valid_email(email: &str) -> bool {
    let email = email.trim();
    email.len() <= 254 && email_regex().is_match(email)
}

/// Trim and lower-case an email or username for storage and lookup.
pub fn normalize(value: &str) -> String {
    value.trim().to_lowercase()
}

pub fn all_present(fields: &[&str]) -> bool {
    fields.iter().all(|field| !field.trim().is_empty())
}

pub fn require_email(email: &str) -> AuthResult<String> {
    if !is_valid_email(email) {
        return Err(AuthError::bad_request("Email must be a valid address"));
    }
    Ok(normalize(email))
}

pub fn require_password_length(password: &str, min_length: usize) -> AuthResult<()> {
    if password.chars().count() <= min_length {
        return Err(AuthError::BadRequest(format!(
            "Password length must be greater than {min_length} characters"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_common_addresses() {
        assert!(is_valid_email("ada@x.com"));
        assert!(is_valid_email("first.last+tag@mail.example.org"));
        assert!(is_valid_email("  padded@example.com "));
    }

    #[test]
    fn rejects_malformed_addresses() {
        for email in ["", "ada", "ada@", "@x.com", "ada@x", "ada x@y.com", "ada@-x.com"] {
            assert!(!is_valid_email(email), "{email} should be rejected");
        }
    }

    #[test]
    fn password_must_exceed_minimum() {
        assert!(require_password_length("0123456789", 10).is_err());
        assert!(require_password_length("0123456789a", 10).is_ok());
        // counted in characters, not bytes
        assert!(require_password_length("ééééé", 5).is_err());
    }

    #[test]
    fn blank_fields_are_missing() {
        assert!(all_present(&["Ada", "ada"]));
        assert!(!all_present(&["Ada", "   "]));
        assert!(!all_present(&["", "ada"]));
    }

    #[test]
    fn normalizes_case_and_whitespace() {
        assert_eq!(normalize("  Ada@X.com "), "ada@x.com");
    }
}
