//! Token-format validation.
//!
//! Every registered service has a fixed token structure: an optional set of
//! accepted prefixes followed by an alphanumeric body of a known length.
//! Unregistered services are deliberately accepted unchecked, so new service
//! identifiers are never blocked by this layer; stricter allow-listing, if
//! wanted, belongs to the caller.

use crate::error::{Result, SecretsError};
use crate::services;

/// A fixed-structure token shape: accepted prefixes plus body length.
///
/// The body is always ASCII alphanumeric. An empty prefix set means the
/// whole token is the body.
pub struct TokenShape {
    prefixes: &'static [&'static str],
    body_len: usize,
}

impl TokenShape {
    /// A shape whose token is one of `prefixes` followed by `body_len`
    /// alphanumeric characters.
    pub const fn prefixed(prefixes: &'static [&'static str], body_len: usize) -> Self {
        Self { prefixes, body_len }
    }

    /// A shape with no prefix: exactly `body_len` alphanumeric characters.
    pub const fn bare(body_len: usize) -> Self {
        Self {
            prefixes: &[],
            body_len,
        }
    }

    /// Check a token against this shape.
    pub fn matches(&self, token: &str) -> bool {
        let body = if self.prefixes.is_empty() {
            Some(token)
        } else {
            self.prefixes
                .iter()
                .find_map(|p| token.strip_prefix(p))
        };

        match body {
            Some(body) => {
                body.len() == self.body_len
                    && body.bytes().all(|b| b.is_ascii_alphanumeric())
            }
            None => false,
        }
    }

    /// Human-readable description of the expected shape, used in
    /// validation error messages.
    pub fn describe(&self) -> String {
        if self.prefixes.is_empty() {
            format!("{} alphanumeric characters", self.body_len)
        } else if self.prefixes.len() == 1 {
            format!(
                "'{}' followed by {} alphanumeric characters",
                self.prefixes[0], self.body_len
            )
        } else {
            format!(
                "one of [{}] followed by {} alphanumeric characters",
                self.prefixes.join(", "),
                self.body_len
            )
        }
    }
}

/// Validate a token for a service.
///
/// # Errors
///
/// Returns [`SecretsError::Validation`] when the token is empty, or when the
/// service has a registered shape the token does not match. Services without
/// a registered shape accept any non-empty token.
pub fn validate(service: &str, token: &str) -> Result<()> {
    if token.is_empty() {
        return Err(SecretsError::Validation(format!(
            "{service} token cannot be empty"
        )));
    }

    if let Some(shape) = services::find(service).and_then(|s| s.shape.as_ref()) {
        if !shape.matches(token) {
            return Err(SecretsError::Validation(format!(
                "invalid {service} token format: expected {}",
                shape.describe()
            )));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_github_token_accepted() {
        let token = format!("ghp_{}", "a".repeat(36));
        assert!(validate("github", &token).is_ok());
    }

    #[test]
    fn test_github_token_too_short() {
        let err = validate("github", "ghp_short").unwrap_err();
        assert!(matches!(err, SecretsError::Validation(_)));
        assert!(err.to_string().contains("ghp_"));
        assert!(err.to_string().contains("36"));
    }

    #[test]
    fn test_github_token_wrong_prefix() {
        let token = format!("gho_{}", "a".repeat(36));
        assert!(validate("github", &token).is_err());
    }

    #[test]
    fn test_github_token_non_alphanumeric_body() {
        let token = format!("ghp_{}!", "a".repeat(35));
        assert!(validate("github", &token).is_err());
    }

    #[test]
    fn test_stripe_accepts_all_prefixes() {
        for prefix in ["sk_test_", "sk_live_", "pk_test_", "pk_live_"] {
            let token = format!("{prefix}{}", "b".repeat(24));
            assert!(validate("stripe", &token).is_ok(), "rejected {prefix}");
        }
    }

    #[test]
    fn test_stripe_rejects_unknown_mode() {
        let token = format!("sk_dev_{}", "b".repeat(24));
        assert!(validate("stripe", &token).is_err());
    }

    #[test]
    fn test_vercel_bare_length() {
        assert!(validate("vercel", &"c".repeat(24)).is_ok());
        assert!(validate("vercel", &"c".repeat(23)).is_err());
        assert!(validate("vercel", &"c".repeat(25)).is_err());
    }

    #[test]
    fn test_unregistered_service_accepts_any_non_empty() {
        assert!(validate("railway", "anything-goes-here").is_ok());
    }

    #[test]
    fn test_empty_token_always_rejected() {
        assert!(validate("railway", "").is_err());
        assert!(validate("github", "").is_err());
    }

    #[test]
    fn test_describe_names_the_shape() {
        let shape = TokenShape::prefixed(&["ghp_"], 36);
        assert_eq!(
            shape.describe(),
            "'ghp_' followed by 36 alphanumeric characters"
        );

        let bare = TokenShape::bare(40);
        assert_eq!(bare.describe(), "40 alphanumeric characters");
    }
}
