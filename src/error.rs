//! Error taxonomy for the credential vault.
//!
//! Validation and encryption failures are returned to the immediate caller
//! and never retried. Corruption of both the vault and its backup is a
//! terminal condition that requires manual intervention; the vault is never
//! deleted automatically.

use std::path::PathBuf;
use thiserror::Error;

/// All failure modes of the vault, validator, and sealing layers.
#[derive(Debug, Error)]
pub enum SecretsError {
    /// A credential or plaintext did not have the required shape.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Both the vault file and its backup failed authenticated decryption.
    ///
    /// The stored data is unreadable with the current identity-derived key.
    /// Nothing is deleted; the user must inspect or remove the vault by hand.
    #[error(
        "vault at {path:?} is corrupted and no valid backup exists; \
         manual inspection or removal of the file is required"
    )]
    VaultCorrupted { path: PathBuf },

    /// A sealing operation received a malformed recipient public key, or
    /// an unseal failed authentication.
    #[error("encryption failed: {0}")]
    Encryption(String),

    /// The environment is unusable: unresolvable identity, missing home
    /// directory, or a damaged salt file.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// File I/O failure with the underlying cause attached.
    #[error("{context}")]
    Io {
        context: String,
        #[source]
        source: std::io::Error,
    },
}

impl SecretsError {
    /// Wrap an I/O error with a human-readable context line.
    pub fn io(context: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            context: context.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, SecretsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_io_error_keeps_source() {
        let inner = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err = SecretsError::io("failed to write vault file", inner);

        assert_eq!(err.to_string(), "failed to write vault file");
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_corrupted_message_is_actionable() {
        let err = SecretsError::VaultCorrupted {
            path: PathBuf::from("/home/u/.infravault/secrets.vault"),
        };

        let msg = err.to_string();
        assert!(msg.contains("secrets.vault"));
        assert!(msg.contains("manual"));
    }
}
