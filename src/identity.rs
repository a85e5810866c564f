//! Local identity resolution and vault key derivation.
//!
//! The vault key is never stored. It is re-derived on demand from the stable
//! (username, hostname) pair plus a per-installation random salt, so the same
//! machine account always reaches the same key across process restarts.

use scrypt::Params;
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, SecretsError};

/// scrypt cost parameters: N = 2^15, r = 8, p = 1.
///
/// Memory-hard enough to make offline guessing of the low-entropy
/// identity input expensive, while keeping vault unlock well under a second.
const SCRYPT_LOG_N: u8 = 15;
const SCRYPT_R: u32 = 8;
const SCRYPT_P: u32 = 1;

/// The process-wide local identity: who and where we are.
///
/// Read once, never persisted. Fully determines the derived vault key
/// together with the installation salt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub username: String,
    pub hostname: String,
}

impl Identity {
    /// Resolve the identity from the running system.
    ///
    /// # Errors
    ///
    /// Returns [`SecretsError::Configuration`] if the username or hostname
    /// cannot be determined.
    pub fn resolve() -> Result<Self> {
        let username = std::env::var("USER")
            .or_else(|_| std::env::var("USERNAME"))
            .ok()
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                SecretsError::Configuration(
                    "no username found in $USER or $USERNAME".to_string(),
                )
            })?;

        let hostname = sysinfo::System::host_name()
            .filter(|h| !h.is_empty())
            .ok_or_else(|| {
                SecretsError::Configuration("system hostname is not resolvable".to_string())
            })?;

        Ok(Self { username, hostname })
    }

    /// The KDF input: username and hostname concatenated.
    fn kdf_input(&self) -> Vec<u8> {
        let mut input = Vec::with_capacity(self.username.len() + self.hostname.len());
        input.extend_from_slice(self.username.as_bytes());
        input.extend_from_slice(self.hostname.as_bytes());
        input
    }
}

/// A 256-bit vault key that zeroizes its material on drop.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct VaultKey {
    key: [u8; 32],
}

impl VaultKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.key
    }
}

impl std::fmt::Debug for VaultKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never log key material
        f.debug_struct("VaultKey").field("key", &"[REDACTED]").finish()
    }
}

/// Derive the symmetric vault key from an identity and an installation salt.
///
/// Deterministic: the same identity and salt always yield the same key.
pub fn derive_key(identity: &Identity, salt: &[u8]) -> Result<VaultKey> {
    let params = Params::new(SCRYPT_LOG_N, SCRYPT_R, SCRYPT_P, 32)
        .map_err(|e| SecretsError::Configuration(format!("invalid scrypt parameters: {e}")))?;

    let mut input = identity.kdf_input();
    let mut key = [0u8; 32];
    let outcome = scrypt::scrypt(&input, salt, &params, &mut key);
    input.zeroize();

    outcome.map_err(|e| SecretsError::Configuration(format!("key derivation failed: {e}")))?;

    Ok(VaultKey { key })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_identity() -> Identity {
        Identity {
            username: "alice".to_string(),
            hostname: "workstation".to_string(),
        }
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let salt = [7u8; 16];
        let key1 = derive_key(&test_identity(), &salt).unwrap();
        let key2 = derive_key(&test_identity(), &salt).unwrap();

        assert_eq!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_salt_changes_key() {
        let key1 = derive_key(&test_identity(), &[1u8; 16]).unwrap();
        let key2 = derive_key(&test_identity(), &[2u8; 16]).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_different_identity_changes_key() {
        let salt = [7u8; 16];
        let other = Identity {
            username: "bob".to_string(),
            hostname: "workstation".to_string(),
        };

        let key1 = derive_key(&test_identity(), &salt).unwrap();
        let key2 = derive_key(&other, &salt).unwrap();

        assert_ne!(key1.as_bytes(), key2.as_bytes());
    }

    #[test]
    fn test_debug_redacts_key_material() {
        let key = derive_key(&test_identity(), &[0u8; 16]).unwrap();
        let printed = format!("{key:?}");

        assert!(printed.contains("REDACTED"));
        assert!(!printed.contains("key: ["));
    }
}
