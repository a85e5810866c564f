//! One-shot sealing of secrets to a remote recipient's public key.
//!
//! Used to deposit credentials into a platform's own secret store (for
//! example GitHub Actions repository secrets) without the plaintext ever
//! appearing on the wire. The sender holds no long-lived key: a fresh
//! ephemeral X25519 key pair is generated per call, combined with the
//! recipient's published key via Diffie-Hellman, and the SHA-256 hash of the
//! shared secret keys a single AES-256-GCM encryption.
//!
//! Wire format: `base64(ephemeral public key || ciphertext || tag)`. The
//! nonce is derived from the two public keys rather than transmitted, which
//! is safe because the symmetric key is never reused. Only the holder of the
//! recipient's private key can reconstruct the shared secret and recover the
//! plaintext; a tampered blob fails authentication instead of misdecrypting.
//!
//! Both operations are pure: no I/O, no network, no shared state.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};

use crate::error::{Result, SecretsError};

/// X25519 public key length.
pub const PUBLIC_KEY_SIZE: usize = 32;
/// AES-GCM authentication tag length.
pub const TAG_SIZE: usize = 16;
/// AES-GCM nonce length.
const NONCE_SIZE: usize = 12;

/// Seal a plaintext secret to a recipient's base64-encoded X25519 public key.
///
/// Returns the base64 blob expected by the platform's secret-upload API:
/// the ephemeral public key followed by the authenticated ciphertext. The
/// decoded blob is exactly `32 + plaintext.len() + 16` bytes.
///
/// # Errors
///
/// [`SecretsError::Validation`] for empty plaintext,
/// [`SecretsError::Encryption`] for a malformed recipient key.
pub fn seal(plaintext: &str, recipient_public_key: &str) -> Result<String> {
    if plaintext.is_empty() {
        return Err(SecretsError::Validation(
            "cannot seal an empty secret".to_string(),
        ));
    }

    let recipient = parse_public_key(recipient_public_key)?;

    let ephemeral_secret = EphemeralSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral_secret);

    let shared = ephemeral_secret.diffie_hellman(&recipient);
    if !shared.was_contributory() {
        return Err(SecretsError::Encryption(
            "recipient public key is a low-order point".to_string(),
        ));
    }

    let key = Sha256::digest(shared.as_bytes());
    let nonce = derive_nonce(&ephemeral_public, &recipient);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretsError::Encryption(format!("invalid sealing key: {e}")))?;
    let sealed = cipher
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| SecretsError::Encryption(format!("sealing failed: {e}")))?;

    let mut blob = Vec::with_capacity(PUBLIC_KEY_SIZE + sealed.len());
    blob.extend_from_slice(ephemeral_public.as_bytes());
    blob.extend_from_slice(&sealed);

    Ok(BASE64.encode(blob))
}

/// Recover a sealed secret with the recipient's private key.
///
/// The counterpart of [`seal`], used by the receiving side and by round-trip
/// tests. A blob sealed to a different key fails authentication.
pub fn unseal(sealed: &str, recipient_secret: &StaticSecret) -> Result<String> {
    let blob = BASE64
        .decode(sealed)
        .map_err(|_| SecretsError::Encryption("sealed blob is not valid base64".to_string()))?;

    if blob.len() < PUBLIC_KEY_SIZE + TAG_SIZE {
        return Err(SecretsError::Encryption(
            "sealed blob is too short".to_string(),
        ));
    }

    let (ephemeral_bytes, ciphertext) = blob.split_at(PUBLIC_KEY_SIZE);
    let mut ephemeral_key = [0u8; PUBLIC_KEY_SIZE];
    ephemeral_key.copy_from_slice(ephemeral_bytes);
    let ephemeral_public = PublicKey::from(ephemeral_key);
    let recipient_public = PublicKey::from(recipient_secret);

    let shared = recipient_secret.diffie_hellman(&ephemeral_public);
    let key = Sha256::digest(shared.as_bytes());
    let nonce = derive_nonce(&ephemeral_public, &recipient_public);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| SecretsError::Encryption(format!("invalid sealing key: {e}")))?;
    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce), ciphertext)
        .map_err(|_| SecretsError::Encryption("sealed blob failed authentication".to_string()))?;

    String::from_utf8(plaintext)
        .map_err(|_| SecretsError::Encryption("unsealed plaintext is not UTF-8".to_string()))
}

/// Decode and bounds-check a base64 X25519 public key.
fn parse_public_key(encoded: &str) -> Result<PublicKey> {
    let bytes = BASE64.decode(encoded).map_err(|_| {
        SecretsError::Encryption("recipient public key is not valid base64".to_string())
    })?;

    let key: [u8; PUBLIC_KEY_SIZE] = bytes.try_into().map_err(|_| {
        SecretsError::Encryption(format!(
            "recipient public key must be {PUBLIC_KEY_SIZE} bytes"
        ))
    })?;

    Ok(PublicKey::from(key))
}

/// Nonce bound to this (ephemeral, recipient) key pair.
fn derive_nonce(ephemeral: &PublicKey, recipient: &PublicKey) -> [u8; NONCE_SIZE] {
    let mut hasher = Sha256::new();
    hasher.update(ephemeral.as_bytes());
    hasher.update(recipient.as_bytes());
    let digest = hasher.finalize();

    let mut nonce = [0u8; NONCE_SIZE];
    nonce.copy_from_slice(&digest[..NONCE_SIZE]);
    nonce
}
