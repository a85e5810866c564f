//! Integration tests for vault persistence, tamper detection, and the
//! backup recovery path.

mod common;

use std::fs;

use infravault::error::SecretsError;
use infravault::identity::Identity;
use infravault::vault::Vault;

use common::{github_token, vercel_token, TestContext};

#[test]
fn test_round_trip_across_handles() {
    let ctx = TestContext::new().unwrap();
    let token = github_token();

    let mut vault = ctx.vault();
    vault.set_secret("github", &token).unwrap();
    vault.set_secret("vercel", &vercel_token()).unwrap();

    // A brand new handle re-derives the key from identity + salt file
    let record = ctx.vault().load().unwrap();
    assert_eq!(record.len(), 2);
    assert_eq!(
        record.get("github").and_then(|v| v.as_token()),
        Some(token.as_str())
    );
}

#[test]
fn test_tampered_vault_is_rejected_not_misread() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();
    vault.set_secret("github", &github_token()).unwrap();

    // Flip one hex digit of the stored ciphertext
    let path = vault.vault_path();
    let mut file: serde_json::Value =
        serde_json::from_slice(&fs::read(&path).unwrap()).unwrap();
    let ciphertext = file["ciphertext"].as_str().unwrap().to_string();
    let flipped = if ciphertext.starts_with('0') { "1" } else { "0" };
    file["ciphertext"] = serde_json::json!(format!("{flipped}{}", &ciphertext[1..]));
    fs::write(&path, serde_json::to_vec(&file).unwrap()).unwrap();

    // No backup exists, so the vault is unrecoverable; it must never hand
    // back altered plaintext
    let err = ctx.vault().load().unwrap_err();
    assert!(matches!(err, SecretsError::VaultCorrupted { .. }));
}

#[test]
fn test_backup_promotion_repairs_primary() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();
    vault.set_secret("vercel", &vercel_token()).unwrap();

    // Simulate a crash mid-save: the staged backup survived but the new
    // primary write was cut short
    fs::copy(vault.vault_path(), vault.backup_path()).unwrap();
    fs::write(vault.vault_path(), b"{ truncated").unwrap();

    let record = ctx.vault().load().unwrap();
    assert_eq!(
        record.get("vercel").and_then(|v| v.as_token()),
        Some(vercel_token().as_str())
    );

    // The promotion rewrote the primary, so a later load needs no backup
    fs::remove_file(vault.backup_path()).ok();
    let record = ctx.vault().load().unwrap();
    assert_eq!(record.len(), 1);
}

#[test]
fn test_backup_is_retired_after_successful_save() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();

    vault.set_secret("github", &github_token()).unwrap();
    vault.set_secret("vercel", &vercel_token()).unwrap();
    vault.remove_secret("github").unwrap();

    assert!(vault.vault_path().exists());
    assert!(!vault.backup_path().exists());
}

#[test]
fn test_salt_is_stable_across_saves() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();

    vault.set_secret("github", &github_token()).unwrap();
    let salt_before = fs::read_to_string(vault.salt_path()).unwrap();

    let mut second = ctx.vault();
    second.set_secret("vercel", &vercel_token()).unwrap();
    let salt_after = fs::read_to_string(vault.salt_path()).unwrap();

    assert_eq!(salt_before, salt_after);
}

#[test]
fn test_lost_salt_makes_vault_unreadable() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();
    vault.set_secret("github", &github_token()).unwrap();

    fs::remove_file(vault.salt_path()).unwrap();

    // A new salt is generated, the derived key differs, decryption fails
    let err = ctx.vault().load().unwrap_err();
    assert!(matches!(err, SecretsError::VaultCorrupted { .. }));
}

#[test]
fn test_vaults_are_identity_bound() {
    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();
    vault.set_secret("github", &github_token()).unwrap();

    let other = Identity {
        username: "someone-else".to_string(),
        hostname: "testhost".to_string(),
    };
    let mut intruder = Vault::with_identity(&ctx.vault_dir, other);
    assert!(intruder.load().is_err());
}

#[cfg(unix)]
#[test]
fn test_vault_directory_is_owner_only() {
    use std::os::unix::fs::PermissionsExt;

    let ctx = TestContext::new().unwrap();
    let mut vault = ctx.vault();
    vault.set_secret("github", &github_token()).unwrap();

    let mode = fs::metadata(vault.dir()).unwrap().permissions().mode();
    assert_eq!(mode & 0o077, 0, "vault dir must not be group/other readable");
}
