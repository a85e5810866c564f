//! Encrypted credential vault with atomic backup and recovery.
//!
//! # Security Guarantees
//!
//! - **Encrypted at rest**: secrets are stored as one AES-256-GCM sealed
//!   JSON document; the key is re-derived from the local identity and never
//!   written to disk
//! - **Tamper evident**: any modification of the stored ciphertext or tag
//!   fails authenticated decryption instead of returning altered plaintext
//! - **Crash safe**: every mutating write stages a backup first; an
//!   interrupted write is repaired on the next load
//! - **Owner-only**: the vault, backup, and salt files are written with
//!   mode 0o600
//!
//! Concurrent writes from multiple processes are out of scope: two racing
//! `save` calls against the same vault produce undefined final content.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use aes_gcm::aead::{rand_core::RngCore, Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Nonce};
use serde::{Deserialize, Serialize};

use crate::error::{Result, SecretsError};
use crate::identity::{self, Identity, VaultKey};
use crate::validate;

/// Nonce size for AES-GCM (96 bits).
const NONCE_SIZE: usize = 12;
/// Authentication tag size (128 bits).
const TAG_SIZE: usize = 16;
/// Installation salt length in bytes.
const SALT_SIZE: usize = 16;

pub const VAULT_FILE_NAME: &str = "secrets.vault";
pub const BACKUP_FILE_NAME: &str = "secrets.vault.backup";
pub const SALT_FILE_NAME: &str = "vault.salt";

/// Default per-user vault directory name under `$HOME`.
const DEFAULT_DIR_NAME: &str = ".infravault";

/// A stored credential: either a bare token or a small set of named fields
/// for services that need more than one value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SecretValue {
    Token(String),
    Fields(BTreeMap<String, String>),
}

impl SecretValue {
    /// The bare token, if this value is one.
    pub fn as_token(&self) -> Option<&str> {
        match self {
            SecretValue::Token(t) => Some(t),
            SecretValue::Fields(_) => None,
        }
    }
}

/// The vault's logical payload: service identifier to credential value.
pub type SecretsRecord = BTreeMap<String, SecretValue>;

/// On-disk ciphertext artifact. All fields hex-encoded.
#[derive(Debug, Serialize, Deserialize)]
struct VaultFile {
    nonce: String,
    ciphertext: String,
    tag: String,
}

/// Handle to one encrypted vault directory.
///
/// Owns the file paths, the resolved identity, and the lazily derived key,
/// so isolated instances (for tests or alternate directories) never share
/// state through globals.
pub struct Vault {
    dir: PathBuf,
    identity: Identity,
    key: Option<VaultKey>,
}

impl Vault {
    /// Open the default per-user vault at `~/.infravault`.
    pub fn open_default() -> Result<Self> {
        let home = dirs::home_dir().ok_or_else(|| {
            SecretsError::Configuration("cannot determine home directory".to_string())
        })?;
        Self::open(home.join(DEFAULT_DIR_NAME))
    }

    /// Open a vault at a specific directory, resolving the local identity.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self::with_identity(dir, Identity::resolve()?))
    }

    /// Open a vault with an explicit identity.
    ///
    /// Lets callers (and tests) pin the key derivation input instead of
    /// reading it from the running system.
    pub fn with_identity(dir: impl Into<PathBuf>, identity: Identity) -> Self {
        Self {
            dir: dir.into(),
            identity,
            key: None,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn vault_path(&self) -> PathBuf {
        self.dir.join(VAULT_FILE_NAME)
    }

    pub fn backup_path(&self) -> PathBuf {
        self.dir.join(BACKUP_FILE_NAME)
    }

    pub fn salt_path(&self) -> PathBuf {
        self.dir.join(SALT_FILE_NAME)
    }

    /// Load the full secrets record.
    ///
    /// An absent vault file is a fresh install and yields an empty record.
    /// A vault file that fails authenticated decryption triggers the backup
    /// recovery path: if the backup decrypts, it is promoted back to the
    /// primary file and its record returned.
    ///
    /// # Errors
    ///
    /// [`SecretsError::VaultCorrupted`] when neither the primary nor the
    /// backup decrypts; [`SecretsError::Io`] for underlying file failures.
    pub fn load(&mut self) -> Result<SecretsRecord> {
        let path = self.vault_path();
        if !path.exists() {
            return Ok(SecretsRecord::new());
        }

        let bytes = fs::read(&path)
            .map_err(|e| SecretsError::io(format!("failed to read vault file {path:?}"), e))?;
        let key = self.key()?;

        match decrypt_vault_bytes(&bytes, &key) {
            Ok(record) => Ok(record),
            Err(_) => self.recover_from_backup(&key),
        }
    }

    /// Persist a record, replacing the whole vault contents.
    ///
    /// Two-phase commit: stage a backup of the current primary, write the
    /// new primary, then retire the backup. A crash between the phases
    /// leaves the backup in place for [`Vault::load`] to repair from.
    pub fn save(&mut self, record: &SecretsRecord) -> Result<()> {
        self.ensure_dir()?;
        let key = self.key()?;

        self.stage_backup()?;

        let file = encrypt_record(record, &key)?;
        let json = serde_json::to_vec_pretty(&file)
            .map_err(|e| SecretsError::Encryption(format!("failed to encode vault file: {e}")))?;

        let path = self.vault_path();
        fs::write(&path, json)
            .map_err(|e| SecretsError::io(format!("failed to write vault file {path:?}"), e))?;
        restrict_permissions(&path)?;

        self.retire_backup()
    }

    /// Validate and store a bare token for a service.
    pub fn set_secret(&mut self, service: &str, token: &str) -> Result<()> {
        validate::validate(service, token)?;

        let mut record = self.load()?;
        record.insert(service.to_string(), SecretValue::Token(token.to_string()));
        self.save(&record)
    }

    /// Store a multi-field credential for a service.
    ///
    /// Field values must be non-empty; shapes are not checked because
    /// multi-field layouts are service specific.
    pub fn set_fields(&mut self, service: &str, fields: BTreeMap<String, String>) -> Result<()> {
        if fields.is_empty() {
            return Err(SecretsError::Validation(format!(
                "{service} credential must have at least one field"
            )));
        }
        for (name, value) in &fields {
            if value.is_empty() {
                return Err(SecretsError::Validation(format!(
                    "{service} field '{name}' cannot be empty"
                )));
            }
        }

        let mut record = self.load()?;
        record.insert(service.to_string(), SecretValue::Fields(fields));
        self.save(&record)
    }

    /// Remove a service's credential. Returns whether one was stored.
    pub fn remove_secret(&mut self, service: &str) -> Result<bool> {
        if !self.vault_path().exists() {
            return Ok(false);
        }

        let mut record = self.load()?;
        if record.remove(service).is_none() {
            return Ok(false);
        }

        self.save(&record)?;
        Ok(true)
    }

    /// The cached vault key, deriving it on first use.
    fn key(&mut self) -> Result<VaultKey> {
        match &self.key {
            Some(key) => Ok(key.clone()),
            None => {
                let salt = self.load_or_create_salt()?;
                let key = identity::derive_key(&self.identity, &salt)?;
                self.key = Some(key.clone());
                Ok(key)
            }
        }
    }

    /// Read the installation salt, generating and persisting it on first use.
    fn load_or_create_salt(&self) -> Result<Vec<u8>> {
        let path = self.salt_path();
        if path.exists() {
            let text = fs::read_to_string(&path)
                .map_err(|e| SecretsError::io(format!("failed to read salt file {path:?}"), e))?;
            return hex::decode(text.trim()).map_err(|_| {
                SecretsError::Configuration(format!("salt file {path:?} is not valid hex"))
            });
        }

        self.ensure_dir()?;
        let mut salt = [0u8; SALT_SIZE];
        OsRng.fill_bytes(&mut salt);
        fs::write(&path, hex::encode(salt))
            .map_err(|e| SecretsError::io(format!("failed to write salt file {path:?}"), e))?;
        restrict_permissions(&path)?;
        Ok(salt.to_vec())
    }

    /// Decrypt the backup and, if it is intact, promote it to the primary.
    fn recover_from_backup(&self, key: &VaultKey) -> Result<SecretsRecord> {
        let primary = self.vault_path();
        let backup = self.backup_path();

        if !backup.exists() {
            return Err(SecretsError::VaultCorrupted { path: primary });
        }

        let bytes = fs::read(&backup)
            .map_err(|e| SecretsError::io(format!("failed to read backup file {backup:?}"), e))?;

        match decrypt_vault_bytes(&bytes, key) {
            Ok(record) => {
                fs::write(&primary, &bytes).map_err(|e| {
                    SecretsError::io(format!("failed to restore vault file {primary:?}"), e)
                })?;
                restrict_permissions(&primary)?;
                Ok(record)
            }
            Err(_) => Err(SecretsError::VaultCorrupted { path: primary }),
        }
    }

    /// Phase one of a save: copy the current primary aside.
    fn stage_backup(&self) -> Result<()> {
        let primary = self.vault_path();
        if !primary.exists() {
            return Ok(());
        }

        let backup = self.backup_path();
        fs::copy(&primary, &backup)
            .map_err(|e| SecretsError::io(format!("failed to stage backup {backup:?}"), e))?;
        restrict_permissions(&backup)
    }

    /// Phase three of a save: erase and delete the staged backup.
    ///
    /// The overwrite is best effort; copy-on-write filesystems and
    /// wear-leveled media may keep the old blocks around.
    fn retire_backup(&self) -> Result<()> {
        let backup = self.backup_path();
        if !backup.exists() {
            return Ok(());
        }

        let len = fs::metadata(&backup)
            .map_err(|e| SecretsError::io(format!("failed to stat backup {backup:?}"), e))?
            .len() as usize;
        fs::write(&backup, vec![0u8; len])
            .map_err(|e| SecretsError::io(format!("failed to erase backup {backup:?}"), e))?;
        fs::remove_file(&backup)
            .map_err(|e| SecretsError::io(format!("failed to delete backup {backup:?}"), e))
    }

    fn ensure_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.dir).map_err(|e| {
            SecretsError::io(format!("failed to create vault directory {:?}", self.dir), e)
        })?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = fs::metadata(&self.dir)
                .map_err(|e| {
                    SecretsError::io(format!("failed to stat vault directory {:?}", self.dir), e)
                })?
                .permissions();
            perms.set_mode(0o700);
            fs::set_permissions(&self.dir, perms).map_err(|e| {
                SecretsError::io(
                    format!("failed to restrict vault directory {:?}", self.dir),
                    e,
                )
            })?;
        }

        Ok(())
    }
}

/// Encrypt a record into the on-disk artifact under a fresh random nonce.
fn encrypt_record(record: &SecretsRecord, key: &VaultKey) -> Result<VaultFile> {
    let plaintext = serde_json::to_vec(record)
        .map_err(|e| SecretsError::Encryption(format!("failed to encode secrets record: {e}")))?;

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SecretsError::Encryption(format!("invalid vault key: {e}")))?;

    let mut nonce_bytes = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let mut sealed = cipher
        .encrypt(nonce, plaintext.as_ref())
        .map_err(|e| SecretsError::Encryption(format!("vault encryption failed: {e}")))?;
    let tag = sealed.split_off(sealed.len() - TAG_SIZE);

    Ok(VaultFile {
        nonce: hex::encode(nonce_bytes),
        ciphertext: hex::encode(sealed),
        tag: hex::encode(tag),
    })
}

/// Parse and decrypt one on-disk artifact.
///
/// Any failure here (malformed JSON, bad hex, failed authentication) means
/// this copy of the vault is unusable; the caller decides whether a backup
/// can stand in.
fn decrypt_vault_bytes(bytes: &[u8], key: &VaultKey) -> Result<SecretsRecord> {
    let file: VaultFile = serde_json::from_slice(bytes)
        .map_err(|e| SecretsError::Encryption(format!("malformed vault file: {e}")))?;

    let nonce_bytes = hex::decode(&file.nonce)
        .map_err(|_| SecretsError::Encryption("vault nonce is not valid hex".to_string()))?;
    if nonce_bytes.len() != NONCE_SIZE {
        return Err(SecretsError::Encryption(
            "vault nonce has wrong length".to_string(),
        ));
    }

    let mut sealed = hex::decode(&file.ciphertext)
        .map_err(|_| SecretsError::Encryption("vault ciphertext is not valid hex".to_string()))?;
    let tag = hex::decode(&file.tag)
        .map_err(|_| SecretsError::Encryption("vault tag is not valid hex".to_string()))?;
    if tag.len() != TAG_SIZE {
        return Err(SecretsError::Encryption(
            "vault tag has wrong length".to_string(),
        ));
    }
    sealed.extend_from_slice(&tag);

    let cipher = Aes256Gcm::new_from_slice(key.as_bytes())
        .map_err(|e| SecretsError::Encryption(format!("invalid vault key: {e}")))?;

    let plaintext = cipher
        .decrypt(Nonce::from_slice(&nonce_bytes), sealed.as_ref())
        .map_err(|_| SecretsError::Encryption("vault authentication failed".to_string()))?;

    serde_json::from_slice(&plaintext)
        .map_err(|e| SecretsError::Encryption(format!("malformed secrets record: {e}")))
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;

    let mut perms = fs::metadata(path)
        .map_err(|e| SecretsError::io(format!("failed to stat {path:?}"), e))?
        .permissions();
    perms.set_mode(0o600);
    fs::set_permissions(path, perms)
        .map_err(|e| SecretsError::io(format!("failed to restrict permissions on {path:?}"), e))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> Result<()> {
    Ok(())
}
