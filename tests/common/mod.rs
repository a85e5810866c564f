//! Common testing utilities for InfraVault integration tests.

use std::path::PathBuf;
use tempfile::TempDir;

use infravault::identity::Identity;
use infravault::vault::Vault;

/// Test context that manages a temporary vault directory.
///
/// Every context pins the same fixed identity so vaults written by one
/// handle can be reopened by another, independent of the machine the tests
/// run on.
pub struct TestContext {
    /// Path to the temporary vault directory
    pub vault_dir: PathBuf,
    /// The temporary directory (kept to prevent early deletion)
    _temp_dir: TempDir,
}

impl TestContext {
    /// Create a new test context with a temporary vault directory.
    pub fn new() -> anyhow::Result<Self> {
        let temp_dir = TempDir::new()?;
        let vault_dir = temp_dir.path().to_path_buf();

        Ok(Self {
            vault_dir,
            _temp_dir: temp_dir,
        })
    }

    /// The fixed identity every test vault derives its key from.
    #[allow(dead_code)]
    pub fn identity() -> Identity {
        Identity {
            username: "testuser".to_string(),
            hostname: "testhost".to_string(),
        }
    }

    /// Open a fresh vault handle over the context's directory.
    ///
    /// Each call returns an independent handle, which is how a process
    /// restart looks to the vault.
    #[allow(dead_code)]
    pub fn vault(&self) -> Vault {
        Vault::with_identity(&self.vault_dir, Self::identity())
    }

    /// Get the path to a file in the vault directory.
    #[allow(dead_code)]
    pub fn path(&self, name: &str) -> PathBuf {
        self.vault_dir.join(name)
    }
}

/// A well-formed GitHub personal access token for tests.
#[allow(dead_code)]
pub fn github_token() -> String {
    format!("ghp_{}", "a".repeat(36))
}

/// A well-formed Vercel token for tests.
#[allow(dead_code)]
pub fn vercel_token() -> String {
    "b".repeat(24)
}
