//! GitHub Actions secret store integration.
//!
//! # Security
//!
//! - **Sealed before transit**: every value is sealed to the repository's
//!   published public key locally; plaintext never leaves the machine
//! - **NO secret logging**: only secret names appear in output
//! - **User confirmation**: requires explicit approval before pushing
//!
//! # GitHub API Endpoints Used
//!
//! - `GET  /repos/{owner}/{repo}/actions/secrets/public-key`
//! - `PUT  /repos/{owner}/{repo}/actions/secrets/{name}`

use anyhow::{bail, Context, Result};
use dialoguer::{theme::ColorfulTheme, Confirm};
use serde::Deserialize;
use std::collections::BTreeMap;

use crate::seal;
use crate::vault::{SecretValue, SecretsRecord};

const API_BASE: &str = "https://api.github.com";

/// A repository's sealed-box public key, as published by GitHub.
///
/// `key_id` is opaque platform data that must be echoed back alongside every
/// sealed value; it is not generated on our side.
#[derive(Debug, Deserialize)]
pub struct RepoPublicKey {
    pub key_id: String,
    pub key: String,
}

/// Fetch the public key GitHub publishes for a repository's secret store.
pub async fn fetch_repo_public_key(
    client: &reqwest::Client,
    token: &str,
    owner: &str,
    repo: &str,
) -> Result<RepoPublicKey> {
    let url = format!("{API_BASE}/repos/{owner}/{repo}/actions/secrets/public-key");
    let response = request(token, client.get(&url))
        .await
        .with_context(|| format!("failed to fetch public key for {owner}/{repo}"))?;

    response
        .json::<RepoPublicKey>()
        .await
        .context("failed to parse repository public key response")
}

/// Create or update one repository secret from an already sealed value.
pub async fn put_repo_secret(
    client: &reqwest::Client,
    token: &str,
    owner: &str,
    repo: &str,
    name: &str,
    encrypted_value: &str,
    key_id: &str,
) -> Result<()> {
    let url = format!("{API_BASE}/repos/{owner}/{repo}/actions/secrets/{name}");
    let body = serde_json::json!({
        "encrypted_value": encrypted_value,
        "key_id": key_id,
    });

    request(token, client.put(&url).json(&body))
        .await
        .with_context(|| format!("failed to store secret '{name}'"))?;

    Ok(())
}

/// Push vault secrets into a repository's Actions secret store.
///
/// Shows a value-free summary, asks for confirmation (unless dry-running),
/// then seals and uploads each secret sequentially. Individual failures are
/// collected and reported; any failure fails the command after the loop.
pub async fn push_secrets(
    token: &str,
    owner: &str,
    repo: &str,
    record: &SecretsRecord,
    dry_run: bool,
) -> Result<()> {
    let secrets = flatten_record(record);
    if secrets.is_empty() {
        println!("⚠️  Vault is empty - nothing to push");
        return Ok(());
    }

    println!("\n📋 Secrets to push to {owner}/{repo}:");
    for name in secrets.keys() {
        println!("   - {name}");
    }

    if dry_run {
        println!("\n🏃 Dry run mode - no changes will be made");
        return Ok(());
    }

    let theme = ColorfulTheme::default();
    if !Confirm::with_theme(&theme)
        .with_prompt(format!(
            "\n❓ Push {} secret(s) to {owner}/{repo}?",
            secrets.len()
        ))
        .default(false)
        .interact()?
    {
        println!("❌ Cancelled by user");
        return Ok(());
    }

    let client = reqwest::Client::new();
    let public_key = fetch_repo_public_key(&client, token, owner, repo).await?;

    println!("\n🚀 Pushing secrets...\n");

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for (name, value) in &secrets {
        print!("   → Pushing {name}... ");

        let outcome = async {
            let sealed = seal::seal(value, &public_key.key)?;
            put_repo_secret(
                &client,
                token,
                owner,
                repo,
                name,
                &sealed,
                &public_key.key_id,
            )
            .await
        }
        .await;

        match outcome {
            Ok(()) => {
                println!("✓");
                succeeded.push(name.clone());
            }
            Err(e) => {
                println!("✗");
                eprintln!("      Error: {e}");
                failed.push(name.clone());
            }
        }
    }

    println!("\n📊 Results:");
    println!("   ✓ Succeeded: {}", succeeded.len());
    println!("   ✗ Failed: {}", failed.len());

    if !failed.is_empty() {
        bail!("failed to push {} secret(s)", failed.len());
    }

    println!("\n✅ All secrets pushed successfully!");
    Ok(())
}

/// Flatten a vault record into Actions secret names.
///
/// Bare tokens become `<SERVICE>_TOKEN`, structured fields become
/// `<SERVICE>_<FIELD>`. GitHub reserves the `GITHUB_` prefix for its own
/// variables, so the github token is exported as `GH_TOKEN`.
pub fn flatten_record(record: &SecretsRecord) -> BTreeMap<String, String> {
    let mut flat = BTreeMap::new();

    for (service, value) in record {
        let prefix = if service == "github" {
            "GH".to_string()
        } else {
            sanitize(service)
        };

        match value {
            SecretValue::Token(token) => {
                flat.insert(format!("{prefix}_TOKEN"), token.clone());
            }
            SecretValue::Fields(fields) => {
                for (field, v) in fields {
                    flat.insert(format!("{prefix}_{}", sanitize(field)), v.clone());
                }
            }
        }
    }

    flat
}

/// Uppercase and replace anything Actions would reject with underscores.
fn sanitize(name: &str) -> String {
    name.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

/// Send an authenticated request and map common failure statuses.
async fn request(token: &str, builder: reqwest::RequestBuilder) -> Result<reqwest::Response> {
    let response = builder
        .header("Accept", "application/vnd.github+json")
        .header("User-Agent", "infravault")
        .bearer_auth(token)
        .send()
        .await
        .context("failed to reach GitHub API")?;

    let status = response.status();
    if status == reqwest::StatusCode::UNAUTHORIZED {
        bail!("invalid GitHub token - run 'infravault auth add github' to update it");
    }
    if status == reqwest::StatusCode::NOT_FOUND {
        bail!("repository not found (or the token lacks access to it)");
    }
    if !status.is_success() {
        bail!("GitHub API returned {status}");
    }

    Ok(response)
}
