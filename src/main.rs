// InfraVault - encrypted credential storage for infrastructure provisioning
//
// This is the main entry point for the application.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::{theme::ColorfulTheme, Confirm, MultiSelect, Password};
use std::path::PathBuf;

use infravault::cloud::{github, probe};
use infravault::error::SecretsError;
use infravault::identity::Identity;
use infravault::services;
use infravault::validate;
use infravault::vault::Vault;

/// InfraVault - encrypted credential storage for infrastructure provisioning
#[derive(Parser, Debug)]
#[command(name = "infravault")]
#[command(author = "Yanis <yanis@example.com>")]
#[command(version)]
#[command(about = "Encrypted credential vault for infrastructure services", long_about = None)]
struct Cli {
    /// Vault directory (default: ~/.infravault)
    #[arg(long, global = true, env = "INFRAVAULT_DIR")]
    vault_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check identity resolution and vault health
    Doctor,

    /// Manage service credentials
    Auth {
        #[command(subcommand)]
        command: AuthCommands,
    },

    /// Push vault secrets into a GitHub repository's Actions secret store
    PushSecrets {
        /// Repository owner (user or organization)
        #[arg(short, long)]
        owner: String,

        /// Repository name
        #[arg(short, long)]
        repo: String,

        /// Dry run - show what would be pushed without actually pushing
        #[arg(long, default_value = "false")]
        dry_run: bool,
    },
}

#[derive(Subcommand, Debug)]
enum AuthCommands {
    /// Interactive setup wizard for multiple services
    Setup,

    /// Add or update a credential for one service
    Add {
        /// Service identifier (e.g. github, vercel, stripe)
        service: String,

        /// Token value (prompted securely when omitted)
        #[arg(long)]
        token: Option<String>,

        /// Skip the remote "still authenticates" check
        #[arg(long, default_value = "false")]
        offline: bool,
    },

    /// List configured services (never shows values)
    List,

    /// Remove a service's credential
    Remove {
        /// Service identifier
        service: String,

        /// Don't ask for confirmation
        #[arg(long, default_value = "false")]
        yes: bool,
    },

    /// Verify every stored token still authenticates
    Test,
}

fn open_vault(dir: Option<PathBuf>) -> Result<Vault> {
    let vault = match dir {
        Some(dir) => Vault::open(dir)?,
        None => Vault::open_default()?,
    };
    Ok(vault)
}

fn run_doctor(vault_dir: Option<PathBuf>) -> Result<()> {
    println!("🔍 InfraVault Doctor");
    println!("Checking vault health...\n");

    let mut all_checks_passed = true;

    // Check 1: local identity
    print!("1. Resolving local identity... ");
    let identity = match Identity::resolve() {
        Ok(identity) => {
            println!("✓ ({}@{})", identity.username, identity.hostname);
            Some(identity)
        }
        Err(e) => {
            println!("✗");
            println!("   ❌ {e}");
            println!("   💡 The vault key is derived from $USER and the hostname");
            all_checks_passed = false;
            None
        }
    };

    let mut vault = match (identity, vault_dir) {
        (Some(identity), Some(dir)) => Some(Vault::with_identity(dir, identity)),
        (Some(_), None) => Some(Vault::open_default()?),
        (None, _) => None,
    };

    if let Some(vault) = vault.as_mut() {
        // Check 2: vault directory
        print!("2. Checking vault directory... ");
        if vault.dir().is_dir() {
            println!("✓ ({})", vault.dir().display());
        } else {
            println!("⊘");
            println!("   ⚠️  Not created yet (first save will create it)");
        }

        // Check 3: vault file decrypts
        print!("3. Checking vault contents... ");
        if !vault.vault_path().exists() {
            println!("⊘");
            println!("   ⚠️  No vault file yet - run 'infravault auth setup' to add tokens");
        } else {
            match vault.load() {
                Ok(record) => println!("✓ ({} secret(s))", record.len()),
                Err(SecretsError::VaultCorrupted { path }) => {
                    println!("✗");
                    println!("   ❌ Vault at {path:?} cannot be decrypted");
                    println!("   💡 Both the vault and its backup failed authentication;");
                    println!("      inspect or remove the file manually to start over");
                    all_checks_passed = false;
                }
                Err(e) => {
                    println!("✗");
                    println!("   ❌ {e}");
                    all_checks_passed = false;
                }
            }
        }

        // Check 4: permission bits
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;

            print!("4. Checking vault file permissions... ");
            if vault.vault_path().exists() {
                let mode = std::fs::metadata(vault.vault_path())?.permissions().mode();
                if mode & 0o077 == 0 {
                    println!("✓ (owner-only)");
                } else {
                    println!("✗");
                    println!("   ❌ Vault file is readable by group/other (mode {:o})", mode & 0o777);
                    println!("   💡 Fix with: chmod 600 {}", vault.vault_path().display());
                    all_checks_passed = false;
                }
            } else {
                println!("⊘");
                println!("   ⚠️  Skipped (no vault file)");
            }
        }
    }

    println!();
    if all_checks_passed {
        println!("✅ All checks passed! Your vault is healthy.");
        Ok(())
    } else {
        println!("❌ Some checks failed. Please fix the issues above.");
        Err(anyhow::anyhow!("Doctor checks failed"))
    }
}

/// Add or update one service credential: prompt, validate, probe, save.
fn configure_service(vault: &mut Vault, service: &str, token: Option<String>, offline: bool) -> Result<()> {
    if let Some(spec) = services::find(service) {
        println!("\n→ {} Configuration", spec.name);
        println!("  {}", spec.description);
        println!("  Create a token at: {}", spec.token_url);
    } else {
        println!("\n→ {service} Configuration (unregistered service, format not checked)");
    }

    let token = match token {
        Some(token) => {
            validate::validate(service, &token)?;
            token
        }
        None => {
            let theme = ColorfulTheme::default();
            Password::with_theme(&theme)
                .with_prompt(format!("Enter your {} token", services::display_name(service)))
                .validate_with(|input: &String| -> Result<(), String> {
                    validate::validate(service, input).map_err(|e| e.to_string())
                })
                .interact()?
        }
    };

    if !offline {
        println!("🔎 Validating token against {}...", services::display_name(service));
        let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
        let account = runtime.block_on(async {
            let client = reqwest::Client::new();
            probe::probe_service(&client, service, &token).await
        });

        match account {
            Ok(account) => println!("✓ Connected as {account}"),
            Err(e) if services::find(service).is_none() => {
                // No probe endpoint for unregistered services; store anyway
                println!("⚠️  {e}");
            }
            Err(e) => {
                anyhow::bail!("token validation failed: {e}");
            }
        }
    }

    vault.set_secret(service, &token)?;
    println!("✓ {} token saved", services::display_name(service));
    Ok(())
}

fn run_auth_setup(vault: &mut Vault) -> Result<()> {
    println!("🔐 InfraVault Authentication Setup");
    println!("This wizard configures access to your infrastructure services.\n");

    let items: Vec<String> = services::SERVICES
        .iter()
        .map(|s| format!("{} - {}", s.name, s.description))
        .collect();

    let theme = ColorfulTheme::default();
    let selected = MultiSelect::with_theme(&theme)
        .with_prompt("Select services to configure")
        .items(&items)
        .interact()?;

    if selected.is_empty() {
        println!("Nothing selected.");
        return Ok(());
    }

    let mut succeeded = Vec::new();
    let mut failed = Vec::new();

    for index in selected {
        let spec = &services::SERVICES[index];
        match configure_service(vault, spec.id, None, false) {
            Ok(()) => succeeded.push(spec.name),
            Err(e) => {
                eprintln!("✗ {}: {e}", spec.name);
                failed.push(spec.name);
            }
        }
    }

    println!("\n📊 Setup Summary:");
    if !succeeded.is_empty() {
        println!("   ✓ Configured: {}", succeeded.join(", "));
    }
    if !failed.is_empty() {
        println!("   ✗ Failed: {}", failed.join(", "));
        anyhow::bail!("failed to configure {} service(s)", failed.len());
    }

    Ok(())
}

fn run_auth_list(vault: &mut Vault) -> Result<()> {
    let record = vault.load()?;

    if record.is_empty() {
        println!("No services configured yet.");
        println!("Run 'infravault auth setup' to configure services.");
        return Ok(());
    }

    println!("Configured services:");
    for service in record.keys() {
        match services::find(service) {
            Some(spec) => println!("   ✓ {} - {}", spec.name, spec.description),
            None => println!("   ✓ {service}"),
        }
    }

    Ok(())
}

fn run_auth_remove(vault: &mut Vault, service: &str, yes: bool) -> Result<()> {
    if !yes {
        let theme = ColorfulTheme::default();
        let confirmed = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "Remove the {} credential?",
                services::display_name(service)
            ))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("❌ Cancelled by user");
            return Ok(());
        }
    }

    if vault.remove_secret(service)? {
        println!("✓ {} credential removed", services::display_name(service));
    } else {
        println!("⚠️  No credential stored for {service}");
    }

    Ok(())
}

fn run_auth_test(vault: &mut Vault) -> Result<()> {
    let record = vault.load()?;

    if record.is_empty() {
        println!("No services configured yet.");
        println!("Run 'infravault auth setup' to configure services.");
        return Ok(());
    }

    println!("🔎 Testing service connections:\n");

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    let client = reqwest::Client::new();
    let mut failures = 0;

    // One probe at a time; a failing service never aborts the rest
    for (service, value) in &record {
        print!("   → {}... ", services::display_name(service));

        let Some(token) = value.as_token() else {
            println!("⊘ (multi-field credential, no probe)");
            continue;
        };

        match runtime.block_on(probe::probe_service(&client, service, token)) {
            Ok(account) => println!("✓ Connected as {account}"),
            Err(e) => {
                println!("✗");
                eprintln!("      Error: {e}");
                failures += 1;
            }
        }
    }

    if failures > 0 {
        anyhow::bail!("{failures} service(s) failed validation");
    }

    println!("\n✅ All stored tokens authenticate.");
    Ok(())
}

fn run_push_secrets(vault: &mut Vault, owner: &str, repo: &str, dry_run: bool) -> Result<()> {
    println!("🚀 InfraVault Push-Secrets");

    let record = vault.load()?;

    let Some(token) = record.get("github").and_then(|v| v.as_token()) else {
        anyhow::bail!(
            "no GitHub token in the vault - run 'infravault auth add github' first"
        );
    };
    let token = token.to_string();

    let runtime = tokio::runtime::Runtime::new().context("failed to start async runtime")?;
    runtime.block_on(github::push_secrets(&token, owner, repo, &record, dry_run))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Doctor => {
            if let Err(e) = run_doctor(cli.vault_dir) {
                eprintln!("\nError: {e}");
                std::process::exit(1);
            }
        }
        Commands::Auth { command } => {
            let mut vault = open_vault(cli.vault_dir)?;
            let result = match command {
                AuthCommands::Setup => run_auth_setup(&mut vault),
                AuthCommands::Add {
                    service,
                    token,
                    offline,
                } => configure_service(&mut vault, &service, token, offline),
                AuthCommands::List => run_auth_list(&mut vault),
                AuthCommands::Remove { service, yes } => {
                    run_auth_remove(&mut vault, &service, yes)
                }
                AuthCommands::Test => run_auth_test(&mut vault),
            };

            if let Err(e) = result {
                eprintln!("\nError: {e}");
                eprintln!("💡 Run 'infravault doctor' to check your vault.");
                std::process::exit(1);
            }
        }
        Commands::PushSecrets {
            owner,
            repo,
            dry_run,
        } => {
            let mut vault = open_vault(cli.vault_dir)?;
            if let Err(e) = run_push_secrets(&mut vault, &owner, &repo, dry_run) {
                eprintln!("\nError: {e}");
                eprintln!("⚠️  Some secrets may not have been pushed.");
                eprintln!("💡 Run 'infravault doctor' to check your vault.");
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
