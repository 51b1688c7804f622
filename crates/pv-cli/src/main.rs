//! pv: peervault secure-sharing CLI
//!
//! Commands:
//!   otp generate|verify          - TOTP shared secrets and codes
//!   trust ...                    - peer trust store CRUD, vouching, rotation
//!   share <files...>             - encrypt a batch into the staging area
//!   unlock                       - master-password (+ optional TOTP) gate check
//!   sweep                        - remove all staged artifacts (shutdown sweep)
//!   config show                  - print the effective configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use secrecy::{ExposeSecret, SecretString};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use pv_core::config::PvConfig;
use pv_core::time::now_epoch_millis;
use pv_core::PvResult;
use pv_gate::{GateState, MasterKeyGate, PasswordVerifier};
use pv_share::{AgeEncryptor, EncryptionMode, SharePipeline, StagingArea, Transport};
use pv_trust::{Recommendation, TrustStatus, TrustStore, TrustedIdentity};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "pv",
    version,
    about = "peervault: trusted peer-to-peer secure sharing",
    long_about = "pv: manage TOTP secrets, the peer trust store, and encrypted share batches"
)]
struct Cli {
    /// Path to peervault.toml configuration file
    #[arg(long, short = 'c', env = "PEERVAULT_CONFIG", default_value = "peervault.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// One-time-password management
    Otp {
        #[command(subcommand)]
        action: OtpAction,
    },

    /// Peer trust store management
    Trust {
        #[command(subcommand)]
        action: TrustAction,
    },

    /// Encrypt files into the staging area and print the artifact list
    Share {
        /// Files to share
        files: Vec<PathBuf>,
        /// Encrypt with a shared passphrase
        #[arg(long, conflicts_with_all = ["recipient", "trusted"])]
        passphrase: Option<String>,
        /// Encrypt to an explicit recipient public key (repeatable)
        #[arg(long)]
        recipient: Vec<String>,
        /// Encrypt to every Trusted identity in the trust store
        #[arg(long)]
        trusted: bool,
    },

    /// Check the master password (and TOTP code if enabled) against the gate
    Unlock {
        /// Six-digit TOTP code, required when two-factor auth is enabled
        #[arg(long)]
        code: Option<String>,
    },

    /// Remove every staged artifact (the shutdown sweep)
    Sweep,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum OtpAction {
    /// Generate a fresh base32 shared secret
    Generate,
    /// Verify a submitted code against a secret at the current time
    Verify { secret: String, code: String },
}

#[derive(Subcommand, Debug)]
enum TrustAction {
    /// Add a peer identity (starts Pending)
    Add {
        public_key: String,
        /// Explicit fingerprint (default: derived from the public key)
        #[arg(long)]
        fingerprint: Option<String>,
        /// Human label
        #[arg(long)]
        name: Option<String>,
    },
    /// List all identities
    List,
    /// Show one identity in full
    Show { fingerprint: String },
    /// Remove an identity
    Remove { fingerprint: String },
    /// Set the trust status of an identity
    Status {
        fingerprint: String,
        /// trusted | pending | distrusted
        status: String,
        /// Audit-trail reason for the decision
        #[arg(long)]
        reason: Option<String>,
    },
    /// Set the manual trust level (0-5)
    Level { fingerprint: String, level: u8 },
    /// Record a vouching statement from another peer
    Recommend {
        fingerprint: String,
        /// Recommender fingerprint
        #[arg(long)]
        from: String,
        /// Asserted trust level (0-5)
        #[arg(long)]
        level: u8,
        #[arg(long)]
        note: Option<String>,
    },
    /// Rotate an identity to a new key, keeping its metadata
    Rotate {
        old_fingerprint: String,
        new_public_key: String,
        /// New fingerprint (default: derived from the new public key)
        #[arg(long)]
        fingerprint: Option<String>,
    },
    /// Record a transfer outcome against an identity
    Outcome {
        fingerprint: String,
        /// The transfer failed
        #[arg(long)]
        failed: bool,
        #[arg(long, default_value_t = 0)]
        bytes: u64,
        #[arg(long, default_value_t = 0)]
        latency_ms: u64,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the effective configuration as TOML
    Show,
}

// ── main ───────────────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = PvConfig::load(&cli.config)?;
    init_logging(&config.log.level, &config.log.format);

    match cli.command {
        Commands::Otp { action } => run_otp(action),
        Commands::Trust { action } => run_trust(action, &config),
        Commands::Share {
            files,
            passphrase,
            recipient,
            trusted,
        } => run_share(files, passphrase, recipient, trusted, &config).await,
        Commands::Unlock { code } => run_unlock(code, &config),
        Commands::Sweep => {
            let staging = StagingArea::open(&config.share.staging_dir)?;
            staging.sweep()?;
            println!("staging area swept");
            Ok(())
        }
        Commands::Config { action } => match action {
            ConfigAction::Show => {
                print!("{}", toml::to_string_pretty(&config)?);
                Ok(())
            }
        },
    }
}

fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    if format == "json" {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

// ── otp ────────────────────────────────────────────────────────────────────────

fn run_otp(action: OtpAction) -> Result<()> {
    match action {
        OtpAction::Generate => {
            println!("{}", pv_otp::generate_secret());
            Ok(())
        }
        OtpAction::Verify { secret, code } => {
            if pv_otp::verify(&secret, &code, SystemTime::now()) {
                println!("valid");
                Ok(())
            } else {
                anyhow::bail!("code rejected");
            }
        }
    }
}

// ── trust ──────────────────────────────────────────────────────────────────────

fn run_trust(action: TrustAction, config: &PvConfig) -> Result<()> {
    let store = TrustStore::open(&config.trust.store_path);

    match action {
        TrustAction::Add {
            public_key,
            fingerprint,
            name,
        } => {
            let fingerprint =
                fingerprint.unwrap_or_else(|| pv_trust::fingerprint_for(&public_key));
            let mut identity = TrustedIdentity::new(public_key, fingerprint.clone());
            if let Some(name) = name {
                identity = identity.with_display_name(name);
            }
            store.add_identity(identity)?;
            println!("{fingerprint}");
        }
        TrustAction::List => {
            let mut identities = store.all_identities();
            identities.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
            for id in identities {
                println!(
                    "{}  {:<10}  level {}  {}",
                    id.fingerprint,
                    format!("{:?}", id.status),
                    id.trust_level,
                    id.display_name.as_deref().unwrap_or("-"),
                );
            }
        }
        TrustAction::Show { fingerprint } => {
            let id = store
                .get_identity(&fingerprint)
                .with_context(|| format!("unknown fingerprint: {fingerprint}"))?;
            println!("fingerprint:     {}", id.fingerprint);
            println!("public key:      {}", id.public_key);
            println!("display name:    {}", id.display_name.as_deref().unwrap_or("-"));
            println!("status:          {:?}", id.status);
            println!("trust level:     {}", id.trust_level);
            println!(
                "transfers:       {} ok / {} failed, {} bytes",
                id.successful_transfers, id.failed_transfers, id.total_bytes_transferred
            );
            println!("avg latency:     {:.1} ms", id.average_latency_ms());
            if let Some(score) = store.interaction_score(&id.fingerprint) {
                println!("score:           {score:+.2}");
            }
            println!("trust rank:      {:.2}", store.trust_rank(&id.fingerprint));
            for reason in &id.reasons {
                println!("reason:          {reason}");
            }
            for rec in id.recommendations.values() {
                println!(
                    "vouched by:      {} (level {})",
                    rec.recommender_fingerprint, rec.trust_level
                );
            }
        }
        TrustAction::Remove { fingerprint } => {
            store.remove_identity(&fingerprint)?;
        }
        TrustAction::Status {
            fingerprint,
            status,
            reason,
        } => {
            let status = parse_status(&status)?;
            store.set_status(&fingerprint, status)?;
            if let Some(reason) = reason {
                store.add_reason(&fingerprint, &reason)?;
            }
        }
        TrustAction::Level { fingerprint, level } => {
            store.set_trust_level(&fingerprint, level)?;
        }
        TrustAction::Recommend {
            fingerprint,
            from,
            level,
            note,
        } => {
            store.add_recommendation(
                &fingerprint,
                Recommendation {
                    recommender_fingerprint: from,
                    trust_level: level,
                    note,
                    issued_at: now_epoch_millis(),
                },
            )?;
        }
        TrustAction::Rotate {
            old_fingerprint,
            new_public_key,
            fingerprint,
        } => {
            let new_fingerprint =
                fingerprint.unwrap_or_else(|| pv_trust::fingerprint_for(&new_public_key));
            store.rotate_key(&old_fingerprint, &new_public_key, &new_fingerprint)?;
            println!("{new_fingerprint}");
        }
        TrustAction::Outcome {
            fingerprint,
            failed,
            bytes,
            latency_ms,
        } => {
            store.record_outcome(&fingerprint, !failed, bytes, latency_ms)?;
        }
    }
    Ok(())
}

fn parse_status(s: &str) -> Result<TrustStatus> {
    match s.to_ascii_lowercase().as_str() {
        "trusted" => Ok(TrustStatus::Trusted),
        "pending" => Ok(TrustStatus::Pending),
        "distrusted" => Ok(TrustStatus::Distrusted),
        other => anyhow::bail!("unknown status: {other} (expected trusted|pending|distrusted)"),
    }
}

// ── share ──────────────────────────────────────────────────────────────────────

/// Prints the staged artifact paths; the actual outbound channel (share
/// intent, peer transfer) consumes them out of process.
struct ListingTransport;

impl Transport for ListingTransport {
    fn send(&self, artifacts: &[pv_share::ShareArtifact]) -> PvResult<()> {
        for artifact in artifacts {
            println!("{}", artifact.path.display());
        }
        Ok(())
    }
}

async fn run_share(
    files: Vec<PathBuf>,
    passphrase: Option<String>,
    recipient: Vec<String>,
    trusted: bool,
    config: &PvConfig,
) -> Result<()> {
    let mode = if let Some(passphrase) = passphrase {
        EncryptionMode::Passphrase(SecretString::from(passphrase))
    } else if trusted {
        let store = TrustStore::open(&config.trust.store_path);
        EncryptionMode::Recipients(store.trusted_recipient_keys())
    } else {
        EncryptionMode::Recipients(recipient)
    };

    let staging = StagingArea::open(&config.share.staging_dir)?;
    let pipeline =
        SharePipeline::prepare(files, mode, &staging, &config.share.encrypted_suffix)?;
    let outcome = pipeline.run(Arc::new(AgeEncryptor), &ListingTransport).await;

    match outcome.state {
        pv_share::PipelineState::Completed => Ok(()),
        pv_share::PipelineState::Cancelled => {
            println!("share cancelled");
            Ok(())
        }
        _ => match outcome.error {
            Some(e) => Err(e.into()),
            None => anyhow::bail!("share failed"),
        },
    }
}

// ── unlock ─────────────────────────────────────────────────────────────────────

/// Settings-protection check in a sidecar file: the first unlock records
/// a hash of the master password, later unlocks verify against it.
struct StoredCheckVerifier {
    path: PathBuf,
}

impl PasswordVerifier for StoredCheckVerifier {
    fn verify(&self, candidate: &SecretString) -> PvResult<bool> {
        let digest = blake3::hash(candidate.expose_secret().as_bytes())
            .to_hex()
            .to_string();
        if self.path.exists() {
            let stored = std::fs::read_to_string(&self.path)?;
            Ok(stored.trim() == digest)
        } else {
            if let Some(parent) = self.path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::write(&self.path, digest)?;
            Ok(true)
        }
    }
}

fn run_unlock(code: Option<String>, config: &PvConfig) -> Result<()> {
    let totp_secret = if config.gate.totp_enabled {
        let path = sidecar_path(config, "totp_secret");
        Some(
            std::fs::read_to_string(&path)
                .with_context(|| format!("two-factor enabled but no secret at {}", path.display()))?
                .trim()
                .to_string(),
        )
    } else {
        None
    };

    let mut gate = MasterKeyGate::new(&config.gate, totp_secret);
    gate.begin_unlock();

    let password = match std::env::var("PV_MASTER_PASSWORD") {
        Ok(p) => p,
        Err(_) => {
            eprint!("master password: ");
            let mut line = String::new();
            std::io::stdin().lock().read_line(&mut line)?;
            line.trim_end().to_string()
        }
    };

    let verifier = StoredCheckVerifier {
        path: sidecar_path(config, "protection_check"),
    };
    let mut state = gate.submit_password(SecretString::from(password), &verifier)?;

    if state == GateState::TwoFactorPending {
        let code = code.context("two-factor auth enabled: pass --code <totp>")?;
        state = gate.submit_code(&code, SystemTime::now());
        if state != GateState::Unlocked {
            gate.cancel();
            anyhow::bail!("one-time code rejected");
        }
    }

    match state {
        GateState::Unlocked => {
            println!("unlocked");
            Ok(())
        }
        _ => anyhow::bail!("master password rejected"),
    }
}

fn sidecar_path(config: &PvConfig, name: &str) -> PathBuf {
    config
        .trust
        .store_path
        .parent()
        .unwrap_or(std::path::Path::new("."))
        .join(name)
}
