//! Expander CLI - add nodes to a storage cluster through the installation gateway.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use expander::{ExpanderConfig, HttpGateway, Manifest, Orchestrator, Outcome, Secret};

/// Expander CLI - cluster expansion through the installation gateway.
#[derive(Parser)]
#[command(name = "expander")]
#[command(about = "Add management, tie-breaker and storage-client nodes to a cluster")]
struct Cli {
    /// YAML configuration file.
    #[arg(long, env = "EXPANDER_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway base URL (overrides the config file).
    #[arg(long, env = "EXPANDER_GATEWAY_URL")]
    gateway_url: Option<String>,

    /// Gateway account (overrides the config file).
    #[arg(long, env = "EXPANDER_GATEWAY_USER")]
    gateway_user: Option<String>,

    /// Gateway password (overrides the config file).
    #[arg(long, env = "EXPANDER_GATEWAY_PASSWORD", hide_env_values = true)]
    gateway_password: Option<String>,

    /// Enable verbose logging.
    #[arg(short, long, default_value = "false")]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate cluster credentials against the gateway.
    Check {
        /// Node manifest (YAML).
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Abort gateway work, clear its queue and return it to idle.
    Reset,

    /// Run a full expansion.
    Install {
        /// Node manifest (YAML).
        #[arg(long)]
        manifest: PathBuf,

        /// Cancel the run after this many minutes.
        #[arg(long)]
        deadline_mins: Option<u64>,

        /// Print the result as JSON.
        #[arg(long, default_value = "false")]
        json: bool,
    },
}

impl Cli {
    /// Load the config file, then apply flag and environment overrides.
    fn load_config(&self) -> Result<ExpanderConfig> {
        let mut config = match &self.config {
            Some(path) => ExpanderConfig::load(path)
                .with_context(|| format!("Failed to load config {}", path.display()))?,
            None => ExpanderConfig::default(),
        };

        if let Some(url) = &self.gateway_url {
            config.gateway.base_url.clone_from(url);
        }
        if let Some(user) = &self.gateway_user {
            config.gateway.username.clone_from(user);
        }
        if let Some(password) = &self.gateway_password {
            config.gateway.password = Secret::new(password.as_str());
        }

        config.validate().context("Invalid configuration")?;
        Ok(config)
    }
}

fn load_manifest(path: &Path) -> Result<Manifest> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read manifest {}", path.display()))?;
    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse manifest {}", path.display()))
}

/// Cancel `token` on Ctrl-C or once `deadline` elapses.
fn spawn_cancellation(token: CancellationToken, deadline: Option<Duration>) {
    tokio::spawn(async move {
        let deadline = async {
            match deadline {
                Some(d) => tokio::time::sleep(d).await,
                None => std::future::pending::<()>().await,
            }
        };

        tokio::select! {
            () = token.cancelled() => return,
            result = tokio::signal::ctrl_c() => {
                if let Err(e) = result {
                    warn!(error = %e, "Failed to listen for Ctrl-C");
                    return;
                }
                warn!("Interrupted, cancelling expansion");
            }
            () = deadline => warn!("Deadline reached, cancelling expansion"),
        }
        token.cancel();
    });
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = cli.load_config()?;
    let gateway = Arc::new(
        HttpGateway::new(&config.gateway).context("Failed to create gateway client")?,
    );
    let orchestrator =
        Orchestrator::new(gateway.clone(), gateway).with_settings(&config.sequencer);

    match cli.command {
        Commands::Check { manifest } => {
            let manifest = load_manifest(&manifest)?;
            let status = orchestrator.check_credentials(&manifest).await?;

            if !status.is_ok() {
                bail!("Credential check failed: {}", status.describe());
            }
            println!("\n✅ Credentials accepted");
            println!("  Management IPs: {}", manifest.management_ips().join(", "));
        }

        Commands::Reset => {
            orchestrator
                .reset_queue()
                .await
                .context("Gateway queue reset failed")?;
            println!("\n✅ Gateway queue reset");
        }

        Commands::Install {
            manifest,
            deadline_mins,
            json,
        } => {
            let manifest = load_manifest(&manifest)?;
            info!(
                nodes = manifest.nodes.len(),
                storage_clients = manifest.storage_clients().count(),
                "Starting expansion"
            );

            let cancel = CancellationToken::new();
            spawn_cancellation(
                cancel.clone(),
                deadline_mins.map(|m| Duration::from_secs(m.saturating_mul(60))),
            );

            let result = orchestrator.expand(&manifest, &cancel).await;
            cancel.cancel();

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            }

            if let Some(cleanup) = &result.cleanup_error {
                println!("\n⚠️  Gateway cleanup failed: {cleanup}");
            }

            match result.outcome {
                Outcome::Succeeded { installed_clients } => {
                    println!("\n✅ Expansion complete!");
                    println!("  Run:       {}", result.stats.run_id);
                    println!("  Polls:     {}", result.stats.polls);
                    println!("  Retries:   {}", result.stats.retries);
                    println!("  Installed: {}", installed_clients.join(", "));
                }
                Outcome::Failed {
                    kind,
                    message,
                    phase,
                } => {
                    let at = phase.map(|p| format!(" in {p} phase")).unwrap_or_default();
                    bail!("Expansion failed{at} ({kind}): {message}");
                }
            }
        }
    }

    Ok(())
}
