use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use twinlink_client::TwinClient;
use twinlink_core::{load_platforms, AppConfig, PlatformsFile};

mod connection;
mod notifications;
mod onboarding;
mod watch;

#[derive(Debug, Parser)]
#[command(name = "twinlink")]
#[command(about = "Connect platforms and follow data extraction")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Authorize a platform
    Connect { platform: String },
    /// Re-authorize a platform whose token expired
    Reconnect { platform: String },
    /// Revoke a platform's grant and forget it locally
    Disconnect { platform: String },
    /// Run an extraction for a connected platform
    Extract { platform: String },
    /// Show connection status for every enabled platform
    Status {
        /// Print the connection records as JSON
        #[arg(long)]
        json: bool,
    },
    /// Follow extraction progress until every platform has completed
    Watch {
        /// Platforms to track (defaults to every enabled platform)
        #[arg(long, value_delimiter = ',')]
        platforms: Vec<String>,
        /// Skip the push channel and follow status polls only
        #[arg(long)]
        no_events: bool,
    },
    /// Show token expiry warnings
    Notifications {
        /// Platform whose connect flow just completed
        #[arg(long)]
        just_connected: Option<String>,
        /// Keep polling and print every change
        #[arg(long)]
        follow: bool,
    },
    /// Dismiss a notification
    Dismiss { id: String },
    /// Onboarding tour flag
    Onboarding {
        #[command(subcommand)]
        command: onboarding::OnboardingCommands,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = twinlink_core::load_app_config()?;

    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!(env = %config.env, api_url = %config.api_url, "configuration loaded");

    match cli.command {
        Commands::Onboarding { command } => onboarding::run_onboarding(&config, &command),
        Commands::Connect { platform } => {
            let session = Session::load(&config)?;
            connection::run_connect(&session.client, session.platform_key(&platform)?).await
        }
        Commands::Reconnect { platform } => {
            let session = Session::load(&config)?;
            connection::run_reconnect(&session.client, session.platform_key(&platform)?).await
        }
        Commands::Disconnect { platform } => {
            let session = Session::load(&config)?;
            connection::run_disconnect(&session.client, session.platform_key(&platform)?).await
        }
        Commands::Extract { platform } => {
            let session = Session::load(&config)?;
            connection::run_extract(&session.client, session.platform_key(&platform)?).await
        }
        Commands::Status { json } => {
            let session = Session::load(&config)?;
            connection::run_status(&config, &session.client, &session.catalog, json).await
        }
        Commands::Watch {
            platforms,
            no_events,
        } => {
            let session = Session::load(&config)?;
            let platforms = if platforms.is_empty() {
                session.catalog.enabled_keys()
            } else {
                platforms
                    .iter()
                    .map(|p| session.platform_key(p).map(str::to_string))
                    .collect::<anyhow::Result<Vec<_>>>()?
            };
            watch::run_watch(&config, session.client, platforms, !no_events).await
        }
        Commands::Notifications {
            just_connected,
            follow,
        } => {
            let session = Session::load(&config)?;
            if follow {
                notifications::run_follow(&config, session.client, just_connected).await
            } else {
                notifications::run_once(&session.client, just_connected).await
            }
        }
        Commands::Dismiss { id } => {
            let session = Session::load(&config)?;
            notifications::run_dismiss(&session.client, &id).await
        }
    }
}

/// Backend client plus the platform catalog, loaded for network commands.
struct Session {
    client: Arc<TwinClient>,
    catalog: PlatformsFile,
}

impl Session {
    fn load(config: &AppConfig) -> anyhow::Result<Self> {
        let catalog = load_platforms(&config.platforms_path)?;
        let client = TwinClient::new(&config.api_url, &config.user_id, config.request_timeout_secs)
            .context("failed to build backend client")?;
        Ok(Self {
            client: Arc::new(client),
            catalog,
        })
    }

    /// Resolves `key` against the catalog, rejecting unknown or disabled platforms.
    fn platform_key<'a>(&self, key: &'a str) -> anyhow::Result<&'a str> {
        match self.catalog.get(key) {
            Some(platform) if platform.enabled => Ok(key),
            Some(_) => anyhow::bail!("platform '{key}' is disabled in the catalog"),
            None => anyhow::bail!("unknown platform '{key}'"),
        }
    }
}

/// Resolves on Ctrl-C or, on unix, SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
    tracing::info!("shutdown signal received");
}
