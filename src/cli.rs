//! Command-line interface

use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::auth::{obtain_access_token, secure_token_file, HubClientFactory};
use crate::config::Config;
use crate::error::{GmailError, Result};
use crate::server::{router, AppState};

#[derive(Parser, Debug)]
#[command(name = "smart-inbox")]
#[command(version)]
#[command(about = "Gmail inbox manager: labeling, cleanup, analytics and unsubscribe", long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml")]
    pub config: PathBuf,

    /// Verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the HTTP API
    Serve {
        /// Address to listen on (overrides server.bind)
        #[arg(short, long)]
        bind: Option<String>,
    },

    /// Run the OAuth flow and print an access token for local testing
    Token {
        /// Path to OAuth2 credentials file
        #[arg(long, default_value = "credentials.json")]
        credentials: PathBuf,

        /// Path to token cache file
        #[arg(long, default_value = ".smart-inbox/token.json")]
        token_cache: PathBuf,
    },

    /// Generate example configuration file
    InitConfig {
        /// Path to create config file
        #[arg(short, long, default_value = "config.toml")]
        output: PathBuf,

        /// Overwrite existing file
        #[arg(long)]
        force: bool,
    },
}

/// Serve the API until the process is stopped
pub async fn run_server(config: Config, bind_override: Option<String>) -> Result<()> {
    let bind = bind_override.unwrap_or_else(|| config.server.bind.clone());
    let factory = Arc::new(HubClientFactory::new(config.gmail.request_timeout())?);
    let state = Arc::new(AppState::new(factory, config)?);

    let listener = tokio::net::TcpListener::bind(&bind).await?;
    info!("Smart inbox listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state)).await?;
    Ok(())
}

/// Obtain a token through the installed flow and return it
pub async fn run_token(credentials: &Path, token_cache: &Path) -> Result<String> {
    if let Some(parent) = token_cache.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await?;
        }
    }

    let token = obtain_access_token(credentials, token_cache).await?;

    if token_cache.exists() {
        secure_token_file(token_cache).await?;
    }

    info!("Token cached at {:?}", token_cache);
    Ok(token)
}

/// Write the default configuration to `output`
pub async fn run_init_config(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        return Err(GmailError::ConfigError(format!(
            "Configuration file already exists at {:?}. Use --force to overwrite.",
            output
        )));
    }

    Config::create_example(output).await
}
