use anyhow::Result;
use clap::Parser;
use smart_inbox::cli::{self, Cli, Commands};
use smart_inbox::config::Config;
use smart_inbox::error::GmailError;
use std::process;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    // Exit with proper code on error
    if let Err(e) = run().await {
        display_error(&e);
        eprintln!("\nFor help, run: smart-inbox --help");
        process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Install default crypto provider for rustls
    // On non-Windows platforms, use aws-lc-rs
    // On Windows, use ring (no NASM/CMake required)
    #[cfg(not(windows))]
    rustls::crypto::aws_lc_rs::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    #[cfg(windows)]
    rustls::crypto::ring::default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("Failed to install default crypto provider"))?;

    let cli = Cli::parse();

    // The config decides the log format, so read it before logging starts
    let config = match &cli.command {
        Commands::InitConfig { .. } => Config::default(),
        _ => Config::load(&cli.config).await?,
    };

    let filter = if cli.verbose {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("smart_inbox=debug,tower_http=debug,info"))
    } else {
        EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("smart_inbox=info,warn"))
    };

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false);

    if config.logging.json {
        subscriber.json().init();
    } else {
        subscriber.with_target(false).init();
    }

    tracing::info!("Smart inbox starting...");

    match cli.command {
        Commands::Serve { bind } => {
            cli::run_server(config, bind).await?;
            Ok(())
        }

        Commands::Token {
            credentials,
            token_cache,
        } => {
            let token = cli::run_token(&credentials, &token_cache).await?;
            // stdout only, so it can be piped into a header
            println!("{}", token);
            Ok(())
        }

        Commands::InitConfig { output, force } => {
            cli::run_init_config(&output, force).await?;

            println!("Created example configuration file at: {:?}", output);
            println!("\nKey settings to review:");
            println!("  - server.bind: Address the API listens on");
            println!("  - gmail.max_concurrent_requests: Parallel message fetches per request");
            println!("  - analytics.window: How many recent messages sender stats cover");
            println!("  - subscriptions.scan_window: How many messages to scan for newsletters");

            Ok(())
        }
    }
}

/// Display error with context
fn display_error(error: &anyhow::Error) {
    eprintln!("Error: {}", error);

    let mut cause = error.source();
    while let Some(e) = cause {
        eprintln!("  Caused by: {}", e);
        cause = e.source();
    }

    if let Some(gmail_err) = error.downcast_ref::<GmailError>() {
        match gmail_err {
            GmailError::AuthError(_) => {
                eprintln!("\nHint: Make sure your credentials.json file is valid.");
                eprintln!("      You can download it from Google Cloud Console.");
            }
            GmailError::ConfigError(_) => {
                eprintln!("\nHint: Check your configuration file for errors.");
                eprintln!("      Run: smart-inbox init-config --force");
            }
            GmailError::IoError(_) => {
                eprintln!("\nHint: Check that the bind address is free and paths are writable.");
            }
            _ => {}
        }
    }
}
