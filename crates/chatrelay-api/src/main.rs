//! chatrelay entry point.
//!
//! Binary name: `chatrelay`
//!
//! Parses CLI arguments, loads configuration, then starts the HTTP relay or
//! runs one of the operator commands.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use chatrelay_core::session::{spawn_idle_sweeper, sweep_interval};
use chatrelay_infra::config::{load_relay_config, read_relay_config, resolve_data_dir};
use chatrelay_infra::llm::test_provider_connection;
use chatrelay_observe::tracing_setup::{filter_for_verbosity, init_tracing, shutdown_tracing};
use chatrelay_types::config::RelayConfig;

use cli::{Cli, Commands};
use state::AppState;

const SWEEPER_STOP_TIMEOUT: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(filter_for_verbosity(cli.verbose, cli.quiet), cli.wants_otel())
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match cli.config.as_deref() {
        Some(path) => read_relay_config(path).await?,
        None => load_relay_config(&resolve_data_dir()).await,
    };

    match cli.command {
        Commands::Serve { port, host, .. } => serve(config, &host, port).await,

        Commands::Config => {
            print!("{}", toml::to_string_pretty(&config)?);
            Ok(())
        }

        Commands::Check => check(config, cli.quiet).await,
    }
}

async fn serve(config: RelayConfig, host: &str, port: u16) -> anyhow::Result<()> {
    let shutdown = CancellationToken::new();
    let idle_ttl = config.session_idle_ttl();
    let state = AppState::init(config, shutdown.clone())?;

    let sweeper = idle_ttl.map(|ttl| {
        spawn_idle_sweeper(state.store().clone(), sweep_interval(ttl), shutdown.clone())
    });

    let addr = format!("{host}:{port}");
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    tracing::info!(
        %addr,
        provider = state.relay.provider_name(),
        model = %state.relay.settings().model,
        max_turns = state.relay.settings().max_turns,
        "chatrelay listening"
    );
    println!(
        "  {} chatrelay listening on {}",
        console::style("⚡").bold(),
        console::style(format!("http://{addr}")).cyan()
    );
    println!("  {}", console::style("Press Ctrl+C to stop").dim());

    let router = http::router::build_router(state);

    let signal_token = shutdown.clone();
    axum::serve(listener, router)
        .with_graceful_shutdown(async move {
            shutdown_signal().await;
            // Ends in-flight reply streams so open connections can drain.
            signal_token.cancel();
        })
        .await?;

    shutdown.cancel();
    if let Some(handle) = sweeper {
        stop_sweeper(handle, SWEEPER_STOP_TIMEOUT).await;
    }

    println!("\n  Server stopped.");
    Ok(())
}

/// Wait for the cancelled sweeper to exit. Returns `false` if it panicked or
/// overran `timeout`.
async fn stop_sweeper(handle: JoinHandle<()>, timeout: Duration) -> bool {
    match tokio::time::timeout(timeout, handle).await {
        Ok(Ok(())) => true,
        Ok(Err(e)) => {
            tracing::warn!("session sweeper failed: {e}");
            false
        }
        Err(_) => {
            tracing::warn!(
                "session sweeper did not stop within {}ms",
                timeout.as_millis()
            );
            false
        }
    }
}

/// Send one tiny request to the configured provider and report the result.
async fn check(config: RelayConfig, quiet: bool) -> anyhow::Result<()> {
    let provider = state::build_provider(&config)?;

    match test_provider_connection(&provider).await {
        Ok(response) => {
            if !quiet {
                println!(
                    "  {} {} ({}) responded: {}",
                    console::style("✓").green(),
                    provider.name(),
                    response.model,
                    response.content.trim()
                );
            }
            Ok(())
        }
        Err(e) => {
            println!(
                "  {} {} ({}) failed: {e}",
                console::style("✗").red(),
                provider.name(),
                config.provider.model
            );
            Err(e.into())
        }
    }
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to listen for Ctrl+C: {e}");
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
                tracing::error!("failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
