//! Persona chat backend entry point.
//!
//! Binary name: `persona-chat`
//!
//! Parses CLI arguments, resolves configuration (flags, environment, optional
//! TOML file, defaults), wires the services, then either serves the REST API
//! or prints a one-shot status report.

mod cli;
mod http;
mod state;

use clap::Parser;

use persona_infra::config::{api_key_from, apply_env_overrides, load_chat_config};
use persona_observe::tracing_setup::{directive_for_verbosity, init_tracing};

use cli::{Cli, Commands};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    init_tracing(cli.json_logs, directive_for_verbosity(cli.verbose))
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;

    let mut config = load_chat_config(cli.config.as_deref()).await;
    apply_env_overrides(&mut config, |key| std::env::var(key).ok())?;
    cli.apply_overrides(&mut config);
    let api_key = api_key_from(|key| std::env::var(key).ok());

    let state = AppState::init(&config, api_key).await?;

    match cli.command {
        Commands::Status => {
            cli::status::status(&state).await?;
        }

        Commands::Serve { host, port } => {
            let addr = format!("{host}:{port}");
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            tracing::info!(
                addr = %addr,
                model = %config.llm.model,
                engine_available = state.engine.is_some(),
                "Persona chat API listening"
            );

            let router = http::router::build_router(state.clone());

            axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await?;

            tracing::info!("Server stopped");
        }
    }

    state.db_pool.close().await;
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
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
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
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
}
