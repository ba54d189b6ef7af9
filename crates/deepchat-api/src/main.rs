//! DeepChat CLI and HTTP server entry point.
//!
//! Binary name: `deepchat`
//!
//! Parses CLI arguments, loads configuration, initializes tracing and the
//! chat service, then dispatches to the command handler or starts the server.

mod cli;
mod http;
mod state;

use std::time::Duration;

use clap::Parser;

use deepchat_infra::config::{load_config_file, resolve_data_dir, CONFIG_FILE};

use cli::{Cli, Commands};
use state::AppState;

/// Upper bound on how often idle HTTP sessions are swept.
const SESSION_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let data_dir = resolve_data_dir();
    let config_path = cli
        .config
        .clone()
        .unwrap_or_else(|| data_dir.join(CONFIG_FILE));
    // Loaded before the subscriber exists because `otel` is a config key.
    let config_present = tokio::fs::try_exists(&config_path).await.unwrap_or(false);
    let config = load_config_file(&config_path).await;

    deepchat_observe::init_tracing(config.otel, deepchat_observe::default_filter(cli.verbose))
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {e}"))?;
    tracing::info!(
        path = %config_path.display(),
        present = config_present,
        storage = %config.storage,
        testing = config.testing,
        keying = %config.conversation_keying,
        "configuration loaded"
    );

    let state = AppState::init(config, data_dir).await?;

    let result = run(&cli, &state).await;

    state.shutdown().await;
    deepchat_observe::shutdown_tracing();
    result
}

async fn run(cli: &Cli, state: &AppState) -> anyhow::Result<()> {
    match &cli.command {
        Commands::Serve { bind } => {
            let addr = bind.clone().unwrap_or_else(|| state.config.bind_addr.clone());
            let listener = tokio::net::TcpListener::bind(&addr).await?;

            println!(
                "  {} DeepChat listening on {}",
                console::style("⚡").bold(),
                console::style(format!("http://{addr}")).cyan()
            );
            println!("  {}", console::style("Press Ctrl+C to stop").dim());

            let router = http::router::build_router(state.clone());
            let sweep_every = state.config.session_idle_timeout().min(SESSION_SWEEP_INTERVAL);
            let sweeper = state.sessions.clone().spawn_sweeper(sweep_every);

            let served = axum::serve(listener, router)
                .with_graceful_shutdown(shutdown_signal())
                .await;
            sweeper.abort();
            served?;

            println!("\n  Server stopped.");
        }

        Commands::Chat {
            data_name,
            message,
            user,
            session_start,
        } => {
            cli::chat::run_chat(
                state,
                data_name,
                message,
                user.clone(),
                session_start.clone(),
                cli.json,
            )
            .await?;
        }

        Commands::List { kind } => {
            cli::history::list_entities(state, kind, cli.json).await?;
        }

        Commands::Show { conversation_id } => {
            cli::history::show_conversation(state, conversation_id, cli.json).await?;
        }
    }

    Ok(())
}

/// Wait for Ctrl+C or SIGTERM for graceful shutdown.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
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

    tracing::info!("shutdown signal received");
}
