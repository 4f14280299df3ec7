//! The courier daemon binary.
//!
//! Wires everything together: loads the persisted state, starts one bridge
//! dispatcher per provider, and serves the HTTP control surface until
//! ctrl-c, then shuts the dispatchers down through a watch channel.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::Parser;
use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use courier_bridge::{BrowserHandler, Dispatcher, RequestQueue};
use courier_browser::SessionConfig;
use courier_daemon::{build_state, router};
use courier_types::{Provider, StatePaths, DEFAULT_PORT, PORT_ENV_VAR};

/// First DevTools port; each provider gets its own consecutive port.
const BASE_DEBUG_PORT: u16 = 9301;

/// Local command-and-request broker.
#[derive(Parser, Debug)]
#[command(name = "courier-daemon", version, about)]
struct Cli {
    /// Control-surface port.
    #[arg(long, env = PORT_ENV_VAR, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// State directory (default: ~/.courier).
    #[arg(long)]
    state_dir: Option<PathBuf>,

    /// Explicit browser binary for the bridge sessions.
    #[arg(long)]
    browser: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let paths = match &cli.state_dir {
        Some(dir) => StatePaths::rooted_at(dir),
        None => StatePaths::default_root(),
    };
    tracing::info!(root = %paths.root().display(), "state directory");

    let state = build_state(&paths)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let mut dispatchers = Vec::new();
    for (i, provider) in Provider::ALL.into_iter().enumerate() {
        let queue = RequestQueue::new(provider, paths.bridge_queue_file(provider));
        let results = state.results().clone();
        let handler = BrowserHandler::new(SessionConfig {
            provider,
            profile_dir: paths.browser_profile_dir(provider),
            debug_port: BASE_DEBUG_PORT + i as u16,
            browser_path: cli.browser.clone(),
        });
        let dispatcher = Dispatcher::new(queue, results, handler);
        dispatchers.push(tokio::spawn(dispatcher.run(shutdown_rx.clone())));
    }

    let addr = SocketAddr::from(([127, 0, 0, 1], cli.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "control surface listening");

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            tracing::info!("shutdown signal received");
        })
        .await?;

    let _ = shutdown_tx.send(true);
    for task in dispatchers {
        let _ = task.await;
    }
    tracing::info!("daemon stopped");
    Ok(())
}
