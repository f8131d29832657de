use std::process::ExitCode;

use anyhow::{Context, Result};
use tokio_util::sync::CancellationToken;
use tracing::{error, Level};
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use newsmux::cli::Args;
use newsmux::config::Config;
use newsmux::server::Server;
use newsmux::state::AppState;

fn set_up_logging() {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer())
        .with(
            EnvFilter::builder()
                .with_default_directive(Level::INFO.into())
                .with_env_var("NEWSMUX_LOG")
                .from_env_lossy(),
        )
        .init();
}

#[tokio::main]
async fn main() -> ExitCode {
    set_up_logging();

    let cancel = CancellationToken::new();

    tokio::spawn({
        let cancel = cancel.clone();

        async move {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!("could not listen for Ctrl-C: {e}");
            }
            cancel.cancel();
        }
    });

    match run(cancel).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cancel: CancellationToken) -> Result<()> {
    let args = Args::parse();
    let mut cfg = Config::load(&args.config_path)
        .with_context(|| format!("could not load `{}`", args.config_path.display()))?;
    args.apply(&mut cfg);

    let state = AppState::from_config(&cfg).await?;

    if cfg.seed_default_feeds {
        state
            .registry
            .seed_defaults()
            .await
            .context("could not subscribe the default feeds")?;
    }

    let server = Server::new(&cfg.bind_addr, state.clone()).await?;
    tracing::info!(addr = %server.local_addr()?, "Listening");

    let result = server.serve(cancel).await;
    state.shutdown().await;
    result
}
