use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use chat_room::{
    accounts::AccountStore,
    cli::{Cli, Command, ServeArgs},
    client, http,
    server::ChatServer,
};

fn init_tracing() {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_target(false).try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve(args) => serve(args).await?,
        Command::Client(args) => client::run(args).await?,
    }

    Ok(())
}

async fn serve(args: ServeArgs) -> Result<()> {
    let chat_listener = TcpListener::bind(args.chat_listen)
        .await
        .with_context(|| format!("failed to bind chat listener on {}", args.chat_listen))?;
    let chat = ChatServer::new(chat_listener);
    info!("chat listening on {}", chat.local_addr()?);

    let http_listener = TcpListener::bind(args.http_listen)
        .await
        .with_context(|| format!("failed to bind http listener on {}", args.http_listen))?;
    info!("http listening on {}", http_listener.local_addr()?);
    let app = http::router(Arc::new(AccountStore::new()));

    let http = tokio::spawn(async move {
        axum::serve(http_listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
    });

    if let Err(err) = chat.run_until_ctrl_c().await {
        warn!("chat server exited with error: {err:?}");
        return Err(err);
    }
    http.await??;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = ?err, "failed to install ctrl-c handler");
    }
}
