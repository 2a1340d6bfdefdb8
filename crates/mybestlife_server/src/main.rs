//! Backend server entry point.

use anyhow::Context;
use log::info;
use mybestlife_core::db::open_db;
use mybestlife_core::{default_log_level, init_logging, init_stderr_logging};
use mybestlife_server::{app, AppState, ServerConfig};
use std::net::SocketAddr;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = ServerConfig::from_env()?;

    let level = config.log_level.as_deref().unwrap_or(default_log_level());
    let logging = match config.log_dir.as_deref() {
        Some(dir) => init_logging(level, dir),
        None => init_stderr_logging(level),
    };
    logging
        .map_err(anyhow::Error::msg)
        .context("logging init failed")?;

    if config.smtp.is_none() {
        info!("event=mail_config module=server status=ok transport=log");
    }

    let conn = open_db(&config.db_path)
        .with_context(|| format!("failed to open database {}", config.db_path.display()))?;
    let state = AppState::from_config(conn, &config).context("failed to load token blacklist")?;
    let router = app(state, config.cors_origin.as_deref());

    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.bind_addr))?;
    info!(
        "event=server_start module=server status=ok addr={}",
        config.bind_addr
    );
    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;
    info!("event=server_stop module=server status=ok");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
