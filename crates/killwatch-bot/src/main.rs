//! Killwatch - posts zKillboard killmails to a Matrix room.
//!
//! # Usage
//!
//! ```bash
//! # Configuration comes from the environment (or a .env file)
//! MATRIX_HOMESERVER_URL=https://matrix.example.org \
//! MATRIX_ACCESS_TOKEN=syt_... \
//! MATRIX_ROOM_ID='!kills:example.org' \
//! KILLWATCH_USER_AGENT='killwatch/0.1 (ops@example.com)' \
//! KILLWATCH_WATCHED_IDS=99000001,98000001 \
//! killwatch --metrics-port 9090
//! ```
//!
//! # Exit status
//!
//! A fatal feed error (502 from RedisQ, dropped connection) ends the process
//! with a non-zero status so the supervisor restarts it with a fresh
//! connection. Ctrl+C / SIGTERM stops the loop after the current poll and
//! exits cleanly.

use anyhow::Context;
use axum::http::Request;
use clap::Parser;
use killwatch_core::HealthMonitor;
use killwatch_core::metrics::{init_metrics, start_metrics_server};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tower_http::trace::TraceLayer;
use tracing::Level;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use killwatch_bot::{
    Config, EsiClient, KillmailPoller, MatrixClient, MessageFormatter, NotificationSender,
    RedisqClient, ReferenceCache, router,
};

/// Killwatch - zKillboard to Matrix notification bot.
#[derive(Parser, Debug)]
#[command(name = "killwatch")]
#[command(about = "Posts zKillboard killmails for watched corporations and alliances to Matrix")]
#[command(version)]
struct Args {
    /// Path to .env file (optional).
    #[arg(long, env = "DOTENV_PATH", default_value = ".env")]
    dotenv: String,

    /// Prometheus metrics port (0 to disable)
    #[arg(long, env = "KILLWATCH_METRICS_PORT", default_value = "9090")]
    metrics_port: u16,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    if std::path::Path::new(&args.dotenv).exists() {
        dotenvy::from_path(&args.dotenv)?;
        eprintln!("Loaded environment from {}", args.dotenv);
    }

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,killwatch_bot=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = Config::from_env()?;

    if args.metrics_port > 0 {
        let metrics_handle = init_metrics();
        start_metrics_server(args.metrics_port, metrics_handle).await?;
    }

    let health = Arc::new(HealthMonitor::new());

    // Health server
    let app = router(Arc::clone(&health)).layer(TraceLayer::new_for_http().make_span_with(
        |request: &Request<_>| {
            tracing::span!(
                Level::DEBUG,
                "http_request",
                method = %request.method(),
                path = %request.uri().path(),
            )
        },
    ));
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind health server to {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "health server listening");
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!(error = %e, "health server stopped");
        }
    });

    // Graceful shutdown
    let running = Arc::new(AtomicBool::new(true));
    let running_clone = Arc::clone(&running);
    ctrlc::set_handler(move || {
        tracing::info!("Shutdown signal received, stopping after the current poll...");
        running_clone.store(false, Ordering::SeqCst);
    })
    .context("Failed to set Ctrl+C handler")?;

    // Pipeline
    let esi = EsiClient::new(
        &config.esi_base_url,
        &config.image_base_url,
        &config.user_agent,
    )?;
    let chat = Arc::new(MatrixClient::new(
        &config.matrix.homeserver_url,
        &config.matrix.access_token,
        &config.user_agent,
    )?);
    let feed = RedisqClient::new(&config.redisq_url, &config.queue_id, &config.user_agent)?;

    let cache = Arc::new(ReferenceCache::new(esi, Arc::clone(&health)));
    let formatter = MessageFormatter::new(cache, Arc::clone(&chat));
    let sender = NotificationSender::new(chat, config.matrix.room_id.clone(), Arc::clone(&health));

    tracing::info!("Starting zKillboard RedisQ listener...");
    if config.watchlist.is_empty() {
        tracing::info!("Watching all killmails");
    } else {
        tracing::info!("Watching {} entities", config.watchlist.len());
    }
    tracing::info!("Using queue ID: {}", feed.queue_id());

    let poller = KillmailPoller::new(
        feed,
        config.watchlist.clone(),
        formatter,
        sender,
        Arc::clone(&health),
        config.poll,
        running,
    );

    let stats = poller.run().await.context("RedisQ polling stopped")?;

    tracing::info!("Polling complete:");
    tracing::info!("  Polls: {}", stats.polls);
    tracing::info!("  Killmails received: {}", stats.received);
    tracing::info!("  Relevant: {}", stats.relevant);
    tracing::info!("  Delivered: {}", stats.delivered);

    Ok(())
}
