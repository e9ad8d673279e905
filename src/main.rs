use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

use forum_digest::chat::{deliver_all, ChatSink, DiscordClient, StdoutSink};
use forum_digest::checkpoint::{checkpoint_layer, read_checkpoint, record_success};
use forum_digest::config::Config;
use forum_digest::digest::build_digest;
use forum_digest::fetch::HttpFetcher;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    if let Err(e) = run().await {
        if tracing::dispatcher::has_been_set() {
            error!("Fatal error: {e:#}");
        } else {
            eprintln!("Fatal error: {e:#}");
        }
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let config = Config::from_env().context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    init_tracing(&config.checkpoint_log_path)?;

    let checkpoint = read_checkpoint(&config.checkpoint_log_path, config.checkpoint_fallback_days)
        .await
        .context("Failed to read checkpoint")?;

    info!(
        root = %config.forum_root_url,
        %checkpoint,
        dry_run = config.dry_run,
        "Starting forum-digest"
    );

    let fetcher = HttpFetcher::from_config(&config).context("Failed to build HTTP client")?;
    let crawl_started = Utc::now();

    let digest = tokio::select! {
        digest = build_digest(fetcher, &config, checkpoint) => {
            digest.context("Forum crawl failed")?
        }
        () = shutdown_signal() => {
            anyhow::bail!("Interrupted before delivery");
        }
    };

    info!(
        posts = digest.posts.len(),
        since = %digest.checkpoint,
        "Crawl complete"
    );

    if digest.should_deliver(&config) {
        deliver(&config, &digest.messages(&config)).await?;
    } else {
        info!("No new posts, nothing to deliver");
    }

    // Dry runs report without consuming the posts.
    if !config.dry_run {
        record_success(crawl_started, digest.posts.len(), digest.checkpoint);
    }

    Ok(())
}

async fn deliver(config: &Config, messages: &[String]) -> Result<()> {
    let (sink, channel): (Box<dyn ChatSink>, &str) = if config.dry_run {
        (
            Box::new(StdoutSink),
            config.discord_channel_id.as_deref().unwrap_or("dry-run"),
        )
    } else {
        let token = config
            .discord_bot_token
            .as_deref()
            .context("DISCORD_BOT_TOKEN is not set")?;
        let channel = config
            .discord_channel_id
            .as_deref()
            .context("DISCORD_CHANNEL_ID is not set")?;
        let client =
            DiscordClient::from_config(config, token).context("Failed to build chat client")?;
        (Box::new(client), channel)
    };

    deliver_all(sink.as_ref(), channel, messages)
        .await
        .context("Failed to deliver digest")
}

fn init_tracing(log_path: &Path) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,forum_digest=debug"));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    if use_json {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().json().with_filter(filter))
            .with(checkpoint_layer(log_path))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(tracing_subscriber::fmt::layer().with_filter(filter))
            .with(checkpoint_layer(log_path))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to install Ctrl+C handler: {e}");
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
                warn!("Failed to install signal handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }
}
