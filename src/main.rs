use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use reqwest::redirect::Policy;
use std::path::PathBuf;
use tokio::sync::mpsc;
use websub_subscriber::hub::HubReply;
use websub_subscriber::server;
use websub_subscriber::util::NetworkPolicy;
use websub_subscriber::{
    CallbackUrls, Config, ContentNotification, Database, DatabaseError, Discoverer, Subscriber,
    SubscriptionFilter, SubscriptionRequest, SubscriptionStore,
};

/// Get the config directory path (~/.config/websub-subscriber/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("websub-subscriber"))
}

/// Redirect policy for topic fetches and hub requests.
///
/// - Limits redirects to 5 hops
/// - Detects redirect loops (same URL appearing twice in chain)
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 5 {
            return attempt.error("Too many redirects (max 5)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

#[derive(Parser, Debug)]
#[command(
    name = "websub-subscriber",
    version,
    about = "WebSub subscriber: hub discovery, subscription handshake and notification intake"
)]
struct Args {
    /// Config file (defaults to ~/.config/websub-subscriber/config.toml)
    #[arg(long, global = true, value_name = "FILE", env = "WEBSUB_CONFIG")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the callback and subscription HTTP server
    Serve,
    /// Subscribe to a topic, discovering its hub unless one is given
    Subscribe {
        topic: String,
        /// Hub to use instead of the topic's advertised one
        #[arg(long)]
        hub: Option<String>,
        /// Lease to request from the hub
        #[arg(long)]
        lease_seconds: Option<i64>,
    },
    /// Unsubscribe a callback from a topic
    Unsubscribe { callback: String, topic: String },
    /// Print stored subscriptions
    List,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "websub_subscriber=info,tower_http=info".into()),
        )
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .with_env_overrides();

    let db_path = config.database_path_in(&config_dir);
    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            std::fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create database directory {}", parent.display())
            })?;
        }
    }
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            anyhow::bail!(
                "Database {} is locked by another process",
                db_path.display()
            );
        }
        Err(e) => return Err(e).context("Failed to open database"),
    };

    let client = reqwest::Client::builder()
        .redirect(create_redirect_policy())
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .user_agent(concat!("websub-subscriber/", env!("CARGO_PKG_VERSION")))
        .build()
        .context("Failed to build HTTP client")?;
    let policy = if config.allow_private_networks {
        NetworkPolicy::ALLOW_PRIVATE
    } else {
        NetworkPolicy::PUBLIC_ONLY
    };
    let discoverer = Discoverer::new(client)
        .with_timeout(config.request_timeout())
        .with_max_body_bytes(config.max_body_bytes)
        .with_network_policy(policy);
    let subscriber = Subscriber::new(
        db,
        discoverer,
        CallbackUrls::new(&config.host, &config.path_prefix),
    );

    match args.command {
        Command::Serve => serve(&config, subscriber).await,
        Command::Subscribe {
            topic,
            hub,
            lease_seconds,
        } => {
            let request = match hub {
                Some(hub) => SubscriptionRequest::SubscribeWithHub {
                    topic,
                    hub,
                    lease_seconds,
                },
                None => SubscriptionRequest::SubscribeWithDiscovery {
                    topic,
                    lease_seconds,
                },
            };
            send(&subscriber, request).await
        }
        Command::Unsubscribe { callback, topic } => {
            send(&subscriber, SubscriptionRequest::Unsubscribe { topic, callback }).await
        }
        Command::List => list(subscriber.store()).await,
    }
}

async fn serve(config: &Config, subscriber: Subscriber<Database>) -> Result<()> {
    let (tx, mut rx) = mpsc::channel::<ContentNotification>(64);

    tokio::spawn(async move {
        while let Some(notification) = rx.recv().await {
            tracing::info!(
                subscription_id = notification.subscription_id,
                topic = %notification.topic,
                content_type = ?notification.content_type,
                bytes = notification.body.len(),
                "Content received"
            );
        }
    });

    server::serve(config, subscriber.with_notifications(tx))
        .await
        .with_context(|| format!("HTTP server on {} failed", config.listen_addr))
}

async fn send(subscriber: &Subscriber<Database>, request: SubscriptionRequest) -> Result<()> {
    let outcome = subscriber
        .subscribe(request)
        .await
        .context("Subscription request failed")?;

    match outcome.reply {
        HubReply::Accepted => {
            println!(
                "{} accepted by {}; awaiting verification at {}",
                outcome.request.mode, outcome.subscription.hub, outcome.subscription.callback
            );
            Ok(())
        }
        HubReply::Rejected { status, body } => {
            anyhow::bail!(
                "Hub {} answered {}: {}",
                outcome.subscription.hub,
                status,
                String::from_utf8_lossy(&body)
            )
        }
    }
}

async fn list(store: &Database) -> Result<()> {
    let subscriptions = store
        .list(&SubscriptionFilter::default())
        .await
        .context("Failed to list subscriptions")?;

    if subscriptions.is_empty() {
        println!("No subscriptions.");
        return Ok(());
    }

    let pending = subscriptions.iter().filter(|s| s.state.is_pending()).count();
    for sub in subscriptions {
        println!(
            "{:>4}  {:<22}  {}  via {}  -> {}{}",
            sub.id,
            sub.state.as_str(),
            sub.topic,
            sub.hub,
            sub.callback,
            sub.expired_at
                .and_then(|at| chrono::DateTime::from_timestamp(at, 0))
                .map(|at| format!("  (expires {})", at.format("%Y-%m-%d %H:%M UTC")))
                .unwrap_or_default()
        );
    }
    if pending > 0 {
        println!("{pending} awaiting hub verification");
    }
    Ok(())
}
