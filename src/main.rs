use std::env;
use std::sync::Arc;

use dotenv::dotenv;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use feed_pilot::core::clock::SystemClock;
use feed_pilot::core::scheduler::{Deps, Scheduler};
use feed_pilot::memory::JsonFileStore;
use feed_pilot::providers::relay::LoggingRelay;
use feed_pilot::providers::replay::{ReplayPage, TracingPresenter};

const REPLAY_BATCH: usize = 5;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    if let Err(e) = dotenv() {
        eprintln!("Error loading .env file: {}", e);
    }

    let subscriber = FmtSubscriber::builder()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let account = env::var("ENGAGE_ACCOUNT")
        .map_err(|_| anyhow::anyhow!("ENGAGE_ACCOUNT not set"))?
        .trim()
        .to_string();
    let timeline = env::var("ENGAGE_TIMELINE").map_err(|_| anyhow::anyhow!("ENGAGE_TIMELINE not set"))?;
    let storage_dir = env::var("ENGAGE_STORAGE_DIR").unwrap_or_else(|_| "./storage".to_string());

    info!("=== Starting feed pilot (dry run) ===");
    info!("Account: {}", account);
    info!("Timeline: {}", timeline);
    info!("Storage: {}", storage_dir);

    let deps = Deps {
        page: Arc::new(ReplayPage::from_file(&timeline, REPLAY_BATCH)?),
        relay: Arc::new(LoggingRelay::new("dry-run")),
        presenter: Arc::new(TracingPresenter),
        store: Arc::new(JsonFileStore::new(storage_dir)),
        clock: Arc::new(SystemClock),
    };
    let mut scheduler = Scheduler::new(deps, StdRng::from_entropy());

    let cancel = CancellationToken::new();
    let stop = cancel.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                warn!("Stop requested, finishing current action");
                stop.cancel();
            }
            Err(e) => error!("Failed to listen for ctrl-c: {}", e),
        }
    });

    let report = scheduler.run_session(&account, cancel).await?;
    info!(
        "Session {:?}: {}/{} items, {} replies, {} likes, {} retweets, {} follows",
        report.outcome,
        report.completed,
        report.target,
        report.totals.replies,
        report.totals.likes,
        report.totals.retweets,
        report.totals.follows,
    );

    Ok(())
}
