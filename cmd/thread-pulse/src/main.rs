//! # thread-pulse
//!
//! Worker that rebuilds the `hot:daily` and `hot:weekly` rankings.
//!
//! ```text
//! thread-pulse [run]    schedule both windows until Ctrl-C
//! thread-pulse once     rebuild both windows once and exit
//! thread-pulse migrate  apply the Postgres migrations (db-postgres)
//! ```

mod scheduler;
mod telemetry;

use std::sync::Arc;

use anyhow::bail;
use configs::Settings;
use domains::{Clock, CounterStore, RankingStore, SystemClock};
use services::{HotScoreAggregator, RunOutcome};
use tracing::{error, info};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let settings = Settings::load()?;
    telemetry::init(&settings.log);

    let command = std::env::args().nth(1).unwrap_or_else(|| "run".to_string());
    match command.as_str() {
        "run" | "once" => {
            let (counters, rankings) = engagement_store(&settings).await?;
            let clock: Arc<dyn Clock> = Arc::new(SystemClock);
            let aggregator = Arc::new(HotScoreAggregator::new(counters, rankings, clock));
            if command == "once" {
                run_once(&aggregator).await
            } else {
                scheduler::run(aggregator, &settings.scheduler).await
            }
        }
        "migrate" => migrate(&settings).await,
        other => bail!("unknown command `{other}` (expected run, once or migrate)"),
    }
}

async fn run_once(aggregator: &HotScoreAggregator) -> anyhow::Result<()> {
    let mut failed = 0;
    for (window, outcome) in aggregator.run_all().await {
        match outcome {
            Ok(RunOutcome::Published { entries }) => info!(%window, entries, "window rebuilt"),
            Ok(RunOutcome::Skipped) => info!(%window, "window skipped"),
            Err(e) => {
                error!(%window, error = %e, "window failed");
                failed += 1;
            }
        }
    }
    if failed > 0 {
        bail!("{failed} ranking window(s) failed");
    }
    Ok(())
}

#[cfg(feature = "redis")]
async fn engagement_store(
    settings: &Settings,
) -> anyhow::Result<(Arc<dyn CounterStore>, Arc<dyn RankingStore>)> {
    use secrecy::ExposeSecret;
    use storage_adapters::RedisEngagementStore;

    let store = Arc::new(RedisEngagementStore::connect(
        settings.redis.url.expose_secret(),
        settings.redis.pool_size,
    )?);
    store.ping().await?;
    info!(pool_size = settings.redis.pool_size, "connected to redis");
    let counters: Arc<dyn CounterStore> = store.clone();
    let rankings: Arc<dyn RankingStore> = store;
    Ok((counters, rankings))
}

#[cfg(not(feature = "redis"))]
async fn engagement_store(
    _settings: &Settings,
) -> anyhow::Result<(Arc<dyn CounterStore>, Arc<dyn RankingStore>)> {
    use storage_adapters::MemoryEngagementStore;

    tracing::warn!("built without redis, counters and rankings are process-local");
    let store = Arc::new(MemoryEngagementStore::new());
    let counters: Arc<dyn CounterStore> = store.clone();
    let rankings: Arc<dyn RankingStore> = store;
    Ok((counters, rankings))
}

#[cfg(feature = "db-postgres")]
async fn migrate(settings: &Settings) -> anyhow::Result<()> {
    use anyhow::Context;
    use secrecy::ExposeSecret;
    use storage_adapters::PgThreadRepo;

    let db = settings
        .database
        .as_ref()
        .context("the [database] section is required to migrate")?;
    let repo = PgThreadRepo::connect(db.url.expose_secret(), db.max_connections).await?;
    repo.migrate().await?;
    info!("migrations applied");
    Ok(())
}

#[cfg(not(feature = "db-postgres"))]
async fn migrate(_settings: &Settings) -> anyhow::Result<()> {
    bail!("built without the db-postgres feature")
}
