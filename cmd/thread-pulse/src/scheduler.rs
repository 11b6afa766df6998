//! Fixed-cadence trigger for the aggregation runs.

use std::sync::Arc;
use std::time::Duration;

use configs::SchedulerSettings;
use domains::RankingWindow;
use services::HotScoreAggregator;
use tokio::time::{interval, MissedTickBehavior};
use tracing::info;

/// Runs until Ctrl-C. Each run is spawned so a slow window never delays the
/// other; overlapping runs of one window are skipped by the aggregator.
pub async fn run(aggregator: Arc<HotScoreAggregator>, settings: &SchedulerSettings) -> anyhow::Result<()> {
    let mut daily = interval(Duration::from_secs(settings.daily_every_secs));
    let mut weekly = interval(Duration::from_secs(settings.weekly_every_secs));
    daily.set_missed_tick_behavior(MissedTickBehavior::Skip);
    weekly.set_missed_tick_behavior(MissedTickBehavior::Skip);

    if !settings.run_on_start {
        // The first tick of an interval completes immediately.
        daily.tick().await;
        weekly.tick().await;
    }

    info!(
        daily_every_secs = settings.daily_every_secs,
        weekly_every_secs = settings.weekly_every_secs,
        "scheduler started"
    );

    loop {
        tokio::select! {
            _ = daily.tick() => spawn_run(aggregator.clone(), RankingWindow::Daily),
            _ = weekly.tick() => spawn_run(aggregator.clone(), RankingWindow::Weekly),
            res = tokio::signal::ctrl_c() => {
                res?;
                info!("shutdown requested");
                return Ok(());
            }
        }
    }
}

fn spawn_run(aggregator: Arc<HotScoreAggregator>, window: RankingWindow) {
    // Failures are logged by the aggregator and never stop the scheduler.
    tokio::spawn(async move {
        let _ = aggregator.run(window).await;
    });
}
