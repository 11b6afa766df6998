//! # Hot-score aggregation
//!
//! Batch job folding a window of engagement buckets into a decayed score per
//! thread. Each period is weighted by its 1-based position counted from the
//! oldest period, so the current day (or hour) weighs the window length.
//! Replies count `REPLY_MULTIPLIER` times a view.
//!
//! A run reads one bucket at a time, in order, and publishes only after every
//! read succeeded. Any failure leaves the previous ranking in place.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use domains::{
    parse_thread_field, Clock, CounterStore, RankedThread, RankingStore, RankingWindow, Result,
};
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Published { entries: usize },
    /// Another run of the same window was still in progress.
    Skipped,
}

pub struct HotScoreAggregator {
    counters: Arc<dyn CounterStore>,
    rankings: Arc<dyn RankingStore>,
    clock: Arc<dyn Clock>,
    daily_lock: Mutex<()>,
    weekly_lock: Mutex<()>,
}

impl HotScoreAggregator {
    pub fn new(
        counters: Arc<dyn CounterStore>,
        rankings: Arc<dyn RankingStore>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            counters,
            rankings,
            clock,
            daily_lock: Mutex::new(()),
            weekly_lock: Mutex::new(()),
        }
    }

    /// Recomputes one window and replaces its ranking set.
    pub async fn run(&self, window: RankingWindow) -> Result<RunOutcome> {
        let lock = match window {
            RankingWindow::Daily => &self.daily_lock,
            RankingWindow::Weekly => &self.weekly_lock,
        };
        let Ok(_guard) = lock.try_lock() else {
            info!(%window, "aggregation already running, skipping");
            return Ok(RunOutcome::Skipped);
        };

        let started = Instant::now();
        let ranking = match self.compute(window, self.clock.now()).await {
            Ok(ranking) => ranking,
            Err(e) => {
                error!(%window, error = %e, "aggregation aborted, previous ranking kept");
                return Err(e);
            }
        };

        if let Err(e) = self.rankings.replace_ranking(&window.key(), &ranking).await {
            error!(%window, error = %e, "failed to publish ranking");
            return Err(e);
        }

        info!(
            %window,
            entries = ranking.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "ranking published"
        );
        Ok(RunOutcome::Published { entries: ranking.len() })
    }

    /// Runs both windows. A failure in one does not stop the other.
    pub async fn run_all(&self) -> Vec<(RankingWindow, Result<RunOutcome>)> {
        let mut outcomes = Vec::with_capacity(RankingWindow::ALL.len());
        for window in RankingWindow::ALL {
            outcomes.push((window, self.run(window).await));
        }
        outcomes
    }

    /// Reads a published ranking, highest score first.
    pub async fn ranking(
        &self,
        window: RankingWindow,
        offset: usize,
        limit: usize,
    ) -> Result<Vec<RankedThread>> {
        self.rankings.read_ranking(&window.key(), offset, limit).await
    }

    /// Scores for `window` ending at `now`, without publishing them.
    pub async fn compute(&self, window: RankingWindow, now: DateTime<Utc>) -> Result<Vec<RankedThread>> {
        let mut totals: BTreeMap<Uuid, i64> = BTreeMap::new();

        for (bucket, weight) in window.buckets(now) {
            let key = bucket.to_string();
            let counts = self.counters.read_all(&key).await?;
            let factor = weight.saturating_mul(bucket.kind.multiplier());
            for (field, count) in counts {
                let Some(thread_id) = parse_thread_field(&field) else {
                    warn!(bucket = %key, %field, "ignoring unrecognised bucket field");
                    continue;
                };
                let total = totals.entry(thread_id).or_default();
                *total = total.saturating_add(count.saturating_mul(factor));
            }
        }

        Ok(rank(totals))
    }
}

/// Highest score first, ties by thread id. Threads without a positive score
/// are left out.
fn rank(totals: BTreeMap<Uuid, i64>) -> Vec<RankedThread> {
    let mut ranking: Vec<RankedThread> = totals
        .into_iter()
        .filter(|(_, score)| *score > 0)
        .map(|(thread_id, score)| RankedThread { thread_id, score })
        .collect();
    ranking.sort_by(|a, b| b.score.cmp(&a.score).then(a.thread_id.cmp(&b.thread_id)));
    ranking
}
