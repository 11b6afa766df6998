mod common;

use chrono::Duration;
use common::World;
use domains::{thread_field, BucketKey, DomainError, EventKind, RankedThread, RankingWindow};
use services::RunOutcome;

#[tokio::test]
async fn recent_reply_outweighs_older_reply() {
    let world = World::new();
    let thread = world.thread();

    world.activity.record_reply(thread.id).await;
    world.tick(Duration::days(1));
    world.activity.record_reply(thread.id).await;

    let aggregator = world.activity.aggregator();
    let outcome = aggregator.run(RankingWindow::Weekly).await.unwrap();
    assert_eq!(outcome, RunOutcome::Published { entries: 1 });

    // Today weighs 7, yesterday 6; replies count three times; the hourly
    // view slot of a reply is not part of the weekly window.
    let ranking = world.activity.get_ranking("weekly", 0, 10).await.unwrap();
    assert_eq!(ranking, vec![RankedThread { thread_id: thread.id, score: 3 * (7 + 6) }]);
}

#[tokio::test]
async fn daily_window_reads_hour_buckets() {
    let world = World::new();
    let thread = world.thread();

    world.activity.record_reply(thread.id).await;
    world.tick(Duration::days(1));
    world.activity.record_reply(thread.id).await;

    let aggregator = world.activity.aggregator();
    aggregator.run(RankingWindow::Daily).await.unwrap();

    // Only the current hour's view slot is inside the 24 hour window.
    let ranking = world.activity.get_ranking("hot:daily", 0, 10).await.unwrap();
    assert_eq!(ranking, vec![RankedThread { thread_id: thread.id, score: 24 }]);
}

#[tokio::test]
async fn views_and_replies_share_one_score() {
    let world = World::new();
    let viewed = world.thread();
    let replied = world.thread();

    for _ in 0..4 {
        world.activity.record_view(viewed.id).await;
    }
    world.activity.record_reply(replied.id).await;

    let aggregator = world.activity.aggregator();
    aggregator.run(RankingWindow::Weekly).await.unwrap();

    let ranking = world.activity.get_ranking("weekly", 0, 10).await.unwrap();
    assert_eq!(
        ranking,
        vec![
            RankedThread { thread_id: viewed.id, score: 4 * 7 },
            RankedThread { thread_id: replied.id, score: 3 * 7 },
        ]
    );
}

#[tokio::test]
async fn repeated_runs_produce_identical_rankings() {
    let world = World::new();
    let now = world.clock_now();
    for i in 0..6 {
        let thread = world.thread();
        let field = thread_field(thread.id);
        world.counters.set_value(&BucketKey::day(EventKind::View, now).to_string(), &field, i);
        world.counters.set_value(
            &BucketKey::day(EventKind::Reply, now - Duration::days(i)).to_string(),
            &field,
            6 - i,
        );
    }

    let aggregator = world.activity.aggregator();
    aggregator.run_all().await;
    let first = world.activity.get_ranking("weekly", 0, 100).await.unwrap();
    aggregator.run_all().await;
    let second = world.activity.get_ranking("weekly", 0, 100).await.unwrap();

    assert!(!first.is_empty());
    assert_eq!(first, second);
}

#[tokio::test]
async fn failed_run_keeps_previous_ranking() {
    let world = World::new();
    let thread = world.thread();
    world.activity.record_view(thread.id).await;

    let aggregator = world.activity.aggregator();
    aggregator.run(RankingWindow::Weekly).await.unwrap();
    let before = world.activity.get_ranking("weekly", 0, 10).await.unwrap();

    world.counters.set_available(false);
    let err = aggregator.run(RankingWindow::Weekly).await.unwrap_err();
    assert!(matches!(err, DomainError::StoreUnavailable(_)));
    world.counters.set_available(true);

    assert_eq!(world.activity.get_ranking("weekly", 0, 10).await.unwrap(), before);
}

#[tokio::test]
async fn ranking_is_fully_overwritten() {
    let world = World::new();
    let stale = world.thread();
    world.activity.record_view(stale.id).await;
    let aggregator = world.activity.aggregator();
    aggregator.run(RankingWindow::Weekly).await.unwrap();

    // Eight days later the old view has left the window.
    world.tick(Duration::days(8));
    let fresh = world.thread();
    world.activity.record_view(fresh.id).await;
    aggregator.run(RankingWindow::Weekly).await.unwrap();

    let ids: Vec<_> = world
        .activity
        .get_ranking("weekly", 0, 10)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.thread_id)
        .collect();
    assert_eq!(ids, vec![fresh.id]);
}

#[tokio::test]
async fn ranking_pages_by_offset_and_limit() {
    let world = World::new();
    let threads: Vec<_> = (0..5).map(|_| world.thread()).collect();
    for (i, thread) in threads.iter().enumerate() {
        for _ in 0..=i {
            world.activity.record_view(thread.id).await;
        }
    }
    world.activity.aggregator().run(RankingWindow::Weekly).await.unwrap();

    let page: Vec<_> = world
        .activity
        .get_ranking("weekly", 1, 2)
        .await
        .unwrap()
        .into_iter()
        .map(|r| r.thread_id)
        .collect();
    assert_eq!(page, vec![threads[3].id, threads[2].id]);
}

#[tokio::test]
async fn unknown_window_is_rejected() {
    let world = World::new();
    let err = world.activity.get_ranking("monthly", 0, 10).await.unwrap_err();
    assert!(matches!(err, DomainError::NotFound(..)));
}
