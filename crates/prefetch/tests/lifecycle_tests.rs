//! Cancellation, cleanup and kill-switch behaviour through the manager

use serial_test::serial;
use std::time::Duration;
use warmup_core::constants::WARMUP_PREFETCH_DISABLED_VAR;
use warmup_prefetch::{
    AdmissionDecision, CancellationToken, PrefetchOptions, PrefetchOutcome, PrefetchRequest,
    PrefetchSource, PrefetchStatus, ResourceKey,
};

mod common;
use common::{never_resolves, CountingProducer, EnvGuard, Harness};

fn key(name: &str) -> ResourceKey {
    ResourceKey::new(name).unwrap()
}

#[tokio::test(start_paused = true)]
async fn external_token_aborts_before_settling() {
    let h = Harness::new();
    let external = CancellationToken::new();

    let handle = h.manager.warm_route(
        never_resolves(),
        key("routes/report"),
        PrefetchSource::Viewport,
        PrefetchOptions::new().with_cancellation(external.clone()),
    );
    tokio::time::sleep(Duration::from_millis(5)).await;
    external.cancel();

    assert!(matches!(handle.completion().await, PrefetchOutcome::Aborted(_)));
    assert_eq!(
        h.manager.tracker().get(&key("routes/report")).unwrap().status,
        PrefetchStatus::Aborted
    );
    assert!(!handle.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn external_token_after_settling_changes_nothing() {
    let h = Harness::new();
    let external = CancellationToken::new();
    let producer = CountingProducer::new();

    let handle = h.manager.warm_route(
        producer.shared(),
        key("routes/report"),
        PrefetchSource::Viewport,
        PrefetchOptions::new().with_cancellation(external.clone()),
    );
    assert_eq!(handle.completion().await, PrefetchOutcome::Completed);

    external.cancel();
    tokio::task::yield_now().await;
    let entry = h.manager.tracker().get(&key("routes/report")).unwrap();
    assert_eq!(entry.status, PrefetchStatus::Completed);
    assert_eq!(entry.error, None);
}

#[tokio::test(start_paused = true)]
async fn prefetch_by_key_honours_options() {
    let h = Harness::new();
    let producer = CountingProducer::new();
    h.manager.register_prefetch("routes/home", producer.shared()).unwrap();

    let handle = h
        .manager
        .prefetch_by_key(
            "routes/home",
            PrefetchSource::Hover,
            Some(PrefetchOptions::new().with_ttl(Duration::from_secs(2))),
        )
        .unwrap();
    handle.completion().await;

    assert!(h.manager.is_prefetch_fresh("routes/home", None));
    tokio::time::advance(Duration::from_millis(2_001)).await;
    assert!(!h.manager.is_prefetch_fresh("routes/home", None));
    assert!(h.manager.prefetch_by_key("routes/unknown", PrefetchSource::Hover, None).is_none());
}

#[tokio::test(start_paused = true)]
async fn idle_cleanup_drops_completed_entries_after_four_ttls() {
    let ttl = Duration::from_millis(500);
    let h = Harness::with_ttl(ttl);
    let producer = CountingProducer::new();

    h.manager
        .prefetch(PrefetchRequest::new(key("routes/home"), producer.shared(), PrefetchSource::Nav))
        .completion()
        .await;
    assert_eq!(h.idle.pending_count(), 1);

    tokio::time::advance(ttl * 4).await;
    h.idle.run_pending();
    assert_eq!(h.manager.entries().len(), 1);

    tokio::time::advance(Duration::from_millis(1)).await;
    h.idle.run_pending();
    assert!(h.manager.entries().is_empty());
    assert_eq!(h.idle.pending_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn touch_updates_last_hit_only() {
    let h = Harness::new();
    let producer = CountingProducer::new();
    h.manager
        .prefetch(PrefetchRequest::new(key("routes/home"), producer.shared(), PrefetchSource::Nav))
        .completion()
        .await;
    let before = h.manager.tracker().get(&key("routes/home")).unwrap();

    tokio::time::advance(Duration::from_millis(300)).await;
    assert!(h.manager.touch_prefetch("routes/home"));

    let after = h.manager.tracker().get(&key("routes/home")).unwrap();
    assert_eq!(after.last_hit_at_ms, before.last_hit_at_ms + 300);
    assert_eq!(after.status, PrefetchStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn stats_reflect_outcomes() {
    let h = Harness::new();
    let producer = CountingProducer::new();

    h.manager
        .prefetch(PrefetchRequest::new(key("ok"), producer.shared(), PrefetchSource::Nav))
        .completion()
        .await;
    h.manager.guard().update_overrides(|o| o.online = Some(false));
    h.manager
        .prefetch(PrefetchRequest::new(key("offline"), producer.shared(), PrefetchSource::Nav));

    let stats = h.manager.stats();
    assert_eq!(stats.total, 2);
    assert_eq!(stats.completed, 1);
    assert_eq!(stats.skipped, 1);
}

#[tokio::test(start_paused = true)]
#[serial]
async fn environment_kill_switch_is_read_per_decision() {
    let h = Harness::new();
    h.manager.guard().clear_overrides();
    let producer = CountingProducer::new();

    {
        let _env = EnvGuard::set(WARMUP_PREFETCH_DISABLED_VAR, "1");
        assert_eq!(h.manager.guard().decide(PrefetchSource::Hover), AdmissionDecision::Disabled);
        let handle = h
            .manager
            .prefetch(PrefetchRequest::new(key("routes/home"), producer.shared(), PrefetchSource::Hover));
        assert_eq!(handle.outcome(), Some(PrefetchOutcome::Skipped));
    }

    {
        let _env = EnvGuard::set(WARMUP_PREFETCH_DISABLED_VAR, "0");
        assert!(h.manager.guard().can_prefetch(PrefetchSource::Hover));
    }
    assert_eq!(producer.calls(), 0);
}
