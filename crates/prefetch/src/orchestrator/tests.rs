use super::*;
use crate::idle::{IdleScheduler, ManualIdleRunner};
use crate::network::{NetworkSnapshot, SharedNetworkSource};
use std::sync::atomic::{AtomicUsize, Ordering};

const TTL: Duration = Duration::from_secs(60);

fn orchestrator_with(snapshot: NetworkSnapshot) -> PrefetchOrchestrator {
    let guard = NetworkGuard::new(Arc::new(SharedNetworkSource::new(snapshot)), false);
    guard.update_overrides(|o| o.disabled = Some(false));
    let tracker = PrefetchTracker::new(
        IdleScheduler::with_runner(Arc::new(ManualIdleRunner::new())),
        TTL,
        Duration::from_secs(1),
    );
    PrefetchOrchestrator::new(tracker, Arc::new(guard), Handle::current())
}

fn orchestrator() -> PrefetchOrchestrator {
    orchestrator_with(NetworkSnapshot::default())
}

fn key(name: &str) -> ResourceKey {
    ResourceKey::new(name).unwrap()
}

fn counting_ok(calls: &Arc<AtomicUsize>) -> SharedProducer {
    let calls = Arc::clone(calls);
    producer(move |_token: CancellationToken| {
        calls.fetch_add(1, Ordering::SeqCst);
        async { anyhow::Ok(()) }
    })
}

fn never_resolves() -> SharedProducer {
    producer(|_token: CancellationToken| std::future::pending::<anyhow::Result<()>>())
}

fn request(name: &str, producer: SharedProducer, source: PrefetchSource) -> PrefetchRequest {
    PrefetchRequest::new(key(name), producer, source)
}

#[tokio::test(start_paused = true)]
async fn test_success_completes_entry() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));

    let handle = orchestrator.prefetch(request("routes/home", counting_ok(&calls), PrefetchSource::Nav));
    assert!(!handle.reused());
    assert_eq!(handle.completion().await, PrefetchOutcome::Completed);

    let entry = orchestrator.tracker().get(&key("routes/home")).unwrap();
    assert_eq!(entry.status, PrefetchStatus::Completed);
    assert_eq!(entry.error, None);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(orchestrator.active_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn test_second_call_within_ttl_is_reused() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));

    let first = orchestrator.prefetch(request("R1", counting_ok(&calls), PrefetchSource::Nav).with_ttl(TTL));
    first.completion().await;

    let second = orchestrator.prefetch(request("R1", counting_ok(&calls), PrefetchSource::Hover).with_ttl(TTL));
    assert!(second.reused());
    assert_eq!(second.outcome(), Some(PrefetchOutcome::Reused));
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    let entry = orchestrator.tracker().get(&key("R1")).unwrap();
    assert_eq!(entry.status, PrefetchStatus::Reused);
    assert_eq!(entry.source, PrefetchSource::Hover);
}

#[tokio::test(start_paused = true)]
async fn test_expired_entry_is_fetched_again() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));
    let ttl = Duration::from_millis(100);

    orchestrator
        .prefetch(request("routes/home", counting_ok(&calls), PrefetchSource::Nav).with_ttl(ttl))
        .completion()
        .await;
    tokio::time::advance(Duration::from_millis(101)).await;

    let handle = orchestrator.prefetch(request("routes/home", counting_ok(&calls), PrefetchSource::Nav).with_ttl(ttl));
    assert!(!handle.reused());
    handle.completion().await;
    assert_eq!(calls.load(Ordering::SeqCst), 2);
}

#[tokio::test(start_paused = true)]
async fn test_denied_admission_skips_without_calling_producer() {
    let orchestrator = orchestrator_with(NetworkSnapshot::default().with_save_data(true));
    let calls = Arc::new(AtomicUsize::new(0));

    let handle = orchestrator.prefetch(request("R2", counting_ok(&calls), PrefetchSource::Idle));
    assert!(!handle.reused());
    assert_eq!(handle.completion().await, PrefetchOutcome::Skipped);

    assert_eq!(orchestrator.tracker().get(&key("R2")).unwrap().status, PrefetchStatus::Skipped);
    assert_eq!(calls.load(Ordering::SeqCst), 0);
}

#[tokio::test(start_paused = true)]
async fn test_zero_ttl_request_reuses_within_default_window() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));
    let zero = || request("routes/home", counting_ok(&calls), PrefetchSource::Nav).with_ttl(Duration::ZERO);

    assert_eq!(orchestrator.prefetch(zero()).completion().await, PrefetchOutcome::Completed);
    assert_eq!(
        orchestrator.tracker().get(&key("routes/home")).unwrap().ttl_ms,
        TTL.as_millis() as u64
    );

    tokio::time::advance(Duration::from_secs(30)).await;
    assert!(orchestrator.prefetch(zero()).reused());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test(start_paused = true)]
async fn test_producer_failure_is_recorded_not_raised() {
    let orchestrator = orchestrator();
    let failing = producer(|_token: CancellationToken| async { Err::<(), _>(anyhow::anyhow!("chunk load failed")) });

    let handle = orchestrator.prefetch(request("routes/broken", failing, PrefetchSource::Nav));
    assert_eq!(
        handle.completion().await,
        PrefetchOutcome::Failed("chunk load failed".to_string())
    );

    let entry = orchestrator.tracker().get(&key("routes/broken")).unwrap();
    assert_eq!(entry.status, PrefetchStatus::Error);
    assert_eq!(entry.error.as_deref(), Some("chunk load failed"));
}

#[tokio::test(start_paused = true)]
async fn test_producer_panic_is_an_error() {
    let orchestrator = orchestrator();
    let panicking = producer(|_token: CancellationToken| async {
        if true {
            panic!("loader bug");
        }
        anyhow::Ok(())
    });

    let handle = orchestrator.prefetch(request("routes/panic", panicking, PrefetchSource::Nav));
    assert_eq!(
        handle.completion().await,
        PrefetchOutcome::Failed("producer panicked".to_string())
    );
    assert_eq!(
        orchestrator.tracker().get(&key("routes/panic")).unwrap().status,
        PrefetchStatus::Error
    );
}

#[tokio::test(start_paused = true)]
async fn test_abort_by_key() {
    let orchestrator = orchestrator();

    let handle = orchestrator.prefetch(request("R3", never_resolves(), PrefetchSource::Hover));
    tokio::task::yield_now().await;
    assert_eq!(orchestrator.tracker().get(&key("R3")).unwrap().status, PrefetchStatus::Pending);

    assert!(orchestrator.abort_prefetch(&key("R3")));
    assert!(matches!(handle.completion().await, PrefetchOutcome::Aborted(_)));

    let entry = orchestrator.tracker().get(&key("R3")).unwrap();
    assert_eq!(entry.status, PrefetchStatus::Aborted);
    assert_eq!(entry.error.as_deref(), Some(ABORT_REASON));
    assert!(!orchestrator.abort_prefetch(&key("R3")));
}

#[tokio::test(start_paused = true)]
async fn test_cancel_through_handle() {
    let orchestrator = orchestrator();
    let handle = orchestrator.prefetch(request("routes/slow", never_resolves(), PrefetchSource::Nav));

    handle.cancel();
    assert!(handle.is_cancelled());
    assert!(matches!(handle.completion().await, PrefetchOutcome::Aborted(_)));
    assert_eq!(
        orchestrator.tracker().get(&key("routes/slow")).unwrap().status,
        PrefetchStatus::Aborted
    );
}

#[tokio::test(start_paused = true)]
async fn test_producer_error_after_cancellation_counts_as_abort() {
    let orchestrator = orchestrator();
    let cooperative = producer(|token: CancellationToken| async move {
        token.cancelled().await;
        Err::<(), _>(anyhow::anyhow!("request interrupted"))
    });

    let handle = orchestrator.prefetch(request("routes/coop", cooperative, PrefetchSource::Nav));
    handle.cancel();
    assert!(matches!(handle.completion().await, PrefetchOutcome::Aborted(_)));
}

#[tokio::test(start_paused = true)]
async fn test_external_token_propagates_one_way() {
    let orchestrator = orchestrator();
    let external = CancellationToken::new();

    let handle = orchestrator.prefetch(
        request("routes/ext", never_resolves(), PrefetchSource::Viewport).with_cancellation(external.clone()),
    );
    external.cancel();
    assert!(matches!(handle.completion().await, PrefetchOutcome::Aborted(_)));

    // Cancelling the attempt never reaches back to the caller's token
    let other = CancellationToken::new();
    let handle = orchestrator.prefetch(
        request("routes/ext2", never_resolves(), PrefetchSource::Viewport).with_cancellation(other.clone()),
    );
    handle.cancel();
    handle.completion().await;
    assert!(!other.is_cancelled());
}

#[tokio::test(start_paused = true)]
async fn test_cancel_after_completion_has_no_effect() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));
    let external = CancellationToken::new();

    let handle = orchestrator.prefetch(
        request("routes/done", counting_ok(&calls), PrefetchSource::Nav).with_cancellation(external.clone()),
    );
    handle.completion().await;

    external.cancel();
    handle.cancel();
    assert!(!orchestrator.abort_prefetch(&key("routes/done")));
    assert_eq!(
        orchestrator.tracker().get(&key("routes/done")).unwrap().status,
        PrefetchStatus::Completed
    );
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_requests_are_not_coalesced() {
    let orchestrator = orchestrator();
    let calls = Arc::new(AtomicUsize::new(0));
    let slow = {
        let calls = Arc::clone(&calls);
        producer(move |_token: CancellationToken| {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                tokio::time::sleep(Duration::from_millis(50)).await;
                anyhow::Ok(())
            }
        })
    };

    let first = orchestrator.prefetch(request("R5", Arc::clone(&slow), PrefetchSource::Nav));
    let second = orchestrator.prefetch(request("R5", slow, PrefetchSource::Hover));
    assert_eq!(calls.load(Ordering::SeqCst), 2);
    assert!(second.attempt() > first.attempt());

    // Cancelling the displaced attempt leaves the newer one running
    first.cancel();
    assert_eq!(second.completion().await, PrefetchOutcome::Completed);
    first.completion().await;

    let entry = orchestrator.tracker().get(&key("R5")).unwrap();
    assert_eq!(entry.attempt, second.attempt().unwrap());
    assert_eq!(entry.status, PrefetchStatus::Completed);
    assert_eq!(entry.source, PrefetchSource::Hover);
}

#[tokio::test(start_paused = true)]
async fn test_superseded_abort_does_not_touch_newer_entry() {
    let orchestrator = orchestrator();

    let first = orchestrator.prefetch(request("R5", never_resolves(), PrefetchSource::Nav));
    let second = orchestrator.prefetch(request("R5", never_resolves(), PrefetchSource::Nav));

    // Abort by key hits the newest registration only
    orchestrator.abort_prefetch(&key("R5"));
    assert!(matches!(second.completion().await, PrefetchOutcome::Aborted(_)));
    assert!(!first.is_finished());
    assert_eq!(orchestrator.tracker().get(&key("R5")).unwrap().status, PrefetchStatus::Aborted);
}
