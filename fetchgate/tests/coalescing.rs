//! Concurrent callers of one resource share a single fetch.

mod support;

use std::time::Duration;

use fetchgate::{CacheStatus, InterceptError, Interceptor, UnobservedFetch};
use fetchgate_core::{FetchError, ManualClock};
use http::StatusCode;
use pretty_assertions::assert_eq;

use support::*;

const MINUTE: Duration = Duration::from_secs(60);
const LATENCY: Duration = Duration::from_millis(50);

#[tokio::test(start_paused = true)]
async fn concurrent_callers_share_one_fetch() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let tasks: Vec<_> = (0..5)
        .map(|_| tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL))))
        .collect();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(interceptor.coalescer().waiter_count(&key(EXPERIMENT_URL)), 5);

    for task in tasks {
        let result = task.await.unwrap().unwrap();
        assert_eq!(result.status, CacheStatus::Miss);
        assert_eq!(body(&result), "A");
    }
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(store.writes(), 1);
    assert_eq!(interceptor.coalescer().in_flight(), 0);
}

/// Request at t=0 starts fetch F (settles at 50 ms); a second request at
/// t=10 ms attaches to F instead of fetching again.
#[tokio::test(start_paused = true)]
async fn late_caller_attaches_to_running_fetch() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("F");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);
    let started = tokio::time::Instant::now();

    let first = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    let second = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));

    let first = first.await.unwrap().unwrap();
    let second = second.await.unwrap().unwrap();
    // Settled once, at F's deadline; the late caller did not wait another 50 ms.
    assert!(started.elapsed() < LATENCY + Duration::from_millis(10));
    assert_eq!(body(&first), "F");
    assert_eq!(body(&second), "F");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn entry_is_written_before_waiters_wake() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    interceptor.intercept(get(EXPERIMENT_URL)).await.unwrap();
    let entry = store.entry(&key(EXPERIMENT_URL)).unwrap();
    assert_eq!(entry.response().body().as_ref(), b"A");
}

#[tokio::test(start_paused = true)]
async fn failure_reaches_every_waiter_and_is_not_cached() {
    let fetcher = ScriptedFetcher::new(LATENCY)
        .then(Err(FetchError::status(StatusCode::SERVICE_UNAVAILABLE)));
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let tasks: Vec<_> = (0..3)
        .map(|_| tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL))))
        .collect();
    for task in tasks {
        let error = task.await.unwrap().unwrap_err();
        assert!(matches!(
            error,
            InterceptError::Fetch(FetchError::Status { status }) if status == StatusCode::SERVICE_UNAVAILABLE
        ));
    }
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(store.len(), 0);
    assert_eq!(interceptor.coalescer().in_flight(), 0);

    // The failure is not remembered: the next request fetches again.
    let retry = interceptor.intercept(get(EXPERIMENT_URL)).await.unwrap();
    assert_eq!(retry.status, CacheStatus::Miss);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_caller_leaves_the_others() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let mut aborts = Vec::new();
    let mut tasks = Vec::new();
    for _ in 0..3 {
        let interception = interceptor.intercept(get(EXPERIMENT_URL));
        aborts.push(interception.abort_handle());
        tasks.push(tokio::spawn(interception));
    }
    tokio::time::sleep(Duration::from_millis(10)).await;
    aborts[1].abort();
    tokio::time::sleep(Duration::from_millis(1)).await;
    assert_eq!(interceptor.coalescer().waiter_count(&key(EXPERIMENT_URL)), 2);

    let mut results = Vec::new();
    for task in tasks {
        results.push(task.await.unwrap());
    }
    assert!(results[1].as_ref().unwrap_err().is_aborted());
    assert_eq!(body(results[0].as_ref().unwrap()), "A");
    assert_eq!(body(results[2].as_ref().unwrap()), "A");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn cancel_yields_aborted() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let mut first = interceptor.intercept(get(EXPERIMENT_URL));
    let second = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));

    // Drive the first caller until it has joined the fetch.
    assert!(tokio::time::timeout(Duration::from_millis(5), &mut first).await.is_err());
    first.cancel();

    let error = first.await.unwrap_err();
    assert!(matches!(error, InterceptError::Aborted));
    assert_eq!(body(&second.await.unwrap().unwrap()), "A");
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropped_caller_detaches() {
    let fetcher = ScriptedFetcher::new(LATENCY);
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);
    let key = key(EXPERIMENT_URL);

    let mut first = interceptor.intercept(get(EXPERIMENT_URL));
    let _ = tokio::time::timeout(Duration::from_millis(5), &mut first).await;
    let mut second = interceptor.intercept(get(EXPERIMENT_URL));
    let _ = tokio::time::timeout(Duration::from_millis(5), &mut second).await;
    assert_eq!(interceptor.coalescer().waiter_count(&key), 2);

    drop(first);
    assert_eq!(interceptor.coalescer().waiter_count(&key), 1);
    assert!(second.await.is_ok());
}

#[tokio::test(start_paused = true)]
async fn unobserved_fetch_still_fills_the_cache() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let mut only = interceptor.intercept(get(EXPERIMENT_URL));
    let _ = tokio::time::timeout(Duration::from_millis(5), &mut only).await;
    only.cancel();
    assert!(only.await.unwrap_err().is_aborted());

    tokio::time::sleep(LATENCY).await;
    assert_eq!(store.len(), 1);

    let hit = interceptor.intercept(get(EXPERIMENT_URL)).await.unwrap();
    assert_eq!((hit.status, body(&hit)), (CacheStatus::Hit, "A"));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn abort_policy_drops_unobserved_fetch() {
    let fetcher = ScriptedFetcher::new(LATENCY);
    let store = MemoryStore::default();
    let interceptor = Interceptor::builder()
        .fetcher(fetcher.clone())
        .store(store.clone())
        .clock(ManualClock::new())
        .routes(routes(MINUTE))
        .unobserved(UnobservedFetch::Abort)
        .build();

    let mut only = interceptor.intercept(get(EXPERIMENT_URL));
    let _ = tokio::time::timeout(Duration::from_millis(5), &mut only).await;
    only.cancel();
    assert_eq!(interceptor.coalescer().in_flight(), 0);

    tokio::time::sleep(LATENCY * 2).await;
    assert_eq!(store.len(), 0);

    let next = interceptor.intercept(get(EXPERIMENT_URL)).await.unwrap();
    assert_eq!(next.status, CacheStatus::Miss);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test(start_paused = true)]
async fn zero_max_age_still_coalesces() {
    let fetcher = ScriptedFetcher::new(LATENCY);
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, Duration::ZERO);

    let (a, b) = tokio::join!(
        interceptor.intercept(get(EXPERIMENT_URL)),
        interceptor.intercept(get(EXPERIMENT_URL)),
    );
    assert_eq!(body(&a.unwrap()), body(&b.unwrap()));
    assert_eq!(fetcher.calls(), 1);
}

#[tokio::test(start_paused = true)]
async fn distinct_keys_fetch_in_parallel() {
    let fetcher = ScriptedFetcher::new(LATENCY);
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);
    let other = EXPERIMENT_URL.replace("exp-1", "exp-2");

    let (a, b) = tokio::join!(
        interceptor.intercept(get(EXPERIMENT_URL)),
        interceptor.intercept(get(&other)),
    );
    assert!(a.is_ok() && b.is_ok());
    assert_eq!(fetcher.calls(), 2);
    assert_eq!(store.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn parallel_workers_start_one_fetch() {
    let fetcher = ScriptedFetcher::new(Duration::from_millis(100));
    let store = MemoryStore::default();
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let tasks: Vec<_> = (0..32)
        .map(|_| tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL))))
        .collect();
    for task in tasks {
        assert_eq!(body(&task.await.unwrap().unwrap()), "response 1");
    }
    assert_eq!(fetcher.calls(), 1);
}

/// Reads take 100 ms, the fetch 50 ms. A request arriving while the fetch is
/// in flight attaches to it even though its own read would outlast it.
#[tokio::test(start_paused = true)]
async fn caller_arriving_mid_fetch_attaches_despite_slow_reads() {
    let fetcher = ScriptedFetcher::new(LATENCY).then_body("A");
    let store = MemoryStore::default().with_read_latency(Duration::from_millis(100));
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let first = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));
    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(interceptor.coalescer().is_pending(&key(EXPERIMENT_URL)));
    let second = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));

    assert_eq!(body(&first.await.unwrap().unwrap()), "A");
    assert_eq!(body(&second.await.unwrap().unwrap()), "A");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(store.writes(), 1);
}

/// Both reads start before any fetch; the second read ends after the first
/// caller's fetch has settled. The second caller finds the fresh entry
/// instead of fetching again.
#[tokio::test(start_paused = true)]
async fn read_overlapping_a_settled_fetch_does_not_fetch_again() {
    let fetcher = ScriptedFetcher::new(Duration::from_millis(5)).then_body("A");
    let store = MemoryStore::default().with_read_latency(Duration::from_millis(100));
    let clock = ManualClock::new();
    let interceptor = interceptor(&fetcher, &store, &clock, MINUTE);

    let first = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));
    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(!interceptor.coalescer().is_pending(&key(EXPERIMENT_URL)));
    let second = tokio::spawn(interceptor.intercept(get(EXPERIMENT_URL)));

    assert_eq!(body(&first.await.unwrap().unwrap()), "A");
    assert_eq!(body(&second.await.unwrap().unwrap()), "A");
    assert_eq!(fetcher.calls(), 1);
    assert_eq!(store.writes(), 1);
}
