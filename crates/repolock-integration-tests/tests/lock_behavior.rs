//! Cross-handle lock behavior: contention, expiry, timeouts, fault
//! injection and the scoped helper.
//!
//! Time-driven tests run with the tokio clock paused so backoff sleeps
//! auto-advance; tests that depend on record expiry use short real waits,
//! since expiry is wall-clock time shared across processes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use repolock::{LockError, LockHandle, LockOptions, MemoryStore, TransactionalStore};
use repolock_integration_tests::memory_client;

#[tokio::test(start_paused = true)]
async fn test_mutual_exclusion_under_contention() {
    let store: Arc<dyn TransactionalStore> = Arc::new(MemoryStore::new());
    let in_critical_section = Arc::new(AtomicBool::new(false));
    let completed = Arc::new(AtomicU32::new(0));

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let store = store.clone();
        let flag = in_critical_section.clone();
        let completed = completed.clone();
        tasks.push(tokio::spawn(async move {
            let lock =
                LockHandle::new(store, "ns", "shared-resource", LockOptions::default()).unwrap();
            assert!(lock.acquire().await);
            assert!(
                !flag.swap(true, Ordering::SeqCst),
                "two holders entered the critical section"
            );
            tokio::time::sleep(Duration::from_millis(10)).await;
            flag.store(false, Ordering::SeqCst);
            assert!(lock.release().await.unwrap());
            completed.fetch_add(1, Ordering::SeqCst);
        }));
    }
    for task in tasks {
        task.await.unwrap();
    }
    assert_eq!(completed.load(Ordering::SeqCst), 8);
}

#[tokio::test(start_paused = true)]
async fn test_a_simultaneous_race_has_a_single_winner() {
    let store: Arc<dyn TransactionalStore> = Arc::new(MemoryStore::new());
    let options = LockOptions {
        acquire_timeout: Duration::from_secs(1),
        ..Default::default()
    };
    let first = LockHandle::new(store.clone(), "ns", "res", options).unwrap();
    let second = LockHandle::new(store.clone(), "ns", "res", options).unwrap();

    let (a, b) = tokio::join!(first.acquire(), second.acquire());
    assert_eq!(u32::from(a) + u32::from(b), 1);
}

#[tokio::test]
async fn test_an_expired_lock_is_reclaimable_without_release() {
    let store: Arc<dyn TransactionalStore> = Arc::new(MemoryStore::new());
    let short_lived = LockOptions {
        lock_duration: Duration::from_millis(20),
        ..Default::default()
    };
    let first = LockHandle::new(store.clone(), "ns", "res", short_lived).unwrap();
    assert!(first.acquire().await);

    tokio::time::sleep(Duration::from_millis(30)).await;

    let second = LockHandle::new(store.clone(), "ns", "res", LockOptions::default()).unwrap();
    assert!(!second.peek().await);
    assert!(second.acquire().await);
    assert!(second.release().await.unwrap());
}

#[tokio::test(start_paused = true)]
async fn test_acquire_times_out_against_a_held_lock() {
    let store: Arc<dyn TransactionalStore> = Arc::new(MemoryStore::new());
    let holder = LockHandle::new(
        store.clone(),
        "ns",
        "res",
        LockOptions {
            lock_duration: Duration::from_secs(60),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(holder.acquire().await);

    let timeout = Duration::from_secs(5);
    let contender = LockHandle::new(
        store.clone(),
        "ns",
        "res",
        LockOptions {
            acquire_timeout: timeout,
            ..Default::default()
        },
    )
    .unwrap();

    let start = tokio::time::Instant::now();
    assert!(!contender.acquire().await);
    let elapsed = start.elapsed();
    // Bounded by the timeout plus at most one capped backoff sleep.
    assert!(elapsed >= timeout);
    assert!(elapsed < timeout + Duration::from_secs(12));
}

#[tokio::test(start_paused = true)]
async fn test_acquire_retries_through_transient_commit_failures() {
    let store = Arc::new(MemoryStore::new());
    store.fail_next_commits(2);

    let lock = LockHandle::new(store.clone(), "ns", "res", LockOptions::default()).unwrap();
    assert!(lock.acquire().await);
    assert!(lock.peek().await);
}

#[tokio::test]
async fn test_release_reports_transient_failure_and_recovers() {
    let store = Arc::new(MemoryStore::new());
    let lock = LockHandle::new(store.clone(), "ns", "res", LockOptions::default()).unwrap();
    assert!(lock.acquire().await);

    store.fail_next_commits(1);
    assert!(!lock.release().await.unwrap());
    // The record is still there; a second release succeeds.
    assert!(lock.peek().await);
    assert!(lock.release().await.unwrap());
    assert!(!lock.peek().await);
}

#[tokio::test]
async fn test_with_lock_runs_work_and_releases() {
    let (_, client) = memory_client();

    let value = client
        .with_lock("ns", "res", LockOptions::default(), || async {
            Ok::<_, anyhow::Error>(42)
        })
        .await
        .unwrap();
    assert_eq!(value, 42);

    let handle = client.handle("ns", "res", LockOptions::default()).unwrap();
    assert!(!handle.peek().await);
}

#[tokio::test]
async fn test_with_lock_releases_after_work_errors() {
    let (_, client) = memory_client();

    let result: anyhow::Result<()> = client
        .with_lock("ns", "res", LockOptions::default(), || async {
            anyhow::bail!("work blew up")
        })
        .await;
    assert_eq!(result.unwrap_err().to_string(), "work blew up");

    // The original error propagated and the lock was still released.
    let handle = client.handle("ns", "res", LockOptions::default()).unwrap();
    assert!(!handle.peek().await);
}

#[tokio::test(start_paused = true)]
async fn test_with_lock_surfaces_acquisition_timeout() {
    let (store, client) = memory_client();

    let holder = LockHandle::new(
        store.clone(),
        "ns",
        "res",
        LockOptions {
            lock_duration: Duration::from_secs(60),
            ..Default::default()
        },
    )
    .unwrap();
    assert!(holder.acquire().await);

    let result: anyhow::Result<()> = client
        .with_lock(
            "ns",
            "res",
            LockOptions {
                acquire_timeout: Duration::from_secs(1),
                ..Default::default()
            },
            || async { Ok::<(), anyhow::Error>(()) },
        )
        .await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::AcquireTimeout { .. })
    ));
}

#[tokio::test]
async fn test_with_lock_surfaces_a_stolen_lock() {
    let (store, client) = memory_client();

    let thief_store = store.clone();
    let result: anyhow::Result<()> = client
        .with_lock(
            "ns",
            "res",
            LockOptions {
                lock_duration: Duration::ZERO,
                ..Default::default()
            },
            || async move {
                // Let the zero-duration record expire, then steal the key.
                tokio::time::sleep(Duration::from_millis(5)).await;
                let thief =
                    LockHandle::new(thief_store, "ns", "res", LockOptions::default()).unwrap();
                assert!(thief.acquire().await);
                Ok::<(), anyhow::Error>(())
            },
        )
        .await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::Ownership { .. })
    ));
}

#[tokio::test]
async fn test_with_lock_rejects_bad_configuration() {
    let (_, client) = memory_client();

    let result: anyhow::Result<()> = client
        .with_lock(
            "ns",
            "res",
            LockOptions {
                lock_duration: Duration::from_secs(61),
                ..Default::default()
            },
            || async { Ok::<(), anyhow::Error>(()) },
        )
        .await;
    let err = result.unwrap_err();
    assert!(matches!(
        err.downcast_ref::<LockError>(),
        Some(LockError::Configuration { .. })
    ));
}
