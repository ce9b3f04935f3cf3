mod common;

use azdir_lifecycle::{LifecycleError, NamedLocks, OperationContext};
use azdir_types::LockKey;
use std::sync::{Arc, Mutex};
use std::time::Duration;

fn unit(id: &str) -> LockKey {
    LockKey::new("azuread_administrative_unit", id)
}

#[tokio::test(start_paused = true)]
async fn same_key_is_exclusive() {
    common::init_tracing();
    let locks = Arc::new(NamedLocks::new());
    let log = Arc::new(Mutex::new(Vec::new()));

    let mut handles = Vec::new();
    for worker in 0..3 {
        let locks = Arc::clone(&locks);
        let log = Arc::clone(&log);
        handles.push(tokio::spawn(async move {
            let _guard = locks.acquire(&unit("au-1")).await;
            log.lock().unwrap().push(format!("enter {worker}"));
            tokio::time::sleep(Duration::from_millis(100)).await;
            log.lock().unwrap().push(format!("exit {worker}"));
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let log = log.lock().unwrap();
    assert_eq!(log.len(), 6);
    for pair in log.chunks(2) {
        let worker = pair[0].strip_prefix("enter ").unwrap();
        assert_eq!(pair[1], format!("exit {worker}"));
    }
}

#[tokio::test(start_paused = true)]
async fn disjoint_keys_do_not_block() {
    let locks = NamedLocks::new();
    let _held = locks.acquire(&unit("au-1")).await;

    let other = tokio::time::timeout(Duration::from_millis(1), locks.acquire(&unit("au-2"))).await;
    assert!(other.is_ok());
    assert_eq!(locks.len().await, 2);
}

#[tokio::test(start_paused = true)]
async fn released_on_drop() {
    let locks = NamedLocks::new();
    {
        let guard = locks.acquire(&unit("au-1")).await;
        assert_eq!(guard.key(), &unit("au-1"));
    }
    let again = tokio::time::timeout(Duration::from_millis(1), locks.acquire(&unit("au-1"))).await;
    assert!(again.is_ok());
}

#[tokio::test(start_paused = true)]
async fn expired_context_fails_without_waiting() {
    let locks = NamedLocks::new();
    let ctx = OperationContext::with_timeout(Duration::ZERO);

    let err = locks.acquire_until(&unit("au-1"), &ctx).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockTimeout { ref key } if *key == unit("au-1")));
    assert!(err.is_timeout());
}

#[tokio::test(start_paused = true)]
async fn deadline_bounds_the_wait() {
    let locks = NamedLocks::new();
    let held = locks.acquire(&unit("au-1")).await;

    let ctx = OperationContext::with_timeout(Duration::from_secs(1));
    let err = locks.acquire_until(&unit("au-1"), &ctx).await.unwrap_err();
    assert!(matches!(err, LifecycleError::LockTimeout { .. }));

    held.unlock();
    let ctx = OperationContext::with_timeout(Duration::from_secs(1));
    assert!(locks.acquire_until(&unit("au-1"), &ctx).await.is_ok());
}

#[tokio::test]
async fn registry_starts_empty() {
    let locks = NamedLocks::new();
    assert!(locks.is_empty().await);
    drop(locks.acquire(&unit("au-1")).await);
    assert_eq!(locks.len().await, 1);
}
