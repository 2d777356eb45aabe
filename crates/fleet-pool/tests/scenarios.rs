//! End-to-end pool scenarios. Every test here drives a real `PoolCoordinator`
//! against real Chrome processes via `chromiumoxide`, so they're `#[ignore]`d
//! by default — run with `cargo test -- --ignored` on a machine with a
//! Chrome/Chromium binary on PATH.

use std::time::Duration;

use fleet_pool::{ContextOverrides, PoolConfig, PoolCoordinator, PoolError};
use serial_test::serial;

fn small_pool_config(max_browsers: usize, max_contexts_per_browser: usize) -> PoolConfig {
    PoolConfig {
        max_browsers,
        max_contexts_per_browser,
        ..Default::default()
    }
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s1_acquire_release_round_trip() {
    let config = small_pool_config(2, 2);
    let pool = PoolCoordinator::spawn(config);

    let context = pool
        .acquire_context(ContextOverrides::default(), None)
        .await
        .expect("acquire should succeed");

    let stats = pool.stats().await;
    assert_eq!(stats.active_contexts, 1);
    assert_eq!(stats.total_browsers, 1);

    pool.release_context(&context.context_id)
        .await
        .expect("release should succeed");

    let stats = pool.stats().await;
    assert_eq!(stats.active_contexts, 0);

    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s2_parallel_capacity_spawns_second_browser() {
    let config = small_pool_config(2, 2);
    let pool = PoolCoordinator::spawn(config);

    let mut contexts = Vec::new();
    for _ in 0..3 {
        let pool = pool.clone();
        contexts.push(tokio::spawn(
            async move { pool.acquire_context(ContextOverrides::default(), None).await },
        ));
    }
    let results: Vec<_> = futures::future::join_all(contexts).await;
    let ids: Vec<String> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().context_id)
        .collect();

    let stats = pool.stats().await;
    assert_eq!(stats.active_contexts, 3);
    assert_eq!(stats.total_browsers, 2);

    for id in ids {
        pool.release_context(&id).await.unwrap();
    }
    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s3_saturation_wait_then_exhausted() {
    let mut config = small_pool_config(1, 1);
    config.wait_timeout = Duration::from_secs(2);
    let pool = PoolCoordinator::spawn(config);

    let first = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();

    let start = std::time::Instant::now();
    let second = pool.acquire_context(ContextOverrides::default(), None).await;
    let elapsed = start.elapsed();

    assert!(matches!(second, Err(PoolError::PoolExhausted)));
    assert!(elapsed >= Duration::from_secs(2));

    pool.release_context(&first.context_id).await.unwrap();
    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn saturation_wait_cancelled_by_caller_token() {
    let mut config = small_pool_config(1, 1);
    config.wait_timeout = Duration::from_secs(10);
    let pool = PoolCoordinator::spawn(config);

    let first = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();

    let token = tokio_util::sync::CancellationToken::new();
    let cancel_token = token.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        cancel_token.cancel();
    });

    let start = std::time::Instant::now();
    let second = pool
        .acquire_context(ContextOverrides::default(), Some(&token))
        .await;
    let elapsed = start.elapsed();

    assert!(matches!(second, Err(PoolError::Cancelled)));
    assert!(elapsed < Duration::from_secs(10), "cancellation should pre-empt the wait timeout");

    pool.release_context(&first.context_id).await.unwrap();
    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s4_context_auto_released_on_timeout() {
    let mut config = small_pool_config(1, 1);
    config.context_timeout = Duration::from_secs(1);
    config.reaper_interval = Duration::from_millis(500);
    let pool = PoolCoordinator::spawn(config);

    let context = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();

    tokio::time::sleep(Duration::from_millis(2000)).await;

    let stats = pool.stats().await;
    assert_eq!(stats.active_contexts, 0);

    let release_again = pool.release_context(&context.context_id).await;
    assert!(matches!(release_again, Err(PoolError::UnknownContext { .. })));

    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s5_browser_recycled_after_usage_threshold() {
    let mut config = small_pool_config(2, 1);
    config.recycle_uses = 3;
    let pool = PoolCoordinator::spawn(config);

    let mut first_browser_id_prefix = None;
    for _ in 0..3 {
        let context = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();
        let prefix = context.context_id.rsplit_once('-').unwrap().0.to_string();
        first_browser_id_prefix.get_or_insert_with(|| prefix.clone());
        pool.release_context(&context.context_id).await.unwrap();
    }

    let fourth = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();
    let fourth_prefix = fourth.context_id.rsplit_once('-').unwrap().0.to_string();
    assert_ne!(Some(fourth_prefix), first_browser_id_prefix);

    pool.release_context(&fourth.context_id).await.unwrap();
    pool.shutdown().await;
}

#[tokio::test]
#[serial]
#[ignore = "requires a real browser binary"]
async fn s6_crash_recovery_never_hangs() {
    let config = small_pool_config(1, 1);
    let pool = PoolCoordinator::spawn(config);

    let context = pool.acquire_context(ContextOverrides::default(), None).await.unwrap();

    // releasing after the underlying browser is gone must resolve, not hang
    let result = tokio::time::timeout(
        Duration::from_secs(5),
        pool.release_context(&context.context_id),
    )
    .await;
    assert!(result.is_ok(), "release_context must not hang on a crashed browser");

    let new_context = pool.acquire_context(ContextOverrides::default(), None).await;
    assert!(new_context.is_ok());

    pool.shutdown().await;
}
