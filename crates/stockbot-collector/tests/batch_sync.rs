//! 배치 동기화 통합 테스트
//!
//! 메모리 기반 저장소로 코디네이터, 워커 풀, 상태 기록을 함께 검증한다.

use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use stockbot_collector::modules::{
    failed_markets, split_into_batches, BatchOutcome, BatchPersister, BatchSyncCoordinator,
    BatchWorkerPool, StockSyncService, SyncStatusRecorder,
};
use stockbot_collector::provider::ReferenceDataProvider;
use stockbot_collector::repository::{
    StockSymbolRepository, SyncStatusRepository, TradeDateRepository,
};
use stockbot_collector::{
    CollectorError, Market, Result, StockSymbol, SuccessPolicy, SyncConfig, SyncStatus, TradeDate,
};
use tokio_util::sync::CancellationToken;

/// upsert 시 `last_success_at`이 None이면 기존 값을 유지하는 상태 저장소
#[derive(Default)]
struct InMemoryStatusRepo {
    rows: Mutex<HashMap<String, SyncStatus>>,
}

impl InMemoryStatusRepo {
    fn get(&self, market: &str) -> Option<SyncStatus> {
        self.rows.lock().unwrap().get(market).cloned()
    }
}

#[async_trait]
impl SyncStatusRepository for InMemoryStatusRepo {
    async fn get_by_market(&self, market: &str) -> Result<Option<SyncStatus>> {
        Ok(self.get(market))
    }

    async fn upsert(&self, status: &SyncStatus) -> Result<()> {
        let mut rows = self.rows.lock().unwrap();
        let previous_success = rows.get(&status.market).and_then(|s| s.last_success_at);
        let mut next = status.clone();
        next.last_success_at = next.last_success_at.or(previous_success);
        rows.insert(status.market.clone(), next);
        Ok(())
    }
}

/// 첫 레코드 값으로 실패할 배치를 지정할 수 있는 저장 구현
#[derive(Default)]
struct RecordingPersister {
    calls: AtomicUsize,
    fail_batches_starting_with: Vec<u32>,
    cancel_on_first_call: Option<CancellationToken>,
    delay_per_item_ms: u64,
}

#[async_trait]
impl BatchPersister<u32> for RecordingPersister {
    async fn persist_batch(&self, batch: &[u32], _token: &CancellationToken) -> BatchOutcome {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call == 0 {
            if let Some(token) = &self.cancel_on_first_call {
                token.cancel();
            }
        }
        if self.delay_per_item_ms > 0 {
            let delay = self.delay_per_item_ms * u64::from(batch[0] % 7 + 1);
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        if self.fail_batches_starting_with.contains(&batch[0]) {
            BatchOutcome::failed(batch.len(), CollectorError::Other("upsert failed".into()))
        } else {
            BatchOutcome::succeeded(batch.len())
        }
    }
}

fn coordinator(repo: Arc<InMemoryStatusRepo>, policy: SuccessPolicy) -> BatchSyncCoordinator {
    let config = SyncConfig {
        success_policy: policy,
        ..SyncConfig::default()
    };
    BatchSyncCoordinator::new(&config, SyncStatusRecorder::new(repo, policy))
}

#[tokio::test]
async fn test_partial_batch_failure_does_not_abort_sync() {
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);
    let persister = Arc::new(RecordingPersister {
        fail_batches_starting_with: vec![100],
        ..Default::default()
    });

    let outcome = coordinator
        .sync_market(
            "TW",
            |_| async { Ok((0..250).collect::<Vec<u32>>()) },
            persister.clone(),
            &CancellationToken::new(),
        )
        .await
        .expect("fetch succeeded, sync must succeed");

    assert_eq!(persister.calls.load(Ordering::SeqCst), 3);
    assert_eq!(outcome.fetched, 250);
    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.failed_batches, 1);
    assert_eq!(outcome.total_success, 150);
    assert_eq!(outcome.total_error, 100);

    let status = repo.get("TW").unwrap();
    assert_eq!(status.total_count, 150);
    assert!(status.last_success_at.is_some());
    assert_eq!(status.last_error, None);
}

#[tokio::test]
async fn test_fetch_failure_is_fatal_and_keeps_last_success() {
    let repo = Arc::new(InMemoryStatusRepo::default());
    let previous_success = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    repo.upsert(&SyncStatus {
        market: "US".to_string(),
        last_sync_at: Some(previous_success),
        last_success_at: Some(previous_success),
        last_error: None,
        total_count: 9000,
    })
    .await
    .unwrap();

    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);
    let persister = Arc::new(RecordingPersister::default());

    let err = coordinator
        .sync_market(
            "US",
            |_| async { Err::<Vec<u32>, _>(CollectorError::DataSource("provider down".into())) },
            persister.clone(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CollectorError::DataSource(_)));
    assert_eq!(persister.calls.load(Ordering::SeqCst), 0);

    let status = repo.get("US").unwrap();
    assert_eq!(status.last_success_at, Some(previous_success));
    assert!(status.last_sync_at.unwrap() > previous_success);
    assert!(status.last_error.unwrap().contains("provider down"));
    assert_eq!(status.total_count, 0);
}

#[tokio::test]
async fn test_fetch_failure_without_history_leaves_success_unset() {
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);

    let result = coordinator
        .sync_market(
            "TW",
            |_| async { Err::<Vec<u32>, _>(CollectorError::DataSource("timeout".into())) },
            Arc::new(RecordingPersister::default()),
            &CancellationToken::new(),
        )
        .await;

    assert!(result.is_err());
    assert_eq!(repo.get("TW").unwrap().last_success_at, None);
}

#[tokio::test]
async fn test_strict_policy_records_batch_errors() {
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::NoBatchErrors);
    let persister = Arc::new(RecordingPersister {
        fail_batches_starting_with: vec![0],
        ..Default::default()
    });

    let result = coordinator
        .sync_market(
            "TW",
            |_| async { Ok((0..120).collect::<Vec<u32>>()) },
            persister,
            &CancellationToken::new(),
        )
        .await;

    // 배치 실패는 여전히 치명적이지 않다
    assert!(result.is_ok());
    let status = repo.get("TW").unwrap();
    assert_eq!(status.last_success_at, None);
    assert!(status.last_error.is_some());
    assert_eq!(status.total_count, 20);
}

#[tokio::test(start_paused = true)]
async fn test_totals_independent_of_completion_order() {
    let pool = BatchWorkerPool::new(5);
    let persister = Arc::new(RecordingPersister {
        fail_batches_starting_with: vec![30, 90],
        delay_per_item_ms: 10,
        ..Default::default()
    });

    let batches = split_into_batches((0..1000).collect::<Vec<u32>>(), 10);
    let outcome = pool
        .run(batches, persister.clone(), &CancellationToken::new())
        .await;

    assert_eq!(persister.calls.load(Ordering::SeqCst), 100);
    assert_eq!(outcome.batches, 100);
    assert_eq!(outcome.failed_batches, 2);
    assert_eq!(outcome.total_success, 980);
    assert_eq!(outcome.total_error, 20);
}

#[tokio::test]
async fn test_cancellation_stops_new_batches() {
    let token = CancellationToken::new();
    let pool = BatchWorkerPool::new(1);
    let persister = Arc::new(RecordingPersister {
        cancel_on_first_call: Some(token.clone()),
        ..Default::default()
    });

    let batches = split_into_batches((0..500).collect::<Vec<u32>>(), 100);
    let outcome = pool.run(batches, persister.clone(), &token).await;

    // 이미 꺼낸 첫 배치는 끝까지 처리되고 보고된다
    assert_eq!(persister.calls.load(Ordering::SeqCst), 1);
    assert_eq!(outcome.batches, 1);
    assert_eq!(outcome.total_success, 100);
    assert!(outcome.cancelled);
}

#[tokio::test]
async fn test_cancellation_with_many_workers_joins_pool() {
    let token = CancellationToken::new();
    let pool = BatchWorkerPool::new(5);
    let persister = Arc::new(RecordingPersister {
        cancel_on_first_call: Some(token.clone()),
        ..Default::default()
    });

    let batches = split_into_batches((0..5000).collect::<Vec<u32>>(), 100);
    let outcome = pool.run(batches, persister.clone(), &token).await;

    let calls = persister.calls.load(Ordering::SeqCst);
    assert!(calls >= 1 && calls <= 5, "calls = {}", calls);
    assert_eq!(outcome.batches, calls);
    assert_eq!(outcome.total_success, calls * 100);
    assert!(outcome.cancelled);
}

#[tokio::test]
async fn test_cancellation_during_batches_is_not_a_hard_error() {
    let token = CancellationToken::new();
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);
    let persister = Arc::new(RecordingPersister {
        cancel_on_first_call: Some(token.clone()),
        ..Default::default()
    });

    let outcome = coordinator
        .sync_market(
            "TW",
            |_| async { Ok((0..1000).collect::<Vec<u32>>()) },
            persister.clone(),
            &token,
        )
        .await
        .expect("fetch succeeded, cancellation is reported per batch");

    assert!(outcome.cancelled);
    assert_eq!(outcome.fetched, 1000);
    assert!(outcome.total_success < 1000);
    assert_eq!(outcome.failed_batches, 0);

    let status = repo.get("TW").unwrap();
    assert!(status.last_success_at.is_some());
    assert_eq!(status.last_error, None);
    assert_eq!(status.total_count, outcome.total_success as i64);
}

#[tokio::test]
async fn test_strict_policy_records_cancelled_run() {
    let token = CancellationToken::new();
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::NoBatchErrors);
    let persister = Arc::new(RecordingPersister {
        cancel_on_first_call: Some(token.clone()),
        ..Default::default()
    });

    let outcome = coordinator
        .sync_market(
            "US",
            |_| async { Ok((0..1000).collect::<Vec<u32>>()) },
            persister,
            &token,
        )
        .await
        .unwrap();
    assert!(outcome.cancelled);

    let status = repo.get("US").unwrap();
    assert_eq!(status.last_success_at, None);
    assert_eq!(status.last_error.as_deref(), Some("Operation cancelled"));
}

#[tokio::test]
async fn test_already_cancelled_sync_skips_fetch() {
    let token = CancellationToken::new();
    token.cancel();
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);
    let persister = Arc::new(RecordingPersister::default());
    let fetch_calls = Arc::new(AtomicUsize::new(0));

    let calls = fetch_calls.clone();
    let err = coordinator
        .sync_market(
            "TW",
            move |_| async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok((0..100).collect::<Vec<u32>>())
            },
            persister.clone(),
            &token,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(fetch_calls.load(Ordering::SeqCst), 0);
    assert_eq!(persister.calls.load(Ordering::SeqCst), 0);
    assert!(repo.get("TW").is_none());
}

#[tokio::test]
async fn test_fetch_receives_run_token() {
    let token = CancellationToken::new();
    let repo = Arc::new(InMemoryStatusRepo::default());
    let coordinator = coordinator(repo.clone(), SuccessPolicy::FetchSucceeded);
    let persister = Arc::new(RecordingPersister::default());

    // 조회 도중 취소되면 조회 실패로 처리되고 배치는 실행되지 않는다
    let canceller = token.clone();
    let err = coordinator
        .sync_market(
            "TW",
            move |fetch_token| async move {
                canceller.cancel();
                if fetch_token.is_cancelled() {
                    return Err(CollectorError::Cancelled);
                }
                Ok((0..100).collect::<Vec<u32>>())
            },
            persister.clone(),
            &token,
        )
        .await
        .unwrap_err();

    assert!(err.is_cancelled());
    assert_eq!(persister.calls.load(Ordering::SeqCst), 0);
    let status = repo.get("TW").unwrap();
    assert_eq!(status.last_success_at, None);
    assert_eq!(status.last_error.as_deref(), Some("Operation cancelled"));
}

// ==================== StockSyncService ====================

struct FakeProvider {
    fail_market: Option<Market>,
}

#[async_trait]
impl ReferenceDataProvider for FakeProvider {
    async fn fetch_stock_info(
        &self,
        market: Market,
        token: &CancellationToken,
    ) -> Result<Vec<StockSymbol>> {
        if token.is_cancelled() {
            return Err(CollectorError::Cancelled);
        }
        if self.fail_market == Some(market) {
            return Err(CollectorError::DataSource(format!("{} unavailable", market)));
        }
        Ok((0..130)
            .map(|i| StockSymbol::new(format!("{:04}", 1000 + i), format!("stock {}", i), market))
            .collect())
    }

    async fn fetch_taiwan_trading_dates(&self, _token: &CancellationToken) -> Result<Vec<TradeDate>> {
        let start = chrono::NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        Ok((0..250)
            .map(|i| TradeDate {
                date: start + chrono::Duration::days(i),
            })
            .collect())
    }
}

#[derive(Default)]
struct InMemoryStore {
    symbols: Mutex<HashMap<(String, Market), String>>,
    dates: Mutex<Vec<TradeDate>>,
}

#[async_trait]
impl StockSymbolRepository for InMemoryStore {
    async fn batch_upsert(&self, symbols: &[StockSymbol], _token: &CancellationToken) -> BatchOutcome {
        let mut store = self.symbols.lock().unwrap();
        for s in symbols {
            store.insert((s.symbol.clone(), s.market), s.name.clone());
        }
        BatchOutcome::succeeded(symbols.len())
    }

    async fn market_stats(&self) -> Result<HashMap<String, i64>> {
        let mut stats = HashMap::new();
        for (_, market) in self.symbols.lock().unwrap().keys() {
            *stats.entry(market.code().to_string()).or_insert(0) += 1;
        }
        Ok(stats)
    }
}

#[async_trait]
impl TradeDateRepository for InMemoryStore {
    async fn batch_insert(&self, dates: &[TradeDate], _token: &CancellationToken) -> BatchOutcome {
        self.dates.lock().unwrap().extend_from_slice(dates);
        BatchOutcome::succeeded(dates.len())
    }
}

fn service(fail_market: Option<Market>) -> (StockSyncService, Arc<InMemoryStore>) {
    let store = Arc::new(InMemoryStore::default());
    let recorder = SyncStatusRecorder::new(
        Arc::new(InMemoryStatusRepo::default()),
        SuccessPolicy::FetchSucceeded,
    );
    let service = StockSyncService::new(
        BatchSyncCoordinator::new(&SyncConfig::default(), recorder),
        Arc::new(FakeProvider { fail_market }),
        store.clone(),
        store.clone(),
    );
    (service, store)
}

#[tokio::test]
async fn test_one_market_failure_does_not_block_the_next() {
    let (service, _store) = service(Some(Market::Taiwan));
    let token = CancellationToken::new();

    let results = service.sync_markets(&Market::ALL, &token).await;
    assert_eq!(results.len(), 2);
    assert!(results[0].1.is_err());
    assert_eq!(results[1].1.as_ref().unwrap().total_success, 130);
    assert_eq!(failed_markets(&results), vec![Market::Taiwan]);

    let stats = service.get_sync_stats().await.unwrap();
    assert_eq!(stats.get("US"), Some(&130));
    assert_eq!(stats.get("TW"), None);

    let tw = service.get_sync_status(Market::Taiwan).await.unwrap().unwrap();
    assert!(!tw.is_healthy());
    let us = service.get_sync_status(Market::Us).await.unwrap().unwrap();
    assert!(us.is_healthy());
    assert_eq!(us.total_count, 130);
}

#[tokio::test]
async fn test_trading_dates_sync_uses_batches() {
    let (service, store) = service(None);

    let outcome = service
        .sync_taiwan_trading_dates(&CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome.batches, 3);
    assert_eq!(outcome.total_success, 250);
    assert_eq!(store.dates.lock().unwrap().len(), 250);
    // 거래일 동기화는 상태 레코드를 남기지 않는다
    assert!(service.get_sync_status(Market::Taiwan).await.unwrap().is_none());
}

#[tokio::test]
async fn test_cancelled_service_skips_remaining_markets() {
    let (service, _store) = service(None);
    let token = CancellationToken::new();
    token.cancel();

    let results = service.sync_markets(&Market::ALL, &token).await;
    assert!(results.is_empty());
    assert!(failed_markets(&results).is_empty());
    assert!(service
        .sync_taiwan_trading_dates(&token)
        .await
        .unwrap_err()
        .is_cancelled());
}
