//! 고정 크기 워커 풀 기반 비동기 배치 처리 모듈.
//!
//! # 동작
//!
//! 1. 모든 배치를 작업 큐에 미리 넣고 큐를 닫음
//! 2. `worker_count`개의 워커가 큐를 공유하며 배치를 하나씩 꺼내 저장
//! 3. 워커는 다음 배치를 꺼내기 전에 취소 여부를 확인
//! 4. 배치 결과는 집계기에서 합산되며 개별 에러는 로그로만 남김
//!
//! 배치 완료 순서는 보장하지 않습니다. 이미 실행 중인 저장 작업은 취소 시에도
//! 강제로 중단되지 않으며, 저장 구현체가 토큰을 직접 확인해야 합니다.

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::batch::Batch;
use crate::error::CollectorError;
use crate::stats::SyncRunOutcome;

/// 배치 하나를 저장한 결과 (저장 구현체가 반환)
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// 저장 성공 레코드 수
    pub success_count: usize,
    /// 저장 실패 레코드 수
    pub error_count: usize,
    /// 배치 단위 에러 (부분 실패 포함)
    pub error: Option<CollectorError>,
}

impl BatchOutcome {
    /// 배치 전체 성공
    pub fn succeeded(success_count: usize) -> Self {
        Self {
            success_count,
            ..Default::default()
        }
    }

    /// 배치 전체 실패
    pub fn failed(error_count: usize, error: CollectorError) -> Self {
        Self {
            success_count: 0,
            error_count,
            error: Some(error),
        }
    }
}

/// 배치 저장 연산.
///
/// 같은 레코드를 반복 저장해도 안전해야 합니다 (idempotent upsert).
/// 풀은 배치당 한 번만 호출하며 자동 재시도하지 않습니다.
#[async_trait]
pub trait BatchPersister<T>: Send + Sync {
    async fn persist_batch(&self, batch: &[T], token: &CancellationToken) -> BatchOutcome;
}

/// 워커가 배치 하나를 처리한 뒤 보고하는 결과
#[derive(Debug)]
pub struct BatchResult {
    /// 결과를 보고한 워커 ID (1부터)
    pub worker_id: usize,
    /// 워커별 배치 순번 (전역 고유값 아님)
    pub batch_id: usize,
    pub success_count: usize,
    pub error_count: usize,
    pub error: Option<CollectorError>,
}

/// 배치 결과 집계기.
///
/// 성공/실패 수를 합산하고 실패한 배치는 경고 로그만 남깁니다.
#[derive(Debug, Default)]
pub struct ResultAggregator {
    outcome: SyncRunOutcome,
}

impl ResultAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// 배치 결과 하나를 반영
    pub fn record(&mut self, result: BatchResult) {
        self.outcome.total_success += result.success_count;
        self.outcome.total_error += result.error_count;

        match &result.error {
            Some(CollectorError::Cancelled) => {
                info!(
                    worker_id = result.worker_id,
                    batch_id = result.batch_id,
                    success = result.success_count,
                    "워커 취소됨, 남은 배치 처리 중단"
                );
                self.outcome.cancelled = true;
                return;
            }
            Some(e) => {
                warn!(
                    worker_id = result.worker_id,
                    batch_id = result.batch_id,
                    success = result.success_count,
                    errors = result.error_count,
                    error = %e,
                    "배치 처리 실패"
                );
                self.outcome.failed_batches += 1;
            }
            None => {}
        }

        self.outcome.batches += 1;
    }

    /// 집계 결과 반환
    pub fn finish(self) -> SyncRunOutcome {
        self.outcome
    }
}

/// 고정 크기 배치 워커 풀
#[derive(Debug, Clone, Copy)]
pub struct BatchWorkerPool {
    worker_count: usize,
}

impl BatchWorkerPool {
    /// 새 워커 풀 생성.
    ///
    /// # Panics
    ///
    /// `worker_count`가 0이면 패닉합니다.
    pub fn new(worker_count: usize) -> Self {
        assert!(worker_count > 0, "worker_count must be greater than zero");
        Self { worker_count }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// 모든 배치를 처리하고 합산된 결과를 반환합니다.
    ///
    /// 배치 에러는 집계 시점에 로그로 남기며 호출자에게 전파하지 않습니다.
    /// 반환 시점에는 모든 워커가 종료되어 있습니다.
    pub async fn run<T, P>(
        &self,
        batches: Vec<Batch<T>>,
        persister: Arc<P>,
        token: &CancellationToken,
    ) -> SyncRunOutcome
    where
        T: Send + Sync + 'static,
        P: BatchPersister<T> + ?Sized + 'static,
    {
        let start = Instant::now();
        let batch_count = batches.len();

        info!(
            batches = batch_count,
            workers = self.worker_count,
            "비동기 배치 처리 시작"
        );

        // 작업 큐: 모든 배치를 미리 넣고 송신측을 닫는다
        let (batch_tx, batch_rx) = mpsc::channel(batch_count.max(1));
        for batch in batches {
            if batch_tx.send(batch).await.is_err() {
                break;
            }
        }
        drop(batch_tx);

        let batch_rx = Arc::new(Mutex::new(batch_rx));
        let (result_tx, mut result_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for worker_id in 1..=self.worker_count {
            workers.spawn(worker(
                worker_id,
                Arc::clone(&batch_rx),
                result_tx.clone(),
                Arc::clone(&persister),
                token.clone(),
            ));
        }
        drop(result_tx);

        let mut aggregator = ResultAggregator::new();
        while let Some(result) = result_rx.recv().await {
            aggregator.record(result);
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                error!(error = %e, "배치 워커 비정상 종료");
            }
        }

        let mut outcome = aggregator.finish();
        outcome.elapsed = start.elapsed();

        info!(
            success = outcome.total_success,
            errors = outcome.total_error,
            failed_batches = outcome.failed_batches,
            cancelled = outcome.cancelled,
            "비동기 배치 처리 완료"
        );

        outcome
    }
}

async fn worker<T, P>(
    worker_id: usize,
    batch_rx: Arc<Mutex<mpsc::Receiver<Batch<T>>>>,
    result_tx: mpsc::UnboundedSender<BatchResult>,
    persister: Arc<P>,
    token: CancellationToken,
) where
    T: Send + Sync + 'static,
    P: BatchPersister<T> + ?Sized + 'static,
{
    let mut batch_id = 0;

    loop {
        if token.is_cancelled() {
            let _ = result_tx.send(BatchResult {
                worker_id,
                batch_id,
                success_count: 0,
                error_count: 0,
                error: Some(CollectorError::Cancelled),
            });
            return;
        }

        // 잠금은 다음 배치를 꺼내는 동안만 유지
        let next = batch_rx.lock().await.recv().await;
        let Some(batch) = next else {
            return;
        };

        batch_id += 1;
        debug!(
            worker_id,
            batch_id,
            batch_index = batch.index,
            batch_size = batch.len(),
            "워커 배치 처리 시작"
        );

        let outcome = persister.persist_batch(batch.items(), &token).await;

        debug!(
            worker_id,
            batch_id,
            success = outcome.success_count,
            errors = outcome.error_count,
            "워커 배치 처리 완료"
        );

        let _ = result_tx.send(BatchResult {
            worker_id,
            batch_id,
            success_count: outcome.success_count,
            error_count: outcome.error_count,
            error: outcome.error,
        });
    }
}
