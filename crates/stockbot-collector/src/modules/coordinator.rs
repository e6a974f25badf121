//! 배치 동기화 코디네이터.
//!
//! 한 번의 동기화 실행을 다음 순서로 처리합니다.
//!
//! 1. 기준 데이터 전체 조회 (실패 시 상태 기록 후 에러 반환, 배치는 실행하지 않음)
//! 2. 고정 크기 배치로 분할 후 워커 풀에서 저장
//! 3. 배치 결과를 합산하여 시장별 상태 기록
//!
//! 조회 실패만 치명적이며, 배치 단위 실패와 배치 처리 중 취소는 집계 수치로만 반영됩니다.
//! 같은 취소 토큰이 조회, 저장, 워커 풀에 전달됩니다.

use chrono::Utc;
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use super::batch::split_into_batches;
use super::sync_status::SyncStatusRecorder;
use super::worker_pool::{BatchPersister, BatchWorkerPool};
use crate::config::SyncConfig;
use crate::error::CollectorError;
use crate::stats::SyncRunOutcome;
use crate::Result;

/// 배치 동기화 코디네이터
#[derive(Clone)]
pub struct BatchSyncCoordinator {
    pool: BatchWorkerPool,
    batch_size: usize,
    recorder: SyncStatusRecorder,
}

impl BatchSyncCoordinator {
    pub fn new(config: &SyncConfig, recorder: SyncStatusRecorder) -> Self {
        assert!(config.batch_size > 0, "batch_size must be greater than zero");
        Self {
            pool: BatchWorkerPool::new(config.max_workers),
            batch_size: config.batch_size,
            recorder,
        }
    }

    pub fn recorder(&self) -> &SyncStatusRecorder {
        &self.recorder
    }

    /// 한 시장의 기준 데이터를 동기화합니다.
    ///
    /// 조회가 성공하면 배치 실패나 배치 처리 중 취소가 있더라도 `Ok`를 반환하며,
    /// 취소 여부는 [`SyncRunOutcome::cancelled`]로 확인합니다.
    /// 시작 전에 이미 취소된 경우 조회 없이 [`CollectorError::Cancelled`]를 반환합니다.
    pub async fn sync_market<T, F, Fut, P>(
        &self,
        market: &str,
        fetch: F,
        persister: Arc<P>,
        token: &CancellationToken,
    ) -> Result<SyncRunOutcome>
    where
        T: Send + Sync + 'static,
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = Result<Vec<T>>>,
        P: BatchPersister<T> + ?Sized + 'static,
    {
        if token.is_cancelled() {
            info!(market, "이미 취소됨, 동기화를 시작하지 않음");
            return Err(CollectorError::Cancelled);
        }

        let started_at = Utc::now();
        info!(market, "동기화 시작");

        let items = match fetch(token.clone()).await {
            Ok(items) => items,
            Err(e) => {
                if e.is_cancelled() {
                    info!(market, "기준 데이터 조회 중 취소됨");
                } else {
                    error!(market, error = %e, "기준 데이터 조회 실패");
                }
                self.recorder
                    .record_fetch_failure(market, started_at, &e)
                    .await;
                return Err(e);
            }
        };

        info!(market, count = items.len(), "기준 데이터 조회 완료");

        let outcome = self.run_batches(items, persister, token).await;
        self.recorder
            .record_completion(market, started_at, &outcome)
            .await;

        outcome.log_summary(market);
        if outcome.cancelled {
            warn!(
                market,
                processed = outcome.total_success + outcome.total_error,
                fetched = outcome.fetched,
                "취소로 남은 배치를 처리하지 않음"
            );
        }

        Ok(outcome)
    }

    /// 상태 기록 없이 레코드를 배치로 나누어 저장합니다.
    pub async fn run_batches<T, P>(
        &self,
        items: Vec<T>,
        persister: Arc<P>,
        token: &CancellationToken,
    ) -> SyncRunOutcome
    where
        T: Send + Sync + 'static,
        P: BatchPersister<T> + ?Sized + 'static,
    {
        let fetched = items.len();
        let batches = split_into_batches(items, self.batch_size);

        let mut outcome = self.pool.run(batches, persister, token).await;
        outcome.fetched = fetched;
        outcome
    }
}
