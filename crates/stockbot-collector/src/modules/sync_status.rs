//! 동기화 상태 기록 모듈.
//!
//! 동기화 실행이 끝날 때마다 시장별 상태 레코드를 upsert합니다.
//! 상태 기록 실패는 로그만 남기고 동기화 결과에는 영향을 주지 않습니다.

use chrono::{DateTime, Utc};
use std::sync::Arc;
use tracing::error;

use crate::config::SuccessPolicy;
use crate::domain::SyncStatus;
use crate::error::CollectorError;
use crate::repository::SyncStatusRepository;
use crate::stats::SyncRunOutcome;

/// 시장별 동기화 상태 기록기
#[derive(Clone)]
pub struct SyncStatusRecorder {
    repository: Arc<dyn SyncStatusRepository>,
    policy: SuccessPolicy,
}

impl SyncStatusRecorder {
    pub fn new(repository: Arc<dyn SyncStatusRepository>, policy: SuccessPolicy) -> Self {
        Self { repository, policy }
    }

    pub fn policy(&self) -> SuccessPolicy {
        self.policy
    }

    /// 조회 실패 기록. `last_success_at`은 기존 값을 유지합니다.
    pub async fn record_fetch_failure(
        &self,
        market: &str,
        started_at: DateTime<Utc>,
        err: &CollectorError,
    ) {
        let status = SyncStatus {
            market: market.to_string(),
            last_sync_at: Some(started_at),
            last_success_at: None,
            last_error: Some(err.to_string()),
            total_count: 0,
        };
        self.write(status).await;
    }

    /// 배치 처리 완료 기록 (조회는 성공한 실행).
    ///
    /// 성공 여부는 설정된 [`SuccessPolicy`]로 판정합니다.
    pub async fn record_completion(
        &self,
        market: &str,
        started_at: DateTime<Utc>,
        outcome: &SyncRunOutcome,
    ) {
        let status = completion_status(market, started_at, outcome, self.policy);
        self.write(status).await;
    }

    /// 저장된 상태 조회
    pub async fn get(&self, market: &str) -> crate::Result<Option<SyncStatus>> {
        self.repository.get_by_market(market).await
    }

    async fn write(&self, status: SyncStatus) {
        if let Err(e) = self.repository.upsert(&status).await {
            error!(market = %status.market, error = %e, "동기화 상태 기록 실패");
        }
    }
}

/// 배치 처리 결과로부터 상태 레코드를 만든다.
///
/// `FetchSucceeded`는 배치 실패나 취소와 무관하게 성공으로 기록한다.
/// `NoBatchErrors`는 배치 에러가 있거나 취소로 배치가 남은 경우 `last_error`를 남긴다.
fn completion_status(
    market: &str,
    started_at: DateTime<Utc>,
    outcome: &SyncRunOutcome,
    policy: SuccessPolicy,
) -> SyncStatus {
    let last_error = match policy {
        SuccessPolicy::FetchSucceeded => None,
        SuccessPolicy::NoBatchErrors if !outcome.is_clean() => Some(format!(
            "{}개 배치 실패 (레코드 {}건 실패)",
            outcome.failed_batches, outcome.total_error
        )),
        SuccessPolicy::NoBatchErrors if outcome.cancelled => {
            Some(CollectorError::Cancelled.to_string())
        }
        SuccessPolicy::NoBatchErrors => None,
    };

    SyncStatus {
        market: market.to_string(),
        last_sync_at: Some(started_at),
        last_success_at: last_error.is_none().then_some(started_at),
        last_error,
        total_count: outcome.total_success as i64,
    }
}
