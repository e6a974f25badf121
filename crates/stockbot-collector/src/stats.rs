//! 동기화 실행 통계 구조체.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// 한 번의 동기화 실행 결과 (배치 결과 합산)
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRunOutcome {
    /// 조회된 전체 레코드 수
    pub fetched: usize,
    /// 결과를 보고한 배치 수
    pub batches: usize,
    /// 에러를 보고한 배치 수
    pub failed_batches: usize,
    /// 저장 성공 레코드 수
    pub total_success: usize,
    /// 저장 실패 레코드 수
    pub total_error: usize,
    /// 취소로 인해 남은 배치 처리를 중단했는지 여부
    pub cancelled: bool,
    /// 소요 시간
    #[serde(skip)]
    pub elapsed: Duration,
}

impl SyncRunOutcome {
    /// 새 통계 객체 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 배치 에러가 하나도 없었는지 여부
    pub fn is_clean(&self) -> bool {
        self.failed_batches == 0 && self.total_error == 0
    }

    /// 성공률 계산 (%)
    pub fn success_rate(&self) -> f64 {
        let attempted = self.total_success + self.total_error;
        if attempted == 0 {
            0.0
        } else {
            (self.total_success as f64 / attempted as f64) * 100.0
        }
    }

    /// 통계 요약 로그 출력
    pub fn log_summary(&self, operation: &str) {
        tracing::info!(
            operation = operation,
            fetched = self.fetched,
            batches = self.batches,
            failed_batches = self.failed_batches,
            success = self.total_success,
            errors = self.total_error,
            cancelled = self.cancelled,
            success_rate = format!("{:.1}%", self.success_rate()),
            elapsed = format!("{:.1}s", self.elapsed.as_secs_f64()),
            "동기화 완료"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_success_rate() {
        let outcome = SyncRunOutcome {
            total_success: 150,
            total_error: 50,
            ..Default::default()
        };
        assert!((outcome.success_rate() - 75.0).abs() < f64::EPSILON);
        assert!(!outcome.is_clean());
        assert_eq!(SyncRunOutcome::new().success_rate(), 0.0);
        assert!(SyncRunOutcome::new().is_clean());
    }
}
