//! 알림 타입 및 trait 정의.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use tokio_util::sync::CancellationToken;

/// 구독 가능한 알림 기능 (카테고리).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    /// 구독 종목 시세
    StockPrice,
    /// 구독 종목 뉴스
    StockNews,
    /// 시장 전체 정보
    MarketInfo,
    /// 거래량 상위 종목
    TopVolume,
}

impl Feature {
    /// 기본 스케줄에서 실행되는 전체 기능 목록
    pub const ALL: [Feature; 4] = [
        Feature::StockPrice,
        Feature::StockNews,
        Feature::MarketInfo,
        Feature::TopVolume,
    ];

    /// `features.code` 컬럼 값
    pub fn code(&self) -> &'static str {
        match self {
            Self::StockPrice => "stock_price",
            Self::StockNews => "stock_news",
            Self::MarketInfo => "market_info",
            Self::TopVolume => "top_volume",
        }
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// 알림 메시지.
///
/// 본문은 상위 단계에서 이미 렌더링된 텍스트입니다.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// 원본 알림 이벤트 ID
    pub event_id: i64,
    /// 수신자 (Telegram chat ID 등)
    pub recipient: String,
    /// 알림 기능
    pub feature: Feature,
    /// 메시지 본문
    pub message: String,
    /// 이벤트 발생 시각
    pub occurred_at: DateTime<Utc>,
}

/// 알림 작업용 Result 타입.
pub type NotificationResult<T> = Result<T, NotificationError>;

/// 알림 에러.
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    #[error("알림 전송 실패: {0}")]
    SendFailed(String),

    #[error("잘못된 설정: {0}")]
    InvalidConfig(String),

    #[error("요청 한도 초과: {0}초 후 재시도")]
    RateLimited(u64),

    #[error("네트워크 에러: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("데이터베이스 에러: {0}")]
    Database(#[from] sqlx::Error),

    #[error("{feature} 알림 {total}건 중 {failed}건 전송 실패")]
    Delivery {
        feature: Feature,
        failed: usize,
        total: usize,
    },

    #[error("작업 취소됨")]
    Cancelled,

    #[error("작업 패닉: {0}")]
    Panicked(String),
}

impl NotificationError {
    /// 취소로 인한 에러인지 확인 (비즈니스 실패와 구분)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

/// 알림 전송기 trait.
#[async_trait]
pub trait NotificationSender: Send + Sync {
    /// 알림을 전송합니다.
    async fn send(&self, notification: &Notification) -> NotificationResult<()>;

    /// 전송기가 활성화되어 있는지 확인합니다.
    fn is_enabled(&self) -> bool;

    /// 전송기 이름을 반환합니다.
    fn name(&self) -> &str;
}

/// 한 종류의 알림을 모든 구독자에게 전달하는 독립 작업.
///
/// 작업끼리는 프로세스 내 가변 상태를 공유하지 않으며, 상호작용은 저장소를 통해서만 일어납니다.
/// 취소는 협조적입니다. 구현체는 전달받은 토큰을 직접 확인해야 합니다.
#[async_trait]
pub trait NotificationTask: Send + Sync {
    /// 로그와 집계 에러에 사용되는 작업 이름
    fn name(&self) -> &str;

    /// 작업을 한 번 실행합니다.
    async fn run(&self, token: &CancellationToken) -> NotificationResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_feature_codes_are_unique() {
        let mut codes: Vec<&str> = Feature::ALL.iter().map(Feature::code).collect();
        codes.sort_unstable();
        codes.dedup();
        assert_eq!(codes.len(), 4);
    }

    #[test]
    fn test_feature_serde_matches_code() {
        for feature in Feature::ALL {
            let json = serde_json::to_string(&feature).unwrap();
            assert_eq!(json, format!("\"{}\"", feature.code()));
        }
    }

    #[test]
    fn test_delivery_error_message() {
        let err = NotificationError::Delivery {
            feature: Feature::TopVolume,
            failed: 2,
            total: 10,
        };
        assert_eq!(err.to_string(), "top_volume 알림 10건 중 2건 전송 실패");
        assert!(!err.is_cancelled());
        assert!(NotificationError::Cancelled.is_cancelled());
    }
}
