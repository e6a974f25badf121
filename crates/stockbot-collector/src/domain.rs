//! 동기화 대상 도메인 타입.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::CollectorError;

/// 동기화 대상 시장
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Market {
    /// 대만 (TWSE/TPEX)
    #[serde(rename = "TW")]
    Taiwan,
    /// 미국
    #[serde(rename = "US")]
    Us,
}

impl Market {
    /// 모든 시장 목록
    pub const ALL: [Market; 2] = [Market::Taiwan, Market::Us];

    /// sync_status 테이블의 키로 사용되는 시장 코드
    pub fn code(&self) -> &'static str {
        match self {
            Self::Taiwan => "TW",
            Self::Us => "US",
        }
    }
}

impl fmt::Display for Market {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Market {
    type Err = CollectorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "TW" | "TAIWAN" => Ok(Self::Taiwan),
            "US" => Ok(Self::Us),
            other => Err(CollectorError::Config(format!("알 수 없는 시장: {}", other))),
        }
    }
}

/// 종목 기준 정보
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockSymbol {
    /// 종목 코드 (예: "2330", "AAPL")
    pub symbol: String,
    /// 종목명
    pub name: String,
    /// 시장 코드
    pub market: Market,
}

impl StockSymbol {
    pub fn new(symbol: impl Into<String>, name: impl Into<String>, market: Market) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            market,
        }
    }
}

/// 거래일
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TradeDate {
    pub date: NaiveDate,
}

/// 시장별 동기화 상태 레코드.
///
/// `last_success_at`은 조회(fetch)와 upsert가 최상위 에러 없이 끝났을 때만 갱신됩니다.
/// 배치 단위 부분 실패는 이를 막지 않습니다 ([`SuccessPolicy`](crate::config::SuccessPolicy) 참고).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStatus {
    pub market: String,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_success_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub total_count: i64,
}

impl SyncStatus {
    /// 마지막 실행이 에러 없이 끝났는지 여부
    pub fn is_healthy(&self) -> bool {
        self.last_error.as_deref().map_or(true, str::is_empty)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_market_parse() {
        assert_eq!("tw".parse::<Market>().unwrap(), Market::Taiwan);
        assert_eq!(" US ".parse::<Market>().unwrap(), Market::Us);
        assert!("JP".parse::<Market>().is_err());
    }

    #[test]
    fn test_market_serde_uses_code() {
        let json = serde_json::to_string(&Market::Taiwan).unwrap();
        assert_eq!(json, "\"TW\"");
    }

    #[test]
    fn test_sync_status_health() {
        let mut status = SyncStatus {
            market: "TW".to_string(),
            last_sync_at: None,
            last_success_at: None,
            last_error: None,
            total_count: 0,
        };
        assert!(status.is_healthy());

        status.last_error = Some(String::new());
        assert!(status.is_healthy());

        status.last_error = Some("timeout".to_string());
        assert!(!status.is_healthy());
    }
}
