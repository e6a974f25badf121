//! 기준 데이터 제공자.
//!
//! 외부 시세 제공자의 HTTP 클라이언트는 이 crate의 범위가 아니며,
//! 기본 구현인 [`SnapshotProvider`]는 미리 내려받은 JSON 스냅샷 파일을 읽습니다.
//!
//! | 파일 | 내용 |
//! |------|------|
//! | `tw_stock_info.json` | `[{"stock_id": "2330", "stock_name": "台積電"}, ...]` |
//! | `us_stock_info.json` | `[{"stock_id": "AAPL", "stock_name": "Apple"}, ...]` |
//! | `tw_trading_dates.json` | `["2024-01-02", "2024-01-03", ...]` |

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::domain::{Market, StockSymbol, TradeDate};
use crate::error::CollectorError;
use crate::Result;

/// 시장별 기준 데이터 조회.
///
/// 구현체는 토큰이 취소되면 [`CollectorError::Cancelled`]를 반환해야 합니다.
#[async_trait]
pub trait ReferenceDataProvider: Send + Sync {
    /// 시장의 전체 종목 목록
    async fn fetch_stock_info(
        &self,
        market: Market,
        token: &CancellationToken,
    ) -> Result<Vec<StockSymbol>>;

    /// 대만 시장 거래일 목록
    async fn fetch_taiwan_trading_dates(&self, token: &CancellationToken) -> Result<Vec<TradeDate>>;
}

#[derive(Debug, Deserialize)]
struct StockInfoRecord {
    stock_id: String,
    stock_name: String,
}

/// JSON 스냅샷 디렉토리 기반 제공자
#[derive(Debug, Clone)]
pub struct SnapshotProvider {
    dir: PathBuf,
}

impl SnapshotProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn stock_info_path(&self, market: Market) -> PathBuf {
        match market {
            Market::Taiwan => self.dir.join("tw_stock_info.json"),
            Market::Us => self.dir.join("us_stock_info.json"),
        }
    }

    async fn read(path: &Path, token: &CancellationToken) -> Result<Vec<u8>> {
        let read = tokio::fs::read(path);
        let bytes = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(CollectorError::Cancelled),
            result = read => result,
        };
        bytes.map_err(|e| {
            CollectorError::DataSource(format!("스냅샷 파일 읽기 실패 ({}): {}", path.display(), e))
        })
    }
}

#[async_trait]
impl ReferenceDataProvider for SnapshotProvider {
    async fn fetch_stock_info(
        &self,
        market: Market,
        token: &CancellationToken,
    ) -> Result<Vec<StockSymbol>> {
        let path = self.stock_info_path(market);
        let bytes = Self::read(&path, token).await?;
        let records: Vec<StockInfoRecord> = serde_json::from_slice(&bytes)?;

        // 같은 종목 코드가 여러 번 나오면 첫 레코드만 사용
        let mut seen = HashSet::new();
        let mut symbols = Vec::with_capacity(records.len());
        for record in records {
            let symbol = record.stock_id.trim();
            if symbol.is_empty() {
                warn!(market = %market, "종목 코드가 비어 있는 레코드 건너뜀");
                continue;
            }
            if seen.insert(symbol.to_string()) {
                symbols.push(StockSymbol::new(symbol, record.stock_name.trim(), market));
            }
        }

        debug!(market = %market, count = symbols.len(), path = %path.display(), "스냅샷 종목 로드");
        Ok(symbols)
    }

    async fn fetch_taiwan_trading_dates(&self, token: &CancellationToken) -> Result<Vec<TradeDate>> {
        let path = self.dir.join("tw_trading_dates.json");
        let bytes = Self::read(&path, token).await?;
        let raw: Vec<String> = serde_json::from_slice(&bytes)?;

        let mut dates = raw
            .iter()
            .map(|s| {
                NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d")
                    .map(|date| TradeDate { date })
                    .map_err(|e| CollectorError::DataSource(format!("잘못된 거래일 '{}': {}", s, e)))
            })
            .collect::<Result<Vec<_>>>()?;
        dates.sort();
        dates.dedup();

        Ok(dates)
    }
}
