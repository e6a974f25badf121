//! 저장소 인터페이스 및 PostgreSQL 구현.
//!
//! 동기화 모듈은 아래 trait에만 의존하며, 실제 구현은 `Pg*Repository`가 제공합니다.
//! 동시 실행되는 워커 간 동시성 안전성은 저장소(행 단위 upsert)가 책임집니다.

mod stock_symbol;
mod sync_status;
mod trade_date;

use async_trait::async_trait;
use std::collections::HashMap;
use tokio_util::sync::CancellationToken;

use crate::domain::{StockSymbol, SyncStatus, TradeDate};
use crate::modules::worker_pool::{BatchOutcome, BatchPersister};
use crate::Result;

pub use stock_symbol::PgStockSymbolRepository;
pub use sync_status::PgSyncStatusRepository;
pub use trade_date::PgTradeDateRepository;

/// 종목 기준 정보 저장소
#[async_trait]
pub trait StockSymbolRepository: Send + Sync {
    /// 종목 배치를 upsert (종목 코드 + 시장 기준).
    ///
    /// 레코드 단위로 성공/실패를 집계하며, 토큰이 취소되면 남은 레코드는 건너뜁니다.
    async fn batch_upsert(&self, symbols: &[StockSymbol], token: &CancellationToken)
        -> BatchOutcome;

    /// 시장별 종목 수
    async fn market_stats(&self) -> Result<HashMap<String, i64>>;
}

/// 거래일 저장소
#[async_trait]
pub trait TradeDateRepository: Send + Sync {
    /// 거래일 배치 저장 (이미 존재하는 날짜는 무시)
    async fn batch_insert(&self, dates: &[TradeDate], token: &CancellationToken) -> BatchOutcome;
}

/// 시장별 동기화 상태 저장소
#[async_trait]
pub trait SyncStatusRepository: Send + Sync {
    /// 시장 코드로 상태 조회
    async fn get_by_market(&self, market: &str) -> Result<Option<SyncStatus>>;

    /// 상태 upsert.
    ///
    /// `last_success_at`이 `None`이면 기존에 저장된 값을 유지해야 합니다.
    async fn upsert(&self, status: &SyncStatus) -> Result<()>;
}

#[async_trait]
impl<R> BatchPersister<StockSymbol> for R
where
    R: StockSymbolRepository + ?Sized,
{
    async fn persist_batch(&self, batch: &[StockSymbol], token: &CancellationToken) -> BatchOutcome {
        self.batch_upsert(batch, token).await
    }
}

#[async_trait]
impl<R> BatchPersister<TradeDate> for R
where
    R: TradeDateRepository + ?Sized,
{
    async fn persist_batch(&self, batch: &[TradeDate], token: &CancellationToken) -> BatchOutcome {
        self.batch_insert(batch, token).await
    }
}
