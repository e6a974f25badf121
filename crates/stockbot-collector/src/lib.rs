//! Reference data collector for StockBot.
//!
//! 이 crate는 알림 서비스와 독립적으로 기준 데이터를 동기화하는 바이너리를 제공합니다:
//! - 종목 정보 동기화 (대만, 미국)
//! - 대만 거래일 동기화
//! - 시장별 동기화 상태 기록 (`sync_metadata`)
//!
//! 대량 레코드는 고정 크기 배치로 나뉘어 제한된 수의 워커가 동시에 저장하며,
//! 배치 단위 실패는 전체 실행을 중단시키지 않습니다.

pub mod config;
pub mod domain;
pub mod error;
pub mod modules;
pub mod provider;
pub mod repository;
pub mod stats;

pub use config::{CollectorConfig, SuccessPolicy, SyncConfig};
pub use domain::{Market, StockSymbol, SyncStatus, TradeDate};
pub use error::{CollectorError, Result};
pub use stats::SyncRunOutcome;
