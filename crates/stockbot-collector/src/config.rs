//! 환경변수 기반 설정 모듈.

use crate::Result;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// 기본 배치 크기
pub const DEFAULT_BATCH_SIZE: usize = 100;
/// 기본 워커 수
pub const DEFAULT_MAX_WORKERS: usize = 5;

/// Collector 전체 설정
#[derive(Debug, Clone)]
pub struct CollectorConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 기준 데이터 스냅샷 디렉토리
    pub snapshot_dir: PathBuf,
    /// 배치 동기화 설정
    pub sync: SyncConfig,
    /// 데몬 모드 설정
    pub daemon: DaemonConfig,
}

/// 배치 동기화 설정
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// 배치당 레코드 수
    pub batch_size: usize,
    /// 동시 실행 워커 수
    pub max_workers: usize,
    /// `last_success_at` 갱신 기준
    pub success_policy: SuccessPolicy,
    /// 대만 종목 동기화 활성화
    pub enable_taiwan: bool,
    /// 미국 종목 동기화 활성화
    pub enable_us: bool,
    /// 대만 거래일 동기화 활성화
    pub enable_trading_dates: bool,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            success_policy: SuccessPolicy::default(),
            enable_taiwan: true,
            enable_us: true,
            enable_trading_dates: true,
        }
    }
}

/// 동기화 성공 판정 기준.
///
/// 조회만 성공하면 배치가 모두 실패해도 성공으로 기록하는 것이 기존 동작입니다.
/// `NoBatchErrors`는 배치 에러가 하나라도 있으면 `last_success_at`을 갱신하지 않고
/// `last_error`에 실패 요약을 남깁니다. 어느 쪽이든 배치 실패가 실행을 중단시키지는 않습니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SuccessPolicy {
    /// 조회 성공 시 성공으로 기록 (기본값)
    #[default]
    FetchSucceeded,
    /// 배치 에러가 없을 때만 성공으로 기록
    NoBatchErrors,
}

impl FromStr for SuccessPolicy {
    type Err = crate::CollectorError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fetch" | "fetch_succeeded" => Ok(Self::FetchSucceeded),
            "strict" | "no_batch_errors" => Ok(Self::NoBatchErrors),
            other => Err(crate::CollectorError::Config(format!(
                "알 수 없는 SYNC_SUCCESS_POLICY 값: {}",
                other
            ))),
        }
    }
}

/// 데몬 모드 설정
#[derive(Debug, Clone)]
pub struct DaemonConfig {
    /// 동기화 실행 주기 (시간 단위)
    pub interval_hours: u64,
}

impl CollectorConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            crate::error::CollectorError::Config(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        let success_policy = match std::env::var("SYNC_SUCCESS_POLICY") {
            Ok(v) => v.parse()?,
            Err(_) => SuccessPolicy::default(),
        };

        let batch_size = env_var_parse("SYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let max_workers = env_var_parse("SYNC_MAX_WORKERS", DEFAULT_MAX_WORKERS);
        if batch_size == 0 || max_workers == 0 {
            return Err(crate::error::CollectorError::Config(
                "SYNC_BATCH_SIZE와 SYNC_MAX_WORKERS는 0보다 커야 합니다".to_string(),
            ));
        }

        Ok(Self {
            database_url,
            snapshot_dir: std::env::var("SNAPSHOT_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("./data")),
            sync: SyncConfig {
                batch_size,
                max_workers,
                success_policy,
                enable_taiwan: env_var_bool("SYNC_ENABLE_TW", true),
                enable_us: env_var_bool("SYNC_ENABLE_US", true),
                enable_trading_dates: env_var_bool("SYNC_TRADING_DATES", true),
            },
            daemon: DaemonConfig {
                interval_hours: env_var_parse("DAEMON_INTERVAL_HOURS", 24),
            },
        })
    }
}

impl DaemonConfig {
    /// 동기화 실행 주기를 Duration으로 반환
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.max(1) * 60 * 60)
    }
}

/// 환경변수에서 값을 파싱 (실패 시 기본값 사용)
fn env_var_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}
