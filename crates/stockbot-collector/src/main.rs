//! Reference data collector CLI.

use clap::{Parser, Subcommand};
use std::sync::Arc;
use stockbot_collector::modules::{
    failed_markets, BatchSyncCoordinator, StockSyncService, SyncStatusRecorder,
};
use stockbot_collector::provider::SnapshotProvider;
use stockbot_collector::repository::{
    PgStockSymbolRepository, PgSyncStatusRepository, PgTradeDateRepository,
};
use stockbot_collector::{CollectorConfig, Market};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stockbot-collector")]
#[command(about = "StockBot Reference Data Collector", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// 종목 정보 동기화 (기본: 설정에서 활성화된 전체 시장)
    SyncSymbols {
        /// 특정 시장만 동기화 (tw, us)
        #[arg(long)]
        market: Option<Market>,
    },

    /// 대만 거래일 동기화
    SyncTradingDates,

    /// 시장별 저장된 종목 수 조회
    Stats,

    /// 시장별 마지막 동기화 상태 조회
    Status {
        /// 특정 시장만 조회 (tw, us)
        #[arg(long)]
        market: Option<Market>,
    },

    /// 전체 워크플로우 실행 (종목 동기화 → 거래일 동기화)
    RunAll,

    /// 데몬 모드: 시작 시 한 번 실행 후 주기적으로 전체 워크플로우 실행
    Daemon,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("stockbot_collector={}", cli.log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("StockBot Data Collector 시작");

    // 설정 로드
    let config = CollectorConfig::from_env()?;
    tracing::debug!(
        snapshot_dir = %config.snapshot_dir.display(),
        batch_size = config.sync.batch_size,
        workers = config.sync.max_workers,
        "설정 로드 완료"
    );

    // DB 연결
    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    tracing::info!("데이터베이스 연결 성공");

    let recorder = SyncStatusRecorder::new(
        Arc::new(PgSyncStatusRepository::new(pool.clone())),
        config.sync.success_policy,
    );
    let service = StockSyncService::new(
        BatchSyncCoordinator::new(&config.sync, recorder),
        Arc::new(SnapshotProvider::new(&config.snapshot_dir)),
        Arc::new(PgStockSymbolRepository::new(pool.clone())),
        Arc::new(PgTradeDateRepository::new(pool.clone())),
    );

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 진행 중인 작업 취소 중...");
            shutdown.cancel();
        }
    });

    let result = run_command(cli.command, &service, &config, &token).await;

    pool.close().await;
    tracing::info!("StockBot Data Collector 종료");

    result
}

async fn run_command(
    command: Commands,
    service: &StockSyncService,
    config: &CollectorConfig,
    token: &CancellationToken,
) -> anyhow::Result<()> {
    match command {
        Commands::SyncSymbols { market } => {
            let markets = match market {
                Some(m) => vec![m],
                None => enabled_markets(config),
            };
            let results = service.sync_markets(&markets, token).await;
            ensure_all_succeeded(&failed_markets(&results))?;
        }
        Commands::SyncTradingDates => {
            service.sync_taiwan_trading_dates(token).await?;
        }
        Commands::Stats => {
            log_stats(service).await?;
        }
        Commands::Status { market } => {
            let markets = market.map(|m| vec![m]).unwrap_or_else(|| Market::ALL.to_vec());
            for market in markets {
                match service.get_sync_status(market).await? {
                    Some(status) => tracing::info!(
                        market = %market,
                        last_sync_at = ?status.last_sync_at,
                        last_success_at = ?status.last_success_at,
                        last_error = ?status.last_error,
                        total_count = status.total_count,
                        healthy = status.is_healthy(),
                        "동기화 상태"
                    ),
                    None => tracing::info!(market = %market, "동기화 기록 없음"),
                }
            }
        }
        Commands::RunAll => {
            tracing::info!("=== 전체 워크플로우 시작 ===");
            let failed = run_workflow(service, config, token).await;
            tracing::info!("=== 전체 워크플로우 완료 ===");
            ensure_all_succeeded(&failed)?;
        }
        Commands::Daemon => {
            tracing::info!(
                "=== 데몬 모드 시작 (주기: {}시간) ===",
                config.daemon.interval_hours
            );

            // 첫 tick은 즉시 발생하므로 시작 시 한 번 실행된다
            let mut interval = tokio::time::interval(config.daemon.interval());
            interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);

            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {
                        tracing::info!("=== 워크플로우 실행 시작 ===");
                        let failed = run_workflow(service, config, token).await;
                        if !failed.is_empty() {
                            tracing::warn!(failed = ?failed, "일부 단계 실패, 다음 주기에 재시도");
                        }
                        tracing::info!(
                            "=== 워크플로우 완료, 다음 실행: {}시간 후 ===",
                            config.daemon.interval_hours
                        );
                    }
                }
            }
        }
    }

    Ok(())
}

fn ensure_all_succeeded<S: std::fmt::Display>(failed: &[S]) -> anyhow::Result<()> {
    if failed.is_empty() {
        return Ok(());
    }
    let names: Vec<String> = failed.iter().map(ToString::to_string).collect();
    anyhow::bail!("동기화 실패: {}", names.join(", "))
}

fn enabled_markets(config: &CollectorConfig) -> Vec<Market> {
    let mut markets = Vec::new();
    if config.sync.enable_taiwan {
        markets.push(Market::Taiwan);
    }
    if config.sync.enable_us {
        markets.push(Market::Us);
    }
    markets
}

/// 종목 동기화 → 거래일 동기화 → 통계 출력. 각 단계의 실패는 로그를 남기고 다음 단계로 진행한다.
///
/// 실패한 단계 이름을 반환한다.
async fn run_workflow(
    service: &StockSyncService,
    config: &CollectorConfig,
    token: &CancellationToken,
) -> Vec<String> {
    let results = service.sync_markets(&enabled_markets(config), token).await;
    let mut failed: Vec<String> = failed_markets(&results)
        .into_iter()
        .map(|m| m.code().to_string())
        .collect();

    if config.sync.enable_trading_dates && !token.is_cancelled() {
        if let Err(e) = service.sync_taiwan_trading_dates(token).await {
            tracing::error!("거래일 동기화 실패: {}", e);
            failed.push("trading_dates".to_string());
        }
    }

    if let Err(e) = log_stats(service).await {
        tracing::warn!("동기화 통계 조회 실패: {}", e);
    }

    failed
}

async fn log_stats(service: &StockSyncService) -> stockbot_collector::Result<()> {
    let stats = service.get_sync_stats().await?;
    for (market, count) in &stats {
        tracing::info!(market = %market, count, "시장별 종목 수");
    }
    Ok(())
}
