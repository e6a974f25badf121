//! 구독자 알림 디스패처.

use clap::Parser;
use std::sync::Arc;
use stockbot_notification::{
    FanoutRunner, FeatureDeliveryTask, NotifierConfig, PgEventOutbox, ScheduleClock,
    ScheduledDispatcher, TelegramSender,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "stockbot-notifier")]
#[command(about = "StockBot Scheduled Notification Dispatcher", long_about = None)]
#[command(version)]
struct Cli {
    /// 한 번만 실행하고 종료
    #[arg(long)]
    once: bool,

    /// 로그 레벨 (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // 로깅 초기화
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "stockbot_notifier={level},stockbot_notification={level}",
                    level = cli.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("StockBot Notifier 시작");

    let config = NotifierConfig::from_env()?;
    let sender = TelegramSender::from_env()
        .ok_or_else(|| anyhow::anyhow!("TELEGRAM_BOT_TOKEN 환경변수가 설정되지 않았습니다"))?;

    // DB 연결
    let pool = sqlx::PgPool::connect(&config.database_url).await?;
    tracing::info!("데이터베이스 연결 성공");

    let tasks = FeatureDeliveryTask::for_all_features(
        Arc::new(PgEventOutbox::new(pool.clone())),
        Arc::new(sender),
    );
    let clock = ScheduleClock::new(config.notify_time, &config.time_zone);
    let dispatcher = ScheduledDispatcher::new(FanoutRunner::new(tasks), clock)
        .with_run_on_start(config.run_on_start);

    let token = CancellationToken::new();
    let shutdown = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("종료 신호 수신, 디스패처 종료 중...");
            shutdown.cancel();
        }
    });

    let result = if cli.once {
        dispatcher.run_scheduled_tasks(&token).await.map_err(|e| {
            tracing::error!(error = %e, "알림 실행 실패");
            anyhow::Error::from(e)
        })
    } else {
        if let Err(e) = dispatcher.run(token).await {
            tracing::warn!(error = %e, "마지막 알림 라운드에 실패가 있었습니다");
        }
        Ok(())
    };

    pool.close().await;
    tracing::info!("StockBot Notifier 종료");

    result
}
