//! 스케줄 기반 알림 디스패처.
//!
//! 시작 시 한 번 즉시 실행한 뒤, 다음 트리거 시각까지 대기하거나 취소될 때까지
//! 기다리는 루프를 돕니다. 작업 실패는 로그로만 남기며 루프를 멈추지 않습니다.
//! 루프를 멈추는 것은 취소 토큰뿐입니다.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::aggregate::AggregateError;
use crate::fanout::FanoutRunner;
use crate::schedule::ScheduleClock;

/// 현재 시각 공급자
pub type NowFn = Arc<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// 디스패치 에러
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("이전 알림 실행이 아직 진행 중입니다")]
    AlreadyRunning,

    #[error(transparent)]
    Tasks(#[from] AggregateError),
}

/// 스케줄 기반 알림 디스패처
pub struct ScheduledDispatcher {
    runner: FanoutRunner,
    clock: ScheduleClock,
    now: NowFn,
    run_on_start: bool,
    running: AtomicBool,
}

impl ScheduledDispatcher {
    pub fn new(runner: FanoutRunner, clock: ScheduleClock) -> Self {
        Self {
            runner,
            clock,
            now: Arc::new(Utc::now),
            run_on_start: true,
            running: AtomicBool::new(false),
        }
    }

    /// 현재 시각 공급자 교체
    pub fn with_now(mut self, now: NowFn) -> Self {
        self.now = now;
        self
    }

    /// 시작 시 즉시 실행 여부 설정
    pub fn with_run_on_start(mut self, run_on_start: bool) -> Self {
        self.run_on_start = run_on_start;
        self
    }

    pub fn clock(&self) -> &ScheduleClock {
        &self.clock
    }

    /// 실행 중인 라운드가 있는지 확인
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::Acquire)
    }

    /// 알림 작업을 한 라운드 실행합니다.
    ///
    /// 이전 라운드가 끝나지 않았으면 작업을 시작하지 않고 `AlreadyRunning`을 반환합니다.
    pub async fn run_scheduled_tasks(&self, token: &CancellationToken) -> Result<(), DispatchError> {
        let _guard = RunGuard::acquire(&self.running).ok_or(DispatchError::AlreadyRunning)?;
        self.runner.run_all(token).await?;
        Ok(())
    }

    /// 디스패처 루프를 실행합니다.
    ///
    /// 취소될 때까지 반환하지 않으며, 마지막 라운드의 결과를 돌려줍니다.
    pub async fn run(&self, token: CancellationToken) -> Result<(), DispatchError> {
        info!(
            tasks = self.runner.task_count(),
            zone = %self.clock.zone().name(),
            "알림 디스패처 시작"
        );

        let mut last = Ok(());
        if self.run_on_start {
            last = self.run_round(&token, "startup").await;
        }

        loop {
            let now = (self.now)();
            let next = self.clock.next_trigger(now);
            let wait = (next - now).to_std().unwrap_or(Duration::ZERO);

            info!(
                next = %self.clock.format_local(next),
                wait_secs = wait.as_secs(),
                "다음 알림 실행 예약"
            );

            tokio::select! {
                _ = token.cancelled() => {
                    info!("알림 디스패처 종료");
                    break;
                }
                _ = tokio::time::sleep(wait) => {
                    last = self.run_round(&token, "scheduled").await;
                }
            }
        }

        last
    }

    async fn run_round(&self, token: &CancellationToken, trigger: &str) -> Result<(), DispatchError> {
        let result = self.run_scheduled_tasks(token).await;
        match &result {
            Ok(()) => info!(trigger, "알림 라운드 완료"),
            Err(DispatchError::AlreadyRunning) => {
                warn!(trigger, "이전 알림 라운드가 진행 중이라 이번 실행을 건너뜁니다")
            }
            Err(DispatchError::Tasks(e)) if e.all_cancelled() => {
                info!(trigger, failed = e.len(), "알림 라운드 취소됨")
            }
            Err(DispatchError::Tasks(e)) => {
                error!(trigger, failed = e.len(), error = %e, "알림 라운드 일부 실패")
            }
        }
        result
    }
}

/// 실행 중 플래그. 드롭 시 해제된다.
struct RunGuard<'a> {
    flag: &'a AtomicBool,
}

impl<'a> RunGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self { flag })
    }
}

impl Drop for RunGuard<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
