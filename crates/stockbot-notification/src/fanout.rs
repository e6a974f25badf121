//! 알림 작업 fan-out 실행기.
//!
//! 모든 작업을 각각의 tokio 태스크로 동시에 실행하고, 전부 끝날 때까지 기다린 뒤
//! 에러를 하나의 [`AggregateError`]로 모읍니다. 한 작업의 실패나 패닉은 다른 작업에
//! 영향을 주지 않습니다.

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use crate::aggregate::{AggregateError, TaskFailure};
use crate::types::{NotificationError, NotificationTask};

/// 알림 작업 fan-out 실행기
#[derive(Clone)]
pub struct FanoutRunner {
    tasks: Vec<Arc<dyn NotificationTask>>,
}

impl FanoutRunner {
    pub fn new(tasks: Vec<Arc<dyn NotificationTask>>) -> Self {
        Self { tasks }
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// 모든 작업을 동시에 실행하고 결과를 집계합니다.
    pub async fn run_all(&self, token: &CancellationToken) -> Result<(), AggregateError> {
        run_all(&self.tasks, token).await
    }
}

/// 작업 목록을 동시에 실행하고 모두 끝날 때까지 기다립니다.
///
/// 실패한 작업이 없으면 `Ok(())`, 하나 이상이면 작업 순서대로 정렬된 집계 에러를 반환합니다.
pub async fn run_all(
    tasks: &[Arc<dyn NotificationTask>],
    token: &CancellationToken,
) -> Result<(), AggregateError> {
    let start = Instant::now();
    info!(tasks = tasks.len(), "알림 작업 실행 시작");

    let handles: Vec<_> = tasks
        .iter()
        .enumerate()
        .map(|(index, task)| {
            let task = Arc::clone(task);
            let token = token.clone();
            let name = task.name().to_string();
            let handle = tokio::spawn(async move { task.run(&token).await });
            (index, name, handle)
        })
        .collect();

    let mut failures = Vec::new();
    for (index, name, handle) in handles {
        let error = match handle.await {
            Ok(Ok(())) => {
                debug!(task = %name, "알림 작업 완료");
                continue;
            }
            Ok(Err(e)) => e,
            Err(join_err) if join_err.is_panic() => {
                NotificationError::Panicked(panic_message(join_err.into_panic()))
            }
            Err(_) => NotificationError::Cancelled,
        };

        error!(task = %name, error = %error, "알림 작업 실패");
        failures.push(TaskFailure {
            index,
            task: name,
            error,
        });
    }

    info!(
        tasks = tasks.len(),
        failed = failures.len(),
        elapsed = format!("{:.1}s", start.elapsed().as_secs_f64()),
        "알림 작업 실행 완료"
    );

    match AggregateError::from_failures(failures) {
        Some(err) => Err(err),
        None => Ok(()),
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
