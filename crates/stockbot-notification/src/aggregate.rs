//! 다중 작업 에러 집계.

use std::fmt;

use crate::types::NotificationError;

/// 실패한 작업 하나
#[derive(Debug)]
pub struct TaskFailure {
    /// 작업 목록 내 위치
    pub index: usize,
    /// 작업 이름
    pub task: String,
    pub error: NotificationError,
}

impl PartialEq for TaskFailure {
    fn eq(&self, other: &Self) -> bool {
        self.index == other.index
            && self.task == other.task
            && self.error.to_string() == other.error.to_string()
    }
}

impl fmt::Display for TaskFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.task, self.error)
    }
}

/// 한 번의 fan-out에서 실패한 모든 작업의 에러.
///
/// 작업 목록 순서대로 정렬되며 항상 하나 이상의 실패를 담습니다.
#[derive(Debug, PartialEq)]
pub struct AggregateError {
    failures: Vec<TaskFailure>,
}

impl AggregateError {
    /// 실패 목록으로 집계 에러 생성 (비어 있으면 `None`)
    pub fn from_failures(mut failures: Vec<TaskFailure>) -> Option<Self> {
        if failures.is_empty() {
            return None;
        }
        failures.sort_by_key(|f| f.index);
        Some(Self { failures })
    }

    pub fn failures(&self) -> &[TaskFailure] {
        &self.failures
    }

    pub fn into_failures(self) -> Vec<TaskFailure> {
        self.failures
    }

    pub fn len(&self) -> usize {
        self.failures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.failures.is_empty()
    }

    /// 실패한 작업 이름 목록
    pub fn task_names(&self) -> Vec<&str> {
        self.failures.iter().map(|f| f.task.as_str()).collect()
    }

    /// 모든 실패가 취소로 인한 것인지 여부
    pub fn all_cancelled(&self) -> bool {
        self.failures.iter().all(|f| f.error.is_cancelled())
    }
}

impl fmt::Display for AggregateError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}개 작업 실패: ", self.failures.len())?;
        for (i, failure) in self.failures.iter().enumerate() {
            if i > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{}", failure)?;
        }
        Ok(())
    }
}

impl std::error::Error for AggregateError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.failures
            .first()
            .map(|f| &f.error as &(dyn std::error::Error + 'static))
    }
}
