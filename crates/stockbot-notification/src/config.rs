//! 알림 디스패처 설정.

use crate::schedule::DailyTime;
use crate::types::{NotificationError, NotificationResult};

/// 기본 실행 시각 (대만 장 마감 후)
pub const DEFAULT_NOTIFY_TIME: &str = "15:00:00";
/// 기본 시간대
pub const DEFAULT_NOTIFY_TIME_ZONE: &str = "Asia/Taipei";

/// 알림 디스패처 설정
#[derive(Debug, Clone)]
pub struct NotifierConfig {
    /// 데이터베이스 URL
    pub database_url: String,
    /// 매일 실행할 시각
    pub notify_time: DailyTime,
    /// 실행 시각 기준 시간대 이름
    pub time_zone: String,
    /// 시작 시 즉시 한 번 실행
    pub run_on_start: bool,
}

impl NotifierConfig {
    /// 환경변수에서 설정 로드
    pub fn from_env() -> NotificationResult<Self> {
        dotenvy::dotenv().ok();

        let database_url = std::env::var("DATABASE_URL").map_err(|_| {
            NotificationError::InvalidConfig(
                "DATABASE_URL 환경변수가 설정되지 않았습니다".to_string(),
            )
        })?;

        let notify_time = std::env::var("NOTIFY_TIME")
            .unwrap_or_else(|_| DEFAULT_NOTIFY_TIME.to_string())
            .parse()?;

        Ok(Self {
            database_url,
            notify_time,
            time_zone: std::env::var("NOTIFY_TIME_ZONE")
                .unwrap_or_else(|_| DEFAULT_NOTIFY_TIME_ZONE.to_string()),
            run_on_start: env_var_bool("NOTIFY_RUN_ON_START", true),
        })
    }
}

/// 환경변수에서 bool 값 파싱
fn env_var_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "true" || v == "1")
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_notify_time_parses() {
        let time: DailyTime = DEFAULT_NOTIFY_TIME.parse().unwrap();
        assert_eq!(time, DailyTime::from_hms(15, 0, 0).unwrap());
    }

    #[test]
    fn test_env_var_bool_default() {
        assert!(env_var_bool("STOCKBOT_NOTIFIER_TEST_UNSET_FLAG", true));
        assert!(!env_var_bool("STOCKBOT_NOTIFIER_TEST_UNSET_FLAG", false));
    }
}
