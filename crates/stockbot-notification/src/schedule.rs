//! 일일 스케줄 트리거 계산.
//!
//! 지정한 시간대의 벽시계 시각(예: 대만 시간 15:00:00)에 하루 한 번 실행되는
//! 다음 트리거 시각을 계산합니다. 계산은 주입된 `now`에 대해 순수 함수이며,
//! 전역 시계 상태를 두지 않습니다.

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use std::str::FromStr;
use tracing::warn;

use crate::types::NotificationError;

/// 트리거 계산에 사용하는 시간대
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleZone {
    /// IANA 시간대 (예: Asia/Taipei)
    Named(Tz),
    /// 프로세스 로컬 시간대 (이름을 해석하지 못했을 때)
    Local,
}

impl ScheduleZone {
    /// 시간대 이름을 해석합니다. 실패하면 경고 로그를 남기고 로컬 시간대를 사용합니다.
    pub fn resolve(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::Named(tz),
            Err(e) => {
                warn!(zone = name, error = %e, "시간대를 불러올 수 없어 로컬 시간대를 사용합니다");
                Self::Local
            }
        }
    }

    pub fn name(&self) -> String {
        match self {
            Self::Named(tz) => tz.name().to_string(),
            Self::Local => "Local".to_string(),
        }
    }
}

/// 하루 중 실행 시각 (`HH:MM[:SS]`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DailyTime(NaiveTime);

impl DailyTime {
    pub fn from_hms(hour: u32, minute: u32, second: u32) -> Result<Self, NotificationError> {
        NaiveTime::from_hms_opt(hour, minute, second)
            .map(Self)
            .ok_or_else(|| {
                NotificationError::InvalidConfig(format!(
                    "잘못된 실행 시각: {:02}:{:02}:{:02}",
                    hour, minute, second
                ))
            })
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl FromStr for DailyTime {
    type Err = NotificationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        NaiveTime::parse_from_str(s, "%H:%M:%S")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
            .map(Self)
            .map_err(|e| NotificationError::InvalidConfig(format!("잘못된 실행 시각 '{}': {}", s, e)))
    }
}

/// 일일 트리거 시계.
///
/// 시간대는 생성 시 한 번만 해석하며, 매 주기마다 [`next_trigger`](Self::next_trigger)로
/// 다음 실행 시각을 다시 계산합니다.
#[derive(Debug, Clone, Copy)]
pub struct ScheduleClock {
    time: DailyTime,
    zone: ScheduleZone,
}

impl ScheduleClock {
    pub fn new(time: DailyTime, zone_name: &str) -> Self {
        Self {
            time,
            zone: ScheduleZone::resolve(zone_name),
        }
    }

    pub fn with_zone(time: DailyTime, zone: ScheduleZone) -> Self {
        Self { time, zone }
    }

    pub fn zone(&self) -> ScheduleZone {
        self.zone
    }

    pub fn time(&self) -> DailyTime {
        self.time
    }

    /// `now` 이후 첫 트리거 시각.
    ///
    /// 오늘의 실행 시각이 아직 오지 않았으면 오늘, 이미 지났거나 같으면 정확히 하루 뒤입니다.
    pub fn next_trigger(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        match self.zone {
            ScheduleZone::Named(tz) => next_in_zone(now, self.time.time(), &tz),
            ScheduleZone::Local => next_in_zone(now, self.time.time(), &Local),
        }
    }

    /// 트리거 시각을 설정된 시간대의 벽시계 문자열로 표시
    pub fn format_local(&self, instant: DateTime<Utc>) -> String {
        const FORMAT: &str = "%Y-%m-%d %H:%M:%S %Z";
        match self.zone {
            ScheduleZone::Named(tz) => instant.with_timezone(&tz).format(FORMAT).to_string(),
            ScheduleZone::Local => instant.with_timezone(&Local).format(FORMAT).to_string(),
        }
    }
}

/// 시간대 이름을 매번 해석하는 단발성 계산.
pub fn next_trigger(
    now: DateTime<Utc>,
    hour: u32,
    minute: u32,
    second: u32,
    zone_name: &str,
) -> Result<DateTime<Utc>, NotificationError> {
    let time = DailyTime::from_hms(hour, minute, second)?;
    Ok(ScheduleClock::new(time, zone_name).next_trigger(now))
}

fn next_in_zone<Z: TimeZone>(now: DateTime<Utc>, time: NaiveTime, zone: &Z) -> DateTime<Utc> {
    let today = now.with_timezone(zone).date_naive();
    let candidate = resolve_local(zone, today.and_time(time));
    if now < candidate {
        return candidate;
    }

    let tomorrow = today.succ_opt().unwrap_or(today);
    resolve_local(zone, tomorrow.and_time(time))
}

/// 벽시계 시각을 UTC로 변환. 서머타임 중복 구간은 앞쪽, 공백 구간은 한 시간 뒤를 사용한다.
fn resolve_local<Z: TimeZone>(zone: &Z, naive: NaiveDateTime) -> DateTime<Utc> {
    match zone.from_local_datetime(&naive) {
        LocalResult::Single(dt) => dt.with_timezone(&Utc),
        LocalResult::Ambiguous(earliest, _) => earliest.with_timezone(&Utc),
        LocalResult::None => zone
            .from_local_datetime(&(naive + chrono::Duration::hours(1)))
            .earliest()
            .map(|dt| dt.with_timezone(&Utc))
            .unwrap_or_else(|| Utc.from_utc_datetime(&naive)),
    }
}
