//! # StockBot Notification
//!
//! 구독자 알림 스케줄 디스패처.
//!
//! 매일 지정한 시각(기본: 대만 시간 15:00)에 기능별 알림 작업을 동시에 실행하고,
//! 실패한 작업의 에러를 하나의 [`AggregateError`]로 모읍니다.
//!
//! 구성 요소:
//! - [`ScheduleClock`] - 시간대 기준 다음 트리거 시각 계산
//! - [`FanoutRunner`] - 독립 작업 동시 실행 및 에러 집계
//! - [`ScheduledDispatcher`] - 즉시 실행 후 트리거/취소 대기 루프
//! - [`FeatureDeliveryTask`] - 기능별 미전송 알림 전달
//! - [`TelegramSender`] - Telegram Bot API 전송기

pub mod aggregate;
pub mod config;
pub mod delivery;
pub mod dispatcher;
pub mod fanout;
pub mod outbox;
pub mod schedule;
pub mod telegram;
pub mod types;

pub use aggregate::{AggregateError, TaskFailure};
pub use config::NotifierConfig;
pub use delivery::{DeliveryStatus, EventOutbox, FeatureDeliveryTask};
pub use dispatcher::{DispatchError, NowFn, ScheduledDispatcher};
pub use fanout::FanoutRunner;
pub use outbox::PgEventOutbox;
pub use schedule::{next_trigger, DailyTime, ScheduleClock, ScheduleZone};
pub use telegram::{TelegramConfig, TelegramSender};
pub use types::*;
