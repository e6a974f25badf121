//! 기능별 알림 전달 작업.
//!
//! 상위 단계에서 렌더링된 `notification_events`를 기능(Feature)별로 읽어
//! 구독자에게 전송하고, 결과를 `notification_deliveries`에 기록합니다.
//! 이벤트 하나의 실패는 작업을 멈추지 않습니다.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::types::{
    Feature, Notification, NotificationError, NotificationResult, NotificationSender,
    NotificationTask,
};

/// 전달 상태 (`notification_deliveries.status`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Sent,
    Failed,
}

impl DeliveryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sent => "sent",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for DeliveryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// 알림 이벤트 저장소.
///
/// 이미 `sent`로 기록된 이벤트는 `pending_events`에 다시 나타나지 않아야 합니다.
#[async_trait]
pub trait EventOutbox: Send + Sync {
    /// 기능별 미전송 이벤트 조회 (발생 시각 순)
    async fn pending_events(&self, feature: Feature) -> NotificationResult<Vec<Notification>>;

    /// 전달 결과 기록
    async fn record_delivery(
        &self,
        event_id: i64,
        status: DeliveryStatus,
        response: serde_json::Value,
    ) -> NotificationResult<()>;
}

/// 한 기능의 미전송 알림을 모두 전달하는 작업
pub struct FeatureDeliveryTask {
    feature: Feature,
    outbox: Arc<dyn EventOutbox>,
    sender: Arc<dyn NotificationSender>,
}

impl FeatureDeliveryTask {
    pub fn new(
        feature: Feature,
        outbox: Arc<dyn EventOutbox>,
        sender: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            feature,
            outbox,
            sender,
        }
    }

    /// 기능마다 하나씩 전달 작업 생성
    pub fn for_all_features(
        outbox: Arc<dyn EventOutbox>,
        sender: Arc<dyn NotificationSender>,
    ) -> Vec<Arc<dyn NotificationTask>> {
        Feature::ALL
            .into_iter()
            .map(|feature| {
                Arc::new(Self::new(feature, Arc::clone(&outbox), Arc::clone(&sender)))
                    as Arc<dyn NotificationTask>
            })
            .collect()
    }

    pub fn feature(&self) -> Feature {
        self.feature
    }

    /// 이벤트 하나를 전송하고 결과를 기록. 전송과 기록이 모두 성공해야 `true`.
    async fn deliver(&self, notification: &Notification) -> bool {
        let (status, response, sent) = match self.sender.send(notification).await {
            Ok(()) => (
                DeliveryStatus::Sent,
                serde_json::json!({ "sender": self.sender.name(), "ok": true }),
                true,
            ),
            Err(e) => {
                warn!(
                    feature = %self.feature,
                    event_id = notification.event_id,
                    recipient = %notification.recipient,
                    error = %e,
                    "알림 전송 실패"
                );
                (
                    DeliveryStatus::Failed,
                    serde_json::json!({ "sender": self.sender.name(), "ok": false, "error": e.to_string() }),
                    false,
                )
            }
        };

        if let Err(e) = self
            .outbox
            .record_delivery(notification.event_id, status, response)
            .await
        {
            error!(
                feature = %self.feature,
                event_id = notification.event_id,
                status = %status,
                error = %e,
                "전달 결과 기록 실패"
            );
            return false;
        }

        sent
    }
}

#[async_trait]
impl NotificationTask for FeatureDeliveryTask {
    fn name(&self) -> &str {
        self.feature.code()
    }

    async fn run(&self, token: &CancellationToken) -> NotificationResult<()> {
        if token.is_cancelled() {
            return Err(NotificationError::Cancelled);
        }

        if !self.sender.is_enabled() {
            info!(feature = %self.feature, sender = self.sender.name(), "전송기 비활성화, 전달 생략");
            return Ok(());
        }

        let events = self.outbox.pending_events(self.feature).await?;
        let total = events.len();
        if total == 0 {
            debug!(feature = %self.feature, "전달할 알림 없음");
            return Ok(());
        }

        info!(feature = %self.feature, total, "알림 전달 시작");

        let mut failed = 0usize;
        for (i, notification) in events.iter().enumerate() {
            if token.is_cancelled() {
                warn!(
                    feature = %self.feature,
                    delivered = i,
                    remaining = total - i,
                    "알림 전달 취소됨"
                );
                return Err(NotificationError::Cancelled);
            }

            if !self.deliver(notification).await {
                failed += 1;
            }
        }

        info!(
            feature = %self.feature,
            total,
            sent = total - failed,
            failed,
            "알림 전달 완료"
        );

        if failed > 0 {
            return Err(NotificationError::Delivery {
                feature: self.feature,
                failed,
                total,
            });
        }
        Ok(())
    }
}
