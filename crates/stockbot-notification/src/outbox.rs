//! PostgreSQL 알림 이벤트 저장소.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use crate::delivery::{DeliveryStatus, EventOutbox};
use crate::types::{Feature, Notification, NotificationResult};

/// 한 번에 읽어올 최대 이벤트 수
const DEFAULT_FETCH_LIMIT: i64 = 1000;

/// `notification_events` / `notification_deliveries` 기반 저장소
#[derive(Clone)]
pub struct PgEventOutbox {
    pool: PgPool,
    fetch_limit: i64,
}

impl PgEventOutbox {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            fetch_limit: DEFAULT_FETCH_LIMIT,
        }
    }

    pub fn with_fetch_limit(mut self, limit: i64) -> Self {
        self.fetch_limit = limit.max(1);
        self
    }
}

#[async_trait]
impl EventOutbox for PgEventOutbox {
    async fn pending_events(&self, feature: Feature) -> NotificationResult<Vec<Notification>> {
        let rows: Vec<(i64, String, Option<String>, DateTime<Utc>)> = sqlx::query_as(
            r#"
            SELECT e.id, u.account_id, e.payload::text, e.occurred_at
            FROM notification_events e
            JOIN users u ON u.id = e.user_id
            JOIN features f ON f.id = e.feature_id
            WHERE f.code = $1
              AND u.status = TRUE
              AND NOT EXISTS (
                  SELECT 1 FROM notification_deliveries d
                  WHERE d.event_id = e.id AND d.status = 'sent'
              )
            ORDER BY e.occurred_at, e.id
            LIMIT $2
            "#,
        )
        .bind(feature.code())
        .bind(self.fetch_limit)
        .fetch_all(&self.pool)
        .await?;

        debug!(feature = %feature, count = rows.len(), "미전송 알림 이벤트 조회");

        Ok(rows
            .into_iter()
            .map(|(event_id, recipient, payload, occurred_at)| Notification {
                event_id,
                recipient,
                feature,
                message: render_payload(payload.as_deref().unwrap_or_default()),
                occurred_at,
            })
            .collect())
    }

    async fn record_delivery(
        &self,
        event_id: i64,
        status: DeliveryStatus,
        response: serde_json::Value,
    ) -> NotificationResult<()> {
        sqlx::query(
            r#"
            INSERT INTO notification_deliveries (event_id, status, response, sent_at, created_at, updated_at)
            VALUES ($1, $2, $3::jsonb, NOW(), NOW(), NOW())
            "#,
        )
        .bind(event_id)
        .bind(status.as_str())
        .bind(response.to_string())
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

/// 이벤트 payload에서 메시지 본문 추출.
///
/// `{"message": "..."}` 객체면 그 값, JSON 문자열이면 문자열 자체, 그 외에는 원문을 사용한다.
pub fn render_payload(payload: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(payload) {
        Ok(serde_json::Value::Object(map)) => match map.get("message") {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => payload.to_string(),
        },
        Ok(serde_json::Value::String(s)) => s,
        _ => payload.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_payload_message_field() {
        assert_eq!(
            render_payload(r#"{"message":"2330 漲 3.2%","symbol":"2330"}"#),
            "2330 漲 3.2%"
        );
    }

    #[test]
    fn test_render_payload_json_string() {
        assert_eq!(render_payload(r#""大盤收盤""#), "大盤收盤");
    }

    #[test]
    fn test_render_payload_falls_back_to_raw_text() {
        assert_eq!(render_payload(r#"{"symbol":"AAPL"}"#), r#"{"symbol":"AAPL"}"#);
        assert_eq!(render_payload("plain text"), "plain text");
        assert_eq!(render_payload(""), "");
    }
}
