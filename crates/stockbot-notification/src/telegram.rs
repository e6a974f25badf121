//! 텔레그램 알림 서비스.
//!
//! Telegram Bot API를 통해 구독자별 알림 메시지를 전송합니다.
//! 메시지 본문은 이미 렌더링된 일반 텍스트이므로 기본적으로 `parse_mode`를 보내지 않습니다.

use crate::types::{Notification, NotificationError, NotificationResult, NotificationSender};
use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, error, warn};

const DEFAULT_API_BASE: &str = "https://api.telegram.org";

/// 429 응답에 retry_after가 없을 때 사용하는 대기 시간 (초)
const DEFAULT_RETRY_AFTER_SECS: u64 = 60;

/// 텔레그램 알림 전송 설정.
#[derive(Debug, Clone)]
pub struct TelegramConfig {
    /// @BotFather에서 받은 봇 토큰
    pub bot_token: String,
    /// 전송 활성화 여부
    pub enabled: bool,
    /// 파싱 모드 (HTML 또는 MarkdownV2). `None`이면 일반 텍스트
    pub parse_mode: Option<String>,
    /// Bot API 기본 URL
    pub api_base: String,
}

impl TelegramConfig {
    /// 새 텔레그램 설정을 생성합니다.
    pub fn new(bot_token: String) -> Self {
        Self {
            bot_token,
            enabled: true,
            parse_mode: None,
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }

    pub fn with_parse_mode(mut self, parse_mode: impl Into<String>) -> Self {
        self.parse_mode = Some(parse_mode.into());
        self
    }

    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// 환경 변수에서 설정을 생성합니다.
    pub fn from_env() -> Option<Self> {
        let bot_token = std::env::var("TELEGRAM_BOT_TOKEN").ok()?;
        let enabled = std::env::var("TELEGRAM_ENABLED")
            .map(|v| v.to_lowercase() == "true")
            .unwrap_or(true);
        let api_base =
            std::env::var("TELEGRAM_API_BASE").unwrap_or_else(|_| DEFAULT_API_BASE.to_string());

        let parse_mode = std::env::var("TELEGRAM_PARSE_MODE")
            .ok()
            .filter(|v| !v.trim().is_empty());

        Some(Self {
            bot_token,
            enabled,
            parse_mode,
            api_base,
        })
    }
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    parameters: Option<ResponseParameters>,
}

#[derive(Debug, Deserialize)]
struct ResponseParameters {
    retry_after: Option<u64>,
}

/// 텔레그램 알림 전송기.
pub struct TelegramSender {
    config: TelegramConfig,
    client: reqwest::Client,
}

impl TelegramSender {
    /// 새 텔레그램 전송기를 생성합니다.
    pub fn new(config: TelegramConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// 환경 변수에서 전송기를 생성합니다.
    pub fn from_env() -> Option<Self> {
        TelegramConfig::from_env().map(Self::new)
    }

    /// 지정한 채팅에 원시 메시지를 전송합니다.
    pub async fn send_message(&self, chat_id: &str, text: &str) -> NotificationResult<()> {
        let url = format!(
            "{}/bot{}/sendMessage",
            self.config.api_base.trim_end_matches('/'),
            self.config.bot_token
        );

        let mut params = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
            "disable_web_page_preview": true,
        });
        if let Some(parse_mode) = &self.config.parse_mode {
            params["parse_mode"] = serde_json::Value::String(parse_mode.clone());
        }

        debug!(chat_id, "텔레그램 메시지 전송");

        let response = self.client.post(&url).json(&params).send().await?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        let parsed: Option<ApiErrorBody> = serde_json::from_str(&body).ok();

        if status.as_u16() == 429 {
            let retry_after = parsed
                .as_ref()
                .and_then(|b| b.parameters.as_ref())
                .and_then(|p| p.retry_after)
                .unwrap_or(DEFAULT_RETRY_AFTER_SECS);
            warn!(chat_id, retry_after, "텔레그램 요청 한도 초과");
            return Err(NotificationError::RateLimited(retry_after));
        }

        let detail = parsed.and_then(|b| b.description).unwrap_or(body);
        error!(chat_id, status = %status, detail = %detail, "텔레그램 메시지 전송 실패");
        Err(NotificationError::SendFailed(format!(
            "HTTP {}: {}",
            status, detail
        )))
    }
}

#[async_trait]
impl NotificationSender for TelegramSender {
    async fn send(&self, notification: &Notification) -> NotificationResult<()> {
        if !self.is_enabled() {
            debug!("텔레그램 알림 비활성화 상태, 전송 생략");
            return Ok(());
        }

        self.send_message(&notification.recipient, &notification.message)
            .await
    }

    fn is_enabled(&self) -> bool {
        self.config.enabled && !self.config.bot_token.is_empty()
    }

    fn name(&self) -> &str {
        "telegram"
    }
}
