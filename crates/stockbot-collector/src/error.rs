//! 에러 타입 정의.

use thiserror::Error;

/// Collector 에러 타입
#[derive(Debug, Error)]
pub enum CollectorError {
    /// 데이터베이스 에러
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// 설정 에러
    #[error("Configuration error: {0}")]
    Config(String),

    /// 데이터 소스 에러 (스냅샷 파일, 외부 제공자 등)
    #[error("Data source error: {0}")]
    DataSource(String),

    /// 파일 입출력 에러
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// 스냅샷 파싱 에러
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// 취소 토큰에 의해 중단됨
    #[error("Operation cancelled")]
    Cancelled,

    /// 일반 에러
    #[error("Error: {0}")]
    Other(String),
}

impl CollectorError {
    /// 취소로 인한 에러인지 확인 (비즈니스 실패와 구분)
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl From<std::env::VarError> for CollectorError {
    fn from(err: std::env::VarError) -> Self {
        Self::Config(err.to_string())
    }
}

/// Result 타입 별칭
pub type Result<T> = std::result::Result<T, CollectorError>;
