// region:    --- Imports
use crate::auction::model::{AuctionId, PlayerId};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use thiserror::Error;
use tracing::{error, warn};

// endregion: --- Imports

// region:    --- Auction Error
/// 경매 커맨드 처리 중 발생하는 오류
#[derive(Debug, Error)]
pub enum AuctionError {
    /// 잘못된 입력 (재시도하지 않음)
    #[error("{0}")]
    Validation(String),

    /// 요청자 식별 실패
    #[error("{0}")]
    Unauthenticated(String),

    /// 권한 없음 (호스트 전용 작업 등)
    #[error("{0}")]
    Authorization(String),

    /// 현재 경매 상태에서 허용되지 않는 작업
    #[error("{0}")]
    State(String),

    #[error("bid of {amount} exceeds remaining coins ({remaining})")]
    Budget { amount: i64, remaining: i64 },

    #[error("bid of {amount} is too low, minimum accepted bid is {minimum}")]
    BidTooLow { amount: i64, minimum: i64 },

    #[error("{0}")]
    Prerequisite(String),

    /// 다른 경매에서 이미 낙찰된 선수
    #[error("player {0} already belongs to another squad")]
    PlayerTaken(PlayerId),

    #[error("{0} not found")]
    NotFound(String),

    /// 낙관적 업데이트 버전 충돌 (내부에서 재시도)
    #[error("auction {0} was modified concurrently")]
    Conflict(AuctionId),

    /// 일시적인 저장소 오류, 적용된 변경 없음
    #[error("storage failure: {0}")]
    Persistence(String),
}

impl AuctionError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::Unauthenticated(_) => "UNAUTHENTICATED",
            Self::Authorization(_) => "AUTHORIZATION_ERROR",
            Self::State(_) => "STATE_ERROR",
            Self::Budget { .. } => "BUDGET_ERROR",
            Self::BidTooLow { .. } => "BID_TOO_LOW",
            Self::Prerequisite(_) => "PREREQUISITE_ERROR",
            Self::PlayerTaken(_) => "PLAYER_TAKEN",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Persistence(_) => "PERSISTENCE_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            Self::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            Self::Authorization(_) => StatusCode::FORBIDDEN,
            Self::State(_) | Self::PlayerTaken(_) | Self::Conflict(_) => StatusCode::CONFLICT,
            Self::Budget { .. } | Self::BidTooLow { .. } | Self::Prerequisite(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Persistence(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// 동일한 커맨드를 그대로 재시도해도 되는지 여부
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Conflict(_) | Self::Persistence(_))
    }
}

impl From<sqlx::Error> for AuctionError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::RowNotFound => AuctionError::NotFound("record".to_string()),
            other => AuctionError::Persistence(other.to_string()),
        }
    }
}

impl IntoResponse for AuctionError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!("{:<12} --> {} ({})", "Error", self, self.code());
        } else {
            warn!("{:<12} --> {} ({})", "Error", self, self.code());
        }

        let mut body = serde_json::json!({
            "error": self.to_string(),
            "code": self.code(),
        });
        match &self {
            Self::BidTooLow { amount, minimum } => {
                body["bid_amount"] = (*amount).into();
                body["minimum"] = (*minimum).into();
            }
            Self::Budget { amount, remaining } => {
                body["bid_amount"] = (*amount).into();
                body["remaining_coins"] = (*remaining).into();
            }
            Self::Persistence(_) | Self::Conflict(_) => {
                body["retryable"] = true.into();
            }
            _ => {}
        }

        (status, Json(body)).into_response()
    }
}

pub type Result<T> = std::result::Result<T, AuctionError>;

// endregion: --- Auction Error

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_kind_maps_to_a_distinct_client_status() {
        assert_eq!(
            AuctionError::Authorization("x".into()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AuctionError::State("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AuctionError::PlayerTaken(4).status(), StatusCode::CONFLICT);
        assert!(!AuctionError::PlayerTaken(4).is_retryable());
        assert_eq!(
            AuctionError::BidTooLow {
                amount: 1,
                minimum: 2
            }
            .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AuctionError::Persistence("down".into()).status(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn only_storage_failures_are_retryable() {
        assert!(AuctionError::Persistence("io".into()).is_retryable());
        assert!(AuctionError::Conflict(7).is_retryable());
        assert!(!AuctionError::Budget {
            amount: 10,
            remaining: 5
        }
        .is_retryable());
        assert!(!AuctionError::Validation("bad".into()).is_retryable());
    }

    #[test]
    fn sqlx_errors_become_persistence_errors() {
        let err: AuctionError = sqlx::Error::PoolTimedOut.into();
        assert_eq!(err.code(), "PERSISTENCE_ERROR");
    }
}
