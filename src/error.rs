// region:    --- Imports
use crate::claim::transition::TransitionError;
use crate::claim::window::WindowError;
use crate::config::ConfigError;
use crate::telemetry::TelemetryError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::error;
// endregion: --- Imports

// region:    --- Claim Error

pub type Result<T> = std::result::Result<T, ClaimError>;

/// 도메인 오류와 인프라 오류를 구분한 오류 타입
#[derive(Debug, thiserror::Error)]
pub enum ClaimError {
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: i64 },
    #[error("no active sale matches code {0}")]
    UnknownSaleCode(String),
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Transition(#[from] TransitionError),
    #[error(transparent)]
    Window(#[from] WindowError),
    #[error("sale {sale_id} is not active")]
    SaleNotActive { sale_id: i64 },
    #[error("sale {sale_id} is outside its claim window")]
    OutsideClaimWindow { sale_id: i64 },
    #[error("access code or QR code already in use")]
    DuplicateAccessCode,
    #[error("email {0} is already registered")]
    DuplicateEmail(String),
    #[error("seller {seller_id} still has active sales")]
    SellerHasActiveSales { seller_id: i64 },
    #[error("item {item_id} can only be changed while available")]
    ItemLocked { item_id: i64 },
    #[error("buyer is not verified for this sale")]
    NotVerified,
    #[error("invalid or expired verification code")]
    InvalidCode,
    #[error("too many failed verification attempts; request a new code")]
    TooManyAttempts,
    #[error("session expired")]
    SessionExpired,
    #[error("authentication required")]
    Unauthorized,
    #[error("not permitted")]
    Forbidden,
    #[error("conflict: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("event publish error: {0}")]
    Publish(String),
    #[error("notification error: {0}")]
    Notify(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ClaimError {
    pub fn not_found(entity: &'static str, id: i64) -> Self {
        Self::NotFound { entity, id }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// 응답에 실리는 고정 코드
    pub fn code(&self) -> &'static str {
        match self {
            ClaimError::NotFound { .. } | ClaimError::UnknownSaleCode(_) => "NOT_FOUND",
            ClaimError::Validation(_) | ClaimError::Window(_) => "VALIDATION",
            ClaimError::Transition(TransitionError::InvalidTransition { .. }) => {
                "INVALID_TRANSITION"
            }
            ClaimError::Transition(TransitionError::ItemNotAvailable { .. }) => {
                "ITEM_NOT_AVAILABLE"
            }
            ClaimError::Transition(TransitionError::AmountTooLow { .. }) => "OFFER_TOO_LOW",
            ClaimError::Transition(TransitionError::MaxOfferBelowAmount { .. }) => {
                "MAX_OFFER_TOO_LOW"
            }
            ClaimError::SaleNotActive { .. } => "SALE_NOT_ACTIVE",
            ClaimError::OutsideClaimWindow { .. } => "OUTSIDE_CLAIM_WINDOW",
            ClaimError::DuplicateAccessCode => "DUPLICATE_ACCESS_CODE",
            ClaimError::DuplicateEmail(_) => "DUPLICATE_EMAIL",
            ClaimError::SellerHasActiveSales { .. } => "SELLER_HAS_ACTIVE_SALES",
            ClaimError::ItemLocked { .. } => "ITEM_LOCKED",
            ClaimError::NotVerified => "NOT_VERIFIED",
            ClaimError::InvalidCode => "INVALID_CODE",
            ClaimError::TooManyAttempts => "TOO_MANY_ATTEMPTS",
            ClaimError::SessionExpired => "SESSION_EXPIRED",
            ClaimError::Unauthorized => "UNAUTHORIZED",
            ClaimError::Forbidden => "FORBIDDEN",
            ClaimError::Conflict(_) => "CONFLICT",
            ClaimError::Database(_)
            | ClaimError::Publish(_)
            | ClaimError::Notify(_)
            | ClaimError::Internal(_) => "INTERNAL",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ClaimError::NotFound { .. } | ClaimError::UnknownSaleCode(_) => StatusCode::NOT_FOUND,
            ClaimError::Validation(_)
            | ClaimError::Window(_)
            | ClaimError::Transition(TransitionError::AmountTooLow { .. })
            | ClaimError::Transition(TransitionError::MaxOfferBelowAmount { .. })
            | ClaimError::SaleNotActive { .. }
            | ClaimError::OutsideClaimWindow { .. }
            | ClaimError::NotVerified
            | ClaimError::InvalidCode => StatusCode::BAD_REQUEST,
            ClaimError::Transition(_)
            | ClaimError::DuplicateAccessCode
            | ClaimError::DuplicateEmail(_)
            | ClaimError::SellerHasActiveSales { .. }
            | ClaimError::ItemLocked { .. }
            | ClaimError::Conflict(_) => StatusCode::CONFLICT,
            ClaimError::TooManyAttempts => StatusCode::TOO_MANY_REQUESTS,
            ClaimError::SessionExpired | ClaimError::Unauthorized => StatusCode::UNAUTHORIZED,
            ClaimError::Forbidden => StatusCode::FORBIDDEN,
            ClaimError::Database(_)
            | ClaimError::Publish(_)
            | ClaimError::Notify(_)
            | ClaimError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn is_internal(&self) -> bool {
        self.status() == StatusCode::INTERNAL_SERVER_ERROR
    }
}

impl IntoResponse for ClaimError {
    fn into_response(self) -> Response {
        let status = self.status();
        // 인프라 오류는 로그에만 상세를 남긴다
        let message = if self.is_internal() {
            error!("{:<12} --> 요청 처리 중 내부 오류: {}", "Error", self);
            "An error occurred. Please try again.".to_string()
        } else {
            self.to_string()
        };

        let body = Json(json!({
            "success": false,
            "message": message,
            "code": self.code(),
        }));
        (status, body).into_response()
    }
}

// endregion: --- Claim Error

// region:    --- App Error

/// 프로세스 기동 단계 오류
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("telemetry error: {0}")]
    Telemetry(#[from] TelemetryError),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("kafka error: {0}")]
    Kafka(String),
}

// endregion: --- App Error

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::model::OfferStatus;

    #[test]
    fn transition_errors_keep_distinct_codes() {
        let err = ClaimError::from(TransitionError::InvalidTransition {
            from: OfferStatus::Rejected,
            event: "accept",
        });
        assert_eq!(err.code(), "INVALID_TRANSITION");
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert_eq!(err.to_string(), "cannot accept an offer that is rejected");

        let err = ClaimError::from(TransitionError::AmountTooLow {
            amount: 90,
            minimum: 100,
        });
        assert_eq!(err.code(), "OFFER_TOO_LOW");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn infrastructure_errors_are_internal() {
        let err = ClaimError::Publish("broker down".to_string());
        assert!(err.is_internal());
        assert_eq!(err.code(), "INTERNAL");
    }
}
