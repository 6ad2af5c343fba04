/// 요청 인증
/// 관리자 토큰, 판매자 세션, 구매자 세션 모두 `Authorization: Bearer <token>` 으로 받는다.
// region:    --- Imports
use crate::buyers;
use crate::claim::codes::digest;
use crate::claim::model::{Buyer, Sale, SellerStatus};
use crate::config::AuthConfig;
use crate::error::{ClaimError, Result};
use crate::handlers::AppState;
use crate::store::ClaimStore;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::header::AUTHORIZATION;
use axum::http::request::Parts;
use chrono::{DateTime, Utc};
use tracing::{debug, warn};
// endregion: --- Imports

// region:    --- Auth Result

/// 인증된 주체
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Principal {
    Admin,
    Seller(i64),
}

impl Principal {
    /// 판매자면 자기 id 로 범위를 좁힌다
    pub fn seller_scope(&self) -> Option<i64> {
        match self {
            Principal::Admin => None,
            Principal::Seller(id) => Some(*id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthResult {
    Authenticated(Principal),
    Unauthorized,
    Forbidden,
}

impl AuthResult {
    pub fn into_principal(self) -> Result<Principal> {
        match self {
            AuthResult::Authenticated(principal) => Ok(principal),
            AuthResult::Unauthorized => Err(ClaimError::Unauthorized),
            AuthResult::Forbidden => Err(ClaimError::Forbidden),
        }
    }
}

/// 관리자/판매자 토큰 판별. 요청당 한 번만 호출된다
pub async fn authorize(
    token: Option<&str>,
    config: &AuthConfig,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<AuthResult> {
    let Some(token) = token else {
        return Ok(AuthResult::Unauthorized);
    };
    let token_hash = digest(token);

    if let Some(admin_token) = &config.admin_token {
        if digest(admin_token) == token_hash {
            return Ok(AuthResult::Authenticated(Principal::Admin));
        }
    }

    let Some(seller) = store.find_seller_by_session(&token_hash).await? else {
        debug!("{:<12} --> 알 수 없는 토큰", "Auth");
        return Ok(AuthResult::Unauthorized);
    };
    if seller.session_expires.map_or(true, |expires| expires <= now) {
        return Ok(AuthResult::Unauthorized);
    }
    if seller.status != SellerStatus::Active {
        warn!(
            "{:<12} --> {} 상태 판매자 {} 접근 거부",
            "Auth",
            seller.status.as_str(),
            seller.id
        );
        return Ok(AuthResult::Forbidden);
    }
    Ok(AuthResult::Authenticated(Principal::Seller(seller.id)))
}

/// 판매자는 자기 세일만 다룰 수 있다
pub fn ensure_sale_access(principal: &Principal, sale: &Sale) -> Result<()> {
    match principal {
        Principal::Admin => Ok(()),
        Principal::Seller(id) if *id == sale.seller_id => Ok(()),
        Principal::Seller(_) => Err(ClaimError::Forbidden),
    }
}

pub fn ensure_admin(principal: &Principal) -> Result<()> {
    match principal {
        Principal::Admin => Ok(()),
        Principal::Seller(_) => Err(ClaimError::Forbidden),
    }
}

// endregion: --- Auth Result

// region:    --- Extractors

pub fn bearer_token(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// 관리자 또는 활성 판매자
#[derive(Debug, Clone, Copy)]
pub struct Staff(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Staff {
    type Rejection = ClaimError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let result = authorize(
            bearer_token(parts),
            &state.auth,
            state.store.as_ref(),
            Utc::now(),
        )
        .await?;
        Ok(Staff(result.into_principal()?))
    }
}

/// 관리자 전용
#[derive(Debug, Clone, Copy)]
pub struct AdminOnly;

#[async_trait]
impl FromRequestParts<AppState> for AdminOnly {
    type Rejection = ClaimError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let Staff(principal) = Staff::from_request_parts(parts, state).await?;
        ensure_admin(&principal)?;
        Ok(AdminOnly)
    }
}

/// 인증된 구매자 세션
#[derive(Debug, Clone)]
pub struct BuyerSession(pub Buyer);

#[async_trait]
impl FromRequestParts<AppState> for BuyerSession {
    type Rejection = ClaimError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self> {
        let token = bearer_token(parts).ok_or(ClaimError::Unauthorized)?;
        let buyer = buyers::validate_session(token, state.store.as_ref(), Utc::now()).await?;
        Ok(BuyerSession(buyer))
    }
}

// endregion: --- Extractors
