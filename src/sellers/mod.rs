/// 판매자 계정
/// 1. 가입 (승인 대기) / 관리자 생성
/// 2. 승인 / 정지
/// 3. 로그인 -> 세션 발급
/// 4. 수정 / 삭제 / 통계
// region:    --- Imports
use crate::auth::{ensure_admin, Principal};
use crate::claim::codes::{digest, generate_session_token, hash_password, verify_password};
use crate::claim::contact::normalize_email;
use crate::claim::model::{NewSeller, Seller, SellerStats, SellerStatus};
use crate::config::AuthConfig;
use crate::error::{ClaimError, Result};
use crate::store::{ClaimStore, ListQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

const MIN_PASSWORD_LEN: usize = 8;

// region:    --- Commands

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterSellerCommand {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password: String,
    /// 관리자 생성에서만 반영된다
    #[serde(default)]
    pub status: Option<SellerStatus>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSellerCommand {
    pub company_name: Option<String>,
    pub contact_name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCommand {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SellerSession {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub seller: Seller,
}

// endregion: --- Commands

// region:    --- Helpers

fn validated_email(raw: &str) -> Result<String> {
    normalize_email(raw).ok_or_else(|| ClaimError::validation("a valid email address is required"))
}

fn hashed_password(password: &str) -> Result<String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(ClaimError::validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    hash_password(password).map_err(ClaimError::Internal)
}

async fn load_seller(store: &dyn ClaimStore, seller_id: i64) -> Result<Seller> {
    store
        .get_seller(seller_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("seller", seller_id))
}

async fn create(
    cmd: RegisterSellerCommand,
    status: SellerStatus,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    let company_name = cmd.company_name.trim();
    let contact_name = cmd.contact_name.trim();
    if company_name.is_empty() || contact_name.is_empty() {
        return Err(ClaimError::validation(
            "company_name and contact_name are required",
        ));
    }
    let email = validated_email(&cmd.email)?;
    let password_hash = hashed_password(&cmd.password)?;

    let seller = store
        .insert_seller(
            NewSeller {
                company_name: company_name.to_string(),
                contact_name: contact_name.to_string(),
                email,
                phone: cmd.phone,
                password_hash,
                status,
            },
            now,
        )
        .await?;
    info!(
        "{:<12} --> 판매자 {} 생성 ({})",
        "Seller",
        seller.id,
        seller.status.as_str()
    );
    Ok(seller)
}

// endregion: --- Helpers

// region:    --- Handlers

/// 1-1. 자가 가입. 관리자 승인 전까지 pending
pub async fn handle_register(
    cmd: RegisterSellerCommand,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    info!("{:<12} --> 판매자 가입 요청: {}", "Seller", cmd.company_name);
    create(cmd, SellerStatus::Pending, store, now).await
}

/// 1-2. 관리자 생성. 상태 지정 가능
pub async fn handle_admin_create(
    cmd: RegisterSellerCommand,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    info!("{:<12} --> 관리자 판매자 생성: {}", "Seller", cmd.company_name);
    let status = cmd.status.unwrap_or(SellerStatus::Active);
    create(cmd, status, store, now).await
}

/// 2-1. 승인
pub async fn handle_approve(
    seller_id: i64,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    info!("{:<12} --> 판매자 승인: {}", "Seller", seller_id);
    let mut seller = load_seller(store, seller_id).await?;
    seller.status = SellerStatus::Active;
    store.update_seller(&seller, now).await
}

/// 2-2. 정지. 열린 세션도 끊는다
pub async fn handle_suspend(
    seller_id: i64,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    info!("{:<12} --> 판매자 정지: {}", "Seller", seller_id);
    let mut seller = load_seller(store, seller_id).await?;
    seller.status = SellerStatus::Suspended;
    seller.session_token_hash = None;
    seller.session_expires = None;
    store.update_seller(&seller, now).await
}

/// 3. 로그인
pub async fn handle_login(
    cmd: LoginCommand,
    store: &dyn ClaimStore,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<SellerSession> {
    let email = normalize_email(&cmd.email).ok_or(ClaimError::Unauthorized)?;
    info!("{:<12} --> 판매자 로그인 요청: {}", "Seller", email);

    let Some(mut seller) = store.find_seller_by_email(&email).await? else {
        return Err(ClaimError::Unauthorized);
    };
    if !verify_password(&cmd.password, &seller.password_hash).map_err(ClaimError::Internal)? {
        warn!("{:<12} --> 비밀번호 불일치: seller {}", "Seller", seller.id);
        return Err(ClaimError::Unauthorized);
    }
    if seller.status != SellerStatus::Active {
        return Err(ClaimError::Forbidden);
    }

    let token = generate_session_token();
    let expires_at = now + config.seller_session;
    seller.session_token_hash = Some(digest(&token));
    seller.session_expires = Some(expires_at);
    let seller = store.update_seller(&seller, now).await?;

    Ok(SellerSession {
        token,
        expires_at,
        seller,
    })
}

/// 4-1. 수정
pub async fn handle_update(
    seller_id: i64,
    cmd: UpdateSellerCommand,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Seller> {
    info!("{:<12} --> 판매자 수정: {}", "Seller", seller_id);

    let mut seller = load_seller(store, seller_id).await?;
    if let Some(company_name) = cmd.company_name.as_deref().map(str::trim) {
        if company_name.is_empty() {
            return Err(ClaimError::validation("company_name is required"));
        }
        seller.company_name = company_name.to_string();
    }
    if let Some(contact_name) = cmd.contact_name.as_deref().map(str::trim) {
        if contact_name.is_empty() {
            return Err(ClaimError::validation("contact_name is required"));
        }
        seller.contact_name = contact_name.to_string();
    }
    if let Some(email) = cmd.email.as_deref() {
        seller.email = validated_email(email)?;
    }
    if cmd.phone.is_some() {
        seller.phone = cmd.phone;
    }
    if let Some(password) = cmd.password.as_deref() {
        seller.password_hash = hashed_password(password)?;
    }
    store.update_seller(&seller, now).await
}

/// 4-2. 삭제. 활성 세일이 있으면 거부
pub async fn handle_delete(seller_id: i64, store: &dyn ClaimStore) -> Result<()> {
    info!("{:<12} --> 판매자 삭제: {}", "Seller", seller_id);
    store.delete_seller(seller_id).await
}

/// 4-3. 통계. 판매자는 자기 것만
pub async fn seller_stats(
    seller_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<SellerStats> {
    if principal.seller_scope().is_some_and(|id| id != seller_id) {
        ensure_admin(principal)?;
    }
    load_seller(store, seller_id).await?;
    store.seller_stats(seller_id).await
}

pub async fn list_sellers(
    query: &ListQuery<SellerStatus>,
    store: &dyn ClaimStore,
) -> Result<Vec<Seller>> {
    store.list_sellers(query).await
}

// endregion: --- Handlers

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryClaimStore;

    fn registration(email: &str) -> RegisterSellerCommand {
        RegisterSellerCommand {
            company_name: "Maple Lane Estates".to_string(),
            contact_name: "Jordan".to_string(),
            email: email.to_string(),
            phone: None,
            password: "correct horse".to_string(),
            status: Some(SellerStatus::Active),
        }
    }

    #[tokio::test]
    async fn self_registration_stays_pending_until_approved() {
        let store = InMemoryClaimStore::new();
        let now = Utc::now();
        let seller = handle_register(registration("Owner@Maple.test"), &store, now)
            .await
            .unwrap();
        assert_eq!(seller.status, SellerStatus::Pending);
        assert_eq!(seller.email, "owner@maple.test");

        let login = LoginCommand {
            email: "owner@maple.test".to_string(),
            password: "correct horse".to_string(),
        };
        let err = handle_login(login.clone(), &store, &AuthConfig::default(), now)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::Forbidden));

        handle_approve(seller.id, &store, now).await.unwrap();
        let session = handle_login(login, &store, &AuthConfig::default(), now)
            .await
            .unwrap();
        assert_eq!(session.seller.id, seller.id);
        assert_eq!(session.token.len(), 64);
    }

    #[tokio::test]
    async fn wrong_password_and_duplicate_email_are_rejected() {
        let store = InMemoryClaimStore::new();
        let now = Utc::now();
        handle_admin_create(registration("a@maple.test"), &store, now)
            .await
            .unwrap();

        let err = handle_login(
            LoginCommand {
                email: "a@maple.test".to_string(),
                password: "wrong password".to_string(),
            },
            &store,
            &AuthConfig::default(),
            now,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ClaimError::Unauthorized));

        let err = handle_admin_create(registration("A@maple.test"), &store, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::DuplicateEmail(_)));
    }

    #[tokio::test]
    async fn short_passwords_are_rejected() {
        let store = InMemoryClaimStore::new();
        let mut cmd = registration("b@maple.test");
        cmd.password = "short".to_string();
        let err = handle_register(cmd, &store, Utc::now()).await.unwrap_err();
        assert!(matches!(err, ClaimError::Validation(_)));
    }
}
