/// 구매자 인증
/// 1. 등록 (인증 코드 발송)
/// 2. 코드 확인 -> 세션 발급
/// 3. 코드 재발송 / 로그아웃
// region:    --- Imports
use crate::claim::codes::{digest, generate_auth_code, generate_session_token};
use crate::claim::contact::normalize_contact;
use crate::claim::model::{AuthMethod, Buyer, BuyerStats, NewBuyer, Sale, SaleStatus};
use crate::claim::verification::{AttemptResult, CodeAttempt};
use crate::claim::window::is_within_claim_window;
use crate::config::AuthConfig;
use crate::error::{ClaimError, Result};
use crate::notify::ChallengeSender;
use crate::store::ClaimStore;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands

/// 구매자 등록 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterBuyerCommand {
    pub sale_id: i64,
    pub name: String,
    pub contact: String,
    pub auth_method: AuthMethod,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyCodeCommand {
    pub buyer_id: i64,
    pub code: String,
}

/// 코드 발송 결과. 코드 자체는 담지 않는다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Challenge {
    pub buyer_id: i64,
    pub auth_method: AuthMethod,
    pub expires_at: DateTime<Utc>,
    /// 기존 구매자에게 새 코드를 보낸 경우
    pub resent: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerSessionToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub buyer: Buyer,
}

// endregion: --- Commands

// region:    --- Handlers

fn ensure_open_for_registration(sale: &Sale, now: DateTime<Utc>) -> Result<()> {
    if sale.status != SaleStatus::Active {
        return Err(ClaimError::SaleNotActive { sale_id: sale.id });
    }
    if !is_within_claim_window(sale, now) {
        return Err(ClaimError::OutsideClaimWindow { sale_id: sale.id });
    }
    Ok(())
}

async fn load_sale(store: &dyn ClaimStore, sale_id: i64) -> Result<Sale> {
    store
        .get_sale(sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", sale_id))
}

/// 1. 등록
pub async fn handle_register(
    cmd: RegisterBuyerCommand,
    store: &dyn ClaimStore,
    sender: &dyn ChallengeSender,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    info!(
        "{:<12} --> 구매자 등록 요청: sale {} via {}",
        "Buyer",
        cmd.sale_id,
        cmd.auth_method.as_str()
    );

    let name = cmd.name.trim();
    if name.is_empty() {
        return Err(ClaimError::validation("name is required"));
    }
    let contact = normalize_contact(cmd.auth_method, &cmd.contact).ok_or_else(|| {
        ClaimError::validation(match cmd.auth_method {
            AuthMethod::Email => "a valid email address is required",
            AuthMethod::Sms => "phone number must have exactly 10 digits",
        })
    })?;

    let sale = load_sale(store, cmd.sale_id).await?;
    ensure_open_for_registration(&sale, now)?;

    let code = generate_auth_code();
    let (buyer, resent) = match store
        .find_buyer_by_contact(sale.id, cmd.auth_method, &contact)
        .await?
    {
        Some(existing) => {
            // 재등록은 새 이름을 반영하고 코드와 실패 횟수를 새로 시작한다
            let buyer = store
                .issue_buyer_code(
                    existing.id,
                    Some(name),
                    &digest(&code),
                    now + config.auth_code_ttl,
                )
                .await?;
            (buyer, true)
        }
        None => {
            let (email, phone) = match cmd.auth_method {
                AuthMethod::Email => (Some(contact), None),
                AuthMethod::Sms => (None, Some(contact)),
            };
            let buyer = store
                .insert_buyer(
                    NewBuyer {
                        sale_id: sale.id,
                        name: name.to_string(),
                        email,
                        phone,
                        auth_method: cmd.auth_method,
                        auth_code_hash: digest(&code),
                        auth_code_expires: now + config.auth_code_ttl,
                    },
                    now,
                )
                .await?;
            (buyer, false)
        }
    };

    sender.send_code(&buyer, &sale, &code).await?;

    Ok(Challenge {
        buyer_id: buyer.id,
        auth_method: buyer.auth_method,
        expires_at: buyer.auth_code_expires.unwrap_or(now + config.auth_code_ttl),
        resent,
    })
}

/// 2. 코드 확인
pub async fn handle_verify(
    cmd: VerifyCodeCommand,
    store: &dyn ClaimStore,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<BuyerSessionToken> {
    info!("{:<12} --> 인증 코드 확인: buyer {}", "Buyer", cmd.buyer_id);

    let token = generate_session_token();
    let attempt = CodeAttempt {
        buyer_id: cmd.buyer_id,
        code_hash: digest(cmd.code.trim()),
        max_attempts: config.max_verify_attempts,
        session_token_hash: digest(&token),
        session_expires: now + config.buyer_session,
    };
    // 카운터 증가와 코드 폐기는 저장소가 행을 잠근 채 처리
    let outcome = store.attempt_buyer_code(&attempt, now).await?;
    let buyer = outcome.buyer;

    match outcome.result {
        AttemptResult::Verified => {
            info!("{:<12} --> 인증 성공: buyer {}", "Buyer", buyer.id);
            Ok(BuyerSessionToken {
                token,
                expires_at: attempt.session_expires,
                buyer,
            })
        }
        AttemptResult::Invalid => {
            warn!(
                "{:<12} --> 인증 실패: buyer {} ({}/{})",
                "Buyer", buyer.id, buyer.failed_attempts, config.max_verify_attempts
            );
            Err(ClaimError::InvalidCode)
        }
        AttemptResult::Locked => {
            warn!("{:<12} --> 인증 잠김: buyer {}", "Buyer", buyer.id);
            Err(ClaimError::TooManyAttempts)
        }
    }
}

/// 3. 코드 재발송
pub async fn handle_resend(
    buyer_id: i64,
    store: &dyn ClaimStore,
    sender: &dyn ChallengeSender,
    config: &AuthConfig,
    now: DateTime<Utc>,
) -> Result<Challenge> {
    info!("{:<12} --> 인증 코드 재발송: buyer {}", "Buyer", buyer_id);

    let buyer = store
        .get_buyer(buyer_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("buyer", buyer_id))?;
    let sale = load_sale(store, buyer.sale_id).await?;
    ensure_open_for_registration(&sale, now)?;

    let code = generate_auth_code();
    let buyer = store
        .issue_buyer_code(buyer.id, None, &digest(&code), now + config.auth_code_ttl)
        .await?;
    sender.send_code(&buyer, &sale, &code).await?;

    Ok(Challenge {
        buyer_id: buyer.id,
        auth_method: buyer.auth_method,
        expires_at: buyer.auth_code_expires.unwrap_or(now + config.auth_code_ttl),
        resent: true,
    })
}

/// 세션 토큰 검증. 만료 시각 이후에는 재사용해도 통과하지 못한다
pub async fn validate_session(
    token: &str,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Buyer> {
    let mut buyer = store
        .find_buyer_by_session(&digest(token))
        .await?
        .ok_or(ClaimError::Unauthorized)?;

    if buyer.session_expires.map_or(true, |expires| expires <= now) {
        return Err(ClaimError::SessionExpired);
    }
    if !buyer.auth_verified {
        return Err(ClaimError::NotVerified);
    }

    store.touch_buyer(buyer.id, now).await?;
    buyer.last_activity = Some(now);
    Ok(buyer)
}

/// 세션 컬럼만 비운다
pub async fn handle_logout(buyer: Buyer, store: &dyn ClaimStore) -> Result<()> {
    info!("{:<12} --> 로그아웃: buyer {}", "Buyer", buyer.id);
    store.end_buyer_session(buyer.id).await
}

/// 구매자 오퍼 통계
pub async fn buyer_stats(buyer_id: i64, store: &dyn ClaimStore) -> Result<BuyerStats> {
    store.buyer_stats(buyer_id).await
}

// endregion: --- Handlers
