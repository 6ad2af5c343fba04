/// 오퍼 관련 커맨드 처리
/// 1. 오퍼 등록 (구매자)
/// 2. 금액 상향 / 취소 (구매자)
/// 3. 수락 / 거절 / 삭제 (판매자, 관리자)
/// 4. 오래된 오퍼 만료 (스케줄러)
// region:    --- Imports
use crate::auth::{ensure_sale_access, Principal};
use crate::claim::events::ClaimEvent;
use crate::claim::model::{Buyer, Item, NewOffer, Offer, Sale, SaleStatus};
use crate::claim::transition::OfferEvent;
use crate::claim::window::is_within_claim_window;
use crate::error::{ClaimError, Result};
use crate::message_broker::{publish_all, EventPublisher};
use crate::store::{ClaimStore, OfferOutcome};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};
// endregion: --- Imports

// region:    --- Commands

/// 오퍼 등록 명령. 구매자는 세션에서 온다
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaceOfferCommand {
    pub item_id: i64,
    pub offer_amount: i64,
    pub max_offer: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RaiseOfferCommand {
    pub offer_id: i64,
    pub offer_amount: i64,
}

/// 판매자 검토 명령 (수락/거절)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReviewOfferCommand {
    pub seller_notes: Option<String>,
}

/// 오퍼 변경 결과 응답
#[derive(Debug, Clone, Serialize)]
pub struct OfferResult {
    pub offer: Offer,
    pub item: Item,
    pub changed: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub outbid_offer_ids: Vec<i64>,
}

impl From<OfferOutcome> for OfferResult {
    fn from(outcome: OfferOutcome) -> Self {
        Self {
            outbid_offer_ids: outcome.outbid.iter().map(|offer| offer.id).collect(),
            offer: outcome.offer,
            item: outcome.item,
            changed: outcome.changed,
        }
    }
}

// endregion: --- Commands

// region:    --- Helpers

async fn load_item_and_sale(store: &dyn ClaimStore, item_id: i64) -> Result<(Item, Sale)> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("item", item_id))?;
    let sale = store
        .get_sale(item.sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", item.sale_id))?;
    Ok((item, sale))
}

async fn load_offer(store: &dyn ClaimStore, offer_id: i64) -> Result<Offer> {
    store
        .get_offer(offer_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("offer", offer_id))
}

/// 구매자 쪽 변경은 활성 세일의 클레임 기간 안에서만
fn ensure_claimable(sale: &Sale, now: DateTime<Utc>) -> Result<()> {
    if sale.status != SaleStatus::Active {
        return Err(ClaimError::SaleNotActive { sale_id: sale.id });
    }
    if !is_within_claim_window(sale, now) {
        return Err(ClaimError::OutsideClaimWindow { sale_id: sale.id });
    }
    Ok(())
}

fn accepted_event(outcome: &OfferOutcome, sale_id: i64, now: DateTime<Utc>) -> ClaimEvent {
    ClaimEvent::OfferAccepted {
        offer_id: outcome.offer.id,
        item_id: outcome.item.id,
        sale_id,
        buyer_id: outcome.offer.buyer_id,
        amount: outcome.offer.offer_amount,
        outbid_offer_ids: outcome.outbid.iter().map(|offer| offer.id).collect(),
        timestamp: now,
    }
}

// endregion: --- Helpers

// region:    --- Buyer Commands

/// 1. 오퍼 등록
pub async fn handle_place_offer(
    cmd: PlaceOfferCommand,
    buyer: &Buyer,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<OfferResult> {
    info!(
        "{:<12} --> 오퍼 등록 요청: item {} buyer {} amount {}",
        "Command", cmd.item_id, buyer.id, cmd.offer_amount
    );

    let (_, sale) = load_item_and_sale(store, cmd.item_id).await?;
    // 다른 세일의 구매자는 미인증과 같게 취급
    if buyer.sale_id != sale.id || !buyer.auth_verified {
        return Err(ClaimError::NotVerified);
    }
    ensure_claimable(&sale, now)?;

    let outcome = store
        .place_offer(
            NewOffer {
                item_id: cmd.item_id,
                buyer_id: buyer.id,
                offer_amount: cmd.offer_amount,
                max_offer: cmd.max_offer,
            },
            now,
        )
        .await
        .inspect_err(|e| {
            if !e.is_internal() {
                warn!("{:<12} --> 오퍼 등록 거부: {}", "Command", e);
            }
        })?;

    let mut events = vec![if outcome.raised {
        ClaimEvent::OfferRaised {
            offer_id: outcome.offer.id,
            item_id: outcome.item.id,
            sale_id: sale.id,
            amount: outcome.offer.offer_amount,
            timestamp: now,
        }
    } else {
        ClaimEvent::OfferPlaced {
            offer_id: outcome.offer.id,
            item_id: outcome.item.id,
            sale_id: sale.id,
            buyer_id: buyer.id,
            amount: outcome.offer.offer_amount,
            timestamp: now,
        }
    }];

    let result = match outcome.accepted {
        Some(accepted) => {
            info!(
                "{:<12} --> 즉시 구매가 도달, 오퍼 {} 낙찰",
                "Command", accepted.offer.id
            );
            events.push(accepted_event(&accepted, sale.id, now));
            OfferResult::from(accepted)
        }
        None => OfferResult {
            offer: outcome.offer,
            item: outcome.item,
            changed: true,
            outbid_offer_ids: Vec::new(),
        },
    };

    publish_all(publisher, events).await;
    Ok(result)
}

/// 2-1. 금액 상향
pub async fn handle_raise_offer(
    cmd: RaiseOfferCommand,
    buyer: &Buyer,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<OfferResult> {
    info!(
        "{:<12} --> 오퍼 상향 요청: offer {} amount {}",
        "Command", cmd.offer_id, cmd.offer_amount
    );

    let offer = load_offer(store, cmd.offer_id).await?;
    if offer.buyer_id != buyer.id {
        return Err(ClaimError::Forbidden);
    }
    let (_, sale) = load_item_and_sale(store, offer.item_id).await?;
    ensure_claimable(&sale, now)?;

    let outcome = store
        .apply_offer_event(
            offer.id,
            OfferEvent::Raise {
                amount: cmd.offer_amount,
            },
            None,
            now,
        )
        .await
        .inspect_err(|e| warn!("{:<12} --> 오퍼 상향 거부: {}", "Command", e))?;

    let mut events = vec![ClaimEvent::OfferRaised {
        offer_id: outcome.offer.id,
        item_id: outcome.item.id,
        sale_id: sale.id,
        amount: outcome.offer.offer_amount,
        timestamp: now,
    }];

    // 즉시 구매가 도달 시 저장소가 같은 트랜잭션에서 낙찰까지 처리
    if outcome.bought_now {
        info!(
            "{:<12} --> 즉시 구매가 도달, 오퍼 {} 낙찰",
            "Command", outcome.offer.id
        );
        events.push(accepted_event(&outcome, sale.id, now));
    }

    publish_all(publisher, events).await;
    Ok(OfferResult::from(outcome))
}

/// 2-2. 취소
pub async fn handle_cancel_offer(
    offer_id: i64,
    buyer: &Buyer,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<OfferResult> {
    info!("{:<12} --> 오퍼 취소 요청: offer {}", "Command", offer_id);

    let offer = load_offer(store, offer_id).await?;
    if offer.buyer_id != buyer.id {
        return Err(ClaimError::Forbidden);
    }

    let outcome = store
        .apply_offer_event(offer_id, OfferEvent::Cancel, None, now)
        .await
        .inspect_err(|e| warn!("{:<12} --> 오퍼 취소 거부: {}", "Command", e))?;

    if outcome.changed {
        publish_all(
            publisher,
            vec![ClaimEvent::OfferCancelled {
                offer_id,
                item_id: outcome.item.id,
                timestamp: now,
            }],
        )
        .await;
    }
    Ok(OfferResult::from(outcome))
}

// endregion: --- Buyer Commands

// region:    --- Seller Commands

async fn load_for_review(
    offer_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<(Offer, Sale)> {
    let offer = load_offer(store, offer_id).await?;
    let (_, sale) = load_item_and_sale(store, offer.item_id).await?;
    ensure_sale_access(principal, &sale)?;
    Ok((offer, sale))
}

/// 3-1. 수락. 재시도해도 결과가 같다
pub async fn handle_accept_offer(
    offer_id: i64,
    cmd: ReviewOfferCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<OfferResult> {
    info!("{:<12} --> 오퍼 수락 요청: offer {}", "Command", offer_id);

    let (_, sale) = load_for_review(offer_id, principal, store).await?;
    let outcome = store
        .apply_offer_event(offer_id, OfferEvent::Accept, cmd.seller_notes, now)
        .await
        .inspect_err(|e| warn!("{:<12} --> 오퍼 수락 거부: {}", "Command", e))?;

    if outcome.changed {
        info!(
            "{:<12} --> 오퍼 {} 낙찰, 밀려난 오퍼 {}건",
            "Command",
            offer_id,
            outcome.outbid.len()
        );
        publish_all(publisher, vec![accepted_event(&outcome, sale.id, now)]).await;
    }
    Ok(OfferResult::from(outcome))
}

/// 3-2. 거절. 상품 상태는 그대로
pub async fn handle_reject_offer(
    offer_id: i64,
    cmd: ReviewOfferCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<OfferResult> {
    info!("{:<12} --> 오퍼 거절 요청: offer {}", "Command", offer_id);

    load_for_review(offer_id, principal, store).await?;
    let outcome = store
        .apply_offer_event(offer_id, OfferEvent::Reject, cmd.seller_notes, now)
        .await
        .inspect_err(|e| warn!("{:<12} --> 오퍼 거절 거부: {}", "Command", e))?;

    if outcome.changed {
        publish_all(
            publisher,
            vec![ClaimEvent::OfferRejected {
                offer_id,
                item_id: outcome.item.id,
                timestamp: now,
            }],
        )
        .await;
    }
    Ok(OfferResult::from(outcome))
}

/// 3-3. 삭제. 이력은 남는다
pub async fn handle_delete_offer(
    offer_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<()> {
    info!("{:<12} --> 오퍼 삭제 요청: offer {}", "Command", offer_id);

    load_for_review(offer_id, principal, store).await?;
    store.delete_offer(offer_id).await?;

    publish_all(
        publisher,
        vec![ClaimEvent::OfferDeleted {
            offer_id,
            timestamp: now,
        }],
    )
    .await;
    Ok(())
}

// endregion: --- Seller Commands

// region:    --- System Commands

/// 4. `older_than` 보다 오래된 활성 오퍼 만료
pub async fn handle_expire_offers(
    older_than: Duration,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<Vec<Offer>> {
    let expired = store.expire_offers(now - older_than, now).await?;
    if !expired.is_empty() {
        info!("{:<12} --> 오퍼 {}건 만료", "Command", expired.len());
        publish_all(
            publisher,
            vec![ClaimEvent::OffersExpired {
                offer_ids: expired.iter().map(|offer| offer.id).collect(),
                timestamp: now,
            }],
        )
        .await;
    }
    Ok(expired)
}

// endregion: --- System Commands
