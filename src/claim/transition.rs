/// 오퍼 상태 머신
/// 모든 오퍼 상태 변경은 `transition` 한 곳을 거친다.
/// 1. 수락 / 거절 (판매자)
/// 2. 취소 / 상향 (구매자)
/// 3. 밀려남 / 만료 (시스템)
// region:    --- Imports
use super::model::{HistoryAction, Item, Offer, OfferStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
// endregion: --- Imports

// region:    --- Types

/// 오퍼에 가해지는 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum OfferEvent {
    Accept,
    Reject,
    Outbid,
    Expire,
    Cancel,
    Raise { amount: i64 },
}

impl OfferEvent {
    pub fn name(&self) -> &'static str {
        match self {
            OfferEvent::Accept => "accept",
            OfferEvent::Reject => "reject",
            OfferEvent::Outbid => "outbid",
            OfferEvent::Expire => "expire",
            OfferEvent::Cancel => "cancel",
            OfferEvent::Raise { .. } => "raise",
        }
    }
}

/// 전이 판단에 필요한 상품 상태
#[derive(Debug, Clone, Copy)]
pub struct OfferContext<'a> {
    pub item: &'a Item,
    /// 해당 상품의 현재 최고 활성 오퍼 금액
    pub highest_active: Option<i64>,
}

/// 전이 결과. `changed == false` 면 이미 목표 상태였던 것 (재시도 안전).
#[derive(Debug, Clone)]
pub struct Transition {
    pub offer: Offer,
    pub changed: bool,
    pub history: Option<HistoryAction>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TransitionError {
    #[error("cannot {event} an offer that is {}", from.as_str())]
    InvalidTransition {
        from: OfferStatus,
        event: &'static str,
    },
    #[error("item {item_id} is not available for offers")]
    ItemNotAvailable { item_id: i64 },
    #[error("offer of {amount} is below the minimum of {minimum}")]
    AmountTooLow { amount: i64, minimum: i64 },
    #[error("max offer {max_offer} is below the offer amount {amount}")]
    MaxOfferBelowAmount { amount: i64, max_offer: i64 },
}

// endregion: --- Types

// region:    --- Offer Policy

/// 시작가가 0 이어도 오퍼는 1센트 이상
pub const MIN_OFFER_AMOUNT: i64 = 1;

/// 다음 오퍼가 넘어야 하는 최소 금액
/// 활성 오퍼가 없으면 시작가, 있으면 최고가 + 최소 증가폭
pub fn minimum_next_offer(item: &Item, highest_active: Option<i64>) -> i64 {
    let floor = item.starting_price.max(MIN_OFFER_AMOUNT);
    match highest_active {
        Some(highest) => floor.max(highest.saturating_add(item.offer_increment)),
        None => floor,
    }
}

/// 신규 오퍼 검증
pub fn validate_new_offer(
    ctx: &OfferContext<'_>,
    amount: i64,
    max_offer: Option<i64>,
) -> Result<(), TransitionError> {
    if !ctx.item.is_available() {
        return Err(TransitionError::ItemNotAvailable {
            item_id: ctx.item.id,
        });
    }

    let minimum = minimum_next_offer(ctx.item, ctx.highest_active);
    if amount < minimum {
        return Err(TransitionError::AmountTooLow { amount, minimum });
    }

    if let Some(max_offer) = max_offer {
        if max_offer < amount {
            return Err(TransitionError::MaxOfferBelowAmount { amount, max_offer });
        }
    }

    Ok(())
}

/// 즉시 구매가 이상이면 바로 낙찰
pub fn reaches_buy_now(item: &Item, amount: i64) -> bool {
    item.buy_now_price.is_some_and(|price| amount >= price)
}

// endregion: --- Offer Policy

// region:    --- Transition

pub fn transition(
    offer: &Offer,
    ctx: &OfferContext<'_>,
    event: &OfferEvent,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    let invalid = || TransitionError::InvalidTransition {
        from: offer.status,
        event: event.name(),
    };

    let (status, history) = match (*event, offer.status) {
        // 재수락은 상태 변화 없음
        (OfferEvent::Accept, OfferStatus::Winning)
            if ctx.item.winning_offer_id == Some(offer.id) =>
        {
            return Ok(unchanged(offer))
        }
        (OfferEvent::Accept, OfferStatus::Active) => {
            if !ctx.item.is_available() {
                return Err(TransitionError::ItemNotAvailable {
                    item_id: ctx.item.id,
                });
            }
            (OfferStatus::Winning, HistoryAction::Accepted)
        }
        (OfferEvent::Reject, OfferStatus::Rejected) => return Ok(unchanged(offer)),
        (OfferEvent::Reject, OfferStatus::Active) => (OfferStatus::Rejected, HistoryAction::Rejected),
        (OfferEvent::Cancel, OfferStatus::Cancelled) => return Ok(unchanged(offer)),
        (OfferEvent::Cancel, OfferStatus::Active) => {
            (OfferStatus::Cancelled, HistoryAction::Cancelled)
        }
        (OfferEvent::Outbid, OfferStatus::Active) => (OfferStatus::Outbid, HistoryAction::Outbid),
        (OfferEvent::Expire, OfferStatus::Active) => (OfferStatus::Expired, HistoryAction::Expired),
        (OfferEvent::Raise { amount }, OfferStatus::Active) => {
            return raise(offer, ctx, amount, now);
        }
        _ => return Err(invalid()),
    };

    let mut next = offer.clone();
    next.status = status;
    next.updated_at = now;
    Ok(Transition {
        offer: next,
        changed: true,
        history: Some(history),
    })
}

fn raise(
    offer: &Offer,
    ctx: &OfferContext<'_>,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Transition, TransitionError> {
    if !ctx.item.is_available() {
        return Err(TransitionError::ItemNotAvailable {
            item_id: ctx.item.id,
        });
    }

    let minimum = minimum_next_offer(ctx.item, ctx.highest_active)
        .max(offer.offer_amount.saturating_add(1));
    if amount < minimum {
        return Err(TransitionError::AmountTooLow { amount, minimum });
    }

    let mut next = offer.clone();
    next.offer_amount = amount;
    // 최대 금액이 새 금액보다 낮으면 함께 끌어올린다
    next.max_offer = offer.max_offer.map(|max_offer| max_offer.max(amount));
    next.updated_at = now;
    Ok(Transition {
        offer: next,
        changed: true,
        history: Some(HistoryAction::Increased),
    })
}

fn unchanged(offer: &Offer) -> Transition {
    Transition {
        offer: offer.clone(),
        changed: false,
        history: None,
    }
}

// endregion: --- Transition
