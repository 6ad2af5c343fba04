use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 커밋 이후 발행되는 도메인 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ClaimEvent {
    // 오퍼 등록
    OfferPlaced {
        offer_id: i64,
        item_id: i64,
        sale_id: i64,
        buyer_id: i64,
        amount: i64,
        timestamp: DateTime<Utc>,
    },
    // 오퍼 금액 상향
    OfferRaised {
        offer_id: i64,
        item_id: i64,
        sale_id: i64,
        amount: i64,
        timestamp: DateTime<Utc>,
    },
    // 판매자 수락 (낙찰)
    OfferAccepted {
        offer_id: i64,
        item_id: i64,
        sale_id: i64,
        buyer_id: i64,
        amount: i64,
        outbid_offer_ids: Vec<i64>,
        timestamp: DateTime<Utc>,
    },
    OfferRejected {
        offer_id: i64,
        item_id: i64,
        timestamp: DateTime<Utc>,
    },
    OfferCancelled {
        offer_id: i64,
        item_id: i64,
        timestamp: DateTime<Utc>,
    },
    OfferDeleted {
        offer_id: i64,
        timestamp: DateTime<Utc>,
    },
    OffersExpired {
        offer_ids: Vec<i64>,
        timestamp: DateTime<Utc>,
    },
    SaleClosed {
        sale_id: i64,
        timestamp: DateTime<Utc>,
    },
    SaleDeleted {
        sale_id: i64,
        timestamp: DateTime<Utc>,
    },
}

impl ClaimEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            ClaimEvent::OfferPlaced { .. } => "OfferPlaced",
            ClaimEvent::OfferRaised { .. } => "OfferRaised",
            ClaimEvent::OfferAccepted { .. } => "OfferAccepted",
            ClaimEvent::OfferRejected { .. } => "OfferRejected",
            ClaimEvent::OfferCancelled { .. } => "OfferCancelled",
            ClaimEvent::OfferDeleted { .. } => "OfferDeleted",
            ClaimEvent::OffersExpired { .. } => "OffersExpired",
            ClaimEvent::SaleClosed { .. } => "SaleClosed",
            ClaimEvent::SaleDeleted { .. } => "SaleDeleted",
        }
    }

    /// 파티션 키로 쓰는 집계 id
    pub fn aggregate_id(&self) -> i64 {
        match self {
            ClaimEvent::OfferPlaced { item_id, .. }
            | ClaimEvent::OfferRaised { item_id, .. }
            | ClaimEvent::OfferAccepted { item_id, .. }
            | ClaimEvent::OfferRejected { item_id, .. }
            | ClaimEvent::OfferCancelled { item_id, .. } => *item_id,
            ClaimEvent::OfferDeleted { offer_id, .. } => *offer_id,
            ClaimEvent::OffersExpired { offer_ids, .. } => {
                offer_ids.first().copied().unwrap_or_default()
            }
            ClaimEvent::SaleClosed { sale_id, .. } | ClaimEvent::SaleDeleted { sale_id, .. } => {
                *sale_id
            }
        }
    }
}
