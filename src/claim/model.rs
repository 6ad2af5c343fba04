use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// region:    --- Status Enums

/// 판매자 계정 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SellerStatus {
    Pending,
    Active,
    Suspended,
}

impl SellerStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SellerStatus::Pending => "pending",
            SellerStatus::Active => "active",
            SellerStatus::Suspended => "suspended",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum SaleStatus {
    Active,
    Closed,
}

impl SaleStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SaleStatus::Active => "active",
            SaleStatus::Closed => "closed",
        }
    }
}

/// 상품 상태. `sold` 는 `claimed` 의 별칭으로 받는다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum ItemStatus {
    Available,
    #[serde(alias = "sold")]
    Claimed,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Available => "available",
            ItemStatus::Claimed => "claimed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum AuthMethod {
    Email,
    Sms,
}

impl AuthMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthMethod::Email => "email",
            AuthMethod::Sms => "sms",
        }
    }
}

/// 오퍼 상태. `active` 외의 모든 상태는 종결 상태다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum OfferStatus {
    Active,
    Winning,
    Rejected,
    Outbid,
    Expired,
    Cancelled,
}

impl OfferStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OfferStatus::Active => "active",
            OfferStatus::Winning => "winning",
            OfferStatus::Rejected => "rejected",
            OfferStatus::Outbid => "outbid",
            OfferStatus::Expired => "expired",
            OfferStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, OfferStatus::Active)
    }
}

/// 오퍼 이력에 남는 동작
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "lowercase")]
#[sqlx(type_name = "text", rename_all = "lowercase")]
pub enum HistoryAction {
    Placed,
    Increased,
    Accepted,
    Rejected,
    Outbid,
    Expired,
    Cancelled,
}

impl HistoryAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            HistoryAction::Placed => "placed",
            HistoryAction::Increased => "increased",
            HistoryAction::Accepted => "accepted",
            HistoryAction::Rejected => "rejected",
            HistoryAction::Outbid => "outbid",
            HistoryAction::Expired => "expired",
            HistoryAction::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[serde(rename_all = "snake_case")]
#[sqlx(type_name = "text", rename_all = "snake_case")]
pub enum NotificationKind {
    NewOffer,
    OfferAccepted,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::NewOffer => "new_offer",
            NotificationKind::OfferAccepted => "offer_accepted",
        }
    }
}

// endregion: --- Status Enums

// region:    --- Entities

/// 판매자(에스테이트 세일 업체)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Seller {
    pub id: i64,
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    #[serde(skip_serializing, default)]
    pub password_hash: String,
    pub status: SellerStatus,
    #[serde(skip_serializing, default)]
    pub session_token_hash: Option<String>,
    #[serde(skip_serializing, default)]
    pub session_expires: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 클레임 세일. 프리뷰/클레임/픽업 시간대를 가진다.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Sale {
    pub id: i64,
    pub seller_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub preview_start: Option<DateTime<Utc>>,
    pub preview_end: Option<DateTime<Utc>>,
    pub claim_start: DateTime<Utc>,
    pub claim_end: DateTime<Utc>,
    pub pickup_start: DateTime<Utc>,
    pub pickup_end: DateTime<Utc>,
    pub access_code: String,
    pub qr_code: String,
    pub status: SaleStatus,
    pub show_price_ranges: bool,
    pub created_at: DateTime<Utc>,
}

/// 상품 모델. 금액은 모두 센트 단위 정수.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Item {
    pub id: i64,
    pub sale_id: i64,
    pub item_number: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub starting_price: i64,
    pub offer_increment: i64,
    pub buy_now_price: Option<i64>,
    pub category: Option<String>,
    pub condition_rating: Option<i16>,
    pub status: ItemStatus,
    pub winning_offer_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Item {
    pub fn is_available(&self) -> bool {
        self.status == ItemStatus::Available
    }
}

/// 세일 단위로 등록되는 구매자
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Buyer {
    pub id: i64,
    pub sale_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub auth_method: AuthMethod,
    #[serde(skip_serializing, default)]
    pub auth_code_hash: Option<String>,
    #[serde(skip_serializing, default)]
    pub auth_code_expires: Option<DateTime<Utc>>,
    pub failed_attempts: i32,
    pub auth_verified: bool,
    #[serde(skip_serializing, default)]
    pub session_token_hash: Option<String>,
    pub session_expires: Option<DateTime<Utc>>,
    pub last_activity: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl Buyer {
    /// 인증 수단에 해당하는 연락처
    pub fn contact(&self) -> Option<&str> {
        match self.auth_method {
            AuthMethod::Email => self.email.as_deref(),
            AuthMethod::Sms => self.phone.as_deref(),
        }
    }
}

/// 오퍼(입찰) 모델
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Offer {
    pub id: i64,
    pub item_id: i64,
    pub buyer_id: i64,
    pub offer_amount: i64,
    pub max_offer: Option<i64>,
    pub status: OfferStatus,
    pub seller_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// 오퍼 감사 이력 (추가 전용)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OfferHistoryEntry {
    pub id: i64,
    pub offer_id: i64,
    pub item_id: i64,
    pub buyer_id: i64,
    pub buyer_name: String,
    pub offer_amount: i64,
    pub action: HistoryAction,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct SellerNotification {
    pub id: i64,
    pub seller_id: i64,
    pub sale_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// endregion: --- Entities

// region:    --- Inputs

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSeller {
    pub company_name: String,
    pub contact_name: String,
    pub email: String,
    pub phone: Option<String>,
    pub password_hash: String,
    pub status: SellerStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSale {
    pub seller_id: i64,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    pub preview_start: Option<DateTime<Utc>>,
    pub preview_end: Option<DateTime<Utc>>,
    pub claim_start: DateTime<Utc>,
    pub claim_end: DateTime<Utc>,
    pub pickup_start: DateTime<Utc>,
    pub pickup_end: DateTime<Utc>,
    pub access_code: String,
    pub qr_code: String,
    pub show_price_ranges: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewItem {
    pub sale_id: i64,
    pub item_number: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub starting_price: i64,
    pub offer_increment: i64,
    pub buy_now_price: Option<i64>,
    pub category: Option<String>,
    pub condition_rating: Option<i16>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewBuyer {
    pub sale_id: i64,
    pub name: String,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub auth_method: AuthMethod,
    pub auth_code_hash: String,
    pub auth_code_expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOffer {
    pub item_id: i64,
    pub buyer_id: i64,
    pub offer_amount: i64,
    pub max_offer: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewNotification {
    pub seller_id: i64,
    pub sale_id: i64,
    pub kind: NotificationKind,
    pub title: String,
    pub message: String,
}

// endregion: --- Inputs

// region:    --- Read Models

/// 세일 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleStats {
    pub total_items: i64,
    pub items_with_offers: i64,
    pub total_offers: i64,
    pub claimed_items: i64,
    pub unique_buyers: i64,
}

/// 판매자 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SellerStats {
    pub total_sales: i64,
    pub active_sales: i64,
    pub total_items: i64,
    pub total_offers: i64,
}

/// 구매자 오퍼 통계
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuyerStats {
    pub buyer_id: i64,
    pub total_offers: i64,
    pub active_offers: i64,
    pub winning_offers: i64,
}

/// 상품별 활성 오퍼 요약
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OfferSummary {
    pub item_id: i64,
    pub offer_count: i64,
    pub unique_buyers: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_offer: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_offer: Option<i64>,
}

/// 목록 조회용 오퍼 (구매자 이름, 상품/세일 제목 포함)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OfferListing {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub offer: Offer,
    pub buyer_name: String,
    pub item_title: String,
    pub item_status: ItemStatus,
    pub sale_id: i64,
    pub sale_title: String,
}

// endregion: --- Read Models
