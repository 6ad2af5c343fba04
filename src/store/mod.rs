/// 클레임 세일 저장소
/// 엔티티별 타입 메서드만 노출하고, 여러 행을 건드리는 변경은 한 트랜잭션으로 처리한다.
// region:    --- Imports
use crate::claim::model::{
    AuthMethod, Buyer, BuyerStats, Item, ItemStatus, NewBuyer, NewItem, NewNotification,
    NewOffer, NewSale, NewSeller, Offer, OfferHistoryEntry, OfferListing, OfferStatus,
    OfferSummary, Sale, SaleStats, SaleStatus, Seller, SellerNotification, SellerStats,
    SellerStatus,
};
use crate::claim::transition::OfferEvent;
use crate::claim::verification::{AttemptOutcome, CodeAttempt};
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

pub mod memory;
pub mod postgres;
pub mod queries;

pub use memory::InMemoryClaimStore;
pub use postgres::PgClaimStore;
// endregion: --- Imports

// region:    --- Query Types

pub const PAGE_SIZE: i64 = 50;

/// 목록 조회 공통 조건 (status / search / page)
#[derive(Debug, Clone, Deserialize)]
pub struct ListQuery<S> {
    pub status: Option<S>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

impl<S> Default for ListQuery<S> {
    fn default() -> Self {
        Self {
            status: None,
            search: None,
            page: None,
        }
    }
}

impl<S> ListQuery<S> {
    pub fn with_status(status: S) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// 1부터 시작하는 페이지 번호
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    pub fn offset(&self) -> i64 {
        (i64::from(self.page()) - 1) * PAGE_SIZE
    }

    pub fn limit(&self) -> i64 {
        PAGE_SIZE
    }

    /// 공백을 제거한 검색어
    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

/// 구매자 목록 조건
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BuyerQuery {
    pub sale_id: Option<i64>,
    pub verified: Option<bool>,
    pub search: Option<String>,
    pub page: Option<u32>,
}

impl BuyerQuery {
    pub fn as_list(&self) -> ListQuery<bool> {
        ListQuery {
            status: self.verified,
            search: self.search.clone(),
            page: self.page,
        }
    }
}

/// 상품 목록 조건. 검색은 제목/설명/상품 번호
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ItemQuery {
    pub status: Option<ItemStatus>,
    pub category: Option<String>,
    pub search: Option<String>,
}

impl ItemQuery {
    pub fn category(&self) -> Option<&str> {
        self.category
            .as_deref()
            .map(str::trim)
            .filter(|category| !category.is_empty())
    }

    pub fn search_term(&self) -> Option<&str> {
        self.search
            .as_deref()
            .map(str::trim)
            .filter(|term| !term.is_empty())
    }
}

// endregion: --- Query Types

// region:    --- Outcomes

/// 오퍼 상태 변경 결과
#[derive(Debug, Clone)]
pub struct OfferOutcome {
    pub offer: Offer,
    pub item: Item,
    /// 수락으로 밀려난 오퍼들
    pub outbid: Vec<Offer>,
    pub changed: bool,
    /// 상향이 즉시 구매가에 닿아 같은 트랜잭션에서 낙찰된 경우
    pub bought_now: bool,
}

/// 오퍼 등록 결과
#[derive(Debug, Clone)]
pub struct PlaceOutcome {
    pub offer: Offer,
    pub item: Item,
    /// 기존 활성 오퍼를 올린 경우
    pub raised: bool,
    /// 즉시 구매가에 도달해 바로 낙찰된 경우
    pub accepted: Option<OfferOutcome>,
}

// endregion: --- Outcomes

// region:    --- Claim Store Trait

/// 저장소 트레이트
#[async_trait]
pub trait ClaimStore: Send + Sync {
    // -- Sellers
    async fn insert_seller(&self, seller: NewSeller, now: DateTime<Utc>) -> Result<Seller>;
    async fn get_seller(&self, id: i64) -> Result<Option<Seller>>;
    async fn find_seller_by_email(&self, email: &str) -> Result<Option<Seller>>;
    async fn find_seller_by_session(&self, token_hash: &str) -> Result<Option<Seller>>;
    async fn list_sellers(&self, query: &ListQuery<SellerStatus>) -> Result<Vec<Seller>>;
    async fn update_seller(&self, seller: &Seller, now: DateTime<Utc>) -> Result<Seller>;
    /// 활성 세일이 있으면 거부, 없으면 종료된 세일까지 함께 삭제
    async fn delete_seller(&self, id: i64) -> Result<()>;
    async fn seller_stats(&self, id: i64) -> Result<SellerStats>;

    // -- Sales
    async fn insert_sale(&self, sale: NewSale, now: DateTime<Utc>) -> Result<Sale>;
    async fn get_sale(&self, id: i64) -> Result<Option<Sale>>;
    async fn find_sale_by_access_code(&self, code: &str) -> Result<Option<Sale>>;
    async fn find_sale_by_qr_code(&self, code: &str) -> Result<Option<Sale>>;
    async fn list_sales(
        &self,
        query: &ListQuery<SaleStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<Sale>>;
    async fn current_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>>;
    async fn upcoming_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>>;
    async fn update_sale(&self, sale: &Sale) -> Result<Sale>;
    /// 상품/오퍼/이력/구매자까지 한 트랜잭션으로 삭제
    async fn delete_sale(&self, id: i64) -> Result<()>;
    async fn close_finished_sales(&self, now: DateTime<Utc>) -> Result<Vec<i64>>;
    async fn sale_stats(&self, id: i64) -> Result<SaleStats>;

    // -- Items
    async fn insert_item(&self, item: NewItem, now: DateTime<Utc>) -> Result<Item>;
    async fn get_item(&self, id: i64) -> Result<Option<Item>>;
    async fn list_items(&self, sale_id: i64, query: &ItemQuery) -> Result<Vec<Item>>;
    /// available 상태에서만 수정 가능
    async fn update_item(&self, item: &Item) -> Result<Item>;
    async fn delete_item(&self, id: i64) -> Result<()>;

    // -- Buyers
    async fn insert_buyer(&self, buyer: NewBuyer, now: DateTime<Utc>) -> Result<Buyer>;
    async fn get_buyer(&self, id: i64) -> Result<Option<Buyer>>;
    async fn find_buyer_by_contact(
        &self,
        sale_id: i64,
        method: AuthMethod,
        contact: &str,
    ) -> Result<Option<Buyer>>;
    async fn find_buyer_by_session(&self, token_hash: &str) -> Result<Option<Buyer>>;
    async fn list_buyers(&self, query: &BuyerQuery) -> Result<Vec<Buyer>>;
    /// 새 코드 저장, 실패 횟수 초기화. 이름이 오면 함께 갱신
    async fn issue_buyer_code(
        &self,
        id: i64,
        name: Option<&str>,
        code_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<Buyer>;
    /// 구매자 행을 잠근 채 코드 확인 시도 하나를 반영
    async fn attempt_buyer_code(
        &self,
        attempt: &CodeAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome>;
    async fn touch_buyer(&self, id: i64, now: DateTime<Utc>) -> Result<()>;
    async fn end_buyer_session(&self, id: i64) -> Result<()>;
    async fn buyer_stats(&self, id: i64) -> Result<BuyerStats>;
    async fn delete_buyer(&self, id: i64) -> Result<()>;
    async fn clear_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64>;
    /// 코드 만료 후 cutoff 이전까지 인증하지 않은 구매자 삭제
    async fn purge_unverified_buyers(&self, cutoff: DateTime<Utc>) -> Result<u64>;

    // -- Offers
    /// 같은 구매자의 활성 오퍼가 있으면 금액 상향으로 처리
    /// 즉시 구매가 이상이면 같은 트랜잭션에서 낙찰
    async fn place_offer(&self, offer: NewOffer, now: DateTime<Utc>) -> Result<PlaceOutcome>;
    /// `Raise` 가 즉시 구매가에 닿으면 같은 트랜잭션에서 수락까지 처리
    async fn apply_offer_event(
        &self,
        offer_id: i64,
        event: OfferEvent,
        seller_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome>;
    async fn get_offer(&self, id: i64) -> Result<Option<Offer>>;
    /// 이력은 남긴다
    async fn delete_offer(&self, id: i64) -> Result<Offer>;
    async fn list_offers(
        &self,
        query: &ListQuery<OfferStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<OfferListing>>;
    async fn offers_for_item(&self, item_id: i64) -> Result<Vec<OfferListing>>;
    async fn offers_for_buyer(
        &self,
        buyer_id: i64,
        status: Option<OfferStatus>,
    ) -> Result<Vec<OfferListing>>;
    async fn offer_history(&self, item_id: i64) -> Result<Vec<OfferHistoryEntry>>;
    async fn offer_summary(&self, item_id: i64) -> Result<OfferSummary>;
    async fn expire_offers(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>>;

    // -- Notifications
    async fn insert_notification(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<SellerNotification>;
    async fn list_notifications(
        &self,
        seller_id: Option<i64>,
        unread_only: bool,
    ) -> Result<Vec<SellerNotification>>;
    async fn mark_notification_read(&self, id: i64, seller_id: Option<i64>) -> Result<()>;
}

// endregion: --- Claim Store Trait
