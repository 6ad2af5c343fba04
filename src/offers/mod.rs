/// 오퍼 조회
// region:    --- Imports
use crate::auth::{ensure_sale_access, Principal};
use crate::claim::model::{Buyer, OfferHistoryEntry, OfferListing, OfferStatus, OfferSummary};
use crate::error::{ClaimError, Result};
use crate::store::{ClaimStore, ListQuery};

pub mod commands;
// endregion: --- Imports

/// 상품이 속한 세일에 대한 접근 권한
async fn authorize_item(item_id: i64, principal: &Principal, store: &dyn ClaimStore) -> Result<()> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("item", item_id))?;
    let sale = store
        .get_sale(item.sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", item.sale_id))?;
    ensure_sale_access(principal, &sale)
}

/// 상품 오퍼 이력 (최신순)
pub async fn item_history(
    item_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Vec<OfferHistoryEntry>> {
    authorize_item(item_id, principal, store).await?;
    store.offer_history(item_id).await
}

/// 판매자 검토용: 금액 내림차순, 같은 금액은 먼저 들어온 순
pub async fn item_offers(
    item_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Vec<OfferListing>> {
    authorize_item(item_id, principal, store).await?;
    store.offers_for_item(item_id).await
}

pub async fn list_offers(
    query: &ListQuery<OfferStatus>,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Vec<OfferListing>> {
    store.list_offers(query, principal.seller_scope()).await
}

pub async fn buyer_offers(
    buyer: &Buyer,
    status: Option<OfferStatus>,
    store: &dyn ClaimStore,
) -> Result<Vec<OfferListing>> {
    store.offers_for_buyer(buyer.id, status).await
}

/// 공개 요약. 세일이 가격대 공개를 켠 경우에만 최저/최고 금액을 싣는다
pub async fn item_summary(item_id: i64, store: &dyn ClaimStore) -> Result<OfferSummary> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("item", item_id))?;
    let sale = store
        .get_sale(item.sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", item.sale_id))?;

    let mut summary = store.offer_summary(item_id).await?;
    if !sale.show_price_ranges {
        summary.min_offer = None;
        summary.max_offer = None;
    }
    Ok(summary)
}
