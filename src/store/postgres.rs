/// PostgreSQL 저장소
/// 오퍼 상태 변경은 상품 행을 FOR UPDATE 로 잠근 트랜잭션 안에서만 일어난다.
// region:    --- Imports
use super::queries;
use super::{BuyerQuery, ClaimStore, ItemQuery, ListQuery, OfferOutcome, PlaceOutcome};
use crate::claim::model::{
    AuthMethod, Buyer, BuyerStats, HistoryAction, Item, ItemStatus, NewBuyer, NewItem,
    NewNotification, NewOffer, NewSale, NewSeller, Offer, OfferHistoryEntry, OfferListing,
    OfferStatus, OfferSummary, Sale, SaleStats, SaleStatus, Seller, SellerNotification,
    SellerStats, SellerStatus,
};
use crate::claim::transition::{
    reaches_buy_now, transition, validate_new_offer, OfferContext, OfferEvent, TransitionError,
};
use crate::claim::verification::{apply_attempt, AttemptOutcome, CodeAttempt};
use crate::database::DatabaseManager;
use crate::error::{ClaimError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use std::sync::Arc;
use tracing::{debug, info};
// endregion: --- Imports

// region:    --- Pg Claim Store

#[derive(Clone)]
pub struct PgClaimStore {
    db: Arc<DatabaseManager>,
}

impl PgClaimStore {
    pub fn new(db: Arc<DatabaseManager>) -> Self {
        Self { db }
    }
}

/// 유니크 제약 위반을 도메인 오류로 변환
fn map_unique(err: sqlx::Error, on_unique: impl FnOnce() -> ClaimError) -> ClaimError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => on_unique(),
        _ => ClaimError::Database(err),
    }
}

fn map_foreign_key(err: sqlx::Error, on_missing: impl FnOnce() -> ClaimError) -> ClaimError {
    match &err {
        sqlx::Error::Database(db) if db.is_foreign_key_violation() => on_missing(),
        _ => ClaimError::Database(err),
    }
}

// endregion: --- Pg Claim Store

// region:    --- Offer Helpers

async fn lock_item(conn: &mut PgConnection, item_id: i64) -> Result<Item> {
    sqlx::query_as::<_, Item>(queries::LOCK_ITEM)
        .bind(item_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ClaimError::not_found("item", item_id))
}

async fn load_offer(conn: &mut PgConnection, offer_id: i64) -> Result<Offer> {
    sqlx::query_as::<_, Offer>(queries::GET_OFFER)
        .bind(offer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ClaimError::not_found("offer", offer_id))
}

async fn offer_item_id(conn: &mut PgConnection, offer_id: i64) -> Result<i64> {
    sqlx::query_scalar::<_, i64>(queries::GET_OFFER_ITEM_ID)
        .bind(offer_id)
        .fetch_optional(&mut *conn)
        .await?
        .ok_or_else(|| ClaimError::not_found("offer", offer_id))
}

async fn highest_active(conn: &mut PgConnection, item_id: i64) -> Result<Option<i64>> {
    let highest = sqlx::query_scalar::<_, Option<i64>>(queries::HIGHEST_ACTIVE_OFFER)
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;
    Ok(highest)
}

async fn write_offer(conn: &mut PgConnection, offer: &Offer) -> Result<()> {
    sqlx::query(queries::UPDATE_OFFER)
        .bind(offer.id)
        .bind(offer.offer_amount)
        .bind(offer.max_offer)
        .bind(offer.status)
        .bind(&offer.seller_notes)
        .bind(offer.updated_at)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

async fn record(
    conn: &mut PgConnection,
    offer: &Offer,
    action: HistoryAction,
    now: DateTime<Utc>,
) -> Result<()> {
    sqlx::query(queries::INSERT_HISTORY)
        .bind(offer.id)
        .bind(offer.item_id)
        .bind(offer.buyer_id)
        .bind(offer.offer_amount)
        .bind(action)
        .bind(now)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

/// 상품을 잠근 뒤 상태 머신 적용. 수락이면 같은 트랜잭션에서 나머지 활성 오퍼를 밀어낸다.
async fn apply(
    conn: &mut PgConnection,
    offer_id: i64,
    event: OfferEvent,
    seller_notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<OfferOutcome> {
    let item_id = offer_item_id(conn, offer_id).await?;
    let mut item = lock_item(conn, item_id).await?;
    let offer = load_offer(conn, offer_id).await?;

    let ctx = OfferContext {
        item: &item,
        highest_active: highest_active(conn, item.id).await?,
    };
    let step = transition(&offer, &ctx, &event, now)?;
    if !step.changed {
        return Ok(OfferOutcome {
            offer,
            item,
            outbid: Vec::new(),
            changed: false,
            bought_now: false,
        });
    }

    let mut next = step.offer;
    if seller_notes.is_some() {
        next.seller_notes = seller_notes;
    }
    write_offer(conn, &next).await?;
    if let Some(action) = step.history {
        record(conn, &next, action, now).await?;
    }

    let mut outbid = Vec::new();
    if event == OfferEvent::Accept {
        sqlx::query(queries::CLAIM_ITEM)
            .bind(item.id)
            .bind(next.id)
            .execute(&mut *conn)
            .await?;
        item.status = ItemStatus::Claimed;
        item.winning_offer_id = Some(next.id);

        let siblings = sqlx::query_as::<_, Offer>(queries::ACTIVE_OFFERS_EXCEPT)
            .bind(item.id)
            .bind(next.id)
            .fetch_all(&mut *conn)
            .await?;
        for sibling in siblings {
            let ctx = OfferContext {
                item: &item,
                highest_active: None,
            };
            let step = transition(&sibling, &ctx, &OfferEvent::Outbid, now)?;
            write_offer(conn, &step.offer).await?;
            if let Some(action) = step.history {
                record(conn, &step.offer, action, now).await?;
            }
            outbid.push(step.offer);
        }
    }

    Ok(OfferOutcome {
        offer: next,
        item,
        outbid,
        changed: true,
        bought_now: false,
    })
}

/// 상향이 즉시 구매가에 닿으면 같은 트랜잭션에서 이어서 수락
async fn apply_event(
    conn: &mut PgConnection,
    offer_id: i64,
    event: OfferEvent,
    seller_notes: Option<String>,
    now: DateTime<Utc>,
) -> Result<OfferOutcome> {
    let outcome = apply(conn, offer_id, event, seller_notes, now).await?;
    let is_raise = matches!(event, OfferEvent::Raise { .. });
    if !is_raise
        || !outcome.changed
        || !reaches_buy_now(&outcome.item, outcome.offer.offer_amount)
    {
        return Ok(outcome);
    }
    let mut accepted = apply(conn, offer_id, OfferEvent::Accept, None, now).await?;
    accepted.bought_now = true;
    Ok(accepted)
}

async fn place(conn: &mut PgConnection, new: NewOffer, now: DateTime<Utc>) -> Result<PlaceOutcome> {
    let item = lock_item(conn, new.item_id).await?;
    let buyer = sqlx::query_as::<_, Buyer>(queries::GET_BUYER)
        .bind(new.buyer_id)
        .fetch_optional(&mut *conn)
        .await?;
    if buyer.is_none() {
        return Err(ClaimError::not_found("buyer", new.buyer_id));
    }

    let existing = sqlx::query_as::<_, Offer>(queries::FIND_ACTIVE_OFFER_FOR_BUYER)
        .bind(new.item_id)
        .bind(new.buyer_id)
        .fetch_optional(&mut *conn)
        .await?;

    let (placed, raised) = match existing {
        Some(current) => {
            if let Some(max_offer) = new.max_offer {
                if max_offer < new.offer_amount {
                    return Err(TransitionError::MaxOfferBelowAmount {
                        amount: new.offer_amount,
                        max_offer,
                    }
                    .into());
                }
            }
            let outcome = apply(
                conn,
                current.id,
                OfferEvent::Raise {
                    amount: new.offer_amount,
                },
                None,
                now,
            )
            .await?;
            let mut raised = outcome.offer;
            if new.max_offer.is_some() {
                raised.max_offer = new.max_offer;
                write_offer(conn, &raised).await?;
            }
            (raised, true)
        }
        None => {
            let ctx = OfferContext {
                item: &item,
                highest_active: highest_active(conn, item.id).await?,
            };
            validate_new_offer(&ctx, new.offer_amount, new.max_offer)?;
            let offer = sqlx::query_as::<_, Offer>(queries::INSERT_OFFER)
                .bind(new.item_id)
                .bind(new.buyer_id)
                .bind(new.offer_amount)
                .bind(new.max_offer)
                .bind(now)
                .fetch_one(&mut *conn)
                .await?;
            record(conn, &offer, HistoryAction::Placed, now).await?;
            (offer, false)
        }
    };

    let accepted = if reaches_buy_now(&item, placed.offer_amount) {
        Some(apply(conn, placed.id, OfferEvent::Accept, None, now).await?)
    } else {
        None
    };

    let (offer, item) = match &accepted {
        Some(outcome) => (outcome.offer.clone(), outcome.item.clone()),
        None => (placed, item),
    };
    Ok(PlaceOutcome {
        offer,
        item,
        raised,
        accepted,
    })
}

// endregion: --- Offer Helpers

// region:    --- Claim Store Impl

#[async_trait]
impl ClaimStore for PgClaimStore {
    // -- Sellers

    async fn insert_seller(&self, seller: NewSeller, now: DateTime<Utc>) -> Result<Seller> {
        let email = seller.email.clone();
        sqlx::query_as::<_, Seller>(queries::INSERT_SELLER)
            .bind(&seller.company_name)
            .bind(&seller.contact_name)
            .bind(&seller.email)
            .bind(&seller.phone)
            .bind(&seller.password_hash)
            .bind(seller.status)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_unique(e, || ClaimError::DuplicateEmail(email)))
    }

    async fn get_seller(&self, id: i64) -> Result<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(queries::GET_SELLER)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(seller)
    }

    async fn find_seller_by_email(&self, email: &str) -> Result<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(queries::FIND_SELLER_BY_EMAIL)
            .bind(email)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(seller)
    }

    async fn find_seller_by_session(&self, token_hash: &str) -> Result<Option<Seller>> {
        let seller = sqlx::query_as::<_, Seller>(queries::FIND_SELLER_BY_SESSION)
            .bind(token_hash)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(seller)
    }

    async fn list_sellers(&self, query: &ListQuery<SellerStatus>) -> Result<Vec<Seller>> {
        let sellers = sqlx::query_as::<_, Seller>(queries::LIST_SELLERS)
            .bind(query.status)
            .bind(query.search_term())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(self.db.pool())
            .await?;
        Ok(sellers)
    }

    async fn update_seller(&self, seller: &Seller, now: DateTime<Utc>) -> Result<Seller> {
        let email = seller.email.clone();
        sqlx::query_as::<_, Seller>(queries::UPDATE_SELLER)
            .bind(seller.id)
            .bind(&seller.company_name)
            .bind(&seller.contact_name)
            .bind(&seller.email)
            .bind(&seller.phone)
            .bind(&seller.password_hash)
            .bind(seller.status)
            .bind(&seller.session_token_hash)
            .bind(seller.session_expires)
            .bind(now)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_unique(e, || ClaimError::DuplicateEmail(email)))?
            .ok_or_else(|| ClaimError::not_found("seller", seller.id))
    }

    async fn delete_seller(&self, id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let active: i64 =
                        sqlx::query_scalar(queries::COUNT_ACTIVE_SALES_FOR_SELLER)
                            .bind(id)
                            .fetch_one(&mut **tx)
                            .await?;
                    if active > 0 {
                        return Err(ClaimError::SellerHasActiveSales { seller_id: id });
                    }
                    let deleted = sqlx::query(queries::DELETE_SELLER)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    if deleted.rows_affected() == 0 {
                        return Err(ClaimError::not_found("seller", id));
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn seller_stats(&self, id: i64) -> Result<SellerStats> {
        let (total_sales, active_sales, total_items, total_offers) =
            sqlx::query_as::<_, (i64, i64, i64, i64)>(queries::SELLER_STATS)
                .bind(id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(SellerStats {
            total_sales,
            active_sales,
            total_items,
            total_offers,
        })
    }

    // -- Sales

    async fn insert_sale(&self, sale: NewSale, now: DateTime<Utc>) -> Result<Sale> {
        let seller_id = sale.seller_id;
        sqlx::query_as::<_, Sale>(queries::INSERT_SALE)
            .bind(sale.seller_id)
            .bind(&sale.title)
            .bind(&sale.description)
            .bind(&sale.address)
            .bind(&sale.city)
            .bind(&sale.state)
            .bind(&sale.zip)
            .bind(sale.preview_start)
            .bind(sale.preview_end)
            .bind(sale.claim_start)
            .bind(sale.claim_end)
            .bind(sale.pickup_start)
            .bind(sale.pickup_end)
            .bind(&sale.access_code)
            .bind(&sale.qr_code)
            .bind(sale.show_price_ranges)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| match &e {
                sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                    ClaimError::not_found("seller", seller_id)
                }
                _ => map_unique(e, || ClaimError::DuplicateAccessCode),
            })
    }

    async fn get_sale(&self, id: i64) -> Result<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(queries::GET_SALE)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(sale)
    }

    async fn find_sale_by_access_code(&self, code: &str) -> Result<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(queries::FIND_SALE_BY_ACCESS_CODE)
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(sale)
    }

    async fn find_sale_by_qr_code(&self, code: &str) -> Result<Option<Sale>> {
        let sale = sqlx::query_as::<_, Sale>(queries::FIND_SALE_BY_QR_CODE)
            .bind(code)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(sale)
    }

    async fn list_sales(
        &self,
        query: &ListQuery<SaleStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(queries::LIST_SALES)
            .bind(seller_id)
            .bind(query.status)
            .bind(query.search_term())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(self.db.pool())
            .await?;
        Ok(sales)
    }

    async fn current_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(queries::CURRENT_SALES)
            .bind(now)
            .fetch_all(self.db.pool())
            .await?;
        Ok(sales)
    }

    async fn upcoming_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>> {
        let sales = sqlx::query_as::<_, Sale>(queries::UPCOMING_SALES)
            .bind(now)
            .fetch_all(self.db.pool())
            .await?;
        Ok(sales)
    }

    async fn update_sale(&self, sale: &Sale) -> Result<Sale> {
        sqlx::query_as::<_, Sale>(queries::UPDATE_SALE)
            .bind(sale.id)
            .bind(&sale.title)
            .bind(&sale.description)
            .bind(&sale.address)
            .bind(&sale.city)
            .bind(&sale.state)
            .bind(&sale.zip)
            .bind(sale.preview_start)
            .bind(sale.preview_end)
            .bind(sale.claim_start)
            .bind(sale.claim_end)
            .bind(sale.pickup_start)
            .bind(sale.pickup_end)
            .bind(&sale.access_code)
            .bind(&sale.qr_code)
            .bind(sale.status)
            .bind(sale.show_price_ranges)
            .fetch_optional(self.db.pool())
            .await
            .map_err(|e| map_unique(e, || ClaimError::DuplicateAccessCode))?
            .ok_or_else(|| ClaimError::not_found("sale", sale.id))
    }

    async fn delete_sale(&self, id: i64) -> Result<()> {
        // 상품/구매자/오퍼/이력/알림은 FK CASCADE 로 함께 삭제
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let deleted = sqlx::query(queries::DELETE_SALE)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    if deleted.rows_affected() == 0 {
                        return Err(ClaimError::not_found("sale", id));
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn close_finished_sales(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let closed = sqlx::query_scalar::<_, i64>(queries::CLOSE_FINISHED_SALES)
            .bind(now)
            .fetch_all(self.db.pool())
            .await?;
        Ok(closed)
    }

    async fn sale_stats(&self, id: i64) -> Result<SaleStats> {
        let (total_items, items_with_offers, total_offers, claimed_items, unique_buyers) =
            sqlx::query_as::<_, (i64, i64, i64, i64, i64)>(queries::SALE_STATS)
                .bind(id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(SaleStats {
            total_items,
            items_with_offers,
            total_offers,
            claimed_items,
            unique_buyers,
        })
    }

    // -- Items

    async fn insert_item(&self, item: NewItem, now: DateTime<Utc>) -> Result<Item> {
        let sale_id = item.sale_id;
        sqlx::query_as::<_, Item>(queries::INSERT_ITEM)
            .bind(item.sale_id)
            .bind(&item.item_number)
            .bind(&item.title)
            .bind(&item.description)
            .bind(item.starting_price)
            .bind(item.offer_increment)
            .bind(item.buy_now_price)
            .bind(&item.category)
            .bind(item.condition_rating)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_foreign_key(e, || ClaimError::not_found("sale", sale_id)))
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>> {
        let item = sqlx::query_as::<_, Item>(queries::GET_ITEM)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(item)
    }

    async fn list_items(&self, sale_id: i64, query: &ItemQuery) -> Result<Vec<Item>> {
        let items = sqlx::query_as::<_, Item>(queries::LIST_ITEMS)
            .bind(sale_id)
            .bind(query.status)
            .bind(query.category())
            .bind(query.search_term())
            .fetch_all(self.db.pool())
            .await?;
        Ok(items)
    }

    async fn update_item(&self, item: &Item) -> Result<Item> {
        let item = item.clone();
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let current = lock_item(&mut **tx, item.id).await?;
                    if !current.is_available() {
                        return Err(ClaimError::ItemLocked { item_id: item.id });
                    }
                    let updated = sqlx::query_as::<_, Item>(queries::UPDATE_ITEM)
                        .bind(item.id)
                        .bind(&item.item_number)
                        .bind(&item.title)
                        .bind(&item.description)
                        .bind(item.starting_price)
                        .bind(item.offer_increment)
                        .bind(item.buy_now_price)
                        .bind(&item.category)
                        .bind(item.condition_rating)
                        .fetch_one(&mut **tx)
                        .await?;
                    Ok(updated)
                })
            })
            .await
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let current = lock_item(&mut **tx, id).await?;
                    if !current.is_available() {
                        return Err(ClaimError::ItemLocked { item_id: id });
                    }
                    sqlx::query(queries::DELETE_ITEM)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(())
                })
            })
            .await
    }

    // -- Buyers

    async fn insert_buyer(&self, buyer: NewBuyer, now: DateTime<Utc>) -> Result<Buyer> {
        let sale_id = buyer.sale_id;
        sqlx::query_as::<_, Buyer>(queries::INSERT_BUYER)
            .bind(buyer.sale_id)
            .bind(&buyer.name)
            .bind(&buyer.email)
            .bind(&buyer.phone)
            .bind(buyer.auth_method)
            .bind(&buyer.auth_code_hash)
            .bind(buyer.auth_code_expires)
            .bind(now)
            .fetch_one(self.db.pool())
            .await
            .map_err(|e| map_foreign_key(e, || ClaimError::not_found("sale", sale_id)))
    }

    async fn get_buyer(&self, id: i64) -> Result<Option<Buyer>> {
        let buyer = sqlx::query_as::<_, Buyer>(queries::GET_BUYER)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(buyer)
    }

    async fn find_buyer_by_contact(
        &self,
        sale_id: i64,
        method: AuthMethod,
        contact: &str,
    ) -> Result<Option<Buyer>> {
        let sql = match method {
            AuthMethod::Email => queries::FIND_BUYER_BY_EMAIL,
            AuthMethod::Sms => queries::FIND_BUYER_BY_PHONE,
        };
        let buyer = sqlx::query_as::<_, Buyer>(sql)
            .bind(sale_id)
            .bind(contact)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(buyer)
    }

    async fn find_buyer_by_session(&self, token_hash: &str) -> Result<Option<Buyer>> {
        let buyer = sqlx::query_as::<_, Buyer>(queries::FIND_BUYER_BY_SESSION)
            .bind(token_hash)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(buyer)
    }

    async fn list_buyers(&self, query: &BuyerQuery) -> Result<Vec<Buyer>> {
        let list = query.as_list();
        let buyers = sqlx::query_as::<_, Buyer>(queries::LIST_BUYERS)
            .bind(query.sale_id)
            .bind(list.status)
            .bind(list.search_term())
            .bind(list.limit())
            .bind(list.offset())
            .fetch_all(self.db.pool())
            .await?;
        Ok(buyers)
    }

    async fn issue_buyer_code(
        &self,
        id: i64,
        name: Option<&str>,
        code_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<Buyer> {
        sqlx::query_as::<_, Buyer>(queries::ISSUE_BUYER_CODE)
            .bind(id)
            .bind(name)
            .bind(code_hash)
            .bind(expires)
            .fetch_optional(self.db.pool())
            .await?
            .ok_or_else(|| ClaimError::not_found("buyer", id))
    }

    async fn attempt_buyer_code(
        &self,
        attempt: &CodeAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        let attempt = attempt.clone();
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let buyer = sqlx::query_as::<_, Buyer>(queries::LOCK_BUYER)
                        .bind(attempt.buyer_id)
                        .fetch_optional(&mut **tx)
                        .await?
                        .ok_or_else(|| ClaimError::not_found("buyer", attempt.buyer_id))?;
                    // 실패도 커밋해야 하므로 결과는 오류가 아니라 값으로 돌려준다
                    let outcome = apply_attempt(buyer, &attempt, now);
                    if outcome.changed {
                        let buyer = &outcome.buyer;
                        sqlx::query(queries::SAVE_CODE_ATTEMPT)
                            .bind(buyer.id)
                            .bind(&buyer.auth_code_hash)
                            .bind(buyer.auth_code_expires)
                            .bind(buyer.failed_attempts)
                            .bind(buyer.auth_verified)
                            .bind(&buyer.session_token_hash)
                            .bind(buyer.session_expires)
                            .bind(buyer.last_activity)
                            .execute(&mut **tx)
                            .await?;
                    }
                    Ok(outcome)
                })
            })
            .await
    }

    async fn touch_buyer(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        let touched = sqlx::query(queries::TOUCH_BUYER)
            .bind(id)
            .bind(now)
            .execute(self.db.pool())
            .await?;
        if touched.rows_affected() == 0 {
            return Err(ClaimError::not_found("buyer", id));
        }
        Ok(())
    }

    async fn end_buyer_session(&self, id: i64) -> Result<()> {
        let ended = sqlx::query(queries::END_BUYER_SESSION)
            .bind(id)
            .execute(self.db.pool())
            .await?;
        if ended.rows_affected() == 0 {
            return Err(ClaimError::not_found("buyer", id));
        }
        Ok(())
    }

    async fn buyer_stats(&self, id: i64) -> Result<BuyerStats> {
        if self.get_buyer(id).await?.is_none() {
            return Err(ClaimError::not_found("buyer", id));
        }
        let (total_offers, active_offers, winning_offers) =
            sqlx::query_as::<_, (i64, i64, i64)>(queries::BUYER_STATS)
                .bind(id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(BuyerStats {
            buyer_id: id,
            total_offers,
            active_offers,
            winning_offers,
        })
    }

    async fn delete_buyer(&self, id: i64) -> Result<()> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let winning: i64 =
                        sqlx::query_scalar(queries::COUNT_WINNING_OFFERS_FOR_BUYER)
                            .bind(id)
                            .fetch_one(&mut **tx)
                            .await?;
                    if winning > 0 {
                        return Err(ClaimError::Conflict(
                            "buyer holds a winning offer".to_string(),
                        ));
                    }
                    // 오퍼와 이력은 FK CASCADE
                    let deleted = sqlx::query(queries::DELETE_BUYER)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    if deleted.rows_affected() == 0 {
                        return Err(ClaimError::not_found("buyer", id));
                    }
                    Ok(())
                })
            })
            .await
    }

    async fn clear_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let buyers = sqlx::query(queries::CLEAR_EXPIRED_BUYER_SESSIONS)
                        .bind(now)
                        .execute(&mut **tx)
                        .await?;
                    let sellers = sqlx::query(queries::CLEAR_EXPIRED_SELLER_SESSIONS)
                        .bind(now)
                        .execute(&mut **tx)
                        .await?;
                    Ok(buyers.rows_affected() + sellers.rows_affected())
                })
            })
            .await
    }

    async fn purge_unverified_buyers(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let purged = sqlx::query(queries::PURGE_UNVERIFIED_BUYERS)
            .bind(cutoff)
            .execute(self.db.pool())
            .await?;
        Ok(purged.rows_affected())
    }

    // -- Offers

    async fn place_offer(&self, offer: NewOffer, now: DateTime<Utc>) -> Result<PlaceOutcome> {
        let outcome = self
            .db
            .transaction(|tx| Box::pin(async move { place(&mut **tx, offer, now).await }))
            .await?;
        info!(
            "{:<12} --> 오퍼 {} 저장 (item {}, raised {})",
            "PgStore", outcome.offer.id, outcome.offer.item_id, outcome.raised
        );
        Ok(outcome)
    }

    async fn apply_offer_event(
        &self,
        offer_id: i64,
        event: OfferEvent,
        seller_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    apply_event(&mut **tx, offer_id, event, seller_notes, now).await
                })
            })
            .await
    }

    async fn get_offer(&self, id: i64) -> Result<Option<Offer>> {
        let offer = sqlx::query_as::<_, Offer>(queries::GET_OFFER)
            .bind(id)
            .fetch_optional(self.db.pool())
            .await?;
        Ok(offer)
    }

    async fn delete_offer(&self, id: i64) -> Result<Offer> {
        self.db
            .transaction(|tx| {
                Box::pin(async move {
                    let item_id = offer_item_id(&mut **tx, id).await?;
                    lock_item(&mut **tx, item_id).await?;
                    let offer = load_offer(&mut **tx, id).await?;
                    if offer.status == OfferStatus::Winning {
                        return Err(ClaimError::Conflict(
                            "a winning offer cannot be deleted".to_string(),
                        ));
                    }
                    sqlx::query(queries::DELETE_OFFER)
                        .bind(id)
                        .execute(&mut **tx)
                        .await?;
                    Ok(offer)
                })
            })
            .await
    }

    async fn list_offers(
        &self,
        query: &ListQuery<OfferStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<OfferListing>> {
        let offers = sqlx::query_as::<_, OfferListing>(queries::LIST_OFFERS)
            .bind(query.status)
            .bind(seller_id)
            .bind(query.search_term())
            .bind(query.limit())
            .bind(query.offset())
            .fetch_all(self.db.pool())
            .await?;
        Ok(offers)
    }

    async fn offers_for_item(&self, item_id: i64) -> Result<Vec<OfferListing>> {
        let offers = sqlx::query_as::<_, OfferListing>(queries::OFFERS_FOR_ITEM)
            .bind(item_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(offers)
    }

    async fn offers_for_buyer(
        &self,
        buyer_id: i64,
        status: Option<OfferStatus>,
    ) -> Result<Vec<OfferListing>> {
        let offers = sqlx::query_as::<_, OfferListing>(queries::OFFERS_FOR_BUYER)
            .bind(buyer_id)
            .bind(status)
            .fetch_all(self.db.pool())
            .await?;
        Ok(offers)
    }

    async fn offer_history(&self, item_id: i64) -> Result<Vec<OfferHistoryEntry>> {
        let history = sqlx::query_as::<_, OfferHistoryEntry>(queries::OFFER_HISTORY)
            .bind(item_id)
            .fetch_all(self.db.pool())
            .await?;
        Ok(history)
    }

    async fn offer_summary(&self, item_id: i64) -> Result<OfferSummary> {
        let (offer_count, unique_buyers, min_offer, max_offer) =
            sqlx::query_as::<_, (i64, i64, Option<i64>, Option<i64>)>(queries::OFFER_SUMMARY)
                .bind(item_id)
                .fetch_one(self.db.pool())
                .await?;
        Ok(OfferSummary {
            item_id,
            offer_count,
            unique_buyers,
            min_offer,
            max_offer,
        })
    }

    async fn expire_offers(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>> {
        let stale = sqlx::query_scalar::<_, i64>(queries::STALE_OFFERS)
            .bind(created_before)
            .fetch_all(self.db.pool())
            .await?;

        let mut expired = Vec::with_capacity(stale.len());
        for offer_id in stale {
            let result = self
                .db
                .transaction(|tx| {
                    Box::pin(async move {
                        apply(&mut **tx, offer_id, OfferEvent::Expire, None, now).await
                    })
                })
                .await;
            match result {
                Ok(outcome) => expired.push(outcome.offer),
                // 조회 이후 다른 요청이 먼저 상태를 바꾼 경우
                Err(ClaimError::Transition(err)) => {
                    debug!("{:<12} --> 오퍼 {} 만료 건너뜀: {}", "PgStore", offer_id, err)
                }
                Err(err) => return Err(err),
            }
        }
        Ok(expired)
    }

    // -- Notifications

    async fn insert_notification(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<SellerNotification> {
        let notification = sqlx::query_as::<_, SellerNotification>(queries::INSERT_NOTIFICATION)
            .bind(notification.seller_id)
            .bind(notification.sale_id)
            .bind(notification.kind)
            .bind(&notification.title)
            .bind(&notification.message)
            .bind(now)
            .fetch_one(self.db.pool())
            .await?;
        Ok(notification)
    }

    async fn list_notifications(
        &self,
        seller_id: Option<i64>,
        unread_only: bool,
    ) -> Result<Vec<SellerNotification>> {
        let notifications = sqlx::query_as::<_, SellerNotification>(queries::LIST_NOTIFICATIONS)
            .bind(seller_id)
            .bind(unread_only)
            .fetch_all(self.db.pool())
            .await?;
        Ok(notifications)
    }

    async fn mark_notification_read(&self, id: i64, seller_id: Option<i64>) -> Result<()> {
        let updated = sqlx::query(queries::MARK_NOTIFICATION_READ)
            .bind(id)
            .bind(seller_id)
            .execute(self.db.pool())
            .await?;
        if updated.rows_affected() == 0 {
            return Err(ClaimError::not_found("notification", id));
        }
        Ok(())
    }
}

// endregion: --- Claim Store Impl
