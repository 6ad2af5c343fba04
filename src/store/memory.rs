/// 메모리 저장소
/// 로컬 실행과 테스트용. 모든 변경을 하나의 뮤텍스 아래에서 처리해 트랜잭션과 같은 원자성을 가진다.
// region:    --- Imports
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
use crate::error::{ClaimError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
// endregion: --- Imports

// region:    --- State

#[derive(Default)]
struct State {
    next_id: i64,
    sellers: BTreeMap<i64, Seller>,
    sales: BTreeMap<i64, Sale>,
    items: BTreeMap<i64, Item>,
    buyers: BTreeMap<i64, Buyer>,
    offers: BTreeMap<i64, Offer>,
    history: Vec<OfferHistoryEntry>,
    notifications: BTreeMap<i64, SellerNotification>,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn item(&self, id: i64) -> Result<Item> {
        self.items
            .get(&id)
            .cloned()
            .ok_or_else(|| ClaimError::not_found("item", id))
    }

    fn offer(&self, id: i64) -> Result<Offer> {
        self.offers
            .get(&id)
            .cloned()
            .ok_or_else(|| ClaimError::not_found("offer", id))
    }

    fn highest_active(&self, item_id: i64) -> Option<i64> {
        self.offers
            .values()
            .filter(|offer| offer.item_id == item_id && offer.status == OfferStatus::Active)
            .map(|offer| offer.offer_amount)
            .max()
    }

    fn record(&mut self, offer: &Offer, action: HistoryAction, now: DateTime<Utc>) {
        let buyer_name = self
            .buyers
            .get(&offer.buyer_id)
            .map(|buyer| buyer.name.clone())
            .unwrap_or_default();
        let id = self.next_id();
        self.history.push(OfferHistoryEntry {
            id,
            offer_id: offer.id,
            item_id: offer.item_id,
            buyer_id: offer.buyer_id,
            buyer_name,
            offer_amount: offer.offer_amount,
            action,
            created_at: now,
        });
    }

    /// 상태 머신을 거쳐 오퍼 하나에 이벤트 적용. 수락이면 형제 오퍼를 밀어낸다.
    fn apply(
        &mut self,
        offer_id: i64,
        event: OfferEvent,
        seller_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome> {
        let offer = self.offer(offer_id)?;
        let mut item = self.item(offer.item_id)?;
        let ctx = OfferContext {
            item: &item,
            highest_active: self.highest_active(item.id),
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
        self.offers.insert(next.id, next.clone());
        if let Some(action) = step.history {
            self.record(&next, action, now);
        }

        let mut outbid = Vec::new();
        if event == OfferEvent::Accept {
            item.status = ItemStatus::Claimed;
            item.winning_offer_id = Some(next.id);
            self.items.insert(item.id, item.clone());

            let siblings: Vec<Offer> = self
                .offers
                .values()
                .filter(|other| {
                    other.item_id == item.id
                        && other.id != next.id
                        && other.status == OfferStatus::Active
                })
                .cloned()
                .collect();
            for sibling in siblings {
                let ctx = OfferContext {
                    item: &item,
                    highest_active: None,
                };
                let step = transition(&sibling, &ctx, &OfferEvent::Outbid, now)?;
                self.offers.insert(step.offer.id, step.offer.clone());
                if let Some(action) = step.history {
                    self.record(&step.offer, action, now);
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

    /// 상향이 즉시 구매가에 닿으면 같은 잠금 안에서 이어서 수락
    fn apply_event(
        &mut self,
        offer_id: i64,
        event: OfferEvent,
        seller_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome> {
        let outcome = self.apply(offer_id, event, seller_notes, now)?;
        let is_raise = matches!(event, OfferEvent::Raise { .. });
        if !is_raise
            || !outcome.changed
            || !reaches_buy_now(&outcome.item, outcome.offer.offer_amount)
        {
            return Ok(outcome);
        }
        let mut accepted = self.apply(offer_id, OfferEvent::Accept, None, now)?;
        accepted.bought_now = true;
        Ok(accepted)
    }

    fn buyer_mut(&mut self, id: i64) -> Result<&mut Buyer> {
        self.buyers
            .get_mut(&id)
            .ok_or_else(|| ClaimError::not_found("buyer", id))
    }

    fn listing(&self, offer: &Offer) -> Option<OfferListing> {
        let buyer = self.buyers.get(&offer.buyer_id)?;
        let item = self.items.get(&offer.item_id)?;
        let sale = self.sales.get(&item.sale_id)?;
        Some(OfferListing {
            offer: offer.clone(),
            buyer_name: buyer.name.clone(),
            item_title: item.title.clone(),
            item_status: item.status,
            sale_id: sale.id,
            sale_title: sale.title.clone(),
        })
    }

    fn remove_item_cascade(&mut self, item_id: i64) {
        self.items.remove(&item_id);
        self.offers.retain(|_, offer| offer.item_id != item_id);
        self.history.retain(|entry| entry.item_id != item_id);
    }

    fn remove_sale_cascade(&mut self, sale_id: i64) {
        let item_ids: Vec<i64> = self
            .items
            .values()
            .filter(|item| item.sale_id == sale_id)
            .map(|item| item.id)
            .collect();
        for item_id in item_ids {
            self.remove_item_cascade(item_id);
        }
        self.buyers.retain(|_, buyer| buyer.sale_id != sale_id);
        self.notifications
            .retain(|_, notification| notification.sale_id != sale_id);
        self.sales.remove(&sale_id);
    }

    fn code_in_use(&self, code: &str, except: Option<i64>) -> bool {
        self.sales.values().any(|sale| {
            Some(sale.id) != except && (sale.access_code == code || sale.qr_code == code)
        })
    }
}

// endregion: --- State

// region:    --- In Memory Claim Store

#[derive(Default, Clone)]
pub struct InMemoryClaimStore {
    state: Arc<Mutex<State>>,
}

impl InMemoryClaimStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, State>> {
        self.state
            .lock()
            .map_err(|_| ClaimError::Internal("store mutex poisoned".to_string()))
    }
}

fn matches_search(term: Option<&str>, fields: &[&str]) -> bool {
    match term {
        None => true,
        Some(term) => {
            let term = term.to_lowercase();
            fields
                .iter()
                .any(|field| field.to_lowercase().contains(&term))
        }
    }
}

fn paginate<T, S>(rows: Vec<T>, query: &ListQuery<S>) -> Vec<T> {
    rows.into_iter()
        .skip(query.offset() as usize)
        .take(query.limit() as usize)
        .collect()
}

#[async_trait]
impl ClaimStore for InMemoryClaimStore {
    // -- Sellers

    async fn insert_seller(&self, seller: NewSeller, now: DateTime<Utc>) -> Result<Seller> {
        let mut state = self.lock()?;
        if state
            .sellers
            .values()
            .any(|existing| existing.email.eq_ignore_ascii_case(&seller.email))
        {
            return Err(ClaimError::DuplicateEmail(seller.email));
        }
        let id = state.next_id();
        let record = Seller {
            id,
            company_name: seller.company_name,
            contact_name: seller.contact_name,
            email: seller.email,
            phone: seller.phone,
            password_hash: seller.password_hash,
            status: seller.status,
            session_token_hash: None,
            session_expires: None,
            created_at: now,
            updated_at: now,
        };
        state.sellers.insert(id, record.clone());
        Ok(record)
    }

    async fn get_seller(&self, id: i64) -> Result<Option<Seller>> {
        Ok(self.lock()?.sellers.get(&id).cloned())
    }

    async fn find_seller_by_email(&self, email: &str) -> Result<Option<Seller>> {
        Ok(self
            .lock()?
            .sellers
            .values()
            .find(|seller| seller.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn find_seller_by_session(&self, token_hash: &str) -> Result<Option<Seller>> {
        Ok(self
            .lock()?
            .sellers
            .values()
            .find(|seller| seller.session_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_sellers(&self, query: &ListQuery<SellerStatus>) -> Result<Vec<Seller>> {
        let state = self.lock()?;
        let mut rows: Vec<Seller> = state
            .sellers
            .values()
            .filter(|seller| query.status.map_or(true, |status| seller.status == status))
            .filter(|seller| {
                matches_search(
                    query.search_term(),
                    &[&seller.company_name, &seller.contact_name, &seller.email],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.company_name.cmp(&b.company_name).then(a.id.cmp(&b.id)));
        Ok(paginate(rows, query))
    }

    async fn update_seller(&self, seller: &Seller, now: DateTime<Utc>) -> Result<Seller> {
        let mut state = self.lock()?;
        if !state.sellers.contains_key(&seller.id) {
            return Err(ClaimError::not_found("seller", seller.id));
        }
        if state.sellers.values().any(|existing| {
            existing.id != seller.id && existing.email.eq_ignore_ascii_case(&seller.email)
        }) {
            return Err(ClaimError::DuplicateEmail(seller.email.clone()));
        }
        let mut record = seller.clone();
        record.updated_at = now;
        state.sellers.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_seller(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        if !state.sellers.contains_key(&id) {
            return Err(ClaimError::not_found("seller", id));
        }
        let sale_ids: Vec<i64> = state
            .sales
            .values()
            .filter(|sale| sale.seller_id == id)
            .map(|sale| sale.id)
            .collect();
        if sale_ids
            .iter()
            .any(|sale_id| state.sales[sale_id].status == SaleStatus::Active)
        {
            return Err(ClaimError::SellerHasActiveSales { seller_id: id });
        }
        for sale_id in sale_ids {
            state.remove_sale_cascade(sale_id);
        }
        state
            .notifications
            .retain(|_, notification| notification.seller_id != id);
        state.sellers.remove(&id);
        Ok(())
    }

    async fn seller_stats(&self, id: i64) -> Result<SellerStats> {
        let state = self.lock()?;
        let sale_ids: HashSet<i64> = state
            .sales
            .values()
            .filter(|sale| sale.seller_id == id)
            .map(|sale| sale.id)
            .collect();
        let item_ids: HashSet<i64> = state
            .items
            .values()
            .filter(|item| sale_ids.contains(&item.sale_id))
            .map(|item| item.id)
            .collect();
        Ok(SellerStats {
            total_sales: sale_ids.len() as i64,
            active_sales: state
                .sales
                .values()
                .filter(|sale| sale.seller_id == id && sale.status == SaleStatus::Active)
                .count() as i64,
            total_items: item_ids.len() as i64,
            total_offers: state
                .offers
                .values()
                .filter(|offer| item_ids.contains(&offer.item_id))
                .count() as i64,
        })
    }

    // -- Sales

    async fn insert_sale(&self, sale: NewSale, now: DateTime<Utc>) -> Result<Sale> {
        let mut state = self.lock()?;
        if state.code_in_use(&sale.access_code, None) || state.code_in_use(&sale.qr_code, None) {
            return Err(ClaimError::DuplicateAccessCode);
        }
        if !state.sellers.contains_key(&sale.seller_id) {
            return Err(ClaimError::not_found("seller", sale.seller_id));
        }
        let id = state.next_id();
        let record = Sale {
            id,
            seller_id: sale.seller_id,
            title: sale.title,
            description: sale.description,
            address: sale.address,
            city: sale.city,
            state: sale.state,
            zip: sale.zip,
            preview_start: sale.preview_start,
            preview_end: sale.preview_end,
            claim_start: sale.claim_start,
            claim_end: sale.claim_end,
            pickup_start: sale.pickup_start,
            pickup_end: sale.pickup_end,
            access_code: sale.access_code,
            qr_code: sale.qr_code,
            status: SaleStatus::Active,
            show_price_ranges: sale.show_price_ranges,
            created_at: now,
        };
        state.sales.insert(id, record.clone());
        Ok(record)
    }

    async fn get_sale(&self, id: i64) -> Result<Option<Sale>> {
        Ok(self.lock()?.sales.get(&id).cloned())
    }

    async fn find_sale_by_access_code(&self, code: &str) -> Result<Option<Sale>> {
        Ok(self
            .lock()?
            .sales
            .values()
            .find(|sale| sale.access_code == code)
            .cloned())
    }

    async fn find_sale_by_qr_code(&self, code: &str) -> Result<Option<Sale>> {
        Ok(self
            .lock()?
            .sales
            .values()
            .find(|sale| sale.qr_code == code)
            .cloned())
    }

    async fn list_sales(
        &self,
        query: &ListQuery<SaleStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<Sale>> {
        let state = self.lock()?;
        let mut rows: Vec<Sale> = state
            .sales
            .values()
            .filter(|sale| seller_id.map_or(true, |seller_id| sale.seller_id == seller_id))
            .filter(|sale| query.status.map_or(true, |status| sale.status == status))
            .filter(|sale| {
                matches_search(
                    query.search_term(),
                    &[&sale.title, &sale.city, &sale.access_code],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, query))
    }

    async fn current_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>> {
        let state = self.lock()?;
        let mut rows: Vec<Sale> = state
            .sales
            .values()
            .filter(|sale| {
                sale.status == SaleStatus::Active
                    && sale.claim_start <= now
                    && now <= sale.claim_end
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.claim_end.cmp(&b.claim_end).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn upcoming_sales(&self, now: DateTime<Utc>) -> Result<Vec<Sale>> {
        let state = self.lock()?;
        let mut rows: Vec<Sale> = state
            .sales
            .values()
            .filter(|sale| sale.status == SaleStatus::Active && sale.claim_start > now)
            .cloned()
            .collect();
        rows.sort_by(|a, b| a.claim_start.cmp(&b.claim_start).then(a.id.cmp(&b.id)));
        Ok(rows)
    }

    async fn update_sale(&self, sale: &Sale) -> Result<Sale> {
        let mut state = self.lock()?;
        if !state.sales.contains_key(&sale.id) {
            return Err(ClaimError::not_found("sale", sale.id));
        }
        if state.code_in_use(&sale.access_code, Some(sale.id))
            || state.code_in_use(&sale.qr_code, Some(sale.id))
        {
            return Err(ClaimError::DuplicateAccessCode);
        }
        state.sales.insert(sale.id, sale.clone());
        Ok(sale.clone())
    }

    async fn delete_sale(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        if !state.sales.contains_key(&id) {
            return Err(ClaimError::not_found("sale", id));
        }
        state.remove_sale_cascade(id);
        Ok(())
    }

    async fn close_finished_sales(&self, now: DateTime<Utc>) -> Result<Vec<i64>> {
        let mut state = self.lock()?;
        let mut closed = Vec::new();
        for sale in state.sales.values_mut() {
            if sale.status == SaleStatus::Active && sale.pickup_end < now {
                sale.status = SaleStatus::Closed;
                closed.push(sale.id);
            }
        }
        Ok(closed)
    }

    async fn sale_stats(&self, id: i64) -> Result<SaleStats> {
        let state = self.lock()?;
        let items: Vec<&Item> = state
            .items
            .values()
            .filter(|item| item.sale_id == id)
            .collect();
        let item_ids: HashSet<i64> = items.iter().map(|item| item.id).collect();
        let offers: Vec<&Offer> = state
            .offers
            .values()
            .filter(|offer| item_ids.contains(&offer.item_id))
            .collect();
        Ok(SaleStats {
            total_items: items.len() as i64,
            items_with_offers: offers
                .iter()
                .map(|offer| offer.item_id)
                .collect::<HashSet<_>>()
                .len() as i64,
            total_offers: offers.len() as i64,
            claimed_items: items
                .iter()
                .filter(|item| item.status == ItemStatus::Claimed)
                .count() as i64,
            unique_buyers: offers
                .iter()
                .map(|offer| offer.buyer_id)
                .collect::<HashSet<_>>()
                .len() as i64,
        })
    }

    // -- Items

    async fn insert_item(&self, item: NewItem, now: DateTime<Utc>) -> Result<Item> {
        let mut state = self.lock()?;
        if !state.sales.contains_key(&item.sale_id) {
            return Err(ClaimError::not_found("sale", item.sale_id));
        }
        let id = state.next_id();
        let record = Item {
            id,
            sale_id: item.sale_id,
            item_number: item.item_number,
            title: item.title,
            description: item.description,
            starting_price: item.starting_price,
            offer_increment: item.offer_increment,
            buy_now_price: item.buy_now_price,
            category: item.category,
            condition_rating: item.condition_rating,
            status: ItemStatus::Available,
            winning_offer_id: None,
            created_at: now,
        };
        state.items.insert(id, record.clone());
        Ok(record)
    }

    async fn get_item(&self, id: i64) -> Result<Option<Item>> {
        Ok(self.lock()?.items.get(&id).cloned())
    }

    async fn list_items(&self, sale_id: i64, query: &ItemQuery) -> Result<Vec<Item>> {
        let state = self.lock()?;
        let mut rows: Vec<Item> = state
            .items
            .values()
            .filter(|item| item.sale_id == sale_id)
            .filter(|item| query.status.map_or(true, |status| item.status == status))
            .filter(|item| {
                query.category().map_or(true, |category| {
                    item.category
                        .as_deref()
                        .is_some_and(|own| own.eq_ignore_ascii_case(category))
                })
            })
            .filter(|item| {
                matches_search(
                    query.search_term(),
                    &[
                        &item.title,
                        item.description.as_deref().unwrap_or_default(),
                        item.item_number.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| {
            (a.item_number.is_none(), &a.item_number, a.id).cmp(&(
                b.item_number.is_none(),
                &b.item_number,
                b.id,
            ))
        });
        Ok(rows)
    }

    async fn update_item(&self, item: &Item) -> Result<Item> {
        let mut state = self.lock()?;
        let current = state.item(item.id)?;
        if !current.is_available() {
            return Err(ClaimError::ItemLocked { item_id: item.id });
        }
        let mut record = item.clone();
        // 상태와 낙찰 정보는 상태 머신만 바꾼다
        record.sale_id = current.sale_id;
        record.status = current.status;
        record.winning_offer_id = current.winning_offer_id;
        record.created_at = current.created_at;
        state.items.insert(record.id, record.clone());
        Ok(record)
    }

    async fn delete_item(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        let current = state.item(id)?;
        if !current.is_available() {
            return Err(ClaimError::ItemLocked { item_id: id });
        }
        state.remove_item_cascade(id);
        Ok(())
    }

    // -- Buyers

    async fn insert_buyer(&self, buyer: NewBuyer, now: DateTime<Utc>) -> Result<Buyer> {
        let mut state = self.lock()?;
        if !state.sales.contains_key(&buyer.sale_id) {
            return Err(ClaimError::not_found("sale", buyer.sale_id));
        }
        let id = state.next_id();
        let record = Buyer {
            id,
            sale_id: buyer.sale_id,
            name: buyer.name,
            email: buyer.email,
            phone: buyer.phone,
            auth_method: buyer.auth_method,
            auth_code_hash: Some(buyer.auth_code_hash),
            auth_code_expires: Some(buyer.auth_code_expires),
            failed_attempts: 0,
            auth_verified: false,
            session_token_hash: None,
            session_expires: None,
            last_activity: None,
            created_at: now,
        };
        state.buyers.insert(id, record.clone());
        Ok(record)
    }

    async fn get_buyer(&self, id: i64) -> Result<Option<Buyer>> {
        Ok(self.lock()?.buyers.get(&id).cloned())
    }

    async fn find_buyer_by_contact(
        &self,
        sale_id: i64,
        method: AuthMethod,
        contact: &str,
    ) -> Result<Option<Buyer>> {
        Ok(self
            .lock()?
            .buyers
            .values()
            .find(|buyer| {
                buyer.sale_id == sale_id
                    && buyer.auth_method == method
                    && buyer.contact() == Some(contact)
            })
            .cloned())
    }

    async fn find_buyer_by_session(&self, token_hash: &str) -> Result<Option<Buyer>> {
        Ok(self
            .lock()?
            .buyers
            .values()
            .find(|buyer| buyer.session_token_hash.as_deref() == Some(token_hash))
            .cloned())
    }

    async fn list_buyers(&self, query: &BuyerQuery) -> Result<Vec<Buyer>> {
        let state = self.lock()?;
        let list = query.as_list();
        let mut rows: Vec<Buyer> = state
            .buyers
            .values()
            .filter(|buyer| query.sale_id.map_or(true, |sale_id| buyer.sale_id == sale_id))
            .filter(|buyer| list.status.map_or(true, |verified| buyer.auth_verified == verified))
            .filter(|buyer| {
                matches_search(
                    list.search_term(),
                    &[
                        &buyer.name,
                        buyer.email.as_deref().unwrap_or_default(),
                        buyer.phone.as_deref().unwrap_or_default(),
                    ],
                )
            })
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(paginate(rows, &list))
    }

    async fn issue_buyer_code(
        &self,
        id: i64,
        name: Option<&str>,
        code_hash: &str,
        expires: DateTime<Utc>,
    ) -> Result<Buyer> {
        let mut state = self.lock()?;
        let buyer = state.buyer_mut(id)?;
        if let Some(name) = name {
            buyer.name = name.to_string();
        }
        buyer.auth_code_hash = Some(code_hash.to_string());
        buyer.auth_code_expires = Some(expires);
        buyer.failed_attempts = 0;
        Ok(buyer.clone())
    }

    async fn attempt_buyer_code(
        &self,
        attempt: &CodeAttempt,
        now: DateTime<Utc>,
    ) -> Result<AttemptOutcome> {
        let mut state = self.lock()?;
        let buyer = state.buyer_mut(attempt.buyer_id)?;
        let outcome = apply_attempt(buyer.clone(), attempt, now);
        if outcome.changed {
            *buyer = outcome.buyer.clone();
        }
        Ok(outcome)
    }

    async fn touch_buyer(&self, id: i64, now: DateTime<Utc>) -> Result<()> {
        self.lock()?.buyer_mut(id)?.last_activity = Some(now);
        Ok(())
    }

    async fn end_buyer_session(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        let buyer = state.buyer_mut(id)?;
        buyer.session_token_hash = None;
        buyer.session_expires = None;
        Ok(())
    }

    async fn buyer_stats(&self, id: i64) -> Result<BuyerStats> {
        let state = self.lock()?;
        if !state.buyers.contains_key(&id) {
            return Err(ClaimError::not_found("buyer", id));
        }
        let mut stats = BuyerStats {
            buyer_id: id,
            ..BuyerStats::default()
        };
        for offer in state.offers.values().filter(|offer| offer.buyer_id == id) {
            stats.total_offers += 1;
            match offer.status {
                OfferStatus::Active => stats.active_offers += 1,
                OfferStatus::Winning => stats.winning_offers += 1,
                _ => {}
            }
        }
        Ok(stats)
    }

    async fn delete_buyer(&self, id: i64) -> Result<()> {
        let mut state = self.lock()?;
        if !state.buyers.contains_key(&id) {
            return Err(ClaimError::not_found("buyer", id));
        }
        if state
            .offers
            .values()
            .any(|offer| offer.buyer_id == id && offer.status == OfferStatus::Winning)
        {
            return Err(ClaimError::Conflict(
                "buyer holds a winning offer".to_string(),
            ));
        }
        state.offers.retain(|_, offer| offer.buyer_id != id);
        state.history.retain(|entry| entry.buyer_id != id);
        state.buyers.remove(&id);
        Ok(())
    }

    async fn clear_expired_sessions(&self, now: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock()?;
        let mut cleared = 0;
        for buyer in state.buyers.values_mut() {
            if buyer.session_expires.is_some_and(|expires| expires <= now) {
                buyer.session_token_hash = None;
                buyer.session_expires = None;
                cleared += 1;
            }
        }
        for seller in state.sellers.values_mut() {
            if seller.session_expires.is_some_and(|expires| expires <= now) {
                seller.session_token_hash = None;
                seller.session_expires = None;
                cleared += 1;
            }
        }
        Ok(cleared)
    }

    async fn purge_unverified_buyers(&self, cutoff: DateTime<Utc>) -> Result<u64> {
        let mut state = self.lock()?;
        let with_offers: HashSet<i64> = state.offers.values().map(|offer| offer.buyer_id).collect();
        let before = state.buyers.len();
        state.buyers.retain(|id, buyer| {
            buyer.auth_verified
                || with_offers.contains(id)
                || buyer.auth_code_expires.map_or(true, |expires| expires >= cutoff)
        });
        Ok((before - state.buyers.len()) as u64)
    }

    // -- Offers

    async fn place_offer(&self, offer: NewOffer, now: DateTime<Utc>) -> Result<PlaceOutcome> {
        let mut state = self.lock()?;
        let item = state.item(offer.item_id)?;
        if !state.buyers.contains_key(&offer.buyer_id) {
            return Err(ClaimError::not_found("buyer", offer.buyer_id));
        }

        let existing = state
            .offers
            .values()
            .find(|current| {
                current.item_id == offer.item_id
                    && current.buyer_id == offer.buyer_id
                    && current.status == OfferStatus::Active
            })
            .cloned();

        let (placed, raised) = match existing {
            Some(current) => {
                if let Some(max_offer) = offer.max_offer {
                    if max_offer < offer.offer_amount {
                        return Err(TransitionError::MaxOfferBelowAmount {
                            amount: offer.offer_amount,
                            max_offer,
                        }
                        .into());
                    }
                }
                let outcome = state.apply(
                    current.id,
                    OfferEvent::Raise {
                        amount: offer.offer_amount,
                    },
                    None,
                    now,
                )?;
                let mut raised = outcome.offer;
                if offer.max_offer.is_some() {
                    raised.max_offer = offer.max_offer;
                    state.offers.insert(raised.id, raised.clone());
                }
                (raised, true)
            }
            None => {
                let ctx = OfferContext {
                    item: &item,
                    highest_active: state.highest_active(item.id),
                };
                validate_new_offer(&ctx, offer.offer_amount, offer.max_offer)?;
                let id = state.next_id();
                let record = Offer {
                    id,
                    item_id: offer.item_id,
                    buyer_id: offer.buyer_id,
                    offer_amount: offer.offer_amount,
                    max_offer: offer.max_offer,
                    status: OfferStatus::Active,
                    seller_notes: None,
                    created_at: now,
                    updated_at: now,
                };
                state.offers.insert(id, record.clone());
                state.record(&record, HistoryAction::Placed, now);
                (record, false)
            }
        };

        let accepted = if reaches_buy_now(&item, placed.offer_amount) {
            Some(state.apply(placed.id, OfferEvent::Accept, None, now)?)
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

    async fn apply_offer_event(
        &self,
        offer_id: i64,
        event: OfferEvent,
        seller_notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<OfferOutcome> {
        self.lock()?.apply_event(offer_id, event, seller_notes, now)
    }

    async fn get_offer(&self, id: i64) -> Result<Option<Offer>> {
        Ok(self.lock()?.offers.get(&id).cloned())
    }

    async fn delete_offer(&self, id: i64) -> Result<Offer> {
        let mut state = self.lock()?;
        let offer = state.offer(id)?;
        if offer.status == OfferStatus::Winning {
            return Err(ClaimError::Conflict(
                "a winning offer cannot be deleted".to_string(),
            ));
        }
        state.offers.remove(&id);
        Ok(offer)
    }

    async fn list_offers(
        &self,
        query: &ListQuery<OfferStatus>,
        seller_id: Option<i64>,
    ) -> Result<Vec<OfferListing>> {
        let state = self.lock()?;
        let mut rows: Vec<OfferListing> = state
            .offers
            .values()
            .filter(|offer| query.status.map_or(true, |status| offer.status == status))
            .filter_map(|offer| state.listing(offer))
            .filter(|listing| {
                seller_id.map_or(true, |seller_id| {
                    state
                        .sales
                        .get(&listing.sale_id)
                        .is_some_and(|sale| sale.seller_id == seller_id)
                })
            })
            .filter(|listing| {
                matches_search(
                    query.search_term(),
                    &[&listing.item_title, &listing.buyer_name, &listing.sale_title],
                )
            })
            .collect();
        rows.sort_by(|a, b| {
            b.offer
                .created_at
                .cmp(&a.offer.created_at)
                .then(b.offer.id.cmp(&a.offer.id))
        });
        Ok(paginate(rows, query))
    }

    async fn offers_for_item(&self, item_id: i64) -> Result<Vec<OfferListing>> {
        let state = self.lock()?;
        let mut rows: Vec<OfferListing> = state
            .offers
            .values()
            .filter(|offer| offer.item_id == item_id)
            .filter_map(|offer| state.listing(offer))
            .collect();
        rows.sort_by(|a, b| {
            b.offer
                .offer_amount
                .cmp(&a.offer.offer_amount)
                .then(a.offer.created_at.cmp(&b.offer.created_at))
                .then(a.offer.id.cmp(&b.offer.id))
        });
        Ok(rows)
    }

    async fn offers_for_buyer(
        &self,
        buyer_id: i64,
        status: Option<OfferStatus>,
    ) -> Result<Vec<OfferListing>> {
        let state = self.lock()?;
        let mut rows: Vec<OfferListing> = state
            .offers
            .values()
            .filter(|offer| offer.buyer_id == buyer_id)
            .filter(|offer| status.map_or(true, |status| offer.status == status))
            .filter_map(|offer| state.listing(offer))
            .collect();
        rows.sort_by(|a, b| {
            b.offer
                .created_at
                .cmp(&a.offer.created_at)
                .then(b.offer.id.cmp(&a.offer.id))
        });
        Ok(rows)
    }

    async fn offer_history(&self, item_id: i64) -> Result<Vec<OfferHistoryEntry>> {
        let state = self.lock()?;
        let mut rows: Vec<OfferHistoryEntry> = state
            .history
            .iter()
            .filter(|entry| entry.item_id == item_id)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn offer_summary(&self, item_id: i64) -> Result<OfferSummary> {
        let state = self.lock()?;
        let active: Vec<&Offer> = state
            .offers
            .values()
            .filter(|offer| offer.item_id == item_id && offer.status == OfferStatus::Active)
            .collect();
        Ok(OfferSummary {
            item_id,
            offer_count: active.len() as i64,
            unique_buyers: active
                .iter()
                .map(|offer| offer.buyer_id)
                .collect::<HashSet<_>>()
                .len() as i64,
            min_offer: active.iter().map(|offer| offer.offer_amount).min(),
            max_offer: active.iter().map(|offer| offer.offer_amount).max(),
        })
    }

    async fn expire_offers(
        &self,
        created_before: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<Vec<Offer>> {
        let mut state = self.lock()?;
        let stale: Vec<i64> = state
            .offers
            .values()
            .filter(|offer| offer.status == OfferStatus::Active && offer.created_at < created_before)
            .map(|offer| offer.id)
            .collect();
        let mut expired = Vec::with_capacity(stale.len());
        for offer_id in stale {
            let outcome = state.apply(offer_id, OfferEvent::Expire, None, now)?;
            expired.push(outcome.offer);
        }
        Ok(expired)
    }

    // -- Notifications

    async fn insert_notification(
        &self,
        notification: NewNotification,
        now: DateTime<Utc>,
    ) -> Result<SellerNotification> {
        let mut state = self.lock()?;
        let id = state.next_id();
        let record = SellerNotification {
            id,
            seller_id: notification.seller_id,
            sale_id: notification.sale_id,
            kind: notification.kind,
            title: notification.title,
            message: notification.message,
            is_read: false,
            created_at: now,
        };
        state.notifications.insert(id, record.clone());
        Ok(record)
    }

    async fn list_notifications(
        &self,
        seller_id: Option<i64>,
        unread_only: bool,
    ) -> Result<Vec<SellerNotification>> {
        let state = self.lock()?;
        let mut rows: Vec<SellerNotification> = state
            .notifications
            .values()
            .filter(|n| seller_id.map_or(true, |seller_id| n.seller_id == seller_id))
            .filter(|n| !unread_only || !n.is_read)
            .cloned()
            .collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(rows)
    }

    async fn mark_notification_read(&self, id: i64, seller_id: Option<i64>) -> Result<()> {
        let mut state = self.lock()?;
        match state.notifications.get_mut(&id) {
            Some(n) if seller_id.map_or(true, |seller_id| n.seller_id == seller_id) => {
                n.is_read = true;
                Ok(())
            }
            _ => Err(ClaimError::not_found("notification", id)),
        }
    }
}

// endregion: --- In Memory Claim Store
