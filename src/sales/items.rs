/// 상품 관리. 수정/삭제는 아직 클레임되지 않은 상품만 가능하다
// region:    --- Imports
use super::load_owned_sale;
use crate::auth::Principal;
use crate::claim::model::{Item, NewItem};
use crate::error::{ClaimError, Result};
use crate::store::{ClaimStore, ItemQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::info;
// endregion: --- Imports

/// 증가폭 미지정 시 $1.00
pub const DEFAULT_OFFER_INCREMENT: i64 = 100;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateItemCommand {
    pub item_number: Option<String>,
    pub title: String,
    pub description: Option<String>,
    pub starting_price: i64,
    pub offer_increment: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub category: Option<String>,
    pub condition_rating: Option<i16>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateItemCommand {
    pub item_number: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub starting_price: Option<i64>,
    pub offer_increment: Option<i64>,
    pub buy_now_price: Option<i64>,
    pub category: Option<String>,
    pub condition_rating: Option<i16>,
}

fn validate_pricing(
    title: &str,
    starting_price: i64,
    offer_increment: i64,
    buy_now_price: Option<i64>,
    condition_rating: Option<i16>,
) -> Result<()> {
    if title.trim().is_empty() {
        return Err(ClaimError::validation("title is required"));
    }
    if starting_price < 0 {
        return Err(ClaimError::validation("starting_price must not be negative"));
    }
    if offer_increment <= 0 {
        return Err(ClaimError::validation("offer_increment must be positive"));
    }
    if buy_now_price.is_some_and(|price| price < starting_price) {
        return Err(ClaimError::validation(
            "buy_now_price must not be below starting_price",
        ));
    }
    if condition_rating.is_some_and(|rating| !(1..=5).contains(&rating)) {
        return Err(ClaimError::validation(
            "condition_rating must be between 1 and 5",
        ));
    }
    Ok(())
}

async fn load_owned_item(
    item_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Item> {
    let item = store
        .get_item(item_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("item", item_id))?;
    load_owned_sale(item.sale_id, principal, store).await?;
    Ok(item)
}

pub async fn handle_create_item(
    sale_id: i64,
    cmd: CreateItemCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Item> {
    info!("{:<12} --> 상품 등록 요청: sale {} {}", "Item", sale_id, cmd.title);

    load_owned_sale(sale_id, principal, store).await?;
    let offer_increment = cmd.offer_increment.unwrap_or(DEFAULT_OFFER_INCREMENT);
    validate_pricing(
        &cmd.title,
        cmd.starting_price,
        offer_increment,
        cmd.buy_now_price,
        cmd.condition_rating,
    )?;

    store
        .insert_item(
            NewItem {
                sale_id,
                item_number: cmd.item_number,
                title: cmd.title.trim().to_string(),
                description: cmd.description,
                starting_price: cmd.starting_price,
                offer_increment,
                buy_now_price: cmd.buy_now_price,
                category: cmd.category,
                condition_rating: cmd.condition_rating,
            },
            now,
        )
        .await
}

pub async fn handle_update_item(
    item_id: i64,
    cmd: UpdateItemCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Item> {
    info!("{:<12} --> 상품 수정 요청: {}", "Item", item_id);

    let mut item = load_owned_item(item_id, principal, store).await?;
    if !item.is_available() {
        return Err(ClaimError::ItemLocked { item_id });
    }

    if let Some(item_number) = cmd.item_number {
        item.item_number = Some(item_number);
    }
    if let Some(title) = cmd.title {
        item.title = title.trim().to_string();
    }
    if let Some(description) = cmd.description {
        item.description = Some(description);
    }
    item.starting_price = cmd.starting_price.unwrap_or(item.starting_price);
    item.offer_increment = cmd.offer_increment.unwrap_or(item.offer_increment);
    if cmd.buy_now_price.is_some() {
        item.buy_now_price = cmd.buy_now_price;
    }
    if let Some(category) = cmd.category {
        item.category = Some(category);
    }
    if cmd.condition_rating.is_some() {
        item.condition_rating = cmd.condition_rating;
    }
    validate_pricing(
        &item.title,
        item.starting_price,
        item.offer_increment,
        item.buy_now_price,
        item.condition_rating,
    )?;

    store.update_item(&item).await
}

/// 상품과 그 오퍼를 함께 삭제
pub async fn handle_delete_item(
    item_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<()> {
    info!("{:<12} --> 상품 삭제 요청: {}", "Item", item_id);

    load_owned_item(item_id, principal, store).await?;
    store.delete_item(item_id).await
}

/// 공개 목록
pub async fn list_items(
    sale_id: i64,
    query: &ItemQuery,
    store: &dyn ClaimStore,
) -> Result<Vec<Item>> {
    store
        .get_sale(sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", sale_id))?;
    store.list_items(sale_id, query).await
}

/// 판매자 목록
pub async fn list_owned_items(
    sale_id: i64,
    query: &ItemQuery,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Vec<Item>> {
    load_owned_sale(sale_id, principal, store).await?;
    store.list_items(sale_id, query).await
}
