// region:    --- Imports
use crate::auth::{AdminOnly, BuyerSession, Staff};
use crate::buyers::{self, RegisterBuyerCommand, VerifyCodeCommand};
use crate::claim::model::{
    Buyer, BuyerStats, Item, OfferHistoryEntry, OfferListing, OfferStatus, OfferSummary, Sale,
    SaleStats, SaleStatus, Seller, SellerNotification, SellerStats, SellerStatus,
};
use crate::config::AuthConfig;
use crate::error::Result;
use crate::message_broker::EventPublisher;
use crate::notify::ChallengeSender;
use crate::offers;
use crate::offers::commands::{
    handle_accept_offer, handle_cancel_offer, handle_delete_offer, handle_place_offer,
    handle_raise_offer, handle_reject_offer, OfferResult, PlaceOfferCommand, RaiseOfferCommand,
    ReviewOfferCommand,
};
use crate::sales::items::{self, CreateItemCommand, UpdateItemCommand};
use crate::sales::{self, CreateSaleCommand, UpdateSaleCommand};
use crate::sellers::{self, LoginCommand, RegisterSellerCommand, UpdateSellerCommand};
use crate::store::{BuyerQuery, ClaimStore, ItemQuery, ListQuery};
use axum::extract::{DefaultBodyLimit, Path, Query, State};
use axum::http::StatusCode;
use axum::routing::{delete, get, post, put};
use axum::{Json, Router};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use tracing::info;

// endregion: --- Imports

// region:    --- App State

/// 핸들러 공유 상태
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn ClaimStore>,
    pub publisher: Arc<dyn EventPublisher>,
    pub challenges: Arc<dyn ChallengeSender>,
    pub auth: AuthConfig,
}

/// 성공 응답 `{success: true, data}`
#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

type ApiResult<T> = Result<Json<ApiResponse<T>>>;
type Created<T> = Result<(StatusCode, Json<ApiResponse<T>>)>;

fn ok<T: Serialize>(data: T) -> ApiResult<T> {
    Ok(Json(ApiResponse {
        success: true,
        data,
    }))
}

fn created<T: Serialize>(data: T) -> Created<T> {
    Ok((
        StatusCode::CREATED,
        Json(ApiResponse {
            success: true,
            data,
        }),
    ))
}

#[derive(Debug, Deserialize)]
pub struct StatusFilter<S> {
    pub status: Option<S>,
}

#[derive(Debug, Deserialize)]
pub struct NotificationFilter {
    #[serde(default)]
    pub unread: bool,
}

#[derive(Debug, Deserialize)]
pub struct ResendBody {
    pub buyer_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct RaiseBody {
    pub offer_amount: i64,
}

// endregion: --- App State

// region:    --- Router

pub fn router(state: AppState) -> Router {
    let public = Router::new()
        .route("/health", get(health))
        .route("/sales/current", get(current_sales))
        .route("/sales/upcoming", get(upcoming_sales))
        .route("/sales/access/:code", get(sale_by_access_code))
        .route("/sales/qr/:code", get(sale_by_qr_code))
        .route("/sales/:id/items", get(sale_items))
        .route("/items/:id/offers/summary", get(item_offer_summary))
        .route("/sellers/register", post(register_seller))
        .route("/sellers/login", post(login_seller));

    let buyer = Router::new()
        .route("/buyer/auth/register", post(register_buyer))
        .route("/buyer/auth/verify", post(verify_buyer))
        .route("/buyer/auth/resend", post(resend_code))
        .route("/buyer/auth/logout", post(logout_buyer))
        .route("/buyer/offers", get(my_offers))
        .route("/buyer/stats", get(my_stats))
        .route("/offers", post(place_offer))
        .route("/offers/:id/raise", post(raise_offer))
        .route("/offers/:id/cancel", post(cancel_offer));

    let admin = Router::new()
        .route("/admin/sellers", get(list_sellers).post(create_seller))
        .route("/admin/sellers/:id", put(update_seller).delete(delete_seller))
        .route("/admin/sellers/:id/approve", post(approve_seller))
        .route("/admin/sellers/:id/suspend", post(suspend_seller))
        .route("/admin/sellers/:id/stats", get(seller_stats))
        .route("/admin/sales", get(list_sales).post(create_sale))
        .route("/admin/sales/:id", put(update_sale).delete(delete_sale))
        .route("/admin/sales/:id/close", post(close_sale))
        .route("/admin/sales/:id/stats", get(sale_stats))
        .route("/admin/sales/:id/items", get(list_sale_items).post(create_item))
        .route("/admin/items/:id", put(update_item).delete(delete_item))
        .route("/admin/items/:id/offers", get(item_offers))
        .route("/admin/items/:id/history", get(item_history))
        .route("/admin/offers", get(list_offers))
        .route("/admin/offers/:id/accept", post(accept_offer))
        .route("/admin/offers/:id/reject", post(reject_offer))
        .route("/admin/offers/:id", delete(remove_offer))
        .route("/admin/buyers", get(list_buyers))
        .route("/admin/buyers/:id", delete(delete_buyer))
        .route("/admin/buyers/:id/stats", get(buyer_stats))
        .route("/admin/notifications", get(list_notifications))
        .route("/admin/notifications/:id/read", post(read_notification));

    Router::new()
        .merge(public)
        .merge(buyer)
        .merge(admin)
        .layer(DefaultBodyLimit::max(1024 * 1024))
        .with_state(state)
}

// endregion: --- Router

// region:    --- Public Handlers

async fn health() -> ApiResult<serde_json::Value> {
    ok(json!({ "status": "ok" }))
}

async fn current_sales(State(state): State<AppState>) -> ApiResult<Vec<sales::PublicSale>> {
    ok(sales::current_sales(state.store.as_ref(), Utc::now()).await?)
}

async fn upcoming_sales(State(state): State<AppState>) -> ApiResult<Vec<sales::PublicSale>> {
    ok(sales::upcoming_sales(state.store.as_ref(), Utc::now()).await?)
}

async fn sale_by_access_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<sales::PublicSale> {
    ok(sales::find_by_access_code(&code, state.store.as_ref(), Utc::now()).await?)
}

async fn sale_by_qr_code(
    State(state): State<AppState>,
    Path(code): Path<String>,
) -> ApiResult<sales::PublicSale> {
    ok(sales::find_by_qr_code(&code, state.store.as_ref(), Utc::now()).await?)
}

async fn sale_items(
    State(state): State<AppState>,
    Path(sale_id): Path<i64>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Vec<Item>> {
    ok(items::list_items(sale_id, &query, state.store.as_ref()).await?)
}

async fn item_offer_summary(
    State(state): State<AppState>,
    Path(item_id): Path<i64>,
) -> ApiResult<OfferSummary> {
    ok(offers::item_summary(item_id, state.store.as_ref()).await?)
}

async fn register_seller(
    State(state): State<AppState>,
    Json(cmd): Json<RegisterSellerCommand>,
) -> Created<Seller> {
    created(sellers::handle_register(cmd, state.store.as_ref(), Utc::now()).await?)
}

async fn login_seller(
    State(state): State<AppState>,
    Json(cmd): Json<LoginCommand>,
) -> ApiResult<sellers::SellerSession> {
    ok(sellers::handle_login(cmd, state.store.as_ref(), &state.auth, Utc::now()).await?)
}

// endregion: --- Public Handlers

// region:    --- Buyer Handlers

async fn register_buyer(
    State(state): State<AppState>,
    Json(cmd): Json<RegisterBuyerCommand>,
) -> ApiResult<buyers::Challenge> {
    ok(buyers::handle_register(
        cmd,
        state.store.as_ref(),
        state.challenges.as_ref(),
        &state.auth,
        Utc::now(),
    )
    .await?)
}

async fn verify_buyer(
    State(state): State<AppState>,
    Json(cmd): Json<VerifyCodeCommand>,
) -> ApiResult<buyers::BuyerSessionToken> {
    ok(buyers::handle_verify(cmd, state.store.as_ref(), &state.auth, Utc::now()).await?)
}

async fn resend_code(
    State(state): State<AppState>,
    Json(body): Json<ResendBody>,
) -> ApiResult<buyers::Challenge> {
    ok(buyers::handle_resend(
        body.buyer_id,
        state.store.as_ref(),
        state.challenges.as_ref(),
        &state.auth,
        Utc::now(),
    )
    .await?)
}

async fn logout_buyer(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
) -> ApiResult<serde_json::Value> {
    buyers::handle_logout(buyer, state.store.as_ref()).await?;
    ok(json!({ "logged_out": true }))
}

async fn my_offers(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
    Query(filter): Query<StatusFilter<OfferStatus>>,
) -> ApiResult<Vec<OfferListing>> {
    ok(offers::buyer_offers(&buyer, filter.status, state.store.as_ref()).await?)
}

async fn my_stats(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
) -> ApiResult<BuyerStats> {
    ok(buyers::buyer_stats(buyer.id, state.store.as_ref()).await?)
}

async fn place_offer(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
    Json(cmd): Json<PlaceOfferCommand>,
) -> Created<OfferResult> {
    created(
        handle_place_offer(
            cmd,
            &buyer,
            state.store.as_ref(),
            state.publisher.as_ref(),
            Utc::now(),
        )
        .await?,
    )
}

async fn raise_offer(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
    Path(offer_id): Path<i64>,
    Json(body): Json<RaiseBody>,
) -> ApiResult<OfferResult> {
    let cmd = RaiseOfferCommand {
        offer_id,
        offer_amount: body.offer_amount,
    };
    ok(handle_raise_offer(
        cmd,
        &buyer,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?)
}

async fn cancel_offer(
    State(state): State<AppState>,
    BuyerSession(buyer): BuyerSession,
    Path(offer_id): Path<i64>,
) -> ApiResult<OfferResult> {
    ok(handle_cancel_offer(
        offer_id,
        &buyer,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?)
}

// endregion: --- Buyer Handlers

// region:    --- Seller Admin Handlers

async fn list_sellers(
    State(state): State<AppState>,
    _: AdminOnly,
    Query(query): Query<ListQuery<SellerStatus>>,
) -> ApiResult<Vec<Seller>> {
    ok(sellers::list_sellers(&query, state.store.as_ref()).await?)
}

async fn create_seller(
    State(state): State<AppState>,
    _: AdminOnly,
    Json(cmd): Json<RegisterSellerCommand>,
) -> Created<Seller> {
    created(sellers::handle_admin_create(cmd, state.store.as_ref(), Utc::now()).await?)
}

async fn update_seller(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(seller_id): Path<i64>,
    Json(cmd): Json<UpdateSellerCommand>,
) -> ApiResult<Seller> {
    ok(sellers::handle_update(seller_id, cmd, state.store.as_ref(), Utc::now()).await?)
}

async fn delete_seller(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(seller_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    sellers::handle_delete(seller_id, state.store.as_ref()).await?;
    ok(json!({ "deleted": seller_id }))
}

async fn approve_seller(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(seller_id): Path<i64>,
) -> ApiResult<Seller> {
    ok(sellers::handle_approve(seller_id, state.store.as_ref(), Utc::now()).await?)
}

async fn suspend_seller(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(seller_id): Path<i64>,
) -> ApiResult<Seller> {
    ok(sellers::handle_suspend(seller_id, state.store.as_ref(), Utc::now()).await?)
}

async fn seller_stats(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(seller_id): Path<i64>,
) -> ApiResult<SellerStats> {
    ok(sellers::seller_stats(seller_id, &principal, state.store.as_ref()).await?)
}

// endregion: --- Seller Admin Handlers

// region:    --- Sale Admin Handlers

async fn list_sales(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Query(query): Query<ListQuery<SaleStatus>>,
) -> ApiResult<Vec<Sale>> {
    ok(sales::list_sales(&query, &principal, state.store.as_ref()).await?)
}

async fn create_sale(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Json(cmd): Json<CreateSaleCommand>,
) -> Created<Sale> {
    created(sales::handle_create_sale(cmd, &principal, state.store.as_ref(), Utc::now()).await?)
}

async fn update_sale(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
    Json(cmd): Json<UpdateSaleCommand>,
) -> ApiResult<Sale> {
    ok(sales::handle_update_sale(sale_id, cmd, &principal, state.store.as_ref()).await?)
}

async fn delete_sale(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    sales::handle_delete_sale(
        sale_id,
        &principal,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?;
    ok(json!({ "deleted": sale_id }))
}

async fn close_sale(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
) -> ApiResult<Sale> {
    ok(sales::handle_close_sale(
        sale_id,
        &principal,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?)
}

async fn sale_stats(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
) -> ApiResult<SaleStats> {
    ok(sales::sale_stats(sale_id, &principal, state.store.as_ref()).await?)
}

async fn list_sale_items(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
    Query(query): Query<ItemQuery>,
) -> ApiResult<Vec<Item>> {
    ok(items::list_owned_items(sale_id, &query, &principal, state.store.as_ref()).await?)
}

async fn create_item(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(sale_id): Path<i64>,
    Json(cmd): Json<CreateItemCommand>,
) -> Created<Item> {
    created(
        items::handle_create_item(sale_id, cmd, &principal, state.store.as_ref(), Utc::now())
            .await?,
    )
}

async fn update_item(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(item_id): Path<i64>,
    Json(cmd): Json<UpdateItemCommand>,
) -> ApiResult<Item> {
    ok(items::handle_update_item(item_id, cmd, &principal, state.store.as_ref()).await?)
}

async fn delete_item(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(item_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    items::handle_delete_item(item_id, &principal, state.store.as_ref()).await?;
    ok(json!({ "deleted": item_id }))
}

// endregion: --- Sale Admin Handlers

// region:    --- Offer Admin Handlers

async fn item_offers(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(item_id): Path<i64>,
) -> ApiResult<Vec<OfferListing>> {
    ok(offers::item_offers(item_id, &principal, state.store.as_ref()).await?)
}

async fn item_history(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(item_id): Path<i64>,
) -> ApiResult<Vec<OfferHistoryEntry>> {
    ok(offers::item_history(item_id, &principal, state.store.as_ref()).await?)
}

async fn list_offers(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Query(query): Query<ListQuery<OfferStatus>>,
) -> ApiResult<Vec<OfferListing>> {
    ok(offers::list_offers(&query, &principal, state.store.as_ref()).await?)
}

async fn accept_offer(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(offer_id): Path<i64>,
    body: Option<Json<ReviewOfferCommand>>,
) -> ApiResult<OfferResult> {
    let cmd = body.map(|Json(cmd)| cmd).unwrap_or_default();
    ok(handle_accept_offer(
        offer_id,
        cmd,
        &principal,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?)
}

async fn reject_offer(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(offer_id): Path<i64>,
    body: Option<Json<ReviewOfferCommand>>,
) -> ApiResult<OfferResult> {
    let cmd = body.map(|Json(cmd)| cmd).unwrap_or_default();
    ok(handle_reject_offer(
        offer_id,
        cmd,
        &principal,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?)
}

async fn remove_offer(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(offer_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    handle_delete_offer(
        offer_id,
        &principal,
        state.store.as_ref(),
        state.publisher.as_ref(),
        Utc::now(),
    )
    .await?;
    ok(json!({ "deleted": offer_id }))
}

// endregion: --- Offer Admin Handlers

// region:    --- Buyer Admin Handlers

async fn list_buyers(
    State(state): State<AppState>,
    _: AdminOnly,
    Query(query): Query<BuyerQuery>,
) -> ApiResult<Vec<Buyer>> {
    ok(state.store.list_buyers(&query).await?)
}

async fn buyer_stats(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(buyer_id): Path<i64>,
) -> ApiResult<BuyerStats> {
    ok(buyers::buyer_stats(buyer_id, state.store.as_ref()).await?)
}

async fn delete_buyer(
    State(state): State<AppState>,
    _: AdminOnly,
    Path(buyer_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    info!("{:<12} --> 구매자 삭제: {}", "Admin", buyer_id);
    state.store.delete_buyer(buyer_id).await?;
    ok(json!({ "deleted": buyer_id }))
}

async fn list_notifications(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Query(filter): Query<NotificationFilter>,
) -> ApiResult<Vec<SellerNotification>> {
    ok(state
        .store
        .list_notifications(principal.seller_scope(), filter.unread)
        .await?)
}

async fn read_notification(
    State(state): State<AppState>,
    Staff(principal): Staff,
    Path(notification_id): Path<i64>,
) -> ApiResult<serde_json::Value> {
    state
        .store
        .mark_notification_read(notification_id, principal.seller_scope())
        .await?;
    ok(json!({ "read": notification_id }))
}

// endregion: --- Buyer Admin Handlers
