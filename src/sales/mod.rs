/// 세일 관리
/// 1. 생성 (입장 코드/QR 코드 발급)
/// 2. 수정 / 종료 / 삭제
/// 3. 조회 (공개, 판매자 범위)
// region:    --- Imports
use crate::auth::{ensure_sale_access, Principal};
use crate::claim::codes::{generate_access_code, generate_qr_code, normalize_code};
use crate::claim::events::ClaimEvent;
use crate::claim::model::{NewSale, Sale, SaleStats, SaleStatus};
use crate::claim::window::{sale_phase, SalePhase, SaleWindows};
use crate::error::{ClaimError, Result};
use crate::message_broker::{publish_all, EventPublisher};
use crate::store::{ClaimStore, ListQuery};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

pub mod items;
// endregion: --- Imports

// 생성된 코드가 겹칠 때 재시도 횟수
const MAX_CODE_ATTEMPTS: usize = 10;

// region:    --- Commands

/// 세일 생성 명령
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSaleCommand {
    /// 관리자는 필수, 판매자는 생략하면 자기 자신
    pub seller_id: Option<i64>,
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
    pub access_code: Option<String>,
    pub qr_code: Option<String>,
    #[serde(default)]
    pub show_price_ranges: bool,
}

/// 세일 수정 명령. 빠진 필드는 그대로 둔다
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSaleCommand {
    pub title: Option<String>,
    pub description: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    pub zip: Option<String>,
    pub preview_start: Option<DateTime<Utc>>,
    pub preview_end: Option<DateTime<Utc>>,
    pub claim_start: Option<DateTime<Utc>>,
    pub claim_end: Option<DateTime<Utc>>,
    pub pickup_start: Option<DateTime<Utc>>,
    pub pickup_end: Option<DateTime<Utc>>,
    pub access_code: Option<String>,
    pub qr_code: Option<String>,
    pub show_price_ranges: Option<bool>,
}

/// 구매자에게 보이는 세일. 입장 코드는 싣지 않는다
#[derive(Debug, Clone, Serialize)]
pub struct PublicSale {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip: String,
    #[serde(flatten)]
    pub windows: SaleWindows,
    pub status: SaleStatus,
    pub show_price_ranges: bool,
    pub phase: SalePhase,
}

impl PublicSale {
    pub fn new(sale: Sale, now: DateTime<Utc>) -> Self {
        Self {
            windows: SaleWindows::of(&sale),
            phase: sale_phase(&sale, now),
            id: sale.id,
            title: sale.title,
            description: sale.description,
            address: sale.address,
            city: sale.city,
            state: sale.state,
            zip: sale.zip,
            status: sale.status,
            show_price_ranges: sale.show_price_ranges,
        }
    }
}

// endregion: --- Commands

// region:    --- Validation

fn required(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(ClaimError::validation(format!("{field} is required")));
    }
    Ok(())
}

fn validate_sale_fields(sale: &NewSale) -> Result<()> {
    required("title", &sale.title)?;
    required("address", &sale.address)?;
    required("city", &sale.city)?;
    required("state", &sale.state)?;
    required("zip", &sale.zip)?;
    SaleWindows {
        preview_start: sale.preview_start,
        preview_end: sale.preview_end,
        claim_start: sale.claim_start,
        claim_end: sale.claim_end,
        pickup_start: sale.pickup_start,
        pickup_end: sale.pickup_end,
    }
    .validate()?;
    Ok(())
}

/// 입력된 코드 정규화. 빈 문자열은 생략과 같다
fn supplied_code(raw: Option<&str>) -> Option<String> {
    raw.map(normalize_code).filter(|code| !code.is_empty())
}

fn resolve_seller(principal: &Principal, requested: Option<i64>) -> Result<i64> {
    match (principal, requested) {
        (Principal::Admin, Some(seller_id)) => Ok(seller_id),
        (Principal::Admin, None) => Err(ClaimError::validation("seller_id is required")),
        (Principal::Seller(id), None) => Ok(*id),
        (Principal::Seller(id), Some(requested)) if *id == requested => Ok(*id),
        (Principal::Seller(_), Some(_)) => Err(ClaimError::Forbidden),
    }
}

async fn load_sale(store: &dyn ClaimStore, sale_id: i64) -> Result<Sale> {
    store
        .get_sale(sale_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("sale", sale_id))
}

/// 권한 확인을 거친 세일
pub async fn load_owned_sale(
    sale_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Sale> {
    let sale = load_sale(store, sale_id).await?;
    ensure_sale_access(principal, &sale)?;
    Ok(sale)
}

// endregion: --- Validation

// region:    --- Handlers

/// 1. 생성
pub async fn handle_create_sale(
    cmd: CreateSaleCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<Sale> {
    info!("{:<12} --> 세일 생성 요청: {}", "Sale", cmd.title);

    let seller_id = resolve_seller(principal, cmd.seller_id)?;
    store
        .get_seller(seller_id)
        .await?
        .ok_or_else(|| ClaimError::not_found("seller", seller_id))?;

    let access_code = supplied_code(cmd.access_code.as_deref());
    let qr_code = supplied_code(cmd.qr_code.as_deref());
    // 입력한 코드가 이미 쓰이면 재시도로 풀리지 않는다
    if let Some(code) = &access_code {
        if store.find_sale_by_access_code(code).await?.is_some() {
            return Err(ClaimError::DuplicateAccessCode);
        }
    }
    if let Some(code) = &qr_code {
        if store.find_sale_by_qr_code(code).await?.is_some() {
            return Err(ClaimError::DuplicateAccessCode);
        }
    }
    let generated = access_code.is_none() || qr_code.is_none();

    let mut sale = NewSale {
        seller_id,
        title: cmd.title.trim().to_string(),
        description: cmd.description,
        address: cmd.address,
        city: cmd.city,
        state: cmd.state,
        zip: cmd.zip,
        preview_start: cmd.preview_start,
        preview_end: cmd.preview_end,
        claim_start: cmd.claim_start,
        claim_end: cmd.claim_end,
        pickup_start: cmd.pickup_start,
        pickup_end: cmd.pickup_end,
        access_code: String::new(),
        qr_code: String::new(),
        show_price_ranges: cmd.show_price_ranges,
    };
    validate_sale_fields(&sale)?;

    for attempt in 1..=MAX_CODE_ATTEMPTS {
        sale.access_code = access_code.clone().unwrap_or_else(generate_access_code);
        sale.qr_code = qr_code.clone().unwrap_or_else(generate_qr_code);

        match store.insert_sale(sale.clone(), now).await {
            Ok(created) => {
                info!(
                    "{:<12} --> 세일 {} 생성 (seller {})",
                    "Sale", created.id, created.seller_id
                );
                return Ok(created);
            }
            Err(ClaimError::DuplicateAccessCode) if generated => {
                warn!(
                    "{:<12} --> 코드 충돌, 재생성 ({}/{})",
                    "Sale", attempt, MAX_CODE_ATTEMPTS
                );
            }
            Err(e) => return Err(e),
        }
    }
    Err(ClaimError::DuplicateAccessCode)
}

/// 2-1. 수정
pub async fn handle_update_sale(
    sale_id: i64,
    cmd: UpdateSaleCommand,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Sale> {
    info!("{:<12} --> 세일 수정 요청: {}", "Sale", sale_id);

    let mut sale = load_owned_sale(sale_id, principal, store).await?;
    if let Some(title) = cmd.title {
        sale.title = title.trim().to_string();
    }
    if let Some(description) = cmd.description {
        sale.description = Some(description);
    }
    if let Some(address) = cmd.address {
        sale.address = address;
    }
    if let Some(city) = cmd.city {
        sale.city = city;
    }
    if let Some(state) = cmd.state {
        sale.state = state;
    }
    if let Some(zip) = cmd.zip {
        sale.zip = zip;
    }
    if cmd.preview_start.is_some() || cmd.preview_end.is_some() {
        sale.preview_start = cmd.preview_start.or(sale.preview_start);
        sale.preview_end = cmd.preview_end.or(sale.preview_end);
    }
    sale.claim_start = cmd.claim_start.unwrap_or(sale.claim_start);
    sale.claim_end = cmd.claim_end.unwrap_or(sale.claim_end);
    sale.pickup_start = cmd.pickup_start.unwrap_or(sale.pickup_start);
    sale.pickup_end = cmd.pickup_end.unwrap_or(sale.pickup_end);
    if let Some(code) = supplied_code(cmd.access_code.as_deref()) {
        sale.access_code = code;
    }
    if let Some(code) = supplied_code(cmd.qr_code.as_deref()) {
        sale.qr_code = code;
    }
    if let Some(show) = cmd.show_price_ranges {
        sale.show_price_ranges = show;
    }

    required("title", &sale.title)?;
    required("address", &sale.address)?;
    required("city", &sale.city)?;
    required("state", &sale.state)?;
    required("zip", &sale.zip)?;
    SaleWindows::of(&sale).validate()?;

    store.update_sale(&sale).await
}

/// 2-2. 종료. 이미 종료된 세일은 그대로 돌려준다
pub async fn handle_close_sale(
    sale_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<Sale> {
    info!("{:<12} --> 세일 종료 요청: {}", "Sale", sale_id);

    let mut sale = load_owned_sale(sale_id, principal, store).await?;
    if sale.status == SaleStatus::Closed {
        return Ok(sale);
    }
    sale.status = SaleStatus::Closed;
    let sale = store.update_sale(&sale).await?;

    publish_all(
        publisher,
        vec![ClaimEvent::SaleClosed {
            sale_id,
            timestamp: now,
        }],
    )
    .await;
    Ok(sale)
}

/// 2-3. 삭제. 상품/오퍼/구매자까지 함께 지운다
pub async fn handle_delete_sale(
    sale_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
    publisher: &dyn EventPublisher,
    now: DateTime<Utc>,
) -> Result<()> {
    info!("{:<12} --> 세일 삭제 요청: {}", "Sale", sale_id);

    load_owned_sale(sale_id, principal, store).await?;
    store.delete_sale(sale_id).await?;

    publish_all(
        publisher,
        vec![ClaimEvent::SaleDeleted {
            sale_id,
            timestamp: now,
        }],
    )
    .await;
    Ok(())
}

// endregion: --- Handlers

// region:    --- Queries

pub async fn list_sales(
    query: &ListQuery<SaleStatus>,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<Vec<Sale>> {
    store.list_sales(query, principal.seller_scope()).await
}

pub async fn sale_stats(
    sale_id: i64,
    principal: &Principal,
    store: &dyn ClaimStore,
) -> Result<SaleStats> {
    load_owned_sale(sale_id, principal, store).await?;
    store.sale_stats(sale_id).await
}

pub async fn current_sales(store: &dyn ClaimStore, now: DateTime<Utc>) -> Result<Vec<PublicSale>> {
    let sales = store.current_sales(now).await?;
    Ok(sales.into_iter().map(|sale| PublicSale::new(sale, now)).collect())
}

pub async fn upcoming_sales(store: &dyn ClaimStore, now: DateTime<Utc>) -> Result<Vec<PublicSale>> {
    let sales = store.upcoming_sales(now).await?;
    Ok(sales.into_iter().map(|sale| PublicSale::new(sale, now)).collect())
}

/// 입장 코드로 찾기. 종료된 세일은 없는 것으로 본다
pub async fn find_by_access_code(
    code: &str,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<PublicSale> {
    let code = normalize_code(code);
    match store.find_sale_by_access_code(&code).await? {
        Some(sale) if sale.status == SaleStatus::Active => Ok(PublicSale::new(sale, now)),
        _ => Err(ClaimError::UnknownSaleCode(code)),
    }
}

pub async fn find_by_qr_code(
    code: &str,
    store: &dyn ClaimStore,
    now: DateTime<Utc>,
) -> Result<PublicSale> {
    let code = normalize_code(code);
    match store.find_sale_by_qr_code(&code).await? {
        Some(sale) if sale.status == SaleStatus::Active => Ok(PublicSale::new(sale, now)),
        _ => Err(ClaimError::UnknownSaleCode(code)),
    }
}

// endregion: --- Queries
