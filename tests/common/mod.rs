#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use claim_sale_service::auth::Principal;
use claim_sale_service::buyers::{self, RegisterBuyerCommand, VerifyCodeCommand};
use claim_sale_service::claim::model::{AuthMethod, Buyer, Item, NewSeller, Sale, Seller, SellerStatus};
use claim_sale_service::config::AuthConfig;
use claim_sale_service::notify::ChallengeSender;
use claim_sale_service::sales::items::{handle_create_item, CreateItemCommand};
use claim_sale_service::sales::{handle_create_sale, CreateSaleCommand};
use claim_sale_service::store::ClaimStore;
use claim_sale_service::Result;
use std::collections::HashMap;
use std::sync::Mutex;

/// 테스트 기준 시각
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 5, 2, 10, 0, 0).unwrap()
}

/// 발송된 인증 코드를 보관하는 ChallengeSender
#[derive(Default)]
pub struct CapturingSender {
    codes: Mutex<HashMap<i64, String>>,
}

impl CapturingSender {
    pub fn last_code(&self, buyer_id: i64) -> String {
        self.codes
            .lock()
            .unwrap()
            .get(&buyer_id)
            .cloned()
            .expect("no code sent to buyer")
    }
}

#[async_trait]
impl ChallengeSender for CapturingSender {
    async fn send_code(&self, buyer: &Buyer, _sale: &Sale, code: &str) -> Result<()> {
        self.codes
            .lock()
            .unwrap()
            .insert(buyer.id, code.to_string());
        Ok(())
    }
}

pub async fn seller(store: &dyn ClaimStore, email: &str) -> Seller {
    store
        .insert_seller(
            NewSeller {
                company_name: "Hollow Oak Estate Sales".to_string(),
                contact_name: "Sam".to_string(),
                email: email.to_string(),
                phone: None,
                password_hash: "unused".to_string(),
                status: SellerStatus::Active,
            },
            base_time(),
        )
        .await
        .expect("insert seller")
}

/// 클레임 기간 [now - 1h, now + 1h], 픽업 [now + 2h, now + 4h]
pub fn sale_command(seller_id: i64, now: DateTime<Utc>) -> CreateSaleCommand {
    CreateSaleCommand {
        seller_id: Some(seller_id),
        title: "Contents of a Craftsman Bungalow".to_string(),
        description: None,
        address: "12 Elm Street".to_string(),
        city: "Springfield".to_string(),
        state: "OR".to_string(),
        zip: "97477".to_string(),
        preview_start: None,
        preview_end: None,
        claim_start: now - Duration::hours(1),
        claim_end: now + Duration::hours(1),
        pickup_start: now + Duration::hours(2),
        pickup_end: now + Duration::hours(4),
        access_code: None,
        qr_code: None,
        show_price_ranges: false,
    }
}

pub async fn sale(store: &dyn ClaimStore, seller_id: i64) -> Sale {
    handle_create_sale(
        sale_command(seller_id, base_time()),
        &Principal::Admin,
        store,
        base_time(),
    )
    .await
    .expect("create sale")
}

pub async fn item(
    store: &dyn ClaimStore,
    sale_id: i64,
    starting_price: i64,
    offer_increment: i64,
    buy_now_price: Option<i64>,
) -> Item {
    handle_create_item(
        sale_id,
        CreateItemCommand {
            item_number: None,
            title: "Walnut sideboard".to_string(),
            description: None,
            starting_price,
            offer_increment: Some(offer_increment),
            buy_now_price,
            category: Some("furniture".to_string()),
            condition_rating: Some(4),
        },
        &Principal::Admin,
        store,
        base_time(),
    )
    .await
    .expect("create item")
}

/// 등록 + 인증까지 마친 구매자
pub async fn verified_buyer(
    store: &dyn ClaimStore,
    sender: &CapturingSender,
    sale_id: i64,
    email: &str,
) -> (Buyer, String) {
    let config = AuthConfig::default();
    let challenge = buyers::handle_register(
        RegisterBuyerCommand {
            sale_id,
            name: "Alex".to_string(),
            contact: email.to_string(),
            auth_method: AuthMethod::Email,
        },
        store,
        sender,
        &config,
        base_time(),
    )
    .await
    .expect("register buyer");

    let session = buyers::handle_verify(
        VerifyCodeCommand {
            buyer_id: challenge.buyer_id,
            code: sender.last_code(challenge.buyer_id),
        },
        store,
        &config,
        base_time(),
    )
    .await
    .expect("verify buyer");
    (session.buyer, session.token)
}
