//! PostgreSQL 저장소 테스트. `DATABASE_URL` 이 필요하다.
//! cargo test --test postgres_store -- --ignored
mod common;

use claim_sale_service::auth::Principal;
use claim_sale_service::buyers::{self, RegisterBuyerCommand, VerifyCodeCommand};
use claim_sale_service::claim::model::{AuthMethod, ItemStatus, OfferStatus};
use claim_sale_service::claim::transition::TransitionError;
use claim_sale_service::config::{AuthConfig, DatabaseConfig};
use claim_sale_service::database::DatabaseManager;
use claim_sale_service::message_broker::LocalEventPublisher;
use claim_sale_service::offers::commands::{
    handle_accept_offer, handle_place_offer, handle_raise_offer, PlaceOfferCommand,
    RaiseOfferCommand, ReviewOfferCommand,
};
use claim_sale_service::sales::handle_delete_sale;
use claim_sale_service::store::{ClaimStore, PgClaimStore};
use claim_sale_service::ClaimError;
use common::{base_time, CapturingSender};
use std::sync::{Arc, Mutex};

// 테스트마다 스키마를 다시 만들므로 순서대로 실행
static DB_LOCK: Mutex<()> = Mutex::new(());

async fn setup() -> Arc<PgClaimStore> {
    let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    let db_manager = DatabaseManager::connect(&DatabaseConfig {
        url,
        max_connections: 5,
    })
    .await
    .expect("데이터베이스 연결 실패");
    db_manager.reset_database().await.expect("스키마 초기화 실패");
    Arc::new(PgClaimStore::new(Arc::new(db_manager)))
}

fn offer(item_id: i64, amount: i64) -> PlaceOfferCommand {
    PlaceOfferCommand {
        item_id,
        offer_amount: amount,
        max_offer: None,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_accepts() {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let store = setup().await;
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let publisher = Arc::new(publisher);
    let now = base_time();

    let seller = common::seller(store.as_ref(), "owner@oak.test").await;
    let sale = common::sale(store.as_ref(), seller.id).await;
    let item = common::item(store.as_ref(), sale.id, 100, 10, None).await;
    let (first_buyer, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "b@buyer.test").await;
    let (second_buyer, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "c@buyer.test").await;

    let first = handle_place_offer(offer(item.id, 100), &first_buyer, store.as_ref(), publisher.as_ref(), now)
        .await
        .unwrap();
    let second = handle_place_offer(offer(item.id, 110), &second_buyer, store.as_ref(), publisher.as_ref(), now)
        .await
        .unwrap();

    let tasks: Vec<_> = [first.offer.id, second.offer.id]
        .into_iter()
        .map(|offer_id| {
            let store = Arc::clone(&store);
            let publisher = Arc::clone(&publisher);
            tokio::spawn(async move {
                handle_accept_offer(
                    offer_id,
                    ReviewOfferCommand::default(),
                    &Principal::Admin,
                    store.as_ref(),
                    publisher.as_ref(),
                    now,
                )
                .await
            })
        })
        .collect();

    let mut winners = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => winners += 1,
            Err(err) => assert!(matches!(err, ClaimError::Transition(_))),
        }
    }
    assert_eq!(winners, 1);

    let listings = store.offers_for_item(item.id).await.unwrap();
    let winning = listings
        .iter()
        .filter(|listing| listing.offer.status == OfferStatus::Winning)
        .count();
    let outbid = listings
        .iter()
        .filter(|listing| listing.offer.status == OfferStatus::Outbid)
        .count();
    assert_eq!((winning, outbid), (1, 1));

    let item = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Claimed);

    // 재수락은 변화 없음
    let retry = handle_accept_offer(
        item.winning_offer_id.unwrap(),
        ReviewOfferCommand::default(),
        &Principal::Admin,
        store.as_ref(),
        publisher.as_ref(),
        now,
    )
    .await
    .unwrap();
    assert!(!retry.changed);
}

#[tokio::test]
#[ignore]
async fn test_pg_sale_delete_cascades() {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let store = setup().await;
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(store.as_ref(), "owner@oak.test").await;
    let sale = common::sale(store.as_ref(), seller.id).await;
    let item = common::item(store.as_ref(), sale.id, 100, 10, None).await;
    let (buyer, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "b@buyer.test").await;
    let placed = handle_place_offer(offer(item.id, 100), &buyer, store.as_ref(), &publisher, now)
        .await
        .unwrap();

    handle_delete_sale(sale.id, &Principal::Admin, store.as_ref(), &publisher, now)
        .await
        .unwrap();

    assert!(store.get_sale(sale.id).await.unwrap().is_none());
    assert!(store.get_item(item.id).await.unwrap().is_none());
    assert!(store.get_offer(placed.offer.id).await.unwrap().is_none());
    assert!(store.get_buyer(buyer.id).await.unwrap().is_none());

    // 판매자는 활성 세일이 없으니 삭제 가능
    store.delete_seller(seller.id).await.unwrap();
}

/// 행 잠금으로 동시 시도도 허용 횟수에서 멈춘다
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_pg_concurrent_verification_respects_attempt_cap() {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let store = setup().await;
    let sender = CapturingSender::default();
    let config = AuthConfig::default();
    let now = base_time();

    let seller = common::seller(store.as_ref(), "owner@oak.test").await;
    let sale = common::sale(store.as_ref(), seller.id).await;
    let challenge = buyers::handle_register(
        RegisterBuyerCommand {
            sale_id: sale.id,
            name: "Pat".to_string(),
            contact: "pat@buyer.test".to_string(),
            auth_method: AuthMethod::Email,
        },
        store.as_ref(),
        &sender,
        &config,
        now,
    )
    .await
    .unwrap();
    let code = sender.last_code(challenge.buyer_id);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let tasks: Vec<_> = (0..64)
        .map(|_| {
            let store = Arc::clone(&store);
            let config = config.clone();
            let cmd = VerifyCodeCommand {
                buyer_id: challenge.buyer_id,
                code: wrong.to_string(),
            };
            tokio::spawn(async move { buyers::handle_verify(cmd, store.as_ref(), &config, now).await })
        })
        .collect();

    let mut invalid = 0;
    for task in tasks {
        match task.await.unwrap() {
            Err(ClaimError::InvalidCode) => invalid += 1,
            Err(ClaimError::TooManyAttempts) => {}
            other => panic!("unexpected verify result: {other:?}"),
        }
    }
    assert_eq!(invalid, config.max_verify_attempts - 1);

    let stored = store.get_buyer(challenge.buyer_id).await.unwrap().unwrap();
    assert_eq!(stored.failed_attempts, config.max_verify_attempts);
    assert!(stored.auth_code_hash.is_none());
}

/// 0원 오퍼는 CHECK 제약까지 가지 않고 거부, 즉시 구매가 상향은 한 트랜잭션에서 낙찰
#[tokio::test]
#[ignore]
async fn test_pg_offer_floor_and_raise_to_buy_now() {
    let _guard = DB_LOCK.lock().unwrap_or_else(|e| e.into_inner());
    let store = setup().await;
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(store.as_ref(), "owner@oak.test").await;
    let sale = common::sale(store.as_ref(), seller.id).await;
    let free = common::item(store.as_ref(), sale.id, 0, 100, None).await;
    let item = common::item(store.as_ref(), sale.id, 100, 10, Some(500)).await;
    let (buyer, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "b@buyer.test").await;
    let (other, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "c@buyer.test").await;

    let err = handle_place_offer(offer(free.id, 0), &buyer, store.as_ref(), &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::AmountTooLow { minimum: 1, .. })
    ));

    let mine = handle_place_offer(offer(item.id, 150), &buyer, store.as_ref(), &publisher, now)
        .await
        .unwrap();
    let rival = handle_place_offer(offer(item.id, 200), &other, store.as_ref(), &publisher, now)
        .await
        .unwrap();
    let result = handle_raise_offer(
        RaiseOfferCommand {
            offer_id: mine.offer.id,
            offer_amount: 500,
        },
        &buyer,
        store.as_ref(),
        &publisher,
        now,
    )
    .await
    .unwrap();
    assert_eq!(result.offer.status, OfferStatus::Winning);
    assert_eq!(result.item.status, ItemStatus::Claimed);
    assert_eq!(result.outbid_offer_ids, vec![rival.offer.id]);
}
