mod common;

use chrono::Duration;
use claim_sale_service::auth::Principal;
use claim_sale_service::buyers::{self, RegisterBuyerCommand, VerifyCodeCommand};
use claim_sale_service::claim::events::ClaimEvent;
use claim_sale_service::claim::model::{AuthMethod, HistoryAction, Item, ItemStatus, OfferStatus};
use claim_sale_service::claim::transition::TransitionError;
use claim_sale_service::config::{AuthConfig, SchedulerConfig};
use claim_sale_service::message_broker::LocalEventPublisher;
use claim_sale_service::offers::commands::{
    handle_accept_offer, handle_cancel_offer, handle_place_offer, handle_raise_offer,
    handle_reject_offer, PlaceOfferCommand, RaiseOfferCommand, ReviewOfferCommand,
};
use claim_sale_service::offers::{item_history, item_summary};
use claim_sale_service::sales::items::{self, handle_create_item, CreateItemCommand};
use claim_sale_service::sales::{self, handle_create_sale, handle_delete_sale};
use claim_sale_service::scheduler::ClaimScheduler;
use claim_sale_service::store::{ClaimStore, InMemoryClaimStore, ItemQuery};
use claim_sale_service::ClaimError;
use common::{base_time, CapturingSender};
use std::sync::Arc;

fn offer(item_id: i64, amount: i64) -> PlaceOfferCommand {
    PlaceOfferCommand {
        item_id,
        offer_amount: amount,
        max_offer: None,
    }
}

fn drain(receiver: &mut tokio::sync::mpsc::UnboundedReceiver<ClaimEvent>) -> Vec<&'static str> {
    let mut names = Vec::new();
    while let Ok(event) = receiver.try_recv() {
        names.push(event.event_type());
    }
    names
}

/// 오퍼 -> 수락 -> 다른 구매자의 오퍼는 거부
#[tokio::test]
async fn test_offer_accept_claims_item() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;

    let placed = handle_place_offer(offer(item.id, 120), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    assert_eq!(placed.offer.status, OfferStatus::Active);
    assert_eq!(placed.item.status, ItemStatus::Available);

    let accepted = handle_accept_offer(
        placed.offer.id,
        ReviewOfferCommand {
            seller_notes: Some("pickup Saturday".to_string()),
        },
        &Principal::Seller(seller.id),
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();
    assert!(accepted.changed);
    assert_eq!(accepted.offer.status, OfferStatus::Winning);
    assert_eq!(accepted.item.status, ItemStatus::Claimed);
    assert_eq!(accepted.item.winning_offer_id, Some(placed.offer.id));

    let err = handle_place_offer(offer(item.id, 150), &other, &store, &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::ItemNotAvailable { .. })
    ));

    // 클레임된 상품에는 낙찰 오퍼가 정확히 하나
    let winning: Vec<_> = store
        .offers_for_item(item.id)
        .await
        .unwrap()
        .into_iter()
        .filter(|listing| listing.offer.status == OfferStatus::Winning)
        .collect();
    assert_eq!(winning.len(), 1);

    assert_eq!(drain(&mut events), vec!["OfferPlaced", "OfferAccepted"]);
}

/// 시작가 미만, 최소 증가폭 미만 오퍼 거부
#[tokio::test]
async fn test_offer_minimums() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;

    let err = handle_place_offer(offer(item.id, 99), &buyer, &store, &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::AmountTooLow { minimum: 100, .. })
    ));

    handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    let err = handle_place_offer(offer(item.id, 109), &other, &store, &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::AmountTooLow { minimum: 110, .. })
    ));

    let err = handle_place_offer(
        PlaceOfferCommand {
            item_id: item.id,
            offer_amount: 120,
            max_offer: Some(115),
        },
        &other,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::MaxOfferBelowAmount { .. })
    ));
}

/// 시작가 0인 상품도 오퍼는 1 이상
#[tokio::test]
async fn test_free_item_needs_positive_offer() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 0, 100, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;

    let err = handle_place_offer(offer(item.id, 0), &buyer, &store, &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::AmountTooLow {
            amount: 0,
            minimum: 1
        })
    ));
    assert!(store.offers_for_item(item.id).await.unwrap().is_empty());

    let placed = handle_place_offer(offer(item.id, 1), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    assert_eq!(placed.offer.offer_amount, 1);
}

/// 수락 재시도는 아무것도 바꾸지 않는다
#[tokio::test]
async fn test_accept_is_idempotent() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;

    let placed = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    let first = handle_accept_offer(
        placed.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Admin,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();
    let second = handle_accept_offer(
        placed.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Admin,
        &store,
        &publisher,
        now + Duration::minutes(1),
    )
    .await
    .unwrap();

    assert!(first.changed);
    assert!(!second.changed);
    assert_eq!(second.offer.status, OfferStatus::Winning);
    assert_eq!(second.offer.updated_at, first.offer.updated_at);

    let history = item_history(item.id, &Principal::Admin, &store).await.unwrap();
    let accepted = history
        .iter()
        .filter(|entry| entry.action == HistoryAction::Accepted)
        .count();
    assert_eq!(accepted, 1);

    // 변화 없는 재시도는 이벤트도 없다
    assert_eq!(drain(&mut events), vec!["OfferPlaced", "OfferAccepted"]);
}

/// 동시에 형제 오퍼를 수락하면 하나만 낙찰
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_accepts_yield_one_winner() {
    let store = Arc::new(InMemoryClaimStore::new());
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

    let mut successes = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(result) => {
                assert!(result.changed);
                successes += 1;
            }
            Err(err) => assert!(matches!(err, ClaimError::Transition(_))),
        }
    }
    assert_eq!(successes, 1);

    let statuses: Vec<OfferStatus> = store
        .offers_for_item(item.id)
        .await
        .unwrap()
        .into_iter()
        .map(|listing| listing.offer.status)
        .collect();
    assert_eq!(
        statuses.iter().filter(|s| **s == OfferStatus::Winning).count(),
        1
    );
    assert_eq!(
        statuses.iter().filter(|s| **s == OfferStatus::Outbid).count(),
        1
    );
    let item = store.get_item(item.id).await.unwrap().unwrap();
    assert_eq!(item.status, ItemStatus::Claimed);
}

/// 즉시 구매가 이상이면 바로 낙찰, 밀려난 오퍼는 outbid
#[tokio::test]
async fn test_buy_now_claims_immediately() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, Some(500)).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;

    let early = handle_place_offer(offer(item.id, 150), &other, &store, &publisher, now)
        .await
        .unwrap();
    let result = handle_place_offer(offer(item.id, 500), &buyer, &store, &publisher, now)
        .await
        .unwrap();

    assert_eq!(result.offer.status, OfferStatus::Winning);
    assert_eq!(result.item.status, ItemStatus::Claimed);
    assert_eq!(result.outbid_offer_ids, vec![early.offer.id]);
    assert_eq!(
        store.get_offer(early.offer.id).await.unwrap().unwrap().status,
        OfferStatus::Outbid
    );
    assert_eq!(
        drain(&mut events),
        vec!["OfferPlaced", "OfferPlaced", "OfferAccepted"]
    );
}

/// 상향이 즉시 구매가에 닿으면 같은 처리 안에서 낙찰
#[tokio::test]
async fn test_raise_to_buy_now_claims_item() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, Some(500)).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;

    let mine = handle_place_offer(offer(item.id, 150), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    let rival = handle_place_offer(offer(item.id, 200), &other, &store, &publisher, now)
        .await
        .unwrap();

    let result = handle_raise_offer(
        RaiseOfferCommand {
            offer_id: mine.offer.id,
            offer_amount: 500,
        },
        &buyer,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();

    assert_eq!(result.offer.offer_amount, 500);
    assert_eq!(result.offer.status, OfferStatus::Winning);
    assert_eq!(result.item.status, ItemStatus::Claimed);
    assert_eq!(result.item.winning_offer_id, Some(mine.offer.id));
    assert_eq!(result.outbid_offer_ids, vec![rival.offer.id]);
    assert_eq!(
        store.get_offer(rival.offer.id).await.unwrap().unwrap().status,
        OfferStatus::Outbid
    );
    assert_eq!(
        drain(&mut events),
        vec!["OfferPlaced", "OfferPlaced", "OfferRaised", "OfferAccepted"]
    );
}

/// 상향, 취소, 거절
#[tokio::test]
async fn test_raise_cancel_and_reject() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;

    let placed = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();

    // 남의 오퍼는 건드릴 수 없다
    let err = handle_raise_offer(
        RaiseOfferCommand {
            offer_id: placed.offer.id,
            offer_amount: 200,
        },
        &other,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClaimError::Forbidden));

    let raised = handle_raise_offer(
        RaiseOfferCommand {
            offer_id: placed.offer.id,
            offer_amount: 200,
        },
        &buyer,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();
    assert_eq!(raised.offer.offer_amount, 200);

    // 같은 구매자의 두 번째 오퍼는 상향으로 처리
    let again = handle_place_offer(offer(item.id, 250), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    assert_eq!(again.offer.id, placed.offer.id);
    assert_eq!(again.offer.offer_amount, 250);

    let cancelled = handle_cancel_offer(placed.offer.id, &buyer, &store, &publisher, now)
        .await
        .unwrap();
    assert_eq!(cancelled.offer.status, OfferStatus::Cancelled);

    let rival = handle_place_offer(offer(item.id, 100), &other, &store, &publisher, now)
        .await
        .unwrap();
    let rejected = handle_reject_offer(
        rival.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Seller(seller.id),
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();
    assert_eq!(rejected.offer.status, OfferStatus::Rejected);
    assert_eq!(rejected.item.status, ItemStatus::Available);

    // 종결 상태에서 수락 불가
    let err = handle_accept_offer(
        rival.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Admin,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::Transition(TransitionError::InvalidTransition { .. })
    ));

    let history = item_history(item.id, &Principal::Admin, &store).await.unwrap();
    let actions: Vec<HistoryAction> = history.iter().map(|entry| entry.action).collect();
    assert_eq!(
        actions,
        vec![
            HistoryAction::Rejected,
            HistoryAction::Placed,
            HistoryAction::Cancelled,
            HistoryAction::Increased,
            HistoryAction::Increased,
            HistoryAction::Placed,
        ]
    );
}

/// 다른 판매자의 세일 오퍼는 검토할 수 없다
#[tokio::test]
async fn test_sellers_review_only_their_sales() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let stranger = common::seller(&store, "other@pine.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;

    let placed = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    let err = handle_accept_offer(
        placed.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Seller(stranger.id),
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClaimError::Forbidden));
}

/// 클레임 기간 밖에서는 등록/오퍼 불가
#[tokio::test]
async fn test_claim_window_is_enforced() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;

    let late = now + Duration::hours(1) + Duration::seconds(1);
    let err = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, late)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::OutsideClaimWindow { .. }));

    // 끝 시각은 포함
    let edge = now + Duration::hours(1);
    handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, edge)
        .await
        .unwrap();

    let err = buyers::handle_register(
        RegisterBuyerCommand {
            sale_id: sale.id,
            name: "Late".to_string(),
            contact: "late@buyer.test".to_string(),
            auth_method: AuthMethod::Email,
        },
        &store,
        &sender,
        &AuthConfig::default(),
        late,
    )
    .await
    .unwrap_err();
    assert!(matches!(err, ClaimError::OutsideClaimWindow { .. }));
}

/// 다른 세일의 구매자는 오퍼할 수 없다
#[tokio::test]
async fn test_buyer_must_belong_to_sale() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let elsewhere = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, elsewhere.id, "b@buyer.test").await;

    let err = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::NotVerified));
}

/// 세션은 만료 시각부터 통과하지 못한다
#[tokio::test]
async fn test_session_expiry() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let (buyer, token) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let expires = buyer.session_expires.unwrap();
    assert_eq!(expires, now + Duration::hours(4));

    let seen = expires - Duration::seconds(1);
    let valid = buyers::validate_session(&token, &store, seen)
        .await
        .unwrap();
    assert_eq!(valid.id, buyer.id);
    let stored = store.get_buyer(buyer.id).await.unwrap().unwrap();
    assert_eq!(stored.last_activity, Some(seen));

    let err = buyers::validate_session(&token, &store, expires)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::SessionExpired));

    let err = buyers::validate_session("not-a-token", &store, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Unauthorized));

    buyers::handle_logout(valid, &store).await.unwrap();
    let err = buyers::validate_session(&token, &store, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Unauthorized));

    // 로그아웃은 세션만 비우고 나머지는 그대로
    let stored = store.get_buyer(buyer.id).await.unwrap().unwrap();
    assert!(stored.session_token_hash.is_none());
    assert!(stored.session_expires.is_none());
    assert!(stored.auth_verified);
    assert_eq!(stored.last_activity, Some(seen));
}

/// 실패 횟수를 넘기면 코드가 폐기된다
#[tokio::test]
async fn test_verification_locks_after_max_attempts() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let config = AuthConfig::default();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let challenge = buyers::handle_register(
        RegisterBuyerCommand {
            sale_id: sale.id,
            name: "Pat".to_string(),
            contact: "(541) 555-0199".to_string(),
            auth_method: AuthMethod::Sms,
        },
        &store,
        &sender,
        &config,
        now,
    )
    .await
    .unwrap();
    let code = sender.last_code(challenge.buyer_id);
    let wrong = if code == "000000" { "111111" } else { "000000" };

    let verify = |code: &str| VerifyCodeCommand {
        buyer_id: challenge.buyer_id,
        code: code.to_string(),
    };

    for _ in 1..config.max_verify_attempts {
        let err = buyers::handle_verify(verify(wrong), &store, &config, now)
            .await
            .unwrap_err();
        assert!(matches!(err, ClaimError::InvalidCode));
    }
    let err = buyers::handle_verify(verify(wrong), &store, &config, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::TooManyAttempts));

    // 올바른 코드도 폐기 후에는 통하지 않는다
    let err = buyers::handle_verify(verify(&code), &store, &config, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::TooManyAttempts));

    let resent = buyers::handle_resend(challenge.buyer_id, &store, &sender, &config, now)
        .await
        .unwrap();
    assert!(resent.resent);
    let session = buyers::handle_verify(
        verify(&sender.last_code(challenge.buyer_id)),
        &store,
        &config,
        now,
    )
    .await
    .unwrap();
    assert!(session.buyer.auth_verified);
    assert_eq!(session.buyer.phone.as_deref(), Some("5415550199"));
}

/// 동시에 틀린 코드를 보내도 허용 횟수 이상은 검사되지 않는다
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_verification_respects_attempt_cap() {
    let store = Arc::new(InMemoryClaimStore::new());
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
    let mut locked = 0;
    for task in tasks {
        match task.await.unwrap() {
            Err(ClaimError::InvalidCode) => invalid += 1,
            Err(ClaimError::TooManyAttempts) => locked += 1,
            other => panic!("unexpected verify result: {other:?}"),
        }
    }
    assert_eq!(invalid, config.max_verify_attempts - 1);
    assert_eq!(locked, 64 - invalid);

    let stored = store.get_buyer(challenge.buyer_id).await.unwrap().unwrap();
    assert_eq!(stored.failed_attempts, config.max_verify_attempts);
    assert!(stored.auth_code_hash.is_none());
    assert!(!stored.auth_verified);
}

/// 같은 연락처로 다시 등록하면 같은 구매자에게 새 코드
#[tokio::test]
async fn test_reregistration_reuses_buyer() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let config = AuthConfig::default();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let register = |name: &str, contact: &str| RegisterBuyerCommand {
        sale_id: sale.id,
        name: name.to_string(),
        contact: contact.to_string(),
        auth_method: AuthMethod::Email,
    };

    let first = buyers::handle_register(register("Lee", "lee@buyer.test"), &store, &sender, &config, now)
        .await
        .unwrap();
    let later = now + Duration::minutes(3);
    let second = buyers::handle_register(
        register("Lee Park", " LEE@Buyer.test "),
        &store,
        &sender,
        &config,
        later,
    )
    .await
    .unwrap();
    assert_eq!(first.buyer_id, second.buyer_id);
    assert!(!first.resent);
    assert!(second.resent);

    // 새 이름이 반영되고 응답의 만료 시각은 저장된 값과 같다
    let stored = store.get_buyer(first.buyer_id).await.unwrap().unwrap();
    assert_eq!(stored.name, "Lee Park");
    assert_eq!(stored.auth_code_expires, Some(second.expires_at));
    assert_eq!(second.expires_at, later + config.auth_code_ttl);

    let resent = buyers::handle_resend(first.buyer_id, &store, &sender, &config, later)
        .await
        .unwrap();
    let stored = store.get_buyer(first.buyer_id).await.unwrap().unwrap();
    assert_eq!(stored.auth_code_expires, Some(resent.expires_at));
    assert_eq!(stored.name, "Lee Park");

    let err = buyers::handle_register(register("Lee", "not-an-email"), &store, &sender, &config, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Validation(_)));
}

/// 입장 코드 중복 거부
#[tokio::test]
async fn test_access_codes_are_unique() {
    let store = InMemoryClaimStore::new();
    let now = base_time();
    let seller = common::seller(&store, "owner@oak.test").await;

    let mut cmd = common::sale_command(seller.id, now);
    cmd.access_code = Some("maple234".to_string());
    let sale = handle_create_sale(cmd.clone(), &Principal::Admin, &store, now)
        .await
        .unwrap();
    assert_eq!(sale.access_code, "MAPLE234");
    assert!(sale.qr_code.starts_with("QR"));

    let err = handle_create_sale(cmd, &Principal::Admin, &store, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::DuplicateAccessCode));

    let found = sales::find_by_access_code(" Maple234 ", &store, now)
        .await
        .unwrap();
    assert_eq!(found.id, sale.id);
}

/// 잘못된 시간대는 생성 단계에서 거부
#[tokio::test]
async fn test_sale_windows_are_validated() {
    let store = InMemoryClaimStore::new();
    let now = base_time();
    let seller = common::seller(&store, "owner@oak.test").await;

    let mut cmd = common::sale_command(seller.id, now);
    cmd.pickup_start = cmd.claim_end - Duration::minutes(1);
    let err = handle_create_sale(cmd, &Principal::Admin, &store, now)
        .await
        .unwrap_err();
    assert!(matches!(err, ClaimError::Window(_)));
}

/// 세일 삭제는 하위 데이터까지 모두 지운다
#[tokio::test]
async fn test_sale_delete_cascades() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, token) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let placed = handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();

    handle_delete_sale(sale.id, &Principal::Seller(seller.id), &store, &publisher, now)
        .await
        .unwrap();

    assert!(store.get_sale(sale.id).await.unwrap().is_none());
    assert!(store.get_item(item.id).await.unwrap().is_none());
    assert!(store.get_offer(placed.offer.id).await.unwrap().is_none());
    assert!(store.get_buyer(buyer.id).await.unwrap().is_none());
    assert!(buyers::validate_session(&token, &store, now).await.is_err());
    assert_eq!(drain(&mut events), vec!["OfferPlaced", "SaleDeleted"]);
}

/// 가격대 비공개 세일은 요약에 금액을 싣지 않는다
#[tokio::test]
async fn test_summary_hides_amounts_by_default() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let item = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;
    let (other, _) = common::verified_buyer(&store, &sender, sale.id, "c@buyer.test").await;
    handle_place_offer(offer(item.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    handle_place_offer(offer(item.id, 130), &other, &store, &publisher, now)
        .await
        .unwrap();

    let summary = item_summary(item.id, &store).await.unwrap();
    assert_eq!(summary.offer_count, 2);
    assert_eq!(summary.unique_buyers, 2);
    assert_eq!(summary.min_offer, None);

    let mut shown = store.get_sale(sale.id).await.unwrap().unwrap();
    shown.show_price_ranges = true;
    store.update_sale(&shown).await.unwrap();
    let summary = item_summary(item.id, &store).await.unwrap();
    assert_eq!(summary.min_offer, Some(100));
    assert_eq!(summary.max_offer, Some(130));
}

/// 스케줄러: 오래된 오퍼 만료, 끝난 세일 종료
#[tokio::test]
async fn test_scheduler_sweep() {
    let store = Arc::new(InMemoryClaimStore::new());
    let sender = CapturingSender::default();
    let (publisher, mut events) = LocalEventPublisher::channel();
    let publisher = Arc::new(publisher);
    let now = base_time();

    let seller = common::seller(store.as_ref(), "owner@oak.test").await;
    let sale = common::sale(store.as_ref(), seller.id).await;
    let item = common::item(store.as_ref(), sale.id, 100, 10, None).await;
    let (buyer, _) =
        common::verified_buyer(store.as_ref(), &sender, sale.id, "b@buyer.test").await;
    let placed = handle_place_offer(
        offer(item.id, 100),
        &buyer,
        store.as_ref(),
        publisher.as_ref(),
        now,
    )
    .await
    .unwrap();
    drain(&mut events);

    let scheduler = ClaimScheduler::new(
        store.clone(),
        publisher.clone(),
        SchedulerConfig {
            interval_secs: 60,
            offer_expiry: Some(Duration::hours(2)),
        },
    );

    let report = scheduler.run_once(now + Duration::hours(1)).await.unwrap();
    assert_eq!(report.expired_offers, 0);
    assert!(report.closed_sales.is_empty());

    let report = scheduler.run_once(now + Duration::hours(5)).await.unwrap();
    assert_eq!(report.expired_offers, 1);
    assert_eq!(report.closed_sales, vec![sale.id]);
    assert_eq!(report.cleared_sessions, 1);
    assert_eq!(
        store.get_offer(placed.offer.id).await.unwrap().unwrap().status,
        OfferStatus::Expired
    );
    assert_eq!(drain(&mut events), vec!["OffersExpired", "SaleClosed"]);
}

/// 상품 검색과 카테고리 필터
#[tokio::test]
async fn test_item_search_and_category() {
    let store = InMemoryClaimStore::new();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let add = |number: &str, title: &str, description: Option<&str>, category: &str| CreateItemCommand {
        item_number: Some(number.to_string()),
        title: title.to_string(),
        description: description.map(str::to_string),
        starting_price: 100,
        offer_increment: None,
        buy_now_price: None,
        category: Some(category.to_string()),
        condition_rating: None,
    };
    for cmd in [
        add("A-1", "Walnut sideboard", None, "Furniture"),
        add("A-2", "Brass lamp", Some("pairs with the walnut desk"), "Lighting"),
        add("B-7", "Oak rocking chair", None, "furniture"),
    ] {
        handle_create_item(sale.id, cmd, &Principal::Admin, &store, now)
            .await
            .unwrap();
    }

    let numbers = |items: Vec<Item>| -> Vec<String> {
        items
            .into_iter()
            .filter_map(|item| item.item_number)
            .collect()
    };

    let query = ItemQuery {
        category: Some("FURNITURE".to_string()),
        ..ItemQuery::default()
    };
    let found = items::list_items(sale.id, &query, &store).await.unwrap();
    assert_eq!(numbers(found), vec!["A-1", "B-7"]);

    // 제목과 설명 모두 검색
    let query = ItemQuery {
        search: Some(" walnut ".to_string()),
        ..ItemQuery::default()
    };
    let found = items::list_items(sale.id, &query, &store).await.unwrap();
    assert_eq!(numbers(found), vec!["A-1", "A-2"]);

    let query = ItemQuery {
        search: Some("b-7".to_string()),
        status: Some(ItemStatus::Available),
        ..ItemQuery::default()
    };
    let found = items::list_items(sale.id, &query, &store).await.unwrap();
    assert_eq!(numbers(found), vec!["B-7"]);

    // 빈 검색어는 조건 없음
    let query = ItemQuery {
        search: Some("  ".to_string()),
        ..ItemQuery::default()
    };
    let found = items::list_items(sale.id, &query, &store).await.unwrap();
    assert_eq!(found.len(), 3);
}

/// 구매자 오퍼 통계
#[tokio::test]
async fn test_buyer_stats() {
    let store = InMemoryClaimStore::new();
    let sender = CapturingSender::default();
    let (publisher, _events) = LocalEventPublisher::channel();
    let now = base_time();

    let seller = common::seller(&store, "owner@oak.test").await;
    let sale = common::sale(&store, seller.id).await;
    let first = common::item(&store, sale.id, 100, 10, None).await;
    let second = common::item(&store, sale.id, 100, 10, None).await;
    let third = common::item(&store, sale.id, 100, 10, None).await;
    let (buyer, _) = common::verified_buyer(&store, &sender, sale.id, "b@buyer.test").await;

    let won = handle_place_offer(offer(first.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    handle_place_offer(offer(second.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    let dropped = handle_place_offer(offer(third.id, 100), &buyer, &store, &publisher, now)
        .await
        .unwrap();
    handle_accept_offer(
        won.offer.id,
        ReviewOfferCommand::default(),
        &Principal::Admin,
        &store,
        &publisher,
        now,
    )
    .await
    .unwrap();
    handle_cancel_offer(dropped.offer.id, &buyer, &store, &publisher, now)
        .await
        .unwrap();

    let stats = buyers::buyer_stats(buyer.id, &store).await.unwrap();
    assert_eq!(stats.buyer_id, buyer.id);
    assert_eq!(stats.total_offers, 3);
    assert_eq!(stats.active_offers, 1);
    assert_eq!(stats.winning_offers, 1);

    let err = buyers::buyer_stats(9_999, &store).await.unwrap_err();
    assert!(matches!(err, ClaimError::NotFound { .. }));
}
