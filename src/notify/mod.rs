/// 알림
/// 1. 구매자 인증 코드 발송 (ChallengeSender)
/// 2. 클레임 이벤트 -> 판매자 알림 (NotificationProjector)
// region:    --- Imports
use crate::claim::events::ClaimEvent;
use crate::claim::model::{Buyer, NewNotification, NotificationKind, Sale, SellerNotification};
use crate::config::NotifyConfig;
use crate::error::{ClaimError, Result};
use crate::store::ClaimStore;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info};
// endregion: --- Imports

// region:    --- Challenge Sender

/// 인증 코드 전달 수단
#[async_trait]
pub trait ChallengeSender: Send + Sync {
    async fn send_code(&self, buyer: &Buyer, sale: &Sale, code: &str) -> Result<()>;
}

/// 게이트웨이 요청 본문
#[derive(Debug, Serialize)]
struct GatewayMessage<'a> {
    channel: &'a str,
    to: &'a str,
    subject: String,
    body: String,
}

/// HTTP 메일/SMS 게이트웨이로 발송
pub struct HttpChallengeSender {
    client: reqwest::Client,
    url: String,
    api_key: Option<String>,
}

impl HttpChallengeSender {
    pub fn new(url: impl Into<String>, api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            api_key,
        }
    }
}

#[async_trait]
impl ChallengeSender for HttpChallengeSender {
    async fn send_code(&self, buyer: &Buyer, sale: &Sale, code: &str) -> Result<()> {
        let to = buyer
            .contact()
            .ok_or_else(|| ClaimError::Notify(format!("buyer {} has no contact", buyer.id)))?;
        let message = GatewayMessage {
            channel: buyer.auth_method.as_str(),
            to,
            subject: format!("Your verification code for {}", sale.title),
            body: format!("Your verification code for {} is {}.", sale.title, code),
        };

        let mut request = self.client.post(&self.url).json(&message);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        request
            .send()
            .await
            .and_then(|response| response.error_for_status())
            .map_err(|e| ClaimError::Notify(e.to_string()))?;

        info!(
            "{:<12} --> 인증 코드 발송: buyer {} via {}",
            "Notify",
            buyer.id,
            buyer.auth_method.as_str()
        );
        Ok(())
    }
}

/// 게이트웨이가 없을 때 로그로 대신한다 (개발용)
pub struct LogChallengeSender;

#[async_trait]
impl ChallengeSender for LogChallengeSender {
    async fn send_code(&self, buyer: &Buyer, sale: &Sale, code: &str) -> Result<()> {
        info!(
            "{:<12} --> [{}] sale {} buyer {} code {}",
            "Notify",
            buyer.auth_method.as_str(),
            sale.id,
            buyer.id,
            code
        );
        Ok(())
    }
}

pub fn challenge_sender(config: &NotifyConfig) -> Arc<dyn ChallengeSender> {
    match &config.gateway_url {
        Some(url) => Arc::new(HttpChallengeSender::new(url, config.gateway_key.clone())),
        None => Arc::new(LogChallengeSender),
    }
}

// endregion: --- Challenge Sender

// region:    --- Notification Projector

/// 센트 -> "$12.34"
pub fn format_cents(cents: i64) -> String {
    let sign = if cents < 0 { "-" } else { "" };
    let cents = cents.unsigned_abs();
    format!("{sign}${}.{:02}", cents / 100, cents % 100)
}

/// 클레임 이벤트를 판매자 알림으로 옮긴다
#[derive(Clone)]
pub struct NotificationProjector {
    store: Arc<dyn ClaimStore>,
}

impl NotificationProjector {
    pub fn new(store: Arc<dyn ClaimStore>) -> Self {
        Self { store }
    }

    /// 알림 대상이 아닌 이벤트는 None
    pub async fn project(&self, event: &ClaimEvent) -> Result<Option<SellerNotification>> {
        let (kind, item_id, sale_id, amount) = match event {
            ClaimEvent::OfferPlaced {
                item_id,
                sale_id,
                amount,
                ..
            } => (NotificationKind::NewOffer, *item_id, *sale_id, *amount),
            ClaimEvent::OfferAccepted {
                item_id,
                sale_id,
                amount,
                ..
            } => (NotificationKind::OfferAccepted, *item_id, *sale_id, *amount),
            _ => return Ok(None),
        };

        // 그 사이 삭제된 세일/상품은 조용히 건너뛴다
        let Some(sale) = self.store.get_sale(sale_id).await? else {
            debug!("{:<12} --> 세일 {} 없음, 알림 생략", "Projector", sale_id);
            return Ok(None);
        };
        let Some(item) = self.store.get_item(item_id).await? else {
            debug!("{:<12} --> 상품 {} 없음, 알림 생략", "Projector", item_id);
            return Ok(None);
        };

        let (title, message) = match kind {
            NotificationKind::NewOffer => (
                "New offer received".to_string(),
                format!(
                    "A new offer of {} was placed on \"{}\".",
                    format_cents(amount),
                    item.title
                ),
            ),
            NotificationKind::OfferAccepted => (
                "Item claimed".to_string(),
                format!(
                    "\"{}\" was claimed for {}.",
                    item.title,
                    format_cents(amount)
                ),
            ),
        };

        let notification = self
            .store
            .insert_notification(
                NewNotification {
                    seller_id: sale.seller_id,
                    sale_id: sale.id,
                    kind,
                    title,
                    message,
                },
                Utc::now(),
            )
            .await?;
        info!(
            "{:<12} --> 판매자 {} 알림 생성 ({})",
            "Projector",
            notification.seller_id,
            kind.as_str()
        );
        Ok(Some(notification))
    }

    /// 로컬 채널 구독 루프. 송신측이 모두 닫히면 끝난다
    pub async fn run_local(self, mut receiver: mpsc::UnboundedReceiver<ClaimEvent>) {
        while let Some(event) = receiver.recv().await {
            if let Err(e) = self.project(&event).await {
                error!("{:<12} --> 알림 생성 실패: {}", "Projector", e);
            }
        }
        debug!("{:<12} --> 로컬 이벤트 채널 종료", "Projector");
    }
}

// endregion: --- Notification Projector

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_cents_as_dollars() {
        assert_eq!(format_cents(0), "$0.00");
        assert_eq!(format_cents(1205), "$12.05");
        assert_eq!(format_cents(-50), "-$0.50");
    }
}
