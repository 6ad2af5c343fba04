/// 클레임 세일 정리 스케줄러
/// 1. 오래된 활성 오퍼 만료 (설정된 경우)
/// 2. 만료된 구매자 세션 정리
/// 3. 인증하지 않은 구매자 삭제
/// 4. 픽업까지 끝난 세일 종료
// region:    --- Imports
use crate::claim::events::ClaimEvent;
use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::message_broker::{publish_all, EventPublisher};
use crate::offers::commands::handle_expire_offers;
use crate::store::ClaimStore;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration};
use tracing::{debug, error, info};

// endregion: --- Imports

// 코드 만료 후 이만큼 지나도 인증하지 않은 구매자는 지운다
const UNVERIFIED_GRACE_DAYS: i64 = 1;

/// 한 번 실행한 결과
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub expired_offers: usize,
    pub cleared_sessions: u64,
    pub purged_buyers: u64,
    pub closed_sales: Vec<i64>,
}

// region:    --- Claim Scheduler
pub struct ClaimScheduler {
    store: Arc<dyn ClaimStore>,
    publisher: Arc<dyn EventPublisher>,
    config: SchedulerConfig,
}

impl ClaimScheduler {
    pub fn new(
        store: Arc<dyn ClaimStore>,
        publisher: Arc<dyn EventPublisher>,
        config: SchedulerConfig,
    ) -> Self {
        Self {
            store,
            publisher,
            config,
        }
    }

    /// 별도 태스크로 주기 실행
    pub fn start(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval = interval(Duration::from_secs(self.config.interval_secs.max(1)));
            loop {
                interval.tick().await;
                if let Err(e) = self.run_once(Utc::now()).await {
                    error!("{:<12} --> 정리 작업 중 오류 발생: {}", "Scheduler", e);
                }
            }
        })
    }

    pub async fn run_once(&self, now: DateTime<Utc>) -> Result<SweepReport> {
        let store = self.store.as_ref();
        let publisher = self.publisher.as_ref();
        let mut report = SweepReport::default();

        if let Some(older_than) = self.config.offer_expiry {
            report.expired_offers = handle_expire_offers(older_than, store, publisher, now)
                .await?
                .len();
        }

        report.cleared_sessions = store.clear_expired_sessions(now).await?;
        report.purged_buyers = store
            .purge_unverified_buyers(now - ChronoDuration::days(UNVERIFIED_GRACE_DAYS))
            .await?;

        report.closed_sales = store.close_finished_sales(now).await?;
        if !report.closed_sales.is_empty() {
            info!(
                "{:<12} --> 세일 {}건 자동 종료",
                "Scheduler",
                report.closed_sales.len()
            );
            let events = report
                .closed_sales
                .iter()
                .map(|sale_id| ClaimEvent::SaleClosed {
                    sale_id: *sale_id,
                    timestamp: now,
                })
                .collect();
            publish_all(publisher, events).await;
        }

        debug!("{:<12} --> 정리 완료: {:?}", "Scheduler", report);
        Ok(report)
    }
}
// endregion: --- Claim Scheduler
