use super::model::{Sale, SaleStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// 세일의 시간대 묶음
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaleWindows {
    pub preview_start: Option<DateTime<Utc>>,
    pub preview_end: Option<DateTime<Utc>>,
    pub claim_start: DateTime<Utc>,
    pub claim_end: DateTime<Utc>,
    pub pickup_start: DateTime<Utc>,
    pub pickup_end: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum WindowError {
    #[error("claim_start must be before claim_end")]
    ClaimWindow,
    #[error("claim_end must not be after pickup_start")]
    ClaimOverlapsPickup,
    #[error("pickup_start must be before pickup_end")]
    PickupWindow,
    #[error("preview_start and preview_end must be given together")]
    PartialPreview,
    #[error("preview window must end before claiming starts")]
    PreviewWindow,
}

impl SaleWindows {
    pub fn of(sale: &Sale) -> Self {
        Self {
            preview_start: sale.preview_start,
            preview_end: sale.preview_end,
            claim_start: sale.claim_start,
            claim_end: sale.claim_end,
            pickup_start: sale.pickup_start,
            pickup_end: sale.pickup_end,
        }
    }

    /// claim_start < claim_end ≤ pickup_start < pickup_end
    /// preview 가 있으면 preview_start < preview_end ≤ claim_start
    pub fn validate(&self) -> Result<(), WindowError> {
        if self.claim_start >= self.claim_end {
            return Err(WindowError::ClaimWindow);
        }
        if self.claim_end > self.pickup_start {
            return Err(WindowError::ClaimOverlapsPickup);
        }
        if self.pickup_start >= self.pickup_end {
            return Err(WindowError::PickupWindow);
        }
        match (self.preview_start, self.preview_end) {
            (None, None) => Ok(()),
            (Some(start), Some(end)) if start < end && end <= self.claim_start => Ok(()),
            (Some(_), Some(_)) => Err(WindowError::PreviewWindow),
            _ => Err(WindowError::PartialPreview),
        }
    }
}

/// 화면 표시용 세일 단계
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SalePhase {
    Upcoming,
    Preview,
    Claiming,
    Pickup,
    Finished,
}

/// 클레임 기간 포함 여부 (양 끝 포함)
pub fn is_within_claim_window(sale: &Sale, now: DateTime<Utc>) -> bool {
    sale.claim_start <= now && now <= sale.claim_end
}

/// 오퍼를 받을 수 있는 세일인지
pub fn accepts_claims(sale: &Sale, now: DateTime<Utc>) -> bool {
    sale.status == SaleStatus::Active && is_within_claim_window(sale, now)
}

pub fn sale_phase(sale: &Sale, now: DateTime<Utc>) -> SalePhase {
    if now > sale.pickup_end {
        SalePhase::Finished
    } else if now >= sale.pickup_start {
        SalePhase::Pickup
    } else if is_within_claim_window(sale, now) {
        SalePhase::Claiming
    } else if matches!(
        (sale.preview_start, sale.preview_end),
        (Some(start), Some(end)) if start <= now && now <= end
    ) {
        SalePhase::Preview
    } else if now < sale.claim_start {
        SalePhase::Upcoming
    } else {
        // claim_end 와 pickup_start 사이의 공백
        SalePhase::Pickup
    }
}
