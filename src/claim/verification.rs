/// 인증 코드 확인 규칙
/// 저장소가 구매자 행을 잠근 상태에서 시도 하나를 반영한다. 카운터 증가와 코드 폐기가 한 번에 일어난다.
// region:    --- Imports
use super::model::Buyer;
use chrono::{DateTime, Utc};
// endregion: --- Imports

/// 코드 확인 시도. 코드와 토큰은 해시로만 담는다
#[derive(Debug, Clone)]
pub struct CodeAttempt {
    pub buyer_id: i64,
    pub code_hash: String,
    pub max_attempts: i32,
    /// 성공 시 발급할 세션
    pub session_token_hash: String,
    pub session_expires: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptResult {
    Verified,
    Invalid,
    /// 시도 횟수 초과로 코드가 폐기된 상태
    Locked,
}

/// 시도 결과와 반영 후의 구매자
#[derive(Debug, Clone)]
pub struct AttemptOutcome {
    pub buyer: Buyer,
    pub result: AttemptResult,
    /// 저장할 변경이 있는지
    pub changed: bool,
}

pub fn apply_attempt(
    mut buyer: Buyer,
    attempt: &CodeAttempt,
    now: DateTime<Utc>,
) -> AttemptOutcome {
    let unchanged = |buyer: Buyer, result: AttemptResult| AttemptOutcome {
        buyer,
        result,
        changed: false,
    };

    if buyer.failed_attempts >= attempt.max_attempts {
        return unchanged(buyer, AttemptResult::Locked);
    }
    if buyer.auth_code_hash.is_none() {
        return unchanged(buyer, AttemptResult::Invalid);
    }
    let matches = buyer.auth_code_hash.as_deref() == Some(attempt.code_hash.as_str());
    if buyer.auth_code_expires.map_or(true, |expires| expires <= now) {
        return unchanged(buyer, AttemptResult::Invalid);
    }

    let result = if matches {
        buyer.auth_verified = true;
        buyer.auth_code_hash = None;
        buyer.auth_code_expires = None;
        buyer.failed_attempts = 0;
        buyer.session_token_hash = Some(attempt.session_token_hash.clone());
        buyer.session_expires = Some(attempt.session_expires);
        buyer.last_activity = Some(now);
        AttemptResult::Verified
    } else {
        buyer.failed_attempts += 1;
        if buyer.failed_attempts >= attempt.max_attempts {
            buyer.auth_code_hash = None;
            buyer.auth_code_expires = None;
            AttemptResult::Locked
        } else {
            AttemptResult::Invalid
        }
    };

    AttemptOutcome {
        buyer,
        result,
        changed: true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::claim::codes::digest;
    use crate::claim::model::AuthMethod;
    use chrono::Duration;

    fn buyer(now: DateTime<Utc>) -> Buyer {
        Buyer {
            id: 4,
            sale_id: 1,
            name: "Alex".to_string(),
            email: Some("alex@buyer.test".to_string()),
            phone: None,
            auth_method: AuthMethod::Email,
            auth_code_hash: Some(digest("123456")),
            auth_code_expires: Some(now + Duration::minutes(15)),
            failed_attempts: 0,
            auth_verified: false,
            session_token_hash: None,
            session_expires: None,
            last_activity: None,
            created_at: now,
        }
    }

    fn attempt(code: &str, now: DateTime<Utc>) -> CodeAttempt {
        CodeAttempt {
            buyer_id: 4,
            code_hash: digest(code),
            max_attempts: 3,
            session_token_hash: digest("token"),
            session_expires: now + Duration::hours(4),
        }
    }

    #[test]
    fn matching_code_opens_a_session() {
        let now = Utc::now();
        let outcome = apply_attempt(buyer(now), &attempt("123456", now), now);
        assert_eq!(outcome.result, AttemptResult::Verified);
        assert!(outcome.buyer.auth_verified);
        assert!(outcome.buyer.auth_code_hash.is_none());
        assert_eq!(outcome.buyer.session_token_hash, Some(digest("token")));
    }

    #[test]
    fn last_allowed_failure_burns_the_code() {
        let now = Utc::now();
        let mut current = buyer(now);
        let mut results = Vec::new();
        for _ in 0..4 {
            let outcome = apply_attempt(current, &attempt("000000", now), now);
            results.push(outcome.result);
            current = outcome.buyer;
        }
        assert_eq!(
            results,
            vec![
                AttemptResult::Invalid,
                AttemptResult::Invalid,
                AttemptResult::Locked,
                AttemptResult::Locked,
            ]
        );
        assert_eq!(current.failed_attempts, 3);
        assert!(current.auth_code_hash.is_none());

        // 폐기 후에는 맞는 코드도 통과하지 못한다
        let outcome = apply_attempt(current, &attempt("123456", now), now);
        assert_eq!(outcome.result, AttemptResult::Locked);
        assert!(!outcome.changed);
    }

    #[test]
    fn expired_code_is_invalid_without_counting() {
        let now = Utc::now();
        let later = now + Duration::minutes(15);
        let outcome = apply_attempt(buyer(now), &attempt("123456", later), later);
        assert_eq!(outcome.result, AttemptResult::Invalid);
        assert!(!outcome.changed);
        assert_eq!(outcome.buyer.failed_attempts, 0);
    }
}
