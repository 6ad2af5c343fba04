/// 연락처 정규화/검증
use super::model::AuthMethod;

const PHONE_DIGITS: usize = 10;

/// 소문자, 앞뒤 공백 제거. 형식이 틀리면 None
pub fn normalize_email(raw: &str) -> Option<String> {
    let email = raw.trim().to_ascii_lowercase();
    let (local, domain) = email.split_once('@')?;
    let valid = !local.is_empty()
        && !domain.is_empty()
        && !domain.contains('@')
        && !email.contains(char::is_whitespace)
        && domain
            .split('.')
            .filter(|label| !label.is_empty())
            .count()
            >= 2
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !domain.contains("..");
    valid.then_some(email)
}

/// 숫자만 남겨 정확히 10자리여야 한다
pub fn normalize_phone(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    (digits.len() == PHONE_DIGITS).then_some(digits)
}

/// 인증 수단에 맞게 연락처 정규화
pub fn normalize_contact(method: AuthMethod, raw: &str) -> Option<String> {
    match method {
        AuthMethod::Email => normalize_email(raw),
        AuthMethod::Sms => normalize_phone(raw),
    }
}
