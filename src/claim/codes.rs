/// 코드/토큰 생성과 해시
// region:    --- Imports
use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use rand::distributions::Uniform;
use rand::{Rng, RngCore};
use sha2::{Digest, Sha256};
// endregion: --- Imports

// 혼동되는 문자(0/O, 1/I) 제외
const CODE_ALPHABET: &[u8] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
const ACCESS_CODE_LEN: usize = 8;
const QR_CODE_LEN: usize = 10;

fn random_code(len: usize) -> String {
    let mut rng = rand::thread_rng();
    let dist = Uniform::from(0..CODE_ALPHABET.len());
    (0..len)
        .map(|_| CODE_ALPHABET[rng.sample(dist)] as char)
        .collect()
}

/// 세일 입장용 8자리 코드
pub fn generate_access_code() -> String {
    random_code(ACCESS_CODE_LEN)
}

/// `QR` 접두사가 붙은 QR 토큰
pub fn generate_qr_code() -> String {
    format!("QR{}", random_code(QR_CODE_LEN))
}

/// 사람이 입력한 코드를 비교 가능한 형태로
pub fn normalize_code(raw: &str) -> String {
    raw.trim().to_ascii_uppercase()
}

/// 6자리 인증 코드
pub fn generate_auth_code() -> String {
    format!("{:06}", rand::thread_rng().gen_range(100_000..1_000_000))
}

/// 32바이트 세션 토큰 (hex)
pub fn generate_session_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// 저장용 SHA-256 다이제스트
pub fn digest(secret: &str) -> String {
    hex::encode(Sha256::digest(secret.as_bytes()))
}

pub fn hash_password(password: &str) -> Result<String, String> {
    let salt = SaltString::generate(&mut OsRng);
    Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| e.to_string())
}

pub fn verify_password(password: &str, password_hash: &str) -> Result<bool, String> {
    let parsed = PasswordHash::new(password_hash).map_err(|e| e.to_string())?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}
