use chrono::Duration;
use std::env;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;

/// 실행 환경
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnvironment {
    Development,
    Test,
    Production,
}

impl AppEnvironment {
    fn parse(value: &str) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "prod" | "production" => Self::Production,
            "test" | "ci" => Self::Test,
            _ => Self::Development,
        }
    }
}

/// 애플리케이션 전체 설정
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub environment: AppEnvironment,
    pub server: ServerConfig,
    pub telemetry: TelemetryConfig,
    pub database: Option<DatabaseConfig>,
    pub kafka: Option<KafkaConfig>,
    pub auth: AuthConfig,
    pub notify: NotifyConfig,
    pub scheduler: SchedulerConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let environment = AppEnvironment::parse(
            &env::var("APP_ENV").unwrap_or_else(|_| "development".to_string()),
        );

        let host = env::var("APP_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let port = parse_var("APP_PORT", 3000u16)?;
        let log_level = env::var("APP_LOG_LEVEL").unwrap_or_else(|_| "info".to_string());

        let database = match optional_var("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 5u32)?,
            }),
            None => None,
        };

        let kafka = optional_var("KAFKA_BROKERS").map(|brokers| KafkaConfig {
            brokers,
            topic: env::var("CLAIM_EVENTS_TOPIC").unwrap_or_else(|_| "claim-events".to_string()),
            group_id: env::var("KAFKA_GROUP_ID")
                .unwrap_or_else(|_| "claim-notifications".to_string()),
        });

        let auth = AuthConfig {
            admin_token: optional_var("ADMIN_API_TOKEN"),
            buyer_session: Duration::hours(parse_var("BUYER_SESSION_HOURS", 4i64)?),
            seller_session: Duration::hours(parse_var("SELLER_SESSION_HOURS", 12i64)?),
            auth_code_ttl: Duration::minutes(parse_var("AUTH_CODE_MINUTES", 15i64)?),
            max_verify_attempts: parse_var("MAX_VERIFY_ATTEMPTS", 5i32)?,
        };

        let notify = NotifyConfig {
            gateway_url: optional_var("NOTIFY_GATEWAY_URL"),
            gateway_key: optional_var("NOTIFY_GATEWAY_KEY"),
        };

        let offer_expiry = match optional_var("OFFER_EXPIRY_HOURS") {
            Some(raw) => Some(Duration::hours(parse_value("OFFER_EXPIRY_HOURS", &raw)?)),
            None => None,
        };
        let scheduler = SchedulerConfig {
            interval_secs: parse_var("SCHEDULER_INTERVAL_SECS", 60u64)?,
            offer_expiry,
        };

        Ok(Self {
            environment,
            server: ServerConfig { host, port },
            telemetry: TelemetryConfig { log_level },
            database,
            kafka,
            auth,
            notify,
            scheduler,
        })
    }
}

/// HTTP 서버 바인딩
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        if self.host.eq_ignore_ascii_case("localhost") {
            return Ok(SocketAddr::new(IpAddr::from([127, 0, 0, 1]), self.port));
        }

        let ip: IpAddr = self
            .host
            .parse()
            .map_err(|source| ConfigError::InvalidHost { source })?;

        Ok(SocketAddr::new(ip, self.port))
    }
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub topic: String,
    pub group_id: String,
}

/// 인증 관련 설정
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// 없으면 관리자 라우트는 항상 401
    pub admin_token: Option<String>,
    pub buyer_session: Duration,
    pub seller_session: Duration,
    pub auth_code_ttl: Duration,
    pub max_verify_attempts: i32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            admin_token: None,
            buyer_session: Duration::hours(4),
            seller_session: Duration::hours(12),
            auth_code_ttl: Duration::minutes(15),
            max_verify_attempts: 5,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct NotifyConfig {
    pub gateway_url: Option<String>,
    pub gateway_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub interval_secs: u64,
    /// 없으면 오퍼 자동 만료 안 함
    pub offer_expiry: Option<Duration>,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{name} has an invalid value '{value}'")]
    InvalidNumber { name: &'static str, value: String },
    #[error("APP_HOST must parse to an IPv4 or IPv6 address")]
    InvalidHost { source: std::net::AddrParseError },
}

fn optional_var(name: &str) -> Option<String> {
    env::var(name)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_var<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match optional_var(name) {
        Some(raw) => parse_value(name, &raw),
        None => Ok(default),
    }
}

fn parse_value<T: FromStr>(name: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.parse::<T>().map_err(|_| ConfigError::InvalidNumber {
        name,
        value: raw.to_string(),
    })
}
