use std::env;
use std::str::FromStr;
use std::time::Duration;

/// JWT 有效期上限（小时）
pub const MAX_JWT_EXPIRATION_HOURS: u64 = 24 * 365;

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    pub redis_url: String,
    pub jwt_secret: String,
    pub jwt_expiration_secs: u64,
    pub rate_limit_window_secs: u64,
    pub rate_limit_requests: u32,
    pub server_host: String,
    pub server_port: u16,
    pub api_base_uri: String,
}

impl Config {
    /// 从环境变量（及 `.env` 文件）加载配置。
    ///
    /// `DATABASE_URL` 和 `JWT_SECRET` 必须存在，其余项缺失或无法解析时使用默认值。
    pub fn from_env() -> Result<Self, env::VarError> {
        dotenv::dotenv().ok();

        let jwt_expiration_hours = env::var("JWT_EXPIRATION")
            .ok()
            .and_then(|v| parse_hours(&v))
            .unwrap_or(24);

        Ok(Config {
            database_url: env::var("DATABASE_URL")?,
            database_max_connections: var_or("DATABASE_MAX_CONNECTIONS", 10),
            redis_url: env::var("REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".into()),
            jwt_secret: env::var("JWT_SECRET")?,
            jwt_expiration_secs: hours_to_secs(jwt_expiration_hours),
            rate_limit_window_secs: var_or("RATE_LIMIT_WINDOW", 60),
            rate_limit_requests: var_or("RATE_LIMIT_REQUESTS", 100),
            server_host: env::var("SERVER_HOST").unwrap_or_else(|_| "0.0.0.0".into()),
            server_port: var_or("SERVER_PORT", 3000),
            api_base_uri: normalize_base_uri(
                &env::var("API_BASE_URI").unwrap_or_else(|_| "/api".into()),
            ),
        })
    }

    pub fn jwt_expiration(&self) -> Duration {
        Duration::from_secs(self.jwt_expiration_secs)
    }

    pub fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }
}

fn var_or<T: FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

/// "24h" 或 "24" 都表示 24 小时
fn parse_hours(value: &str) -> Option<u64> {
    value.trim().trim_end_matches('h').parse().ok()
}

fn hours_to_secs(hours: u64) -> u64 {
    if hours > MAX_JWT_EXPIRATION_HOURS {
        tracing::warn!(
            "JWT_EXPIRATION {}h exceeds {}h, clamped",
            hours,
            MAX_JWT_EXPIRATION_HOURS
        );
    }
    hours.min(MAX_JWT_EXPIRATION_HOURS) * 3600
}

// nest() 要求以 "/" 开头且不以 "/" 结尾
fn normalize_base_uri(value: &str) -> String {
    let trimmed = value.trim().trim_matches('/');
    if trimmed.is_empty() {
        "/api".to_string()
    } else {
        format!("/{}", trimmed)
    }
}
