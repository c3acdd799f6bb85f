/*
 * Responsibility
 * - 環境変数から gateway の設定を読み込む (JWT secret, upstream, identity cache, allow-list)
 * - 設定値のバリデーション (不足なら起動失敗)
 */
use std::fmt;
use std::net::SocketAddr;
use std::str::FromStr;

use url::Url;

use crate::services::auth::allow_list::DEFAULT_ALLOW_LIST;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppEnv {
    Development,
    Production,
}

impl AppEnv {
    fn parse(raw: Option<String>) -> Self {
        match raw
            .unwrap_or_else(|| "development".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "production" | "prod" => Self::Production,
            _ => Self::Development,
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }
}

/// What to do when a verified token names a user that is not in the identity cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserLookupPolicy {
    /// Reject the request.
    FailClosed,
    /// Log the miss and forward anyway.
    FailOpen,
}

impl FromStr for UserLookupPolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            "fail-open" | "open" => Ok(Self::FailOpen),
            _ => Err(ConfigError::Invalid("AUTH_USER_LOOKUP")),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    Missing(&'static str),
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Missing(key) => write!(f, "missing configuration: {}", key),
            ConfigError::Invalid(key) => write!(f, "invalid configuration: {}", key),
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Clone)]
pub struct Config {
    pub addr: SocketAddr,
    pub app_env: AppEnv,

    // Base64 encoded HMAC secret shared with the token issuer
    pub jwt_secret_key: String,

    pub upstream_url: Url,
    pub upstream_timeout_seconds: u64,

    pub redis_url: Option<String>,

    pub allow_list: Vec<String>,
    pub user_lookup_policy: UserLookupPolicy,
    pub secret_key_bypass: bool,

    pub request_timeout_seconds: u64,
    pub request_body_limit_bytes: usize,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Do not print key material
        f.debug_struct("Config")
            .field("addr", &self.addr)
            .field("app_env", &self.app_env)
            .field("upstream_url", &self.upstream_url.as_str())
            .field("redis_url", &self.redis_url.is_some())
            .field("allow_list", &self.allow_list)
            .field("user_lookup_policy", &self.user_lookup_policy)
            .field("secret_key_bypass", &self.secret_key_bypass)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// `from_env` passes `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let port: u16 = match lookup("PORT") {
            Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid("PORT"))?,
            None => 8080,
        };

        let addr: SocketAddr = SocketAddr::from_str(&format!("0.0.0.0:{}", port))
            .map_err(|_| ConfigError::Invalid("PORT"))?;

        let app_env = AppEnv::parse(lookup("APP_ENV"));

        let jwt_secret_key = lookup("JWT_SECRET_KEY")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .ok_or(ConfigError::Missing("JWT_SECRET_KEY"))?;

        let upstream_url = lookup("UPSTREAM_URL").ok_or(ConfigError::Missing("UPSTREAM_URL"))?;
        let upstream_url =
            Url::parse(upstream_url.trim()).map_err(|_| ConfigError::Invalid("UPSTREAM_URL"))?;
        if !matches!(upstream_url.scheme(), "http" | "https") {
            return Err(ConfigError::Invalid("UPSTREAM_URL"));
        }

        let upstream_timeout_seconds = parse_or(&lookup, "UPSTREAM_TIMEOUT_SECONDS", 15)?;

        let redis_url = lookup("REDIS_URL")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());

        let allow_list = match lookup("AUTH_ALLOW_LIST") {
            Some(raw) => raw
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect::<Vec<_>>(),
            None => DEFAULT_ALLOW_LIST.iter().map(|s| s.to_string()).collect(),
        };

        let user_lookup_policy = match lookup("AUTH_USER_LOOKUP") {
            Some(raw) => raw.parse()?,
            None => UserLookupPolicy::FailClosed,
        };

        let secret_key_bypass = match lookup("AUTH_SECRET_KEY_BYPASS") {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::Invalid("AUTH_SECRET_KEY_BYPASS"))?,
            None => true,
        };

        let request_timeout_seconds = parse_or(&lookup, "REQUEST_TIMEOUT_SECONDS", 30)?;
        let request_body_limit_bytes = parse_or(&lookup, "REQUEST_BODY_LIMIT_BYTES", 1024 * 1024)?;

        Ok(Self {
            addr,
            app_env,
            jwt_secret_key,
            upstream_url,
            upstream_timeout_seconds,
            redis_url,
            allow_list,
            user_lookup_policy,
            secret_key_bypass,
            request_timeout_seconds,
            request_body_limit_bytes,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    const REQUIRED: [(&str, &str); 2] = [
        ("JWT_SECRET_KEY", "c2VjcmV0"),
        ("UPSTREAM_URL", "http://127.0.0.1:9000"),
    ];

    #[test]
    fn defaults_apply_when_only_required_keys_are_set() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();

        assert_eq!(config.addr.port(), 8080);
        assert_eq!(config.app_env, AppEnv::Development);
        assert_eq!(config.user_lookup_policy, UserLookupPolicy::FailClosed);
        assert!(config.secret_key_bypass);
        assert!(config.redis_url.is_none());
        assert_eq!(config.allow_list.len(), 7);
        assert_eq!(config.allow_list[0], "/auth/signup");
        assert_eq!(config.request_body_limit_bytes, 1024 * 1024);
    }

    #[test]
    fn missing_secret_is_reported() {
        let err = Config::from_lookup(lookup_from(&[("UPSTREAM_URL", "http://a")]))
            .err()
            .unwrap();
        assert!(matches!(err, ConfigError::Missing("JWT_SECRET_KEY")));
    }

    #[test]
    fn upstream_must_be_http() {
        let err = Config::from_lookup(lookup_from(&[
            ("JWT_SECRET_KEY", "c2VjcmV0"),
            ("UPSTREAM_URL", "ftp://files.internal"),
        ]))
        .err()
        .unwrap();
        assert!(matches!(err, ConfigError::Invalid("UPSTREAM_URL")));
    }

    #[test]
    fn overrides_are_parsed() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("PORT", "9100"),
            ("APP_ENV", "prod"),
            ("AUTH_ALLOW_LIST", "/a, /b ,,"),
            ("AUTH_USER_LOOKUP", "fail-open"),
            ("AUTH_SECRET_KEY_BYPASS", "false"),
            ("REDIS_URL", "redis://localhost:6379"),
        ]);
        let config = Config::from_lookup(lookup_from(&pairs)).unwrap();

        assert_eq!(config.addr.port(), 9100);
        assert!(config.app_env.is_production());
        assert_eq!(config.allow_list, vec!["/a".to_string(), "/b".to_string()]);
        assert_eq!(config.user_lookup_policy, UserLookupPolicy::FailOpen);
        assert!(!config.secret_key_bypass);
        assert_eq!(config.redis_url.as_deref(), Some("redis://localhost:6379"));
    }

    #[test]
    fn unknown_lookup_policy_is_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs.push(("AUTH_USER_LOOKUP", "sometimes"));
        let err = Config::from_lookup(lookup_from(&pairs)).err().unwrap();
        assert!(matches!(err, ConfigError::Invalid("AUTH_USER_LOOKUP")));
    }

    #[test]
    fn debug_output_hides_the_secret() {
        let config = Config::from_lookup(lookup_from(&REQUIRED)).unwrap();
        assert!(!format!("{:?}", config).contains("c2VjcmV0"));
    }
}
