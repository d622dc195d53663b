use std::collections::HashMap;
use std::env;
use std::time::Duration as StdDuration;

use config::Config as ConfigBuilder;
use config::ConfigError;
use config::Environment;
use config::File;
use serde::Deserialize;

use crate::domain::session::models::SessionPolicy;
use crate::security::rate_limit::RateLimitRule;
use crate::security::rate_limit::RateLimitedOperation;
use crate::security::rate_limit::RateLimiter;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cleanup: CleanupConfig,
    pub kafka: KafkaConfig,
    #[serde(default)]
    pub notifications: NotificationsConfig,
    pub admin: Option<AdminConfig>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub http_port: u16,
    /// Force the Secure flag on cookies even when the proxy does not
    /// announce TLS.
    #[serde(default)]
    pub secure_cookies: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,
    #[serde(default = "default_clock_skew_seconds")]
    pub clock_skew_seconds: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    pub refresh_ttl_days: i64,
    pub max_active_refresh_tokens: u32,
    pub verification_ttl_hours: i64,
    pub password_reset_ttl_hours: i64,
    pub revocation_margin_minutes: i64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            refresh_ttl_days: 7,
            max_active_refresh_tokens: 5,
            verification_ttl_hours: 24,
            password_reset_ttl_hours: 1,
            revocation_margin_minutes: 20,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitRuleConfig {
    pub max_requests: u32,
    pub window_seconds: i64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SecurityConfig {
    pub revocation_sweep_seconds: u64,
    pub rate_limit_sweep_seconds: u64,
    pub rate_limit_grace_seconds: i64,
    /// Overrides keyed by operation name (`login`, `register`, `refresh`,
    /// `forgot-password`, `verify-email`).
    #[serde(default)]
    pub rate_limits: HashMap<String, RateLimitRuleConfig>,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            revocation_sweep_seconds: 5 * 60,
            rate_limit_sweep_seconds: 5 * 60,
            rate_limit_grace_seconds: RateLimiter::DEFAULT_GRACE_MINUTES * 60,
            rate_limits: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct CleanupConfig {
    pub expired_token_sweep_seconds: u64,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            expired_token_sweep_seconds: 60 * 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct KafkaConfig {
    pub brokers: String,
    pub notification_topic: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotificationsConfig {
    pub queue_capacity: usize,
}

impl Default for NotificationsConfig {
    fn default() -> Self {
        Self {
            queue_capacity: 1024,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AdminConfig {
    #[serde(default = "default_admin_name")]
    pub name: String,
    pub email: String,
    pub password: String,
}

fn default_max_connections() -> u32 {
    10
}

fn default_access_ttl_minutes() -> i64 {
    15
}

fn default_clock_skew_seconds() -> i64 {
    auth::TokenCodec::DEFAULT_LEEWAY_SECONDS
}

fn default_admin_name() -> String {
    "Administrator".to_string()
}

impl Config {
    /// Load configuration from files with environment variable overrides
    ///
    /// Priority (highest to lowest):
    /// 1. Environment variables (DATABASE__URL, JWT__SECRET, etc.)
    /// 2. Environment-specific config file (config/{environment}.toml)
    /// 3. Default config file (config/default.toml)
    pub fn load() -> Result<Self, ConfigError> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".to_string());

        let configuration = ConfigBuilder::builder()
            .add_source(File::with_name("config/default").required(false))
            .add_source(File::with_name(&format!("config/{}", run_mode)).required(false))
            // Example: JWT__SECRET=... overrides jwt.secret
            .add_source(Environment::with_prefix("").separator("__"))
            .build()?;

        let config: Config = configuration.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt.secret.len() < 32 {
            return Err(ConfigError::Message(
                "jwt.secret must be at least 32 bytes".to_string(),
            ));
        }
        if self.session.max_active_refresh_tokens == 0 {
            return Err(ConfigError::Message(
                "session.max_active_refresh_tokens must be positive".to_string(),
            ));
        }
        for name in self.security.rate_limits.keys() {
            if operation_by_name(name).is_none() {
                return Err(ConfigError::Message(format!(
                    "security.rate_limits: unknown operation '{}'",
                    name
                )));
            }
        }
        Ok(())
    }

    pub fn session_policy(&self) -> SessionPolicy {
        SessionPolicy {
            access_ttl: chrono::Duration::minutes(self.jwt.access_ttl_minutes),
            refresh_ttl: chrono::Duration::days(self.session.refresh_ttl_days),
            max_active_refresh_tokens: self.session.max_active_refresh_tokens,
            verification_ttl: chrono::Duration::hours(self.session.verification_ttl_hours),
            password_reset_ttl: chrono::Duration::hours(self.session.password_reset_ttl_hours),
            revocation_ttl: chrono::Duration::minutes(self.session.revocation_margin_minutes),
        }
    }

    /// Built-in limits with configured overrides applied.
    pub fn rate_limiter(&self) -> RateLimiter {
        let mut rules: HashMap<RateLimitedOperation, RateLimitRule> = RateLimitedOperation::ALL
            .iter()
            .map(|operation| (*operation, operation.default_rule()))
            .collect();

        for (name, rule) in &self.security.rate_limits {
            if let Some(operation) = operation_by_name(name) {
                rules.insert(
                    operation,
                    RateLimitRule::new(
                        rule.max_requests,
                        chrono::Duration::seconds(rule.window_seconds),
                    ),
                );
            }
        }

        RateLimiter::new(
            rules,
            chrono::Duration::seconds(self.security.rate_limit_grace_seconds),
        )
    }

    pub fn revocation_sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.security.revocation_sweep_seconds.max(1))
    }

    pub fn rate_limit_sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.security.rate_limit_sweep_seconds.max(1))
    }

    pub fn expired_token_sweep_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.cleanup.expired_token_sweep_seconds.max(1))
    }
}

fn operation_by_name(name: &str) -> Option<RateLimitedOperation> {
    RateLimitedOperation::ALL
        .into_iter()
        .find(|operation| operation.as_str() == name)
}
