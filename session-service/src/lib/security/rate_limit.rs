use std::collections::HashMap;
use std::collections::VecDeque;
use std::fmt;

use chrono::DateTime;
use chrono::Duration;
use chrono::Utc;
use tokio::sync::RwLock;

/// Sensitive operations guarded by the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RateLimitedOperation {
    Login,
    Register,
    Refresh,
    PasswordResetRequest,
    VerifyEmail,
}

impl RateLimitedOperation {
    pub const ALL: [RateLimitedOperation; 5] = [
        RateLimitedOperation::Login,
        RateLimitedOperation::Register,
        RateLimitedOperation::Refresh,
        RateLimitedOperation::PasswordResetRequest,
        RateLimitedOperation::VerifyEmail,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            RateLimitedOperation::Login => "login",
            RateLimitedOperation::Register => "register",
            RateLimitedOperation::Refresh => "refresh",
            RateLimitedOperation::PasswordResetRequest => "forgot-password",
            RateLimitedOperation::VerifyEmail => "verify-email",
        }
    }

    /// Built-in limit for the operation.
    pub fn default_rule(&self) -> RateLimitRule {
        match self {
            RateLimitedOperation::Login => RateLimitRule::new(5, Duration::minutes(1)),
            RateLimitedOperation::Register => RateLimitRule::new(3, Duration::hours(1)),
            RateLimitedOperation::Refresh => RateLimitRule::new(10, Duration::minutes(1)),
            RateLimitedOperation::PasswordResetRequest => {
                RateLimitRule::new(3, Duration::hours(1))
            }
            RateLimitedOperation::VerifyEmail => RateLimitRule::new(5, Duration::minutes(1)),
        }
    }
}

impl fmt::Display for RateLimitedOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// At most `max_requests` accepted per trailing `window`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitRule {
    pub max_requests: u32,
    pub window: Duration,
}

impl RateLimitRule {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            max_requests,
            window,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Allowed,
    /// Rejected; the oldest counted request leaves the window after `retry_after`.
    Limited { retry_after: Duration },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct BucketKey {
    client: String,
    operation: RateLimitedOperation,
}

/// Sliding-window limiter keyed by client identity and operation.
///
/// The prune, the count and the append for one attempt happen under a single
/// write lock, so two racing attempts can never both take the last slot.
#[derive(Debug)]
pub struct RateLimiter {
    rules: HashMap<RateLimitedOperation, RateLimitRule>,
    grace: Duration,
    buckets: RwLock<HashMap<BucketKey, VecDeque<DateTime<Utc>>>>,
}

impl RateLimiter {
    pub const DEFAULT_GRACE_MINUTES: i64 = 10;

    /// Limiter with the given rules. Operations without a rule are unthrottled.
    pub fn new(rules: HashMap<RateLimitedOperation, RateLimitRule>, grace: Duration) -> Self {
        Self {
            rules,
            grace,
            buckets: RwLock::new(HashMap::new()),
        }
    }

    /// Limiter with the built-in rule for every operation.
    pub fn with_defaults() -> Self {
        let rules = RateLimitedOperation::ALL
            .iter()
            .map(|operation| (*operation, operation.default_rule()))
            .collect();
        Self::new(rules, Duration::minutes(Self::DEFAULT_GRACE_MINUTES))
    }

    pub fn rule(&self, operation: RateLimitedOperation) -> Option<RateLimitRule> {
        self.rules.get(&operation).copied()
    }

    /// Whether the attempt is accepted. Accepted attempts are counted.
    pub async fn allow(&self, client: &str, operation: RateLimitedOperation) -> bool {
        self.check(client, operation).await.is_allowed()
    }

    pub async fn check(&self, client: &str, operation: RateLimitedOperation) -> RateLimitDecision {
        self.check_at(client, operation, Utc::now()).await
    }

    pub async fn check_at(
        &self,
        client: &str,
        operation: RateLimitedOperation,
        now: DateTime<Utc>,
    ) -> RateLimitDecision {
        let Some(rule) = self.rule(operation) else {
            return RateLimitDecision::Allowed;
        };

        let key = BucketKey {
            client: client.to_string(),
            operation,
        };
        let window_start = now - rule.window;

        let mut buckets = self.buckets.write().await;
        let timestamps = buckets.entry(key).or_default();

        while timestamps.front().is_some_and(|ts| *ts <= window_start) {
            timestamps.pop_front();
        }

        if timestamps.len() >= rule.max_requests as usize {
            let retry_after = timestamps
                .front()
                .map(|oldest| *oldest + rule.window - now)
                .unwrap_or(rule.window)
                .max(Duration::seconds(1));
            return RateLimitDecision::Limited { retry_after };
        }

        timestamps.push_back(now);
        RateLimitDecision::Allowed
    }

    /// Drop buckets with no activity inside max(grace, rule window).
    ///
    /// # Returns
    /// Number of dropped buckets
    pub async fn sweep_idle(&self) -> usize {
        self.sweep_idle_at(Utc::now()).await
    }

    pub async fn sweep_idle_at(&self, now: DateTime<Utc>) -> usize {
        let mut buckets = self.buckets.write().await;
        let before = buckets.len();
        buckets.retain(|key, timestamps| {
            let horizon = match self.rules.get(&key.operation) {
                Some(rule) if rule.window > self.grace => rule.window,
                _ => self.grace,
            };
            timestamps
                .back()
                .is_some_and(|newest| *newest > now - horizon)
        });
        before - buckets.len()
    }

    pub async fn bucket_count(&self) -> usize {
        self.buckets.read().await.len()
    }
}
