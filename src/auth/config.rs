use std::time::Duration as StdDuration;

use chrono::Duration;

use crate::auth::{AuthError, AuthResult};

const DEFAULT_ACCESS_TOKEN_TTL_MINUTES: i64 = 15;
const DEFAULT_REFRESH_TOKEN_TTL_MINUTES: i64 = 7 * 24 * 60;
const DEFAULT_STORE_TIMEOUT_SECS: u64 = 20;
const DEFAULT_PURGE_INTERVAL_SECS: u64 = 60 * 60;
/// Ten years; longer lifetimes are refused at startup.
pub const MAX_TOKEN_TTL_MINUTES: i64 = 10 * 365 * 24 * 60;

/// Authentication configuration loaded once at startup.
#[derive(Clone)]
pub struct AuthConfig {
    pub access_token_secret: String,
    pub refresh_token_secret: String,
    pub access_token_ttl_minutes: i64,
    pub refresh_token_ttl_minutes: i64,
    pub store_timeout_secs: u64,
    pub refresh_purge_interval_secs: u64,
}

// Secrets stay out of logs and panic messages.
impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("access_token_secret", &"<redacted>")
            .field("refresh_token_secret", &"<redacted>")
            .field("access_token_ttl_minutes", &self.access_token_ttl_minutes)
            .field("refresh_token_ttl_minutes", &self.refresh_token_ttl_minutes)
            .field("store_timeout_secs", &self.store_timeout_secs)
            .field("refresh_purge_interval_secs", &self.refresh_purge_interval_secs)
            .finish()
    }
}

impl AuthConfig {
    pub fn from_env() -> AuthResult<Self> {
        let access_token_secret = std::env::var("TODO_ACCESS_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("TODO_ACCESS_TOKEN_SECRET is required".into()))?;
        let refresh_token_secret = std::env::var("TODO_REFRESH_TOKEN_SECRET")
            .map_err(|_| AuthError::Config("TODO_REFRESH_TOKEN_SECRET is required".into()))?;
        let access_token_ttl_minutes = std::env::var("TODO_ACCESS_TOKEN_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_ACCESS_TOKEN_TTL_MINUTES);
        let refresh_token_ttl_minutes = std::env::var("TODO_REFRESH_TOKEN_TTL_MINUTES")
            .ok()
            .and_then(|v| v.parse::<i64>().ok())
            .unwrap_or(DEFAULT_REFRESH_TOKEN_TTL_MINUTES);
        let store_timeout_secs = std::env::var("TODO_STORE_TIMEOUT_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_STORE_TIMEOUT_SECS);
        let refresh_purge_interval_secs = std::env::var("TODO_REFRESH_PURGE_INTERVAL_SECS")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_PURGE_INTERVAL_SECS);

        let config = Self {
            access_token_secret,
            refresh_token_secret,
            access_token_ttl_minutes,
            refresh_token_ttl_minutes,
            store_timeout_secs,
            refresh_purge_interval_secs,
        };
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that would weaken token separation.
    pub fn validate(&self) -> AuthResult<()> {
        if self.access_token_secret.is_empty() || self.refresh_token_secret.is_empty() {
            return Err(AuthError::Config("token secrets must not be empty".into()));
        }
        if self.access_token_secret == self.refresh_token_secret {
            return Err(AuthError::Config(
                "access and refresh token secrets must differ".into(),
            ));
        }
        if self.access_token_ttl_minutes <= 0 || self.refresh_token_ttl_minutes <= 0 {
            return Err(AuthError::Config("token lifetimes must be positive".into()));
        }
        if self.access_token_ttl_minutes > MAX_TOKEN_TTL_MINUTES
            || self.refresh_token_ttl_minutes > MAX_TOKEN_TTL_MINUTES
        {
            return Err(AuthError::Config(format!(
                "token lifetimes must not exceed {MAX_TOKEN_TTL_MINUTES} minutes"
            )));
        }
        if self.store_timeout_secs == 0 {
            return Err(AuthError::Config("store timeout must be positive".into()));
        }
        Ok(())
    }

    pub fn access_token_ttl(&self) -> Duration {
        Duration::minutes(self.access_token_ttl_minutes)
    }

    pub fn refresh_token_ttl(&self) -> Duration {
        Duration::minutes(self.refresh_token_ttl_minutes)
    }

    pub fn store_timeout(&self) -> StdDuration {
        StdDuration::from_secs(self.store_timeout_secs)
    }

    pub fn refresh_purge_interval(&self) -> StdDuration {
        StdDuration::from_secs(self.refresh_purge_interval_secs.max(1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig {
            access_token_secret: "access-secret".into(),
            refresh_token_secret: "refresh-secret".into(),
            access_token_ttl_minutes: 15,
            refresh_token_ttl_minutes: 60,
            store_timeout_secs: 5,
            refresh_purge_interval_secs: 60,
        }
    }

    #[test]
    fn accepts_distinct_secrets() {
        assert!(config().validate().is_ok());
    }

    #[test]
    fn rejects_shared_secret() {
        let mut config = config();
        config.refresh_token_secret = config.access_token_secret.clone();
        assert!(matches!(config.validate(), Err(AuthError::Config(_))));
    }

    #[test]
    fn rejects_unrepresentable_lifetimes() {
        let mut huge_refresh = config();
        huge_refresh.refresh_token_ttl_minutes = 1_000_000_000_000;
        assert!(matches!(huge_refresh.validate(), Err(AuthError::Config(_))));

        let mut long_access = config();
        long_access.access_token_ttl_minutes = MAX_TOKEN_TTL_MINUTES + 1;
        assert!(matches!(long_access.validate(), Err(AuthError::Config(_))));

        let mut at_limit = config();
        at_limit.refresh_token_ttl_minutes = MAX_TOKEN_TTL_MINUTES;
        assert!(at_limit.validate().is_ok());
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let rendered = format!("{:?}", config());
        assert!(!rendered.contains("access-secret"));
        assert!(!rendered.contains("refresh-secret"));
    }
}
