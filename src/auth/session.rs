//! Session lifecycle: registration, login, token issuance, validation and
//! refresh-token rotation.
//!
//! A user's session state is implicit in the stores: no stored refresh token
//! means anonymous, a valid access token means authenticated, and an expired
//! access token with a live refresh token means a refresh is pending.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration as StdDuration;

use rand::distributions::{Alphanumeric, DistString};
use uuid::Uuid;

use crate::auth::jwt::{SignedToken, TokenCodec, TokenKind};
use crate::auth::refresh_store::{RefreshTokenRecord, RefreshTokenStore};
use crate::auth::users::{CredentialStore, Credentials, User};
use crate::auth::{AuthConfig, AuthError, AuthResult, PasswordService};

#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access: SignedToken,
    pub refresh: SignedToken,
}

pub struct SessionManager {
    users: Arc<dyn CredentialStore>,
    refresh_tokens: Arc<dyn RefreshTokenStore>,
    passwords: PasswordService,
    tokens: TokenCodec,
    store_timeout: StdDuration,
    decoy_hash: String,
}

impl SessionManager {
    pub fn new(
        config: &AuthConfig,
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        passwords: PasswordService,
    ) -> AuthResult<Self> {
        let tokens = TokenCodec::from_config(config)?;

        // Verified against when a username is unknown so both login failures
        // cost one Argon2 run.
        let decoy_secret = Alphanumeric.sample_string(&mut rand::thread_rng(), 32);
        let decoy_hash = passwords.hash_password(&decoy_secret)?;

        Ok(Self {
            users,
            refresh_tokens,
            passwords,
            tokens,
            store_timeout: config.store_timeout(),
            decoy_hash,
        })
    }

    async fn bounded<T>(&self, call: impl Future<Output = AuthResult<T>>) -> AuthResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| AuthError::StoreTimeout(self.store_timeout))?
    }

    async fn hash_password(&self, password: &str) -> AuthResult<String> {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || passwords.hash_password(&password)).await?
    }

    async fn verify_password(&self, password: &str, hash: &str) -> AuthResult<bool> {
        let passwords = self.passwords.clone();
        let password = password.to_string();
        let hash = hash.to_string();
        Ok(tokio::task::spawn_blocking(move || passwords.verify_password(&password, &hash)).await?)
    }

    /// Create an account. Shape validation is the caller's job; uniqueness is
    /// decided by the store.
    pub async fn register(&self, credentials: &Credentials) -> AuthResult<User> {
        let password_hash = self.hash_password(&credentials.password).await?;
        let user = self
            .bounded(
                self.users
                    .create_user(&credentials.username, &password_hash),
            )
            .await?;
        log::info!("registered user {}", user.id);
        Ok(user)
    }

    /// Check a username/password pair. Unknown users and wrong passwords
    /// both yield [`AuthError::InvalidCredentials`].
    pub async fn authenticate(&self, username: &str, password: &str) -> AuthResult<User> {
        let user = self.bounded(self.users.find_by_username(username)).await?;

        match user {
            Some(user) => {
                if self.verify_password(password, &user.password_hash).await? {
                    Ok(user)
                } else {
                    log::debug!("password mismatch for user {}", user.id);
                    Err(AuthError::InvalidCredentials)
                }
            }
            None => {
                self.verify_password(password, &self.decoy_hash).await?;
                log::debug!("login attempt for unknown username");
                Err(AuthError::InvalidCredentials)
            }
        }
    }

    pub async fn login(&self, username: &str, password: &str) -> AuthResult<(User, TokenPair)> {
        let user = self.authenticate(username, password).await?;
        let pair = self.generate_token_pair(user.id).await?;
        log::info!("user {} logged in", user.id);
        Ok((user, pair))
    }

    fn mint_pair(&self, user_id: Uuid) -> AuthResult<TokenPair> {
        Ok(TokenPair {
            access: self.tokens.issue(TokenKind::Access, user_id)?,
            refresh: self.tokens.issue(TokenKind::Refresh, user_id)?,
        })
    }

    /// Issue a new pair and make its refresh token the only one the user can
    /// redeem. Nothing is returned unless the refresh token was persisted.
    pub async fn generate_token_pair(&self, user_id: Uuid) -> AuthResult<TokenPair> {
        let pair = self.mint_pair(user_id)?;
        let record = RefreshTokenRecord {
            user_id,
            token: pair.refresh.token.clone(),
            expires_at: pair.refresh.expires_at,
        };
        self.bounded(self.refresh_tokens.replace(&record)).await?;
        Ok(pair)
    }

    pub fn validate_access_token(&self, token: &str) -> AuthResult<Uuid> {
        self.tokens
            .parse(TokenKind::Access, token)
            .map_err(AuthError::InvalidToken)
    }

    pub fn validate_refresh_token(&self, token: &str) -> AuthResult<Uuid> {
        self.tokens
            .parse(TokenKind::Refresh, token)
            .map_err(AuthError::InvalidToken)
    }

    /// Redeem a refresh token for a new pair. The presented token is consumed
    /// by the same store operation that persists its replacement, so a token
    /// can be redeemed at most once.
    pub async fn refresh_tokens(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let user_id = self.validate_refresh_token(refresh_token).map_err(|err| {
            log::debug!("refresh token rejected: {}", err);
            AuthError::InvalidRefreshToken
        })?;

        if self.bounded(self.users.find_by_id(user_id)).await?.is_none() {
            log::warn!("refresh token presented for missing user {}", user_id);
            return Err(AuthError::InvalidRefreshToken);
        }

        let pair = self.mint_pair(user_id)?;
        let replacement = RefreshTokenRecord {
            user_id,
            token: pair.refresh.token.clone(),
            expires_at: pair.refresh.expires_at,
        };

        let rotated = self
            .bounded(self.refresh_tokens.rotate(refresh_token, &replacement))
            .await?;
        if !rotated {
            log::warn!("stale or revoked refresh token presented for user {}", user_id);
            return Err(AuthError::InvalidRefreshToken);
        }

        Ok(pair)
    }

    /// Revoke every refresh token of the user. Access tokens already handed
    /// out stay valid until they expire.
    pub async fn logout(&self, user_id: Uuid) -> AuthResult<u64> {
        let revoked = self.bounded(self.refresh_tokens.revoke_all(user_id)).await?;
        log::info!("user {} logged out, {} refresh token(s) revoked", user_id, revoked);
        Ok(revoked)
    }

    pub async fn current_user(&self, user_id: Uuid) -> AuthResult<User> {
        self.bounded(self.users.find_by_id(user_id))
            .await?
            .ok_or(AuthError::Unauthorized)
    }

    pub async fn purge_expired_refresh_tokens(&self) -> AuthResult<u64> {
        self.bounded(self.refresh_tokens.purge_expired(chrono::Utc::now()))
            .await
    }
}
