//! Authentication module: configuration, credential handling, token minting,
//! the session lifecycle, the bearer-token request guard, and HTTP routes.

use std::sync::Arc;

pub mod config;
pub mod error;
pub mod guards;
pub mod jwt;
pub mod memory;
pub mod passwords;
pub mod refresh_store;
pub mod responses;
pub mod routes;
pub mod session;
pub mod users;

pub use config::AuthConfig;
pub use error::{AuthError, AuthResult};
pub use guards::AuthUser;
pub use jwt::TokenCodec;
pub use passwords::PasswordService;
pub use refresh_store::{PgRefreshTokenStore, RefreshTokenStore};
pub use session::{SessionManager, TokenPair};
pub use users::{CredentialStore, Credentials, PgCredentialStore, User};

#[derive(Clone)]
pub struct AuthState {
    pub config: AuthConfig,
    pub sessions: Arc<SessionManager>,
}

impl AuthState {
    pub fn new(
        config: AuthConfig,
        users: Arc<dyn CredentialStore>,
        refresh_tokens: Arc<dyn RefreshTokenStore>,
        password_service: PasswordService,
    ) -> AuthResult<Self> {
        let sessions = SessionManager::new(&config, users, refresh_tokens, password_service)?;
        Ok(Self {
            config,
            sessions: Arc::new(sessions),
        })
    }
}
