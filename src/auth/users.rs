use std::sync::LazyLock;

use regex::Regex;
use rocket_db_pools::sqlx::{self, FromRow, PgPool};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::Deserialize;
use uuid::Uuid;

use crate::auth::{AuthError, AuthResult};

const UNIQUE_VIOLATION: &str = "23505";

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_]{3,20}$").expect("static username pattern"));

#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub password_hash: String,
}

/// Username and plaintext password as submitted by a client.
#[derive(Clone, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for Credentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Shape checks applied before registration. Returns every failure.
    pub fn validate(&self) -> AuthResult<()> {
        let mut errors = Vec::new();

        if self.username.is_empty() {
            errors.push("Field 'username' is required".to_string());
        } else if !USERNAME_PATTERN.is_match(&self.username) {
            errors.push(
                "Field 'username' must be 3-20 characters of letters, digits or underscores"
                    .to_string(),
            );
        }

        if self.password.is_empty() {
            errors.push("Field 'password' is required".to_string());
        } else {
            if self.password.chars().count() < 8 {
                errors.push("Field 'password' must be at least 8 characters".to_string());
            }
            let has_letter = self.password.chars().any(|c| c.is_alphabetic());
            let has_digit = self.password.chars().any(|c| c.is_ascii_digit());
            if !has_letter || !has_digit {
                errors.push(
                    "Field 'password' must contain at least one letter and one digit".to_string(),
                );
            }
            if self.password == self.username {
                errors.push("Field 'password' must differ from the username".to_string());
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AuthError::Validation(errors))
        }
    }
}

/// Persistence for user accounts.
#[rocket::async_trait]
pub trait CredentialStore: Send + Sync {
    /// Insert a new user. A duplicate username yields [`AuthError::UsernameTaken`].
    async fn create_user(&self, username: &str, password_hash: &str) -> AuthResult<User>;

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>>;

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>>;
}

#[derive(Debug, Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[rocket::async_trait]
impl CredentialStore for PgCredentialStore {
    async fn create_user(&self, username: &str, password_hash: &str) -> AuthResult<User> {
        let id = Uuid::new_v4();
        let result = sqlx::query_as::<_, User>(
            "INSERT INTO users (id, username, password_hash) VALUES ($1, $2, $3) RETURNING id, username, password_hash",
        )
        .bind(id)
        .bind(username)
        .bind(password_hash)
        .fetch_one(&self.pool)
        .await;

        match result {
            Ok(user) => Ok(user),
            Err(err) if is_unique_violation(&err) => Err(AuthError::UsernameTaken),
            Err(err) => Err(AuthError::from(err)),
        }
    }

    async fn find_by_username(&self, username: &str) -> AuthResult<Option<User>> {
        let user = sqlx::query_as::<_, User>(
            "SELECT id, username, password_hash FROM users WHERE username = $1",
        )
        .bind(username)
        .fetch_optional(&self.pool)
        .await?;
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> AuthResult<Option<User>> {
        let user =
            sqlx::query_as::<_, User>("SELECT id, username, password_hash FROM users WHERE id = $1")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(user)
    }
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Database(db_err)
            if db_err.code().map(|code| code == UNIQUE_VIOLATION).unwrap_or(false)
    )
}
