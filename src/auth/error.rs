use rocket::http::Status;
use thiserror::Error;

use crate::auth::jwt::TokenError;

pub type AuthResult<T> = Result<T, AuthError>;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("validation error: {}", .0.join(";"))]
    Validation(Vec<String>),
    #[error("username already exists")]
    UsernameTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("invalid token")]
    InvalidToken(#[source] TokenError),
    #[error("invalid refresh token")]
    InvalidRefreshToken,
    #[error("unauthorized")]
    Unauthorized,
    #[error("store call timed out after {0:?}")]
    StoreTimeout(std::time::Duration),
    #[error("configuration error: {0}")]
    Config(String),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
    #[error("jwt error: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),
    #[error("argon2 parameter error: {0}")]
    Argon2(String),
    #[error("password hashing error: {0}")]
    PasswordHash(String),
    #[error("unexpected error: {0}")]
    Other(String),
}

impl AuthError {
    pub fn status(&self) -> Status {
        match self {
            AuthError::Validation(_) => Status::BadRequest,
            AuthError::UsernameTaken => Status::Conflict,
            AuthError::InvalidCredentials
            | AuthError::InvalidToken(_)
            | AuthError::InvalidRefreshToken
            | AuthError::Unauthorized => Status::Unauthorized,
            AuthError::StoreTimeout(_)
            | AuthError::Config(_)
            | AuthError::Sqlx(_)
            | AuthError::Jwt(_)
            | AuthError::Argon2(_)
            | AuthError::PasswordHash(_)
            | AuthError::Other(_) => Status::InternalServerError,
        }
    }

    /// True for failures whose cause must stay server-side.
    pub fn is_internal(&self) -> bool {
        self.status() == Status::InternalServerError
    }
}

impl From<argon2::Error> for AuthError {
    fn from(err: argon2::Error) -> Self {
        AuthError::Argon2(err.to_string())
    }
}

impl From<argon2::password_hash::Error> for AuthError {
    fn from(err: argon2::password_hash::Error) -> Self {
        AuthError::PasswordHash(err.to_string())
    }
}

impl From<tokio::task::JoinError> for AuthError {
    fn from(err: tokio::task::JoinError) -> Self {
        AuthError::Other(format!("blocking task failed: {err}"))
    }
}
