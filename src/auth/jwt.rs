use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use thiserror::Error;
use uuid::Uuid;

use crate::auth::{AuthConfig, AuthError, AuthResult};

/// Fixed claim set carried by both token classes.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    pub exp: i64,
    pub iat: i64,
    pub jti: String,
}

/// Why a token failed to parse. Never shown to clients.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("signature does not verify")]
    InvalidSignature,
    #[error("token expired")]
    Expired,
    #[error("token malformed")]
    Malformed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Access,
    Refresh,
}

/// HMAC key material for one token class.
#[derive(Clone)]
pub struct TokenSecret {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl TokenSecret {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret),
            decoding_key: DecodingKey::from_secret(secret),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SignedToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

fn validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.leeway = 0;
    validation.validate_exp = true;
    validation.set_required_spec_claims(&["exp", "sub"]);
    validation
}

/// Sign a claim set for `user_id` that expires `ttl` from now.
pub fn issue(user_id: Uuid, secret: &TokenSecret, ttl: Duration) -> AuthResult<SignedToken> {
    let now = Utc::now();
    let expires_at = now
        .checked_add_signed(ttl)
        .ok_or_else(|| AuthError::Config(format!("token lifetime {ttl} is out of range")))?;
    let claims = SessionClaims {
        sub: user_id.to_string(),
        exp: expires_at.timestamp(),
        iat: now.timestamp(),
        jti: Uuid::new_v4().to_string(),
    };

    let token = encode(&Header::new(Algorithm::HS256), &claims, &secret.encoding_key)?;
    Ok(SignedToken { token, expires_at })
}

/// Verify signature and expiry, returning the subject.
pub fn parse(token: &str, secret: &TokenSecret) -> Result<Uuid, TokenError> {
    let data = decode::<SessionClaims>(token, &secret.decoding_key, &validation()).map_err(
        |err| match err.kind() {
            ErrorKind::InvalidSignature => TokenError::InvalidSignature,
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Malformed,
        },
    )?;

    data.claims
        .sub
        .parse::<Uuid>()
        .map_err(|_| TokenError::Malformed)
}

/// Access and refresh key material with their configured lifetimes.
pub struct TokenCodec {
    access: TokenSecret,
    refresh: TokenSecret,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

impl TokenCodec {
    pub fn from_config(config: &AuthConfig) -> AuthResult<Self> {
        config.validate()?;
        Ok(Self {
            access: TokenSecret::new(config.access_token_secret.as_bytes()),
            refresh: TokenSecret::new(config.refresh_token_secret.as_bytes()),
            access_ttl: config.access_token_ttl(),
            refresh_ttl: config.refresh_token_ttl(),
        })
    }

    fn secret(&self, kind: TokenKind) -> &TokenSecret {
        match kind {
            TokenKind::Access => &self.access,
            TokenKind::Refresh => &self.refresh,
        }
    }

    pub fn issue(&self, kind: TokenKind, user_id: Uuid) -> AuthResult<SignedToken> {
        let ttl = match kind {
            TokenKind::Access => self.access_ttl,
            TokenKind::Refresh => self.refresh_ttl,
        };
        issue(user_id, self.secret(kind), ttl)
    }

    pub fn parse(&self, kind: TokenKind, token: &str) -> Result<Uuid, TokenError> {
        parse(token, self.secret(kind))
    }
}
