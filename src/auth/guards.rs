use rocket::Request;
use rocket::State;
use rocket::http::Status;
use rocket::request::{FromRequest, Outcome};
use rocket_okapi::request::OpenApiFromRequest;
use uuid::Uuid;

use crate::auth::AuthState;

pub const MISSING_TOKEN_MESSAGE: &str = "Missing authorization token";
pub const INVALID_FORMAT_MESSAGE: &str = "Invalid token format";
pub const INVALID_TOKEN_MESSAGE: &str = "Invalid or expired token";

/// Identity of the caller, present only after the bearer token validated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, OpenApiFromRequest)]
pub struct AuthUser {
    pub id: Uuid,
}

/// Why the gate turned a request away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateRejection {
    MissingToken,
    InvalidFormat,
    InvalidToken,
    Unavailable,
}

impl GateRejection {
    pub fn status(self) -> Status {
        match self {
            GateRejection::Unavailable => Status::InternalServerError,
            _ => Status::Unauthorized,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            GateRejection::MissingToken => MISSING_TOKEN_MESSAGE,
            GateRejection::InvalidFormat => INVALID_FORMAT_MESSAGE,
            GateRejection::InvalidToken => INVALID_TOKEN_MESSAGE,
            GateRejection::Unavailable => crate::error::SERVER_FAILURE_MESSAGE,
        }
    }
}

/// Request-local slot read by the 401 catcher to render the rejection.
#[derive(Debug, Clone, Copy, Default)]
pub struct GateOutcome(pub Option<GateRejection>);

#[rocket::async_trait]
impl<'r> FromRequest<'r> for AuthUser {
    type Error = GateRejection;

    async fn from_request(request: &'r Request<'_>) -> Outcome<Self, Self::Error> {
        match authorize(request).await {
            Ok(user) => Outcome::Success(user),
            Err(rejection) => {
                request.local_cache(|| GateOutcome(Some(rejection)));
                Outcome::Error((rejection.status(), rejection))
            }
        }
    }
}

async fn authorize(request: &Request<'_>) -> Result<AuthUser, GateRejection> {
    let header = request
        .headers()
        .get_one("Authorization")
        .ok_or(GateRejection::MissingToken)?;
    let token = bearer_token(header)?;

    let auth_state = request
        .guard::<&State<AuthState>>()
        .await
        .succeeded()
        .ok_or_else(|| {
            log::error!("AuthState missing from managed state");
            GateRejection::Unavailable
        })?;

    let id = auth_state
        .sessions
        .validate_access_token(token)
        .map_err(|err| {
            log::debug!("access token rejected: {}", err);
            GateRejection::InvalidToken
        })?;

    Ok(AuthUser { id })
}

/// Accepts exactly `Bearer <token>`: case-sensitive scheme, one space, and a
/// non-empty token without further spaces.
fn bearer_token(header: &str) -> Result<&str, GateRejection> {
    if header.is_empty() {
        return Err(GateRejection::MissingToken);
    }
    let mut parts = header.split(' ');
    match (parts.next(), parts.next(), parts.next()) {
        (Some("Bearer"), Some(token), None) if !token.is_empty() => Ok(token),
        _ => Err(GateRejection::InvalidFormat),
    }
}
