use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{State, get, post};
use rocket_okapi::openapi;

use crate::auth::guards::{AuthUser, INVALID_TOKEN_MESSAGE};
use crate::auth::responses::{RefreshRequest, RegisteredUser, TokenPairResponse, UserSummary};
use crate::auth::{AuthError, AuthState, Credentials};
use crate::error::ApiError;
use crate::models::ApiResponse;

const INVALID_CREDENTIALS_MESSAGE: &str = "Invalid credentials";
const INVALID_REFRESH_TOKEN_MESSAGE: &str = "Invalid refresh token";

type Payload<'r, T> = Result<Json<T>, json::Error<'r>>;

/// Create an account
#[openapi(tag = "Auth")]
#[post("/auth/register", data = "<payload>")]
pub async fn register(
    state: &State<AuthState>,
    payload: Payload<'_, Credentials>,
) -> Result<status::Custom<Json<ApiResponse<RegisteredUser>>>, ApiError> {
    let credentials = payload.map_err(ApiError::from_json)?.into_inner();
    credentials
        .validate()
        .map_err(|err| ApiError::from_auth(err, INVALID_CREDENTIALS_MESSAGE))?;

    let user = state
        .sessions
        .register(&credentials)
        .await
        .map_err(|err| ApiError::from_auth(err, INVALID_CREDENTIALS_MESSAGE))?;

    Ok(status::Custom(
        Status::Created,
        Json(ApiResponse::new(
            Status::Created,
            "User successfully created",
            Some(RegisteredUser {
                username: user.username,
            }),
        )),
    ))
}

/// Exchange a username and password for an access/refresh token pair
#[openapi(tag = "Auth")]
#[post("/auth/login", data = "<payload>")]
pub async fn login(
    state: &State<AuthState>,
    payload: Payload<'_, Credentials>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, ApiError> {
    let credentials = payload.map_err(ApiError::from_json)?.into_inner();
    require_present(&[
        ("username", &credentials.username),
        ("password", &credentials.password),
    ])?;

    let (_, pair) = state
        .sessions
        .login(&credentials.username, &credentials.password)
        .await
        .map_err(|err| ApiError::from_auth(err, INVALID_CREDENTIALS_MESSAGE))?;

    Ok(Json(ApiResponse::ok("Login successful", pair.into())))
}

/// Redeem a refresh token for a new pair; the presented token is spent
#[openapi(tag = "Auth")]
#[post("/auth/refresh", data = "<payload>")]
pub async fn refresh(
    state: &State<AuthState>,
    payload: Payload<'_, RefreshRequest>,
) -> Result<Json<ApiResponse<TokenPairResponse>>, ApiError> {
    let request = payload.map_err(ApiError::from_json)?.into_inner();
    require_present(&[("refresh_token", &request.refresh_token)])?;

    let pair = state
        .sessions
        .refresh_tokens(&request.refresh_token)
        .await
        .map_err(|err| ApiError::from_auth(err, INVALID_REFRESH_TOKEN_MESSAGE))?;

    Ok(Json(ApiResponse::ok("Token refreshed", pair.into())))
}

/// Revoke the caller's refresh token
#[openapi(tag = "Auth")]
#[post("/auth/logout")]
pub async fn logout(
    state: &State<AuthState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state
        .sessions
        .logout(user.id)
        .await
        .map_err(|err| ApiError::from_auth(err, INVALID_TOKEN_MESSAGE))?;

    Ok(Json(ApiResponse::message(Status::Ok, "Successfully logged out")))
}

/// Describe the authenticated caller
#[openapi(tag = "Auth")]
#[get("/auth/me")]
pub async fn me(
    state: &State<AuthState>,
    user: AuthUser,
) -> Result<Json<ApiResponse<UserSummary>>, ApiError> {
    let user = state
        .sessions
        .current_user(user.id)
        .await
        .map_err(|err| ApiError::from_auth(err, INVALID_TOKEN_MESSAGE))?;

    Ok(Json(ApiResponse::ok(
        "Successfully fetch user",
        UserSummary {
            id: user.id,
            username: user.username,
        },
    )))
}

fn require_present(fields: &[(&str, &String)]) -> Result<(), ApiError> {
    let errors: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.is_empty())
        .map(|(name, _)| format!("Field '{name}' is required"))
        .collect();

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ApiError::from_auth(
            AuthError::Validation(errors),
            INVALID_CREDENTIALS_MESSAGE,
        ))
    }
}
