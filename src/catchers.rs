//! Error catchers rendering Rocket-level failures in the response envelope.

use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::{Catcher, Request, catch, catchers};

use crate::auth::guards::{GateOutcome, MISSING_TOKEN_MESSAGE};
use crate::error::SERVER_FAILURE_MESSAGE;
use crate::models::ApiResponse;

type Envelope = Json<ApiResponse<()>>;

#[catch(400)]
fn bad_request(_: &Request<'_>) -> Envelope {
    Json(ApiResponse::message(Status::BadRequest, "Invalid request"))
}

/// Renders the bearer gate's rejection; a 401 raised elsewhere reads as a
/// missing token.
#[catch(401)]
fn unauthorized(request: &Request<'_>) -> Envelope {
    let message = request
        .local_cache(GateOutcome::default)
        .0
        .map(|rejection| rejection.message())
        .unwrap_or(MISSING_TOKEN_MESSAGE);
    Json(ApiResponse::message(Status::Unauthorized, message))
}

#[catch(404)]
fn not_found(_: &Request<'_>) -> Envelope {
    Json(ApiResponse::message(Status::NotFound, "Resource not found"))
}

/// Unparseable path or query parameters surface as 422 from Rocket.
#[catch(422)]
fn unprocessable(_: &Request<'_>) -> (Status, Envelope) {
    (
        Status::BadRequest,
        Json(ApiResponse::message(
            Status::BadRequest,
            "Invalid request parameters",
        )),
    )
}

#[catch(500)]
fn internal_error(request: &Request<'_>) -> Envelope {
    log::error!("unhandled failure for {} {}", request.method(), request.uri());
    Json(ApiResponse::message(
        Status::InternalServerError,
        SERVER_FAILURE_MESSAGE,
    ))
}

pub fn all() -> Vec<Catcher> {
    catchers![bad_request, unauthorized, not_found, unprocessable, internal_error]
}
