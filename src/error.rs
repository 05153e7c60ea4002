use okapi::openapi3::Responses;
use rocket::Request;
use rocket::http::Status;
use rocket::response::{self, Responder, status};
use rocket::serde::json::{self, Json};
use rocket_okapi::r#gen::OpenApiGenerator;
use rocket_okapi::response::OpenApiResponderInner;
use rocket_okapi::util::add_schema_response;

use crate::auth::AuthError;
use crate::models::ApiResponse;
use crate::todos::TodoError;

pub const SERVER_FAILURE_MESSAGE: &str = "Something went wrong, please try again later";

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    NotFound(String),
    Conflict(String),
    InternalError(String),
}

impl ApiError {
    /// Map a session failure, using `unauthorized` as the only message a
    /// client ever sees for 401s at this call site.
    pub fn from_auth(err: AuthError, unauthorized: &str) -> Self {
        match err {
            AuthError::Validation(errors) => {
                ApiError::BadRequest(format!("Validation error: {}", errors.join(";")))
            }
            AuthError::UsernameTaken => ApiError::Conflict("Username already exists".into()),
            err if err.is_internal() => ApiError::InternalError(err.to_string()),
            err => {
                log::debug!("unauthorized: {}", err);
                ApiError::Unauthorized(unauthorized.to_string())
            }
        }
    }

    /// Describe a rejected JSON body without echoing its content.
    pub fn from_json(err: json::Error<'_>) -> Self {
        let message = match &err {
            json::Error::Parse(_, parse_err) => describe_parse_error(&parse_err.to_string()),
            json::Error::Io(_) => "Invalid json format".to_string(),
        };
        ApiError::BadRequest(message)
    }

    fn status(&self) -> Status {
        match self {
            ApiError::BadRequest(_) => Status::BadRequest,
            ApiError::Unauthorized(_) => Status::Unauthorized,
            ApiError::NotFound(_) => Status::NotFound,
            ApiError::Conflict(_) => Status::Conflict,
            ApiError::InternalError(_) => Status::InternalServerError,
        }
    }
}

fn describe_parse_error(message: &str) -> String {
    let quoted = |prefix: &str| {
        message
            .strip_prefix(prefix)
            .and_then(|rest| rest.strip_prefix('`'))
            .and_then(|rest| rest.split('`').next())
            .map(str::to_string)
    };

    if let Some(field) = quoted("unknown field ") {
        format!("Unknown field: {field}")
    } else if let Some(field) = quoted("missing field ") {
        format!("Field '{field}' is required")
    } else {
        "Invalid json format".to_string()
    }
}

impl<'r> Responder<'r, 'static> for ApiError {
    fn respond_to(self, request: &'r Request<'_>) -> response::Result<'static> {
        let status = self.status();
        let message = match self {
            ApiError::InternalError(cause) => {
                log::error!("internal error: {}", cause);
                SERVER_FAILURE_MESSAGE.to_string()
            }
            ApiError::BadRequest(msg)
            | ApiError::Unauthorized(msg)
            | ApiError::NotFound(msg)
            | ApiError::Conflict(msg) => {
                log::debug!("{}: {}", status, msg);
                msg
            }
        };

        status::Custom(status, Json(ApiResponse::message(status, message))).respond_to(request)
    }
}

impl OpenApiResponderInner for ApiError {
    fn responses(generator: &mut OpenApiGenerator) -> rocket_okapi::Result<Responses> {
        let mut responses = Responses::default();
        let schema = generator.json_schema::<ApiResponse<()>>();
        for code in [400, 401, 404, 409, 500] {
            add_schema_response(&mut responses, code, "application/json", schema.clone())?;
        }
        Ok(responses)
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        ApiError::from_auth(err, "Unauthorized")
    }
}

impl From<TodoError> for ApiError {
    fn from(err: TodoError) -> Self {
        match err {
            TodoError::NotFound => ApiError::NotFound("Todo not found".into()),
            TodoError::Validation(errors) => {
                ApiError::BadRequest(format!("Validation error: {}", errors.join(";")))
            }
            err => ApiError::InternalError(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_unknown_fields() {
        assert_eq!(
            describe_parse_error(
                "unknown field `usernfame`, expected `username` or `password` at line 1 column 12"
            ),
            "Unknown field: usernfame"
        );
    }

    #[test]
    fn names_missing_fields() {
        assert_eq!(
            describe_parse_error("missing field `password` at line 1 column 20"),
            "Field 'password' is required"
        );
    }

    #[test]
    fn falls_back_to_generic_message() {
        assert_eq!(
            describe_parse_error("expected value at line 1 column 1"),
            "Invalid json format"
        );
    }

    #[test]
    fn unauthorized_hides_cause() {
        let err = ApiError::from_auth(AuthError::InvalidRefreshToken, "Invalid refresh token");
        assert!(matches!(err, ApiError::Unauthorized(msg) if msg == "Invalid refresh token"));
    }

    #[test]
    fn taken_username_is_conflict() {
        let err = ApiError::from_auth(AuthError::UsernameTaken, "Invalid credentials");
        assert_eq!(err.status(), Status::Conflict);
    }
}
