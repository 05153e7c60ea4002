use rocket::http::Status;
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use serde::{Deserialize, Serialize};

/// Envelope wrapping every single-result response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ApiResponse<T> {
    pub code: u16,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn new(status: Status, message: impl Into<String>, data: Option<T>) -> Self {
        Self {
            code: status.code,
            message: message.into(),
            data,
        }
    }

    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self::new(Status::Ok, message, Some(data))
    }
}

impl ApiResponse<()> {
    pub fn message(status: Status, message: impl Into<String>) -> Self {
        Self::new(status, message, None)
    }
}

/// Envelope for paginated list endpoints.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListResponse<T> {
    pub code: u16,
    pub message: String,
    pub offset: i64,
    pub limit: i64,
    pub count: usize,
    pub total: i64,
    pub data: Vec<T>,
}

impl<T> ListResponse<T> {
    pub fn ok(message: impl Into<String>, offset: i64, limit: i64, total: i64, data: Vec<T>) -> Self {
        Self {
            code: Status::Ok.code,
            message: message.into(),
            offset,
            limit,
            count: data.len(),
            total,
            data,
        }
    }
}
