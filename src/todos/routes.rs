use rocket::http::Status;
use rocket::response::status;
use rocket::serde::json::{self, Json};
use rocket::{State, delete, get, post, put};
use rocket_okapi::okapi::schemars::{self, JsonSchema};
use rocket_okapi::openapi;
use serde::{Deserialize, Serialize};

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::models::{ApiResponse, ListResponse};
use crate::todos::{Todo, TodoInput, TodoQuery, TodoState};

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CreatedTodo {
    pub id: i32,
}

/// List the caller's todos, newest first
#[openapi(tag = "Todos")]
#[get("/todos?<query..>")]
pub async fn list_todos(
    state: &State<TodoState>,
    user: AuthUser,
    query: TodoQuery,
) -> Result<Json<ListResponse<Todo>>, ApiError> {
    let filter = query.into_filter()?;
    let (todos, total) = state.list(user.id, &filter).await?;

    Ok(Json(ListResponse::ok(
        "Successfully fetch todos",
        filter.offset,
        filter.limit,
        total,
        todos,
    )))
}

/// Create a todo owned by the caller
#[openapi(tag = "Todos")]
#[post("/todos", data = "<payload>")]
pub async fn create_todo(
    state: &State<TodoState>,
    user: AuthUser,
    payload: Result<Json<TodoInput>, json::Error<'_>>,
) -> Result<status::Custom<Json<ApiResponse<CreatedTodo>>>, ApiError> {
    let draft = payload.map_err(ApiError::from_json)?.into_inner().validate()?;
    let id = state.create(user.id, &draft).await?;

    Ok(status::Custom(
        Status::Created,
        Json(ApiResponse::new(
            Status::Created,
            "Todo successfully created",
            Some(CreatedTodo { id }),
        )),
    ))
}

/// Fetch one of the caller's todos
#[openapi(tag = "Todos")]
#[get("/todos/<id>")]
pub async fn get_todo(
    state: &State<TodoState>,
    user: AuthUser,
    id: i32,
) -> Result<Json<ApiResponse<Todo>>, ApiError> {
    let todo = state.get(user.id, id).await?;
    Ok(Json(ApiResponse::ok("Successfully fetch todo", todo)))
}

/// Replace the fields of one of the caller's todos
#[openapi(tag = "Todos")]
#[put("/todos/<id>", data = "<payload>")]
pub async fn update_todo(
    state: &State<TodoState>,
    user: AuthUser,
    id: i32,
    payload: Result<Json<TodoInput>, json::Error<'_>>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let draft = payload.map_err(ApiError::from_json)?.into_inner().validate()?;
    state.update(user.id, id, &draft).await?;
    Ok(Json(ApiResponse::message(Status::Ok, "Todo successfully updated")))
}

/// Delete one of the caller's todos
#[openapi(tag = "Todos")]
#[delete("/todos/<id>")]
pub async fn delete_todo(
    state: &State<TodoState>,
    user: AuthUser,
    id: i32,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    state.delete(user.id, id).await?;
    Ok(Json(ApiResponse::message(Status::Ok, "Todo successfully deleted")))
}
