use thiserror::Error;

pub type TodoResult<T> = Result<T, TodoError>;

#[derive(Debug, Error)]
pub enum TodoError {
    #[error("todo not found")]
    NotFound,
    #[error("validation error: {}", .0.join(";"))]
    Validation(Vec<String>),
    #[error("store call timed out after {0:?}")]
    StoreTimeout(std::time::Duration),
    #[error("database error: {0}")]
    Sqlx(#[from] rocket_db_pools::sqlx::Error),
}
