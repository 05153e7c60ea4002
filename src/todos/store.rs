use rocket_db_pools::sqlx::{self, PgPool};
use uuid::Uuid;

use crate::todos::models::{Todo, TodoDraft, TodoFilter};
use crate::todos::{TodoError, TodoResult};

/// Persistence for todos. Every call is scoped to one owner; rows belonging
/// to other users behave as if they did not exist.
#[rocket::async_trait]
pub trait TodoStore: Send + Sync {
    /// One page of the owner's todos, newest first, plus the unpaged total.
    async fn list(&self, user_id: Uuid, filter: &TodoFilter) -> TodoResult<(Vec<Todo>, i64)>;

    async fn get(&self, user_id: Uuid, id: i32) -> TodoResult<Todo>;

    async fn create(&self, user_id: Uuid, draft: &TodoDraft) -> TodoResult<i32>;

    async fn update(&self, user_id: Uuid, id: i32, draft: &TodoDraft) -> TodoResult<()>;

    async fn delete(&self, user_id: Uuid, id: i32) -> TodoResult<()>;
}

#[derive(Debug, Clone)]
pub struct PgTodoStore {
    pool: PgPool,
}

impl PgTodoStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

const FILTER_CLAUSE: &str = r#"
    WHERE user_id = $1
      AND ($2::date IS NULL OR due_date = $2)
      AND (cardinality($3::text[]) = 0 OR tags && $3)
"#;

#[rocket::async_trait]
impl TodoStore for PgTodoStore {
    async fn list(&self, user_id: Uuid, filter: &TodoFilter) -> TodoResult<(Vec<Todo>, i64)> {
        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM todos {FILTER_CLAUSE}"))
            .bind(user_id)
            .bind(filter.due_date)
            .bind(&filter.tags)
            .fetch_one(&self.pool)
            .await?;

        let todos = sqlx::query_as::<_, Todo>(&format!(
            r#"
            SELECT id, title, description, tags, due_date, created_at
            FROM todos
            {FILTER_CLAUSE}
            ORDER BY created_at DESC, id DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(user_id)
        .bind(filter.due_date)
        .bind(&filter.tags)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((todos, total))
    }

    async fn get(&self, user_id: Uuid, id: i32) -> TodoResult<Todo> {
        sqlx::query_as::<_, Todo>(
            r#"SELECT id, title, description, tags, due_date, created_at
               FROM todos
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(TodoError::NotFound)
    }

    async fn create(&self, user_id: Uuid, draft: &TodoDraft) -> TodoResult<i32> {
        let id: i32 = sqlx::query_scalar(
            r#"INSERT INTO todos (user_id, title, description, tags, due_date)
               VALUES ($1, $2, $3, $4, $5)
               RETURNING id"#,
        )
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.tags)
        .bind(draft.due_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(id)
    }

    async fn update(&self, user_id: Uuid, id: i32, draft: &TodoDraft) -> TodoResult<()> {
        let result = sqlx::query(
            r#"UPDATE todos
               SET title = $3, description = $4, tags = $5, due_date = $6
               WHERE id = $1 AND user_id = $2"#,
        )
        .bind(id)
        .bind(user_id)
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(&draft.tags)
        .bind(draft.due_date)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(TodoError::NotFound);
        }
        Ok(())
    }

    async fn delete(&self, user_id: Uuid, id: i32) -> TodoResult<()> {
        let result = sqlx::query("DELETE FROM todos WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(TodoError::NotFound);
        }
        Ok(())
    }
}
