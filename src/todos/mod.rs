//! Per-user todo items: models, storage and HTTP routes.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use uuid::Uuid;

pub mod error;
pub mod memory;
pub mod models;
pub mod routes;
pub mod store;

pub use error::{TodoError, TodoResult};
pub use memory::MemoryTodoStore;
pub use models::{Todo, TodoDraft, TodoFilter, TodoInput, TodoQuery};
pub use store::{PgTodoStore, TodoStore};

/// Managed state for the todo routes: a store plus the deadline applied to
/// each call into it.
#[derive(Clone)]
pub struct TodoState {
    store: Arc<dyn TodoStore>,
    store_timeout: Duration,
}

impl TodoState {
    pub fn new(store: Arc<dyn TodoStore>, store_timeout: Duration) -> Self {
        Self {
            store,
            store_timeout,
        }
    }

    async fn bounded<T>(&self, call: impl Future<Output = TodoResult<T>>) -> TodoResult<T> {
        tokio::time::timeout(self.store_timeout, call)
            .await
            .map_err(|_| TodoError::StoreTimeout(self.store_timeout))?
    }

    pub async fn list(&self, user_id: Uuid, filter: &TodoFilter) -> TodoResult<(Vec<Todo>, i64)> {
        self.bounded(self.store.list(user_id, filter)).await
    }

    pub async fn get(&self, user_id: Uuid, id: i32) -> TodoResult<Todo> {
        self.bounded(self.store.get(user_id, id)).await
    }

    pub async fn create(&self, user_id: Uuid, draft: &TodoDraft) -> TodoResult<i32> {
        let id = self.bounded(self.store.create(user_id, draft)).await?;
        log::info!("user {} created todo {}", user_id, id);
        Ok(id)
    }

    pub async fn update(&self, user_id: Uuid, id: i32, draft: &TodoDraft) -> TodoResult<()> {
        self.bounded(self.store.update(user_id, id, draft)).await
    }

    pub async fn delete(&self, user_id: Uuid, id: i32) -> TodoResult<()> {
        self.bounded(self.store.delete(user_id, id)).await?;
        log::info!("user {} deleted todo {}", user_id, id);
        Ok(())
    }
}
