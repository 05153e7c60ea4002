use std::collections::BTreeMap;

use chrono::Utc;
use parking_lot::Mutex;
use uuid::Uuid;

use crate::todos::models::{Todo, TodoDraft, TodoFilter};
use crate::todos::store::TodoStore;
use crate::todos::{TodoError, TodoResult};

#[derive(Default)]
struct Rows {
    next_id: i32,
    todos: BTreeMap<i32, (Uuid, Todo)>,
}

/// In-process [`TodoStore`] with the same ownership and filter rules as the
/// Postgres one.
#[derive(Default)]
pub struct MemoryTodoStore {
    rows: Mutex<Rows>,
}

impl MemoryTodoStore {
    pub fn new() -> Self {
        Self::default()
    }
}

fn matches(todo: &Todo, filter: &TodoFilter) -> bool {
    let due_ok = filter.due_date.is_none_or(|date| todo.due_date == date);
    let tags_ok = filter.tags.is_empty() || todo.tags.iter().any(|tag| filter.tags.contains(tag));
    due_ok && tags_ok
}

#[rocket::async_trait]
impl TodoStore for MemoryTodoStore {
    async fn list(&self, user_id: Uuid, filter: &TodoFilter) -> TodoResult<(Vec<Todo>, i64)> {
        let rows = self.rows.lock();
        let matching: Vec<&Todo> = rows
            .todos
            .values()
            .rev()
            .filter(|(owner, todo)| *owner == user_id && matches(todo, filter))
            .map(|(_, todo)| todo)
            .collect();

        let total = matching.len() as i64;
        let page = matching
            .into_iter()
            .skip(filter.offset as usize)
            .take(filter.limit as usize)
            .cloned()
            .collect();
        Ok((page, total))
    }

    async fn get(&self, user_id: Uuid, id: i32) -> TodoResult<Todo> {
        match self.rows.lock().todos.get(&id) {
            Some((owner, todo)) if *owner == user_id => Ok(todo.clone()),
            _ => Err(TodoError::NotFound),
        }
    }

    async fn create(&self, user_id: Uuid, draft: &TodoDraft) -> TodoResult<i32> {
        let mut rows = self.rows.lock();
        rows.next_id += 1;
        let id = rows.next_id;
        let todo = Todo {
            id,
            title: draft.title.clone(),
            description: draft.description.clone(),
            tags: draft.tags.clone(),
            due_date: draft.due_date,
            created_at: Utc::now(),
        };
        rows.todos.insert(id, (user_id, todo));
        Ok(id)
    }

    async fn update(&self, user_id: Uuid, id: i32, draft: &TodoDraft) -> TodoResult<()> {
        match self.rows.lock().todos.get_mut(&id) {
            Some((owner, todo)) if *owner == user_id => {
                todo.title = draft.title.clone();
                todo.description = draft.description.clone();
                todo.tags = draft.tags.clone();
                todo.due_date = draft.due_date;
                Ok(())
            }
            _ => Err(TodoError::NotFound),
        }
    }

    async fn delete(&self, user_id: Uuid, id: i32) -> TodoResult<()> {
        let mut rows = self.rows.lock();
        match rows.todos.get(&id) {
            Some((owner, _)) if *owner == user_id => {
                rows.todos.remove(&id);
                Ok(())
            }
            _ => Err(TodoError::NotFound),
        }
    }
}
