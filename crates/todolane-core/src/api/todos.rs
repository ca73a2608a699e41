use std::sync::Arc;

use reqwest::Method;
use tracing::debug;

use crate::models::{NewTodo, Todo, TodoStatus};

use super::error::ApiError;
use super::gateway::AuthGateway;

pub const TODOS_PATH: &str = "/api/todos/";

/// Todo CRUD over the gateway's authorized request path.
#[derive(Clone)]
pub struct TodoService {
    gateway: Arc<AuthGateway>,
}

impl TodoService {
    pub fn new(gateway: Arc<AuthGateway>) -> Self {
        Self { gateway }
    }

    fn item_path(id: i64) -> String {
        format!("{}{}/", TODOS_PATH, id)
    }

    pub async fn list(&self) -> Result<Vec<Todo>, ApiError> {
        let todos: Vec<Todo> = self.gateway.get_authorized(TODOS_PATH).await?;
        debug!(count = todos.len(), "Fetched todos");
        Ok(todos)
    }

    pub async fn create(&self, todo: &NewTodo) -> Result<Todo, ApiError> {
        self.gateway
            .send_authorized_json(Method::POST, TODOS_PATH, todo)
            .await
    }

    pub async fn update(&self, id: i64, todo: &NewTodo) -> Result<Todo, ApiError> {
        self.gateway
            .send_authorized_json(Method::PUT, &Self::item_path(id), todo)
            .await
    }

    /// Move a todo to another status column.
    pub async fn set_status(&self, todo: &Todo, status: TodoStatus) -> Result<Todo, ApiError> {
        let update = NewTodo::from(todo).with_status(status);
        self.update(todo.id, &update).await
    }

    pub async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.gateway.delete_authorized(&Self::item_path(id)).await
    }
}
