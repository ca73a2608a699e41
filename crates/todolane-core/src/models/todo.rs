use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Status columns a todo moves through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TodoStatus {
    #[default]
    #[serde(rename = "Not Started")]
    NotStarted,
    #[serde(rename = "Working on It")]
    WorkingOnIt,
    #[serde(rename = "Need Guidance")]
    NeedGuidance,
    #[serde(rename = "Completed")]
    Completed,
}

impl TodoStatus {
    /// Display order of the status columns
    pub const ALL: [TodoStatus; 4] = [
        TodoStatus::NotStarted,
        TodoStatus::WorkingOnIt,
        TodoStatus::NeedGuidance,
        TodoStatus::Completed,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TodoStatus::NotStarted => "Not Started",
            TodoStatus::WorkingOnIt => "Working on It",
            TodoStatus::NeedGuidance => "Need Guidance",
            TodoStatus::Completed => "Completed",
        }
    }
}

impl fmt::Display for TodoStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TodoStatus {
    type Err = String;

    /// Accepts the wire strings case-insensitively, plus kebab/snake forms.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c.to_ascii_lowercase() })
            .collect();
        TodoStatus::ALL
            .into_iter()
            .find(|status| status.as_str().to_ascii_lowercase() == normalized)
            .ok_or_else(|| format!("Unknown status: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: TodoStatus,
    #[serde(default)]
    pub completed: bool,
}

/// Payload for creating or updating a todo.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NewTodo {
    pub title: String,
    pub description: String,
    pub status: TodoStatus,
    pub completed: bool,
}

impl NewTodo {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: String::new(),
            status: TodoStatus::NotStarted,
            completed: false,
        }
    }

    /// Keeps `completed` in step with the status column.
    pub fn with_status(mut self, status: TodoStatus) -> Self {
        self.status = status;
        self.completed = status == TodoStatus::Completed;
        self
    }
}

impl From<&Todo> for NewTodo {
    fn from(todo: &Todo) -> Self {
        Self {
            title: todo.title.clone(),
            description: todo.description.clone(),
            status: todo.status,
            completed: todo.completed,
        }
    }
}

/// Group todos by status, every column present and in display order.
pub fn group_by_status(todos: &[Todo]) -> Vec<(TodoStatus, Vec<&Todo>)> {
    TodoStatus::ALL
        .into_iter()
        .map(|status| (status, todos.iter().filter(|t| t.status == status).collect()))
        .collect()
}
