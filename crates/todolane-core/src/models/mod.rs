//! Data models for the task API.
//!
//! - `UserProfile`: the logged-in user as returned by `/auth/users/`
//! - `Todo`, `NewTodo`, `TodoStatus`: todo items and their status columns
//! - Account payloads for registration, OTP and password reset

pub mod account;
pub mod todo;
pub mod user;

pub use account::{MessageResponse, PasswordReset, Registration, RegistrationResponse};
pub use todo::{group_by_status, NewTodo, Todo, TodoStatus};
pub use user::{PermissionsResponse, UserProfile};
