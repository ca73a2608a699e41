//! REST API access for the task service.
//!
//! `AuthGateway` performs login, refresh and authenticated calls and is the
//! only component that writes tokens into the store. Account (registration/OTP) calls and
//! `TodoService` ride on top of it.
//!
//! The API uses JWT bearer tokens: a short-lived access token and a longer
//! lived refresh token used only to mint new access tokens.

pub mod account;
pub mod error;
pub mod gateway;
pub mod todos;

pub use error::{ApiError, AuthError, RefreshError};
pub use gateway::{AuthGateway, RefreshFuture, TokenRefresher};
pub use todos::TodoService;
