//! Registration, one-time code verification and password reset.
//!
//! These endpoints are unauthenticated. Between steps the username is kept
//! in the token store under its ephemeral `username` key.

use tracing::{info, warn};

use crate::models::account::{
    OtpRequest, PasswordResetRequest, RegistrationRequest, UsernameRequest,
};
use crate::models::{MessageResponse, PasswordReset, Registration, RegistrationResponse};

use super::error::ApiError;
use super::gateway::AuthGateway;

pub const REGISTER_PATH: &str = "/auth/register/";
pub const VERIFY_OTP_PATH: &str = "/auth/register/verify_otp/";
pub const RESEND_OTP_PATH: &str = "/auth/register/resend_otp/";
pub const FORGOT_PASSWORD_PATH: &str = "/auth/register/forgot_password/";
pub const RESET_PASSWORD_PATH: &str = "/auth/register/reset_password/";

impl AuthGateway {
    /// Create an account. The server emails a one-time code on success.
    pub async fn register(&self, form: &Registration) -> Result<RegistrationResponse, ApiError> {
        self.store().set_username(&form.email)?;
        let response: RegistrationResponse = self
            .post_public(REGISTER_PATH, &RegistrationRequest::from(form))
            .await?;
        info!("Account created, awaiting OTP verification");
        Ok(response)
    }

    /// Confirm a registration with the emailed code.
    pub async fn verify_otp(
        &self,
        username: Option<&str>,
        otp: &str,
    ) -> Result<MessageResponse, ApiError> {
        let username = self.pending_username(username)?;
        let response: MessageResponse = self
            .post_public(
                VERIFY_OTP_PATH,
                &OtpRequest {
                    username: &username,
                    otp,
                },
            )
            .await?;
        self.forget_username();
        Ok(response)
    }

    pub async fn resend_otp(&self, username: Option<&str>) -> Result<MessageResponse, ApiError> {
        let username = self.pending_username(username)?;
        let response: MessageResponse = self
            .post_public(RESEND_OTP_PATH, &UsernameRequest { username: &username })
            .await?;
        self.store().set_username(&username)?;
        Ok(response)
    }

    /// Ask the server to email a password reset code.
    pub async fn forgot_password(&self, username: &str) -> Result<MessageResponse, ApiError> {
        let response: MessageResponse = self
            .post_public(FORGOT_PASSWORD_PATH, &UsernameRequest { username })
            .await?;
        self.store().set_username(username)?;
        Ok(response)
    }

    pub async fn reset_password(
        &self,
        username: Option<&str>,
        reset: &PasswordReset,
    ) -> Result<MessageResponse, ApiError> {
        if reset.password != reset.confirm_password {
            return Err(ApiError::Rejected("Passwords do not match".to_string()));
        }
        let username = self.pending_username(username)?;
        let response: MessageResponse = self
            .post_public(
                RESET_PASSWORD_PATH,
                &PasswordResetRequest {
                    username: &username,
                    otp: &reset.otp,
                    password: &reset.password,
                    confirm_password: &reset.confirm_password,
                },
            )
            .await?;
        self.forget_username();
        info!("Password reset");
        Ok(response)
    }

    fn pending_username(&self, explicit: Option<&str>) -> Result<String, ApiError> {
        explicit
            .map(str::to_string)
            .or_else(|| self.store().username())
            .ok_or_else(|| ApiError::Rejected("Username not found".to_string()))
    }

    fn forget_username(&self) {
        if let Err(e) = self.store().clear_username() {
            warn!(error = %e, "Failed to clear pending username");
        }
    }
}
