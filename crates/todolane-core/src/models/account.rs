use serde::{Deserialize, Serialize};

/// Sign-up form. The email doubles as the username.
#[derive(Debug, Clone)]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub password2: String,
    pub first_name: String,
    pub last_name: String,
}

/// Wire form of `Registration`.
#[derive(Debug, Serialize)]
pub(crate) struct RegistrationRequest<'a> {
    pub username: &'a str,
    pub password: &'a str,
    pub password2: &'a str,
    pub first_name: &'a str,
    pub last_name: &'a str,
}

impl<'a> From<&'a Registration> for RegistrationRequest<'a> {
    fn from(form: &'a Registration) -> Self {
        Self {
            username: &form.email,
            password: &form.password,
            password2: &form.password2,
            first_name: &form.first_name,
            last_name: &form.last_name,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct RegistrationResponse {
    pub username: String,
    #[serde(default)]
    pub message: String,
}

/// Reply shape shared by the OTP and password endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: String,
    #[serde(default)]
    pub can_request_new_otp: Option<bool>,
}

/// New password submission for the reset flow.
#[derive(Debug, Clone)]
pub struct PasswordReset {
    pub otp: String,
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize)]
pub(crate) struct PasswordResetRequest<'a> {
    pub username: &'a str,
    pub otp: &'a str,
    pub password: &'a str,
    pub confirm_password: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct OtpRequest<'a> {
    pub username: &'a str,
    pub otp: &'a str,
}

#[derive(Debug, Serialize)]
pub(crate) struct UsernameRequest<'a> {
    pub username: &'a str,
}
