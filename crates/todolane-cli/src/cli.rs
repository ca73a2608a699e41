//! Command-line argument definitions.

use clap::{Parser, Subcommand};

/// Todolane task client
#[derive(Parser, Debug)]
#[command(name = "todolane", version, about = "Command-line client for the todolane task API")]
pub struct Cli {
    /// Print machine-readable JSON instead of text
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Log in and store the session
    Login(LoginArgs),
    /// Forget the stored session
    Logout,
    /// Show whether a session is active and when it expires
    Status,
    /// Show the logged-in user and their permissions
    Whoami,
    /// Create an account; a one-time code is emailed
    Register(RegisterArgs),
    /// Confirm a new account with the emailed code
    VerifyOtp(OtpArgs),
    /// Email a new one-time code
    ResendOtp(UsernameArgs),
    /// Email a password reset code
    ForgotPassword(ForgotPasswordArgs),
    /// Set a new password using the emailed code
    ResetPassword(OtpArgs),
    /// Manage todos
    Todos(TodosArgs),
    /// Keep a session open and answer expiry warnings interactively
    Watch,
}

#[derive(Parser, Debug)]
pub struct LoginArgs {
    /// Email address; defaults to the last one used
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Parser, Debug)]
pub struct RegisterArgs {
    /// Email address, also the username
    pub email: String,

    #[arg(long)]
    pub first_name: String,

    #[arg(long)]
    pub last_name: String,
}

#[derive(Parser, Debug)]
pub struct OtpArgs {
    /// Code from the email
    pub otp: String,

    /// Defaults to the username remembered from the previous step
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Parser, Debug)]
pub struct UsernameArgs {
    #[arg(short, long)]
    pub username: Option<String>,
}

#[derive(Parser, Debug)]
pub struct ForgotPasswordArgs {
    pub username: String,
}

#[derive(Parser, Debug)]
pub struct TodosArgs {
    #[command(subcommand)]
    pub command: TodoCommands,
}

#[derive(Subcommand, Debug)]
pub enum TodoCommands {
    /// List todos grouped by status
    List,
    /// Create a todo
    Add(AddTodoArgs),
    /// Move a todo to another status column
    SetStatus(SetStatusArgs),
    /// Delete a todo
    Delete(DeleteTodoArgs),
}

#[derive(Parser, Debug)]
pub struct AddTodoArgs {
    pub title: String,

    #[arg(short, long, default_value = "")]
    pub description: String,

    /// not-started, working-on-it, need-guidance or completed
    #[arg(short, long)]
    pub status: Option<String>,
}

#[derive(Parser, Debug)]
pub struct SetStatusArgs {
    pub id: i64,
    pub status: String,
}

#[derive(Parser, Debug)]
pub struct DeleteTodoArgs {
    pub id: i64,
}
