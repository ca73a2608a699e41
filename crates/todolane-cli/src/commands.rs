//! Command handlers.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{anyhow, bail, Context as _, Result};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tracing::{debug, warn};

use todolane_core::models::{group_by_status, NewTodo, PasswordReset, Registration, TodoStatus};
use todolane_core::{
    AuthGateway, Config, LogoutReason, SessionBridge, SessionEvent, SessionMonitor, SessionView,
    SystemClock, TodoService,
};

use crate::cli::{
    AddTodoArgs, ForgotPasswordArgs, LoginArgs, OtpArgs, RegisterArgs, SetStatusArgs,
    TodoCommands, UsernameArgs,
};

/// Shared state for a single invocation.
pub struct Context {
    pub config: Config,
    pub gateway: Arc<AuthGateway>,
    pub json: bool,
}

impl Context {
    pub fn new(config: Config, json: bool) -> Result<Self> {
        let store = config.token_store()?;
        let gateway = AuthGateway::from_config(&config, store)?;
        debug!(base_url = gateway.base_url(), "Gateway ready");
        Ok(Self {
            config,
            gateway: Arc::new(gateway),
            json,
        })
    }

    fn todos(&self) -> TodoService {
        TodoService::new(Arc::clone(&self.gateway))
    }
}

// ============================================================================
// Prompts
// ============================================================================

fn prompt_line(label: &str) -> Result<String> {
    eprint!("{}: ", label);
    io::stderr().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let line = line.trim().to_string();
    if line.is_empty() {
        bail!("{} is required", label);
    }
    Ok(line)
}

fn prompt_password(label: &str) -> Result<String> {
    let password = rpassword::prompt_password(format!("{}: ", label))?;
    if password.is_empty() {
        bail!("{} is required", label);
    }
    Ok(password)
}

// ============================================================================
// Session
// ============================================================================

pub async fn login(ctx: &mut Context, args: LoginArgs) -> Result<()> {
    let username = match args.username.or_else(|| ctx.config.last_username.clone()) {
        Some(username) => username,
        None => prompt_line("Email")?,
    };
    let password = prompt_password("Password")?;

    ctx.gateway.login(&username, &password).await?;

    if ctx.config.last_username.as_deref() != Some(username.as_str()) {
        ctx.config.last_username = Some(username.clone());
        if let Err(e) = ctx.config.save() {
            warn!(error = %e, "Failed to remember username");
        }
    }

    let name = match ctx.gateway.fetch_current_user().await {
        Ok(user) => user.display_name(),
        Err(e) => {
            debug!(error = %e, "Could not fetch user profile");
            username
        }
    };
    println!("Logged in as {}", name);
    Ok(())
}

pub fn logout(ctx: &Context) -> Result<()> {
    ctx.gateway.logout()?;
    println!("Logged out");
    Ok(())
}

pub fn status(ctx: &Context) -> Result<()> {
    let mut monitor = SessionMonitor::new(
        Arc::clone(ctx.gateway.store()),
        Arc::new(SystemClock),
        ctx.config.monitor_config(),
    );
    monitor.poll_liveness();
    let view = monitor.view();

    if ctx.json {
        println!("{}", serde_json::to_string_pretty(&view)?);
    } else {
        print_view(&view);
    }
    Ok(())
}

fn print_view(view: &SessionView) {
    match view.ms_remaining {
        Some(ms) if view.logged_in => {
            println!("Logged in, access token expires in {}", format_duration(ms));
        }
        _ => println!("Not logged in"),
    }
}

fn format_duration(ms: i64) -> String {
    let secs = ms.div_euclid(1000);
    if secs >= 3600 {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    } else if secs >= 60 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}s", secs)
    }
}

fn describe(reason: LogoutReason) -> &'static str {
    match reason {
        LogoutReason::Expired => "session expired",
        LogoutReason::UserEnded => "logged out",
        LogoutReason::RefreshFailed => "session could not be extended",
        LogoutReason::NoValidSession => "no valid session",
    }
}

pub async fn whoami(ctx: &Context) -> Result<()> {
    let user = ctx.gateway.fetch_current_user().await?;
    let permissions = ctx.gateway.fetch_permissions().await?;

    if ctx.json {
        let out = json!({ "user": user, "permissions": permissions });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    println!("{} <{}>", user.display_name(), user.email);
    if permissions.is_empty() {
        println!("No permissions");
    } else {
        println!("Permissions:");
        for permission in permissions {
            println!("  {}", permission);
        }
    }
    Ok(())
}

/// Interactive session: shows the expiry countdown and reads `s` (stay),
/// `l` (log out) or `q` (quit) from stdin.
pub async fn watch(ctx: &Context) -> Result<()> {
    let bridge = SessionBridge::start(Arc::clone(&ctx.gateway), ctx.config.monitor_config());
    let mut events = bridge.subscribe();

    let view = bridge.resync().await?;
    if !view.logged_in {
        bail!("Not logged in. Run `todolane login` first.");
    }
    print_view(&view);
    eprintln!("Commands: s = stay logged in, l = log out, q = quit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(SessionEvent::Countdown { seconds }) => {
                    println!("Session expires in {}s. Stay logged in? [s/l]", seconds);
                }
                Ok(SessionEvent::StateChanged { from, to }) => {
                    debug!(?from, ?to, "Session state changed");
                }
                Ok(SessionEvent::LoggedOut { reason }) => {
                    println!("Logged out: {}", describe(reason));
                    break;
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Missed session events");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => match line? {
                Some(line) => match line.trim() {
                    "s" | "stay" => match bridge.stay().await {
                        Ok(()) => print_view(&bridge.view()),
                        Err(e) => println!("Could not extend session: {}", e),
                    },
                    "l" | "logout" => bridge.end_session().await?,
                    "q" | "quit" => break,
                    "" => {}
                    other => eprintln!("Unknown command: {}", other),
                },
                None => break,
            },
        }
    }

    bridge.shutdown();
    Ok(())
}

// ============================================================================
// Account
// ============================================================================

pub async fn register(ctx: &Context, args: RegisterArgs) -> Result<()> {
    let password = prompt_password("Password")?;
    let password2 = prompt_password("Confirm password")?;
    let form = Registration {
        email: args.email,
        password,
        password2,
        first_name: args.first_name,
        last_name: args.last_name,
    };

    let response = ctx.gateway.register(&form).await?;
    println!("{}", non_empty(&response.message, "Account created"));
    println!("Run `todolane verify-otp <code>` with the code from your email.");
    Ok(())
}

pub async fn verify_otp(ctx: &Context, args: OtpArgs) -> Result<()> {
    let response = ctx
        .gateway
        .verify_otp(args.username.as_deref(), &args.otp)
        .await?;
    println!("{}", non_empty(&response.message, "Account verified"));
    Ok(())
}

pub async fn resend_otp(ctx: &Context, args: UsernameArgs) -> Result<()> {
    let response = ctx.gateway.resend_otp(args.username.as_deref()).await?;
    println!("{}", non_empty(&response.message, "Code sent"));
    Ok(())
}

pub async fn forgot_password(ctx: &Context, args: ForgotPasswordArgs) -> Result<()> {
    let response = ctx.gateway.forgot_password(&args.username).await?;
    println!("{}", non_empty(&response.message, "Reset code sent"));
    println!("Run `todolane reset-password <code>` with the code from your email.");
    Ok(())
}

pub async fn reset_password(ctx: &Context, args: OtpArgs) -> Result<()> {
    let reset = PasswordReset {
        otp: args.otp,
        password: prompt_password("New password")?,
        confirm_password: prompt_password("Confirm password")?,
    };
    let response = ctx
        .gateway
        .reset_password(args.username.as_deref(), &reset)
        .await?;
    println!("{}", non_empty(&response.message, "Password reset"));
    Ok(())
}

fn non_empty<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}

// ============================================================================
// Todos
// ============================================================================

fn parse_status(value: &str) -> Result<TodoStatus> {
    value.parse::<TodoStatus>().map_err(|e| anyhow!(e))
}

pub async fn todos(ctx: &Context, command: TodoCommands) -> Result<()> {
    let service = ctx.todos();
    match command {
        TodoCommands::List => {
            let todos = service.list().await?;
            if ctx.json {
                println!("{}", serde_json::to_string_pretty(&todos)?);
                return Ok(());
            }
            for (status, items) in group_by_status(&todos) {
                println!("{} ({})", status, items.len());
                for todo in items {
                    println!("  #{} {}", todo.id, todo.title);
                }
            }
        }
        TodoCommands::Add(AddTodoArgs {
            title,
            description,
            status,
        }) => {
            let mut todo = NewTodo::new(title);
            todo.description = description;
            if let Some(status) = status {
                todo = todo.with_status(parse_status(&status)?);
            }
            let created = service.create(&todo).await?;
            println!("Created #{} {}", created.id, created.title);
        }
        TodoCommands::SetStatus(SetStatusArgs { id, status }) => {
            let status = parse_status(&status)?;
            let todos = service.list().await?;
            let todo = todos
                .iter()
                .find(|t| t.id == id)
                .with_context(|| format!("No todo with id {}", id))?;
            let updated = service.set_status(todo, status).await?;
            println!("#{} is now {}", updated.id, updated.status);
        }
        TodoCommands::Delete(args) => {
            service.delete(args.id).await?;
            println!("Deleted #{}", args.id);
        }
    }
    Ok(())
}
